//! Wavefront OBJ front-end.
//!
//! OBJ files declare shared position, texture-coordinate, and normal
//! pools, then reference them per face corner. The translation de-shares
//! them per group: each distinct face-corner reference becomes one output
//! vertex with position, uv, and normal gathered from the pools, and each
//! group becomes a node holding a triangle-soup geometry leaf.

use std::collections::HashMap;

use crate::builder::SceneGraphBuilder;
use crate::collada::ParseParams;
use crate::scene::{GeometryBody, InstanceBody, NodeBody, SceneNode};
use crate::{Asset, Manifest, ParsedAsset};

/// Translate OBJ text into the normalized scene-graph form.
///
/// The format is handled permissively: malformed numbers and out-of-range
/// references fall back to defaults, and lines that are not understood are
/// skipped, so translation never fails.
pub fn parse_obj(_params: &ParseParams, text: &str) -> ParsedAsset {
    let mut parser = ObjParser::default();
    parser.builder.open(SceneNode::group());
    parser.builder.open(SceneNode::group());
    parser.parse_lines(text);
    parser.close_group();
    parser.builder.close();

    ParsedAsset {
        root: parser.builder.into_root(),
        asset: Asset::default(),
        manifest: Manifest::default(),
    }
}

/// Output buffers of the group currently being collected.
#[derive(Default)]
struct ObjGroup {
    name: Option<String>,
    material_name: Option<String>,
    positions: Vec<f32>,
    uv: Vec<f32>,
    normals: Vec<f32>,
    indices: Vec<u32>,
}

#[derive(Default)]
struct ObjParser {
    builder: SceneGraphBuilder,
    positions: Vec<f32>,
    uv: Vec<f32>,
    normals: Vec<f32>,
    group: Option<ObjGroup>,

    /// Face-corner token to output-vertex index, reset per group.
    index_map: HashMap<String, u32>,
    next_index: u32,
}

impl ObjParser {
    fn parse_lines(&mut self, text: &str) {
        for line in text.lines() {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            let Some(&keyword) = tokens.first() else {
                continue;
            };

            match keyword {
                "v" => push_floats(&mut self.positions, &tokens, 3),
                "vt" => push_floats(&mut self.uv, &tokens, 2),
                "vn" => push_floats(&mut self.normals, &tokens, 3),
                "g" => {
                    self.close_group();
                    self.open_group(tokens.get(1).map(|s| s.to_string()));
                }
                "usemtl" => {
                    if self.group.is_none() {
                        self.open_group(None);
                    }
                    if let Some(group) = self.group.as_mut() {
                        group.material_name = tokens.get(1).map(|s| s.to_string());
                    }
                }
                "f" => {
                    if self.group.is_none() {
                        self.open_group(Some("default".to_string()));
                    }
                    self.parse_face(&tokens);
                }
                // The MTL sidecar is the loader's concern, not the
                // translation's.
                "mtllib" => {}
                _ => {}
            }
        }
    }

    fn open_group(&mut self, name: Option<String>) {
        self.group = Some(ObjGroup {
            name,
            ..ObjGroup::default()
        });
        self.index_map.clear();
        self.next_index = 0;
    }

    /// Emit the open group as a node subgraph: a grouping node named after
    /// the group, an instance wrapper when a material was selected, and
    /// the geometry leaf.
    fn close_group(&mut self) {
        let Some(group) = self.group.take() else {
            return;
        };

        self.builder
            .open(SceneNode::group().with_id(group.name.clone()));

        let material = group.material_name.is_some();
        if material {
            // References a material node expected in the client's scene.
            self.builder.open(
                SceneNode::new("instance")
                    .with_id(group.material_name)
                    .with_body(NodeBody::Instance(InstanceBody {
                        target: None,
                        must_exist: None,
                    })),
            );
        }

        self.builder
            .add_leaf(SceneNode::new("geometry").with_body(NodeBody::Geometry(GeometryBody {
                primitive: Some("triangles".to_string()),
                positions: group.positions,
                normals: Some(group.normals),
                uv: Some(group.uv),
                uv2: None,
                indices: group.indices,
            })));

        if material {
            self.builder.close();
        }
        self.builder.close();
    }

    fn parse_face(&mut self, tokens: &[&str]) {
        let mut corners = Vec::new();

        for &token in &tokens[1..] {
            if let Some(&known) = self.index_map.get(token) {
                corners.push(known);
                continue;
            }

            let refs: Vec<&str> = token.split('/').collect();
            let (pos, tex, nor) = match refs.len() {
                1 => {
                    let pos = face_ref(refs[0]);
                    (pos, pos, pos)
                }
                3 => (face_ref(refs[0]), face_ref(refs[1]), face_ref(refs[2])),
                // Unsupported corner form abandons the rest of the face.
                _ => return,
            };

            self.emit_vertex(pos, tex, nor);
            self.index_map.insert(token.to_string(), self.next_index);
            corners.push(self.next_index);
            self.next_index += 1;
        }

        // Fan-triangulate; triangles pass through unchanged.
        if let Some(group) = self.group.as_mut() {
            for j in 1..corners.len().saturating_sub(1) {
                group.indices.push(corners[0]);
                group.indices.push(corners[j]);
                group.indices.push(corners[j + 1]);
            }
        }
    }

    /// Gather one output vertex from the shared pools, with defaults for
    /// unresolvable references.
    fn emit_vertex(&mut self, pos: i64, tex: i64, nor: i64) {
        let Some(group) = self.group.as_mut() else {
            return;
        };

        let (x, y, z) = pool_triple(&self.positions, pos).unwrap_or((0.0, 0.0, 0.0));
        group.positions.extend_from_slice(&[x, y, z]);

        let (u, v) = pool_pair(&self.uv, tex).unwrap_or((0.0, 0.0));
        group.uv.extend_from_slice(&[u, v]);

        let (nx, ny, nz) = pool_triple(&self.normals, nor).unwrap_or((0.0, 0.0, 1.0));
        group.normals.extend_from_slice(&[nx, ny, nz]);
    }
}

/// A face-corner reference as a zero-based index; -1 when absent or
/// malformed, which fails every bounds check.
fn face_ref(token: &str) -> i64 {
    token.parse::<i64>().map(|v| v - 1).unwrap_or(-1)
}

fn pool_triple(pool: &[f32], index: i64) -> Option<(f32, f32, f32)> {
    if index < 0 {
        return None;
    }
    let at = index as usize * 3;
    if at + 2 < pool.len() {
        Some((pool[at], pool[at + 1], pool[at + 2]))
    } else {
        None
    }
}

fn pool_pair(pool: &[f32], index: i64) -> Option<(f32, f32)> {
    if index < 0 {
        return None;
    }
    let at = index as usize * 2;
    if at + 1 < pool.len() {
        Some((pool[at], pool[at + 1]))
    } else {
        None
    }
}

fn push_floats(pool: &mut Vec<f32>, tokens: &[&str], count: usize) {
    for i in 1..=count {
        let value = tokens
            .get(i)
            .and_then(|t| t.parse::<f32>().ok())
            .unwrap_or(f32::NAN);
        pool.push(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn parse(text: &str) -> Value {
        let parsed = parse_obj(&ParseParams::default(), text);
        serde_json::to_value(&parsed).unwrap()
    }

    const TRIANGLE: &str = "\
v 0 0 0
v 1 0 0
v 0 1 0
vt 0 0
vt 1 0
vt 0 1
vn 0 0 1
f 1/1/1 2/2/1 3/3/1
";

    #[test]
    fn test_triangle_geometry() {
        let json = parse(TRIANGLE);

        // Outer node, inner node, group node, geometry leaf.
        let group = json.pointer("/rootNode/nodes/0/nodes/0").unwrap();
        assert_eq!(group.pointer("/id").unwrap(), "default");

        let geometry = group.pointer("/nodes/0").unwrap();
        assert_eq!(geometry.pointer("/type").unwrap(), "geometry");
        assert_eq!(geometry.pointer("/primitive").unwrap(), "triangles");
        assert_eq!(
            geometry.pointer("/indices").unwrap(),
            &serde_json::json!([0, 1, 2])
        );
        assert_eq!(geometry.pointer("/positions").unwrap().as_array().unwrap().len(), 9);
        assert_eq!(geometry.pointer("/uv").unwrap().as_array().unwrap().len(), 6);
        assert_eq!(
            geometry.pointer("/normals").unwrap(),
            &serde_json::json!([0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0])
        );
    }

    #[test]
    fn test_shared_corners_are_deduplicated() {
        let text = "\
v 0 0 0
v 1 0 0
v 0 1 0
v 1 1 0
f 1 2 3
f 3 2 4
";
        let json = parse(text);
        let geometry = json.pointer("/rootNode/nodes/0/nodes/0/nodes/0").unwrap();

        // Four distinct corners across both faces.
        assert_eq!(geometry.pointer("/positions").unwrap().as_array().unwrap().len(), 12);
        assert_eq!(
            geometry.pointer("/indices").unwrap(),
            &serde_json::json!([0, 1, 2, 2, 1, 3])
        );
    }

    #[test]
    fn test_quad_fan_triangulation() {
        let text = "\
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
f 1 2 3 4
";
        let json = parse(text);
        let geometry = json.pointer("/rootNode/nodes/0/nodes/0/nodes/0").unwrap();
        assert_eq!(
            geometry.pointer("/indices").unwrap(),
            &serde_json::json!([0, 1, 2, 0, 2, 3])
        );
    }

    #[test]
    fn test_groups_and_materials() {
        let text = "\
v 0 0 0
v 1 0 0
v 0 1 0
g left
usemtl stone
f 1 2 3
g right
f 1 2 3
";
        let json = parse(text);
        let groups = json.pointer("/rootNode/nodes/0/nodes").unwrap().as_array().unwrap();
        assert_eq!(groups.len(), 2);

        let left = &groups[0];
        assert_eq!(left.pointer("/id").unwrap(), "left");
        let instance = left.pointer("/nodes/0").unwrap();
        assert_eq!(instance.pointer("/type").unwrap(), "instance");
        assert_eq!(instance.pointer("/id").unwrap(), "stone");
        assert_eq!(instance.pointer("/nodes/0/type").unwrap(), "geometry");

        // Corner indexing restarts per group, so the second group gets its
        // own copies of the shared vertices.
        let right = &groups[1];
        assert_eq!(right.pointer("/id").unwrap(), "right");
        let geometry = right.pointer("/nodes/0").unwrap();
        assert_eq!(
            geometry.pointer("/indices").unwrap(),
            &serde_json::json!([0, 1, 2])
        );
        assert_eq!(geometry.pointer("/positions").unwrap().as_array().unwrap().len(), 9);
    }

    #[test]
    fn test_out_of_range_references_use_defaults() {
        let text = "f 10 11 12\n";
        let json = parse(text);
        let geometry = json.pointer("/rootNode/nodes/0/nodes/0/nodes/0").unwrap();

        let positions = geometry.pointer("/positions").unwrap().as_array().unwrap();
        assert_eq!(positions.len(), 9);
        assert!(positions.iter().all(|v| v.as_f64() == Some(0.0)));
        assert_eq!(
            geometry.pointer("/normals/2").unwrap(),
            &serde_json::json!(1.0)
        );
    }

    #[test]
    fn test_two_part_corner_abandons_face() {
        let text = "\
v 0 0 0
v 1 0 0
v 0 1 0
f 1/1 2/2 3/3
";
        let json = parse(text);
        let geometry = json.pointer("/rootNode/nodes/0/nodes/0/nodes/0").unwrap();
        assert_eq!(geometry.pointer("/indices").unwrap(), &serde_json::json!([]));
    }

    #[test]
    fn test_empty_input_yields_bare_tree() {
        let json = parse("");
        assert_eq!(json.pointer("/rootNode/type").unwrap(), "node");
        assert!(json.pointer("/rootNode/nodes/0/nodes").is_none());
        assert_eq!(json.pointer("/asset").unwrap(), &serde_json::json!({}));
    }
}
