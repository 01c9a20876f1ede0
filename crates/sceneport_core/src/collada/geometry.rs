//! Vertex assembly and geometry emission.
//!
//! A face group's index stream interleaves one index per input binding.
//! Assembly walks the stream tuple by tuple, gathers each binding's
//! selected fields from its resolved source, and produces flat per-group
//! output buffers with a synthesized sequential index array: one output
//! vertex per index tuple, no sharing.

use std::collections::HashMap;
use std::rc::Rc;

use indexmap::IndexMap;
use xmltree::Element;

use crate::collada::error::{ParseError, ParseResult};
use crate::collada::parser::ColladaParser;
use crate::collada::source::{self, AttributeSource, SourceSlot};
use crate::collada::triangulate::{self, FaceGroup};
use crate::dom;
use crate::scene::{Extents, GeometryBody, InstanceBody, InstanceTarget, NodeBody, SceneNode};

/// One face-group input, slotted by its offset in the index tuple.
#[derive(Debug)]
pub struct InputBinding {
    /// Output buffer this binding feeds: a semantic name, with the set
    /// index appended for texture coordinates ("TEXCOORD0", "TEXCOORD1").
    pub group: String,
    pub offset: usize,
    pub source: Rc<AttributeSource>,

    /// Normals source riding along with a VERTEX binding when the
    /// vertices element supplies them and the face group binds none
    /// explicitly. Indexed by the VERTEX field loop, but addressed with
    /// its own stride and offset.
    pub companion: Option<Rc<AttributeSource>>,
}

/// Flat output buffers assembled from one face group.
#[derive(Debug)]
pub struct VertexAssembly {
    pub outputs: HashMap<String, Vec<f32>>,
    pub indices: Vec<u32>,
}

/// Expand a triangulated index stream into per-vertex output buffers.
///
/// Bindings sharing an offset overwrite each other, last one wins. Fields
/// masked out by an unnamed accessor param are skipped. Position tuples
/// narrower than three components are zero-padded up to three; a
/// three-component texture coordinate drops its third component.
pub fn assemble(
    bindings: &[InputBinding],
    tuple_width: usize,
    faces: &[u32],
) -> ParseResult<VertexAssembly> {
    let mut outputs: HashMap<String, Vec<f32>> = HashMap::new();
    for binding in bindings {
        outputs.entry(binding.group.clone()).or_default();
        if binding.companion.is_some() {
            outputs.entry("NORMAL".to_string()).or_default();
        }
    }

    let mut slots: Vec<Option<&InputBinding>> = vec![None; tuple_width];
    for binding in bindings {
        if binding.offset < tuple_width {
            slots[binding.offset] = Some(binding);
        }
    }

    let mut at = 0;
    while at < faces.len() {
        for (slot, binding) in slots.iter().enumerate() {
            let Some(binding) = binding else {
                continue;
            };
            let index = faces.get(at + slot).copied().unwrap_or(0) as usize;

            let mut extracted = Vec::new();
            let mut paired = Vec::new();
            for field in 0..binding.source.stride {
                let named = binding
                    .source
                    .field_mask
                    .get(field)
                    .map_or(false, Option::is_some);
                if !named {
                    continue;
                }
                extracted.push(binding.source.value_at(index, field));
                if let Some(companion) = &binding.companion {
                    paired.push(companion.value_at(index, field));
                }
            }

            if binding.group == "VERTEX" && !extracted.is_empty() && extracted.len() < 3 {
                while extracted.len() < 3 {
                    extracted.push(0.0);
                    if binding.companion.is_some() {
                        paired.push(0.0);
                    }
                }
            }
            if (binding.group == "TEXCOORD0" || binding.group == "TEXCOORD1")
                && extracted.len() == 3
            {
                extracted.pop();
            }

            if let Some(buffer) = outputs.get_mut(&binding.group) {
                buffer.extend_from_slice(&extracted);
            }
            if binding.companion.is_some() {
                if let Some(buffer) = outputs.get_mut("NORMAL") {
                    buffer.extend_from_slice(&paired);
                }
            }
        }
        at += tuple_width;
    }

    let positions_len = outputs
        .get("VERTEX")
        .ok_or_else(|| {
            ParseError::MalformedStructure("input[semantic == 'VERTEX']".to_string())
        })?
        .len();
    let indices = (0..positions_len as u32 / 3).collect();

    Ok(VertexAssembly { outputs, indices })
}

impl<'a> ColladaParser<'a> {
    /// Translate a `<geometry>` element into a symbol node holding one
    /// geometry leaf per face group.
    pub(super) fn parse_geometry(&mut self, geometry: &'a Element) -> ParseResult<()> {
        self.builder
            .open(SceneNode::group().with_id(self.make_id(dom::attr(geometry, "id"))));

        let mesh = dom::first_descendant(geometry, "mesh")
            .ok_or_else(|| ParseError::MalformedStructure("geometry/mesh".to_string()))?;

        for group in triangulate::face_groups(mesh)? {
            self.emit_face_group(&group)?;
        }

        self.builder.close();
        Ok(())
    }

    fn emit_face_group(&mut self, group: &FaceGroup<'a>) -> ParseResult<()> {
        let inputs = dom::descendants(group.element, "input");
        let tuple_width = triangulate::max_offset(&inputs) + 1;
        let bindings = self.build_bindings(&inputs)?;

        let assembly = assemble(&bindings, tuple_width, &group.indices)?;
        let mut outputs = assembly.outputs;
        let positions = outputs.remove("VERTEX").unwrap_or_default();

        let bounded = self.options.bounding_boxes;
        if bounded {
            let mut extents = Extents::default();
            extents.expand_by_positions(&positions);
            self.builder
                .open(SceneNode::new("boundingBox").with_body(NodeBody::BoundingBox {
                    boundary: extents,
                }));
        }

        // A material attribute names an abstract symbol; the binding to a
        // concrete material arrives via configs when this geometry symbol
        // is instanced.
        let material = dom::attr(group.element, "material").map(str::to_string);
        if let Some(name) = &material {
            self.builder.open(
                SceneNode::new("instance").with_body(NodeBody::Instance(InstanceBody {
                    target: Some(InstanceTarget::Symbolic { name: name.clone() }),
                    must_exist: None,
                })),
            );
            self.add_info(
                "Target Material Symbol is dynamically configured on this Geometry Symbol when instanced",
            );
        }

        let mut leaf = SceneNode::new("geometry").with_body(NodeBody::Geometry(GeometryBody {
            primitive: None,
            positions,
            normals: outputs.remove("NORMAL"),
            uv: outputs.remove("TEXCOORD0"),
            uv2: outputs.remove("TEXCOORD1"),
            indices: assembly.indices,
        }));
        leaf.info = self.info_tag("geometry");
        self.builder.add_leaf(leaf);

        if material.is_some() {
            self.builder.close();
        }
        if bounded {
            self.builder.close();
        }
        Ok(())
    }

    /// Translate an `<instance_geometry>` reference.
    ///
    /// Material bindings declared on the instance become a configs wrapper
    /// that maps each abstract symbol name to a concrete material symbol,
    /// feeding the symbolic instance inside the geometry symbol.
    pub(super) fn parse_instance_geometry(&mut self, instance: &'a Element) -> ParseResult<()> {
        let mut symbol_map: IndexMap<String, String> = IndexMap::new();
        for binding in dom::descendants(instance, "instance_material") {
            let symbol = dom::attr(binding, "symbol").ok_or_else(|| {
                ParseError::MalformedStructure("instance_material/@symbol".to_string())
            })?;
            let target = dom::attr(binding, "target").ok_or_else(|| {
                ParseError::MalformedStructure("instance_material/@target".to_string())
            })?;
            if let Some(target) = self.make_target(dom::local_ref(target)) {
                symbol_map.insert(symbol.to_string(), target);
            }
        }

        let bound = !symbol_map.is_empty();
        if bound {
            let mut configs = IndexMap::new();
            configs.insert("*".to_string(), symbol_map);
            self.builder
                .open(SceneNode::new("withConfigs").with_body(NodeBody::WithConfigs { configs }));
        }

        let url = dom::attr(instance, "url").ok_or_else(|| {
            ParseError::MalformedStructure("instance_geometry/@url".to_string())
        })?;
        let mut leaf = SceneNode::new("instance").with_body(NodeBody::Instance(InstanceBody {
            target: self.make_target(dom::local_ref(url)).map(InstanceTarget::Id),
            must_exist: Some(true),
        }));
        leaf.info = self.info_tag("instance_geometry");
        self.builder.add_leaf(leaf);

        if bound {
            self.builder.close();
        }
        Ok(())
    }

    /// Resolve a face group's inputs into slotted bindings.
    fn build_bindings(&mut self, inputs: &[&'a Element]) -> ParseResult<Vec<InputBinding>> {
        let has_explicit_normals = inputs
            .iter()
            .any(|input| dom::attr(input, "semantic") == Some("NORMAL"));

        let mut bindings = Vec::new();
        for input in inputs {
            let semantic = dom::attr(input, "semantic")
                .ok_or_else(|| ParseError::MalformedStructure("input/@semantic".to_string()))?;
            let url = dom::attr(input, "source")
                .ok_or_else(|| ParseError::MalformedStructure("input/@source".to_string()))?;
            let id = dom::local_ref(url);
            let offset = dom::attr(input, "offset")
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(0);

            let (source, companion) = if semantic == "VERTEX" {
                let primary =
                    source::resolve(&self.ids, &mut self.sources, id, SourceSlot::Primary)?;
                let companion = if !has_explicit_normals && self.vertices_supply_normals(id) {
                    Some(source::resolve(
                        &self.ids,
                        &mut self.sources,
                        id,
                        SourceSlot::Secondary,
                    )?)
                } else {
                    None
                };
                (primary, companion)
            } else {
                (
                    source::resolve(&self.ids, &mut self.sources, id, SourceSlot::Primary)?,
                    None,
                )
            };

            let group = if semantic == "TEXCOORD" {
                format!("TEXCOORD{}", dom::attr(input, "set").unwrap_or("0"))
            } else {
                semantic.to_string()
            };

            bindings.push(InputBinding {
                group,
                offset,
                source,
                companion,
            });
        }

        Ok(bindings)
    }

    /// Whether the referenced vertices element carries a second input,
    /// typically normals, that can ride along with the positions.
    fn vertices_supply_normals(&self, id: &str) -> bool {
        self.ids
            .lookup(id)
            .map_or(false, |element| {
                element.name == "vertices" && dom::descendants(element, "input").len() > 1
            })
    }
}
