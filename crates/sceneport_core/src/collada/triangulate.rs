//! Face-group collection and polygon triangulation.
//!
//! `<triangles>` index streams pass through untouched. `<polylist>`
//! streams are fan-triangulated: each polygon of v vertices becomes v - 2
//! triangles anchored at its first vertex, with every vertex's full
//! multi-field index tuple copied along.

use xmltree::Element;

use crate::collada::error::{ParseError, ParseResult};
use crate::dom;

/// One face group of a mesh, with its index stream already reduced to
/// triangles. `element` is the source `<triangles>` or `<polylist>`
/// element, kept for its input bindings and material attribute.
#[derive(Debug)]
pub struct FaceGroup<'a> {
    pub element: &'a Element,
    pub indices: Vec<u32>,
}

/// Collect every face group under a `<mesh>` element. Polylists come
/// first, then triangles, matching emission order.
pub fn face_groups<'a>(mesh: &'a Element) -> ParseResult<Vec<FaceGroup<'a>>> {
    let mut groups = Vec::new();

    for polylist in dom::descendants(mesh, "polylist") {
        groups.push(FaceGroup {
            element: polylist,
            indices: triangulate_polylist(polylist)?,
        });
    }

    for triangles in dom::descendants(mesh, "triangles") {
        let p = dom::first_descendant(triangles, "p")
            .ok_or_else(|| ParseError::MalformedStructure("triangles/p".to_string()))?;
        groups.push(FaceGroup {
            element: triangles,
            indices: dom::parse_index_array(p),
        });
    }

    Ok(groups)
}

fn triangulate_polylist(polylist: &Element) -> ParseResult<Vec<u32>> {
    let inputs = dom::descendants(polylist, "input");
    let fields_per_vertex = max_offset(&inputs) + 1;

    let vcount = dom::first_descendant(polylist, "vcount")
        .ok_or_else(|| ParseError::MalformedStructure("polylist/vcount".to_string()))?;
    let p = dom::first_descendant(polylist, "p")
        .ok_or_else(|| ParseError::MalformedStructure("polylist/p".to_string()))?;

    Ok(fan_triangulate(
        &dom::parse_index_array(vcount),
        &dom::parse_index_array(p),
        fields_per_vertex,
    ))
}

/// Highest `offset` attribute across a face group's inputs. The index
/// stream interleaves one field per distinct offset, so the tuple width
/// per vertex is this plus one.
pub fn max_offset(inputs: &[&Element]) -> usize {
    inputs
        .iter()
        .filter_map(|input| dom::attr(input, "offset").and_then(|v| v.parse::<usize>().ok()))
        .max()
        .unwrap_or(0)
}

/// Fan-triangulate a polylist index stream.
///
/// `raw` holds `fields_per_vertex` indices per vertex; `vcounts` gives the
/// vertex count of each successive polygon. Indices reaching past the end
/// of the stream read as 0.
pub fn fan_triangulate(vcounts: &[u32], raw: &[u32], fields_per_vertex: usize) -> Vec<u32> {
    let field = |at: usize| raw.get(at).copied().unwrap_or(0);

    let mut triangles = Vec::new();
    let mut base = 0usize;

    for &vcount in vcounts {
        let vcount = vcount as usize;
        for j in 0..vcount.saturating_sub(2) {
            for k in 0..fields_per_vertex {
                triangles.push(field(base + k));
            }
            for k in 0..fields_per_vertex {
                triangles.push(field(base + fields_per_vertex * (j + 1) + k));
            }
            for k in 0..fields_per_vertex {
                triangles.push(field(base + fields_per_vertex * (j + 2) + k));
            }
        }
        base += fields_per_vertex * vcount;
    }

    triangles
}
