//! Resolution of vertex-attribute sources.
//!
//! A face group's `<input>` bindings reference sources by URL. A reference
//! may point directly at a `<source>` element, or at a `<vertices>`
//! element that in turn redirects to one of its own inputs. Resolution
//! follows that indirection, decodes the accessor layout, and memoizes the
//! result so each source is decoded once per parse session.

use std::collections::HashMap;
use std::rc::Rc;

use xmltree::Element;

use crate::collada::error::{ParseError, ParseResult};
use crate::collada::index::IdIndex;
use crate::dom;

/// Which of a vertices element's inputs an indirect reference selects.
///
/// `Primary` is the positions input; `Secondary` is the second input,
/// resolved only when a face group relies on the vertices element for
/// normals it does not bind explicitly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SourceSlot {
    Primary,
    Secondary,
}

impl SourceSlot {
    fn input_index(self) -> usize {
        match self {
            SourceSlot::Primary => 0,
            SourceSlot::Secondary => 1,
        }
    }
}

/// One accessor field declaration: a named `<param>` and its type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParamField {
    pub name: String,
    pub ty: String,
}

/// A decoded vertex-attribute source: the backing value array plus the
/// accessor layout that addresses it.
#[derive(Clone, Debug, PartialEq)]
pub struct AttributeSource {
    pub values: Vec<f32>,
    pub stride: usize,
    pub offset: usize,
    pub count: usize,

    /// One entry per `<param>` under the accessor; `None` marks an unnamed
    /// param, whose field is skipped during assembly without disturbing
    /// the positions of the fields around it.
    pub field_mask: Vec<Option<ParamField>>,
}

impl AttributeSource {
    /// Value of one field of the element at `index`. Reads past the end of
    /// the backing array yield NaN rather than failing.
    pub fn value_at(&self, index: usize, field: usize) -> f32 {
        self.values
            .get(index * self.stride + field + self.offset)
            .copied()
            .unwrap_or(f32::NAN)
    }
}

/// Per-session memo of resolved sources, keyed by identifier and slot.
#[derive(Debug, Default)]
pub struct SourceCache {
    entries: HashMap<(String, SourceSlot), Rc<AttributeSource>>,
}

impl SourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn get(&self, id: &str, slot: SourceSlot) -> Option<Rc<AttributeSource>> {
        self.entries.get(&(id.to_string(), slot)).cloned()
    }

    fn insert(&mut self, id: &str, slot: SourceSlot, source: Rc<AttributeSource>) {
        self.entries.insert((id.to_string(), slot), source);
    }
}

/// Resolve `id` to a decoded source, following `<vertices>` indirection
/// and memoizing under every identifier traversed.
pub fn resolve(
    ids: &IdIndex<'_>,
    cache: &mut SourceCache,
    id: &str,
    slot: SourceSlot,
) -> ParseResult<Rc<AttributeSource>> {
    if let Some(hit) = cache.get(id, slot) {
        return Ok(hit);
    }

    let element = ids.get(id)?;
    let source = if element.name == "vertices" {
        let inputs = dom::descendants(element, "input");
        let input = inputs.get(slot.input_index()).ok_or_else(|| {
            ParseError::MalformedStructure(format!(
                "vertices[id == '{id}']/input[{}]",
                slot.input_index()
            ))
        })?;
        let url = dom::attr(input, "source").ok_or_else(|| {
            ParseError::MalformedStructure(format!("vertices[id == '{id}']/input/@source"))
        })?;
        // The selected input always resolves as a direct source reference.
        resolve(ids, cache, dom::local_ref(url), SourceSlot::Primary)?
    } else {
        Rc::new(decode_source(ids, element, id)?)
    };

    cache.insert(id, slot, Rc::clone(&source));
    Ok(source)
}

/// Decode a `<source>` element's accessor layout and backing array.
fn decode_source(
    ids: &IdIndex<'_>,
    element: &Element,
    id: &str,
) -> ParseResult<AttributeSource> {
    let technique = dom::first_descendant(element, "technique_common").ok_or_else(|| {
        ParseError::MalformedStructure(format!("source[id == '{id}']/technique_common"))
    })?;
    let accessor = dom::first_descendant(technique, "accessor").ok_or_else(|| {
        ParseError::MalformedStructure(format!(
            "source[id == '{id}']/technique_common/accessor"
        ))
    })?;
    let array_url = dom::attr(accessor, "source").ok_or_else(|| {
        ParseError::MalformedStructure(format!(
            "source[id == '{id}']/technique_common/accessor/@source"
        ))
    })?;

    let array = ids.get(dom::local_ref(array_url))?;
    let values = dom::parse_float_array(array);

    // A missing or zero stride falls back to 1.
    let stride = dom::attr(accessor, "stride")
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|v| *v != 0)
        .unwrap_or(1);
    let offset = dom::attr(accessor, "offset")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(0);
    let count = dom::attr(accessor, "count")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(0);

    let field_mask = dom::descendants(accessor, "param")
        .iter()
        .map(|param| {
            dom::attr(param, "name").map(|name| ParamField {
                name: name.to_string(),
                ty: dom::attr(param, "type").unwrap_or("").to_string(),
            })
        })
        .collect();

    log::trace!("decoded source '{id}': {} values, stride {stride}", values.len());

    Ok(AttributeSource {
        values,
        stride,
        offset,
        count,
        field_mask,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MESH_DOC: &str = r##"
        <mesh>
            <source id="positions">
                <float_array id="positions-array" count="9">
                    0 0 0  1 0 0  0 1 0
                </float_array>
                <technique_common>
                    <accessor source="#positions-array" count="3" stride="3">
                        <param name="X" type="float"/>
                        <param name="Y" type="float"/>
                        <param name="Z" type="float"/>
                    </accessor>
                </technique_common>
            </source>
            <source id="normals">
                <float_array id="normals-array" count="9">
                    0 0 1  0 0 1  0 0 1
                </float_array>
                <technique_common>
                    <accessor source="#normals-array" count="3" stride="3">
                        <param name="X" type="float"/>
                        <param name="Y" type="float"/>
                        <param name="Z" type="float"/>
                    </accessor>
                </technique_common>
            </source>
            <vertices id="verts">
                <input semantic="POSITION" source="#positions"/>
                <input semantic="NORMAL" source="#normals"/>
            </vertices>
        </mesh>
    "##;

    fn parse(doc: &str) -> Element {
        Element::parse(doc.as_bytes()).unwrap()
    }

    #[test]
    fn test_direct_source_resolution() {
        let doc = parse(MESH_DOC);
        let ids = IdIndex::build(&doc);
        let mut cache = SourceCache::new();

        let source = resolve(&ids, &mut cache, "positions", SourceSlot::Primary).unwrap();
        assert_eq!(source.stride, 3);
        assert_eq!(source.offset, 0);
        assert_eq!(source.count, 3);
        assert_eq!(source.values.len(), 9);
        assert_eq!(source.field_mask.len(), 3);
        assert_eq!(source.field_mask[0].as_ref().unwrap().name, "X");
    }

    #[test]
    fn test_vertices_indirection_selects_slot() {
        let doc = parse(MESH_DOC);
        let ids = IdIndex::build(&doc);
        let mut cache = SourceCache::new();

        let primary = resolve(&ids, &mut cache, "verts", SourceSlot::Primary).unwrap();
        assert_eq!(primary.values[3..6], [1.0, 0.0, 0.0]);

        let secondary = resolve(&ids, &mut cache, "verts", SourceSlot::Secondary).unwrap();
        assert_eq!(secondary.values[0..3], [0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_resolution_is_memoized() {
        let doc = parse(MESH_DOC);
        let ids = IdIndex::build(&doc);
        let mut cache = SourceCache::new();

        let first = resolve(&ids, &mut cache, "verts", SourceSlot::Primary).unwrap();
        let second = resolve(&ids, &mut cache, "verts", SourceSlot::Primary).unwrap();
        // Both the vertices id and the underlying source id share the memo.
        let direct = resolve(&ids, &mut cache, "positions", SourceSlot::Primary).unwrap();

        assert!(Rc::ptr_eq(&first, &second));
        assert!(Rc::ptr_eq(&first, &direct));
    }

    #[test]
    fn test_missing_secondary_input_is_structural_error() {
        let doc = parse(
            r##"
            <mesh>
                <source id="positions">
                    <float_array id="arr">0 0 0</float_array>
                    <technique_common>
                        <accessor source="#arr" count="1" stride="3">
                            <param name="X" type="float"/>
                            <param name="Y" type="float"/>
                            <param name="Z" type="float"/>
                        </accessor>
                    </technique_common>
                </source>
                <vertices id="verts">
                    <input semantic="POSITION" source="#positions"/>
                </vertices>
            </mesh>
            "##,
        );
        let ids = IdIndex::build(&doc);
        let mut cache = SourceCache::new();

        let err = resolve(&ids, &mut cache, "verts", SourceSlot::Secondary).unwrap_err();
        assert!(matches!(err, ParseError::MalformedStructure(_)));
    }

    #[test]
    fn test_unresolved_reference() {
        let doc = parse(MESH_DOC);
        let ids = IdIndex::build(&doc);
        let mut cache = SourceCache::new();

        let err = resolve(&ids, &mut cache, "no-such-source", SourceSlot::Primary).unwrap_err();
        assert!(matches!(err, ParseError::MissingReference(_)));
    }

    #[test]
    fn test_unnamed_param_masks_field_out() {
        let doc = parse(
            r##"
            <mesh>
                <source id="uvs">
                    <float_array id="uvs-array">0.5 0.5 9.0</float_array>
                    <technique_common>
                        <accessor source="#uvs-array" count="1" stride="3">
                            <param name="S" type="float"/>
                            <param name="T" type="float"/>
                            <param type="float"/>
                        </accessor>
                    </technique_common>
                </source>
            </mesh>
            "##,
        );
        let ids = IdIndex::build(&doc);
        let mut cache = SourceCache::new();

        let source = resolve(&ids, &mut cache, "uvs", SourceSlot::Primary).unwrap();
        assert!(source.field_mask[0].is_some());
        assert!(source.field_mask[1].is_some());
        assert!(source.field_mask[2].is_none());
    }

    #[test]
    fn test_out_of_range_read_yields_nan() {
        let doc = parse(MESH_DOC);
        let ids = IdIndex::build(&doc);
        let mut cache = SourceCache::new();

        let source = resolve(&ids, &mut cache, "positions", SourceSlot::Primary).unwrap();
        assert!(source.value_at(5, 0).is_nan());
    }
}
