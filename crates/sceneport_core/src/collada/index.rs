//! One-time index of declared element identifiers.

use std::collections::HashMap;

use xmltree::Element;

use crate::collada::error::{ParseError, ParseResult};
use crate::dom;

/// Maps every declared `id` attribute to its element.
///
/// Built once per parse session by scanning all elements in reverse
/// document order, so when two elements share an identifier the one
/// earliest in document order wins. That precedence is deliberate but
/// implementation-defined, not a documented guarantee of the format.
#[derive(Debug)]
pub struct IdIndex<'a> {
    map: HashMap<&'a str, &'a Element>,
}

impl<'a> IdIndex<'a> {
    /// Scan the whole document. Infallible: the borrowed root element
    /// guarantees at least one element exists, so the degenerate
    /// "no elements" input cannot be represented here.
    pub fn build(doc: &'a Element) -> Self {
        let mut map = HashMap::new();
        for element in dom::all_elements(doc).into_iter().rev() {
            if let Some(id) = dom::attr(element, "id") {
                map.insert(id, element);
            }
        }
        log::debug!("indexed {} element ids", map.len());
        Self { map }
    }

    /// Look up a declared identifier.
    pub fn lookup(&self, id: &str) -> Option<&'a Element> {
        self.map.get(id).copied()
    }

    /// Look up a declared identifier, failing if it is absent.
    pub fn get(&self, id: &str) -> ParseResult<&'a Element> {
        self.lookup(id)
            .ok_or_else(|| ParseError::MissingReference(id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
