//! Read-only helpers over the parsed XML document tree.
//!
//! The engine never mutates the document; everything here borrows from an
//! `xmltree::Element` owned by the caller. Search helpers follow DOM
//! `getElementsByTagName` semantics: they walk all descendants in document
//! order, not just direct children.

use xmltree::{Element, XMLNode};

/// Get an attribute value, treating an empty string as absent.
pub fn attr<'a>(element: &'a Element, name: &str) -> Option<&'a str> {
    match element.attributes.get(name) {
        Some(value) if !value.is_empty() => Some(value.as_str()),
        _ => None,
    }
}

/// Iterate the direct child elements of `element`.
pub fn child_elements(element: &Element) -> impl Iterator<Item = &Element> {
    element.children.iter().filter_map(|node| match node {
        XMLNode::Element(child) => Some(child),
        _ => None,
    })
}

/// Collect every descendant element with the given tag name, in document
/// order. The element itself is not included.
pub fn descendants<'a>(element: &'a Element, tag: &str) -> Vec<&'a Element> {
    let mut found = Vec::new();
    collect_descendants(element, tag, &mut found);
    found
}

fn collect_descendants<'a>(element: &'a Element, tag: &str, found: &mut Vec<&'a Element>) {
    for child in child_elements(element) {
        if child.name == tag {
            found.push(child);
        }
        collect_descendants(child, tag, found);
    }
}

/// First descendant with the given tag name, if any.
pub fn first_descendant<'a>(element: &'a Element, tag: &str) -> Option<&'a Element> {
    for child in child_elements(element) {
        if child.name == tag {
            return Some(child);
        }
        if let Some(found) = first_descendant(child, tag) {
            return Some(found);
        }
    }
    None
}

/// Collect every element in the tree, root included, in document order.
pub fn all_elements(root: &Element) -> Vec<&Element> {
    let mut found = vec![root];
    collect_all(root, &mut found);
    found
}

fn collect_all<'a>(element: &'a Element, found: &mut Vec<&'a Element>) {
    for child in child_elements(element) {
        found.push(child);
        collect_all(child, found);
    }
}

/// Strip the leading `#` from a URL fragment reference, yielding the bare
/// identifier it points at. Same-document references are the only kind the
/// format uses.
pub fn local_ref(url: &str) -> &str {
    url.strip_prefix('#').unwrap_or(url)
}

/// Concatenated text content of the element's direct text fragments.
pub fn text_content(element: &Element) -> String {
    let mut out = String::new();
    for node in &element.children {
        match node {
            XMLNode::Text(text) | XMLNode::CData(text) => out.push_str(text),
            _ => {}
        }
    }
    out
}

/// Parse the element's leading text token as a float.
pub fn text_float(element: &Element) -> Option<f32> {
    text_content(element)
        .split_whitespace()
        .next()?
        .parse()
        .ok()
}

/// Parse whitespace-delimited floats from the element's text content.
///
/// Large numeric arrays may arrive split across several sibling text
/// fragments, sometimes in the middle of a digit sequence, so a partial
/// trailing token is carried over to the next fragment whenever the
/// current one does not end in whitespace. Tokens that fail to parse
/// become NaN; the engine never aborts on a bad number.
pub fn parse_float_array(element: &Element) -> Vec<f32> {
    let mut values = Vec::new();
    let mut pending = String::new();

    let fragments: Vec<&str> = element
        .children
        .iter()
        .filter_map(|node| match node {
            XMLNode::Text(text) | XMLNode::CData(text) => Some(text.as_str()),
            _ => None,
        })
        .collect();

    for (i, fragment) in fragments.iter().enumerate() {
        let combined = format!("{pending}{fragment}");
        pending.clear();

        let mut tokens: Vec<&str> = combined.split_whitespace().collect();

        // A fragment boundary can split a token in two; hold the tail back
        // unless the fragment visibly ended at a whitespace break.
        let more_to_come = i + 1 < fragments.len();
        if more_to_come && !combined.ends_with(char::is_whitespace) {
            if let Some(tail) = tokens.pop() {
                pending.push_str(tail);
            }
        }

        for token in tokens {
            values.push(token.parse::<f32>().unwrap_or(f32::NAN));
        }
    }

    values
}

/// Parse the element's text content as unsigned indices.
///
/// Uses the same permissive tokenizer as [`parse_float_array`]; anything
/// non-numeric collapses to index 0.
pub fn parse_index_array(element: &Element) -> Vec<u32> {
    parse_float_array(element).iter().map(|v| *v as u32).collect()
}
