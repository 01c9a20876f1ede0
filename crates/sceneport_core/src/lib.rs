//! Sceneport Core - translation of 3D asset documents into a normalized
//! scene-graph form.
//!
//! This crate provides:
//!
//! - **COLLADA front-end**: translates a parsed `.dae` document into a
//!   scene-graph subgraph with symbol libraries, flat vertex buffers, and
//!   a manifest of instantiable symbols
//! - **Wavefront front-end**: translates `.obj` text into the same form
//! - **Scene model**: the typed output tree and its JSON wire shape
//!
//! # Example
//!
//! ```ignore
//! use sceneport_core::collada::{parse_document, ParseParams};
//!
//! let doc = xmltree::Element::parse(bytes.as_slice())?;
//! let params = ParseParams {
//!     source_url: "models/duck.dae".to_string(),
//!     base_id: "duck".to_string(),
//!     options: Default::default(),
//! };
//! let parsed = parse_document(&params, &doc)?;
//! println!("{}", serde_json::to_string_pretty(&parsed.root)?);
//! ```

pub mod asset;
pub mod builder;
pub mod collada;
pub mod dom;
pub mod scene;
pub mod wavefront;

use serde::Serialize;

// Re-export commonly used types
pub use asset::{Asset, Manifest};
pub use builder::SceneGraphBuilder;
pub use collada::{parse_document, ParseError, ParseOptions, ParseParams};
pub use scene::SceneNode;
pub use wavefront::parse_obj;

/// The complete result of one translation: the scene-graph subgraph plus
/// the asset metadata and content manifest describing it.
#[derive(Clone, Debug, Serialize)]
pub struct ParsedAsset {
    #[serde(rename = "rootNode")]
    pub root: SceneNode,
    pub asset: Asset,
    pub manifest: Manifest,
}
