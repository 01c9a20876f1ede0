//! Asset metadata and the content manifest delivered alongside the tree.

use indexmap::IndexMap;
use serde::Serialize;

/// Metadata about the source resource.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Asset {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub contributor: Option<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// Manifest of instantiable symbols and external attachments.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Manifest {
    pub symbols: Symbols,

    /// Image files referenced by textures, in encounter order. Useful for
    /// a client that wants to fetch the images alongside the scene.
    pub attachments: Vec<String>,
}

/// Symbols available for instantiation in the output subgraph.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Symbols {
    /// One entry per visual scene, keyed by its declared identifier.
    pub scenes: IndexMap<String, SceneSymbol>,

    /// Symbol instantiated when the client selects none explicitly.
    #[serde(rename = "defaultSymbol", skip_serializing_if = "Option::is_none")]
    pub default_symbol: Option<SymbolRecord>,
}

/// A visual-scene symbol and the camera views it offers.
#[derive(Clone, Debug, Serialize)]
pub struct SceneSymbol {
    pub description: String,
    pub id: String,
    pub cameras: IndexMap<String, SymbolRecord>,
}

/// Reference to one instantiable symbol.
#[derive(Clone, Debug, Serialize)]
pub struct SymbolRecord {
    pub description: String,
    pub id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_asset_serializes_to_empty_object() {
        let json = serde_json::to_value(Asset::default()).unwrap();
        assert_eq!(json, serde_json::json!({}));
    }

    #[test]
    fn test_manifest_shape() {
        let mut manifest = Manifest::default();
        manifest.attachments.push("stone.jpg".to_string());
        manifest.symbols.default_symbol = Some(SymbolRecord {
            description: "scene - scene graph base".to_string(),
            id: "base.scene".to_string(),
        });

        let json = serde_json::to_value(&manifest).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "symbols": {
                    "scenes": {},
                    "defaultSymbol": {
                        "description": "scene - scene graph base",
                        "id": "base.scene",
                    },
                },
                "attachments": ["stone.jpg"],
            })
        );
    }
}
