//! Output scene-graph node model.
//!
//! This module defines the normalized tree the translation engine emits.
//! Every node carries a type tag, optional identifiers and annotations,
//! and a type-specific payload; serialization reproduces the scene-graph
//! JSON wire shape exactly (absent fields are omitted, never null).

use glam::Vec3;
use indexmap::IndexMap;
use serde::Serialize;

/// A typed node of the output tree.
#[derive(Clone, Debug, Serialize)]
pub struct SceneNode {
    /// Node type tag, e.g. "node", "library", "geometry", "translate".
    #[serde(rename = "type")]
    pub kind: String,

    /// Namespaced identifier, when the source element declared one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Scoped identifier (sid), when declared or synthesized.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,

    /// Type-specific payload, flattened into the node object.
    #[serde(flatten)]
    pub body: Option<NodeBody>,

    /// Short provenance tag, only present when the `info` option is on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<Extra>,

    /// Child nodes in emission order.
    #[serde(rename = "nodes", skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<SceneNode>,
}

impl SceneNode {
    /// Create a node with the given type tag and no payload.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: None,
            sid: None,
            body: None,
            info: None,
            extra: None,
            children: Vec::new(),
        }
    }

    /// Create an anonymous grouping node (`type: "node"`).
    pub fn group() -> Self {
        Self::new("node")
    }

    /// Create a library wrapper node.
    pub fn library() -> Self {
        Self::new("library")
    }

    pub fn with_id(mut self, id: Option<String>) -> Self {
        self.id = id;
        self
    }

    pub fn with_sid(mut self, sid: Option<String>) -> Self {
        self.sid = sid;
        self
    }

    pub fn with_body(mut self, body: NodeBody) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_extra(mut self, extra: Extra) -> Self {
        self.extra = Some(extra);
        self
    }
}

/// Provenance annotations attached under `extra`.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Extra {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub collada: Option<ColladaExtra>,
}

/// Marker block identifying the selector instance at the subgraph root.
#[derive(Clone, Debug, Serialize)]
pub struct ColladaExtra {
    #[serde(rename = "isRoot")]
    pub is_root: bool,
}

/// A named 3-component vector, serialized as `{x, y, z}`.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct Xyz {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Xyz {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// An RGB color, serialized as `{r, g, b}`.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

/// An RGBA color, serialized as `{r, g, b, a}`.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct Rgba {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

/// Type-specific node payload, flattened into the node object on
/// serialization.
#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum NodeBody {
    Geometry(GeometryBody),
    Translate {
        x: f32,
        y: f32,
        z: f32,
    },
    Scale {
        x: f32,
        y: f32,
        z: f32,
    },
    Rotate {
        x: f32,
        y: f32,
        z: f32,
        angle: f32,
    },
    Matrix {
        elements: Vec<f32>,
    },
    LookAt {
        eye: Xyz,
        look: Xyz,
        up: Xyz,
    },
    Camera {
        optics: Optics,
    },
    Light(LightBody),
    Material(MaterialBody),
    Texture {
        layers: Vec<TextureLayer>,
    },
    Instance(InstanceBody),
    WithConfigs {
        configs: IndexMap<String, IndexMap<String, String>>,
    },
    BoundingBox {
        boundary: Extents,
    },
}

/// Expanded per-vertex buffers of one geometry.
#[derive(Clone, Debug, Serialize)]
pub struct GeometryBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primitive: Option<String>,

    pub positions: Vec<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub normals: Option<Vec<f32>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub uv: Option<Vec<f32>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub uv2: Option<Vec<f32>>,

    pub indices: Vec<u32>,
}

/// Perspective camera parameters.
#[derive(Clone, Debug, Serialize)]
pub struct Optics {
    #[serde(rename = "type")]
    pub kind: String,
    pub fovy: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

/// Light parameters; field presence depends on the light mode.
#[derive(Clone, Debug, Serialize)]
pub struct LightBody {
    pub mode: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<Xyz>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pos: Option<Xyz>,

    pub color: Rgb,

    #[serde(
        rename = "constantAttenuation",
        skip_serializing_if = "Option::is_none"
    )]
    pub constant_attenuation: Option<f32>,

    #[serde(rename = "linearAttenuation", skip_serializing_if = "Option::is_none")]
    pub linear_attenuation: Option<f32>,

    #[serde(
        rename = "quadraticAttenuation",
        skip_serializing_if = "Option::is_none"
    )]
    pub quadratic_attenuation: Option<f32>,

    #[serde(rename = "falloffAngle", skip_serializing_if = "Option::is_none")]
    pub falloff_angle: Option<f32>,

    #[serde(rename = "falloffExponent", skip_serializing_if = "Option::is_none")]
    pub falloff_exponent: Option<f32>,
}

/// Surface material parameters extracted from an effect.
#[derive(Clone, Debug, Serialize)]
pub struct MaterialBody {
    #[serde(rename = "baseColor", skip_serializing_if = "Option::is_none")]
    pub base_color: Option<Rgb>,

    #[serde(rename = "specularColor", skip_serializing_if = "Option::is_none")]
    pub specular_color: Option<Rgba>,

    pub shine: f32,
    pub specular: f32,
}

/// One texture layer of a material.
#[derive(Clone, Debug, Serialize)]
pub struct TextureLayer {
    pub uri: String,

    #[serde(rename = "applyTo")]
    pub apply_to: String,

    #[serde(rename = "flipY")]
    pub flip_y: bool,

    #[serde(rename = "blendMode")]
    pub blend_mode: String,

    #[serde(rename = "wrapS")]
    pub wrap_s: String,

    #[serde(rename = "wrapT")]
    pub wrap_t: String,

    #[serde(rename = "minFilter")]
    pub min_filter: String,

    #[serde(rename = "magFilter")]
    pub mag_filter: String,
}

/// Reference to another node in the output graph.
#[derive(Clone, Debug, Serialize)]
pub struct InstanceBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<InstanceTarget>,

    #[serde(rename = "mustExist", skip_serializing_if = "Option::is_none")]
    pub must_exist: Option<bool>,
}

/// An instance target is either a resolved identifier or a symbolic name
/// bound when the geometry is instanced.
#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum InstanceTarget {
    Id(String),
    Symbolic { name: String },
}

/// Axis-aligned bounding extents, expanded per emitted position triple.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct Extents {
    pub xmin: f32,
    pub ymin: f32,
    pub zmin: f32,
    pub xmax: f32,
    pub ymax: f32,
    pub zmax: f32,
}

const HUGE: f32 = 9_999_999.0;

impl Default for Extents {
    fn default() -> Self {
        Self {
            xmin: HUGE,
            ymin: HUGE,
            zmin: HUGE,
            xmax: -HUGE,
            ymax: -HUGE,
            zmax: -HUGE,
        }
    }
}

impl Extents {
    /// Expand by every complete position triple in a flat buffer.
    pub fn expand_by_positions(&mut self, positions: &[f32]) {
        let mut min = Vec3::new(self.xmin, self.ymin, self.zmin);
        let mut max = Vec3::new(self.xmax, self.ymax, self.zmax);

        for triple in positions.chunks_exact(3) {
            let point = Vec3::new(triple[0], triple[1], triple[2]);
            min = min.min(point);
            max = max.max(point);
        }

        self.xmin = min.x;
        self.ymin = min.y;
        self.zmin = min.z;
        self.xmax = max.x;
        self.ymax = max.y;
        self.zmax = max.z;
    }
}
