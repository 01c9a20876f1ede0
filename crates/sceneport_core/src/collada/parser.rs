//! Per-document parse session and library orchestration.
//!
//! A [`ColladaParser`] owns all state for one translation: the identifier
//! index, the source memo, the output tree builder, and the asset and
//! manifest records. Sessions are single-use; every parse builds a fresh
//! one, so no state leaks between documents.

use xmltree::Element;

use crate::asset::{Asset, Manifest, SceneSymbol, SymbolRecord};
use crate::builder::SceneGraphBuilder;
use crate::collada::error::{ParseError, ParseResult};
use crate::collada::index::IdIndex;
use crate::collada::source::SourceCache;
use crate::collada::transform::{TransformKind, TransformStack};
use crate::collada::{ParseOptions, ParseParams};
use crate::dom;
use crate::scene::{
    ColladaExtra, Extra, InstanceBody, InstanceTarget, LightBody, NodeBody, Optics, Rgb,
    SceneNode,
};
use crate::ParsedAsset;

/// All state for one document translation.
pub(super) struct ColladaParser<'a> {
    pub(super) doc: &'a Element,
    pub(super) uri: String,
    pub(super) base_id: String,
    pub(super) options: ParseOptions,

    /// Directory the document was fetched from; texture attachments are
    /// expected to live alongside it.
    pub(super) images_dir: String,

    pub(super) ids: IdIndex<'a>,
    pub(super) sources: SourceCache,
    pub(super) builder: SceneGraphBuilder,
    pub(super) asset: Asset,
    pub(super) manifest: Manifest,
    next_sid: u32,
}

/// Classification of a `<node>` child element.
enum NodeChild {
    Transform(TransformKind),
    Node,
    InstanceNode,
    InstanceVisualScene,
    InstanceGeometry,
    InstanceCamera,
    InstanceLight,
    Other,
}

impl NodeChild {
    fn from_tag(tag: &str) -> Self {
        match tag {
            "matrix" => NodeChild::Transform(TransformKind::Matrix),
            "translate" => NodeChild::Transform(TransformKind::Translate),
            "rotate" => NodeChild::Transform(TransformKind::Rotate),
            "scale" => NodeChild::Transform(TransformKind::Scale),
            "lookat" => NodeChild::Transform(TransformKind::LookAt),
            "node" => NodeChild::Node,
            "instance_node" => NodeChild::InstanceNode,
            "instance_visual_scene" => NodeChild::InstanceVisualScene,
            "instance_geometry" => NodeChild::InstanceGeometry,
            "instance_camera" => NodeChild::InstanceCamera,
            "instance_light" => NodeChild::InstanceLight,
            _ => NodeChild::Other,
        }
    }
}

/// Camera and light references discovered by pre-scanning a subgraph.
#[derive(Default)]
struct SubgraphMeta {
    camera_id: Option<String>,
    light_id: Option<String>,
}

impl<'a> ColladaParser<'a> {
    pub(super) fn new(params: &ParseParams, doc: &'a Element) -> Self {
        let uri = params.source_url.clone();
        let images_dir = params
            .options
            .images_dir
            .clone()
            .unwrap_or_else(|| dirname(&uri));

        Self {
            doc,
            uri,
            base_id: params.base_id.clone(),
            options: params.options.clone(),
            images_dir,
            ids: IdIndex::build(doc),
            sources: SourceCache::new(),
            builder: SceneGraphBuilder::new(),
            asset: Asset::default(),
            manifest: Manifest::default(),
            next_sid: 0,
        }
    }

    /// Translate the whole document. Libraries are walked in dependency
    /// order: effects before the materials that instance them, geometries
    /// before the nodes that instance those, and so on up to the scene.
    pub(super) fn run(mut self) -> ParseResult<ParsedAsset> {
        log::debug!(
            "parsing COLLADA document '{}', attachments relative to '{}'",
            self.uri,
            self.images_dir
        );

        self.builder.open(SceneNode::group());
        self.add_info("asset_root");
        if !self.uri.is_empty() {
            self.add_comment(format!("Asset parsed from COLLADA resource at {}", self.uri));
        }

        self.parse_asset_metadata();

        self.parse_library("library_cameras", "camera", Self::parse_camera)?;
        self.parse_library("library_lights", "light", Self::parse_light)?;
        self.parse_library("library_effects", "effect", Self::parse_effect)?;
        self.parse_library("library_materials", "material", Self::parse_material)?;
        self.parse_library("library_geometries", "geometry", Self::parse_geometry)?;
        self.parse_library("library_nodes", "node", Self::parse_library_node)?;
        self.parse_visual_scenes()?;
        self.parse_scene()?;
        self.parse_symbol_selector()?;

        self.builder.close();

        Ok(ParsedAsset {
            root: self.builder.into_root(),
            asset: self.asset,
            manifest: self.manifest,
        })
    }

    // ------------------------------------------------------------------
    // Identifier namespacing and annotations
    // ------------------------------------------------------------------

    /// Prefix a declared identifier into the caller's namespace.
    pub(super) fn make_id(&self, id: Option<&str>) -> Option<String> {
        id.map(|id| format!("{}.{}", self.base_id, id))
    }

    /// Same namespacing applied to an instance target reference.
    pub(super) fn make_target(&self, target: &str) -> Option<String> {
        if target.is_empty() {
            None
        } else {
            Some(format!("{}.{}", self.base_id, target))
        }
    }

    /// Session-unique scoped identifier for transforms that declare none.
    pub(super) fn random_sid(&mut self) -> String {
        let sid = format!("sid{}", self.next_sid);
        self.next_sid += 1;
        sid
    }

    pub(super) fn add_info(&mut self, info: &str) {
        if self.options.info {
            self.builder.annotate_info(info);
        }
    }

    pub(super) fn add_comment(&mut self, comment: impl Into<String>) {
        if self.options.comments {
            self.builder.annotate_comment(comment);
        }
    }

    /// Info tag for nodes constructed in place rather than annotated.
    pub(super) fn info_tag(&self, info: &str) -> Option<String> {
        self.options.info.then(|| info.to_string())
    }

    fn comment_text(&self, comment: &str) -> Option<String> {
        self.options.comments.then(|| comment.to_string())
    }

    // ------------------------------------------------------------------
    // Asset metadata
    // ------------------------------------------------------------------

    /// Extract document metadata from the `<asset>` header, when present.
    fn parse_asset_metadata(&mut self) {
        let Some(asset) = dom::first_descendant(self.doc, "asset") else {
            return;
        };

        self.asset.title = dom::first_descendant(asset, "title")
            .map(|el| dom::text_content(el).trim().to_string())
            .filter(|s| !s.is_empty());
        self.asset.description = dom::first_descendant(asset, "subject")
            .map(|el| dom::text_content(el).trim().to_string())
            .filter(|s| !s.is_empty());
        self.asset.contributor = dom::first_descendant(asset, "contributor")
            .and_then(|el| dom::first_descendant(el, "author"))
            .map(|el| dom::text_content(el).trim().to_string())
            .filter(|s| !s.is_empty());
        self.asset.tags = dom::first_descendant(asset, "keywords")
            .map(|el| {
                dom::text_content(el)
                    .split_whitespace()
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
    }

    // ------------------------------------------------------------------
    // Libraries
    // ------------------------------------------------------------------

    /// Walk every `<library_xxx>` of one kind, wrapping the symbols it
    /// declares in a single library node. The wrapper is emitted even when
    /// the document has no library of that kind.
    fn parse_library(
        &mut self,
        library_tag: &str,
        symbol_tag: &str,
        parse_symbol: fn(&mut Self, &'a Element) -> ParseResult<()>,
    ) -> ParseResult<()> {
        self.builder.open(SceneNode::library());
        self.add_info(library_tag);
        self.add_comment(format!("Library of Symbols parsed from <{library_tag}>"));

        for library in dom::descendants(self.doc, library_tag) {
            for symbol in dom::descendants(library, symbol_tag) {
                parse_symbol(self, symbol)?;
            }
        }

        self.builder.close();
        Ok(())
    }

    fn parse_library_node(&mut self, node: &'a Element) -> ParseResult<()> {
        self.parse_node(node, "")
    }

    // ------------------------------------------------------------------
    // Cameras
    // ------------------------------------------------------------------

    fn parse_camera(&mut self, camera: &'a Element) -> ParseResult<()> {
        let optics = dom::first_descendant(camera, "optics")
            .ok_or_else(|| ParseError::MalformedStructure("camera/optics".to_string()))?;
        let technique = dom::first_descendant(optics, "technique_common").ok_or_else(|| {
            ParseError::MalformedStructure("camera/optics/technique_common".to_string())
        })?;

        if let Some(perspective) = dom::first_descendant(technique, "perspective") {
            let field = |tag: &str, fallback: f32| {
                dom::first_descendant(perspective, tag)
                    .and_then(dom::text_float)
                    .unwrap_or(fallback)
            };

            self.builder.open(
                SceneNode::new("camera")
                    .with_id(self.make_id(dom::attr(camera, "id")))
                    .with_body(NodeBody::Camera {
                        optics: Optics {
                            kind: "perspective".to_string(),
                            fovy: field("yfov", 60.0),
                            aspect: field("aspect_ratio", 1.0),
                            near: field("znear", 0.1),
                            far: field("zfar", 20000.0),
                        },
                    }),
            );
            self.add_info("camera");
            self.builder.close();
        } else if dom::first_descendant(technique, "orthographic").is_some() {
            // Orthographic parameters are not carried over.
            self.builder.add_leaf(SceneNode::new("camera"));
        }

        Ok(())
    }

    // ------------------------------------------------------------------
    // Lights
    // ------------------------------------------------------------------

    fn parse_light(&mut self, light: &'a Element) -> ParseResult<()> {
        let technique = dom::first_descendant(light, "technique_common").ok_or_else(|| {
            ParseError::MalformedStructure("light/technique_common".to_string())
        })?;
        let id = self.make_id(dom::attr(light, "id"));

        if let Some(directional) = dom::first_descendant(technique, "directional") {
            let body = LightBody {
                mode: "dir".to_string(),
                dir: Some(crate::scene::Xyz::new(0.0, 0.0, -1.0)),
                pos: None,
                color: self.required_color(directional, "directional")?,
                constant_attenuation: None,
                linear_attenuation: None,
                quadratic_attenuation: None,
                falloff_angle: None,
                falloff_exponent: None,
            };
            self.add_light_node(id.clone(), body);
        }

        if let Some(point) = dom::first_descendant(technique, "point") {
            let body = LightBody {
                mode: "point".to_string(),
                dir: None,
                pos: Some(crate::scene::Xyz::new(0.0, 0.0, 0.0)),
                color: self.required_color(point, "point")?,
                constant_attenuation: Some(child_float(point, "constant_attenuation", 1.0)),
                linear_attenuation: Some(child_float(point, "linear_attenuation", 0.0)),
                quadratic_attenuation: Some(child_float(point, "quadratic_attenuation", 0.0)),
                falloff_angle: None,
                falloff_exponent: None,
            };
            self.add_light_node(id.clone(), body);
        }

        if let Some(spot) = dom::first_descendant(technique, "spot") {
            let body = LightBody {
                mode: "spot".to_string(),
                dir: None,
                pos: None,
                color: self.required_color(spot, "spot")?,
                constant_attenuation: Some(child_float(spot, "constant_attenuation", 1.0)),
                linear_attenuation: Some(child_float(spot, "linear_attenuation", 0.0)),
                quadratic_attenuation: Some(child_float(spot, "quadratic_attenuation", 0.0)),
                falloff_angle: Some(child_float(spot, "falloff_angle", 180.0)),
                falloff_exponent: Some(child_float(spot, "falloff_exponent", 0.0)),
            };
            self.add_light_node(id, body);
        }

        Ok(())
    }

    fn add_light_node(&mut self, id: Option<String>, body: LightBody) {
        let mut node = SceneNode::new("light")
            .with_id(id)
            .with_body(NodeBody::Light(body));
        node.info = self.info_tag("light");
        self.builder.add_leaf(node);
    }

    fn required_color(&self, parent: &Element, mode: &str) -> ParseResult<Rgb> {
        let color = dom::first_descendant(parent, "color").ok_or_else(|| {
            ParseError::MalformedStructure(format!("light/technique_common/{mode}/color"))
        })?;
        Ok(parse_color(color))
    }

    // ------------------------------------------------------------------
    // Node hierarchies
    // ------------------------------------------------------------------

    /// Translate a `<node>` subgraph.
    ///
    /// Transform children accumulate on a stack and are opened as nesting
    /// wrappers the moment a structural child arrives, outermost last
    /// pushed. Transforms still pending when the node ends are opened
    /// then, so declared transform state is never dropped.
    pub(super) fn parse_node(
        &mut self,
        node: &'a Element,
        visual_scene_id: &str,
    ) -> ParseResult<()> {
        self.builder
            .open(SceneNode::group().with_id(self.make_id(dom::attr(node, "id"))));

        let mut transforms = TransformStack::new();

        for child in dom::child_elements(node) {
            let child_id = self.make_id(dom::attr(child, "id"));
            let child_sid = dom::attr(child, "sid").map(str::to_string);

            match NodeChild::from_tag(&child.name) {
                NodeChild::Transform(_) => transforms.push(child),

                NodeChild::Node => {
                    self.open_pending_transforms(&mut transforms);
                    self.parse_node(child, visual_scene_id)?;
                }

                NodeChild::InstanceNode => {
                    self.open_pending_transforms(&mut transforms);
                    let target = instance_url(child, "instance_node")?;
                    self.add_instance_leaf(child_id, child_sid, target, true, "instance_node");
                }

                NodeChild::InstanceVisualScene => {
                    self.open_pending_transforms(&mut transforms);
                    let target = instance_url(child, "instance_visual_scene")?;
                    self.add_instance_leaf(
                        child_id,
                        child_sid,
                        target,
                        true,
                        "instance_visual_scene",
                    );
                }

                NodeChild::InstanceGeometry => {
                    self.open_pending_transforms(&mut transforms);
                    self.parse_instance_geometry(child)?;
                }

                NodeChild::InstanceCamera => {
                    self.open_pending_transforms(&mut transforms);
                    let target = instance_url(child, "instance_camera")?;

                    // The camera instance wraps an instance of its visual
                    // scene, so instantiating the camera renders the scene
                    // through it.
                    self.builder.open(
                        SceneNode::new("instance")
                            .with_id(child_id.clone())
                            .with_sid(child_sid.clone())
                            .with_body(NodeBody::Instance(InstanceBody {
                                target: self.make_target(target).map(InstanceTarget::Id),
                                must_exist: None,
                            })),
                    );
                    self.add_info("instance_camera");

                    let mut inner = SceneNode::new("instance")
                        .with_id(child_id)
                        .with_sid(child_sid)
                        .with_body(NodeBody::Instance(InstanceBody {
                            target: self.make_target(visual_scene_id).map(InstanceTarget::Id),
                            must_exist: None,
                        }));
                    inner.info = self.info_tag("instance_visual_scene");
                    self.builder.add_leaf(inner);

                    self.builder.close();
                }

                NodeChild::InstanceLight => {
                    self.open_pending_transforms(&mut transforms);
                    let target = instance_url(child, "instance_light")?;
                    self.add_instance_leaf(child_id, child_sid, target, true, "instance");
                }

                NodeChild::Other => {}
            }
        }

        self.open_pending_transforms(&mut transforms);
        self.close_transforms(&transforms);
        self.builder.close();
        Ok(())
    }

    fn add_instance_leaf(
        &mut self,
        id: Option<String>,
        sid: Option<String>,
        target: &str,
        must_exist: bool,
        info: &str,
    ) {
        let mut node = SceneNode::new("instance")
            .with_id(id)
            .with_sid(sid)
            .with_body(NodeBody::Instance(InstanceBody {
                target: self.make_target(target).map(InstanceTarget::Id),
                must_exist: Some(must_exist),
            }));
        node.info = self.info_tag(info);
        self.builder.add_leaf(node);
    }

    // ------------------------------------------------------------------
    // Visual scenes
    // ------------------------------------------------------------------

    fn parse_visual_scenes(&mut self) -> ParseResult<()> {
        self.builder.open(SceneNode::library());
        self.add_info("library_visual_scenes");
        self.add_comment("Symbols parsed from <library_visual_scenes>");

        for library in dom::descendants(self.doc, "library_visual_scenes") {
            for visual_scene in dom::descendants(library, "visual_scene") {
                self.parse_visual_scene(visual_scene)?;
            }
        }

        self.builder.close();
        Ok(())
    }

    /// Translate one `<visual_scene>`.
    ///
    /// Subgraphs containing lights sort first so that light state is
    /// defined before the geometry it illuminates. Subgraphs containing
    /// cameras are split out: the scene symbol holds everything else, and
    /// each camera subgraph becomes a sibling symbol whose leaf instances
    /// the scene symbol, giving one instantiable view per camera.
    fn parse_visual_scene(&mut self, visual_scene: &'a Element) -> ParseResult<()> {
        let vs_id = dom::attr(visual_scene, "id").unwrap_or("");
        let symbol_id = self.make_id(dom::attr(visual_scene, "id"));

        let mut graphs: Vec<(&'a Element, SubgraphMeta)> = Vec::new();
        for child in dom::child_elements(visual_scene) {
            let mut meta = SubgraphMeta::default();
            pre_parse_node(child, &mut meta);
            if meta.light_id.is_some() {
                graphs.insert(0, (child, meta));
            } else {
                graphs.push((child, meta));
            }
        }

        self.builder
            .open(SceneNode::group().with_id(symbol_id.clone()));
        self.add_info("symbol_visual_scene");
        self.add_comment(format!(
            "Symbol embodying content parsed from the <visual_scene id='{vs_id}/'> element. "
        ));

        for (graph, meta) in &graphs {
            if meta.camera_id.is_none() {
                self.parse_node(*graph, vs_id)?;
            }
        }
        self.builder.close();

        self.manifest.symbols.scenes.insert(
            vs_id.to_string(),
            SceneSymbol {
                description: format!("visual_scene '{vs_id}'"),
                id: symbol_id.unwrap_or_default(),
                cameras: Default::default(),
            },
        );

        for (graph, meta) in &graphs {
            let Some(camera_ref) = &meta.camera_id else {
                continue;
            };
            let camera_id = dom::attr(graph, "id").unwrap_or(camera_ref).to_string();

            self.parse_node(*graph, vs_id)?;

            let record = SymbolRecord {
                description: format!(
                    "visual_scene '{vs_id}' viewed through camera '{camera_id}'"
                ),
                id: self.make_id(Some(&camera_id)).unwrap_or_default(),
            };
            if let Some(scene) = self.manifest.symbols.scenes.get_mut(vs_id) {
                scene.cameras.insert(camera_ref.clone(), record);
            }
        }

        Ok(())
    }

    // ------------------------------------------------------------------
    // Scene and default-symbol selection
    // ------------------------------------------------------------------

    /// Translate the root `<scene>` element into the default symbol.
    fn parse_scene(&mut self) -> ParseResult<()> {
        let scene = dom::first_descendant(self.doc, "scene")
            .ok_or_else(|| ParseError::MalformedStructure("COLLADA/scene".to_string()))?;

        self.builder.open(SceneNode::library());
        // The symbol node keeps the bare "scene" id; only the manifest
        // record carries the namespaced form.
        self.builder
            .open(SceneNode::group().with_id(Some("scene".to_string())));
        self.add_info("symbol_scene");
        self.add_comment("Symbol embodying content parsed from the root <scene> element");

        for instance in dom::descendants(scene, "instance_visual_scene") {
            self.parse_instance_visual_scene(instance)?;
        }

        self.builder.close();
        self.builder.close();

        self.manifest.symbols.default_symbol = Some(SymbolRecord {
            description: "scene - scene graph base".to_string(),
            id: self.make_id(Some("scene")).unwrap_or_default(),
        });
        Ok(())
    }

    fn parse_instance_visual_scene(&mut self, instance: &'a Element) -> ParseResult<()> {
        let target = instance_url(instance, "instance_visual_scene")?;

        self.builder.open(
            SceneNode::new("instance")
                .with_id(self.make_id(dom::attr(instance, "id")))
                .with_body(NodeBody::Instance(InstanceBody {
                    target: self.make_target(target).map(InstanceTarget::Id),
                    must_exist: None,
                })),
        );
        self.add_info("instance_visual_scene");
        self.builder.close();
        Ok(())
    }

    /// Emit the selector that instantiates the default symbol, making the
    /// subgraph render something when attached as-is.
    fn parse_symbol_selector(&mut self) -> ParseResult<()> {
        let default = self
            .manifest
            .symbols
            .default_symbol
            .as_ref()
            .ok_or_else(|| ParseError::MalformedStructure("COLLADA/scene".to_string()))?;

        self.builder.open(SceneNode::library());

        let id = (!self.base_id.is_empty()).then(|| self.base_id.clone());
        let node = SceneNode::new("instance")
            .with_id(id)
            .with_body(NodeBody::Instance(InstanceBody {
                target: Some(InstanceTarget::Id(default.id.clone())),
                must_exist: None,
            }))
            .with_extra(Extra {
                comment: self.comment_text("Instantiates the default <visual_scene>"),
                collada: Some(ColladaExtra { is_root: true }),
            });
        self.builder.add_leaf(node);

        self.builder.close();
        Ok(())
    }
}

/// Recursively collect camera and light instance references under a node.
fn pre_parse_node(node: &Element, meta: &mut SubgraphMeta) {
    for child in dom::child_elements(node) {
        match child.name.as_str() {
            "node" => pre_parse_node(child, meta),
            "instance_camera" => {
                if let Some(url) = dom::attr(child, "url") {
                    meta.camera_id = Some(dom::local_ref(url).to_string());
                }
            }
            "instance_light" => {
                if let Some(url) = dom::attr(child, "url") {
                    meta.light_id = Some(dom::local_ref(url).to_string());
                }
            }
            _ => {}
        }
    }
}

/// The bare identifier an instance element points at.
fn instance_url<'a>(element: &'a Element, tag: &str) -> ParseResult<&'a str> {
    dom::attr(element, "url")
        .map(dom::local_ref)
        .ok_or_else(|| ParseError::MalformedStructure(format!("{tag}/@url")))
}

fn parse_color(element: &Element) -> Rgb {
    let values = dom::parse_float_array(element);
    let at = |i: usize| values.get(i).copied().unwrap_or(0.0);
    Rgb {
        r: at(0),
        g: at(1),
        b: at(2),
    }
}

/// Float content of a named child element, with a fallback when the child
/// is absent or non-numeric.
fn child_float(parent: &Element, tag: &str, fallback: f32) -> f32 {
    dom::first_descendant(parent, tag)
        .and_then(dom::text_float)
        .unwrap_or(fallback)
}

/// Directory portion of a URL, trailing slash included.
fn dirname(url: &str) -> String {
    match url.rfind('/') {
        Some(at) => url[..=at].to_string(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dirname() {
        assert_eq!(dirname("http://example.com/assets/seymour.dae"), "http://example.com/assets/");
        assert_eq!(dirname("seymour.dae"), "");
    }

    #[test]
    fn test_parse_color_pads_with_zero() {
        let el = Element::parse("<color>0.5 0.25</color>".as_bytes()).unwrap();
        let color = parse_color(&el);
        assert_eq!((color.r, color.g, color.b), (0.5, 0.25, 0.0));
    }

    #[test]
    fn test_pre_parse_finds_nested_references() {
        let el = Element::parse(
            r##"
            <node>
                <node>
                    <instance_camera url="#cam1"/>
                </node>
                <instance_light url="#light1"/>
            </node>
            "##
            .as_bytes(),
        )
        .unwrap();

        let mut meta = SubgraphMeta::default();
        pre_parse_node(&el, &mut meta);
        assert_eq!(meta.camera_id.as_deref(), Some("cam1"));
        assert_eq!(meta.light_id.as_deref(), Some("light1"));
    }
}
