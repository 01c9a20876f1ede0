//! COLLADA front-end: translates a parsed `.dae` document into the
//! normalized scene-graph form.
//!
//! The translation is structural, not visual: libraries become symbol
//! nodes, instance elements become instance references, transforms become
//! nesting wrappers, and indexed mesh data is expanded into flat
//! per-vertex buffers. See [`parse_document`] for the entry point.

mod error;
mod geometry;
mod index;
mod material;
mod parser;
mod source;
mod transform;
mod triangulate;

use xmltree::Element;

pub use error::{ParseError, ParseResult};

use crate::ParsedAsset;

/// Per-parse invocation parameters.
#[derive(Clone, Debug, Default)]
pub struct ParseParams {
    /// URL or path the document was fetched from; recorded in provenance
    /// comments and used to locate texture attachments.
    pub source_url: String,

    /// Namespace prefix applied to every identifier in the output, so
    /// multiple translated assets can coexist in one scene.
    pub base_id: String,

    pub options: ParseOptions,
}

/// Optional translation behavior. Everything defaults to off.
#[derive(Clone, Debug, Default)]
pub struct ParseOptions {
    /// Attach provenance comments under `extra.comment`.
    pub comments: bool,

    /// Wrap each geometry in a bounding box computed from its positions.
    pub bounding_boxes: bool,

    /// Attach short `info` tags naming the source element kind.
    pub info: bool,

    /// Directory texture images are fetched from; defaults to the
    /// directory portion of `source_url`.
    pub images_dir: Option<String>,
}

/// Translate a parsed COLLADA document.
///
/// The caller owns the XML tree; the translation borrows it read-only and
/// returns an owned result. Each call builds a fresh session, so a single
/// document can be translated repeatedly with different parameters.
pub fn parse_document(params: &ParseParams, doc: &Element) -> ParseResult<ParsedAsset> {
    parser::ColladaParser::new(params, doc).run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    const DUCK: &str = r##"
        <COLLADA version="1.4.1">
            <asset>
                <contributor><author>Alice Example</author></contributor>
                <keywords>toy duck</keywords>
                <title>Duck</title>
            </asset>
            <library_cameras>
                <camera id="cam1">
                    <optics>
                        <technique_common>
                            <perspective>
                                <yfov>49.13</yfov>
                                <znear>1.0</znear>
                                <zfar>1000.0</zfar>
                            </perspective>
                        </technique_common>
                    </optics>
                </camera>
            </library_cameras>
            <library_lights>
                <light id="light1">
                    <technique_common>
                        <directional><color>1 1 0.9</color></directional>
                    </technique_common>
                </light>
            </library_lights>
            <library_effects>
                <effect id="fx1">
                    <profile_COMMON>
                        <technique sid="common">
                            <phong>
                                <diffuse><color>0.8 0.2 0.1 1</color></diffuse>
                            </phong>
                        </technique>
                    </profile_COMMON>
                </effect>
            </library_effects>
            <library_materials>
                <material id="mat1">
                    <instance_effect url="#fx1"/>
                </material>
            </library_materials>
            <library_geometries>
                <geometry id="geom1">
                    <mesh>
                        <source id="geom1-pos">
                            <float_array id="geom1-pos-array" count="9">
                                0 0 0  1 0 0  0 1 0
                            </float_array>
                            <technique_common>
                                <accessor source="#geom1-pos-array" count="3" stride="3">
                                    <param name="X" type="float"/>
                                    <param name="Y" type="float"/>
                                    <param name="Z" type="float"/>
                                </accessor>
                            </technique_common>
                        </source>
                        <vertices id="geom1-verts">
                            <input semantic="POSITION" source="#geom1-pos"/>
                        </vertices>
                        <triangles count="1" material="blue">
                            <input semantic="VERTEX" source="#geom1-verts" offset="0"/>
                            <p>0 1 2</p>
                        </triangles>
                    </mesh>
                </geometry>
            </library_geometries>
            <library_visual_scenes>
                <visual_scene id="vs1">
                    <node id="n1">
                        <translate>1 2 3</translate>
                        <instance_geometry url="#geom1">
                            <bind_material>
                                <technique_common>
                                    <instance_material symbol="blue" target="#mat1"/>
                                </technique_common>
                            </bind_material>
                        </instance_geometry>
                    </node>
                    <node id="camnode">
                        <instance_camera url="#cam1"/>
                    </node>
                    <node id="lightnode">
                        <instance_light url="#light1"/>
                    </node>
                </visual_scene>
            </library_visual_scenes>
            <scene>
                <instance_visual_scene url="#vs1"/>
            </scene>
        </COLLADA>
    "##;

    fn duck_params() -> ParseParams {
        ParseParams {
            source_url: "http://assets.example.com/models/duck.dae".to_string(),
            base_id: "duck".to_string(),
            options: ParseOptions::default(),
        }
    }

    fn parse_duck() -> Value {
        let doc = Element::parse(DUCK.as_bytes()).unwrap();
        let parsed = parse_document(&duck_params(), &doc).unwrap();
        serde_json::to_value(&parsed).unwrap()
    }

    fn float_at(value: &Value, pointer: &str) -> f64 {
        value.pointer(pointer).and_then(Value::as_f64).unwrap()
    }

    #[test]
    fn test_root_holds_one_subgraph_per_section() {
        let json = parse_duck();
        // Six libraries, visual scenes, scene symbol, symbol selector.
        assert_eq!(json.pointer("/rootNode/nodes").unwrap().as_array().unwrap().len(), 9);
        assert_eq!(json.pointer("/rootNode/type").unwrap(), "node");
    }

    #[test]
    fn test_camera_symbol() {
        let json = parse_duck();
        let camera = json.pointer("/rootNode/nodes/0/nodes/0").unwrap();

        assert_eq!(camera.pointer("/type").unwrap(), "camera");
        assert_eq!(camera.pointer("/id").unwrap(), "duck.cam1");
        assert_eq!(camera.pointer("/optics/type").unwrap(), "perspective");
        assert!((float_at(camera, "/optics/fovy") - 49.13).abs() < 1e-4);
        // Unspecified aspect falls back.
        assert_eq!(float_at(camera, "/optics/aspect"), 1.0);
        assert_eq!(float_at(camera, "/optics/far"), 1000.0);
    }

    #[test]
    fn test_directional_light_symbol() {
        let json = parse_duck();
        let light = json.pointer("/rootNode/nodes/1/nodes/0").unwrap();

        assert_eq!(light.pointer("/type").unwrap(), "light");
        assert_eq!(light.pointer("/mode").unwrap(), "dir");
        assert_eq!(float_at(light, "/dir/z"), -1.0);
        assert!((float_at(light, "/color/b") - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_effect_becomes_material_symbol() {
        let json = parse_duck();
        let material = json.pointer("/rootNode/nodes/2/nodes/0").unwrap();

        assert_eq!(material.pointer("/type").unwrap(), "material");
        assert_eq!(material.pointer("/id").unwrap(), "duck.fx1");
        assert!((float_at(material, "/baseColor/r") - 0.8).abs() < 1e-6);
        assert_eq!(float_at(material, "/shine"), 10.0);
    }

    #[test]
    fn test_material_instances_effect() {
        let json = parse_duck();
        let instance = json.pointer("/rootNode/nodes/3/nodes/0").unwrap();

        assert_eq!(instance.pointer("/type").unwrap(), "instance");
        assert_eq!(instance.pointer("/id").unwrap(), "duck.mat1");
        assert_eq!(instance.pointer("/target").unwrap(), "duck.fx1");
        assert_eq!(instance.pointer("/mustExist").unwrap(), true);
    }

    #[test]
    fn test_geometry_symbol_binds_material_symbolically() {
        let json = parse_duck();
        let symbol = json.pointer("/rootNode/nodes/4/nodes/0").unwrap();
        assert_eq!(symbol.pointer("/id").unwrap(), "duck.geom1");

        let instance = symbol.pointer("/nodes/0").unwrap();
        assert_eq!(instance.pointer("/type").unwrap(), "instance");
        assert_eq!(instance.pointer("/target/name").unwrap(), "blue");

        let geometry = instance.pointer("/nodes/0").unwrap();
        assert_eq!(geometry.pointer("/type").unwrap(), "geometry");
        assert_eq!(geometry.pointer("/positions").unwrap().as_array().unwrap().len(), 9);
        assert_eq!(
            geometry.pointer("/indices").unwrap(),
            &serde_json::json!([0, 1, 2])
        );
    }

    #[test]
    fn test_visual_scene_splits_camera_subgraphs() {
        let json = parse_duck();
        let library = json.pointer("/rootNode/nodes/6").unwrap();
        let entries = library.pointer("/nodes").unwrap().as_array().unwrap();
        assert_eq!(entries.len(), 2);

        // The scene symbol holds the light subgraph first, then the plain
        // node subgraph; the camera subgraph is split out as a sibling.
        let symbol = &entries[0];
        assert_eq!(symbol.pointer("/id").unwrap(), "duck.vs1");
        assert_eq!(
            symbol.pointer("/nodes/0/id").unwrap(),
            "duck.lightnode"
        );
        assert_eq!(symbol.pointer("/nodes/1/id").unwrap(), "duck.n1");

        let camera_graph = &entries[1];
        assert_eq!(camera_graph.pointer("/id").unwrap(), "duck.camnode");
        // Camera instance wraps an instance of the visual scene symbol.
        assert_eq!(
            camera_graph.pointer("/nodes/0/target").unwrap(),
            "duck.cam1"
        );
        assert_eq!(
            camera_graph.pointer("/nodes/0/nodes/0/target").unwrap(),
            "duck.vs1"
        );
    }

    #[test]
    fn test_geometry_instance_carries_configs() {
        let json = parse_duck();
        let node = json.pointer("/rootNode/nodes/6/nodes/0/nodes/1").unwrap();

        // translate wrapper opened for the pending transform.
        let translate = node.pointer("/nodes/0").unwrap();
        assert_eq!(translate.pointer("/type").unwrap(), "translate");
        assert_eq!(float_at(translate, "/y"), 2.0);

        let with_configs = translate.pointer("/nodes/0").unwrap();
        assert_eq!(with_configs.pointer("/type").unwrap(), "withConfigs");
        assert_eq!(
            with_configs.pointer("/configs/*/blue").unwrap(),
            "duck.mat1"
        );
        assert_eq!(
            with_configs.pointer("/nodes/0/target").unwrap(),
            "duck.geom1"
        );
    }

    #[test]
    fn test_scene_symbol_and_selector() {
        let json = parse_duck();

        let scene = json.pointer("/rootNode/nodes/7/nodes/0").unwrap();
        assert_eq!(scene.pointer("/type").unwrap(), "node");
        // The symbol node keeps the bare id.
        assert_eq!(scene.pointer("/id").unwrap(), "scene");
        assert_eq!(scene.pointer("/nodes/0/target").unwrap(), "duck.vs1");

        let selector = json.pointer("/rootNode/nodes/8/nodes/0").unwrap();
        assert_eq!(selector.pointer("/type").unwrap(), "instance");
        assert_eq!(selector.pointer("/id").unwrap(), "duck");
        assert_eq!(selector.pointer("/target").unwrap(), "duck.scene");
        assert_eq!(selector.pointer("/extra/collada/isRoot").unwrap(), true);
    }

    #[test]
    fn test_manifest_records() {
        let json = parse_duck();

        assert_eq!(
            json.pointer("/manifest/symbols/scenes/vs1/id").unwrap(),
            "duck.vs1"
        );
        let camera = json
            .pointer("/manifest/symbols/scenes/vs1/cameras/cam1")
            .unwrap();
        assert_eq!(camera.pointer("/id").unwrap(), "duck.camnode");
        assert_eq!(
            camera.pointer("/description").unwrap(),
            "visual_scene 'vs1' viewed through camera 'camnode'"
        );
        assert_eq!(
            json.pointer("/manifest/symbols/defaultSymbol/id").unwrap(),
            "duck.scene"
        );
    }

    #[test]
    fn test_asset_metadata() {
        let json = parse_duck();
        assert_eq!(json.pointer("/asset/title").unwrap(), "Duck");
        assert_eq!(json.pointer("/asset/contributor").unwrap(), "Alice Example");
        assert_eq!(
            json.pointer("/asset/tags").unwrap(),
            &serde_json::json!(["toy", "duck"])
        );
    }

    #[test]
    fn test_annotations_are_off_by_default() {
        let json = parse_duck();
        assert!(json.pointer("/rootNode/info").is_none());
        assert!(json.pointer("/rootNode/nodes/0/info").is_none());
        assert!(json.pointer("/rootNode/nodes/0/extra").is_none());
    }

    #[test]
    fn test_info_and_comment_options() {
        let doc = Element::parse(DUCK.as_bytes()).unwrap();
        let mut params = duck_params();
        params.options.info = true;
        params.options.comments = true;

        let json = serde_json::to_value(parse_document(&params, &doc).unwrap()).unwrap();
        assert_eq!(json.pointer("/rootNode/info").unwrap(), "asset_root");
        assert_eq!(
            json.pointer("/rootNode/extra/comment").unwrap(),
            "Asset parsed from COLLADA resource at http://assets.example.com/models/duck.dae"
        );
        assert_eq!(json.pointer("/rootNode/nodes/0/info").unwrap(), "library_cameras");
        assert_eq!(
            json.pointer("/rootNode/nodes/3/nodes/0/info").unwrap(),
            "instance_effect"
        );
    }

    #[test]
    fn test_bounding_box_option() {
        let doc = Element::parse(DUCK.as_bytes()).unwrap();
        let mut params = duck_params();
        params.options.bounding_boxes = true;

        let json = serde_json::to_value(parse_document(&params, &doc).unwrap()).unwrap();
        let wrapper = json.pointer("/rootNode/nodes/4/nodes/0/nodes/0").unwrap();
        assert_eq!(wrapper.pointer("/type").unwrap(), "boundingBox");
        assert_eq!(float_at(wrapper, "/boundary/xmax"), 1.0);
        assert_eq!(float_at(wrapper, "/boundary/ymax"), 1.0);
        assert_eq!(float_at(wrapper, "/boundary/zmin"), 0.0);
    }

    #[test]
    fn test_transform_stack_opens_newest_first() {
        let doc = Element::parse(
            r##"
            <COLLADA>
                <library_nodes>
                    <node id="lib-node">
                        <translate>1 0 0</translate>
                        <rotate>0 1 0 90</rotate>
                        <instance_node url="#other"/>
                    </node>
                </library_nodes>
                <scene/>
            </COLLADA>
            "##
            .as_bytes(),
        )
        .unwrap();
        let json =
            serde_json::to_value(parse_document(&duck_params(), &doc).unwrap()).unwrap();

        let node = json.pointer("/rootNode/nodes/5/nodes/0").unwrap();
        assert_eq!(node.pointer("/id").unwrap(), "duck.lib-node");

        // rotate was declared last, so it wraps outermost.
        let rotate = node.pointer("/nodes/0").unwrap();
        assert_eq!(rotate.pointer("/type").unwrap(), "rotate");
        assert_eq!(rotate.pointer("/sid").unwrap(), "sid0");

        let translate = rotate.pointer("/nodes/0").unwrap();
        assert_eq!(translate.pointer("/type").unwrap(), "translate");
        assert_eq!(translate.pointer("/sid").unwrap(), "sid1");

        let instance = translate.pointer("/nodes/0").unwrap();
        assert_eq!(instance.pointer("/target").unwrap(), "duck.other");
        assert_eq!(instance.pointer("/mustExist").unwrap(), true);
    }

    #[test]
    fn test_trailing_transforms_still_open_and_close() {
        let doc = Element::parse(
            r#"
            <COLLADA>
                <library_nodes>
                    <node id="only-transforms">
                        <matrix>1 0 0 5  0 1 0 6  0 0 1 7  0 0 0 1</matrix>
                    </node>
                </library_nodes>
                <scene/>
            </COLLADA>
            "#
            .as_bytes(),
        )
        .unwrap();
        let json =
            serde_json::to_value(parse_document(&duck_params(), &doc).unwrap()).unwrap();

        let matrix = json.pointer("/rootNode/nodes/5/nodes/0/nodes/0").unwrap();
        assert_eq!(matrix.pointer("/type").unwrap(), "matrix");
        // Document order is row-major; elements come out column-major.
        let elements = matrix.pointer("/elements").unwrap().as_array().unwrap();
        assert_eq!(elements[12], serde_json::json!(5.0));
        assert_eq!(elements[13], serde_json::json!(6.0));
        assert_eq!(elements[14], serde_json::json!(7.0));
    }

    #[test]
    fn test_missing_scene_element_fails() {
        let doc = Element::parse(r#"<COLLADA><library_cameras/></COLLADA>"#.as_bytes()).unwrap();
        let err = parse_document(&duck_params(), &doc).unwrap_err();
        assert!(matches!(err, ParseError::MalformedStructure(path) if path.contains("scene")));
    }

    #[test]
    fn test_polylist_quad_expands_to_two_triangles() {
        let doc = Element::parse(
            r##"
            <COLLADA>
                <library_geometries>
                    <geometry id="quad">
                        <mesh>
                            <source id="quad-pos">
                                <float_array id="quad-pos-array" count="12">
                                    0 0 0  1 0 0  1 1 0  0 1 0
                                </float_array>
                                <technique_common>
                                    <accessor source="#quad-pos-array" count="4" stride="3">
                                        <param name="X" type="float"/>
                                        <param name="Y" type="float"/>
                                        <param name="Z" type="float"/>
                                    </accessor>
                                </technique_common>
                            </source>
                            <vertices id="quad-verts">
                                <input semantic="POSITION" source="#quad-pos"/>
                            </vertices>
                            <polylist count="1">
                                <input semantic="VERTEX" source="#quad-verts" offset="0"/>
                                <vcount>4</vcount>
                                <p>0 1 2 3</p>
                            </polylist>
                        </mesh>
                    </geometry>
                </library_geometries>
                <scene/>
            </COLLADA>
            "##
            .as_bytes(),
        )
        .unwrap();
        let json =
            serde_json::to_value(parse_document(&duck_params(), &doc).unwrap()).unwrap();

        let geometry = json.pointer("/rootNode/nodes/4/nodes/0/nodes/0").unwrap();
        // Two triangles, each vertex expanded independently.
        assert_eq!(geometry.pointer("/positions").unwrap().as_array().unwrap().len(), 18);
        assert_eq!(
            geometry.pointer("/indices").unwrap(),
            &serde_json::json!([0, 1, 2, 3, 4, 5])
        );
    }
}
