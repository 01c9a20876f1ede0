//! Effects and materials.
//!
//! An effect's common profile contributes surface colors and texture
//! layers; a material is just an instance of an effect. Texture references
//! resolve through the profile's sampler and surface parameters down to an
//! image file name, which is also recorded as a manifest attachment.

use xmltree::Element;

use crate::collada::error::{ParseError, ParseResult};
use crate::collada::parser::ColladaParser;
use crate::dom;
use crate::scene::{
    InstanceBody, InstanceTarget, MaterialBody, NodeBody, Rgb, Rgba, SceneNode, TextureLayer,
};

impl<'a> ColladaParser<'a> {
    /// Translate an `<effect>` into a material symbol.
    pub(super) fn parse_effect(&mut self, effect: &'a Element) -> ParseResult<()> {
        let profile = dom::first_descendant(effect, "profile_COMMON").ok_or_else(|| {
            ParseError::MalformedStructure("effect/profile_COMMON".to_string())
        })?;
        let technique = dom::first_descendant(profile, "technique").ok_or_else(|| {
            ParseError::MalformedStructure("effect/profile_COMMON/technique".to_string())
        })?;

        let mut material = MaterialBody {
            base_color: None,
            specular_color: None,
            shine: 10.0,
            specular: 1.0,
        };
        let mut layers: Vec<TextureLayer> = Vec::new();

        if let Some(diffuse) = dom::first_descendant(technique, "diffuse") {
            for child in dom::child_elements(diffuse) {
                match child.name.as_str() {
                    "color" => {
                        let c = channel_color(child);
                        material.base_color = Some(Rgb {
                            r: c[0],
                            g: c[1],
                            b: c[2],
                        });
                    }
                    "texture" => layers.push(self.texture_layer(profile, child, "baseColor")?),
                    _ => {}
                }
            }
        }

        if let Some(specular) = dom::first_descendant(technique, "specular") {
            for child in dom::child_elements(specular) {
                match child.name.as_str() {
                    "color" => {
                        let c = channel_color(child);
                        material.specular_color = Some(Rgba {
                            r: c[0],
                            g: c[1],
                            b: c[2],
                            a: 1.0,
                        });
                    }
                    "texture" => {
                        layers.push(self.texture_layer(profile, child, "specularColor")?)
                    }
                    _ => {}
                }
            }
        }

        if let Some(shininess) = dom::first_descendant(technique, "shininess") {
            for child in dom::child_elements(shininess) {
                // The scalar shininess value is not carried over; only a
                // shininess texture contributes a layer.
                if child.name == "texture" {
                    layers.push(self.texture_layer(profile, child, "shine")?);
                }
            }
        }

        self.builder.open(
            SceneNode::new("material")
                .with_id(self.make_id(dom::attr(effect, "id")))
                .with_body(NodeBody::Material(material)),
        );
        self.add_info("material");

        if !layers.is_empty() {
            self.builder.add_leaf(
                SceneNode::new("texture")
                    .with_sid(Some("texture".to_string()))
                    .with_body(NodeBody::Texture { layers }),
            );
        }

        self.builder.close();
        Ok(())
    }

    /// Resolve one `<texture>` channel reference into a layer, recording
    /// the image file as an attachment.
    fn texture_layer(
        &mut self,
        profile: &'a Element,
        texture: &'a Element,
        apply_to: &str,
    ) -> ParseResult<TextureLayer> {
        let sampler_sid = dom::attr(texture, "texture").ok_or_else(|| {
            ParseError::MalformedStructure("texture/@texture".to_string())
        })?;

        let source_sid = sampler_source(profile, sampler_sid)?;
        let image_id = surface_image_id(profile, &source_sid)?;

        let image = self.ids.get(&image_id)?;
        let file_name = dom::first_descendant(image, "init_from")
            .map(|el| dom::text_content(el).trim().to_string())
            .filter(|name| !name.is_empty())
            .ok_or_else(|| {
                ParseError::MalformedStructure(format!("image[id == '{image_id}']/init_from"))
            })?;

        let blend_mode = dom::first_descendant(texture, "blend_mode")
            .map(|el| dom::text_content(el).trim().to_string());
        let blend_mode = match blend_mode.as_deref() {
            Some("MULTIPLY") => "multiply",
            _ => "add",
        };

        self.manifest.attachments.push(file_name.clone());

        Ok(TextureLayer {
            uri: file_name,
            apply_to: apply_to.to_string(),
            flip_y: false,
            blend_mode: blend_mode.to_string(),
            wrap_s: "repeat".to_string(),
            wrap_t: "repeat".to_string(),
            min_filter: "linearMipMapLinear".to_string(),
            mag_filter: "linear".to_string(),
        })
    }

    /// Translate a `<material>` into an instance of its effect symbol.
    pub(super) fn parse_material(&mut self, material: &'a Element) -> ParseResult<()> {
        let instance_effect =
            dom::first_descendant(material, "instance_effect").ok_or_else(|| {
                ParseError::MalformedStructure("material/instance_effect".to_string())
            })?;
        let url = dom::attr(instance_effect, "url").ok_or_else(|| {
            ParseError::MalformedStructure("material/instance_effect/@url".to_string())
        })?;

        let mut node = SceneNode::new("instance")
            .with_id(self.make_id(dom::attr(material, "id")))
            .with_body(NodeBody::Instance(InstanceBody {
                target: self.make_target(dom::local_ref(url)).map(InstanceTarget::Id),
                must_exist: Some(true),
            }));
        node.info = self.info_tag("instance_effect");
        self.builder.add_leaf(node);
        Ok(())
    }
}

/// First three components of a channel `<color>`, zero-filled.
fn channel_color(element: &Element) -> [f32; 3] {
    let values = dom::parse_float_array(element);
    let at = |i: usize| values.get(i).copied().unwrap_or(0.0);
    [at(0), at(1), at(2)]
}

/// The source sid declared by the profile's sampler parameter.
fn sampler_source(profile: &Element, sid: &str) -> ParseResult<String> {
    for newparam in dom::descendants(profile, "newparam") {
        if dom::attr(newparam, "sid") != Some(sid) {
            continue;
        }
        return dom::first_descendant(newparam, "sampler2D")
            .and_then(|sampler| dom::first_descendant(sampler, "source"))
            .map(|source| dom::text_content(source).trim().to_string())
            .filter(|source| !source.is_empty())
            .ok_or_else(|| sampler_error(profile, sid));
    }
    Err(sampler_error(profile, sid))
}

fn sampler_error(profile: &Element, sid: &str) -> ParseError {
    ParseError::MalformedStructure(format!(
        "{}/newparam[sid == '{sid}']/sampler2D[0]/source[0]",
        profile.name
    ))
}

/// The image id declared by the profile's surface parameter.
fn surface_image_id(profile: &Element, sid: &str) -> ParseResult<String> {
    for newparam in dom::descendants(profile, "newparam") {
        if dom::attr(newparam, "sid") != Some(sid) {
            continue;
        }
        return dom::first_descendant(newparam, "surface")
            .and_then(|surface| dom::first_descendant(surface, "init_from"))
            .map(|init| dom::text_content(init).trim().to_string())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| surface_error(profile, sid));
    }
    Err(surface_error(profile, sid))
}

fn surface_error(profile: &Element, sid: &str) -> ParseError {
    ParseError::MalformedStructure(format!(
        "{}/newparam[sid == '{sid}']/surface[0]/init_from[0]",
        profile.name
    ))
}
