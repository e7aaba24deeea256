//! Scene lights and surface materials.
//!
//! Lights are collected per frame and uploaded as packed uniform arrays.
//! Each kind holds at most [`MAX_LIGHTS`]; the built-in light shaders size
//! their arrays to match.

use std::f32::consts::FRAC_PI_3;

use lumen_core::math::Vector3;

use crate::color::Color;
use crate::shader::Shader;
use crate::texture::TextureId;

/// Lights per kind.
pub const MAX_LIGHTS: usize = 5;

pub const DEFAULT_SPOT_ANGLE: f32 = FRAC_PI_3;
pub const DEFAULT_SPOT_CONCENTRATION: f32 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    /// Normalized world-space direction the light travels in.
    pub direction: Vector3,
    pub diffuse: Color,
    pub specular: Color,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    pub position: Vector3,
    pub diffuse: Color,
    pub specular: Color,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpotLight {
    pub position: Vector3,
    pub direction: Vector3,
    pub diffuse: Color,
    pub specular: Color,
    /// Cone half angle in radians.
    pub angle: f32,
    pub concentration: f32,
}

/// Distance attenuation `1 / (constant + linear * d + quadratic * d²)` for
/// point and spot lights.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Falloff {
    pub constant: f32,
    pub linear: f32,
    pub quadratic: f32,
}

impl Default for Falloff {
    fn default() -> Self {
        Self {
            constant: 1.0,
            linear: 0.0,
            quadratic: 0.0,
        }
    }
}

/// The lights of the current frame.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Lights {
    ambient: Vec<Color>,
    directional: Vec<DirectionalLight>,
    point: Vec<PointLight>,
    spot: Vec<SpotLight>,
    /// Specular color given to lights created from now on.
    specular_color: Option<Color>,
    falloff: Falloff,
}

impl Lights {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether any light is on.
    pub fn enabled(&self) -> bool {
        !(self.ambient.is_empty()
            && self.directional.is_empty()
            && self.point.is_empty()
            && self.spot.is_empty())
    }

    pub fn ambient(&self) -> &[Color] {
        &self.ambient
    }

    pub fn directional(&self) -> &[DirectionalLight] {
        &self.directional
    }

    pub fn point(&self) -> &[PointLight] {
        &self.point
    }

    pub fn spot(&self) -> &[SpotLight] {
        &self.spot
    }

    pub fn falloff(&self) -> Falloff {
        self.falloff
    }

    fn specular(&self) -> Color {
        self.specular_color.unwrap_or(Color::WHITE)
    }

    pub fn ambient_light(&mut self, color: Color) {
        if full("ambientLight", self.ambient.len()) {
            return;
        }
        self.ambient.push(color);
    }

    /// Adds a light shining along `direction`. A zero direction is ignored.
    pub fn directional_light(&mut self, color: Color, direction: Vector3) {
        if full("directionalLight", self.directional.len()) {
            return;
        }
        let Some(direction) = direction.try_normalize() else {
            tracing::warn!("directionalLight: direction {:?} has no length", direction);
            return;
        };
        let specular = self.specular();
        self.directional.push(DirectionalLight {
            direction,
            diffuse: color,
            specular,
        });
    }

    pub fn point_light(&mut self, color: Color, position: Vector3) {
        if full("pointLight", self.point.len()) {
            return;
        }
        let specular = self.specular();
        self.point.push(PointLight {
            position,
            diffuse: color,
            specular,
        });
    }

    /// Adds a spot light. `angle` is the cone half angle in radians and is
    /// clamped to `(0, π/2]`; `concentration` is clamped to at least 1.
    pub fn spot_light(
        &mut self,
        color: Color,
        position: Vector3,
        direction: Vector3,
        angle: f32,
        concentration: f32,
    ) {
        if full("spotLight", self.spot.len()) {
            return;
        }
        let Some(direction) = direction.try_normalize() else {
            tracing::warn!("spotLight: direction {:?} has no length", direction);
            return;
        };
        let specular = self.specular();
        self.spot.push(SpotLight {
            position,
            direction,
            diffuse: color,
            specular,
            angle: angle.clamp(f32::EPSILON, std::f32::consts::FRAC_PI_2),
            concentration: concentration.max(1.0),
        });
    }

    /// Sets the specular color of lights created afterwards.
    pub fn specular_color(&mut self, color: Color) {
        self.specular_color = Some(color);
    }

    /// Sets point and spot light attenuation. Negative coefficients are
    /// clamped to zero; all zeros reset the constant term to 1.
    pub fn light_falloff(&mut self, constant: f32, linear: f32, quadratic: f32) {
        let clamp = |name: &str, v: f32| {
            if v < 0.0 {
                tracing::warn!("lightFalloff: {} attenuation {} is negative, using 0", name, v);
                0.0
            } else {
                v
            }
        };
        let mut falloff = Falloff {
            constant: clamp("constant", constant),
            linear: clamp("linear", linear),
            quadratic: clamp("quadratic", quadratic),
        };
        if falloff.constant == 0.0 && falloff.linear == 0.0 && falloff.quadratic == 0.0 {
            tracing::warn!("lightFalloff: all attenuation terms are 0, using constant 1");
            falloff.constant = 1.0;
        }
        self.falloff = falloff;
    }

    /// Ambient gray 128 plus a gray directional light along -z.
    pub fn lights(&mut self) {
        let gray = Color::gray(128.0);
        self.ambient_light(gray);
        self.directional_light(gray, Vector3::new(0.0, 0.0, -1.0));
    }

    /// Turns every light off and resets falloff and specular color.
    pub fn no_lights(&mut self) {
        *self = Self::default();
    }

    /// Pushes the light uniforms. Names `shader` does not declare are
    /// ignored.
    pub fn upload(&self, shader: &mut Shader) {
        shader.set_uniform("uUseLighting", self.enabled());

        shader.set_uniform("uAmbientLightCount", self.ambient.len() as i32);
        shader.set_uniform("uAmbientColor", rgb_array(self.ambient.iter().copied()));

        shader.set_uniform("uDirectionalLightCount", self.directional.len() as i32);
        shader.set_uniform(
            "uLightingDirection",
            vec3_array(self.directional.iter().map(|l| l.direction)),
        );
        shader.set_uniform(
            "uDirectionalDiffuseColors",
            rgb_array(self.directional.iter().map(|l| l.diffuse)),
        );
        shader.set_uniform(
            "uDirectionalSpecularColors",
            rgb_array(self.directional.iter().map(|l| l.specular)),
        );

        shader.set_uniform("uPointLightCount", self.point.len() as i32);
        shader.set_uniform(
            "uPointLightLocation",
            vec3_array(self.point.iter().map(|l| l.position)),
        );
        shader.set_uniform(
            "uPointLightDiffuseColors",
            rgb_array(self.point.iter().map(|l| l.diffuse)),
        );
        shader.set_uniform(
            "uPointLightSpecularColors",
            rgb_array(self.point.iter().map(|l| l.specular)),
        );

        shader.set_uniform("uSpotLightCount", self.spot.len() as i32);
        shader.set_uniform(
            "uSpotLightLocation",
            vec3_array(self.spot.iter().map(|l| l.position)),
        );
        shader.set_uniform(
            "uSpotLightDirection",
            vec3_array(self.spot.iter().map(|l| l.direction)),
        );
        shader.set_uniform(
            "uSpotLightDiffuseColors",
            rgb_array(self.spot.iter().map(|l| l.diffuse)),
        );
        shader.set_uniform(
            "uSpotLightSpecularColors",
            rgb_array(self.spot.iter().map(|l| l.specular)),
        );
        shader.set_uniform(
            "uSpotLightAngle",
            padded(self.spot.iter().map(|l| l.angle.cos())),
        );
        shader.set_uniform(
            "uSpotLightConc",
            padded(self.spot.iter().map(|l| l.concentration)),
        );

        shader.set_uniform("uConstantAttenuation", self.falloff.constant);
        shader.set_uniform("uLinearAttenuation", self.falloff.linear);
        shader.set_uniform("uQuadraticAttenuation", self.falloff.quadratic);
    }
}

fn full(operation: &str, count: usize) -> bool {
    if count >= MAX_LIGHTS {
        tracing::warn!(
            "{}: at most {} lights of this kind are supported; ignoring the new one",
            operation,
            MAX_LIGHTS
        );
        true
    } else {
        false
    }
}

/// Flattens to `MAX_LIGHTS` entries; unused slots are zero.
fn padded(values: impl Iterator<Item = f32>) -> Vec<f32> {
    let mut out: Vec<f32> = values.collect();
    out.resize(MAX_LIGHTS, 0.0);
    out
}

fn rgb_array(colors: impl Iterator<Item = Color>) -> Vec<f32> {
    let mut out: Vec<f32> = colors.flat_map(|c| c.to_rgb()).collect();
    out.resize(MAX_LIGHTS * 3, 0.0);
    out
}

fn vec3_array(vectors: impl Iterator<Item = Vector3>) -> Vec<f32> {
    let mut out: Vec<f32> = vectors.flat_map(|v| v.to_array()).collect();
    out.resize(MAX_LIGHTS * 3, 0.0);
    out
}

/// Surface response to light.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    /// Ambient response; the fill color when unset.
    pub ambient: Option<Color>,
    /// Specular highlight color; highlights are off when unset.
    pub specular: Option<Color>,
    pub emissive: Color,
    pub shininess: f32,
    /// Multiplies texture samples.
    pub tint: Color,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            ambient: None,
            specular: None,
            emissive: Color::rgba(0.0, 0.0, 0.0, 0.0),
            shininess: 1.0,
            tint: Color::WHITE,
        }
    }
}

impl Material {
    /// Sets the shininess, clamped to at least 1.
    pub fn set_shininess(&mut self, shininess: f32) {
        if shininess < 1.0 {
            tracing::warn!("shininess({}) is below 1, using 1", shininess);
        }
        self.shininess = shininess.max(1.0);
    }

    /// Pushes the material uniforms for a fill drawn with `fill`, optionally
    /// textured.
    pub fn upload(&self, shader: &mut Shader, fill: Color, texture: Option<TextureId>) {
        shader.set_uniform("uMaterialColor", fill);
        shader.set_uniform("uTint", self.tint);
        shader.set_uniform("uHasSetAmbient", self.ambient.is_some());
        shader.set_uniform("uAmbientMatColor", self.ambient.unwrap_or(fill));
        shader.set_uniform("uSpecular", self.specular.is_some());
        shader.set_uniform("uSpecularMatColor", self.specular.unwrap_or(Color::WHITE));
        shader.set_uniform("uEmissiveMatColor", self.emissive);
        shader.set_uniform("uShininess", self.shininess);
        shader.set_uniform("uIsTexture", texture.is_some());
        if let Some(texture) = texture {
            shader.set_uniform("uSampler", texture);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use lumen_test_utils::{MockGlContext, RecordedUniform};

    use super::*;
    use crate::builtin::BuiltinShader;

    #[test]
    fn test_lights_preset() {
        let mut lights = Lights::new();
        assert!(!lights.enabled());
        lights.lights();
        assert_eq!(lights.ambient().len(), 1);
        assert_eq!(lights.directional()[0].direction, Vector3::new(0.0, 0.0, -1.0));
        assert!(lights.enabled());
        lights.no_lights();
        assert!(!lights.enabled());
    }

    #[test]
    fn test_extra_lights_are_ignored() {
        let mut lights = Lights::new();
        for i in 0..MAX_LIGHTS + 2 {
            lights.point_light(Color::WHITE, Vector3::new(i as f32, 0.0, 0.0));
        }
        assert_eq!(lights.point().len(), MAX_LIGHTS);
    }

    #[test]
    fn test_falloff_clamps() {
        let mut lights = Lights::new();
        lights.light_falloff(-1.0, 0.5, 0.0);
        assert_eq!(
            lights.falloff(),
            Falloff {
                constant: 0.0,
                linear: 0.5,
                quadratic: 0.0
            }
        );
        lights.light_falloff(0.0, 0.0, -2.0);
        assert_eq!(lights.falloff(), Falloff::default());
    }

    #[test]
    fn test_specular_color_applies_to_later_lights() {
        let mut lights = Lights::new();
        lights.point_light(Color::RED, Vector3::ZERO);
        lights.specular_color(Color::BLUE);
        lights.point_light(Color::RED, Vector3::ZERO);
        assert_eq!(lights.point()[0].specular, Color::WHITE);
        assert_eq!(lights.point()[1].specular, Color::BLUE);
    }

    #[test]
    fn test_upload_packs_arrays() {
        let mock = Arc::new(MockGlContext::new());
        let builtin = BuiltinShader::LightPhong;
        let mut shader = Shader::new(mock.clone(), builtin.vertex_source(), builtin.fragment_source());
        shader.init().unwrap();

        let mut lights = Lights::new();
        lights.directional_light(Color::WHITE, Vector3::new(0.0, 2.0, 0.0));
        {
            let mut bound = shader.bind().unwrap();
            lights.upload(&mut bound);
        }
        assert_eq!(
            mock.uniform_uploads("uDirectionalLightCount"),
            vec![RecordedUniform::Int(1)]
        );
        let RecordedUniform::Floats(dirs) = &mock.uniform_uploads("uLightingDirection")[0] else {
            panic!("expected floats");
        };
        assert_eq!(dirs.len(), MAX_LIGHTS * 3);
        assert_eq!(&dirs[..3], &[0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_shininess_clamp() {
        let mut material = Material::default();
        material.set_shininess(0.2);
        assert_eq!(material.shininess, 1.0);
    }
}
