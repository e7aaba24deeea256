//! The built-in GLSL programs.

use std::fmt;

const LIGHTING: &str = include_str!("shaders/lighting.glsl");

/// One of the renderer's own shader programs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BuiltinShader {
    /// Flat `uMaterialColor` fill.
    Color,
    /// Per-vertex colors from immediate mode shapes.
    VertexColor,
    /// Eye-space normals as colors.
    Normal,
    /// Per-vertex lighting.
    LightGouraud,
    /// Per-pixel lighting.
    LightPhong,
    /// Screen-space strokes.
    Line,
    Point,
    /// Analytic glyph coverage.
    Font,
}

impl BuiltinShader {
    pub const ALL: [BuiltinShader; 8] = [
        BuiltinShader::Color,
        BuiltinShader::VertexColor,
        BuiltinShader::Normal,
        BuiltinShader::LightGouraud,
        BuiltinShader::LightPhong,
        BuiltinShader::Line,
        BuiltinShader::Point,
        BuiltinShader::Font,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BuiltinShader::Color => "color",
            BuiltinShader::VertexColor => "vertex_color",
            BuiltinShader::Normal => "normal",
            BuiltinShader::LightGouraud => "gouraud",
            BuiltinShader::LightPhong => "phong",
            BuiltinShader::Line => "line",
            BuiltinShader::Point => "point",
            BuiltinShader::Font => "font",
        }
    }

    /// The light shader variant for a per-pixel lighting setting.
    pub fn light(per_pixel: bool) -> Self {
        if per_pixel {
            BuiltinShader::LightPhong
        } else {
            BuiltinShader::LightGouraud
        }
    }

    pub fn vertex_source(self) -> String {
        match self {
            BuiltinShader::Color => include_str!("shaders/color.vert").to_string(),
            BuiltinShader::VertexColor => include_str!("shaders/vertex_color.vert").to_string(),
            BuiltinShader::Normal => include_str!("shaders/normal.vert").to_string(),
            BuiltinShader::LightGouraud => {
                format!("{}\n{}", LIGHTING, include_str!("shaders/gouraud.vert"))
            }
            BuiltinShader::LightPhong => include_str!("shaders/phong.vert").to_string(),
            BuiltinShader::Line => include_str!("shaders/line.vert").to_string(),
            BuiltinShader::Point => include_str!("shaders/point.vert").to_string(),
            BuiltinShader::Font => include_str!("shaders/font.vert").to_string(),
        }
    }

    pub fn fragment_source(self) -> String {
        match self {
            BuiltinShader::Color => include_str!("shaders/color.frag").to_string(),
            BuiltinShader::VertexColor => include_str!("shaders/vertex_color.frag").to_string(),
            BuiltinShader::Normal => include_str!("shaders/normal.frag").to_string(),
            BuiltinShader::LightGouraud => include_str!("shaders/gouraud.frag").to_string(),
            BuiltinShader::LightPhong => format!(
                "precision highp float;\n{}\n{}",
                LIGHTING,
                include_str!("shaders/phong.frag")
            ),
            BuiltinShader::Line => include_str!("shaders/line.frag").to_string(),
            BuiltinShader::Point => include_str!("shaders/point.frag").to_string(),
            BuiltinShader::Font => include_str!("shaders/font.frag").to_string(),
        }
    }
}

impl fmt::Display for BuiltinShader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use lumen_test_utils::MockGlContext;

    use super::*;
    use crate::shader::{Shader, ShaderCapabilities};

    fn linked(builtin: BuiltinShader) -> Shader {
        let mut shader = Shader::new(
            Arc::new(MockGlContext::new()),
            builtin.vertex_source(),
            builtin.fragment_source(),
        );
        shader.init().unwrap();
        shader
    }

    #[test]
    fn test_capabilities_match_roles() {
        let caps = |b| linked(b).capabilities();
        assert_eq!(caps(BuiltinShader::Color), ShaderCapabilities::COLOR);
        assert_eq!(caps(BuiltinShader::VertexColor), ShaderCapabilities::COLOR);
        assert_eq!(caps(BuiltinShader::Normal), ShaderCapabilities::NORMAL);
        for light in [BuiltinShader::LightGouraud, BuiltinShader::LightPhong] {
            assert!(caps(light).contains(
                ShaderCapabilities::LIGHT
                    | ShaderCapabilities::TEXTURE
                    | ShaderCapabilities::NORMAL
                    | ShaderCapabilities::COLOR
            ));
        }
        assert!(caps(BuiltinShader::Line).contains(ShaderCapabilities::STROKE));
        assert!(caps(BuiltinShader::Point).contains(ShaderCapabilities::POINT));
        assert!(caps(BuiltinShader::Font).contains(ShaderCapabilities::TEXTURE));
    }

    #[test]
    fn test_light_arrays_are_sized() {
        let shader = linked(BuiltinShader::LightPhong);
        let colors = shader.uniform("uDirectionalDiffuseColors").unwrap();
        assert_eq!(colors.size, 5);
        assert!(shader.uniform("uViewMatrix").is_some());
    }

    #[test]
    fn test_font_samplers_in_declaration_order() {
        let shader = linked(BuiltinShader::Font);
        assert_eq!(
            shader.samplers(),
            &[
                "uSamplerStrokes",
                "uSamplerRowStrokes",
                "uSamplerRows",
                "uSamplerColStrokes",
                "uSamplerCols"
            ]
        );
    }
}
