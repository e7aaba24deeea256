//! Picks the program for each draw from the current state.
//!
//! User shaders are honoured only when their capabilities cover what the
//! draw needs; otherwise the matching built-in is used and the user shader
//! is left untouched for later draws.

use crate::builtin::BuiltinShader;
use crate::shader::ShaderCapabilities;

/// Handle to a user shader created through the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShaderId(pub(crate) usize);

impl ShaderId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// The program a draw will use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderChoice {
    Builtin(BuiltinShader),
    User(ShaderId),
}

/// Which geometry path is drawing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DrawPath {
    Retained,
    Immediate,
}

/// The draw state the selector consults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectorInput {
    pub path: DrawPath,
    pub lighting: bool,
    pub textured: bool,
    pub normal_material: bool,
    pub per_pixel_lighting: bool,
    /// User fill shader and its capabilities.
    pub user_fill: Option<(ShaderId, ShaderCapabilities)>,
    pub user_stroke: Option<(ShaderId, ShaderCapabilities)>,
    pub user_point: Option<(ShaderId, ShaderCapabilities)>,
}

impl SelectorInput {
    pub fn new(path: DrawPath) -> Self {
        Self {
            path,
            lighting: false,
            textured: false,
            normal_material: false,
            per_pixel_lighting: true,
            user_fill: None,
            user_stroke: None,
            user_point: None,
        }
    }
}

/// Program for the fill pass.
pub fn select_fill(input: &SelectorInput) -> ShaderChoice {
    let light = ShaderChoice::Builtin(BuiltinShader::light(input.per_pixel_lighting));
    let user_with = |caps: ShaderCapabilities| {
        input
            .user_fill
            .filter(|(_, have)| have.contains(caps))
            .map(|(id, _)| ShaderChoice::User(id))
    };

    if input.normal_material {
        return match input.path {
            DrawPath::Retained => ShaderChoice::Builtin(BuiltinShader::Normal),
            DrawPath::Immediate => user_with(ShaderCapabilities::NORMAL)
                .unwrap_or(ShaderChoice::Builtin(BuiltinShader::Normal)),
        };
    }
    if input.lighting {
        return user_with(ShaderCapabilities::LIGHT).unwrap_or(light);
    }
    if input.textured {
        return user_with(ShaderCapabilities::TEXTURE).unwrap_or(light);
    }
    match (input.user_fill, input.path) {
        (Some((id, _)), _) => ShaderChoice::User(id),
        (None, DrawPath::Retained) => ShaderChoice::Builtin(BuiltinShader::Color),
        (None, DrawPath::Immediate) => ShaderChoice::Builtin(BuiltinShader::VertexColor),
    }
}

/// Program for the stroke pass.
pub fn select_stroke(input: &SelectorInput) -> ShaderChoice {
    match input.user_stroke {
        Some((id, caps)) if caps.contains(ShaderCapabilities::STROKE) => ShaderChoice::User(id),
        _ => ShaderChoice::Builtin(BuiltinShader::Line),
    }
}

/// Program for points.
pub fn select_point(input: &SelectorInput) -> ShaderChoice {
    match input.user_point {
        Some((id, caps)) if caps.contains(ShaderCapabilities::POINT) => ShaderChoice::User(id),
        _ => ShaderChoice::Builtin(BuiltinShader::Point),
    }
}
