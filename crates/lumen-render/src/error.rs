//! Error types for the renderer.

use std::fmt;

use lumen_test_utils::{GlError, ShaderStage};

use crate::immediate::ShapeMode;

/// Errors surfaced to the caller when drawing cannot proceed.
///
/// Recoverable conditions (over-detailed strokes, shader fallbacks,
/// unsupported blend modes) are logged and never reach this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// The backend could not create a GL object.
    ContextCreation(String),
    /// The GL context was lost.
    ContextLost,
    /// A shader stage failed to compile.
    ShaderCompile { stage: ShaderStage, log: String },
    /// A program failed to link.
    ShaderLink { log: String },
    /// A shape mode GL cannot express was requested.
    UnsupportedPrimitive(ShapeMode),
    /// A shader handle that does not belong to this renderer.
    UnknownShader(usize),
    /// A texture handle that does not belong to this renderer.
    UnknownTexture(usize),
    /// A mesh needs 32-bit indices the context cannot draw.
    IndexOverflow { vertices: usize },
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ContextCreation(msg) => write!(f, "Failed to create GL object: {}", msg),
            Self::ContextLost => write!(f, "GL context lost"),
            Self::ShaderCompile { stage, log } => {
                write!(f, "Error compiling {} shader: {}", stage, log)
            }
            Self::ShaderLink { log } => write!(f, "Failed to link shader program: {}", log),
            Self::UnsupportedPrimitive(mode) => {
                write!(f, "{:?} shapes are not supported in WebGL mode", mode)
            }
            Self::UnknownShader(id) => write!(f, "Shader {} does not belong to this renderer", id),
            Self::UnknownTexture(id) => {
                write!(f, "Texture {} does not belong to this renderer", id)
            }
            Self::IndexOverflow { vertices } => write!(
                f,
                "Geometry with {} vertices needs 32-bit indices but OES_element_index_uint is \
                 unavailable; reduce the detail or split the mesh below 65536 vertices",
                vertices
            ),
        }
    }
}

impl std::error::Error for RenderError {}

impl From<GlError> for RenderError {
    fn from(err: GlError) -> Self {
        Self::ContextCreation(err.0)
    }
}

pub type Result<T> = std::result::Result<T, RenderError>;
