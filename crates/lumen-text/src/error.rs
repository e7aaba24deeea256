use lumen_render::RenderError;

/// Errors that can occur while packing or drawing text.
#[derive(Debug, Clone, PartialEq)]
pub enum TextError {
    /// A glyph needs more atlas space or index range than one image holds.
    TooComplex { requested: usize, available: usize },

    /// A path command other than `MoveTo` started a contour.
    MalformedPath { glyph: u32, command: usize },

    /// Drawing the glyphs failed.
    Render(RenderError),
}

impl std::fmt::Display for TextError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TextError::TooComplex {
                requested,
                available,
            } => write!(
                f,
                "font is too complex to render in 3D: needs {} slots but an atlas holds {}",
                requested, available
            ),
            TextError::MalformedPath { glyph, command } => write!(
                f,
                "glyph {} has path command {} outside a contour",
                glyph, command
            ),
            TextError::Render(err) => write!(f, "text render error: {}", err),
        }
    }
}

impl std::error::Error for TextError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TextError::Render(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RenderError> for TextError {
    fn from(err: RenderError) -> Self {
        TextError::Render(err)
    }
}

pub type Result<T> = std::result::Result<T, TextError>;
