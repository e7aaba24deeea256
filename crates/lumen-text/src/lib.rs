//! Lumen Text - Vector font rendering in 3D
//!
//! Glyph outlines are packed into small data textures and drawn with a
//! fragment shader that computes exact coverage per pixel, so text stays
//! sharp at any scale, distance or rotation.
//!
//! - [`FontSource`] is what a parsed font must answer; [`OutlineFont`] holds
//!   one in memory
//! - [`cubic`] reduces cubic outline segments to quadratics
//! - [`glyph`] normalizes outlines and sorts strokes into a 9x9 grid
//! - [`atlas`] pools the fixed-size images the packed data lives in
//! - [`FontInfo`] caches packed glyphs per font
//! - [`Font`] lays out and draws strings through a [`Renderer`]
//!
//! A font whose glyphs need more atlas slots than an image can address fails
//! with [`TextError::TooComplex`].
//!
//! [`Renderer`]: lumen_render::Renderer

pub mod atlas;
pub mod cache;
pub mod cubic;
pub mod error;
pub mod font;
pub mod glyph;
pub mod layout;
pub mod text;

pub use atlas::{AtlasImage, AtlasSlot, ImageInfos};
pub use cache::FontInfo;
pub use cubic::{Cubic, PRECISION, Quadratic, cubic_to_quadratics};
pub use error::{Result, TextError};
pub use font::{FontSource, Glyph, GlyphBounds, GlyphId, OutlineFont, PathCommand};
pub use glyph::{GRID_SIZE, GlyphInfo, GlyphPools, Stroke, pack_glyph};
pub use layout::{Line, TextStyle, layout, text_width};
pub use text::Font;
