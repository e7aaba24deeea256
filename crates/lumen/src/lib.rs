//! Lumen - WebGL-style 3D rendering
//!
//! Lumen draws creative-coding sketches in 3D over any [`GlContext`]: retained
//! primitives and models, immediate mode shapes, lights and materials,
//! textures, blend modes, and vector text rendered with exact per-pixel
//! coverage.
//!
//! The facade re-exports the sub-crates:
//!
//! - [`core`]: `Vector3`, `Matrix4`, logging and profiling
//! - [`geometry`]: meshes, primitive builders, model loaders
//! - [`render`]: the [`Renderer`](render::Renderer) (feature `render`)
//! - [`text`]: fonts and text drawing (feature `text`)
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use lumen::prelude::*;
//! use lumen::gl::MockGlContext;
//!
//! let gl = Arc::new(MockGlContext::new());
//! let mut renderer = Renderer::new(gl.clone(), RendererDescriptor::default()).unwrap();
//!
//! renderer.begin_frame();
//! renderer.background(Color::WHITE);
//! renderer.fill(Color::rgb(1.0, 0.0, 0.0));
//! renderer.rotate_y(0.5);
//! renderer.draw_box(50.0, 50.0, 50.0).unwrap();
//! assert_eq!(renderer.geometry_cache().len(), 1);
//! ```
//!
//! With the `glow` feature, `render::glow_context::GlowContext` drives a real
//! OpenGL or WebGL context.
//!
//! [`GlContext`]: gl::GlContext

pub use lumen_core as core;
pub use lumen_core::math;
pub use lumen_geometry as geometry;
/// The GL function table and its handle types.
pub use lumen_test_utils as gl;

#[cfg(feature = "render")]
pub use lumen_render as render;

#[cfg(feature = "text")]
pub use lumen_text as text;

/// Prelude module for convenient imports
pub mod prelude {
    pub use lumen_core::math::{Matrix3, Matrix4, Vector3};
    pub use lumen_geometry::{Geometry, ModelFormat, ModelOptions, Primitive, load_model};
    pub use lumen_test_utils::GlContext;

    #[cfg(feature = "render")]
    pub use lumen_render::{
        BlendMode, Camera, Color, EndMode, HorizontalAlign, RenderError, Renderer,
        RendererDescriptor, ShapeMode, TextureId, TextureMode, TextureOptions, VerticalAlign,
    };

    #[cfg(feature = "text")]
    pub use lumen_text::{Font, FontSource, Glyph, OutlineFont, PathCommand, TextError};
}
