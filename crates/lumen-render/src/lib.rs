//! Lumen Render - WebGL-style 3D rendering
//!
//! This crate provides:
//! - [`Renderer`], retained and immediate mode drawing over a [`GlContext`]
//! - [`Shader`] programs tagged with [`ShaderCapabilities`] at link time
//! - The built-in GLSL library and the per-draw shader selector
//! - A bounded [`GeometryCache`] of uploaded retained geometry
//! - [`Camera`], lights, materials, blend modes and textures
//! - A push/pop [`RenderState`] stack
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use lumen_render::{Color, Renderer, RendererDescriptor, ShapeMode, EndMode};
//! use lumen_test_utils::MockGlContext;
//!
//! let gl = Arc::new(MockGlContext::new());
//! let mut renderer = Renderer::new(gl.clone(), RendererDescriptor::default()).unwrap();
//!
//! renderer.begin_shape(ShapeMode::Triangles);
//! renderer.vertex(0.0, 0.0, 0.0);
//! renderer.vertex(10.0, 0.0, 0.0);
//! renderer.vertex(0.0, 10.0, 0.0);
//! renderer.end_shape(EndMode::Close).unwrap();
//! assert!(gl.count_draw_calls() > 0);
//! ```
//!
//! [`GlContext`]: lumen_test_utils::GlContext

// State
mod blend;
mod camera;
mod color;
mod config;
mod error;
mod lights;
mod render_state;

// Programs
mod builtin;
mod selector;
mod shader;

// Resources
mod geometry_cache;
mod texture;

// Drawing
mod immediate;
mod renderer;

#[cfg(feature = "glow")]
pub mod glow_context;

pub use blend::{BlendController, BlendMode, BlendState};
pub use builtin::BuiltinShader;
pub use camera::{Camera, CameraType, MIN_ORBIT_PHI, MIN_ORBIT_RADIUS, Projection};
pub use color::Color;
pub use config::{ContextAttributes, RendererDescriptor};
pub use error::{RenderError, Result};
pub use geometry_cache::{CachedGeometry, DEFAULT_CAPACITY, GeometryCache, GpuBuffer};
pub use immediate::{EndMode, FillData, ShapeBuilder, ShapeData, ShapeMode};
pub use lights::{
    DEFAULT_SPOT_ANGLE, DEFAULT_SPOT_CONCENTRATION, DirectionalLight, Falloff, Lights, MAX_LIGHTS,
    Material, PointLight, SpotLight,
};
pub use render_state::{
    DEFAULT_LEADING_FACTOR, DEFAULT_TEXT_SIZE, HorizontalAlign, RenderState, RenderTargetState,
    TextureMode, VerticalAlign,
};
pub use renderer::{GlyphAtlas, GlyphQuad, PushScope, Renderer};
pub use selector::{
    DrawPath, SelectorInput, ShaderChoice, ShaderId, select_fill, select_point, select_stroke,
};
pub use shader::{AttributeInfo, BoundShader, Shader, ShaderCapabilities, UniformInfo, UniformValue};
pub use texture::{ImageData, TextureId, TextureOptions, TextureRegistry, TextureSource};
