//! Lumen Geometry - meshes for the 3D renderer
//!
//! This crate provides:
//! - [`Geometry`], a triangle mesh with derived stroke (line) data
//! - Unit-sized retained [`Primitive`]s and their cache keys
//! - OBJ and STL model parsing
//! - Contour tessellation for immediate-mode shapes
//! - Bezier and Catmull-Rom curve segments
//!
//! # Example
//!
//! ```
//! use lumen_geometry::Primitive;
//!
//! let sphere = Primitive::sphere();
//! assert_eq!(sphere.key(), "ellipsoid|24|16");
//!
//! let geometry = sphere.build();
//! assert!(!geometry.faces().is_empty());
//! assert!(!geometry.line_vertices().is_empty());
//! ```

// Core primitives
mod curve;
mod geometry;
mod primitives;

// Tessellation
mod tessellator;

// Loading
pub mod error;
pub mod model;

pub use curve::{CatmullRom, CubicBezier, DEFAULT_CURVE_DETAIL, QuadraticBezier};
pub use error::ModelError;
pub use geometry::Geometry;
pub use model::{ModelFormat, ModelOptions, load_model, parse_obj, parse_stl};
pub use primitives::{ArcMode, Primitive, to_precision, triangle_transform};
pub use tessellator::{ShapeVertex, TessellatedShape, Tessellator};
