//! GL abstraction and test utilities for Lumen.
//!
//! This crate provides the [`GlContext`] trait the renderer draws through,
//! the handle types it passes around, and a recording mock for tests.
//!
//! # Overview
//!
//! The main components are:
//!
//! - [`GlContext`] - Trait abstracting the WebGL function table
//! - `MockGlContext` - Mock implementation for testing (requires `mock` feature)
//! - Handle types (`GlBuffer`, `GlProgram`, `GlTexture`, ...) shared by all backends
//!
//! # Example
//!
//! ```rust
//! # #[cfg(feature = "mock")]
//! # {
//! use lumen_test_utils::{GlContext, MockGlContext, ShaderStage};
//!
//! // Create a mock context for testing
//! let mock = MockGlContext::new();
//!
//! // Use it like a real GL context
//! let shader = mock.create_shader(ShaderStage::Vertex).unwrap();
//! mock.shader_source(shader, "attribute vec3 aPosition;\nvoid main() {}");
//! mock.compile_shader(shader);
//!
//! // Verify operations in tests
//! assert!(mock.shader_compile_status(shader));
//! # }
//! ```
//!
//! # Design Philosophy
//!
//! ## 1. No Lifetimes
//!
//! Handles are plain `Copy` ids. Nothing borrows from the context, so no
//! lifetime parameters propagate through the renderer.
//!
//! ## 2. Interior Mutability
//!
//! Mock implementations use `Mutex` for interior mutability, allowing `&self`
//! methods to record calls.
//!
//! ## 3. Object Safety
//!
//! The `GlContext` trait is object-safe (`dyn GlContext`), allowing
//! for polymorphic usage with both real and mock contexts.

pub mod gl_context;
pub mod gl_types;
#[cfg(feature = "mock")]
pub mod mock_gl;

// Re-export main types at crate root
pub use gl_context::*;
pub use gl_types::*;
#[cfg(feature = "mock")]
pub use mock_gl::*;
