//! Vector and matrix value types used by the renderer.
//!
//! [`Vector3`], [`Matrix4`] and [`Matrix3`] follow the row-vector convention
//! and GL memory layout described on [`Matrix4`]. The arithmetic itself runs
//! on the SIMD `glam` types re-exported under [`fast`]; the wrappers add the
//! checked division, normalization and inversion the renderer relies on.

mod matrix;
mod vector;

pub use matrix::{MIN_PERSPECTIVE_NEAR, Matrix3, Matrix4};
pub use vector::Vector3;

/// Re-export of [`glam`](https://docs.rs/glam) for SIMD-friendly math.
pub mod fast {
    pub use glam::*;
}

static_assertions::assert_eq_size!(Vector3, [f32; 3]);
static_assertions::assert_eq_size!(Matrix4, [f32; 16]);
static_assertions::assert_eq_size!(Matrix3, [f32; 9]);
