//! Drawing state and its save/restore stack.
//!
//! A [`RenderState`] is a plain value: everything a draw call reads (model
//! matrix, camera, colors, lights, material, shader overrides, curve and
//! text settings). Draws receive it by reference. [`RenderTargetState`] owns
//! the surface size plus the current state and the stack of saved
//! snapshots; `push` copies the current state, `pop` restores the copy, so a
//! nested scope can never alter what its parent sees afterwards.

use lumen_core::math::Matrix4;
use lumen_geometry::DEFAULT_CURVE_DETAIL;

use crate::blend::BlendMode;
use crate::camera::Camera;
use crate::color::Color;
use crate::lights::{Lights, Material};
use crate::selector::ShaderId;
use crate::texture::TextureId;

pub const DEFAULT_TEXT_SIZE: f32 = 12.0;
/// Text leading as a multiple of the text size.
pub const DEFAULT_LEADING_FACTOR: f32 = 1.25;

/// How `vertex_uv` coordinates are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureMode {
    /// `0..=1` across the texture.
    Normal,
    /// Texture pixels; divided by the texture size.
    #[default]
    Image,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HorizontalAlign {
    #[default]
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VerticalAlign {
    Top,
    Center,
    #[default]
    Baseline,
    Bottom,
}

/// Everything a draw call reads.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderState {
    /// Object to world transform.
    pub model: Matrix4,
    pub camera: Camera,

    /// Fill color; `None` disables fills.
    pub fill: Option<Color>,
    /// Stroke color; `None` disables strokes.
    pub stroke: Option<Color>,
    pub stroke_weight: f32,
    pub blend_mode: BlendMode,

    pub lights: Lights,
    pub material: Material,
    pub normal_material: bool,
    pub texture: Option<TextureId>,
    pub texture_mode: TextureMode,

    pub fill_shader: Option<ShaderId>,
    pub stroke_shader: Option<ShaderId>,
    pub point_shader: Option<ShaderId>,

    pub bezier_detail: u32,
    pub curve_detail: u32,
    pub curve_tightness: f32,

    pub text_size: f32,
    /// Line spacing; follows the text size when unset.
    pub text_leading: Option<f32>,
    pub text_align: HorizontalAlign,
    pub text_baseline: VerticalAlign,
}

impl RenderState {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            model: Matrix4::IDENTITY,
            camera: Camera::new(width, height),
            fill: Some(Color::WHITE),
            stroke: Some(Color::BLACK),
            stroke_weight: 1.0,
            blend_mode: BlendMode::default(),
            lights: Lights::default(),
            material: Material::default(),
            normal_material: false,
            texture: None,
            texture_mode: TextureMode::default(),
            fill_shader: None,
            stroke_shader: None,
            point_shader: None,
            bezier_detail: DEFAULT_CURVE_DETAIL,
            curve_detail: DEFAULT_CURVE_DETAIL,
            curve_tightness: 0.0,
            text_size: DEFAULT_TEXT_SIZE,
            text_leading: None,
            text_align: HorizontalAlign::default(),
            text_baseline: VerticalAlign::default(),
        }
    }

    /// Model-view: the model transform followed by the camera's view.
    pub fn model_view(&self) -> Matrix4 {
        self.model * *self.camera.view_matrix()
    }

    pub fn leading(&self) -> f32 {
        self.text_leading
            .unwrap_or(self.text_size * DEFAULT_LEADING_FACTOR)
    }

    /// Texture and tint reset; model matrix back to identity.
    pub(crate) fn reset_for_frame(&mut self) {
        self.model = Matrix4::IDENTITY;
        self.lights.no_lights();
        self.material.tint = Color::WHITE;
        self.texture = None;
        self.normal_material = false;
    }
}

/// A drawing surface's size and its state stack.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderTargetState<S> {
    width: u32,
    height: u32,
    pixel_density: f32,
    current: S,
    saved: Vec<S>,
}

impl<S: Clone> RenderTargetState<S> {
    pub fn new(width: u32, height: u32, pixel_density: f32, initial: S) -> Self {
        Self {
            width,
            height,
            pixel_density,
            current: initial,
            saved: Vec::new(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel_density(&self) -> f32 {
        self.pixel_density
    }

    /// Size in device pixels.
    pub fn physical_size(&self) -> (u32, u32) {
        (
            (self.width as f32 * self.pixel_density).round() as u32,
            (self.height as f32 * self.pixel_density).round() as u32,
        )
    }

    pub fn current(&self) -> &S {
        &self.current
    }

    pub fn current_mut(&mut self) -> &mut S {
        &mut self.current
    }

    /// Number of saved snapshots.
    pub fn depth(&self) -> usize {
        self.saved.len()
    }

    /// Saves a snapshot of the current state.
    pub fn push(&mut self) {
        self.saved.push(self.current.clone());
    }

    /// Restores the last snapshot. Returns `false` and keeps the current
    /// state when nothing was pushed.
    pub fn pop(&mut self) -> bool {
        match self.saved.pop() {
            Some(state) => {
                self.current = state;
                true
            }
            None => {
                tracing::warn!("pop() called more times than push()");
                false
            }
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    pub fn set_pixel_density(&mut self, density: f32) {
        self.pixel_density = density;
    }
}

#[cfg(test)]
mod tests {
    use lumen_core::math::Vector3;

    use super::*;

    fn target() -> RenderTargetState<RenderState> {
        RenderTargetState::new(100, 50, 2.0, RenderState::new(100, 50))
    }

    #[test]
    fn test_push_pop_restores_snapshot() {
        let mut target = target();
        target.push();
        {
            let state = target.current_mut();
            state.model.translate(Vector3::new(5.0, 0.0, 0.0));
            state.fill = None;
            state.camera.set_position(Vector3::new(0.0, 0.0, 10.0));
            state.lights.lights();
        }
        assert_eq!(target.depth(), 1);
        assert!(target.pop());

        let state = target.current();
        assert_eq!(state, &RenderState::new(100, 50));
        assert_eq!(target.depth(), 0);
    }

    #[test]
    fn test_unbalanced_pop_keeps_state() {
        let mut target = target();
        target.current_mut().stroke_weight = 4.0;
        assert!(!target.pop());
        assert_eq!(target.current().stroke_weight, 4.0);
    }

    #[test]
    fn test_physical_size() {
        let mut target = target();
        assert_eq!(target.physical_size(), (200, 100));
        target.resize(10, 10);
        assert_eq!(target.physical_size(), (20, 20));
    }

    #[test]
    fn test_leading_follows_size() {
        let mut state = RenderState::new(10, 10);
        state.text_size = 20.0;
        assert_eq!(state.leading(), 25.0);
        state.text_leading = Some(30.0);
        assert_eq!(state.leading(), 30.0);
    }
}
