//! Blend mode presets.
//!
//! The built-in shaders write premultiplied alpha, so every preset treats the
//! source color as already multiplied by its alpha.

use lumen_test_utils::{BlendEquation, BlendFactor, Capability, GlContext};

/// How source and destination colors are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendMode {
    /// Source over destination.
    ///
    /// Formula: `src.rgb + dst.rgb * (1 - src.a)`
    #[default]
    Blend,

    /// Formula: `src.rgb + dst.rgb`
    Add,

    /// Erases the destination where the source is opaque.
    ///
    /// Formula: `dst.rgb * (1 - src.a)`
    Remove,

    /// Formula: `src.rgb * dst.rgb + dst.rgb * (1 - src.a)`
    Multiply,

    /// Formula: `src.rgb + dst.rgb * (1 - src.rgb)`
    Screen,

    /// Formula: `src.rgb * (1 - dst.rgb) + dst.rgb * (1 - src.rgb)`
    Exclusion,

    /// Source completely replaces destination.
    Replace,

    /// Formula: `dst.rgb - src.rgb`
    Subtract,

    /// Formula: `min(src.rgb, dst.rgb)`. Needs `EXT_blend_minmax`.
    Darkest,

    /// Formula: `max(src.rgb, dst.rgb)`. Needs `EXT_blend_minmax`.
    Lightest,
}

/// A blend equation and factor pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendState {
    pub equation: BlendEquation,
    pub src: BlendFactor,
    pub dst: BlendFactor,
}

impl BlendMode {
    pub const ALL: [BlendMode; 10] = [
        BlendMode::Blend,
        BlendMode::Add,
        BlendMode::Remove,
        BlendMode::Multiply,
        BlendMode::Screen,
        BlendMode::Exclusion,
        BlendMode::Replace,
        BlendMode::Subtract,
        BlendMode::Darkest,
        BlendMode::Lightest,
    ];

    pub fn to_blend_state(self) -> BlendState {
        use BlendEquation as E;
        use BlendFactor as F;

        let (equation, src, dst) = match self {
            BlendMode::Blend => (E::Add, F::One, F::OneMinusSrcAlpha),
            BlendMode::Add => (E::Add, F::One, F::One),
            BlendMode::Remove => (E::Add, F::Zero, F::OneMinusSrcAlpha),
            BlendMode::Multiply => (E::Add, F::DstColor, F::OneMinusSrcAlpha),
            BlendMode::Screen => (E::Add, F::One, F::OneMinusSrcColor),
            BlendMode::Exclusion => (E::Add, F::OneMinusDstColor, F::OneMinusSrcColor),
            BlendMode::Replace => (E::Add, F::One, F::Zero),
            BlendMode::Subtract => (E::ReverseSubtract, F::One, F::One),
            BlendMode::Darkest => (E::Min, F::One, F::One),
            BlendMode::Lightest => (E::Max, F::One, F::One),
        };
        BlendState { equation, src, dst }
    }

    /// The GL extension this mode depends on, if any.
    pub fn required_extension(self) -> Option<&'static str> {
        match self {
            BlendMode::Darkest | BlendMode::Lightest => Some("EXT_blend_minmax"),
            _ => None,
        }
    }
}

/// Tracks the active blend mode of one context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlendController {
    current: BlendMode,
    min_max_supported: bool,
}

impl BlendController {
    pub fn new(gl: &dyn GlContext) -> Self {
        let min_max_supported = gl.supports_extension("EXT_blend_minmax");
        if !min_max_supported {
            tracing::debug!("EXT_blend_minmax unavailable; darkest and lightest are disabled");
        }
        Self {
            current: BlendMode::default(),
            min_max_supported,
        }
    }

    pub fn current(&self) -> BlendMode {
        self.current
    }

    pub fn supports(&self, mode: BlendMode) -> bool {
        mode.required_extension().is_none() || self.min_max_supported
    }

    /// Switches to `mode`. An unsupported mode logs a warning and keeps the
    /// previous one. Returns the mode now in effect.
    pub fn set(&mut self, mode: BlendMode) -> BlendMode {
        if !self.supports(mode) {
            tracing::warn!(
                "blendMode({:?}) needs {} which this context lacks; keeping {:?}",
                mode,
                mode.required_extension().unwrap_or_default(),
                self.current
            );
            return self.current;
        }
        self.current = mode;
        mode
    }

    /// Applies the current mode to `gl`.
    pub fn apply(&self, gl: &dyn GlContext) {
        let state = self.current.to_blend_state();
        gl.enable(Capability::Blend);
        gl.blend_equation(state.equation);
        gl.blend_func(state.src, state.dst);
    }
}

#[cfg(test)]
mod tests {
    use lumen_test_utils::{GlCall, MockGlContext};

    use super::*;

    #[test]
    fn test_every_mode_has_a_state() {
        let states: Vec<_> = BlendMode::ALL.iter().map(|m| m.to_blend_state()).collect();
        assert_eq!(states.len(), 10);
        assert_eq!(
            BlendMode::Subtract.to_blend_state().equation,
            BlendEquation::ReverseSubtract
        );
    }

    #[test]
    fn test_minmax_without_extension_keeps_previous() {
        let mock = MockGlContext::without_extensions();
        let mut blend = BlendController::new(&mock);
        assert_eq!(blend.set(BlendMode::Add), BlendMode::Add);
        assert_eq!(blend.set(BlendMode::Darkest), BlendMode::Add);
        assert_eq!(blend.current(), BlendMode::Add);

        blend.apply(&mock);
        assert!(mock.calls().contains(&GlCall::BlendEquation {
            rgb: BlendEquation::Add,
            alpha: BlendEquation::Add,
        }));
        assert!(mock.is_enabled(Capability::Blend));
    }

    #[test]
    fn test_minmax_with_extension() {
        let mock = MockGlContext::new();
        let mut blend = BlendController::new(&mock);
        assert_eq!(blend.set(BlendMode::Lightest), BlendMode::Lightest);
        blend.apply(&mock);
        assert!(mock.calls().contains(&GlCall::BlendEquation {
            rgb: BlendEquation::Max,
            alpha: BlendEquation::Max,
        }));
    }
}
