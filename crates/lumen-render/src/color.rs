/// An RGBA color with `f32` components in the `0.0..=1.0` range.
///
/// Hosts usually hand colors over as `0..=255` levels, the way a color picker
/// or a `color(r, g, b, a)` call produces them; [`Color::from_levels`] and
/// [`Color::gray`] accept that form directly.
///
/// ```
/// use lumen_render::Color;
///
/// let orange = Color::from_levels([255.0, 136.0, 0.0, 255.0]);
/// let half_gray = Color::gray(128.0);
/// let from_hex = Color::from_hex(0xFF8800);
/// assert_eq!(orange, from_hex);
/// assert!((half_gray.r - 0.502).abs() < 1e-3);
/// ```
///
/// The struct is `#[repr(C)]` and implements `bytemuck::Pod`, so it can be
/// uploaded as a `vec4` uniform or vertex attribute without conversion.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);
    pub const BLACK: Color = Color::rgb(0.0, 0.0, 0.0);
    pub const RED: Color = Color::rgb(1.0, 0.0, 0.0);
    pub const GREEN: Color = Color::rgb(0.0, 1.0, 0.0);
    pub const BLUE: Color = Color::rgb(0.0, 0.0, 1.0);
    pub const TRANSPARENT: Color = Color::rgba(0.0, 0.0, 0.0, 0.0);

    /// Create a color from RGB components with full opacity (alpha = 1.0).
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// Create a color from RGBA components.
    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Create a color from `0..=255` RGBA levels. Out of range levels are
    /// clamped.
    pub fn from_levels(levels: [f32; 4]) -> Self {
        let [r, g, b, a] = levels.map(|l| l.clamp(0.0, 255.0) / 255.0);
        Self { r, g, b, a }
    }

    /// An opaque gray from a single `0..=255` level.
    pub fn gray(level: f32) -> Self {
        Self::from_levels([level, level, level, 255.0])
    }

    /// Create a color from 8-bit RGBA values (0–255 mapped to 0.0–1.0).
    pub fn from_rgba_u8(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self {
            r: r as f32 / 255.0,
            g: g as f32 / 255.0,
            b: b as f32 / 255.0,
            a: a as f32 / 255.0,
        }
    }

    /// Create a color from a 24-bit RGB hex value (e.g. `0xFF8800`).
    pub fn from_hex(hex: u32) -> Self {
        let r = ((hex >> 16) & 0xFF) as u8;
        let g = ((hex >> 8) & 0xFF) as u8;
        let b = (hex & 0xFF) as u8;
        Self::from_rgba_u8(r, g, b, 255)
    }

    /// Same color with a different alpha.
    pub const fn with_alpha(self, a: f32) -> Self {
        Self { a, ..self }
    }

    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// RGB only, as uploaded to `vec3` light and material uniforms.
    pub fn to_rgb(self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }

    /// `0..=255` levels, rounded.
    pub fn to_levels(self) -> [u8; 4] {
        self.to_array().map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8)
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

impl From<[f32; 4]> for Color {
    fn from(arr: [f32; 4]) -> Self {
        Self::rgba(arr[0], arr[1], arr[2], arr[3])
    }
}

impl From<[f32; 3]> for Color {
    fn from(arr: [f32; 3]) -> Self {
        Self::rgb(arr[0], arr[1], arr[2])
    }
}

impl From<Color> for [f32; 4] {
    fn from(color: Color) -> Self {
        color.to_array()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels_clamp() {
        let c = Color::from_levels([300.0, -5.0, 255.0, 0.0]);
        assert_eq!(c, Color::rgba(1.0, 0.0, 1.0, 0.0));
    }

    #[test]
    fn test_to_levels() {
        assert_eq!(Color::from_hex(0x336699).to_levels(), [0x33, 0x66, 0x99, 255]);
    }
}
