//! The read-only outline font interface and an in-memory implementation.
//!
//! Font files are parsed by the host. Anything that can answer
//! [`FontSource`]'s questions (glyph lookup, bounds, outlines, advances and
//! kerning) can be drawn.

use lumen_core::alloc::HashMap;

/// Index of a glyph inside its font.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct GlyphId(pub u32);

/// One outline command in font units, y up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathCommand {
    MoveTo(f32, f32),
    LineTo(f32, f32),
    QuadTo {
        cx: f32,
        cy: f32,
        x: f32,
        y: f32,
    },
    CubicTo {
        c1x: f32,
        c1y: f32,
        c2x: f32,
        c2y: f32,
        x: f32,
        y: f32,
    },
    Close,
}

impl PathCommand {
    /// On-curve and control points of the command.
    fn points(&self) -> impl Iterator<Item = [f32; 2]> {
        let points: [Option<[f32; 2]>; 3] = match *self {
            PathCommand::MoveTo(x, y) | PathCommand::LineTo(x, y) => [Some([x, y]), None, None],
            PathCommand::QuadTo { cx, cy, x, y } => [Some([cx, cy]), Some([x, y]), None],
            PathCommand::CubicTo {
                c1x,
                c1y,
                c2x,
                c2y,
                x,
                y,
            } => [Some([c1x, c1y]), Some([c2x, c2y]), Some([x, y])],
            PathCommand::Close => [None, None, None],
        };
        points.into_iter().flatten()
    }
}

/// Axis-aligned glyph bounds in font units.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GlyphBounds {
    pub x_min: f32,
    pub y_min: f32,
    pub x_max: f32,
    pub y_max: f32,
}

impl GlyphBounds {
    /// Box around every point of `commands`. The curves stay inside it since
    /// a Bezier segment lies in the hull of its control points.
    pub fn from_commands(commands: &[PathCommand]) -> Self {
        let mut points = commands.iter().flat_map(PathCommand::points);
        let Some([x, y]) = points.next() else {
            return Self::default();
        };
        points.fold(
            Self {
                x_min: x,
                y_min: y,
                x_max: x,
                y_max: y,
            },
            |b, [x, y]| Self {
                x_min: b.x_min.min(x),
                y_min: b.y_min.min(y),
                x_max: b.x_max.max(x),
                y_max: b.y_max.max(y),
            },
        )
    }

    pub fn width(&self) -> f32 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> f32 {
        self.y_max - self.y_min
    }

    /// Zero-area glyphs (spaces) are advanced over but never drawn.
    pub fn is_empty(&self) -> bool {
        self.width() <= 0.0 || self.height() <= 0.0
    }
}

/// What the glyph packer and text layout need from a parsed font.
pub trait FontSource {
    fn units_per_em(&self) -> f32;
    /// Height above the baseline, in font units.
    fn ascender(&self) -> f32;
    /// Depth below the baseline, in font units; usually negative.
    fn descender(&self) -> f32;
    /// Maps text to glyphs, one per character.
    fn glyphs(&self, text: &str) -> Vec<GlyphId>;
    fn bounds(&self, glyph: GlyphId) -> GlyphBounds;
    fn commands(&self, glyph: GlyphId) -> &[PathCommand];
    fn advance_width(&self, glyph: GlyphId) -> f32;

    /// Pair adjustment added between `left` and `right`.
    fn kerning(&self, left: GlyphId, right: GlyphId) -> f32 {
        let _ = (left, right);
        0.0
    }
}

/// A glyph outline with its advance.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Glyph {
    advance_width: f32,
    commands: Vec<PathCommand>,
    bounds: GlyphBounds,
}

impl Glyph {
    pub fn new(advance_width: f32, commands: Vec<PathCommand>) -> Self {
        let bounds = GlyphBounds::from_commands(&commands);
        Self {
            advance_width,
            commands,
            bounds,
        }
    }

    /// A glyph with no outline, like a space.
    pub fn blank(advance_width: f32) -> Self {
        Self::new(advance_width, Vec::new())
    }

    pub fn advance_width(&self) -> f32 {
        self.advance_width
    }

    pub fn commands(&self) -> &[PathCommand] {
        &self.commands
    }

    pub fn bounds(&self) -> GlyphBounds {
        self.bounds
    }
}

/// A font held in memory, for hosts that decode font files themselves and
/// for tests.
///
/// Glyph 0 is the blank `.notdef` glyph that unmapped characters resolve to.
#[derive(Debug, Clone)]
pub struct OutlineFont {
    units_per_em: f32,
    ascender: f32,
    descender: f32,
    glyphs: Vec<Glyph>,
    chars: HashMap<char, GlyphId>,
    kerning: HashMap<(GlyphId, GlyphId), f32>,
}

impl OutlineFont {
    pub fn new(units_per_em: f32, ascender: f32, descender: f32) -> Self {
        Self {
            units_per_em,
            ascender,
            descender,
            glyphs: vec![Glyph::blank(units_per_em / 2.0)],
            chars: HashMap::default(),
            kerning: HashMap::default(),
        }
    }

    /// Maps `ch` to a new glyph and returns its id.
    pub fn add_glyph(&mut self, ch: char, glyph: Glyph) -> GlyphId {
        let id = GlyphId(self.glyphs.len() as u32);
        self.glyphs.push(glyph);
        self.chars.insert(ch, id);
        id
    }

    pub fn set_kerning(&mut self, left: char, right: char, value: f32) {
        let (Some(&l), Some(&r)) = (self.chars.get(&left), self.chars.get(&right)) else {
            tracing::warn!("kerning pair {:?}{:?} names an unmapped character", left, right);
            return;
        };
        self.kerning.insert((l, r), value);
    }

    pub fn glyph_id(&self, ch: char) -> Option<GlyphId> {
        self.chars.get(&ch).copied()
    }

    pub fn glyph(&self, id: GlyphId) -> Option<&Glyph> {
        self.glyphs.get(id.0 as usize)
    }

    fn glyph_or_notdef(&self, id: GlyphId) -> &Glyph {
        self.glyph(id).unwrap_or(&self.glyphs[0])
    }
}

impl FontSource for OutlineFont {
    fn units_per_em(&self) -> f32 {
        self.units_per_em
    }

    fn ascender(&self) -> f32 {
        self.ascender
    }

    fn descender(&self) -> f32 {
        self.descender
    }

    fn glyphs(&self, text: &str) -> Vec<GlyphId> {
        text.chars()
            .map(|ch| self.glyph_id(ch).unwrap_or_default())
            .collect()
    }

    fn bounds(&self, glyph: GlyphId) -> GlyphBounds {
        self.glyph_or_notdef(glyph).bounds
    }

    fn commands(&self, glyph: GlyphId) -> &[PathCommand] {
        &self.glyph_or_notdef(glyph).commands
    }

    fn advance_width(&self, glyph: GlyphId) -> f32 {
        self.glyph_or_notdef(glyph).advance_width
    }

    fn kerning(&self, left: GlyphId, right: GlyphId) -> f32 {
        self.kerning.get(&(left, right)).copied().unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(size: f32) -> Glyph {
        Glyph::new(
            size + 100.0,
            vec![
                PathCommand::MoveTo(0.0, 0.0),
                PathCommand::LineTo(size, 0.0),
                PathCommand::LineTo(size, size),
                PathCommand::LineTo(0.0, size),
                PathCommand::Close,
            ],
        )
    }

    #[test]
    fn test_bounds_cover_control_points() {
        let bounds = GlyphBounds::from_commands(&[
            PathCommand::MoveTo(10.0, 0.0),
            PathCommand::CubicTo {
                c1x: -20.0,
                c1y: 50.0,
                c2x: 40.0,
                c2y: 90.0,
                x: 30.0,
                y: 0.0,
            },
            PathCommand::Close,
        ]);
        assert_eq!(
            bounds,
            GlyphBounds {
                x_min: -20.0,
                y_min: 0.0,
                x_max: 40.0,
                y_max: 90.0
            }
        );
        assert!(!bounds.is_empty());
        assert!(GlyphBounds::from_commands(&[]).is_empty());
    }

    #[test]
    fn test_unmapped_characters_use_notdef() {
        let mut font = OutlineFont::new(1000.0, 800.0, -200.0);
        let a = font.add_glyph('A', square(500.0));

        assert_eq!(font.glyphs("A?A"), vec![a, GlyphId(0), a]);
        assert_eq!(font.advance_width(GlyphId(0)), 500.0);
        assert!(font.commands(GlyphId(0)).is_empty());
        assert_eq!(font.advance_width(GlyphId(42)), 500.0);
    }

    #[test]
    fn test_kerning_pairs() {
        let mut font = OutlineFont::new(1000.0, 800.0, -200.0);
        let a = font.add_glyph('A', square(500.0));
        let v = font.add_glyph('V', square(400.0));
        font.set_kerning('A', 'V', -80.0);
        font.set_kerning('A', 'Z', -10.0);

        assert_eq!(font.kerning(a, v), -80.0);
        assert_eq!(font.kerning(v, a), 0.0);
    }
}
