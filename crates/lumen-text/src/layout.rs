//! Line breaking, measurement and alignment.
//!
//! Everything here works on a [`FontSource`] alone; no GL state is touched.

use lumen_render::{HorizontalAlign, VerticalAlign};

use crate::font::FontSource;

/// Size and alignment settings for one `text` call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    pub size: f32,
    pub leading: f32,
    pub align: HorizontalAlign,
    pub baseline: VerticalAlign,
}

impl TextStyle {
    /// Pixels per font unit.
    pub fn scale(&self, font: &dyn FontSource) -> f32 {
        let upem = font.units_per_em();
        if upem > 0.0 { self.size / upem } else { 0.0 }
    }
}

/// One line of a laid out string.
#[derive(Debug, Clone, PartialEq)]
pub struct Line<'a> {
    pub text: &'a str,
    /// Baseline origin after alignment.
    pub x: f32,
    pub y: f32,
    /// Advance width in pixels.
    pub width: f32,
}

/// Advance width of a single line in font units, kerning included.
pub fn line_advance(font: &dyn FontSource, text: &str) -> f32 {
    let mut previous = None;
    let mut advance = 0.0;
    for glyph in font.glyphs(text) {
        if let Some(previous) = previous {
            advance += font.kerning(previous, glyph);
        }
        advance += font.advance_width(glyph);
        previous = Some(glyph);
    }
    advance
}

/// Width in pixels of the widest line of `text` at `size`.
pub fn text_width(font: &dyn FontSource, text: &str, size: f32) -> f32 {
    let upem = font.units_per_em();
    if upem <= 0.0 {
        return 0.0;
    }
    text.split('\n')
        .map(|line| line_advance(font, line))
        .fold(0.0, f32::max)
        * size
        / upem
}

/// Ascent above the baseline in pixels.
pub fn text_ascent(font: &dyn FontSource, size: f32) -> f32 {
    let upem = font.units_per_em();
    if upem > 0.0 { font.ascender() * size / upem } else { 0.0 }
}

/// Descent below the baseline in pixels, positive.
pub fn text_descent(font: &dyn FontSource, size: f32) -> f32 {
    let upem = font.units_per_em();
    if upem > 0.0 { -font.descender() * size / upem } else { 0.0 }
}

/// Splits `text` on `\n` and places each line's baseline origin for drawing
/// at `(x, y)`.
pub fn layout<'a>(font: &dyn FontSource, text: &'a str, x: f32, y: f32, style: &TextStyle) -> Vec<Line<'a>> {
    let lines: Vec<&str> = text.split('\n').collect();
    let extra = (lines.len() - 1) as f32 * style.leading;

    let mut top = y;
    match style.baseline {
        VerticalAlign::Top => top += text_ascent(font, style.size),
        VerticalAlign::Center => top += text_ascent(font, style.size) / 2.0 - extra / 2.0,
        VerticalAlign::Baseline => {}
        VerticalAlign::Bottom => top -= text_descent(font, style.size) + extra,
    }

    let scale = style.scale(font);
    lines
        .into_iter()
        .enumerate()
        .map(|(i, line)| {
            let width = line_advance(font, line) * scale;
            let x = match style.align {
                HorizontalAlign::Left => x,
                HorizontalAlign::Center => x - width / 2.0,
                HorizontalAlign::Right => x - width,
            };
            Line {
                text: line,
                x,
                y: top + i as f32 * style.leading,
                width,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::{Glyph, OutlineFont, PathCommand};

    fn bar(advance: f32) -> Glyph {
        Glyph::new(
            advance,
            vec![
                PathCommand::MoveTo(0.0, 0.0),
                PathCommand::LineTo(100.0, 0.0),
                PathCommand::LineTo(100.0, 700.0),
                PathCommand::Close,
            ],
        )
    }

    fn font() -> OutlineFont {
        let mut font = OutlineFont::new(1000.0, 800.0, -200.0);
        font.add_glyph('A', bar(600.0));
        font.add_glyph('V', bar(500.0));
        font.add_glyph(' ', Glyph::blank(250.0));
        font.set_kerning('A', 'V', -100.0);
        font
    }

    fn style(align: HorizontalAlign, baseline: VerticalAlign) -> TextStyle {
        TextStyle {
            size: 10.0,
            leading: 12.0,
            align,
            baseline,
        }
    }

    #[test]
    fn test_width_includes_kerning() {
        let font = font();
        assert_eq!(line_advance(&font, "AV"), 1000.0);
        assert_eq!(line_advance(&font, "VA"), 1100.0);
        assert_eq!(text_width(&font, "AV", 10.0), 10.0);
        assert_eq!(text_width(&font, "", 10.0), 0.0);
    }

    #[test]
    fn test_width_of_multiline_text_is_the_widest_line() {
        let font = font();
        assert_eq!(text_width(&font, "A\nA A\nV", 10.0), 14.5);
    }

    #[test]
    fn test_horizontal_alignment() {
        let font = font();
        let left = layout(&font, "AV", 50.0, 0.0, &style(HorizontalAlign::Left, VerticalAlign::Baseline));
        let center = layout(&font, "AV", 50.0, 0.0, &style(HorizontalAlign::Center, VerticalAlign::Baseline));
        let right = layout(&font, "AV", 50.0, 0.0, &style(HorizontalAlign::Right, VerticalAlign::Baseline));
        assert_eq!(left[0].x, 50.0);
        assert_eq!(center[0].x, 45.0);
        assert_eq!(right[0].x, 40.0);
    }

    #[test]
    fn test_vertical_alignment_of_one_line() {
        let font = font();
        let y = |baseline| layout(&font, "A", 0.0, 100.0, &style(HorizontalAlign::Left, baseline))[0].y;
        assert_eq!(y(VerticalAlign::Baseline), 100.0);
        assert_eq!(y(VerticalAlign::Top), 108.0);
        assert_eq!(y(VerticalAlign::Center), 104.0);
        assert_eq!(y(VerticalAlign::Bottom), 98.0);
    }

    #[test]
    fn test_lines_are_spaced_by_leading() {
        let font = font();
        let lines = layout(&font, "A\nV\nA", 0.0, 0.0, &style(HorizontalAlign::Left, VerticalAlign::Baseline));
        let ys: Vec<f32> = lines.iter().map(|l| l.y).collect();
        assert_eq!(ys, vec![0.0, 12.0, 24.0]);
        assert_eq!(lines[1].text, "V");

        let bottom = layout(&font, "A\nV\nA", 0.0, 0.0, &style(HorizontalAlign::Left, VerticalAlign::Bottom));
        assert_eq!(bottom[2].y, -2.0);
    }
}
