//! Drawing strings through the renderer.

use lumen_core::profiling::profile_function;
use lumen_render::{GlyphQuad, Renderer};

use crate::cache::FontInfo;
use crate::error::Result;
use crate::font::{FontSource, GlyphId};
use crate::glyph::GRID_SIZE;
use crate::layout::{self, Line, TextStyle};

/// A font ready to draw, with its packed glyph cache.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use lumen_render::{Color, Renderer, RendererDescriptor};
/// use lumen_test_utils::MockGlContext;
/// use lumen_text::{Font, Glyph, OutlineFont, PathCommand};
///
/// let mut outlines = OutlineFont::new(1000.0, 800.0, -200.0);
/// outlines.add_glyph('I', Glyph::new(300.0, vec![
///     PathCommand::MoveTo(100.0, 0.0),
///     PathCommand::LineTo(200.0, 0.0),
///     PathCommand::LineTo(200.0, 700.0),
///     PathCommand::LineTo(100.0, 700.0),
///     PathCommand::Close,
/// ]));
///
/// let gl = Arc::new(MockGlContext::new());
/// let mut renderer = Renderer::new(gl.clone(), RendererDescriptor::default()).unwrap();
/// let mut font = Font::new(outlines);
///
/// renderer.fill(Color::BLACK);
/// renderer.text_size(32.0);
/// font.text(&mut renderer, "II", 10.0, 40.0).unwrap();
/// assert_eq!(gl.count_draw_calls(), 2);
/// ```
#[derive(Debug)]
pub struct Font<F: FontSource> {
    source: F,
    info: FontInfo,
}

impl<F: FontSource> Font<F> {
    pub fn new(source: F) -> Self {
        Self::with_info(source, FontInfo::new())
    }

    /// Uses a cache built with custom atlas sizes.
    pub fn with_info(source: F, info: FontInfo) -> Self {
        Self { source, info }
    }

    pub fn source(&self) -> &F {
        &self.source
    }

    pub fn info(&self) -> &FontInfo {
        &self.info
    }

    /// Size and alignment taken from the renderer's current state.
    pub fn style(renderer: &Renderer) -> TextStyle {
        let state = renderer.state();
        TextStyle {
            size: state.text_size,
            leading: state.leading(),
            align: state.text_align,
            baseline: state.text_baseline,
        }
    }

    /// Width of the widest line of `text` at the renderer's text size.
    pub fn text_width(&self, renderer: &Renderer, text: &str) -> f32 {
        layout::text_width(&self.source, text, renderer.state().text_size)
    }

    pub fn text_ascent(&self, renderer: &Renderer) -> f32 {
        layout::text_ascent(&self.source, renderer.state().text_size)
    }

    pub fn text_descent(&self, renderer: &Renderer) -> f32 {
        layout::text_descent(&self.source, renderer.state().text_size)
    }

    /// Draws `text` with its anchor at `(x, y)` using the current fill,
    /// text size and alignment. Strokes are off while drawing.
    ///
    /// Glyphs are packed the first time they appear. Fails if a glyph is too
    /// complex for the atlases.
    pub fn text(&mut self, renderer: &mut Renderer, text: &str, x: f32, y: f32) -> Result<()> {
        profile_function!();
        if renderer.state().fill.is_none() {
            tracing::trace!("text {:?} skipped without a fill", text);
            return Ok(());
        }
        let style = Self::style(renderer);
        let scale = style.scale(&self.source);
        let lines = layout::layout(&self.source, text, x, y, &style);

        let mut scope = renderer.push_scope();
        scope.no_stroke();
        for line in &lines {
            let mut line_scope = scope.push_scope();
            line_scope.translate(line.x, line.y, 0.0);
            line_scope.scale(scale, scale, 1.0);
            self.draw_line(&mut line_scope, line)?;
        }
        Ok(())
    }

    /// Draws one line in font units, pen starting at the origin.
    fn draw_line(&mut self, renderer: &mut Renderer, line: &Line<'_>) -> Result<()> {
        let mut previous: Option<GlyphId> = None;
        let mut dx = 0.0;
        for glyph in self.source.glyphs(line.text) {
            if let Some(previous) = previous {
                dx += self.source.kerning(previous, glyph);
            }
            self.draw_glyph(renderer, glyph, dx)?;
            dx += self.source.advance_width(glyph);
            previous = Some(glyph);
        }
        Ok(())
    }

    fn draw_glyph(&mut self, renderer: &mut Renderer, glyph: GlyphId, offset: f32) -> Result<()> {
        let Some((rect, grid_offset)) = self
            .info
            .glyph_info(&self.source, glyph)?
            .map(|info| (info.rect, info.grid_offset()))
        else {
            return Ok(());
        };
        let Some(atlas) = self.info.atlas(renderer, glyph)? else {
            return Ok(());
        };
        renderer.draw_glyph(&GlyphQuad {
            atlas,
            rect,
            offset,
            grid_offset,
            grid_size: [GRID_SIZE as i32; 2],
        })?;
        Ok(())
    }
}
