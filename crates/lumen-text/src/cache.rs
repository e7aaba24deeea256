//! Per-font glyph cache.
//!
//! Glyphs are packed the first time they are drawn and kept for the life of
//! the [`FontInfo`]; atlas space is never reclaimed.

use lumen_core::alloc::HashMap;
use lumen_render::{GlyphAtlas, Renderer};

use crate::atlas::{CELL_IMAGE_SIZE, GRID_IMAGE_SIZE, STROKE_IMAGE_SIZE};
use crate::error::Result;
use crate::font::{FontSource, GlyphId};
use crate::glyph::{GlyphInfo, GlyphPools, pack_glyph};

/// Packed glyphs of one font and the atlases holding them.
#[derive(Debug)]
pub struct FontInfo {
    pools: GlyphPools,
    /// `None` marks glyphs with nothing to draw.
    glyphs: HashMap<GlyphId, Option<GlyphInfo>>,
    packed: usize,
}

impl Default for FontInfo {
    fn default() -> Self {
        Self::new()
    }
}

impl FontInfo {
    pub fn new() -> Self {
        Self::with_image_sizes(STROKE_IMAGE_SIZE, CELL_IMAGE_SIZE, GRID_IMAGE_SIZE)
    }

    /// Uses square atlas images of the given sides.
    pub fn with_image_sizes(stroke: u32, cell: u32, grid: u32) -> Self {
        Self {
            pools: GlyphPools::new(stroke, cell, grid),
            glyphs: HashMap::default(),
            packed: 0,
        }
    }

    /// The packed data for `glyph`, packing it on first use. `None` for
    /// blank glyphs.
    pub fn glyph_info(&mut self, font: &dyn FontSource, glyph: GlyphId) -> Result<Option<&GlyphInfo>> {
        if !self.glyphs.contains_key(&glyph) {
            let info = pack_glyph(font, glyph, &mut self.pools)?;
            if info.is_some() {
                self.packed += 1;
            }
            self.glyphs.insert(glyph, info);
        }
        Ok(self.glyphs.get(&glyph).and_then(Option::as_ref))
    }

    /// Whether `glyph` was already looked at.
    pub fn contains(&self, glyph: GlyphId) -> bool {
        self.glyphs.contains_key(&glyph)
    }

    /// Number of glyphs packed into the atlases so far.
    pub fn packed_glyphs(&self) -> usize {
        self.packed
    }

    pub fn pools(&self) -> &GlyphPools {
        &self.pools
    }

    /// Textures of the atlas images `glyph` reads, uploading any image that
    /// changed since it was last mirrored.
    pub fn atlas(&mut self, renderer: &mut Renderer, glyph: GlyphId) -> Result<Option<GlyphAtlas>> {
        let Some(Some(info)) = self.glyphs.get(&glyph) else {
            return Ok(None);
        };
        let (stroke, rows, cols) = (info.stroke_slot, info.rows, info.cols);
        let pools = &mut self.pools;
        let textures = (
            pools.strokes.texture(renderer, stroke.image)?,
            pools.row_cells.texture(renderer, rows.cells.image)?,
            pools.row_dims.texture(renderer, rows.dims.image)?,
            pools.col_cells.texture(renderer, cols.cells.image)?,
            pools.col_dims.texture(renderer, cols.dims.image)?,
        );
        let (Some(strokes), Some(row_strokes), Some(rows), Some(col_strokes), Some(cols)) = textures
        else {
            return Ok(None);
        };
        Ok(Some(GlyphAtlas {
            strokes,
            row_strokes,
            rows,
            col_strokes,
            cols,
            stroke_image_size: pools.strokes.size(),
            cells_image_size: pools.row_cells.size(),
            grid_image_size: pools.row_dims.size(),
        }))
    }
}
