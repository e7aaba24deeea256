//! Turning one glyph outline into packed atlas data.
//!
//! The outline is normalized into its own bounding box and flattened into
//! quadratic strokes. A stroke is stored as its start point and control
//! point; its end is the start of the stroke after it, so every contour ends
//! with a terminator entry holding only the closing point. The box is split
//! into a [`GRID_SIZE`] x [`GRID_SIZE`] grid and every row and column lists
//! the strokes whose extent touches it.

use glam::Vec2;
use lumen_core::profiling::profile_function;

use crate::atlas::{AtlasSlot, ImageInfos, pack_index, unit_byte};
use crate::cubic::{Cubic, PRECISION, cubic_to_quadratics};
use crate::error::{Result, TextError};
use crate::font::{FontSource, GlyphBounds, GlyphId, PathCommand};

/// Rows and columns the glyph box is split into.
pub const GRID_SIZE: usize = 9;

const SAME_POINT_EPSILON: f32 = 0.00001;

/// A packed stroke: start and control point in glyph space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stroke {
    pub start: Vec2,
    pub control: Vec2,
}

impl Stroke {
    fn rgba(&self) -> [u8; 4] {
        [
            unit_byte(self.start.x),
            unit_byte(self.start.y),
            unit_byte(self.control.x),
            unit_byte(self.control.y),
        ]
    }
}

/// Where the row or column lists of one glyph were packed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DimensionInfo {
    /// Offset/count pairs, one pixel per row or column.
    pub dims: AtlasSlot,
    /// Stroke indices referenced by the offset/count pairs.
    pub cells: AtlasSlot,
}

/// Packed data of one drawable glyph.
#[derive(Debug, Clone, PartialEq)]
pub struct GlyphInfo {
    pub glyph: GlyphId,
    /// `x_min, -y_min, x_max, -y_max` in font units, y flipped to point down.
    pub rect: [f32; 4],
    pub strokes: Vec<Stroke>,
    pub stroke_slot: AtlasSlot,
    pub rows: DimensionInfo,
    pub cols: DimensionInfo,
}

impl GlyphInfo {
    /// Column and row of the glyph's first dimension pixel.
    pub fn grid_offset(&self) -> [i32; 2] {
        [self.cols.dims.offset as i32, self.rows.dims.offset as i32]
    }
}

/// The five pools a font's glyphs are packed into.
#[derive(Debug)]
pub struct GlyphPools {
    pub strokes: ImageInfos,
    pub row_cells: ImageInfos,
    pub col_cells: ImageInfos,
    pub row_dims: ImageInfos,
    pub col_dims: ImageInfos,
}

impl GlyphPools {
    pub fn new(stroke_size: u32, cell_size: u32, grid_size: u32) -> Self {
        Self {
            strokes: ImageInfos::new(stroke_size, stroke_size),
            row_cells: ImageInfos::new(cell_size, cell_size),
            col_cells: ImageInfos::new(cell_size, cell_size),
            row_dims: ImageInfos::new(grid_size, grid_size),
            col_dims: ImageInfos::new(grid_size, grid_size),
        }
    }
}

/// Strokes of an outline plus the grid rows and columns each one touches.
#[derive(Debug, Default)]
struct Outline {
    strokes: Vec<Stroke>,
    rows: Vec<Vec<usize>>,
    cols: Vec<Vec<usize>>,
}

impl Outline {
    fn new() -> Self {
        Self {
            strokes: Vec::new(),
            rows: vec![Vec::new(); GRID_SIZE],
            cols: vec![Vec::new(); GRID_SIZE],
        }
    }

    /// Adds a quadratic stroke and files it under every row and column its
    /// control hull spans.
    fn push(&mut self, start: Vec2, control: Vec2, end: Vec2) {
        let index = self.strokes.len();
        self.strokes.push(Stroke { start, control });

        let min = start.min(control).min(end);
        let max = start.max(control).max(end);
        for col in grid_span(min.x, max.x) {
            self.cols[col].push(index);
        }
        for row in grid_span(min.y, max.y) {
            self.rows[row].push(index);
        }
    }

    fn push_line(&mut self, start: Vec2, end: Vec2) {
        self.push(start, (start + end) / 2.0, end);
    }

    /// Ends a contour with its closing point.
    fn terminate(&mut self, point: Vec2) {
        self.strokes.push(Stroke {
            start: point,
            control: Vec2::ZERO,
        });
    }
}

/// Grid cells overlapped by `min..=max` on one axis.
fn grid_span(min: f32, max: f32) -> std::ops::Range<usize> {
    let n = GRID_SIZE as f32;
    let first = (min * n).floor().max(0.0) as usize;
    let last = ((max * n).ceil().max(0.0) as usize).min(GRID_SIZE);
    first..last
}

fn same_point(a: Vec2, b: Vec2) -> bool {
    (a.x - b.x).abs() < SAME_POINT_EPSILON && (a.y - b.y).abs() < SAME_POINT_EPSILON
}

/// Open contour state while walking path commands.
struct Contour {
    start: Vec2,
    current: Vec2,
    strokes: usize,
}

fn close(outline: &mut Outline, contour: &Contour) {
    if same_point(contour.current, contour.start) {
        outline.terminate(contour.current);
    } else {
        outline.push_line(contour.current, contour.start);
        outline.terminate(contour.start);
    }
}

/// Flattens `commands` into strokes in the `0..1` space of `bounds`.
fn flatten(glyph: GlyphId, commands: &[PathCommand], bounds: &GlyphBounds) -> Result<Outline> {
    let origin = Vec2::new(bounds.x_min, bounds.y_min);
    let size = Vec2::new(bounds.width(), bounds.height());
    let normalize = |x: f32, y: f32| (Vec2::new(x, y) - origin) / size;

    let mut outline = Outline::new();
    let mut contour: Option<Contour> = None;

    for (index, command) in commands.iter().enumerate() {
        if let PathCommand::MoveTo(x, y) = *command {
            if let Some(open) = contour.take().filter(|c| c.strokes > 0) {
                close(&mut outline, &open);
            }
            let point = normalize(x, y);
            contour = Some(Contour {
                start: point,
                current: point,
                strokes: 0,
            });
            continue;
        }
        let Some(open) = contour.as_mut() else {
            return Err(TextError::MalformedPath {
                glyph: glyph.0,
                command: index,
            });
        };
        let before = outline.strokes.len();
        match *command {
            PathCommand::MoveTo(..) => {}
            PathCommand::LineTo(x, y) => {
                let end = normalize(x, y);
                if same_point(open.current, end) {
                    continue;
                }
                outline.push_line(open.current, end);
                open.current = end;
            }
            PathCommand::QuadTo { cx, cy, x, y } => {
                let end = normalize(x, y);
                if same_point(open.current, end) {
                    continue;
                }
                outline.push(open.current, normalize(cx, cy), end);
                open.current = end;
            }
            PathCommand::CubicTo {
                c1x,
                c1y,
                c2x,
                c2y,
                x,
                y,
            } => {
                let end = normalize(x, y);
                if same_point(open.current, end) {
                    continue;
                }
                // reduce in font units so the threshold keeps its scale
                let cubic = Cubic::new(
                    open.current * size + origin,
                    Vec2::new(c1x, c1y),
                    Vec2::new(c2x, c2y),
                    Vec2::new(x, y),
                );
                for q in cubic_to_quadratics(cubic, PRECISION) {
                    outline.push(
                        open.current,
                        (q.control - origin) / size,
                        (q.end - origin) / size,
                    );
                    open.current = (q.end - origin) / size;
                }
                open.current = end;
            }
            PathCommand::Close => {
                if open.strokes > 0 {
                    close(&mut outline, open);
                }
                contour = None;
                continue;
            }
        }
        if let Some(open) = contour.as_mut() {
            open.strokes += outline.strokes.len() - before;
        }
    }
    if let Some(open) = contour.filter(|c| c.strokes > 0) {
        close(&mut outline, &open);
    }
    Ok(outline)
}

/// Writes one dimension's lists: `len` offset/count pixels into `dims` and
/// the concatenated stroke indices into `cells`.
fn layout(
    lists: &[Vec<usize>],
    stroke_offset: usize,
    dims: &mut ImageInfos,
    cells: &mut ImageInfos,
) -> Result<DimensionInfo> {
    let total: usize = lists.iter().map(Vec::len).sum();
    // reserve both before writing so a failure leaves no half-written data
    let dim_slot = dims.find_image(lists.len())?;
    let cell_slot = cells.find_image(total)?;

    let mut packed_dims = Vec::with_capacity(lists.len());
    let mut packed_cells = Vec::with_capacity(total);
    let mut cell = cell_slot.offset;
    for list in lists {
        let [offset_hi, offset_lo] = pack_index(cell)?;
        let [count_hi, count_lo] = pack_index(list.len())?;
        packed_dims.push([offset_hi, offset_lo, count_hi, count_lo]);
        for &stroke in list {
            let [hi, lo] = pack_index(stroke + stroke_offset)?;
            packed_cells.push([hi, lo, 0, 0]);
        }
        cell += list.len();
    }

    if let Some(mut writer) = dims.writer(dim_slot, lists.len()) {
        packed_dims.into_iter().for_each(|p| writer.push(p));
    }
    if let Some(mut writer) = cells.writer(cell_slot, total) {
        packed_cells.into_iter().for_each(|p| writer.push(p));
    }
    Ok(DimensionInfo {
        dims: dim_slot,
        cells: cell_slot,
    })
}

/// Packs `glyph` into `pools`. Returns `None` for glyphs with nothing to
/// draw.
pub fn pack_glyph(
    font: &dyn FontSource,
    glyph: GlyphId,
    pools: &mut GlyphPools,
) -> Result<Option<GlyphInfo>> {
    profile_function!();
    let bounds = font.bounds(glyph);
    let commands = font.commands(glyph);
    if bounds.is_empty() || commands.is_empty() {
        return Ok(None);
    }

    let outline = flatten(glyph, commands, &bounds)?;
    if outline.strokes.is_empty() {
        return Ok(None);
    }

    let stroke_slot = pools.strokes.find_image(outline.strokes.len())?;
    if let Some(mut writer) = pools.strokes.writer(stroke_slot, outline.strokes.len()) {
        for stroke in &outline.strokes {
            writer.push(stroke.rgba());
        }
    }

    let cols = layout(
        &outline.cols,
        stroke_slot.offset,
        &mut pools.col_dims,
        &mut pools.col_cells,
    )?;
    let rows = layout(
        &outline.rows,
        stroke_slot.offset,
        &mut pools.row_dims,
        &mut pools.row_cells,
    )?;
    tracing::trace!(
        "packed glyph {} as {} strokes",
        glyph.0,
        outline.strokes.len()
    );

    Ok(Some(GlyphInfo {
        glyph,
        rect: [bounds.x_min, -bounds.y_min, bounds.x_max, -bounds.y_max],
        strokes: outline.strokes,
        stroke_slot,
        rows,
        cols,
    }))
}
