//! Polygon tessellation using Lyon.
//!
//! Converts closed contours (an outline plus optional holes) into an indexed
//! triangle list. Contours are tessellated on their XY projection with the
//! non-zero rule; the remaining per-vertex data rides along as Lyon custom
//! attributes, so vertices Lyon introduces at intersections get values
//! interpolated along the source edge they split.

use lumen_core::math::Vector3;
use lumen_core::profiling::profile_function;
use lyon::lyon_tessellation::{
    BuffersBuilder, FillOptions, FillRule, FillTessellator, FillVertex as LyonFillVertex,
    VertexBuffers,
};
use lyon::math::point;
use lyon::path::Path;

/// z, u, v, r, g, b, a, nx, ny, nz
const ATTRIBUTE_COUNT: usize = 10;

/// A vertex recorded between `begin_shape` and `end_shape`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeVertex {
    pub position: Vector3,
    pub uv: [f32; 2],
    /// RGBA in `0..=1`.
    pub color: [f32; 4],
    pub normal: Vector3,
}

impl ShapeVertex {
    pub fn new(position: Vector3) -> Self {
        Self {
            position,
            uv: [0.0, 0.0],
            color: [0.0, 0.0, 0.0, 1.0],
            normal: Vector3::Z,
        }
    }

    fn attributes(&self) -> [f32; ATTRIBUTE_COUNT] {
        [
            self.position.z,
            self.uv[0],
            self.uv[1],
            self.color[0],
            self.color[1],
            self.color[2],
            self.color[3],
            self.normal.x,
            self.normal.y,
            self.normal.z,
        ]
    }

    fn from_attributes(x: f32, y: f32, a: &[f32]) -> Self {
        let get = |i: usize| a.get(i).copied().unwrap_or(0.0);
        Self {
            position: Vector3::new(x, y, get(0)),
            uv: [get(1), get(2)],
            color: [get(3), get(4), get(5), get(6)],
            normal: Vector3::new(get(7), get(8), get(9)),
        }
    }
}

/// Indexed triangles produced by [`Tessellator::tessellate`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TessellatedShape {
    pub vertices: Vec<ShapeVertex>,
    pub indices: Vec<u32>,
}

impl TessellatedShape {
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Expands the index list into a flat triangle list.
    pub fn triangles(&self) -> Vec<ShapeVertex> {
        self.indices
            .iter()
            .filter_map(|&i| self.vertices.get(i as usize).copied())
            .collect()
    }
}

/// Tessellator for converting contours to triangle meshes.
pub struct Tessellator {
    fill_tessellator: FillTessellator,
    /// Tolerance for curve flattening (smaller = more segments)
    pub tolerance: f32,
}

impl Default for Tessellator {
    fn default() -> Self {
        Self::new()
    }
}

impl Tessellator {
    /// Create a new tessellator with default settings.
    pub fn new() -> Self {
        Self {
            fill_tessellator: FillTessellator::new(),
            tolerance: 0.1,
        }
    }

    /// Tessellate closed contours with the non-zero fill rule.
    ///
    /// Contours with fewer than three vertices contribute nothing. A Lyon
    /// failure is logged and yields an empty shape.
    pub fn tessellate(&mut self, contours: &[Vec<ShapeVertex>]) -> TessellatedShape {
        profile_function!();
        let mut builder = Path::builder_with_attributes(ATTRIBUTE_COUNT);
        let mut any = false;
        for contour in contours.iter().filter(|c| c.len() >= 3) {
            let mut iter = contour.iter();
            let Some(first) = iter.next() else { continue };
            builder.begin(point(first.position.x, first.position.y), &first.attributes());
            for v in iter {
                builder.line_to(point(v.position.x, v.position.y), &v.attributes());
            }
            builder.end(true);
            any = true;
        }
        if !any {
            return TessellatedShape::default();
        }
        let path = builder.build();

        let mut buffers: VertexBuffers<ShapeVertex, u32> = VertexBuffers::new();
        let options = FillOptions::default()
            .with_tolerance(self.tolerance)
            .with_fill_rule(FillRule::NonZero);

        let result = self.fill_tessellator.tessellate_path(
            &path,
            &options,
            &mut BuffersBuilder::new(&mut buffers, |mut vertex: LyonFillVertex| {
                let p = vertex.position();
                ShapeVertex::from_attributes(p.x, p.y, vertex.interpolated_attributes())
            }),
        );

        if let Err(e) = result {
            tracing::warn!("Fill tessellation failed: {:?}", e);
            return TessellatedShape::default();
        }

        TessellatedShape {
            vertices: buffers.vertices,
            indices: buffers.indices,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(size: f32, z: f32) -> Vec<ShapeVertex> {
        [(0.0, 0.0), (size, 0.0), (size, size), (0.0, size)]
            .into_iter()
            .map(|(x, y)| ShapeVertex::new(Vector3::new(x, y, z)))
            .collect()
    }

    fn area(shape: &TessellatedShape) -> f32 {
        shape
            .indices
            .chunks(3)
            .map(|t| {
                let a = shape.vertices[t[0] as usize].position;
                let b = shape.vertices[t[1] as usize].position;
                let c = shape.vertices[t[2] as usize].position;
                ((b - a).cross(c - a)).mag() / 2.0
            })
            .sum()
    }

    #[test]
    fn test_square_becomes_two_triangles() {
        let mut tess = Tessellator::new();
        let shape = tess.tessellate(&[square(10.0, 3.0)]);
        assert_eq!(shape.indices.len(), 6);
        assert!((area(&shape) - 100.0).abs() < 1e-3);
        assert!(shape.vertices.iter().all(|v| (v.position.z - 3.0).abs() < 1e-5));
    }

    #[test]
    fn test_hole_is_subtracted() {
        let mut tess = Tessellator::new();
        let outer = square(10.0, 0.0);
        // Reversed winding so the hole cancels under the non-zero rule.
        let mut hole: Vec<_> = square(4.0, 0.0)
            .into_iter()
            .map(|mut v| {
                v.position = v.position + Vector3::xy(3.0, 3.0);
                v
            })
            .collect();
        hole.reverse();
        let shape = tess.tessellate(&[outer, hole]);
        assert!((area(&shape) - 84.0).abs() < 1e-2);
    }

    #[test]
    fn test_degenerate_contours_are_skipped() {
        let mut tess = Tessellator::new();
        let line = vec![ShapeVertex::new(Vector3::ZERO), ShapeVertex::new(Vector3::X)];
        assert!(tess.tessellate(&[line]).is_empty());
    }

    #[test]
    fn test_colors_are_carried() {
        let mut tess = Tessellator::new();
        let mut contour = square(1.0, 0.0);
        for v in &mut contour {
            v.color = [1.0, 0.5, 0.25, 1.0];
        }
        let shape = tess.tessellate(&[contour]);
        assert!(shape.vertices.iter().all(|v| v.color == [1.0, 0.5, 0.25, 1.0]));
    }
}
