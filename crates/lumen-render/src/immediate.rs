//! Immediate mode shape recording.
//!
//! A [`ShapeBuilder`] collects the vertices issued between `begin_shape` and
//! `end_shape`, flattening bezier, quadratic and Catmull-Rom segments as
//! they arrive. [`ShapeBuilder::finish`] turns the recording into fill
//! triangles for the shape's [`ShapeMode`] and an edge list for its stroke.

use std::sync::Arc;

use lumen_core::math::Vector3;
use lumen_geometry::{
    CatmullRom, CubicBezier, Geometry, QuadraticBezier, ShapeVertex, Tessellator,
};
use lumen_test_utils::{BufferTarget, BufferUsage, DrawMode, GlBuffer, GlContext};

use crate::error::{RenderError, Result};

/// Primitive topology of an immediate mode shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ShapeMode {
    Points,
    Lines,
    Triangles,
    TriangleFan,
    TriangleStrip,
    /// Independent quads, four vertices each.
    Quads,
    /// Not expressible in GL; rejected by `end_shape`.
    QuadStrip,
    /// Arbitrary polygon with optional holes, tessellated.
    #[default]
    Tess,
}

/// Whether `end_shape` connects the last vertex back to the first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EndMode {
    #[default]
    Open,
    Close,
}

/// Fill triangles ready to stream.
#[derive(Debug, Clone, PartialEq)]
pub struct FillData {
    pub draw_mode: DrawMode,
    pub vertices: Vec<ShapeVertex>,
}

/// The drawable result of a recorded shape.
#[derive(Debug, Default)]
pub struct ShapeData {
    pub fill: Option<FillData>,
    /// Stroke line geometry with line vertices already derived.
    pub stroke: Option<Geometry>,
    /// Positions drawn as points in [`ShapeMode::Points`].
    pub points: Vec<Vector3>,
}

#[derive(Debug, Clone, Default)]
struct Contour {
    vertices: Vec<ShapeVertex>,
    /// Holes always close; the outline closes with [`EndMode::Close`].
    hole: bool,
}

/// Records one shape.
#[derive(Debug, Clone)]
pub struct ShapeBuilder {
    mode: ShapeMode,
    contours: Vec<Contour>,
    normal: Vector3,
    curve_points: Vec<ShapeVertex>,
}

impl ShapeBuilder {
    pub fn new(mode: ShapeMode) -> Self {
        Self {
            mode,
            contours: vec![Contour::default()],
            normal: Vector3::Z,
            curve_points: Vec::new(),
        }
    }

    pub fn mode(&self) -> ShapeMode {
        self.mode
    }

    /// Total vertices recorded so far.
    pub fn len(&self) -> usize {
        self.contours.iter().map(|c| c.vertices.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Normal given to vertices recorded afterwards.
    pub fn normal(&mut self, normal: Vector3) {
        self.normal = normal;
    }

    fn current(&mut self) -> &mut Contour {
        if self.contours.is_empty() {
            self.contours.push(Contour::default());
        }
        let last = self.contours.len() - 1;
        &mut self.contours[last]
    }

    /// The vertex that bezier and quadratic segments start from.
    fn anchor(&self) -> Option<ShapeVertex> {
        self.contours.last().and_then(|c| c.vertices.last()).copied()
    }

    /// Records a vertex. Its normal is replaced by the current normal.
    pub fn vertex(&mut self, mut vertex: ShapeVertex) {
        vertex.normal = self.normal;
        self.current().vertices.push(vertex);
    }

    /// Appends a cubic segment from the last vertex through the two control
    /// points to `end`, flattened into `detail` steps. `end` supplies the
    /// color; texture coordinates are interpolated from the anchor.
    pub fn bezier_vertex(&mut self, control1: Vector3, control2: Vector3, end: ShapeVertex, detail: u32) {
        let Some(anchor) = self.anchor() else {
            tracing::warn!("bezier_vertex() must be preceded by vertex(); ignoring it");
            return;
        };
        let curve = CubicBezier::new(anchor.position, control1, control2, end.position);
        self.push_samples(anchor, end, curve.sample(detail), detail);
    }

    /// Appends a quadratic segment from the last vertex to `end`.
    pub fn quadratic_vertex(&mut self, control: Vector3, end: ShapeVertex, detail: u32) {
        let Some(anchor) = self.anchor() else {
            tracing::warn!("quadratic_vertex() must be preceded by vertex(); ignoring it");
            return;
        };
        let curve = QuadraticBezier::new(anchor.position, control, end.position);
        self.push_samples(anchor, end, curve.sample(detail), detail);
    }

    fn push_samples(
        &mut self,
        anchor: ShapeVertex,
        end: ShapeVertex,
        samples: impl Iterator<Item = Vector3>,
        detail: u32,
    ) {
        let steps = detail.max(1) as f32;
        let points: Vec<Vector3> = samples.collect();
        for (i, position) in points.into_iter().enumerate() {
            let t = (i + 1) as f32 / steps;
            self.vertex(ShapeVertex {
                position,
                uv: [
                    anchor.uv[0] + (end.uv[0] - anchor.uv[0]) * t,
                    anchor.uv[1] + (end.uv[1] - anchor.uv[1]) * t,
                ],
                color: end.color,
                normal: self.normal,
            });
        }
    }

    /// Adds a Catmull-Rom control point. Once four points are known each new
    /// point draws the span between the middle two of the last four.
    pub fn curve_vertex(&mut self, vertex: ShapeVertex, detail: u32, tightness: f32) {
        self.curve_points.push(vertex);
        let n = self.curve_points.len();
        if n < 4 {
            return;
        }
        let window = [
            self.curve_points[n - 4],
            self.curve_points[n - 3],
            self.curve_points[n - 2],
            self.curve_points[n - 1],
        ];
        if n == 4 {
            self.vertex(window[1]);
        }
        let span = CatmullRom::new(window.map(|v| v.position), tightness).to_bezier();
        self.push_samples(window[1], window[2], span.sample(detail), detail);
    }

    /// Starts a hole. Only tessellated shapes use holes.
    pub fn begin_contour(&mut self) {
        if self.mode != ShapeMode::Tess {
            tracing::warn!("begin_contour() is only supported in the default shape mode");
        }
        self.contours.push(Contour {
            vertices: Vec::new(),
            hole: true,
        });
        self.curve_points.clear();
    }

    pub fn end_contour(&mut self) {
        self.curve_points.clear();
    }

    /// Builds fill and stroke data.
    ///
    /// `want_fill` and `want_stroke` skip work for disabled passes.
    pub fn finish(
        self,
        end: EndMode,
        want_fill: bool,
        want_stroke: bool,
        tessellator: &mut Tessellator,
    ) -> Result<ShapeData> {
        if self.mode == ShapeMode::QuadStrip {
            tracing::error!("QUAD_STRIP shapes cannot be drawn in WebGL mode");
            return Err(RenderError::UnsupportedPrimitive(ShapeMode::QuadStrip));
        }

        let contours: Vec<Contour> = self
            .contours
            .into_iter()
            .filter(|c| !c.vertices.is_empty())
            .collect();
        let flat: Vec<ShapeVertex> = contours.iter().flat_map(|c| c.vertices.iter().copied()).collect();

        let mut data = ShapeData::default();
        if flat.is_empty() {
            return Ok(data);
        }

        if self.mode == ShapeMode::Points {
            data.points = flat.iter().map(|v| v.position).collect();
            return Ok(data);
        }

        if want_fill {
            data.fill = fill(self.mode, &contours, &flat, tessellator);
        }

        if want_stroke {
            let edges = edges(self.mode, &contours, end);
            if !edges.is_empty() {
                let mut line = Geometry::new(1, 1);
                for v in &flat {
                    line.push_vertex(v.position, v.uv);
                }
                *line.edges_mut() = edges;
                line.edges_to_vertices();
                data.stroke = Some(line);
            }
        }
        Ok(data)
    }
}

fn fill(
    mode: ShapeMode,
    contours: &[Contour],
    flat: &[ShapeVertex],
    tessellator: &mut Tessellator,
) -> Option<FillData> {
    let (draw_mode, vertices) = match mode {
        ShapeMode::Points | ShapeMode::Lines | ShapeMode::QuadStrip => return None,
        ShapeMode::Triangles => (DrawMode::Triangles, flat.to_vec()),
        ShapeMode::TriangleFan => (DrawMode::TriangleFan, flat.to_vec()),
        ShapeMode::TriangleStrip => (DrawMode::TriangleStrip, flat.to_vec()),
        ShapeMode::Quads => {
            let vertices = flat
                .chunks_exact(4)
                .flat_map(|q| [q[0], q[1], q[3], q[3], q[1], q[2]])
                .collect();
            (DrawMode::Triangles, vertices)
        }
        ShapeMode::Tess => {
            let input: Vec<Vec<ShapeVertex>> = contours.iter().map(|c| c.vertices.clone()).collect();
            (DrawMode::Triangles, tessellator.tessellate(&input).triangles())
        }
    };
    (!vertices.is_empty()).then_some(FillData {
        draw_mode,
        vertices,
    })
}

/// Stroke edges as indices into the flattened vertex list.
fn edges(mode: ShapeMode, contours: &[Contour], end: EndMode) -> Vec<[u32; 2]> {
    let n = contours.iter().map(|c| c.vertices.len()).sum::<usize>() as u32;
    let mut edges = Vec::new();
    match mode {
        ShapeMode::Points | ShapeMode::QuadStrip => {}
        ShapeMode::Lines => {
            for i in (0..n.saturating_sub(1)).step_by(2) {
                edges.push([i, i + 1]);
            }
        }
        ShapeMode::Triangles => {
            for i in (0..n.saturating_sub(2)).step_by(3) {
                edges.extend_from_slice(&[[i, i + 1], [i + 1, i + 2], [i + 2, i]]);
            }
        }
        ShapeMode::TriangleFan => {
            for i in 1..n.saturating_sub(1) {
                edges.push([0, i]);
                edges.push([i, i + 1]);
            }
            if n > 2 {
                edges.push([0, n - 1]);
            }
        }
        ShapeMode::TriangleStrip => {
            for i in 0..n.saturating_sub(2) {
                edges.push([i, i + 1]);
                edges.push([i, i + 2]);
            }
            if n >= 2 {
                edges.push([n - 2, n - 1]);
            }
        }
        ShapeMode::Quads => {
            for i in (0..n.saturating_sub(3)).step_by(4) {
                edges.extend_from_slice(&[[i, i + 1], [i + 1, i + 2], [i + 2, i + 3], [i + 3, i]]);
            }
        }
        ShapeMode::Tess => {
            let mut start = 0u32;
            for contour in contours {
                let len = contour.vertices.len() as u32;
                for i in start..start + len.saturating_sub(1) {
                    edges.push([i, i + 1]);
                }
                let closed = contour.hole || end == EndMode::Close;
                if closed && len > 2 {
                    edges.push([start + len - 1, start]);
                }
                start += len;
            }
        }
    }
    edges
}

/// Streaming buffers, re-filled on every immediate draw.
pub(crate) struct ImmediateBuffers {
    gl: Arc<dyn GlContext>,
    pub positions: Option<GlBuffer>,
    pub normals: Option<GlBuffer>,
    pub uvs: Option<GlBuffer>,
    pub colors: Option<GlBuffer>,
    pub line_positions: Option<GlBuffer>,
    pub line_directions: Option<GlBuffer>,
}

impl ImmediateBuffers {
    pub fn new(gl: Arc<dyn GlContext>) -> Self {
        Self {
            gl,
            positions: None,
            normals: None,
            uvs: None,
            colors: None,
            line_positions: None,
            line_directions: None,
        }
    }

    /// Writes `data` into the buffer in `slot`, creating it if needed.
    pub fn stream(gl: &dyn GlContext, slot: &mut Option<GlBuffer>, data: &[f32]) -> Result<GlBuffer> {
        let handle = match *slot {
            Some(handle) => handle,
            None => {
                let handle = gl.create_buffer()?;
                *slot = Some(handle);
                handle
            }
        };
        gl.bind_buffer(BufferTarget::Array, Some(handle));
        gl.buffer_data(BufferTarget::Array, bytemuck::cast_slice(data), BufferUsage::DynamicDraw);
        Ok(handle)
    }
}

impl Drop for ImmediateBuffers {
    fn drop(&mut self) {
        for buffer in [
            self.positions,
            self.normals,
            self.uvs,
            self.colors,
            self.line_positions,
            self.line_directions,
        ]
        .into_iter()
        .flatten()
        {
            self.gl.delete_buffer(buffer);
        }
    }
}

/// Flat attribute arrays for a vertex list.
pub(crate) struct VertexArrays {
    pub positions: Vec<f32>,
    pub normals: Vec<f32>,
    pub uvs: Vec<f32>,
    pub colors: Vec<f32>,
}

impl VertexArrays {
    pub fn from_vertices(vertices: &[ShapeVertex]) -> Self {
        let mut arrays = Self {
            positions: Vec::with_capacity(vertices.len() * 3),
            normals: Vec::with_capacity(vertices.len() * 3),
            uvs: Vec::with_capacity(vertices.len() * 2),
            colors: Vec::with_capacity(vertices.len() * 4),
        };
        for v in vertices {
            arrays.positions.extend_from_slice(&v.position.to_array());
            arrays.normals.extend_from_slice(&v.normal.to_array());
            arrays.uvs.extend_from_slice(&v.uv);
            arrays.colors.extend_from_slice(&v.color);
        }
        arrays
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(x: f32, y: f32) -> ShapeVertex {
        ShapeVertex::new(Vector3::new(x, y, 0.0))
    }

    fn record(mode: ShapeMode, points: &[(f32, f32)]) -> ShapeBuilder {
        let mut shape = ShapeBuilder::new(mode);
        for &(x, y) in points {
            shape.vertex(v(x, y));
        }
        shape
    }

    const SQUARE: [(f32, f32); 4] = [(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)];

    #[test]
    fn test_quad_strip_is_rejected() {
        let shape = record(ShapeMode::QuadStrip, &SQUARE);
        let err = shape
            .finish(EndMode::Open, true, true, &mut Tessellator::new())
            .unwrap_err();
        assert_eq!(err, RenderError::UnsupportedPrimitive(ShapeMode::QuadStrip));
    }

    #[test]
    fn test_quads_become_triangles() {
        let shape = record(ShapeMode::Quads, &SQUARE);
        let data = shape
            .finish(EndMode::Open, true, true, &mut Tessellator::new())
            .unwrap();
        let fill = data.fill.unwrap();
        assert_eq!(fill.draw_mode, DrawMode::Triangles);
        let order: Vec<_> = fill.vertices.iter().map(|v| (v.position.x, v.position.y)).collect();
        assert_eq!(
            order,
            [SQUARE[0], SQUARE[1], SQUARE[3], SQUARE[3], SQUARE[1], SQUARE[2]]
        );
        // four border edges, six line vertices each
        assert_eq!(data.stroke.unwrap().line_vertices().len(), 24);
    }

    #[test]
    fn test_tess_close_adds_closing_edge() {
        let open = record(ShapeMode::Tess, &SQUARE)
            .finish(EndMode::Open, true, true, &mut Tessellator::new())
            .unwrap();
        let closed = record(ShapeMode::Tess, &SQUARE)
            .finish(EndMode::Close, true, true, &mut Tessellator::new())
            .unwrap();
        assert_eq!(open.stroke.unwrap().edges().len(), 3);
        assert_eq!(closed.stroke.unwrap().edges().len(), 4);
        assert_eq!(closed.fill.unwrap().vertices.len(), 6);
    }

    #[test]
    fn test_hole_contour_is_closed_and_cut() {
        let mut shape = record(ShapeMode::Tess, &SQUARE);
        shape.begin_contour();
        for (x, y) in [(3.0, 3.0), (3.0, 6.0), (6.0, 6.0), (6.0, 3.0)] {
            shape.vertex(v(x, y));
        }
        shape.end_contour();
        let data = shape
            .finish(EndMode::Close, true, true, &mut Tessellator::new())
            .unwrap();
        assert_eq!(data.stroke.unwrap().edges().len(), 8);
        let area: f32 = data
            .fill
            .unwrap()
            .vertices
            .chunks(3)
            .map(|t| (t[1].position - t[0].position).cross(t[2].position - t[0].position).mag() / 2.0)
            .sum();
        assert!((area - 91.0).abs() < 1e-2, "{area}");
    }

    #[test]
    fn test_bezier_needs_anchor_and_ends_on_target() {
        let mut shape = ShapeBuilder::new(ShapeMode::Tess);
        shape.bezier_vertex(Vector3::X, Vector3::Y, v(5.0, 5.0), 10);
        assert!(shape.is_empty());

        shape.vertex(v(0.0, 0.0));
        let mut end = v(5.0, 5.0);
        end.uv = [1.0, 1.0];
        shape.bezier_vertex(Vector3::new(0.0, 5.0, 0.0), Vector3::new(5.0, 0.0, 0.0), end, 10);
        assert_eq!(shape.len(), 11);
        let last = shape.anchor().unwrap();
        assert_eq!(last.position, end.position);
        assert_eq!(last.uv, [1.0, 1.0]);
    }

    #[test]
    fn test_quadratic_and_bezier_share_anchor() {
        let mut shape = record(ShapeMode::Tess, &[(0.0, 0.0)]);
        shape.quadratic_vertex(Vector3::new(5.0, 5.0, 0.0), v(10.0, 0.0), 4);
        shape.bezier_vertex(Vector3::new(10.0, 5.0, 0.0), Vector3::new(0.0, 5.0, 0.0), v(0.0, 10.0), 4);
        assert_eq!(shape.len(), 9);
        let anchor = shape.anchor().unwrap();
        assert_eq!(anchor.position, Vector3::new(0.0, 10.0, 0.0));
    }

    #[test]
    fn test_curve_vertices_span_middle_points() {
        let mut shape = ShapeBuilder::new(ShapeMode::Tess);
        for (x, y) in [(0.0, 0.0), (1.0, 0.0), (2.0, 1.0), (3.0, 1.0)] {
            shape.curve_vertex(v(x, y), 5, 0.0);
        }
        // p1 plus five samples ending at p2
        assert_eq!(shape.len(), 6);
        assert_eq!(shape.anchor().unwrap().position, Vector3::new(2.0, 1.0, 0.0));
        shape.curve_vertex(v(4.0, 0.0), 5, 0.0);
        assert_eq!(shape.len(), 11);
    }

    #[test]
    fn test_points_and_lines() {
        let points = record(ShapeMode::Points, &SQUARE)
            .finish(EndMode::Open, true, true, &mut Tessellator::new())
            .unwrap();
        assert_eq!(points.points.len(), 4);
        assert!(points.fill.is_none() && points.stroke.is_none());

        let lines = record(ShapeMode::Lines, &SQUARE)
            .finish(EndMode::Open, true, true, &mut Tessellator::new())
            .unwrap();
        assert!(lines.fill.is_none());
        assert_eq!(lines.stroke.unwrap().edges(), &[[0, 1], [2, 3]]);
    }

    #[test]
    fn test_strip_and_fan_edges() {
        let contour = Contour {
            vertices: SQUARE.iter().map(|&(x, y)| v(x, y)).collect(),
            hole: false,
        };
        let fan = edges(ShapeMode::TriangleFan, std::slice::from_ref(&contour), EndMode::Open);
        assert_eq!(fan, vec![[0, 1], [1, 2], [0, 2], [2, 3], [0, 3]]);
        let strip = edges(ShapeMode::TriangleStrip, std::slice::from_ref(&contour), EndMode::Open);
        assert_eq!(strip, vec![[0, 1], [0, 2], [1, 2], [1, 3], [2, 3]]);
    }

    #[test]
    fn test_vertex_arrays_layout() {
        let mut a = v(1.0, 2.0);
        a.color = [0.5, 0.5, 0.5, 1.0];
        let arrays = VertexArrays::from_vertices(&[a]);
        assert_eq!(arrays.positions, vec![1.0, 2.0, 0.0]);
        assert_eq!(arrays.normals, vec![0.0, 0.0, 1.0]);
        assert_eq!(arrays.colors, vec![0.5, 0.5, 0.5, 1.0]);
    }
}
