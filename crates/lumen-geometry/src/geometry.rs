//! Triangle mesh with derived stroke data.

use std::sync::atomic::{AtomicU64, Ordering};

use lumen_core::math::Vector3;

static NEXT_GEOMETRY_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

fn next_generation() -> u64 {
    NEXT_GENERATION.fetch_add(1, Ordering::Relaxed)
}

/// A triangle mesh plus the line geometry used to stroke it.
///
/// Every structural change goes through a `&mut self` method, which moves the
/// geometry to a fresh [`generation`](Self::generation). Buffer caches compare
/// the generation they uploaded against the current one to decide whether GPU
/// data is stale.
///
/// Line data is derived: [`make_triangle_edges`](Self::make_triangle_edges)
/// fills `edges`, then [`edges_to_vertices`](Self::edges_to_vertices) expands
/// every edge into six line vertices (two triangles) whose `line_normals`
/// carry the edge direction and a `±1` side flag in `w`.
#[derive(Debug)]
pub struct Geometry {
    id: u64,
    generation: u64,
    detail_x: u32,
    detail_y: u32,
    vertices: Vec<Vector3>,
    vertex_normals: Vec<Vector3>,
    uvs: Vec<f32>,
    vertex_colors: Vec<f32>,
    faces: Vec<[u32; 3]>,
    edges: Vec<[u32; 2]>,
    stroke_indices: Option<Vec<[u32; 2]>>,
    line_vertices: Vec<Vector3>,
    line_normals: Vec<[f32; 4]>,
}

impl Geometry {
    /// An empty geometry describing a `detail_x × detail_y` grid.
    ///
    /// Details below 1 are raised to 1.
    pub fn new(detail_x: u32, detail_y: u32) -> Self {
        Self {
            id: NEXT_GEOMETRY_ID.fetch_add(1, Ordering::Relaxed),
            generation: next_generation(),
            detail_x: detail_x.max(1),
            detail_y: detail_y.max(1),
            vertices: Vec::new(),
            vertex_normals: Vec::new(),
            uvs: Vec::new(),
            vertex_colors: Vec::new(),
            faces: Vec::new(),
            edges: Vec::new(),
            stroke_indices: None,
            line_vertices: Vec::new(),
            line_normals: Vec::new(),
        }
    }

    /// Builds a geometry from already computed arrays.
    pub fn from_parts(
        detail_x: u32,
        detail_y: u32,
        vertices: Vec<Vector3>,
        vertex_normals: Vec<Vector3>,
        uvs: Vec<f32>,
        faces: Vec<[u32; 3]>,
    ) -> Self {
        Self {
            vertices,
            vertex_normals,
            uvs,
            faces,
            ..Self::new(detail_x, detail_y)
        }
    }

    /// Process-unique identity, stable across mutations.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn touch(&mut self) {
        self.generation = next_generation();
    }

    pub fn detail_x(&self) -> u32 {
        self.detail_x
    }

    pub fn detail_y(&self) -> u32 {
        self.detail_y
    }

    pub fn vertices(&self) -> &[Vector3] {
        &self.vertices
    }

    pub fn vertex_normals(&self) -> &[Vector3] {
        &self.vertex_normals
    }

    /// Texture coordinates, two floats per vertex.
    pub fn uvs(&self) -> &[f32] {
        &self.uvs
    }

    /// Per-vertex RGBA colors in `0..=1`, four floats per vertex. Empty when
    /// the geometry is drawn with the material color.
    pub fn vertex_colors(&self) -> &[f32] {
        &self.vertex_colors
    }

    pub fn faces(&self) -> &[[u32; 3]] {
        &self.faces
    }

    pub fn edges(&self) -> &[[u32; 2]] {
        &self.edges
    }

    pub fn stroke_indices(&self) -> Option<&[[u32; 2]]> {
        self.stroke_indices.as_deref()
    }

    pub fn line_vertices(&self) -> &[Vector3] {
        &self.line_vertices
    }

    pub fn line_normals(&self) -> &[[f32; 4]] {
        &self.line_normals
    }

    /// Vertex positions as a flat float slice.
    pub fn vertex_data(&self) -> &[f32] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn normal_data(&self) -> &[f32] {
        bytemuck::cast_slice(&self.vertex_normals)
    }

    pub fn line_vertex_data(&self) -> &[f32] {
        bytemuck::cast_slice(&self.line_vertices)
    }

    pub fn line_normal_data(&self) -> &[f32] {
        bytemuck::cast_slice(&self.line_normals)
    }

    /// Face indices as a flat slice.
    pub fn index_data(&self) -> &[u32] {
        bytemuck::cast_slice(&self.faces)
    }

    pub fn vertices_mut(&mut self) -> &mut Vec<Vector3> {
        self.touch();
        &mut self.vertices
    }

    pub fn vertex_normals_mut(&mut self) -> &mut Vec<Vector3> {
        self.touch();
        &mut self.vertex_normals
    }

    pub fn uvs_mut(&mut self) -> &mut Vec<f32> {
        self.touch();
        &mut self.uvs
    }

    pub fn vertex_colors_mut(&mut self) -> &mut Vec<f32> {
        self.touch();
        &mut self.vertex_colors
    }

    pub fn faces_mut(&mut self) -> &mut Vec<[u32; 3]> {
        self.touch();
        &mut self.faces
    }

    pub fn edges_mut(&mut self) -> &mut Vec<[u32; 2]> {
        self.touch();
        &mut self.edges
    }

    /// Overrides the edges derived from faces with an explicit outline.
    pub fn set_stroke_indices(&mut self, indices: Vec<[u32; 2]>) -> &mut Self {
        self.touch();
        self.stroke_indices = Some(indices);
        self
    }

    /// Appends a vertex with its texture coordinate.
    pub fn push_vertex(&mut self, position: Vector3, uv: [f32; 2]) -> u32 {
        self.touch();
        self.vertices.push(position);
        self.uvs.extend_from_slice(&uv);
        self.vertices.len() as u32 - 1
    }

    /// Emits two triangles `(a, b, d)` and `(d, b, c)` for every cell of the
    /// `detail_x × detail_y` vertex grid.
    pub fn compute_faces(&mut self) -> &mut Self {
        self.touch();
        self.faces.clear();
        let slice_count = self.detail_x + 1;
        for i in 0..self.detail_y {
            for j in 0..self.detail_x {
                let a = i * slice_count + j;
                let b = i * slice_count + j + 1;
                let c = (i + 1) * slice_count + j + 1;
                let d = (i + 1) * slice_count + j;
                self.faces.push([a, b, d]);
                self.faces.push([d, b, c]);
            }
        }
        self
    }

    /// Corner positions of `face`, or `None` when the face or one of its
    /// indices is out of range.
    fn face_vertices(&self, face: usize) -> Option<[Vector3; 3]> {
        let [a, b, c] = *self.faces.get(face)?;
        Some([
            *self.vertices.get(a as usize)?,
            *self.vertices.get(b as usize)?,
            *self.vertices.get(c as usize)?,
        ])
    }

    /// Normal of `face` scaled by the angle at its first vertex.
    ///
    /// Degenerate faces log a warning and return the raw (possibly zero)
    /// cross product. A face that refers to a missing vertex has a zero normal.
    pub fn face_normal(&self, face: usize) -> Vector3 {
        let Some([va, vb, vc]) = self.face_vertices(face) else {
            tracing::warn!("face {face} refers to a vertex that does not exist; using a zero normal");
            return Vector3::ZERO;
        };

        let ab = vb - va;
        let ac = vc - va;
        let n = ab.cross(ac);
        let ln = n.mag();
        let mut sin_alpha = ln / (ab.mag() * ac.mag());
        if sin_alpha == 0.0 || sin_alpha.is_nan() {
            tracing::warn!(
                "face {face} has colinear sides or a repeated vertex; its normal is degenerate"
            );
            return n;
        }
        if sin_alpha > 1.0 {
            sin_alpha = 1.0;
        }
        n * (sin_alpha.asin() / ln)
    }

    /// Smooth vertex normals: each vertex gets the normalized sum of the
    /// angle-weighted normals of the faces touching it.
    pub fn compute_normals(&mut self) -> &mut Self {
        let mut normals = vec![Vector3::ZERO; self.vertices.len()];
        for (f, face) in self.faces.iter().enumerate() {
            let face_normal = self.face_normal(f);
            for &v in face {
                if let Some(normal) = normals.get_mut(v as usize) {
                    *normal += face_normal;
                }
            }
        }
        for n in &mut normals {
            *n = n.normalize();
        }
        self.touch();
        self.vertex_normals = normals;
        self
    }

    /// Makes the first and last column of every grid row share one normal,
    /// closing the seam of revolved surfaces.
    pub fn average_normals(&mut self) -> &mut Self {
        let offset = (self.detail_x + 1) as usize;
        let last = self.detail_x as usize;
        for i in 0..=self.detail_y as usize {
            let (first, end) = (i * offset, i * offset + last);
            if end >= self.vertex_normals.len() {
                break;
            }
            let avg = (self.vertex_normals[first] + self.vertex_normals[end]).normalize();
            self.vertex_normals[first] = avg;
            self.vertex_normals[end] = avg;
        }
        self.touch();
        self
    }

    /// Gives the coincident vertices at each pole a single shared normal.
    pub fn average_pole_normals(&mut self) -> &mut Self {
        let n = self.detail_x as usize;
        let len = self.vertex_normals.len();
        if len < 2 * n {
            return self;
        }

        let north = self.vertex_normals[..n]
            .iter()
            .fold(Vector3::ZERO, |acc, v| acc + *v)
            .div_scalar(n as f32);
        self.vertex_normals[..n].fill(north);

        let south = self.vertex_normals[len - n..]
            .iter()
            .fold(Vector3::ZERO, |acc, v| acc + *v)
            .div_scalar(n as f32);
        self.vertex_normals[len - n..].fill(south);

        self.touch();
        self
    }

    /// Fills `edges` from the explicit stroke indices when present, otherwise
    /// from all three sides of every face.
    pub fn make_triangle_edges(&mut self) -> &mut Self {
        self.touch();
        self.edges.clear();
        match &self.stroke_indices {
            Some(indices) => self.edges.extend_from_slice(indices),
            None => {
                for &[a, b, c] in &self.faces {
                    self.edges.push([a, b]);
                    self.edges.push([b, c]);
                    self.edges.push([c, a]);
                }
            }
        }
        self
    }

    /// Expands every edge into six line vertices. Edges naming a missing
    /// vertex are skipped with a warning.
    ///
    /// The vertices are `begin, begin, end, end, begin, end`; the matching
    /// normals are the edge direction with `w` set to `+1, -1, +1, +1, -1, -1`
    /// so the vertex shader can push each one to its side of the line.
    pub fn edges_to_vertices(&mut self) -> &mut Self {
        self.touch();
        self.line_vertices.clear();
        self.line_normals.clear();
        for &[b, e] in &self.edges {
            let (Some(&begin), Some(&end)) = (self.vertices.get(b as usize), self.vertices.get(e as usize))
            else {
                tracing::warn!(
                    "edge [{b}, {e}] refers to a vertex that does not exist ({} vertices); skipping it",
                    self.vertices.len()
                );
                continue;
            };
            let dir = (end - begin).try_normalize().unwrap_or(Vector3::ZERO);
            let add = [dir.x, dir.y, dir.z, 1.0];
            let sub = [dir.x, dir.y, dir.z, -1.0];
            self.line_normals.extend_from_slice(&[add, sub, add, add, sub, sub]);
            self.line_vertices
                .extend_from_slice(&[begin, begin, end, end, begin, end]);
        }
        self
    }

    /// Centers the vertices on the origin and scales them uniformly so the
    /// longest side of the bounding box is 200 units.
    pub fn normalize(&mut self) -> &mut Self {
        let Some(&first) = self.vertices.first() else {
            return self;
        };
        let (min, max) = self
            .vertices
            .iter()
            .fold((first, first), |(lo, hi), v| (lo.min(*v), hi.max(*v)));
        let center = max.lerp(min, 0.5);
        let dist = max - min;
        let longest = dist.x.max(dist.y).max(dist.z);

        let scale = if longest > 0.0 {
            200.0 / longest
        } else {
            tracing::warn!("normalize() on a geometry with zero extent only recenters it");
            1.0
        };
        for v in &mut self.vertices {
            *v = (*v - center) * scale;
        }
        self.touch();
        self
    }

    /// Mirrors texture coordinates horizontally.
    pub fn flip_u(&mut self) -> &mut Self {
        for u in self.uvs.iter_mut().step_by(2) {
            *u = 1.0 - *u;
        }
        self.touch();
        self
    }

    /// Mirrors texture coordinates vertically.
    pub fn flip_v(&mut self) -> &mut Self {
        for v in self.uvs.iter_mut().skip(1).step_by(2) {
            *v = 1.0 - *v;
        }
        self.touch();
        self
    }

    /// True when any face index exceeds the `u16` range.
    pub fn needs_u32_indices(&self) -> bool {
        self.faces.iter().flatten().any(|&i| i > u16::MAX as u32)
    }
}

impl Clone for Geometry {
    /// Clones get their own identity so they never alias another geometry's
    /// cache entry.
    fn clone(&self) -> Self {
        Self {
            id: NEXT_GEOMETRY_ID.fetch_add(1, Ordering::Relaxed),
            generation: next_generation(),
            detail_x: self.detail_x,
            detail_y: self.detail_y,
            vertices: self.vertices.clone(),
            vertex_normals: self.vertex_normals.clone(),
            uvs: self.uvs.clone(),
            vertex_colors: self.vertex_colors.clone(),
            faces: self.faces.clone(),
            edges: self.edges.clone(),
            stroke_indices: self.stroke_indices.clone(),
            line_vertices: self.line_vertices.clone(),
            line_normals: self.line_normals.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(detail_x: u32, detail_y: u32) -> Geometry {
        let mut g = Geometry::new(detail_x, detail_y);
        for i in 0..=detail_y {
            for j in 0..=detail_x {
                let (u, v) = (j as f32 / detail_x as f32, i as f32 / detail_y as f32);
                g.push_vertex(Vector3::new(u, v, 0.0), [u, v]);
            }
        }
        g.compute_faces();
        g
    }

    #[test]
    fn test_compute_faces_grid() {
        let g = grid(2, 1);
        assert_eq!(g.faces(), &[[0, 1, 3], [3, 1, 4], [1, 2, 4], [4, 2, 5]]);
    }

    #[test]
    fn test_flat_grid_normals_face_z() {
        let mut g = grid(3, 3);
        g.compute_normals();
        for n in g.vertex_normals() {
            assert!(n.abs_diff_eq(Vector3::Z, 1e-5), "{n:?}");
        }
    }

    #[test]
    fn test_degenerate_face_does_not_panic() {
        let mut g = Geometry::new(1, 1);
        g.push_vertex(Vector3::ZERO, [0.0, 0.0]);
        g.push_vertex(Vector3::ZERO, [0.0, 0.0]);
        g.push_vertex(Vector3::X, [1.0, 0.0]);
        g.faces_mut().push([0, 1, 2]);
        g.compute_normals();
        assert_eq!(g.vertex_normals().len(), 3);
        assert!(g.vertex_normals().iter().all(|n| !n.x.is_nan()));
    }

    #[test]
    fn test_out_of_range_indices_are_skipped() {
        let mut g = grid(1, 1);
        g.faces_mut().push([0, 1, 99]);
        g.compute_normals();
        assert_eq!(g.face_normal(4), Vector3::ZERO);
        assert_eq!(g.face_normal(100), Vector3::ZERO);
        assert!(g.vertex_normals().iter().all(|n| n.abs_diff_eq(Vector3::Z, 1e-5)));

        g.edges_mut().clear();
        g.edges_mut().push([0, 1]);
        g.edges_mut().push([0, 999]);
        g.edges_to_vertices();
        assert_eq!(g.line_vertices().len(), 6);
        assert_eq!(g.line_normals().len(), 6);
    }

    #[test]
    fn test_edges_from_faces_and_stroke_indices() {
        let mut g = grid(1, 1);
        g.make_triangle_edges();
        assert_eq!(g.edges().len(), 6);

        g.set_stroke_indices(vec![[0, 1], [1, 3], [3, 2], [2, 0]]);
        g.make_triangle_edges();
        assert_eq!(g.edges(), &[[0, 1], [1, 3], [3, 2], [2, 0]]);
    }

    #[test]
    fn test_edges_to_vertices_layout() {
        let mut g = Geometry::new(1, 1);
        g.push_vertex(Vector3::ZERO, [0.0, 0.0]);
        g.push_vertex(Vector3::new(2.0, 0.0, 0.0), [1.0, 0.0]);
        g.edges_mut().push([0, 1]);
        g.edges_to_vertices();

        assert_eq!(g.line_vertices().len(), 6);
        assert_eq!(g.line_vertices()[0], Vector3::ZERO);
        assert_eq!(g.line_vertices()[2], Vector3::new(2.0, 0.0, 0.0));
        let sides: Vec<f32> = g.line_normals().iter().map(|n| n[3]).collect();
        assert_eq!(sides, vec![1.0, -1.0, 1.0, 1.0, -1.0, -1.0]);
        assert_eq!(g.line_normals()[0][..3], [1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_normalize_fits_200_cube() {
        let mut g = Geometry::new(1, 1);
        g.push_vertex(Vector3::new(10.0, 10.0, 10.0), [0.0, 0.0]);
        g.push_vertex(Vector3::new(20.0, 15.0, 10.0), [0.0, 0.0]);
        g.normalize();
        assert!(g.vertices()[0].abs_diff_eq(Vector3::new(-100.0, -50.0, 0.0), 1e-3));
        assert!(g.vertices()[1].abs_diff_eq(Vector3::new(100.0, 50.0, 0.0), 1e-3));
    }

    #[test]
    fn test_mutation_bumps_generation() {
        let mut g = Geometry::new(1, 1);
        let before = g.generation();
        g.vertices_mut().push(Vector3::ZERO);
        assert!(g.generation() > before);

        let c = g.clone();
        assert_ne!(c.id(), g.id());
    }

    #[test]
    fn test_flip_uv() {
        let mut g = Geometry::new(1, 1);
        g.push_vertex(Vector3::ZERO, [0.25, 0.75]);
        g.flip_u();
        assert_eq!(g.uvs(), &[0.75, 0.75]);
        g.flip_v();
        assert_eq!(g.uvs(), &[0.75, 0.25]);
    }
}
