//! Unit-sized retained primitives and their cache keys.
//!
//! Every primitive is built once at unit size and scaled by the model matrix
//! at draw time, so the cache key only encodes what changes topology.

use std::f32::consts::{PI, TAU};
use std::fmt;

use lumen_core::math::{Matrix4, Vector3};
use lumen_core::profiling::profile_function;

use crate::Geometry;

/// How an arc's open side is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ArcMode {
    /// Closed through the center, like a pie slice.
    #[default]
    Pie,
    /// Closed by a straight chord between the endpoints.
    Chord,
    /// Filled like a chord but stroked only along the curve.
    Open,
}

impl fmt::Display for ArcMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ArcMode::Pie => "pie",
            ArcMode::Chord => "chord",
            ArcMode::Open => "open",
        })
    }
}

/// A retained primitive shape with its tessellation parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Primitive {
    /// Unit square in the XY plane centered on the origin.
    Plane { detail_x: u32, detail_y: u32 },
    /// Unit cube centered on the origin.
    Box { detail_x: u32, detail_y: u32 },
    /// Unit sphere, scaled per axis into an ellipsoid.
    Ellipsoid { detail_x: u32, detail_y: u32 },
    /// Radius 1, height 1 cylinder along Y.
    Cylinder {
        detail_x: u32,
        detail_y: u32,
        bottom_cap: bool,
        top_cap: bool,
    },
    /// Radius 1, height 1 cone along Y, apex up.
    Cone { detail_x: u32, detail_y: u32, cap: bool },
    /// Torus with ring radius 1 and the given tube to ring ratio.
    Torus {
        tube_ratio: f32,
        detail_x: u32,
        detail_y: u32,
    },
    /// Unit-diameter ellipse centered on the origin.
    Ellipse { detail: u32 },
    /// Unit-diameter arc between two angles.
    Arc {
        start: f32,
        stop: f32,
        mode: ArcMode,
        detail: u32,
    },
    /// Unit rectangle spanning `(0, 0)..(1, 1)`.
    Rect { detail_x: u32, detail_y: u32 },
    /// Triangle `(0, 0), (1, 0), (0, 1)`; see [`triangle_transform`].
    Triangle,
}

impl Primitive {
    pub const fn plane() -> Self {
        Primitive::Plane {
            detail_x: 1,
            detail_y: 1,
        }
    }

    pub const fn cube() -> Self {
        Primitive::Box {
            detail_x: 4,
            detail_y: 4,
        }
    }

    pub const fn sphere() -> Self {
        Primitive::Ellipsoid {
            detail_x: 24,
            detail_y: 16,
        }
    }

    pub const fn cylinder() -> Self {
        Primitive::Cylinder {
            detail_x: 24,
            detail_y: 1,
            bottom_cap: true,
            top_cap: true,
        }
    }

    pub const fn cone() -> Self {
        Primitive::Cone {
            detail_x: 24,
            detail_y: 1,
            cap: true,
        }
    }

    pub const fn torus(tube_ratio: f32) -> Self {
        Primitive::Torus {
            tube_ratio,
            detail_x: 24,
            detail_y: 16,
        }
    }

    pub const fn ellipse() -> Self {
        Primitive::Ellipse { detail: 25 }
    }

    pub const fn rect() -> Self {
        Primitive::Rect {
            detail_x: 1,
            detail_y: 1,
        }
    }

    /// Cache key naming the primitive kind and every parameter that affects
    /// its topology, e.g. `torus|0.3333|24|16`.
    pub fn key(&self) -> String {
        match *self {
            Primitive::Plane { detail_x, detail_y } => format!("plane|{detail_x}|{detail_y}"),
            Primitive::Box { detail_x, detail_y } => format!("box|{detail_x}|{detail_y}"),
            Primitive::Ellipsoid { detail_x, detail_y } => {
                format!("ellipsoid|{detail_x}|{detail_y}")
            }
            Primitive::Cylinder {
                detail_x,
                detail_y,
                bottom_cap,
                top_cap,
            } => format!("cylinder|{detail_x}|{detail_y}|{bottom_cap}|{top_cap}"),
            Primitive::Cone {
                detail_x,
                detail_y,
                cap,
            } => format!("cone|{detail_x}|{detail_y}|{cap}"),
            Primitive::Torus {
                tube_ratio,
                detail_x,
                detail_y,
            } => format!("torus|{}|{detail_x}|{detail_y}", to_precision(tube_ratio, 4)),
            Primitive::Ellipse { detail } => format!("ellipse|{detail}"),
            Primitive::Arc {
                start,
                stop,
                mode,
                detail,
            } => format!("arc|{start}|{stop}|{mode}|{detail}"),
            Primitive::Rect { detail_x, detail_y } => format!("rect|{detail_x}|{detail_y}"),
            Primitive::Triangle => "tri".to_string(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Primitive::Plane { .. } => "plane",
            Primitive::Box { .. } => "box",
            Primitive::Ellipsoid { .. } => "ellipsoid",
            Primitive::Cylinder { .. } => "cylinder",
            Primitive::Cone { .. } => "cone",
            Primitive::Torus { .. } => "torus",
            Primitive::Ellipse { .. } => "ellipse",
            Primitive::Arc { .. } => "arc",
            Primitive::Rect { .. } => "rect",
            Primitive::Triangle => "triangle",
        }
    }

    /// Largest `(detail_x, detail_y)` for which stroke edges are generated.
    /// `None` means strokes are always generated.
    pub fn stroke_limit(&self) -> Option<(u32, u32)> {
        match self {
            Primitive::Plane { .. } => Some((1, 1)),
            Primitive::Box { .. } => Some((4, 4)),
            Primitive::Ellipsoid { .. } => Some((24, 24)),
            Primitive::Cylinder { .. } | Primitive::Cone { .. } | Primitive::Torus { .. } => {
                Some((24, 16))
            }
            Primitive::Ellipse { .. } | Primitive::Arc { .. } => Some((50, u32::MAX)),
            Primitive::Rect { .. } | Primitive::Triangle => None,
        }
    }

    fn details(&self) -> (u32, u32) {
        match *self {
            Primitive::Plane { detail_x, detail_y }
            | Primitive::Box { detail_x, detail_y }
            | Primitive::Ellipsoid { detail_x, detail_y }
            | Primitive::Cylinder {
                detail_x, detail_y, ..
            }
            | Primitive::Cone {
                detail_x, detail_y, ..
            }
            | Primitive::Torus {
                detail_x, detail_y, ..
            }
            | Primitive::Rect { detail_x, detail_y } => (detail_x, detail_y),
            Primitive::Ellipse { detail } | Primitive::Arc { detail, .. } => (detail, 1),
            Primitive::Triangle => (1, 1),
        }
    }

    /// Whether [`build`](Self::build) will produce stroke geometry.
    pub fn supports_stroke(&self) -> bool {
        let (dx, dy) = self.details();
        self.stroke_limit()
            .is_none_or(|(max_x, max_y)| dx <= max_x && dy <= max_y)
    }

    /// Builds the unit geometry with normals, and with stroke edges when the
    /// detail is within [`stroke_limit`](Self::stroke_limit). Above the limit
    /// the fill is still complete; the edges stay empty and a warning is
    /// logged.
    pub fn build(&self) -> Geometry {
        profile_function!();
        let mut geometry = match *self {
            Primitive::Plane { detail_x, detail_y } => plane(detail_x, detail_y),
            Primitive::Box { detail_x, detail_y } => cube(detail_x, detail_y),
            Primitive::Ellipsoid { detail_x, detail_y } => ellipsoid(detail_x, detail_y),
            Primitive::Cylinder {
                detail_x,
                detail_y,
                bottom_cap,
                top_cap,
            } => truncated_cone(1.0, 1.0, detail_x, detail_y, bottom_cap, top_cap),
            Primitive::Cone {
                detail_x,
                detail_y,
                cap,
            } => truncated_cone(1.0, 0.0, detail_x, detail_y, cap, false),
            Primitive::Torus {
                tube_ratio,
                detail_x,
                detail_y,
            } => torus(tube_ratio, detail_x, detail_y),
            Primitive::Ellipse { detail } => arc(0.0, TAU, ArcMode::Pie, detail, true),
            Primitive::Arc {
                start,
                stop,
                mode,
                detail,
            } => arc(start, stop, mode, detail, (stop - start).abs() >= TAU),
            Primitive::Rect { detail_x, detail_y } => rect(detail_x, detail_y),
            Primitive::Triangle => triangle(),
        };

        if self.supports_stroke() {
            geometry.make_triangle_edges().edges_to_vertices();
        } else {
            let (dx, dy) = self.details();
            let (max_x, max_y) = self.stroke_limit().unwrap_or((dx, dy));
            tracing::warn!(
                "cannot draw stroke on {} with detail {}x{} (stroke limit {}x{})",
                self.name(),
                dx,
                dy,
                max_x,
                max_y
            );
        }
        geometry
    }
}

/// Model matrix factor that maps the unit [`Primitive::Triangle`] onto the
/// triangle `p1, p2, p3` in the XY plane.
pub fn triangle_transform(p1: [f32; 2], p2: [f32; 2], p3: [f32; 2]) -> Matrix4 {
    #[rustfmt::skip]
    let m = Matrix4::from_array([
        p2[0] - p1[0], p2[1] - p1[1], 0.0, 0.0,
        p3[0] - p1[0], p3[1] - p1[1], 0.0, 0.0,
        0.0, 0.0, 1.0, 0.0,
        p1[0], p1[1], 0.0, 1.0,
    ]);
    m
}

/// Formats like JavaScript's `Number.prototype.toPrecision` for ordinary
/// magnitudes.
pub fn to_precision(value: f32, digits: i32) -> String {
    if value == 0.0 || !value.is_finite() {
        return format!("{:.*}", (digits - 1).max(0) as usize, value);
    }
    let exponent = value.abs().log10().floor() as i32;
    let decimals = (digits - 1 - exponent).max(0) as usize;
    format!("{value:.decimals$}")
}

fn grid(detail_x: u32, detail_y: u32, mut vertex: impl FnMut(f32, f32) -> (Vector3, Vector3)) -> Geometry {
    let dx = detail_x.max(1);
    let dy = detail_y.max(1);
    let mut vertices = Vec::with_capacity(((dx + 1) * (dy + 1)) as usize);
    let mut normals = Vec::with_capacity(vertices.capacity());
    let mut uvs = Vec::with_capacity(vertices.capacity() * 2);
    for i in 0..=dy {
        let v = i as f32 / dy as f32;
        for j in 0..=dx {
            let u = j as f32 / dx as f32;
            let (p, n) = vertex(u, v);
            vertices.push(p);
            normals.push(n);
            uvs.extend_from_slice(&[u, v]);
        }
    }
    let mut geometry = Geometry::from_parts(dx, dy, vertices, normals, uvs, Vec::new());
    geometry.compute_faces();
    geometry
}

fn plane(detail_x: u32, detail_y: u32) -> Geometry {
    let mut geometry = grid(detail_x, detail_y, |u, v| {
        (Vector3::new(u - 0.5, v - 0.5, 0.0), Vector3::Z)
    });
    geometry.compute_normals();
    let (dx, dy) = (geometry.detail_x(), geometry.detail_y());
    let (bl, br, tl, tr) = (0, dx, (dx + 1) * dy, (dx + 1) * (dy + 1) - 1);
    geometry.set_stroke_indices(vec![[bl, br], [br, tr], [tr, tl], [tl, bl]]);
    geometry
}

/// Corner ids of each face; bit 0 selects +x, bit 1 +y, bit 2 +z.
const CUBE_INDICES: [[u32; 4]; 6] = [
    [0, 4, 2, 6], // -x
    [1, 3, 5, 7], // +x
    [0, 1, 4, 5], // -y
    [2, 6, 3, 7], // +y
    [0, 2, 1, 3], // -z
    [4, 5, 6, 7], // +z
];

const CUBE_STROKE_INDICES: [[u32; 2]; 12] = [
    [0, 1],
    [1, 3],
    [3, 2],
    [6, 7],
    [8, 9],
    [9, 11],
    [14, 15],
    [16, 17],
    [17, 19],
    [18, 19],
    [20, 21],
    [22, 23],
];

fn cube(detail_x: u32, detail_y: u32) -> Geometry {
    let mut geometry = Geometry::new(detail_x, detail_y);
    for (i, corners) in CUBE_INDICES.iter().enumerate() {
        let v = i as u32 * 4;
        for (j, &d) in corners.iter().enumerate() {
            let octant = Vector3::new(
                ((d & 1) * 2) as f32 / 2.0 - 0.5,
                (d & 2) as f32 / 2.0 - 0.5,
                (d & 4) as f32 / 4.0 - 0.5,
            );
            geometry.push_vertex(octant, [(j & 1) as f32, ((j & 2) / 2) as f32]);
        }
        let faces = geometry.faces_mut();
        faces.push([v, v + 1, v + 2]);
        faces.push([v + 2, v + 1, v + 3]);
    }
    geometry.compute_normals();
    geometry.set_stroke_indices(CUBE_STROKE_INDICES.to_vec());
    geometry
}

fn ellipsoid(detail_x: u32, detail_y: u32) -> Geometry {
    grid(detail_x, detail_y, |u, v| {
        let phi = PI * v - PI / 2.0;
        let theta = TAU * u;
        let (sin_phi, cos_phi) = phi.sin_cos();
        let (sin_theta, cos_theta) = theta.sin_cos();
        let p = Vector3::new(cos_phi * sin_theta, sin_phi, cos_phi * cos_theta);
        (p, p)
    })
}

fn torus(tube_ratio: f32, detail_x: u32, detail_y: u32) -> Geometry {
    // Build from the rounded ratio so geometry and cache key agree.
    let ratio: f32 = to_precision(tube_ratio, 4).parse().unwrap_or(tube_ratio);
    grid(detail_x, detail_y, |u, v| {
        let phi = TAU * v;
        let theta = TAU * u;
        let (sin_phi, cos_phi) = phi.sin_cos();
        let (sin_theta, cos_theta) = theta.sin_cos();
        let r = 1.0 + ratio * cos_phi;
        (
            Vector3::new(r * cos_theta, r * sin_theta, ratio * sin_phi),
            Vector3::new(cos_phi * cos_theta, cos_phi * sin_theta, sin_phi),
        )
    })
}

/// Cylinder or cone of height 1 centered on the origin. Caps get their own
/// rim ring so the cap and side normals stay separate.
fn truncated_cone(
    bottom_radius: f32,
    top_radius: f32,
    detail_x: u32,
    detail_y: u32,
    bottom_cap: bool,
    top_cap: bool,
) -> Geometry {
    let dx = detail_x.max(3);
    let dy = detail_y.max(1);
    let slant = (bottom_radius - top_radius).atan2(1.0);
    let (sin_slant, cos_slant) = slant.sin_cos();

    let mut vertices = Vec::new();
    let mut normals = Vec::new();
    let mut uvs = Vec::new();
    let mut ring = |radius: f32, y: f32, v: f32, cap_normal: Option<Vector3>| -> u32 {
        let start = vertices.len() as u32;
        for i in 0..=dx {
            let u = i as f32 / dx as f32;
            let (s, c) = (TAU * u).sin_cos();
            vertices.push(Vector3::new(s * radius, y, c * radius));
            normals.push(cap_normal.unwrap_or(Vector3::new(s * cos_slant, sin_slant, c * cos_slant)));
            uvs.extend_from_slice(&[u, v]);
        }
        start
    };

    let mut faces = Vec::new();
    if bottom_cap {
        let center = ring(0.0, -0.5, 0.0, Some(-Vector3::Y));
        let rim = ring(bottom_radius, -0.5, 0.0, Some(-Vector3::Y));
        for i in 0..dx {
            faces.push([center + i, rim + i + 1, rim + i]);
        }
    }
    let body: Vec<u32> = (0..=dy)
        .map(|k| {
            let v = k as f32 / dy as f32;
            ring(bottom_radius + (top_radius - bottom_radius) * v, v - 0.5, v, None)
        })
        .collect();
    for pair in body.windows(2) {
        let (lower, upper) = (pair[0], pair[1]);
        for i in 0..dx {
            faces.push([lower + i, lower + i + 1, upper + i + 1]);
            faces.push([lower + i, upper + i + 1, upper + i]);
        }
    }
    if top_cap {
        let rim = ring(top_radius, 0.5, 1.0, Some(Vector3::Y));
        let center = ring(0.0, 0.5, 1.0, Some(Vector3::Y));
        for i in 0..dx {
            faces.push([rim + i, rim + i + 1, center + i]);
        }
    }

    Geometry::from_parts(dx, dy, vertices, normals, uvs, faces)
}

/// Fan-triangulated arc. Pie arcs (and full ellipses) fan from a center
/// vertex; chord and open arcs fan from their first perimeter vertex.
fn arc(start: f32, stop: f32, mode: ArcMode, detail: u32, full: bool) -> Geometry {
    let detail = detail.max(1);
    let mut geometry = Geometry::new(detail, 1);
    let mut outline = Vec::new();

    if (start - stop).abs() < 1e-10 {
        return geometry;
    }

    let fan_from_center = full || mode == ArcMode::Pie;
    if fan_from_center {
        geometry.push_vertex(Vector3::ZERO, [0.5, 0.5]);
    }
    let first = geometry.vertices().len() as u32;
    for i in 0..=detail {
        let theta = start + (stop - start) * (i as f32 / detail as f32);
        let (s, c) = theta.sin_cos();
        geometry.push_vertex(Vector3::new(c / 2.0, s / 2.0, 0.0), [0.5 + c / 2.0, 0.5 + s / 2.0]);
    }
    let last = geometry.vertices().len() as u32 - 1;

    let hub = if fan_from_center { 0 } else { first };
    let faces: Vec<[u32; 3]> = (first..last)
        .filter(|&i| i != hub)
        .map(|i| [hub, i, i + 1])
        .collect();
    *geometry.faces_mut() = faces;

    for i in first..last {
        outline.push([i, i + 1]);
    }
    if !full {
        match mode {
            ArcMode::Pie => {
                outline.push([0, first]);
                outline.push([last, 0]);
            }
            ArcMode::Chord => outline.push([last, first]),
            ArcMode::Open => {}
        }
    }
    geometry.compute_normals();
    geometry.set_stroke_indices(outline);
    geometry
}

fn rect(detail_x: u32, detail_y: u32) -> Geometry {
    let mut geometry = grid(detail_x, detail_y, |u, v| (Vector3::new(u, v, 0.0), Vector3::Z));
    geometry.compute_normals();
    let (dx, dy) = (geometry.detail_x(), geometry.detail_y());
    let corner = (dx + 1) * (dy + 1) - 1;
    geometry.set_stroke_indices(vec![
        [0, dx],
        [dx, corner],
        [corner, (dx + 1) * dy],
        [(dx + 1) * dy, 0],
    ]);
    geometry
}

fn triangle() -> Geometry {
    let mut geometry = Geometry::from_parts(
        1,
        1,
        vec![Vector3::ZERO, Vector3::X, Vector3::Y],
        Vec::new(),
        vec![0.0, 0.0, 1.0, 0.0, 1.0, 1.0],
        vec![[0, 1, 2]],
    );
    geometry.compute_normals();
    geometry.set_stroke_indices(vec![[0, 1], [1, 2], [2, 0]]);
    geometry
}
