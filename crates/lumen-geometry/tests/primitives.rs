//! Normal and stroke-threshold properties of the retained primitives.

use lumen_core::math::Vector3;
use lumen_geometry::{Geometry, Primitive};

fn centroid(g: &Geometry) -> Vector3 {
    let sum = g.vertices().iter().fold(Vector3::ZERO, |acc, v| acc + *v);
    sum / g.vertices().len() as f32
}

fn assert_unit_outward(g: &Geometry, name: &str) {
    let c = centroid(g);
    for (i, (v, n)) in g.vertices().iter().zip(g.vertex_normals()).enumerate() {
        assert!((n.mag() - 1.0).abs() < 1e-4, "{name}: normal {i} has length {}", n.mag());
        assert!(n.dot(*v - c) > 0.0, "{name}: normal {i} points inward");
    }
}

#[test]
fn test_sphere_normals_are_unit_and_outward() {
    assert_unit_outward(&Primitive::sphere().build(), "sphere");
}

#[test]
fn test_box_normals_are_unit_and_outward() {
    assert_unit_outward(&Primitive::cube().build(), "box");
}

#[test]
fn test_computed_normals_on_octahedron() {
    let vertices = vec![
        Vector3::X,
        -Vector3::X,
        Vector3::Y,
        -Vector3::Y,
        Vector3::Z,
        -Vector3::Z,
    ];
    let faces = vec![
        [0, 2, 4],
        [2, 1, 4],
        [1, 3, 4],
        [3, 0, 4],
        [2, 0, 5],
        [1, 2, 5],
        [3, 1, 5],
        [0, 3, 5],
    ];
    let uvs = vec![0.0; 12];
    let mut g = Geometry::from_parts(1, 1, vertices, Vec::new(), uvs, faces);
    g.compute_normals();
    assert_unit_outward(&g, "octahedron");
    assert!(g.vertex_normals()[0].abs_diff_eq(Vector3::X, 1e-5));
}

#[test]
fn test_high_detail_sphere_skips_strokes() {
    let prim = Primitive::Ellipsoid {
        detail_x: 200,
        detail_y: 16,
    };
    assert!(!prim.supports_stroke());
    let g = prim.build();
    assert!(!g.faces().is_empty());
    assert!(g.edges().is_empty());
}

#[test]
fn test_stroke_thresholds() {
    let cases = [
        (Primitive::Plane { detail_x: 1, detail_y: 1 }, true),
        (Primitive::Plane { detail_x: 2, detail_y: 1 }, false),
        (Primitive::Box { detail_x: 4, detail_y: 4 }, true),
        (Primitive::Box { detail_x: 5, detail_y: 4 }, false),
        (Primitive::Ellipsoid { detail_x: 24, detail_y: 24 }, true),
        (Primitive::Torus { tube_ratio: 0.5, detail_x: 24, detail_y: 17 }, false),
        (Primitive::Ellipse { detail: 50 }, true),
        (Primitive::Ellipse { detail: 51 }, false),
        (Primitive::Rect { detail_x: 30, detail_y: 30 }, true),
    ];
    for (prim, expected) in cases {
        assert_eq!(prim.supports_stroke(), expected, "{}", prim.key());
        assert_eq!(!prim.build().edges().is_empty(), expected, "{}", prim.key());
    }
}
