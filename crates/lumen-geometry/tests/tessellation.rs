//! Tessellation of flattened immediate mode contours.
//!
//! These tests verify that curve sampling and polygon tessellation together
//! produce the filled areas `begin_shape`/`end_shape` draws.

use lumen_core::math::Vector3;
use lumen_geometry::{
    CatmullRom, CubicBezier, QuadraticBezier, ShapeVertex, TessellatedShape, Tessellator,
};

fn contour(points: impl IntoIterator<Item = Vector3>) -> Vec<ShapeVertex> {
    points.into_iter().map(ShapeVertex::new).collect()
}

fn area(shape: &TessellatedShape) -> f32 {
    shape
        .triangles()
        .chunks(3)
        .map(|t| (t[1].position - t[0].position).cross(t[2].position - t[0].position).mag() / 2.0)
        .sum()
}

// ====================
// Curve sampling
// ====================

#[test]
fn test_sampling_ends_on_the_curve_end() {
    let quadratic = QuadraticBezier::new(Vector3::ZERO, Vector3::xy(50.0, 100.0), Vector3::xy(100.0, 0.0));
    let points: Vec<_> = quadratic.sample(8).collect();
    assert_eq!(points.len(), 8);
    assert!(points[7].dist(quadratic.to) < 1e-4);

    let cubic = CubicBezier::new(
        Vector3::ZERO,
        Vector3::xy(0.0, 100.0),
        Vector3::xy(100.0, 100.0),
        Vector3::xy(100.0, 0.0),
    );
    assert_eq!(cubic.sample(0).count(), 1);
}

#[test]
fn test_catmull_rom_passes_through_inner_points() {
    let span = CatmullRom::new(
        [Vector3::ZERO, Vector3::xy(10.0, 0.0), Vector3::xy(20.0, 10.0), Vector3::xy(30.0, 10.0)],
        0.0,
    );
    assert!(span.eval(0.0).dist(span.p1) < 1e-4);
    assert!(span.eval(1.0).dist(span.p2) < 1e-4);
}

#[test]
fn test_full_tightness_is_a_straight_line() {
    let span = CatmullRom::new(
        [Vector3::ZERO, Vector3::xy(10.0, 0.0), Vector3::xy(20.0, 10.0), Vector3::xy(30.0, 50.0)],
        1.0,
    );
    let mid = span.eval(0.5);
    assert!(mid.dist(Vector3::xy(15.0, 5.0)) < 1e-4);
}

// ====================
// Tessellation
// ====================

#[test]
fn test_concave_polygon_keeps_its_notch() {
    // a 10x10 square with a 4x5 notch cut from the top edge
    let shape = Tessellator::new().tessellate(&[contour([
        Vector3::xy(0.0, 0.0),
        Vector3::xy(10.0, 0.0),
        Vector3::xy(10.0, 10.0),
        Vector3::xy(7.0, 10.0),
        Vector3::xy(7.0, 5.0),
        Vector3::xy(3.0, 5.0),
        Vector3::xy(3.0, 10.0),
        Vector3::xy(0.0, 10.0),
    ])]);
    assert!((area(&shape) - 80.0).abs() < 1e-2);
}

#[test]
fn test_sampled_curve_fills_close_to_its_exact_area() {
    // a quadratic arch over [0, 100] encloses two thirds of its hull
    let arch = QuadraticBezier::new(Vector3::ZERO, Vector3::xy(50.0, 100.0), Vector3::xy(100.0, 0.0));
    let mut points = vec![arch.from];
    points.extend(arch.sample(64));
    let shape = Tessellator::new().tessellate(&[contour(points)]);

    let exact = 2.0 / 3.0 * 100.0 * 50.0;
    assert!((area(&shape) - exact).abs() / exact < 0.01);
}

#[test]
fn test_overlapping_contours_fill_once_with_non_zero() {
    let square = |x: f32| {
        contour([
            Vector3::xy(x, 0.0),
            Vector3::xy(x + 10.0, 0.0),
            Vector3::xy(x + 10.0, 10.0),
            Vector3::xy(x, 10.0),
        ])
    };
    let shape = Tessellator::new().tessellate(&[square(0.0), square(5.0)]);
    assert!((area(&shape) - 150.0).abs() < 1e-2);
}
