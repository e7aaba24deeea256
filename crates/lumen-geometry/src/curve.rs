//! Bezier and Catmull-Rom curve segments.
//!
//! Immediate mode flattens these into vertices with [`QuadraticBezier::sample`],
//! [`CubicBezier::sample`] and [`CatmullRom::to_bezier`].

use lumen_core::math::Vector3;

/// Default number of segments a curve is flattened into.
pub const DEFAULT_CURVE_DETAIL: u32 = 20;

/// A quadratic Bezier curve (one control point).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuadraticBezier {
    /// Start point
    pub from: Vector3,
    /// Control point
    pub control: Vector3,
    /// End point
    pub to: Vector3,
}

impl QuadraticBezier {
    /// Create a new quadratic Bezier curve.
    pub fn new(from: Vector3, control: Vector3, to: Vector3) -> Self {
        Self { from, control, to }
    }

    /// Evaluate the curve at parameter t (0.0 to 1.0).
    pub fn eval(&self, t: f32) -> Vector3 {
        let mt = 1.0 - t;
        self.from * (mt * mt) + self.control * (2.0 * mt * t) + self.to * (t * t)
    }

    /// Get the derivative at parameter t.
    pub fn derivative(&self, t: f32) -> Vector3 {
        let mt = 1.0 - t;
        (self.control - self.from) * (2.0 * mt) + (self.to - self.control) * (2.0 * t)
    }

    /// Split the curve at parameter t, returning two curves.
    pub fn split(&self, t: f32) -> (Self, Self) {
        let p01 = self.from.lerp(self.control, t);
        let p12 = self.control.lerp(self.to, t);
        let p012 = p01.lerp(p12, t);

        (
            Self::new(self.from, p01, p012),
            Self::new(p012, p12, self.to),
        )
    }

    /// Points at `t = 1/detail, 2/detail, ..., 1`. The start point is left
    /// out since it is the previous segment's end.
    pub fn sample(&self, detail: u32) -> impl Iterator<Item = Vector3> + '_ {
        let detail = detail.max(1);
        (1..=detail).map(move |i| self.eval(i as f32 / detail as f32))
    }
}

/// A cubic Bezier curve (two control points).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CubicBezier {
    /// Start point
    pub from: Vector3,
    /// First control point
    pub control1: Vector3,
    /// Second control point
    pub control2: Vector3,
    /// End point
    pub to: Vector3,
}

impl CubicBezier {
    /// Create a new cubic Bezier curve.
    pub fn new(from: Vector3, control1: Vector3, control2: Vector3, to: Vector3) -> Self {
        Self {
            from,
            control1,
            control2,
            to,
        }
    }

    /// Evaluate the curve at parameter t (0.0 to 1.0).
    pub fn eval(&self, t: f32) -> Vector3 {
        let t2 = t * t;
        let t3 = t2 * t;
        let mt = 1.0 - t;
        let mt2 = mt * mt;
        let mt3 = mt2 * mt;

        self.from * mt3
            + self.control1 * (3.0 * mt2 * t)
            + self.control2 * (3.0 * mt * t2)
            + self.to * t3
    }

    /// Get the derivative at parameter t.
    pub fn derivative(&self, t: f32) -> Vector3 {
        let t2 = t * t;
        let mt = 1.0 - t;
        let mt2 = mt * mt;

        (self.control1 - self.from) * (3.0 * mt2)
            + (self.control2 - self.control1) * (6.0 * mt * t)
            + (self.to - self.control2) * (3.0 * t2)
    }

    /// Split the curve at parameter t, returning two curves.
    pub fn split(&self, t: f32) -> (Self, Self) {
        let p01 = self.from.lerp(self.control1, t);
        let p12 = self.control1.lerp(self.control2, t);
        let p23 = self.control2.lerp(self.to, t);
        let p012 = p01.lerp(p12, t);
        let p123 = p12.lerp(p23, t);
        let p0123 = p012.lerp(p123, t);

        (
            Self::new(self.from, p01, p012, p0123),
            Self::new(p0123, p123, p23, self.to),
        )
    }

    /// Points at `t = 1/detail, ..., 1`, start point excluded.
    pub fn sample(&self, detail: u32) -> impl Iterator<Item = Vector3> + '_ {
        let detail = detail.max(1);
        (1..=detail).map(move |i| self.eval(i as f32 / detail as f32))
    }
}

/// One Catmull-Rom span: the curve runs from `p1` to `p2`, shaped by the
/// neighbours `p0` and `p3`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CatmullRom {
    pub p0: Vector3,
    pub p1: Vector3,
    pub p2: Vector3,
    pub p3: Vector3,
    /// 0 gives a Catmull-Rom spline, 1 straight lines.
    pub tightness: f32,
}

impl CatmullRom {
    pub fn new(points: [Vector3; 4], tightness: f32) -> Self {
        let [p0, p1, p2, p3] = points;
        Self {
            p0,
            p1,
            p2,
            p3,
            tightness,
        }
    }

    /// The equivalent cubic Bezier span.
    pub fn to_bezier(&self) -> CubicBezier {
        let s = (1.0 - self.tightness) / 6.0;
        CubicBezier::new(
            self.p1,
            self.p1 + (self.p2 - self.p0) * s,
            self.p2 - (self.p3 - self.p1) * s,
            self.p2,
        )
    }

    pub fn eval(&self, t: f32) -> Vector3 {
        self.to_bezier().eval(t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quadratic_endpoints() {
        let curve = QuadraticBezier::new(
            Vector3::xy(0.0, 0.0),
            Vector3::xy(50.0, 100.0),
            Vector3::xy(100.0, 0.0),
        );

        assert_eq!(curve.eval(0.0), curve.from);
        assert_eq!(curve.eval(1.0), curve.to);
    }

    #[test]
    fn test_cubic_endpoints() {
        let curve = CubicBezier::new(
            Vector3::xy(0.0, 0.0),
            Vector3::xy(25.0, 100.0),
            Vector3::xy(75.0, 100.0),
            Vector3::xy(100.0, 0.0),
        );

        assert_eq!(curve.eval(0.0), curve.from);
        assert_eq!(curve.eval(1.0), curve.to);
    }

    #[test]
    fn test_quadratic_split() {
        let curve = QuadraticBezier::new(
            Vector3::xy(0.0, 0.0),
            Vector3::xy(50.0, 100.0),
            Vector3::xy(100.0, 0.0),
        );

        let (left, right) = curve.split(0.5);
        let midpoint = curve.eval(0.5);

        assert!((left.to - midpoint).mag() < 0.001);
        assert!((right.from - midpoint).mag() < 0.001);
    }

    #[test]
    fn test_sample_excludes_start() {
        let curve = CubicBezier::new(Vector3::ZERO, Vector3::X, Vector3::Y, Vector3::Z);
        let points: Vec<_> = curve.sample(DEFAULT_CURVE_DETAIL).collect();
        assert_eq!(points.len(), 20);
        assert_eq!(points.last().copied(), Some(Vector3::Z));
    }

    #[test]
    fn test_catmull_rom_passes_through_inner_points() {
        let span = CatmullRom::new(
            [
                Vector3::xy(0.0, 0.0),
                Vector3::xy(10.0, 5.0),
                Vector3::xy(20.0, -5.0),
                Vector3::xy(30.0, 0.0),
            ],
            0.0,
        );
        assert!(span.eval(0.0).abs_diff_eq(Vector3::xy(10.0, 5.0), 1e-5));
        assert!(span.eval(1.0).abs_diff_eq(Vector3::xy(20.0, -5.0), 1e-5));

        let tight = CatmullRom { tightness: 1.0, ..span };
        let mid = tight.eval(0.5);
        assert!(mid.abs_diff_eq(Vector3::xy(15.0, 0.0), 1e-4));
    }
}
