//! Reduction of cubic Bezier segments to quadratics.
//!
//! The glyph shader only solves quadratic crossings, so every cubic outline
//! segment is split at its inflection points and then trimmed from both ends
//! until each piece is close enough to its midpoint quadratic.

use glam::Vec2;

/// Splitting threshold in font units.
pub const PRECISION: f32 = 30.0 / SQRT_3;

const SQRT_3: f32 = 1.732_050_8;

/// A quadratic Bezier segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quadratic {
    pub start: Vec2,
    pub control: Vec2,
    pub end: Vec2,
}

impl Quadratic {
    pub fn point(&self, t: f32) -> Vec2 {
        let a = self.start.lerp(self.control, t);
        let b = self.control.lerp(self.end, t);
        a.lerp(b, t)
    }
}

/// A cubic Bezier segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cubic {
    pub start: Vec2,
    pub control1: Vec2,
    pub control2: Vec2,
    pub end: Vec2,
}

impl Cubic {
    pub fn new(start: Vec2, control1: Vec2, control2: Vec2, end: Vec2) -> Self {
        Self {
            start,
            control1,
            control2,
            end,
        }
    }

    pub fn point(&self, t: f32) -> Vec2 {
        let a = self.start.lerp(self.control1, t);
        let b = self.control1.lerp(self.control2, t);
        let c = self.control2.lerp(self.end, t);
        let ab = a.lerp(b, t);
        let bc = b.lerp(c, t);
        ab.lerp(bc, t)
    }

    /// The quadratic sharing both endpoints whose control point is the
    /// average of the two extrapolated tangent intersections.
    pub fn to_quadratic(&self) -> Quadratic {
        Quadratic {
            start: self.start,
            control: ((self.control1 + self.control2) * 3.0 - (self.start + self.end)) / 4.0,
            end: self.end,
        }
    }

    /// Size of the cubic term. The midpoint quadratic deviates from the
    /// cubic by at most `quad_error / (6 * sqrt(3))`.
    pub fn quad_error(&self) -> f32 {
        ((self.end - self.start) - (self.control2 - self.control1) * 3.0).length() / 2.0
    }

    /// Splits at `t`, returning `0..t` and keeping `t..1` in `self`.
    pub fn split(&mut self, t: f32) -> Cubic {
        let m1 = self.start.lerp(self.control1, t);
        let m2 = self.control1.lerp(self.control2, t);
        let mm1 = m1.lerp(m2, t);
        self.control2 = self.control2.lerp(self.end, t);
        self.control1 = m2.lerp(self.control2, t);
        let point = mm1.lerp(self.control1, t);
        let head = Cubic::new(self.start, m1, mm1, point);
        self.start = point;
        head
    }

    /// Splits at up to two inflection points, in curve order.
    pub fn split_inflections(mut self) -> Vec<Cubic> {
        let a = self.control1 - self.start;
        let b = self.control2 - self.control1 - a;
        let c = self.end - self.control2 - a - b * 2.0;

        let mut pieces = Vec::with_capacity(3);
        let mut qa = b.x * c.y - b.y * c.x;
        if qa != 0.0 {
            let mut qb = a.x * c.y - a.y * c.x;
            let qc = a.x * b.y - a.y * b.x;
            let disc = qb * qb - 4.0 * qa * qc;
            if disc >= 0.0 {
                if qa < 0.0 {
                    qa = -qa;
                    qb = -qb;
                }
                let q = disc.sqrt();
                let t0 = (-qb - q) / (2.0 * qa);
                let mut t1 = (-qb + q) / (2.0 * qa);
                if t0 > 0.0 && t0 < 1.0 {
                    pieces.push(self.split(t0));
                    // the second root, in the remaining piece's parameter
                    t1 = 1.0 - (1.0 - t1) / (1.0 - t0);
                }
                if t1 > 0.0 && t1 < 1.0 {
                    pieces.push(self.split(t1));
                }
            }
        }
        pieces.push(self);
        pieces
    }
}

/// Approximates `cubic` with quadratics, in curve order, each within
/// `precision` of the cubic.
pub fn cubic_to_quadratics(cubic: Cubic, precision: f32) -> Vec<Quadratic> {
    let precision = precision.max(f32::MIN_POSITIVE);
    let mut quadratics = Vec::new();
    for mut piece in cubic.split_inflections() {
        let mut tail = Vec::new();
        let mut t3;
        loop {
            t3 = precision / piece.quad_error();
            // trimming t from both ends needs t < 0.5
            if t3 >= 0.125 {
                break;
            }
            let t = t3.cbrt();
            let head = piece.split(t);
            let middle = piece.split(1.0 - t / (1.0 - t));
            quadratics.push(head.to_quadratic());
            tail.push(piece.to_quadratic());
            piece = middle;
        }
        if t3 < 1.0 {
            let half = piece.split(0.5);
            quadratics.push(half.to_quadratic());
        }
        quadratics.push(piece.to_quadratic());
        quadratics.extend(tail.into_iter().rev());
    }
    quadratics
}
