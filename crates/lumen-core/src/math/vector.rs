use std::f32::consts::TAU;
use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign};

use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use rand::Rng;

/// A three component vector. 2D vectors keep `z == 0.0`.
///
/// Division and normalization of a zero vector leave the vector unchanged and
/// emit a warning instead of producing `NaN`/`inf` components.
///
/// ```
/// use lumen_core::math::Vector3;
///
/// let v = Vector3::new(3.0, 4.0, 0.0);
/// assert_eq!(v.mag(), 5.0);
/// assert_eq!(Vector3::ZERO.normalize(), Vector3::ZERO);
/// ```
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector3 {
    pub const ZERO: Vector3 = Vector3::new(0.0, 0.0, 0.0);
    pub const X: Vector3 = Vector3::new(1.0, 0.0, 0.0);
    pub const Y: Vector3 = Vector3::new(0.0, 1.0, 0.0);
    pub const Z: Vector3 = Vector3::new(0.0, 0.0, 1.0);

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// A 2D vector (`z == 0`).
    pub const fn xy(x: f32, y: f32) -> Self {
        Self { x, y, z: 0.0 }
    }

    pub fn set(&mut self, x: f32, y: f32, z: f32) {
        self.x = x;
        self.y = y;
        self.z = z;
    }

    pub fn to_array(self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }

    fn glam(self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }

    /// Component-wise product.
    pub fn mult_components(self, other: Vector3) -> Self {
        (self.glam() * other.glam()).into()
    }

    /// Scalar division. Dividing by zero is a no-op.
    pub fn div_scalar(self, n: f32) -> Self {
        if n == 0.0 || !n.is_finite() {
            tracing::warn!("Vector3::div: cannot divide {:?} by {}", self, n);
            return self;
        }
        (self.glam() / n).into()
    }

    /// Component-wise division. Any zero divisor makes the whole call a no-op.
    pub fn div_components(self, other: Vector3) -> Self {
        if other.x == 0.0 || other.y == 0.0 || other.z == 0.0 {
            tracing::warn!("Vector3::div: cannot divide {:?} by {:?}", self, other);
            return self;
        }
        (self.glam() / other.glam()).into()
    }

    pub fn mag_sq(self) -> f32 {
        self.glam().length_squared()
    }

    pub fn mag(self) -> f32 {
        self.glam().length()
    }

    /// Unit vector in the same direction, or `None` for a zero-length vector.
    pub fn try_normalize(self) -> Option<Self> {
        let len = self.mag();
        if len == 0.0 || !len.is_finite() {
            None
        } else {
            Some(self * (1.0 / len))
        }
    }

    /// Unit vector in the same direction. A zero vector is returned unchanged.
    pub fn normalize(self) -> Self {
        match self.try_normalize() {
            Some(n) => n,
            None => {
                tracing::warn!("Vector3::normalize: cannot normalize zero-length vector {:?}", self);
                self
            }
        }
    }

    /// Caps the magnitude at `max`.
    pub fn limit(self, max: f32) -> Self {
        let m_sq = self.mag_sq();
        if m_sq > max * max {
            self.div_scalar(m_sq.sqrt()) * max
        } else {
            self
        }
    }

    pub fn set_mag(self, len: f32) -> Self {
        self.normalize() * len
    }

    pub fn dot(self, other: Vector3) -> f32 {
        self.glam().dot(other.glam())
    }

    pub fn cross(self, other: Vector3) -> Self {
        self.glam().cross(other.glam()).into()
    }

    pub fn lerp(self, other: Vector3, amt: f32) -> Self {
        self.glam().lerp(other.glam(), amt).into()
    }

    pub fn dist(self, other: Vector3) -> f32 {
        self.glam().distance(other.glam())
    }

    pub fn min(self, other: Vector3) -> Self {
        self.glam().min(other.glam()).into()
    }

    pub fn max(self, other: Vector3) -> Self {
        self.glam().max(other.glam()).into()
    }

    /// Angle of the x/y projection, in radians.
    pub fn heading(self) -> f32 {
        self.y.atan2(self.x)
    }

    /// Rotates the x/y projection by `angle` radians, keeping its length. `z` is untouched.
    pub fn rotate(self, angle: f32) -> Self {
        let heading = self.heading() + angle;
        let len = (self.x * self.x + self.y * self.y).sqrt();
        Self::new(heading.cos() * len, heading.sin() * len, self.z)
    }

    /// Unsigned angle between two vectors in radians.
    ///
    /// The cosine is clamped to `[-1, 1]` before `acos`. Zero-length inputs
    /// have no defined angle and return `0.0` with a warning.
    pub fn angle_between(self, other: Vector3) -> f32 {
        let mag_product = self.mag() * other.mag();
        if mag_product == 0.0 {
            tracing::warn!(
                "Vector3::angle_between: undefined for zero-length vector ({:?}, {:?})",
                self,
                other
            );
            return 0.0;
        }
        (self.dot(other) / mag_product).clamp(-1.0, 1.0).acos()
    }

    /// Reflects this vector off a surface with the given normal.
    pub fn reflect(self, surface_normal: Vector3) -> Self {
        let n = surface_normal.normalize();
        self - n * (2.0 * self.dot(n))
    }

    pub fn abs_diff_eq(self, other: Vector3, epsilon: f32) -> bool {
        self.glam().abs_diff_eq(other.glam(), epsilon)
    }

    /// 2D vector of the given length pointing at `angle` radians.
    pub fn from_angle(angle: f32, length: f32) -> Self {
        Self::xy(length * angle.cos(), length * angle.sin())
    }

    /// Vector from spherical angles: `theta` is the polar angle from -y,
    /// `phi` the azimuth around y.
    pub fn from_angles(theta: f32, phi: f32, length: f32) -> Self {
        let (sin_theta, cos_theta) = theta.sin_cos();
        let (sin_phi, cos_phi) = phi.sin_cos();
        Self::new(
            length * sin_theta * sin_phi,
            -length * cos_theta,
            length * sin_theta * cos_phi,
        )
    }

    /// Random unit vector in the x/y plane.
    pub fn random_2d() -> Self {
        Self::random_2d_with(&mut rand::thread_rng())
    }

    pub fn random_2d_with<R: Rng>(rng: &mut R) -> Self {
        Self::from_angle(rng.gen_range(0.0..TAU), 1.0)
    }

    /// Random unit vector, uniformly distributed over the sphere.
    pub fn random_3d() -> Self {
        Self::random_3d_with(&mut rand::thread_rng())
    }

    pub fn random_3d_with<R: Rng>(rng: &mut R) -> Self {
        let angle: f32 = rng.gen_range(0.0..TAU);
        let z: f32 = rng.gen_range(-1.0..=1.0);
        let base = (1.0 - z * z).sqrt();
        Self::new(base * angle.cos(), base * angle.sin(), z)
    }
}

impl Add for Vector3 {
    type Output = Vector3;

    fn add(self, rhs: Vector3) -> Vector3 {
        (self.glam() + rhs.glam()).into()
    }
}

impl AddAssign for Vector3 {
    fn add_assign(&mut self, rhs: Vector3) {
        *self = *self + rhs;
    }
}

impl Sub for Vector3 {
    type Output = Vector3;

    fn sub(self, rhs: Vector3) -> Vector3 {
        (self.glam() - rhs.glam()).into()
    }
}

impl SubAssign for Vector3 {
    fn sub_assign(&mut self, rhs: Vector3) {
        *self = *self - rhs;
    }
}

impl Mul<f32> for Vector3 {
    type Output = Vector3;

    fn mul(self, rhs: f32) -> Vector3 {
        (self.glam() * rhs).into()
    }
}

impl MulAssign<f32> for Vector3 {
    fn mul_assign(&mut self, rhs: f32) {
        *self = *self * rhs;
    }
}

/// Checked: dividing by zero leaves the vector unchanged.
impl Div<f32> for Vector3 {
    type Output = Vector3;

    fn div(self, rhs: f32) -> Vector3 {
        self.div_scalar(rhs)
    }
}

impl DivAssign<f32> for Vector3 {
    fn div_assign(&mut self, rhs: f32) {
        *self = self.div_scalar(rhs);
    }
}

impl Neg for Vector3 {
    type Output = Vector3;

    fn neg(self) -> Vector3 {
        (-self.glam()).into()
    }
}

impl From<[f32; 3]> for Vector3 {
    fn from([x, y, z]: [f32; 3]) -> Self {
        Self::new(x, y, z)
    }
}

impl From<Vector3> for [f32; 3] {
    fn from(v: Vector3) -> Self {
        v.to_array()
    }
}

impl From<Vec3> for Vector3 {
    fn from(v: Vec3) -> Self {
        Self::new(v.x, v.y, v.z)
    }
}

impl From<Vector3> for Vec3 {
    fn from(v: Vector3) -> Self {
        v.glam()
    }
}

impl From<mint::Vector3<f32>> for Vector3 {
    fn from(v: mint::Vector3<f32>) -> Self {
        Self::new(v.x, v.y, v.z)
    }
}

impl From<Vector3> for mint::Vector3<f32> {
    fn from(v: Vector3) -> Self {
        mint::Vector3 { x: v.x, y: v.y, z: v.z }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::{FRAC_PI_2, PI};

    #[test]
    fn test_arithmetic() {
        let a = Vector3::new(1.0, 2.0, 3.0);
        let b = Vector3::new(4.0, 5.0, 6.0);
        assert_eq!(a + b, Vector3::new(5.0, 7.0, 9.0));
        assert_eq!(b - a, Vector3::new(3.0, 3.0, 3.0));
        assert_eq!(a * 2.0, Vector3::new(2.0, 4.0, 6.0));
        assert_eq!(b / 2.0, Vector3::new(2.0, 2.5, 3.0));
        assert_eq!(a.mult_components(b), Vector3::new(4.0, 10.0, 18.0));
    }

    #[test]
    fn test_divide_by_zero_is_noop() {
        let a = Vector3::new(1.0, 2.0, 3.0);
        assert_eq!(a / 0.0, a);
        assert_eq!(a.div_components(Vector3::new(1.0, 0.0, 1.0)), a);
    }

    #[test]
    fn test_normalize_zero_is_noop() {
        let n = Vector3::ZERO.normalize();
        assert_eq!(n, Vector3::ZERO);
        assert!(!n.x.is_nan());
        assert!(Vector3::ZERO.try_normalize().is_none());
    }

    #[test]
    fn test_normalize() {
        let n = Vector3::new(0.0, 3.0, 4.0).normalize();
        assert!((n.mag() - 1.0).abs() < 1e-6);
        assert!(n.abs_diff_eq(Vector3::new(0.0, 0.6, 0.8), 1e-6));
    }

    #[test]
    fn test_limit_and_set_mag() {
        let v = Vector3::new(10.0, 0.0, 0.0);
        assert_eq!(v.limit(5.0), Vector3::new(5.0, 0.0, 0.0));
        assert_eq!(v.limit(20.0), v);
        assert!(v.set_mag(2.0).abs_diff_eq(Vector3::new(2.0, 0.0, 0.0), 1e-6));
    }

    #[test]
    fn test_cross_is_right_handed() {
        assert_eq!(Vector3::X.cross(Vector3::Y), Vector3::Z);
        assert_eq!(Vector3::Y.cross(Vector3::Z), Vector3::X);
    }

    #[test]
    fn test_rotate_2d() {
        let v = Vector3::new(1.0, 0.0, 7.0).rotate(FRAC_PI_2);
        assert!(v.abs_diff_eq(Vector3::new(0.0, 1.0, 7.0), 1e-6));
        assert!((Vector3::xy(0.0, 2.0).heading() - FRAC_PI_2).abs() < 1e-6);
    }

    #[test]
    fn test_angle_between_clamps() {
        let a = Vector3::new(1.0, 1.0, 1.0);
        // Rounding can push the cosine just above 1.
        assert!(a.angle_between(a * 3.0) < 1e-3);
        assert!((a.angle_between(-a) - PI).abs() < 1e-3);
        assert_eq!(a.angle_between(Vector3::ZERO), 0.0);
    }

    #[test]
    fn test_from_angles() {
        let v = Vector3::from_angles(FRAC_PI_2, 0.0, 1.0);
        assert!(v.abs_diff_eq(Vector3::new(0.0, 0.0, 1.0), 1e-6));
        let v = Vector3::from_angles(0.0, 0.0, 2.0);
        assert!(v.abs_diff_eq(Vector3::new(0.0, -2.0, 0.0), 1e-6));
    }

    #[test]
    fn test_random_vectors_are_unit() {
        for _ in 0..32 {
            assert!((Vector3::random_2d().mag() - 1.0).abs() < 1e-5);
            assert!((Vector3::random_3d().mag() - 1.0).abs() < 1e-5);
            assert_eq!(Vector3::random_2d().z, 0.0);
        }
    }

    #[test]
    fn test_reflect() {
        let v = Vector3::new(1.0, -1.0, 0.0).reflect(Vector3::new(0.0, 2.0, 0.0));
        assert!(v.abs_diff_eq(Vector3::new(1.0, 1.0, 0.0), 1e-6));
    }
}
