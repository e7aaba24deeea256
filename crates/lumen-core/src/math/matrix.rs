use std::ops::Mul;

use bytemuck::{Pod, Zeroable};
use glam::{Mat3, Mat4, Vec3};

use super::Vector3;

/// Smallest near plane accepted by [`Matrix4::perspective`].
pub const MIN_PERSPECTIVE_NEAR: f32 = 0.01;

/// A 4x4 transform stored as 16 row-major floats under the row-vector
/// convention: a point `p` maps to `p * M`, and the translation lives in
/// elements 12..15.
///
/// Those same 16 floats are the column-major matrix GL consumes, so the array
/// is uploaded as-is with `transpose = false`. In shader (column-vector) terms
/// [`translate`](Self::translate), [`scale`](Self::scale) and
/// [`rotate`](Self::rotate) right-multiply the running transform: the new
/// transform applies to vertices before the existing one.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Matrix4 {
    m: [f32; 16],
}

impl Default for Matrix4 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Matrix4 {
    #[rustfmt::skip]
    pub const IDENTITY: Matrix4 = Matrix4 {
        m: [
            1.0, 0.0, 0.0, 0.0,
            0.0, 1.0, 0.0, 0.0,
            0.0, 0.0, 1.0, 0.0,
            0.0, 0.0, 0.0, 1.0,
        ],
    };

    pub const fn identity() -> Self {
        Self::IDENTITY
    }

    pub const fn from_array(m: [f32; 16]) -> Self {
        Self { m }
    }

    pub fn set(&mut self, m: [f32; 16]) {
        self.m = m;
    }

    pub fn as_array(&self) -> &[f32; 16] {
        &self.m
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.m
    }

    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.m[row * 4 + col]
    }

    fn to_glam(self) -> Mat4 {
        Mat4::from_cols_array(&self.m)
    }

    fn from_glam(m: Mat4) -> Self {
        Self { m: m.to_cols_array() }
    }

    /// `self = self * other`, row-major. Under the row-vector convention
    /// `self` applies first, then `other`.
    pub fn multiply(&mut self, other: &Matrix4) {
        *self = *self * *other;
    }

    pub fn transpose(&self) -> Matrix4 {
        Self::from_glam(self.to_glam().transpose())
    }

    pub fn determinant(&self) -> f32 {
        self.to_glam().determinant()
    }

    /// General inverse. `None` when the matrix is singular.
    pub fn invert(&self) -> Option<Matrix4> {
        let m = self.to_glam();
        let det = m.determinant();
        if det == 0.0 || !det.is_finite() {
            return None;
        }
        let inverse = m.inverse();
        inverse.is_finite().then(|| Self::from_glam(inverse))
    }

    /// Applies a translation before the existing transform.
    pub fn translate(&mut self, v: Vector3) {
        *self = Self::from_glam(self.to_glam() * Mat4::from_translation(v.into()));
    }

    /// Applies a scale before the existing transform.
    pub fn scale(&mut self, v: Vector3) {
        *self = Self::from_glam(self.to_glam() * Mat4::from_scale(v.into()));
    }

    /// Applies a rotation of `angle` radians about `axis` before the existing
    /// transform. The axis is normalized first; a zero axis leaves the matrix
    /// untouched.
    pub fn rotate(&mut self, angle: f32, axis: Vector3) {
        let Some(axis) = axis.try_normalize() else {
            tracing::warn!("Matrix4::rotate: rotation axis {:?} has zero length", axis);
            return;
        };
        *self = Self::from_glam(self.to_glam() * Mat4::from_axis_angle(axis.into(), angle));
    }

    /// Transforms a point (`w = 1`), ignoring any projective term.
    pub fn multiply_point(&self, p: Vector3) -> Vector3 {
        let p: Vec3 = p.into();
        Vector3::from(self.to_glam().mul_vec4(p.extend(1.0)).truncate())
    }

    /// Transforms a point and divides by the resulting `w`.
    pub fn multiply_and_normalize_point(&self, p: Vector3) -> Vector3 {
        let p: Vec3 = p.into();
        let out = self.to_glam().mul_vec4(p.extend(1.0));
        Vector3::from(out.truncate()) / out.w
    }

    /// Transforms a direction (`w = 0`).
    pub fn multiply_direction(&self, d: Vector3) -> Vector3 {
        let d: Vec3 = d.into();
        Vector3::from(self.to_glam().mul_vec4(d.extend(0.0)).truncate())
    }

    /// GL-style perspective projection. `near` values at or below `0.0001`
    /// are clamped to [`MIN_PERSPECTIVE_NEAR`].
    pub fn perspective(fovy: f32, aspect: f32, near: f32, far: f32) -> Matrix4 {
        let near = if near <= 0.0001 {
            tracing::warn!(
                "perspective: near plane {} is too close to zero, using {}",
                near,
                MIN_PERSPECTIVE_NEAR
            );
            MIN_PERSPECTIVE_NEAR
        } else {
            near
        };
        Self::from_glam(Mat4::perspective_rh_gl(fovy, aspect, near, far))
    }

    /// GL-style orthographic projection.
    pub fn ortho(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Matrix4 {
        Self::from_glam(Mat4::orthographic_rh_gl(left, right, bottom, top, near, far))
    }

    /// GL-style frustum projection.
    pub fn frustum(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Matrix4 {
        Self::from_glam(Mat4::frustum_rh_gl(left, right, bottom, top, near, far))
    }

    /// Negates clip-space y, turning a y-up projection into a y-down one.
    pub fn flip_y(&mut self) {
        *self = Self::from_glam(Mat4::from_scale(Vec3::new(1.0, -1.0, 1.0)) * self.to_glam());
    }

    pub fn abs_diff_eq(&self, other: &Matrix4, epsilon: f32) -> bool {
        self.m
            .iter()
            .zip(other.m.iter())
            .all(|(a, b)| (a - b).abs() <= epsilon)
    }
}

impl Mul for Matrix4 {
    type Output = Matrix4;

    fn mul(self, rhs: Matrix4) -> Matrix4 {
        // row-major `self * rhs` is column-major `rhs * self`
        Matrix4::from_glam(rhs.to_glam().mul_mat4(&self.to_glam()))
    }
}

impl From<Matrix4> for Mat4 {
    fn from(m: Matrix4) -> Self {
        m.to_glam()
    }
}

impl From<Mat4> for Matrix4 {
    fn from(m: Mat4) -> Self {
        Matrix4::from_glam(m)
    }
}

/// A 3x3 matrix, used as the normal matrix.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Matrix3 {
    m: [f32; 9],
}

impl Default for Matrix3 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Matrix3 {
    #[rustfmt::skip]
    pub const IDENTITY: Matrix3 = Matrix3 {
        m: [
            1.0, 0.0, 0.0,
            0.0, 1.0, 0.0,
            0.0, 0.0, 1.0,
        ],
    };

    pub const ZERO: Matrix3 = Matrix3 { m: [0.0; 9] };

    pub const fn from_array(m: [f32; 9]) -> Self {
        Self { m }
    }

    pub fn as_array(&self) -> &[f32; 9] {
        &self.m
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.m
    }

    fn to_glam(self) -> Mat3 {
        Mat3::from_cols_array(&self.m)
    }

    fn from_glam(m: Mat3) -> Self {
        Self { m: m.to_cols_array() }
    }

    /// Upper-left 3x3 of a 4x4 transform.
    pub fn from_mat4(mat4: &Matrix4) -> Self {
        Self::from_glam(Mat3::from_mat4(mat4.to_glam()))
    }

    pub fn determinant(&self) -> f32 {
        self.to_glam().determinant()
    }

    pub fn transpose(&self) -> Matrix3 {
        Self::from_glam(self.to_glam().transpose())
    }

    pub fn invert(&self) -> Option<Matrix3> {
        let m = self.to_glam();
        let det = m.determinant();
        if det == 0.0 || !det.is_finite() {
            return None;
        }
        let inverse = m.inverse();
        inverse.is_finite().then(|| Self::from_glam(inverse))
    }

    /// Normal matrix of a model-view transform: the inverse transpose of its
    /// upper-left 3x3, or all zeros when that block is singular.
    pub fn inverse_transpose(mat4: &Matrix4) -> Matrix3 {
        match Matrix3::from_mat4(mat4).invert() {
            Some(inverse) => inverse.transpose(),
            None => Matrix3::ZERO,
        }
    }

    pub fn abs_diff_eq(&self, other: &Matrix3, epsilon: f32) -> bool {
        self.m
            .iter()
            .zip(other.m.iter())
            .all(|(a, b)| (a - b).abs() <= epsilon)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    #[rustfmt::skip]
    fn sample() -> Matrix4 {
        Matrix4::from_array([
            2.0, 0.0, 1.0, 0.0,
            1.0, 3.0, 0.0, 0.0,
            0.0, 1.0, 4.0, 0.0,
            5.0, -2.0, 7.0, 1.0,
        ])
    }

    #[test]
    fn test_identity_multiply() {
        let mut m = sample();
        m.multiply(&Matrix4::IDENTITY);
        assert_eq!(m, sample());
        assert_eq!(Matrix4::IDENTITY * sample(), sample());
    }

    #[test]
    fn test_self_multiply() {
        let mut m = sample();
        let copy = m;
        m.multiply(&copy);
        assert_eq!(m, sample() * sample());
    }

    #[test]
    fn test_invert_round_trip() {
        let m = sample();
        let inv = m.invert().unwrap();
        assert!(inv.invert().unwrap().abs_diff_eq(&m, 1e-4));
        assert!((m * inv).abs_diff_eq(&Matrix4::IDENTITY, 1e-5));
    }

    #[test]
    fn test_invert_transformed_round_trip() {
        let mut m = Matrix4::identity();
        m.translate(Vector3::new(10.0, -3.0, 2.5));
        m.rotate(0.7, Vector3::new(1.0, 2.0, 3.0));
        m.scale(Vector3::new(2.0, 0.5, 4.0));
        let back = m.invert().unwrap().invert().unwrap();
        assert!(back.abs_diff_eq(&m, 1e-4));
    }

    #[test]
    fn test_invert_singular() {
        #[rustfmt::skip]
        let singular = Matrix4::from_array([
            1.0, 2.0, 3.0, 4.0,
            0.0, 0.0, 0.0, 0.0,
            5.0, 6.0, 7.0, 8.0,
            9.0, 1.0, 2.0, 3.0,
        ]);
        assert!(singular.invert().is_none());
    }

    #[test]
    fn test_translate_moves_points() {
        let mut m = Matrix4::identity();
        m.translate(Vector3::new(1.0, 2.0, 3.0));
        let p = m.multiply_point(Vector3::new(1.0, 1.0, 1.0));
        assert_eq!(p, Vector3::new(2.0, 3.0, 4.0));
    }

    #[test]
    fn test_transforms_apply_before_existing() {
        let mut m = Matrix4::identity();
        m.translate(Vector3::new(10.0, 0.0, 0.0));
        m.scale(Vector3::new(2.0, 2.0, 2.0));
        // scale first, then translate
        let p = m.multiply_point(Vector3::new(1.0, 0.0, 0.0));
        assert!(p.abs_diff_eq(Vector3::new(12.0, 0.0, 0.0), 1e-6));
    }

    #[test]
    fn test_rotate_z() {
        let mut m = Matrix4::identity();
        m.rotate(FRAC_PI_2, Vector3::new(0.0, 0.0, 5.0));
        let p = m.multiply_point(Vector3::X);
        assert!(p.abs_diff_eq(Vector3::Y, 1e-6));
    }

    #[test]
    fn test_rotate_zero_axis_is_noop() {
        let mut m = sample();
        m.rotate(1.0, Vector3::ZERO);
        assert_eq!(m, sample());
    }

    #[test]
    fn test_perspective_clamps_near() {
        let clamped = Matrix4::perspective(1.0, 1.5, 0.0, 100.0);
        let explicit = Matrix4::perspective(1.0, 1.5, MIN_PERSPECTIVE_NEAR, 100.0);
        assert_eq!(clamped, explicit);
        assert!(clamped.as_slice().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_ortho_maps_bounds_to_clip_cube() {
        let m = Matrix4::ortho(-50.0, 50.0, -25.0, 25.0, 0.0, 100.0);
        let p = m.multiply_point(Vector3::new(50.0, 25.0, -100.0));
        assert!(p.abs_diff_eq(Vector3::new(1.0, 1.0, 1.0), 1e-6));
    }

    #[test]
    fn test_symmetric_frustum_matches_perspective() {
        let (fovy, aspect, near, far) = (1.0_f32, 1.5, 2.0, 50.0);
        let top = near * (fovy / 2.0).tan();
        let right = top * aspect;
        let frustum = Matrix4::frustum(-right, right, -top, top, near, far);
        assert!(frustum.abs_diff_eq(&Matrix4::perspective(fovy, aspect, near, far), 1e-5));
    }

    #[test]
    fn test_flip_y_negates_clip_y() {
        let mut m = Matrix4::ortho(-10.0, 10.0, -10.0, 10.0, 0.0, 10.0);
        let before = m.multiply_point(Vector3::new(5.0, 5.0, -1.0));
        m.flip_y();
        let after = m.multiply_point(Vector3::new(5.0, 5.0, -1.0));
        assert!(after.abs_diff_eq(Vector3::new(before.x, -before.y, before.z), 1e-6));
    }

    #[test]
    fn test_multiply_and_normalize_divides_by_w() {
        let m = Matrix4::perspective(FRAC_PI_2, 1.0, 1.0, 10.0);
        let p = m.multiply_and_normalize_point(Vector3::new(0.0, 0.0, -1.0));
        // the near plane maps to -1
        assert!((p.z + 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_glam_layout_matches() {
        let mut m = Matrix4::identity();
        m.translate(Vector3::new(1.0, 2.0, 3.0));
        let g: glam::Mat4 = m.into();
        assert_eq!(g.transform_point3(glam::Vec3::ZERO), glam::Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_normal_matrix_singular_is_zero() {
        let mut m = Matrix4::identity();
        m.scale(Vector3::new(1.0, 0.0, 1.0));
        let n = Matrix3::inverse_transpose(&m);
        assert_eq!(n, Matrix3::ZERO);
    }

    #[test]
    fn test_normal_matrix_non_uniform_scale() {
        let mut m = Matrix4::identity();
        m.scale(Vector3::new(2.0, 4.0, 1.0));
        let n = Matrix3::inverse_transpose(&m);
        #[rustfmt::skip]
        let expected = Matrix3::from_array([
            0.5, 0.0, 0.0,
            0.0, 0.25, 0.0,
            0.0, 0.0, 1.0,
        ]);
        assert!(n.abs_diff_eq(&expected, 1e-6));
    }
}
