//! Camera with a look-at view matrix and a y-down projection.
//!
//! A fresh camera frames the whole surface: the eye sits on +Z at the
//! distance where a 60° vertical field of view exactly covers the surface
//! height, so one world unit maps to one pixel on the `z = 0` plane.
//!
//! # Example
//!
//! ```
//! use lumen_core::math::Vector3;
//! use lumen_render::Camera;
//!
//! let mut camera = Camera::new(800, 600);
//! camera.set_view(Vector3::new(0.0, -200.0, 400.0), Vector3::ZERO, Vector3::Y);
//! camera.perspective(std::f32::consts::FRAC_PI_4, 800.0 / 600.0, 10.0, 2000.0);
//!
//! // Orbit 10 degrees around the look-at point.
//! camera.orbit(10f32.to_radians(), 0.0, 0.0);
//! assert!((camera.eye() - camera.center()).mag() > 0.0);
//! ```

use std::f32::consts::PI;

use lumen_core::math::{MIN_PERSPECTIVE_NEAR, Matrix4, Vector3};

/// Smallest eye-to-center distance [`Camera::orbit`] allows.
pub const MIN_ORBIT_RADIUS: f32 = 0.1;
/// Smallest polar angle [`Camera::orbit`] allows.
pub const MIN_ORBIT_PHI: f32 = 0.001;

const DEFAULT_FOVY: f32 = PI / 3.0;

/// Whether a camera follows the surface size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CameraType {
    /// Eye and projection are recomputed on every resize.
    #[default]
    Default,
    /// The user set a projection; resizing only updates the aspect ratio.
    Custom,
}

/// Projection parameters, kept so a resize can rebuild the matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    Perspective {
        fovy: f32,
        aspect: f32,
        near: f32,
        far: f32,
    },
    Ortho {
        left: f32,
        right: f32,
        bottom: f32,
        top: f32,
        near: f32,
        far: f32,
    },
    Frustum {
        left: f32,
        right: f32,
        bottom: f32,
        top: f32,
        near: f32,
        far: f32,
    },
}

impl Projection {
    fn matrix(&self) -> Matrix4 {
        let mut m = match *self {
            Projection::Perspective {
                fovy,
                aspect,
                near,
                far,
            } => Matrix4::perspective(fovy, aspect, near, far),
            Projection::Ortho {
                left,
                right,
                bottom,
                top,
                near,
                far,
            } => Matrix4::ortho(left, right, bottom, top, near, far),
            Projection::Frustum {
                left,
                right,
                bottom,
                top,
                near,
                far,
            } => Matrix4::frustum(left, right, bottom, top, near, far),
        };
        m.flip_y();
        m
    }
}

/// Framing derived from the surface size.
#[derive(Debug, Clone, Copy, PartialEq)]
struct CameraDefaults {
    width: f32,
    height: f32,
    eye_z: f32,
}

impl CameraDefaults {
    fn new(width: u32, height: u32) -> Self {
        let height_f = height.max(1) as f32;
        Self {
            width: width.max(1) as f32,
            height: height_f,
            eye_z: height_f / 2.0 / (DEFAULT_FOVY / 2.0).tan(),
        }
    }

    fn aspect(&self) -> f32 {
        self.width / self.height
    }

    fn near(&self) -> f32 {
        self.eye_z * 0.1
    }

    fn far(&self) -> f32 {
        self.eye_z * 10.0
    }
}

/// A camera with view and projection matrices.
///
/// Cloning gives an independent value; the renderer's push/pop stack relies
/// on that, so a nested scope can move its camera without touching the
/// enclosing scope's.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    eye: Vector3,
    center: Vector3,
    up: Vector3,
    /// World to camera transform, always consistent with eye/center/up.
    view: Matrix4,
    projection: Projection,
    projection_matrix: Matrix4,
    camera_type: CameraType,
    defaults: CameraDefaults,
}

impl Camera {
    /// A default camera framing a `width` x `height` surface.
    pub fn new(width: u32, height: u32) -> Self {
        let defaults = CameraDefaults::new(width, height);
        let mut camera = Self {
            eye: Vector3::ZERO,
            center: Vector3::ZERO,
            up: Vector3::Y,
            view: Matrix4::IDENTITY,
            projection: Projection::Perspective {
                fovy: DEFAULT_FOVY,
                aspect: 1.0,
                near: 0.1,
                far: 100.0,
            },
            projection_matrix: Matrix4::IDENTITY,
            camera_type: CameraType::Default,
            defaults,
        };
        camera.reset();
        camera
    }

    /// Back to the default eye, look-at point and perspective.
    pub fn reset(&mut self) {
        self.reset_perspective();
        self.reset_view();
        self.camera_type = CameraType::Default;
    }

    pub fn eye(&self) -> Vector3 {
        self.eye
    }

    pub fn center(&self) -> Vector3 {
        self.center
    }

    pub fn up(&self) -> Vector3 {
        self.up
    }

    pub fn camera_type(&self) -> CameraType {
        self.camera_type
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    /// The world to camera matrix.
    pub fn view_matrix(&self) -> &Matrix4 {
        &self.view
    }

    pub fn projection_matrix(&self) -> &Matrix4 {
        &self.projection_matrix
    }

    /// Vertical field of view in radians, if the projection is a perspective.
    pub fn fovy(&self) -> Option<f32> {
        match self.projection {
            Projection::Perspective { fovy, .. } => Some(fovy),
            _ => None,
        }
    }

    /// The default eye position `(0, 0, (h / 2) / tan(fov / 2))`.
    pub fn default_eye(&self) -> Vector3 {
        Vector3::new(0.0, 0.0, self.defaults.eye_z)
    }

    /// Put the eye back at its default position looking at the origin.
    pub fn reset_view(&mut self) {
        self.apply_view(self.default_eye(), Vector3::ZERO, Vector3::Y);
    }

    /// Place the camera at `eye` looking at `center`, with `up` as the
    /// approximate up direction.
    pub fn set_view(&mut self, eye: Vector3, center: Vector3, up: Vector3) {
        self.apply_view(eye, center, up);
        self.camera_type = CameraType::Custom;
    }

    /// Move the eye, keeping the look direction.
    pub fn set_position(&mut self, position: Vector3) {
        let delta = position - self.eye;
        self.apply_view(position, self.center + delta, self.up);
    }

    /// Turn to look at `center`, keeping the eye.
    pub fn look_at(&mut self, center: Vector3) {
        self.apply_view(self.eye, center, self.up);
    }

    /// Move eye and center along the camera's own axes.
    pub fn move_local(&mut self, delta: Vector3) {
        let (x, y, z) = self.local_axes();
        let offset = x * delta.x + y * delta.y + z * delta.z;
        self.apply_view(self.eye + offset, self.center + offset, self.up);
    }

    /// Camera basis: `z` points from the center toward the eye, `x = up × z`
    /// and `y = z × x`. Both `x` and `y` are unit length unless the view is
    /// degenerate.
    pub fn local_axes(&self) -> (Vector3, Vector3, Vector3) {
        let z = (self.eye - self.center).try_normalize().unwrap_or(Vector3::ZERO);
        let x = self.up.cross(z);
        let y = z.cross(x);
        let x = x.try_normalize().unwrap_or(x);
        let y = y.try_normalize().unwrap_or(y);
        (x, y, z)
    }

    fn apply_view(&mut self, eye: Vector3, center: Vector3, up: Vector3) {
        self.eye = eye;
        self.center = center;
        self.up = up;
        let (x, y, z) = self.local_axes();
        #[rustfmt::skip]
        let mut view = Matrix4::from_array([
            x.x, y.x, z.x, 0.0,
            x.y, y.y, z.y, 0.0,
            x.z, y.z, z.z, 0.0,
            0.0, 0.0, 0.0, 1.0,
        ]);
        view.translate(-eye);
        self.view = view;
    }

    /// The default perspective for the current surface size.
    pub fn reset_perspective(&mut self) {
        let d = self.defaults;
        self.set_projection(Projection::Perspective {
            fovy: DEFAULT_FOVY,
            aspect: d.aspect(),
            near: d.near(),
            far: d.far(),
        });
    }

    /// Perspective projection with a vertical field of view in radians.
    ///
    /// Near planes at or below `0.0001` are raised to `0.01`. A far plane in
    /// front of the near plane is accepted with a warning; nothing will be
    /// visible.
    pub fn perspective(&mut self, fovy: f32, aspect: f32, near: f32, far: f32) {
        if far < near {
            tracing::warn!(
                "perspective: far plane {} is less than near plane {}, nothing will be shown",
                far,
                near
            );
        }
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
        self.set_projection(Projection::Perspective {
            fovy,
            aspect,
            near,
            far,
        });
        self.camera_type = CameraType::Custom;
    }

    /// The default orthographic projection: the surface size centered on
    /// the origin, depth `0..max(w, h) + 800`.
    pub fn default_ortho(&mut self) {
        let d = self.defaults;
        self.ortho(
            -d.width / 2.0,
            d.width / 2.0,
            -d.height / 2.0,
            d.height / 2.0,
            0.0,
            d.width.max(d.height) + 800.0,
        );
    }

    pub fn ortho(&mut self, left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) {
        self.set_projection(Projection::Ortho {
            left,
            right,
            bottom,
            top,
            near,
            far,
        });
        self.camera_type = CameraType::Custom;
    }

    pub fn frustum(&mut self, left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) {
        self.set_projection(Projection::Frustum {
            left,
            right,
            bottom,
            top,
            near,
            far,
        });
        self.camera_type = CameraType::Custom;
    }

    fn set_projection(&mut self, projection: Projection) {
        self.projection = projection;
        self.projection_matrix = projection.matrix();
    }

    /// Rotate the eye around the center by spherical deltas: `d_theta` about
    /// the vertical axis, `d_phi` toward or away from it, `d_radius` along
    /// the view direction.
    ///
    /// The radius never drops below [`MIN_ORBIT_RADIUS`] and the polar angle
    /// stays within `[MIN_ORBIT_PHI, π]`.
    pub fn orbit(&mut self, d_theta: f32, d_phi: f32, d_radius: f32) {
        let diff = self.eye - self.center;
        let radius = diff.mag();
        let theta = diff.x.atan2(diff.z);
        let phi = if radius > 0.0 {
            (diff.y / radius).clamp(-1.0, 1.0).acos()
        } else {
            PI / 2.0
        };
        let up_sign = if self.up.y > 0.0 { 1.0 } else { -1.0 };

        let theta = theta + d_theta;
        let phi = (phi + up_sign * d_phi).clamp(MIN_ORBIT_PHI, PI);
        let radius = (radius + d_radius).max(MIN_ORBIT_RADIUS);

        let offset = Vector3::new(
            phi.sin() * radius * theta.sin(),
            phi.cos() * radius,
            phi.sin() * radius * theta.cos(),
        );
        self.apply_view(self.center + offset, self.center, Vector3::Y);
    }

    /// Turn left or right about the camera's own up axis.
    pub fn pan(&mut self, angle: f32) {
        let (_, y, _) = self.local_axes();
        self.rotate_view(angle, y);
    }

    /// Turn up or down about the camera's own right axis.
    pub fn tilt(&mut self, angle: f32) {
        let (x, _, _) = self.local_axes();
        self.rotate_view(angle, x);
    }

    /// Rotates the center around the eye.
    fn rotate_view(&mut self, angle: f32, axis: Vector3) {
        let mut rotation = Matrix4::IDENTITY;
        rotation.rotate(angle, axis);
        let center = self.eye + rotation.multiply_direction(self.center - self.eye);
        self.apply_view(self.eye, center, self.up);
    }

    /// Track a new surface size.
    ///
    /// Default cameras recompute their eye and projection; custom cameras
    /// keep their parameters and only take the new aspect ratio.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.defaults = CameraDefaults::new(width, height);
        match self.camera_type {
            CameraType::Default => self.reset(),
            CameraType::Custom => {
                if let Projection::Perspective {
                    fovy, near, far, ..
                } = self.projection
                {
                    self.set_projection(Projection::Perspective {
                        fovy,
                        aspect: self.defaults.aspect(),
                        near,
                        far,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-3;

    #[test]
    fn test_default_framing() {
        let camera = Camera::new(200, 100);
        let eye_z = 50.0 / (PI / 6.0).tan();
        assert!((camera.eye().z - eye_z).abs() < EPS);
        match *camera.projection() {
            Projection::Perspective {
                fovy,
                aspect,
                near,
                far,
            } => {
                assert!((fovy - PI / 3.0).abs() < 1e-6);
                assert!((aspect - 2.0).abs() < 1e-6);
                assert!((near - eye_z * 0.1).abs() < EPS);
                assert!((far - eye_z * 10.0).abs() < 1e-2);
            }
            other => panic!("unexpected projection {other:?}"),
        }
        assert_eq!(camera.camera_type(), CameraType::Default);
    }

    #[test]
    fn test_view_maps_eye_to_origin_and_center_ahead() {
        let mut camera = Camera::new(100, 100);
        camera.set_view(Vector3::new(30.0, -20.0, 100.0), Vector3::new(5.0, 5.0, 0.0), Vector3::Y);
        let view = camera.view_matrix();
        assert!(view.multiply_point(camera.eye()).abs_diff_eq(Vector3::ZERO, EPS));
        let center = view.multiply_point(camera.center());
        let dist = (camera.eye() - camera.center()).mag();
        assert!(center.abs_diff_eq(Vector3::new(0.0, 0.0, -dist), 1e-2));
    }

    #[test]
    fn test_projection_is_y_down() {
        let camera = Camera::new(100, 100);
        // y = +10 in view space lands below the center in clip space
        let p = camera
            .projection_matrix()
            .multiply_and_normalize_point(Vector3::new(0.0, 10.0, -50.0));
        assert!(p.y < 0.0);
    }

    #[test]
    fn test_near_plane_clamped() {
        let mut camera = Camera::new(100, 100);
        camera.perspective(1.0, 1.0, 0.0, 100.0);
        match *camera.projection() {
            Projection::Perspective { near, .. } => assert_eq!(near, 0.01),
            other => panic!("unexpected projection {other:?}"),
        }
    }

    #[test]
    fn test_orbit_radius_never_below_minimum() {
        let mut camera = Camera::new(100, 100);
        for _ in 0..50 {
            camera.orbit(0.0, 0.0, -1000.0);
            let radius = (camera.eye() - camera.center()).mag();
            assert!(radius >= MIN_ORBIT_RADIUS - 1e-5, "radius {radius}");
        }
    }

    #[test]
    fn test_orbit_polar_angle_stays_in_range() {
        let mut camera = Camera::new(100, 100);
        for step in [0.7f32, -0.7] {
            for _ in 0..20 {
                camera.orbit(0.1, step, 0.0);
                let diff = camera.eye() - camera.center();
                let phi = (diff.y / diff.mag()).clamp(-1.0, 1.0).acos();
                assert!(phi <= PI + 1e-5, "phi {phi}");
                assert!(diff.x.hypot(diff.z) > 0.0, "eye reached the pole");
                assert!(camera.eye().x.is_finite() && camera.eye().z.is_finite());
            }
        }
    }

    #[test]
    fn test_orbit_keeps_radius() {
        let mut camera = Camera::new(100, 100);
        let before = camera.eye().mag();
        camera.orbit(0.5, 0.2, 0.0);
        assert!((camera.eye().mag() - before).abs() < 1e-2);
    }

    #[test]
    fn test_pan_and_tilt_keep_eye() {
        let mut camera = Camera::new(100, 100);
        let eye = camera.eye();
        camera.pan(0.3);
        assert!(camera.eye().abs_diff_eq(eye, 1e-5));
        assert!(camera.center().x.abs() > 1.0);
        let dist = (camera.center() - eye).mag();

        camera.tilt(0.3);
        assert!(camera.eye().abs_diff_eq(eye, 1e-5));
        assert!(((camera.center() - eye).mag() - dist).abs() < 1e-2);
    }

    #[test]
    fn test_resize_default_recomputes() {
        let mut camera = Camera::new(100, 100);
        camera.resize(100, 200);
        let eye_z = 100.0 / (PI / 6.0).tan();
        assert!((camera.eye().z - eye_z).abs() < EPS);
    }

    #[test]
    fn test_resize_custom_only_updates_aspect() {
        let mut camera = Camera::new(100, 100);
        camera.set_view(Vector3::new(0.0, 0.0, 300.0), Vector3::ZERO, Vector3::Y);
        camera.perspective(0.5, 1.0, 5.0, 500.0);
        camera.resize(400, 100);
        assert_eq!(camera.eye(), Vector3::new(0.0, 0.0, 300.0));
        assert_eq!(
            *camera.projection(),
            Projection::Perspective {
                fovy: 0.5,
                aspect: 4.0,
                near: 5.0,
                far: 500.0
            }
        );
    }

    #[test]
    fn test_clone_is_independent() {
        let camera = Camera::new(100, 100);
        let mut copy = camera.clone();
        copy.orbit(1.0, 0.0, 0.0);
        assert_ne!(copy.eye(), camera.eye());
    }
}
