// camera.rs - look-around camera at the centre of the panorama sphere

use glam::{EulerRot, Mat4, Quat, Vec3};
use std::f32::consts::FRAC_PI_2;

/// Margin that keeps pitch strictly inside (-π/2, π/2).
pub const PITCH_EPSILON: f32 = 0.01;
pub const PITCH_LIMIT: f32 = FRAC_PI_2 - PITCH_EPSILON;

pub const NEAR_PLANE: f32 = 0.1;
pub const FAR_PLANE: f32 = 1100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoomDirection {
    /// Narrower field-of-view.
    In,
    /// Wider field-of-view.
    Out,
}

/// Look direction and zoom. Yaw is unbounded, pitch and FOV are clamped on every update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraOrientation {
    pub yaw: f32,
    pub pitch: f32,
    /// Degrees.
    pub fov: f32,
}

impl CameraOrientation {
    pub fn new(fov: f32) -> Self {
        Self {
            yaw: 0.0,
            pitch: 0.0,
            fov,
        }
    }

    /// Apply a pointer delta in pixels. Dragging right turns the view left ("grab the world").
    pub fn rotate_by_drag(&mut self, dx: f32, dy: f32, sensitivity: f32) {
        self.yaw -= dx * sensitivity;
        self.pitch = (self.pitch - dy * sensitivity).clamp(-PITCH_LIMIT, PITCH_LIMIT);
    }

    pub fn zoom(&mut self, direction: ZoomDirection, step: f32, min: f32, max: f32) {
        let delta = match direction {
            ZoomDirection::In => -step,
            ZoomDirection::Out => step,
        };
        self.fov = (self.fov + delta).clamp(min, max);
    }

    /// Yaw about +Y first, then pitch about the rotated X axis; no roll.
    pub fn rotation(&self) -> Quat {
        Quat::from_euler(EulerRot::YXZ, self.yaw, self.pitch, 0.0)
    }

    /// Unit vector the camera looks along. Looks down -Z at yaw = pitch = 0.
    pub fn forward(&self) -> Vec3 {
        self.rotation() * Vec3::NEG_Z
    }
}

/// Perspective camera: orientation plus the projection derived from it.
#[derive(Debug, Clone)]
pub struct Camera {
    pub orientation: CameraOrientation,
    aspect: f32,
    projection: Mat4,
}

impl Camera {
    pub fn new(fov: f32, aspect: f32) -> Self {
        let mut camera = Self {
            orientation: CameraOrientation::new(fov),
            aspect,
            projection: Mat4::IDENTITY,
        };
        camera.update_projection();
        camera
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = aspect;
        self.update_projection();
    }

    pub fn update_projection(&mut self) {
        self.projection = Mat4::perspective_rh(
            self.orientation.fov.to_radians(),
            self.aspect,
            NEAR_PLANE,
            FAR_PLANE,
        );
    }

    /// World to view. The camera sits at the origin so only the rotation matters.
    pub fn view(&self) -> Mat4 {
        Mat4::from_quat(self.orientation.rotation().inverse())
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view()
    }
}

/// 35 mm equivalent focal length for a vertical field-of-view in degrees.
pub fn equivalent_focal_length(fov_deg: f32) -> f32 {
    let fov = fov_deg.clamp(0.01, 179.9).to_radians();
    24.0 / (2.0 * (fov * 0.5).tan())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn huge_vertical_drag_saturates_pitch() {
        let mut o = CameraOrientation::new(75.0);
        o.rotate_by_drag(0.0, -100_000.0, 0.0025);
        assert_eq!(o.pitch, PITCH_LIMIT);
        assert!(o.pitch < FRAC_PI_2);

        o.rotate_by_drag(0.0, 100_000.0, 0.0025);
        assert_eq!(o.pitch, -PITCH_LIMIT);
    }

    #[test]
    fn pitch_stays_bounded_over_many_drags() {
        let mut o = CameraOrientation::new(75.0);
        for i in 0..500 {
            let dy = if i % 3 == 0 { 900.0 } else { -450.0 };
            o.rotate_by_drag(13.0, dy, 0.0025);
            assert!(o.pitch.abs() <= PITCH_LIMIT);
        }
    }

    #[test]
    fn yaw_is_unbounded() {
        let mut o = CameraOrientation::new(75.0);
        o.rotate_by_drag(-10_000.0, 0.0, 0.0025);
        assert_relative_eq!(o.yaw, 25.0, epsilon = 1e-4);
    }

    #[test]
    fn zoom_out_saturates_at_max() {
        let mut o = CameraOrientation::new(75.0);
        for _ in 0..100 {
            o.zoom(ZoomDirection::Out, 2.0, 30.0, 100.0);
        }
        assert_eq!(o.fov, 100.0);
        for _ in 0..100 {
            o.zoom(ZoomDirection::In, 2.0, 30.0, 100.0);
        }
        assert_eq!(o.fov, 30.0);
    }

    #[test]
    fn positive_yaw_turns_left() {
        let mut o = CameraOrientation::new(75.0);
        o.yaw = FRAC_PI_2;
        let f = o.forward();
        assert_relative_eq!(f.x, -1.0, epsilon = 1e-5);
        assert_relative_eq!(f.z, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn yaw_applies_before_pitch_so_there_is_no_roll() {
        let mut o = CameraOrientation::new(75.0);
        o.yaw = 1.0;
        o.pitch = 0.7;
        // The camera's right vector must stay horizontal for any yaw/pitch pair.
        let right = o.rotation() * Vec3::X;
        assert_relative_eq!(right.y, 0.0, epsilon = 1e-6);
        assert_relative_eq!(o.forward().y, 0.7f32.sin(), epsilon = 1e-5);
    }

    #[test]
    fn aspect_change_rebuilds_projection() {
        let mut cam = Camera::new(75.0, 400.0 / 300.0);
        let before = cam.projection();
        cam.set_aspect(800.0 / 300.0);
        assert_relative_eq!(cam.aspect(), 800.0 / 300.0);
        assert_ne!(before, cam.projection());
        // x scale is cot(fov/2) / aspect
        let expected = 1.0 / (75.0f32.to_radians() * 0.5).tan() / (800.0 / 300.0);
        assert_relative_eq!(cam.projection().x_axis.x, expected, epsilon = 1e-5);
    }

    #[test]
    fn focal_length_of_normal_lens() {
        assert_relative_eq!(equivalent_focal_length(46.8), 27.7, epsilon = 0.1);
    }
}
