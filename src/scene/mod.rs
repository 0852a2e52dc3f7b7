//! Scene matrices
//!
//! The camera and model are fixed; only the field of view and aspect ratio
//! reported by the window change between frames.

mod camera;
mod transform;

pub use camera::*;
pub use transform::*;

use glam::{Mat4, Vec3};

pub const EYE: Vec3 = Vec3::new(8.0, 3.0, 5.0);
pub const TARGET: Vec3 = Vec3::ZERO;
pub const UP: Vec3 = Vec3::Y;
/// The window's field of view is widened by this factor
pub const FOVY_SCALE: f32 = 3.0;
pub const NEAR: f32 = 0.1;
pub const FAR: f32 = 100.0;

/// Matrices uploaded each frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameMatrices {
    /// Object model-view-projection
    pub mvp: Mat4,
    /// Skybox view-projection, translation removed
    pub vp: Mat4,
}

impl FrameMatrices {
    pub fn compute(camera: &Camera, model: &Transform) -> Self {
        let projection = camera.projection_matrix();
        Self {
            mvp: projection * camera.view_matrix() * model.matrix(),
            vp: projection * camera.rotation_view_matrix(),
        }
    }
}

/// The demo's camera for a window reporting `fovy` (radians) and `aspect`
pub fn demo_camera(fovy: f32, aspect: f32) -> Camera {
    Camera {
        position: EYE,
        target: TARGET,
        up: UP,
        projection: Projection::perspective(fovy * FOVY_SCALE, aspect, NEAR, FAR),
    }
}

/// The demo's object transform
pub fn demo_transform() -> Transform {
    Transform::new()
        .with_scale(Vec3::ONE)
        .with_rotation(0.0, Vec3::ONE)
        .with_position(Vec3::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skybox_vp_ignores_eye_translation() {
        let model = demo_transform();
        let near = demo_camera(0.3, 1.5);
        let mut far = near.clone();
        far.position += Vec3::new(10.0, -4.0, 7.0);
        far.target += Vec3::new(10.0, -4.0, 7.0);

        let a = FrameMatrices::compute(&near, &model);
        let b = FrameMatrices::compute(&far, &model);
        assert!(a.vp.abs_diff_eq(b.vp, 1e-5));
        assert!(!a.mvp.abs_diff_eq(b.mvp, 1e-3));
    }

    #[test]
    fn test_identity_model_mvp_is_view_projection() {
        let camera = demo_camera(15f32.to_radians(), 4.0 / 3.0);
        let matrices = FrameMatrices::compute(&camera, &demo_transform());
        assert!(matrices
            .mvp
            .abs_diff_eq(camera.view_projection_matrix(), 1e-6));
    }

    #[test]
    fn test_projection_uses_scaled_fovy() {
        let camera = demo_camera(15f32.to_radians(), 1.0);
        let expected = Mat4::perspective_rh(45f32.to_radians(), 1.0, NEAR, FAR);
        assert!(camera.projection_matrix().abs_diff_eq(expected, 1e-6));
    }
}
