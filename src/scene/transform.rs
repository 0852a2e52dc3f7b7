//! Model transform

use glam::{Mat4, Vec3};

/// Scale, rotation about an axis and translation of a model
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub scale: Vec3,
    /// Rotation angle in degrees
    pub angle: f32,
    pub axis: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            scale: Vec3::ONE,
            angle: 0.0,
            axis: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn with_rotation(mut self, angle: f32, axis: Vec3) -> Self {
        self.angle = angle;
        self.axis = axis;
        self
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    /// `scale * rotate * translate`, applied in that order to the identity.
    ///
    /// The translation is therefore expressed in the scaled, rotated frame.
    /// A zero axis leaves the rotation out.
    pub fn matrix(&self) -> Mat4 {
        let rotation = match self.axis.try_normalize() {
            Some(axis) => Mat4::from_axis_angle(axis, self.angle.to_radians()),
            None => Mat4::IDENTITY,
        };
        Mat4::from_scale(self.scale) * rotation * Mat4::from_translation(self.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_identity() {
        assert!(Transform::default()
            .matrix()
            .abs_diff_eq(Mat4::IDENTITY, 1e-6));
    }

    #[test]
    fn test_translation_in_scaled_frame() {
        let transform = Transform::from_position(Vec3::X).with_scale(Vec3::splat(2.0));
        let p = transform.matrix().transform_point3(Vec3::ZERO);
        assert!(p.abs_diff_eq(Vec3::new(2.0, 0.0, 0.0), 1e-6));
    }

    #[test]
    fn test_rotation_about_axis() {
        let transform = Transform::new().with_rotation(90.0, Vec3::Z);
        let p = transform.matrix().transform_point3(Vec3::X);
        assert!(p.abs_diff_eq(Vec3::Y, 1e-6));

        let degenerate = Transform::new().with_rotation(90.0, Vec3::ZERO);
        assert!(degenerate.matrix().abs_diff_eq(Mat4::IDENTITY, 1e-6));
    }
}
