// Transform utilities for Mat4
//
// Extends glam::Mat4 with the normal transform needed when scene instances
// are flattened into world space.
// Note: glam::Mat4 already provides transform_point3(), transform_vector3() and inverse()

use glam::{Mat3, Mat4, Vec3};

/// Extension trait for Mat4 to provide additional transform utilities
pub trait Mat4Ext {
    /// Transform a surface normal with the inverse transpose of the upper 3x3.
    ///
    /// The result is normalized. Degenerate matrices fall back to `normal`.
    fn transform_normal3(&self, normal: Vec3) -> Vec3;
}

impl Mat4Ext for Mat4 {
    fn transform_normal3(&self, normal: Vec3) -> Vec3 {
        let linear = Mat3::from_mat4(*self);
        if linear.determinant().abs() <= f32::EPSILON {
            return normal;
        }
        let transformed = (linear.inverse().transpose() * normal).normalize_or_zero();
        if transformed == Vec3::ZERO {
            normal
        } else {
            transformed
        }
    }

}
