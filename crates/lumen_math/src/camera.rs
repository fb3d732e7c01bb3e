use glam::{Mat4, Vec2, Vec3};

use crate::Ray;

/// Perspective pinhole camera.
///
/// Normalized device coordinates follow glam's right-handed convention:
/// x and y in `[-1, 1]` with +y up, depth in `[0, 1]` from near to far.
#[derive(Debug, Clone, Copy)]
pub struct Camera {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub fov_y: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    /// Create a new camera
    pub fn new(position: Vec3, target: Vec3, aspect: f32) -> Self {
        Self {
            position,
            target,
            up: Vec3::Y,
            fov_y: 45.0_f32.to_radians(),
            aspect,
            near: 0.1,
            far: 100.0,
        }
    }

    /// Get the view matrix (world → camera space)
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    /// Get the projection matrix (camera → clip space)
    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, self.aspect, self.near, self.far)
    }

    /// Get the combined view-projection matrix
    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Update aspect ratio (e.g., on window resize)
    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = aspect;
    }

    /// Inverse of the view-projection matrix, for [`Camera::cast_ray_with`].
    pub fn inverse_view_projection(&self) -> Mat4 {
        self.view_projection_matrix().inverse()
    }

    /// Build the primary ray through a point given in normalized device coordinates.
    ///
    /// The ray starts at the camera position and its direction is normalized.
    pub fn cast_ray(&self, ndc: Vec2) -> Ray {
        self.cast_ray_with(&self.inverse_view_projection(), ndc)
    }

    /// [`Camera::cast_ray`] with the inverse view-projection computed once by the caller.
    pub fn cast_ray_with(&self, inverse_view_projection: &Mat4, ndc: Vec2) -> Ray {
        let far = *inverse_view_projection * ndc.extend(1.0).extend(1.0);
        let far = far.truncate() / far.w;
        Ray::new(self.position, (far - self.position).normalize())
    }

    /// Project a world-space point into normalized device coordinates.
    ///
    /// Returns `None` for points behind the camera.
    pub fn project(&self, point: Vec3) -> Option<Vec3> {
        let clip = self.view_projection_matrix() * point.extend(1.0);
        if clip.w <= f32::EPSILON {
            return None;
        }
        Some(clip.truncate() / clip.w)
    }
}
