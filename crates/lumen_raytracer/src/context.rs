//! Immutable per-job render snapshot.

use std::sync::Arc;

use lumen_core::Scene;
use lumen_math::{Camera, Mat4, Ray, UVec2, Vec2, Vec3};

use crate::environment::EnvironmentSampler;
use crate::error::{RayTraceError, Result};
use crate::geometry::{RenderMaterial, Triangle, TriangleList};
use crate::kdtree::KdTree;
use crate::options::RaytraceOptions;
use crate::Color;

/// Everything a worker reads while rendering one job.
///
/// Built once on the calling thread, then shared read-only (behind an
/// `Arc`) by the ordering pass and every worker.
pub struct RenderContext {
    pub tree: KdTree,
    pub materials: Vec<RenderMaterial>,
    pub camera: Camera,
    /// Cached for primary ray generation
    pub inverse_view_projection: Mat4,
    pub viewport: UVec2,
    pub environment: Option<Arc<dyn EnvironmentSampler>>,
}

impl RenderContext {
    /// Flatten `scene` and build the KD-tree.
    pub fn new(
        scene: &Scene,
        camera: &Camera,
        viewport: UVec2,
        options: &RaytraceOptions,
        environment: Option<Arc<dyn EnvironmentSampler>>,
    ) -> Result<Self> {
        Self::from_triangles(TriangleList::from_scene(scene), camera, viewport, options, environment)
    }

    /// Build the KD-tree over an already flattened triangle list.
    ///
    /// The camera's aspect ratio is replaced by the viewport's.
    pub fn from_triangles(
        list: TriangleList,
        camera: &Camera,
        viewport: UVec2,
        options: &RaytraceOptions,
        environment: Option<Arc<dyn EnvironmentSampler>>,
    ) -> Result<Self> {
        if viewport.x == 0 || viewport.y == 0 {
            return Err(RayTraceError::InvalidViewport {
                width: viewport.x,
                height: viewport.y,
            });
        }
        options.validate()?;

        let TriangleList {
            triangles,
            materials,
        } = list;
        let tree = KdTree::build(triangles, options.max_kd_tree_depth, options.kd_tree_splits)?;

        let mut camera = *camera;
        camera.set_aspect(viewport.x as f32 / viewport.y as f32);

        Ok(Self {
            tree,
            materials,
            inverse_view_projection: camera.inverse_view_projection(),
            camera,
            viewport,
            environment,
        })
    }

    /// Material of a triangle, falling back to the default entry.
    #[inline]
    pub fn material(&self, triangle: &Triangle) -> &RenderMaterial {
        self.materials
            .get(triangle.material_index)
            .or_else(|| self.materials.last())
            .unwrap_or(&DEFAULT_MATERIAL)
    }

    /// Radiance for rays leaving the scene; black without an environment.
    #[inline]
    pub fn environment_color(&self, direction: Vec3) -> Color {
        self.environment
            .as_ref()
            .map_or(Color::ZERO, |env| env.sample_in_direction(direction))
    }

    /// Primary ray through a point in pixel space.
    ///
    /// `(0, 0)` is the top-left corner of the viewport and `viewport` the
    /// bottom-right one; pixel `(x, y)` covers `[x, x+1) x [y, y+1)`.
    pub fn pixel_ray(&self, point: Vec2) -> Ray {
        let size = self.viewport.as_vec2();
        let ndc = Vec2::new(point.x / size.x * 2.0 - 1.0, 1.0 - point.y / size.y * 2.0);
        self.camera.cast_ray_with(&self.inverse_view_projection, ndc)
    }
}

static DEFAULT_MATERIAL: RenderMaterial = RenderMaterial {
    diffuse: Vec3::splat(0.5),
    specular: Vec3::ZERO,
    emissive: Vec3::ZERO,
    roughness: 1.0,
    ior: 0.0,
};
