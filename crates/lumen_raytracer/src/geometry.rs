//! World-space triangle list and flat material table.
//!
//! The scene graph is flattened once per render: every instance is baked
//! into world-space triangles that reference materials by index. Both
//! tables are immutable for the rest of the render.

use std::f32::consts::FRAC_PI_2;

use lumen_core::{Material, Scene};
use lumen_math::{Mat4Ext, Ray, Vec2, Vec3};

use crate::Color;

/// Numerical tolerance shared by the KD-tree builder (box edge rejection,
/// triangle padding) and traversal (hit acceptance, ray offsets).
pub const EPSILON: f32 = 1e-4;

/// A world-space triangle with shading normals and precomputed edges.
#[derive(Debug, Clone, Copy)]
pub struct Triangle {
    /// Vertex positions
    pub v: [Vec3; 3],
    /// Vertex normals (unit length)
    pub n: [Vec3; 3],
    /// `v1 - v0`
    pub edge1: Vec3,
    /// `v2 - v0`
    pub edge2: Vec3,
    /// Index into the material table
    pub material_index: usize,
}

impl Triangle {
    /// Create a triangle from positions, vertex normals and a material index.
    pub fn new(v: [Vec3; 3], n: [Vec3; 3], material_index: usize) -> Self {
        Self {
            v,
            n,
            edge1: v[1] - v[0],
            edge2: v[2] - v[0],
            material_index,
        }
    }

    /// Create a flat-shaded triangle whose vertex normals all equal the face normal.
    pub fn flat(v: [Vec3; 3], material_index: usize) -> Self {
        let normal = (v[1] - v[0]).cross(v[2] - v[0]).normalize_or_zero();
        Self::new(v, [normal; 3], material_index)
    }

    /// Smallest corner of the triangle's bounds.
    #[inline]
    pub fn min_vertex(&self) -> Vec3 {
        self.v[0].min(self.v[1]).min(self.v[2])
    }

    /// Largest corner of the triangle's bounds.
    #[inline]
    pub fn max_vertex(&self) -> Vec3 {
        self.v[0].max(self.v[1]).max(self.v[2])
    }

    /// Unit normal of the triangle plane (counter-clockwise winding).
    pub fn geometric_normal(&self) -> Vec3 {
        self.edge1.cross(self.edge2).normalize_or_zero()
    }

    /// Shading normal blended from the vertex normals.
    pub fn interpolated_normal(&self, barycentric: Vec3) -> Vec3 {
        let n = self.n[0] * barycentric.x + self.n[1] * barycentric.y + self.n[2] * barycentric.z;
        let n = n.normalize_or_zero();
        if n == Vec3::ZERO {
            self.geometric_normal()
        } else {
            n
        }
    }

    /// Point at the given barycentric coordinates.
    pub fn interpolated_point(&self, barycentric: Vec3) -> Vec3 {
        self.v[0] * barycentric.x + self.v[1] * barycentric.y + self.v[2] * barycentric.z
    }
}

/// The subset of a triangle read by the hot intersection loop.
///
/// Kept in an array parallel to the triangle list so traversal touches
/// 36 bytes per candidate instead of the full triangle.
#[derive(Debug, Clone, Copy)]
pub struct IntersectionSupportData {
    pub v0: Vec3,
    pub edge1: Vec3,
    pub edge2: Vec3,
}

impl From<&Triangle> for IntersectionSupportData {
    fn from(triangle: &Triangle) -> Self {
        Self {
            v0: triangle.v[0],
            edge1: triangle.edge1,
            edge2: triangle.edge2,
        }
    }
}

impl IntersectionSupportData {
    /// Möller-Trumbore ray-triangle intersection algorithm.
    ///
    /// Returns the ray parameter `t` and the `(u, v)` barycentrics of
    /// vertices 1 and 2. The caller decides which `t` range is acceptable.
    #[inline]
    pub fn intersect(&self, ray: &Ray) -> Option<(f32, Vec2)> {
        let h = ray.direction.cross(self.edge2);
        let a = self.edge1.dot(h);

        // Ray is parallel to triangle
        if a.abs() < 1e-8 {
            return None;
        }

        let f = 1.0 / a;
        let s = ray.origin - self.v0;
        let u = f * s.dot(h);
        if !(0.0..=1.0).contains(&u) {
            return None;
        }

        let q = s.cross(self.edge1);
        let v = f * ray.direction.dot(q);
        if v < 0.0 || u + v > 1.0 {
            return None;
        }

        Some((f * self.edge2.dot(q), Vec2::new(u, v)))
    }
}

/// Material as seen by the integrator: flat colors only.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderMaterial {
    pub diffuse: Color,
    pub specular: Color,
    pub emissive: Color,
    /// Remapped roughness in `[0, 1]`; also the diffuse/specular split probability
    pub roughness: f32,
    /// Index of refraction, 0 for opaque materials
    pub ior: f32,
}

impl Default for RenderMaterial {
    fn default() -> Self {
        Self {
            diffuse: Color::splat(0.5),
            specular: Color::ZERO,
            emissive: Color::ZERO,
            roughness: 1.0,
            ior: 0.0,
        }
    }
}

impl RenderMaterial {
    /// Convert a scene material.
    ///
    /// Roughness goes through `1 - cos(r * pi / 2)`, which keeps the end
    /// points and makes low roughness values much glossier. Opaque
    /// materials get `ior = 0`.
    pub fn from_scene(material: &Material) -> Self {
        let r = material.roughness.clamp(0.0, 1.0);
        Self {
            diffuse: material.diffuse_color,
            specular: material.specular_color,
            emissive: material.emissive_color,
            roughness: 1.0 - (r * FRAC_PI_2).cos(),
            ior: if material.is_transparent() {
                material.ior.max(0.0)
            } else {
                0.0
            },
        }
    }

    /// True when rays should refract through the surface.
    #[inline]
    pub fn is_dielectric(&self) -> bool {
        self.ior > 1.0 + EPSILON
    }
}

/// Flattened scene: world-space triangles plus the material table they index.
#[derive(Debug, Clone, Default)]
pub struct TriangleList {
    pub triangles: Vec<Triangle>,
    pub materials: Vec<RenderMaterial>,
}

impl TriangleList {
    /// Bake every scene instance into world space.
    ///
    /// Scene materials keep their indices; one extra default material is
    /// appended for prototypes without (or with a dangling) material.
    pub fn from_scene(scene: &Scene) -> Self {
        let mut materials: Vec<RenderMaterial> = scene
            .materials
            .iter()
            .map(|m| RenderMaterial::from_scene(m))
            .collect();
        let default_material = materials.len();
        materials.push(RenderMaterial::default());

        let mut triangles = Vec::with_capacity(scene.total_triangle_count());
        for (instance, proto) in scene.placed_prototypes() {
            let matrix = instance.model_matrix();
            let mesh = &proto.mesh;

            let material_index = match proto.material_id {
                Some(id) if id < default_material => id,
                Some(id) => {
                    log::warn!(
                        "Prototype '{}' references missing material {}, using default",
                        proto.name,
                        id
                    );
                    default_material
                }
                None => default_material,
            };

            let normals = mesh.normals.as_deref().filter(|_| mesh.has_normals());
            for [i0, i1, i2] in mesh.triangle_indices() {
                let v = [
                    matrix.transform_point3(mesh.positions[i0]),
                    matrix.transform_point3(mesh.positions[i1]),
                    matrix.transform_point3(mesh.positions[i2]),
                ];
                let triangle = match normals {
                    Some(normals) => Triangle::new(
                        v,
                        [
                            matrix.transform_normal3(normals[i0]),
                            matrix.transform_normal3(normals[i1]),
                            matrix.transform_normal3(normals[i2]),
                        ],
                        material_index,
                    ),
                    None => Triangle::flat(v, material_index),
                };
                triangles.push(triangle);
            }
        }

        Self {
            triangles,
            materials,
        }
    }

    /// Number of triangles.
    pub fn len(&self) -> usize {
        self.triangles.len()
    }

    /// True when no triangle survived flattening.
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_core::{Mesh, Transform};
    use std::sync::Arc;

    fn unit_triangle() -> Triangle {
        Triangle::flat([Vec3::ZERO, Vec3::X, Vec3::Y], 0)
    }

    #[test]
    fn test_triangle_edges_and_bounds() {
        let tri = Triangle::flat(
            [Vec3::new(1.0, 0.0, 2.0), Vec3::new(3.0, -1.0, 2.0), Vec3::new(0.0, 4.0, 5.0)],
            0,
        );

        assert_eq!(tri.edge1, Vec3::new(2.0, -1.0, 0.0));
        assert_eq!(tri.edge2, Vec3::new(-1.0, 4.0, 3.0));
        assert_eq!(tri.min_vertex(), Vec3::new(0.0, -1.0, 2.0));
        assert_eq!(tri.max_vertex(), Vec3::new(3.0, 4.0, 5.0));
    }

    #[test]
    fn test_triangle_hit() {
        let data = IntersectionSupportData::from(&unit_triangle());

        let ray = Ray::new(Vec3::new(0.25, 0.25, 1.0), Vec3::NEG_Z);
        let (t, uv) = data.intersect(&ray).unwrap();

        assert!((t - 1.0).abs() < 1e-5);
        assert!((uv - Vec2::new(0.25, 0.25)).length() < 1e-5);
    }

    #[test]
    fn test_triangle_miss() {
        let data = IntersectionSupportData::from(&unit_triangle());

        // Outside the triangle
        let ray = Ray::new(Vec3::new(0.8, 0.8, 1.0), Vec3::NEG_Z);
        assert!(data.intersect(&ray).is_none());

        // Parallel to the plane
        let ray = Ray::new(Vec3::new(0.2, 0.2, 1.0), Vec3::X);
        assert!(data.intersect(&ray).is_none());

        // Pointing away reports a negative t, left for the caller to reject
        let ray = Ray::new(Vec3::new(0.25, 0.25, 1.0), Vec3::Z);
        let (t, _) = data.intersect(&ray).unwrap();
        assert!(t < 0.0);
    }

    #[test]
    fn test_interpolated_normal() {
        let tri = Triangle::new(
            [Vec3::ZERO, Vec3::X, Vec3::Y],
            [Vec3::Z, Vec3::X, Vec3::Z],
            0,
        );

        assert!((tri.interpolated_normal(Vec3::new(1.0, 0.0, 0.0)) - Vec3::Z).length() < 1e-5);
        let blended = tri.interpolated_normal(Vec3::new(0.0, 0.5, 0.5));
        assert!((blended - Vec3::new(1.0, 0.0, 1.0).normalize()).length() < 1e-5);
    }

    #[test]
    fn test_material_conversion() {
        let diffuse = RenderMaterial::from_scene(&Material::new("white", Vec3::ONE));
        assert_eq!(diffuse.ior, 0.0);
        assert!((diffuse.roughness - 1.0).abs() < 1e-6);
        assert!(!diffuse.is_dielectric());

        let glass = RenderMaterial::from_scene(&Material::glass("glass", 1.5));
        assert!(glass.is_dielectric());
        assert_eq!(glass.roughness, 0.0);

        // Cosine remap keeps low roughness glossy
        let half = RenderMaterial::from_scene(&Material::mirror("chrome", Vec3::ONE, 0.5));
        assert!(half.roughness < 0.5 && half.roughness > 0.0);
    }

    #[test]
    fn test_triangle_list_from_scene() {
        let mut scene = Scene::new("test");
        let red = scene.add_material(Material::new("red", Vec3::X));
        let quad = scene
            .add_prototype(Arc::new(Mesh::quad(Vec3::ZERO, Vec3::X, Vec3::Y)), "quad", Some(red))
            .unwrap();
        scene
            .add_instance(quad, Transform::from_translation(Vec3::new(0.0, 0.0, -2.0)))
            .unwrap();
        scene
            .add_mesh(
                Mesh::new(vec![Vec3::ZERO, Vec3::Y, Vec3::X], vec![0, 1, 2], None),
                "bare",
                None,
            )
            .unwrap();

        let list = TriangleList::from_scene(&scene);

        assert_eq!(list.len(), 3);
        assert_eq!(list.materials.len(), 2);
        assert_eq!(list.triangles[0].material_index, red);
        assert!((list.triangles[0].v[0].z + 2.0).abs() < 1e-6);
        assert!((list.triangles[0].n[0] - Vec3::Z).length() < 1e-5);

        // Mesh without normals gets its face normal and the default material
        let bare = &list.triangles[2];
        assert_eq!(bare.material_index, 1);
        assert!((bare.n[0] - Vec3::NEG_Z).length() < 1e-5);
    }
}
