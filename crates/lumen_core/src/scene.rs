//! Scene graph types for Lumen.
//!
//! A scene is a set of prototypes (mesh + material reference) placed in the
//! world by instances. The ray tracer flattens this into a world-space
//! triangle list.

use std::sync::Arc;

use lumen_math::{Mat4, Quat, Vec3};
use thiserror::Error;

use crate::mesh::Mesh;

/// Errors raised while assembling a scene.
#[derive(Error, Debug, PartialEq)]
pub enum SceneError {
    #[error("Invalid prototype reference: {0}")]
    InvalidPrototype(usize),

    #[error("Invalid material reference: {0}")]
    InvalidMaterial(usize),
}

/// Surface description of a prototype.
#[derive(Clone, Debug)]
pub struct Material {
    /// Material name
    pub name: String,

    /// Diffuse/albedo color (RGB, 0-1)
    pub diffuse_color: Vec3,

    /// Specular reflection color (RGB, 0-1)
    pub specular_color: Vec3,

    /// Emissive color (RGB, for light-emitting surfaces)
    pub emissive_color: Vec3,

    /// Ambient color, not used by path tracing
    pub ambient_color: Vec3,

    /// Roughness factor (0=smooth, 1=rough)
    pub roughness: f32,

    /// Index of refraction, meaningful for transparent materials
    pub ior: f32,

    /// Transparency (0=opaque, 1=fully transmissive)
    pub transparency: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: String::new(),
            diffuse_color: Vec3::new(0.5, 0.5, 0.5), // Grey default
            specular_color: Vec3::ZERO,
            emissive_color: Vec3::ZERO,
            ambient_color: Vec3::ZERO,
            roughness: 1.0,
            ior: 1.5,
            transparency: 0.0,
        }
    }
}

impl Material {
    /// Create a new material with just a name and diffuse color.
    pub fn new(name: impl Into<String>, diffuse_color: Vec3) -> Self {
        Self {
            name: name.into(),
            diffuse_color,
            ..Default::default()
        }
    }

    /// Polished conductor-like surface reflecting `specular_color`.
    pub fn mirror(name: impl Into<String>, specular_color: Vec3, roughness: f32) -> Self {
        Self {
            name: name.into(),
            diffuse_color: Vec3::ZERO,
            specular_color,
            roughness,
            ..Default::default()
        }
    }

    /// Transparent dielectric (glass, water) with the given index of refraction.
    pub fn glass(name: impl Into<String>, ior: f32) -> Self {
        Self {
            name: name.into(),
            diffuse_color: Vec3::ONE,
            specular_color: Vec3::ONE,
            roughness: 0.0,
            ior,
            transparency: 1.0,
            ..Default::default()
        }
    }

    /// Light-emitting surface.
    pub fn emitter(name: impl Into<String>, emissive_color: Vec3) -> Self {
        Self {
            name: name.into(),
            diffuse_color: Vec3::ZERO,
            emissive_color,
            ..Default::default()
        }
    }

    /// Check if this material transmits light.
    pub fn is_transparent(&self) -> bool {
        self.transparency > 0.0
    }
}

/// A prototype is a shared mesh + material that can be instanced.
#[derive(Clone, Debug)]
pub struct Prototype {
    /// Unique identifier within the scene
    pub id: usize,

    /// Prototype name
    pub name: String,

    /// Shared mesh geometry
    pub mesh: Arc<Mesh>,

    /// Index into the scene material table (optional, defaults to grey)
    pub material_id: Option<usize>,
}

impl Prototype {
    /// Create a new prototype from a mesh.
    pub fn new(id: usize, name: String, mesh: Arc<Mesh>) -> Self {
        Self {
            id,
            name,
            mesh,
            material_id: None,
        }
    }
}

/// Transform components that can be composed into a matrix.
#[derive(Clone, Debug)]
pub struct Transform {
    /// Translation
    pub translation: Vec3,

    /// Rotation (as quaternion)
    pub rotation: Quat,

    /// Scale
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    /// Create a new transform with only translation.
    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Default::default()
        }
    }

    /// Convert to a 4x4 transformation matrix.
    ///
    /// Order: Scale -> Rotate -> Translate (SRT)
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

/// An instance of a prototype with a world transform.
#[derive(Clone, Debug)]
pub struct Instance {
    /// Index of the prototype this instance references
    pub prototype_id: usize,

    /// Instance transform
    pub transform: Transform,
}

impl Instance {
    /// Create a new instance of a prototype.
    pub fn new(prototype_id: usize, transform: Transform) -> Self {
        Self {
            prototype_id,
            transform,
        }
    }

    /// Get the 4x4 model matrix for this instance.
    pub fn model_matrix(&self) -> Mat4 {
        self.transform.to_matrix()
    }
}

/// A complete scene containing prototypes, instances, and materials.
#[derive(Clone, Debug, Default)]
pub struct Scene {
    /// Shared prototype definitions (meshes)
    pub prototypes: Vec<Arc<Prototype>>,

    /// Instances referencing prototypes
    pub instances: Vec<Instance>,

    /// Materials used in the scene
    pub materials: Vec<Arc<Material>>,

    /// Scene name
    pub name: String,
}

impl Scene {
    /// Create an empty scene.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Add a prototype to the scene and return its ID.
    pub fn add_prototype(
        &mut self,
        mesh: Arc<Mesh>,
        name: impl Into<String>,
        material_id: Option<usize>,
    ) -> Result<usize, SceneError> {
        if let Some(material_id) = material_id {
            if material_id >= self.materials.len() {
                return Err(SceneError::InvalidMaterial(material_id));
            }
        }

        let id = self.prototypes.len();
        let mut prototype = Prototype::new(id, name.into(), mesh);
        prototype.material_id = material_id;
        self.prototypes.push(Arc::new(prototype));
        Ok(id)
    }

    /// Add an instance of a prototype.
    pub fn add_instance(
        &mut self,
        prototype_id: usize,
        transform: Transform,
    ) -> Result<(), SceneError> {
        if prototype_id >= self.prototypes.len() {
            return Err(SceneError::InvalidPrototype(prototype_id));
        }
        self.instances.push(Instance::new(prototype_id, transform));
        Ok(())
    }

    /// Add a mesh placed once at the origin, returning the prototype ID.
    pub fn add_mesh(
        &mut self,
        mesh: Mesh,
        name: impl Into<String>,
        material_id: Option<usize>,
    ) -> Result<usize, SceneError> {
        let id = self.add_prototype(Arc::new(mesh), name, material_id)?;
        self.add_instance(id, Transform::default())?;
        Ok(id)
    }

    /// Add a material to the scene and return its ID.
    pub fn add_material(&mut self, material: Material) -> usize {
        let id = self.materials.len();
        self.materials.push(Arc::new(material));
        id
    }

    /// Iterate instances together with the prototype they reference.
    ///
    /// Instances with a dangling prototype reference are skipped.
    pub fn placed_prototypes(&self) -> impl Iterator<Item = (&Instance, &Prototype)> + '_ {
        self.instances.iter().filter_map(|instance| {
            self.prototypes
                .get(instance.prototype_id)
                .map(|proto| (instance, proto.as_ref()))
        })
    }

    /// Get total triangle count across all instances.
    pub fn total_triangle_count(&self) -> usize {
        self.placed_prototypes()
            .map(|(_, proto)| proto.mesh.triangle_count())
            .sum()
    }

    /// Get total instance count.
    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle_mesh() -> Arc<Mesh> {
        Arc::new(Mesh::new(
            vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            vec![0, 1, 2],
            None,
        ))
    }

    #[test]
    fn test_scene_creation() {
        let mut scene = Scene::new("test");

        let proto_id = scene
            .add_prototype(triangle_mesh(), "triangle", None)
            .unwrap();
        assert_eq!(proto_id, 0);

        scene.add_instance(proto_id, Transform::default()).unwrap();
        scene
            .add_instance(proto_id, Transform::from_translation(Vec3::new(1.0, 0.0, 0.0)))
            .unwrap();

        assert_eq!(scene.prototypes.len(), 1);
        assert_eq!(scene.instance_count(), 2);
        assert_eq!(scene.total_triangle_count(), 2);
    }

    #[test]
    fn test_invalid_references() {
        let mut scene = Scene::new("test");

        assert_eq!(
            scene.add_prototype(triangle_mesh(), "triangle", Some(3)),
            Err(SceneError::InvalidMaterial(3))
        );
        assert_eq!(
            scene.add_instance(7, Transform::default()),
            Err(SceneError::InvalidPrototype(7))
        );
    }

    #[test]
    fn test_material_presets() {
        assert!(Material::glass("glass", 1.5).is_transparent());
        assert!(!Material::default().is_transparent());
        assert_eq!(Material::emitter("light", Vec3::splat(4.0)).diffuse_color, Vec3::ZERO);
        assert_eq!(Material::mirror("chrome", Vec3::ONE, 0.1).roughness, 0.1);
    }

    #[test]
    fn test_transform_matrix_srt_order() {
        let transform = Transform {
            translation: Vec3::new(1.0, 2.0, 3.0),
            rotation: Quat::from_rotation_y(std::f32::consts::FRAC_PI_4),
            scale: Vec3::new(2.0, 2.0, 2.0),
        };

        // Scaled first, then rotated about Y, then translated
        let point = transform.to_matrix().transform_point3(Vec3::X);
        let half_sqrt2 = std::f32::consts::FRAC_1_SQRT_2 * 2.0;
        let expected = Vec3::new(1.0 + half_sqrt2, 2.0, 3.0 - half_sqrt2);
        assert!((point - expected).length() < 1e-4);
    }
}
