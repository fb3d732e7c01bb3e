//! Lumen Core - Scene graph types consumed by the ray tracer.
//!
//! This crate provides:
//!
//! - **Scene graph types**: `Scene`, `Prototype`, `Instance`, `Mesh`, `Material`
//!
//! # Example
//!
//! ```
//! use lumen_core::{Material, Mesh, Scene};
//! use lumen_math::Vec3;
//!
//! let mut scene = Scene::new("example");
//! let white = scene.add_material(Material::new("white", Vec3::ONE));
//! scene
//!     .add_mesh(Mesh::quad(Vec3::ZERO, Vec3::X, Vec3::Y), "floor", Some(white))
//!     .unwrap();
//! assert_eq!(scene.total_triangle_count(), 2);
//! ```

pub mod mesh;
pub mod scene;

// Re-export commonly used types
pub use mesh::Mesh;
pub use scene::{Instance, Material, Prototype, Scene, SceneError, Transform};
