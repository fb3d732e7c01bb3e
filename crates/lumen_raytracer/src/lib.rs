//! Lumen ray tracer - KD-tree accelerated CPU path tracing.
//!
//! The scene is flattened into world-space triangles, indexed by a KD-tree
//! built with the surface area heuristic, and rendered by an iterative path
//! tracer. Rendering is split into regions that a pool of worker threads
//! claims, most expensive first, with cooperative cancellation between
//! pixels.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::{mpsc, Arc};
//!
//! use lumen_core::{Material, Mesh, Scene};
//! use lumen_math::{Camera, UVec2, Vec3};
//! use lumen_raytracer::{ImageBuffer, Raytracer, SkyGradient};
//!
//! let mut scene = Scene::new("example");
//! let white = scene.add_material(Material::new("white", Vec3::splat(0.8)));
//! scene
//!     .add_mesh(Mesh::cuboid(Vec3::splat(-1.0), Vec3::splat(1.0)), "cube", Some(white))
//!     .unwrap();
//!
//! let (tx, rx) = mpsc::channel();
//! let mut raytracer = Raytracer::new(Arc::new(tx));
//! raytracer.set_environment(Some(Arc::new(SkyGradient::default())));
//!
//! let camera = Camera::new(Vec3::new(3.0, 2.0, 4.0), Vec3::ZERO, 1.0);
//! raytracer.perform(&scene, &camera, UVec2::new(320, 240)).unwrap();
//!
//! let mut image = ImageBuffer::new(320, 240);
//! for event in rx.iter() {
//!     if image.apply(event).is_some() {
//!         break;
//!     }
//! }
//! image.save_png("cube.png").unwrap();
//! ```

mod context;
mod environment;
mod error;
mod geometry;
mod integrator;
mod kdtree;
mod options;
mod output;
mod overlay;
mod raytracer;
mod region;
mod sampling;

/// Linear RGB color.
pub type Color = lumen_math::Vec3;

pub use context::RenderContext;
pub use environment::{ConstantEnvironment, EnvironmentSampler, SkyGradient};
pub use error::{RayTraceError, Result};
pub use geometry::{IntersectionSupportData, RenderMaterial, Triangle, TriangleList, EPSILON};
pub use integrator::{gather, raytrace_pixel, MAX_BOUNCES};
pub use kdtree::{
    KdTree, KdTreeStats, Node, Split, TraverseResult, DEFAULT_MAX_DEPTH, MIN_TRIANGLES_PER_NODE,
    TRAVERSE_STACK_SIZE,
};
pub use options::RaytraceOptions;
pub use output::{color_to_rgba, linear_to_gamma, ImageBuffer, PixelSink, RenderEvent, RenderOutcome};
pub use raytracer::{RenderState, Raytracer};
pub use region::{partition_regions, Region};
