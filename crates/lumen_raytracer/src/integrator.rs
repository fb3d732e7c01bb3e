//! Iterative path tracing integrator.
//!
//! A path is followed bounce by bounce. Each surface interaction pushes an
//! `(add, mul)` pair onto a fixed-size stack and the environment lookup
//! that ends the path pushes `(environment, 0)`. Folding the stack from the
//! last entry back (`result = result * mul + add`) gives the same value as
//! the recursive `emissive + albedo * trace(bounce)` without recursion.
//!
//! A bounce starts just off the surface on the side it leaves through and
//! skips the triangle it left, so rounding in the hit point cannot put the
//! next segment behind the surface.

use lumen_math::{Ray, UVec2, Vec2, Vec3};
use rand::Rng;
use smallvec::SmallVec;

use crate::context::RenderContext;
use crate::geometry::{RenderMaterial, EPSILON};
use crate::sampling::{reflect, refract, sample_rough_normal, schlick};
use crate::Color;

/// Maximum surface interactions per path.
pub const MAX_BOUNCES: usize = 64;

#[derive(Debug, Clone, Copy)]
struct Operation {
    add: Color,
    mul: Color,
}

/// Trace one path starting with `ray`.
///
/// Returns the radiance carried back along the ray and the number of
/// surfaces the path hit.
pub fn gather<R: Rng + ?Sized>(ctx: &RenderContext, ray: Ray, rng: &mut R) -> (Color, usize) {
    let mut operations: SmallVec<[Operation; MAX_BOUNCES]> = SmallVec::new();
    let mut ray = ray;
    let mut last_triangle = None;
    let mut bounces = 0;

    while operations.len() < MAX_BOUNCES {
        let Some(hit) = ctx.tree.traverse_excluding(&ray, last_triangle) else {
            operations.push(Operation {
                add: ctx.environment_color(ray.direction),
                mul: Color::ZERO,
            });
            break;
        };
        bounces += 1;

        let triangle = ctx.tree.triangle(hit.triangle_index);
        let material = ctx.material(triangle);
        let normal = triangle.interpolated_normal(hit.barycentric);

        let (direction, throughput) = scatter(material, ray.direction, normal, rng);

        operations.push(Operation {
            add: material.emissive,
            mul: throughput,
        });
        let origin = leave_surface(hit.intersection_point, triangle.geometric_normal(), direction);
        ray = Ray::new(origin, direction);
        last_triangle = Some(hit.triangle_index);
    }

    let mut result = Color::ZERO;
    while let Some(op) = operations.pop() {
        result = result * op.mul + op.add;
    }

    debug_assert!(result.is_finite(), "non-finite radiance {result:?}");
    (result, bounces)
}

/// Push `point` off its surface by [`EPSILON`] toward the side `direction` points to.
#[inline]
fn leave_surface(point: Vec3, geometric_normal: Vec3, direction: Vec3) -> Vec3 {
    if direction.dot(geometric_normal) < 0.0 {
        point - geometric_normal * EPSILON
    } else {
        point + geometric_normal * EPSILON
    }
}

/// Pick the continuation of a path at a surface.
///
/// Returns the new unit direction and the color the incoming radiance is
/// scaled by.
fn scatter<R: Rng + ?Sized>(
    material: &RenderMaterial,
    incoming: Vec3,
    normal: Vec3,
    rng: &mut R,
) -> (Vec3, Color) {
    if material.is_dielectric() {
        let exiting = incoming.dot(normal) > 0.0;
        let (normal, eta) = if exiting {
            (-normal, material.ior)
        } else {
            (normal, 1.0 / material.ior)
        };

        let mut rough = sample_rough_normal(normal, material.roughness, rng);
        if incoming.dot(rough) >= 0.0 {
            rough = normal;
        }
        let scale = rough.dot(normal);

        let reflected = reflect(incoming, rough);
        return match refract(incoming, rough, eta) {
            Some(refracted) => {
                // Fresnel uses the angle on the optically thinner side
                let cosine = if exiting {
                    -refracted.dot(rough)
                } else {
                    -incoming.dot(rough)
                };
                if rng.gen::<f32>() < schlick(cosine, material.ior) {
                    (reflected, material.specular * scale)
                } else {
                    (refracted.normalize(), material.diffuse * scale)
                }
            }
            // Total internal reflection
            None => (reflected, material.specular * scale),
        };
    }

    let normal = if incoming.dot(normal) > 0.0 { -normal } else { normal };
    let rough = sample_rough_normal(normal, material.roughness, rng);
    let scale = rough.dot(normal);

    if rng.gen::<f32>() < material.roughness {
        return (rough, material.diffuse * scale);
    }

    let mut reflected = reflect(incoming, rough);
    if reflected.dot(normal) <= 0.0 {
        reflected = reflect(incoming, normal);
    }
    (reflected, material.specular * scale)
}

/// Average `samples` jittered paths through pixel `pixel`.
///
/// Returns the mean radiance and the largest bounce count of any sample.
pub fn raytrace_pixel<R: Rng + ?Sized>(
    ctx: &RenderContext,
    pixel: UVec2,
    samples: usize,
    rng: &mut R,
) -> (Color, usize) {
    debug_assert!(samples > 0);

    let corner = pixel.as_vec2();
    let mut color = Color::ZERO;
    let mut max_bounces = 0;

    for _ in 0..samples {
        let jitter = Vec2::new(rng.gen::<f32>(), rng.gen::<f32>());
        let (sample, bounces) = gather(ctx, ctx.pixel_ray(corner + jitter), rng);
        color += sample;
        max_bounces = max_bounces.max(bounces);
    }

    (color / samples.max(1) as f32, max_bounces)
}
