//! Scattering helpers used by the integrator.

use std::f32::consts::TAU;

use lumen_math::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Random stream `stream` of a job.
///
/// With a seed, every stream is reproducible and distinct; without one the
/// generator is seeded from the OS.
pub fn stream_rng(seed: Option<u64>, stream: u64) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed ^ stream.wrapping_mul(0x9E37_79B9_7F4A_7C15)),
        None => StdRng::from_entropy(),
    }
}

/// Reflect a vector about a normal.
#[inline]
pub fn reflect(v: Vec3, n: Vec3) -> Vec3 {
    v - 2.0 * v.dot(n) * n
}

/// Refract a unit vector through a surface whose normal `n` faces the
/// incoming side. `eta` is the ratio of the incident over the transmitted
/// index of refraction.
///
/// Returns `None` on total internal reflection.
#[inline]
pub fn refract(v: Vec3, n: Vec3, eta: f32) -> Option<Vec3> {
    let cos_i = -v.dot(n);
    let k = 1.0 - eta * eta * (1.0 - cos_i * cos_i);
    if k < 0.0 {
        return None;
    }
    Some(eta * v + (eta * cos_i - k.sqrt()) * n)
}

/// Schlick's approximation for reflectance
#[inline]
pub fn schlick(cosine: f32, ior: f32) -> f32 {
    let r0 = ((1.0 - ior) / (1.0 + ior)).powi(2);
    r0 + (1.0 - r0) * (1.0 - cosine.clamp(0.0, 1.0)).powi(5)
}

/// Two unit vectors completing `n` to a right-handed orthonormal basis.
#[inline]
pub fn orthonormal_basis(n: Vec3) -> (Vec3, Vec3) {
    // Duff et al., "Building an Orthonormal Basis, Revisited"
    let sign = 1.0_f32.copysign(n.z);
    let a = -1.0 / (sign + n.z);
    let b = n.x * n.y * a;
    (
        Vec3::new(1.0 + sign * n.x * n.x * a, sign * b, -sign * n.x),
        Vec3::new(b, sign + n.y * n.y * a, -n.y),
    )
}

/// Sample a unit vector uniformly on the spherical cap around `normal`
/// whose opening is set by `roughness`.
///
/// The cap spans `cos(theta)` in `[1 - roughness, 1]`: roughness 0 returns
/// `normal`, roughness 1 covers the whole hemisphere.
pub fn sample_rough_normal<R: Rng + ?Sized>(normal: Vec3, roughness: f32, rng: &mut R) -> Vec3 {
    if roughness <= 0.0 {
        return normal;
    }

    let cos_theta = 1.0 - roughness.min(1.0) * rng.gen::<f32>();
    let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
    let phi = TAU * rng.gen::<f32>();

    let (tangent, bitangent) = orthonormal_basis(normal);
    (tangent * (sin_theta * phi.cos()) + bitangent * (sin_theta * phi.sin()) + normal * cos_theta)
        .normalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_rng_reproducible() {
        let a: Vec<u32> = stream_rng(Some(7), 3).sample_iter(rand::distributions::Standard).take(4).collect();
        let b: Vec<u32> = stream_rng(Some(7), 3).sample_iter(rand::distributions::Standard).take(4).collect();
        let c: Vec<u32> = stream_rng(Some(7), 4).sample_iter(rand::distributions::Standard).take(4).collect();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_reflect() {
        let v = Vec3::new(1.0, -1.0, 0.0);
        assert_eq!(reflect(v, Vec3::Y), Vec3::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn test_refract_straight_through() {
        let refracted = refract(Vec3::NEG_Y, Vec3::Y, 1.0 / 1.5).unwrap();
        assert!((refracted - Vec3::NEG_Y).length() < 1e-6);
    }

    #[test]
    fn test_refract_bends_toward_normal() {
        let v = Vec3::new(1.0, -1.0, 0.0).normalize();
        let refracted = refract(v, Vec3::Y, 1.0 / 1.5).unwrap();

        assert!((refracted.length() - 1.0).abs() < 1e-5);
        // Snell: sin_t = sin_i / 1.5
        let sin_t = refracted.x;
        assert!((sin_t - (0.5_f32.sqrt() / 1.5)).abs() < 1e-5);
        assert!(refracted.y < 0.0);
    }

    #[test]
    fn test_total_internal_reflection() {
        let grazing = Vec3::new(1.0, -0.2, 0.0).normalize();
        assert!(refract(grazing, Vec3::Y, 1.5).is_none());
    }

    #[test]
    fn test_schlick() {
        // Normal incidence on glass reflects 4%
        assert!((schlick(1.0, 1.5) - 0.04).abs() < 1e-6);
        // Grazing incidence reflects everything
        assert!((schlick(0.0, 1.5) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_orthonormal_basis() {
        for n in [Vec3::Z, Vec3::NEG_Z, Vec3::X, Vec3::new(1.0, 2.0, -3.0).normalize()] {
            let (t, b) = orthonormal_basis(n);
            assert!(t.dot(n).abs() < 1e-5);
            assert!(b.dot(n).abs() < 1e-5);
            assert!(t.dot(b).abs() < 1e-5);
            assert!((t.length() - 1.0).abs() < 1e-5);
            assert!((b.length() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_rough_normal_stays_in_cap() {
        let mut rng = StdRng::seed_from_u64(1);
        let normal = Vec3::new(0.0, 1.0, 1.0).normalize();

        assert_eq!(sample_rough_normal(normal, 0.0, &mut rng), normal);

        for _ in 0..1000 {
            let rough = sample_rough_normal(normal, 0.25, &mut rng);
            assert!((rough.length() - 1.0).abs() < 1e-4);
            assert!(rough.dot(normal) >= 0.75 - 1e-4);
        }
    }

    #[test]
    fn test_full_roughness_covers_hemisphere() {
        let mut rng = StdRng::seed_from_u64(2);
        let samples = 20_000;
        let mean_cos: f32 = (0..samples)
            .map(|_| sample_rough_normal(Vec3::Z, 1.0, &mut rng).z)
            .sum::<f32>()
            / samples as f32;

        // Uniform hemisphere: E[cos] = 1/2
        assert!((mean_cos - 0.5).abs() < 0.02);
    }
}
