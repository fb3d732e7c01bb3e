//! Environment lighting: the radiance seen by rays that leave the scene.

use lumen_math::Vec3;

use crate::Color;

/// Radiance arriving from infinitely far away.
///
/// Shared by every render worker, so implementations must be thread-safe.
pub trait EnvironmentSampler: Send + Sync {
    /// Linear radiance seen along the unit vector `direction`.
    fn sample_in_direction(&self, direction: Vec3) -> Color;
}

/// The same radiance in every direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantEnvironment(pub Color);

impl EnvironmentSampler for ConstantEnvironment {
    fn sample_in_direction(&self, _direction: Vec3) -> Color {
        self.0
    }
}

/// Vertical blend from `bottom` (looking down) to `top` (looking up).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkyGradient {
    pub bottom: Color,
    pub top: Color,
}

impl Default for SkyGradient {
    fn default() -> Self {
        Self {
            bottom: Color::ONE,
            top: Color::new(0.5, 0.7, 1.0),
        }
    }
}

impl SkyGradient {
    pub fn new(bottom: Color, top: Color) -> Self {
        Self { bottom, top }
    }
}

impl EnvironmentSampler for SkyGradient {
    fn sample_in_direction(&self, direction: Vec3) -> Color {
        let a = 0.5 * (direction.normalize_or_zero().y + 1.0);
        self.bottom.lerp(self.top, a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_environment() {
        let env = ConstantEnvironment(Color::splat(0.25));
        assert_eq!(env.sample_in_direction(Vec3::X), Color::splat(0.25));
        assert_eq!(env.sample_in_direction(Vec3::NEG_Y), Color::splat(0.25));
    }

    #[test]
    fn test_sky_gradient() {
        let sky = SkyGradient::default();

        let up = sky.sample_in_direction(Vec3::Y);
        let down = sky.sample_in_direction(Vec3::NEG_Y);
        assert!((up - sky.top).length() < 1e-6);
        assert!((down - sky.bottom).length() < 1e-6);

        // Up should have less red (more blue-ish) than down (white)
        assert!(up.x < down.x);
    }
}
