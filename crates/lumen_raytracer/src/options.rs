//! Render job configuration.

use serde::{Deserialize, Serialize};

use crate::error::{RayTraceError, Result};
use crate::kdtree::{DEFAULT_MAX_DEPTH, TRAVERSE_STACK_SIZE};

/// Options recognized by [`Raytracer::set_options`](crate::Raytracer::set_options).
///
/// Missing fields take their defaults when deserialized, so a JSON file
/// only needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RaytraceOptions {
    /// Samples averaged per pixel
    pub rays_per_pixel: usize,
    /// Depth beyond which KD-tree nodes are not split
    pub max_kd_tree_depth: usize,
    /// Candidate split planes per axis sweep, `<= 0` for all of them
    pub kd_tree_splits: i32,
    /// Edge length of a render region in pixels
    pub render_region_size: u32,
    /// Draw the KD-tree leaves over the finished image
    pub render_kd_tree: bool,
    /// Worker threads, 0 for one per available core
    pub thread_count: usize,
    /// Seed for reproducible sampling, `None` for entropy
    pub seed: Option<u64>,
}

impl Default for RaytraceOptions {
    fn default() -> Self {
        Self {
            rays_per_pixel: 32,
            max_kd_tree_depth: DEFAULT_MAX_DEPTH,
            kd_tree_splits: 0,
            render_region_size: 32,
            render_kd_tree: false,
            thread_count: 0,
            seed: None,
        }
    }
}

impl RaytraceOptions {
    /// Check every option is usable.
    pub fn validate(&self) -> Result<()> {
        if self.rays_per_pixel == 0 {
            return Err(RayTraceError::InvalidOptions(
                "rays_per_pixel must be at least 1".into(),
            ));
        }
        if self.render_region_size == 0 {
            return Err(RayTraceError::InvalidOptions(
                "render_region_size must be at least 1".into(),
            ));
        }
        if self.max_kd_tree_depth >= TRAVERSE_STACK_SIZE {
            return Err(RayTraceError::InvalidOptions(format!(
                "max_kd_tree_depth must be below {}",
                TRAVERSE_STACK_SIZE
            )));
        }
        Ok(())
    }

    /// Number of render workers to spawn.
    pub fn worker_count(&self) -> usize {
        if self.thread_count > 0 {
            self.thread_count
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let options = RaytraceOptions::default();
        assert!(options.validate().is_ok());
        assert_eq!(options.rays_per_pixel, 32);
        assert_eq!(options.max_kd_tree_depth, 31);
        assert!(options.worker_count() >= 1);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let zero_rays = RaytraceOptions {
            rays_per_pixel: 0,
            ..Default::default()
        };
        assert!(matches!(zero_rays.validate(), Err(RayTraceError::InvalidOptions(_))));

        let zero_region = RaytraceOptions {
            render_region_size: 0,
            ..Default::default()
        };
        assert!(zero_region.validate().is_err());

        let too_deep = RaytraceOptions {
            max_kd_tree_depth: 64,
            ..Default::default()
        };
        assert!(too_deep.validate().is_err());
    }

    #[test]
    fn test_partial_json() {
        let options: RaytraceOptions =
            serde_json::from_str(r#"{ "rays_per_pixel": 8, "render_kd_tree": true }"#).unwrap();

        assert_eq!(options.rays_per_pixel, 8);
        assert!(options.render_kd_tree);
        assert_eq!(options.render_region_size, 32);
        assert_eq!(options.seed, None);
    }

    #[test]
    fn test_explicit_thread_count() {
        let options = RaytraceOptions {
            thread_count: 3,
            ..Default::default()
        };
        assert_eq!(options.worker_count(), 3);
    }
}
