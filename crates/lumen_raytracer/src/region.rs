//! Region-based tile scheduling.
//!
//! The viewport is divided into regions that workers claim one at a time.
//! Before rendering, each region is probed with a few single-sample paths
//! and the regions are sorted so the most expensive ones start first.

use std::sync::atomic::{AtomicBool, Ordering};

use lumen_math::{UVec2, Vec2};
use rand::seq::SliceRandom;
use rayon::prelude::*;

use crate::context::RenderContext;
use crate::integrator::raytrace_pixel;
use crate::output::PixelSink;
use crate::overlay;
use crate::sampling::stream_rng;

/// Probe positions as fractions of a region's size.
pub const PROBE_OFFSETS: [Vec2; 5] = [
    Vec2::new(0.5, 0.5),
    Vec2::new(0.25, 0.25),
    Vec2::new(0.75, 0.25),
    Vec2::new(0.25, 0.75),
    Vec2::new(0.75, 0.75),
];

/// A rectangular region of the image to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    /// Top-left pixel
    pub origin: UVec2,
    /// Width and height in pixels
    pub size: UVec2,
    /// Claimed by a worker
    pub sampled: bool,
    /// Sum of the probe paths' bounce counts
    pub estimated_bounces: usize,
}

impl Region {
    pub fn new(origin: UVec2, size: UVec2) -> Self {
        Self {
            origin,
            size,
            sampled: false,
            estimated_bounces: 0,
        }
    }

    /// Get the total number of pixels in this region.
    pub fn pixel_count(&self) -> u32 {
        self.size.x * self.size.y
    }

    pub fn contains(&self, pixel: UVec2) -> bool {
        pixel.cmpge(self.origin).all() && pixel.cmplt(self.origin + self.size).all()
    }

    /// Random stream id derived from the region's position.
    pub fn stream(&self) -> u64 {
        ((self.origin.y as u64) << 32) | self.origin.x as u64
    }

    /// Pixels in raster order (rows top to bottom, left to right).
    pub fn pixels(&self) -> impl Iterator<Item = UVec2> {
        let Region { origin, size, .. } = *self;
        (0..size.y).flat_map(move |y| (0..size.x).map(move |x| origin + UVec2::new(x, y)))
    }
}

/// Tile the viewport into regions of `region_size` pixels.
///
/// The last column and row are clipped to the remaining pixels. Regions
/// come out in raster order.
pub fn partition_regions(viewport: UVec2, region_size: u32) -> Vec<Region> {
    let step = region_size.max(1);
    let mut regions = Vec::new();

    let mut y = 0;
    while y < viewport.y {
        let mut x = 0;
        while x < viewport.x {
            let size = UVec2::new(step.min(viewport.x - x), step.min(viewport.y - y));
            regions.push(Region::new(UVec2::new(x, y), size));
            x += step;
        }
        y += step;
    }

    regions
}

/// Estimate how expensive a region is to render.
///
/// Traces one sample at each probe offset and sums the bounce counts.
pub fn estimate_region_cost<R: rand::Rng + ?Sized>(
    ctx: &RenderContext,
    region: &Region,
    rng: &mut R,
) -> usize {
    let max = (region.size.max(UVec2::ONE) - UVec2::ONE).as_vec2();
    PROBE_OFFSETS
        .iter()
        .map(|offset| {
            let local = (*offset * region.size.as_vec2()).min(max).as_uvec2();
            raytrace_pixel(ctx, region.origin + local, 1, rng).1
        })
        .sum()
}

/// Shuffle, probe and sort `regions` so the most expensive come first.
///
/// Every region gets a cost preview fill on `sink`. Stops early, leaving
/// the remaining estimates at zero, once `running` is cleared.
pub fn order_regions(
    ctx: &RenderContext,
    regions: &mut [Region],
    running: &AtomicBool,
    sink: &dyn PixelSink,
    seed: Option<u64>,
) {
    // Break up raster order before the stable sort so equal costs land randomly
    regions.shuffle(&mut stream_rng(seed, u64::MAX));

    regions
        .par_iter_mut()
        .for_each(|region| {
            if !running.load(Ordering::Relaxed) {
                return;
            }
            let mut rng = stream_rng(seed, !region.stream());
            region.estimated_bounces = estimate_region_cost(ctx, region, &mut rng);
        });

    let max_cost = regions
        .iter()
        .map(|r| r.estimated_bounces)
        .max()
        .unwrap_or(0);
    for region in regions.iter() {
        if !running.load(Ordering::Relaxed) {
            break;
        }
        overlay::fill_region(
            sink,
            region,
            overlay::cost_color(region.estimated_bounces, max_cost),
        );
    }

    regions.sort_by(|a, b| b.estimated_bounces.cmp(&a.estimated_bounces));
}

/// Claim the next region nobody has rendered yet.
///
/// `regions` is scanned front to back, so ordering decides priority.
pub fn claim_next(regions: &mut [Region]) -> Option<Region> {
    let region = regions.iter_mut().find(|r| !r.sampled)?;
    region.sampled = true;
    Some(*region)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::ConstantEnvironment;
    use crate::geometry::{RenderMaterial, Triangle, TriangleList};
    use crate::options::RaytraceOptions;
    use crate::output::{RenderEvent, RenderOutcome};
    use crate::Color;
    use lumen_math::{Camera, Vec3, Vec4};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct CollectingSink {
        events: Mutex<Vec<RenderEvent>>,
    }

    impl PixelSink for CollectingSink {
        fn set_pixel(&self, position: UVec2, color: Vec4) {
            self.events
                .lock()
                .unwrap()
                .push(RenderEvent::Pixel { position, color });
        }

        fn render_finished(&self, outcome: RenderOutcome) {
            self.events.lock().unwrap().push(RenderEvent::Finished(outcome));
        }
    }

    fn assert_exact_tiling(regions: &[Region], viewport: UVec2) {
        let mut covered = vec![0u32; (viewport.x * viewport.y) as usize];
        for region in regions {
            for pixel in region.pixels() {
                assert!(pixel.x < viewport.x && pixel.y < viewport.y);
                covered[(pixel.y * viewport.x + pixel.x) as usize] += 1;
            }
        }
        assert!(covered.iter().all(|&c| c == 1), "gap or overlap in tiling");
    }

    /// Left half of the view hits a floor quad, right half sees only sky.
    fn half_covered_context() -> RenderContext {
        let mut triangles = Vec::new();
        for x in 0..4 {
            for y in 0..4 {
                let corner = Vec3::new(-2.0 + x as f32 * 0.5, -1.0 + y as f32 * 0.5, 0.0);
                triangles.push(Triangle::flat([corner, corner + Vec3::X * 0.5, corner + Vec3::Y * 0.5], 0));
                triangles.push(Triangle::flat(
                    [corner + Vec3::X * 0.5, corner + Vec3::new(0.5, 0.5, 0.0), corner + Vec3::Y * 0.5],
                    0,
                ));
            }
        }
        RenderContext::from_triangles(
            TriangleList {
                triangles,
                materials: vec![RenderMaterial::default()],
            },
            &Camera::new(Vec3::new(0.0, 0.0, 2.0), Vec3::ZERO, 1.0),
            UVec2::new(16, 16),
            &RaytraceOptions::default(),
            Some(Arc::new(ConstantEnvironment(Color::ONE))),
        )
        .unwrap()
    }

    #[test]
    fn test_partition_exact_fit() {
        let regions = partition_regions(UVec2::new(128, 128), 64);
        assert_eq!(regions.len(), 4); // 2x2 grid
        assert_exact_tiling(&regions, UVec2::new(128, 128));
    }

    #[test]
    fn test_partition_clips_last_row_and_column() {
        let viewport = UVec2::new(100, 70);
        let regions = partition_regions(viewport, 32);

        assert_eq!(regions.len(), 4 * 3);
        assert_exact_tiling(&regions, viewport);

        let last = regions.last().unwrap();
        assert_eq!(last.origin, UVec2::new(96, 64));
        assert_eq!(last.size, UVec2::new(4, 6));
        assert!(regions.iter().all(|r| !r.sampled && r.estimated_bounces == 0));
    }

    #[test]
    fn test_partition_region_larger_than_viewport() {
        let regions = partition_regions(UVec2::new(10, 5), 64);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].size, UVec2::new(10, 5));
    }

    #[test]
    fn test_region_pixels_raster_order() {
        let region = Region::new(UVec2::new(4, 2), UVec2::new(2, 2));
        let pixels: Vec<_> = region.pixels().collect();

        assert_eq!(
            pixels,
            vec![UVec2::new(4, 2), UVec2::new(5, 2), UVec2::new(4, 3), UVec2::new(5, 3)]
        );
        assert!(region.contains(UVec2::new(5, 3)));
        assert!(!region.contains(UVec2::new(6, 3)));
    }

    #[test]
    fn test_claim_next_takes_each_region_once() {
        let mut regions = partition_regions(UVec2::new(8, 8), 4);
        let mut claimed = Vec::new();
        while let Some(region) = claim_next(&mut regions) {
            claimed.push(region.origin);
        }

        assert_eq!(claimed.len(), 4);
        assert!(regions.iter().all(|r| r.sampled));
        assert!(claim_next(&mut regions).is_none());
    }

    #[test]
    fn test_order_sorts_descending_by_cost() {
        let ctx = half_covered_context();
        let mut regions = partition_regions(ctx.viewport, 4);
        let sink = CollectingSink::default();
        let running = AtomicBool::new(true);

        order_regions(&ctx, &mut regions, &running, &sink, Some(11));

        assert_exact_tiling(&regions, ctx.viewport);
        assert!(regions
            .windows(2)
            .all(|w| w[0].estimated_bounces >= w[1].estimated_bounces));

        // Regions looking at the floor cost more than regions looking at the sky
        let first = regions.first().unwrap();
        let last = regions.last().unwrap();
        assert!(first.estimated_bounces > last.estimated_bounces);
        assert_eq!(last.estimated_bounces, 0);

        // One preview pixel per viewport pixel
        assert_eq!(sink.events.lock().unwrap().len(), 16 * 16);
    }

    #[test]
    fn test_order_stops_when_not_running() {
        let ctx = half_covered_context();
        let mut regions = partition_regions(ctx.viewport, 4);
        let sink = CollectingSink::default();
        let running = AtomicBool::new(false);

        order_regions(&ctx, &mut regions, &running, &sink, Some(1));

        assert!(regions.iter().all(|r| r.estimated_bounces == 0));
        assert!(sink.events.lock().unwrap().is_empty());
    }
}
