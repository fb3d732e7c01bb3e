//! Debug drawing on top of the render: region markers and the KD-tree.

use lumen_math::{UVec2, Vec2, Vec4};

use crate::context::RenderContext;
use crate::output::PixelSink;
use crate::region::Region;

/// Color of the border painted around a region before it renders.
pub const REGION_BORDER_COLOR: Vec4 = Vec4::new(1.0, 0.5, 0.0, 1.0);

/// Grey level proportional to `cost / max_cost`.
pub fn cost_color(cost: usize, max_cost: usize) -> Vec4 {
    let t = if max_cost == 0 {
        0.0
    } else {
        cost as f32 / max_cost as f32
    };
    Vec4::new(t, t, t, 1.0)
}

/// Paint every pixel of `region`.
pub fn fill_region(sink: &dyn PixelSink, region: &Region, color: Vec4) {
    for pixel in region.pixels() {
        sink.set_pixel(pixel, color);
    }
}

/// Paint the one pixel wide outline of `region`.
pub fn draw_region_border(sink: &dyn PixelSink, region: &Region, color: Vec4) {
    let min = region.origin;
    let max = region.origin + region.size.max(UVec2::ONE) - UVec2::ONE;

    for x in min.x..=max.x {
        sink.set_pixel(UVec2::new(x, min.y), color);
        if max.y != min.y {
            sink.set_pixel(UVec2::new(x, max.y), color);
        }
    }
    for y in (min.y + 1)..max.y {
        sink.set_pixel(UVec2::new(min.x, y), color);
        if max.x != min.x {
            sink.set_pixel(UVec2::new(max.x, y), color);
        }
    }
}

/// Color for a KD-tree leaf at `depth`, green near the root to red at the limit.
pub fn depth_color(depth: usize, max_depth: usize) -> Vec4 {
    let t = depth as f32 / max_depth.max(1) as f32;
    Vec4::new(t, 1.0 - t, 0.2, 1.0)
}

/// Draw the edges of every KD-tree leaf box.
///
/// Edges with an endpoint behind the camera are skipped.
pub fn draw_kd_tree(ctx: &RenderContext, sink: &dyn PixelSink) {
    let size = ctx.viewport.as_vec2();
    let max_depth = ctx.tree.max_build_depth();
    let mut edges = 0;

    for leaf in ctx.tree.leaves() {
        let corners = leaf.bounds.corners().map(|corner| {
            ctx.camera
                .project(corner)
                .map(|ndc| Vec2::new((ndc.x + 1.0) * 0.5 * size.x, (1.0 - ndc.y) * 0.5 * size.y))
        });
        let color = depth_color(leaf.depth, max_depth);

        // Corner pairs differing in exactly one axis bit
        for a in 0..8 {
            for bit in [1, 2, 4] {
                if a & bit != 0 {
                    continue;
                }
                if let (Some(p0), Some(p1)) = (corners[a], corners[a | bit]) {
                    draw_line(sink, p0, p1, ctx.viewport, color);
                    edges += 1;
                }
            }
        }
    }

    log::debug!("KD-tree overlay drew {} edges", edges);
}

/// Rasterize a segment with Bresenham's algorithm after clipping it to the viewport.
pub fn draw_line(sink: &dyn PixelSink, p0: Vec2, p1: Vec2, viewport: UVec2, color: Vec4) {
    let Some((p0, p1)) = clip_segment(p0, p1, viewport.as_vec2()) else {
        return;
    };

    let max = viewport.as_ivec2() - 1;
    let (x0, y0) = (p0.x as i32, p0.y as i32);
    let (x1, y1) = (p1.x as i32, p1.y as i32);

    let dx = (x1 - x0).abs();
    let dy = (y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx - dy;
    let (mut x, mut y) = (x0, y0);

    loop {
        if (0..=max.x).contains(&x) && (0..=max.y).contains(&y) {
            sink.set_pixel(UVec2::new(x as u32, y as u32), color);
        }
        if x == x1 && y == y1 {
            break;
        }
        let e2 = err * 2;
        if e2 > -dy {
            err -= dy;
            x += sx;
        }
        if e2 < dx {
            err += dx;
            y += sy;
        }
    }
}

/// Liang-Barsky clipping of a segment against `[0, size)`.
fn clip_segment(p0: Vec2, p1: Vec2, size: Vec2) -> Option<(Vec2, Vec2)> {
    if !p0.is_finite() || !p1.is_finite() {
        return None;
    }

    let d = p1 - p0;
    let upper = size - Vec2::splat(1e-3);
    let mut t0 = 0.0_f32;
    let mut t1 = 1.0_f32;

    for (p, q) in [
        (-d.x, p0.x),
        (d.x, upper.x - p0.x),
        (-d.y, p0.y),
        (d.y, upper.y - p0.y),
    ] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            t0 = t0.max(r);
        } else {
            t1 = t1.min(r);
        }
        if t0 > t1 {
            return None;
        }
    }

    Some((p0 + d * t0, p0 + d * t1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::ConstantEnvironment;
    use crate::geometry::{RenderMaterial, Triangle, TriangleList};
    use crate::options::RaytraceOptions;
    use crate::output::RenderOutcome;
    use lumen_math::{Camera, Vec3};
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct PixelSet(Mutex<Vec<UVec2>>);

    impl PixelSink for PixelSet {
        fn set_pixel(&self, position: UVec2, _color: Vec4) {
            self.0.lock().unwrap().push(position);
        }

        fn render_finished(&self, _outcome: RenderOutcome) {}
    }

    #[test]
    fn test_cost_color() {
        assert_eq!(cost_color(0, 0), Vec4::new(0.0, 0.0, 0.0, 1.0));
        assert_eq!(cost_color(5, 10), Vec4::new(0.5, 0.5, 0.5, 1.0));
        assert_eq!(cost_color(10, 10), Vec4::ONE);
    }

    #[test]
    fn test_region_border() {
        let sink = PixelSet::default();
        let region = Region::new(UVec2::new(2, 3), UVec2::new(4, 3));
        draw_region_border(&sink, &region, REGION_BORDER_COLOR);

        let pixels = sink.0.lock().unwrap();
        let unique: HashSet<_> = pixels.iter().copied().collect();
        // Perimeter of a 4x3 box without double counting corners
        assert_eq!(pixels.len(), 10);
        assert_eq!(unique.len(), 10);
        assert!(pixels.iter().all(|p| region.contains(*p)));
        assert!(!unique.contains(&UVec2::new(3, 4)));
    }

    #[test]
    fn test_region_border_single_pixel() {
        let sink = PixelSet::default();
        draw_region_border(&sink, &Region::new(UVec2::new(1, 1), UVec2::ONE), Vec4::ONE);
        assert_eq!(*sink.0.lock().unwrap(), vec![UVec2::ONE]);
    }

    #[test]
    fn test_draw_line_clips_to_viewport() {
        let sink = PixelSet::default();
        draw_line(
            &sink,
            Vec2::new(-50.0, 5.5),
            Vec2::new(500.0, 5.5),
            UVec2::new(10, 10),
            Vec4::ONE,
        );

        let pixels = sink.0.lock().unwrap();
        assert_eq!(pixels.len(), 10);
        assert!(pixels.iter().all(|p| p.y == 5 && p.x < 10));
    }

    #[test]
    fn test_draw_line_outside_viewport() {
        let sink = PixelSet::default();
        draw_line(&sink, Vec2::new(-5.0, -5.0), Vec2::new(-1.0, 20.0), UVec2::new(10, 10), Vec4::ONE);
        assert!(sink.0.lock().unwrap().is_empty());
    }

    #[test]
    fn test_draw_kd_tree_stays_in_viewport() {
        let triangles = (0..64)
            .map(|i| {
                let corner = Vec3::new((i % 8) as f32 * 0.25 - 1.0, (i / 8) as f32 * 0.25 - 1.0, 0.0);
                Triangle::flat([corner, corner + Vec3::X * 0.2, corner + Vec3::Y * 0.2], 0)
            })
            .collect();
        let ctx = RenderContext::from_triangles(
            TriangleList {
                triangles,
                materials: vec![RenderMaterial::default()],
            },
            &Camera::new(Vec3::new(0.0, 0.0, 3.0), Vec3::ZERO, 1.0),
            UVec2::new(32, 32),
            &RaytraceOptions::default(),
            Some(Arc::new(ConstantEnvironment(Vec3::ONE))),
        )
        .unwrap();

        let sink = PixelSet::default();
        draw_kd_tree(&ctx, &sink);

        let pixels = sink.0.lock().unwrap();
        assert!(!pixels.is_empty());
        assert!(pixels.iter().all(|p| p.x < 32 && p.y < 32));
    }
}
