use crate::{Interval, Ray, Vec3};

/// Axis-aligned bounding box stored as center + half-extent.
///
/// This is the box type owned by KD-tree nodes. Splitting a box along an
/// axis yields two boxes that exactly partition the parent.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct BoundingBox {
    pub center: Vec3,
    pub half_size: Vec3,
}

impl BoundingBox {
    /// Create a box from its minimum and maximum corners.
    pub fn from_min_max(min: Vec3, max: Vec3) -> Self {
        Self {
            center: 0.5 * (min + max),
            half_size: 0.5 * (max - min),
        }
    }

    /// Create the smallest box containing all `points`.
    ///
    /// Returns `None` for an empty iterator.
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = Vec3>,
    {
        let mut points = points.into_iter();
        let first = points.next()?;
        let (min, max) = points.fold((first, first), |(min, max), p| (min.min(p), max.max(p)));
        Some(Self::from_min_max(min, max))
    }

    /// Corner with the smallest coordinates.
    #[inline]
    pub fn min_vertex(&self) -> Vec3 {
        self.center - self.half_size
    }

    /// Corner with the largest coordinates.
    #[inline]
    pub fn max_vertex(&self) -> Vec3 {
        self.center + self.half_size
    }

    /// Surface area proxy used by the SAH cost model.
    ///
    /// Proportional to the real surface area (which is `8 * square()`), so
    /// ratios between boxes are exact.
    #[inline]
    pub fn square(&self) -> f32 {
        let h = self.half_size;
        h.x * h.y + h.y * h.z + h.z * h.x
    }

    /// Extent of the box along `axis` (0=X, 1=Y, 2=Z).
    pub fn axis_interval(&self, axis: usize) -> Interval {
        Interval::new(self.min_vertex()[axis], self.max_vertex()[axis])
    }

    /// Split the box by the plane `axis = position`.
    ///
    /// Returns `(below, above)`. The plane is expected to lie inside the box.
    pub fn split(&self, axis: usize, position: f32) -> (BoundingBox, BoundingBox) {
        let min = self.min_vertex();
        let max = self.max_vertex();

        let mut left_max = max;
        let mut right_min = min;
        left_max[axis] = position;
        right_min[axis] = position;

        (
            BoundingBox::from_min_max(min, left_max),
            BoundingBox::from_min_max(right_min, max),
        )
    }

    /// All eight corners, indexed by bit pattern (bit 0 = X max, bit 1 = Y max, bit 2 = Z max).
    pub fn corners(&self) -> [Vec3; 8] {
        let min = self.min_vertex();
        let max = self.max_vertex();
        std::array::from_fn(|i| {
            Vec3::new(
                if i & 1 == 0 { min.x } else { max.x },
                if i & 2 == 0 { min.y } else { max.y },
                if i & 4 == 0 { min.z } else { max.z },
            )
        })
    }

    /// Intersect a ray with this box using the slab method.
    ///
    /// Returns the parametric range `[t_near, t_far]` where the ray is
    /// inside the box, with `t_near` clamped to zero for origins inside it.
    pub fn intersect(&self, ray: &Ray) -> Option<Interval> {
        let min = self.min_vertex();
        let max = self.max_vertex();
        let mut ray_t = Interval::new(0.0, f32::INFINITY);

        for axis in 0..3 {
            let adinv = 1.0 / ray.direction[axis];
            let origin = ray.origin[axis];
            let mut t0 = (min[axis] - origin) * adinv;
            let mut t1 = (max[axis] - origin) * adinv;
            if adinv < 0.0 {
                std::mem::swap(&mut t0, &mut t1);
            }
            // NaN (origin on a slab plane with a parallel ray) keeps the current range
            if t0 > ray_t.min {
                ray_t.min = t0;
            }
            if t1 < ray_t.max {
                ray_t.max = t1;
            }
            if ray_t.max < ray_t.min {
                return None;
            }
        }

        Some(ray_t)
    }
}
