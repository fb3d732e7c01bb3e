/// A closed parametric range `[min, max]`.
///
/// Used for ray parameter ranges (`t_near`/`t_far` during traversal) and
/// per-axis box extents.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    pub min: f32,
    pub max: f32,
}

impl Interval {
    pub fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// Same interval with `amount` removed from both ends.
    pub fn shrink(&self, amount: f32) -> Interval {
        Interval::new(self.min + amount, self.max - amount)
    }

    /// Returns true if x is strictly within the interval (min, max) (exclusive).
    pub fn surrounds(&self, x: f32) -> bool {
        self.min < x && x < self.max
    }
}
