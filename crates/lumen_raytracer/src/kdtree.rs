//! KD-tree acceleration structure over world-space triangles.
//!
//! Nodes live in one arena (`Vec<Node>`) and reference their children by
//! index; the root is node 0. Interior nodes split their box with an
//! axis-aligned plane chosen by the surface area heuristic, leaves hold
//! triangle indices. A triangle straddling a split plane is referenced by
//! both children.
//!
//! Traversal is iterative and front-to-back, so the first leaf that yields
//! a hit inside its slab yields the nearest hit.

use std::time::Instant;

use lumen_math::{BoundingBox, Ray, Vec3};
use smallvec::SmallVec;

use crate::error::{RayTraceError, Result};
use crate::geometry::{IntersectionSupportData, Triangle, EPSILON};

/// Nodes holding fewer triangles than this are never split.
pub const MIN_TRIANGLES_PER_NODE: usize = 16;

/// Default depth limit for the builder.
pub const DEFAULT_MAX_DEPTH: usize = 31;

/// Capacity of the traversal stack. Bounds the usable `max_depth`.
pub const TRAVERSE_STACK_SIZE: usize = 64;

/// Split plane of an interior node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Split {
    /// 0=X, 1=Y, 2=Z
    pub axis: usize,
    /// World-space position of the plane along `axis`
    pub distance: f32,
    /// `[below, above]` child node indices
    pub children: [usize; 2],
}

/// A node of the tree: interior when `split` is set, leaf otherwise.
#[derive(Debug, Clone)]
pub struct Node {
    pub bounds: BoundingBox,
    pub split: Option<Split>,
    /// Triangle indices, empty for interior nodes
    pub triangles: Vec<u32>,
    pub depth: usize,
}

impl Node {
    fn leaf(bounds: BoundingBox, triangles: Vec<u32>, depth: usize) -> Self {
        Self {
            bounds,
            split: None,
            triangles,
            depth,
        }
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.split.is_none()
    }
}

/// Nearest hit returned by [`KdTree::traverse`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraverseResult {
    pub triangle_index: usize,
    pub intersection_point: Vec3,
    /// Weights of vertices 0, 1, 2
    pub barycentric: Vec3,
    /// Ray parameter of the hit
    pub distance: f32,
}

/// Build diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KdTreeStats {
    pub triangle_count: usize,
    pub node_count: usize,
    pub leaf_count: usize,
    /// Sum of leaf triangle list lengths (>= triangle_count when triangles straddle splits)
    pub leaf_references: usize,
    pub max_build_depth: usize,
}

/// KD-tree owning the triangle list it was built over.
pub struct KdTree {
    nodes: Vec<Node>,
    triangles: Vec<Triangle>,
    support: Vec<IntersectionSupportData>,
    max_depth: usize,
    splits: i32,
    max_build_depth: usize,
}

impl KdTree {
    /// Build a tree over `triangles`.
    ///
    /// Nodes deeper than `max_depth` stay leaves. `splits` limits the number
    /// of candidate planes evaluated per axis sweep; `<= 0` evaluates every
    /// triangle boundary.
    pub fn build(triangles: Vec<Triangle>, max_depth: usize, splits: i32) -> Result<Self> {
        if triangles.is_empty() {
            return Err(RayTraceError::EmptyScene);
        }
        if max_depth >= TRAVERSE_STACK_SIZE {
            return Err(RayTraceError::InvalidOptions(format!(
                "max KD-tree depth {} exceeds the traversal limit of {}",
                max_depth,
                TRAVERSE_STACK_SIZE - 1
            )));
        }

        let start = Instant::now();

        let bounds = BoundingBox::from_points(
            triangles
                .iter()
                .flat_map(|t| [t.min_vertex(), t.max_vertex()]),
        )
        .ok_or(RayTraceError::EmptyScene)?;

        let support = triangles.iter().map(IntersectionSupportData::from).collect();
        let root = Node::leaf(bounds, (0..triangles.len() as u32).collect(), 0);

        let mut tree = Self {
            nodes: vec![root],
            triangles,
            support,
            max_depth,
            splits,
            max_build_depth: 0,
        };
        tree.split_node(0, 0);

        let stats = tree.stats();
        log::info!(
            "KD-tree built in {:.2?}: {} triangles, {} nodes, {} leaves, {} leaf references, depth {}",
            start.elapsed(),
            stats.triangle_count,
            stats.node_count,
            stats.leaf_count,
            stats.leaf_references,
            stats.max_build_depth
        );

        Ok(tree)
    }

    fn split_node(&mut self, node_index: usize, depth: usize) {
        if depth > self.max_depth || self.nodes[node_index].triangles.len() < MIN_TRIANGLES_PER_NODE {
            return;
        }

        let Some((axis, position)) = self.find_best_split(node_index) else {
            return;
        };

        let bounds = self.nodes[node_index].bounds;
        let (left_bounds, right_bounds) = bounds.split(axis, position);

        let triangles = std::mem::take(&mut self.nodes[node_index].triangles);
        let mut left = Vec::new();
        let mut right = Vec::new();
        for &index in &triangles {
            let triangle = &self.triangles[index as usize];
            if triangle.min_vertex()[axis] - EPSILON < position {
                left.push(index);
            }
            if triangle.max_vertex()[axis] + EPSILON > position {
                right.push(index);
            }
        }

        let left_index = self.nodes.len();
        self.nodes.push(Node::leaf(left_bounds, left, depth + 1));
        self.nodes.push(Node::leaf(right_bounds, right, depth + 1));
        self.nodes[node_index].split = Some(Split {
            axis,
            distance: position,
            children: [left_index, left_index + 1],
        });
        self.max_build_depth = self.max_build_depth.max(depth + 1);

        self.split_node(left_index, depth + 1);
        self.split_node(left_index + 1, depth + 1);
    }

    /// Cheapest split of a node as `(axis, position)`.
    ///
    /// Axes are scanned X, Y, Z and each with a min-point then a max-point
    /// sweep; only a strictly lower cost replaces the current best, so ties
    /// go to the first candidate. Returns `None` when no candidate is
    /// finite or when the best split is no cheaper than keeping the leaf.
    fn find_best_split(&self, node_index: usize) -> Option<(usize, f32)> {
        let node = &self.nodes[node_index];
        let count = node.triangles.len();
        let parent_square = node.bounds.square();
        if parent_square <= 0.0 {
            return None;
        }

        let mut best: Option<(usize, f32)> = None;
        let mut best_cost = f32::INFINITY;

        for axis in 0..3 {
            let mut mins: Vec<f32> = Vec::with_capacity(count);
            let mut maxs: Vec<f32> = Vec::with_capacity(count);
            for &index in &node.triangles {
                let triangle = &self.triangles[index as usize];
                mins.push(triangle.min_vertex()[axis] - EPSILON);
                maxs.push(triangle.max_vertex()[axis] + EPSILON);
            }
            mins.sort_by(f32::total_cmp);
            maxs.sort_by(f32::total_cmp);

            for sweep in [&mins, &maxs] {
                for position in candidate_positions(sweep, self.splits) {
                    let cost = split_cost(&node.bounds, parent_square, axis, position, &mins, &maxs);
                    if cost < best_cost {
                        best_cost = cost;
                        best = Some((axis, position));
                    }
                }
            }
        }

        // A split referencing every triangle on both sides costs at least `count`
        if best_cost < count as f32 {
            best
        } else {
            None
        }
    }

    /// Find the nearest triangle hit along `ray`.
    ///
    /// Hits closer than [`EPSILON`] are ignored.
    pub fn traverse(&self, ray: &Ray) -> Option<TraverseResult> {
        self.traverse_excluding(ray, None)
    }

    /// Like [`KdTree::traverse`], never reporting triangle `exclude`.
    ///
    /// Used for rays leaving a surface: a ray cannot cross the plane of the
    /// triangle it starts on twice, so any hit on it is rounding error.
    pub fn traverse_excluding(&self, ray: &Ray, exclude: Option<usize>) -> Option<TraverseResult> {
        let range = self.nodes[0].bounds.intersect(ray)?;
        let mut t_near = range.min;
        let mut t_far = range.max;

        let mut stack: SmallVec<[(usize, f32); TRAVERSE_STACK_SIZE]> = SmallVec::new();
        let mut node_index = 0;

        loop {
            let node = &self.nodes[node_index];

            if let Some(split) = node.split {
                let origin = ray.origin[split.axis];
                let direction = ray.direction[split.axis];
                let [below, above] = split.children;

                if direction == 0.0 {
                    node_index = if origin < split.distance { below } else { above };
                    continue;
                }

                let (near, far) = if direction > 0.0 {
                    (below, above)
                } else {
                    (above, below)
                };
                let t_split = (split.distance - origin) / direction;

                if t_split <= t_near {
                    node_index = far;
                } else if t_split >= t_far {
                    node_index = near;
                } else {
                    debug_assert!(
                        stack.len() < TRAVERSE_STACK_SIZE,
                        "KD-tree deeper than the traversal stack"
                    );
                    stack.push((far, t_far));
                    node_index = near;
                    t_far = t_split;
                }
                continue;
            }

            if let Some(hit) = self.intersect_leaf(node, ray, t_far, exclude) {
                return Some(hit);
            }

            let (next, next_far) = stack.pop()?;
            node_index = next;
            t_near = t_far;
            t_far = next_far;
        }
    }

    /// Closest hit among a leaf's triangles with `EPSILON < t <= t_far + EPSILON`.
    #[inline]
    fn intersect_leaf(
        &self,
        node: &Node,
        ray: &Ray,
        t_far: f32,
        exclude: Option<usize>,
    ) -> Option<TraverseResult> {
        let mut closest: Option<(usize, f32, f32, f32)> = None;
        let mut closest_t = t_far + EPSILON;

        for &index in &node.triangles {
            let index = index as usize;
            if exclude == Some(index) {
                continue;
            }
            if let Some((t, uv)) = self.support[index].intersect(ray) {
                if t > EPSILON && t <= closest_t {
                    closest_t = t;
                    closest = Some((index, t, uv.x, uv.y));
                }
            }
        }

        closest.map(|(triangle_index, t, u, v)| TraverseResult {
            triangle_index,
            intersection_point: ray.at(t),
            barycentric: Vec3::new(1.0 - u - v, u, v),
            distance: t,
        })
    }

    /// All nodes; the root is index 0.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Node by arena index.
    pub fn node(&self, index: usize) -> &Node {
        &self.nodes[index]
    }

    /// Leaf nodes in arena order.
    pub fn leaves(&self) -> impl Iterator<Item = &Node> + '_ {
        self.nodes.iter().filter(|node| node.is_leaf())
    }

    /// The triangle list the tree indexes into.
    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    /// Triangle by index.
    #[inline]
    pub fn triangle(&self, index: usize) -> &Triangle {
        &self.triangles[index]
    }

    /// Box enclosing every triangle.
    pub fn bounds(&self) -> BoundingBox {
        self.nodes[0].bounds
    }

    /// Deepest node produced by the builder.
    pub fn max_build_depth(&self) -> usize {
        self.max_build_depth
    }

    pub fn stats(&self) -> KdTreeStats {
        let mut stats = KdTreeStats {
            triangle_count: self.triangles.len(),
            node_count: self.nodes.len(),
            max_build_depth: self.max_build_depth,
            ..Default::default()
        };
        for leaf in self.leaves() {
            stats.leaf_count += 1;
            stats.leaf_references += leaf.triangles.len();
        }
        stats
    }
}

/// Candidate plane positions from one sorted sweep.
///
/// `splits <= 0` yields every value, otherwise an evenly strided subset of
/// at most `splits` values.
fn candidate_positions(sorted: &[f32], splits: i32) -> impl Iterator<Item = f32> + '_ {
    let len = sorted.len();
    let count = if splits <= 0 { len } else { (splits as usize).min(len) };
    (0..count).map(move |i| sorted[i * len / count])
}

/// SAH cost of splitting `bounds` at `position` along `axis`.
///
/// Planes inside the epsilon band at either box face cost infinity.
fn split_cost(
    bounds: &BoundingBox,
    parent_square: f32,
    axis: usize,
    position: f32,
    mins: &[f32],
    maxs: &[f32],
) -> f32 {
    if !bounds.axis_interval(axis).shrink(EPSILON).surrounds(position) {
        return f32::INFINITY;
    }

    let left_count = mins.partition_point(|&m| m < position);
    let right_count = maxs.len() - maxs.partition_point(|&m| m <= position);

    let (left, right) = bounds.split(axis, position);
    (left.square() * left_count as f32 + right.square() * right_count as f32) / parent_square
}
