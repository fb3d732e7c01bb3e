//! Mesh geometry representation for the Lumen scene graph.
//!
//! A mesh is an indexed triangle list with optional per-vertex normals.
//! Triangles use counter-clockwise winding: the geometric normal of
//! `(p0, p1, p2)` is `(p1 - p0) x (p2 - p0)`.

use lumen_math::Vec3;

/// A mesh consisting of vertex positions, optional normals, and triangle indices.
#[derive(Clone, Debug)]
pub struct Mesh {
    /// Vertex positions (one Vec3 per vertex)
    pub positions: Vec<Vec3>,

    /// Vertex normals (optional - will be computed if not provided)
    pub normals: Option<Vec<Vec3>>,

    /// Triangle indices (every 3 indices form a triangle)
    pub indices: Vec<u32>,
}

impl Mesh {
    /// Create a new mesh from positions and indices, optionally with normals.
    ///
    /// If normals are not provided, they will NOT be automatically computed.
    /// Call `compute_normals()` explicitly if you need them.
    pub fn new(positions: Vec<Vec3>, indices: Vec<u32>, normals: Option<Vec<Vec3>>) -> Self {
        Self {
            positions,
            normals,
            indices,
        }
    }

    /// Axis-aligned quad spanned by `u` and `v` from `corner`, facing `u x v`.
    pub fn quad(corner: Vec3, u: Vec3, v: Vec3) -> Self {
        let positions = vec![corner, corner + u, corner + u + v, corner + v];
        let mut mesh = Self::new(positions, vec![0, 1, 2, 0, 2, 3], None);
        mesh.compute_normals();
        mesh
    }

    /// Closed box between `min` and `max` with outward-facing flat normals.
    ///
    /// Each face has its own four vertices so normals stay flat.
    pub fn cuboid(min: Vec3, max: Vec3) -> Self {
        let size = max - min;
        let faces = [
            (min, Vec3::new(0.0, size.y, 0.0), Vec3::new(size.x, 0.0, 0.0)), // -Z
            (Vec3::new(min.x, min.y, max.z), Vec3::new(size.x, 0.0, 0.0), Vec3::new(0.0, size.y, 0.0)), // +Z
            (min, Vec3::new(0.0, 0.0, size.z), Vec3::new(0.0, size.y, 0.0)), // -X
            (Vec3::new(max.x, min.y, min.z), Vec3::new(0.0, size.y, 0.0), Vec3::new(0.0, 0.0, size.z)), // +X
            (min, Vec3::new(size.x, 0.0, 0.0), Vec3::new(0.0, 0.0, size.z)), // -Y
            (Vec3::new(min.x, max.y, min.z), Vec3::new(0.0, 0.0, size.z), Vec3::new(size.x, 0.0, 0.0)), // +Y
        ];

        let mut positions = Vec::with_capacity(24);
        let mut normals = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);
        for (corner, u, v) in faces {
            let base = positions.len() as u32;
            let normal = u.cross(v).normalize();
            positions.extend_from_slice(&[corner, corner + u, corner + u + v, corner + v]);
            normals.extend_from_slice(&[normal; 4]);
            indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }

        Self::new(positions, indices, Some(normals))
    }

    /// Compute smooth vertex normals by averaging face normals.
    ///
    /// This generates normals if the mesh doesn't have them, or replaces
    /// existing normals. Each vertex normal is the normalized average of
    /// all face normals for faces that share that vertex.
    pub fn compute_normals(&mut self) {
        let vertex_count = self.positions.len();
        let mut normals = vec![Vec3::ZERO; vertex_count];

        for [i0, i1, i2] in self.triangle_indices() {
            let p0 = self.positions[i0];
            let face_normal = (self.positions[i1] - p0).cross(self.positions[i2] - p0);

            normals[i0] += face_normal;
            normals[i1] += face_normal;
            normals[i2] += face_normal;
        }

        for normal in &mut normals {
            let len = normal.length();
            if len > 0.0 {
                *normal /= len;
            } else {
                *normal = Vec3::Y; // Default up normal for degenerate cases
            }
        }

        self.normals = Some(normals);
    }

    /// Check if the mesh has one normal per vertex.
    pub fn has_normals(&self) -> bool {
        self.normals
            .as_ref()
            .is_some_and(|normals| normals.len() == self.positions.len())
    }

    /// Get the number of triangles in the mesh.
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Valid triangles as vertex index triplets.
    ///
    /// Triangles referencing vertices out of range are skipped with a warning,
    /// as is a trailing partial triangle.
    pub fn triangle_indices(&self) -> impl Iterator<Item = [usize; 3]> + '_ {
        let vertex_count = self.positions.len();
        self.indices.chunks_exact(3).filter_map(move |chunk| {
            let tri = [chunk[0] as usize, chunk[1] as usize, chunk[2] as usize];
            if tri.iter().any(|&i| i >= vertex_count) {
                log::warn!(
                    "Invalid triangle indices: {:?}, vertex count: {}",
                    tri,
                    vertex_count
                );
                return None;
            }
            Some(tri)
        })
    }
}
