//! Triangle mesh geometry.

use lux_math::{Aabb, Mat4, Vec2, Vec3};

/// A triangle mesh with per-vertex positions, optional normals and texture
/// coordinates, and a face index table (three indices per triangle).
///
/// Meshes are authored in object space; the scene transforms them into
/// world space at build time.
#[derive(Clone, Debug)]
pub struct TriangleMesh {
    /// Vertex positions (one per vertex)
    pub positions: Vec<Vec3>,

    /// Vertex normals (optional; computed on demand)
    pub normals: Option<Vec<Vec3>>,

    /// Texture coordinates (optional)
    pub uvs: Option<Vec<Vec2>>,

    /// Triangle faces as triples of vertex indices
    pub faces: Vec<[u32; 3]>,

    /// Object-space bounding box
    pub bounds: Aabb,
}

impl TriangleMesh {
    /// Create a mesh from positions, faces and optional normals.
    pub fn new(positions: Vec<Vec3>, faces: Vec<[u32; 3]>, normals: Option<Vec<Vec3>>) -> Self {
        let bounds = Self::compute_bounds(&positions);
        Self {
            positions,
            normals,
            uvs: None,
            faces,
            bounds,
        }
    }

    /// Create a mesh with texture coordinates.
    pub fn with_uvs(
        positions: Vec<Vec3>,
        faces: Vec<[u32; 3]>,
        normals: Option<Vec<Vec3>>,
        uvs: Option<Vec<Vec2>>,
    ) -> Self {
        let bounds = Self::compute_bounds(&positions);
        Self {
            positions,
            normals,
            uvs,
            faces,
            bounds,
        }
    }

    fn compute_bounds(positions: &[Vec3]) -> Aabb {
        positions
            .iter()
            .fold(Aabb::EMPTY, |acc, &p| acc.union_point(p))
    }

    /// Number of triangles.
    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }

    /// Number of vertices.
    pub fn num_vertices(&self) -> usize {
        self.positions.len()
    }

    /// The three corner positions of a face.
    pub fn face_positions(&self, face: usize) -> [Vec3; 3] {
        let f = self.faces[face];
        [
            self.positions[f[0] as usize],
            self.positions[f[1] as usize],
            self.positions[f[2] as usize],
        ]
    }

    pub fn has_normals(&self) -> bool {
        self.normals.is_some()
    }

    /// Compute smooth vertex normals by area-weighted averaging of face
    /// normals. Replaces any existing normals.
    pub fn compute_normals(&mut self) {
        let mut normals = vec![Vec3::ZERO; self.positions.len()];
        for f in &self.faces {
            let p0 = self.positions[f[0] as usize];
            let p1 = self.positions[f[1] as usize];
            let p2 = self.positions[f[2] as usize];
            let face_n = (p1 - p0).cross(p2 - p0);
            normals[f[0] as usize] += face_n;
            normals[f[1] as usize] += face_n;
            normals[f[2] as usize] += face_n;
        }
        for n in &mut normals {
            let len = n.length();
            *n = if len > 0.0 { *n / len } else { Vec3::Y };
        }
        self.normals = Some(normals);
    }

    /// Ensure vertex normals exist and match the vertex count.
    pub fn ensure_normals(&mut self) {
        let stale = match &self.normals {
            None => true,
            Some(n) => n.len() != self.positions.len(),
        };
        if stale {
            if self.normals.is_some() {
                log::debug!(
                    "normal count does not match vertex count ({}), recomputing",
                    self.positions.len()
                );
            }
            self.compute_normals();
        }
    }

    /// A copy of this mesh with positions and normals transformed into world
    /// space. Normals use the inverse-transpose and are re-normalized.
    pub fn transformed(&self, m: Mat4) -> TriangleMesh {
        let positions: Vec<Vec3> = self.positions.iter().map(|&p| m.transform_point3(p)).collect();
        let normal_m = m.inverse().transpose();
        let normals = self.normals.as_ref().map(|ns| {
            ns.iter()
                .map(|&n| normal_m.transform_vector3(n).normalize_or_zero())
                .collect()
        });
        let bounds = Self::compute_bounds(&positions);
        TriangleMesh {
            positions,
            normals,
            uvs: self.uvs.clone(),
            faces: self.faces.clone(),
            bounds,
        }
    }
}
