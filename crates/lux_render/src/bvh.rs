//! Ray-scene acceleration: triaccels and an SAH-built BVH.

use lux_math::{Aabb, Ray, Vec2, Vec3};

use crate::primitive::Primitive;
use crate::renderer::ProgressFn;

/// Per-triangle precomputed intersection record: the anchor vertex and the
/// two edge vectors, plus back-references to the owning primitive and the
/// face index within its mesh.
#[derive(Debug, Clone, Copy)]
pub struct Triaccel {
    pub p0: Vec3,
    pub e1: Vec3,
    pub e2: Vec3,
    pub prim_index: u32,
    pub face_index: u32,
}

impl Triaccel {
    pub fn new(p: [Vec3; 3], prim_index: u32, face_index: u32) -> Self {
        Self {
            p0: p[0],
            e1: p[1] - p[0],
            e2: p[2] - p[0],
            prim_index,
            face_index,
        }
    }

    /// Moeller-Trumbore intersection against the ray's current bounds.
    /// Returns `(t, u, v)` with barycentric coordinates on a hit.
    pub fn intersect(&self, ray: &Ray) -> Option<(f32, f32, f32)> {
        let h = ray.d.cross(self.e2);
        let det = self.e1.dot(h);
        if det.abs() < 1e-8 {
            return None;
        }

        let inv_det = 1.0 / det;
        let s = ray.o - self.p0;
        let u = inv_det * s.dot(h);
        if !(0.0..=1.0).contains(&u) {
            return None;
        }

        let q = s.cross(self.e1);
        let v = inv_det * ray.d.dot(q);
        if v < 0.0 || u + v > 1.0 {
            return None;
        }

        let t = inv_det * self.e2.dot(q);
        if t <= ray.min_t || t >= ray.max_t {
            return None;
        }

        Some((t, u, v))
    }
}

// --------------------------------------------------------------------------------

/// Maximum triangles per leaf.
const MAX_TRIS_IN_NODE: usize = 255;

/// Number of centroid buckets considered by the SAH split.
const NUM_BUCKETS: usize = 12;

enum BvhNode {
    /// Half-open range `[begin, end)` over the shared triangle-index array.
    Leaf {
        begin: usize,
        end: usize,
        bound: Aabb,
    },
    Internal {
        split_axis: usize,
        bound: Aabb,
        left: Box<BvhNode>,
        right: Box<BvhNode>,
    },
}

impl BvhNode {
    fn bound(&self) -> Aabb {
        match self {
            BvhNode::Leaf { bound, .. } => *bound,
            BvhNode::Internal { bound, .. } => *bound,
        }
    }
}

/// Result of a BVH intersection query.
#[derive(Debug, Clone, Copy)]
pub struct BvhHit {
    /// Index into the triaccel array
    pub tri: usize,
    pub t: f32,
    /// Barycentric coordinates of the hit
    pub b: Vec2,
}

/// Bounding-volume hierarchy over the world-space triangles of all mesh
/// primitives. Leaves reference ranges of a shared, immutable index array.
pub struct Bvh {
    triaccels: Vec<Triaccel>,
    indices: Vec<u32>,
    root: Option<Box<BvhNode>>,
}

struct BvhBuilder<'a> {
    tri_bounds: Vec<Aabb>,
    centroids: Vec<Vec3>,
    indices: Vec<u32>,
    progress: Option<&'a ProgressFn>,
    num_total: usize,
    num_committed: usize,
}

impl<'a> BvhBuilder<'a> {
    /// Report progress as leaves are created, weighted by the number of
    /// triangles committed to them.
    fn commit_leaf(&mut self, begin: usize, end: usize) {
        self.num_committed += end - begin;
        if let Some(p) = self.progress {
            p(
                self.num_committed as f64 / self.num_total as f64,
                self.num_committed == self.num_total,
            );
        }
    }

    fn build(&mut self, begin: usize, end: usize) -> Box<BvhNode> {
        let mut bound = Aabb::EMPTY;
        for i in begin..end {
            bound = bound.union(&self.tri_bounds[self.indices[i] as usize]);
        }

        let num_tris = end - begin;
        if num_tris == 1 {
            self.commit_leaf(begin, end);
            return Box::new(BvhNode::Leaf { begin, end, bound });
        }

        let mut centroid_bound = Aabb::EMPTY;
        for i in begin..end {
            centroid_bound = centroid_bound.union_point(self.centroids[self.indices[i] as usize]);
        }
        let axis = centroid_bound.longest_axis();
        let cmin = centroid_bound.min[axis];
        let cmax = centroid_bound.max[axis];

        // Degenerate centroid bounds cannot be partitioned
        if cmin == cmax {
            self.commit_leaf(begin, end);
            return Box::new(BvhNode::Leaf { begin, end, bound });
        }

        let bucket_of = |c: Vec3| -> usize {
            let f = NUM_BUCKETS as f32 * ((c[axis] - cmin) / (cmax - cmin));
            (f as usize).min(NUM_BUCKETS - 1)
        };

        let mut bucket_bound = [Aabb::EMPTY; NUM_BUCKETS];
        let mut bucket_count = [0usize; NUM_BUCKETS];
        for i in begin..end {
            let tri = self.indices[i] as usize;
            let b = bucket_of(self.centroids[tri]);
            bucket_count[b] += 1;
            bucket_bound[b] = bucket_bound[b].union(&self.tri_bounds[tri]);
        }

        // SAH cost for each of the NUM_BUCKETS - 1 partitions, assuming
        // intersection cost 1 and traversal cost 1/8
        let mut min_cost = f32::INFINITY;
        let mut min_cost_idx = 0;
        for i in 0..NUM_BUCKETS - 1 {
            let mut b1 = Aabb::EMPTY;
            let mut b2 = Aabb::EMPTY;
            let mut n1 = 0usize;
            let mut n2 = 0usize;
            for j in 0..=i {
                b1 = b1.union(&bucket_bound[j]);
                n1 += bucket_count[j];
            }
            for j in i + 1..NUM_BUCKETS {
                b2 = b2.union(&bucket_bound[j]);
                n2 += bucket_count[j];
            }
            let cost = 0.125
                + (n1 as f32 * b1.surface_area() + n2 as f32 * b2.surface_area())
                    / bound.surface_area();
            if cost < min_cost {
                min_cost = cost;
                min_cost_idx = i;
            }
        }

        // Partition when splitting beats the leaf cost or the node is too
        // large for a leaf
        if min_cost < num_tris as f32 || num_tris > MAX_TRIS_IN_NODE {
            let mid = self.partition(begin, end, |c| bucket_of(c) <= min_cost_idx);
            debug_assert!(mid > begin && mid < end);
            let left = self.build(begin, mid);
            let right = self.build(mid, end);
            Box::new(BvhNode::Internal {
                split_axis: axis,
                bound: left.bound().union(&right.bound()),
                left,
                right,
            })
        } else {
            self.commit_leaf(begin, end);
            Box::new(BvhNode::Leaf { begin, end, bound })
        }
    }

    /// Stable in-place partition of the index range by a centroid
    /// predicate. Returns the first index of the second group.
    fn partition<F: Fn(Vec3) -> bool>(&mut self, begin: usize, end: usize, pred: F) -> usize {
        let mut left = Vec::with_capacity(end - begin);
        let mut right = Vec::with_capacity(end - begin);
        for i in begin..end {
            let tri = self.indices[i];
            if pred(self.centroids[tri as usize]) {
                left.push(tri);
            } else {
                right.push(tri);
            }
        }
        let mid = begin + left.len();
        self.indices[begin..mid].copy_from_slice(&left);
        self.indices[mid..end].copy_from_slice(&right);
        mid
    }
}

impl Bvh {
    /// Build over all triangles of the given primitives. Meshes are
    /// expected to be in world space already.
    pub fn build(primitives: &[Primitive], progress: Option<&ProgressFn>) -> Bvh {
        let mut triaccels = Vec::new();
        let mut tri_bounds = Vec::new();
        let mut centroids = Vec::new();

        for (prim_index, prim) in primitives.iter().enumerate() {
            let Some(mesh) = &prim.mesh else {
                continue;
            };
            for face in 0..mesh.num_faces() {
                let p = mesh.face_positions(face);
                triaccels.push(Triaccel::new(p, prim_index as u32, face as u32));
                let bound = Aabb::from_points(p[0], p[1]).union_point(p[2]);
                tri_bounds.push(bound);
                centroids.push(bound.centroid());
            }
        }
        log::info!("created {} triaccels", triaccels.len());

        let indices: Vec<u32> = (0..triaccels.len() as u32).collect();
        if triaccels.is_empty() {
            return Bvh {
                triaccels,
                indices,
                root: None,
            };
        }

        let mut builder = BvhBuilder {
            num_total: triaccels.len(),
            num_committed: 0,
            tri_bounds,
            centroids,
            indices,
            progress,
        };
        if let Some(p) = progress {
            p(0.0, false);
        }
        let root = builder.build(0, triaccels.len());

        Bvh {
            triaccels,
            indices: builder.indices,
            root: Some(root),
        }
    }

    pub fn triaccel(&self, i: usize) -> &Triaccel {
        &self.triaccels[i]
    }

    pub fn num_triangles(&self) -> usize {
        self.triaccels.len()
    }

    /// Closest-hit query. On a hit, `ray.max_t` is clamped to the hit
    /// parameter.
    pub fn intersect(&self, ray: &mut Ray) -> Option<BvhHit> {
        let root = self.root.as_ref()?;
        let inv_d = Vec3::new(1.0 / ray.d.x, 1.0 / ray.d.y, 1.0 / ray.d.z);
        let neg = [
            (ray.d.x < 0.0) as usize,
            (ray.d.y < 0.0) as usize,
            (ray.d.z < 0.0) as usize,
        ];
        let mut hit = None;
        self.intersect_node(root, ray, inv_d, neg, &mut hit);
        hit
    }

    fn intersect_node(
        &self,
        node: &BvhNode,
        ray: &mut Ray,
        inv_d: Vec3,
        neg: [usize; 3],
        hit: &mut Option<BvhHit>,
    ) {
        match node {
            BvhNode::Leaf { begin, end, bound } => {
                if !bound.intersect_ray(ray, inv_d, neg) {
                    return;
                }
                for i in *begin..*end {
                    let tri = self.indices[i] as usize;
                    if let Some((t, u, v)) = self.triaccels[tri].intersect(ray) {
                        ray.max_t = t;
                        *hit = Some(BvhHit {
                            tri,
                            t,
                            b: Vec2::new(u, v),
                        });
                    }
                }
            }
            BvhNode::Internal {
                split_axis,
                bound,
                left,
                right,
            } => {
                if !bound.intersect_ray(ray, inv_d, neg) {
                    return;
                }
                // Descend into the child on the ray's near side first so
                // max_t tightens early
                if neg[*split_axis] == 1 {
                    self.intersect_node(right, ray, inv_d, neg, hit);
                    self.intersect_node(left, ray, inv_d, neg, hit);
                } else {
                    self.intersect_node(left, ray, inv_d, neg, hit);
                    self.intersect_node(right, ray, inv_d, neg, hit);
                }
            }
        }
    }

    /// Reference query testing every triangle. Used to validate traversal.
    pub fn intersect_naive(&self, ray: &mut Ray) -> Option<BvhHit> {
        let mut hit = None;
        for (tri, ta) in self.triaccels.iter().enumerate() {
            if let Some((t, u, v)) = ta.intersect(ray) {
                ray.max_t = t;
                hit = Some(BvhHit {
                    tri,
                    t,
                    b: Vec2::new(u, v),
                });
            }
        }
        hit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diffuse::DiffuseBsdf;
    use lux_core::mesh::TriangleMesh;
    use lux_math::Mat4;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::sync::Arc;

    fn prim_with_mesh(mesh: TriangleMesh) -> Primitive {
        Primitive::new(
            Mat4::IDENTITY,
            Some(Arc::new(mesh)),
            Arc::new(DiffuseBsdf::new(Vec3::splat(0.5))),
        )
    }

    fn random_mesh(num_tris: usize, seed: u64) -> TriangleMesh {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut positions = Vec::new();
        let mut faces = Vec::new();
        for i in 0..num_tris {
            let base = Vec3::new(rng.gen::<f32>(), rng.gen::<f32>(), rng.gen::<f32>());
            let e1 = Vec3::new(rng.gen::<f32>(), rng.gen::<f32>(), rng.gen::<f32>()) * 0.2;
            let e2 = Vec3::new(rng.gen::<f32>(), rng.gen::<f32>(), rng.gen::<f32>()) * 0.2;
            positions.push(base);
            positions.push(base + e1);
            positions.push(base + e2);
            let k = (3 * i) as u32;
            faces.push([k, k + 1, k + 2]);
        }
        TriangleMesh::new(positions, faces, None)
    }

    #[test]
    fn test_triaccel_hit() {
        let ta = Triaccel::new(
            [
                Vec3::new(-1.0, -1.0, -1.0),
                Vec3::new(1.0, -1.0, -1.0),
                Vec3::new(0.0, 1.0, -1.0),
            ],
            0,
            0,
        );
        let ray = Ray::infinite(Vec3::ZERO, -Vec3::Z);
        let (t, u, v) = ta.intersect(&ray).unwrap();
        assert!((t - 1.0).abs() < 1e-5);
        assert!(u >= 0.0 && v >= 0.0 && u + v <= 1.0);

        let miss = Ray::infinite(Vec3::ZERO, Vec3::Z);
        assert!(ta.intersect(&miss).is_none());
    }

    #[test]
    fn test_bvh_matches_naive_on_grid() {
        // 100 random triangles in [0,1]^3 (and slightly out), 81 rays
        // through a 9x9 grid on the xy face
        let prims = vec![prim_with_mesh(random_mesh(100, 42))];
        let bvh = Bvh::build(&prims, None);
        assert_eq!(bvh.num_triangles(), 100);

        let mut hits = 0;
        for i in 0..9 {
            for j in 0..9 {
                let x = (i as f32 + 0.5) / 9.0;
                let y = (j as f32 + 0.5) / 9.0;
                let mut r1 = Ray::new(Vec3::new(x, y, 1.5), -Vec3::Z, 1e-4, f32::INFINITY);
                let mut r2 = r1;
                let h1 = bvh.intersect(&mut r1);
                let h2 = bvh.intersect_naive(&mut r2);
                match (h1, h2) {
                    (None, None) => {}
                    (Some(a), Some(b)) => {
                        hits += 1;
                        assert_eq!(a.tri, b.tri);
                        assert!((a.t - b.t).abs() < 1e-5);
                        assert!((r1.max_t - r2.max_t).abs() < 1e-5);
                    }
                    _ => panic!("bvh and naive disagree at ({i}, {j})"),
                }
            }
        }
        assert!(hits > 0, "test grid should hit at least one triangle");
    }

    #[test]
    fn test_bvh_shadow_ray_bounds_respected() {
        let prims = vec![prim_with_mesh(random_mesh(50, 7))];
        let bvh = Bvh::build(&prims, None);
        // A ray whose max_t stops short of everything
        let mut ray = Ray::new(Vec3::new(0.5, 0.5, 2.0), -Vec3::Z, 1e-4, 0.1);
        assert!(bvh.intersect(&mut ray).is_none());
    }

    #[test]
    fn test_build_progress_reaches_done() {
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::sync::Arc as StdArc;

        let done = StdArc::new(AtomicBool::new(false));
        let done2 = done.clone();
        let progress: ProgressFn = Box::new(move |f, d| {
            assert!((0.0..=1.0).contains(&f));
            if d {
                done2.store(true, Ordering::Relaxed);
            }
        });
        let prims = vec![prim_with_mesh(random_mesh(300, 3))];
        let _ = Bvh::build(&prims, Some(&progress));
        assert!(done.load(Ordering::Relaxed));
    }

    #[test]
    fn test_empty_bvh() {
        let bvh = Bvh::build(&[], None);
        let mut ray = Ray::infinite(Vec3::ZERO, Vec3::Z);
        assert!(bvh.intersect(&mut ray).is_none());
    }
}
