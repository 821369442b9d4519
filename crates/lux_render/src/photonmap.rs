//! Photon storage and nearest-neighbour queries.

use std::collections::BinaryHeap;

use lux_math::Vec3;

/// A stored photon: position, throughput at the position (already divided
/// by the path PDF), and the direction it arrived from.
#[derive(Debug, Clone, Copy)]
pub struct Photon {
    pub p: Vec3,
    pub throughput: Vec3,
    pub wi: Vec3,
}

/// Candidate in the bounded k-NN heap, ordered by squared distance.
struct HeapEntry {
    d2: f32,
    index: usize,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.d2 == other.d2
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.d2.total_cmp(&other.d2)
    }
}

struct KdNode {
    photon: Photon,
    axis: usize,
    left: i32,
    right: i32,
}

/// Balanced kd-tree over photon positions (median split on the longest
/// axis), immutable after build.
pub struct PhotonMap {
    nodes: Vec<KdNode>,
    root: i32,
}

impl PhotonMap {
    pub fn build(mut photons: Vec<Photon>) -> Self {
        let n = photons.len();
        let mut map = Self {
            nodes: Vec::with_capacity(n),
            root: -1,
        };
        if n > 0 {
            map.root = map.build_range(&mut photons);
        }
        map
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn build_range(&mut self, photons: &mut [Photon]) -> i32 {
        if photons.is_empty() {
            return -1;
        }

        // Split on the longest axis of the point bounds
        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);
        for ph in photons.iter() {
            min = min.min(ph.p);
            max = max.max(ph.p);
        }
        let extent = max - min;
        let axis = if extent.x > extent.y && extent.x > extent.z {
            0
        } else if extent.y > extent.z {
            1
        } else {
            2
        };

        let mid = photons.len() / 2;
        photons.select_nth_unstable_by(mid, |a, b| a.p[axis].total_cmp(&b.p[axis]));
        let photon = photons[mid];

        let (lo, rest) = photons.split_at_mut(mid);
        let hi = &mut rest[1..];
        let left = self.build_range(lo);
        let right = self.build_range(hi);

        self.nodes.push(KdNode {
            photon,
            axis,
            left,
            right,
        });
        (self.nodes.len() - 1) as i32
    }

    /// Collect (up to) the `n` photons nearest to `p`. Returns the photon
    /// indices and the squared radius to the farthest of them.
    pub fn collect(&self, n: usize, p: Vec3) -> (Vec<usize>, f32) {
        let mut heap: BinaryHeap<HeapEntry> = BinaryHeap::with_capacity(n + 1);
        if n > 0 {
            self.collect_rec(self.root, n, p, &mut heap);
        }
        let max_d2 = heap.peek().map(|e| e.d2).unwrap_or(0.0);
        let indices = heap.into_iter().map(|e| e.index).collect();
        (indices, max_d2)
    }

    pub fn photon(&self, index: usize) -> &Photon {
        &self.nodes[index].photon
    }

    fn collect_rec(&self, node_idx: i32, n: usize, p: Vec3, heap: &mut BinaryHeap<HeapEntry>) {
        if node_idx < 0 {
            return;
        }
        let node = &self.nodes[node_idx as usize];

        let d2 = (node.photon.p - p).length_squared();
        if heap.len() < n {
            heap.push(HeapEntry {
                d2,
                index: node_idx as usize,
            });
        } else if d2 < heap.peek().unwrap().d2 {
            heap.pop();
            heap.push(HeapEntry {
                d2,
                index: node_idx as usize,
            });
        }

        let delta = p[node.axis] - node.photon.p[node.axis];
        let (near, far) = if delta < 0.0 {
            (node.left, node.right)
        } else {
            (node.right, node.left)
        };
        self.collect_rec(near, n, p, heap);

        // The far side can only matter when the splitting plane is closer
        // than the current worst candidate
        let plane_d2 = delta * delta;
        if heap.len() < n || plane_d2 < heap.peek().unwrap().d2 {
            self.collect_rec(far, n, p, heap);
        }
    }
}

/// Linear-scan photon map, the oracle for validating the kd-tree.
pub struct NaivePhotonMap {
    photons: Vec<Photon>,
}

impl NaivePhotonMap {
    pub fn build(photons: Vec<Photon>) -> Self {
        Self { photons }
    }

    pub fn collect(&self, n: usize, p: Vec3) -> (Vec<usize>, f32) {
        let mut order: Vec<usize> = (0..self.photons.len()).collect();
        order.sort_by(|&a, &b| {
            (self.photons[a].p - p)
                .length_squared()
                .total_cmp(&(self.photons[b].p - p).length_squared())
        });
        order.truncate(n);
        let max_d2 = order
            .last()
            .map(|&i| (self.photons[i].p - p).length_squared())
            .unwrap_or(0.0);
        (order, max_d2)
    }

    pub fn photon(&self, index: usize) -> &Photon {
        &self.photons[index]
    }
}
