//! Arena-style pool for path vertices.
//!
//! Subpaths are rebuilt for every sample; the pool keeps the vertex
//! storage alive across samples so the hot loop performs no allocation
//! after warm-up. Subpaths hold slot handles rather than references.

use crate::subpath::PathVertex;

/// Handle to a vertex slot in a [`VertexPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexHandle(usize);

/// Slab of vertex slots with a free list.
pub struct VertexPool<'a> {
    slots: Vec<PathVertex<'a>>,
    free: Vec<usize>,
}

impl<'a> VertexPool<'a> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    pub fn with_capacity(n: usize) -> Self {
        Self {
            slots: Vec::with_capacity(n),
            free: Vec::new(),
        }
    }

    /// Construct a vertex in a slot and return its handle.
    pub fn construct(&mut self, vertex: PathVertex<'a>) -> VertexHandle {
        match self.free.pop() {
            Some(i) => {
                self.slots[i] = vertex;
                VertexHandle(i)
            }
            None => {
                self.slots.push(vertex);
                VertexHandle(self.slots.len() - 1)
            }
        }
    }

    /// Return a slot to the free list.
    pub fn release(&mut self, handle: VertexHandle) {
        debug_assert!(handle.0 < self.slots.len());
        self.free.push(handle.0);
    }

    /// Reset the pool, keeping the allocation.
    pub fn release_all(&mut self) {
        self.slots.clear();
        self.free.clear();
    }

    pub fn get(&self, handle: VertexHandle) -> &PathVertex<'a> {
        &self.slots[handle.0]
    }

    pub fn get_mut(&mut self, handle: VertexHandle) -> &mut PathVertex<'a> {
        &mut self.slots[handle.0]
    }
}

impl<'a> Default for VertexPool<'a> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bsdf::TransportDirection;
    use crate::diffuse::DiffuseBsdf;
    use crate::subpath::PathVertexKind;
    use lux_math::Vec3;

    fn vertex(bsdf: &DiffuseBsdf) -> PathVertex<'_> {
        PathVertex::intermediate(
            TransportDirection::EL,
            crate::geometry::SurfaceGeometry::degenerate(Vec3::ZERO),
            bsdf,
        )
    }

    #[test]
    fn test_slot_reuse() {
        let bsdf = DiffuseBsdf::new(Vec3::splat(0.5));
        let mut pool = VertexPool::new();

        let a = pool.construct(vertex(&bsdf));
        let b = pool.construct(vertex(&bsdf));
        assert_ne!(a, b);

        pool.release(a);
        let c = pool.construct(vertex(&bsdf));
        // The freed slot is handed out again
        assert_eq!(a, c);
        assert_eq!(pool.get(c).kind, PathVertexKind::IntermediatePoint);
    }

    #[test]
    fn test_release_all_resets() {
        let bsdf = DiffuseBsdf::new(Vec3::splat(0.5));
        let mut pool = VertexPool::new();
        for _ in 0..8 {
            pool.construct(vertex(&bsdf));
        }
        pool.release_all();
        let h = pool.construct(vertex(&bsdf));
        assert_eq!(h, VertexHandle(0));
    }
}
