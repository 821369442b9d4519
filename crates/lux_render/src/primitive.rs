//! Scene primitives.

use std::sync::Arc;

use lux_core::mesh::TriangleMesh;
use lux_math::Mat4;

use crate::bsdf::Bsdf;

/// An immutable scene primitive: a world transform, an optional triangle
/// mesh (already transformed into world space at scene build), a required
/// BSDF, and at most one of a camera or a light (stored as indices into the
/// scene's emitter tables).
///
/// An area emitter is a primitive whose emitter has an associated mesh; a
/// point or environment emitter has none.
pub struct Primitive {
    pub transform: Mat4,
    pub mesh: Option<Arc<TriangleMesh>>,
    pub bsdf: Arc<dyn Bsdf>,
    pub light: Option<usize>,
    pub camera: Option<usize>,
}

impl Primitive {
    pub fn new(transform: Mat4, mesh: Option<Arc<TriangleMesh>>, bsdf: Arc<dyn Bsdf>) -> Self {
        Self {
            transform,
            mesh,
            bsdf,
            light: None,
            camera: None,
        }
    }
}
