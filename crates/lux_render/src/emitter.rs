//! Emitters: the positional side of cameras and lights.
//!
//! An emitter couples a positional distribution (a point on an area mesh, a
//! pinhole, a bounding sphere) with the directional component it exposes
//! through the generalized-BSDF interface. Area emitters are bound to their
//! owning primitives in a second build phase, after all primitives exist.

use std::sync::Arc;

use lux_core::config::ConfigError;
use lux_core::mesh::TriangleMesh;
use lux_math::{Aabb, Mat4, PdfEval, Ray, Vec2, Vec3};

use crate::bsdf::GeneralizedBsdf;
use crate::geometry::SurfaceGeometry;

/// Per-primitive data handed to an emitter during registration. The mesh,
/// if any, is already in world space.
pub struct EmitterPrimitiveData {
    pub transform: Mat4,
    pub mesh: Option<Arc<TriangleMesh>>,
}

/// Positional sampling and evaluation shared by cameras and lights.
pub trait Emitter: GeneralizedBsdf {
    /// Sample a position on the emitter. The PDF is in the area measure; a
    /// Dirac positional density (pinhole, delta light) reports value 1 with
    /// `degenerated` set on the geometry.
    fn sample_position(&self, sample: Vec2) -> (SurfaceGeometry, PdfEval);

    /// Positional component of the emitted quantity at `geom`.
    fn evaluate_position(&self, geom: &SurfaceGeometry) -> Vec3;

    /// Positional PDF at `geom` (area measure).
    fn evaluate_position_pdf(&self, geom: &SurfaceGeometry) -> PdfEval;

    /// Bind the emitter to its owning primitives. Called once during scene
    /// build, after all primitives are registered.
    fn register_primitives(&mut self, primitives: &[EmitterPrimitiveData])
        -> Result<(), ConfigError>;

    /// Second configuration pass with the world bounds of the built scene.
    fn post_configure(&mut self, _world_bounds: &Aabb) {}

    /// An intersectable stand-in shape for emitters without surfaces
    /// (environment lights), so subpaths can land on them.
    fn emitter_shape(&self) -> Option<EmitterShape> {
        None
    }
}

/// A light emitter.
pub trait Light: Emitter {}

/// A camera emitter.
pub trait Camera: Emitter {
    /// Map a world ray (origin, direction) to raster coordinates in
    /// `[0, 1]^2`. Returns `None` when the direction falls outside the
    /// raster rectangle.
    fn ray_to_raster(&self, p: Vec3, d: Vec3) -> Option<Vec2>;

    /// The primary ray through a raster position.
    fn raster_to_ray(&self, raster: Vec2) -> Ray;
}

/// Sphere stand-in shape for emitters that have no surface of their own.
#[derive(Debug, Clone, Copy)]
pub struct EmitterShape {
    pub center: Vec3,
    pub radius: f32,
}

impl EmitterShape {
    /// Intersect, returning the hit parameter and the geometry with the
    /// normal facing the ray origin (the scene interior).
    pub fn intersect(&self, ray: &Ray) -> Option<(f32, Vec3, Vec3)> {
        let oc = ray.o - self.center;
        let a = ray.d.length_squared();
        let half_b = oc.dot(ray.d);
        let c = oc.length_squared() - self.radius * self.radius;
        let disc = half_b * half_b - a * c;
        if disc < 0.0 {
            return None;
        }
        let sqrt_d = disc.sqrt();

        // Nearest root within the ray bounds
        let mut t = (-half_b - sqrt_d) / a;
        if t <= ray.min_t || t >= ray.max_t {
            t = (-half_b + sqrt_d) / a;
            if t <= ray.min_t || t >= ray.max_t {
                return None;
            }
        }

        let p = ray.at(t);
        let inward = (self.center - p).normalize();
        Some((t, p, inward))
    }
}
