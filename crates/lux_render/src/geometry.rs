//! Surface geometry, intersection records and transport geometry factors.

use lux_math::{cos_theta, Frame, Ray, Vec2, Vec3};

use crate::bsdf::TransportDirection;
use crate::primitive::Primitive;
use crate::scene::Scene;

/// Geometry at a sampled or intersected surface point.
///
/// `degenerated` is true iff the point lies on a point emitter (camera
/// pinhole or delta light); the normals and shading frame are then
/// meaningless and any area-measure density at the point is a Dirac delta.
#[derive(Debug, Clone, Copy)]
pub struct SurfaceGeometry {
    /// Position
    pub p: Vec3,
    /// Geometric normal
    pub gn: Vec3,
    /// Shading normal
    pub sn: Vec3,
    /// Texture coordinates
    pub uv: Vec2,
    /// Orthonormal shading frame around `sn`
    pub frame: Frame,
    /// True for point-emitter positions
    pub degenerated: bool,
}

impl SurfaceGeometry {
    /// Geometry of a point emitter (pinhole, delta light).
    pub fn degenerate(p: Vec3) -> Self {
        Self {
            p,
            gn: Vec3::ZERO,
            sn: Vec3::ZERO,
            uv: Vec2::ZERO,
            frame: Frame::default(),
            degenerated: true,
        }
    }

    /// Geometry on a real surface; the shading frame is built on `sn`.
    pub fn on_surface(p: Vec3, gn: Vec3, sn: Vec3, uv: Vec2) -> Self {
        Self {
            p,
            gn,
            sn,
            uv,
            frame: Frame::from_normal(sn),
            degenerated: false,
        }
    }

    /// World direction into shading-frame coordinates.
    #[inline]
    pub fn world_to_shading(&self, v: Vec3) -> Vec3 {
        self.frame.to_local(v)
    }

    /// Shading-frame direction into world coordinates.
    #[inline]
    pub fn shading_to_world(&self, v: Vec3) -> Vec3 {
        self.frame.to_world(v)
    }
}

/// A ray-scene intersection: surface geometry plus a back-reference to the
/// primitive that was hit.
#[derive(Clone, Copy)]
pub struct Intersection<'a> {
    pub geom: SurfaceGeometry,
    pub primitive: &'a Primitive,
    pub prim_index: usize,
    pub face_index: usize,
    pub t: f32,
}

/// Generalized geometry term between two surface points.
///
/// `G(x, y) = |cos(n_x, w)| |cos(n_y, -w)| / ||y - x||^2` with the cosine
/// dropped at a degenerate endpoint.
pub fn generalized_geometry_term(g1: &SurfaceGeometry, g2: &SurfaceGeometry) -> f32 {
    let v = g2.p - g1.p;
    let len2 = v.length_squared();
    if len2 == 0.0 {
        return 0.0;
    }
    let w = v / len2.sqrt();
    let mut num = 1.0;
    if !g1.degenerated {
        num *= g1.sn.dot(w).abs();
    }
    if !g2.degenerated {
        num *= g2.sn.dot(-w).abs();
    }
    num / len2
}

/// Geometry term that is zero when a shadow ray between the points hits
/// any surface strictly between them.
pub fn geometry_term_with_visibility(
    scene: &Scene,
    g1: &SurfaceGeometry,
    g2: &SurfaceGeometry,
) -> f32 {
    let mut shadow = Ray::shadow(g1.p, g2.p);
    if scene.intersect(&mut shadow).is_some() {
        return 0.0;
    }
    generalized_geometry_term(g1, g2)
}

/// Transport-asymmetry factor applied at every scattering vertex.
///
/// In the light-to-eye direction the factor is
/// `|wi.ns| |wo.ng| / (|wi.ng| |wo.ns|)`; in the eye-to-light direction it
/// is one. It is zero when either direction is on the wrong side of either
/// normal, which also prevents light leaks through the shading normal.
pub fn shading_normal_correction(
    transport_dir: TransportDirection,
    geom: &SurfaceGeometry,
    local_wi: Vec3,
    local_wo: Vec3,
    world_wi: Vec3,
    world_wo: Vec3,
) -> f32 {
    let wi_dot_ng = world_wi.dot(geom.gn);
    let wo_dot_ng = world_wo.dot(geom.gn);
    let wi_dot_ns = cos_theta(local_wi);
    let wo_dot_ns = cos_theta(local_wo);

    if wi_dot_ng * wi_dot_ns <= 0.0 || wo_dot_ng * wo_dot_ns <= 0.0 {
        return 0.0;
    }

    match transport_dir {
        TransportDirection::LE => (wi_dot_ns * wo_dot_ng) / (wi_dot_ng * wo_dot_ns),
        TransportDirection::EL => 1.0,
    }
}
