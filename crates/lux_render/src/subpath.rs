//! Path vertices and subpath sampling.
//!
//! A subpath starts at an emitter (light or camera), then grows by
//! alternating BSDF sampling and ray casting. Every vertex caches its
//! positional PDF and its directional PDFs in both transport directions,
//! which is what makes the MIS ratio telescoping O(n) later.

use lux_math::{abs_cos_theta, Measure, PdfEval, Ray, Vec2, Vec3};

use crate::bsdf::{
    BsdfEvalQuery, BsdfSampleQuery, BsdfType, GeneralizedBsdf, PerDirection, TransportDirection,
};
use crate::emitter::{Camera, Light};
use crate::geometry::SurfaceGeometry;
use crate::pool::{VertexHandle, VertexPool};
use crate::sampler::Sampler;
use crate::scene::Scene;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathVertexKind {
    EndPoint,
    IntermediatePoint,
}

/// The emitter a vertex sits on, if any.
#[derive(Clone, Copy)]
pub enum EmitterRef<'a> {
    Light(&'a dyn Light),
    Camera(&'a dyn Camera),
}

impl<'a> EmitterRef<'a> {
    pub fn evaluate_position(&self, geom: &SurfaceGeometry) -> Vec3 {
        match self {
            EmitterRef::Light(l) => l.evaluate_position(geom),
            EmitterRef::Camera(c) => c.evaluate_position(geom),
        }
    }

    pub fn evaluate_position_pdf(&self, geom: &SurfaceGeometry) -> PdfEval {
        match self {
            EmitterRef::Light(l) => l.evaluate_position_pdf(geom),
            EmitterRef::Camera(c) => c.evaluate_position_pdf(geom),
        }
    }

    pub fn generalized(&self) -> &'a dyn GeneralizedBsdf {
        match self {
            EmitterRef::Light(l) => *l,
            EmitterRef::Camera(c) => *c,
        }
    }
}

/// A vertex of a light or eye subpath.
#[derive(Clone, Copy)]
pub struct PathVertex<'a> {
    pub kind: PathVertexKind,
    pub transport_dir: TransportDirection,
    pub geom: SurfaceGeometry,

    /// Incident direction, toward the previous vertex on this subpath.
    pub wi: Vec3,
    /// Outgoing direction, toward the next vertex.
    pub wo: Vec3,

    /// The directional distribution at this vertex: the surface BSDF for
    /// intermediate vertices, the emitter for endpoints.
    pub bsdf: &'a dyn GeneralizedBsdf,
    /// The emitter this vertex sits on, if any.
    pub emitter: Option<EmitterRef<'a>>,
    /// Set when the vertex lies on an area light.
    pub area_light: Option<&'a dyn Light>,
    /// Set when the vertex lies on an area camera.
    pub area_camera: Option<&'a dyn Camera>,

    /// Positional PDF (area measure).
    pub pdf_p: PdfEval,
    /// Directional PDFs in both transport directions.
    pub pdf_d: PerDirection<PdfEval>,
    /// Russian-roulette survival probability (discrete measure).
    pub pdf_rr: PdfEval,
}

impl<'a> PathVertex<'a> {
    pub fn endpoint(
        transport_dir: TransportDirection,
        geom: SurfaceGeometry,
        emitter: EmitterRef<'a>,
    ) -> Self {
        Self {
            kind: PathVertexKind::EndPoint,
            transport_dir,
            geom,
            wi: Vec3::ZERO,
            wo: Vec3::ZERO,
            bsdf: emitter.generalized(),
            emitter: Some(emitter),
            area_light: None,
            area_camera: None,
            pdf_p: PdfEval::default(),
            pdf_d: PerDirection([PdfEval::default(); 2]),
            pdf_rr: PdfEval::new(1.0, Measure::Discrete),
        }
    }

    pub fn intermediate(
        transport_dir: TransportDirection,
        geom: SurfaceGeometry,
        bsdf: &'a dyn GeneralizedBsdf,
    ) -> Self {
        Self {
            kind: PathVertexKind::IntermediatePoint,
            transport_dir,
            geom,
            wi: Vec3::ZERO,
            wo: Vec3::ZERO,
            bsdf,
            emitter: None,
            area_light: None,
            area_camera: None,
            pdf_p: PdfEval::default(),
            pdf_d: PerDirection([PdfEval::default(); 2]),
            pdf_rr: PdfEval::new(1.0, Measure::Discrete),
        }
    }
}

/// A light or eye subpath: an ordered list of vertices, the first of which
/// is the emitter vertex.
pub struct Subpath {
    pub transport_dir: TransportDirection,
    pub vertices: Vec<VertexHandle>,
}

impl Subpath {
    pub fn new(transport_dir: TransportDirection) -> Self {
        Self {
            transport_dir,
            vertices: Vec::new(),
        }
    }

    pub fn clear(&mut self) {
        self.vertices.clear();
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    pub fn vertex<'p, 'a>(&self, pool: &'p VertexPool<'a>, i: usize) -> &'p PathVertex<'a> {
        pool.get(self.vertices[i])
    }

    /// Sample the subpath.
    ///
    /// The seed vertex comes from the main camera (`EL`) or a light picked
    /// through the light-selection distribution (`LE`). The path then
    /// propagates by BSDF sampling, with a fair Russian-roulette coin after
    /// `rr_depth` vertices and an optional hard cap of `max_vertices`.
    pub fn sample<'a>(
        &mut self,
        scene: &'a Scene,
        sampler: &mut dyn Sampler,
        pool: &mut VertexPool<'a>,
        rr_depth: usize,
        max_vertices: Option<usize>,
    ) {
        debug_assert!(self.vertices.is_empty());
        let transport_dir = self.transport_dir;

        // Seed vertex
        let mut v = match transport_dir {
            TransportDirection::EL => {
                let camera = scene.main_camera();
                let (geom, pdf_p) = camera.sample_position(sampler.next_vec2());
                let mut v = PathVertex::endpoint(transport_dir, geom, EmitterRef::Camera(camera));
                v.pdf_p = pdf_p;
                if !geom.degenerated {
                    v.area_camera = Some(camera);
                }
                v
            }
            TransportDirection::LE => {
                let (light_index, selection_pdf) = scene.sample_light_selection(sampler.next());
                let light = scene.light(light_index);
                let (geom, mut pdf_p) = light.sample_position(sampler.next_vec2());
                pdf_p.v *= selection_pdf.v;
                let mut v = PathVertex::endpoint(transport_dir, geom, EmitterRef::Light(light));
                v.pdf_p = pdf_p;
                if !geom.degenerated {
                    v.area_light = Some(light);
                }
                v
            }
        };

        // Initial direction from the emitter
        let query = BsdfSampleQuery {
            sample: sampler.next_vec2(),
            u_comp: 0.0,
            wi: Vec3::ZERO,
            ty: BsdfType::ALL_EMITTER,
            transport_dir,
        };
        let Some(result) = v.bsdf.sample_direction(&query, &v.geom) else {
            self.vertices.push(pool.construct(v));
            return;
        };
        v.wo = result.wo;
        v.pdf_d[transport_dir] = result.pdf;
        // The opposite-direction PDF is undefined at an endpoint
        v.pdf_d[transport_dir.opposite()] = PdfEval::default();

        self.vertices.push(pool.construct(v));

        // Propagation
        let mut depth = 1usize;
        loop {
            let prev = pool.get(*self.vertices.last().unwrap());
            let prev_wo = prev.wo;
            let prev_p = prev.geom.p;
            let prev_degenerated = prev.geom.degenerated;

            let mut ray = Ray::infinite(prev_p, prev_wo);
            let Some(isect) = scene.intersect(&mut ray) else {
                break;
            };

            let mut v = PathVertex::intermediate(
                transport_dir,
                isect.geom,
                isect.primitive.bsdf.as_ref(),
            );
            v.wi = -prev_wo;
            v.area_light = isect.primitive.light.map(|i| scene.light(i));
            v.area_camera = isect.primitive.camera.map(|_| scene.main_camera());

            // A surface carries at most one emitter
            debug_assert!(v.area_light.is_none() || v.area_camera.is_none());
            if let Some(light) = v.area_light {
                v.emitter = Some(EmitterRef::Light(light));
            } else if let Some(camera) = v.area_camera {
                v.emitter = Some(EmitterRef::Camera(camera));
            }
            v.pdf_p = match &v.emitter {
                Some(e) => e.evaluate_position_pdf(&v.geom),
                None => PdfEval::zero(Measure::Area),
            };

            depth += 1;

            // Optional hard cap on subpath length, applied before RR
            if let Some(max) = max_vertices {
                if self.vertices.len() + 1 >= max {
                    self.vertices.push(pool.construct(v));
                    break;
                }
            }

            // Russian roulette with a fair coin past rr_depth
            if depth >= rr_depth {
                let p = 0.5;
                if sampler.next() > p {
                    self.vertices.push(pool.construct(v));
                    break;
                }
                v.pdf_rr = PdfEval::new(p, Measure::Discrete);
            }

            // Scatter
            let query = BsdfSampleQuery {
                sample: sampler.next_vec2(),
                u_comp: sampler.next(),
                wi: v.wi,
                ty: BsdfType::ALL,
                transport_dir,
            };
            let Some(result) = v.bsdf.sample_direction(&query, &v.geom) else {
                // Terminal absorber
                self.vertices.push(pool.construct(v));
                break;
            };
            v.wo = result.wo;
            v.pdf_d[transport_dir] = result.pdf;

            // PDF of sampling the reverse direction, for the other
            // transport flow
            let opposite = transport_dir.opposite();
            if !prev_degenerated {
                if result.sampled_type.is_specular() {
                    if result.sampled_type.intersects(BsdfType::SPECULAR_REFLECTION) {
                        v.pdf_d[opposite] = v.pdf_d[transport_dir];
                    } else {
                        // Transmission rescales by the cosine ratio of the
                        // swapped directions
                        let local_wi = v.geom.world_to_shading(v.wi);
                        let local_wo = v.geom.world_to_shading(v.wo);
                        v.pdf_d[opposite] = PdfEval::new(
                            v.pdf_d[transport_dir].v * abs_cos_theta(local_wi)
                                / abs_cos_theta(local_wo),
                            Measure::ProjectedSolidAngle,
                        );
                    }
                } else {
                    let eq = BsdfEvalQuery::new(result.sampled_type, opposite, result.wo, query.wi);
                    v.pdf_d[opposite] = v.bsdf.evaluate_direction_pdf(&eq, &v.geom);
                }
            } else {
                v.pdf_d[opposite] = PdfEval::zero(Measure::ProjectedSolidAngle);
            }

            self.vertices.push(pool.construct(v));
        }
    }

    /// Evaluate the subpath throughput factor over its first `vs` vertices:
    /// `alpha_0 = 1`,
    /// `alpha_s = W(x0)/p_A(x0) * prod f(x_i) / p(x_i) / p_RR(x_i)`.
    ///
    /// For an eye subpath the raster position of the seed direction is
    /// established on the way; a direction outside the raster yields zero.
    pub fn evaluate_alpha(
        &self,
        pool: &VertexPool<'_>,
        vs: usize,
        raster: &mut Vec2,
    ) -> Vec3 {
        if vs == 0 {
            return Vec3::ONE;
        }

        let v0 = self.vertex(pool, 0);
        debug_assert_eq!(v0.kind, PathVertexKind::EndPoint);
        debug_assert_eq!(v0.pdf_p.measure, Measure::Area);
        let emitter = v0.emitter.as_ref().expect("subpath seed has an emitter");

        if self.transport_dir == TransportDirection::EL {
            let EmitterRef::Camera(camera) = emitter else {
                unreachable!("eye subpath seeded on a light");
            };
            match camera.ray_to_raster(v0.geom.p, v0.wo) {
                Some(r) => *raster = r,
                None => return Vec3::ZERO,
            }
        }

        let mut alpha = emitter.evaluate_position(&v0.geom) / v0.pdf_p.v;

        for i in 0..vs - 1 {
            let v = self.vertex(pool, i);
            let eq = BsdfEvalQuery::new(BsdfType::ALL, self.transport_dir, v.wi, v.wo);
            let fs = v.bsdf.evaluate_direction(&eq, &v.geom);

            debug_assert_eq!(v.pdf_d[self.transport_dir].measure, Measure::ProjectedSolidAngle);
            debug_assert_eq!(v.pdf_rr.measure, Measure::Discrete);
            alpha *= fs / v.pdf_d[self.transport_dir].v;
            alpha /= v.pdf_rr.v;
        }

        alpha
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::RandomSampler;
    use crate::testutil::two_quad_scene;

    #[test]
    fn test_eye_subpath_structure() {
        let scene = two_quad_scene();
        let mut sampler = RandomSampler::from_seed(1);
        let mut pool = VertexPool::new();

        for _ in 0..64 {
            let mut subpath = Subpath::new(TransportDirection::EL);
            subpath.sample(&scene, &mut sampler, &mut pool, 3, None);

            assert!(subpath.num_vertices() >= 1);
            let seed = subpath.vertex(&pool, 0);
            assert_eq!(seed.kind, PathVertexKind::EndPoint);
            assert!(seed.geom.degenerated);
            assert_eq!(seed.pdf_p.v, 1.0);
            // No reverse density at the endpoint
            assert!(seed.pdf_d[TransportDirection::LE].is_zero());

            for i in 1..subpath.num_vertices() {
                let v = subpath.vertex(&pool, i);
                assert_eq!(v.kind, PathVertexKind::IntermediatePoint);
                // wi points back along the previous wo
                let prev = subpath.vertex(&pool, i - 1);
                assert!((v.wi + prev.wo).length() < 1e-5);
            }
            pool.release_all();
        }
    }

    #[test]
    fn test_light_subpath_seed_pdf_includes_selection() {
        let scene = two_quad_scene();
        let mut sampler = RandomSampler::from_seed(2);
        let mut pool = VertexPool::new();

        let mut subpath = Subpath::new(TransportDirection::LE);
        subpath.sample(&scene, &mut sampler, &mut pool, 3, None);

        let seed = subpath.vertex(&pool, 0);
        assert!(!seed.geom.degenerated);
        assert!(seed.area_light.is_some());
        // One light with selection pdf 1, quad area 0.04
        assert!((seed.pdf_p.v - 25.0).abs() < 1e-3);
    }

    #[test]
    fn test_max_vertices_cap() {
        let scene = two_quad_scene();
        let mut sampler = RandomSampler::from_seed(3);
        let mut pool = VertexPool::new();

        for _ in 0..32 {
            let mut subpath = Subpath::new(TransportDirection::EL);
            subpath.sample(&scene, &mut sampler, &mut pool, 1000, Some(3));
            assert!(subpath.num_vertices() <= 3);
            pool.release_all();
        }
    }

    #[test]
    fn test_intermediate_vertex_pdfs_positive() {
        let scene = two_quad_scene();
        let mut sampler = RandomSampler::from_seed(4);
        let mut pool = VertexPool::new();

        let mut found_interior = false;
        for _ in 0..128 {
            let mut subpath = Subpath::new(TransportDirection::EL);
            subpath.sample(&scene, &mut sampler, &mut pool, 3, None);
            // Vertices that extended the path have positive forward PDFs
            for i in 0..subpath.num_vertices().saturating_sub(1) {
                let v = subpath.vertex(&pool, i);
                assert!(v.pdf_d[TransportDirection::EL].v > 0.0);
                assert!(v.pdf_rr.v > 0.0);
                if i >= 1 {
                    found_interior = true;
                    // Diffuse surfaces can be sampled from both sides
                    assert!(v.pdf_d[TransportDirection::LE].v >= 0.0);
                }
            }
            pool.release_all();
        }
        assert!(found_interior);
    }

    #[test]
    fn test_alpha_zero_vertices_is_one() {
        let scene = two_quad_scene();
        let mut sampler = RandomSampler::from_seed(5);
        let mut pool = VertexPool::new();
        let mut subpath = Subpath::new(TransportDirection::EL);
        subpath.sample(&scene, &mut sampler, &mut pool, 3, None);

        let mut raster = Vec2::ZERO;
        assert_eq!(subpath.evaluate_alpha(&pool, 0, &mut raster), Vec3::ONE);
    }

    #[test]
    fn test_alpha_establishes_raster() {
        let scene = two_quad_scene();
        let mut sampler = RandomSampler::from_seed(6);
        let mut pool = VertexPool::new();

        let mut subpath = Subpath::new(TransportDirection::EL);
        subpath.sample(&scene, &mut sampler, &mut pool, 3, None);

        let mut raster = Vec2::new(-1.0, -1.0);
        let alpha = subpath.evaluate_alpha(&pool, 1, &mut raster);
        // The camera's sampled direction always projects into the raster
        assert!(alpha != Vec3::ZERO);
        assert!((0.0..=1.0).contains(&raster.x));
        assert!((0.0..=1.0).contains(&raster.y));
    }
}
