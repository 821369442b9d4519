//! Light emitters: area, point, directional and environment lights.

use std::f32::consts::PI;

use lux_core::config::ConfigError;
use lux_math::{
    cos_theta, cosine_sample_hemisphere, uniform_sample_sphere, uniform_sample_triangle, Aabb,
    DiscreteDistribution1D, Measure, PdfEval, Vec2, Vec3, EPS_LARGE, INV_PI,
};

use crate::bsdf::{
    BsdfEvalQuery, BsdfSampleBidirResult, BsdfSampleQuery, BsdfSampleResult, BsdfType,
    GeneralizedBsdf, PerDirection, TransportDirection,
};
use crate::emitter::{Emitter, EmitterPrimitiveData, EmitterShape, Light};
use crate::geometry::SurfaceGeometry;

fn zero_psa() -> PdfEval {
    PdfEval::zero(Measure::ProjectedSolidAngle)
}

// --------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct LightTriangle {
    p: [Vec3; 3],
    n: Vec3,
}

/// Diffuse area light bound to the mesh of its owning primitives.
///
/// Emission factors as `Le = Le0 * Le1` with `Le0 = L * pi` (positional)
/// and `Le1 = 1/pi` (directional), so the emitted radiance along any
/// direction in the upper hemisphere is the configured luminance.
pub struct AreaLight {
    luminance: Vec3,
    triangles: Vec<LightTriangle>,
    dist: DiscreteDistribution1D,
    total_area: f32,
}

impl AreaLight {
    pub fn new(luminance: Vec3) -> Self {
        Self {
            luminance,
            triangles: Vec::new(),
            dist: DiscreteDistribution1D::new(),
            total_area: 0.0,
        }
    }

    pub fn total_area(&self) -> f32 {
        self.total_area
    }
}

impl GeneralizedBsdf for AreaLight {
    fn bsdf_types(&self) -> BsdfType {
        BsdfType::LIGHT_DIRECTION
    }

    fn sample_direction(
        &self,
        query: &BsdfSampleQuery,
        geom: &SurfaceGeometry,
    ) -> Option<BsdfSampleResult> {
        if !query.ty.intersects(BsdfType::LIGHT_DIRECTION)
            || query.transport_dir != TransportDirection::LE
        {
            return None;
        }

        // Cosine-weighted about the geometric normal (sn == gn here)
        let local_wo = cosine_sample_hemisphere(query.sample);
        Some(BsdfSampleResult {
            wo: geom.shading_to_world(local_wo),
            sampled_type: BsdfType::LIGHT_DIRECTION,
            pdf: PdfEval::new(INV_PI, Measure::ProjectedSolidAngle),
        })
    }

    fn sample_and_estimate_direction(
        &self,
        query: &BsdfSampleQuery,
        geom: &SurfaceGeometry,
    ) -> Option<(BsdfSampleResult, Vec3)> {
        // Le1 / p = (1/pi) / (1/pi) = 1
        let result = self.sample_direction(query, geom)?;
        Some((result, Vec3::ONE))
    }

    fn sample_and_estimate_direction_bidir(
        &self,
        query: &BsdfSampleQuery,
        geom: &SurfaceGeometry,
    ) -> Option<BsdfSampleBidirResult> {
        let result = self.sample_direction(query, geom)?;
        let dir = query.transport_dir;

        let mut pdf = PerDirection([PdfEval::default(); 2]);
        pdf[dir] = result.pdf;
        pdf[dir.opposite()] = zero_psa();

        let mut weight = PerDirection([Vec3::ZERO; 2]);
        weight[dir] = Vec3::ONE;

        Some(BsdfSampleBidirResult {
            wo: result.wo,
            sampled_type: result.sampled_type,
            pdf,
            weight,
        })
    }

    fn evaluate_direction(&self, query: &BsdfEvalQuery, geom: &SurfaceGeometry) -> Vec3 {
        if !query.ty.intersects(BsdfType::LIGHT_DIRECTION)
            || query.transport_dir != TransportDirection::LE
            || cos_theta(geom.world_to_shading(query.wo)) <= 0.0
        {
            return Vec3::ZERO;
        }
        Vec3::splat(INV_PI)
    }

    fn evaluate_direction_pdf(&self, query: &BsdfEvalQuery, geom: &SurfaceGeometry) -> PdfEval {
        if !query.ty.intersects(BsdfType::LIGHT_DIRECTION)
            || query.transport_dir != TransportDirection::LE
            || cos_theta(geom.world_to_shading(query.wo)) <= 0.0
        {
            return zero_psa();
        }
        PdfEval::new(INV_PI, Measure::ProjectedSolidAngle)
    }
}

impl Emitter for AreaLight {
    fn sample_position(&self, sample: Vec2) -> (SurfaceGeometry, PdfEval) {
        debug_assert!(!self.triangles.is_empty());
        let (i, u) = self.dist.sample_remap(sample.x);
        let tri = &self.triangles[i];
        let b = uniform_sample_triangle(Vec2::new(u, sample.y));
        let p = tri.p[0] * (1.0 - b.x - b.y) + tri.p[1] * b.x + tri.p[2] * b.y;
        let geom = SurfaceGeometry::on_surface(p, tri.n, tri.n, Vec2::ZERO);
        (geom, PdfEval::new(1.0 / self.total_area, Measure::Area))
    }

    fn evaluate_position(&self, _geom: &SurfaceGeometry) -> Vec3 {
        self.luminance * PI
    }

    fn evaluate_position_pdf(&self, _geom: &SurfaceGeometry) -> PdfEval {
        PdfEval::new(1.0 / self.total_area, Measure::Area)
    }

    fn register_primitives(
        &mut self,
        primitives: &[EmitterPrimitiveData],
    ) -> Result<(), ConfigError> {
        self.triangles.clear();
        self.dist.clear();
        self.total_area = 0.0;

        for prim in primitives {
            let mesh = prim.mesh.as_ref().ok_or_else(|| ConfigError::InvalidScene {
                reason: "area light requires a primitive with a mesh".into(),
            })?;
            for face in 0..mesh.num_faces() {
                let p = mesh.face_positions(face);
                let c = (p[1] - p[0]).cross(p[2] - p[0]);
                let area = 0.5 * c.length();
                if area == 0.0 {
                    continue;
                }
                self.triangles.push(LightTriangle {
                    p,
                    n: c.normalize(),
                });
                self.dist.add(area);
                self.total_area += area;
            }
        }

        if self.triangles.is_empty() {
            return Err(ConfigError::InvalidScene {
                reason: "area light mesh has no non-degenerate triangles".into(),
            });
        }
        self.dist.normalize();
        log::debug!(
            "area light: {} triangles, total area {}",
            self.triangles.len(),
            self.total_area
        );
        Ok(())
    }
}

impl Light for AreaLight {}

// --------------------------------------------------------------------------------

/// Point light with isotropic intensity and a Dirac positional density.
pub struct PointLight {
    intensity: Vec3,
    position: Vec3,
}

impl PointLight {
    pub fn new(intensity: Vec3) -> Self {
        Self {
            intensity,
            position: Vec3::ZERO,
        }
    }
}

impl GeneralizedBsdf for PointLight {
    fn bsdf_types(&self) -> BsdfType {
        BsdfType::LIGHT_DIRECTION
    }

    fn sample_direction(
        &self,
        query: &BsdfSampleQuery,
        _geom: &SurfaceGeometry,
    ) -> Option<BsdfSampleResult> {
        if !query.ty.intersects(BsdfType::LIGHT_DIRECTION)
            || query.transport_dir != TransportDirection::LE
        {
            return None;
        }
        Some(BsdfSampleResult {
            wo: uniform_sample_sphere(query.sample),
            sampled_type: BsdfType::LIGHT_DIRECTION,
            // Solid-angle value; the geometry is degenerate so there is no
            // cosine to project
            pdf: PdfEval::new(1.0 / (4.0 * PI), Measure::ProjectedSolidAngle),
        })
    }

    fn sample_and_estimate_direction(
        &self,
        query: &BsdfSampleQuery,
        geom: &SurfaceGeometry,
    ) -> Option<(BsdfSampleResult, Vec3)> {
        let result = self.sample_direction(query, geom)?;
        Some((result, Vec3::splat(4.0 * PI)))
    }

    fn sample_and_estimate_direction_bidir(
        &self,
        query: &BsdfSampleQuery,
        geom: &SurfaceGeometry,
    ) -> Option<BsdfSampleBidirResult> {
        let result = self.sample_direction(query, geom)?;
        let dir = query.transport_dir;

        let mut pdf = PerDirection([PdfEval::default(); 2]);
        pdf[dir] = result.pdf;
        pdf[dir.opposite()] = zero_psa();

        let mut weight = PerDirection([Vec3::ZERO; 2]);
        weight[dir] = Vec3::splat(4.0 * PI);

        Some(BsdfSampleBidirResult {
            wo: result.wo,
            sampled_type: result.sampled_type,
            pdf,
            weight,
        })
    }

    fn evaluate_direction(&self, query: &BsdfEvalQuery, _geom: &SurfaceGeometry) -> Vec3 {
        if !query.ty.intersects(BsdfType::LIGHT_DIRECTION)
            || query.transport_dir != TransportDirection::LE
        {
            return Vec3::ZERO;
        }
        Vec3::ONE
    }

    fn evaluate_direction_pdf(&self, query: &BsdfEvalQuery, _geom: &SurfaceGeometry) -> PdfEval {
        if !query.ty.intersects(BsdfType::LIGHT_DIRECTION)
            || query.transport_dir != TransportDirection::LE
        {
            return zero_psa();
        }
        PdfEval::new(1.0 / (4.0 * PI), Measure::ProjectedSolidAngle)
    }
}

impl Emitter for PointLight {
    fn sample_position(&self, _sample: Vec2) -> (SurfaceGeometry, PdfEval) {
        (
            SurfaceGeometry::degenerate(self.position),
            PdfEval::new(1.0, Measure::Area),
        )
    }

    fn evaluate_position(&self, _geom: &SurfaceGeometry) -> Vec3 {
        self.intensity
    }

    fn evaluate_position_pdf(&self, _geom: &SurfaceGeometry) -> PdfEval {
        // Subpaths never land on a point light
        PdfEval::zero(Measure::Area)
    }

    fn register_primitives(
        &mut self,
        primitives: &[EmitterPrimitiveData],
    ) -> Result<(), ConfigError> {
        let prim = primitives.first().ok_or_else(|| ConfigError::InvalidScene {
            reason: "point light is not attached to any primitive".into(),
        })?;
        self.position = prim.transform.transform_point3(Vec3::ZERO);
        Ok(())
    }
}

impl Light for PointLight {}

// --------------------------------------------------------------------------------

/// Directional light: a delta direction carrying constant irradiance.
///
/// Positions are sampled on the disk of the scene bounding sphere facing
/// the emission direction, so every point of the scene can receive the
/// light; `post_configure` supplies the bounds.
pub struct DirectionalLight {
    irradiance: Vec3,
    direction: Vec3,
    center: Vec3,
    radius: f32,
}

impl DirectionalLight {
    pub fn new(irradiance: Vec3, direction: Vec3) -> Self {
        Self {
            irradiance,
            direction: direction.normalize(),
            center: Vec3::ZERO,
            radius: 1.0,
        }
    }
}

impl GeneralizedBsdf for DirectionalLight {
    fn bsdf_types(&self) -> BsdfType {
        BsdfType::LIGHT_DIRECTION
    }

    fn degenerated(&self) -> bool {
        true
    }

    fn sample_direction(
        &self,
        query: &BsdfSampleQuery,
        _geom: &SurfaceGeometry,
    ) -> Option<BsdfSampleResult> {
        if !query.ty.intersects(BsdfType::LIGHT_DIRECTION)
            || query.transport_dir != TransportDirection::LE
        {
            return None;
        }
        Some(BsdfSampleResult {
            wo: self.direction,
            sampled_type: BsdfType::LIGHT_DIRECTION,
            pdf: PdfEval::new(1.0, Measure::ProjectedSolidAngle),
        })
    }

    fn sample_and_estimate_direction(
        &self,
        query: &BsdfSampleQuery,
        geom: &SurfaceGeometry,
    ) -> Option<(BsdfSampleResult, Vec3)> {
        let result = self.sample_direction(query, geom)?;
        Some((result, Vec3::ONE))
    }

    fn sample_and_estimate_direction_bidir(
        &self,
        query: &BsdfSampleQuery,
        geom: &SurfaceGeometry,
    ) -> Option<BsdfSampleBidirResult> {
        let result = self.sample_direction(query, geom)?;
        let dir = query.transport_dir;

        let mut pdf = PerDirection([PdfEval::default(); 2]);
        pdf[dir] = result.pdf;
        pdf[dir.opposite()] = zero_psa();

        let mut weight = PerDirection([Vec3::ZERO; 2]);
        weight[dir] = Vec3::ONE;

        Some(BsdfSampleBidirResult {
            wo: result.wo,
            sampled_type: result.sampled_type,
            pdf,
            weight,
        })
    }

    fn evaluate_direction(&self, query: &BsdfEvalQuery, _geom: &SurfaceGeometry) -> Vec3 {
        if !query.ty.intersects(BsdfType::LIGHT_DIRECTION)
            || query.transport_dir != TransportDirection::LE
            || query.wo.dot(self.direction) < 1.0 - EPS_LARGE
        {
            return Vec3::ZERO;
        }
        Vec3::ONE
    }

    fn evaluate_direction_pdf(&self, query: &BsdfEvalQuery, _geom: &SurfaceGeometry) -> PdfEval {
        if !query.ty.intersects(BsdfType::LIGHT_DIRECTION)
            || query.transport_dir != TransportDirection::LE
            || query.wo.dot(self.direction) < 1.0 - EPS_LARGE
        {
            return zero_psa();
        }
        PdfEval::new(1.0, Measure::ProjectedSolidAngle)
    }
}

impl Emitter for DirectionalLight {
    fn sample_position(&self, sample: Vec2) -> (SurfaceGeometry, PdfEval) {
        // Concentric-free polar disk sample on the source-side disk of the
        // bounding sphere
        let r = sample.x.sqrt() * self.radius;
        let phi = 2.0 * PI * sample.y;
        let frame = lux_math::Frame::from_normal(self.direction);
        let offset = frame.to_world(Vec3::new(r * phi.cos(), r * phi.sin(), 0.0));
        let p = self.center - self.direction * self.radius + offset;
        let geom = SurfaceGeometry::on_surface(p, self.direction, self.direction, Vec2::ZERO);
        (
            geom,
            PdfEval::new(1.0 / (PI * self.radius * self.radius), Measure::Area),
        )
    }

    fn evaluate_position(&self, _geom: &SurfaceGeometry) -> Vec3 {
        self.irradiance
    }

    fn evaluate_position_pdf(&self, _geom: &SurfaceGeometry) -> PdfEval {
        PdfEval::zero(Measure::Area)
    }

    fn register_primitives(
        &mut self,
        _primitives: &[EmitterPrimitiveData],
    ) -> Result<(), ConfigError> {
        Ok(())
    }

    fn post_configure(&mut self, world_bounds: &Aabb) {
        if world_bounds.is_valid() {
            self.center = world_bounds.centroid();
            self.radius = 0.5 * world_bounds.extent().length() * 1.01 + EPS_LARGE;
        }
    }
}

impl Light for DirectionalLight {}

// --------------------------------------------------------------------------------

/// Environment light with constant luminance.
///
/// Owns an intersectable bounding sphere so subpaths that leave the scene
/// can still land on the emitter, which lets BPT treat its directional
/// sampling as sampling a point on the bounding shape.
pub struct EnvironmentLight {
    luminance: Vec3,
    center: Vec3,
    radius: f32,
}

impl EnvironmentLight {
    pub fn new(luminance: Vec3) -> Self {
        Self {
            luminance,
            center: Vec3::ZERO,
            radius: 1.0,
        }
    }
}

impl GeneralizedBsdf for EnvironmentLight {
    fn bsdf_types(&self) -> BsdfType {
        BsdfType::LIGHT_DIRECTION
    }

    fn sample_direction(
        &self,
        query: &BsdfSampleQuery,
        geom: &SurfaceGeometry,
    ) -> Option<BsdfSampleResult> {
        if !query.ty.intersects(BsdfType::LIGHT_DIRECTION)
            || query.transport_dir != TransportDirection::LE
        {
            return None;
        }
        // Cosine-weighted about the inward normal of the bounding sphere
        let local_wo = cosine_sample_hemisphere(query.sample);
        Some(BsdfSampleResult {
            wo: geom.shading_to_world(local_wo),
            sampled_type: BsdfType::LIGHT_DIRECTION,
            pdf: PdfEval::new(INV_PI, Measure::ProjectedSolidAngle),
        })
    }

    fn sample_and_estimate_direction(
        &self,
        query: &BsdfSampleQuery,
        geom: &SurfaceGeometry,
    ) -> Option<(BsdfSampleResult, Vec3)> {
        let result = self.sample_direction(query, geom)?;
        Some((result, Vec3::ONE))
    }

    fn sample_and_estimate_direction_bidir(
        &self,
        query: &BsdfSampleQuery,
        geom: &SurfaceGeometry,
    ) -> Option<BsdfSampleBidirResult> {
        let result = self.sample_direction(query, geom)?;
        let dir = query.transport_dir;

        let mut pdf = PerDirection([PdfEval::default(); 2]);
        pdf[dir] = result.pdf;
        pdf[dir.opposite()] = zero_psa();

        let mut weight = PerDirection([Vec3::ZERO; 2]);
        weight[dir] = Vec3::ONE;

        Some(BsdfSampleBidirResult {
            wo: result.wo,
            sampled_type: result.sampled_type,
            pdf,
            weight,
        })
    }

    fn evaluate_direction(&self, query: &BsdfEvalQuery, geom: &SurfaceGeometry) -> Vec3 {
        if !query.ty.intersects(BsdfType::LIGHT_DIRECTION)
            || query.transport_dir != TransportDirection::LE
            || cos_theta(geom.world_to_shading(query.wo)) <= 0.0
        {
            return Vec3::ZERO;
        }
        Vec3::splat(INV_PI)
    }

    fn evaluate_direction_pdf(&self, query: &BsdfEvalQuery, geom: &SurfaceGeometry) -> PdfEval {
        if !query.ty.intersects(BsdfType::LIGHT_DIRECTION)
            || query.transport_dir != TransportDirection::LE
            || cos_theta(geom.world_to_shading(query.wo)) <= 0.0
        {
            return zero_psa();
        }
        PdfEval::new(INV_PI, Measure::ProjectedSolidAngle)
    }
}

impl Emitter for EnvironmentLight {
    fn sample_position(&self, sample: Vec2) -> (SurfaceGeometry, PdfEval) {
        let outward = uniform_sample_sphere(sample);
        let p = self.center + outward * self.radius;
        let inward = -outward;
        let geom = SurfaceGeometry::on_surface(p, inward, inward, Vec2::ZERO);
        (
            geom,
            PdfEval::new(
                1.0 / (4.0 * PI * self.radius * self.radius),
                Measure::Area,
            ),
        )
    }

    fn evaluate_position(&self, _geom: &SurfaceGeometry) -> Vec3 {
        self.luminance * PI
    }

    fn evaluate_position_pdf(&self, _geom: &SurfaceGeometry) -> PdfEval {
        PdfEval::new(
            1.0 / (4.0 * PI * self.radius * self.radius),
            Measure::Area,
        )
    }

    fn register_primitives(
        &mut self,
        _primitives: &[EmitterPrimitiveData],
    ) -> Result<(), ConfigError> {
        Ok(())
    }

    fn post_configure(&mut self, world_bounds: &Aabb) {
        if world_bounds.is_valid() {
            self.center = world_bounds.centroid();
            self.radius = 0.5 * world_bounds.extent().length() * 1.05 + EPS_LARGE;
        }
    }

    fn emitter_shape(&self) -> Option<EmitterShape> {
        Some(EmitterShape {
            center: self.center,
            radius: self.radius,
        })
    }
}

impl Light for EnvironmentLight {}
