//! Pinhole-projective camera.

use lux_core::config::ConfigError;
use lux_math::{Mat4, Measure, PdfEval, Ray, Vec2, Vec3, Vec4, EPS_LARGE};

use crate::bsdf::{
    BsdfEvalQuery, BsdfSampleBidirResult, BsdfSampleQuery, BsdfSampleResult, BsdfType,
    GeneralizedBsdf, PerDirection, TransportDirection,
};
use crate::emitter::{Camera, Emitter, EmitterPrimitiveData};
use crate::geometry::SurfaceGeometry;

/// Perspective (pinhole) camera.
///
/// The positional distribution is a Dirac at the pinhole. The directional
/// component maps a 2-D sample to a raster position in `[-1, 1]^2` and
/// through the inverse projection to a camera-space direction; the
/// projected-solid-angle density of that map is the sensor importance
/// `W_e = 1 / (A cos^3 theta)` where `A` is the unit-distance sensor area.
pub struct PerspectiveCamera {
    position: Vec3,
    view: Mat4,
    inv_view: Mat4,
    proj: Mat4,
    inv_proj: Mat4,
    inv_a: f32,
}

impl PerspectiveCamera {
    /// Create a camera from a vertical field of view (degrees) and the
    /// aspect ratio of its film. The view transform is the identity until
    /// the camera is registered to its primitive.
    pub fn new(fovy_deg: f32, aspect: f32) -> Self {
        let proj = Mat4::perspective_rh_gl(fovy_deg.to_radians(), aspect, 1.0, 1000.0);
        let inv_proj = proj.inverse();

        // Unit-distance sensor area from the inverse projection
        let p1 = inv_proj * Vec4::new(-1.0, -1.0, 0.0, 1.0);
        let p2 = inv_proj * Vec4::new(1.0, 1.0, 0.0, 1.0);
        let c1 = p1.truncate() / p1.w;
        let c2 = p2.truncate() / p2.w;
        let c1 = c1 / c1.z;
        let c2 = c2 / c2.z;
        let a = (c2.x - c1.x) * (c2.y - c1.y);

        Self {
            position: Vec3::ZERO,
            view: Mat4::IDENTITY,
            inv_view: Mat4::IDENTITY,
            proj,
            inv_proj,
            inv_a: 1.0 / a,
        }
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Sensor importance for a direction making angle `theta` with the
    /// optical axis: `1 / (A cos^3 theta)`.
    ///
    /// `cos` within `EPS_LARGE` of one is clamped to one, otherwise the
    /// cubed reciprocal amplifies representation error near the axis.
    fn evaluate_importance(&self, mut cos_theta: f32) -> f32 {
        if cos_theta <= 0.0 {
            // Behind the camera
            return 0.0;
        }
        if (cos_theta - 1.0).abs() < EPS_LARGE {
            cos_theta = 1.0;
        }
        let inv = 1.0 / cos_theta;
        self.inv_a * inv * inv * inv
    }

    /// Camera-space direction for a raster position in `[0, 1]^2`.
    fn raster_to_camera_dir(&self, raster: Vec2) -> Vec3 {
        let ndc = raster * 2.0 - Vec2::ONE;
        let d4 = self.inv_proj * Vec4::new(ndc.x, ndc.y, 0.0, 1.0);
        (d4.truncate() / d4.w).normalize()
    }

    /// Project a world-space point offset into raster coordinates.
    fn project(&self, p: Vec3, d: Vec3) -> Option<(Vec2, Vec3)> {
        let ref_cam = self.view * (p + d).extend(1.0);
        let ref_ndc = self.proj * ref_cam;
        if ref_ndc.w == 0.0 {
            return None;
        }
        let ndc = ref_ndc.truncate() / ref_ndc.w;
        let raster = (Vec2::new(ndc.x, ndc.y) + Vec2::ONE) / 2.0;
        if raster.x < 0.0 || raster.x > 1.0 || raster.y < 0.0 || raster.y > 1.0 {
            return None;
        }
        Some((raster, ref_cam.truncate()))
    }
}

impl GeneralizedBsdf for PerspectiveCamera {
    fn bsdf_types(&self) -> BsdfType {
        BsdfType::NON_DELTA_EYE_DIRECTION
    }

    fn sample_direction(
        &self,
        query: &BsdfSampleQuery,
        _geom: &SurfaceGeometry,
    ) -> Option<BsdfSampleResult> {
        if !query.ty.intersects(self.bsdf_types())
            || query.transport_dir != TransportDirection::EL
        {
            return None;
        }

        let dir_cam = self.raster_to_camera_dir(query.sample);
        let wo = self
            .inv_view
            .transform_vector3(dir_cam)
            .normalize();

        Some(BsdfSampleResult {
            wo,
            sampled_type: BsdfType::NON_DELTA_EYE_DIRECTION,
            // The camera looks down -z in camera space
            pdf: PdfEval::new(
                self.evaluate_importance(-dir_cam.z),
                Measure::ProjectedSolidAngle,
            ),
        })
    }

    fn sample_and_estimate_direction(
        &self,
        query: &BsdfSampleQuery,
        geom: &SurfaceGeometry,
    ) -> Option<(BsdfSampleResult, Vec3)> {
        // W_e / p_{sigma-perp} = 1 by construction
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
        pdf[dir.opposite()] = PdfEval::zero(Measure::ProjectedSolidAngle);

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
        if !query.ty.intersects(self.bsdf_types())
            || query.transport_dir != TransportDirection::EL
        {
            return Vec3::ZERO;
        }
        match self.project(geom.p, query.wo) {
            Some((_, ref_cam)) => {
                Vec3::splat(self.evaluate_importance(-ref_cam.normalize().z))
            }
            None => Vec3::ZERO,
        }
    }

    fn evaluate_direction_pdf(&self, query: &BsdfEvalQuery, geom: &SurfaceGeometry) -> PdfEval {
        if !query.ty.intersects(self.bsdf_types())
            || query.transport_dir != TransportDirection::EL
        {
            return PdfEval::zero(Measure::ProjectedSolidAngle);
        }
        match self.project(geom.p, query.wo) {
            Some((_, ref_cam)) => PdfEval::new(
                self.evaluate_importance(-ref_cam.normalize().z),
                Measure::ProjectedSolidAngle,
            ),
            None => PdfEval::zero(Measure::ProjectedSolidAngle),
        }
    }
}

impl Emitter for PerspectiveCamera {
    fn sample_position(&self, _sample: Vec2) -> (SurfaceGeometry, PdfEval) {
        (
            SurfaceGeometry::degenerate(self.position),
            PdfEval::new(1.0, Measure::Area),
        )
    }

    fn evaluate_position(&self, _geom: &SurfaceGeometry) -> Vec3 {
        Vec3::ONE
    }

    fn evaluate_position_pdf(&self, _geom: &SurfaceGeometry) -> PdfEval {
        PdfEval::new(1.0, Measure::Area)
    }

    fn register_primitives(
        &mut self,
        primitives: &[EmitterPrimitiveData],
    ) -> Result<(), ConfigError> {
        debug_assert_eq!(primitives.len(), 1);
        let prim = primitives.first().ok_or_else(|| ConfigError::InvalidScene {
            reason: "camera is not attached to any primitive".into(),
        })?;

        // The primitive transform is the view matrix
        self.view = prim.transform;
        self.inv_view = self.view.inverse();
        self.position = self.inv_view.transform_point3(Vec3::ZERO);
        Ok(())
    }
}

impl Camera for PerspectiveCamera {
    fn ray_to_raster(&self, p: Vec3, d: Vec3) -> Option<Vec2> {
        self.project(p, d).map(|(raster, _)| raster)
    }

    fn raster_to_ray(&self, raster: Vec2) -> Ray {
        let dir_cam = self.raster_to_camera_dir(raster);
        let d = self.inv_view.transform_vector3(dir_cam).normalize();
        Ray::new(self.position, d, 0.0, f32::INFINITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn look_at_camera() -> PerspectiveCamera {
        let mut camera = PerspectiveCamera::new(45.0, 1.0);
        let view = Mat4::look_at_rh(
            Vec3::new(0.0, 0.1, 0.3),
            Vec3::new(0.0, 0.1, 0.0),
            Vec3::Y,
        );
        camera
            .register_primitives(&[EmitterPrimitiveData {
                transform: view,
                mesh: None,
            }])
            .unwrap();
        camera
    }

    fn sample_query(raster: Vec2) -> BsdfSampleQuery {
        BsdfSampleQuery {
            sample: raster,
            u_comp: 0.0,
            wi: Vec3::ZERO,
            ty: BsdfType::ALL_EMITTER,
            transport_dir: TransportDirection::EL,
        }
    }

    #[test]
    fn test_position_is_degenerate() {
        let camera = look_at_camera();
        let (geom, pdf) = camera.sample_position(Vec2::splat(0.5));
        assert!(geom.degenerated);
        assert!((geom.p - Vec3::new(0.0, 0.1, 0.3)).length() < 1e-5);
        assert_eq!(pdf.measure, Measure::Area);
        assert_eq!(pdf.v, 1.0);
    }

    #[test]
    fn test_center_ray_points_forward() {
        let camera = look_at_camera();
        let (geom, _) = camera.sample_position(Vec2::ZERO);
        let r = camera
            .sample_direction(&sample_query(Vec2::splat(0.5)), &geom)
            .unwrap();
        // Looking from (0,0.1,0.3) toward (0,0.1,0): -Z
        assert!((r.wo - -Vec3::Z).length() < 1e-4);
        // On-axis importance is 1/A
        assert!((r.pdf.v - camera.inv_a).abs() / camera.inv_a < 1e-3);
    }

    #[test]
    fn test_raster_roundtrip() {
        let camera = look_at_camera();
        let (geom, _) = camera.sample_position(Vec2::ZERO);
        for raster in [
            Vec2::new(0.5, 0.5),
            Vec2::new(0.25, 0.75),
            Vec2::new(0.9, 0.1),
        ] {
            let r = camera.sample_direction(&sample_query(raster), &geom).unwrap();
            let back = camera.ray_to_raster(geom.p, r.wo).unwrap();
            assert!((back - raster).length() < EPS_LARGE);
        }
    }

    #[test]
    fn test_outside_raster_evaluates_zero() {
        let camera = look_at_camera();
        let (geom, _) = camera.sample_position(Vec2::ZERO);
        // Behind the camera
        let q = BsdfEvalQuery::new(
            BsdfType::ALL,
            TransportDirection::EL,
            Vec3::ZERO,
            Vec3::Z,
        );
        assert_eq!(camera.evaluate_direction(&q, &geom), Vec3::ZERO);
        assert!(camera.evaluate_direction_pdf(&q, &geom).is_zero());
    }

    #[test]
    fn test_wrong_transport_direction_fails() {
        let camera = look_at_camera();
        let (geom, _) = camera.sample_position(Vec2::ZERO);
        let mut q = sample_query(Vec2::splat(0.5));
        q.transport_dir = TransportDirection::LE;
        assert!(camera.sample_direction(&q, &geom).is_none());
    }

    #[test]
    fn test_sampled_pdf_matches_geometry() {
        // The sampled density must equal 1 / (A cos^3 theta) with the
        // angle measured against the optical axis.
        let camera = look_at_camera();
        let (geom, _) = camera.sample_position(Vec2::ZERO);
        let forward = camera.inv_view.transform_vector3(-Vec3::Z).normalize();
        for raster in [Vec2::new(0.2, 0.8), Vec2::new(0.7, 0.3), Vec2::new(0.05, 0.5)] {
            let r = camera.sample_direction(&sample_query(raster), &geom).unwrap();
            let cos = r.wo.dot(forward);
            let expected = camera.inv_a / (cos * cos * cos);
            assert!((r.pdf.v - expected).abs() / expected < 1e-3);
        }
    }

    #[test]
    fn test_importance_normalization() {
        // Quadrature of W_e over the solid angle subtended by the sensor:
        // per raster cell, the subtended solid angle is approximated from
        // finite-difference tangents of the raster-to-direction map.
        let camera = look_at_camera();
        let n = 128;
        let h = 1.0 / n as f32;
        let mut integral = 0.0;
        for i in 0..n {
            for j in 0..n {
                let r = Vec2::new((i as f32 + 0.5) * h, (j as f32 + 0.5) * h);
                let d = camera.raster_to_camera_dir(r);
                let du = camera.raster_to_camera_dir(r + Vec2::new(h, 0.0)) - d;
                let dv = camera.raster_to_camera_dir(r + Vec2::new(0.0, h)) - d;
                let domega = du.cross(dv).length();
                integral += camera.evaluate_importance(-d.z) * domega;
            }
        }
        assert!((integral - 1.0).abs() < 0.02, "integral = {integral}");
    }
}
