//! Perfect specular reflector.

use lux_math::{cos_theta, reflect_z, Measure, PdfEval, Vec3, EPS_LARGE};

use crate::bsdf::{
    Bsdf, BsdfEvalQuery, BsdfSampleBidirResult, BsdfSampleQuery, BsdfSampleResult, BsdfType,
    GeneralizedBsdf, PerDirection,
};
use crate::geometry::{shading_normal_correction, SurfaceGeometry};

/// Perfect mirror. The directional support is the single reflected
/// direction, so the PDF is a delta coefficient (`1 / cos(theta_o)` in the
/// projected-solid-angle sense) and `evaluate_direction` is non-zero only
/// when `wo` coincides with the reflection of `wi`.
#[derive(Clone, Debug)]
pub struct MirrorBsdf {
    reflectance: Vec3,
}

impl MirrorBsdf {
    pub fn new(reflectance: Vec3) -> Self {
        Self { reflectance }
    }
}

fn matches_delta(local_wi: Vec3, local_wo: Vec3) -> bool {
    let d = reflect_z(local_wi) - local_wo;
    d.x.abs().max(d.y.abs()).max(d.z.abs()) <= EPS_LARGE
}

impl GeneralizedBsdf for MirrorBsdf {
    fn bsdf_types(&self) -> BsdfType {
        BsdfType::SPECULAR_REFLECTION
    }

    fn degenerated(&self) -> bool {
        true
    }

    fn sample_direction(
        &self,
        query: &BsdfSampleQuery,
        geom: &SurfaceGeometry,
    ) -> Option<BsdfSampleResult> {
        let local_wi = geom.world_to_shading(query.wi);
        if !query.ty.intersects(BsdfType::SPECULAR_REFLECTION) || cos_theta(local_wi) <= 0.0 {
            return None;
        }

        let local_wo = reflect_z(local_wi);
        Some(BsdfSampleResult {
            wo: geom.shading_to_world(local_wo),
            sampled_type: BsdfType::SPECULAR_REFLECTION,
            pdf: PdfEval::new(1.0 / cos_theta(local_wo), Measure::ProjectedSolidAngle),
        })
    }

    fn sample_and_estimate_direction(
        &self,
        query: &BsdfSampleQuery,
        geom: &SurfaceGeometry,
    ) -> Option<(BsdfSampleResult, Vec3)> {
        let result = self.sample_direction(query, geom)?;
        let local_wi = geom.world_to_shading(query.wi);
        let local_wo = geom.world_to_shading(result.wo);

        let sf = shading_normal_correction(
            query.transport_dir,
            geom,
            local_wi,
            local_wo,
            query.wi,
            result.wo,
        );
        if sf == 0.0 {
            return None;
        }

        // f / p = (R / cos(wo)) / (1 / cos(wo)) = R
        Some((result, self.reflectance * sf))
    }

    fn sample_and_estimate_direction_bidir(
        &self,
        query: &BsdfSampleQuery,
        geom: &SurfaceGeometry,
    ) -> Option<BsdfSampleBidirResult> {
        let result = self.sample_direction(query, geom)?;
        let local_wi = geom.world_to_shading(query.wi);
        let local_wo = geom.world_to_shading(result.wo);

        let dir = query.transport_dir;
        let mut pdf = PerDirection([PdfEval::default(); 2]);
        pdf[dir] = result.pdf;
        pdf[dir.opposite()] = result.pdf;

        let sf = shading_normal_correction(dir, geom, local_wi, local_wo, query.wi, result.wo);
        if sf == 0.0 {
            return None;
        }

        let sf_inv = shading_normal_correction(dir, geom, local_wi, local_wo, query.wi, result.wo);
        if sf_inv == 0.0 {
            return None;
        }

        let mut weight = PerDirection([Vec3::ZERO; 2]);
        weight[dir] = self.reflectance * sf;
        weight[dir.opposite()] = self.reflectance * sf_inv;

        Some(BsdfSampleBidirResult {
            wo: result.wo,
            sampled_type: result.sampled_type,
            pdf,
            weight,
        })
    }

    fn evaluate_direction(&self, query: &BsdfEvalQuery, geom: &SurfaceGeometry) -> Vec3 {
        let local_wi = geom.world_to_shading(query.wi);
        let local_wo = geom.world_to_shading(query.wo);
        if !query.ty.intersects(BsdfType::SPECULAR_REFLECTION)
            || cos_theta(local_wi) <= 0.0
            || cos_theta(local_wo) <= 0.0
            || !matches_delta(local_wi, local_wo)
        {
            return Vec3::ZERO;
        }

        let sf = shading_normal_correction(
            query.transport_dir,
            geom,
            local_wi,
            local_wo,
            query.wi,
            query.wo,
        );
        if sf == 0.0 {
            return Vec3::ZERO;
        }

        // f(wi, wo) = R / cos(theta)
        self.reflectance * (sf / cos_theta(local_wi))
    }

    fn evaluate_direction_pdf(&self, query: &BsdfEvalQuery, geom: &SurfaceGeometry) -> PdfEval {
        let local_wi = geom.world_to_shading(query.wi);
        let local_wo = geom.world_to_shading(query.wo);
        if !query.ty.intersects(BsdfType::SPECULAR_REFLECTION)
            || cos_theta(local_wi) <= 0.0
            || cos_theta(local_wo) <= 0.0
            || !matches_delta(local_wi, local_wo)
        {
            return PdfEval::zero(Measure::ProjectedSolidAngle);
        }

        PdfEval::new(1.0 / cos_theta(local_wi), Measure::ProjectedSolidAngle)
    }
}

impl Bsdf for MirrorBsdf {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bsdf::TransportDirection;
    use lux_math::Vec2;

    fn geom() -> SurfaceGeometry {
        SurfaceGeometry::on_surface(Vec3::ZERO, Vec3::Z, Vec3::Z, Vec2::ZERO)
    }

    fn query(wi: Vec3) -> BsdfSampleQuery {
        BsdfSampleQuery {
            sample: Vec2::ZERO,
            u_comp: 0.0,
            wi,
            ty: BsdfType::ALL,
            transport_dir: TransportDirection::EL,
        }
    }

    #[test]
    fn test_sample_is_mirror_reflection() {
        let bsdf = MirrorBsdf::new(Vec3::ONE);
        let g = geom();
        let wi = Vec3::new(0.0, 0.6, 0.8);
        let r = bsdf.sample_direction(&query(wi), &g).unwrap();
        assert!((r.wo - Vec3::new(0.0, -0.6, 0.8)).length() < 1e-5);
        assert_eq!(r.sampled_type, BsdfType::SPECULAR_REFLECTION);
        assert!((r.pdf.v - 1.0 / 0.8).abs() < 1e-4);
    }

    #[test]
    fn test_sample_fails_from_below() {
        let bsdf = MirrorBsdf::new(Vec3::ONE);
        let wi = Vec3::new(0.0, 0.6, -0.8);
        assert!(bsdf.sample_direction(&query(wi), &geom()).is_none());
    }

    #[test]
    fn test_evaluate_only_on_delta() {
        let bsdf = MirrorBsdf::new(Vec3::splat(0.9));
        let g = geom();
        let wi = Vec3::new(0.0, 0.6, 0.8);
        let wo = Vec3::new(0.0, -0.6, 0.8);

        let on = BsdfEvalQuery::new(BsdfType::ALL, TransportDirection::EL, wi, wo);
        let f = bsdf.evaluate_direction(&on, &g);
        assert!((f - Vec3::splat(0.9 / 0.8)).length() < 1e-3);
        assert!((bsdf.evaluate_direction_pdf(&on, &g).v - 1.0 / 0.8).abs() < 1e-4);

        let off = BsdfEvalQuery::new(
            BsdfType::ALL,
            TransportDirection::EL,
            wi,
            Vec3::new(0.1, -0.6, 0.79).normalize(),
        );
        assert_eq!(bsdf.evaluate_direction(&off, &g), Vec3::ZERO);
        assert!(bsdf.evaluate_direction_pdf(&off, &g).is_zero());
    }

    #[test]
    fn test_estimate_weight_is_reflectance() {
        let bsdf = MirrorBsdf::new(Vec3::new(0.8, 0.9, 1.0));
        let (_, w) = bsdf
            .sample_and_estimate_direction(&query(Vec3::new(0.0, 0.6, 0.8)), &geom())
            .unwrap();
        assert!((w - Vec3::new(0.8, 0.9, 1.0)).length() < 1e-5);
    }

    #[test]
    fn test_bidir_weights_match() {
        // Both directions carry the same weight for the perfect mirror
        let bsdf = MirrorBsdf::new(Vec3::splat(0.7));
        let r = bsdf
            .sample_and_estimate_direction_bidir(&query(Vec3::new(0.0, 0.6, 0.8)), &geom())
            .unwrap();
        assert_eq!(
            r.weight[TransportDirection::LE],
            r.weight[TransportDirection::EL]
        );
        assert_eq!(r.pdf[TransportDirection::LE], r.pdf[TransportDirection::EL]);
    }
}
