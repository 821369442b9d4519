//! Lambertian reflector.

use lux_math::{cos_theta, cosine_sample_hemisphere, Measure, PdfEval, Vec3, INV_PI};

use crate::bsdf::{
    Bsdf, BsdfEvalQuery, BsdfSampleBidirResult, BsdfSampleQuery, BsdfSampleResult, BsdfType,
    GeneralizedBsdf, PerDirection,
};
use crate::geometry::{shading_normal_correction, SurfaceGeometry};

/// Ideal diffuse reflector: `f = R / pi` with cosine-weighted sampling on
/// the shading frame, so the projected-solid-angle PDF is `1 / pi`.
#[derive(Clone, Debug)]
pub struct DiffuseBsdf {
    reflectance: Vec3,
}

impl DiffuseBsdf {
    pub fn new(reflectance: Vec3) -> Self {
        Self { reflectance }
    }
}

impl GeneralizedBsdf for DiffuseBsdf {
    fn bsdf_types(&self) -> BsdfType {
        BsdfType::DIFFUSE_REFLECTION
    }

    fn sample_direction(
        &self,
        query: &BsdfSampleQuery,
        geom: &SurfaceGeometry,
    ) -> Option<BsdfSampleResult> {
        let local_wi = geom.world_to_shading(query.wi);
        if !query.ty.intersects(BsdfType::DIFFUSE_REFLECTION) || cos_theta(local_wi) <= 0.0 {
            return None;
        }

        let local_wo = cosine_sample_hemisphere(query.sample);
        if cos_theta(local_wo) <= 0.0 {
            return None;
        }

        Some(BsdfSampleResult {
            wo: geom.shading_to_world(local_wo),
            sampled_type: BsdfType::DIFFUSE_REFLECTION,
            // cos / pi in solid angle = 1 / pi projected
            pdf: PdfEval::new(INV_PI, Measure::ProjectedSolidAngle),
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

        // f * cos / p = (R/pi) / (1/pi) = R
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
        let sf = shading_normal_correction(dir, geom, local_wi, local_wo, query.wi, result.wo);
        if sf == 0.0 {
            return None;
        }
        let sf_inv = shading_normal_correction(
            dir.opposite(),
            geom,
            local_wo,
            local_wi,
            result.wo,
            query.wi,
        );
        if sf_inv == 0.0 {
            return None;
        }

        let mut pdf = PerDirection([PdfEval::default(); 2]);
        // Cosine sampling is symmetric in wi/wo
        pdf[dir] = result.pdf;
        pdf[dir.opposite()] = result.pdf;

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
        if !query.ty.intersects(BsdfType::DIFFUSE_REFLECTION)
            || cos_theta(local_wi) <= 0.0
            || cos_theta(local_wo) <= 0.0
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

        self.reflectance * (INV_PI * sf)
    }

    fn evaluate_direction_pdf(&self, query: &BsdfEvalQuery, geom: &SurfaceGeometry) -> PdfEval {
        let local_wi = geom.world_to_shading(query.wi);
        let local_wo = geom.world_to_shading(query.wo);
        if !query.ty.intersects(BsdfType::DIFFUSE_REFLECTION)
            || cos_theta(local_wi) <= 0.0
            || cos_theta(local_wo) <= 0.0
        {
            return PdfEval::zero(Measure::ProjectedSolidAngle);
        }
        PdfEval::new(INV_PI, Measure::ProjectedSolidAngle)
    }
}

impl Bsdf for DiffuseBsdf {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bsdf::TransportDirection;
    use lux_math::{Vec2, EPS_LARGE};

    fn geom() -> SurfaceGeometry {
        SurfaceGeometry::on_surface(Vec3::ZERO, Vec3::Z, Vec3::Z, Vec2::ZERO)
    }

    fn query(sample: Vec2) -> BsdfSampleQuery {
        BsdfSampleQuery {
            sample,
            u_comp: 0.0,
            wi: Vec3::new(0.0, 0.6, 0.8),
            ty: BsdfType::ALL,
            transport_dir: TransportDirection::EL,
        }
    }

    #[test]
    fn test_sample_upper_hemisphere() {
        let bsdf = DiffuseBsdf::new(Vec3::splat(0.8));
        let g = geom();
        for i in 0..8 {
            for j in 0..8 {
                let u = Vec2::new((i as f32 + 0.5) / 8.0, (j as f32 + 0.5) / 8.0);
                let r = bsdf.sample_direction(&query(u), &g).unwrap();
                assert!(r.wo.dot(g.sn) > 0.0);
                assert_eq!(r.pdf.measure, Measure::ProjectedSolidAngle);
                assert!((r.pdf.v - INV_PI).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_sample_fails_below_surface() {
        let bsdf = DiffuseBsdf::new(Vec3::splat(0.8));
        let g = geom();
        let mut q = query(Vec2::splat(0.5));
        q.wi = Vec3::new(0.0, 0.0, -1.0);
        assert!(bsdf.sample_direction(&q, &g).is_none());
    }

    #[test]
    fn test_sample_fails_on_disallowed_component() {
        let bsdf = DiffuseBsdf::new(Vec3::splat(0.8));
        let g = geom();
        let mut q = query(Vec2::splat(0.5));
        q.ty = BsdfType::SPECULAR;
        assert!(bsdf.sample_direction(&q, &g).is_none());
    }

    #[test]
    fn test_eval_matches_sampled_weight() {
        // weight == f * cos / p for sampled directions
        let bsdf = DiffuseBsdf::new(Vec3::new(0.9, 0.5, 0.2));
        let g = geom();
        let q = query(Vec2::new(0.3, 0.7));
        let (r, weight) = bsdf.sample_and_estimate_direction(&q, &g).unwrap();
        let f = bsdf.evaluate_direction(&BsdfEvalQuery::from_sample(&q, &r), &g);
        let cos = r.wo.dot(g.sn).abs();
        let explicit = f * cos / (r.pdf.v * cos); // projected measure carries the cosine
        assert!((weight - explicit).length() < EPS_LARGE);
    }

    #[test]
    fn test_estimate_weight_is_reflectance() {
        let reflectance = Vec3::new(0.9, 0.5, 0.2);
        let bsdf = DiffuseBsdf::new(reflectance);
        let g = geom();
        let (_, weight) = bsdf
            .sample_and_estimate_direction(&query(Vec2::new(0.4, 0.1)), &g)
            .unwrap();
        assert!((weight - reflectance).length() < 1e-5);
    }
}
