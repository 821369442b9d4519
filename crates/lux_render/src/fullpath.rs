//! Full paths: a light-subpath prefix joined to an eye-subpath suffix.
//!
//! A full path of length `n = s + t` fixes how many vertices come from
//! each subpath. Vertices are indexed from the light end: `x_0` is the
//! light endpoint, `x_{n-1}` the eye endpoint. The constructor caches the
//! four directional PDFs at the connection vertices; together with the
//! per-vertex PDFs cached during subpath sampling they make the full-path
//! PDF of every alternative split evaluable, and the ratio of adjacent
//! splits O(1).

use lux_math::{Measure, PdfEval, Ray, Vec2, Vec3};

use crate::bsdf::{BsdfEvalQuery, BsdfType, PerDirection, TransportDirection};
use crate::geometry::generalized_geometry_term;
use crate::pool::VertexPool;
use crate::scene::Scene;
use crate::subpath::{PathVertex, Subpath};

pub struct FullPath<'p, 'a> {
    s: usize,
    t: usize,
    light_subpath: &'p Subpath,
    eye_subpath: &'p Subpath,
    pool: &'p VertexPool<'a>,
    /// Directional PDFs at the light-side connection vertex `x_{s-1}`.
    pdf_dl: PerDirection<PdfEval>,
    /// Directional PDFs at the eye-side connection vertex `x_s`.
    pdf_de: PerDirection<PdfEval>,
}

impl<'p, 'a> FullPath<'p, 'a> {
    /// Build the full path for split `(s, t)` and precompute the
    /// connection PDFs.
    pub fn new(
        s: usize,
        t: usize,
        light_subpath: &'p Subpath,
        eye_subpath: &'p Subpath,
        pool: &'p VertexPool<'a>,
    ) -> Self {
        debug_assert!(s + t >= 2);
        debug_assert!(s <= light_subpath.num_vertices());
        debug_assert!(t <= eye_subpath.num_vertices());

        let mut path = Self {
            s,
            t,
            light_subpath,
            eye_subpath,
            pool,
            pdf_dl: PerDirection([PdfEval::default(); 2]),
            pdf_de: PerDirection([PdfEval::default(); 2]),
        };

        if s == 0 && t > 0 {
            // x_0 lies on the eye subpath; it must itself be an area light
            let z = eye_subpath.vertex(pool, t - 1);
            if let Some(light) = z.area_light {
                let eq = BsdfEvalQuery::new(
                    BsdfType::LIGHT_DIRECTION,
                    TransportDirection::LE,
                    Vec3::ZERO,
                    z.wi,
                );
                path.pdf_de[TransportDirection::LE] = light.evaluate_direction_pdf(&eq, &z.geom);
            }
        } else if s > 0 && t == 0 {
            // x_{n-1} lies on the light subpath; it must be an area camera
            let y = light_subpath.vertex(pool, s - 1);
            if let Some(camera) = y.area_camera {
                let eq = BsdfEvalQuery::new(
                    BsdfType::NON_DELTA_EYE_DIRECTION,
                    TransportDirection::EL,
                    Vec3::ZERO,
                    y.wi,
                );
                path.pdf_dl[TransportDirection::EL] = camera.evaluate_direction_pdf(&eq, &y.geom);
            }
        } else if s > 0 && t > 0 {
            let y = light_subpath.vertex(pool, s - 1);
            let z = eye_subpath.vertex(pool, t - 1);
            let yz = (z.geom.p - y.geom.p).normalize();

            if s > 1 {
                let eq =
                    BsdfEvalQuery::new(BsdfType::ALL, TransportDirection::EL, yz, y.wi);
                path.pdf_dl[TransportDirection::EL] = y.bsdf.evaluate_direction_pdf(&eq, &y.geom);
            }
            {
                let eq = BsdfEvalQuery::new(BsdfType::ALL, TransportDirection::LE, y.wi, yz);
                path.pdf_dl[TransportDirection::LE] = y.bsdf.evaluate_direction_pdf(&eq, &y.geom);
            }
            if t > 1 {
                let eq =
                    BsdfEvalQuery::new(BsdfType::ALL, TransportDirection::LE, -yz, z.wi);
                path.pdf_de[TransportDirection::LE] = z.bsdf.evaluate_direction_pdf(&eq, &z.geom);
            }
            {
                let eq = BsdfEvalQuery::new(BsdfType::ALL, TransportDirection::EL, z.wi, -yz);
                path.pdf_de[TransportDirection::EL] = z.bsdf.evaluate_direction_pdf(&eq, &z.geom);
            }
        }

        path
    }

    pub fn s(&self) -> usize {
        self.s
    }

    pub fn t(&self) -> usize {
        self.t
    }

    /// Number of vertices in the full path.
    pub fn n(&self) -> usize {
        self.s + self.t
    }

    /// Vertex `x_i`, indexed from the light end.
    pub fn vertex(&self, i: usize) -> &PathVertex<'a> {
        debug_assert!(i < self.n());
        if i < self.s {
            self.light_subpath.vertex(self.pool, i)
        } else {
            self.eye_subpath.vertex(self.pool, self.n() - 1 - i)
        }
    }

    /// PDF of sampling the direction `x_j -> x_{j+1}` in light-to-eye
    /// transport, resolving connection vertices to the cached PDFs.
    fn direction_pdf_le(&self, j: usize) -> PdfEval {
        if j + 1 < self.s {
            self.vertex(j).pdf_d[TransportDirection::LE]
        } else if j + 1 == self.s {
            self.pdf_dl[TransportDirection::LE]
        } else if j == self.s {
            self.pdf_de[TransportDirection::LE]
        } else {
            self.vertex(j).pdf_d[TransportDirection::LE]
        }
    }

    /// PDF of sampling the direction `x_j -> x_{j-1}` in eye-to-light
    /// transport.
    fn direction_pdf_el(&self, j: usize) -> PdfEval {
        if j + 1 < self.s {
            self.vertex(j).pdf_d[TransportDirection::EL]
        } else if j + 1 == self.s {
            self.pdf_dl[TransportDirection::EL]
        } else if j == self.s {
            self.pdf_de[TransportDirection::EL]
        } else {
            self.vertex(j).pdf_d[TransportDirection::EL]
        }
    }

    /// Unweighted measurement contribution
    /// `C*_{s,t} = alpha^L_s * c_{s,t} * alpha^E_t`.
    ///
    /// `raster` receives the raster position the contribution lands on.
    pub fn evaluate_unweighted_contribution(&self, scene: &Scene, raster: &mut Vec2) -> Vec3 {
        let alpha_l = self.light_subpath.evaluate_alpha(self.pool, self.s, raster);
        if alpha_l == Vec3::ZERO {
            return Vec3::ZERO;
        }

        let alpha_e = self.eye_subpath.evaluate_alpha(self.pool, self.t, raster);
        if alpha_e == Vec3::ZERO {
            return Vec3::ZERO;
        }

        // Connection factor c_{s,t}
        let mut cst = Vec3::ZERO;
        if self.s == 0 && self.t > 0 {
            // The eye subpath terminates on an area light
            let z = self.eye_subpath.vertex(self.pool, self.t - 1);
            if let Some(light) = z.area_light {
                // Le0(z_{t-1}) * Le1(z_{t-1} -> z_{t-2})
                let eq = BsdfEvalQuery::new(
                    BsdfType::ALL_EMITTER,
                    TransportDirection::LE,
                    Vec3::ZERO,
                    z.wi,
                );
                cst = light.evaluate_position(&z.geom) * light.evaluate_direction(&eq, &z.geom);
            }
        } else if self.s > 0 && self.t == 0 {
            // The light subpath terminates on an area camera
            let y = self.light_subpath.vertex(self.pool, self.s - 1);
            if let Some(camera) = y.area_camera {
                if let Some(r) = camera.ray_to_raster(y.geom.p, y.wi) {
                    *raster = r;
                    let eq = BsdfEvalQuery::new(
                        BsdfType::ALL_EMITTER,
                        TransportDirection::EL,
                        Vec3::ZERO,
                        y.wi,
                    );
                    cst = camera.evaluate_position(&y.geom)
                        * camera.evaluate_direction(&eq, &y.geom);
                }
            }
        } else if self.s > 0 && self.t > 0 {
            let y = self.light_subpath.vertex(self.pool, self.s - 1);
            let z = self.eye_subpath.vertex(self.pool, self.t - 1);

            let mut shadow = Ray::shadow(y.geom.p, z.geom.p);

            // Light-tracing connections must land inside the image
            let visible = if self.t == 1 {
                match scene.main_camera().ray_to_raster(z.geom.p, -shadow.d) {
                    Some(r) => {
                        *raster = r;
                        true
                    }
                    None => false,
                }
            } else {
                true
            };

            if visible && scene.intersect(&mut shadow).is_none() {
                let eq_l =
                    BsdfEvalQuery::new(BsdfType::ALL, TransportDirection::LE, y.wi, shadow.d);
                let fs_l = y.bsdf.evaluate_direction(&eq_l, &y.geom);

                let eq_e =
                    BsdfEvalQuery::new(BsdfType::ALL, TransportDirection::EL, z.wi, -shadow.d);
                let fs_e = z.bsdf.evaluate_direction(&eq_e, &z.geom);

                let g = generalized_geometry_term(&y.geom, &z.geom);
                cst = fs_l * g * fs_e;
            }
        }

        if cst == Vec3::ZERO {
            return Vec3::ZERO;
        }
        alpha_l * cst * alpha_e
    }

    /// Area-product PDF of sampling this geometric path with split `i`
    /// (`i` light vertices, `n - i` eye vertices), using the cached
    /// per-vertex and connection PDFs.
    pub fn evaluate_full_path_pdf(&self, i: usize) -> f32 {
        let n = self.n();
        debug_assert!(i <= n);
        let mut pdf = 1.0;

        if i > 0 {
            let x0 = self.vertex(0);
            if x0.pdf_p.measure != Measure::Area {
                return 0.0;
            }
            pdf *= x0.pdf_p.v;
            for j in 0..i.saturating_sub(1) {
                let d = self.direction_pdf_le(j);
                if d.measure != Measure::ProjectedSolidAngle {
                    return 0.0;
                }
                let g = generalized_geometry_term(&self.vertex(j).geom, &self.vertex(j + 1).geom);
                pdf *= d.v * g * self.vertex(j).pdf_rr.v;
            }
        }

        if i < n {
            let xn = self.vertex(n - 1);
            if xn.pdf_p.measure != Measure::Area {
                return 0.0;
            }
            pdf *= xn.pdf_p.v;
            for j in (i + 1..n).rev() {
                let d = self.direction_pdf_el(j);
                if d.measure != Measure::ProjectedSolidAngle {
                    return 0.0;
                }
                let g = generalized_geometry_term(&self.vertex(j).geom, &self.vertex(j - 1).geom);
                pdf *= d.v * g * self.vertex(j).pdf_rr.v;
            }
        }

        pdf
    }

    /// The ratio `p_{i+1} / p_i` of the full-path PDFs of adjacent splits,
    /// reduced to the directional PDFs, geometry terms and RR
    /// probabilities at the vertex that changes side. Zero when either
    /// split cannot produce the path.
    pub fn evaluate_full_path_pdf_ratio(&self, i: usize) -> f32 {
        let n = self.n();
        debug_assert!(i < n);

        if i == 0 {
            // p_1 / p_0 = p_A(x_0) / (p_EL(x_1 -> x_0) G(x_1, x_0) p_RR(x_1))
            let x0 = self.vertex(0);
            let x1 = self.vertex(1);
            if x0.pdf_p.measure != Measure::Area {
                return 0.0;
            }
            let d = self.direction_pdf_el(1);
            if d.measure != Measure::ProjectedSolidAngle {
                return 0.0;
            }
            let denom = d.v * generalized_geometry_term(&x1.geom, &x0.geom) * x1.pdf_rr.v;
            if denom == 0.0 {
                return 0.0;
            }
            x0.pdf_p.v / denom
        } else if i == n - 1 {
            // p_n / p_{n-1}
            //   = p_LE(x_{n-2} -> x_{n-1}) G(x_{n-2}, x_{n-1}) p_RR(x_{n-2})
            //     / p_A(x_{n-1})
            let xn1 = self.vertex(n - 1);
            let xn2 = self.vertex(n - 2);
            if xn1.pdf_p.measure != Measure::Area || xn1.pdf_p.v == 0.0 {
                return 0.0;
            }
            let d = self.direction_pdf_le(n - 2);
            if d.measure != Measure::ProjectedSolidAngle {
                return 0.0;
            }
            d.v * generalized_geometry_term(&xn2.geom, &xn1.geom) * xn2.pdf_rr.v / xn1.pdf_p.v
        } else {
            // p_{i+1} / p_i
            //   = p_LE(x_{i-1} -> x_i) G(x_{i-1}, x_i) p_RR(x_{i-1})
            //     / (p_EL(x_{i+1} -> x_i) G(x_{i+1}, x_i) p_RR(x_{i+1}))
            let num_d = self.direction_pdf_le(i - 1);
            let den_d = self.direction_pdf_el(i + 1);
            if num_d.measure != Measure::ProjectedSolidAngle
                || den_d.measure != Measure::ProjectedSolidAngle
            {
                return 0.0;
            }
            let xi = self.vertex(i);
            let num = num_d.v
                * generalized_geometry_term(&self.vertex(i - 1).geom, &xi.geom)
                * self.vertex(i - 1).pdf_rr.v;
            let den = den_d.v
                * generalized_geometry_term(&self.vertex(i + 1).geom, &xi.geom)
                * self.vertex(i + 1).pdf_rr.v;
            if den == 0.0 {
                return 0.0;
            }
            num / den
        }
    }
}
