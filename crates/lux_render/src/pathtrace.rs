//! Forward path tracing with explicit light connections.

use lux_core::config::{ConfigError, ConfigNode};
use lux_core::film::Film;
use lux_math::{luminance, PdfEval, Ray, Vec2, Vec3};

use crate::bsdf::{BsdfEvalQuery, BsdfSampleQuery, BsdfType, GeneralizedBsdf, TransportDirection};
use crate::geometry::generalized_geometry_term;
use crate::renderer::{parallel_blocks, ProgressFn, RenderParams, Renderer};
use crate::sampler::{RandomSampler, Sampler};
use crate::scene::Scene;

/// Unidirectional estimator from the eye side: every non-terminal eye
/// vertex is connected to a sampled light position through a shadow ray.
/// The symmetric counterpart of [`crate::lighttrace::LighttraceRenderer`].
pub struct PathtraceRenderer {
    params: RenderParams,
    progress: Option<ProgressFn>,
}

impl PathtraceRenderer {
    pub fn new() -> Self {
        Self {
            params: RenderParams::default(),
            progress: None,
        }
    }

    fn process_sample(&self, scene: &Scene, sampler: &mut dyn Sampler, film: &mut Film) {
        let camera = scene.main_camera();

        // Sample a position on the camera
        let (geom_e, pdf_pe) = camera.sample_position(sampler.next_vec2());
        let we0 = camera.evaluate_position(&geom_e);

        let mut throughput = we0 / pdf_pe.v;
        let mut curr_geom = geom_e;
        let mut curr_wi = Vec3::ZERO;
        let mut curr_bsdf: &dyn GeneralizedBsdf = camera;
        let mut raster = Vec2::ZERO;
        let mut depth = 0usize;

        loop {
            // Connect the current vertex to a sampled light position
            let (light_index, selection_pdf) = scene.sample_light_selection(sampler.next());
            let light = scene.light(light_index);
            let (geom_l, mut pdf_pl) = light.sample_position(sampler.next_vec2());
            pdf_pl = PdfEval::new(pdf_pl.v * selection_pdf.v, pdf_pl.measure);

            let mut shadow = Ray::shadow(curr_geom.p, geom_l.p);
            if scene.intersect(&mut shadow).is_none() {
                // At the camera vertex the raster position comes from the
                // connection itself
                let connection_raster = if depth == 0 {
                    camera.ray_to_raster(curr_geom.p, shadow.d)
                } else {
                    Some(raster)
                };

                if let Some(r) = connection_raster {
                    let eq_e = BsdfEvalQuery::new(
                        BsdfType::ALL,
                        TransportDirection::EL,
                        curr_wi,
                        shadow.d,
                    );
                    let fs_e = curr_bsdf.evaluate_direction(&eq_e, &curr_geom);

                    let eq_l = BsdfEvalQuery::new(
                        BsdfType::ALL,
                        TransportDirection::LE,
                        Vec3::ZERO,
                        -shadow.d,
                    );
                    let fs_l = light.evaluate_direction(&eq_l, &geom_l);

                    let g = generalized_geometry_term(&curr_geom, &geom_l);
                    let le0 = light.evaluate_position(&geom_l);

                    let contrb = throughput * fs_e * g * fs_l * le0 / pdf_pl.v;
                    if contrb != Vec3::ZERO {
                        film.accumulate_contribution(r, contrb);
                    }
                }
            }

            depth += 1;
            if depth >= self.params.rr_depth {
                // Russian roulette keyed to the luminance of the carried
                // throughput
                let p = luminance(throughput).min(0.5);
                if sampler.next() > p {
                    break;
                }
                throughput /= p;
            }

            // Scatter toward the next vertex
            let query = BsdfSampleQuery {
                sample: sampler.next_vec2(),
                u_comp: sampler.next(),
                wi: curr_wi,
                ty: BsdfType::ALL,
                transport_dir: TransportDirection::EL,
            };
            let Some(result) = curr_bsdf.sample_direction(&query, &curr_geom) else {
                break;
            };
            let fs = curr_bsdf
                .evaluate_direction(&BsdfEvalQuery::from_sample(&query, &result), &curr_geom);
            if fs == Vec3::ZERO {
                break;
            }
            throughput *= fs / result.pdf.v;

            // The first scatter fixes the raster position for the rest of
            // the path
            if depth == 1 {
                match camera.ray_to_raster(curr_geom.p, result.wo) {
                    Some(r) => raster = r,
                    None => break,
                }
            }

            let mut ray = Ray::infinite(curr_geom.p, result.wo);
            let Some(isect) = scene.intersect(&mut ray) else {
                break;
            };

            curr_geom = isect.geom;
            curr_wi = -ray.d;
            curr_bsdf = isect.primitive.bsdf.as_ref();
        }
    }
}

impl Default for PathtraceRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for PathtraceRenderer {
    fn renderer_type(&self) -> &'static str {
        "pathtrace"
    }

    fn configure(&mut self, node: &ConfigNode) -> Result<(), ConfigError> {
        self.params = RenderParams::parse(node)?;
        Ok(())
    }

    fn render(&self, scene: &Scene) -> Film {
        let mut master = scene.film().clone();
        let params = &self.params;

        let contexts = parallel_blocks(
            params.num_samples,
            params.samples_per_block,
            params.num_threads,
            self.progress.as_ref(),
            |worker| {
                (
                    RandomSampler::from_seed(params.seed.wrapping_add(worker as u64)),
                    master.clone(),
                )
            },
            |(sampler, film), samples| {
                for _ in samples {
                    self.process_sample(scene, sampler, film);
                }
            },
        );

        for (_, film) in &contexts {
            master.accumulate_film(film);
        }
        let scale = params.film_scale(&master);
        master.rescale(scale);
        master
    }

    fn on_progress(&mut self, progress: ProgressFn) {
        self.progress = Some(progress);
    }
}
