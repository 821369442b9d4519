//! Light tracing: particles from the lights, connected to the camera.

use lux_core::config::{ConfigError, ConfigNode};
use lux_core::film::Film;
use lux_math::{luminance, Ray, Vec3};

use crate::bsdf::{BsdfEvalQuery, BsdfSampleQuery, BsdfType, GeneralizedBsdf, TransportDirection};
use crate::geometry::generalized_geometry_term;
use crate::renderer::{parallel_blocks, ProgressFn, RenderParams, Renderer};
use crate::sampler::{RandomSampler, Sampler};
use crate::scene::Scene;

/// Unidirectional estimator from the light side: every vertex of a light
/// subpath (the emitter vertex included) is connected to a sampled camera
/// position, and the contribution is splatted at the projected raster
/// position.
pub struct LighttraceRenderer {
    params: RenderParams,
    progress: Option<ProgressFn>,
}

impl LighttraceRenderer {
    pub fn new() -> Self {
        Self {
            params: RenderParams::default(),
            progress: None,
        }
    }

    fn process_sample(&self, scene: &Scene, sampler: &mut dyn Sampler, film: &mut Film) {
        let camera = scene.main_camera();

        // Sample a position on a light
        let (light_index, selection_pdf) = scene.sample_light_selection(sampler.next());
        let light = scene.light(light_index);
        let (geom_l, mut pdf_pl) = light.sample_position(sampler.next_vec2());
        pdf_pl.v *= selection_pdf.v;

        let le0 = light.evaluate_position(&geom_l);

        let mut throughput = le0 / pdf_pl.v;
        let mut curr_geom = geom_l;
        let mut curr_wi = Vec3::ZERO;
        let mut curr_bsdf: &dyn GeneralizedBsdf = light;
        let mut depth = 0usize;

        loop {
            // Connect the current vertex to a sampled camera position
            let (geom_e, pdf_pe) = camera.sample_position(sampler.next_vec2());
            let mut shadow = Ray::shadow(curr_geom.p, geom_e.p);
            if scene.intersect(&mut shadow).is_none() {
                if let Some(raster) = camera.ray_to_raster(geom_e.p, -shadow.d) {
                    let eq_l = BsdfEvalQuery::new(
                        BsdfType::ALL,
                        TransportDirection::LE,
                        curr_wi,
                        shadow.d,
                    );
                    let fs_l = curr_bsdf.evaluate_direction(&eq_l, &curr_geom);

                    let eq_e = BsdfEvalQuery::new(
                        BsdfType::ALL,
                        TransportDirection::EL,
                        Vec3::ZERO,
                        -shadow.d,
                    );
                    let fs_e = camera.evaluate_direction(&eq_e, &geom_e);

                    let g = generalized_geometry_term(&curr_geom, &geom_e);
                    let we0 = camera.evaluate_position(&geom_e);

                    let contrb = throughput * fs_l * g * fs_e * we0 / pdf_pe.v;
                    if contrb != Vec3::ZERO {
                        film.accumulate_contribution(raster, contrb);
                    }
                }
            }

            depth += 1;
            if depth >= self.params.rr_depth {
                let p = luminance(throughput).min(0.5);
                if sampler.next() > p {
                    break;
                }
                throughput /= p;
            }

            // Scatter
            let query = BsdfSampleQuery {
                sample: sampler.next_vec2(),
                u_comp: sampler.next(),
                wi: curr_wi,
                ty: BsdfType::ALL,
                transport_dir: TransportDirection::LE,
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

impl Default for LighttraceRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for LighttraceRenderer {
    fn renderer_type(&self) -> &'static str {
        "lighttrace"
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
