//! Photon mapping.
//!
//! Two passes: photons are traced from the lights and stored at every
//! non-specular hit, then eye rays walk through specular chains and
//! estimate radiance by gathering nearby photons at the first non-specular
//! surface. ES*L paths are handled by direct emitter evaluation on
//! emissive hits.

use lux_core::config::{ConfigError, ConfigNode};
use lux_core::film::Film;
use lux_math::{luminance, Ray, Vec2, Vec3, INV_PI};

use crate::bsdf::{BsdfEvalQuery, BsdfSampleQuery, BsdfType, GeneralizedBsdf, TransportDirection};
use crate::photonmap::{Photon, PhotonMap};
use crate::renderer::{parallel_blocks, ProgressFn, RenderParams, Renderer};
use crate::sampler::{RandomSampler, Sampler};
use crate::scene::Scene;

pub struct PhotonMappingRenderer {
    params: RenderParams,
    num_photon_trace_samples: u64,
    max_photons: usize,
    max_photon_trace_depth: i64,
    num_nn_query_photons: usize,
    progress: Option<ProgressFn>,

    // Preprocess results
    photon_map: Option<PhotonMap>,
    traced_light_paths: u64,
}

impl PhotonMappingRenderer {
    pub fn new() -> Self {
        Self {
            params: RenderParams::default(),
            num_photon_trace_samples: 1,
            max_photons: 1 << 20,
            max_photon_trace_depth: -1,
            num_nn_query_photons: 50,
            progress: None,
            photon_map: None,
            traced_light_paths: 0,
        }
    }

    /// Silverman's quadratic kernel `3/pi (1 - r^2/R^2)^2`.
    fn density_kernel(p: Vec3, photon: &Photon, query_d2: f32) -> f32 {
        let s = 1.0 - (photon.p - p).length_squared() / query_d2;
        3.0 * INV_PI * s * s
    }

    /// Photon-tracing pass: sample light subpaths and store a photon at
    /// every non-specular hit, with luminance-adaptive Russian roulette
    /// after the first bounce.
    fn trace_photons(&self, scene: &Scene) -> (Vec<Photon>, u64) {
        let mut sampler = RandomSampler::from_seed(self.params.seed.wrapping_mul(0x9e3779b9));
        let mut photons: Vec<Photon> = Vec::with_capacity(self.max_photons);
        let mut traced_paths = 0u64;

        'trace: for _ in 0..self.num_photon_trace_samples {
            if photons.len() >= self.max_photons {
                break;
            }
            traced_paths += 1;

            let (light_index, selection_pdf) = scene.sample_light_selection(sampler.next());
            let light = scene.light(light_index);
            let (geom_l, mut pdf_pl) = light.sample_position(sampler.next_vec2());
            pdf_pl.v *= selection_pdf.v;

            let le0 = light.evaluate_position(&geom_l);

            let mut throughput = le0 / pdf_pl.v;
            let mut curr_geom = geom_l;
            let mut curr_wi = Vec3::ZERO;
            let mut curr_bsdf: &dyn GeneralizedBsdf = light;
            let mut depth = 0i64;

            loop {
                if self.max_photon_trace_depth >= 0 && depth >= self.max_photon_trace_depth {
                    break;
                }

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

                let next_throughput = throughput * fs / result.pdf.v;

                // Adaptive termination keyed to the throughput change
                if depth >= 1 {
                    let continue_prob =
                        (luminance(next_throughput) / luminance(throughput)).min(1.0);
                    if sampler.next() > continue_prob {
                        break;
                    }
                    throughput = next_throughput / continue_prob;
                } else {
                    throughput = next_throughput;
                }

                let mut ray = Ray::infinite(curr_geom.p, result.wo);
                let Some(isect) = scene.intersect(&mut ray) else {
                    break;
                };

                if !isect.primitive.bsdf.bsdf_types().is_specular() {
                    photons.push(Photon {
                        p: isect.geom.p,
                        throughput,
                        wi: -ray.d,
                    });
                    if photons.len() >= self.max_photons {
                        break 'trace;
                    }
                }

                curr_geom = isect.geom;
                curr_wi = -ray.d;
                curr_bsdf = isect.primitive.bsdf.as_ref();
                depth += 1;
            }
        }

        (photons, traced_paths)
    }

    /// Rendering pass for a single sample: walk from the camera through
    /// specular chains; gather photons at the first non-specular hit.
    fn process_sample(&self, scene: &Scene, sampler: &mut dyn Sampler, film: &mut Film) {
        let photon_map = self
            .photon_map
            .as_ref()
            .expect("photon map is built in preprocess");
        let camera = scene.main_camera();

        let (geom_e, pdf_pe) = camera.sample_position(sampler.next_vec2());
        let we0 = camera.evaluate_position(&geom_e);

        let mut throughput = we0 / pdf_pe.v;
        let mut curr_geom = geom_e;
        let mut curr_wi = Vec3::ZERO;
        let mut curr_bsdf: &dyn GeneralizedBsdf = camera;
        let mut raster = Vec2::ZERO;
        let mut l = Vec3::ZERO;
        let mut at_camera = true;

        loop {
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

            if at_camera {
                // The camera's directional sample is the raster position
                raster = query.sample;
                at_camera = false;
            }

            throughput *= fs / result.pdf.v;

            let mut ray = Ray::infinite(curr_geom.p, result.wo);
            let Some(isect) = scene.intersect(&mut ray) else {
                break;
            };

            // ES*L: emissive hits are evaluated directly
            if let Some(light_index) = isect.primitive.light {
                let light = scene.light(light_index);
                let eq = BsdfEvalQuery::new(
                    BsdfType::LIGHT_DIRECTION,
                    TransportDirection::LE,
                    Vec3::ZERO,
                    -ray.d,
                );
                let le_d = light.evaluate_direction(&eq, &isect.geom);
                let le_p = light.evaluate_position(&isect.geom);
                l += throughput * le_d * le_p;
            }

            if !isect.primitive.bsdf.bsdf_types().is_specular() {
                // Density estimation at the first non-specular hit
                let (indices, max_d2) =
                    photon_map.collect(self.num_nn_query_photons, isect.geom.p);
                if max_d2 > 0.0 {
                    for index in indices {
                        let photon = photon_map.photon(index);
                        let k = Self::density_kernel(isect.geom.p, photon, max_d2);
                        let density = k / (max_d2 * self.traced_light_paths as f32);

                        let eq = BsdfEvalQuery::new(
                            BsdfType::ALL_BSDF,
                            TransportDirection::EL,
                            -ray.d,
                            photon.wi,
                        );
                        let fs = isect.primitive.bsdf.evaluate_direction(&eq, &isect.geom);
                        if fs == Vec3::ZERO {
                            continue;
                        }
                        l += throughput * density * fs * photon.throughput;
                    }
                }
                break;
            }

            curr_geom = isect.geom;
            curr_wi = -ray.d;
            curr_bsdf = isect.primitive.bsdf.as_ref();
        }

        film.accumulate_contribution(raster, l);
    }
}

impl Default for PhotonMappingRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for PhotonMappingRenderer {
    fn renderer_type(&self) -> &'static str {
        "pm"
    }

    fn configure(&mut self, node: &ConfigNode) -> Result<(), ConfigError> {
        self.params = RenderParams::parse(node)?;
        self.num_photon_trace_samples = node.child_value_or("num_photon_trace_samples", 1u64)?;
        self.max_photons = node.child_value_or("max_photons", 1usize << 20)?;
        self.max_photon_trace_depth = node.child_value_or("max_photon_trace_depth", -1i64)?;
        self.num_nn_query_photons = node.child_value_or("num_nn_query_photons", 50usize)?;
        Ok(())
    }

    fn preprocess(&mut self, scene: &Scene) -> Result<(), ConfigError> {
        log::info!("tracing photons");
        let (photons, traced_paths) = self.trace_photons(scene);
        log::info!(
            "traced {} light paths, stored {} photons",
            traced_paths,
            photons.len()
        );

        log::info!("building photon map");
        self.photon_map = Some(PhotonMap::build(photons));
        self.traced_light_paths = traced_paths;
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
