//! Primary-sample-space Metropolis light transport.
//!
//! The path function maps a sequence of uniform numbers to a (radiance,
//! raster position) pair. A bootstrap phase draws seed paths from a
//! restorable stream, estimates the normalization constant `B`, and
//! resamples seeds proportionally to luminance; each worker then runs an
//! independent Markov chain over primary sample space using the Kelemen
//! mutator.

use std::sync::Mutex;

use lux_core::config::{ConfigError, ConfigNode};
use lux_core::film::Film;
use lux_math::{luminance, Ray, Vec2, Vec3};

use crate::bsdf::{BsdfEvalQuery, BsdfSampleQuery, BsdfType, TransportDirection};
use crate::pssmlt_sampler::{PssmltPrimarySampler, SamplerSource};
use crate::renderer::{parallel_blocks, ProgressFn, RenderParams, Renderer};
use crate::sampler::{RandomSampler, RestorableSampler, Sampler};
use crate::scene::Scene;

/// How accepted/rejected states are splatted to the film.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EstimatorMode {
    /// Splat the current state with weight `B / I` every step.
    Normal,
    /// Mean-value substitution: splat both states, weighted by the
    /// acceptance probability.
    MeanValueSubstitution,
    /// Mean-value substitution combined with large-step MIS.
    MeanValueSubstitutionLargeStepMis,
}

/// Index of a bootstrap path in the restorable stream, with its luminance.
#[derive(Debug, Clone, Copy)]
struct PathSeed {
    index: usize,
    luminance: f32,
}

#[derive(Debug, Clone, Copy, Default)]
struct PathSampleRecord {
    l: Vec3,
    raster: Vec2,
}

struct ChainContext {
    rng: RandomSampler,
    film: Film,
    sampler: PssmltPrimarySampler,
    records: [PathSampleRecord; 2],
    current: usize,
}

pub struct PssmltRenderer {
    params: RenderParams,
    estimator_mode: EstimatorMode,
    num_seed_samples: u64,
    large_step_prob: f32,
    kernel_size_s1: f32,
    kernel_size_s2: f32,
    progress: Option<ProgressFn>,
}

impl PssmltRenderer {
    pub fn new() -> Self {
        Self {
            params: RenderParams::default(),
            estimator_mode: EstimatorMode::MeanValueSubstitutionLargeStepMis,
            num_seed_samples: 1,
            large_step_prob: 0.1,
            kernel_size_s1: 1.0 / 1024.0,
            kernel_size_s2: 1.0 / 64.0,
            progress: None,
        }
    }

    /// The path function: a brute-force eye path whose emissive hits are
    /// accumulated, driven entirely by the given sampler.
    fn sample_and_evaluate_path(
        &self,
        scene: &Scene,
        sampler: &mut dyn Sampler,
    ) -> PathSampleRecord {
        let camera = scene.main_camera();

        let raster = sampler.next_vec2();

        // Position on the camera, then the ray direction through the
        // raster position
        let (geom_e, pdf_pe) = camera.sample_position(sampler.next_vec2());
        let query = BsdfSampleQuery {
            sample: raster,
            u_comp: 0.0,
            wi: Vec3::ZERO,
            ty: BsdfType::NON_DELTA_EYE_DIRECTION,
            transport_dir: TransportDirection::EL,
        };
        let Some(result) = camera.sample_direction(&query, &geom_e) else {
            return PathSampleRecord {
                l: Vec3::ZERO,
                raster,
            };
        };

        let we = camera.evaluate_position(&geom_e)
            * camera.evaluate_direction(&BsdfEvalQuery::from_sample(&query, &result), &geom_e);

        let mut ray = Ray::new(geom_e.p, result.wo, 0.0, f32::INFINITY);
        let mut l = Vec3::ZERO;
        let mut throughput = we / result.pdf.v / pdf_pe.v;
        let mut depth = 0usize;

        loop {
            let Some(isect) = scene.intersect(&mut ray) else {
                break;
            };

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

            let query = BsdfSampleQuery {
                sample: sampler.next_vec2(),
                u_comp: sampler.next(),
                wi: -ray.d,
                ty: BsdfType::ALL_BSDF,
                transport_dir: TransportDirection::EL,
            };
            let Some(result) = isect.primitive.bsdf.sample_direction(&query, &isect.geom) else {
                break;
            };
            let fs = isect
                .primitive
                .bsdf
                .evaluate_direction(&BsdfEvalQuery::from_sample(&query, &result), &isect.geom);
            if fs == Vec3::ZERO {
                break;
            }
            throughput *= fs / result.pdf.v;

            ray = Ray::infinite(isect.geom.p, result.wo);

            depth += 1;
            if depth >= self.params.rr_depth {
                let p = luminance(throughput).min(0.5);
                if sampler.next() > p {
                    break;
                }
                throughput /= p;
            }
        }

        PathSampleRecord { l, raster }
    }

    /// Bootstrap: draw `num_seed_samples` paths from the restorable
    /// stream, estimate `B`, and resample `num_threads` seeds proportional
    /// to luminance.
    fn generate_and_sample_seeds(
        &self,
        scene: &Scene,
        restorable: &mut RestorableSampler,
    ) -> (f32, Vec<PathSeed>) {
        let mut candidates = Vec::new();
        let mut sum = 0.0f32;

        for _ in 0..self.num_seed_samples {
            let index = restorable.index();
            let record = self.sample_and_evaluate_path(scene, restorable);
            if record.l != Vec3::ZERO {
                let i = luminance(record.l);
                sum += i;
                candidates.push(PathSeed {
                    index,
                    luminance: i,
                });
            }
        }

        let b = sum / self.num_seed_samples as f32;
        if candidates.is_empty() {
            return (b, Vec::new());
        }

        // Luminance-proportional CDF over the candidates
        let mut cdf = Vec::with_capacity(candidates.len() + 1);
        cdf.push(0.0f32);
        for c in &candidates {
            cdf.push(cdf.last().unwrap() + c.luminance);
        }
        let total = *cdf.last().unwrap();
        for v in &mut cdf {
            *v /= total;
        }

        let mut seeds = Vec::with_capacity(self.params.num_threads);
        for _ in 0..self.params.num_threads {
            let u = restorable.next();
            let i = cdf.partition_point(|&c| c <= u).clamp(1, cdf.len() - 1) - 1;
            seeds.push(candidates[i]);
        }
        (b, seeds)
    }

    /// One Metropolis mutation on a chain.
    fn mutate(&self, scene: &Scene, context: &mut ChainContext, b: f32) {
        let large_step = context.rng.next() < self.large_step_prob;
        context.sampler.set_large_step(large_step);

        let proposed_index = 1 - context.current;
        context.records[proposed_index] = self.sample_and_evaluate_path(scene, &mut context.sampler);

        let current = context.records[context.current];
        let proposed = context.records[proposed_index];
        let current_i = luminance(current.l);
        let proposed_i = luminance(proposed.l);

        let a = if current_i > 0.0 {
            (proposed_i / current_i).min(1.0)
        } else {
            1.0
        };

        let accept = context.rng.next() < a;
        if accept {
            context.sampler.accept();
            context.current = proposed_index;
        } else {
            context.sampler.reject();
        }

        match self.estimator_mode {
            EstimatorMode::MeanValueSubstitution => {
                if current_i > 0.0 {
                    context
                        .film
                        .accumulate_contribution(current.raster, current.l * ((1.0 - a) * b / current_i));
                }
                if proposed_i > 0.0 {
                    context
                        .film
                        .accumulate_contribution(proposed.raster, proposed.l * (a * b / proposed_i));
                }
            }
            EstimatorMode::MeanValueSubstitutionLargeStepMis => {
                if current_i > 0.0 {
                    context.film.accumulate_contribution(
                        current.raster,
                        current.l * ((1.0 - a) / (current_i / b + self.large_step_prob)),
                    );
                }
                if proposed_i > 0.0 {
                    let w = a + if large_step { 1.0 } else { 0.0 };
                    context.film.accumulate_contribution(
                        proposed.raster,
                        proposed.l * (w / (proposed_i / b + self.large_step_prob)),
                    );
                }
            }
            EstimatorMode::Normal => {
                let record = context.records[context.current];
                let i = luminance(record.l);
                if i > 0.0 {
                    context
                        .film
                        .accumulate_contribution(record.raster, record.l * (b / i));
                }
            }
        }
    }
}

impl Default for PssmltRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for PssmltRenderer {
    fn renderer_type(&self) -> &'static str {
        "pssmlt"
    }

    fn configure(&mut self, node: &ConfigNode) -> Result<(), ConfigError> {
        self.params = RenderParams::parse(node)?;
        self.num_seed_samples = node.child_value_or("num_seed_samples", 1u64)?;
        self.large_step_prob = node.child_value_or("large_step_prob", 0.1f32)?;
        self.kernel_size_s1 = node.child_value_or("kernel_size_s1", 1.0f32 / 1024.0)?;
        self.kernel_size_s2 = node.child_value_or("kernel_size_s2", 1.0f32 / 64.0)?;

        self.estimator_mode = match node.child("estimator_mode") {
            None => {
                log::warn!("missing 'estimator_mode', using mvs_mis");
                EstimatorMode::MeanValueSubstitutionLargeStepMis
            }
            Some(child) => match child.value() {
                "normal" => EstimatorMode::Normal,
                "mvs" => EstimatorMode::MeanValueSubstitution,
                "mvs_mis" => EstimatorMode::MeanValueSubstitutionLargeStepMis,
                other => {
                    return Err(ConfigError::InvalidValue {
                        key: "estimator_mode".into(),
                        value: other.to_string(),
                    })
                }
            },
        };
        Ok(())
    }

    fn render(&self, scene: &Scene) -> Film {
        let mut master = scene.film().clone();
        let params = &self.params;

        // Bootstrap on the driver thread
        log::info!("generating {} seed samples", self.num_seed_samples);
        let mut restorable = RestorableSampler::from_seed(params.seed);
        let (b, seeds) = self.generate_and_sample_seeds(scene, &mut restorable);
        if b <= 0.0 || seeds.is_empty() {
            log::warn!("no seed path found a light; returning a black film");
            return master;
        }

        // Replay each worker's seed path through its chain sampler so the
        // chains start from the resampled states.
        let mut contexts: Vec<Mutex<Option<ChainContext>>> = Vec::new();
        let mut restorable = Some(restorable);
        for (worker, seed) in seeds.iter().enumerate() {
            let mut r = restorable.take().unwrap();
            r.set_index(seed.index);

            let mut sampler = PssmltPrimarySampler::new(
                self.kernel_size_s1,
                self.kernel_size_s2,
                SamplerSource::Restorable(r),
            );
            let record = self.sample_and_evaluate_path(scene, &mut sampler);
            debug_assert!((luminance(record.l) - seed.luminance).abs() <= 1e-3 * seed.luminance);
            sampler.accept();

            // Hand the stream back and switch the chain to its own rng
            let source = sampler.replace_source(SamplerSource::Random(RandomSampler::from_seed(
                params.seed.wrapping_add(0x5851_f42d).wrapping_add(worker as u64),
            )));
            let SamplerSource::Restorable(r) = source else {
                unreachable!("bootstrap source was installed above");
            };
            restorable = Some(r);

            contexts.push(Mutex::new(Some(ChainContext {
                rng: RandomSampler::from_seed(params.seed.wrapping_add(1 + worker as u64)),
                film: master.clone(),
                sampler,
                records: [PathSampleRecord::default(), record],
                current: 1,
            })));
        }

        let contexts = parallel_blocks(
            params.num_samples,
            params.samples_per_block,
            params.num_threads,
            self.progress.as_ref(),
            |worker| {
                contexts[worker]
                    .lock()
                    .expect("chain context lock")
                    .take()
                    .expect("chain context is taken once per worker")
            },
            |context, samples| {
                for _ in samples {
                    self.mutate(scene, context, b);
                }
            },
        );

        for context in &contexts {
            master.accumulate_film(&context.film);
        }
        let scale = params.film_scale(&master);
        master.rescale(scale);
        master
    }

    fn on_progress(&mut self, progress: ProgressFn) {
        self.progress = Some(progress);
    }
}
