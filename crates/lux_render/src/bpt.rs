//! Bidirectional path tracing with MIS.

use lux_core::config::{ConfigError, ConfigNode};
use lux_core::film::Film;
use lux_math::{Vec2, Vec3};

use crate::bsdf::TransportDirection;
use crate::fullpath::FullPath;
use crate::mis::power_heuristic_weight;
use crate::pool::VertexPool;
use crate::renderer::{parallel_blocks, ProgressFn, RenderParams, Renderer};
use crate::sampler::{RandomSampler, Sampler};
use crate::scene::Scene;
use crate::subpath::Subpath;

/// Bidirectional path tracer: per sample, one light and one eye subpath
/// are sampled, every `(s, t)` split with `s + t >= 2` is connected into a
/// full path, and the unweighted contributions are combined with the
/// power-heuristic MIS weight.
pub struct BptRenderer {
    params: RenderParams,
    max_subpath_num_vertices: Option<usize>,
    progress: Option<ProgressFn>,
}

struct WorkerContext<'a> {
    sampler: RandomSampler,
    film: Film,
    pool: VertexPool<'a>,
    light_subpath: Subpath,
    eye_subpath: Subpath,
}

impl BptRenderer {
    pub fn new() -> Self {
        Self {
            params: RenderParams::default(),
            max_subpath_num_vertices: None,
            progress: None,
        }
    }

    fn process_sample<'a>(&self, scene: &'a Scene, context: &mut WorkerContext<'a>) {
        context.pool.release_all();
        context.light_subpath.clear();
        context.eye_subpath.clear();

        context.light_subpath.sample(
            scene,
            &mut context.sampler,
            &mut context.pool,
            self.params.rr_depth,
            self.max_subpath_num_vertices,
        );
        context.eye_subpath.sample(
            scene,
            &mut context.sampler,
            &mut context.pool,
            self.params.rr_depth,
            self.max_subpath_num_vertices,
        );

        let nl = context.light_subpath.num_vertices();
        let ne = context.eye_subpath.num_vertices();

        for s in 0..=nl {
            for t in 0..=ne {
                if s + t < 2 {
                    continue;
                }

                let path = FullPath::new(
                    s,
                    t,
                    &context.light_subpath,
                    &context.eye_subpath,
                    &context.pool,
                );

                let mut raster = Vec2::ZERO;
                let contribution = path.evaluate_unweighted_contribution(scene, &mut raster);
                if contribution == Vec3::ZERO {
                    continue;
                }

                let weight = power_heuristic_weight(&path);
                context
                    .film
                    .accumulate_contribution(raster, contribution * weight);
            }
        }
    }
}

impl Default for BptRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for BptRenderer {
    fn renderer_type(&self) -> &'static str {
        "bpt"
    }

    fn configure(&mut self, node: &ConfigNode) -> Result<(), ConfigError> {
        self.params = RenderParams::parse(node)?;
        let max = node.child_value_or("max_subpath_num_vertices", -1i64)?;
        self.max_subpath_num_vertices = (max >= 0).then_some(max as usize);
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
            |worker| WorkerContext {
                sampler: RandomSampler::from_seed(params.seed.wrapping_add(worker as u64)),
                film: master.clone(),
                pool: VertexPool::with_capacity(64),
                light_subpath: Subpath::new(TransportDirection::LE),
                eye_subpath: Subpath::new(TransportDirection::EL),
            },
            |context, samples| {
                for _ in samples {
                    self.process_sample(scene, context);
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::two_quad_scene;

    fn configured(num_samples: u64, seed: u64) -> BptRenderer {
        let mut renderer = BptRenderer::new();
        renderer
            .configure(
                &ConfigNode::new("renderer")
                    .with_child(ConfigNode::leaf("num_samples", num_samples))
                    .with_child(ConfigNode::leaf("samples_per_block", 1000))
                    .with_child(ConfigNode::leaf("rr_depth", 3))
                    .with_child(ConfigNode::leaf("num_threads", 2))
                    .with_child(ConfigNode::leaf("seed", seed)),
            )
            .unwrap();
        renderer
    }

    #[test]
    fn test_bpt_produces_light() {
        let scene = two_quad_scene();
        let renderer = configured(20_000, 3);
        let film = renderer.render(&scene);
        assert!(film.mean_luminance() > 0.0);
    }

    #[test]
    fn test_subpath_cap_parsed() {
        let mut renderer = BptRenderer::new();
        renderer
            .configure(
                &ConfigNode::new("renderer")
                    .with_child(ConfigNode::leaf("max_subpath_num_vertices", 5)),
            )
            .unwrap();
        assert_eq!(renderer.max_subpath_num_vertices, Some(5));

        renderer
            .configure(
                &ConfigNode::new("renderer")
                    .with_child(ConfigNode::leaf("max_subpath_num_vertices", -1)),
            )
            .unwrap();
        assert_eq!(renderer.max_subpath_num_vertices, None);
    }

    /// BPT and the unidirectional path tracer estimate the same image.
    #[test]
    #[ignore = "long-running statistical comparison"]
    fn test_mean_luminance_matches_pathtrace() {
        let scene = two_quad_scene();
        let bpt_film = configured(500_000, 31).render(&scene);

        let mut pt = crate::pathtrace::PathtraceRenderer::new();
        pt.configure(
            &ConfigNode::new("renderer")
                .with_child(ConfigNode::leaf("num_samples", 500_000))
                .with_child(ConfigNode::leaf("samples_per_block", 10_000))
                .with_child(ConfigNode::leaf("seed", 32)),
        )
        .unwrap();
        let pt_film = pt.render(&scene);

        let a = bpt_film.mean_luminance();
        let b = pt_film.mean_luminance();
        assert!(
            (a - b).abs() / b.max(1e-8) < 0.02,
            "bpt mean {a} vs path trace mean {b}"
        );
    }
}
