//! Renderer trait, shared render parameters and the parallel driver.

use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};

use lux_core::config::{ConfigError, ConfigNode};
use lux_core::film::Film;

use crate::sampler::seed_from_time;
use crate::scene::Scene;

/// Progress callback: fraction in `[0, 1]` plus a done flag.
pub type ProgressFn = Box<dyn Fn(f64, bool) + Send + Sync>;

/// A rendering estimator.
pub trait Renderer {
    /// The factory key of this renderer.
    fn renderer_type(&self) -> &'static str;

    /// Read parameters from the renderer configuration node.
    fn configure(&mut self, node: &ConfigNode) -> Result<(), ConfigError>;

    /// One-time work before rendering (e.g. photon tracing). The default
    /// does nothing.
    fn preprocess(&mut self, _scene: &Scene) -> Result<(), ConfigError> {
        Ok(())
    }

    /// Render the scene into a fresh film.
    fn render(&self, scene: &Scene) -> Film;

    /// Install a progress callback invoked as blocks complete.
    fn on_progress(&mut self, progress: ProgressFn);
}

/// Parameters shared by every sampling renderer.
#[derive(Debug, Clone)]
pub struct RenderParams {
    pub num_samples: u64,
    pub rr_depth: usize,
    pub num_threads: usize,
    pub samples_per_block: u64,
    pub seed: u64,
}

impl Default for RenderParams {
    fn default() -> Self {
        Self {
            num_samples: 1,
            rr_depth: 1,
            num_threads: resolve_num_threads(0),
            samples_per_block: 100,
            seed: seed_from_time(),
        }
    }
}

impl RenderParams {
    pub fn parse(node: &ConfigNode) -> Result<Self, ConfigError> {
        let num_samples = node.child_value_or("num_samples", 1u64)?;
        let rr_depth = node.child_value_or("rr_depth", 1usize)?;
        let num_threads = resolve_num_threads(node.child_value_or("num_threads", 0i64)?);
        let samples_per_block = node.child_value_or("samples_per_block", 100u64)?;
        if samples_per_block == 0 {
            return Err(ConfigError::InvalidValue {
                key: "samples_per_block".into(),
                value: "0".into(),
            });
        }
        let seed = node.child_value_or("seed", seed_from_time())?;
        Ok(Self {
            num_samples,
            rr_depth,
            num_threads,
            samples_per_block,
            seed,
        })
    }

    /// Final rescale factor `(width * height) / num_samples` applied to
    /// the merged master film.
    pub fn film_scale(&self, film: &Film) -> f32 {
        (film.width() * film.height()) as f32 / self.num_samples as f32
    }
}

/// Resolve a configured thread count: positive values are taken as-is,
/// zero or negative values offset the detected hardware concurrency.
pub fn resolve_num_threads(configured: i64) -> usize {
    let hw = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1) as i64;
    if configured > 0 {
        configured as usize
    } else {
        (hw + configured).max(1) as usize
    }
}

/// Run the shared driver template: chunk `num_samples` into blocks of
/// `samples_per_block`, dispatch blocks to a fixed pool of workers
/// statically (worker `w` takes blocks `w, w + T, ...`), and report
/// progress as blocks complete.
///
/// `init` builds a per-worker context on its own thread; `process` handles
/// one block of samples. The contexts are returned for the caller to merge
/// films out of.
pub(crate) fn parallel_blocks<C, FInit, FBlock>(
    num_samples: u64,
    samples_per_block: u64,
    num_threads: usize,
    progress: Option<&ProgressFn>,
    init: FInit,
    process: FBlock,
) -> Vec<C>
where
    C: Send,
    FInit: Fn(usize) -> C + Sync,
    FBlock: Fn(&mut C, Range<u64>) + Sync,
{
    let blocks = num_samples.div_ceil(samples_per_block);
    let processed = AtomicU64::new(0);

    if let Some(p) = progress {
        p(0.0, false);
    }

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..num_threads)
            .map(|worker| {
                let processed = &processed;
                let init = &init;
                let process = &process;
                scope.spawn(move || {
                    let mut context = init(worker);
                    let mut block = worker as u64;
                    while block < blocks {
                        let begin = block * samples_per_block;
                        let end = (begin + samples_per_block).min(num_samples);
                        process(&mut context, begin..end);

                        let done = processed.fetch_add(1, Ordering::Relaxed) + 1;
                        if let Some(p) = progress {
                            p(done as f64 / blocks as f64, done == blocks);
                        }
                        block += num_threads as u64;
                    }
                    context
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| h.join().expect("render worker panicked"))
            .collect()
    })
}

/// Create a renderer by its factory key.
pub fn create_renderer(ty: &str) -> Result<Box<dyn Renderer>, ConfigError> {
    match ty {
        "raycast" => Ok(Box::new(crate::raycast::RaycastRenderer::new())),
        "pathtrace" => Ok(Box::new(crate::pathtrace::PathtraceRenderer::new())),
        "lighttrace" => Ok(Box::new(crate::lighttrace::LighttraceRenderer::new())),
        "pm" => Ok(Box::new(crate::pm::PhotonMappingRenderer::new())),
        "bpt" => Ok(Box::new(crate::bpt::BptRenderer::new())),
        "pssmlt" => Ok(Box::new(crate::pssmlt::PssmltRenderer::new())),
        _ => Err(ConfigError::UnknownType {
            kind: "renderer",
            ty: ty.to_string(),
        }),
    }
}

/// Convenience entry: build assets and scene from a root configuration
/// node (with `assets`, `scene` and `renderer` children), run the
/// configured renderer, and return the master film.
pub fn render_with_config(root: &ConfigNode) -> Result<Film, ConfigError> {
    let assets_node = root.child("assets").ok_or(ConfigError::MissingKey {
        key: "assets".into(),
    })?;
    let scene_node = root.child("scene").ok_or(ConfigError::MissingKey {
        key: "scene".into(),
    })?;
    let renderer_node = root.child("renderer").ok_or(ConfigError::MissingKey {
        key: "renderer".into(),
    })?;

    let assets = crate::assets::Assets::load(assets_node)?;
    let scene = crate::assets::build_scene(scene_node, &assets, None)?;

    let ty = renderer_node.require_attribute("type")?;
    let mut renderer = create_renderer(ty)?;
    renderer.configure(renderer_node)?;
    renderer.preprocess(&scene)?;
    log::info!("rendering with '{}'", renderer.renderer_type());
    Ok(renderer.render(&scene))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_resolve_num_threads() {
        assert_eq!(resolve_num_threads(4), 4);
        assert!(resolve_num_threads(0) >= 1);
        // Large negative offsets clamp to one
        assert_eq!(resolve_num_threads(-10_000), 1);
    }

    #[test]
    fn test_parallel_blocks_covers_all_samples() {
        let counted = AtomicUsize::new(0);
        let contexts = parallel_blocks(
            1037,
            100,
            3,
            None,
            |_| 0u64,
            |acc, range| {
                counted.fetch_add((range.end - range.start) as usize, Ordering::Relaxed);
                *acc += range.end - range.start;
            },
        );
        assert_eq!(counted.load(Ordering::Relaxed), 1037);
        assert_eq!(contexts.iter().sum::<u64>(), 1037);
        assert_eq!(contexts.len(), 3);
    }

    #[test]
    fn test_parallel_blocks_progress_completes() {
        use std::sync::atomic::AtomicBool;
        use std::sync::Arc;

        let done = Arc::new(AtomicBool::new(false));
        let done2 = done.clone();
        let progress: ProgressFn = Box::new(move |f, d| {
            assert!((0.0..=1.0).contains(&f));
            if d {
                done2.store(true, Ordering::Relaxed);
            }
        });
        let _ = parallel_blocks(10, 3, 2, Some(&progress), |_| (), |_, _| {});
        assert!(done.load(Ordering::Relaxed));
    }

    #[test]
    fn test_unknown_renderer_type() {
        assert!(matches!(
            create_renderer("wavefront"),
            Err(ConfigError::UnknownType { .. })
        ));
    }

    #[test]
    fn test_params_parse_defaults() {
        let node = ConfigNode::new("renderer").with_attribute("type", "bpt");
        let params = RenderParams::parse(&node).unwrap();
        assert_eq!(params.num_samples, 1);
        assert_eq!(params.rr_depth, 1);
        assert_eq!(params.samples_per_block, 100);
    }

    #[test]
    fn test_params_reject_zero_block() {
        let node = ConfigNode::new("renderer").with_child(ConfigNode::leaf("samples_per_block", 0));
        assert!(RenderParams::parse(&node).is_err());
    }
}
