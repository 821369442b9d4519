//! Debug raycast renderer.

use lux_core::config::{ConfigError, ConfigNode};
use lux_core::film::Film;
use lux_math::{Vec2, Vec3};

use crate::renderer::{parallel_blocks, resolve_num_threads, ProgressFn, Renderer};
use crate::scene::Scene;

/// One primary ray per pixel; the colour is `|sn . (-d)|` on a hit, black
/// otherwise. Useful for checking scene setup and the acceleration
/// structure before committing to a real render.
pub struct RaycastRenderer {
    num_threads: usize,
    progress: Option<ProgressFn>,
}

impl RaycastRenderer {
    pub fn new() -> Self {
        Self {
            num_threads: resolve_num_threads(0),
            progress: None,
        }
    }
}

impl Default for RaycastRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for RaycastRenderer {
    fn renderer_type(&self) -> &'static str {
        "raycast"
    }

    fn configure(&mut self, node: &ConfigNode) -> Result<(), ConfigError> {
        self.num_threads = resolve_num_threads(node.child_value_or("num_threads", 0i64)?);
        Ok(())
    }

    fn render(&self, scene: &Scene) -> Film {
        let mut master = scene.film().clone();
        let width = master.width();
        let height = master.height();
        let camera = scene.main_camera();

        // One block per scanline
        let films = parallel_blocks(
            height as u64,
            1,
            self.num_threads,
            self.progress.as_ref(),
            |_| master.clone(),
            |film, rows| {
                for y in rows {
                    for x in 0..width {
                        let raster = Vec2::new(
                            (x as f32 + 0.5) / width as f32,
                            (y as f32 + 0.5) / height as f32,
                        );
                        let mut ray = camera.raster_to_ray(raster);
                        let colour = match scene.intersect(&mut ray) {
                            Some(isect) => Vec3::splat(isect.geom.sn.dot(-ray.d).abs()),
                            None => Vec3::ZERO,
                        };
                        film.record_contribution(raster, colour);
                    }
                }
            },
        );

        for film in &films {
            master.accumulate_film(film);
        }
        master
    }

    fn on_progress(&mut self, progress: ProgressFn) {
        self.progress = Some(progress);
    }
}
