//! Film: the 2-D RGB accumulation buffer a camera renders into.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use image::codecs::hdr::HdrEncoder;
use image::{Rgb, RgbImage};
use lux_math::{Vec2, Vec3};
use thiserror::Error;

/// Errors from saving a film to disk.
#[derive(Error, Debug)]
pub enum FilmError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image encoding error: {0}")]
    Image(#[from] image::ImageError),
}

/// A 2-D array of RGB accumulators.
///
/// Contributions are addressed by raster position in `[0, 1)^2`. Record
/// overwrites a pixel; accumulate adds to it. Each render worker owns a
/// clone that is merged into the master film after the workers join.
#[derive(Clone, Debug)]
pub struct Film {
    width: u32,
    height: u32,
    pixels: Vec<Vec3>,
}

impl Film {
    /// Create a film filled with black.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![Vec3::ZERO; (width * height) as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    fn index(&self, raster: Vec2) -> usize {
        let x = ((raster.x * self.width as f32) as i64).clamp(0, self.width as i64 - 1);
        let y = ((raster.y * self.height as f32) as i64).clamp(0, self.height as i64 - 1);
        (y * self.width as i64 + x) as usize
    }

    /// Overwrite the pixel under the raster position.
    pub fn record_contribution(&mut self, raster: Vec2, contrb: Vec3) {
        let i = self.index(raster);
        self.pixels[i] = contrb;
    }

    /// Add to the pixel under the raster position.
    pub fn accumulate_contribution(&mut self, raster: Vec2, contrb: Vec3) {
        let i = self.index(raster);
        self.pixels[i] += contrb;
    }

    /// Add another film of the same size pixel-wise.
    pub fn accumulate_film(&mut self, other: &Film) {
        debug_assert_eq!(self.width, other.width);
        debug_assert_eq!(self.height, other.height);
        for (p, q) in self.pixels.iter_mut().zip(&other.pixels) {
            *p += *q;
        }
    }

    /// Multiply every pixel by a constant weight.
    pub fn rescale(&mut self, weight: f32) {
        for p in &mut self.pixels {
            *p *= weight;
        }
    }

    /// Pixel value at integer coordinates.
    pub fn pixel(&self, x: u32, y: u32) -> Vec3 {
        self.pixels[(y * self.width + x) as usize]
    }

    pub fn pixels(&self) -> &[Vec3] {
        &self.pixels
    }

    /// Mean of per-pixel relative luminance, useful for estimator
    /// cross-checks.
    pub fn mean_luminance(&self) -> f32 {
        if self.pixels.is_empty() {
            return 0.0;
        }
        let sum: f32 = self.pixels.iter().map(|&p| lux_math::luminance(p)).sum();
        sum / self.pixels.len() as f32
    }

    /// Save as Radiance HDR.
    pub fn save_hdr<P: AsRef<Path>>(&self, path: P) -> Result<(), FilmError> {
        let data: Vec<Rgb<f32>> = self.pixels.iter().map(|p| Rgb([p.x, p.y, p.z])).collect();
        let file = File::create(path.as_ref())?;
        let encoder = HdrEncoder::new(BufWriter::new(file));
        encoder.encode(&data, self.width as usize, self.height as usize)?;
        log::info!("saved film to {}", path.as_ref().display());
        Ok(())
    }

    /// Rescale a copy by `weight` and save it as Radiance HDR.
    pub fn rescale_and_save_hdr<P: AsRef<Path>>(&self, path: P, weight: f32) -> Result<(), FilmError> {
        let mut copy = self.clone();
        copy.rescale(weight);
        copy.save_hdr(path)
    }

    /// Save as an 8-bit PNG with gamma 2.0 applied.
    pub fn save_png<P: AsRef<Path>>(&self, path: P) -> Result<(), FilmError> {
        let img = RgbImage::from_fn(self.width, self.height, |x, y| {
            let p = self.pixel(x, y);
            image::Rgb([to_srgb8(p.x), to_srgb8(p.y), to_srgb8(p.z)])
        });
        img.save(path.as_ref())?;
        log::info!("saved film to {}", path.as_ref().display());
        Ok(())
    }
}

/// Gamma-correct (gamma = 2.0) and quantize a linear value.
#[inline]
fn to_srgb8(linear: f32) -> u8 {
    let g = if linear > 0.0 { linear.sqrt() } else { 0.0 };
    (255.0 * g.clamp(0.0, 1.0)) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_overwrites() {
        let mut film = Film::new(4, 4);
        let raster = Vec2::new(0.3, 0.6);
        film.record_contribution(raster, Vec3::ONE);
        film.record_contribution(raster, Vec3::splat(2.0));
        assert_eq!(film.pixel(1, 2), Vec3::splat(2.0));
    }

    #[test]
    fn test_accumulate_adds() {
        let mut film = Film::new(4, 4);
        let raster = Vec2::new(0.0, 0.0);
        film.accumulate_contribution(raster, Vec3::ONE);
        film.accumulate_contribution(raster, Vec3::ONE);
        assert_eq!(film.pixel(0, 0), Vec3::splat(2.0));
    }

    #[test]
    fn test_raster_clamped_to_bounds() {
        let mut film = Film::new(2, 2);
        film.accumulate_contribution(Vec2::new(1.0, 1.0), Vec3::ONE);
        film.accumulate_contribution(Vec2::new(-0.5, 2.0), Vec3::ONE);
        assert_eq!(film.pixel(1, 1), Vec3::ONE);
        assert_eq!(film.pixel(0, 1), Vec3::ONE);
    }

    #[test]
    fn test_merge_and_rescale() {
        let mut master = Film::new(2, 1);
        let mut worker = master.clone();
        worker.accumulate_contribution(Vec2::new(0.1, 0.0), Vec3::splat(3.0));
        master.accumulate_film(&worker);
        master.rescale(0.5);
        assert_eq!(master.pixel(0, 0), Vec3::splat(1.5));
        assert_eq!(master.pixel(1, 0), Vec3::ZERO);
    }
}
