//! Synthetic star fields for tests and demos.
//!
//! Provides:
//! - Flat sky frames
//! - Pixel-integrated Gaussian stars with known injected flux
//! - Poisson noise
//! - Time series of frames with variable stars and jittered detections

use std::f64::consts::PI;

use common::Buffer2;
use glam::DVec2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Poisson, StandardNormal};

/// Sub-samples per pixel axis when integrating a star profile.
const SUBSAMPLES: usize = 8;

/// Half-width of the rendered star stamp, in PSF sigmas.
const STAMP_SIGMAS: f64 = 6.0;

/// Frame filled with a constant sky level.
pub fn flat_frame(width: usize, height: usize, level: f32) -> Buffer2<f32> {
    Buffer2::new_filled(width, height, level)
}

/// Add a circular Gaussian star of total `flux`, integrated over each pixel.
///
/// Returns the flux actually deposited on the frame (less than `flux` only when
/// the star is clipped by the frame edge).
pub fn add_gaussian_star(pixels: &mut Buffer2<f32>, center: DVec2, flux: f64, sigma: f64) -> f64 {
    assert!(sigma > 0.0, "sigma must be positive, got {}", sigma);

    let half = STAMP_SIGMAS * sigma;
    let x_min = (center.x - half).floor().max(0.0) as usize;
    let y_min = (center.y - half).floor().max(0.0) as usize;
    let x_max = ((center.x + half).ceil().max(0.0) as usize).min(pixels.width().saturating_sub(1));
    let y_max = ((center.y + half).ceil().max(0.0) as usize).min(pixels.height().saturating_sub(1));

    let norm = flux / (2.0 * PI * sigma * sigma);
    let inv_two_sigma_sq = 1.0 / (2.0 * sigma * sigma);
    let step = 1.0 / SUBSAMPLES as f64;
    let sample_area = step * step;

    let mut deposited = 0.0;
    for y in y_min..=y_max {
        for x in x_min..=x_max {
            let mut sum = 0.0;
            for j in 0..SUBSAMPLES {
                let sy = y as f64 - 0.5 + (j as f64 + 0.5) * step - center.y;
                for i in 0..SUBSAMPLES {
                    let sx = x as f64 - 0.5 + (i as f64 + 0.5) * step - center.x;
                    sum += (-(sx * sx + sy * sy) * inv_two_sigma_sq).exp();
                }
            }
            let value = norm * sum * sample_area;
            pixels[(x, y)] += value as f32;
            deposited += value;
        }
    }

    deposited
}

/// Draw from a Poisson distribution with mean `lambda`.
///
/// Non-positive or non-finite means draw zero.
pub fn poisson<R: Rng + ?Sized>(lambda: f64, rng: &mut R) -> f64 {
    match Poisson::new(lambda) {
        Ok(dist) => dist.sample(rng),
        Err(_) => 0.0,
    }
}

pub fn standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    StandardNormal.sample(rng)
}

/// Replace every pixel by a Poisson draw with the pixel value as mean.
pub fn add_poisson_noise<R: Rng + ?Sized>(pixels: &mut Buffer2<f32>, rng: &mut R) {
    for value in pixels.pixels_mut() {
        *value = poisson(*value as f64, rng) as f32;
    }
}

/// A star in a synthetic sequence.
#[derive(Debug, Clone, Copy)]
pub struct SyntheticStar {
    pub position: DVec2,
    /// Mean flux in ADU.
    pub flux: f64,
    /// Fractional sinusoidal amplitude; 0 for a constant star.
    pub amplitude: f64,
    /// Variability period in time units.
    pub period: f64,
}

impl SyntheticStar {
    pub fn constant(position: DVec2, flux: f64) -> Self {
        Self {
            position,
            flux,
            amplitude: 0.0,
            period: 1.0,
        }
    }

    pub fn flux_at(&self, elapsed: f64) -> f64 {
        if self.amplitude == 0.0 || self.period <= 0.0 {
            return self.flux;
        }
        self.flux * (1.0 + self.amplitude * (2.0 * PI * elapsed / self.period).sin())
    }
}

/// Parameters for [`generate_sequence`].
#[derive(Debug, Clone)]
pub struct SequenceConfig {
    pub width: usize,
    pub height: usize,
    pub frames: usize,
    /// Sky level in ADU.
    pub background: f64,
    /// PSF sigma in pixels.
    pub psf_sigma: f64,
    pub start_time: f64,
    /// Time between frames.
    pub cadence: f64,
    /// Standard deviation of the reported detection positions, in pixels.
    pub detection_jitter: f64,
    pub poisson_noise: bool,
    pub seed: u64,
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            width: 128,
            height: 128,
            frames: 10,
            background: 200.0,
            psf_sigma: 1.8,
            start_time: 2_460_000.5,
            cadence: 0.01,
            detection_jitter: 0.2,
            poisson_noise: true,
            seed: 42,
        }
    }
}

/// One generated frame with its detector output.
#[derive(Debug, Clone)]
pub struct SyntheticFrame {
    pub time: f64,
    pub pixels: Buffer2<f32>,
    /// Jittered star positions, in the order of the input stars.
    pub detections: Vec<DVec2>,
    /// Flux injected for each star, in the order of the input stars.
    pub injected: Vec<f64>,
}

/// Render a time series of frames for `stars`.
pub fn generate_sequence(config: &SequenceConfig, stars: &[SyntheticStar]) -> Vec<SyntheticFrame> {
    let mut rng = StdRng::seed_from_u64(config.seed);

    (0..config.frames)
        .map(|index| {
            let elapsed = index as f64 * config.cadence;
            let mut pixels = flat_frame(config.width, config.height, config.background as f32);

            let injected = stars
                .iter()
                .map(|star| {
                    add_gaussian_star(
                        &mut pixels,
                        star.position,
                        star.flux_at(elapsed),
                        config.psf_sigma,
                    )
                })
                .collect();

            if config.poisson_noise {
                add_poisson_noise(&mut pixels, &mut rng);
            }

            let detections = stars
                .iter()
                .map(|star| {
                    let jitter = DVec2::new(standard_normal(&mut rng), standard_normal(&mut rng));
                    star.position + jitter * config.detection_jitter
                })
                .collect();

            SyntheticFrame {
                time: config.start_time + elapsed,
                pixels,
                detections,
                injected,
            }
        })
        .collect()
}
