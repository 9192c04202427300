//! Aperture photometry with exact sub-pixel apertures.
//!
//! # Algorithm
//!
//! 1. Sum pixel values inside a circular aperture, weighting each pixel by its
//!    exact fractional coverage.
//! 2. Estimate the sky from the annulus pixels (weighted by annulus coverage)
//!    with sigma-clipped median/MAD. An annulus with no pixels inside the image
//!    falls back to sigma-clipped statistics over the whole frame.
//! 3. Subtract `sky_median × aperture_area` from the aperture sum.
//! 4. Propagate shot noise, sky noise, sky-mean uncertainty and read noise
//!    in electrons, then convert back to ADU.
//! 5. Convert flux to magnitude, failing with
//!    [`PhotometryError::NonPositiveFlux`] when the logarithm is undefined.

pub mod geometry;

#[cfg(test)]
mod tests;

use std::sync::OnceLock;

use common::Buffer2;
use glam::DVec2;
use strum_macros::Display;

use crate::config::PhotometryConfig;
use crate::error::PhotometryError;
use crate::math::MAGNITUDE_ERROR_FACTOR;
use crate::math::statistics::{
    ClippedStats, WeightedSample, sigma_clipped_median_mad, weighted_sigma_clipped,
};
use geometry::pixel_coverage;

/// Coverage below this is treated as no coverage.
const MIN_COVERAGE: f64 = 1e-12;

/// Where the sky level for a measurement came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum BackgroundSource {
    /// Local annulus around the star.
    Annulus,
    /// Whole-frame statistics; the annulus had no pixels inside the image.
    GlobalFallback,
}

/// Sky level estimate used for one measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
struct SkyEstimate {
    median: f64,
    rms: f64,
    /// Effective number of pixels behind the estimate.
    area: f64,
    source: BackgroundSource,
}

/// Output of a successful aperture measurement. Fluxes are in ADU.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Photometry {
    pub net_flux: f64,
    pub flux_error: f64,
    pub magnitude: f64,
    pub magnitude_error: f64,
    /// Sky level per pixel.
    pub background: f64,
    /// Robust sky standard deviation per pixel.
    pub background_rms: f64,
    /// In-image aperture area in pixels.
    pub aperture_area: f64,
    /// Effective sky sample area in pixels.
    pub annulus_area: f64,
    pub background_source: BackgroundSource,
    pub snr: f64,
}

/// Measures stars on one frame with one configuration.
///
/// The whole-frame sky used by the empty-annulus fallback is computed at most
/// once and shared between measurements, including across rayon workers.
pub struct Photometer<'a> {
    pixels: &'a Buffer2<f32>,
    config: &'a PhotometryConfig,
    global_sky: OnceLock<SkyEstimate>,
}

impl<'a> Photometer<'a> {
    pub fn new(pixels: &'a Buffer2<f32>, config: &'a PhotometryConfig) -> Self {
        config.validate();
        Self {
            pixels,
            config,
            global_sky: OnceLock::new(),
        }
    }

    /// Measure the star centered at `position`.
    pub fn measure(&self, position: DVec2) -> Result<Photometry, PhotometryError> {
        let config = self.config;
        let (aperture_sum, aperture_area, mut annulus) = self.collect(position);

        if aperture_area <= MIN_COVERAGE {
            return Err(PhotometryError::EmptyAperture {
                x: position.x,
                y: position.y,
            });
        }

        let sky = if annulus.is_empty() {
            tracing::warn!(
                x = position.x,
                y = position.y,
                "Sky annulus has no pixels inside the image; using whole-frame background"
            );
            self.global_sky()
        } else {
            let area: f64 = annulus.iter().map(|s| s.weight).sum();
            let stats = weighted_sigma_clipped(
                &mut annulus,
                config.sigma_clip_kappa,
                config.sigma_clip_iterations,
            );
            SkyEstimate {
                median: stats.median,
                rms: stats.sigma,
                area,
                source: BackgroundSource::Annulus,
            }
        };

        let net_flux = aperture_sum - sky.median * aperture_area;
        let flux_error = flux_error(net_flux, aperture_area, &sky, config);

        if net_flux <= 0.0 {
            return Err(PhotometryError::NonPositiveFlux {
                net_flux,
                flux_error,
            });
        }

        let magnitude = -2.5 * net_flux.log10() + config.zero_point;
        let magnitude_error = MAGNITUDE_ERROR_FACTOR * (flux_error / net_flux);
        let snr = if flux_error > 0.0 {
            net_flux / flux_error
        } else {
            f64::INFINITY
        };

        Ok(Photometry {
            net_flux,
            flux_error,
            magnitude,
            magnitude_error,
            background: sky.median,
            background_rms: sky.rms,
            aperture_area,
            annulus_area: sky.area,
            background_source: sky.source,
            snr,
        })
    }

    /// Weighted aperture sum, in-image aperture area and weighted annulus samples.
    fn collect(&self, center: DVec2) -> (f64, f64, Vec<WeightedSample>) {
        let config = self.config;
        let r_outer = config.annulus_outer;

        let x_min = (center.x - r_outer - 0.5).floor().max(0.0) as isize;
        let y_min = (center.y - r_outer - 0.5).floor().max(0.0) as isize;
        let x_max = (center.x + r_outer + 0.5).ceil() as isize;
        let y_max = (center.y + r_outer + 0.5).ceil() as isize;

        let mut aperture_sum = 0.0;
        let mut aperture_area = 0.0;
        let mut annulus = Vec::new();

        for y in y_min..=y_max {
            for x in x_min..=x_max {
                let Some(&value) = self.pixels.get_signed(x, y) else {
                    continue;
                };
                let value = value as f64;
                let (px, py) = (x as f64, y as f64);

                let in_aperture =
                    pixel_coverage(px, py, center.x, center.y, config.aperture_radius);
                if in_aperture > MIN_COVERAGE {
                    aperture_sum += in_aperture * value;
                    aperture_area += in_aperture;
                }

                let in_annulus = pixel_coverage(px, py, center.x, center.y, r_outer)
                    - pixel_coverage(px, py, center.x, center.y, config.annulus_inner);
                if in_annulus > MIN_COVERAGE {
                    annulus.push(WeightedSample {
                        value,
                        weight: in_annulus,
                    });
                }
            }
        }

        (aperture_sum, aperture_area, annulus)
    }

    fn global_sky(&self) -> SkyEstimate {
        *self.global_sky.get_or_init(|| {
            let mut values: Vec<f64> = self.pixels.iter().map(|&v| v as f64).collect();
            let ClippedStats {
                median,
                sigma,
                count,
            } = sigma_clipped_median_mad(
                &mut values,
                &mut Vec::new(),
                self.config.sigma_clip_kappa,
                self.config.sigma_clip_iterations,
            );
            tracing::debug!(median, sigma, count, "Computed whole-frame background");
            SkyEstimate {
                median,
                rms: sigma,
                area: count as f64,
                source: BackgroundSource::GlobalFallback,
            }
        })
    }
}

/// Total flux error in ADU from independent variance terms in electrons².
fn flux_error(
    net_flux: f64,
    aperture_area: f64,
    sky: &SkyEstimate,
    config: &PhotometryConfig,
) -> f64 {
    let gain = config.gain;
    let net_electrons = net_flux * gain;
    let sky_rms_electrons = sky.rms * gain;
    let sky_variance = sky_rms_electrons * sky_rms_electrons;

    // Negative flux after subtraction contributes no shot noise.
    let shot = net_electrons.max(0.0);
    let sky_noise = aperture_area * sky_variance;
    let sky_mean = aperture_area * aperture_area / sky.area.max(1.0) * sky_variance;
    let read = aperture_area * config.read_noise * config.read_noise;

    (shot + sky_noise + sky_mean + read).sqrt() / gain
}

/// Measure a single star; see [`Photometer`] for measuring many on one frame.
pub fn measure(
    pixels: &Buffer2<f32>,
    position: DVec2,
    config: &PhotometryConfig,
) -> Result<Photometry, PhotometryError> {
    Photometer::new(pixels, config).measure(position)
}
