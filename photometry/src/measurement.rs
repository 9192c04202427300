//! Per-image star observations.

use glam::DVec2;

use crate::aperture::Photometry;
use crate::error::PhotometryError;
use crate::frame::ImageId;

/// Rounded pixel coordinate identifying a measurement within one image.
///
/// Sub-pixel jitter between repeated placements of the same star maps to the
/// same key, while the measurement keeps its precise position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PixelKey {
    pub x: i64,
    pub y: i64,
}

impl PixelKey {
    pub fn from_position(x: f64, y: f64) -> Self {
        Self {
            x: x.round() as i64,
            y: y.round() as i64,
        }
    }
}

/// Non-owning handle to a measurement: its image and its key there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeasurementRef {
    pub image: ImageId,
    pub key: PixelKey,
}

/// A magnitude with its 1-sigma uncertainty.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Magnitude {
    pub value: f64,
    pub error: f64,
}

impl Magnitude {
    pub fn new(value: f64, error: f64) -> Self {
        Self { value, error }
    }
}

/// Background-subtracted flux in ADU with its 1-sigma uncertainty.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FluxMeasurement {
    pub net_flux: f64,
    pub flux_error: f64,
}

/// One observation of one star in one image.
///
/// Magnitude value and error are stored together, so they are set and
/// cleared as a unit. The differential magnitude is only present while the
/// instrumental magnitude is.
#[derive(Debug, Clone, PartialEq)]
pub struct StarMeasurement {
    pub image: ImageId,
    pub x: f64,
    pub y: f64,
    /// Observation time of the owning image.
    pub time: f64,
    pub flux: Option<FluxMeasurement>,
    pub magnitude: Option<Magnitude>,
    pub differential: Option<Magnitude>,
}

impl StarMeasurement {
    pub fn new(image: ImageId, x: f64, y: f64, time: f64) -> Self {
        Self {
            image,
            x,
            y,
            time,
            flux: None,
            magnitude: None,
            differential: None,
        }
    }

    pub fn position(&self) -> DVec2 {
        DVec2::new(self.x, self.y)
    }

    pub fn key(&self) -> PixelKey {
        PixelKey::from_position(self.x, self.y)
    }

    pub fn reference(&self) -> MeasurementRef {
        MeasurementRef {
            image: self.image,
            key: self.key(),
        }
    }

    /// Store a photometry outcome.
    ///
    /// A failure leaves the star unmeasured in this image: magnitude and
    /// differential are cleared. A non-positive flux is still recorded.
    pub fn apply(&mut self, result: &Result<Photometry, PhotometryError>) {
        self.differential = None;
        match *result {
            Ok(ref photometry) => {
                self.flux = Some(FluxMeasurement {
                    net_flux: photometry.net_flux,
                    flux_error: photometry.flux_error,
                });
                self.magnitude = Some(Magnitude::new(
                    photometry.magnitude,
                    photometry.magnitude_error,
                ));
            }
            Err(PhotometryError::NonPositiveFlux {
                net_flux,
                flux_error,
            }) => {
                self.flux = Some(FluxMeasurement {
                    net_flux,
                    flux_error,
                });
                self.magnitude = None;
            }
            Err(PhotometryError::EmptyAperture { .. }) => {
                self.flux = None;
                self.magnitude = None;
            }
        }
    }

    /// Drop all photometry results.
    pub fn clear(&mut self) {
        self.flux = None;
        self.magnitude = None;
        self.differential = None;
    }
}
