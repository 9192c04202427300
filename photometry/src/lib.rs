//! Photometry - cross-image star identities and differential aperture photometry.
//!
//! This library provides:
//! - A catalog that resolves per-image star detections into persistent identities
//! - Aperture photometry with exact sub-pixel apertures and propagated errors
//! - Differential magnitudes against an ensemble of comparison stars
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use photometry::{Frame, PhotometryConfig, PixelScaling, Session};
//!
//! let mut session = Session::new(PhotometryConfig::default());
//! let image = session.load_frame(Frame::new(2460000.5, pixels, PixelScaling::IDENTITY))?;
//! let labels = session.add_detections(image, &centroids)?;
//!
//! session.measure_all();
//! session.set_ensemble(labels[1], true)?;
//! session.apply_differential(labels[0])?;
//! let curve = session.light_curve(labels[0])?;
//! ```

pub mod aperture;
pub mod catalog;
pub mod config;
pub mod differential;
pub mod error;
pub mod frame;
pub(crate) mod math;
pub mod measurement;
pub mod session;
pub(crate) mod spatial;
pub mod synthetic;

// ============================================================================
// Core data types
// ============================================================================

pub use frame::{Frame, ImageId, ImageMeasurements, PixelScaling};
pub use measurement::{FluxMeasurement, Magnitude, MeasurementRef, PixelKey, StarMeasurement};

// ============================================================================
// Configuration and errors
// ============================================================================

pub use config::PhotometryConfig;
pub use error::{ConfigError, PhotometryError, SessionError};

// ============================================================================
// Photometry
// ============================================================================

pub use aperture::{BackgroundSource, Photometer, Photometry, measure};
pub use differential::{combine, differential_magnitude};

// ============================================================================
// Catalog
// ============================================================================

pub use catalog::{
    Catalog, CatalogEvent, DEFAULT_MATCH_TOLERANCE, ListenerId, Registration, StarIdentity,
    StarLabel,
};

// ============================================================================
// Session
// ============================================================================

pub use session::{LightCurvePoint, MeasurementOutcome, Selection, Session, SharedSession};
