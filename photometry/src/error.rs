//! Error types for photometry, configuration and session operations.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::catalog::StarLabel;
use crate::frame::ImageId;

/// Per-star failure of the photometric calculator.
///
/// Never aborts a batch: the session records it as that star's outcome.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum PhotometryError {
    #[error("Background-subtracted flux {net_flux:.3} ADU is not positive; magnitude undefined")]
    NonPositiveFlux { net_flux: f64, flux_error: f64 },

    #[error("Aperture at ({x:.2}, {y:.2}) does not overlap the image")]
    EmptyAperture { x: f64, y: f64 },
}

/// Errors raised while loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Format(#[from] common::FileExtensionError),

    #[error("Failed to parse YAML config: {0}")]
    Yaml(#[from] serde_yml::Error),

    #[error("Failed to parse JSON config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Lookup failures at the session boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("Image {0} is not loaded")]
    UnknownImage(ImageId),

    #[error("Image {0} is already loaded")]
    DuplicateImage(ImageId),

    #[error("Star {0} is not in the catalog")]
    UnknownIdentity(StarLabel),
}
