//! Configuration for aperture photometry and cross-image matching.
//!
//! A single flat [`PhotometryConfig`] holds every tunable, grouped by comments.
//! Files are YAML or JSON, chosen by extension; missing fields take defaults.

use std::path::Path;

use common::FileFormat;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;


/// Configuration for photometry and star matching.
///
/// # Example
///
/// ```rust,ignore
/// use photometry::PhotometryConfig;
///
/// let mut config = PhotometryConfig::default();
/// config.aperture_radius = 6.0;
/// config.annulus_inner = 9.0;
/// config.annulus_outer = 14.0;
/// config.validate();
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhotometryConfig {
    // -- Aperture geometry (pixels) --
    /// Radius of the measurement aperture.
    pub aperture_radius: f64,
    /// Inner radius of the sky annulus. Must exceed `aperture_radius`.
    pub annulus_inner: f64,
    /// Outer radius of the sky annulus. Must exceed `annulus_inner`.
    pub annulus_outer: f64,

    // -- Detector --
    /// Gain in electrons per ADU.
    pub gain: f64,
    /// Read noise in electrons.
    pub read_noise: f64,
    /// Magnitude zero point.
    pub zero_point: f64,

    // -- Sky statistics --
    /// Clipping threshold in units of robust sigma.
    pub sigma_clip_kappa: f64,
    /// Maximum number of clipping passes.
    pub sigma_clip_iterations: usize,

    // -- Matching --
    /// Maximum distance (pixels) at which a detection joins an existing star.
    pub match_tolerance: f64,
}

impl Default for PhotometryConfig {
    fn default() -> Self {
        Self {
            aperture_radius: 10.0,
            annulus_inner: 15.0,
            annulus_outer: 20.0,

            gain: 1.0,
            read_noise: 0.0,
            zero_point: 25.0,

            sigma_clip_kappa: 3.0,
            sigma_clip_iterations: 5,

            match_tolerance: crate::catalog::DEFAULT_MATCH_TOLERANCE,
        }
    }
}

impl PhotometryConfig {
    /// Check every invariant, returning the first violation as a message.
    pub fn check(&self) -> Result<(), String> {
        if !(self.aperture_radius > 0.0) {
            return Err(format!(
                "aperture_radius must be positive, got {}",
                self.aperture_radius
            ));
        }
        if !(self.annulus_inner > self.aperture_radius) {
            return Err(format!(
                "annulus_inner ({}) must be > aperture_radius ({})",
                self.annulus_inner, self.aperture_radius
            ));
        }
        if !(self.annulus_outer > self.annulus_inner) {
            return Err(format!(
                "annulus_outer ({}) must be > annulus_inner ({})",
                self.annulus_outer, self.annulus_inner
            ));
        }
        if !(self.gain > 0.0) {
            return Err(format!("gain must be positive, got {}", self.gain));
        }
        if !(self.read_noise >= 0.0) {
            return Err(format!(
                "read_noise must be non-negative, got {}",
                self.read_noise
            ));
        }
        if !self.zero_point.is_finite() {
            return Err(format!("zero_point must be finite, got {}", self.zero_point));
        }
        if !(self.sigma_clip_kappa > 0.0) {
            return Err(format!(
                "sigma_clip_kappa must be positive, got {}",
                self.sigma_clip_kappa
            ));
        }
        if self.sigma_clip_iterations == 0 {
            return Err("sigma_clip_iterations must be > 0".to_string());
        }
        if !(self.match_tolerance > 0.0) {
            return Err(format!(
                "match_tolerance must be positive, got {}",
                self.match_tolerance
            ));
        }
        Ok(())
    }

    /// Validate the configuration, panicking on the first violation.
    pub fn validate(&self) {
        if let Err(message) = self.check() {
            panic!("{}", message);
        }
    }

    /// Parse a configuration from text in the given format and check it.
    pub fn parse(text: &str, format: FileFormat) -> Result<Self, ConfigError> {
        let config: Self = match format {
            FileFormat::Yaml => serde_yml::from_str(text)?,
            FileFormat::Json => serde_json::from_str(text)?,
        };
        config.check().map_err(ConfigError::Invalid)?;
        Ok(config)
    }

    /// Load a configuration file, picking the format from its extension.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let format = FileFormat::from_path(path)?;
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let config = Self::parse(&text, format)?;
        tracing::info!(path = %path.display(), ?config, "Loaded photometry config");
        Ok(config)
    }
}
