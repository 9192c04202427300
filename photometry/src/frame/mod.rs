//! Loaded images and the measurements detected in each.


use common::Buffer2;
use glam::DVec2;
use hashbrown::HashMap;

use crate::measurement::{PixelKey, StarMeasurement};
use crate::spatial::SpatialIndex;

common::id_type!(ImageId);

/// Linear mapping from stored to physical pixel values.
///
/// `physical = raw * scale + offset`, as with FITS `BSCALE`/`BZERO`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelScaling {
    pub offset: f64,
    pub scale: f64,
}

impl PixelScaling {
    pub const IDENTITY: Self = Self {
        offset: 0.0,
        scale: 1.0,
    };

    #[inline]
    pub fn apply(&self, raw: f32) -> f32 {
        (raw as f64 * self.scale + self.offset) as f32
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }
}

impl Default for PixelScaling {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// One loaded image: scaled pixels, observation time and its measurements.
#[derive(Debug)]
pub struct Frame {
    id: ImageId,
    time: f64,
    scaling: PixelScaling,
    pixels: Buffer2<f32>,
    measurements: ImageMeasurements,
}

impl Frame {
    /// Create a frame from raw pixel values. Pixels are stored scaled.
    pub fn new(time: f64, raw: Buffer2<f32>, scaling: PixelScaling) -> Self {
        Self::with_id(ImageId::unique(), time, raw, scaling)
    }

    pub fn with_id(id: ImageId, time: f64, raw: Buffer2<f32>, scaling: PixelScaling) -> Self {
        let pixels = if scaling.is_identity() {
            raw
        } else {
            raw.map(|&v| scaling.apply(v))
        };
        Self {
            id,
            time,
            scaling,
            pixels,
            measurements: ImageMeasurements::default(),
        }
    }

    pub fn id(&self) -> ImageId {
        self.id
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn scaling(&self) -> PixelScaling {
        self.scaling
    }

    /// Physical (scaled) pixel values.
    pub fn pixels(&self) -> &Buffer2<f32> {
        &self.pixels
    }

    pub fn measurements(&self) -> &ImageMeasurements {
        &self.measurements
    }

    pub fn measurements_mut(&mut self) -> &mut ImageMeasurements {
        &mut self.measurements
    }

    pub(crate) fn parts_mut(&mut self) -> (&Buffer2<f32>, &mut ImageMeasurements) {
        (&self.pixels, &mut self.measurements)
    }
}

/// Measurements of one image, keyed by rounded pixel coordinate, with a
/// lazily rebuilt spatial index over their precise positions.
#[derive(Debug, Default)]
pub struct ImageMeasurements {
    by_key: HashMap<PixelKey, StarMeasurement>,
    index: SpatialIndex<PixelKey>,
}

impl ImageMeasurements {
    /// Insert a measurement, returning the one it replaced at the same key.
    pub fn add(&mut self, measurement: StarMeasurement) -> Option<StarMeasurement> {
        let key = measurement.key();
        let position = measurement.position();

        let previous = self.by_key.insert(key, measurement);
        if previous.is_some() {
            self.index.remove(key);
        }
        self.index.insert(key, position);
        previous
    }

    /// Remove the measurement at `key`. Absent keys are a no-op.
    pub fn remove(&mut self, key: PixelKey) -> Option<StarMeasurement> {
        let removed = self.by_key.remove(&key)?;
        self.index.remove(key);
        Some(removed)
    }

    /// Nearest measurement within `tolerance` pixels of `(x, y)`.
    pub fn nearest(&mut self, x: f64, y: f64, tolerance: f64) -> Option<&StarMeasurement> {
        let (key, _) = self.index.nearest(DVec2::new(x, y), tolerance)?;
        self.by_key.get(&key)
    }

    pub fn get(&self, key: PixelKey) -> Option<&StarMeasurement> {
        self.by_key.get(&key)
    }

    pub fn get_mut(&mut self, key: PixelKey) -> Option<&mut StarMeasurement> {
        self.by_key.get_mut(&key)
    }

    pub fn contains(&self, key: PixelKey) -> bool {
        self.by_key.contains_key(&key)
    }

    pub fn keys(&self) -> impl Iterator<Item = PixelKey> + '_ {
        self.by_key.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StarMeasurement> {
        self.by_key.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut StarMeasurement> {
        self.by_key.values_mut()
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}
