//! A photometry session: loaded frames, their measurements and the catalog.
//!
//! The session is the single writer for catalog and measurement state.
//! Photometry over many stars runs in parallel into per-star result slots,
//! then results are applied on the calling thread. Share a session between
//! tasks through [`SharedSession`].
//!
//! Differential values of an image are dropped whenever its set of
//! comparison measurements changes: ensemble membership, removal,
//! registration or re-measurement of a comparison star.


use glam::DVec2;
use hashbrown::HashMap;
use rayon::prelude::*;

use crate::aperture::{Photometer, Photometry};
use crate::catalog::{Catalog, CatalogEvent, ListenerId, Registration, StarLabel};
use crate::config::PhotometryConfig;
use crate::differential::combine;
use crate::error::{PhotometryError, SessionError};
use crate::frame::{Frame, ImageId};
use crate::measurement::{Magnitude, MeasurementRef, StarMeasurement};

/// Session behind a lock, for use from several tasks.
pub type SharedSession = common::Shared<Session>;

/// Result of measuring one star in one image.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementOutcome {
    pub measurement: MeasurementRef,
    pub result: Result<Photometry, PhotometryError>,
}

impl MeasurementOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// One point of a differential light curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightCurvePoint {
    pub time: f64,
    pub magnitude: f64,
    pub error: f64,
    pub image: ImageId,
}

/// What a remove request applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// Unload the image and every measurement in it.
    Image(ImageId),
    /// Delete the star from every image.
    Identity(StarLabel),
    /// Drop the star's differential results, keeping its measurements.
    Graph(StarLabel),
}

#[derive(Debug)]
pub struct Session {
    config: PhotometryConfig,
    frames: HashMap<ImageId, Frame>,
    catalog: Catalog,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(PhotometryConfig::default())
    }
}

impl Session {
    pub fn new(config: PhotometryConfig) -> Self {
        config.validate();
        let catalog = Catalog::new(config.match_tolerance);
        Self {
            config,
            frames: HashMap::new(),
            catalog,
        }
    }

    pub fn config(&self) -> &PhotometryConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Nearest identity within `tolerance` pixels of `(x, y)`.
    pub fn find_nearest(&mut self, x: f64, y: f64, tolerance: f64) -> Option<StarLabel> {
        self.catalog
            .find_nearest(x, y, tolerance)
            .map(|identity| identity.label())
    }

    /// Flag or unflag `label` as a comparison star.
    pub fn set_ensemble(
        &mut self,
        label: StarLabel,
        in_ensemble: bool,
    ) -> Result<(), SessionError> {
        let identity = self
            .catalog
            .identity(label)
            .ok_or(SessionError::UnknownIdentity(label))?;
        if identity.in_ensemble() == in_ensemble {
            return Ok(());
        }

        let images: Vec<ImageId> = identity.measurements().map(|r| r.image).collect();
        self.catalog.set_ensemble(label, in_ensemble)?;
        for image in images {
            self.clear_differentials(image);
        }
        Ok(())
    }

    pub fn set_name(&mut self, label: StarLabel, name: Option<String>) -> Result<(), SessionError> {
        self.catalog.set_name(label, name)
    }

    pub fn subscribe(
        &mut self,
        callback: impl Fn(&CatalogEvent) + Send + Sync + 'static,
    ) -> ListenerId {
        self.catalog.subscribe(callback)
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.catalog.unsubscribe(id)
    }

    pub fn frame(&self, image: ImageId) -> Option<&Frame> {
        self.frames.get(&image)
    }

    /// Loaded frames in observation order.
    pub fn frames(&self) -> Vec<&Frame> {
        let mut frames: Vec<&Frame> = self.frames.values().collect();
        frames.sort_by(|a, b| a.time().total_cmp(&b.time()).then(a.id().cmp(&b.id())));
        frames
    }

    // ------------------------------------------------------------------------
    // Frames
    // ------------------------------------------------------------------------

    pub fn load_frame(&mut self, frame: Frame) -> Result<ImageId, SessionError> {
        let id = frame.id();
        if self.frames.contains_key(&id) {
            return Err(SessionError::DuplicateImage(id));
        }

        let mut existing: Vec<StarMeasurement> = frame.measurements().iter().cloned().collect();
        existing.sort_by_key(|m| m.key());
        self.frames.insert(id, frame);
        for measurement in existing {
            self.register(measurement)?;
        }

        tracing::info!(image = %id, frames = self.frames.len(), "Loaded frame");
        Ok(id)
    }

    /// Unload a frame, removing its measurements from the catalog.
    pub fn unload_frame(&mut self, image: ImageId) -> Result<Frame, SessionError> {
        let frame = self
            .frames
            .remove(&image)
            .ok_or(SessionError::UnknownImage(image))?;

        let mut detached = 0;
        for measurement in frame.measurements().iter() {
            if self.catalog.unregister(measurement.reference()).is_some() {
                detached += 1;
            }
        }

        tracing::info!(
            image = %image,
            detached,
            identities = self.catalog.len(),
            "Unloaded frame"
        );
        Ok(frame)
    }

    // ------------------------------------------------------------------------
    // Measurements
    // ------------------------------------------------------------------------

    /// Place a star at `(x, y)` in `image` and register it in the catalog.
    pub fn add_measurement(
        &mut self,
        image: ImageId,
        x: f64,
        y: f64,
    ) -> Result<Registration, SessionError> {
        let time = self
            .frames
            .get(&image)
            .ok_or(SessionError::UnknownImage(image))?
            .time();
        self.register(StarMeasurement::new(image, x, y, time))
    }

    /// Register detector centroids for `image`. Labels are in input order.
    pub fn add_detections(
        &mut self,
        image: ImageId,
        centroids: &[DVec2],
    ) -> Result<Vec<StarLabel>, SessionError> {
        let labels = centroids
            .iter()
            .map(|c| self.add_measurement(image, c.x, c.y).map(|r| r.label))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(
            image = %image,
            detections = centroids.len(),
            identities = self.catalog.len(),
            "Registered detections"
        );
        Ok(labels)
    }

    fn register(&mut self, measurement: StarMeasurement) -> Result<Registration, SessionError> {
        let image = measurement.image;
        if !self.frames.contains_key(&image) {
            return Err(SessionError::UnknownImage(image));
        }

        let was_reference = self.is_reference(measurement.reference());
        let registration = self.catalog.register(&measurement);
        let is_reference = self
            .catalog
            .identity(registration.label)
            .is_some_and(|identity| identity.in_ensemble());

        if let Some(frame) = self.frames.get_mut(&image) {
            if let Some(displaced) = registration.displaced {
                frame.measurements_mut().remove(displaced.key);
            }
            frame.measurements_mut().add(measurement);
        }

        if was_reference || is_reference {
            self.clear_differentials(image);
        }
        Ok(registration)
    }

    /// Delete a measurement from its image and the catalog. Unknown
    /// measurements are a no-op.
    pub fn remove_measurement(&mut self, measurement: MeasurementRef) -> Option<StarMeasurement> {
        let was_reference = self.is_reference(measurement);
        self.catalog.unregister(measurement);
        let removed = self
            .frames
            .get_mut(&measurement.image)?
            .measurements_mut()
            .remove(measurement.key);

        if was_reference {
            self.clear_differentials(measurement.image);
        }
        removed
    }

    /// Whether `measurement` belongs to an ensemble identity.
    fn is_reference(&self, measurement: MeasurementRef) -> bool {
        self.catalog
            .identity_for(measurement)
            .is_some_and(|identity| identity.in_ensemble())
    }

    /// Drop every differential value in `image`.
    fn clear_differentials(&mut self, image: ImageId) {
        let Some(frame) = self.frames.get_mut(&image) else {
            return;
        };

        let mut cleared = 0;
        for measurement in frame.measurements_mut().iter_mut() {
            if measurement.differential.take().is_some() {
                cleared += 1;
            }
        }
        if cleared > 0 {
            tracing::debug!(%image, cleared, "Cleared stale differential values");
        }
    }

    pub fn measurement(&self, measurement: MeasurementRef) -> Option<&StarMeasurement> {
        self.frames
            .get(&measurement.image)?
            .measurements()
            .get(measurement.key)
    }

    fn measurement_mut(&mut self, measurement: MeasurementRef) -> Option<&mut StarMeasurement> {
        self.frames
            .get_mut(&measurement.image)?
            .measurements_mut()
            .get_mut(measurement.key)
    }

    // ------------------------------------------------------------------------
    // Photometry
    // ------------------------------------------------------------------------

    /// Measure every star in one image.
    pub fn measure_image(
        &mut self,
        image: ImageId,
    ) -> Result<Vec<MeasurementOutcome>, SessionError> {
        let frame = self
            .frames
            .get(&image)
            .ok_or(SessionError::UnknownImage(image))?;

        let outcomes = compute_frame(frame, &self.config);
        self.apply_outcomes(&outcomes);
        Ok(outcomes)
    }

    /// Measure every star in every loaded image.
    ///
    /// One star failing never affects the others; each outcome carries its
    /// own result.
    pub fn measure_all(&mut self) -> Vec<MeasurementOutcome> {
        let config = &self.config;
        let frames = self.frames();

        let outcomes: Vec<MeasurementOutcome> = frames
            .par_iter()
            .flat_map_iter(|frame| compute_frame(frame, config))
            .collect();

        self.apply_outcomes(&outcomes);
        outcomes
    }

    fn apply_outcomes(&mut self, outcomes: &[MeasurementOutcome]) {
        let mut failed = 0;
        let mut touched: Vec<ImageId> = Vec::new();
        for outcome in outcomes {
            if !outcome.is_ok() {
                failed += 1;
            }
            if self.is_reference(outcome.measurement) {
                touched.push(outcome.measurement.image);
            }
            if let Some(measurement) = self.measurement_mut(outcome.measurement) {
                measurement.apply(&outcome.result);
            }
        }

        touched.sort();
        touched.dedup();
        for image in touched {
            self.clear_differentials(image);
        }

        tracing::info!(
            measured = outcomes.len() - failed,
            failed,
            "Applied photometry results"
        );
    }

    // ------------------------------------------------------------------------
    // Differential photometry
    // ------------------------------------------------------------------------

    /// Recompute the differential magnitude of `target` in every image
    /// against the ensemble stars measured in that image.
    ///
    /// Images where the target or all references lack a magnitude end up
    /// with no differential value. Returns the number of images that got one.
    pub fn apply_differential(&mut self, target: StarLabel) -> Result<usize, SessionError> {
        let identity = self
            .catalog
            .identity(target)
            .ok_or(SessionError::UnknownIdentity(target))?;

        let references: Vec<StarLabel> = self
            .catalog
            .ensemble()
            .into_iter()
            .filter(|&label| label != target)
            .collect();

        let mut updates: Vec<(MeasurementRef, Option<Magnitude>)> = Vec::new();
        for target_ref in identity.measurements() {
            let Some(measured) = self.measurement(target_ref) else {
                continue;
            };
            let mut base = measured.clone();
            base.differential = None;

            let comparison: Vec<&StarMeasurement> = references
                .iter()
                .filter_map(|&label| self.catalog.identity(label)?.measurement(target_ref.image))
                .filter_map(|r| self.measurement(r))
                .collect();

            updates.push((target_ref, combine(&base, &comparison).differential));
        }

        let mut applied = 0;
        for (reference, differential) in updates {
            if differential.is_some() {
                applied += 1;
            }
            if let Some(measurement) = self.measurement_mut(reference) {
                measurement.differential = differential;
            }
        }

        tracing::debug!(
            %target,
            references = references.len(),
            applied,
            "Applied differential photometry"
        );
        Ok(applied)
    }

    /// Time-ordered differential light curve of `target`.
    pub fn light_curve(&self, target: StarLabel) -> Result<Vec<LightCurvePoint>, SessionError> {
        let identity = self
            .catalog
            .identity(target)
            .ok_or(SessionError::UnknownIdentity(target))?;

        let mut points: Vec<LightCurvePoint> = identity
            .measurements()
            .filter_map(|r| self.measurement(r))
            .filter_map(|m| {
                let differential = m.differential?;
                Some(LightCurvePoint {
                    time: m.time,
                    magnitude: differential.value,
                    error: differential.error,
                    image: m.image,
                })
            })
            .collect();

        points.sort_by(|a, b| a.time.total_cmp(&b.time));
        Ok(points)
    }

    /// Differential light curves of every star outside the ensemble.
    pub fn ensemble_light_curves(&mut self) -> Vec<(StarLabel, Vec<LightCurvePoint>)> {
        let targets: Vec<StarLabel> = self
            .catalog
            .identities()
            .filter(|identity| !identity.in_ensemble())
            .map(|identity| identity.label())
            .collect();

        let mut curves = Vec::with_capacity(targets.len());
        for target in targets {
            if self.apply_differential(target).is_err() {
                continue;
            }
            if let Ok(points) = self.light_curve(target) {
                curves.push((target, points));
            }
        }
        curves
    }

    // ------------------------------------------------------------------------
    // Removal
    // ------------------------------------------------------------------------

    pub fn remove(&mut self, selection: Selection) -> Result<(), SessionError> {
        match selection {
            Selection::Image(image) => {
                self.unload_frame(image)?;
            }
            Selection::Identity(label) => {
                let references = self.identity_measurements(label)?;
                for reference in references {
                    self.remove_measurement(reference);
                }
                debug_assert!(!self.catalog.contains(label));
            }
            Selection::Graph(label) => {
                let references = self.identity_measurements(label)?;
                for reference in references {
                    if let Some(measurement) = self.measurement_mut(reference) {
                        measurement.differential = None;
                    }
                }
            }
        }
        Ok(())
    }

    fn identity_measurements(&self, label: StarLabel) -> Result<Vec<MeasurementRef>, SessionError> {
        let identity = self
            .catalog
            .identity(label)
            .ok_or(SessionError::UnknownIdentity(label))?;
        Ok(identity.measurements().collect())
    }
}

/// Photometry for every measurement of one frame, in key order.
fn compute_frame(frame: &Frame, config: &PhotometryConfig) -> Vec<MeasurementOutcome> {
    let photometer = Photometer::new(frame.pixels(), config);

    let mut targets: Vec<&StarMeasurement> = frame.measurements().iter().collect();
    targets.sort_by_key(|m| m.key());

    targets
        .par_iter()
        .map(|m| MeasurementOutcome {
            measurement: m.reference(),
            result: photometer.measure(m.position()),
        })
        .collect()
}
