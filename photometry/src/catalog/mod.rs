//! Cross-image star identities.
//!
//! The catalog resolves measurements from many images into persistent
//! [`StarIdentity`] entries by pixel proximity. Each identity holds at most one
//! measurement per image. Measurements are owned by their frames; the catalog
//! only keeps [`MeasurementRef`] handles plus a back-reference table from
//! measurement to identity, so removal never depends on a spatial re-query.
//!
//! Labels are a strictly increasing sequence starting at 1. A label whose
//! identity was destroyed is never handed out again.

mod events;


use std::collections::BTreeMap;
use std::fmt;

use glam::DVec2;
use hashbrown::HashMap;

use crate::error::SessionError;
use crate::frame::ImageId;
use crate::measurement::{MeasurementRef, StarMeasurement};
use crate::spatial::SpatialIndex;
pub use events::{CatalogEvent, ListenerId};
use events::Listeners;

/// Match distance in pixels used when none is configured.
pub const DEFAULT_MATCH_TOLERANCE: f64 = 3.0;

/// Persistent label of a star identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StarLabel(u64);

impl StarLabel {
    pub const fn from_raw(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for StarLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The same star across images.
#[derive(Debug, Clone, PartialEq)]
pub struct StarIdentity {
    label: StarLabel,
    /// Position of the measurement that created the identity; matching is
    /// done against this point.
    position: DVec2,
    measurements: BTreeMap<ImageId, MeasurementRef>,
    in_ensemble: bool,
    name: Option<String>,
}

impl StarIdentity {
    pub fn label(&self) -> StarLabel {
        self.label
    }

    pub fn position(&self) -> DVec2 {
        self.position
    }

    /// Measurement of this star in `image`, if any.
    pub fn measurement(&self, image: ImageId) -> Option<MeasurementRef> {
        self.measurements.get(&image).copied()
    }

    pub fn measurements(&self) -> impl Iterator<Item = MeasurementRef> + '_ {
        self.measurements.values().copied()
    }

    pub fn measurement_count(&self) -> usize {
        self.measurements.len()
    }

    /// Whether this star is a comparison star for differential photometry.
    pub fn in_ensemble(&self) -> bool {
        self.in_ensemble
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

/// Outcome of [`Catalog::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registration {
    pub label: StarLabel,
    /// A new identity was allocated for this measurement.
    pub created: bool,
    /// Measurement from the same image that this one replaced in the identity.
    pub displaced: Option<MeasurementRef>,
}

/// Registry of star identities across all loaded images.
pub struct Catalog {
    identities: BTreeMap<StarLabel, StarIdentity>,
    owners: HashMap<MeasurementRef, StarLabel>,
    index: SpatialIndex<StarLabel>,
    next_label: u64,
    match_tolerance: f64,
    listeners: Listeners,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new(DEFAULT_MATCH_TOLERANCE)
    }
}

impl fmt::Debug for Catalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Catalog")
            .field("identities", &self.identities.len())
            .field("measurements", &self.owners.len())
            .field("next_label", &self.next_label)
            .field("match_tolerance", &self.match_tolerance)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl Catalog {
    pub fn new(match_tolerance: f64) -> Self {
        assert!(
            match_tolerance > 0.0,
            "match_tolerance must be positive, got {}",
            match_tolerance
        );
        Self {
            identities: BTreeMap::new(),
            owners: HashMap::new(),
            index: SpatialIndex::new(),
            next_label: 1,
            match_tolerance,
            listeners: Listeners::default(),
        }
    }

    pub fn match_tolerance(&self) -> f64 {
        self.match_tolerance
    }

    /// Attach a measurement to the nearest identity within the match
    /// tolerance, or to a new identity if there is none.
    ///
    /// An identity's earlier measurement from the same image is replaced and
    /// reported in [`Registration::displaced`]. Registering a measurement that
    /// already belongs to a different identity moves it.
    pub fn register(&mut self, measurement: &StarMeasurement) -> Registration {
        let reference = measurement.reference();
        let position = measurement.position();

        let matched = self
            .index
            .nearest(position, self.match_tolerance)
            .map(|(label, _)| label);

        if let Some(&owner) = self.owners.get(&reference)
            && matched != Some(owner)
        {
            self.unregister(reference);
        }

        let (label, created, previous) = match matched.filter(|l| self.identities.contains_key(l)) {
            Some(label) => {
                let previous = self
                    .identities
                    .get_mut(&label)
                    .and_then(|identity| identity.measurements.insert(reference.image, reference));
                (label, false, previous)
            }
            None => (self.create_identity(position, reference), true, None),
        };

        let displaced = previous.filter(|&p| p != reference);
        if let Some(displaced) = displaced {
            self.owners.remove(&displaced);
            tracing::debug!(%label, ?displaced, "Replaced measurement from the same image");
            self.listeners.emit(CatalogEvent::MeasurementDetached {
                label,
                measurement: displaced,
            });
        }

        if previous != Some(reference) {
            self.owners.insert(reference, label);
            self.listeners.emit(CatalogEvent::MeasurementAttached {
                label,
                measurement: reference,
            });
        }

        Registration {
            label,
            created,
            displaced,
        }
    }

    fn create_identity(&mut self, position: DVec2, first: MeasurementRef) -> StarLabel {
        let label = StarLabel(self.next_label);
        self.next_label += 1;

        self.identities.insert(
            label,
            StarIdentity {
                label,
                position,
                measurements: BTreeMap::from([(first.image, first)]),
                in_ensemble: false,
                name: None,
            },
        );
        self.index.insert(label, position);

        tracing::debug!(%label, x = position.x, y = position.y, "Created star identity");
        self.listeners.emit(CatalogEvent::IdentityCreated(label));
        label
    }

    /// Detach a measurement from its identity, destroying the identity when
    /// it has no measurements left.
    ///
    /// Returns the former owner. Unknown measurements are a no-op.
    pub fn unregister(&mut self, measurement: MeasurementRef) -> Option<StarLabel> {
        let label = self.owners.remove(&measurement)?;
        let identity = self.identities.get_mut(&label)?;

        if identity.measurements.get(&measurement.image) == Some(&measurement) {
            identity.measurements.remove(&measurement.image);
        }
        self.listeners.emit(CatalogEvent::MeasurementDetached { label, measurement });

        if identity.measurements.is_empty() {
            self.identities.remove(&label);
            self.index.remove(label);
            tracing::debug!(%label, "Removed star identity with no measurements");
            self.listeners.emit(CatalogEvent::IdentityRemoved(label));
        }

        Some(label)
    }

    /// Nearest identity within `tolerance` pixels of `(x, y)`.
    pub fn find_nearest(&mut self, x: f64, y: f64, tolerance: f64) -> Option<&StarIdentity> {
        let (label, _) = self.index.nearest(DVec2::new(x, y), tolerance)?;
        self.identities.get(&label)
    }

    /// Identities within `radius` pixels of `(x, y)`, nearest first.
    pub fn within(&mut self, x: f64, y: f64, radius: f64) -> Vec<StarLabel> {
        self.index
            .within(DVec2::new(x, y), radius)
            .into_iter()
            .map(|(label, _)| label)
            .collect()
    }

    /// Identity owning `measurement`.
    pub fn identity_for(&self, measurement: MeasurementRef) -> Option<&StarIdentity> {
        let label = self.owners.get(&measurement)?;
        self.identities.get(label)
    }

    pub fn label_for(&self, measurement: MeasurementRef) -> Option<StarLabel> {
        self.owners.get(&measurement).copied()
    }

    pub fn identity(&self, label: StarLabel) -> Option<&StarIdentity> {
        self.identities.get(&label)
    }

    /// All identities in label order.
    pub fn identities(&self) -> impl Iterator<Item = &StarIdentity> {
        self.identities.values()
    }

    pub fn contains(&self, label: StarLabel) -> bool {
        self.identities.contains_key(&label)
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    pub fn set_ensemble(
        &mut self,
        label: StarLabel,
        in_ensemble: bool,
    ) -> Result<(), SessionError> {
        let identity = self
            .identities
            .get_mut(&label)
            .ok_or(SessionError::UnknownIdentity(label))?;
        identity.in_ensemble = in_ensemble;
        Ok(())
    }

    pub fn set_name(&mut self, label: StarLabel, name: Option<String>) -> Result<(), SessionError> {
        let identity = self
            .identities
            .get_mut(&label)
            .ok_or(SessionError::UnknownIdentity(label))?;
        identity.name = name;
        Ok(())
    }

    /// Labels of all ensemble (comparison) stars.
    pub fn ensemble(&self) -> Vec<StarLabel> {
        self.identities
            .values()
            .filter(|identity| identity.in_ensemble)
            .map(|identity| identity.label)
            .collect()
    }

    /// Call `callback` for every subsequent catalog change.
    pub fn subscribe(
        &mut self,
        callback: impl Fn(&CatalogEvent) + Send + Sync + 'static,
    ) -> ListenerId {
        self.listeners.add(Box::new(callback))
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }
}
