//! Typed change notifications emitted by the catalog.

use std::fmt;

use super::StarLabel;
use crate::measurement::MeasurementRef;

/// A change to the catalog, delivered to every subscriber after it happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogEvent {
    IdentityCreated(StarLabel),
    IdentityRemoved(StarLabel),
    MeasurementAttached {
        label: StarLabel,
        measurement: MeasurementRef,
    },
    MeasurementDetached {
        label: StarLabel,
        measurement: MeasurementRef,
    },
}

/// Handle returned by [`Catalog::subscribe`](super::Catalog::subscribe).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Callback = Box<dyn Fn(&CatalogEvent) + Send + Sync>;

#[derive(Default)]
pub(super) struct Listeners {
    entries: Vec<(ListenerId, Callback)>,
    next_id: u64,
}

impl Listeners {
    pub(super) fn add(&mut self, callback: Callback) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, callback));
        id
    }

    pub(super) fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry_id, _)| *entry_id != id);
        self.entries.len() != before
    }

    pub(super) fn emit(&self, event: CatalogEvent) {
        for (_, callback) in &self.entries {
            callback(&event);
        }
    }

    pub(super) fn len(&self) -> usize {
        self.entries.len()
    }
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("count", &self.entries.len())
            .finish()
    }
}
