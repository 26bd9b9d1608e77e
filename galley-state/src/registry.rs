//! The appliance registry.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::appliance::{Appliance, ApplianceId};

/// All appliances known to one client session, keyed by identifier.
///
/// Insertion happens only on the ingestion path (first message naming an
/// unseen identifier); reads come from any caller thread. `get_or_insert`
/// is a single atomic operation so a concurrent read during insertion
/// never observes a half-registered appliance.
///
/// Appliances are never removed. A device that goes away is marked
/// unavailable and keeps its cached property table.
#[derive(Debug, Default)]
pub struct Registry {
    appliances: DashMap<ApplianceId, Arc<Appliance>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &ApplianceId) -> Option<Arc<Appliance>> {
        self.appliances.get(id).map(|entry| Arc::clone(&entry))
    }

    pub fn contains(&self, id: &ApplianceId) -> bool {
        self.appliances.contains_key(id)
    }

    /// Look up an appliance, creating it on first sighting.
    ///
    /// Returns the appliance and whether it was newly created.
    pub fn get_or_insert(&self, id: &ApplianceId) -> (Arc<Appliance>, bool) {
        match self.appliances.entry(id.clone()) {
            Entry::Occupied(entry) => (Arc::clone(entry.get()), false),
            Entry::Vacant(entry) => {
                tracing::info!(%id, "registering appliance");
                let appliance = Arc::new(Appliance::new(id.clone()));
                entry.insert(Arc::clone(&appliance));
                (appliance, true)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.appliances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.appliances.is_empty()
    }

    pub fn ids(&self) -> Vec<ApplianceId> {
        self.appliances.iter().map(|e| e.key().clone()).collect()
    }

    /// Snapshot of every registered appliance.
    pub fn all(&self) -> Vec<Arc<Appliance>> {
        self.appliances.iter().map(|e| Arc::clone(&e)).collect()
    }

    /// Mark every appliance unavailable, returning the ones whose flag
    /// actually flipped. Used when the transport connection drops; the
    /// cached property tables stay intact.
    pub fn mark_all_unavailable(&self) -> Vec<Arc<Appliance>> {
        self.appliances
            .iter()
            .filter(|entry| entry.set_available(false))
            .map(|entry| Arc::clone(&entry))
            .collect()
    }
}
