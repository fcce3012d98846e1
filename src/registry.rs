//! Thread-safe registry mapping [`UnitId`] to its [`Unit`] implementation.
//!
//! Registration is expected at startup; the phase executor treats a
//! missing unit id as "skip" rather than an error (spec.md §4.C).

use crate::ids::UnitId;
use crate::unit::Unit;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::warn;

/// Read-mostly map from [`UnitId`] to its implementation, guarded by a
/// single reader/writer lock (spec.md §5: "read-mostly after startup; a
/// reader/writer lock suffices").
#[derive(Default)]
pub struct UnitRegistry {
    units: RwLock<HashMap<UnitId, Arc<dyn Unit>>>,
}

impl UnitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, unit: Arc<dyn Unit>) {
        let id = unit.id();
        self.units.write().expect("registry lock poisoned").insert(id, unit);
    }

    pub fn get(&self, id: &UnitId) -> Option<Arc<dyn Unit>> {
        self.units.read().expect("registry lock poisoned").get(id).cloned()
    }

    /// Look up each id, silently omitting ids that were never registered
    /// (logged at `warn!` so a missing lobe isn't invisible).
    pub fn get_all(&self, ids: &[UnitId]) -> Vec<Arc<dyn Unit>> {
        let guard = self.units.read().expect("registry lock poisoned");
        ids.iter()
            .filter_map(|id| match guard.get(id) {
                Some(u) => Some(u.clone()),
                None => {
                    warn!("unit {} not registered, skipping", id);
                    None
                }
            })
            .collect()
    }

    pub fn all(&self) -> Vec<Arc<dyn Unit>> {
        self.units.read().expect("registry lock poisoned").values().cloned().collect()
    }

    pub fn count(&self) -> usize {
        self.units.read().expect("registry lock poisoned").len()
    }
}
