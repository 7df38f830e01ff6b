use std::collections::BTreeMap;
use std::path::Path;

use crate::contracts::error::StoreError;

/// Full namespace to last-issued-value mapping, ordered by namespace.
pub type Counters = BTreeMap<String, i64>;

/// Durable mirror of the counter mapping.
///
/// # Invariants
/// - `save` replaces the whole mapping; readers never see a partial write.
/// - `load` on a store that was never saved returns an empty mapping.
/// - `load` after `save(m)` returns a mapping equal to `m`.
pub trait CounterStore: Send + Sync {
    /// Returns true if a saved mapping is present. Never fails.
    fn exists(&self) -> bool;

    /// Reads the whole mapping.
    fn load(&self) -> Result<Counters, StoreError>;

    /// Replaces the whole mapping.
    fn save(&self, counters: &Counters) -> Result<(), StoreError>;

    /// Location of the backing data, for diagnostics.
    fn path(&self) -> Option<&Path> {
        None
    }
}
