use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use crate::contracts::{CounterStore, Counters, StoreError};

/// Counter store that keeps the mapping in memory.
///
/// Useful for tests and for callers that want the registry semantics
/// without durability. `set_failing(true)` makes every save fail with
/// `StorageUnavailable`.
#[derive(Debug, Default)]
pub struct MemoryCounterStore {
    saved: Mutex<Option<Counters>>,
    failing: AtomicBool,
    saves: AtomicU64,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that already holds `counters`, as if saved by a
    /// previous run.
    pub fn with_counters(counters: Counters) -> Self {
        Self {
            saved: Mutex::new(Some(counters)),
            ..Self::default()
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of successful saves.
    pub fn saves(&self) -> u64 {
        self.saves.load(Ordering::SeqCst)
    }

    /// Returns the last saved mapping, if any.
    pub fn saved(&self) -> Option<Counters> {
        self.saved
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl CounterStore for MemoryCounterStore {
    fn exists(&self) -> bool {
        self.saved().is_some()
    }

    fn load(&self) -> Result<Counters, StoreError> {
        Ok(self.saved().unwrap_or_default())
    }

    fn save(&self, counters: &Counters) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::StorageUnavailable(
                "memory store is in failing mode".into(),
            ));
        }
        *self
            .saved
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(counters.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
