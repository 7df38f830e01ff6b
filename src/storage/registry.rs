use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use once_cell::sync::OnceCell;

use crate::contracts::{
    format_id, CounterStore, Counters, IdError, IdGenerator, LockResultExt, StoreError,
    DEFAULT_NAMESPACE, UNUSED,
};
use crate::storage::FileCounterStore;

static GLOBAL: OnceCell<CounterRegistry> = OnceCell::new();

/// Authoritative in-memory counters with write-through persistence.
///
/// Every mutation runs under the write lock together with the save that
/// follows it, so two callers can never observe the same value for a
/// namespace and concurrent saves never race. Reads take the read lock.
///
/// A failed save does not undo the mutation: the caller still gets its
/// id, the failure is logged and counted in [`persist_failures`], and the
/// next successful save brings the store back in line.
///
/// [`persist_failures`]: CounterRegistry::persist_failures
pub struct CounterRegistry<S = FileCounterStore> {
    counters: RwLock<Counters>,
    store: S,
    persist_failures: AtomicU64,
}

impl CounterRegistry<FileCounterStore> {
    /// Returns the process-wide registry backed by
    /// `<home>/.idgenerator/counters.properties`, loading it on first use.
    ///
    /// Concurrent first calls construct exactly one registry. If loading
    /// fails the error is returned and the next call tries again.
    pub fn global() -> Result<&'static CounterRegistry, IdError> {
        Self::shared(&GLOBAL, FileCounterStore::default_location)
    }

    /// Returns the registry held by `cell`, opening it from `locate()` if
    /// the cell is still empty. A failed open leaves the cell empty.
    fn shared(
        cell: &OnceCell<CounterRegistry>,
        locate: impl FnOnce() -> Result<FileCounterStore, StoreError>,
    ) -> Result<&CounterRegistry, IdError> {
        cell.get_or_try_init(|| Self::with_store(locate()?))
    }

    /// Opens an independent registry backed by the file at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, IdError> {
        Self::with_store(FileCounterStore::new(path))
    }
}

impl<S: CounterStore> CounterRegistry<S> {
    /// Creates a registry over `store`, recovering whatever it holds.
    ///
    /// Corrupt stored data is returned as an error rather than discarded.
    pub fn with_store(store: S) -> Result<Self, IdError> {
        let existed = store.exists();
        let mut counters = store.load()?;
        counters
            .entry(DEFAULT_NAMESPACE.to_string())
            .or_insert(UNUSED);

        if existed {
            tracing::info!(
                path = ?store.path(),
                namespaces = counters.len(),
                "Recovered counters"
            );
        } else {
            tracing::debug!(path = ?store.path(), "No saved counters, starting empty");
        }

        Ok(Self {
            counters: RwLock::new(counters),
            store,
            persist_failures: AtomicU64::new(0),
        })
    }

    /// Returns the backing store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns a copy of every namespace and its last issued value.
    pub fn snapshot(&self) -> Result<Counters, IdError> {
        Ok(self.counters.read().map_lock_err()?.clone())
    }

    /// Number of saves that failed since this registry was created.
    pub fn persist_failures(&self) -> u64 {
        self.persist_failures.load(Ordering::Relaxed)
    }

    /// Bumps `namespace` and returns the new value.
    fn advance(&self, namespace: &str) -> Result<i64, IdError> {
        self.mutate(|counters| {
            let last = counters.get(namespace).copied().unwrap_or(UNUSED);
            let next = last
                .checked_add(1)
                .ok_or_else(|| IdError::Overflow(namespace.to_string()))?;
            counters.insert(namespace.to_string(), next);
            Ok(next)
        })
    }

    fn rewind(&self, namespace: &str) -> Result<(), IdError> {
        self.mutate(|counters| {
            counters.insert(namespace.to_string(), UNUSED);
            Ok(())
        })
    }

    fn last(&self, namespace: &str) -> Result<i64, IdError> {
        let counters = self.counters.read().map_lock_err()?;
        Ok(counters.get(namespace).copied().unwrap_or(UNUSED))
    }

    /// Applies `f` and saves the result while holding the write lock.
    /// Nothing is saved if `f` fails.
    fn mutate<T>(
        &self,
        f: impl FnOnce(&mut Counters) -> Result<T, IdError>,
    ) -> Result<T, IdError> {
        let mut counters = self.counters.write().map_lock_err()?;
        let out = f(&mut *counters)?;
        self.persist(&counters);
        Ok(out)
    }

    fn persist(&self, counters: &Counters) {
        match self.store.save(counters) {
            Ok(()) => {
                tracing::debug!(
                    path = ?self.store.path(),
                    namespaces = counters.len(),
                    "Saved counters"
                );
            }
            Err(e) => {
                let failures = self.persist_failures.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::error!(
                    path = ?self.store.path(),
                    error = %e,
                    failures,
                    "Failed to save counters, in-memory state is ahead of storage"
                );
            }
        }
    }
}

/// Rejects empty and whitespace-only prefixes.
fn validate_prefix(prefix: &str) -> Result<&str, IdError> {
    if prefix.trim().is_empty() {
        tracing::warn!(prefix = ?prefix, "Rejected blank prefix");
        return Err(IdError::InvalidArgument(
            "prefix cannot be empty or whitespace".into(),
        ));
    }
    Ok(prefix)
}

impl<S: CounterStore> IdGenerator for CounterRegistry<S> {
    fn next(&self) -> Result<i64, IdError> {
        self.advance(DEFAULT_NAMESPACE)
    }

    fn next_prefixed(&self, prefix: &str) -> Result<String, IdError> {
        let prefix = validate_prefix(prefix)?;
        let value = self.advance(prefix)?;
        Ok(format_id(prefix, value))
    }

    fn current(&self) -> Result<i64, IdError> {
        self.last(DEFAULT_NAMESPACE)
    }

    fn current_prefixed(&self, prefix: &str) -> Result<i64, IdError> {
        self.last(prefix)
    }

    fn reset(&self) -> Result<(), IdError> {
        self.rewind(DEFAULT_NAMESPACE)
    }

    fn reset_prefixed(&self, prefix: &str) -> Result<(), IdError> {
        let prefix = validate_prefix(prefix)?;
        self.rewind(prefix)
    }

    fn reset_all(&self) -> Result<(), IdError> {
        self.mutate(|counters| {
            counters.clear();
            counters.insert(DEFAULT_NAMESPACE.to_string(), UNUSED);
            Ok(())
        })
    }
}
