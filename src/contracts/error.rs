use std::sync::{PoisonError, RwLockReadGuard, RwLockWriteGuard};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IdError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Counter overflow for namespace {0}")]
    Overflow(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),
}

/// Extension trait for converting lock errors to IdError.
pub trait LockResultExt<T> {
    /// Converts a lock error to an IdError.
    fn map_lock_err(self) -> Result<T, IdError>;
}

impl<'a, T> LockResultExt<RwLockReadGuard<'a, T>>
    for Result<RwLockReadGuard<'a, T>, PoisonError<RwLockReadGuard<'a, T>>>
{
    #[inline]
    fn map_lock_err(self) -> Result<RwLockReadGuard<'a, T>, IdError> {
        self.map_err(|e| IdError::LockPoisoned(e.to_string()))
    }
}

impl<'a, T> LockResultExt<RwLockWriteGuard<'a, T>>
    for Result<RwLockWriteGuard<'a, T>, PoisonError<RwLockWriteGuard<'a, T>>>
{
    #[inline]
    fn map_lock_err(self) -> Result<RwLockWriteGuard<'a, T>, IdError> {
        self.map_err(|e| IdError::LockPoisoned(e.to_string()))
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Corrupt data at line {line}: {reason}")]
    CorruptData { line: usize, reason: String },

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("IO error: {0}")]
    Io(String),
}
