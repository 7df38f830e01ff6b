use crate::contracts::error::IdError;

/// Namespace backing the unprefixed, integer-returning calls.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Value reported for a namespace that has not issued an id yet.
pub const UNUSED: i64 = -1;

/// Issues monotonically increasing ids per namespace.
///
/// # Invariants
/// - Within a namespace, every issued value is one greater than the last
///   one, starting from 0 (or from the value recovered at startup).
/// - No two callers ever receive the same value for the same namespace.
/// - State is handed to durable storage before an id is returned.
pub trait IdGenerator: Send + Sync {
    /// Returns the next id of the default namespace.
    fn next(&self) -> Result<i64, IdError>;

    /// Returns the next id of `prefix`, formatted as `PREFIX_NNNN`.
    fn next_prefixed(&self, prefix: &str) -> Result<String, IdError>;

    /// Returns the last id issued for the default namespace, or `-1`.
    fn current(&self) -> Result<i64, IdError>;

    /// Returns the last id issued for `prefix`, or `-1`.
    fn current_prefixed(&self, prefix: &str) -> Result<i64, IdError>;

    /// Rewinds the default namespace so the next id is 0 again.
    fn reset(&self) -> Result<(), IdError>;

    /// Rewinds a single namespace, leaving the others untouched.
    fn reset_prefixed(&self, prefix: &str) -> Result<(), IdError>;

    /// Rewinds every namespace.
    fn reset_all(&self) -> Result<(), IdError>;
}

/// Formats an id as `PREFIX_NNNN`. Values wider than four digits are
/// rendered in full.
pub fn format_id(prefix: &str, value: i64) -> String {
    format!("{}_{:04}", prefix, value)
}
