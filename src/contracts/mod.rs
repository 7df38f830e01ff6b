pub mod error;
pub mod generator;
pub mod store;

pub use error::{IdError, LockResultExt, StoreError};
pub use generator::{format_id, IdGenerator, DEFAULT_NAMESPACE, UNUSED};
pub use store::{CounterStore, Counters};
