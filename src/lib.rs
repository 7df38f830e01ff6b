pub mod contracts;
pub mod storage;

pub use contracts::{IdError, IdGenerator, StoreError};
pub use storage::CounterRegistry;
