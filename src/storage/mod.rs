mod file;
mod memory;
mod registry;

pub use file::FileCounterStore;
pub use memory::MemoryCounterStore;
pub use registry::CounterRegistry;
