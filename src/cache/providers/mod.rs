//! Concrete key-value store providers.

pub mod memory;
pub mod noop;

pub use memory::MemoryStore;
pub use noop::NoOpStore;
