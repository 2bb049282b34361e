//! Offline delivery buffers.

pub mod memory;

pub use memory::MemoryOfflineStore;
