//! Price state persistence

pub mod json_file_store;
pub mod memory_store;

pub use json_file_store::JsonFilePriceStore;
pub use memory_store::MemoryPriceStore;
