//! Storage layer - concrete key-value and protected stores

pub mod file;
pub(crate) mod mapper;
pub mod memory;

pub use file::{FileProtectedStore, FileStore, FileStoreFactory};
pub use memory::{MemoryProtectedStore, MemoryStore, MemoryStoreFactory};
