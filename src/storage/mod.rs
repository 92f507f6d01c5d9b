//! In-memory state: the primary stores and their secondary indexes.

pub mod index;
pub mod memory;

pub use index::Indexes;
pub use memory::MemoryStore;
