//! Document store behind the chunked upload coordinator.
//!
//! Two collections are kept: files and chunks. Every write goes through a
//! filter, so callers get compare-and-set semantics per document.

pub mod error;
pub mod query;
pub mod storage;

mod types;

pub use error::{Result, StorageError};
pub use query::{ChunkFilter, ChunkInfoPatch, ChunkPatch, FileFilter, FilePatch, Page};
pub use storage::{disk::DiskStore, memory::MemoryStore, DocumentStore};
pub use types::*;
