use async_trait::async_trait;

use crate::{
    ChunkFilter, ChunkId, ChunkPatch, ChunkRecord, FileFilter, FileId, FilePatch, FileRecord, Page,
    Result,
};

pub mod cache;
pub mod compression;
pub mod disk;
pub mod memory;

/// Storage port for the files and chunks collections.
///
/// `update_*` only touches documents that match the filter at the moment of
/// the write and returns how many matched. A return value of `0` means the
/// precondition no longer held and nothing was written.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn insert_file(&self, file: FileRecord) -> Result<FileId>;
    async fn find_file(&self, filter: &FileFilter) -> Result<Option<FileRecord>>;
    /// Matching files, newest `created_at` first.
    async fn find_files(&self, filter: &FileFilter) -> Result<Vec<FileRecord>>;
    async fn update_file(&self, filter: &FileFilter, patch: &FilePatch) -> Result<u64>;

    async fn insert_chunk(&self, chunk: ChunkRecord) -> Result<ChunkId>;
    /// First matching chunk, payload included.
    async fn find_chunk(&self, filter: &ChunkFilter) -> Result<Option<ChunkRecord>>;
    /// Matching chunks ordered by `(file_id, index)`, payloads left out.
    async fn find_chunks(&self, filter: &ChunkFilter, page: Page) -> Result<Vec<ChunkRecord>>;
    async fn count_chunks(&self, filter: &ChunkFilter) -> Result<u64>;
    async fn update_chunk(&self, filter: &ChunkFilter, patch: &ChunkPatch) -> Result<u64>;
}
