use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::DocumentStore;
use crate::{
    ChunkFilter, ChunkId, ChunkPatch, ChunkRecord, FileFilter, FileId, FilePatch, FileRecord, Page,
    Result, StorageError,
};

/// Both collections held in process memory.
#[derive(Default)]
pub struct MemoryStore {
    files: RwLock<HashMap<FileId, FileRecord>>,
    chunks: RwLock<HashMap<ChunkId, ChunkRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert_file(&self, file: FileRecord) -> Result<FileId> {
        let mut files = self.files.write().await;
        if files.contains_key(&file.id) {
            return Err(StorageError::Storage(format!("duplicate file id {}", file.id)));
        }
        let id = file.id;
        files.insert(id, file);
        Ok(id)
    }

    async fn find_file(&self, filter: &FileFilter) -> Result<Option<FileRecord>> {
        let files = self.files.read().await;
        let found = match &filter.id {
            Some(id) => files.get(id).filter(|file| filter.matches(file)).cloned(),
            None => files.values().find(|file| filter.matches(file)).cloned(),
        };
        Ok(found)
    }

    async fn find_files(&self, filter: &FileFilter) -> Result<Vec<FileRecord>> {
        let files = self.files.read().await;
        let mut matched: Vec<FileRecord> = files
            .values()
            .filter(|file| filter.matches(file))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matched)
    }

    async fn update_file(&self, filter: &FileFilter, patch: &FilePatch) -> Result<u64> {
        let mut files = self.files.write().await;
        let mut matched = 0;
        for file in files.values_mut().filter(|file| filter.matches(file)) {
            patch.apply(file);
            matched += 1;
        }
        Ok(matched)
    }

    async fn insert_chunk(&self, chunk: ChunkRecord) -> Result<ChunkId> {
        let mut chunks = self.chunks.write().await;
        if chunks.contains_key(&chunk.id) {
            return Err(StorageError::Storage(format!("duplicate chunk id {}", chunk.id)));
        }
        let id = chunk.id;
        chunks.insert(id, chunk);
        Ok(id)
    }

    async fn find_chunk(&self, filter: &ChunkFilter) -> Result<Option<ChunkRecord>> {
        let chunks = self.chunks.read().await;
        let found = match &filter.id {
            Some(id) => chunks.get(id).filter(|chunk| filter.matches(chunk)).cloned(),
            None => chunks.values().find(|chunk| filter.matches(chunk)).cloned(),
        };
        Ok(found)
    }

    async fn find_chunks(&self, filter: &ChunkFilter, page: Page) -> Result<Vec<ChunkRecord>> {
        let chunks = self.chunks.read().await;
        let mut matched: Vec<&ChunkRecord> =
            chunks.values().filter(|chunk| filter.matches(chunk)).collect();
        matched.sort_by_key(|chunk| (chunk.file_id, chunk.index));

        let records = page
            .slice(matched)
            .into_iter()
            .map(|chunk| chunk.without_data())
            .collect();
        Ok(records)
    }

    async fn count_chunks(&self, filter: &ChunkFilter) -> Result<u64> {
        let chunks = self.chunks.read().await;
        Ok(chunks.values().filter(|chunk| filter.matches(chunk)).count() as u64)
    }

    async fn update_chunk(&self, filter: &ChunkFilter, patch: &ChunkPatch) -> Result<u64> {
        let mut chunks = self.chunks.write().await;
        let mut matched = 0;
        for chunk in chunks.values_mut().filter(|chunk| filter.matches(chunk)) {
            patch.apply(chunk);
            matched += 1;
        }
        Ok(matched)
    }
}
