use storage_engine::{
    ChunkFilter, ChunkId, ChunkSummary, FileFilter, FileId, FileProgress, FileRecord, Page,
};

use super::Coordinator;
use crate::error::{Result, UploadError};

impl Coordinator {
    pub async fn find_file(&self, file_id: FileId) -> Result<FileRecord> {
        self.store
            .find_file(&FileFilter::id(file_id))
            .await?
            .ok_or_else(|| UploadError::NotFound(format!("file {}", file_id)))
    }

    pub async fn find_file_chunk(&self, chunk_id: ChunkId) -> Result<ChunkSummary> {
        self.store
            .find_chunk(&ChunkFilter::id(chunk_id))
            .await?
            .map(ChunkSummary::from)
            .ok_or_else(|| UploadError::NotFound(format!("chunk {}", chunk_id)))
    }

    /// Chunks of a file in index order, optionally windowed.
    pub async fn find_file_chunks(
        &self,
        file_id: FileId,
        offset: usize,
        limit: Option<usize>,
    ) -> Result<Vec<ChunkSummary>> {
        let file = self.find_file(file_id).await?;
        let chunks = self
            .store
            .find_chunks(&ChunkFilter::file(file.id), Page::window(offset, limit))
            .await?;
        Ok(chunks.into_iter().map(ChunkSummary::from).collect())
    }

    /// Every file, newest first.
    pub async fn list_files(&self) -> Result<Vec<FileRecord>> {
        Ok(self.store.find_files(&FileFilter::all()).await?)
    }

    pub async fn file_progress(&self, file_id: FileId) -> Result<FileProgress> {
        Ok(self.find_file(file_id).await?.progress())
    }
}
