use storage_engine::{ChunkFilter, ChunkRecord, ChunkState, FileFilter, FileId, FileRecord};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

use super::Coordinator;
use crate::error::{Result, UploadError};
use crate::hash::{hash_bytes, ContentHasher};
use crate::state;
use crate::types::VerifyReport;

impl Coordinator {
    /// Re-reads a finalized file and checks every stored byte against its recorded digests.
    pub async fn verify_file(&self, file_id: FileId) -> Result<VerifyReport> {
        info!("Verifying file {}", file_id);
        let file = self.finalized_file(file_id).await?;

        let mut hasher = ContentHasher::new();
        for index in 0..file.chunks.len() {
            let chunk = self.verified_chunk(&file, index).await?;
            hasher.update(&chunk.data);
        }

        let bytes_checked = hasher.bytes();
        if bytes_checked != file.size {
            return Err(UploadError::integrity(
                format!("size of file {}", file.id),
                file.size,
                bytes_checked,
            ));
        }
        let hash = hasher.finalize();
        if hash != file.hash {
            return Err(UploadError::integrity(format!("file {}", file.id), &file.hash, &hash));
        }

        Ok(VerifyReport {
            file_id: file.id,
            chunks_checked: file.chunks.len(),
            bytes_checked,
            hash,
        })
    }

    /// Writes a finalized file to `writer` one chunk at a time and checks the
    /// whole-file digest once the last chunk is out. Returns the bytes written.
    pub async fn export_file<W>(&self, file_id: FileId, writer: &mut W) -> Result<u64>
    where
        W: AsyncWrite + Unpin + Send,
    {
        info!("Exporting file {}", file_id);
        let file = self.finalized_file(file_id).await?;

        let mut hasher = ContentHasher::new();
        for index in 0..file.chunks.len() {
            let chunk = self.verified_chunk(&file, index).await?;
            writer.write_all(&chunk.data).await?;
            hasher.update(&chunk.data);
            debug!("Exported chunk {} of file {}", index, file.id);
        }
        writer.flush().await?;

        let written = hasher.bytes();
        let hash = hasher.finalize();
        if hash != file.hash {
            return Err(UploadError::integrity(format!("file {}", file.id), &file.hash, &hash));
        }
        Ok(written)
    }

    async fn finalized_file(&self, file_id: FileId) -> Result<FileRecord> {
        let file = match self.store.find_file(&FileFilter::id(file_id)).await? {
            Some(file) if !state::FILE_DOES_NOT_EXIST.contains(&file.state) => file,
            _ => return Err(UploadError::NotFound(format!("file {}", file_id))),
        };
        if !state::FILE_ALREADY_UPLOADED.contains(&file.state) {
            return Err(UploadError::conflict(
                "file is not finalized",
                file.state,
                state::FILE_ALREADY_UPLOADED,
            ));
        }
        Ok(file)
    }

    /// Loads the chunk at position `index` and checks it against its descriptor.
    async fn verified_chunk(&self, file: &FileRecord, index: usize) -> Result<ChunkRecord> {
        let info = &file.chunks[index];
        let subject = format!("chunk {} of file {}", info.index, file.id);

        let chunk = self
            .store
            .find_chunk(&ChunkFilter::id(info.chunk_id).of_file(file.id))
            .await?
            .ok_or_else(|| UploadError::NotFound(subject.clone()))?;

        if chunk.state != ChunkState::Finalized {
            return Err(UploadError::integrity(subject, ChunkState::Finalized, chunk.state));
        }
        if chunk.data.len() as u64 != info.size {
            return Err(UploadError::integrity(subject, info.size, chunk.data.len()));
        }
        let actual = hash_bytes(&chunk.data);
        if actual != chunk.hash {
            return Err(UploadError::integrity(subject, &chunk.hash, actual));
        }
        Ok(chunk)
    }
}
