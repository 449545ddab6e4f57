use std::sync::Arc;

use chrono::Utc;
use storage_engine::{
    ChunkFilter, ChunkId, ChunkInfo, ChunkInfoPatch, ChunkPatch, ChunkRecord, ChunkState,
    DocumentStore, FileFilter, FileId, FilePatch, FileRecord, FileState,
};
use tracing::{debug, info, warn};

use crate::chunk::{chunk_count, chunk_sizes, DEFAULT_CHUNK_SIZE};
use crate::config::UploadConfig;
use crate::error::{Result, UploadError};
use crate::hash::{hash_bytes, ContentHasher};
use crate::state;
use crate::types::{
    FinalizeFileChunkRequest, FinalizeFileChunkResponse, FinalizeFileRequest,
    FinalizeFileResponse, InsertFileRequest, InsertFileResponse, UploadFileChunkRequest,
    UploadFileChunkResponse,
};

/// Sole writer of file and chunk documents.
#[derive(Clone)]
pub struct Coordinator {
    pub(super) store: Arc<dyn DocumentStore>,
    chunk_size: u64,
}

impl Coordinator {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub async fn from_config(config: &UploadConfig) -> Result<Self> {
        config.validate()?;
        let store = config.open_store().await?;
        Ok(Self::new(store).with_chunk_size(config.chunk_size))
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Creates the file record and one empty chunk per slot.
    ///
    /// The record stays `creating` until every chunk exists, then moves to
    /// `created` together with its descriptor list.
    pub async fn insert_file(&self, request: InsertFileRequest) -> Result<InsertFileResponse> {
        info!("Inserting file {} ({} bytes)", request.name, request.size);

        // Checked before any slot is materialized.
        let count = chunk_count(request.size, self.chunk_size);
        if u32::try_from(count).is_err() {
            return Err(UploadError::Validation(format!(
                "file of {} bytes needs {} chunks, more than an index can address",
                request.size, count
            )));
        }
        let sizes = chunk_sizes(request.size, self.chunk_size);

        let now = Utc::now();
        let file_id = self
            .store
            .insert_file(FileRecord {
                id: FileId::new(),
                name: request.name,
                size: request.size,
                mime_type: request.mime_type,
                state: FileState::Creating,
                chunk_size: self.chunk_size,
                chunks: Vec::new(),
                created_at: now,
                modified_at: now,
                hash: String::new(),
            })
            .await?;

        let mut chunks = Vec::with_capacity(sizes.len());
        for (index, size) in (0u32..).zip(sizes) {
            let chunk = ChunkRecord::placeholder(file_id, index, size);
            let chunk_id = self.store.insert_chunk(chunk).await?;
            chunks.push(ChunkInfo {
                file_id,
                chunk_id,
                index,
                state: ChunkState::Created,
                size,
                hash: String::new(),
            });
        }
        let chunk_ids: Vec<ChunkId> = chunks.iter().map(|chunk| chunk.chunk_id).collect();

        let matched = self
            .store
            .update_file(
                &FileFilter::id(file_id).in_states(&[FileState::Creating]),
                &FilePatch::new()
                    .state(FileState::Created)
                    .touch(Utc::now())
                    .chunks(chunks),
            )
            .await?;
        if matched == 0 {
            warn!("File {} left the creating state before its chunks were attached", file_id);
            return Err(self
                .conflict_after_race(file_id, "file changed while being created", &[FileState::Creating])
                .await);
        }

        debug!("File {} created with {} chunks", file_id, chunk_ids.len());
        Ok(InsertFileResponse {
            file_id,
            chunk_size: self.chunk_size,
            chunk_ids,
        })
    }

    /// Stores the bytes of one chunk. Repeatable until the chunk is finalized.
    pub async fn upload_chunk(&self, request: UploadFileChunkRequest) -> Result<UploadFileChunkResponse> {
        info!(
            "Uploading chunk {} of file {} ({} bytes)",
            request.index, request.file_id, request.size
        );

        if request.size != request.data.len() as u64 {
            return Err(UploadError::Validation(format!(
                "size {} does not match data length {}",
                request.size,
                request.data.len()
            )));
        }

        let file = self
            .find_file_entry(request.file_id, request.index, request.chunk_id)
            .await?;
        state::ensure_file_can_be_uploaded(file.state)?;
        let info = self.find_chunk_info(&file, request.index).await?;

        state::ensure_chunk_can_be_uploaded(info.state)?;
        if info.size != request.data.len() as u64 {
            return Err(UploadError::Validation(format!(
                "chunk {} expects {} bytes, got {}",
                info.index,
                info.size,
                request.data.len()
            )));
        }

        let hash = hash_bytes(&request.data);

        let matched = self
            .store
            .update_chunk(
                &ChunkFilter::id(info.chunk_id).in_states(state::CHUNK_CAN_BE_UPDATED),
                &ChunkPatch::new()
                    .state(ChunkState::Uploading)
                    .data(request.data)
                    .hash(hash.clone()),
            )
            .await?;
        if matched == 0 {
            warn!("Chunk {} was finalized by a concurrent call", info.chunk_id);
            return Err(UploadError::conflict(
                "chunk is already uploaded",
                ChunkState::Finalized,
                state::CHUNK_CAN_BE_UPDATED,
            ));
        }

        let matched = self
            .store
            .update_file(
                &FileFilter::id(info.file_id)
                    .with_chunk_at(info.index, info.chunk_id)
                    .in_states(state::FILE_CAN_BE_UPLOADED),
                &FilePatch::new()
                    .state(FileState::Uploading)
                    .touch(Utc::now())
                    .chunk_at(
                        info.index,
                        ChunkInfoPatch {
                            state: Some(ChunkState::Uploading),
                            hash: Some(hash),
                        },
                    ),
            )
            .await?;
        if matched == 0 {
            warn!("File {} changed state while chunk {} was uploaded", info.file_id, info.index);
            return Err(self
                .conflict_after_race(info.file_id, "file cannot be uploaded", state::FILE_CAN_BE_UPLOADED)
                .await);
        }

        Ok(UploadFileChunkResponse {
            chunk_id: info.chunk_id,
        })
    }

    /// Seals a chunk once the caller confirms the digest of what was stored.
    pub async fn finalize_chunk(
        &self,
        request: FinalizeFileChunkRequest,
    ) -> Result<FinalizeFileChunkResponse> {
        info!("Finalizing chunk {} of file {}", request.index, request.file_id);

        let file = self
            .find_file_entry(request.file_id, request.index, request.chunk_id)
            .await?;
        state::ensure_file_can_be_uploaded(file.state)?;
        let info = self.find_chunk_info(&file, request.index).await?;

        state::ensure_chunk_can_be_finalized(info.state)?;
        if info.hash != request.expected_hash {
            return Err(UploadError::integrity(
                format!("chunk {} of file {}", info.index, info.file_id),
                &request.expected_hash,
                &info.hash,
            ));
        }

        let matched = self
            .store
            .update_chunk(
                &ChunkFilter::id(info.chunk_id)
                    .in_states(state::CHUNK_CAN_BE_FINALIZED)
                    .with_hash(request.expected_hash),
                &ChunkPatch::new().state(ChunkState::Finalized),
            )
            .await?;
        if matched == 0 {
            warn!("Chunk {} changed before it could be finalized", info.chunk_id);
            return Err(UploadError::conflict(
                "chunk changed before it could be finalized",
                info.state,
                state::CHUNK_CAN_BE_FINALIZED,
            ));
        }

        let matched = self
            .store
            .update_file(
                &FileFilter::id(info.file_id)
                    .with_chunk_at(info.index, info.chunk_id)
                    .in_states(state::FILE_CAN_BE_UPLOADED),
                &FilePatch::new()
                    .state(FileState::Uploading)
                    .touch(Utc::now())
                    .chunk_at(
                        info.index,
                        ChunkInfoPatch {
                            state: Some(ChunkState::Finalized),
                            hash: None,
                        },
                    ),
            )
            .await?;
        if matched == 0 {
            warn!("File {} changed state while chunk {} was finalized", info.file_id, info.index);
            return Err(self
                .conflict_after_race(info.file_id, "file cannot be uploaded", state::FILE_CAN_BE_UPLOADED)
                .await);
        }

        Ok(FinalizeFileChunkResponse {})
    }

    /// Closes the file after every chunk is finalized and records its digest.
    ///
    /// Chunks are hashed in index order one at a time, so the file is never
    /// held in memory as a whole. A failure leaves the file `uploading`.
    pub async fn finalize_file(&self, request: FinalizeFileRequest) -> Result<FinalizeFileResponse> {
        info!("Finalizing file {}", request.file_id);

        let file = match self.store.find_file(&FileFilter::id(request.file_id)).await? {
            Some(file) if !state::FILE_DOES_NOT_EXIST.contains(&file.state) => file,
            _ => return Err(UploadError::NotFound(format!("file {}", request.file_id))),
        };

        let finalizable = state::file_finalizable_states(file.chunks.len());
        if !finalizable.contains(&file.state) {
            return Err(UploadError::conflict(
                "file cannot be finalized",
                file.state,
                finalizable,
            ));
        }
        if file.size != request.size {
            return Err(UploadError::Validation(format!(
                "file size {} does not match declared size {}",
                request.size, file.size
            )));
        }

        let chunk_ids: Vec<ChunkId> = file.chunks.iter().map(|chunk| chunk.chunk_id).collect();
        let expected = chunk_ids.len() as u64;
        let finalized = if chunk_ids.is_empty() {
            0
        } else {
            self.store
                .count_chunks(
                    &ChunkFilter::ids(chunk_ids.clone())
                        .of_file(file.id)
                        .in_states(&[ChunkState::Finalized]),
                )
                .await?
        };
        if finalized != expected {
            return Err(UploadError::StateConflict {
                message: "not all chunks are finalized".to_string(),
                current: format!("{} of {} finalized", finalized, expected),
                required: ChunkState::Finalized.to_string(),
            });
        }

        let mut hasher = ContentHasher::new();
        for chunk_id in chunk_ids {
            let chunk = self
                .store
                .find_chunk(&ChunkFilter::id(chunk_id).of_file(file.id))
                .await?
                .ok_or_else(|| UploadError::NotFound(format!("chunk {} of file {}", chunk_id, file.id)))?;
            hasher.update(&chunk.data);
        }
        let hash = hasher.finalize();

        let matched = self
            .store
            .update_file(
                &FileFilter::id(file.id).in_states(finalizable),
                &FilePatch::new()
                    .state(FileState::Finalized)
                    .touch(Utc::now())
                    .hash(hash.clone()),
            )
            .await?;
        if matched == 0 {
            warn!("File {} was finalized by a concurrent call", file.id);
            return Err(self
                .conflict_after_race(file.id, "file cannot be finalized", finalizable)
                .await);
        }

        info!("File {} finalized with hash {}", file.id, hash);
        Ok(FinalizeFileResponse {
            file_id: file.id,
            size: file.size,
            hash,
        })
    }

    /// The file whose descriptor at `index` carries `chunk_id`.
    async fn find_file_entry(&self, file_id: FileId, index: u32, chunk_id: ChunkId) -> Result<FileRecord> {
        self.store
            .find_file(&FileFilter::id(file_id).with_chunk_at(index, chunk_id))
            .await?
            .ok_or_else(|| {
                UploadError::NotFound(format!("file entry {} with chunk {} at index {}", file_id, chunk_id, index))
            })
    }

    /// The descriptor at `index`, after checking its chunk document still exists.
    async fn find_chunk_info(&self, file: &FileRecord, index: u32) -> Result<ChunkInfo> {
        let info = file.chunk(index).cloned().ok_or_else(|| {
            UploadError::NotFound(format!("chunk index {} is out of bounds for file {}", index, file.id))
        })?;

        let found = self
            .store
            .count_chunks(
                &ChunkFilter::id(info.chunk_id)
                    .of_file(info.file_id)
                    .at_index(info.index),
            )
            .await?;
        if found == 0 {
            return Err(UploadError::NotFound(format!("chunk {} of file {}", info.chunk_id, file.id)));
        }
        Ok(info)
    }

    /// Conflict for a conditional write that matched nothing, naming the state found afterwards.
    pub(super) async fn conflict_after_race(
        &self,
        file_id: FileId,
        message: &str,
        required: &[FileState],
    ) -> UploadError {
        match self.store.find_file(&FileFilter::id(file_id)).await {
            Ok(Some(file)) => UploadError::conflict(message, file.state, required),
            Ok(None) => UploadError::NotFound(format!("file {}", file_id)),
            Err(e) => e.into(),
        }
    }
}
