use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ChunkId, ChunkState, FileId};

/// Lifecycle state of a file record.
///
/// `creating -> created -> uploading -> finalized` is the happy path.
/// `failed` can be retried by uploading again, `deleted` and `abandoned` are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FileState {
    Creating,
    Created,
    Uploading,
    Finalized,
    Failed,
    Deleted,
    Abandoned,
}

impl FileState {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileState::Creating => "creating",
            FileState::Created => "created",
            FileState::Uploading => "uploading",
            FileState::Finalized => "finalized",
            FileState::Failed => "failed",
            FileState::Deleted => "deleted",
            FileState::Abandoned => "abandoned",
        }
    }
}

impl fmt::Display for FileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Descriptor of one chunk, embedded in the owning file record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkInfo {
    pub file_id: FileId,
    pub chunk_id: ChunkId,
    pub index: u32,
    pub state: ChunkState,
    pub size: u64,
    pub hash: String,
}

/// A file as stored in the files collection.
///
/// The record holds metadata only. Bytes live in the chunk collection and are
/// linked through `chunks`, where `chunks[i].index == i`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub id: FileId,
    pub name: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub mime_type: String,
    pub state: FileState,
    pub chunk_size: u64,
    pub chunks: Vec<ChunkInfo>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    /// Whole-file digest, empty until the file is finalized.
    pub hash: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileProgress {
    pub finalized_chunks: usize,
    pub total_chunks: usize,
    pub finalized_bytes: u64,
    pub total_bytes: u64,
}

impl FileRecord {
    pub fn chunk(&self, index: u32) -> Option<&ChunkInfo> {
        self.chunks.get(index as usize)
    }

    pub fn progress(&self) -> FileProgress {
        let finalized: Vec<&ChunkInfo> = self
            .chunks
            .iter()
            .filter(|chunk| chunk.state == ChunkState::Finalized)
            .collect();

        FileProgress {
            finalized_chunks: finalized.len(),
            total_chunks: self.chunks.len(),
            finalized_bytes: finalized.iter().map(|chunk| chunk.size).sum(),
            total_bytes: self.size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_with(states: &[(ChunkState, u64)]) -> FileRecord {
        let id = FileId::new();
        let now = Utc::now();
        FileRecord {
            id,
            name: "progress.bin".to_string(),
            size: states.iter().map(|(_, size)| size).sum(),
            mime_type: "application/octet-stream".to_string(),
            state: FileState::Uploading,
            chunk_size: 4,
            chunks: states
                .iter()
                .enumerate()
                .map(|(index, (state, size))| ChunkInfo {
                    file_id: id,
                    chunk_id: ChunkId::new(),
                    index: index as u32,
                    state: *state,
                    size: *size,
                    hash: String::new(),
                })
                .collect(),
            created_at: now,
            modified_at: now,
            hash: String::new(),
        }
    }

    #[test]
    fn progress_counts_only_finalized_chunks() {
        let record = record_with(&[
            (ChunkState::Finalized, 4),
            (ChunkState::Uploading, 4),
            (ChunkState::Finalized, 2),
        ]);

        let progress = record.progress();
        assert_eq!(progress.finalized_chunks, 2);
        assert_eq!(progress.total_chunks, 3);
        assert_eq!(progress.finalized_bytes, 6);
        assert_eq!(progress.total_bytes, 10);
    }

    #[test]
    fn state_serializes_lowercase() {
        let json = serde_json::to_string(&FileState::Abandoned).unwrap();
        assert_eq!(json, "\"abandoned\"");
    }
}
