use std::fmt;

use serde::{Deserialize, Serialize};

use super::{ChunkId, FileId};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ChunkState {
    Created,
    Uploading,
    Finalized,
    Failed,
}

impl ChunkState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkState::Created => "created",
            ChunkState::Uploading => "uploading",
            ChunkState::Finalized => "finalized",
            ChunkState::Failed => "failed",
        }
    }
}

impl fmt::Display for ChunkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A chunk as stored in the chunk collection.
///
/// `data` is never serialized with the document. Stores that persist chunks
/// keep the payload next to the document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkRecord {
    pub id: ChunkId,
    pub file_id: FileId,
    pub index: u32,
    pub state: ChunkState,
    pub size: u64,
    #[serde(skip)]
    pub data: Vec<u8>,
    pub hash: String,
}

impl ChunkRecord {
    /// An empty slot for the chunk at `index`, expecting `size` bytes.
    pub fn placeholder(file_id: FileId, index: u32, size: u64) -> Self {
        Self {
            id: ChunkId::new(),
            file_id,
            index,
            state: ChunkState::Created,
            size,
            data: Vec::new(),
            hash: String::new(),
        }
    }

    pub fn without_data(&self) -> Self {
        Self {
            id: self.id,
            file_id: self.file_id,
            index: self.index,
            state: self.state,
            size: self.size,
            data: Vec::new(),
            hash: self.hash.clone(),
        }
    }
}

/// Chunk metadata without the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkSummary {
    pub id: ChunkId,
    pub file_id: FileId,
    pub index: u32,
    pub state: ChunkState,
    pub size: u64,
    pub hash: String,
}

impl From<ChunkRecord> for ChunkSummary {
    fn from(record: ChunkRecord) -> Self {
        Self {
            id: record.id,
            file_id: record.file_id,
            index: record.index,
            state: record.state,
            size: record.size,
            hash: record.hash,
        }
    }
}
