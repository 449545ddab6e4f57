//! Filters and patches understood by every [`DocumentStore`](crate::storage::DocumentStore).
//!
//! A filter decides whether a document matches, a patch mutates a matched
//! document in place. Stores evaluate both under their write lock, which is
//! what makes `update_*` a conditional, single-document atomic write.

use chrono::{DateTime, Utc};

use crate::{ChunkId, ChunkInfo, ChunkRecord, ChunkState, FileId, FileRecord, FileState};

#[derive(Debug, Clone, Default)]
pub struct FileFilter {
    pub id: Option<FileId>,
    pub states: Option<Vec<FileState>>,
    /// Requires the chunk descriptor at this position to carry this chunk id.
    pub chunk_at: Option<(u32, ChunkId)>,
}

impl FileFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn id(id: FileId) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    pub fn in_states(mut self, states: &[FileState]) -> Self {
        self.states = Some(states.to_vec());
        self
    }

    pub fn with_chunk_at(mut self, index: u32, chunk_id: ChunkId) -> Self {
        self.chunk_at = Some((index, chunk_id));
        self
    }

    pub fn matches(&self, file: &FileRecord) -> bool {
        if let Some(id) = &self.id {
            if file.id != *id {
                return false;
            }
        }
        if let Some(states) = &self.states {
            if !states.contains(&file.state) {
                return false;
            }
        }
        if let Some((index, chunk_id)) = &self.chunk_at {
            match file.chunk(*index) {
                Some(info) if info.chunk_id == *chunk_id => {}
                _ => return false,
            }
        }
        true
    }
}

/// Partial update of one embedded chunk descriptor.
#[derive(Debug, Clone, Default)]
pub struct ChunkInfoPatch {
    pub state: Option<ChunkState>,
    pub hash: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct FilePatch {
    pub state: Option<FileState>,
    pub modified_at: Option<DateTime<Utc>>,
    pub hash: Option<String>,
    pub chunks: Option<Vec<ChunkInfo>>,
    pub chunk_at: Option<(u32, ChunkInfoPatch)>,
}

impl FilePatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(mut self, state: FileState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn touch(mut self, now: DateTime<Utc>) -> Self {
        self.modified_at = Some(now);
        self
    }

    pub fn hash(mut self, hash: impl Into<String>) -> Self {
        self.hash = Some(hash.into());
        self
    }

    pub fn chunks(mut self, chunks: Vec<ChunkInfo>) -> Self {
        self.chunks = Some(chunks);
        self
    }

    pub fn chunk_at(mut self, index: u32, patch: ChunkInfoPatch) -> Self {
        self.chunk_at = Some((index, patch));
        self
    }

    pub fn apply(&self, file: &mut FileRecord) {
        if let Some(state) = self.state {
            file.state = state;
        }
        if let Some(modified_at) = self.modified_at {
            file.modified_at = modified_at;
        }
        if let Some(hash) = &self.hash {
            file.hash = hash.clone();
        }
        if let Some(chunks) = &self.chunks {
            file.chunks = chunks.clone();
        }
        if let Some((index, patch)) = &self.chunk_at {
            if let Some(info) = file.chunks.get_mut(*index as usize) {
                if let Some(state) = patch.state {
                    info.state = state;
                }
                if let Some(hash) = &patch.hash {
                    info.hash = hash.clone();
                }
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ChunkFilter {
    pub id: Option<ChunkId>,
    pub ids: Option<Vec<ChunkId>>,
    pub file_id: Option<FileId>,
    pub index: Option<u32>,
    pub states: Option<Vec<ChunkState>>,
    pub hash: Option<String>,
}

impl ChunkFilter {
    pub fn id(id: ChunkId) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    pub fn ids(ids: Vec<ChunkId>) -> Self {
        Self {
            ids: Some(ids),
            ..Self::default()
        }
    }

    pub fn file(file_id: FileId) -> Self {
        Self {
            file_id: Some(file_id),
            ..Self::default()
        }
    }

    pub fn of_file(mut self, file_id: FileId) -> Self {
        self.file_id = Some(file_id);
        self
    }

    pub fn at_index(mut self, index: u32) -> Self {
        self.index = Some(index);
        self
    }

    pub fn in_states(mut self, states: &[ChunkState]) -> Self {
        self.states = Some(states.to_vec());
        self
    }

    pub fn with_hash(mut self, hash: impl Into<String>) -> Self {
        self.hash = Some(hash.into());
        self
    }

    pub fn matches(&self, chunk: &ChunkRecord) -> bool {
        if let Some(id) = &self.id {
            if chunk.id != *id {
                return false;
            }
        }
        if let Some(ids) = &self.ids {
            if !ids.contains(&chunk.id) {
                return false;
            }
        }
        if let Some(file_id) = &self.file_id {
            if chunk.file_id != *file_id {
                return false;
            }
        }
        if let Some(index) = self.index {
            if chunk.index != index {
                return false;
            }
        }
        if let Some(states) = &self.states {
            if !states.contains(&chunk.state) {
                return false;
            }
        }
        if let Some(hash) = &self.hash {
            if chunk.hash != *hash {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Default)]
pub struct ChunkPatch {
    pub state: Option<ChunkState>,
    pub data: Option<Vec<u8>>,
    pub hash: Option<String>,
}

impl ChunkPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(mut self, state: ChunkState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn data(mut self, data: Vec<u8>) -> Self {
        self.data = Some(data);
        self
    }

    pub fn hash(mut self, hash: impl Into<String>) -> Self {
        self.hash = Some(hash.into());
        self
    }

    pub fn apply(&self, chunk: &mut ChunkRecord) {
        if let Some(state) = self.state {
            chunk.state = state;
        }
        if let Some(data) = &self.data {
            chunk.data = data.clone();
        }
        if let Some(hash) = &self.hash {
            chunk.hash = hash.clone();
        }
    }
}

/// Window over a chunk query, always in ascending `(file_id, index)` order.
/// Listed chunks never carry their payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct Page {
    pub offset: usize,
    pub limit: Option<usize>,
}

impl Page {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn window(offset: usize, limit: Option<usize>) -> Self {
        Self { offset, limit }
    }

    pub(crate) fn slice<T>(&self, items: Vec<T>) -> Vec<T> {
        let iter = items.into_iter().skip(self.offset);
        match self.limit {
            Some(limit) => iter.take(limit).collect(),
            None => iter.collect(),
        }
    }
}
