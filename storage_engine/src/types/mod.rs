mod chunk;
mod file;
mod ids;

pub use chunk::{ChunkRecord, ChunkState, ChunkSummary};
pub use file::{ChunkInfo, FileProgress, FileRecord, FileState};
pub use ids::{ChunkId, FileId};
