use std::path::Path;

use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::hash::hash_bytes;

pub const DEFAULT_CHUNK_SIZE: u64 = 2 * 1024 * 1024;

/// Number of chunks a file of `size` bytes splits into.
pub fn chunk_count(size: u64, chunk_size: u64) -> u64 {
    if chunk_size == 0 {
        return 0;
    }
    size.div_ceil(chunk_size)
}

/// Declared size of every chunk: `chunk_size` except the last, which holds the rest.
pub fn chunk_sizes(size: u64, chunk_size: u64) -> Vec<u64> {
    let count = chunk_count(size, chunk_size);
    (0..count)
        .map(|index| {
            if index + 1 == count {
                size - chunk_size * (count - 1)
            } else {
                chunk_size
            }
        })
        .collect()
}

/// A chunk read from a local source, hashed on the client side.
#[derive(Debug, Clone)]
pub struct LocalChunk {
    pub index: u32,
    pub data: Vec<u8>,
    pub hash: String,
}

/// Splits a byte stream into `chunk_size` pieces without reading it whole.
pub struct ChunkReader<R> {
    reader: R,
    chunk_size: usize,
    next_index: u32,
    done: bool,
}

impl ChunkReader<File> {
    pub async fn open<P: AsRef<Path>>(path: P, chunk_size: u64) -> std::io::Result<Self> {
        let file = File::open(path).await?;
        Ok(Self::new(file, chunk_size))
    }
}

impl<R: AsyncRead + Unpin> ChunkReader<R> {
    pub fn new(reader: R, chunk_size: u64) -> Self {
        Self {
            reader,
            chunk_size: usize::try_from(chunk_size).unwrap_or(usize::MAX).max(1),
            next_index: 0,
            done: false,
        }
    }

    /// Next full chunk, or a shorter final one. `None` once the source is drained.
    pub async fn next_chunk(&mut self) -> std::io::Result<Option<LocalChunk>> {
        if self.done {
            return Ok(None);
        }

        let mut data = vec![0u8; self.chunk_size];
        let mut filled = 0;
        while filled < data.len() {
            let read = self.reader.read(&mut data[filled..]).await?;
            if read == 0 {
                self.done = true;
                break;
            }
            filled += read;
        }
        data.truncate(filled);

        if data.is_empty() {
            return Ok(None);
        }

        let chunk = LocalChunk {
            index: self.next_index,
            hash: hash_bytes(&data),
            data,
        };
        self.next_index += 1;
        Ok(Some(chunk))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_cover_the_whole_file() {
        assert_eq!(chunk_sizes(0, 4), Vec::<u64>::new());
        assert_eq!(chunk_sizes(4, 4), vec![4]);
        assert_eq!(chunk_sizes(10, 4), vec![4, 4, 2]);
        assert_eq!(chunk_count(5, DEFAULT_CHUNK_SIZE), 1);
        assert_eq!(
            chunk_sizes(DEFAULT_CHUNK_SIZE * 2 + 10, DEFAULT_CHUNK_SIZE),
            vec![DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_SIZE, 10]
        );
    }

    #[tokio::test]
    async fn reader_yields_full_chunks_then_remainder() {
        let source: &[u8] = b"abcdefghij";
        let mut reader = ChunkReader::new(source, 4);

        let mut pieces = Vec::new();
        while let Some(chunk) = reader.next_chunk().await.unwrap() {
            assert_eq!(chunk.index as usize, pieces.len());
            assert_eq!(chunk.hash, hash_bytes(&chunk.data));
            pieces.push(chunk.data);
        }
        assert_eq!(pieces, vec![b"abcd".to_vec(), b"efgh".to_vec(), b"ij".to_vec()]);
    }

    #[tokio::test]
    async fn empty_source_has_no_chunks() {
        let source: &[u8] = b"";
        let mut reader = ChunkReader::new(source, 4);
        assert!(reader.next_chunk().await.unwrap().is_none());
    }
}
