use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::{cache::CacheManager, compression::CompressionManager, DocumentStore};
use crate::{
    ChunkFilter, ChunkId, ChunkPatch, ChunkRecord, FileFilter, FileId, FilePatch, FileRecord, Page,
    Result, StorageError,
};

/// Both collections as JSON documents on disk.
///
/// Layout under the base directory:
/// - `files/<id>.json`
/// - `chunks/<id>.json` for chunk documents
/// - `chunks/<id>.bin` or `chunks/<id>.gz` for chunk payloads
///
/// Every write replaces its target through a rename. A chunk's payload and
/// document are staged together and the document is renamed last, so a
/// failed write leaves the previous payload and hash in place. A store-wide
/// lock keeps each conditional update's match and apply together.
pub struct DiskStore {
    files_path: PathBuf,
    chunks_path: PathBuf,
    lock: RwLock<()>,
    cache: Option<CacheManager>,
    compression: CompressionManager,
}

impl DiskStore {
    pub async fn new<P: AsRef<Path>>(base_path: P) -> Result<Self> {
        let base_path = base_path.as_ref().to_owned();
        let files_path = base_path.join("files");
        let chunks_path = base_path.join("chunks");

        fs::create_dir_all(&files_path).await?;
        fs::create_dir_all(&chunks_path).await?;

        Ok(Self {
            files_path,
            chunks_path,
            lock: RwLock::new(()),
            cache: None,
            compression: CompressionManager::new(false),
        })
    }

    pub fn with_cache(mut self, cache_size: usize) -> Self {
        self.cache = Some(CacheManager::new(cache_size));
        self
    }

    pub fn with_compression(mut self, enabled: bool) -> Self {
        self.compression = CompressionManager::new(enabled);
        self
    }

    fn file_path(&self, id: &FileId) -> PathBuf {
        self.files_path.join(format!("{}.json", id))
    }

    fn chunk_path(&self, id: &ChunkId) -> PathBuf {
        self.chunks_path.join(format!("{}.json", id))
    }

    fn payload_path(&self, id: &ChunkId, compressed: bool) -> PathBuf {
        let ext = if compressed { "gz" } else { "bin" };
        self.chunks_path.join(format!("{}.{}", id, ext))
    }

    async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
        match fs::read_to_string(path).await {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn sibling(path: &Path, suffix: &str) -> PathBuf {
        let mut sibling = path.as_os_str().to_owned();
        sibling.push(suffix);
        PathBuf::from(sibling)
    }

    async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
        let tmp = Self::sibling(path, ".tmp");
        fs::write(&tmp, bytes).await?;
        fs::rename(&tmp, path).await?;
        Ok(())
    }

    async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
        let json = serde_json::to_vec_pretty(value)?;
        Self::write_atomic(path, &json).await
    }

    async fn remove_if_exists(path: &Path) -> Result<()> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn scan_documents<T: DeserializeOwned>(dir: &Path) -> Result<Vec<T>> {
        let mut documents = Vec::new();
        let mut entries = fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                match Self::read_json(&path).await {
                    Ok(Some(document)) => documents.push(document),
                    Ok(None) => {}
                    Err(e) => {
                        warn!("Skipping unreadable document {}: {}", path.display(), e);
                    }
                }
            }
        }
        Ok(documents)
    }

    async fn candidate_files(&self, filter: &FileFilter) -> Result<Vec<FileRecord>> {
        let files = match &filter.id {
            Some(id) => Self::read_json::<FileRecord>(&self.file_path(id))
                .await?
                .into_iter()
                .collect(),
            None => Self::scan_documents::<FileRecord>(&self.files_path).await?,
        };
        Ok(files.into_iter().filter(|file| filter.matches(file)).collect())
    }

    /// Chunk documents matching `filter`, without payloads.
    async fn candidate_chunks(&self, filter: &ChunkFilter) -> Result<Vec<ChunkRecord>> {
        let chunks = if let Some(id) = &filter.id {
            Self::read_json::<ChunkRecord>(&self.chunk_path(id))
                .await?
                .into_iter()
                .collect()
        } else if let Some(ids) = &filter.ids {
            let mut chunks = Vec::with_capacity(ids.len());
            for id in ids {
                if let Some(chunk) = Self::read_json::<ChunkRecord>(&self.chunk_path(id)).await? {
                    chunks.push(chunk);
                }
            }
            chunks
        } else {
            Self::scan_documents::<ChunkRecord>(&self.chunks_path).await?
        };
        Ok(chunks.into_iter().filter(|chunk| filter.matches(chunk)).collect())
    }

    async fn read_payload(&self, id: &ChunkId) -> Result<Vec<u8>> {
        if let Some(cache) = &self.cache {
            if let Some(data) = cache.get(id).await {
                return Ok(data.as_ref().clone());
            }
        }

        let data = match fs::read(self.payload_path(id, true)).await {
            Ok(packed) => CompressionManager::decompress(&packed)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                match fs::read(self.payload_path(id, false)).await {
                    Ok(raw) => raw,
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
                    Err(e) => return Err(e.into()),
                }
            }
            Err(e) => return Err(e.into()),
        };

        if let Some(cache) = &self.cache {
            cache.put(*id, Arc::new(data.clone())).await;
        }
        Ok(data)
    }

    /// Writes a chunk document, and its payload when `data` is given.
    ///
    /// Both files are staged first. The payload is swapped in with the old
    /// one kept aside, then the document is renamed over its target. If the
    /// document rename fails the old payload is put back.
    async fn commit_chunk(&self, chunk: &ChunkRecord, data: Option<&[u8]>) -> Result<()> {
        let doc_path = self.chunk_path(&chunk.id);
        let Some(data) = data else {
            return Self::write_json(&doc_path, chunk).await;
        };

        let compressed = self.compression.enabled();
        let payload_path = self.payload_path(&chunk.id, compressed);
        let payload_tmp = Self::sibling(&payload_path, ".tmp");
        let doc_tmp = Self::sibling(&doc_path, ".tmp");
        let backup = Self::sibling(&payload_path, ".bak");

        let json = serde_json::to_vec_pretty(chunk)?;
        let encoded = self.compression.compress(data)?;
        if let Err(e) = Self::stage(&payload_tmp, &encoded, &doc_tmp, &json).await {
            let _ = Self::remove_if_exists(&payload_tmp).await;
            let _ = Self::remove_if_exists(&doc_tmp).await;
            return Err(e);
        }

        let had_previous = fs::try_exists(&payload_path).await?;
        if had_previous {
            fs::rename(&payload_path, &backup).await?;
        }
        if let Err(e) = fs::rename(&payload_tmp, &payload_path).await {
            warn!("Rolling back payload of chunk {}: {}", chunk.id, e);
            if had_previous {
                let _ = fs::rename(&backup, &payload_path).await;
            }
            let _ = Self::remove_if_exists(&payload_tmp).await;
            let _ = Self::remove_if_exists(&doc_tmp).await;
            return Err(e.into());
        }
        if let Err(e) = fs::rename(&doc_tmp, &doc_path).await {
            warn!("Rolling back payload of chunk {}: {}", chunk.id, e);
            if had_previous {
                let _ = fs::rename(&backup, &payload_path).await;
            } else {
                let _ = Self::remove_if_exists(&payload_path).await;
            }
            let _ = Self::remove_if_exists(&doc_tmp).await;
            self.invalidate(&chunk.id).await;
            return Err(e.into());
        }

        Self::remove_if_exists(&backup).await?;
        Self::remove_if_exists(&self.payload_path(&chunk.id, !compressed)).await?;
        self.invalidate(&chunk.id).await;
        Ok(())
    }

    async fn stage(payload_tmp: &Path, payload: &[u8], doc_tmp: &Path, doc: &[u8]) -> Result<()> {
        fs::write(payload_tmp, payload).await?;
        fs::write(doc_tmp, doc).await?;
        Ok(())
    }

    async fn invalidate(&self, id: &ChunkId) {
        if let Some(cache) = &self.cache {
            cache.invalidate(id).await;
        }
    }
}

#[async_trait]
impl DocumentStore for DiskStore {
    async fn insert_file(&self, file: FileRecord) -> Result<FileId> {
        let _guard = self.lock.write().await;
        let path = self.file_path(&file.id);
        if fs::try_exists(&path).await? {
            return Err(StorageError::Storage(format!("duplicate file id {}", file.id)));
        }
        Self::write_json(&path, &file).await?;
        debug!("Inserted file document {}", file.id);
        Ok(file.id)
    }

    async fn find_file(&self, filter: &FileFilter) -> Result<Option<FileRecord>> {
        let _guard = self.lock.read().await;
        Ok(self.candidate_files(filter).await?.into_iter().next())
    }

    async fn find_files(&self, filter: &FileFilter) -> Result<Vec<FileRecord>> {
        let _guard = self.lock.read().await;
        let mut files = self.candidate_files(filter).await?;
        files.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(files)
    }

    async fn update_file(&self, filter: &FileFilter, patch: &FilePatch) -> Result<u64> {
        let _guard = self.lock.write().await;
        let mut matched = 0;
        for mut file in self.candidate_files(filter).await? {
            patch.apply(&mut file);
            Self::write_json(&self.file_path(&file.id), &file).await?;
            matched += 1;
        }
        Ok(matched)
    }

    async fn insert_chunk(&self, chunk: ChunkRecord) -> Result<ChunkId> {
        let _guard = self.lock.write().await;
        let path = self.chunk_path(&chunk.id);
        if fs::try_exists(&path).await? {
            return Err(StorageError::Storage(format!("duplicate chunk id {}", chunk.id)));
        }
        let data = (!chunk.data.is_empty()).then_some(chunk.data.as_slice());
        self.commit_chunk(&chunk, data).await?;
        Ok(chunk.id)
    }

    async fn find_chunk(&self, filter: &ChunkFilter) -> Result<Option<ChunkRecord>> {
        let _guard = self.lock.read().await;
        match self.candidate_chunks(filter).await?.into_iter().next() {
            Some(mut chunk) => {
                chunk.data = self.read_payload(&chunk.id).await?;
                Ok(Some(chunk))
            }
            None => Ok(None),
        }
    }

    async fn find_chunks(&self, filter: &ChunkFilter, page: Page) -> Result<Vec<ChunkRecord>> {
        let _guard = self.lock.read().await;
        let mut chunks = self.candidate_chunks(filter).await?;
        chunks.sort_by_key(|chunk| (chunk.file_id, chunk.index));

        Ok(page.slice(chunks))
    }

    async fn count_chunks(&self, filter: &ChunkFilter) -> Result<u64> {
        let _guard = self.lock.read().await;
        Ok(self.candidate_chunks(filter).await?.len() as u64)
    }

    async fn update_chunk(&self, filter: &ChunkFilter, patch: &ChunkPatch) -> Result<u64> {
        let _guard = self.lock.write().await;
        let mut matched = 0;
        for mut chunk in self.candidate_chunks(filter).await? {
            patch.apply(&mut chunk);
            self.commit_chunk(&chunk, patch.data.as_deref()).await?;
            matched += 1;
        }
        Ok(matched)
    }
}
