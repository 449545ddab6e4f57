use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use storage_engine::FileId;

use crate::chunk::{ChunkReader, DEFAULT_CHUNK_SIZE};
use crate::config::{default_data_dir, UploadConfig, DEFAULT_CACHE_SIZE};
use crate::hash::ContentHasher;
use crate::types::{
    detect_mime_type, FinalizeFileChunkRequest, FinalizeFileRequest, InsertFileRequest,
    UploadFileChunkRequest,
};
use crate::upload::Coordinator;

#[derive(Parser)]
#[command(name = "chunked-upload")]
#[command(about = "Chunked file upload against a local store", long_about = None)]
pub struct Cli {
    /// Storage directory [default: per-user data directory]
    #[arg(short, long)]
    pub storage: Option<PathBuf>,

    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: u64,

    /// Gzip chunk payloads on disk
    #[arg(long)]
    pub compress: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    pub fn config(&self) -> UploadConfig {
        UploadConfig {
            chunk_size: self.chunk_size,
            data_dir: Some(self.storage.clone().unwrap_or_else(default_data_dir)),
            cache_size: DEFAULT_CACHE_SIZE,
            compression: self.compress,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Upload a file chunk by chunk
    Upload {
        #[arg(short, long)]
        file: PathBuf,

        /// MIME type, sniffed from the content when omitted
        #[arg(short = 't', long = "type")]
        mime_type: Option<String>,
    },

    /// List stored files, newest first
    List,

    /// Show a file record and its upload progress
    Info {
        #[arg(short = 'i', long = "file-id")]
        file_id: FileId,
    },

    /// Re-hash a finalized file against its recorded digests
    Verify {
        #[arg(short = 'i', long = "file-id")]
        file_id: FileId,
    },

    /// Write a finalized file to disk
    Download {
        #[arg(short = 'i', long = "file-id")]
        file_id: FileId,

        #[arg(short, long)]
        output: PathBuf,
    },

    /// Give up on an unfinished upload
    Abandon {
        #[arg(short = 'i', long = "file-id")]
        file_id: FileId,
    },

    /// Mark a finalized file as deleted
    Delete {
        #[arg(short = 'i', long = "file-id")]
        file_id: FileId,
    },
}

pub async fn execute_command(coordinator: &Coordinator, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Upload { file, mime_type } => {
            let (file_id, hash) = upload_file(coordinator, &file, mime_type).await?;
            println!("Uploaded {} as {}", file.display(), file_id);
            println!("sha256 {}", hash);
        }
        Commands::List => {
            let files = coordinator.list_files().await?;
            if files.is_empty() {
                println!("No files stored");
            }
            for file in files {
                println!(
                    "{}  {:<10} {:>12}  {}  {}",
                    file.id,
                    file.state,
                    file.size,
                    file.created_at.format("%Y-%m-%d %H:%M:%S"),
                    file.name
                );
            }
        }
        Commands::Info { file_id } => {
            let file = coordinator.find_file(file_id).await?;
            let progress = file.progress();
            println!("id:       {}", file.id);
            println!("name:     {}", file.name);
            println!("type:     {}", file.mime_type);
            println!("size:     {}", file.size);
            println!("state:    {}", file.state);
            println!(
                "progress: {}/{} chunks, {}/{} bytes",
                progress.finalized_chunks,
                progress.total_chunks,
                progress.finalized_bytes,
                progress.total_bytes
            );
            if !file.hash.is_empty() {
                println!("sha256:   {}", file.hash);
            }
        }
        Commands::Verify { file_id } => {
            let report = coordinator.verify_file(file_id).await?;
            println!(
                "OK {} ({} chunks, {} bytes) sha256 {}",
                report.file_id, report.chunks_checked, report.bytes_checked, report.hash
            );
        }
        Commands::Download { file_id, output } => {
            let mut out = tokio::fs::File::create(&output)
                .await
                .with_context(|| format!("cannot create {}", output.display()))?;
            let written = coordinator.export_file(file_id, &mut out).await?;
            println!("Wrote {} bytes to {}", written, output.display());
        }
        Commands::Abandon { file_id } => {
            coordinator.abandon_file(file_id).await?;
            println!("Abandoned {}", file_id);
        }
        Commands::Delete { file_id } => {
            coordinator.delete_file(file_id).await?;
            println!("Deleted {}", file_id);
        }
    }
    Ok(())
}

/// Runs the whole protocol for one local file and returns its id and digest.
///
/// On any failure after insertion the file is marked failed so a later run
/// can tell it apart from an upload still in progress.
pub async fn upload_file(
    coordinator: &Coordinator,
    path: &Path,
    mime_type: Option<String>,
) -> anyhow::Result<(FileId, String)> {
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("invalid file name: {}", path.display()))?
        .to_string();
    let size = tokio::fs::metadata(path)
        .await
        .with_context(|| format!("file not found: {}", path.display()))?
        .len();

    let mut reader = ChunkReader::open(path, coordinator.chunk_size()).await?;
    let first = reader.next_chunk().await?;
    let mime_type = mime_type.unwrap_or_else(|| {
        detect_mime_type(first.as_ref().map(|chunk| chunk.data.as_slice()).unwrap_or_default())
    });

    let inserted = coordinator
        .insert_file(InsertFileRequest {
            name,
            size,
            mime_type,
        })
        .await?;
    let file_id = inserted.file_id;

    let result = async {
        let mut hasher = ContentHasher::new();
        let mut next = first;
        while let Some(chunk) = next {
            let chunk_id = *inserted
                .chunk_ids
                .get(chunk.index as usize)
                .with_context(|| format!("file changed size during upload at chunk {}", chunk.index))?;
            hasher.update(&chunk.data);

            coordinator
                .upload_chunk(UploadFileChunkRequest {
                    file_id,
                    index: chunk.index,
                    chunk_id,
                    size: chunk.data.len() as u64,
                    data: chunk.data,
                })
                .await?;
            coordinator
                .finalize_chunk(FinalizeFileChunkRequest {
                    file_id,
                    index: chunk.index,
                    chunk_id,
                    expected_hash: chunk.hash,
                })
                .await?;

            next = reader.next_chunk().await?;
        }

        let local_hash = hasher.finalize();
        let finalized = coordinator
            .finalize_file(FinalizeFileRequest { file_id, size })
            .await?;
        if finalized.hash != local_hash {
            bail!(
                "server digest {} differs from local digest {}",
                finalized.hash,
                local_hash
            );
        }
        Ok::<_, anyhow::Error>(finalized.hash)
    }
    .await;

    match result {
        Ok(hash) => Ok((file_id, hash)),
        Err(e) => {
            let reason = e.to_string();
            if let Err(mark) = coordinator.mark_file_failed(file_id, &reason).await {
                tracing::warn!("Could not mark file {} as failed: {}", file_id, mark);
            }
            Err(e)
        }
    }
}
