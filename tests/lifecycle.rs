#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chunked_upload::hash::hash_bytes;
    use chunked_upload::*;
    use storage_engine::{
        ChunkFilter, ChunkPatch, DiskStore, DocumentStore, FileId, FileState, MemoryStore,
    };
    use tempfile::TempDir;

    /// Inserts and fully uploads `content`, returning the finalized file id.
    async fn store_file(coordinator: &Coordinator, name: &str, content: &[u8]) -> FileId {
        let inserted = coordinator
            .insert_file(InsertFileRequest {
                name: name.to_string(),
                size: content.len() as u64,
                mime_type: "application/octet-stream".to_string(),
            })
            .await
            .expect("Failed to insert file");

        for (index, piece) in content.chunks(inserted.chunk_size as usize).enumerate() {
            let chunk_id = inserted.chunk_ids[index];
            coordinator
                .upload_chunk(UploadFileChunkRequest {
                    file_id: inserted.file_id,
                    index: index as u32,
                    chunk_id,
                    size: piece.len() as u64,
                    data: piece.to_vec(),
                })
                .await
                .expect("Failed to upload chunk");
            coordinator
                .finalize_chunk(FinalizeFileChunkRequest {
                    file_id: inserted.file_id,
                    index: index as u32,
                    chunk_id,
                    expected_hash: hash_bytes(piece),
                })
                .await
                .expect("Failed to finalize chunk");
        }

        coordinator
            .finalize_file(FinalizeFileRequest {
                file_id: inserted.file_id,
                size: content.len() as u64,
            })
            .await
            .expect("Failed to finalize file");
        inserted.file_id
    }

    async fn create_disk_coordinator(compression: bool) -> (Coordinator, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config = UploadConfig {
            chunk_size: 8,
            compression,
            ..UploadConfig::default()
        }
        .with_data_dir(temp_dir.path());
        let coordinator = Coordinator::from_config(&config)
            .await
            .expect("can't open disk store");
        (coordinator, temp_dir)
    }

    #[tokio::test]
    async fn test_delete_is_logical() {
        let coordinator = Coordinator::new(Arc::new(MemoryStore::new())).with_chunk_size(4);
        let file_id = store_file(&coordinator, "keep.bin", b"some bytes").await;

        coordinator.delete_file(file_id).await.unwrap();
        let file = coordinator.find_file(file_id).await.unwrap();
        assert_eq!(file.state, FileState::Deleted);
        assert_eq!(coordinator.find_file_chunks(file_id, 0, None).await.unwrap().len(), 3);

        let err = coordinator.delete_file(file_id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StateConflict);
        let err = coordinator.verify_file(file_id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_only_unfinished_files_can_be_abandoned_or_failed() {
        let coordinator = Coordinator::new(Arc::new(MemoryStore::new())).with_chunk_size(4);
        let done = store_file(&coordinator, "done.bin", b"abcd").await;

        assert_eq!(
            coordinator.abandon_file(done).await.unwrap_err().kind(),
            ErrorKind::StateConflict
        );
        assert_eq!(
            coordinator.mark_file_failed(done, "late").await.unwrap_err().kind(),
            ErrorKind::StateConflict
        );

        let pending = coordinator
            .insert_file(InsertFileRequest {
                name: "pending.bin".to_string(),
                size: 4,
                mime_type: "text/plain".to_string(),
            })
            .await
            .unwrap();
        coordinator.mark_file_failed(pending.file_id, "timeout").await.unwrap();
        coordinator.abandon_file(pending.file_id).await.unwrap();
        assert_eq!(
            coordinator.find_file(pending.file_id).await.unwrap().state,
            FileState::Abandoned
        );
        assert_eq!(
            coordinator.mark_file_failed(pending.file_id, "again").await.unwrap_err().kind(),
            ErrorKind::StateConflict
        );

        let err = coordinator.abandon_file(FileId::new()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_queries_list_and_page() {
        let coordinator = Coordinator::new(Arc::new(MemoryStore::new())).with_chunk_size(2);
        let first = store_file(&coordinator, "first.bin", b"0123456789").await;
        let second = store_file(&coordinator, "second.bin", b"ab").await;

        let files = coordinator.list_files().await.unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].id, second);
        assert_eq!(files[1].id, first);

        let page = coordinator.find_file_chunks(first, 1, Some(2)).await.unwrap();
        let indexes: Vec<u32> = page.iter().map(|chunk| chunk.index).collect();
        assert_eq!(indexes, vec![1, 2]);

        let tail = coordinator.find_file_chunks(first, 4, Some(10)).await.unwrap();
        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0].hash, hash_bytes(b"89"));

        let progress = coordinator.file_progress(first).await.unwrap();
        assert_eq!(progress.finalized_bytes, 10);
        assert_eq!(progress.total_chunks, 5);

        assert_eq!(
            coordinator.find_file_chunks(FileId::new(), 0, None).await.unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }

    #[tokio::test]
    async fn test_verify_and_export_round_trip_on_disk() {
        let (coordinator, _temp_dir) = create_disk_coordinator(true).await;
        let content: Vec<u8> = (0..100u8).collect();
        let file_id = store_file(&coordinator, "numbers.bin", &content).await;

        let report = coordinator.verify_file(file_id).await.unwrap();
        assert_eq!(report.chunks_checked, 13);
        assert_eq!(report.bytes_checked, 100);
        assert_eq!(report.hash, hash_bytes(&content));

        let mut exported = Vec::new();
        let written = coordinator.export_file(file_id, &mut exported).await.unwrap();
        assert_eq!(written, 100);
        assert_eq!(exported, content);
    }

    #[tokio::test]
    async fn test_verify_detects_corrupted_payload() {
        let (coordinator, _temp_dir) = create_disk_coordinator(false).await;
        let file_id = store_file(&coordinator, "victim.bin", b"0123456789abcdef").await;
        let file = coordinator.find_file(file_id).await.unwrap();

        coordinator
            .store()
            .update_chunk(
                &ChunkFilter::id(file.chunks[1].chunk_id),
                &ChunkPatch::new().data(b"XXXXXXXX".to_vec()),
            )
            .await
            .unwrap();

        let err = coordinator.verify_file(file_id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Integrity);
        assert!(err.to_string().contains("chunk 1"));

        let mut sink = Vec::new();
        let err = coordinator.export_file(file_id, &mut sink).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Integrity);
        assert_eq!(sink, b"01234567");
    }

    #[tokio::test]
    async fn test_unfinished_files_cannot_be_exported() {
        let coordinator = Coordinator::new(Arc::new(MemoryStore::new()));
        let inserted = coordinator
            .insert_file(InsertFileRequest {
                name: "open.bin".to_string(),
                size: 3,
                mime_type: "text/plain".to_string(),
            })
            .await
            .unwrap();

        let mut sink = Vec::new();
        let err = coordinator
            .export_file(inserted.file_id, &mut sink)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StateConflict);
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_disk_store_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let file_id = {
            let store = DiskStore::new(temp_dir.path()).await.unwrap();
            let coordinator = Coordinator::new(Arc::new(store)).with_chunk_size(3);
            store_file(&coordinator, "persisted.txt", b"persist me").await
        };

        let store: Arc<dyn DocumentStore> = Arc::new(DiskStore::new(temp_dir.path()).await.unwrap());
        let coordinator = Coordinator::new(store).with_chunk_size(3);
        let report = coordinator.verify_file(file_id).await.unwrap();
        assert_eq!(report.hash, hash_bytes(b"persist me"));
    }
}
