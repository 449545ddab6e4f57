#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Arc;

    use assert_cmd::Command;
    use chunked_upload::cli::upload_file;
    use chunked_upload::hash::hash_bytes;
    use chunked_upload::Coordinator;
    use predicates::prelude::*;
    use storage_engine::{FileState, MemoryStore};
    use tempfile::TempDir;

    fn cli(storage: &Path) -> Command {
        let mut cmd = Command::cargo_bin("chunked-upload").expect("binary is built");
        cmd.arg("--storage").arg(storage).arg("--chunk-size").arg("16");
        cmd
    }

    /// Pulls the file id out of the `Uploaded <path> as <id>` line.
    fn uploaded_id(stdout: &[u8]) -> String {
        String::from_utf8_lossy(stdout)
            .lines()
            .find_map(|line| line.strip_prefix("Uploaded "))
            .and_then(|rest| rest.rsplit(" as ").next())
            .expect("upload prints the file id")
            .trim()
            .to_string()
    }

    /// Test the upload helper against an in-memory store
    #[tokio::test]
    async fn test_upload_file_runs_whole_protocol() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("notes.txt");
        let content = b"Hello, world! This spans a few chunks.";
        std::fs::write(&path, content).unwrap();

        let coordinator = Coordinator::new(Arc::new(MemoryStore::new())).with_chunk_size(8);
        let (file_id, hash) = upload_file(&coordinator, &path, None)
            .await
            .expect("Failed to upload file");
        assert_eq!(hash, hash_bytes(content));

        let file = coordinator.find_file(file_id).await.unwrap();
        assert_eq!(file.state, FileState::Finalized);
        assert_eq!(file.name, "notes.txt");
        assert_eq!(file.mime_type, "text/plain");
        assert_eq!(file.chunks.len(), 5);
    }

    /// Test uploading, inspecting, verifying and downloading through the binary
    #[test]
    fn test_cli_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let storage = temp_dir.path().join("store");
        let input = temp_dir.path().join("input.bin");
        let output = temp_dir.path().join("output.bin");
        let content: Vec<u8> = (0..200u8).collect();
        std::fs::write(&input, &content).unwrap();

        let upload = cli(&storage)
            .arg("upload")
            .arg("--file")
            .arg(&input)
            .assert()
            .success()
            .stdout(predicate::str::contains(hash_bytes(&content)));
        let file_id = uploaded_id(&upload.get_output().stdout);

        cli(&storage)
            .arg("list")
            .assert()
            .success()
            .stdout(predicate::str::contains(file_id.as_str()).and(predicate::str::contains("input.bin")));

        cli(&storage)
            .args(["info", "--file-id", &file_id])
            .assert()
            .success()
            .stdout(predicate::str::contains("finalized").and(predicate::str::contains("13/13 chunks")));

        cli(&storage)
            .args(["verify", "--file-id", &file_id])
            .assert()
            .success()
            .stdout(predicate::str::starts_with("OK"));

        cli(&storage)
            .args(["download", "--file-id", &file_id, "--output"])
            .arg(&output)
            .assert()
            .success();
        assert_eq!(std::fs::read(&output).unwrap(), content);

        cli(&storage)
            .args(["abandon", "--file-id", &file_id])
            .assert()
            .failure()
            .stderr(predicate::str::contains("cannot be abandoned"));

        cli(&storage)
            .args(["delete", "--file-id", &file_id])
            .assert()
            .success();

        cli(&storage)
            .args(["verify", "--file-id", &file_id])
            .assert()
            .failure()
            .stderr(predicate::str::contains("not found"));
    }

    /// Test that compressed storage is transparent to the caller
    #[test]
    fn test_cli_with_compression() {
        let temp_dir = TempDir::new().unwrap();
        let storage = temp_dir.path().join("store");
        let input = temp_dir.path().join("zeros.bin");
        std::fs::write(&input, vec![0u8; 100]).unwrap();

        let upload = cli(&storage)
            .arg("--compress")
            .args(["upload", "--type", "application/x-zeros", "--file"])
            .arg(&input)
            .assert()
            .success();
        let file_id = uploaded_id(&upload.get_output().stdout);

        cli(&storage)
            .args(["info", "--file-id", &file_id])
            .assert()
            .success()
            .stdout(predicate::str::contains("application/x-zeros"));

        cli(&storage)
            .args(["verify", "--file-id", &file_id])
            .assert()
            .success();
    }

    /// Test error reporting for missing files and bad ids
    #[test]
    fn test_cli_errors() {
        let temp_dir = TempDir::new().unwrap();
        let storage = temp_dir.path().join("store");

        cli(&storage)
            .args(["upload", "--file"])
            .arg(temp_dir.path().join("missing.bin"))
            .assert()
            .failure()
            .stderr(predicate::str::contains("file not found"));

        cli(&storage)
            .args(["info", "--file-id", "not-a-uuid"])
            .assert()
            .failure();

        cli(&storage)
            .arg("list")
            .assert()
            .success()
            .stdout(predicate::str::contains("No files stored"));
    }
}
