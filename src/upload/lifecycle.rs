use chrono::Utc;
use storage_engine::{FileFilter, FileId, FilePatch, FileState};
use tracing::{info, warn};

use super::Coordinator;
use crate::error::{Result, UploadError};
use crate::state;

impl Coordinator {
    /// Marks an unfinished upload as failed. The next chunk upload resumes it.
    pub async fn mark_file_failed(&self, file_id: FileId, reason: &str) -> Result<()> {
        warn!("Marking file {} as failed: {}", file_id, reason);
        self.transition(file_id, state::FILE_CAN_FAIL, FileState::Failed, "file cannot fail")
            .await
    }

    pub async fn abandon_file(&self, file_id: FileId) -> Result<()> {
        info!("Abandoning file {}", file_id);
        self.transition(
            file_id,
            state::FILE_CAN_BE_ABANDONED,
            FileState::Abandoned,
            "file cannot be abandoned",
        )
        .await
    }

    /// Logical deletion of a finalized file. Records are kept.
    pub async fn delete_file(&self, file_id: FileId) -> Result<()> {
        info!("Deleting file {}", file_id);
        self.transition(
            file_id,
            state::FILE_CAN_BE_DELETED,
            FileState::Deleted,
            "file cannot be deleted",
        )
        .await
    }

    async fn transition(
        &self,
        file_id: FileId,
        allowed: &[FileState],
        target: FileState,
        message: &str,
    ) -> Result<()> {
        let file = self
            .store
            .find_file(&FileFilter::id(file_id))
            .await?
            .ok_or_else(|| UploadError::NotFound(format!("file {}", file_id)))?;
        if !allowed.contains(&file.state) {
            return Err(UploadError::conflict(message, file.state, allowed));
        }

        let matched = self
            .store
            .update_file(
                &FileFilter::id(file_id).in_states(allowed),
                &FilePatch::new().state(target).touch(Utc::now()),
            )
            .await?;
        if matched == 0 {
            warn!("File {} changed state before moving to {}", file_id, target);
            return Err(self.conflict_after_race(file_id, message, allowed).await);
        }
        Ok(())
    }
}
