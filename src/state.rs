//! Legal-state predicates shared by every upload operation.
//!
//! Each group is a closed set of states. Operations check membership here
//! before acting and pass the same group to the store as the precondition of
//! their conditional write.

use storage_engine::{ChunkState, FileState};

use crate::error::{Result, UploadError};

pub const FILE_DOES_NOT_EXIST: &[FileState] =
    &[FileState::Creating, FileState::Deleted, FileState::Abandoned];
pub const FILE_CAN_BE_UPLOADED: &[FileState] =
    &[FileState::Created, FileState::Uploading, FileState::Failed];
pub const FILE_ALREADY_UPLOADED: &[FileState] = &[FileState::Finalized];
pub const FILE_CAN_BE_FINALIZED: &[FileState] = &[FileState::Uploading];
/// Finalize precondition for a file without chunks.
///
/// Such a file has nothing to upload and would otherwise never leave
/// `created`, so it may finalize from there as well. This widens the
/// `{uploading}` rule of [`FILE_CAN_BE_FINALIZED`], which applies to every
/// file with at least one chunk.
pub const EMPTY_FILE_CAN_BE_FINALIZED: &[FileState] = &[FileState::Created, FileState::Uploading];
pub const FILE_CAN_BE_DELETED: &[FileState] = &[FileState::Finalized];
pub const FILE_CAN_FAIL: &[FileState] =
    &[FileState::Creating, FileState::Created, FileState::Uploading];
pub const FILE_CAN_BE_ABANDONED: &[FileState] =
    &[FileState::Created, FileState::Uploading, FileState::Failed];

pub const CHUNK_ALREADY_UPLOADED: &[ChunkState] = &[ChunkState::Finalized];
pub const CHUNK_CAN_BE_UPDATED: &[ChunkState] =
    &[ChunkState::Created, ChunkState::Uploading, ChunkState::Failed];
pub const CHUNK_CAN_BE_FINALIZED: &[ChunkState] = &[ChunkState::Uploading];

/// States from which a file holding `chunk_count` chunks may be finalized.
pub fn file_finalizable_states(chunk_count: usize) -> &'static [FileState] {
    if chunk_count == 0 {
        EMPTY_FILE_CAN_BE_FINALIZED
    } else {
        FILE_CAN_BE_FINALIZED
    }
}

/// Rejects chunk writes into a file that is gone, closed, or otherwise not accepting data.
pub fn ensure_file_can_be_uploaded(state: FileState) -> Result<()> {
    if FILE_CAN_BE_UPLOADED.contains(&state) {
        return Ok(());
    }
    let message = if FILE_DOES_NOT_EXIST.contains(&state) {
        "file does not exist"
    } else if FILE_ALREADY_UPLOADED.contains(&state) {
        "file is already uploaded"
    } else {
        "file cannot be uploaded"
    };
    Err(UploadError::conflict(message, state, FILE_CAN_BE_UPLOADED))
}

pub fn ensure_chunk_can_be_uploaded(state: ChunkState) -> Result<()> {
    if CHUNK_ALREADY_UPLOADED.contains(&state) {
        return Err(UploadError::conflict(
            "chunk is already uploaded",
            state,
            CHUNK_CAN_BE_UPDATED,
        ));
    }
    Ok(())
}

pub fn ensure_chunk_can_be_finalized(state: ChunkState) -> Result<()> {
    if CHUNK_CAN_BE_FINALIZED.contains(&state) {
        return Ok(());
    }
    Err(UploadError::conflict(
        "chunk cannot be finalized: invalid state",
        state,
        CHUNK_CAN_BE_FINALIZED,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn every_file_state_belongs_to_exactly_one_upload_group() {
        let all = [
            FileState::Creating,
            FileState::Created,
            FileState::Uploading,
            FileState::Finalized,
            FileState::Failed,
            FileState::Deleted,
            FileState::Abandoned,
        ];
        for state in all {
            let groups = [FILE_DOES_NOT_EXIST, FILE_CAN_BE_UPLOADED, FILE_ALREADY_UPLOADED]
                .iter()
                .filter(|group| group.contains(&state))
                .count();
            assert_eq!(groups, 1, "{state} is in {groups} groups");
        }
    }

    #[test]
    fn upload_errors_name_the_reason() {
        let err = ensure_file_can_be_uploaded(FileState::Abandoned).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StateConflict);
        assert!(err.to_string().contains("does not exist"));

        let err = ensure_file_can_be_uploaded(FileState::Finalized).unwrap_err();
        assert!(err.to_string().contains("already uploaded"));
        assert!(err.to_string().contains("created|uploading|failed"));

        assert!(ensure_file_can_be_uploaded(FileState::Failed).is_ok());
    }

    #[test]
    fn chunk_checks_follow_the_tables() {
        assert!(ensure_chunk_can_be_uploaded(ChunkState::Uploading).is_ok());
        assert!(ensure_chunk_can_be_uploaded(ChunkState::Finalized).is_err());
        assert!(ensure_chunk_can_be_finalized(ChunkState::Uploading).is_ok());
        assert!(ensure_chunk_can_be_finalized(ChunkState::Created).is_err());
    }

    #[test]
    fn empty_files_may_finalize_from_created() {
        assert!(file_finalizable_states(0).contains(&FileState::Created));
        assert!(!file_finalizable_states(1).contains(&FileState::Created));
    }
}
