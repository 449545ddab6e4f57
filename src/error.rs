use std::fmt;

use storage_engine::StorageError;
use thiserror::Error;

/// Failure class of an [`UploadError`], stable across messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    StateConflict,
    Integrity,
    Storage,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::StateConflict => "state_conflict",
            ErrorKind::Integrity => "integrity",
            ErrorKind::Storage => "storage",
        }
    }
}

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("{message} (state is {current}, requires {required})")]
    StateConflict {
        message: String,
        current: String,
        required: String,
    },
    #[error("integrity check failed for {subject}: expected {expected}, found {actual}")]
    Integrity {
        subject: String,
        expected: String,
        actual: String,
    },
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl UploadError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            UploadError::Validation(_) => ErrorKind::Validation,
            UploadError::NotFound(_) => ErrorKind::NotFound,
            UploadError::StateConflict { .. } => ErrorKind::StateConflict,
            UploadError::Integrity { .. } => ErrorKind::Integrity,
            UploadError::Storage(_) | UploadError::Io(_) => ErrorKind::Storage,
        }
    }

    pub(crate) fn conflict<S: fmt::Display>(
        message: impl Into<String>,
        current: impl fmt::Display,
        required: &[S],
    ) -> Self {
        let required = required
            .iter()
            .map(|state| state.to_string())
            .collect::<Vec<_>>()
            .join("|");
        UploadError::StateConflict {
            message: message.into(),
            current: current.to_string(),
            required,
        }
    }

    pub(crate) fn integrity(
        subject: impl Into<String>,
        expected: impl fmt::Display,
        actual: impl fmt::Display,
    ) -> Self {
        UploadError::Integrity {
            subject: subject.into(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, UploadError>;
