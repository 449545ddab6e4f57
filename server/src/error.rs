use chunked_upload::{ErrorKind, UploadError};
use rocket::http::Status;
use rocket::response::{self, Responder};
use rocket::serde::json::Json;
use rocket::Request;
use serde::Serialize;
use tracing::error;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub kind: &'static str,
    pub message: String,
}

/// An [`UploadError`] rendered as a JSON body with a matching status.
#[derive(Debug)]
pub struct ApiError(pub UploadError);

pub type ApiResult<T> = Result<T, ApiError>;

impl From<UploadError> for ApiError {
    fn from(err: UploadError) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError(UploadError::Validation(message.into()))
    }

    pub fn status(&self) -> Status {
        match self.0.kind() {
            ErrorKind::Validation => Status::BadRequest,
            ErrorKind::NotFound => Status::NotFound,
            ErrorKind::StateConflict => Status::Conflict,
            ErrorKind::Integrity => Status::UnprocessableEntity,
            ErrorKind::Storage => Status::InternalServerError,
        }
    }
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, request: &'r Request<'_>) -> response::Result<'static> {
        let status = self.status();
        if status == Status::InternalServerError {
            error!("{} {} failed: {}", request.method(), request.uri(), self.0);
        }
        let body = ErrorBody {
            kind: self.0.kind().as_str(),
            message: self.0.to_string(),
        };
        (status, Json(body)).respond_to(request)
    }
}
