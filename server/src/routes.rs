use chunked_upload::{
    Coordinator, FailFileRequest, FinalizeFileChunkRequest, FinalizeFileChunkResponse,
    FinalizeFileRequest, FinalizeFileResponse, InsertFileRequest, InsertFileResponse,
    UploadFileChunkRequest, UploadFileChunkResponse, VerifyReport,
};
use rocket::serde::json::{json, Error as JsonError, Json, Value};
use rocket::{delete, get, post, State};
use storage_engine::{ChunkId, ChunkSummary, FileId, FileRecord};

use crate::error::{ApiError, ApiResult};

type JsonBody<'r, T> = Result<Json<T>, JsonError<'r>>;

fn body<T>(request: JsonBody<'_, T>) -> ApiResult<T> {
    request
        .map(Json::into_inner)
        .map_err(|e| ApiError::validation(e.to_string()))
}

fn file_id(raw: &str) -> ApiResult<FileId> {
    raw.parse()
        .map_err(|_| ApiError::validation(format!("malformed file id {}", raw)))
}

fn chunk_id(raw: &str) -> ApiResult<ChunkId> {
    raw.parse()
        .map_err(|_| ApiError::validation(format!("malformed chunk id {}", raw)))
}

#[get("/health")]
pub fn health() -> Value {
    json!({ "status": "ok" })
}

#[post("/files", format = "json", data = "<request>")]
pub async fn insert_file(
    coordinator: &State<Coordinator>,
    request: JsonBody<'_, InsertFileRequest>,
) -> ApiResult<Json<InsertFileResponse>> {
    Ok(Json(coordinator.insert_file(body(request)?).await?))
}

#[post("/files/chunks/upload", format = "json", data = "<request>")]
pub async fn upload_chunk(
    coordinator: &State<Coordinator>,
    request: JsonBody<'_, UploadFileChunkRequest>,
) -> ApiResult<Json<UploadFileChunkResponse>> {
    Ok(Json(coordinator.upload_chunk(body(request)?).await?))
}

#[post("/files/chunks/finalize", format = "json", data = "<request>")]
pub async fn finalize_chunk(
    coordinator: &State<Coordinator>,
    request: JsonBody<'_, FinalizeFileChunkRequest>,
) -> ApiResult<Json<FinalizeFileChunkResponse>> {
    Ok(Json(coordinator.finalize_chunk(body(request)?).await?))
}

#[post("/files/finalize", format = "json", data = "<request>")]
pub async fn finalize_file(
    coordinator: &State<Coordinator>,
    request: JsonBody<'_, FinalizeFileRequest>,
) -> ApiResult<Json<FinalizeFileResponse>> {
    Ok(Json(coordinator.finalize_file(body(request)?).await?))
}

#[get("/files")]
pub async fn list_files(coordinator: &State<Coordinator>) -> ApiResult<Json<Vec<FileRecord>>> {
    Ok(Json(coordinator.list_files().await?))
}

#[get("/files/<id>")]
pub async fn find_file(coordinator: &State<Coordinator>, id: &str) -> ApiResult<Json<FileRecord>> {
    Ok(Json(coordinator.find_file(file_id(id)?).await?))
}

#[get("/files/<id>/chunks?<offset>&<limit>")]
pub async fn find_file_chunks(
    coordinator: &State<Coordinator>,
    id: &str,
    offset: Option<usize>,
    limit: Option<usize>,
) -> ApiResult<Json<Vec<ChunkSummary>>> {
    let chunks = coordinator
        .find_file_chunks(file_id(id)?, offset.unwrap_or(0), limit)
        .await?;
    Ok(Json(chunks))
}

#[get("/chunks/<id>")]
pub async fn find_file_chunk(
    coordinator: &State<Coordinator>,
    id: &str,
) -> ApiResult<Json<ChunkSummary>> {
    Ok(Json(coordinator.find_file_chunk(chunk_id(id)?).await?))
}

#[get("/files/<id>/verify")]
pub async fn verify_file(coordinator: &State<Coordinator>, id: &str) -> ApiResult<Json<VerifyReport>> {
    Ok(Json(coordinator.verify_file(file_id(id)?).await?))
}

#[post("/files/<id>/fail", data = "<request>")]
pub async fn mark_file_failed(
    coordinator: &State<Coordinator>,
    id: &str,
    request: Option<Json<FailFileRequest>>,
) -> ApiResult<Json<FileRecord>> {
    let id = file_id(id)?;
    let reason = request.map(|r| r.into_inner().reason).unwrap_or_default();
    coordinator.mark_file_failed(id, &reason).await?;
    Ok(Json(coordinator.find_file(id).await?))
}

#[post("/files/<id>/abandon")]
pub async fn abandon_file(coordinator: &State<Coordinator>, id: &str) -> ApiResult<Json<FileRecord>> {
    let id = file_id(id)?;
    coordinator.abandon_file(id).await?;
    Ok(Json(coordinator.find_file(id).await?))
}

#[delete("/files/<id>")]
pub async fn delete_file(coordinator: &State<Coordinator>, id: &str) -> ApiResult<Json<FileRecord>> {
    let id = file_id(id)?;
    coordinator.delete_file(id).await?;
    Ok(Json(coordinator.find_file(id).await?))
}
