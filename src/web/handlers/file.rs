//! File handlers.

use axum::{
    body::Body,
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::{header, StatusCode},
    response::Response,
    Json,
};
use futures::StreamExt;
use std::path::{Path as FsPath, PathBuf};
use std::sync::Arc;
use tokio_util::io::ReaderStream;

use crate::web::dto::{ApiResponse, FileEntryResponse, MessageResponse, UploadResponse};
use crate::web::error::ApiError;
use crate::web::handlers::AppState;
use crate::web::middleware::AuthUser;

/// Generate a safe Content-Disposition header value for file downloads.
///
/// Control characters are dropped, quotes and backslashes replaced, and
/// non-ASCII names get an RFC 5987 `filename*` parameter.
fn content_disposition_header(filename: &str) -> String {
    let plain_ascii =
        filename.is_ascii() && !filename.chars().any(|c| c.is_control() || c == '"' || c == '\\');
    if plain_ascii {
        return format!("attachment; filename=\"{}\"", filename);
    }

    let sanitized: String = filename
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| match c {
            '"' | '\\' => '_',
            _ => c,
        })
        .collect();
    let encoded = urlencoding::encode(filename);

    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        sanitized, encoded
    )
}

/// Reduce a client-supplied file name to a safe single path component.
///
/// Directory parts are dropped, whitespace runs become `_`, and anything
/// other than alphanumerics, `.`, `_` and `-` is removed. Leading and
/// trailing dots and underscores are trimmed so the result can never be
/// `.`, `..` or a hidden file.
fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(|c| c == '/' || c == '\\').next().unwrap_or("");

    let joined = base.split_whitespace().collect::<Vec<_>>().join("_");
    let cleaned: String = joined
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();

    cleaned.trim_matches(|c| c == '.' || c == '_').to_string()
}

/// Per-request staging directory, removed when dropped.
struct StagedUpload {
    dir: PathBuf,
}

impl StagedUpload {
    async fn create(root: &FsPath) -> std::io::Result<Self> {
        let dir = root.join(uuid::Uuid::new_v4().to_string());
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }
}

impl Drop for StagedUpload {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.dir) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %self.dir.display(), error = %e, "Failed to remove staged upload");
            }
        }
    }
}

/// Stream `reader` as a response body, keeping `guard` alive until the body
/// is dropped.
fn body_with_guard<G>(reader: ReaderStream<tokio::fs::File>, guard: G) -> Body
where
    G: Send + Sync + 'static,
{
    Body::from_stream(reader.map(move |chunk| {
        let _keep = &guard;
        chunk
    }))
}

fn multipart_error(e: MultipartError) -> ApiError {
    tracing::warn!("Failed to read multipart data: {}", e);
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::payload_too_large("File too large")
    } else {
        ApiError::bad_request("Invalid multipart data")
    }
}

/// POST /upload - Upload a file to the remote account.
///
/// Request body: multipart/form-data with a `file` field.
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    AuthUser(_claims): AuthUser,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<UploadResponse>>, ApiError> {
    let mut upload: Option<(String, axum::body::Bytes)> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or("").to_string();
        let content = field.bytes().await.map_err(multipart_error)?;
        upload = Some((filename, content));
        break;
    }

    let (filename, content) = upload.ok_or_else(|| ApiError::bad_request("No file part"))?;
    if filename.is_empty() {
        return Err(ApiError::bad_request("No selected file"));
    }
    let safe_name = sanitize_filename(&filename);
    if safe_name.is_empty() {
        return Err(ApiError::bad_request("Invalid file name"));
    }

    let staged = StagedUpload::create(&state.staging_dir).await.map_err(|e| {
        tracing::error!("Failed to create staging directory: {}", e);
        ApiError::internal("Failed to stage upload")
    })?;
    let staged_path = staged.dir.join(&safe_name);
    tokio::fs::write(&staged_path, &content).await.map_err(|e| {
        tracing::error!("Failed to write staged upload: {}", e);
        ApiError::internal("Failed to stage upload")
    })?;

    let result = state.storage().upload(&staged_path).await;
    drop(staged);

    let response = result?;
    let file_key = response
        .first_handle()
        .ok_or_else(|| {
            tracing::error!(file = %safe_name, "Upload returned no node handle");
            ApiError::internal("Failed to upload file")
        })?
        .to_string();

    tracing::info!(file = %safe_name, file_key = %file_key, size = content.len(), "Uploaded file");

    // A stale cache heals on the next miss
    if let Err(e) = state.cache.refresh().await {
        tracing::warn!(error = %e, "Failed to refresh file mapping after upload");
    }

    Ok(Json(ApiResponse::new(UploadResponse {
        message: "File uploaded successfully".to_string(),
        file_key,
    })))
}

/// GET /download/:id - Download a file.
///
/// The file is streamed from the temporary download directory, which lives
/// until the response body is dropped.
pub async fn download_file(
    State(state): State<Arc<AppState>>,
    AuthUser(_claims): AuthUser,
    Path(file_key): Path<String>,
) -> Result<Response<Body>, ApiError> {
    let record = state
        .cache
        .ensure(&file_key)
        .await?
        .ok_or_else(|| ApiError::not_found("File not found"))?;

    let temp_dir = tempfile::tempdir().map_err(|e| {
        tracing::error!("Failed to create temporary directory: {}", e);
        ApiError::internal("Failed to prepare download")
    })?;

    let local_path = state
        .storage()
        .download(&file_key, &record, temp_dir.path())
        .await?;
    tracing::debug!(path = %local_path.display(), "Downloaded file");

    let file = tokio::fs::File::open(&local_path).await.map_err(|e| {
        tracing::error!("Failed to open downloaded file: {}", e);
        ApiError::internal("Failed to read downloaded file")
    })?;
    let content_length = file
        .metadata()
        .await
        .map_err(|e| {
            tracing::error!("Failed to stat downloaded file: {}", e);
            ApiError::internal("Failed to read downloaded file")
        })?
        .len();

    let filename = local_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_key.clone());

    let content_type = mime_guess::from_path(&filename)
        .first_or_octet_stream()
        .to_string();

    let response = Response::builder()
        .header(header::CONTENT_TYPE, content_type)
        .header(
            header::CONTENT_DISPOSITION,
            content_disposition_header(&filename),
        )
        .header(header::CONTENT_LENGTH, content_length)
        .body(body_with_guard(ReaderStream::new(file), temp_dir))
        .map_err(|e| {
            tracing::error!("Failed to build response: {}", e);
            ApiError::internal("Failed to build response")
        })?;

    Ok(response)
}

/// DELETE /delete/:id - Delete a file or folder.
pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    AuthUser(_claims): AuthUser,
    Path(file_key): Path<String>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    if state.cache.ensure(&file_key).await?.is_none() {
        return Err(ApiError::not_found("File not found"));
    }

    state.storage().delete(&file_key).await?;
    state.cache.evict(&file_key).await;
    tracing::info!(file_key = %file_key, "Deleted file");

    Ok(Json(ApiResponse::new(MessageResponse {
        message: "File deleted successfully".to_string(),
    })))
}

/// GET /list - List files and folders.
///
/// Always asks the remote account for a fresh listing; the cache is neither
/// consulted nor updated.
pub async fn list_files(
    State(state): State<Arc<AppState>>,
    AuthUser(_claims): AuthUser,
) -> Result<Json<ApiResponse<Vec<FileEntryResponse>>>, ApiError> {
    let listing = state.storage().list().await?;

    let mut entries: Vec<FileEntryResponse> = listing
        .into_iter()
        .filter_map(|(key, record)| {
            let kind = record.kind.label()?;
            let name = record.display_name()?;
            Some(FileEntryResponse {
                key,
                name,
                size: record.size,
                kind,
            })
        })
        .collect();

    entries.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.key.cmp(&b.key)));

    Ok(Json(ApiResponse::new(entries)))
}
