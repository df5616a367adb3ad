//! HTTP handlers for object operations: fetch, upload, update and
//! batch delete. Authorization and payload validation happen here in
//! the documented order (existence, then permission, then payload);
//! storage concerns are delegated to `StorageService`.

use crate::{
    auth::RequireApiKey,
    errors::AppError,
    models::key::Permission,
    services::storage_service::{StorageService, UploadedFile},
};
use axum::{
    Json,
    body::Body,
    extract::{Multipart, Path, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;
use tokio_util::io::ReaderStream;

#[derive(Serialize)]
pub struct UploadResponse {
    pub message: String,
    pub files: Vec<StoredFileView>,
}

#[derive(Serialize)]
pub struct StoredFileView {
    pub uri: String,
    pub original: String,
    pub size: i64,
    pub public: bool,
}

#[derive(Serialize)]
pub struct UpdateResponse {
    pub message: String,
    pub uri: String,
    pub original: String,
    pub size: i64,
}

/// GET `/storage/{id}/{filename}` — stream raw object bytes.
///
/// Public by design: no credential, no visibility check. Bucket
/// existence is answered by the catalog, file existence by the disk.
pub async fn fetch_object(
    State(storage): State<StorageService>,
    Path((id, filename)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let (file, len) = storage.open_object(&id, &filename).await?;

    let mut response = Response::new(Body::from_stream(ReaderStream::new(file)));
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    if let Ok(value) = HeaderValue::from_str(&len.to_string()) {
        headers.insert(header::CONTENT_LENGTH, value);
    }
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    Ok(response)
}

/// POST `/storage/{id}/upload` — upload one or more files.
pub async fn upload_objects(
    State(storage): State<StorageService>,
    RequireApiKey(key): RequireApiKey,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let bucket = storage.check_access(&id, &key, Permission::Create).await?;

    let files = collect_files(multipart).await?;
    let records = storage.upload(&bucket, files).await?;

    Ok(Json(UploadResponse {
        message: format!("Uploaded {} files to bucket", records.len()),
        files: records
            .into_iter()
            .map(|rec| StoredFileView {
                uri: format!("/storage/{}/{}", bucket, rec.filename),
                original: rec.original_name,
                size: rec.size_bytes,
                public: rec.is_public,
            })
            .collect(),
    }))
}

/// PUT `/storage/{id}/{filename}` — replace one file's content.
pub async fn update_object(
    State(storage): State<StorageService>,
    RequireApiKey(key): RequireApiKey,
    Path((id, filename)): Path<(String, String)>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let bucket = storage.check_access(&id, &key, Permission::Update).await?;

    let files = collect_files(multipart).await?;
    let updated = storage.update(&bucket, &filename, files).await?;

    Ok(Json(UpdateResponse {
        message: format!("Updated {filename}"),
        uri: format!("/storage/{}/{}", bucket, updated.filename),
        original: updated.original_name,
        size: updated.size_bytes,
    }))
}

/// DELETE `/storage/{id}` — batch-delete files named in the body.
///
/// The body is inspected leniently so a missing or non-array
/// `filenames` answers 400 rather than a framework rejection.
pub async fn delete_objects(
    State(storage): State<StorageService>,
    RequireApiKey(key): RequireApiKey,
    Path(id): Path<String>,
    body: Option<Json<serde_json::Value>>,
) -> Result<impl IntoResponse, AppError> {
    let bucket = storage.check_access(&id, &key, Permission::Delete).await?;

    let filenames: Vec<String> = body
        .and_then(|Json(value)| value.get("filenames").cloned())
        .and_then(|value| serde_json::from_value(value).ok())
        .unwrap_or_default();

    storage.delete_files(&bucket, &filenames).await?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "message": format!("Deleted {} files from bucket {}", filenames.len(), bucket),
            "deleted": filenames,
        })),
    ))
}

/// Drain the `files` fields of a multipart payload into memory.
async fn collect_files(mut multipart: Multipart) -> Result<Vec<UploadedFile>, AppError> {
    let mut files = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::bad_request(format!("invalid multipart payload: {err}")))?
    {
        if field.name() != Some("files") {
            continue;
        }
        let original_name = field
            .file_name()
            .map(str::to_string)
            .unwrap_or_else(|| "unnamed".to_string());
        let content = field
            .bytes()
            .await
            .map_err(|err| AppError::bad_request(format!("failed to read file field: {err}")))?;
        files.push(UploadedFile {
            original_name,
            content,
        });
    }
    Ok(files)
}
