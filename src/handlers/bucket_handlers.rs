//! HTTP handlers for bucket-level operations: stats, create, rename
//! and drop.

use crate::{
    auth::RequireApiKey,
    errors::AppError,
    models::key::Permission,
    services::storage_service::StorageService,
};
use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use serde::Serialize;
use serde_json::json;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub message: String,
    pub bucket_id: String,
    pub file_count: usize,
    pub files: Vec<FileStatView>,
    pub total_size: i64,
}

#[derive(Serialize)]
pub struct FileStatView {
    pub filename: String,
    pub size: i64,
}

/// GET `/bucket/{id}` — listing plus aggregate stats, computed from
/// the filesystem rather than the catalog.
pub async fn bucket_stats(
    State(storage): State<StorageService>,
    RequireApiKey(key): RequireApiKey,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let bucket = storage.check_access(&id, &key, Permission::View).await?;
    let stats = storage.bucket_stats(&bucket).await?;

    Ok(Json(StatsResponse {
        message: format!("{} files in bucket {}", stats.file_count, stats.bucket),
        bucket_id: stats.bucket,
        file_count: stats.file_count,
        files: stats
            .files
            .into_iter()
            .map(|(filename, size)| FileStatView { filename, size })
            .collect(),
        total_size: stats.total_size,
    }))
}

/// POST `/bucket/{id}` — create a bucket.
///
/// Deliberately unauthenticated: intended for trusted/internal
/// callers only. The storage directory is created lazily on first
/// upload.
pub async fn create_bucket(
    State(storage): State<StorageService>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    storage.create_bucket(&id).await?;
    Ok(Json(json!({ "message": "Bucket created" })))
}

/// PUT `/bucket/{id}` — rename a bucket (body: `{newId}`).
pub async fn rename_bucket(
    State(storage): State<StorageService>,
    RequireApiKey(key): RequireApiKey,
    Path(id): Path<String>,
    body: Option<Json<serde_json::Value>>,
) -> Result<impl IntoResponse, AppError> {
    let bucket = storage.check_access(&id, &key, Permission::Rename).await?;

    let new_id = body
        .as_ref()
        .and_then(|Json(value)| value.get("newId"))
        .and_then(|value| value.as_str())
        .map(str::to_string)
        .ok_or_else(|| AppError::bad_request("newId is required"))?;

    let new_bucket = storage.rename_bucket(&bucket, &new_id).await?;

    Ok(Json(json!({
        "message": format!("Bucket renamed from {} to {}", bucket, new_bucket),
        "bucketId": new_bucket,
    })))
}

/// DELETE `/bucket/{id}` — drop a bucket and all its contents.
pub async fn drop_bucket(
    State(storage): State<StorageService>,
    RequireApiKey(key): RequireApiKey,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let bucket = storage.check_access(&id, &key, Permission::Drop).await?;
    storage.drop_bucket(&bucket).await?;
    Ok(Json(json!({
        "message": format!("Bucket '{}' deleted", bucket)
    })))
}
