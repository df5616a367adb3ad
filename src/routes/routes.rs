//! Route table for the bucket storage API.
//!
//! ## Structure
//! - **Object-level endpoints** (`/storage/...`)
//!   - `GET    /storage/{id}/{filename}` — fetch raw object bytes (public)
//!   - `POST   /storage/{id}/upload` — upload one or more files (key: create)
//!   - `PUT    /storage/{id}/{filename}` — replace one file's content (key: update)
//!   - `DELETE /storage/{id}` — batch-delete files (key: delete)
//!
//! - **Bucket-level endpoints** (`/bucket/...`)
//!   - `GET    /bucket/{id}` — listing + aggregate stats (key: view)
//!   - `POST   /bucket/{id}` — create bucket (unauthenticated, trusted callers)
//!   - `PUT    /bucket/{id}` — rename bucket (key: rename)
//!   - `DELETE /bucket/{id}` — drop bucket and contents (key: drop)
//!
//! Bucket identifiers are sanitized to `[A-Za-z0-9_-]` before they
//! touch either store.

use crate::{
    handlers::{
        bucket_handlers::{bucket_stats, create_bucket, drop_bucket, rename_bucket},
        health_handlers::{healthz, readyz},
        object_handlers::{delete_objects, fetch_object, update_object, upload_objects},
    },
    state::AppState,
};
use axum::{
    Router,
    routing::{delete, get, post},
};

/// Build and return the router for all storage and bucket routes.
///
/// The router carries shared state (`AppState`) to all handlers; the
/// key registry is reached through it by the auth extractor.
pub fn routes() -> Router<AppState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // Object-level routes
        .route("/storage/{id}/upload", post(upload_objects))
        .route(
            "/storage/{id}/{filename}",
            get(fetch_object).put(update_object),
        )
        .route("/storage/{id}", delete(delete_objects))
        // Bucket-level routes
        .route(
            "/bucket/{id}",
            get(bucket_stats)
                .post(create_bucket)
                .put(rename_bucket)
                .delete(drop_bucket),
        )
}
