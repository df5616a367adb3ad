//! Represents an object (file) stored in a bucket.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One catalog row per stored object.
///
/// The `filename` is the server-generated storage name the blob lives
/// under on disk; `original_name` is whatever the client called the
/// file. The struct carries metadata only, never content bytes.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct ObjectRecord {
    /// Internal UUID for DB indexing.
    pub id: Uuid,

    /// Sanitized identifier of the owning bucket.
    pub bucket: String,

    /// Generated storage filename (random hex plus original extension).
    pub filename: String,

    /// Client-supplied filename at upload time.
    pub original_name: String,

    /// Size in bytes.
    pub size_bytes: i64,

    /// When the object was first uploaded.
    pub uploaded_at: DateTime<Utc>,

    /// Set on each in-place content replacement.
    pub updated_at: Option<DateTime<Utc>>,

    /// Visibility flag. Recorded on every object but not yet consulted
    /// by any operation; fetch stays public regardless.
    pub is_public: bool,
}
