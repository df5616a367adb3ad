//! StorageService — the orchestrator coordinating the bucket catalog
//! (SQLite metadata) and the blob store (bytes on disk) for every
//! bucket and object operation.
//!
//! The service owns no state of its own, only the protocol that keeps
//! the two stores in lockstep: blobs are written before their catalog
//! records exist, catalog records are repointed before old blobs are
//! removed, and delete batches are validated in full before anything
//! is touched. Cross-store sequences are deliberately not transactional;
//! the partial-failure windows that remain are logged rather than
//! masked.

use crate::models::{
    key::{ApiKey, Permission},
    object::ObjectRecord,
};
use crate::services::{
    blob_store::BlobStore,
    catalog::BucketCatalog,
    permissions,
};
use bytes::Bytes;
use chrono::Utc;
use sqlx::SqlitePool;
use std::{io, sync::Arc};
use thiserror::Error;
use tokio::fs::File;
use tracing::{error, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Bucket {0} does not exist")]
    BucketNotFound(String),
    #[error("Bucket {0} already exists")]
    BucketAlreadyExists(String),
    #[error("invalid bucket identifier")]
    InvalidBucketId,
    #[error("invalid filename")]
    InvalidFilename,
    #[error("Access denied: cannot {action} in this bucket")]
    AccessDenied { action: Permission },
    #[error("Requested file does not exist")]
    ObjectNotFound { bucket: String, filename: String },
    #[error("File not found: {0}")]
    FileMissing(String),
    #[error("No files were sent")]
    NoFilesSent,
    #[error("No filenames provided")]
    NoFilenames,
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// One file from a multipart upload, buffered in memory.
#[derive(Clone, Debug)]
pub struct UploadedFile {
    pub original_name: String,
    pub content: Bytes,
}

/// Outcome of replacing an object's content.
#[derive(Debug)]
pub struct UpdatedObject {
    pub filename: String,
    pub original_name: String,
    pub size_bytes: i64,
}

/// On-disk view of a bucket, computed from the filesystem rather than
/// the catalog so it reflects literal stored bytes.
#[derive(Debug)]
pub struct BucketStats {
    pub bucket: String,
    pub file_count: usize,
    pub total_size: i64,
    pub files: Vec<(String, i64)>,
}

/// Normalize a bucket identifier to `[A-Za-z0-9_-]`, stripping
/// everything else. An identifier that sanitizes to nothing is
/// rejected outright.
pub fn sanitize_id(raw: &str) -> StorageResult<String> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect();
    if cleaned.is_empty() {
        return Err(StorageError::InvalidBucketId);
    }
    Ok(cleaned)
}

#[derive(Clone)]
pub struct StorageService {
    pub catalog: BucketCatalog,
    pub blobs: BlobStore,
}

impl StorageService {
    pub fn new(db: Arc<SqlitePool>, base_path: impl Into<std::path::PathBuf>) -> Self {
        Self {
            catalog: BucketCatalog::new(db),
            blobs: BlobStore::new(base_path),
        }
    }

    /// Gate shared by every keyed operation: bucket existence first,
    /// then the permission check. The ordering means a caller without
    /// access still learns whether the bucket exists; that disclosure
    /// is a documented trade-off of this API, not an accident.
    ///
    /// Returns the sanitized bucket id for use in the operation proper.
    pub async fn check_access(
        &self,
        bucket_id: &str,
        key: &ApiKey,
        action: Permission,
    ) -> StorageResult<String> {
        let bucket = sanitize_id(bucket_id)?;
        if !self.catalog.exists(&bucket).await? {
            return Err(StorageError::BucketNotFound(bucket));
        }
        if !permissions::authorize(key, &bucket, action) {
            return Err(StorageError::AccessDenied { action });
        }
        Ok(bucket)
    }

    /// Upload one or more files: every blob is written under a freshly
    /// generated storage name first, then all metadata records are
    /// committed in a single batched insert. A failed insert leaves
    /// orphan blobs behind; that window is logged for out-of-band
    /// reconciliation, never hidden.
    pub async fn upload(
        &self,
        bucket_id: &str,
        files: Vec<UploadedFile>,
    ) -> StorageResult<Vec<ObjectRecord>> {
        let bucket = sanitize_id(bucket_id)?;
        if files.is_empty() {
            return Err(StorageError::NoFilesSent);
        }

        self.blobs.ensure_bucket_dir(&bucket).await?;

        let now = Utc::now();
        let mut records = Vec::with_capacity(files.len());
        for file in files {
            let storage_name = BlobStore::generate_storage_name(&file.original_name);
            self.blobs
                .write_object(&bucket, &storage_name, &file.content)
                .await?;
            records.push(ObjectRecord {
                id: Uuid::new_v4(),
                bucket: bucket.clone(),
                filename: storage_name,
                original_name: file.original_name,
                size_bytes: file.content.len() as i64,
                uploaded_at: now,
                updated_at: None,
                is_public: true,
            });
        }

        if let Err(err) = self.catalog.insert_objects(&records).await {
            error!(
                "catalog insert failed after writing {} blob(s) to bucket {}; orphan blobs remain: {}",
                records.len(),
                bucket,
                err
            );
            return Err(err);
        }

        Ok(records)
    }

    /// Replace an object's content. The new blob is written under a new
    /// generated name and the catalog is repointed at it before the old
    /// blob is removed, so a crash between steps leaves at worst an
    /// orphaned old blob, never a dangling catalog reference.
    pub async fn update(
        &self,
        bucket_id: &str,
        filename: &str,
        mut files: Vec<UploadedFile>,
    ) -> StorageResult<UpdatedObject> {
        let bucket = sanitize_id(bucket_id)?;

        if !self.blobs.object_exists(&bucket, filename).await? {
            return Err(StorageError::ObjectNotFound {
                bucket,
                filename: filename.to_string(),
            });
        }

        // The last uploaded field wins when a client sends several.
        let Some(replacement) = files.pop() else {
            return Err(StorageError::NoFilesSent);
        };

        let storage_name = BlobStore::generate_storage_name(&replacement.original_name);
        self.blobs
            .write_object(&bucket, &storage_name, &replacement.content)
            .await?;

        let size_bytes = replacement.content.len() as i64;
        let touched = self
            .catalog
            .update_object(&bucket, filename, &storage_name, size_bytes, Utc::now())
            .await?;
        if touched == 0 {
            warn!(
                "no catalog record matched {} in bucket {}; stores were already diverged",
                filename, bucket
            );
        }

        if let Err(err) = self.blobs.delete_object(&bucket, filename).await {
            warn!(
                "failed to remove replaced blob {} in bucket {}: {}",
                filename, bucket, err
            );
        }

        Ok(UpdatedObject {
            filename: storage_name,
            original_name: replacement.original_name,
            size_bytes,
        })
    }

    /// Batch-delete objects. Every named blob must exist before any
    /// deletion happens; a single missing name aborts the whole batch
    /// with nothing removed. The deletions themselves then run
    /// file-by-file, followed by one catalog delete for the batch.
    pub async fn delete_files(&self, bucket_id: &str, filenames: &[String]) -> StorageResult<u64> {
        let bucket = sanitize_id(bucket_id)?;
        if filenames.is_empty() {
            return Err(StorageError::NoFilenames);
        }

        for filename in filenames {
            if !self.blobs.object_exists(&bucket, filename).await? {
                return Err(StorageError::FileMissing(filename.clone()));
            }
        }

        for filename in filenames {
            self.blobs.delete_object(&bucket, filename).await?;
        }

        self.catalog.delete_objects(&bucket, filenames).await
    }

    /// Open an object for a public fetch. Bucket existence is answered
    /// by the catalog, file existence by the filesystem alone.
    pub async fn open_object(
        &self,
        bucket_id: &str,
        filename: &str,
    ) -> StorageResult<(File, u64)> {
        let bucket = sanitize_id(bucket_id)?;
        if !self.catalog.exists(&bucket).await? {
            return Err(StorageError::BucketNotFound(bucket));
        }

        let file = self.blobs.open_object(&bucket, filename).await?;
        let len = file.metadata().await?.len();
        Ok((file, len))
    }

    /// Count and size a bucket from its directory listing. On-disk
    /// truth is intentional here, even where it diverges from the
    /// catalog.
    pub async fn bucket_stats(&self, bucket_id: &str) -> StorageResult<BucketStats> {
        let bucket = sanitize_id(bucket_id)?;
        let files = self.blobs.stat_bucket(&bucket).await?;
        let total_size = files.iter().map(|(_, size)| size).sum();
        Ok(BucketStats {
            file_count: files.len(),
            total_size,
            files,
            bucket,
        })
    }

    /// Create a bucket in the catalog. The storage directory is created
    /// lazily on first upload, not here.
    pub async fn create_bucket(&self, bucket_id: &str) -> StorageResult<String> {
        let bucket = sanitize_id(bucket_id)?;
        self.catalog.create(&bucket).await?;
        Ok(bucket)
    }

    /// Rename a bucket: catalog first, then the storage directory. A
    /// directory rename failing after the catalog already moved leaves
    /// the stores diverged; that is surfaced to the caller as-is, with
    /// no rollback of the catalog rename.
    pub async fn rename_bucket(&self, old_id: &str, new_id: &str) -> StorageResult<String> {
        let old = sanitize_id(old_id)?;
        let new = sanitize_id(new_id)?;

        if self.catalog.exists(&new).await? {
            return Err(StorageError::BucketAlreadyExists(new));
        }

        self.catalog.rename(&old, &new).await?;

        if let Err(err) = self.blobs.rename_bucket_dir(&old, &new).await {
            error!(
                "directory rename {} -> {} failed after catalog rename; stores diverged: {}",
                old, new, err
            );
            return Err(err);
        }

        Ok(new)
    }

    /// Drop a bucket: catalog collection first, then a best-effort
    /// recursive removal of the directory.
    pub async fn drop_bucket(&self, bucket_id: &str) -> StorageResult<String> {
        let bucket = sanitize_id(bucket_id)?;
        self.catalog.drop(&bucket).await?;
        self.blobs.drop_bucket_dir(&bucket).await;
        Ok(bucket)
    }
}
