//! Blob store: durable object bytes under `base_path/{bucket}/{filename}`.
//!
//! Every path is derived from a sanitized bucket identifier plus a
//! validated filename; nothing user-controlled reaches the filesystem
//! unchecked. The store is never consulted for listing or existence
//! decisions except where an operation explicitly wants on-disk truth.

use crate::services::storage_service::{StorageError, StorageResult};
use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::debug;
use uuid::Uuid;

const MAX_FILENAME_LEN: usize = 255;
const MAX_EXTENSION_LEN: usize = 16;

#[derive(Clone)]
pub struct BlobStore {
    /// Root directory holding one subdirectory per bucket.
    pub base_path: PathBuf,
}

impl BlobStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Physical folder for a bucket. Does not check existence.
    fn bucket_root(&self, bucket: &str) -> PathBuf {
        self.base_path.join(bucket)
    }

    fn object_path(&self, bucket: &str, filename: &str) -> StorageResult<PathBuf> {
        ensure_filename_safe(filename)?;
        Ok(self.bucket_root(bucket).join(filename))
    }

    /// Generate a collision-resistant storage filename, keeping the
    /// original extension when it is short and purely alphanumeric.
    pub fn generate_storage_name(original: &str) -> String {
        let stem = Uuid::new_v4().simple().to_string();
        match Path::new(original).extension().and_then(|e| e.to_str()) {
            Some(ext)
                if !ext.is_empty()
                    && ext.len() <= MAX_EXTENSION_LEN
                    && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
            {
                format!("{stem}.{}", ext.to_ascii_lowercase())
            }
            _ => stem,
        }
    }

    /// Idempotent directory creation for a bucket.
    pub async fn ensure_bucket_dir(&self, bucket: &str) -> StorageResult<()> {
        fs::create_dir_all(self.bucket_root(bucket)).await?;
        Ok(())
    }

    /// Write object bytes through a temp file and rename into place.
    pub async fn write_object(
        &self,
        bucket: &str,
        filename: &str,
        content: &[u8],
    ) -> StorageResult<PathBuf> {
        let final_path = self.object_path(bucket, filename)?;
        let parent = self.bucket_root(bucket);
        fs::create_dir_all(&parent).await?;

        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));
        let mut file = File::create(&tmp_path).await?;
        if let Err(err) = file.write_all(content).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StorageError::Io(err));
        }
        if let Err(err) = file.flush().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StorageError::Io(err));
        }
        if let Err(err) = file.sync_all().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StorageError::Io(err));
        }
        if let Err(err) = fs::rename(&tmp_path, &final_path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StorageError::Io(err));
        }

        Ok(final_path)
    }

    pub async fn object_exists(&self, bucket: &str, filename: &str) -> StorageResult<bool> {
        let path = self.object_path(bucket, filename)?;
        Ok(fs::try_exists(&path).await?)
    }

    /// Open an object for streaming out.
    pub async fn open_object(&self, bucket: &str, filename: &str) -> StorageResult<File> {
        let path = self.object_path(bucket, filename)?;
        File::open(&path).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                StorageError::ObjectNotFound {
                    bucket: bucket.to_string(),
                    filename: filename.to_string(),
                }
            } else {
                StorageError::Io(err)
            }
        })
    }

    pub async fn delete_object(&self, bucket: &str, filename: &str) -> StorageResult<()> {
        let path = self.object_path(bucket, filename)?;
        fs::remove_file(&path).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                StorageError::ObjectNotFound {
                    bucket: bucket.to_string(),
                    filename: filename.to_string(),
                }
            } else {
                StorageError::Io(err)
            }
        })
    }

    /// Move a bucket's directory to a new identifier. A missing source
    /// directory is not an error: directories are created lazily on
    /// first upload, so a renamed-but-never-written bucket has none.
    pub async fn rename_bucket_dir(&self, old: &str, new: &str) -> StorageResult<()> {
        match fs::rename(self.bucket_root(old), self.bucket_root(new)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("bucket {} has no directory yet, nothing to rename", old);
                Ok(())
            }
            Err(err) => Err(StorageError::Io(err)),
        }
    }

    /// Recursively remove a bucket's directory. Best-effort: failures
    /// are logged, the catalog mutation has already happened.
    pub async fn drop_bucket_dir(&self, bucket: &str) {
        let path = self.bucket_root(bucket);
        if let Err(err) = fs::remove_dir_all(&path).await {
            if err.kind() != ErrorKind::NotFound {
                debug!(
                    "failed to remove bucket directory {} after drop: {}",
                    path.display(),
                    err
                );
            }
        }
    }

    /// List (filename, size) for every regular file in the bucket
    /// directory. A directory that was never created reads as empty.
    pub async fn stat_bucket(&self, bucket: &str) -> StorageResult<Vec<(String, i64)>> {
        let mut entries = match fs::read_dir(self.bucket_root(bucket)).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(StorageError::Io(err)),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let meta = entry.metadata().await?;
            if !meta.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with(".tmp-") {
                continue;
            }
            files.push((name, meta.len() as i64));
        }
        files.sort();
        Ok(files)
    }
}

/// Reject filenames that could escape the bucket directory.
pub(crate) fn ensure_filename_safe(name: &str) -> StorageResult<()> {
    if name.is_empty() || name.len() > MAX_FILENAME_LEN {
        return Err(StorageError::InvalidFilename);
    }
    if name.contains('/') || name.contains('\\') || name.contains("..") {
        return Err(StorageError::InvalidFilename);
    }
    if name.bytes().any(|b| b.is_ascii_control()) {
        return Err(StorageError::InvalidFilename);
    }
    Ok(())
}
