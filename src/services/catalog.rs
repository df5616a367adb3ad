//! Bucket catalog: the authoritative record of which buckets exist and
//! what objects they hold, backed by SQLite.
//!
//! A bucket exists iff its `buckets` row exists; object metadata lives
//! in `objects` keyed by (bucket, filename). Single statements rely on
//! SQLite's own atomicity; the two mutations of a rename or a
//! drop-cascade move together inside a transaction so the catalog can
//! never half-rename itself. Consistency with the blob store is the
//! orchestrator's problem, not this module's.

use crate::models::object::ObjectRecord;
use crate::services::storage_service::{StorageError, StorageResult};
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, SqlitePool, sqlite::Sqlite};
use std::sync::Arc;

#[derive(Clone)]
pub struct BucketCatalog {
    /// Shared SQLite connection pool.
    pub db: Arc<SqlitePool>,
}

impl BucketCatalog {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    pub async fn exists(&self, bucket: &str) -> StorageResult<bool> {
        let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM buckets WHERE name = ?")
            .bind(bucket)
            .fetch_optional(&*self.db)
            .await?;
        Ok(found.is_some())
    }

    pub async fn create(&self, bucket: &str) -> StorageResult<()> {
        match sqlx::query("INSERT INTO buckets (name, created_at) VALUES (?, ?)")
            .bind(bucket)
            .bind(Utc::now())
            .execute(&*self.db)
            .await
        {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => {
                Err(StorageError::BucketAlreadyExists(bucket.to_string()))
            }
            Err(err) => Err(StorageError::Sqlx(err)),
        }
    }

    /// Remove a bucket and all its object records in one transaction.
    pub async fn drop(&self, bucket: &str) -> StorageResult<()> {
        let mut tx = self.db.begin().await?;

        sqlx::query("DELETE FROM objects WHERE bucket = ?")
            .bind(bucket)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM buckets WHERE name = ?")
            .bind(bucket)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StorageError::BucketNotFound(bucket.to_string()));
        }

        tx.commit().await?;
        Ok(())
    }

    /// Rename a bucket, carrying its object records along atomically.
    pub async fn rename(&self, old: &str, new: &str) -> StorageResult<()> {
        let mut tx = self.db.begin().await?;

        let result = match sqlx::query("UPDATE buckets SET name = ? WHERE name = ?")
            .bind(new)
            .bind(old)
            .execute(&mut *tx)
            .await
        {
            Ok(result) => result,
            Err(err) if is_unique_violation(&err) => {
                return Err(StorageError::BucketAlreadyExists(new.to_string()));
            }
            Err(err) => return Err(StorageError::Sqlx(err)),
        };
        if result.rows_affected() == 0 {
            return Err(StorageError::BucketNotFound(old.to_string()));
        }

        sqlx::query("UPDATE objects SET bucket = ? WHERE bucket = ?")
            .bind(new)
            .bind(old)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn list_objects(&self, bucket: &str) -> StorageResult<Vec<ObjectRecord>> {
        let rows = sqlx::query_as::<_, ObjectRecord>(
            "SELECT id, bucket, filename, original_name, size_bytes,
                    uploaded_at, updated_at, is_public
             FROM objects WHERE bucket = ? ORDER BY filename ASC",
        )
        .bind(bucket)
        .fetch_all(&*self.db)
        .await?;
        Ok(rows)
    }

    /// Batch-insert the records of one upload in a single statement.
    pub async fn insert_objects(&self, records: &[ObjectRecord]) -> StorageResult<()> {
        if records.is_empty() {
            return Ok(());
        }

        let mut builder = QueryBuilder::<Sqlite>::new(
            "INSERT INTO objects (id, bucket, filename, original_name, size_bytes, \
             uploaded_at, updated_at, is_public) ",
        );
        builder.push_values(records, |mut row, rec| {
            row.push_bind(rec.id)
                .push_bind(&rec.bucket)
                .push_bind(&rec.filename)
                .push_bind(&rec.original_name)
                .push_bind(rec.size_bytes)
                .push_bind(rec.uploaded_at)
                .push_bind(rec.updated_at)
                .push_bind(rec.is_public);
        });
        builder.build().execute(&*self.db).await?;
        Ok(())
    }

    /// Patch the record matching `match_filename` to point at a new
    /// blob. Returns the number of rows touched; zero means the
    /// catalog had no record for that filename.
    pub async fn update_object(
        &self,
        bucket: &str,
        match_filename: &str,
        new_filename: &str,
        size_bytes: i64,
        updated_at: DateTime<Utc>,
    ) -> StorageResult<u64> {
        let result = sqlx::query(
            "UPDATE objects SET filename = ?, size_bytes = ?, updated_at = ?
             WHERE bucket = ? AND filename = ?",
        )
        .bind(new_filename)
        .bind(size_bytes)
        .bind(updated_at)
        .bind(bucket)
        .bind(match_filename)
        .execute(&*self.db)
        .await?;
        Ok(result.rows_affected())
    }

    /// Delete the records for a batch of filenames in one statement.
    pub async fn delete_objects(&self, bucket: &str, filenames: &[String]) -> StorageResult<u64> {
        if filenames.is_empty() {
            return Ok(0);
        }

        let mut builder = QueryBuilder::<Sqlite>::new("DELETE FROM objects WHERE bucket = ");
        builder.push_bind(bucket);
        builder.push(" AND filename IN (");
        let mut separated = builder.separated(", ");
        for filename in filenames {
            separated.push_bind(filename);
        }
        builder.push(")");

        let result = builder.build().execute(&*self.db).await?;
        Ok(result.rows_affected())
    }
}

/// Return true if a SQLx error indicates a unique constraint violation.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err) if db_err.message().to_ascii_lowercase().contains("unique")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;
    use uuid::Uuid;

    async fn catalog() -> BucketCatalog {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        for stmt in include_str!("../../migrations/0001_init.sql")
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            sqlx::query(stmt).execute(&pool).await.unwrap();
        }
        BucketCatalog::new(Arc::new(pool))
    }

    fn record(bucket: &str, filename: &str) -> ObjectRecord {
        ObjectRecord {
            id: Uuid::new_v4(),
            bucket: bucket.to_string(),
            filename: filename.to_string(),
            original_name: "a.txt".to_string(),
            size_bytes: 5,
            uploaded_at: Utc::now(),
            updated_at: None,
            is_public: true,
        }
    }

    #[tokio::test]
    async fn create_then_exists_then_conflict() {
        let catalog = catalog().await;
        assert!(!catalog.exists("b1").await.unwrap());

        catalog.create("b1").await.unwrap();
        assert!(catalog.exists("b1").await.unwrap());

        let err = catalog.create("b1").await.unwrap_err();
        assert!(matches!(err, StorageError::BucketAlreadyExists(name) if name == "b1"));
    }

    #[tokio::test]
    async fn rename_carries_objects_and_detects_conflicts() {
        let catalog = catalog().await;
        catalog.create("b1").await.unwrap();
        catalog.create("b2").await.unwrap();
        catalog.insert_objects(&[record("b1", "f1")]).await.unwrap();

        let err = catalog.rename("b1", "b2").await.unwrap_err();
        assert!(matches!(err, StorageError::BucketAlreadyExists(_)));

        catalog.rename("b1", "b3").await.unwrap();
        assert!(!catalog.exists("b1").await.unwrap());
        assert!(catalog.exists("b3").await.unwrap());
        assert_eq!(catalog.list_objects("b3").await.unwrap().len(), 1);
        assert!(catalog.list_objects("b1").await.unwrap().is_empty());

        let err = catalog.rename("ghost", "b4").await.unwrap_err();
        assert!(matches!(err, StorageError::BucketNotFound(_)));
    }

    #[tokio::test]
    async fn drop_cascades_object_rows() {
        let catalog = catalog().await;
        catalog.create("b1").await.unwrap();
        catalog
            .insert_objects(&[record("b1", "f1"), record("b1", "f2")])
            .await
            .unwrap();

        catalog.drop("b1").await.unwrap();
        assert!(!catalog.exists("b1").await.unwrap());
        assert!(catalog.list_objects("b1").await.unwrap().is_empty());

        let err = catalog.drop("b1").await.unwrap_err();
        assert!(matches!(err, StorageError::BucketNotFound(_)));
    }

    #[tokio::test]
    async fn delete_objects_counts_matches_only() {
        let catalog = catalog().await;
        catalog.create("b1").await.unwrap();
        catalog
            .insert_objects(&[record("b1", "f1"), record("b1", "f2")])
            .await
            .unwrap();

        let deleted = catalog
            .delete_objects("b1", &["f1".into(), "ghost".into()])
            .await
            .unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(catalog.list_objects("b1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn update_object_patches_matched_row() {
        let catalog = catalog().await;
        catalog.create("b1").await.unwrap();
        catalog.insert_objects(&[record("b1", "f1")]).await.unwrap();

        let touched = catalog
            .update_object("b1", "f1", "f1-new", 99, Utc::now())
            .await
            .unwrap();
        assert_eq!(touched, 1);

        let rows = catalog.list_objects("b1").await.unwrap();
        assert_eq!(rows[0].filename, "f1-new");
        assert_eq!(rows[0].size_bytes, 99);
        assert!(rows[0].updated_at.is_some());

        let touched = catalog
            .update_object("b1", "ghost", "x", 1, Utc::now())
            .await
            .unwrap();
        assert_eq!(touched, 0);
    }
}
