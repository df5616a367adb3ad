//! Core data models for the bucket storage service.
//!
//! These entities represent capability records (API keys with their
//! per-bucket grants) and object catalog rows. Catalog rows map to
//! database tables via `sqlx::FromRow` and serialize naturally as JSON
//! via `serde`.

pub mod key;
pub mod object;
