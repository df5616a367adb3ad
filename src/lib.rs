//! Scoped bucket storage service: named buckets of binary objects,
//! gated by per-bucket API key grants, backed by a SQLite metadata
//! catalog and an on-disk blob store kept consistent by the
//! storage orchestrator.

pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
