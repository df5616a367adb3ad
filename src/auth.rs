//! API key authentication.
//!
//! `RequireApiKey` is an extractor that resolves the `x-api-key`
//! header against the key registry before the handler body runs.
//! Missing credentials and unknown/inactive keys are distinguished
//! internally but both surface as 401, so callers cannot probe for
//! which keys exist.

use crate::{errors::AppError, models::key::ApiKey, services::key_registry::KeyRegistry};
use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use std::sync::Arc;

pub const API_KEY_HEADER: &str = "x-api-key";

/// Extracts the resolved capability record for the presented key.
pub struct RequireApiKey(pub ApiKey);

impl<S> FromRequestParts<S> for RequireApiKey
where
    Arc<KeyRegistry>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let registry = Arc::<KeyRegistry>::from_ref(state);

        let raw = parts
            .headers
            .get(API_KEY_HEADER)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty());
        let Some(raw) = raw else {
            return Err(AppError::unauthorized("Invalid or missing API key"));
        };

        registry
            .resolve(raw)
            .cloned()
            .map(RequireApiKey)
            .ok_or_else(|| AppError::unauthorized("Invalid or inactive API key"))
    }
}
