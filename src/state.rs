//! Shared application state handed to every handler.

use crate::services::{key_registry::KeyRegistry, storage_service::StorageService};
use axum::extract::FromRef;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub storage: StorageService,
    pub keys: Arc<KeyRegistry>,
}

impl FromRef<AppState> for StorageService {
    fn from_ref(state: &AppState) -> Self {
        state.storage.clone()
    }
}

impl FromRef<AppState> for Arc<KeyRegistry> {
    fn from_ref(state: &AppState) -> Self {
        state.keys.clone()
    }
}
