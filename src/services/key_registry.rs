//! Key registry: resolves an opaque credential to a capability record.
//!
//! Records are loaded once at startup from a JSON file and never
//! mutated at request time; `resolve` is a pure lookup.

use crate::models::key::ApiKey;
use anyhow::{Context, Result};
use std::{fs, path::Path};

pub struct KeyRegistry {
    keys: Vec<ApiKey>,
}

impl KeyRegistry {
    /// Load capability records from a JSON array on disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading API key file {}", path.display()))?;
        let keys: Vec<ApiKey> = serde_json::from_str(&raw)
            .with_context(|| format!("parsing API key file {}", path.display()))?;
        tracing::info!("Loaded {} API key records from {}", keys.len(), path.display());
        Ok(Self { keys })
    }

    /// A registry that resolves nothing. Every keyed request fails with
    /// 401 until a key file is provided.
    pub fn empty() -> Self {
        Self { keys: Vec::new() }
    }

    pub fn from_keys(keys: Vec<ApiKey>) -> Self {
        Self { keys }
    }

    /// Resolve a raw credential to its record. Inactive keys resolve
    /// the same as unknown ones so callers cannot probe for them.
    pub fn resolve(&self, raw_key: &str) -> Option<&ApiKey> {
        self.keys.iter().find(|k| k.key == raw_key && k.active)
    }
}
