//! Capability records: API keys and the per-bucket grants they carry.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A resolved API key record.
///
/// Records are immutable at request time; issuance and revocation are
/// handled out of band by whatever produces the key file.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ApiKey {
    /// Opaque credential string presented in the `x-api-key` header.
    pub key: String,

    /// Human-readable owner label.
    pub owner: String,

    /// Inactive keys resolve the same as unknown ones.
    pub active: bool,

    /// Buckets this key may act on.
    #[serde(default)]
    pub buckets: Vec<BucketGrant>,
}

/// Access granted on a single bucket: either everything (`all`) or an
/// explicit set of permission flags.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct BucketGrant {
    pub name: String,

    #[serde(default)]
    pub all: bool,

    #[serde(default)]
    pub view: bool,
    #[serde(default)]
    pub create: bool,
    #[serde(default)]
    pub update: bool,
    #[serde(default)]
    pub delete: bool,
    #[serde(default)]
    pub rename: bool,
    #[serde(default)]
    pub drop: bool,
}

impl BucketGrant {
    /// Whether this grant carries the specific permission flag.
    /// The `all` shortcut is evaluated by the caller.
    pub fn allows(&self, action: Permission) -> bool {
        match action {
            Permission::View => self.view,
            Permission::Create => self.create,
            Permission::Update => self.update,
            Permission::Delete => self.delete,
            Permission::Rename => self.rename,
            Permission::Drop => self.drop,
        }
    }
}

/// Actions a key can be granted on a bucket.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Permission {
    View,
    Create,
    Update,
    Delete,
    Rename,
    Drop,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::View => "view",
            Permission::Create => "create",
            Permission::Update => "update",
            Permission::Delete => "delete",
            Permission::Rename => "rename",
            Permission::Drop => "drop",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
