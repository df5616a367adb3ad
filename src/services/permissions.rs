//! Permission evaluator.
//!
//! Pure policy: find the grant matching the bucket id, then allow when
//! the grant carries `all` or the specific permission flag. Bucket
//! existence is checked by the orchestrator before this runs, so a
//! denied caller has already learned whether the bucket exists; that
//! ordering is deliberate.

use crate::models::key::{ApiKey, Permission};

pub fn authorize(key: &ApiKey, bucket_id: &str, action: Permission) -> bool {
    key.buckets
        .iter()
        .find(|grant| grant.name == bucket_id)
        .is_some_and(|grant| grant.all || grant.allows(action))
}
