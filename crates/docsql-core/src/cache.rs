//! The schema cache collaborator.
//!
//! The hosting platform keeps compiled schemas in a key-value cache to avoid
//! reloading the catalog on every call. The adapter never reads from it; it
//! only clears it when another instance reports a schema change.

use async_trait::async_trait;
use serde_json::Value as Json;
use std::time::Duration;

#[async_trait]
pub trait SchemaCache: Send + Sync + 'static {
    async fn get(&self, key: &str) -> Option<Json>;

    /// Stores a value, expiring it after `ttl` when given.
    async fn put(&self, key: &str, value: Json, ttl: Option<Duration>);

    async fn del(&self, key: &str);

    async fn clear(&self);
}
