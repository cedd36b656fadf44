use super::types::{CacheResult, Ttl};
use async_trait::async_trait;

/// Client for a key/value cache with string payloads and per-entry expiry.
///
/// Implementations must be safe to share between concurrent requests and
/// must apply `set` atomically: a reader sees either the previous entry or
/// the complete new one.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Fetch a live entry. Expired entries read as `None`.
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Write an entry that expires `ttl` from now, replacing any previous one
    async fn set(&self, key: &str, value: String, ttl: Ttl) -> CacheResult<()>;

    /// Short backend name for logs
    fn backend_name(&self) -> &'static str;
}
