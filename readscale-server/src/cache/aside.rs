//! Cache-aside decorator for read operations
//!
//! Per invocation: LOOKUP, then either HIT (return the cached value) or
//! MISS, EXECUTE, STORE. The cache is never allowed to fail a read: every
//! cache-side error degrades to a miss or a skipped store.
//!
//! There is no single-flight suppression. Concurrent misses on one key each
//! run the wrapped operation and each store; the last write wins.

use super::key::{CacheKey, KeyBuilder, OperationSignature};
use super::observer::{CacheEvent, CacheObserver};
use super::store::CacheStore;
use super::types::{CacheError, Ttl};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default bound on a single cache round-trip
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_millis(250);

#[derive(Clone)]
pub struct CacheAside {
    store: Arc<dyn CacheStore>,
    keys: KeyBuilder,
    default_ttl: Ttl,
    operation_timeout: Duration,
    observer: Option<Arc<dyn CacheObserver>>,
}

impl CacheAside {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self {
            store,
            keys: KeyBuilder::default(),
            default_ttl: Ttl::DEFAULT,
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
            observer: None,
        }
    }

    pub fn with_key_builder(mut self, keys: KeyBuilder) -> Self {
        self.keys = keys;
        self
    }

    pub fn with_default_ttl(mut self, ttl: Ttl) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn CacheObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn default_ttl(&self) -> Ttl {
        self.default_ttl
    }

    pub fn key_for(&self, signature: &OperationSignature) -> CacheKey {
        self.keys.build(signature)
    }

    /// Serve `compute` through the cache under `signature`.
    ///
    /// `compute` runs at most once, and only on a miss. Its error is returned
    /// as-is and nothing is cached for it. `ttl` overrides the default TTL.
    pub async fn cached<T, E, F, Fut>(
        &self,
        signature: &OperationSignature,
        ttl: Option<Ttl>,
        compute: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let key = self.keys.build(signature);

        if let Some(value) = self.lookup::<T>(&key).await {
            return Ok(value);
        }

        let value = compute().await?;
        self.store(&key, &value, ttl.unwrap_or(self.default_ttl)).await;

        Ok(value)
    }

    async fn lookup<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let key = key.as_str();
        let payload = match tokio::time::timeout(self.operation_timeout, self.store.get(key)).await
        {
            Ok(Ok(Some(payload))) => payload,
            Ok(Ok(None)) => {
                debug!("Cache MISS: {}", key);
                self.emit(CacheEvent::Miss { key });
                return None;
            }
            Ok(Err(error)) => {
                warn!(
                    "Cache lookup failed on {} backend for {}: {}",
                    self.store.backend_name(),
                    key,
                    error
                );
                self.emit(CacheEvent::LookupFailed { key, error: &error });
                return None;
            }
            Err(_) => {
                let error = CacheError::Timeout(self.timeout_ms());
                warn!("Cache lookup for {}: {}", key, error);
                self.emit(CacheEvent::LookupFailed { key, error: &error });
                return None;
            }
        };

        match serde_json::from_str(&payload) {
            Ok(value) => {
                debug!("Cache HIT: {}", key);
                self.emit(CacheEvent::Hit { key });
                Some(value)
            }
            Err(e) => {
                warn!("Cached payload for {} did not decode: {}", key, e);
                self.emit(CacheEvent::DecodeFailed { key });
                None
            }
        }
    }

    async fn store<T: Serialize>(&self, key: &CacheKey, value: &T, ttl: Ttl) {
        let key = key.as_str();

        let encoded = match serde_json::to_value(value) {
            Ok(encoded) => encoded,
            Err(e) => {
                warn!("Result for {} is not serializable, not caching: {}", key, e);
                return;
            }
        };

        if is_empty(&encoded) {
            debug!("Empty result for {}, not caching", key);
            self.emit(CacheEvent::SkippedEmpty { key });
            return;
        }

        let payload = encoded.to_string();
        match tokio::time::timeout(self.operation_timeout, self.store.set(key, payload, ttl)).await
        {
            Ok(Ok(())) => {
                debug!("Cache STORE: {} (ttl={})", key, ttl);
                self.emit(CacheEvent::Stored { key, ttl });
            }
            Ok(Err(error)) => {
                warn!("Cache store failed for {}: {}", key, error);
                self.emit(CacheEvent::StoreFailed { key, error: &error });
            }
            Err(_) => {
                let error = CacheError::Timeout(self.timeout_ms());
                warn!("Cache store for {}: {}", key, error);
                self.emit(CacheEvent::StoreFailed { key, error: &error });
            }
        }
    }

    fn emit(&self, event: CacheEvent<'_>) {
        if let Some(observer) = &self.observer {
            observer.on_event(&event);
        }
    }

    fn timeout_ms(&self) -> u64 {
        self.operation_timeout.as_millis() as u64
    }
}

/// Results that are not worth caching
fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::memory::MemoryCacheStore;
    use crate::cache::observer::CacheStats;
    use crate::cache::types::CacheResult;
    use async_trait::async_trait;
    use serde::Deserialize;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Album {
        id: u64,
        title: String,
    }

    /// Store whose every call fails
    struct BrokenStore;

    #[async_trait]
    impl CacheStore for BrokenStore {
        async fn get(&self, _key: &str) -> CacheResult<Option<String>> {
            Err(CacheError::Unavailable("connection refused".to_string()))
        }

        async fn set(&self, _key: &str, _value: String, _ttl: Ttl) -> CacheResult<()> {
            Err(CacheError::Unavailable("connection refused".to_string()))
        }

        fn backend_name(&self) -> &'static str {
            "broken"
        }
    }

    /// Lookups work, stores fail
    struct ReadOnlyStore(MemoryCacheStore);

    #[async_trait]
    impl CacheStore for ReadOnlyStore {
        async fn get(&self, key: &str) -> CacheResult<Option<String>> {
            self.0.get(key).await
        }

        async fn set(&self, _key: &str, _value: String, _ttl: Ttl) -> CacheResult<()> {
            Err(CacheError::Backend("READONLY".to_string()))
        }

        fn backend_name(&self) -> &'static str {
            "read-only"
        }
    }

    /// Never answers
    struct HangingStore;

    #[async_trait]
    impl CacheStore for HangingStore {
        async fn get(&self, _key: &str) -> CacheResult<Option<String>> {
            std::future::pending().await
        }

        async fn set(&self, _key: &str, _value: String, _ttl: Ttl) -> CacheResult<()> {
            std::future::pending().await
        }

        fn backend_name(&self) -> &'static str {
            "hanging"
        }
    }

    fn album_signature(id: u64) -> OperationSignature {
        OperationSignature::new(format!("/album/{id}"))
            .with_arg("id", &id)
            .unwrap()
    }

    async fn load_album(calls: &AtomicUsize, id: u64) -> Result<Album, String> {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(Album {
            id,
            title: format!("Album {id}"),
        })
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let store = MemoryCacheStore::new();
        let cache = CacheAside::new(Arc::new(store.clone()));
        let calls = AtomicUsize::new(0);
        let sig = album_signature(7);

        let first = cache.cached(&sig, None, || load_album(&calls, 7)).await;
        let second = cache.cached(&sig, None, || load_album(&calls, 7)).await;

        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let key = cache.key_for(&sig);
        let stored = store.get(key.as_str()).await.unwrap().unwrap();
        let decoded: Album = serde_json::from_str(&stored).unwrap();
        assert_eq!(decoded.title, "Album 7");
    }

    #[tokio::test(start_paused = true)]
    async fn test_album_scenario_ttl_expiry() {
        let store = MemoryCacheStore::new();
        let cache = CacheAside::new(Arc::new(store.clone()));
        let ttl = Ttl::from_secs(120).unwrap();
        let calls = AtomicUsize::new(0);
        let sig = album_signature(7);

        let key = cache.key_for(&sig);
        assert!(key.as_str().starts_with("endpoint:/album/7:"));
        assert_eq!(key.as_str().len(), "endpoint:/album/7:".len() + 64);

        cache.cached(&sig, Some(ttl), || load_album(&calls, 7)).await.unwrap();
        tokio::time::advance(Duration::from_secs(60)).await;
        cache.cached(&sig, Some(ttl), || load_album(&calls, 7)).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(61)).await;
        cache.cached(&sig, Some(ttl), || load_album(&calls, 7)).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        // Fresh entry restored with a full TTL
        assert_eq!(store.remaining_ttl(key.as_str()), Some(Duration::from_secs(120)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_ttl_applies() {
        let store = MemoryCacheStore::new();
        let cache = CacheAside::new(Arc::new(store.clone()))
            .with_default_ttl(Ttl::from_secs(30).unwrap());
        let calls = AtomicUsize::new(0);
        let sig = album_signature(1);

        cache.cached(&sig, None, || load_album(&calls, 1)).await.unwrap();

        let key = cache.key_for(&sig);
        assert_eq!(store.remaining_ttl(key.as_str()), Some(Duration::from_secs(30)));
        assert_eq!(cache.default_ttl().as_secs(), 30);
    }

    #[tokio::test]
    async fn test_distinct_arguments_do_not_share_entries() {
        let cache = CacheAside::new(Arc::new(MemoryCacheStore::new()));
        let calls = AtomicUsize::new(0);

        let a = cache
            .cached(&album_signature(1), None, || load_album(&calls, 1))
            .await
            .unwrap();
        let b = cache
            .cached(&album_signature(2), None, || load_album(&calls, 2))
            .await
            .unwrap();

        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_errors_propagate_and_are_not_cached() {
        let store = MemoryCacheStore::new();
        let cache = CacheAside::new(Arc::new(store.clone()));
        let calls = AtomicUsize::new(0);
        let sig = album_signature(9);

        let result: Result<Album, String> = cache
            .cached(&sig, None, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("replica down".to_string())
            })
            .await;
        assert_eq!(result, Err("replica down".to_string()));
        assert!(store.is_empty());

        // Not retried by the layer, and the next call computes again
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        cache.cached(&sig, None, || load_album(&calls, 9)).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_fail_open_when_cache_unavailable() {
        let stats = Arc::new(CacheStats::new());
        let cache = CacheAside::new(Arc::new(BrokenStore)).with_observer(stats.clone());
        let calls = AtomicUsize::new(0);
        let sig = album_signature(3);

        let first = cache.cached(&sig, None, || load_album(&calls, 3)).await;
        let second = cache.cached(&sig, None, || load_album(&calls, 3)).await;

        assert_eq!(first.unwrap().id, 3);
        assert_eq!(second.unwrap().id, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.lookup_failures, 2);
        assert_eq!(snapshot.store_failures, 2);
        assert_eq!(snapshot.misses, 0);
    }

    #[tokio::test]
    async fn test_store_failure_still_returns_value() {
        let stats = Arc::new(CacheStats::new());
        let cache = CacheAside::new(Arc::new(ReadOnlyStore(MemoryCacheStore::new())))
            .with_observer(stats.clone());
        let calls = AtomicUsize::new(0);

        let album = cache
            .cached(&album_signature(4), None, || load_album(&calls, 4))
            .await
            .unwrap();

        assert_eq!(album.id, 4);
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.misses, 1);
        assert_eq!(snapshot.store_failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_cache_times_out_as_miss() {
        let stats = Arc::new(CacheStats::new());
        let cache = CacheAside::new(Arc::new(HangingStore))
            .with_operation_timeout(Duration::from_millis(100))
            .with_observer(stats.clone());
        let calls = AtomicUsize::new(0);

        let album = cache
            .cached(&album_signature(5), None, || load_album(&calls, 5))
            .await
            .unwrap();

        assert_eq!(album.id, 5);
        assert_eq!(stats.snapshot().lookup_failures, 1);
        assert_eq!(stats.snapshot().store_failures, 1);
    }

    #[tokio::test]
    async fn test_undecodable_entry_is_a_miss() {
        let store = MemoryCacheStore::new();
        let stats = Arc::new(CacheStats::new());
        let cache = CacheAside::new(Arc::new(store.clone())).with_observer(stats.clone());
        let calls = AtomicUsize::new(0);
        let sig = album_signature(6);

        store
            .set(cache.key_for(&sig).as_str(), "{not json".to_string(), Ttl::DEFAULT)
            .await
            .unwrap();

        let album = cache.cached(&sig, None, || load_album(&calls, 6)).await.unwrap();
        assert_eq!(album.id, 6);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(stats.snapshot().decode_failures, 1);

        // Overwritten with a good entry
        cache.cached(&sig, None, || load_album(&calls, 6)).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_results_are_not_cached() {
        let store = MemoryCacheStore::new();
        let stats = Arc::new(CacheStats::new());
        let cache = CacheAside::new(Arc::new(store.clone())).with_observer(stats.clone());
        let calls = AtomicUsize::new(0);
        let sig = OperationSignature::new("/albums").with_arg("artist", "nobody").unwrap();

        for _ in 0..2 {
            let albums: Result<Vec<Album>, String> = cache
                .cached(&sig, None, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(Vec::new())
                })
                .await;
            assert!(albums.unwrap().is_empty());
        }

        let missing: Result<Option<Album>, String> =
            cache.cached(&sig, None, || async { Ok(None) }).await;
        assert_eq!(missing, Ok(None));

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(store.is_empty());
        assert_eq!(stats.snapshot().skipped_empty, 3);
    }

    #[tokio::test]
    async fn test_unresolved_signature_shares_route_entry() {
        let cache = CacheAside::new(Arc::new(MemoryCacheStore::new()));
        let calls = AtomicUsize::new(0);
        let sig = OperationSignature::unresolved("/album/latest");

        let first = cache.cached(&sig, None, || load_album(&calls, 1)).await.unwrap();
        let second = cache.cached(&sig, None, || load_album(&calls, 2)).await.unwrap();

        // Coarse key: the second call is served the first result
        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.key_for(&sig).as_str(), "endpoint:/album/latest");
    }

    #[test]
    fn test_is_empty() {
        assert!(is_empty(&Value::Null));
        assert!(is_empty(&serde_json::json!([])));
        assert!(is_empty(&serde_json::json!({})));
        assert!(is_empty(&serde_json::json!("")));
        assert!(!is_empty(&serde_json::json!(0)));
        assert!(!is_empty(&serde_json::json!(false)));
        assert!(!is_empty(&serde_json::json!([1])));
    }
}
