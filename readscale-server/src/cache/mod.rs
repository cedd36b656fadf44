//! Cache-aside layer for read operations
//!
//! - `key`: derives stable keys from an operation's route and arguments
//! - `store`: the cache client boundary (get / set-with-ttl)
//! - `aside`: the decorator that consults the store around a read
//! - `observer`: optional hook exposing hit/miss/failure paths
pub mod aside;
pub mod key;
pub mod memory;
pub mod observer;
#[cfg(feature = "redis-store")]
pub mod redis_store;
pub mod store;
pub mod types;

pub use aside::CacheAside;
pub use key::{CacheKey, DEFAULT_PREFIX, KeyBuilder, KeyError, OperationSignature};
pub use memory::MemoryCacheStore;
pub use observer::{CacheEvent, CacheObserver, CacheStats, CacheStatsSnapshot};
#[cfg(feature = "redis-store")]
pub use redis_store::RedisCacheStore;
pub use store::CacheStore;
pub use types::{CacheError, CacheResult, InvalidTtl, Ttl};
