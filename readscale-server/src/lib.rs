pub mod access;
pub mod cache;
pub mod config;
pub mod core;
pub mod data;
pub mod pipeline;
pub mod server;

// Re-export commonly used types
pub use access::{
    AccessError, AccessResult, Capability, DataHandle, HandleFactory, ReadOnlyHandle, WriteHandle,
};
pub use cache::{
    CacheAside, CacheError, CacheEvent, CacheKey, CacheObserver, CacheStats, CacheStore, KeyBuilder,
    KeyError, MemoryCacheStore, OperationSignature, Ttl,
};
pub use config::{CacheBackend, ServerConfig};
pub use core::{ReadscaleError, Result};
pub use data::{
    DataError, DataSource, DataTransaction, Fields, MemoryDataSource, MemoryDatabase, NodeRole,
    Record, RecordId, ReplicaPool, Selection,
};
pub use pipeline::{ReadPipeline, WritePipeline};
pub use server::{AppState, create_router};
