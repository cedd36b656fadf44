//! Data access layer boundary
//!
//! Writes go to a single primary; reads go to a round-robin pool of
//! replicas. Replication between them is external.
pub mod memory;
pub mod pool;
pub mod source;
pub mod types;

pub use memory::{MemoryDataSource, MemoryDatabase};
pub use pool::ReplicaPool;
pub use source::{DataSource, DataTransaction};
pub use types::{DataError, DataResult, Fields, NodeRole, Record, RecordId, Selection};
