use super::source::DataSource;
use super::types::{DataError, DataResult, NodeRole};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{info, warn};

/// Round-robin set of read replicas
pub struct ReplicaPool {
    replicas: Vec<Arc<dyn DataSource>>,
    cursor: AtomicUsize,
}

impl ReplicaPool {
    pub fn new(replicas: Vec<Arc<dyn DataSource>>) -> DataResult<Self> {
        if replicas.is_empty() {
            return Err(DataError::EmptyReplicaPool);
        }

        for replica in &replicas {
            if replica.role() == NodeRole::Primary {
                warn!(
                    "Data source '{}' is a primary but was added to the replica pool",
                    replica.name()
                );
            }
        }

        info!("Replica pool ready with {} node(s)", replicas.len());
        Ok(Self {
            replicas,
            cursor: AtomicUsize::new(0),
        })
    }

    /// Next replica in rotation
    pub fn next(&self) -> Arc<dyn DataSource> {
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % self.replicas.len();
        Arc::clone(&self.replicas[index])
    }

    pub fn len(&self) -> usize {
        self.replicas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.replicas.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.replicas.iter().map(|r| r.name().to_string()).collect()
    }
}
