use super::{AccessResult, ReadOnlyHandle, WriteHandle};
use crate::data::{DataSource, ReplicaPool};
use std::sync::Arc;

/// Hands out per-request capability handles
#[derive(Clone)]
pub struct HandleFactory {
    primary: Arc<dyn DataSource>,
    replicas: Arc<ReplicaPool>,
}

impl HandleFactory {
    pub fn new(primary: Arc<dyn DataSource>, replicas: Arc<ReplicaPool>) -> Self {
        Self { primary, replicas }
    }

    /// Handle on the next replica in rotation
    pub fn read_only(&self) -> ReadOnlyHandle {
        ReadOnlyHandle::new(self.replicas.next())
    }

    /// Handle on the primary with a freshly opened transaction
    pub async fn write_capable(&self) -> AccessResult<WriteHandle> {
        WriteHandle::begin(Arc::clone(&self.primary)).await
    }

    pub fn replicas(&self) -> &ReplicaPool {
        &self.replicas
    }
}
