use super::{AccessError, AccessResult, Capability, DataHandle};
use crate::data::{DataSource, Fields, Record, RecordId, Selection};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::error;

/// Handle bound to one replica for the lifetime of a request.
///
/// Keeps no identity map: nothing read through it can ever be written back.
pub struct ReadOnlyHandle {
    source: Arc<dyn DataSource>,
}

impl ReadOnlyHandle {
    pub fn new(source: Arc<dyn DataSource>) -> Self {
        Self { source }
    }

    /// Name of the replica serving this handle
    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    fn violation(&self, operation: &'static str, collection: &str) -> AccessError {
        error!(
            operation,
            collection,
            source = self.source.name(),
            "mutation attempted through a read-only handle"
        );
        AccessError::ReadOnlyViolation { operation }
    }
}

#[async_trait]
impl DataHandle for ReadOnlyHandle {
    fn capability(&self) -> Capability {
        Capability::ReadOnly
    }

    async fn find(&self, collection: &str, id: RecordId) -> AccessResult<Option<Record>> {
        Ok(self.source.fetch(collection, id).await?)
    }

    async fn select(&self, collection: &str, selection: &Selection) -> AccessResult<Vec<Record>> {
        Ok(self.source.scan(collection, selection).await?)
    }

    async fn insert(&mut self, collection: &str, _fields: Fields) -> AccessResult<Record> {
        Err(self.violation("insert", collection))
    }

    async fn update(
        &mut self,
        collection: &str,
        _id: RecordId,
        _fields: Fields,
    ) -> AccessResult<Record> {
        Err(self.violation("update", collection))
    }

    async fn delete(&mut self, collection: &str, _id: RecordId) -> AccessResult<bool> {
        Err(self.violation("delete", collection))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::MemoryDatabase;
    use serde_json::json;

    #[tokio::test]
    async fn test_mutations_rejected_without_effect() {
        let db = MemoryDatabase::new();
        let mut handle = ReadOnlyHandle::new(Arc::new(db.replica("replica-1")));
        let fields = json!({"title": "x"}).as_object().cloned().unwrap();

        let err = handle.insert("album", fields.clone()).await.unwrap_err();
        assert!(matches!(err, AccessError::ReadOnlyViolation { operation: "insert" }));

        let err = handle.update("album", 1, fields).await.unwrap_err();
        assert!(matches!(err, AccessError::ReadOnlyViolation { operation: "update" }));

        let err = handle.delete("album", 1).await.unwrap_err();
        assert!(matches!(err, AccessError::ReadOnlyViolation { operation: "delete" }));

        assert_eq!(db.record_count(), 0);
        assert_eq!(handle.capability(), Capability::ReadOnly);
    }

    #[tokio::test]
    async fn test_queries_route_to_replica() {
        let db = MemoryDatabase::new();
        let replica = db.replica("replica-1");
        let handle = ReadOnlyHandle::new(Arc::new(replica.clone()));

        assert_eq!(handle.source_name(), "replica-1");
        assert!(handle.list("album").await.unwrap().is_empty());

        replica.set_offline(true);
        assert!(matches!(
            handle.find("album", 1).await,
            Err(AccessError::Data(_))
        ));
    }
}
