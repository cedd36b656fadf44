use super::{AccessResult, Capability, DataHandle};
use crate::data::{DataSource, DataTransaction, Fields, Record, RecordId, Selection};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;

type Identity = (String, RecordId);

/// Handle bound to the primary with an open transaction.
///
/// Tracks every record it loads or stages, so queries through the handle see
/// the transaction's own uncommitted writes. Dropping the handle without
/// `commit` drops its transaction, which discards everything staged.
pub struct WriteHandle {
    primary: Arc<dyn DataSource>,
    tx: Box<dyn DataTransaction>,
    /// `None` marks a record deleted in this transaction
    identity: Mutex<HashMap<Identity, Option<Record>>>,
}

impl WriteHandle {
    /// Open a transaction on `primary`
    pub async fn begin(primary: Arc<dyn DataSource>) -> AccessResult<Self> {
        let tx = primary.begin().await?;
        debug!("BEGIN on {}", primary.name());
        Ok(Self {
            primary,
            tx,
            identity: Mutex::new(HashMap::new()),
        })
    }

    pub async fn commit(self) -> AccessResult<()> {
        debug!("COMMIT on {}", self.primary.name());
        self.tx.commit().await?;
        Ok(())
    }

    pub async fn rollback(self) -> AccessResult<()> {
        debug!("ROLLBACK on {}", self.primary.name());
        self.tx.rollback().await?;
        Ok(())
    }

    /// Number of records in the identity map
    pub fn tracked(&self) -> usize {
        self.identity.lock().len()
    }

    fn track(&self, collection: &str, id: RecordId, record: Option<Record>) {
        self.identity
            .lock()
            .insert((collection.to_string(), id), record);
    }

    fn tracked_record(&self, collection: &str, id: RecordId) -> Option<Option<Record>> {
        self.identity
            .lock()
            .get(&(collection.to_string(), id))
            .cloned()
    }

    fn tracked_in(&self, collection: &str) -> Vec<(RecordId, Option<Record>)> {
        self.identity
            .lock()
            .iter()
            .filter(|((c, _), _)| c == collection)
            .map(|((_, id), record)| (*id, record.clone()))
            .collect()
    }
}

#[async_trait]
impl DataHandle for WriteHandle {
    fn capability(&self) -> Capability {
        Capability::WriteCapable
    }

    async fn find(&self, collection: &str, id: RecordId) -> AccessResult<Option<Record>> {
        if let Some(tracked) = self.tracked_record(collection, id) {
            return Ok(tracked);
        }

        let record = self.primary.fetch(collection, id).await?;
        if let Some(record) = &record {
            self.track(collection, id, Some(record.clone()));
        }
        Ok(record)
    }

    async fn select(&self, collection: &str, selection: &Selection) -> AccessResult<Vec<Record>> {
        let unlimited = Selection {
            filters: selection.filters.clone(),
            limit: None,
        };
        let committed = self.primary.scan(collection, &unlimited).await?;

        let mut rows: BTreeMap<RecordId, Record> =
            committed.into_iter().map(|r| (r.id, r)).collect();
        for (id, tracked) in self.tracked_in(collection) {
            match tracked {
                Some(record) => {
                    rows.insert(id, record);
                }
                None => {
                    rows.remove(&id);
                }
            }
        }

        Ok(selection.apply(rows.into_values()))
    }

    async fn insert(&mut self, collection: &str, fields: Fields) -> AccessResult<Record> {
        let record = self.tx.insert(collection, fields).await?;
        self.track(collection, record.id, Some(record.clone()));
        Ok(record)
    }

    async fn update(
        &mut self,
        collection: &str,
        id: RecordId,
        fields: Fields,
    ) -> AccessResult<Record> {
        let record = self.tx.update(collection, id, fields).await?;
        self.track(collection, id, Some(record.clone()));
        Ok(record)
    }

    async fn delete(&mut self, collection: &str, id: RecordId) -> AccessResult<bool> {
        let existed = self.tx.delete(collection, id).await?;
        self.track(collection, id, None);
        Ok(existed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::AccessError;
    use crate::data::{DataError, MemoryDatabase};
    use serde_json::json;

    fn fields(value: serde_json::Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_reads_see_own_writes() {
        let db = MemoryDatabase::new();
        let mut handle = WriteHandle::begin(Arc::new(db.primary())).await.unwrap();

        let record = handle
            .insert("album", fields(json!({"title": "Mingus Ah Um"})))
            .await
            .unwrap();

        let found = handle.find("album", record.id).await.unwrap();
        assert_eq!(found, Some(record.clone()));
        assert_eq!(handle.list("album").await.unwrap(), vec![record.clone()]);
        assert_eq!(handle.tracked(), 1);

        // Not committed yet
        assert_eq!(db.record_count(), 0);
        handle.commit().await.unwrap();
        assert_eq!(db.record_count(), 1);
    }

    #[tokio::test]
    async fn test_select_overlays_staged_changes() {
        let db = MemoryDatabase::new();
        let primary: Arc<dyn DataSource> = Arc::new(db.primary());

        let mut seed = WriteHandle::begin(primary.clone()).await.unwrap();
        let a = seed.insert("album", fields(json!({"genre": "jazz"}))).await.unwrap();
        let b = seed.insert("album", fields(json!({"genre": "jazz"}))).await.unwrap();
        seed.commit().await.unwrap();

        let mut handle = WriteHandle::begin(primary).await.unwrap();
        handle.delete("album", a.id).await.unwrap();
        handle
            .update("album", b.id, fields(json!({"genre": "rock"})))
            .await
            .unwrap();
        let c = handle.insert("album", fields(json!({"genre": "jazz"}))).await.unwrap();

        let jazz = handle
            .select("album", &Selection::new().filter("genre", json!("jazz")))
            .await
            .unwrap();
        assert_eq!(jazz.iter().map(|r| r.id).collect::<Vec<_>>(), vec![c.id]);
        assert_eq!(handle.find("album", a.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_drop_aborts() {
        let db = MemoryDatabase::new();
        {
            let mut handle = WriteHandle::begin(Arc::new(db.primary())).await.unwrap();
            handle.insert("album", fields(json!({"title": "x"}))).await.unwrap();
        }
        assert_eq!(db.record_count(), 0);
    }

    #[tokio::test]
    async fn test_rollback_discards_staged_writes() {
        let db = MemoryDatabase::new();
        let primary: Arc<dyn DataSource> = Arc::new(db.primary());

        let mut handle = WriteHandle::begin(primary.clone()).await.unwrap();
        handle.insert("album", fields(json!({"title": "x"}))).await.unwrap();
        handle.rollback().await.unwrap();
        assert_eq!(db.record_count(), 0);

        // A fresh handle gets a fresh transaction
        let mut handle = WriteHandle::begin(primary).await.unwrap();
        handle.insert("album", fields(json!({"title": "y"}))).await.unwrap();
        handle.commit().await.unwrap();
        assert_eq!(db.record_count(), 1);
    }

    #[tokio::test]
    async fn test_begin_on_replica_fails() {
        let db = MemoryDatabase::new();
        let result = WriteHandle::begin(Arc::new(db.replica("replica-1"))).await;
        assert!(matches!(
            result,
            Err(AccessError::Data(DataError::ReadOnlySource(_)))
        ));
    }

    #[tokio::test]
    async fn test_capability() {
        let db = MemoryDatabase::new();
        let handle = WriteHandle::begin(Arc::new(db.primary())).await.unwrap();
        assert_eq!(handle.capability(), Capability::WriteCapable);
        handle.rollback().await.unwrap();
    }
}
