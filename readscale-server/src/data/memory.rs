use super::source::{DataSource, DataTransaction};
use super::types::{DataError, DataResult, Fields, NodeRole, Record, RecordId, Selection};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::{debug, info};

type RowKey = (String, RecordId);

/// In-process record table shared by a primary and its replicas.
///
/// Replicas opened from the same database read the primary's committed state
/// directly, standing in for an externally replicated node set.
#[derive(Clone, Default)]
pub struct MemoryDatabase {
    rows: Arc<RwLock<BTreeMap<RowKey, Record>>>,
    next_id: Arc<AtomicU64>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write-capable source
    pub fn primary(&self) -> MemoryDataSource {
        MemoryDataSource::new("primary", NodeRole::Primary, self.clone())
    }

    /// Read-only source
    pub fn replica(&self, name: impl Into<String>) -> MemoryDataSource {
        MemoryDataSource::new(name, NodeRole::Replica, self.clone())
    }

    /// Number of committed records across all collections
    pub fn record_count(&self) -> usize {
        self.rows.read().len()
    }

    fn allocate_id(&self) -> RecordId {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn get(&self, collection: &str, id: RecordId) -> Option<Record> {
        self.rows.read().get(&(collection.to_string(), id)).cloned()
    }

    fn scan(&self, collection: &str) -> Vec<Record> {
        let start = (collection.to_string(), RecordId::MIN);
        let end = (collection.to_string(), RecordId::MAX);
        self.rows
            .read()
            .range(start..=end)
            .map(|(_, record)| record.clone())
            .collect()
    }
}

/// One node view over a [`MemoryDatabase`]
#[derive(Clone)]
pub struct MemoryDataSource {
    name: String,
    role: NodeRole,
    db: MemoryDatabase,
    offline: Arc<AtomicBool>,
}

impl MemoryDataSource {
    fn new(name: impl Into<String>, role: NodeRole, db: MemoryDatabase) -> Self {
        let name = name.into();
        info!("Opening in-memory data source '{}' ({:?})", name, role);
        Self {
            name,
            role,
            db,
            offline: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Simulate the node going down or coming back
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn ensure_online(&self) -> DataResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            Err(DataError::Unavailable(self.name.clone()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DataSource for MemoryDataSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn role(&self) -> NodeRole {
        self.role
    }

    async fn fetch(&self, collection: &str, id: RecordId) -> DataResult<Option<Record>> {
        self.ensure_online()?;
        debug!("FETCH {}/{} on {}", collection, id, self.name);
        Ok(self.db.get(collection, id))
    }

    async fn scan(&self, collection: &str, selection: &Selection) -> DataResult<Vec<Record>> {
        self.ensure_online()?;
        debug!("SCAN {} on {}", collection, self.name);
        Ok(selection.apply(self.db.scan(collection)))
    }

    async fn begin(&self) -> DataResult<Box<dyn DataTransaction>> {
        self.ensure_online()?;
        if self.role != NodeRole::Primary {
            return Err(DataError::ReadOnlySource(self.name.clone()));
        }
        Ok(Box::new(MemoryTransaction {
            db: self.db.clone(),
            staged: BTreeMap::new(),
            finished: false,
        }))
    }
}

/// Overlay of staged rows; `None` marks a deletion
struct MemoryTransaction {
    db: MemoryDatabase,
    staged: BTreeMap<RowKey, Option<Record>>,
    finished: bool,
}

impl MemoryTransaction {
    fn current(&self, collection: &str, id: RecordId) -> Option<Record> {
        match self.staged.get(&(collection.to_string(), id)) {
            Some(staged) => staged.clone(),
            None => self.db.get(collection, id),
        }
    }
}

#[async_trait]
impl DataTransaction for MemoryTransaction {
    async fn insert(&mut self, collection: &str, fields: Fields) -> DataResult<Record> {
        if collection.is_empty() {
            return Err(DataError::InvalidRecord(
                "collection name must not be empty".to_string(),
            ));
        }

        let record = Record {
            id: self.db.allocate_id(),
            collection: collection.to_string(),
            fields,
        };
        self.staged
            .insert((collection.to_string(), record.id), Some(record.clone()));
        Ok(record)
    }

    async fn update(
        &mut self,
        collection: &str,
        id: RecordId,
        fields: Fields,
    ) -> DataResult<Record> {
        let mut record = self
            .current(collection, id)
            .ok_or_else(|| DataError::RecordNotFound {
                collection: collection.to_string(),
                id,
            })?;
        record.apply_patch(fields);
        self.staged
            .insert((collection.to_string(), id), Some(record.clone()));
        Ok(record)
    }

    async fn delete(&mut self, collection: &str, id: RecordId) -> DataResult<bool> {
        let existed = self.current(collection, id).is_some();
        self.staged.insert((collection.to_string(), id), None);
        Ok(existed)
    }

    async fn commit(mut self: Box<Self>) -> DataResult<()> {
        self.finished = true;
        let staged = std::mem::take(&mut self.staged);
        let count = staged.len();

        let mut rows = self.db.rows.write();
        for (key, row) in staged {
            match row {
                Some(record) => {
                    rows.insert(key, record);
                }
                None => {
                    rows.remove(&key);
                }
            }
        }

        debug!("COMMIT {} staged rows", count);
        Ok(())
    }

    async fn rollback(mut self: Box<Self>) -> DataResult<()> {
        self.finished = true;
        debug!("ROLLBACK {} staged rows", self.staged.len());
        Ok(())
    }
}

impl Drop for MemoryTransaction {
    fn drop(&mut self) {
        if !self.finished {
            debug!(
                "Transaction dropped without commit, discarding {} staged rows",
                self.staged.len()
            );
        }
    }
}
