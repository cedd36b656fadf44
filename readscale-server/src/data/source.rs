use super::types::{DataResult, Fields, NodeRole, Record, RecordId, Selection};
use async_trait::async_trait;

/// A configured connection to one storage node
#[async_trait]
pub trait DataSource: Send + Sync {
    fn name(&self) -> &str;

    fn role(&self) -> NodeRole;

    async fn fetch(&self, collection: &str, id: RecordId) -> DataResult<Option<Record>>;

    /// Records of a collection in id order, filtered by `selection`
    async fn scan(&self, collection: &str, selection: &Selection) -> DataResult<Vec<Record>>;

    /// Open a transaction. Replica sources refuse.
    async fn begin(&self) -> DataResult<Box<dyn DataTransaction>>;
}

/// Staged mutations against a primary.
///
/// Nothing is visible to readers until `commit`. Dropping a transaction
/// without committing discards everything it staged.
#[async_trait]
pub trait DataTransaction: Send + Sync {
    async fn insert(&mut self, collection: &str, fields: Fields) -> DataResult<Record>;

    /// Merge `fields` into an existing record
    async fn update(&mut self, collection: &str, id: RecordId, fields: Fields)
    -> DataResult<Record>;

    /// Remove a record, returning whether it existed
    async fn delete(&mut self, collection: &str, id: RecordId) -> DataResult<bool>;

    async fn commit(self: Box<Self>) -> DataResult<()>;

    async fn rollback(self: Box<Self>) -> DataResult<()>;
}
