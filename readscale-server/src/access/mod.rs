//! Read/write capability guard
//!
//! Both handle kinds implement [`DataHandle`], so query code is written once.
//! Only [`WriteHandle`] can mutate; on a [`ReadOnlyHandle`] every mutation
//! fails with [`AccessError::ReadOnlyViolation`] before any store is touched.
pub mod factory;
pub mod read_only;
pub mod write;

pub use factory::HandleFactory;
pub use read_only::ReadOnlyHandle;
pub use write::WriteHandle;

use crate::data::{DataError, Fields, Record, RecordId, Selection};
use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    ReadOnly,
    WriteCapable,
}

#[derive(Debug, Error)]
pub enum AccessError {
    #[error("Read-only violation: '{operation}' attempted through a read-only handle")]
    ReadOnlyViolation { operation: &'static str },

    #[error(transparent)]
    Data(#[from] DataError),
}

pub type AccessResult<T> = std::result::Result<T, AccessError>;

/// Query and mutation surface shared by both capabilities
#[async_trait]
pub trait DataHandle: Send + Sync {
    fn capability(&self) -> Capability;

    async fn find(&self, collection: &str, id: RecordId) -> AccessResult<Option<Record>>;

    async fn select(&self, collection: &str, selection: &Selection) -> AccessResult<Vec<Record>>;

    async fn list(&self, collection: &str) -> AccessResult<Vec<Record>> {
        self.select(collection, &Selection::default()).await
    }

    async fn insert(&mut self, collection: &str, fields: Fields) -> AccessResult<Record>;

    async fn update(
        &mut self,
        collection: &str,
        id: RecordId,
        fields: Fields,
    ) -> AccessResult<Record>;

    async fn delete(&mut self, collection: &str, id: RecordId) -> AccessResult<bool>;
}
