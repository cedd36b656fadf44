use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

pub type RecordId = u64;

/// Field map of a record
pub type Fields = Map<String, Value>;

/// Role of a data source in the primary/replica topology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    /// Accepts writes
    Primary,
    /// Read-only copy kept current by external replication
    Replica,
}

/// A stored record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub collection: String,
    pub fields: Fields,
}

impl Record {
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Overlay `patch` onto this record's fields
    pub fn apply_patch(&mut self, patch: Fields) {
        for (name, value) in patch {
            self.fields.insert(name, value);
        }
    }
}

/// Equality filter over record fields
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub filters: BTreeMap<String, Value>,
    pub limit: Option<usize>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, field: impl Into<String>, value: Value) -> Self {
        self.filters.insert(field.into(), value);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.filters
            .iter()
            .all(|(field, expected)| record.field(field) == Some(expected))
    }

    /// Apply filters and limit to records already in id order
    pub fn apply<I>(&self, records: I) -> Vec<Record>
    where
        I: IntoIterator<Item = Record>,
    {
        let matching = records.into_iter().filter(|r| self.matches(r));
        match self.limit {
            Some(limit) => matching.take(limit).collect(),
            None => matching.collect(),
        }
    }
}

/// Data access error types
#[derive(Debug, Error)]
pub enum DataError {
    #[error("Record not found: {collection}/{id}")]
    RecordNotFound { collection: String, id: RecordId },

    #[error("Data source '{0}' is read-only")]
    ReadOnlySource(String),

    #[error("Replica pool is empty")]
    EmptyReplicaPool,

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Data source unavailable: {0}")]
    Unavailable(String),
}

pub type DataResult<T> = std::result::Result<T, DataError>;
