//! Cache key derivation
//!
//! A read operation is identified by its route plus the arguments that
//! affect its result. Keys have the form `prefix:route:sha256(args)`.

use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Default key prefix
pub const DEFAULT_PREFIX: &str = "endpoint";

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("Argument '{name}' is not serializable: {reason}")]
    Unserializable { name: String, reason: String },
}

#[derive(Debug, Clone, PartialEq)]
enum Argument {
    Input(Value),
    /// Environment rather than input (handles, clients). Never part of the key.
    Injected,
}

/// Identity of a read operation: a stable name plus its arguments.
///
/// A signature without a descriptor cannot be told apart from other calls to
/// the same route and collapses to one shared key per route.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationSignature {
    route: String,
    arguments: Option<BTreeMap<String, Argument>>,
}

impl OperationSignature {
    /// Signature with an (initially empty) argument descriptor
    pub fn new(route: impl Into<String>) -> Self {
        Self {
            route: route.into(),
            arguments: Some(BTreeMap::new()),
        }
    }

    /// Signature with no descriptor available
    pub fn unresolved(route: impl Into<String>) -> Self {
        Self {
            route: route.into(),
            arguments: None,
        }
    }

    /// Attach an argument that affects the result
    pub fn with_arg<V>(mut self, name: impl Into<String>, value: &V) -> Result<Self, KeyError>
    where
        V: Serialize + ?Sized,
    {
        let name = name.into();
        let value = serde_json::to_value(value).map_err(|e| KeyError::Unserializable {
            name: name.clone(),
            reason: e.to_string(),
        })?;
        self.arguments
            .get_or_insert_with(BTreeMap::new)
            .insert(name, Argument::Input(value));
        Ok(self)
    }

    /// Mark an argument as injected. Injected arguments are recorded but
    /// excluded from the key.
    pub fn with_injected(mut self, name: impl Into<String>) -> Self {
        self.arguments
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), Argument::Injected);
        self
    }

    pub fn route(&self) -> &str {
        &self.route
    }

    pub fn is_resolved(&self) -> bool {
        self.arguments.is_some()
    }

    /// Canonical JSON of the included arguments, or `None` when unresolved
    fn canonical_arguments(&self) -> Option<String> {
        let arguments = self.arguments.as_ref()?;
        let mut included = Map::new();
        for (name, arg) in arguments {
            if let Argument::Input(value) = arg {
                included.insert(name.clone(), canonicalize(value));
            }
        }
        Some(Value::Object(included).to_string())
    }
}

/// Rebuild objects in sorted key order, independent of how `serde_json::Map`
/// orders its entries.
fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<&String, &Value> = map.iter().collect();
            let mut out = Map::new();
            for (k, v) in sorted {
                out.insert(k.clone(), canonicalize(v));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Opaque cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Builds cache keys under a fixed prefix
#[derive(Debug, Clone)]
pub struct KeyBuilder {
    prefix: String,
}

impl Default for KeyBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}

impl KeyBuilder {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Derive the key for a signature. Pure and deterministic.
    pub fn build(&self, signature: &OperationSignature) -> CacheKey {
        match signature.canonical_arguments() {
            Some(canonical) => {
                let digest = Sha256::digest(canonical.as_bytes());
                CacheKey(format!(
                    "{}:{}:{}",
                    self.prefix,
                    signature.route(),
                    hex::encode(&digest[..])
                ))
            }
            None => CacheKey(format!("{}:{}", self.prefix, signature.route())),
        }
    }
}
