use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{CacheAside, CacheStore, DEFAULT_PREFIX, KeyBuilder, Ttl};

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub server: Server,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Server {
    pub host: String,
    pub port: u16,
}

/// Cache store backend
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// In-process store
    #[default]
    Memory,
    /// Redis (requires the `redis-store` feature)
    Redis,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    pub prefix: String,
    pub default_ttl_secs: Ttl,
    /// Per-collection TTL overrides
    pub ttl_overrides: HashMap<String, Ttl>,
    /// Upper bound on one cache round-trip before it counts as a miss
    pub operation_timeout_ms: u64,
    /// Expiry sweep interval for the memory backend
    pub sweep_interval_ms: u64,
    pub redis_url: Option<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::Memory,
            prefix: DEFAULT_PREFIX.to_string(),
            default_ttl_secs: Ttl::DEFAULT,
            ttl_overrides: HashMap::new(),
            operation_timeout_ms: 250,
            sweep_interval_ms: 1000,
            redis_url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Number of read replicas in the pool
    pub replicas: usize,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self { replicas: 2 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// `json` or `pretty`
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "json".to_string(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server: Server {
                host: "0.0.0.0".to_string(),
                port: 15600,
            },
            cache: CacheConfig::default(),
            data: DataConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: ServerConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.data.replicas == 0 {
            return Err("data.replicas must be at least 1".to_string());
        }
        if self.cache.prefix.is_empty() {
            return Err("cache.prefix must not be empty".to_string());
        }
        if self.cache.operation_timeout_ms == 0 {
            return Err("cache.operation_timeout_ms must be positive".to_string());
        }
        if self.cache.sweep_interval_ms == 0 {
            return Err("cache.sweep_interval_ms must be positive".to_string());
        }
        if self.cache.backend == CacheBackend::Redis && self.cache.redis_url.is_none() {
            return Err("Redis cache backend requires cache.redis_url".to_string());
        }
        if !matches!(self.logging.format.as_str(), "json" | "pretty") {
            return Err(format!(
                "logging.format must be 'json' or 'pretty', got '{}'",
                self.logging.format
            ));
        }
        Ok(())
    }

    /// Build a cache-aside decorator over `store` with these settings
    pub fn cache_aside(&self, store: Arc<dyn CacheStore>) -> CacheAside {
        CacheAside::new(store)
            .with_key_builder(KeyBuilder::new(self.cache.prefix.clone()))
            .with_default_ttl(self.cache.default_ttl_secs)
            .with_operation_timeout(Duration::from_millis(self.cache.operation_timeout_ms))
    }

    /// Get server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
