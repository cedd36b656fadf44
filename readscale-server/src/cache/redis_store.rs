use super::store::CacheStore;
use super::types::{CacheError, CacheResult, Ttl};
use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;
use tracing::info;

/// Cache store client backed by Redis `GET` / `SET EX`
#[derive(Clone)]
pub struct RedisCacheStore {
    connection: MultiplexedConnection,
}

impl RedisCacheStore {
    /// Open a multiplexed connection to `url` (e.g. `redis://127.0.0.1:6379`)
    pub async fn connect(url: &str) -> CacheResult<Self> {
        let client = redis::Client::open(url).map_err(map_redis_error)?;
        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(map_redis_error)?;

        info!("Connected to Redis cache at {}", url);
        Ok(Self { connection })
    }
}

fn map_redis_error(e: redis::RedisError) -> CacheError {
    if e.is_io_error() || e.is_connection_dropped() || e.is_connection_refusal() || e.is_timeout()
    {
        CacheError::Unavailable(e.to_string())
    } else {
        CacheError::Backend(e.to_string())
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut conn = self.connection.clone();
        conn.get::<_, Option<String>>(key)
            .await
            .map_err(map_redis_error)
    }

    async fn set(&self, key: &str, value: String, ttl: Ttl) -> CacheResult<()> {
        let mut conn = self.connection.clone();
        conn.set_ex::<_, _, ()>(key, value, ttl.as_secs())
            .await
            .map_err(map_redis_error)
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}
