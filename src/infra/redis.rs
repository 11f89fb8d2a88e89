//! Redis-backed [`KeyValueStore`].
//!
//! Uses a connection manager with a bounded reconnect retry count and a command
//! response timeout so cache operations fail fast instead of queueing while
//! the store is unreachable.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use tracing::info;

use crate::cache::{BatchWrite, CacheError, CacheRead, KeyValueStore};
use crate::config::RedisSettings;

const SOURCE: &str = "infra::redis";

pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    /// Open a managed connection to the configured Redis instance.
    pub async fn connect(settings: &RedisSettings) -> Result<Self, CacheError> {
        let client = redis::Client::open(settings.url.as_str()).map_err(map_redis_error)?;
        let config = ConnectionManagerConfig::new()
            .set_number_of_retries(settings.reconnect_retries)
            .set_connection_timeout(settings.connect_timeout())
            .set_response_timeout(settings.response_timeout());

        let conn = client
            .get_connection_manager_with_config(config)
            .await
            .map_err(map_redis_error)?;

        info!(target: SOURCE, url = %settings.url, "connected to redis");
        Ok(Self { conn })
    }
}

fn map_redis_error(err: redis::RedisError) -> CacheError {
    if err.is_timeout() {
        CacheError::Timeout
    } else if err.is_io_error() || err.is_connection_refusal() || err.is_connection_dropped() {
        CacheError::unavailable(err.to_string())
    } else {
        CacheError::store(err.to_string())
    }
}

/// SET with a zero-second expiry is rejected by the server.
fn ttl_seconds(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> Result<CacheRead, CacheError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(map_redis_error)?;
        Ok(value.map_or(CacheRead::Miss, CacheRead::Hit))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl_seconds(ttl))
            .query_async::<()>(&mut conn)
            .await
            .map_err(map_redis_error)
    }

    async fn del(&self, keys: &[String]) -> Result<u64, CacheError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("DEL");
        for key in keys {
            cmd.arg(key);
        }
        cmd.query_async(&mut conn).await.map_err(map_redis_error)
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, CacheError> {
        let mut conn = self.conn.clone();
        redis::cmd("KEYS")
            .arg(pattern)
            .query_async(&mut conn)
            .await
            .map_err(map_redis_error)
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        let mut conn = self.conn.clone();
        redis::cmd("EXISTS")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(map_redis_error)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        redis::cmd("EXPIRE")
            .arg(key)
            .arg(ttl_seconds(ttl) as i64)
            .query_async::<i64>(&mut conn)
            .await
            .map_err(map_redis_error)?;
        Ok(())
    }

    async fn apply(&self, batch: BatchWrite) -> Result<(), CacheError> {
        if batch.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        let mut pipe = redis::pipe();
        pipe.atomic();
        for entry in &batch.entries {
            pipe.cmd("SET")
                .arg(&entry.key)
                .arg(&entry.value)
                .arg("EX")
                .arg(ttl_seconds(entry.ttl))
                .ignore();
        }
        pipe.query_async::<()>(&mut conn)
            .await
            .map_err(map_redis_error)
    }

    async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(map_redis_error)?;
        Ok(())
    }
}
