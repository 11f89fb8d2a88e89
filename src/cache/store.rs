//! Key-value store abstraction for the cache tier.
//!
//! The loader and invalidator are written against [`KeyValueStore`] so the
//! cache policy can be exercised without a live Redis. The production
//! implementation lives in [`crate::infra::redis`].

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache store error: {message}")]
    Store { message: String },
    #[error("cache store timed out")]
    Timeout,
    #[error("cache store unavailable: {message}")]
    Unavailable { message: String },
}

impl CacheError {
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }
}

/// Outcome of a cache read that reached the store.
///
/// Store-level failures travel separately as [`CacheError`] so callers make
/// an explicit policy decision instead of conflating errors with misses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheRead {
    Hit(String),
    Miss,
}

/// One entry of an atomic multi-key write.
#[derive(Debug, Clone)]
pub struct BatchEntry {
    pub key: String,
    pub value: String,
    pub ttl: Duration,
}

/// An atomic multi-key write. Either every entry becomes visible or none
/// does; readers never observe a half-applied refresh.
#[derive(Debug, Clone, Default)]
pub struct BatchWrite {
    pub entries: Vec<BatchEntry>,
}

impl BatchWrite {
    pub fn push(&mut self, key: String, value: String, ttl: Duration) {
        self.entries.push(BatchEntry { key, value, ttl });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Async key-value store operations used by the cache subsystem.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<CacheRead, CacheError>;

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Delete the given keys, returning how many existed. Deleting absent
    /// keys is a no-op, not an error.
    async fn del(&self, keys: &[String]) -> Result<u64, CacheError>;

    /// Enumerate keys matching a glob-style pattern.
    async fn keys(&self, pattern: &str) -> Result<Vec<String>, CacheError>;

    async fn exists(&self, key: &str) -> Result<bool, CacheError>;

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Apply an atomic multi-key write.
    async fn apply(&self, batch: BatchWrite) -> Result<(), CacheError>;

    /// Liveness probe for health checks.
    async fn ping(&self) -> Result<(), CacheError>;
}
