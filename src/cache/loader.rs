//! Cache-aside loader: get-or-fetch-and-store.
//!
//! Store failures must never fail a read. A read error degrades to a miss,
//! a write error after a successful fetch is logged and swallowed, and a
//! corrupted entry is deleted before falling through to a fresh fetch. Only
//! the fetch function itself may fail the call.

use std::future::Future;
use std::sync::Arc;

use metrics::counter;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use super::store::{CacheRead, KeyValueStore};
use super::ttl::{CacheCategory, TtlPolicy};

const SOURCE: &str = "cache::loader";

/// Cache-aside read path over a [`KeyValueStore`].
#[derive(Clone)]
pub struct CacheLoader {
    store: Arc<dyn KeyValueStore>,
    ttl: TtlPolicy,
}

impl CacheLoader {
    pub fn new(store: Arc<dyn KeyValueStore>, ttl: TtlPolicy) -> Self {
        Self { store, ttl }
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    pub fn ttl_policy(&self) -> TtlPolicy {
        self.ttl
    }

    /// Read `key` from the cache, or invoke `fetch` and store its result
    /// under the lifetime of `category`.
    ///
    /// Invokes the fetch function at most once per call. A fetch failure
    /// propagates to the caller unchanged.
    pub async fn fetch_with_cache<T, E, F, Fut>(
        &self,
        key: &str,
        category: CacheCategory,
        fetch: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(value) = self.read_cached(key).await {
            return Ok(value);
        }

        let fresh = fetch().await?;
        self.store_fetched(key, category, &fresh).await;
        Ok(fresh)
    }

    /// Attempt a cache read. Returns `None` on miss, on store failure and on
    /// a corrupted entry; the latter two cases are logged.
    async fn read_cached<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.store.get(key).await {
            Ok(CacheRead::Hit(raw)) => raw,
            Ok(CacheRead::Miss) => {
                counter!("gaffer_cache_miss_total").increment(1);
                return None;
            }
            Err(error) => {
                counter!("gaffer_cache_store_error_total").increment(1);
                warn!(target: SOURCE, key, error = %error, "cache read failed, treating as miss");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => {
                counter!("gaffer_cache_hit_total").increment(1);
                Some(value)
            }
            Err(error) => {
                // A corrupted entry would otherwise poison every read until
                // its TTL runs out.
                counter!("gaffer_cache_corrupt_total").increment(1);
                warn!(target: SOURCE, key, error = %error, "corrupted cache entry, deleting");
                let doomed = [key.to_string()];
                if let Err(error) = self.store.del(&doomed).await {
                    warn!(target: SOURCE, key, error = %error, "failed to delete corrupted entry");
                }
                None
            }
        }
    }

    /// Store a freshly fetched value. Failures are logged and swallowed; the
    /// caller already holds the value.
    async fn store_fetched<T: Serialize>(&self, key: &str, category: CacheCategory, value: &T) {
        let serialized = match serde_json::to_string(value) {
            Ok(serialized) => serialized,
            Err(error) => {
                warn!(target: SOURCE, key, error = %error, "failed to serialize value for cache");
                return;
            }
        };

        let ttl = self.ttl.ttl(category);
        if let Err(error) = self.store.set(key, &serialized, ttl).await {
            warn!(target: SOURCE, key, error = %error, "failed to store fetched value");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::super::store::testing::MemoryStore;
    use super::*;

    fn loader_with(store: Arc<MemoryStore>) -> CacheLoader {
        CacheLoader::new(store, TtlPolicy::new(false))
    }

    #[tokio::test]
    async fn warm_store_invokes_fetch_exactly_once() {
        let store = Arc::new(MemoryStore::new());
        let loader = loader_with(store.clone());
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let value: u32 = loader
                .fetch_with_cache("fpl:answer", CacheCategory::Other, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, std::convert::Infallible>(42)
                })
                .await
                .expect("read succeeds");
            assert_eq!(value, 42);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(store.contains("fpl:answer"));
    }

    #[tokio::test]
    async fn broken_store_fetches_every_call_but_still_succeeds() {
        let store = Arc::new(MemoryStore::new());
        store.fail_reads.store(true, Ordering::SeqCst);
        store.fail_writes.store(true, Ordering::SeqCst);
        let loader = loader_with(store.clone());
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value: u32 = loader
                .fetch_with_cache("fpl:answer", CacheCategory::Other, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, std::convert::Infallible>(7)
                })
                .await
                .expect("store failure must not fail the read");
            assert_eq!(value, 7);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn fetch_failure_propagates() {
        let store = Arc::new(MemoryStore::new());
        let loader = loader_with(store);

        let result: Result<u32, &str> = loader
            .fetch_with_cache("fpl:answer", CacheCategory::Other, || async {
                Err("upstream down")
            })
            .await;

        assert_eq!(result, Err("upstream down"));
    }

    #[tokio::test]
    async fn corrupted_entry_is_deleted_and_refetched() {
        let store = Arc::new(MemoryStore::new());
        store.insert("fpl:answer", "{not json", Duration::from_secs(60));
        let loader = loader_with(store.clone());
        let calls = AtomicUsize::new(0);

        let value: u32 = loader
            .fetch_with_cache("fpl:answer", CacheCategory::Other, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, std::convert::Infallible>(9)
            })
            .await
            .expect("read succeeds");

        assert_eq!(value, 9);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        // The corrupted payload was replaced by the fresh value.
        assert_eq!(store.raw_value("fpl:answer").as_deref(), Some("9"));
    }

    #[tokio::test]
    async fn stored_value_uses_category_ttl() {
        let store = Arc::new(MemoryStore::new());
        let loader = loader_with(store.clone());

        let _: u32 = loader
            .fetch_with_cache("fpl:gameweek:3:live", CacheCategory::Live, || async {
                Ok::<_, std::convert::Infallible>(1)
            })
            .await
            .expect("read succeeds");

        assert!(store.contains("fpl:gameweek:3:live"));
    }
}
