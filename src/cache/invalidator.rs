//! Invalidation engine: exact-key, pattern and grouped cache deletes.
//!
//! Every operation is idempotent. Deleting absent keys is a no-op, so a
//! stale timer firing after a sync already refreshed the same entries is
//! harmless.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::domain::entities::Gameweek;

use super::keys;
use super::store::{CacheError, CacheRead, KeyValueStore};

const SOURCE: &str = "cache::invalidator";

pub struct CacheInvalidator {
    store: Arc<dyn KeyValueStore>,
}

impl CacheInvalidator {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Delete the given keys. Empty input issues no store call.
    pub async fn invalidate_keys(&self, cache_keys: &[String]) -> Result<(), CacheError> {
        if cache_keys.is_empty() {
            return Ok(());
        }
        let removed = self.store.del(cache_keys).await?;
        debug!(target: SOURCE, requested = cache_keys.len(), removed, "invalidated keys");
        Ok(())
    }

    /// Delete every key matching a glob pattern.
    ///
    /// Enumeration and deletion are not atomic with concurrent writers; a
    /// key written between the two calls survives until the next pass.
    pub async fn invalidate_pattern(&self, pattern: &str) -> Result<(), CacheError> {
        let matched = self.store.keys(pattern).await?;
        self.invalidate_keys(&matched).await
    }

    /// Drop everything under the service namespace.
    pub async fn invalidate_all_data(&self) -> Result<(), CacheError> {
        self.invalidate_pattern(&keys::all_pattern()).await
    }

    /// Drop the player collection (all filtered variants) and every
    /// per-player entry.
    pub async fn invalidate_player_data(&self) -> Result<(), CacheError> {
        let players_pattern = keys::players_pattern();
        let player_pattern = keys::player_pattern();
        let (lists, details) = tokio::join!(
            self.invalidate_pattern(&players_pattern),
            self.invalidate_pattern(&player_pattern),
        );
        lists.and(details)
    }

    /// Drop one gameweek's live and fixture entries, then the gameweek list
    /// itself: its current/next flags may be stale once a deadline passes.
    pub async fn invalidate_gameweek_data(&self, gameweek_id: i64) -> Result<(), CacheError> {
        self.invalidate_keys(&[
            keys::gameweek_live(gameweek_id),
            keys::fixtures(Some(gameweek_id)),
        ])
        .await?;
        self.invalidate_keys(&[keys::gameweeks()]).await
    }

    /// Drop only the live entry for one gameweek.
    pub async fn invalidate_live_data(&self, gameweek_id: i64) -> Result<(), CacheError> {
        self.invalidate_keys(&[keys::gameweek_live(gameweek_id)]).await
    }

    /// Housekeeping: drop live entries for gameweeks that precede the
    /// current one. Keeping them would only burn memory until their TTL.
    ///
    /// Failures are logged, never returned; this pass is not
    /// correctness-critical.
    pub async fn optimize_live_data_caching(&self) {
        if let Err(error) = self.prune_past_live_entries().await {
            warn!(target: SOURCE, error = %error, "live-data pruning failed");
        }
    }

    async fn prune_past_live_entries(&self) -> Result<(), CacheError> {
        let live_keys = self.store.keys(&keys::live_pattern()).await?;

        let raw = match self.store.get(&keys::gameweeks()).await? {
            CacheRead::Hit(raw) => raw,
            CacheRead::Miss => return Ok(()),
        };
        let gameweeks: Vec<Gameweek> = match serde_json::from_str(&raw) {
            Ok(gameweeks) => gameweeks,
            Err(error) => {
                warn!(target: SOURCE, error = %error, "cached gameweek list unreadable, skipping prune");
                return Ok(());
            }
        };

        let Some(current) = current_gameweek(&gameweeks) else {
            return Ok(());
        };

        let stale: Vec<String> = live_keys
            .into_iter()
            .filter(|key| !key.contains("fixture"))
            .filter(|key| keys::parse_live_key(key).is_some_and(|id| id < current.id))
            .collect();

        if !stale.is_empty() {
            let count = stale.len();
            self.invalidate_keys(&stale).await?;
            info!(target: SOURCE, count, current = current.id, "pruned past gameweek live entries");
        }
        Ok(())
    }
}

/// First gameweek flagged as current. More than one is an upstream anomaly:
/// first-match semantics are kept deliberately, with a warning.
pub fn current_gameweek(gameweeks: &[Gameweek]) -> Option<&Gameweek> {
    let mut flagged = gameweeks.iter().filter(|gw| gw.is_current);
    let first = flagged.next();
    if flagged.next().is_some() {
        warn!(
            target: SOURCE,
            "multiple gameweeks flagged current, using the first"
        );
    }
    first
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use time::macros::datetime;

    use super::super::store::testing::MemoryStore;
    use super::*;

    const TTL: Duration = Duration::from_secs(600);

    fn gameweek(id: i64, is_current: bool, finished: bool) -> Gameweek {
        Gameweek {
            id,
            name: format!("Gameweek {id}"),
            deadline_time: datetime!(2025-09-13 10:00 UTC),
            is_current,
            is_next: false,
            finished,
            last_updated: datetime!(2025-09-13 10:00 UTC),
        }
    }

    fn invalidator_with(store: Arc<MemoryStore>) -> CacheInvalidator {
        CacheInvalidator::new(store)
    }

    #[tokio::test]
    async fn empty_input_issues_no_store_call() {
        let store = Arc::new(MemoryStore::new());
        let invalidator = invalidator_with(store.clone());

        invalidator.invalidate_keys(&[]).await.expect("no-op");
        assert_eq!(store.del_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn pattern_with_no_matches_issues_no_delete() {
        let store = Arc::new(MemoryStore::new());
        store.insert("fpl:teams", "[]", TTL);
        let invalidator = invalidator_with(store.clone());

        invalidator
            .invalidate_pattern("fpl:gameweek:*:live")
            .await
            .expect("no-op");
        assert_eq!(store.del_calls.load(Ordering::SeqCst), 0);
        assert!(store.contains("fpl:teams"));
    }

    #[tokio::test]
    async fn double_invalidation_never_errors() {
        let store = Arc::new(MemoryStore::new());
        store.insert("fpl:teams", "[]", TTL);
        let invalidator = invalidator_with(store.clone());

        let key = vec!["fpl:teams".to_string()];
        invalidator.invalidate_keys(&key).await.expect("first delete");
        invalidator.invalidate_keys(&key).await.expect("second delete");
        assert!(!store.contains("fpl:teams"));
    }

    #[tokio::test]
    async fn gameweek_invalidation_drops_live_fixtures_and_list() {
        let store = Arc::new(MemoryStore::new());
        store.insert("fpl:gameweek:5:live", "{}", TTL);
        store.insert("fpl:fixtures:gw:5", "[]", TTL);
        store.insert("fpl:gameweeks", "[]", TTL);
        store.insert("fpl:teams", "[]", TTL);
        let invalidator = invalidator_with(store.clone());

        invalidator
            .invalidate_gameweek_data(5)
            .await
            .expect("invalidate gameweek");

        assert!(!store.contains("fpl:gameweek:5:live"));
        assert!(!store.contains("fpl:fixtures:gw:5"));
        assert!(!store.contains("fpl:gameweeks"));
        assert!(store.contains("fpl:teams"));
    }

    #[tokio::test]
    async fn player_invalidation_covers_lists_and_details() {
        let store = Arc::new(MemoryStore::new());
        store.insert("fpl:players", "[]", TTL);
        store.insert("fpl:players:team:3", "[]", TTL);
        store.insert("fpl:player:10:detail", "{}", TTL);
        store.insert("fpl:teams", "[]", TTL);
        let invalidator = invalidator_with(store.clone());

        invalidator
            .invalidate_player_data()
            .await
            .expect("invalidate players");

        assert!(!store.contains("fpl:players"));
        assert!(!store.contains("fpl:players:team:3"));
        assert!(!store.contains("fpl:player:10:detail"));
        assert!(store.contains("fpl:teams"));
    }

    #[tokio::test]
    async fn pruning_deletes_only_past_gameweek_live_entries() {
        let store = Arc::new(MemoryStore::new());
        let gameweeks = vec![
            gameweek(1, false, true),
            gameweek(2, true, false),
            gameweek(3, false, false),
        ];
        store.insert(
            "fpl:gameweeks",
            &serde_json::to_string(&gameweeks).expect("serialize gameweeks"),
            TTL,
        );
        store.insert("fpl:gameweek:1:live", "{}", TTL);
        store.insert("fpl:gameweek:2:live", "{}", TTL);
        store.insert("fpl:gameweek:3:live", "{}", TTL);
        let invalidator = invalidator_with(store.clone());

        invalidator.optimize_live_data_caching().await;

        assert!(!store.contains("fpl:gameweek:1:live"));
        assert!(store.contains("fpl:gameweek:2:live"));
        assert!(store.contains("fpl:gameweek:3:live"));
    }

    #[tokio::test]
    async fn pruning_without_cached_gameweeks_is_a_noop() {
        let store = Arc::new(MemoryStore::new());
        store.insert("fpl:gameweek:1:live", "{}", TTL);
        let invalidator = invalidator_with(store.clone());

        invalidator.optimize_live_data_caching().await;
        assert!(store.contains("fpl:gameweek:1:live"));
    }

    #[tokio::test]
    async fn pruning_swallows_store_failures() {
        let store = Arc::new(MemoryStore::new());
        store.fail_reads.store(true, Ordering::SeqCst);
        let invalidator = invalidator_with(store);

        // Must not panic or surface the error.
        invalidator.optimize_live_data_caching().await;
    }

    #[test]
    fn current_gameweek_keeps_first_match() {
        let gameweeks = vec![
            gameweek(1, true, true),
            gameweek(2, true, false),
            gameweek(3, false, false),
        ];
        let current = current_gameweek(&gameweeks).expect("a current gameweek");
        assert_eq!(current.id, 1);
        assert!(current_gameweek(&[gameweek(4, false, false)]).is_none());
    }
}
