//! Sync orchestration: full cache refresh, idempotent persistence, and
//! deadline re-arming.
//!
//! Phase 1 refreshes every canonical cache entry in one atomic batch; a
//! failure here fails the whole sync. Phase 2 upserts into the relational
//! store in fixed-size batches and is best-effort: a failed batch is logged
//! and its siblings continue. The scheduler is re-armed last, from the
//! deadlines observed in this pass.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{error, info, warn};

use crate::cache::keys::{self, PlayerFilter};
use crate::cache::{BatchWrite, CacheCategory, CacheError, DeadlineScheduler, current_gameweek};
use crate::domain::entities::{Fixture, Gameweek, Player, PlayerGameweekStat, Team};

use super::repos::FplRepositories;
use super::service::FplDataService;
use super::source::UpstreamError;

const SOURCE: &str = "application::sync";

/// Upper bound on rows per relational upsert.
const BATCH_SIZE: usize = 50;

/// Outcome of a sync pass, returned to the invoking scheduler rather than
/// raised, so a cron cadence can log and continue.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of the cheap in-progress-match poll.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateCheck {
    pub success: bool,
    pub is_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Error)]
enum SyncError {
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error("snapshot serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub struct SyncService {
    service: FplDataService,
    repos: Arc<dyn FplRepositories>,
    scheduler: Arc<DeadlineScheduler>,
}

impl SyncService {
    pub fn new(
        service: FplDataService,
        repos: Arc<dyn FplRepositories>,
        scheduler: Arc<DeadlineScheduler>,
    ) -> Self {
        Self {
            service,
            repos,
            scheduler,
        }
    }

    pub fn scheduler(&self) -> &Arc<DeadlineScheduler> {
        &self.scheduler
    }

    /// Full sync pass: refresh the cache, persist canonical entities, re-arm
    /// deadline invalidation.
    pub async fn sync_all(&self) -> SyncReport {
        info!(target: SOURCE, "starting data sync");

        let gameweeks = match self.refresh_cache().await {
            Ok(gameweeks) => gameweeks,
            Err(sync_error) => {
                error!(target: SOURCE, error = %sync_error, "cache refresh failed, aborting sync");
                return SyncReport {
                    success: false,
                    message: "data synchronization failed".to_string(),
                    error: Some(sync_error.to_string()),
                };
            }
        };

        self.persist_all(&gameweeks).await;
        self.scheduler.setup_scheduled_invalidation(&gameweeks).await;

        info!(target: SOURCE, "data sync completed");
        SyncReport {
            success: true,
            message: "data synchronization completed".to_string(),
            error: None,
        }
    }

    /// Phase 1: fetch the upstream snapshot once, derive the canonical
    /// collections, and apply them as one atomic multi-key write so no
    /// reader observes a half-refreshed cache.
    async fn refresh_cache(&self) -> Result<Vec<Gameweek>, SyncError> {
        let client = self.service.client();
        let bootstrap = client.bootstrap_static().await?;
        let fixture_rows = client.fixtures().await?;
        let observed_at = OffsetDateTime::now_utc();

        let teams: Vec<Team> = bootstrap
            .teams
            .iter()
            .map(|team| Team::from_upstream(team, observed_at))
            .collect();
        let gameweeks: Vec<Gameweek> = bootstrap
            .events
            .iter()
            .map(|event| Gameweek::from_event(event, observed_at))
            .collect();
        let players: Vec<Player> = bootstrap
            .elements
            .iter()
            .map(|element| Player::from_element(element, observed_at))
            .collect();
        let fixtures: Vec<Fixture> = fixture_rows
            .iter()
            .map(|fixture| Fixture::from_upstream(fixture, observed_at))
            .collect();

        let current = current_gameweek(&gameweeks).cloned();
        let live = match &current {
            Some(current) => Some(client.gameweek_live(current.id).await?),
            None => None,
        };

        let ttl = self.service.loader().ttl_policy();
        let mut batch = BatchWrite::default();
        batch.push(
            keys::bootstrap(),
            serde_json::to_string(&bootstrap)?,
            ttl.ttl(CacheCategory::Bootstrap),
        );
        batch.push(
            keys::teams(),
            serde_json::to_string(&teams)?,
            ttl.ttl(CacheCategory::Bootstrap),
        );
        batch.push(
            keys::gameweeks(),
            serde_json::to_string(&gameweeks)?,
            ttl.ttl(CacheCategory::Bootstrap),
        );
        batch.push(
            keys::players(&PlayerFilter::default()),
            serde_json::to_string(&players)?,
            ttl.ttl(CacheCategory::Bootstrap),
        );
        batch.push(
            keys::fixtures(None),
            serde_json::to_string(&fixtures)?,
            ttl.ttl(CacheCategory::Fixtures),
        );
        if let (Some(current), Some(live)) = (&current, &live) {
            batch.push(
                keys::gameweek_live(current.id),
                serde_json::to_string(live)?,
                ttl.ttl(CacheCategory::Live),
            );
        }

        self.service.loader().store().apply(batch).await?;

        info!(
            target: SOURCE,
            teams = teams.len(),
            players = players.len(),
            gameweeks = gameweeks.len(),
            fixtures = fixtures.len(),
            live = current.as_ref().map(|gw| gw.id),
            "cache refreshed"
        );
        Ok(gameweeks)
    }

    /// Phase 2: best-effort persistence of the refreshed collections.
    async fn persist_all(&self, gameweeks: &[Gameweek]) {
        // Re-read through the now-warm cache; the refresh is fully visible
        // before any row is written.
        let (teams, players, fixtures) = match tokio::try_join!(
            self.service.get_teams(),
            self.service.get_players(PlayerFilter::default()),
            self.service.get_fixtures(None),
        ) {
            Ok(collections) => collections,
            Err(fetch_error) => {
                error!(target: SOURCE, error = %fetch_error, "persistence read-back failed");
                return;
            }
        };

        tokio::join!(
            self.persist_teams(&teams),
            self.persist_players(&players),
            self.persist_gameweeks(gameweeks),
            self.persist_fixtures(&fixtures),
        );

        self.persist_fixture_results(&fixtures).await;

        for gameweek in gameweeks.iter().filter(|gw| gw.finished) {
            self.persist_player_stats(gameweek.id).await;
        }
    }

    async fn persist_teams(&self, teams: &[Team]) {
        for batch in teams.chunks(BATCH_SIZE) {
            if let Err(repo_error) = self.repos.upsert_teams(batch).await {
                error!(target: SOURCE, entity = "teams", error = %repo_error, "batch upsert failed");
            }
        }
    }

    async fn persist_players(&self, players: &[Player]) {
        for batch in players.chunks(BATCH_SIZE) {
            if let Err(repo_error) = self.repos.upsert_players(batch).await {
                error!(target: SOURCE, entity = "players", error = %repo_error, "batch upsert failed");
            }
        }
    }

    async fn persist_gameweeks(&self, gameweeks: &[Gameweek]) {
        for batch in gameweeks.chunks(BATCH_SIZE) {
            if let Err(repo_error) = self.repos.upsert_gameweeks(batch).await {
                error!(target: SOURCE, entity = "gameweeks", error = %repo_error, "batch upsert failed");
            }
        }
    }

    async fn persist_fixtures(&self, fixtures: &[Fixture]) {
        for batch in fixtures.chunks(BATCH_SIZE) {
            if let Err(repo_error) = self.repos.upsert_fixtures(batch).await {
                error!(target: SOURCE, entity = "fixtures", error = %repo_error, "batch upsert failed");
            }
        }
    }

    /// Persist final scores for fixtures that finished with both scores
    /// present.
    async fn persist_fixture_results(&self, fixtures: &[Fixture]) {
        let completed: Vec<Fixture> = fixtures
            .iter()
            .filter(|fixture| fixture.has_final_score())
            .cloned()
            .collect();
        if completed.is_empty() {
            return;
        }

        info!(target: SOURCE, count = completed.len(), "persisting completed fixture results");
        for batch in completed.chunks(BATCH_SIZE) {
            if let Err(repo_error) = self.repos.upsert_fixture_results(batch).await {
                error!(target: SOURCE, entity = "fixture_results", error = %repo_error, "batch upsert failed");
            }
        }
    }

    /// Persist stat lines for one finished gameweek. Players without minutes
    /// are skipped.
    async fn persist_player_stats(&self, gameweek_id: i64) {
        let live = match self.service.get_live_gameweek(gameweek_id).await {
            Ok(live) => live,
            Err(fetch_error) => {
                error!(
                    target: SOURCE,
                    gameweek_id,
                    error = %fetch_error,
                    "live data unavailable, skipping stat persistence"
                );
                return;
            }
        };

        let observed_at = OffsetDateTime::now_utc();
        let stat_lines: Vec<PlayerGameweekStat> = live
            .elements
            .values()
            .filter_map(|element| {
                PlayerGameweekStat::from_live(element.id, gameweek_id, &element.stats, observed_at)
            })
            .collect();

        if stat_lines.is_empty() {
            return;
        }

        for batch in stat_lines.chunks(BATCH_SIZE) {
            if let Err(repo_error) = self.repos.upsert_player_stats(batch).await {
                error!(
                    target: SOURCE,
                    entity = "player_gameweek_stats",
                    gameweek_id,
                    error = %repo_error,
                    "batch upsert failed"
                );
            }
        }
        info!(target: SOURCE, gameweek_id, count = stat_lines.len(), "persisted player stat lines");
    }

    /// Cheap poll between syncs: when a gameweek has matches underway,
    /// re-read its live data and fixtures so they stay fresh.
    pub async fn check_for_updates(&self) -> UpdateCheck {
        let is_active = self.service.is_gameweek_active().await;
        if !is_active {
            return UpdateCheck {
                success: true,
                is_active: false,
                error: None,
            };
        }

        info!(target: SOURCE, "active gameweek detected, refreshing live data");
        let current = match self.service.get_current_gameweek().await {
            Ok(Some(current)) => current,
            Ok(None) => {
                return UpdateCheck {
                    success: true,
                    is_active: true,
                    error: None,
                };
            }
            Err(fetch_error) => {
                return UpdateCheck {
                    success: false,
                    is_active: true,
                    error: Some(fetch_error.to_string()),
                };
            }
        };

        let refreshed = tokio::try_join!(
            async {
                self.service.get_live_gameweek(current.id).await.map(|_| ())
            },
            async {
                self.service.get_fixtures(Some(current.id)).await.map(|_| ())
            },
        );
        match refreshed {
            Ok(_) => UpdateCheck {
                success: true,
                is_active: true,
                error: None,
            },
            Err(fetch_error) => UpdateCheck {
                success: false,
                is_active: true,
                error: Some(fetch_error.to_string()),
            },
        }
    }

    /// Startup pass: arm deadline invalidation from the currently known
    /// gameweeks. A failure is logged and deferred to the next sync.
    pub async fn initialize(&self) {
        match self
            .service
            .loader()
            .store()
            .exists(&keys::gameweeks())
            .await
        {
            Ok(warm) => {
                info!(target: SOURCE, warm, "cache state at startup");
            }
            Err(cache_error) => {
                warn!(target: SOURCE, error = %cache_error, "cache unreachable at startup");
            }
        }

        match self.service.get_gameweeks().await {
            Ok(gameweeks) => {
                self.scheduler.setup_scheduled_invalidation(&gameweeks).await;
                info!(target: SOURCE, "deadline invalidation schedule armed");
            }
            Err(fetch_error) => {
                warn!(
                    target: SOURCE,
                    error = %fetch_error,
                    "could not arm deadline schedule, deferring to next sync"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use time::macros::datetime;

    use crate::application::repos::testing::MemoryRepositories;
    use crate::application::source::testing::{
        MockSourceClient, live_with, sample_element, sample_event, sample_fixture, sample_team,
    };
    use crate::cache::store::testing::MemoryStore;
    use crate::cache::{CacheInvalidator, CacheLoader, TtlPolicy};

    use super::*;

    struct Harness {
        store: Arc<MemoryStore>,
        client: Arc<MockSourceClient>,
        repos: Arc<MemoryRepositories>,
        sync: SyncService,
    }

    fn harness() -> Harness {
        let store = Arc::new(MemoryStore::new());
        let client = Arc::new(MockSourceClient::new());
        let repos = Arc::new(MemoryRepositories::new());
        let loader = CacheLoader::new(store.clone(), TtlPolicy::new(false));
        let service = FplDataService::new(loader, client.clone(), repos.clone());
        let scheduler = Arc::new(DeadlineScheduler::new(Arc::new(CacheInvalidator::new(
            store.clone(),
        ))));
        let sync = SyncService::new(service, repos.clone(), scheduler);
        Harness {
            store,
            client,
            repos,
            sync,
        }
    }

    /// One finished gameweek (5), one current (6) with a far-future
    /// deadline, plus a played 90-minute double-scorer in gameweek 5.
    fn seed_season(client: &MockSourceClient) {
        let future_deadline = OffsetDateTime::now_utc() + time::Duration::days(7);
        {
            let mut bootstrap = client.bootstrap.lock().expect("mock lock");
            bootstrap.teams = vec![
                sample_team(1, "Arsenal", "ARS"),
                sample_team(2, "Liverpool", "LIV"),
            ];
            bootstrap.elements = vec![
                sample_element(10, "Saka", 1, 3),
                sample_element(20, "Salah", 2, 3),
            ];
            bootstrap.events = vec![
                sample_event(5, datetime!(2025-08-16 10:00 UTC), false, false, true),
                sample_event(6, future_deadline, true, true, false),
            ];
        }
        *client.fixture_rows.lock().expect("mock lock") = vec![
            sample_fixture(100, Some(5), true),
            sample_fixture(101, Some(6), false),
        ];
        let mut live = client.live.lock().expect("mock lock");
        live.insert(5, live_with(&[(10, 90, 2), (20, 0, 0)]));
        live.insert(6, live_with(&[(20, 45, 1)]));
    }

    #[tokio::test]
    async fn sync_refreshes_cache_and_persists_stat_lines() {
        let h = harness();
        seed_season(&h.client);

        let report = h.sync.sync_all().await;
        assert!(report.success, "sync failed: {:?}", report.error);

        // Cache refresh wrote every canonical entry plus the live blob.
        for key in [
            "fpl:bootstrap-static",
            "fpl:teams",
            "fpl:players",
            "fpl:gameweeks",
            "fpl:fixtures",
            "fpl:gameweek:6:live",
        ] {
            assert!(h.store.contains(key), "missing cache entry {key}");
        }

        // The finished gameweek produced exactly one stat line: Saka played,
        // Salah's zero minutes are skipped.
        assert_eq!(h.repos.stat_rows(), 1);
        let line = h
            .repos
            .find_player_stat(10, 5)
            .await
            .expect("lookup")
            .expect("stat line");
        assert_eq!(line.minutes, 90);
        assert_eq!(line.goals_scored, 2);

        // Reference data landed in the relational store.
        assert_eq!(h.repos.teams.lock().expect("repo lock").len(), 2);
        assert_eq!(h.repos.players.lock().expect("repo lock").len(), 2);
        assert_eq!(h.repos.gameweeks.lock().expect("repo lock").len(), 2);
        assert_eq!(h.repos.fixtures.lock().expect("repo lock").len(), 2);

        // The finished fixture's score survived persistence.
        let fixtures = h.repos.fixtures.lock().expect("repo lock");
        let done = fixtures.get(&100).expect("fixture 100");
        assert_eq!(done.team_h_score, Some(2));
        let pending = fixtures.get(&101).expect("fixture 101");
        assert_eq!(pending.team_h_score, None);
        drop(fixtures);

        // The upcoming deadline was armed.
        assert_eq!(h.sync.scheduler().armed_len(), 1);
        h.sync.scheduler().abort_all();
    }

    #[tokio::test]
    async fn replaying_a_sync_is_idempotent() {
        let h = harness();
        seed_season(&h.client);

        let first = h.sync.sync_all().await;
        assert!(first.success);
        let rows_after_first = h.repos.stat_rows();

        let second = h.sync.sync_all().await;
        assert!(second.success);

        assert_eq!(h.repos.stat_rows(), rows_after_first);
        assert_eq!(h.repos.teams.lock().expect("repo lock").len(), 2);
        // Re-arming the same (gameweek, deadline) pair does not stack timers.
        assert_eq!(h.sync.scheduler().armed_len(), 1);
        h.sync.scheduler().abort_all();
    }

    #[tokio::test]
    async fn upstream_failure_aborts_before_any_write() {
        let h = harness();
        seed_season(&h.client);
        h.client.fail_all.store(true, Ordering::SeqCst);

        let report = h.sync.sync_all().await;
        assert!(!report.success);
        assert!(report.error.is_some());
        assert_eq!(h.store.len(), 0);
        assert_eq!(h.repos.teams.lock().expect("repo lock").len(), 0);
        assert_eq!(h.sync.scheduler().armed_len(), 0);
    }

    #[tokio::test]
    async fn stat_batch_failure_does_not_fail_the_sync() {
        let h = harness();
        seed_season(&h.client);
        h.repos.fail_player_stats.store(true, Ordering::SeqCst);

        let report = h.sync.sync_all().await;
        assert!(report.success, "persistence is best-effort");
        assert_eq!(h.repos.stat_rows(), 0);
        // Sibling entity types were still persisted.
        assert_eq!(h.repos.teams.lock().expect("repo lock").len(), 2);
        h.sync.scheduler().abort_all();
    }

    #[tokio::test]
    async fn large_collections_are_chunked_into_batches_of_fifty() {
        let h = harness();
        {
            let mut bootstrap = h.client.bootstrap.lock().expect("mock lock");
            bootstrap.teams = vec![sample_team(1, "Arsenal", "ARS")];
            bootstrap.elements = (1..=120)
                .map(|id| sample_element(id, "Player", 1, 3))
                .collect();
            bootstrap.events =
                vec![sample_event(1, datetime!(2025-08-16 10:00 UTC), true, false, false)];
        }
        h.client
            .live
            .lock()
            .expect("mock lock")
            .insert(1, live_with(&[]));

        let report = h.sync.sync_all().await;
        assert!(report.success);
        assert_eq!(h.repos.player_batches.load(Ordering::SeqCst), 3);
        assert_eq!(h.repos.players.lock().expect("repo lock").len(), 120);
    }

    #[tokio::test]
    async fn update_check_is_quiet_when_nothing_is_live() {
        let h = harness();
        seed_season(&h.client);
        // Gameweek 6's fixture has a kickoff in the past but is unfinished,
        // so the season seed reads as active; clear the fixtures to make it
        // quiet.
        *h.client.fixture_rows.lock().expect("mock lock") = Vec::new();

        let check = h.sync.check_for_updates().await;
        assert!(check.success);
        assert!(!check.is_active);
    }

    #[tokio::test]
    async fn update_check_refreshes_live_data_for_active_gameweek() {
        let h = harness();
        seed_season(&h.client);

        let check = h.sync.check_for_updates().await;
        assert!(check.success);
        assert!(check.is_active);
        assert!(h.store.contains("fpl:gameweek:6:live"));
        assert!(h.store.contains("fpl:fixtures:gw:6"));
    }

    #[tokio::test]
    async fn initialize_arms_future_deadlines() {
        let h = harness();
        seed_season(&h.client);

        h.sync.initialize().await;
        assert_eq!(h.sync.scheduler().armed_len(), 1);
        h.sync.scheduler().abort_all();

        // An unreachable upstream defers scheduling instead of failing.
        let h2 = harness();
        h2.client.fail_all.store(true, Ordering::SeqCst);
        h2.sync.initialize().await;
        assert_eq!(h2.sync.scheduler().armed_len(), 0);
    }
}
