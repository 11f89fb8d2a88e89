//! Repository traits describing the relational persistence adapter.
//!
//! Every upsert keys on the entity's natural identifier and must be safe to
//! replay: applying the same batch twice leaves exactly one row per key.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::entities::{Fixture, Gameweek, Player, PlayerGameweekStat, Team};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Batched upserts into the relational store. Each call receives one batch;
/// chunking is the caller's concern.
#[async_trait]
pub trait FplRepositories: Send + Sync {
    async fn upsert_teams(&self, teams: &[Team]) -> Result<(), RepoError>;

    async fn upsert_players(&self, players: &[Player]) -> Result<(), RepoError>;

    async fn upsert_gameweeks(&self, gameweeks: &[Gameweek]) -> Result<(), RepoError>;

    async fn upsert_fixtures(&self, fixtures: &[Fixture]) -> Result<(), RepoError>;

    /// Overwrite the score columns of already-persisted fixtures.
    async fn upsert_fixture_results(&self, fixtures: &[Fixture]) -> Result<(), RepoError>;

    /// Upsert stat lines keyed on (player_id, gameweek_id).
    async fn upsert_player_stats(&self, stats: &[PlayerGameweekStat]) -> Result<(), RepoError>;

    async fn find_player_stat(
        &self,
        player_id: i64,
        gameweek_id: i64,
    ) -> Result<Option<PlayerGameweekStat>, RepoError>;
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory [`FplRepositories`] double modelling natural-key conflict
    //! resolution.

    use std::collections::BTreeMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;

    #[derive(Default)]
    pub struct MemoryRepositories {
        pub teams: Mutex<BTreeMap<i64, Team>>,
        pub players: Mutex<BTreeMap<i64, Player>>,
        pub gameweeks: Mutex<BTreeMap<i64, Gameweek>>,
        pub fixtures: Mutex<BTreeMap<i64, Fixture>>,
        pub player_stats: Mutex<BTreeMap<(i64, i64), PlayerGameweekStat>>,
        pub fail_player_stats: AtomicBool,
        pub team_batches: AtomicUsize,
        pub player_batches: AtomicUsize,
        pub stat_batches: AtomicUsize,
    }

    impl MemoryRepositories {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn stat_rows(&self) -> usize {
            self.player_stats.lock().expect("repo lock").len()
        }
    }

    #[async_trait]
    impl FplRepositories for MemoryRepositories {
        async fn upsert_teams(&self, teams: &[Team]) -> Result<(), RepoError> {
            self.team_batches.fetch_add(1, Ordering::SeqCst);
            let mut rows = self.teams.lock().expect("repo lock");
            for team in teams {
                rows.insert(team.id, team.clone());
            }
            Ok(())
        }

        async fn upsert_players(&self, players: &[Player]) -> Result<(), RepoError> {
            self.player_batches.fetch_add(1, Ordering::SeqCst);
            let mut rows = self.players.lock().expect("repo lock");
            for player in players {
                rows.insert(player.id, player.clone());
            }
            Ok(())
        }

        async fn upsert_gameweeks(&self, gameweeks: &[Gameweek]) -> Result<(), RepoError> {
            let mut rows = self.gameweeks.lock().expect("repo lock");
            for gameweek in gameweeks {
                rows.insert(gameweek.id, gameweek.clone());
            }
            Ok(())
        }

        async fn upsert_fixtures(&self, fixtures: &[Fixture]) -> Result<(), RepoError> {
            let mut rows = self.fixtures.lock().expect("repo lock");
            for fixture in fixtures {
                rows.insert(fixture.id, fixture.clone());
            }
            Ok(())
        }

        async fn upsert_fixture_results(&self, fixtures: &[Fixture]) -> Result<(), RepoError> {
            let mut rows = self.fixtures.lock().expect("repo lock");
            for fixture in fixtures {
                match rows.get_mut(&fixture.id) {
                    Some(row) => {
                        row.team_h_score = fixture.team_h_score;
                        row.team_a_score = fixture.team_a_score;
                        row.finished = fixture.finished;
                    }
                    None => {
                        rows.insert(fixture.id, fixture.clone());
                    }
                }
            }
            Ok(())
        }

        async fn upsert_player_stats(
            &self,
            stats: &[PlayerGameweekStat],
        ) -> Result<(), RepoError> {
            if self.fail_player_stats.load(Ordering::SeqCst) {
                return Err(RepoError::from_persistence("injected stats failure"));
            }
            self.stat_batches.fetch_add(1, Ordering::SeqCst);
            let mut rows = self.player_stats.lock().expect("repo lock");
            for stat in stats {
                rows.insert((stat.player_id, stat.gameweek_id), stat.clone());
            }
            Ok(())
        }

        async fn find_player_stat(
            &self,
            player_id: i64,
            gameweek_id: i64,
        ) -> Result<Option<PlayerGameweekStat>, RepoError> {
            let rows = self.player_stats.lock().expect("repo lock");
            Ok(rows.get(&(player_id, gameweek_id)).cloned())
        }
    }
}
