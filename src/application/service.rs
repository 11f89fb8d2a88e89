//! Cache-backed read accessors over the upstream source.
//!
//! Every collection read goes through the cache-aside loader; filtered
//! variants cache under their own key. Shaping (position labels, score
//! suppression, full names) happens here so cached payloads already carry
//! the canonical form.

use std::sync::Arc;

use time::OffsetDateTime;
use tracing::{error, warn};

use crate::cache::{CacheCategory, CacheLoader, CacheRead, current_gameweek};
use crate::cache::keys::{self, PlayerFilter};
use crate::domain::entities::{Fixture, Gameweek, Player, PlayerGameweekStat, Team};
use crate::domain::upstream::{GameweekLive, PlayerDetail, PlayerSeasonHistory};

use super::repos::FplRepositories;
use super::source::{SourceClient, UpstreamError};

const SOURCE: &str = "application::service";

#[derive(Clone)]
pub struct FplDataService {
    loader: CacheLoader,
    client: Arc<dyn SourceClient>,
    repos: Arc<dyn FplRepositories>,
}

impl FplDataService {
    pub fn new(
        loader: CacheLoader,
        client: Arc<dyn SourceClient>,
        repos: Arc<dyn FplRepositories>,
    ) -> Self {
        Self {
            loader,
            client,
            repos,
        }
    }

    pub fn loader(&self) -> &CacheLoader {
        &self.loader
    }

    pub fn client(&self) -> &Arc<dyn SourceClient> {
        &self.client
    }

    pub async fn get_teams(&self) -> Result<Vec<Team>, UpstreamError> {
        let client = self.client.clone();
        self.loader
            .fetch_with_cache(&keys::teams(), CacheCategory::Bootstrap, || async move {
                let bootstrap = client.bootstrap_static().await?;
                let observed_at = OffsetDateTime::now_utc();
                Ok(bootstrap
                    .teams
                    .iter()
                    .map(|team| Team::from_upstream(team, observed_at))
                    .collect::<Vec<_>>())
            })
            .await
    }

    pub async fn get_players(&self, filter: PlayerFilter) -> Result<Vec<Player>, UpstreamError> {
        let client = self.client.clone();
        self.loader
            .fetch_with_cache(
                &keys::players(&filter),
                CacheCategory::Bootstrap,
                || async move {
                    let bootstrap = client.bootstrap_static().await?;
                    let observed_at = OffsetDateTime::now_utc();
                    let players = bootstrap
                        .elements
                        .iter()
                        .map(|element| Player::from_element(element, observed_at))
                        .filter(|player| {
                            filter.team_id.is_none_or(|team_id| player.team_id == team_id)
                        })
                        .filter(|player| {
                            filter
                                .position
                                .is_none_or(|position| player.position == position)
                        })
                        .collect::<Vec<_>>();
                    Ok(players)
                },
            )
            .await
    }

    pub async fn get_gameweeks(&self) -> Result<Vec<Gameweek>, UpstreamError> {
        let client = self.client.clone();
        self.loader
            .fetch_with_cache(&keys::gameweeks(), CacheCategory::Bootstrap, || async move {
                let bootstrap = client.bootstrap_static().await?;
                let observed_at = OffsetDateTime::now_utc();
                Ok(bootstrap
                    .events
                    .iter()
                    .map(|event| Gameweek::from_event(event, observed_at))
                    .collect::<Vec<_>>())
            })
            .await
    }

    pub async fn get_current_gameweek(&self) -> Result<Option<Gameweek>, UpstreamError> {
        let gameweeks = self.get_gameweeks().await?;
        Ok(current_gameweek(&gameweeks).cloned())
    }

    pub async fn get_next_gameweek(&self) -> Result<Option<Gameweek>, UpstreamError> {
        let gameweeks = self.get_gameweeks().await?;
        Ok(gameweeks.iter().find(|gw| gw.is_next).cloned())
    }

    pub async fn get_fixtures(
        &self,
        gameweek_id: Option<i64>,
    ) -> Result<Vec<Fixture>, UpstreamError> {
        let client = self.client.clone();
        self.loader
            .fetch_with_cache(
                &keys::fixtures(gameweek_id),
                CacheCategory::Fixtures,
                || async move {
                    let rows = client.fixtures().await?;
                    let observed_at = OffsetDateTime::now_utc();
                    let fixtures = rows
                        .iter()
                        .map(|fixture| Fixture::from_upstream(fixture, observed_at))
                        .filter(|fixture| {
                            gameweek_id.is_none_or(|id| fixture.gameweek_id == Some(id))
                        })
                        .collect::<Vec<_>>();
                    Ok(fixtures)
                },
            )
            .await
    }

    pub async fn get_player_detail(&self, player_id: i64) -> Result<PlayerDetail, UpstreamError> {
        let client = self.client.clone();
        self.loader
            .fetch_with_cache(
                &keys::player_detail(player_id),
                CacheCategory::PlayerDetail,
                || async move { client.player_detail(player_id).await },
            )
            .await
    }

    pub async fn get_live_gameweek(&self, gameweek_id: i64) -> Result<GameweekLive, UpstreamError> {
        let client = self.client.clone();
        self.loader
            .fetch_with_cache(
                &keys::gameweek_live(gameweek_id),
                CacheCategory::Live,
                || async move { client.gameweek_live(gameweek_id).await },
            )
            .await
    }

    /// Per-season aggregates from a player's history, optionally narrowed to
    /// one season name (`"2023/24"`).
    pub async fn get_player_season_stats(
        &self,
        player_id: i64,
        season: Option<&str>,
    ) -> Result<Vec<PlayerSeasonHistory>, UpstreamError> {
        let detail = self.get_player_detail(player_id).await?;
        let mut seasons = detail.history_past;
        if let Some(season) = season {
            seasons.retain(|entry| entry.season_name == season);
        }
        Ok(seasons)
    }

    /// One player's stat line for one gameweek.
    ///
    /// Resolution order: cache, then the relational store (historical
    /// gameweeks), then the live payload. Each source failure degrades to
    /// the next source; `None` means no source had the line.
    pub async fn get_player_gameweek_stats(
        &self,
        player_id: i64,
        gameweek_id: i64,
    ) -> Option<PlayerGameweekStat> {
        let key = keys::player_gameweek(player_id, gameweek_id);
        let store = self.loader.store();

        match store.get(&key).await {
            Ok(CacheRead::Hit(raw)) => match serde_json::from_str(&raw) {
                Ok(stat) => return Some(stat),
                Err(parse_error) => {
                    warn!(target: SOURCE, key, error = %parse_error, "corrupted stat entry, refetching");
                }
            },
            Ok(CacheRead::Miss) => {}
            Err(cache_error) => {
                warn!(target: SOURCE, key, error = %cache_error, "cache read failed for stat line");
            }
        }

        match self.repos.find_player_stat(player_id, gameweek_id).await {
            Ok(Some(stat)) => {
                self.cache_stat_line(&key, &stat, CacheCategory::Other).await;
                return Some(stat);
            }
            Ok(None) => {}
            Err(db_error) => {
                warn!(target: SOURCE, player_id, gameweek_id, error = %db_error, "stat lookup failed");
            }
        }

        match self.get_live_gameweek(gameweek_id).await {
            Ok(live) => {
                let element = live.elements.get(&player_id.to_string())?;
                let stat = PlayerGameweekStat::from_stats(
                    player_id,
                    gameweek_id,
                    &element.stats,
                    OffsetDateTime::now_utc(),
                );
                self.cache_stat_line(&key, &stat, CacheCategory::Live).await;
                Some(stat)
            }
            Err(live_error) => {
                error!(target: SOURCE, player_id, gameweek_id, error = %live_error, "live stat fetch failed");
                None
            }
        }
    }

    async fn cache_stat_line(&self, key: &str, stat: &PlayerGameweekStat, category: CacheCategory) {
        let Ok(serialized) = serde_json::to_string(stat) else {
            return;
        };
        let ttl = self.loader.ttl_policy().ttl(category);
        if let Err(cache_error) = self.loader.store().set(key, &serialized, ttl).await {
            warn!(target: SOURCE, key, error = %cache_error, "failed to cache stat line");
        }
    }

    /// Whether any fixture of the current gameweek has kicked off without
    /// finishing. Failures degrade to `false`: an unreachable source should
    /// not look like a live gameweek.
    pub async fn is_gameweek_active(&self) -> bool {
        let current = match self.get_current_gameweek().await {
            Ok(Some(current)) => current,
            Ok(None) => return false,
            Err(fetch_error) => {
                error!(target: SOURCE, error = %fetch_error, "current gameweek lookup failed");
                return false;
            }
        };

        let fixtures = match self.get_fixtures(Some(current.id)).await {
            Ok(fixtures) => fixtures,
            Err(fetch_error) => {
                error!(target: SOURCE, error = %fetch_error, "fixture lookup failed");
                return false;
            }
        };

        let now = OffsetDateTime::now_utc();
        fixtures.iter().any(|fixture| {
            fixture
                .kickoff_time
                .is_some_and(|kickoff| kickoff <= now && !fixture.finished)
        })
    }
}
