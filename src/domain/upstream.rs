//! Raw payload types returned by the upstream FPL API.
//!
//! These mirror the wire shape and are mapped into [`crate::domain::entities`]
//! records at the service boundary. Fields the service never reads are
//! omitted; serde ignores the rest of the payload.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// One team row from `bootstrap-static`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamTeam {
    pub id: i64,
    pub name: String,
    pub short_name: String,
}

/// One player ("element") row from `bootstrap-static`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamElement {
    pub id: i64,
    pub web_name: String,
    pub first_name: String,
    pub second_name: String,
    /// Owning team id.
    pub team: i64,
    /// Position code, mapped through [`crate::domain::position::Position`].
    pub element_type: i64,
    #[serde(default)]
    pub form: Option<String>,
    #[serde(default)]
    pub points_per_game: Option<String>,
    #[serde(default)]
    pub total_points: i64,
    #[serde(default)]
    pub selected_by_percent: Option<String>,
}

/// One gameweek ("event") row from `bootstrap-static`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamEvent {
    pub id: i64,
    pub name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub deadline_time: OffsetDateTime,
    pub is_current: bool,
    pub is_next: bool,
    pub finished: bool,
}

/// The full `bootstrap-static` snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BootstrapStatic {
    pub teams: Vec<UpstreamTeam>,
    pub elements: Vec<UpstreamElement>,
    pub events: Vec<UpstreamEvent>,
}

/// One fixture row from the `fixtures` endpoint.
///
/// `event` is null for fixtures not yet assigned to a gameweek, and
/// `kickoff_time` is null until the fixture is scheduled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamFixture {
    pub id: i64,
    pub event: Option<i64>,
    pub team_h: i64,
    pub team_a: i64,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub kickoff_time: Option<OffsetDateTime>,
    pub finished: bool,
    #[serde(default)]
    pub team_h_score: Option<i64>,
    #[serde(default)]
    pub team_a_score: Option<i64>,
}

/// A single past-fixture line from a player's `element-summary` history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerHistoryEntry {
    pub element: i64,
    pub fixture: i64,
    pub opponent_team: i64,
    pub total_points: i64,
    pub was_home: bool,
    pub minutes: i64,
    pub goals_scored: i64,
    pub assists: i64,
    pub clean_sheets: i64,
    pub bonus: i64,
}

/// A per-season aggregate from a player's `element-summary` history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerSeasonHistory {
    pub season_name: String,
    pub total_points: i64,
    pub minutes: i64,
    pub goals_scored: i64,
    pub assists: i64,
    pub clean_sheets: i64,
    pub goals_conceded: i64,
}

/// The `element-summary/{id}` payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerDetail {
    #[serde(default)]
    pub history: Vec<PlayerHistoryEntry>,
    #[serde(default)]
    pub history_past: Vec<PlayerSeasonHistory>,
}

/// Per-element match statistics inside a live gameweek payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LiveElementStats {
    #[serde(default)]
    pub minutes: i64,
    #[serde(default)]
    pub goals_scored: i64,
    #[serde(default)]
    pub assists: i64,
    #[serde(default)]
    pub clean_sheets: i64,
    #[serde(default)]
    pub goals_conceded: i64,
    #[serde(default)]
    pub own_goals: i64,
    #[serde(default)]
    pub penalties_saved: i64,
    #[serde(default)]
    pub penalties_missed: i64,
    #[serde(default)]
    pub yellow_cards: i64,
    #[serde(default)]
    pub red_cards: i64,
    #[serde(default)]
    pub saves: i64,
    #[serde(default)]
    pub bonus: i64,
    #[serde(default)]
    pub total_points: i64,
}

/// One element entry of a live gameweek payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveElement {
    pub id: i64,
    pub stats: LiveElementStats,
}

/// The `event/{id}/live` payload, keyed by element id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GameweekLive {
    #[serde(default)]
    pub elements: HashMap<String, LiveElement>,
}
