//! Canonical FPL records as cached and persisted by this service.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::domain::position::Position;
use crate::domain::upstream::{
    LiveElementStats, UpstreamElement, UpstreamEvent, UpstreamFixture, UpstreamTeam,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub id: i64,
    pub name: String,
    pub short_name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub last_updated: OffsetDateTime,
}

impl Team {
    pub fn from_upstream(team: &UpstreamTeam, observed_at: OffsetDateTime) -> Self {
        Self {
            id: team.id,
            name: team.name.clone(),
            short_name: team.short_name.clone(),
            last_updated: observed_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: i64,
    pub web_name: String,
    pub full_name: String,
    pub team_id: i64,
    pub position: Position,
    pub form: Option<String>,
    pub points_per_game: Option<String>,
    pub total_points: i64,
    pub selected_by_percent: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub last_updated: OffsetDateTime,
}

impl Player {
    pub fn from_element(element: &UpstreamElement, observed_at: OffsetDateTime) -> Self {
        Self {
            id: element.id,
            web_name: element.web_name.clone(),
            full_name: format!("{} {}", element.first_name, element.second_name),
            team_id: element.team,
            position: Position::from_element_type(element.element_type),
            form: element.form.clone(),
            points_per_game: element.points_per_game.clone(),
            total_points: element.total_points,
            selected_by_percent: element.selected_by_percent.clone(),
            last_updated: observed_at,
        }
    }
}

/// One round of the season. `deadline_time` is immutable once observed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gameweek {
    pub id: i64,
    pub name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub deadline_time: OffsetDateTime,
    pub is_current: bool,
    pub is_next: bool,
    pub finished: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub last_updated: OffsetDateTime,
}

impl Gameweek {
    pub fn from_event(event: &UpstreamEvent, observed_at: OffsetDateTime) -> Self {
        Self {
            id: event.id,
            name: event.name.clone(),
            deadline_time: event.deadline_time,
            is_current: event.is_current,
            is_next: event.is_next,
            finished: event.finished,
            last_updated: observed_at,
        }
    }
}

/// A match between two teams.
///
/// Scores are withheld until the fixture is finished, regardless of what the
/// upstream payload carries for an in-progress match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fixture {
    pub id: i64,
    pub gameweek_id: Option<i64>,
    pub home_team_id: i64,
    pub away_team_id: i64,
    #[serde(with = "time::serde::rfc3339::option")]
    pub kickoff_time: Option<OffsetDateTime>,
    pub finished: bool,
    pub team_h_score: Option<i64>,
    pub team_a_score: Option<i64>,
    #[serde(with = "time::serde::rfc3339")]
    pub last_updated: OffsetDateTime,
}

impl Fixture {
    pub fn from_upstream(fixture: &UpstreamFixture, observed_at: OffsetDateTime) -> Self {
        let (team_h_score, team_a_score) = if fixture.finished {
            (fixture.team_h_score, fixture.team_a_score)
        } else {
            (None, None)
        };
        Self {
            id: fixture.id,
            gameweek_id: fixture.event,
            home_team_id: fixture.team_h,
            away_team_id: fixture.team_a,
            kickoff_time: fixture.kickoff_time,
            finished: fixture.finished,
            team_h_score,
            team_a_score,
            last_updated: observed_at,
        }
    }

    /// Whether the fixture carries a complete final score.
    pub fn has_final_score(&self) -> bool {
        self.finished && self.team_h_score.is_some() && self.team_a_score.is_some()
    }
}

/// Per (player, gameweek) aggregate of match events. Only recorded for
/// players with minutes on the pitch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerGameweekStat {
    pub player_id: i64,
    pub gameweek_id: i64,
    pub minutes: i64,
    pub goals_scored: i64,
    pub assists: i64,
    pub clean_sheets: i64,
    pub goals_conceded: i64,
    pub own_goals: i64,
    pub penalties_saved: i64,
    pub penalties_missed: i64,
    pub yellow_cards: i64,
    pub red_cards: i64,
    pub saves: i64,
    pub bonus: i64,
    pub total_points: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl PlayerGameweekStat {
    /// Build a stat line from a live payload entry. Returns `None` when the
    /// player did not play.
    pub fn from_live(
        player_id: i64,
        gameweek_id: i64,
        stats: &LiveElementStats,
        observed_at: OffsetDateTime,
    ) -> Option<Self> {
        if stats.minutes <= 0 {
            return None;
        }
        Some(Self::from_stats(player_id, gameweek_id, stats, observed_at))
    }

    /// Build a stat line without the minutes-played filter. Used by read
    /// paths that surface live numbers as-is.
    pub fn from_stats(
        player_id: i64,
        gameweek_id: i64,
        stats: &LiveElementStats,
        observed_at: OffsetDateTime,
    ) -> Self {
        Self {
            player_id,
            gameweek_id,
            minutes: stats.minutes,
            goals_scored: stats.goals_scored,
            assists: stats.assists,
            clean_sheets: stats.clean_sheets,
            goals_conceded: stats.goals_conceded,
            own_goals: stats.own_goals,
            penalties_saved: stats.penalties_saved,
            penalties_missed: stats.penalties_missed,
            yellow_cards: stats.yellow_cards,
            red_cards: stats.red_cards,
            saves: stats.saves,
            bonus: stats.bonus,
            total_points: stats.total_points,
            created_at: observed_at,
        }
    }
}
