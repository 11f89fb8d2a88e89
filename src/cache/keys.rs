//! Cache key schema.
//!
//! Every key lives under the `fpl:` namespace. Filtered reads get their own
//! key so they are cached independently of the unfiltered collection.

use crate::domain::position::Position;

/// Namespace prefix for every key owned by this service.
pub const NAMESPACE: &str = "fpl";

/// Optional filters applied to the player collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlayerFilter {
    pub team_id: Option<i64>,
    pub position: Option<Position>,
}

impl PlayerFilter {
    pub fn is_empty(&self) -> bool {
        self.team_id.is_none() && self.position.is_none()
    }
}

pub fn bootstrap() -> String {
    format!("{NAMESPACE}:bootstrap-static")
}

pub fn teams() -> String {
    format!("{NAMESPACE}:teams")
}

pub fn gameweeks() -> String {
    format!("{NAMESPACE}:gameweeks")
}

pub fn players(filter: &PlayerFilter) -> String {
    let mut key = format!("{NAMESPACE}:players");
    if let Some(team_id) = filter.team_id {
        key.push_str(&format!(":team:{team_id}"));
    }
    if let Some(position) = filter.position {
        key.push_str(&format!(":pos:{position}"));
    }
    key
}

pub fn fixtures(gameweek_id: Option<i64>) -> String {
    match gameweek_id {
        Some(id) => format!("{NAMESPACE}:fixtures:gw:{id}"),
        None => format!("{NAMESPACE}:fixtures"),
    }
}

pub fn player_detail(player_id: i64) -> String {
    format!("{NAMESPACE}:player:{player_id}:detail")
}

pub fn player_gameweek(player_id: i64, gameweek_id: i64) -> String {
    format!("{NAMESPACE}:player:{player_id}:gameweek:{gameweek_id}")
}

pub fn gameweek_live(gameweek_id: i64) -> String {
    format!("{NAMESPACE}:gameweek:{gameweek_id}:live")
}

/// Pattern matching every key in the namespace.
pub fn all_pattern() -> String {
    format!("{NAMESPACE}:*")
}

/// Pattern matching the player collection and every filtered variant.
pub fn players_pattern() -> String {
    format!("{NAMESPACE}:players*")
}

/// Pattern matching per-player detail and stat entries.
pub fn player_pattern() -> String {
    format!("{NAMESPACE}:player:*")
}

/// Pattern matching every per-gameweek live entry.
pub fn live_pattern() -> String {
    format!("{NAMESPACE}:gameweek:*:live")
}

/// Extract the gameweek id from a live-data key, or `None` when the key has
/// a different shape.
pub fn parse_live_key(key: &str) -> Option<i64> {
    let rest = key.strip_prefix(NAMESPACE)?.strip_prefix(":gameweek:")?;
    let id = rest.strip_suffix(":live")?;
    id.parse().ok()
}
