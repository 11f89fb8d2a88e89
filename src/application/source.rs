//! Upstream source port.
//!
//! The four read operations the service consumes. Implementations perform a
//! single attempt with no caching or retry; both are the cache subsystem's
//! responsibility.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::upstream::{BootstrapStatic, GameweekLive, PlayerDetail, UpstreamFixture};

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream request failed: {message}")]
    Request { message: String },
    #[error("upstream returned status {status}")]
    Status { status: u16 },
    #[error("upstream payload could not be decoded: {message}")]
    Decode { message: String },
}

impl UpstreamError {
    pub fn request(message: impl Into<String>) -> Self {
        Self::Request {
            message: message.into(),
        }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }
}

#[async_trait]
pub trait SourceClient: Send + Sync {
    /// The full bootstrap snapshot: teams, elements, events.
    async fn bootstrap_static(&self) -> Result<BootstrapStatic, UpstreamError>;

    /// Every fixture of the season.
    async fn fixtures(&self) -> Result<Vec<UpstreamFixture>, UpstreamError>;

    /// Detail payload for one player.
    async fn player_detail(&self, player_id: i64) -> Result<PlayerDetail, UpstreamError>;

    /// Live statistics for one gameweek.
    async fn gameweek_live(&self, gameweek_id: i64) -> Result<GameweekLive, UpstreamError>;
}
