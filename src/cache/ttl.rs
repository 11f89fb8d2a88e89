//! TTL policy: cache lifetimes differentiated by data volatility.

use std::time::Duration;

const LIVE_TTL_SECS: u64 = 15 * 60;
const BOOTSTRAP_TTL_SECS: u64 = 4 * 60 * 60;
const FIXTURES_TTL_SECS: u64 = 24 * 60 * 60;
const DEFAULT_TTL_SECS: u64 = 12 * 60 * 60;

/// Development-mode lifetimes are one fifth of the full lifetime.
const DEV_DIVISOR: u64 = 5;

/// Volatility class of a cached payload. Selects its TTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheCategory {
    /// The bootstrap snapshot and collections derived from it.
    Bootstrap,
    /// Fixture lists.
    Fixtures,
    /// Per-player detail payloads.
    PlayerDetail,
    /// In-progress match statistics.
    Live,
    /// Anything without a dedicated policy.
    Other,
}

/// Pure mapping from [`CacheCategory`] to a cache lifetime.
///
/// `dev_mode` shortens every lifetime by the same factor so stale data does
/// not obscure iteration during development.
#[derive(Debug, Clone, Copy)]
pub struct TtlPolicy {
    dev_mode: bool,
}

impl TtlPolicy {
    pub fn new(dev_mode: bool) -> Self {
        Self { dev_mode }
    }

    pub fn ttl(&self, category: CacheCategory) -> Duration {
        let base = match category {
            CacheCategory::Live => LIVE_TTL_SECS,
            CacheCategory::Bootstrap => BOOTSTRAP_TTL_SECS,
            CacheCategory::Fixtures => FIXTURES_TTL_SECS,
            CacheCategory::PlayerDetail | CacheCategory::Other => DEFAULT_TTL_SECS,
        };
        let secs = if self.dev_mode { base / DEV_DIVISOR } else { base };
        Duration::from_secs(secs)
    }
}
