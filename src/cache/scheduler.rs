//! Deadline scheduler: arms one invalidation timer per upcoming gameweek
//! deadline.
//!
//! A timer may not sleep further than [`MAX_TIMER_CHUNK`] in one shot, so
//! far-future deadlines are reached through a chain of intermediate
//! wake-ups: every wake-up recomputes the remaining wait and either re-arms
//! or fires. The chain is an explicit loop per armed entry, never recursion.
//!
//! The armed registry is owned by this component and injected where needed;
//! entries are keyed by the immutable (gameweek, deadline) pair and removed
//! when their timer fires, so the same pair never fires twice even when
//! every sync re-arms the full deadline list.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::entities::Gameweek;

use super::invalidator::CacheInvalidator;

const SOURCE: &str = "cache::scheduler";

/// Largest single sleep the timer wheel is trusted with (~24.8 days).
pub const MAX_TIMER_CHUNK: Duration = Duration::from_millis(i32::MAX as u64);

/// Fires this long after the deadline so upstream has settled.
pub const DEADLINE_GRACE: Duration = Duration::from_secs(60);

/// Next action for a timer chain given the remaining wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Wake {
    /// Sleep a bounded chunk, then recompute.
    Intermediate(Duration),
    /// Sleep the final stretch (including grace), then invalidate.
    Fire(Duration),
}

pub(crate) fn next_wake(remaining: Duration) -> Wake {
    if remaining > MAX_TIMER_CHUNK {
        Wake::Intermediate(MAX_TIMER_CHUNK)
    } else {
        Wake::Fire(remaining + DEADLINE_GRACE)
    }
}

type ArmedKey = (i64, OffsetDateTime);

pub struct DeadlineScheduler {
    invalidator: Arc<CacheInvalidator>,
    armed: Arc<Mutex<HashMap<ArmedKey, JoinHandle<()>>>>,
}

impl DeadlineScheduler {
    pub fn new(invalidator: Arc<CacheInvalidator>) -> Self {
        Self {
            invalidator,
            armed: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Arm an invalidation timer for one gameweek deadline.
    ///
    /// Returns `false` when a live timer for the same (gameweek, deadline)
    /// pair is already armed.
    pub fn schedule_deadline_invalidation(
        &self,
        deadline: OffsetDateTime,
        gameweek_id: i64,
    ) -> bool {
        let key = (gameweek_id, deadline);
        let mut armed = self.armed.lock().expect("scheduler registry lock");
        if let Some(existing) = armed.get(&key) {
            if !existing.is_finished() {
                debug!(target: SOURCE, gameweek_id, "deadline timer already armed, skipping");
                return false;
            }
        }

        let invalidator = self.invalidator.clone();
        let registry = self.armed.clone();
        let handle = tokio::spawn(async move {
            run_timer_chain(invalidator, deadline, gameweek_id).await;
            if let Ok(mut registry) = registry.lock() {
                registry.remove(&key);
            }
        });
        armed.insert(key, handle);
        true
    }

    /// Arm timers for every gameweek whose deadline is still ahead, then run
    /// one live-data pruning pass. Safe to call on every sync.
    pub async fn setup_scheduled_invalidation(&self, gameweeks: &[Gameweek]) {
        let now = OffsetDateTime::now_utc();
        for gameweek in gameweeks {
            if gameweek.deadline_time <= now {
                continue;
            }
            if self.schedule_deadline_invalidation(gameweek.deadline_time, gameweek.id) {
                info!(
                    target: SOURCE,
                    gameweek_id = gameweek.id,
                    deadline = %gameweek.deadline_time,
                    "scheduled deadline invalidation"
                );
            }
        }

        self.invalidator.optimize_live_data_caching().await;
    }

    /// Number of currently armed timers.
    pub fn armed_len(&self) -> usize {
        self.armed.lock().expect("scheduler registry lock").len()
    }

    /// Abort every armed timer. Called on shutdown.
    pub fn abort_all(&self) {
        let mut armed = self.armed.lock().expect("scheduler registry lock");
        for (_, handle) in armed.drain() {
            handle.abort();
        }
    }
}

async fn run_timer_chain(
    invalidator: Arc<CacheInvalidator>,
    deadline: OffsetDateTime,
    gameweek_id: i64,
) {
    loop {
        let now = OffsetDateTime::now_utc();
        let remaining = (deadline - now).max(time::Duration::ZERO).unsigned_abs();
        match next_wake(remaining) {
            Wake::Intermediate(chunk) => {
                debug!(
                    target: SOURCE,
                    gameweek_id,
                    remaining_secs = remaining.as_secs(),
                    "deadline beyond timer range, arming intermediate wake-up"
                );
                tokio::time::sleep(chunk).await;
            }
            Wake::Fire(wait) => {
                tokio::time::sleep(wait).await;
                info!(target: SOURCE, gameweek_id, "deadline passed, invalidating gameweek data");
                if let Err(error) = invalidator.invalidate_gameweek_data(gameweek_id).await {
                    warn!(target: SOURCE, gameweek_id, error = %error, "deadline invalidation failed");
                }
                if let Err(error) = invalidator.invalidate_player_data().await {
                    warn!(target: SOURCE, gameweek_id, error = %error, "player invalidation failed");
                }
                return;
            }
        }
    }
}
