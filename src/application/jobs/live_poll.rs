//! Cron job polling for in-progress matches between full syncs.

use apalis::prelude::Data;
use tracing::{debug, warn};

use super::context::SyncJobContext;

/// Marker struct for the cron-triggered live poll.
#[derive(Default, Debug, Clone)]
pub struct LivePollJob;

impl From<chrono::DateTime<chrono::Utc>> for LivePollJob {
    fn from(_: chrono::DateTime<chrono::Utc>) -> Self {
        Self
    }
}

/// Check whether a gameweek is active and refresh its live data if so.
pub async fn process_live_poll_job(
    _job: LivePollJob,
    ctx: Data<SyncJobContext>,
) -> Result<(), apalis::prelude::Error> {
    let check = ctx.sync.check_for_updates().await;
    match (check.success, check.is_active) {
        (true, true) => {
            debug!(target: "application::jobs::live_poll", "live data refreshed");
        }
        (true, false) => {}
        (false, _) => {
            warn!(
                target: "application::jobs::live_poll",
                error = check.error.as_deref().unwrap_or("unknown"),
                "live poll failed"
            );
        }
    }
    Ok(())
}
