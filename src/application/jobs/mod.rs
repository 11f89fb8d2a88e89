mod context;
mod live_poll;
mod sync_data;

pub use context::SyncJobContext;
pub use live_poll::{LivePollJob, process_live_poll_job};
pub use sync_data::{SyncDataJob, process_sync_data_job};

use cron::Schedule;
use std::str::FromStr;

use crate::infra::error::InfraError;

/// Parse a cron expression from configuration into a schedule.
pub fn parse_schedule(expression: &str) -> Result<Schedule, InfraError> {
    Schedule::from_str(expression).map_err(|err| {
        InfraError::configuration(format!("invalid cron expression `{expression}`: {err}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_schedules_parse() {
        let sync = parse_schedule("0 0 6 * * *").expect("sync schedule");
        assert_eq!(sync.upcoming(chrono::Utc).take(2).count(), 2);

        let poll = parse_schedule("0 */5 * * * *").expect("poll schedule");
        assert_eq!(poll.upcoming(chrono::Utc).take(2).count(), 2);
    }

    #[test]
    fn malformed_expression_is_rejected() {
        assert!(parse_schedule("every day at dawn").is_err());
    }
}
