//! Cron job for the daily full sync pass.

use apalis::prelude::Data;
use tracing::{error, info};

use super::context::SyncJobContext;

/// Marker struct for the cron-triggered sync job.
/// Must implement `From<chrono::DateTime<chrono::Utc>>` for apalis-cron
/// compatibility.
#[derive(Default, Debug, Clone)]
pub struct SyncDataJob;

impl From<chrono::DateTime<chrono::Utc>> for SyncDataJob {
    fn from(_: chrono::DateTime<chrono::Utc>) -> Self {
        Self
    }
}

/// Run a full sync pass. The report is logged rather than raised so the
/// cadence continues after a failed pass.
pub async fn process_sync_data_job(
    _job: SyncDataJob,
    ctx: Data<SyncJobContext>,
) -> Result<(), apalis::prelude::Error> {
    let report = ctx.sync.sync_all().await;
    if report.success {
        info!(target: "application::jobs::sync_data", message = %report.message, "scheduled sync finished");
    } else {
        error!(
            target: "application::jobs::sync_data",
            message = %report.message,
            error = report.error.as_deref().unwrap_or("unknown"),
            "scheduled sync failed"
        );
    }
    Ok(())
}
