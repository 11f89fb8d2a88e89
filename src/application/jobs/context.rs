use std::sync::Arc;

use crate::application::sync::SyncService;

/// Shared state handed to every cron worker.
#[derive(Clone)]
pub struct SyncJobContext {
    pub sync: Arc<SyncService>,
}
