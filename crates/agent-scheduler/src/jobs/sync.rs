//! Periodic multi-chain registry sync.
//!
//! The job only produces work: each firing runs the [`SyncTrigger`], which
//! opens a sync log entry and enqueues one message per configured chain. The
//! consumer pool does the subgraph paging and indexing.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use agent_indexing::SyncTrigger;
use agent_types::SyncSettings;

use crate::{JitterConfig, OverlapPolicy, SchedulerError, SchedulerService};

pub const SYNC_JOB_NAME: &str = "agent-sync";

/// Schedule of the sync job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncJobConfig {
    /// Cron expression (default: "0 */15 * * * *" = every 15 minutes)
    pub cron: String,
    /// Empty means the scheduler's default timezone
    pub timezone: String,
    pub jitter_secs: u64,
}

impl Default for SyncJobConfig {
    fn default() -> Self {
        Self::from(&SyncSettings::default())
    }
}

impl From<&SyncSettings> for SyncJobConfig {
    fn from(settings: &SyncSettings) -> Self {
        Self {
            cron: settings.cron.clone(),
            timezone: settings.timezone.clone(),
            jitter_secs: settings.jitter_secs,
        }
    }
}

impl SyncJobConfig {
    pub fn with_cron(mut self, cron: impl Into<String>) -> Self {
        self.cron = cron.into();
        self
    }

    pub fn with_jitter(mut self, jitter_secs: u64) -> Self {
        self.jitter_secs = jitter_secs;
        self
    }
}

/// Register the sync trigger under [`SYNC_JOB_NAME`].
///
/// Runs never overlap: a firing that arrives while the previous trigger
/// call is still enqueueing is skipped.
pub async fn create_sync_job(
    scheduler: &SchedulerService,
    trigger: Arc<SyncTrigger>,
    config: SyncJobConfig,
) -> Result<uuid::Uuid, SchedulerError> {
    let timezone = (!config.timezone.is_empty()).then_some(config.timezone.as_str());

    scheduler
        .register_job(
            SYNC_JOB_NAME,
            &config.cron,
            timezone,
            OverlapPolicy::Skip,
            JitterConfig::new(config.jitter_secs),
            move |cancel| {
                let trigger = trigger.clone();
                async move {
                    if cancel.is_cancelled() {
                        return Ok(());
                    }
                    match trigger.run().await {
                        Ok(log_id) => {
                            info!(log_id, "Scheduled sync queued");
                            Ok(())
                        }
                        Err(e) => {
                            error!(error = %e, "Scheduled sync failed");
                            Err(e.to_string())
                        }
                    }
                }
            },
        )
        .await
}
