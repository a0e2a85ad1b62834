//! Jobs the daemon registers with the scheduler.

#[cfg(feature = "jobs")]
pub mod sync;

#[cfg(feature = "jobs")]
pub use sync::{create_sync_job, SyncJobConfig, SYNC_JOB_NAME};
