//! # agent-scheduler
//!
//! Cron scheduling for the agent search daemon.
//!
//! [`SchedulerService`] wraps `tokio-cron-scheduler` with timezone-aware
//! schedules (`chrono-tz`) and a `CancellationToken` that is handed to every
//! job so runs can stop cleanly on shutdown. Jobs are registered through
//! [`SchedulerService::register_job`], which applies an [`OverlapPolicy`]
//! and a random start delay ([`JitterConfig`]) and records each outcome in
//! the [`JobRegistry`].
//!
//! ## Example
//!
//! ```ignore
//! use agent_scheduler::{create_sync_job, SchedulerConfig, SchedulerService, SyncJobConfig};
//!
//! let mut scheduler = SchedulerService::new(SchedulerConfig::default()).await?;
//! create_sync_job(&scheduler, trigger, SyncJobConfig::from(&settings.sync)).await?;
//! scheduler.start().await?;
//! // ...
//! scheduler.shutdown().await?;
//! ```

mod config;
mod error;
mod jitter;
mod overlap;
mod registry;
mod scheduler;

pub mod jobs;

pub use config::SchedulerConfig;
pub use error::SchedulerError;
pub use jitter::JitterConfig;
pub use overlap::{OverlapGuard, OverlapPolicy, RunGuard};
pub use registry::{JobRegistry, JobResult, JobStatus};
pub use scheduler::{validate_cron_expression, SchedulerService};

#[cfg(feature = "jobs")]
pub use jobs::{create_sync_job, SyncJobConfig, SYNC_JOB_NAME};
