//! Scheduler service wrapper around tokio-cron-scheduler.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono_tz::Tz;
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    JitterConfig, JobRegistry, JobResult, OverlapGuard, OverlapPolicy, SchedulerConfig,
    SchedulerError,
};

const SHUTDOWN_POLL: Duration = Duration::from_millis(50);

/// Validate a 6-field cron expression (sec min hour day-of-month month day-of-week).
///
/// ```
/// use agent_scheduler::validate_cron_expression;
///
/// assert!(validate_cron_expression("0 */15 * * * *").is_ok());
/// assert!(validate_cron_expression("every quarter hour").is_err());
/// ```
pub fn validate_cron_expression(expr: &str) -> Result<(), SchedulerError> {
    match Job::new_async(expr, |_uuid, _lock| Box::pin(async {})) {
        Ok(_) => Ok(()),
        Err(e) => Err(SchedulerError::InvalidCron(format!("'{}': {}", expr, e))),
    }
}

/// Owns the cron scheduler, the shutdown token handed to jobs and the job
/// registry.
pub struct SchedulerService {
    scheduler: JobScheduler,
    config: SchedulerConfig,
    shutdown_token: CancellationToken,
    registry: Arc<JobRegistry>,
    is_running: AtomicBool,
}

impl SchedulerService {
    /// Create a stopped scheduler. Fails on an invalid default timezone.
    pub async fn new(config: SchedulerConfig) -> Result<Self, SchedulerError> {
        let _ = config.parse_timezone()?;

        let scheduler = JobScheduler::new().await?;

        Ok(Self {
            scheduler,
            config,
            shutdown_token: CancellationToken::new(),
            registry: Arc::new(JobRegistry::new()),
            is_running: AtomicBool::new(false),
        })
    }

    pub async fn start(&self) -> Result<(), SchedulerError> {
        if self.is_running.swap(true, Ordering::SeqCst) {
            return Err(SchedulerError::AlreadyRunning);
        }

        self.scheduler.start().await?;
        info!(jobs = self.registry.job_count(), "Scheduler started");

        Ok(())
    }

    /// Cancel the shutdown token, wait up to `shutdown_timeout_secs` for
    /// running jobs to finish, then stop the scheduler.
    pub async fn shutdown(&mut self) -> Result<(), SchedulerError> {
        if !self.is_running.load(Ordering::SeqCst) {
            return Err(SchedulerError::NotRunning);
        }

        info!("Initiating scheduler shutdown");
        self.shutdown_token.cancel();

        let deadline = Instant::now() + Duration::from_secs(self.config.shutdown_timeout_secs);
        while self.running_jobs() > 0 {
            if Instant::now() >= deadline {
                warn!(
                    running = self.running_jobs(),
                    "Shutdown timeout reached with jobs still running"
                );
                break;
            }
            tokio::time::sleep(SHUTDOWN_POLL).await;
        }

        if let Err(e) = self.scheduler.shutdown().await {
            warn!("Error during scheduler shutdown: {}", e);
        }

        self.is_running.store(false, Ordering::SeqCst);
        info!("Scheduler shutdown complete");

        Ok(())
    }

    fn running_jobs(&self) -> usize {
        self.registry
            .get_all_status()
            .iter()
            .filter(|s| s.is_running)
            .count()
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn registry(&self) -> Arc<JobRegistry> {
        self.registry.clone()
    }

    /// Register a named cron job.
    ///
    /// Each firing goes through the overlap guard, then the jitter delay,
    /// then `job_fn`. The outcome lands in the registry: `Ok` as success,
    /// `Err(message)` as a failure, and runs that never started as skipped.
    ///
    /// `timezone` falls back to the configured default.
    ///
    /// # Errors
    ///
    /// Invalid cron expression, unknown timezone or a name that is already
    /// registered.
    pub async fn register_job<F, Fut>(
        &self,
        name: &str,
        cron_expr: &str,
        timezone: Option<&str>,
        overlap: OverlapPolicy,
        jitter: JitterConfig,
        job_fn: F,
    ) -> Result<uuid::Uuid, SchedulerError>
    where
        F: Fn(CancellationToken) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = Result<(), String>> + Send,
    {
        let tz: Tz = match timezone {
            Some(tz_str) => Self::parse_timezone(tz_str)?,
            None => self.config.parse_timezone()?,
        };
        validate_cron_expression(cron_expr)?;
        if self.registry.is_registered(name) {
            return Err(SchedulerError::DuplicateJob(name.to_string()));
        }

        let job_name = name.to_string();
        let shutdown_token = self.shutdown_token.clone();
        let registry = self.registry.clone();
        let guard = Arc::new(OverlapGuard::new(overlap));

        let job = Job::new_async_tz(cron_expr, tz, move |_uuid, _lock| {
            let name = job_name.clone();
            let token = shutdown_token.clone();
            let registry = registry.clone();
            let guard = guard.clone();
            let job_fn = job_fn.clone();

            Box::pin(async move {
                run_job(&name, &registry, &guard, jitter, token, job_fn).await;
            })
        })
        .map_err(|e| SchedulerError::InvalidCron(e.to_string()))?;

        let uuid = self.scheduler.add(job).await?;
        if !self.registry.register(name, cron_expr) {
            return Err(SchedulerError::DuplicateJob(name.to_string()));
        }
        info!(
            job = %name,
            uuid = %uuid,
            cron = %cron_expr,
            timezone = %tz.name(),
            overlap = ?overlap,
            max_jitter_secs = jitter.max_jitter_secs,
            "Job registered"
        );

        Ok(uuid)
    }

    pub fn parse_timezone(tz_str: &str) -> Result<Tz, SchedulerError> {
        tz_str
            .parse()
            .map_err(|_| SchedulerError::InvalidTimezone(tz_str.to_string()))
    }
}

/// One firing of a registered job.
async fn run_job<F, Fut>(
    name: &str,
    registry: &JobRegistry,
    guard: &OverlapGuard,
    jitter: JitterConfig,
    token: CancellationToken,
    job_fn: F,
) where
    F: Fn(CancellationToken) -> Fut,
    Fut: Future<Output = Result<(), String>>,
{
    let Some(_run) = guard.try_acquire() else {
        info!(job = %name, "Previous run still active, skipping");
        registry.record_skipped(name, "previous run still active");
        return;
    };

    if !jitter.delay(&token).await {
        info!(job = %name, "Shutdown requested before run started");
        registry.record_skipped(name, "shutdown requested");
        return;
    }

    registry.record_start(name);
    info!(job = %name, "Job started");
    let start = Instant::now();

    let result = match job_fn(token).await {
        Ok(()) => JobResult::Success,
        Err(message) => {
            warn!(job = %name, error = %message, "Job failed");
            JobResult::Failed(message)
        }
    };

    let duration_ms = start.elapsed().as_millis() as u64;
    registry.record_complete(name, result, duration_ms);
    info!(job = %name, duration_ms, "Job completed");
}
