//! In-process record of registered jobs and their last outcomes.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of one scheduled run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum JobResult {
    Success,
    Failed(String),
    /// The run never started (overlap or shutdown).
    Skipped(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatus {
    pub job_name: String,
    pub cron_expr: String,
    pub last_run: Option<DateTime<Utc>>,
    pub last_duration_ms: Option<u64>,
    pub last_result: Option<JobResult>,
    /// Runs that actually executed.
    pub run_count: u64,
    pub error_count: u64,
    pub skip_count: u64,
    pub is_running: bool,
}

impl JobStatus {
    pub fn new(job_name: impl Into<String>, cron_expr: impl Into<String>) -> Self {
        Self {
            job_name: job_name.into(),
            cron_expr: cron_expr.into(),
            last_run: None,
            last_duration_ms: None,
            last_result: None,
            run_count: 0,
            error_count: 0,
            skip_count: 0,
            is_running: false,
        }
    }
}

/// Thread-safe job status table shared between the scheduler and its jobs.
#[derive(Default)]
pub struct JobRegistry {
    jobs: RwLock<HashMap<String, JobStatus>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // A panicking job must not take status reporting down with it.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, JobStatus>> {
        self.jobs.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, JobStatus>> {
        self.jobs.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a job. Returns `false` if the name is already taken.
    pub fn register(&self, job_name: &str, cron_expr: &str) -> bool {
        let mut jobs = self.write();
        if jobs.contains_key(job_name) {
            return false;
        }
        jobs.insert(job_name.to_string(), JobStatus::new(job_name, cron_expr));
        true
    }

    pub fn record_start(&self, job_name: &str) {
        if let Some(status) = self.write().get_mut(job_name) {
            status.is_running = true;
            status.last_run = Some(Utc::now());
        }
    }

    pub fn record_complete(&self, job_name: &str, result: JobResult, duration_ms: u64) {
        if let Some(status) = self.write().get_mut(job_name) {
            status.is_running = false;
            status.last_duration_ms = Some(duration_ms);
            status.run_count += 1;
            if matches!(result, JobResult::Failed(_)) {
                status.error_count += 1;
            }
            status.last_result = Some(result);
        }
    }

    /// Record a run that was due but did not execute.
    pub fn record_skipped(&self, job_name: &str, reason: &str) {
        if let Some(status) = self.write().get_mut(job_name) {
            status.skip_count += 1;
            status.last_result = Some(JobResult::Skipped(reason.to_string()));
        }
    }

    pub fn get_status(&self, job_name: &str) -> Option<JobStatus> {
        self.read().get(job_name).cloned()
    }

    /// All jobs, sorted by name.
    pub fn get_all_status(&self) -> Vec<JobStatus> {
        let mut all: Vec<JobStatus> = self.read().values().cloned().collect();
        all.sort_by(|a, b| a.job_name.cmp(&b.job_name));
        all
    }

    pub fn is_registered(&self, job_name: &str) -> bool {
        self.read().contains_key(job_name)
    }

    pub fn job_count(&self) -> usize {
        self.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_rejects_duplicates() {
        let registry = JobRegistry::new();
        assert!(registry.register("agent-sync", "0 */15 * * * *"));
        assert!(!registry.register("agent-sync", "0 0 * * * *"));
        assert_eq!(registry.job_count(), 1);
        assert_eq!(
            registry.get_status("agent-sync").unwrap().cron_expr,
            "0 */15 * * * *"
        );
    }

    #[test]
    fn test_run_lifecycle() {
        let registry = JobRegistry::new();
        registry.register("agent-sync", "0 */15 * * * *");

        registry.record_start("agent-sync");
        let status = registry.get_status("agent-sync").unwrap();
        assert!(status.is_running);
        assert!(status.last_run.is_some());

        registry.record_complete("agent-sync", JobResult::Failed("no chains".into()), 12);
        registry.record_start("agent-sync");
        registry.record_complete("agent-sync", JobResult::Success, 40);

        let status = registry.get_status("agent-sync").unwrap();
        assert!(!status.is_running);
        assert_eq!(status.run_count, 2);
        assert_eq!(status.error_count, 1);
        assert_eq!(status.last_duration_ms, Some(40));
        assert_eq!(status.last_result, Some(JobResult::Success));
    }

    #[test]
    fn test_skips_do_not_count_as_runs() {
        let registry = JobRegistry::new();
        registry.register("agent-sync", "0 */15 * * * *");
        registry.record_skipped("agent-sync", "previous run still active");

        let status = registry.get_status("agent-sync").unwrap();
        assert_eq!(status.run_count, 0);
        assert_eq!(status.skip_count, 1);
        assert!(matches!(status.last_result, Some(JobResult::Skipped(_))));
    }

    #[test]
    fn test_unknown_job_is_ignored() {
        let registry = JobRegistry::new();
        registry.record_start("missing");
        registry.record_complete("missing", JobResult::Success, 1);
        assert!(!registry.is_registered("missing"));
        assert!(registry.get_all_status().is_empty());
    }

    #[test]
    fn test_all_status_sorted() {
        let registry = JobRegistry::new();
        registry.register("b", "0 0 * * * *");
        registry.register("a", "0 0 * * * *");
        let names: Vec<String> = registry
            .get_all_status()
            .into_iter()
            .map(|s| s.job_name)
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
