//! Random start delay for scheduled jobs.
//!
//! Several daemons sharing one schedule would otherwise hit the same
//! subgraph endpoints in the same second.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// Upper bound of the random delay applied before each run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JitterConfig {
    pub max_jitter_secs: u64,
}

impl JitterConfig {
    pub fn new(max_jitter_secs: u64) -> Self {
        Self { max_jitter_secs }
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.max_jitter_secs > 0
    }

    /// Pick a delay in `[0, max_jitter_secs)` with millisecond resolution.
    pub fn generate_jitter(&self) -> Duration {
        if !self.is_enabled() {
            return Duration::ZERO;
        }
        let max_ms = self.max_jitter_secs.saturating_mul(1000);
        Duration::from_millis(rand::rng().random_range(0..max_ms))
    }

    /// Sleep for a fresh jitter delay.
    ///
    /// Returns `false` when `cancel` fired first; the run should not start.
    pub async fn delay(&self, cancel: &CancellationToken) -> bool {
        let jitter = self.generate_jitter();
        if jitter.is_zero() {
            return !cancel.is_cancelled();
        }
        tokio::select! {
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(jitter) => true,
        }
    }
}
