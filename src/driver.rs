use std::time::Duration;

use crate::foundation::error::{PackError, PackResult};
use crate::task::{OutputTask, TaskFailure, TaskHandle};

/// How the driver reacts to outputs that keep failing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Rounds with failures tolerated before giving up. `None` retries forever.
    pub max_attempts: Option<u32>,
    /// Pause between a failed round and the next one.
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn unbounded() -> Self {
        Self {
            max_attempts: None,
            ..Self::default()
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: Some(4),
            backoff: Duration::from_millis(50),
        }
    }
}

/// Summary of one [`Driver::run`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DriverReport {
    /// Rounds executed, the first one included.
    pub rounds: u32,
    /// Outputs re-run after a failure or cancellation, summed over rounds.
    pub retried: usize,
    /// Outputs that finished successfully.
    pub written: usize,
}

/// Runs sink tasks to completion, clearing and retrying whatever failed.
pub struct Driver {
    retry: RetryPolicy,
}

impl Driver {
    pub fn new(retry: RetryPolicy) -> Self {
        Self { retry }
    }

    #[tracing::instrument(skip_all, fields(outputs = outputs.len()))]
    pub async fn run(&self, outputs: &[OutputTask]) -> PackResult<DriverReport> {
        let mut report = DriverReport::default();
        let mut failed_rounds = 0u32;
        let mut working = outputs.to_vec();

        while !working.is_empty() {
            report.rounds += 1;
            let handles: Vec<_> = working.iter().map(OutputTask::start).collect();
            let outcomes =
                futures::future::join_all(handles.into_iter().map(TaskHandle::join)).await;

            let mut again = Vec::new();
            let mut failures = 0usize;
            for (task, outcome) in working.into_iter().zip(outcomes) {
                match outcome {
                    Ok(()) => report.written += 1,
                    Err(TaskFailure::Cancelled) => {
                        tracing::debug!(task = %task.name(), "output cancelled, rescheduling");
                        again.push(task);
                    }
                    Err(TaskFailure::Failed(err)) => {
                        tracing::warn!(
                            task = %task.name(),
                            error = %err,
                            cause = %err.root_cause(),
                            "output failed"
                        );
                        task.clear_failure();
                        failures += 1;
                        again.push(task);
                    }
                }
            }

            if failures > 0 {
                failed_rounds += 1;
                tracing::info!(
                    round = report.rounds,
                    failed = failures,
                    retrying = again.len(),
                    "round finished with failures"
                );
                if let Some(max) = self.retry.max_attempts
                    && failed_rounds >= max
                {
                    return Err(PackError::RetriesExhausted {
                        attempts: failed_rounds,
                        failed: failures,
                    });
                }
                if !self.retry.backoff.is_zero() {
                    tokio::time::sleep(self.retry.backoff).await;
                }
            }

            report.retried += again.len();
            working = again;
        }

        tracing::info!(
            rounds = report.rounds,
            written = report.written,
            retried = report.retried,
            "all outputs written"
        );
        Ok(report)
    }
}

#[cfg(test)]
#[path = "../tests/unit/driver.rs"]
mod tests;
