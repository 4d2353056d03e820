//! Job monitor — wraps arbitrary async actions with observability.
//!
//! Recording is transparent: `monitored_execution` returns exactly what
//! the action returned, success or failure. Outcomes land in a bounded
//! ring buffer (capacity 100, oldest evicted first) that also feeds the
//! stats and history queries. On failure the alert hook is spawned off
//! the critical path; a broken alert channel can never mask or compound
//! the original job failure.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{error, warn};

/// Ring buffer capacity: only the 100 most recent executions are kept.
pub const HISTORY_CAPACITY: usize = 100;

/// Most recent failures reported by `job_stats`.
pub const MAX_RECENT_FAILURES: usize = 10;

/// One recorded job execution. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobExecution {
    pub job_name: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub success: bool,
    pub error: Option<String>,
    pub result: Option<serde_json::Value>,
}

/// Boxed future returned by the alert hook.
pub type AlertFuture =
    std::pin::Pin<Box<dyn std::future::Future<Output = anyhow::Result<()>> + Send>>;

/// Best-effort callback invoked with every failed execution record.
pub type AlertHook = Arc<dyn Fn(JobExecution) -> AlertFuture + Send + Sync>;

/// Aggregate statistics over the retained execution history.
#[derive(Debug, Clone, Serialize)]
pub struct JobStats {
    pub total: usize,
    pub successes: usize,
    pub failures: usize,
    /// Percentage in `[0, 100]`; 0 when there are no executions.
    pub success_rate: f64,
    pub avg_duration_ms: f64,
    pub last_execution: Option<JobExecution>,
    /// Newest-first, capped at [`MAX_RECENT_FAILURES`].
    pub recent_failures: Vec<JobExecution>,
}

/// Process-local execution history and alerting for all jobs.
#[derive(Clone)]
pub struct JobMonitor {
    history: Arc<Mutex<VecDeque<JobExecution>>>,
    alert: Option<AlertHook>,
}

impl JobMonitor {
    pub fn new() -> Self {
        Self {
            history: Arc::new(Mutex::new(VecDeque::with_capacity(HISTORY_CAPACITY))),
            alert: None,
        }
    }

    /// Set the failure alert hook.
    pub fn with_alert_hook(mut self, hook: AlertHook) -> Self {
        self.alert = Some(hook);
        self
    }

    /// Run `action`, record its outcome, and hand its result straight
    /// back to the caller.
    pub async fn monitored_execution<F>(
        &self,
        job_name: &str,
        action: F,
    ) -> anyhow::Result<serde_json::Value>
    where
        F: std::future::Future<Output = anyhow::Result<serde_json::Value>>,
    {
        let started_at = Utc::now();
        let clock = Instant::now();
        let outcome = action.await;
        let finished_at = Utc::now();

        let execution = JobExecution {
            job_name: job_name.to_string(),
            started_at,
            finished_at,
            duration_ms: clock.elapsed().as_millis() as u64,
            success: outcome.is_ok(),
            error: outcome.as_ref().err().map(|e| format!("{e:#}")),
            result: outcome.as_ref().ok().cloned(),
        };
        self.record(execution).await;

        outcome
    }

    /// Append to the ring buffer and, on failure, spawn the alert hook.
    async fn record(&self, execution: JobExecution) {
        {
            let mut history = self.history.lock().await;
            history.push_back(execution.clone());
            while history.len() > HISTORY_CAPACITY {
                history.pop_front();
            }
        }

        if !execution.success {
            error!(
                job = %execution.job_name,
                error = execution.error.as_deref().unwrap_or("unknown"),
                duration_ms = execution.duration_ms,
                "job execution failed"
            );
            if let Some(hook) = &self.alert {
                let alert = hook(execution);
                tokio::spawn(async move {
                    if let Err(e) = alert.await {
                        warn!(error = %format!("{e:#}"), "alert hook failed");
                    }
                });
            }
        }
    }

    /// Most-recent-first history, optionally filtered by job name.
    pub async fn job_history(&self, limit: usize, job_name: Option<&str>) -> Vec<JobExecution> {
        let history = self.history.lock().await;
        history
            .iter()
            .rev()
            .filter(|e| job_name.is_none_or(|name| e.job_name == name))
            .take(limit)
            .cloned()
            .collect()
    }

    /// Statistics over the retained history, optionally per job.
    pub async fn job_stats(&self, job_name: Option<&str>) -> JobStats {
        let history = self.history.lock().await;
        let matching: Vec<&JobExecution> = history
            .iter()
            .filter(|e| job_name.is_none_or(|name| e.job_name == name))
            .collect();

        let total = matching.len();
        let failures = matching.iter().filter(|e| !e.success).count();
        let successes = total - failures;
        let success_rate = if total == 0 {
            0.0
        } else {
            successes as f64 / total as f64 * 100.0
        };
        let avg_duration_ms = if total == 0 {
            0.0
        } else {
            matching.iter().map(|e| e.duration_ms).sum::<u64>() as f64 / total as f64
        };
        let recent_failures = matching
            .iter()
            .rev()
            .filter(|e| !e.success)
            .take(MAX_RECENT_FAILURES)
            .map(|e| (*e).clone())
            .collect();

        JobStats {
            total,
            successes,
            failures,
            success_rate,
            avg_duration_ms,
            last_execution: matching.last().map(|e| (*e).clone()),
            recent_failures,
        }
    }
}

impl Default for JobMonitor {
    fn default() -> Self {
        Self::new()
    }
}

/// Alert hook that only logs. Real paging is an external collaborator.
pub fn log_alert_hook() -> AlertHook {
    Arc::new(|execution: JobExecution| {
        Box::pin(async move {
            error!(
                job = %execution.job_name,
                error = execution.error.as_deref().unwrap_or("unknown"),
                "job failure alert"
            );
            Ok(())
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use anyhow::anyhow;

    async fn run_ok(monitor: &JobMonitor, name: &str) {
        monitor
            .monitored_execution(name, async { Ok(serde_json::json!({"ok": true})) })
            .await
            .unwrap();
    }

    async fn run_err(monitor: &JobMonitor, name: &str) {
        let result = monitor
            .monitored_execution(name, async { Err(anyhow!("boom")) })
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn execution_is_transparent() {
        let monitor = JobMonitor::new();

        let value = monitor
            .monitored_execution("t", async { Ok(serde_json::json!(42)) })
            .await
            .unwrap();
        assert_eq!(value, serde_json::json!(42));

        let err = monitor
            .monitored_execution("t", async { Err(anyhow!("the original message")) })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("the original message"));
    }

    #[tokio::test]
    async fn records_both_outcomes() {
        let monitor = JobMonitor::new();
        run_ok(&monitor, "a").await;
        run_err(&monitor, "a").await;

        let history = monitor.job_history(10, Some("a")).await;
        assert_eq!(history.len(), 2);
        // Newest first.
        assert!(!history[0].success);
        assert_eq!(history[0].error.as_deref(), Some("boom"));
        assert!(history[1].success);
        assert_eq!(history[1].result, Some(serde_json::json!({"ok": true})));
    }

    #[tokio::test]
    async fn ring_buffer_caps_at_capacity() {
        let monitor = JobMonitor::new();
        for i in 0..150 {
            monitor
                .monitored_execution("burst", async move { Ok(serde_json::json!(i)) })
                .await
                .unwrap();
        }

        let history = monitor.job_history(1000, None).await;
        assert_eq!(history.len(), HISTORY_CAPACITY);
        // The retained 100 are the most recent: 50..150, newest first.
        assert_eq!(history[0].result, Some(serde_json::json!(149)));
        assert_eq!(history[99].result, Some(serde_json::json!(50)));
    }

    #[tokio::test]
    async fn stats_compute_success_rate() {
        let monitor = JobMonitor::new();

        // Empty history: rate is 0, not a division by zero.
        let empty = monitor.job_stats(None).await;
        assert_eq!(empty.total, 0);
        assert_eq!(empty.success_rate, 0.0);
        assert!(empty.last_execution.is_none());

        // 8 executions, 2 failures → 75%.
        for _ in 0..6 {
            run_ok(&monitor, "rate").await;
        }
        for _ in 0..2 {
            run_err(&monitor, "rate").await;
        }

        let stats = monitor.job_stats(Some("rate")).await;
        assert_eq!(stats.total, 8);
        assert_eq!(stats.successes, 6);
        assert_eq!(stats.failures, 2);
        assert!((stats.success_rate - 75.0).abs() < f64::EPSILON);
        assert!(!stats.last_execution.unwrap().success);
    }

    #[tokio::test]
    async fn recent_failures_newest_first_capped_at_ten() {
        let monitor = JobMonitor::new();
        for _ in 0..15 {
            run_err(&monitor, "flaky").await;
        }
        run_ok(&monitor, "flaky").await;

        let stats = monitor.job_stats(Some("flaky")).await;
        assert_eq!(stats.recent_failures.len(), MAX_RECENT_FAILURES);
        assert!(stats.recent_failures.iter().all(|e| !e.success));
        assert!(stats.last_execution.unwrap().success);
    }

    #[tokio::test]
    async fn history_filters_by_name_and_limit() {
        let monitor = JobMonitor::new();
        run_ok(&monitor, "a").await;
        run_ok(&monitor, "b").await;
        run_ok(&monitor, "a").await;

        assert_eq!(monitor.job_history(10, Some("a")).await.len(), 2);
        assert_eq!(monitor.job_history(10, Some("b")).await.len(), 1);
        assert_eq!(monitor.job_history(2, None).await.len(), 2);
        assert!(monitor.job_history(10, Some("missing")).await.is_empty());
    }

    #[tokio::test]
    async fn alert_hook_fires_on_failure_and_errors_are_swallowed() {
        let alerted = Arc::new(AtomicUsize::new(0));
        let counter = alerted.clone();
        let monitor = JobMonitor::new().with_alert_hook(Arc::new(move |execution| {
            let counter = counter.clone();
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
                assert_eq!(execution.job_name, "failing");
                // A broken alert channel must not propagate anywhere.
                Err(anyhow!("alert channel down"))
            })
        }));

        run_ok(&monitor, "failing").await;
        run_err(&monitor, "failing").await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        // Invoked once — only for the failure.
        assert_eq!(alerted.load(Ordering::SeqCst), 1);
    }
}
