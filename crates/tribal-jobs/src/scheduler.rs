//! Deadline scheduler — fires registered jobs at the right time, exactly
//! once, even as deadlines change underneath it.
//!
//! Two trigger kinds: recurring cron expressions evaluated in one
//! canonical timezone (DST comes from the tz database, never ambient
//! system time), and one-time timers derived from the active season's
//! deadline fields. One-time timers are recomputed, not mutated: arming
//! a job name aborts any previously armed timer for that name first.
//! Every firing — scheduled or manual — goes through the job monitor,
//! so history and alerting stay consistent.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use tribal_state::StateError;

use crate::deadlines::DeadlineView;
use crate::monitor::{JobExecution, JobMonitor};

/// Boxed future produced by a job action.
pub type JobFuture =
    std::pin::Pin<Box<dyn std::future::Future<Output = anyhow::Result<serde_json::Value>> + Send>>;

/// A job's action: each invocation builds a fresh future.
pub type JobAction = Arc<dyn Fn() -> JobFuture + Send + Sync>;

/// Which deadline field of the active season a one-time job keys off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadlineField {
    RegistrationClose,
    DraftOrderDeadline,
    DraftDeadline,
}

/// How a job is triggered.
#[derive(Debug, Clone)]
pub enum Trigger {
    /// Cron expression (seconds field first), evaluated in the
    /// scheduler's canonical timezone.
    Recurring(String),
    /// Single timer at a deadline instant, re-armed on deadline change.
    OneTime(DeadlineField),
}

/// A job handed to the scheduler at startup.
pub struct JobRegistration {
    pub name: String,
    pub trigger: Trigger,
    pub action: JobAction,
    pub enabled: bool,
}

/// Registry entry for one job.
struct JobEntry {
    trigger: Trigger,
    action: JobAction,
    enabled: bool,
    last_run: Option<DateTime<Utc>>,
    last_success: Option<bool>,
}

/// An armed one-time timer.
struct OneTimeSlot {
    handle: JoinHandle<()>,
    fire_at: DateTime<Utc>,
}

/// Snapshot of a registered job for status surfaces.
#[derive(Debug, Clone, Serialize)]
pub struct JobDescriptor {
    pub name: String,
    /// Human-readable trigger, e.g. `recurring(0 0 9 * * Mon)`.
    pub trigger: String,
    pub enabled: bool,
    pub last_run: Option<DateTime<Utc>>,
    pub last_success: Option<bool>,
    /// When the one-time timer is armed to fire, if armed.
    pub armed_at: Option<DateTime<Utc>>,
}

/// Errors from scheduler operations. Job *failures* are not errors here —
/// they live in the monitor's execution records.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("unknown job: {0}")]
    UnknownJob(String),

    #[error("job disabled: {0}")]
    JobDisabled(String),

    #[error("invalid cron expression for job {name}: {expr}")]
    InvalidCron { name: String, expr: String },

    #[error("invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("state store error: {0}")]
    State(#[from] StateError),
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Parse a tz-database timezone name ("America/New_York").
pub fn parse_timezone(name: &str) -> SchedulerResult<Tz> {
    name.parse::<Tz>()
        .map_err(|_| SchedulerError::InvalidTimezone(name.to_string()))
}

struct SchedulerInner {
    monitor: JobMonitor,
    deadlines: DeadlineView,
    timezone: Tz,
    jobs: RwLock<HashMap<String, JobEntry>>,
    one_time: Mutex<HashMap<String, OneTimeSlot>>,
    recurring: Mutex<Vec<JoinHandle<()>>>,
    shutdown: watch::Sender<bool>,
}

/// The scheduler. Cheap to clone; all state is shared.
#[derive(Clone)]
pub struct DeadlineScheduler {
    inner: Arc<SchedulerInner>,
}

impl DeadlineScheduler {
    pub fn new(monitor: JobMonitor, deadlines: DeadlineView, timezone: Tz) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            inner: Arc::new(SchedulerInner {
                monitor,
                deadlines,
                timezone,
                jobs: RwLock::new(HashMap::new()),
                one_time: Mutex::new(HashMap::new()),
                recurring: Mutex::new(Vec::new()),
                shutdown,
            }),
        }
    }

    pub fn monitor(&self) -> &JobMonitor {
        &self.inner.monitor
    }

    pub fn deadlines(&self) -> &DeadlineView {
        &self.inner.deadlines
    }

    /// Add a job to the registry. Call before `start()`.
    pub async fn register(&self, registration: JobRegistration) {
        let mut jobs = self.inner.jobs.write().await;
        jobs.insert(
            registration.name.clone(),
            JobEntry {
                trigger: registration.trigger,
                action: registration.action,
                enabled: registration.enabled,
                last_run: None,
                last_success: None,
            },
        );
        debug!(job = %registration.name, "job registered");
    }

    /// Start the scheduler: spawn recurring loops and arm every
    /// one-time timer from the current deadlines. Timers do not survive
    /// a restart — this re-derives all of them.
    pub async fn start(&self) -> SchedulerResult<()> {
        let recurring: Vec<(String, cron::Schedule)> = {
            let jobs = self.inner.jobs.read().await;
            let mut parsed = Vec::new();
            for (name, entry) in jobs.iter() {
                if let Trigger::Recurring(expr) = &entry.trigger {
                    let schedule =
                        cron::Schedule::from_str(expr).map_err(|_| SchedulerError::InvalidCron {
                            name: name.clone(),
                            expr: expr.clone(),
                        })?;
                    parsed.push((name.clone(), schedule));
                }
            }
            parsed
        };

        for (name, schedule) in recurring {
            let handle = self.spawn_recurring(name, schedule);
            self.inner.recurring.lock().await.push(handle);
        }

        self.refresh_deadlines().await?;
        info!(timezone = %self.inner.timezone, "deadline scheduler started");
        Ok(())
    }

    /// Stop: signal recurring loops and cancel all armed one-time timers.
    pub async fn shutdown(&self) {
        let _ = self.inner.shutdown.send(true);
        {
            let mut slots = self.inner.one_time.lock().await;
            for (_, slot) in slots.drain() {
                slot.handle.abort();
            }
        }
        {
            let mut recurring = self.inner.recurring.lock().await;
            for handle in recurring.drain(..) {
                handle.abort();
            }
        }
        info!("deadline scheduler stopped");
    }

    /// Manually trigger a job by name, through the same monitored path
    /// as scheduled firing.
    pub async fn run_job(&self, name: &str) -> SchedulerResult<JobExecution> {
        info!(job = %name, "manual job trigger");
        self.execute(name).await
    }

    /// Observe a deadline edit: drop the cached view, then re-arm.
    pub async fn deadlines_changed(&self) -> SchedulerResult<()> {
        self.inner.deadlines.invalidate().await;
        self.refresh_deadlines().await
    }

    /// Re-read the active season and re-arm every one-time job. The old
    /// timer for a name is always cancelled before the new one is armed —
    /// a stale timer firing at the old deadline is a correctness bug.
    pub async fn refresh_deadlines(&self) -> SchedulerResult<()> {
        let season = self.inner.deadlines.active_season().await?;

        let one_time_jobs: Vec<(String, DeadlineField, bool)> = {
            let jobs = self.inner.jobs.read().await;
            jobs.iter()
                .filter_map(|(name, entry)| match entry.trigger {
                    Trigger::OneTime(field) => Some((name.clone(), field, entry.enabled)),
                    Trigger::Recurring(_) => None,
                })
                .collect()
        };

        let Some(season) = season else {
            debug!("no active season; cancelling one-time timers");
            for (name, _, _) in &one_time_jobs {
                self.cancel(name).await;
            }
            return Ok(());
        };

        for (name, field, enabled) in one_time_jobs {
            if !enabled {
                self.cancel(&name).await;
                continue;
            }
            let fire_at = match field {
                DeadlineField::RegistrationClose => season.registration_close,
                DeadlineField::DraftOrderDeadline => season.draft_order_deadline,
                DeadlineField::DraftDeadline => season.draft_deadline,
            };
            self.arm(&name, fire_at).await;
        }
        Ok(())
    }

    /// Cancel the armed one-time timer for `name`, if any.
    pub async fn cancel(&self, name: &str) {
        let mut slots = self.inner.one_time.lock().await;
        if let Some(slot) = slots.remove(name) {
            slot.handle.abort();
            debug!(job = %name, "one-time timer cancelled");
        }
    }

    /// When the one-time timer for `name` is armed to fire, if armed.
    pub async fn armed_at(&self, name: &str) -> Option<DateTime<Utc>> {
        self.inner.one_time.lock().await.get(name).map(|s| s.fire_at)
    }

    /// Snapshot every registered job, sorted by name.
    pub async fn list_jobs(&self) -> Vec<JobDescriptor> {
        let slots = self.inner.one_time.lock().await;
        let jobs = self.inner.jobs.read().await;
        let mut out: Vec<JobDescriptor> = jobs
            .iter()
            .map(|(name, entry)| JobDescriptor {
                name: name.clone(),
                trigger: match &entry.trigger {
                    Trigger::Recurring(expr) => format!("recurring({expr})"),
                    Trigger::OneTime(field) => format!("one-time({field:?})"),
                },
                enabled: entry.enabled,
                last_run: entry.last_run,
                last_success: entry.last_success,
                armed_at: slots.get(name).map(|s| s.fire_at),
            })
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    /// Arm (or re-arm) the one-time timer for `name`. A deadline already
    /// in the past fires immediately; the downstream actions are
    /// idempotent, so an extra firing has no duplicate effect.
    async fn arm(&self, name: &str, fire_at: DateTime<Utc>) {
        let scheduler = self.clone();
        let job = name.to_string();
        let mut shutdown_rx = self.inner.shutdown.subscribe();
        let delay = (fire_at - Utc::now())
            .to_std()
            .unwrap_or(std::time::Duration::ZERO);

        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    scheduler.fire(&job).await;
                }
                _ = shutdown_rx.changed() => {}
            }
        });

        let mut slots = self.inner.one_time.lock().await;
        if let Some(old) = slots.insert(
            name.to_string(),
            OneTimeSlot { handle, fire_at },
        ) {
            old.handle.abort();
            debug!(job = %name, "previous one-time timer cancelled before re-arm");
        }
        debug!(job = %name, fire_at = %fire_at, "one-time timer armed");
    }

    fn spawn_recurring(&self, name: String, schedule: cron::Schedule) -> JoinHandle<()> {
        let scheduler = self.clone();
        let tz = self.inner.timezone;
        let mut shutdown_rx = self.inner.shutdown.subscribe();
        tokio::spawn(async move {
            loop {
                let Some(next) = schedule.upcoming(tz).next() else {
                    warn!(job = %name, "recurring schedule has no future fire times");
                    break;
                };
                let delay = (next.with_timezone(&Utc) - Utc::now())
                    .to_std()
                    .unwrap_or(std::time::Duration::ZERO);
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {
                        scheduler.fire(&name).await;
                    }
                    _ = shutdown_rx.changed() => break,
                }
            }
        })
    }

    /// Timer firing path. The outcome lives in the monitor's record; a
    /// failure leaves one-time timer state untouched so the next
    /// scheduled or manual invocation retries the idempotent action.
    async fn fire(&self, name: &str) {
        if let Err(e) = self.execute(name).await {
            warn!(job = %name, error = %e, "scheduled job could not run");
        }
    }

    async fn execute(&self, name: &str) -> SchedulerResult<JobExecution> {
        let action = {
            let jobs = self.inner.jobs.read().await;
            let entry = jobs
                .get(name)
                .ok_or_else(|| SchedulerError::UnknownJob(name.to_string()))?;
            if !entry.enabled {
                return Err(SchedulerError::JobDisabled(name.to_string()));
            }
            entry.action.clone()
        };

        let _ = self.inner.monitor.monitored_execution(name, action()).await;
        let execution = self
            .inner
            .monitor
            .job_history(1, Some(name))
            .await
            .into_iter()
            .next()
            .expect("execution was just recorded");

        {
            let mut jobs = self.inner.jobs.write().await;
            if let Some(entry) = jobs.get_mut(name) {
                entry.last_run = Some(execution.finished_at);
                entry.last_success = Some(execution.success);
            }
        }
        Ok(execution)
    }
}
