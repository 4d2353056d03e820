//! tribal-jobs — deadline-driven scheduling with monitored execution.
//!
//! Fires actions at the right time, exactly once, even as the underlying
//! deadlines change: one-time timers are recomputed (cancel old, arm new)
//! whenever a deadline moves, recurring triggers evaluate cron
//! expressions in one canonical timezone, and every invocation — timer
//! or manual — runs through the job monitor's bounded execution history.
//!
//! # Architecture
//!
//! ```text
//! DeadlineScheduler
//!   ├── registry: name → { trigger, action, enabled }
//!   ├── one-time slots: name → armed timer (abort-before-rearm)
//!   ├── recurring loops: cron::Schedule in the canonical tz
//!   └── DeadlineView (cached active season, explicit invalidation)
//!
//! JobMonitor
//!   ├── monitored_execution() — transparent wrapper, records outcome
//!   ├── ring buffer (capacity 100, FIFO eviction)
//!   └── alert hook on failure (spawned, errors swallowed)
//! ```

pub mod deadlines;
pub mod jobs;
pub mod monitor;
pub mod scheduler;

pub use deadlines::DeadlineView;
pub use jobs::{JOB_DRAFT_REMINDER, JOB_FINALIZE_DRAFTS, JOB_RANDOMIZE_ORDERS, job_table};
pub use monitor::{AlertHook, JobExecution, JobMonitor, JobStats, log_alert_hook};
pub use scheduler::{
    DeadlineField, DeadlineScheduler, JobAction, JobDescriptor, JobRegistration,
    SchedulerError, SchedulerResult, Trigger, parse_timezone,
};
