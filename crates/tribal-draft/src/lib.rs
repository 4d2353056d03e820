//! tribal-draft — the draft state machine and its surroundings.
//!
//! Derives the authoritative draft view from the ordered pick log
//! (never from mutable cursors), submits picks through the atomic
//! committer in `tribal-state`, and auto-completes abandoned drafts
//! past the season deadline.
//!
//! # Architecture
//!
//! ```text
//! DraftService
//!   ├── DraftBoard (derived: status, turn, available pool)
//!   ├── StateStore::submit_pick_atomic (the only write path for picks)
//!   └── Notifier (fire-and-forget pick/completion notifications)
//!
//! AutoFinalizer
//!   └── same board + same committer, tagged auto_draft
//! ```

pub mod board;
pub mod error;
pub mod finalizer;
pub mod notify;
pub mod service;

pub use board::DraftBoard;
pub use error::{DraftError, DraftResult};
pub use finalizer::{AutoFinalizer, FinalizeSummary};
pub use notify::{LogNotifier, Notifier, NotifyFuture};
pub use service::DraftService;
