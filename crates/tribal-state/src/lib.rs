//! tribal-state — embedded state store for the Tribal draft core.
//!
//! Backed by [redb](https://docs.rs/redb), provides persistent and
//! in-memory state for seasons, leagues, members, castaways, and picks.
//!
//! # Architecture
//!
//! All domain types are JSON-serialized into redb's `&[u8]` value columns.
//! Composite keys (`{league_id}:{user_id}`, `{league_id}:{pick_number:04}`)
//! enable prefix scans for related records, and the zero-padded pick keys
//! make redb's ordered iteration return picks in commit order.
//!
//! The store also hosts the atomic pick committer: every precondition
//! check and the pick insert happen inside a single serializable write
//! transaction, which is what makes two concurrent submissions for the
//! same league impossible to both commit.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across async tasks.

pub mod error;
pub mod store;
pub mod tables;

pub use error::{StateError, StateResult};
pub use store::{OrderOutcome, StateStore};
