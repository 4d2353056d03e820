//! tribal-core — shared types for the Tribal draft platform.
//!
//! Holds the domain model (seasons, leagues, members, castaways, picks),
//! the pure snake-draft turn math, and the `tribal.toml` configuration
//! parser. Everything here is synchronous and free of I/O so it can be
//! used from the state store, the draft service, and the job scheduler
//! without pulling in a runtime.

pub mod config;
pub mod draft;
pub mod types;

pub use config::TribalConfig;
pub use draft::{Turn, compute_turn, is_complete, total_picks};
pub use types::*;
