//! Draft error types.

use thiserror::Error;

use tribal_core::types::{CastawayId, LeagueId, UserId};
use tribal_state::StateError;

/// Result type alias for draft operations.
pub type DraftResult<T> = Result<T, DraftError>;

/// Errors surfaced by draft operations.
///
/// The turn/ordering variants map one-to-one onto the committer's typed
/// rejections so callers can produce the right user-facing message; the
/// `State` variant carries infrastructure failures.
#[derive(Debug, Error)]
pub enum DraftError {
    #[error("league not found: {0}")]
    LeagueNotFound(LeagueId),

    #[error("draft order not set for league {0}")]
    OrderNotSet(LeagueId),

    #[error("not your turn: the next pick belongs to {expected}")]
    NotYourTurn { expected: UserId },

    #[error("castaway unavailable: {0}")]
    CastawayUnavailable(CastawayId),

    #[error("draft already complete for league {0}")]
    DraftAlreadyComplete(LeagueId),

    #[error("draft already started for league {0}")]
    DraftStarted(LeagueId),

    #[error("league {0} has no members to order")]
    EmptyOrder(LeagueId),

    #[error("state store error: {0}")]
    State(#[from] StateError),
}
