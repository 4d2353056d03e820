//! Draft auto-finalizer.
//!
//! Past the season's draft deadline, every league still short of its
//! roster target gets its remaining picks filled deterministically: the
//! first castaway of the stable-ordered available pool, committed on
//! behalf of whoever the snake math says is up, tagged `auto_draft`.
//! Reruns are no-ops because completed leagues are excluded from
//! selection.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use tribal_core::types::*;
use tribal_state::StateStore;

use crate::board::DraftBoard;
use crate::error::{DraftError, DraftResult};
use crate::notify::Notifier;
use crate::service::spawn_notification;

#[derive(Clone)]
pub struct AutoFinalizer {
    store: StateStore,
    notifier: Arc<dyn Notifier>,
}

/// What one finalizer run did, serialized into the job result payload.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FinalizeSummary {
    /// Unfinished leagues considered this run.
    pub leagues_scanned: usize,
    /// Leagues brought to completion.
    pub leagues_completed: usize,
    /// Picks filled across all leagues.
    pub picks_filled: usize,
    /// Leagues whose pool ran out before the roster target.
    pub exhausted: Vec<LeagueId>,
}

/// Result of filling one league.
struct LeagueFill {
    filled: usize,
    completed: bool,
    exhausted: bool,
}

impl AutoFinalizer {
    pub fn new(store: StateStore, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    /// Finalize against the current wall clock.
    pub async fn run(&self) -> DraftResult<FinalizeSummary> {
        self.run_at(Utc::now()).await
    }

    /// Finalize as of `now`. Selects every unfinished league with a
    /// draft order in the active season once the draft deadline has
    /// passed; leagues without an order cannot draft and are skipped.
    pub async fn run_at(&self, now: DateTime<Utc>) -> DraftResult<FinalizeSummary> {
        let mut summary = FinalizeSummary::default();

        let Some(season) = self.store.get_active_season()? else {
            debug!("no active season; nothing to finalize");
            return Ok(summary);
        };
        if season.draft_deadline > now {
            debug!(deadline = %season.draft_deadline, "draft deadline not reached");
            return Ok(summary);
        }

        for league in self.store.list_leagues_for_season(&season.id)? {
            if league.draft_status == DraftStatus::Completed {
                continue;
            }
            if league.draft_order.is_empty() {
                warn!(league = %league.id, "league has no draft order; cannot auto-draft");
                continue;
            }
            summary.leagues_scanned += 1;

            let fill = self.fill_league(&league.id).await?;
            summary.picks_filled += fill.filled;
            if fill.completed {
                summary.leagues_completed += 1;
            }
            if fill.exhausted {
                summary.exhausted.push(league.id.clone());
            }
        }

        info!(
            scanned = summary.leagues_scanned,
            completed = summary.leagues_completed,
            picks = summary.picks_filled,
            "auto-finalize run finished"
        );
        Ok(summary)
    }

    /// Fill one league to its roster target (or pool exhaustion).
    async fn fill_league(&self, league_id: &str) -> DraftResult<LeagueFill> {
        let mut fill = LeagueFill {
            filled: 0,
            completed: false,
            exhausted: false,
        };

        loop {
            let board = DraftBoard::load(&self.store, league_id)?;
            if board.is_complete() {
                fill.completed = true;
                break;
            }
            let Some(picker) = board.current_picker.clone() else {
                break;
            };
            let Some(castaway) = board.available.first().cloned() else {
                warn!(league = %league_id, "available pool exhausted before roster target");
                fill.exhausted = true;
                break;
            };

            let outcome = self.store.submit_pick_atomic(
                league_id,
                &picker,
                &castaway,
                None,
                AcquisitionKind::AutoDraft,
            )?;
            match outcome {
                PickOutcome::Committed(receipt) => {
                    fill.filled += 1;
                    if receipt.draft_complete {
                        fill.completed = true;
                        if let Some(league) = self.store.get_league(league_id)? {
                            spawn_notification(
                                "draft_completed",
                                self.notifier.draft_completed(&league),
                            );
                        }
                        break;
                    }
                }
                // A live pick landed between the board read and the
                // commit; the next board load recomputes turn and pool.
                PickOutcome::Rejected(PickRejection::NotYourTurn { .. })
                | PickOutcome::Rejected(PickRejection::CastawayUnavailable) => {
                    debug!(league = %league_id, "auto pick lost the race; re-deriving board");
                }
                PickOutcome::Rejected(PickRejection::DraftAlreadyComplete) => {
                    fill.completed = true;
                    break;
                }
                PickOutcome::Rejected(PickRejection::LeagueNotFound) => {
                    return Err(DraftError::LeagueNotFound(league_id.to_string()));
                }
                PickOutcome::Rejected(PickRejection::OrderNotSet) => {
                    return Err(DraftError::OrderNotSet(league_id.to_string()));
                }
            }
        }

        Ok(fill)
    }
}
