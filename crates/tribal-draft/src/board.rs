//! Derived draft view.
//!
//! The board is recomputed from the committed pick log on every load —
//! there is no stored cursor to drift out of sync.

use std::collections::HashSet;

use tribal_core::draft::{compute_turn, is_complete};
use tribal_core::types::*;
use tribal_state::StateStore;

use crate::error::{DraftError, DraftResult};

/// Snapshot of a league's draft, derived from committed data.
#[derive(Debug, Clone)]
pub struct DraftBoard {
    pub league_id: LeagueId,
    pub season_id: SeasonId,
    pub status: DraftStatus,
    pub total_members: u32,
    pub pick_count: u32,
    /// Current round, `None` when the order is unset or the draft is done.
    pub round: Option<u32>,
    /// Whose turn it is, `None` when the order is unset or the draft is done.
    pub current_picker: Option<UserId>,
    /// Unpicked castaway ids in stable (sorted) order, so the
    /// auto-finalizer's choices are reproducible.
    pub available: Vec<CastawayId>,
    pub picks: Vec<PickRecord>,
}

impl DraftBoard {
    /// Derive the board for a league from the store.
    pub fn load(store: &StateStore, league_id: &str) -> DraftResult<Self> {
        let league = store
            .get_league(league_id)?
            .ok_or_else(|| DraftError::LeagueNotFound(league_id.to_string()))?;
        let picks = store.list_picks_for_league(league_id)?;
        let castaways = store.list_castaways_for_season(&league.season_id)?;

        let picked: HashSet<&str> = picks.iter().map(|p| p.castaway_id.as_str()).collect();
        let mut available: Vec<CastawayId> = castaways
            .into_iter()
            .map(|c| c.id)
            .filter(|id| !picked.contains(id.as_str()))
            .collect();
        available.sort();

        let total_members = league.draft_order.len() as u32;
        let pick_count = picks.len() as u32;

        let (round, current_picker) =
            if total_members == 0 || is_complete(pick_count, total_members) {
                (None, None)
            } else {
                let turn = compute_turn(pick_count, total_members);
                (
                    Some(turn.round),
                    Some(league.draft_order[turn.picker_index as usize].clone()),
                )
            };

        Ok(Self {
            league_id: league.id,
            season_id: league.season_id,
            status: league.draft_status,
            total_members,
            pick_count,
            round,
            current_picker,
            available,
            picks,
        })
    }

    pub fn is_complete(&self) -> bool {
        self.status == DraftStatus::Completed
    }
}
