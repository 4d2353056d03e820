//! StateStore — redb-backed state persistence for the Tribal draft core.
//!
//! Provides typed CRUD over seasons, leagues, members, castaways, and
//! picks, plus the atomic pick committer. All values are JSON-serialized
//! into redb's `&[u8]` value columns. The store supports both on-disk and
//! in-memory backends (the latter for testing).
//!
//! The pick committer is the only path that creates a pick record. Every
//! precondition (league exists, order set, draft not complete, caller's
//! turn, castaway available, idempotency replay) is evaluated inside the
//! same write transaction as the insert. redb write transactions are
//! serializable and single-writer, so of two concurrent submissions for
//! one league exactly one observes `current_picker == self`.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use redb::{Database, ReadableDatabase, ReadableTable, WriteTransaction};
use tracing::debug;

use tribal_core::draft::{compute_turn, is_complete};
use tribal_core::types::*;

use crate::error::{StateError, StateResult};
use crate::tables::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(SEASONS).map_err(map_err!(Table))?;
        txn.open_table(LEAGUES).map_err(map_err!(Table))?;
        txn.open_table(MEMBERS).map_err(map_err!(Table))?;
        txn.open_table(CASTAWAYS).map_err(map_err!(Table))?;
        txn.open_table(PICKS).map_err(map_err!(Table))?;
        txn.open_table(PICK_RECEIPTS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Seasons ────────────────────────────────────────────────────

    /// Insert or update a season.
    pub fn put_season(&self, season: &Season) -> StateResult<()> {
        let value = serde_json::to_vec(season).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(SEASONS).map_err(map_err!(Table))?;
            table
                .insert(season.id.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(season = %season.id, "season stored");
        Ok(())
    }

    /// Get a season by id.
    pub fn get_season(&self, season_id: &str) -> StateResult<Option<Season>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(SEASONS).map_err(map_err!(Table))?;
        match table.get(season_id).map_err(map_err!(Read))? {
            Some(guard) => {
                let season: Season =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(season))
            }
            None => Ok(None),
        }
    }

    /// Get the single active season, if any.
    pub fn get_active_season(&self) -> StateResult<Option<Season>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(SEASONS).map_err(map_err!(Table))?;
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let season: Season =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            if season.is_active {
                return Ok(Some(season));
            }
        }
        Ok(None)
    }

    // ── Leagues ────────────────────────────────────────────────────

    /// Insert or update a league.
    pub fn put_league(&self, league: &League) -> StateResult<()> {
        let value = serde_json::to_vec(league).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(LEAGUES).map_err(map_err!(Table))?;
            table
                .insert(league.id.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(league = %league.id, "league stored");
        Ok(())
    }

    /// Get a league by id.
    pub fn get_league(&self, league_id: &str) -> StateResult<Option<League>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(LEAGUES).map_err(map_err!(Table))?;
        match table.get(league_id).map_err(map_err!(Read))? {
            Some(guard) => {
                let league: League =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(league))
            }
            None => Ok(None),
        }
    }

    /// List all leagues belonging to a season.
    pub fn list_leagues_for_season(&self, season_id: &str) -> StateResult<Vec<League>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(LEAGUES).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let league: League =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            if league.season_id == season_id {
                results.push(league);
            }
        }
        Ok(results)
    }

    /// Assign (or re-assign) a league's draft order and the members'
    /// 1-based draft positions in one transaction.
    ///
    /// Allowed only while the league is `pending` with zero picks — the
    /// order is immutable once drafting has started.
    pub fn assign_draft_order(&self, league_id: &str, order: &[UserId]) -> StateResult<OrderOutcome> {
        if order.is_empty() {
            return Ok(OrderOutcome::EmptyOrder);
        }
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let outcome = stage_order(&txn, league_id, order)?;
        match outcome {
            OrderOutcome::Assigned => {
                txn.commit().map_err(map_err!(Transaction))?;
                debug!(league = %league_id, members = order.len(), "draft order assigned");
            }
            _ => {
                txn.abort().map_err(map_err!(Transaction))?;
            }
        }
        Ok(outcome)
    }

    // ── Members ────────────────────────────────────────────────────

    /// Insert or update a member.
    pub fn put_member(&self, member: &Member) -> StateResult<()> {
        let key = member.table_key();
        let value = serde_json::to_vec(member).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(MEMBERS).map_err(map_err!(Table))?;
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// List all members of a league.
    pub fn list_members_for_league(&self, league_id: &str) -> StateResult<Vec<Member>> {
        let prefix = format!("{league_id}:");
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(MEMBERS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (key, value) = entry.map_err(map_err!(Read))?;
            if key.value().starts_with(&prefix) {
                let member: Member =
                    serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
                results.push(member);
            }
        }
        Ok(results)
    }

    // ── Castaways ──────────────────────────────────────────────────

    /// Insert or update a castaway.
    pub fn put_castaway(&self, castaway: &Castaway) -> StateResult<()> {
        let key = castaway.table_key();
        let value = serde_json::to_vec(castaway).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(CASTAWAYS).map_err(map_err!(Table))?;
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// List all castaways in a season.
    pub fn list_castaways_for_season(&self, season_id: &str) -> StateResult<Vec<Castaway>> {
        let prefix = format!("{season_id}:");
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(CASTAWAYS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (key, value) = entry.map_err(map_err!(Read))?;
            if key.value().starts_with(&prefix) {
                let castaway: Castaway =
                    serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
                results.push(castaway);
            }
        }
        Ok(results)
    }

    // ── Picks ──────────────────────────────────────────────────────

    /// List a league's picks in commit order (the zero-padded pick key
    /// makes redb iteration order the commit order).
    pub fn list_picks_for_league(&self, league_id: &str) -> StateResult<Vec<PickRecord>> {
        let prefix = format!("{league_id}:");
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(PICKS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (key, value) = entry.map_err(map_err!(Read))?;
            if key.value().starts_with(&prefix) {
                let pick: PickRecord =
                    serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
                results.push(pick);
            }
        }
        Ok(results)
    }

    /// Atomically validate and commit one pick.
    ///
    /// This is the only path that creates a pick record. Preconditions and
    /// the insert share a single serializable write transaction, so a
    /// rejected submission commits nothing and a given `pick_number` can
    /// exist at most once per league.
    ///
    /// With an idempotency `token`, a retried submission that already
    /// committed replays the original receipt without a second record.
    pub fn submit_pick_atomic(
        &self,
        league_id: &str,
        user_id: &str,
        castaway_id: &str,
        token: Option<&str>,
        acquired_via: AcquisitionKind,
    ) -> StateResult<PickOutcome> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let staged = stage_pick(&txn, league_id, user_id, castaway_id, token, acquired_via)?;
        match staged {
            Staged::Fresh(receipt) => {
                txn.commit().map_err(map_err!(Transaction))?;
                debug!(
                    league = %league_id,
                    user = %user_id,
                    castaway = %castaway_id,
                    pick = receipt.pick_number,
                    complete = receipt.draft_complete,
                    "pick committed"
                );
                Ok(PickOutcome::Committed(receipt))
            }
            Staged::Replay(receipt) => {
                txn.abort().map_err(map_err!(Transaction))?;
                debug!(league = %league_id, user = %user_id, "pick replayed from idempotency receipt");
                Ok(PickOutcome::Committed(receipt))
            }
            Staged::Rejected(rejection) => {
                txn.abort().map_err(map_err!(Transaction))?;
                Ok(PickOutcome::Rejected(rejection))
            }
        }
    }
}

/// Outcome of a draft-order assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderOutcome {
    Assigned,
    LeagueNotFound,
    /// A pick exists or the draft has been started — the order is frozen.
    DraftStarted,
    EmptyOrder,
}

/// Staged result of a pick evaluation inside a write transaction.
enum Staged {
    /// New pick written; the transaction must be committed.
    Fresh(PickReceipt),
    /// Idempotency token already covered; nothing written.
    Replay(PickReceipt),
    /// Precondition failed; nothing written.
    Rejected(PickRejection),
}

/// Evaluate every pick precondition and, when they hold, stage the pick
/// and its league/receipt updates inside `txn`.
fn stage_pick(
    txn: &WriteTransaction,
    league_id: &str,
    user_id: &str,
    castaway_id: &str,
    token: Option<&str>,
    acquired_via: AcquisitionKind,
) -> StateResult<Staged> {
    let mut receipts = txn.open_table(PICK_RECEIPTS).map_err(map_err!(Table))?;
    if let Some(tok) = token {
        let key = format!("{league_id}:{tok}");
        if let Some(guard) = receipts.get(key.as_str()).map_err(map_err!(Read))? {
            let receipt: PickReceipt =
                serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
            return Ok(Staged::Replay(receipt));
        }
    }

    let mut leagues = txn.open_table(LEAGUES).map_err(map_err!(Table))?;
    let mut league: League = match leagues.get(league_id).map_err(map_err!(Read))? {
        Some(guard) => serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?,
        None => return Ok(Staged::Rejected(PickRejection::LeagueNotFound)),
    };
    if league.draft_order.is_empty() {
        return Ok(Staged::Rejected(PickRejection::OrderNotSet));
    }
    let total_members = league.draft_order.len() as u32;

    let mut picks = txn.open_table(PICKS).map_err(map_err!(Table))?;
    let prefix = format!("{league_id}:");
    let mut pick_count: u32 = 0;
    let mut picked: HashSet<CastawayId> = HashSet::new();
    for entry in picks.iter().map_err(map_err!(Read))? {
        let (key, value) = entry.map_err(map_err!(Read))?;
        if !key.value().starts_with(&prefix) {
            continue;
        }
        let pick: PickRecord =
            serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
        picked.insert(pick.castaway_id);
        pick_count += 1;
    }

    if league.draft_status == DraftStatus::Completed || is_complete(pick_count, total_members) {
        return Ok(Staged::Rejected(PickRejection::DraftAlreadyComplete));
    }

    let turn = compute_turn(pick_count, total_members);
    let expected = league.draft_order[turn.picker_index as usize].clone();
    if expected != user_id {
        return Ok(Staged::Rejected(PickRejection::NotYourTurn { expected }));
    }

    // Available pool = all castaways for the season minus picked ids.
    let castaways = txn.open_table(CASTAWAYS).map_err(map_err!(Table))?;
    let castaway_key = format!("{}:{}", league.season_id, castaway_id);
    let in_season = castaways
        .get(castaway_key.as_str())
        .map_err(map_err!(Read))?
        .is_some();
    if !in_season || picked.contains(castaway_id) {
        return Ok(Staged::Rejected(PickRejection::CastawayUnavailable));
    }

    let pick = PickRecord {
        league_id: league_id.to_string(),
        user_id: user_id.to_string(),
        castaway_id: castaway_id.to_string(),
        pick_number: pick_count,
        acquired_via,
        created_at: Utc::now(),
    };
    let pick_value = serde_json::to_vec(&pick).map_err(map_err!(Serialize))?;
    picks
        .insert(pick.table_key().as_str(), pick_value.as_slice())
        .map_err(map_err!(Write))?;

    let new_count = pick_count + 1;
    let draft_complete = is_complete(new_count, total_members);
    league.draft_status = if draft_complete {
        DraftStatus::Completed
    } else {
        DraftStatus::InProgress
    };
    if draft_complete {
        league.live = true;
    }
    league.updated_at = Utc::now();
    let league_value = serde_json::to_vec(&league).map_err(map_err!(Serialize))?;
    leagues
        .insert(league_id, league_value.as_slice())
        .map_err(map_err!(Write))?;

    let next_picker = if draft_complete {
        None
    } else {
        let next = compute_turn(new_count, total_members);
        Some(league.draft_order[next.picker_index as usize].clone())
    };

    let receipt = PickReceipt {
        round: turn.round,
        pick_number: pick_count,
        draft_complete,
        next_picker,
    };
    if let Some(tok) = token {
        let key = format!("{league_id}:{tok}");
        let value = serde_json::to_vec(&receipt).map_err(map_err!(Serialize))?;
        receipts
            .insert(key.as_str(), value.as_slice())
            .map_err(map_err!(Write))?;
    }

    Ok(Staged::Fresh(receipt))
}

/// Stage a draft-order assignment: league must exist, be `pending`, and
/// have zero picks. Writes the order and the members' positions.
fn stage_order(txn: &WriteTransaction, league_id: &str, order: &[UserId]) -> StateResult<OrderOutcome> {
    let mut leagues = txn.open_table(LEAGUES).map_err(map_err!(Table))?;
    let mut league: League = match leagues.get(league_id).map_err(map_err!(Read))? {
        Some(guard) => serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?,
        None => return Ok(OrderOutcome::LeagueNotFound),
    };
    if league.draft_status != DraftStatus::Pending {
        return Ok(OrderOutcome::DraftStarted);
    }

    let picks = txn.open_table(PICKS).map_err(map_err!(Table))?;
    let prefix = format!("{league_id}:");
    for entry in picks.iter().map_err(map_err!(Read))? {
        let (key, _) = entry.map_err(map_err!(Read))?;
        if key.value().starts_with(&prefix) {
            return Ok(OrderOutcome::DraftStarted);
        }
    }

    league.draft_order = order.to_vec();
    league.updated_at = Utc::now();
    let league_value = serde_json::to_vec(&league).map_err(map_err!(Serialize))?;
    leagues
        .insert(league_id, league_value.as_slice())
        .map_err(map_err!(Write))?;

    let mut members = txn.open_table(MEMBERS).map_err(map_err!(Table))?;
    for (index, user_id) in order.iter().enumerate() {
        let member = Member {
            league_id: league_id.to_string(),
            user_id: user_id.clone(),
            draft_position: Some(index as u32 + 1),
        };
        let value = serde_json::to_vec(&member).map_err(map_err!(Serialize))?;
        members
            .insert(member.table_key().as_str(), value.as_slice())
            .map_err(map_err!(Write))?;
    }

    Ok(OrderOutcome::Assigned)
}
