//! Domain types for the Tribal draft platform.
//!
//! These types represent the persisted state of seasons, leagues, members,
//! castaways, and picks. All types are serializable to/from JSON for
//! storage in redb tables.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for a season.
pub type SeasonId = String;

/// Unique identifier for a league.
pub type LeagueId = String;

/// Unique identifier for a user.
pub type UserId = String;

/// Unique identifier for a castaway (season-scoped).
pub type CastawayId = String;

/// Castaways drafted per member. A league's draft is complete when the
/// pick count reaches `member_count * ROSTER_SIZE`.
pub const ROSTER_SIZE: u32 = 2;

// ── Season ────────────────────────────────────────────────────────

/// A season of the show, with the three administrator-mutated deadlines
/// the scheduler keys off.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Season {
    pub id: SeasonId,
    /// Season number as aired.
    pub number: u32,
    /// When league signups close.
    pub registration_close: DateTime<Utc>,
    /// When commissioners must have submitted a draft order.
    pub draft_order_deadline: DateTime<Utc>,
    /// When all drafts must be complete.
    pub draft_deadline: DateTime<Utc>,
    /// Exactly one season is active at a time.
    pub is_active: bool,
}

// ── League ────────────────────────────────────────────────────────

/// Draft lifecycle of a league.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftStatus {
    /// No draft order yet, or order set but zero picks.
    Pending,
    /// At least one pick recorded, draft not yet complete.
    InProgress,
    /// Pick count reached the roster target.
    Completed,
}

/// A league drafting within one season.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct League {
    pub id: LeagueId,
    pub season_id: SeasonId,
    pub name: String,
    pub commissioner: UserId,
    pub draft_status: DraftStatus,
    /// Ordered member user ids. Set once before drafting starts,
    /// immutable once a pick exists.
    pub draft_order: Vec<UserId>,
    /// Set when the draft completes — the league is in live play.
    pub live: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A (league, user) membership. `draft_position` is assigned (1-based)
/// when the league's draft order is set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Member {
    pub league_id: LeagueId,
    pub user_id: UserId,
    pub draft_position: Option<u32>,
}

// ── Castaway ──────────────────────────────────────────────────────

/// Lifecycle state of a castaway on the show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CastawayStatus {
    Active,
    Eliminated,
}

/// A draftable castaway within one season.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Castaway {
    pub id: CastawayId,
    pub season_id: SeasonId,
    pub name: String,
    pub status: CastawayStatus,
}

// ── Picks ─────────────────────────────────────────────────────────

/// How a pick entered the roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcquisitionKind {
    /// Submitted by the member during the live draft.
    Draft,
    /// Filled by the auto-finalizer after the draft deadline.
    AutoDraft,
}

/// One committed pick. `pick_number` is 0-based and unique per league;
/// round and picker are never stored — they are recomputed from
/// `pick_number` and the order length so they cannot drift.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PickRecord {
    pub league_id: LeagueId,
    pub user_id: UserId,
    pub castaway_id: CastawayId,
    pub pick_number: u32,
    pub acquired_via: AcquisitionKind,
    pub created_at: DateTime<Utc>,
}

/// Outcome of a successful pick commit. Also stored as the idempotency
/// receipt so a retried submission replays the original result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PickReceipt {
    pub round: u32,
    pub pick_number: u32,
    pub draft_complete: bool,
    /// `None` once the draft is complete.
    pub next_picker: Option<UserId>,
}

/// Typed refusal from the atomic pick committer. Never partially
/// commits; distinguishable so callers can map to user-facing messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickRejection {
    LeagueNotFound,
    OrderNotSet,
    NotYourTurn { expected: UserId },
    CastawayUnavailable,
    DraftAlreadyComplete,
}

/// Result of the atomic pick commit.
#[derive(Debug, Clone, PartialEq)]
pub enum PickOutcome {
    Committed(PickReceipt),
    Rejected(PickRejection),
}

// ── Table keys ────────────────────────────────────────────────────

impl Member {
    /// Build the composite key for the members table.
    pub fn table_key(&self) -> String {
        format!("{}:{}", self.league_id, self.user_id)
    }
}

impl Castaway {
    /// Build the composite key for the castaways table.
    pub fn table_key(&self) -> String {
        format!("{}:{}", self.season_id, self.id)
    }
}

impl PickRecord {
    /// Build the composite key for the picks table. The pick number is
    /// zero-padded so redb's ordered iteration yields commit order.
    pub fn table_key(&self) -> String {
        pick_key(&self.league_id, self.pick_number)
    }
}

/// Composite key for a pick: `{league_id}:{pick_number:04}`.
pub fn pick_key(league_id: &str, pick_number: u32) -> String {
    format!("{league_id}:{pick_number:04}")
}
