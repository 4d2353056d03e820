//! redb table definitions for the Tribal state store.
//!
//! Each table uses `&str` keys and `&[u8]` values (JSON-serialized domain
//! types). Composite keys follow the pattern `{parent_id}:{child_id}`.

use redb::TableDefinition;

/// Seasons keyed by `{season_id}`.
pub const SEASONS: TableDefinition<&str, &[u8]> = TableDefinition::new("seasons");

/// Leagues keyed by `{league_id}`.
pub const LEAGUES: TableDefinition<&str, &[u8]> = TableDefinition::new("leagues");

/// Members keyed by `{league_id}:{user_id}`.
pub const MEMBERS: TableDefinition<&str, &[u8]> = TableDefinition::new("members");

/// Castaways keyed by `{season_id}:{castaway_id}`.
pub const CASTAWAYS: TableDefinition<&str, &[u8]> = TableDefinition::new("castaways");

/// Picks keyed by `{league_id}:{pick_number:04}` so ordered iteration
/// yields commit order within a league.
pub const PICKS: TableDefinition<&str, &[u8]> = TableDefinition::new("picks");

/// Idempotency receipts keyed by `{league_id}:{token}`, written in the
/// same transaction as the pick they cover.
pub const PICK_RECEIPTS: TableDefinition<&str, &[u8]> = TableDefinition::new("pick_receipts");
