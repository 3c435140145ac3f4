//! Manual pairing edits.
//!
//! Edits are validated against the round's current tables before anything is
//! written. Only rounds still in `Pairing` accept edits; the manager checks
//! that gate.

use crate::tournament::errors::{TournamentError, TournamentResult};
use crate::tournament::models::{PlayerId, Table, TableId, Team};
use serde::{Deserialize, Serialize};

/// A change to a round's seating
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PairingEdit {
    /// Take `player` off every table of the round, then seat them at
    /// `table` on `team`. With no table the player just becomes a bye.
    Move {
        player: PlayerId,
        table: Option<TableId>,
        team: Team,
    },
    /// Switch `player` to the other side of their current table
    ChangeTeam { player: PlayerId, team: Team },
    /// Append an empty table
    AddTable,
    /// Delete a table with its seats
    RemoveTable { table: TableId },
}

/// Find the table a player sits at in this round
pub fn seat_of(tables: &[Table], player: PlayerId) -> Option<(&Table, Team)> {
    tables
        .iter()
        .find_map(|table| table.seat_of(player).map(|seat| (table, seat.team)))
}

/// Check that `player` can be moved onto `target`/`team`.
///
/// The player's own seat does not count against the team size, since a move
/// clears it first.
pub fn check_move(
    tables: &[Table],
    player: PlayerId,
    target: TableId,
    team: Team,
) -> TournamentResult<()> {
    let table = tables
        .iter()
        .find(|table| table.id == target)
        .ok_or(TournamentError::TableOutsideRound(target))?;

    let occupied = table
        .seats
        .iter()
        .filter(|seat| seat.team == team && seat.player_id != player)
        .count();

    if occupied >= 2 {
        return Err(TournamentError::TeamFull {
            table: target,
            team,
        });
    }

    Ok(())
}

/// Check a team change, returning the player's table.
///
/// Changing to the team the player is already on is accepted.
pub fn check_change_team(
    tables: &[Table],
    player: PlayerId,
    team: Team,
) -> TournamentResult<TableId> {
    let (table, current) =
        seat_of(tables, player).ok_or(TournamentError::PlayerNotSeated(player))?;

    if current != team && table.team_size(team) >= 2 {
        return Err(TournamentError::TeamFull {
            table: table.id,
            team,
        });
    }

    Ok(table.id)
}

/// Number for a table appended to the round
pub fn next_table_number(tables: &[Table]) -> i32 {
    tables.iter().map(|table| table.number).max().unwrap_or(0) + 1
}
