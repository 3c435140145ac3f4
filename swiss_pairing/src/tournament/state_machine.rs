//! Tournament and round lifecycle gates.
//!
//! Every check here is pure: the manager loads and locks the rows, then asks
//! these functions whether the requested step is legal before writing.

use super::errors::{TournamentError, TournamentResult};
use super::models::{Round, RoundStatus, Table, TableWinner, Team, TournamentStatus};

/// Fewest active entries needed to seat one table
pub const MIN_PLAYERS: usize = 4;

/// Whether a tournament may move from `from` to `to`
pub fn can_transition(from: TournamentStatus, to: TournamentStatus) -> bool {
    matches!(
        (from, to),
        (TournamentStatus::Open, TournamentStatus::InProgress)
            | (TournamentStatus::InProgress, TournamentStatus::Finished)
            | (TournamentStatus::Open, TournamentStatus::Cancelled)
    )
}

/// Status a tournament must be in before it can reach `to`
fn required_source(to: TournamentStatus) -> TournamentStatus {
    match to {
        TournamentStatus::Finished => TournamentStatus::InProgress,
        _ => TournamentStatus::Open,
    }
}

pub fn ensure_transition(from: TournamentStatus, to: TournamentStatus) -> TournamentResult<()> {
    if can_transition(from, to) {
        Ok(())
    } else {
        Err(TournamentError::InvalidTournamentState {
            expected: required_source(to),
            actual: from,
        })
    }
}

pub fn ensure_tournament_status(
    actual: TournamentStatus,
    expected: TournamentStatus,
) -> TournamentResult<()> {
    if actual == expected {
        Ok(())
    } else {
        Err(TournamentError::InvalidTournamentState { expected, actual })
    }
}

/// Entries can change at any point before the tournament is finished
pub fn ensure_entries_editable(status: TournamentStatus) -> TournamentResult<()> {
    if status == TournamentStatus::Finished {
        Err(TournamentError::TournamentClosed(status))
    } else {
        Ok(())
    }
}

pub fn ensure_round_status(round: &Round, expected: RoundStatus) -> TournamentResult<()> {
    if round.status == expected {
        Ok(())
    } else {
        Err(TournamentError::InvalidRoundState {
            expected,
            actual: round.status,
        })
    }
}

pub fn ensure_min_players(current: usize) -> TournamentResult<()> {
    if current < MIN_PLAYERS {
        Err(TournamentError::InsufficientPlayers {
            needed: MIN_PLAYERS,
            current,
        })
    } else {
        Ok(())
    }
}

/// A round can only close once every table carries a winner
pub fn ensure_all_reported(round: &Round, tables: &[Table]) -> TournamentResult<()> {
    let count = tables.iter().filter(|table| !table.is_reported()).count();
    if count > 0 {
        Err(TournamentError::UnreportedTables {
            round: round.number,
            count,
        })
    } else {
        Ok(())
    }
}

/// Every table must be 2v2 before play begins
pub fn ensure_tables_complete(tables: &[Table]) -> TournamentResult<()> {
    match tables.iter().find(|table| !table.is_complete()) {
        Some(table) => Err(TournamentError::IncompleteTable {
            table: table.number,
            team_one: table.team_size(Team::One),
            team_two: table.team_size(Team::Two),
        }),
        None => Ok(()),
    }
}

/// Check that reported scores agree with the declared winner
///
/// # Arguments
///
/// * `score_team1` - Score of team one
/// * `score_team2` - Score of team two
/// * `winner` - Declared outcome
///
/// # Returns
///
/// * `TournamentResult<()>` - Ok when the scores are non-negative and consistent
pub fn validate_result(
    score_team1: i32,
    score_team2: i32,
    winner: TableWinner,
) -> TournamentResult<()> {
    if score_team1 < 0 || score_team2 < 0 {
        return Err(TournamentError::NegativeScore);
    }

    let consistent = match winner {
        TableWinner::Draw => score_team1 == score_team2,
        TableWinner::Team1 => score_team1 > score_team2,
        TableWinner::Team2 => score_team2 > score_team1,
    };

    if consistent {
        Ok(())
    } else {
        Err(TournamentError::ScoreMismatch {
            winner,
            score_team1,
            score_team2,
        })
    }
}
