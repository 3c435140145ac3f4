//! Tournament error types.

use super::models::{
    PlayerId, RoundId, RoundStatus, TableId, TableWinner, Team, TournamentId, TournamentStatus,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Broad classification of a [`TournamentError`], for callers that map
/// failures onto their own status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Wrong tournament/round status, too few players, missing results
    PreconditionViolation,
    /// An id did not resolve
    NotFound,
    /// Inconsistent payload: score/winner mismatch, malformed pairing edit
    ValidationConflict,
    /// The storage layer failed
    Storage,
}

/// Tournament errors
#[derive(Debug, Error)]
pub enum TournamentError {
    #[error("Tournament not found: {0}")]
    TournamentNotFound(TournamentId),

    #[error("Round not found: {0}")]
    RoundNotFound(RoundId),

    #[error("Round {number} not found in tournament {tournament}")]
    RoundNumberNotFound {
        tournament: TournamentId,
        number: i32,
    },

    #[error("Table not found: {0}")]
    TableNotFound(TableId),

    #[error("Player {player} has no entry in tournament {tournament}")]
    EntryNotFound {
        tournament: TournamentId,
        player: PlayerId,
    },

    #[error("Tournament has no rounds yet")]
    NoRounds,

    #[error("Tournament not in correct state: expected {expected}, got {actual}")]
    InvalidTournamentState {
        expected: TournamentStatus,
        actual: TournamentStatus,
    },

    #[error("Tournament is {0}")]
    TournamentClosed(TournamentStatus),

    #[error("Round not in correct state: expected {expected}, got {actual}")]
    InvalidRoundState {
        expected: RoundStatus,
        actual: RoundStatus,
    },

    #[error("Insufficient players: need {needed}, have {current}")]
    InsufficientPlayers { needed: usize, current: usize },

    #[error("Round {round} has {count} unreported table(s)")]
    UnreportedTables { round: i32, count: usize },

    #[error("Table {table} is incomplete: {team_one} vs {team_two} players")]
    IncompleteTable {
        table: i32,
        team_one: usize,
        team_two: usize,
    },

    #[error("Player already registered")]
    AlreadyRegistered,

    #[error("Entry for player {0} is already cancelled")]
    EntryAlreadyCancelled(PlayerId),

    #[error("Entry for player {0} is already active")]
    EntryAlreadyActive(PlayerId),

    #[error("Score {score_team1}-{score_team2} does not match winner {winner}")]
    ScoreMismatch {
        winner: TableWinner,
        score_team1: i32,
        score_team2: i32,
    },

    #[error("Scores must not be negative")]
    NegativeScore,

    #[error("Invalid winner code: {0}")]
    InvalidWinner(i16),

    #[error("Table {0} belongs to another round")]
    TableOutsideRound(TableId),

    #[error("Table {table} already has two players on {team}")]
    TeamFull { table: TableId, team: Team },

    #[error("Player {0} is not seated in this round")]
    PlayerNotSeated(PlayerId),

    #[error("Invalid tournament settings: {0}")]
    InvalidSettings(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl TournamentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TournamentError::TournamentNotFound(_)
            | TournamentError::RoundNotFound(_)
            | TournamentError::RoundNumberNotFound { .. }
            | TournamentError::TableNotFound(_)
            | TournamentError::EntryNotFound { .. }
            | TournamentError::NoRounds => ErrorKind::NotFound,

            TournamentError::InvalidTournamentState { .. }
            | TournamentError::TournamentClosed(_)
            | TournamentError::InvalidRoundState { .. }
            | TournamentError::InsufficientPlayers { .. }
            | TournamentError::UnreportedTables { .. }
            | TournamentError::IncompleteTable { .. }
            | TournamentError::AlreadyRegistered
            | TournamentError::EntryAlreadyCancelled(_)
            | TournamentError::EntryAlreadyActive(_) => ErrorKind::PreconditionViolation,

            TournamentError::ScoreMismatch { .. }
            | TournamentError::NegativeScore
            | TournamentError::InvalidWinner(_)
            | TournamentError::TableOutsideRound(_)
            | TournamentError::TeamFull { .. }
            | TournamentError::PlayerNotSeated(_)
            | TournamentError::InvalidSettings(_) => ErrorKind::ValidationConflict,

            TournamentError::Database(_) => ErrorKind::Storage,
        }
    }

    /// Get a client-safe error message
    ///
    /// Database errors are replaced by a generic message so SQL details never
    /// reach the caller.
    pub fn client_message(&self) -> String {
        match self {
            TournamentError::Database(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

pub type TournamentResult<T> = Result<T, TournamentError>;

/// Non-fatal failure raised while advancing a round.
///
/// Advancing keeps going when the standings of the closed round cannot be
/// computed; the failure is handed back to the caller instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputationWarning {
    pub round_number: i32,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            TournamentError::TournamentNotFound(1).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            TournamentError::UnreportedTables { round: 2, count: 1 }.kind(),
            ErrorKind::PreconditionViolation
        );
        assert_eq!(
            TournamentError::ScoreMismatch {
                winner: TableWinner::Team1,
                score_team1: 1,
                score_team2: 2,
            }
            .kind(),
            ErrorKind::ValidationConflict
        );
        assert_eq!(
            TournamentError::Database(sqlx::Error::RowNotFound).kind(),
            ErrorKind::Storage
        );
    }

    #[test]
    fn test_client_message_hides_database_details() {
        let err = TournamentError::Database(sqlx::Error::RowNotFound);
        assert_eq!(err.client_message(), "Internal server error");

        let err = TournamentError::InsufficientPlayers {
            needed: 4,
            current: 3,
        };
        assert_eq!(err.client_message(), "Insufficient players: need 4, have 3");
    }

    #[test]
    fn test_state_error_message() {
        let err = TournamentError::InvalidTournamentState {
            expected: TournamentStatus::Open,
            actual: TournamentStatus::Finished,
        };
        assert_eq!(
            err.to_string(),
            "Tournament not in correct state: expected open, got finished"
        );
    }
}
