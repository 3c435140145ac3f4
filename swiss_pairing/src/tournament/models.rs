//! Tournament data models for Swiss 2v2 tournaments.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Tournament ID type
pub type TournamentId = i64;

/// Entry ID type
pub type EntryId = i64;

/// Round ID type
pub type RoundId = i64;

/// Table ID type
pub type TableId = i64;

/// Player identifier.
///
/// Players live in the surrounding account system; the engine only ever sees
/// their numeric id, wrapped so per-player maps cannot be keyed by some other
/// kind of id by accident.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct PlayerId(pub i64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for PlayerId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Points awarded per match outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoringRule {
    pub win: i32,
    pub draw: i32,
    pub loss: i32,
    pub bye: i32,
}

impl ScoringRule {
    /// Points for team one and team two given a reported winner
    pub fn points_for(&self, winner: TableWinner) -> (i32, i32) {
        match winner {
            TableWinner::Draw => (self.draw, self.draw),
            TableWinner::Team1 => (self.win, self.loss),
            TableWinner::Team2 => (self.loss, self.win),
        }
    }
}

impl Default for ScoringRule {
    fn default() -> Self {
        Self {
            win: 3,
            draw: 1,
            loss: 0,
            bye: 3,
        }
    }
}

/// Tournament status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TournamentStatus {
    /// Accepting entries
    Open,
    /// Rounds are being played
    InProgress,
    /// Final ranking produced
    Finished,
    /// Cancelled before it started
    Cancelled,
}

impl TournamentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::InProgress => "in_progress",
            Self::Finished => "finished",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "open" => Some(Self::Open),
            "in_progress" => Some(Self::InProgress),
            "finished" => Some(Self::Finished),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for TournamentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tournament
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tournament {
    pub id: TournamentId,
    pub name: String,
    pub scoring: ScoringRule,
    /// Planned number of rounds, informational only
    pub round_count: Option<u32>,
    pub status: TournamentStatus,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Parameters for a new tournament
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTournament {
    pub name: String,
    pub scoring: ScoringRule,
    pub round_count: Option<u32>,
}

impl NewTournament {
    /// Tournament with the default 3/1/0/3 scoring
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scoring: ScoringRule::default(),
            round_count: None,
        }
    }

    pub fn with_scoring(mut self, scoring: ScoringRule) -> Self {
        self.scoring = scoring;
        self
    }

    pub fn with_round_count(mut self, rounds: u32) -> Self {
        self.round_count = Some(rounds);
        self
    }
}

/// Entry status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryStatus {
    Active,
    Cancelled,
}

impl EntryStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(Self::Active),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// One stretch of time a player spent withdrawn from a tournament
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Absence {
    pub left_at: DateTime<Utc>,
    /// `None` while the player is still away
    pub rejoined_at: Option<DateTime<Utc>>,
}

impl Absence {
    /// Whether `instant` falls inside the absence
    pub fn covers(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.left_at && self.rejoined_at.is_none_or(|rejoined| instant < rejoined)
    }
}

/// A player's registration in a tournament.
///
/// Entries are never deleted. Every withdrawal appends an [`Absence`] that is
/// closed when the player comes back, so the entry's activity at any past
/// instant can still be answered when old rounds are re-ranked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    pub id: EntryId,
    pub tournament_id: TournamentId,
    pub player_id: PlayerId,
    pub status: EntryStatus,
    pub joined_at: DateTime<Utc>,
    /// Withdrawals in the order they happened
    pub absences: Vec<Absence>,
}

impl Entry {
    pub fn is_active(&self) -> bool {
        self.status == EntryStatus::Active
    }

    /// Whether the entry counted as active at `instant`
    pub fn is_active_at(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.joined_at && !self.absences.iter().any(|absence| absence.covers(instant))
    }
}

/// Round status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundStatus {
    /// Tables are being assigned, results cannot be reported yet
    Pairing,
    /// Tables are playing and accept result reports
    InProgress,
    /// Results are final
    Finished,
}

impl RoundStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pairing => "pairing",
            Self::InProgress => "in_progress",
            Self::Finished => "finished",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pairing" => Some(Self::Pairing),
            "in_progress" => Some(Self::InProgress),
            "finished" => Some(Self::Finished),
            _ => None,
        }
    }
}

impl fmt::Display for RoundStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Round
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Round {
    pub id: RoundId,
    pub tournament_id: TournamentId,
    /// 1-based, unique per tournament
    pub number: i32,
    pub status: RoundStatus,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Round {
    /// Instant whose active entries make up the round's roster
    ///
    /// A finished round is judged when it finished, so players back before
    /// the end are ranked and owed a bye. An open round uses the present.
    pub fn roster_at(&self) -> DateTime<Utc> {
        self.finished_at.unwrap_or_else(Utc::now)
    }
}

/// Side of a table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Team {
    One,
    Two,
}

impl Team {
    pub fn as_i16(self) -> i16 {
        match self {
            Self::One => 1,
            Self::Two => 2,
        }
    }

    pub fn from_i16(value: i16) -> Option<Self> {
        match value {
            1 => Some(Self::One),
            2 => Some(Self::Two),
            _ => None,
        }
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "team {}", self.as_i16())
    }
}

/// Reported outcome of a table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableWinner {
    Draw,
    Team1,
    Team2,
}

impl TableWinner {
    pub fn as_i16(self) -> i16 {
        match self {
            Self::Draw => 0,
            Self::Team1 => 1,
            Self::Team2 => 2,
        }
    }

    pub fn from_i16(value: i16) -> Option<Self> {
        match value {
            0 => Some(Self::Draw),
            1 => Some(Self::Team1),
            2 => Some(Self::Team2),
            _ => None,
        }
    }
}

impl fmt::Display for TableWinner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Draw => f.write_str("draw"),
            Self::Team1 => f.write_str("team 1"),
            Self::Team2 => f.write_str("team 2"),
        }
    }
}

/// Seat assignment of one player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSeat {
    pub player_id: PlayerId,
    pub team: Team,
}

/// A single 2v2 match within a round
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    pub id: TableId,
    pub round_id: RoundId,
    /// 1-based, unique per round
    pub number: i32,
    /// `None` until a result is reported
    pub winner: Option<TableWinner>,
    pub score_team1: i32,
    pub score_team2: i32,
    pub seats: Vec<TableSeat>,
}

impl Table {
    pub fn players_on(&self, team: Team) -> Vec<PlayerId> {
        self.seats
            .iter()
            .filter(|seat| seat.team == team)
            .map(|seat| seat.player_id)
            .collect()
    }

    pub fn team_size(&self, team: Team) -> usize {
        self.seats.iter().filter(|seat| seat.team == team).count()
    }

    /// Exactly two seats per team
    pub fn is_complete(&self) -> bool {
        self.seats.len() == 4 && self.team_size(Team::One) == 2 && self.team_size(Team::Two) == 2
    }

    pub fn is_reported(&self) -> bool {
        self.winner.is_some()
    }

    pub fn seat_of(&self, player: PlayerId) -> Option<&TableSeat> {
        self.seats.iter().find(|seat| seat.player_id == player)
    }
}

/// Tie-break metrics of one ranking row, already rounded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TieBreakers {
    /// MW%
    pub match_win: Decimal,
    /// OMW%
    pub opponent_match_win: Decimal,
    /// PMW%
    pub partner_match_win: Decimal,
    /// OMW% - PMW%
    pub balance: Decimal,
}

/// One line of a standings list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankingRow {
    /// 1-based
    pub position: u32,
    pub player_id: PlayerId,
    pub points: i64,
    /// `None` for provisional, points-only standings
    pub tie_breakers: Option<TieBreakers>,
}

/// Cached standings of a tournament after one round.
///
/// Derived data: rows are replaced wholesale whenever the round is ranked
/// again and can be dropped at any time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandingsSnapshot {
    pub tournament_id: TournamentId,
    pub round_number: i32,
    pub computed_at: DateTime<Utc>,
    pub rows: Vec<RankingRow>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn entry(joined: DateTime<Utc>) -> Entry {
        Entry {
            id: 1,
            tournament_id: 1,
            player_id: PlayerId(7),
            status: EntryStatus::Active,
            joined_at: joined,
            absences: Vec::new(),
        }
    }

    fn away(left: DateTime<Utc>, rejoined: Option<DateTime<Utc>>) -> Absence {
        Absence {
            left_at: left,
            rejoined_at: rejoined,
        }
    }

    fn table(seats: &[(i64, Team)]) -> Table {
        Table {
            id: 1,
            round_id: 1,
            number: 1,
            winner: None,
            score_team1: 0,
            score_team2: 0,
            seats: seats
                .iter()
                .map(|&(player, team)| TableSeat {
                    player_id: PlayerId(player),
                    team,
                })
                .collect(),
        }
    }

    #[test]
    fn test_scoring_points_for_each_outcome() {
        let scoring = ScoringRule::default();
        assert_eq!(scoring.points_for(TableWinner::Draw), (1, 1));
        assert_eq!(scoring.points_for(TableWinner::Team1), (3, 0));
        assert_eq!(scoring.points_for(TableWinner::Team2), (0, 3));
    }

    #[test]
    fn test_status_string_roundtrip() {
        for status in [
            TournamentStatus::Open,
            TournamentStatus::InProgress,
            TournamentStatus::Finished,
            TournamentStatus::Cancelled,
        ] {
            assert_eq!(TournamentStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(TournamentStatus::parse("Aberto"), None);
        assert_eq!(RoundStatus::parse("pairing"), Some(RoundStatus::Pairing));
        assert_eq!(EntryStatus::parse("cancelled"), Some(EntryStatus::Cancelled));
    }

    #[test]
    fn test_winner_codes() {
        assert_eq!(TableWinner::from_i16(0), Some(TableWinner::Draw));
        assert_eq!(TableWinner::from_i16(2), Some(TableWinner::Team2));
        assert_eq!(TableWinner::from_i16(3), None);
        assert_eq!(Team::from_i16(0), None);
    }

    #[test]
    fn test_entry_active_without_leaving() {
        let joined = Utc::now();
        let entry = entry(joined);
        assert!(!entry.is_active_at(joined - Duration::seconds(1)));
        assert!(entry.is_active_at(joined));
        assert!(entry.is_active_at(joined + Duration::days(3)));
    }

    #[test]
    fn test_entry_inactive_after_leaving() {
        let joined = Utc::now();
        let mut entry = entry(joined);
        entry.status = EntryStatus::Cancelled;
        entry.absences.push(away(joined + Duration::hours(1), None));

        assert!(entry.is_active_at(joined + Duration::minutes(30)));
        assert!(!entry.is_active_at(joined + Duration::hours(1)));
        assert!(!entry.is_active_at(joined + Duration::hours(5)));
    }

    #[test]
    fn test_entry_active_again_after_rejoining() {
        let joined = Utc::now();
        let mut entry = entry(joined);
        entry.absences.push(away(
            joined + Duration::hours(1),
            Some(joined + Duration::hours(2)),
        ));

        assert!(!entry.is_active_at(joined + Duration::minutes(90)));
        assert!(entry.is_active_at(joined + Duration::hours(2)));
        assert!(entry.is_active_at(joined + Duration::hours(3)));
    }

    #[test]
    fn test_second_withdrawal_keeps_first_absence() {
        let joined = Utc::now();
        let mut entry = entry(joined);
        entry.absences.push(away(
            joined + Duration::hours(1),
            Some(joined + Duration::hours(3)),
        ));
        assert!(!entry.is_active_at(joined + Duration::hours(2)));

        entry.status = EntryStatus::Cancelled;
        entry.absences.push(away(joined + Duration::hours(5), None));

        assert!(entry.is_active_at(joined + Duration::minutes(30)));
        assert!(!entry.is_active_at(joined + Duration::hours(2)));
        assert!(entry.is_active_at(joined + Duration::hours(4)));
        assert!(!entry.is_active_at(joined + Duration::hours(5)));
        assert!(!entry.is_active_at(joined + Duration::hours(9)));
    }

    #[test]
    fn test_table_completeness() {
        let full = table(&[(1, Team::One), (2, Team::One), (3, Team::Two), (4, Team::Two)]);
        assert!(full.is_complete());
        assert_eq!(full.players_on(Team::Two), vec![PlayerId(3), PlayerId(4)]);

        let lopsided = table(&[(1, Team::One), (2, Team::One), (3, Team::One), (4, Team::Two)]);
        assert!(!lopsided.is_complete());

        let short = table(&[(1, Team::One), (2, Team::Two)]);
        assert!(!short.is_complete());
        assert_eq!(short.seat_of(PlayerId(2)).map(|s| s.team), Some(Team::Two));
    }
}
