//! Tournament module for Swiss 2v2 tournaments.
//!
//! This module provides tournament management functionality including:
//! - Tournament creation and entry registration
//! - The tournament and round lifecycle (start, advance, finalize, cancel)
//! - Automatic and manual pairing of rounds
//! - Match result reporting
//! - Standings lookups backed by the snapshot cache
//!
//! ## Example
//!
//! ```no_run
//! use swiss_pairing::db::Database;
//! use swiss_pairing::tournament::{NewTournament, PlayerId, TournamentManager};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::new(&Default::default()).await?;
//!     db.migrate().await?;
//!     let manager = TournamentManager::new(Arc::new(db.pool().clone()));
//!
//!     let tournament = manager
//!         .create_tournament(NewTournament::new("Friday Doubles"))
//!         .await?;
//!     for player in 1..=8 {
//!         manager.register_entry(tournament.id, PlayerId(player)).await?;
//!     }
//!
//!     let started = manager.start_tournament(tournament.id).await?;
//!     println!("Round 1 has {} tables", started.tables_created);
//!
//!     Ok(())
//! }
//! ```

pub mod errors;
pub mod manager;
pub mod models;
pub mod results;
pub mod rounds;
pub mod state_machine;

pub use errors::{ComputationWarning, ErrorKind, TournamentError, TournamentResult};
pub use manager::{AdvanceOutcome, FinalizeOutcome, StartOutcome, TournamentManager};
pub use models::{
    Absence, Entry, EntryId, EntryStatus, NewTournament, PlayerId, RankingRow, Round, RoundId,
    RoundStatus, ScoringRule, StandingsSnapshot, Table, TableId, TableSeat, TableWinner, Team,
    TieBreakers, Tournament, TournamentId, TournamentStatus,
};
pub use rounds::{AutoPairOutcome, PairingView, PlayerSeat};
