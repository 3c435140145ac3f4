//! # Swiss Pairing
//!
//! Pairing and ranking engine for Swiss-style 2v2 tournaments with rotating
//! partners.
//!
//! A tournament moves through a small state machine, `open` to `in_progress`
//! to `finished` (or `cancelled` before it starts), while each of its rounds
//! cycles through pairing, play and scoring:
//!
//! - **Pairing**: round one is shuffled at random, later rounds are seeded by
//!   the standings. Groups of four form a table, the remainder get a bye.
//! - **Play**: results are reported per table under a row lock.
//! - **Scoring**: closing a round ranks the field by points, then balance
//!   (OMW% - PMW%), then OMW%, then MW%, and caches the result.
//!
//! ## Core Modules
//!
//! - [`tournament`]: Domain model, lifecycle and the [`TournamentManager`]
//! - [`pairing`]: Random and Swiss pairing, manual seating edits
//! - [`ranking`]: History builder, tie-break computation, snapshot cache
//! - [`db`]: Connection pool, migrations and repository functions
//!
//! ## Example
//!
//! ```
//! use swiss_pairing::pairing::{self, Pairer};
//! use swiss_pairing::tournament::PlayerId;
//!
//! let players: Vec<PlayerId> = (1..=6).map(PlayerId).collect();
//! let plan = Pairer::seeded(7).random(&players);
//! assert_eq!(plan.tables.len(), 1);
//! assert_eq!(plan.byes.len(), 2);
//!
//! let standings = vec![(PlayerId(1), 6), (PlayerId(2), 3), (PlayerId(3), 3), (PlayerId(4), 0)];
//! let plan = pairing::swiss(&standings);
//! assert_eq!(plan.tables[0].team_one, [PlayerId(1), PlayerId(4)]);
//! ```

/// Database connection pool, migrations and queries.
pub mod db;

/// Table assignment for rounds.
pub mod pairing;

/// Standings computation and caching.
pub mod ranking;

/// Tournament lifecycle and domain model.
pub mod tournament;

pub use ranking::{RankingAtRound, RankingConfig, RankingEngine, RankingSource};
pub use tournament::{TournamentError, TournamentManager, TournamentResult};
