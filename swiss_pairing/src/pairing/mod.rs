//! Pairing engine for 2v2 rounds.
//!
//! - Random pairing shuffles entrants and seats groups of four
//! - Swiss pairing seats groups of four by standings, top and bottom against
//!   the middle two
//! - Manual edits move players between tables and teams while a round is
//!   still being paired
//!
//! Leftover players (fewer than four) get a bye and no table.

pub mod edit;
pub mod engine;

pub use edit::PairingEdit;
pub use engine::{Pairer, PairingMode, PairingPlan, TABLE_SIZE, TablePlan, swiss};
