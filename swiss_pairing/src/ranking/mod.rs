//! Tie-break-aware standings for 2v2 tournaments.
//!
//! The history builder turns finished rounds into per-player points, partners
//! and opponents; the engine derives MW%, OMW%, PMW% and balance from it and
//! sorts the field. Results are cached per round as standings snapshots.
//!
//! ## Example
//!
//! ```
//! use swiss_pairing::ranking::{History, RankingEngine};
//! use swiss_pairing::tournament::models::{PlayerId, ScoringRule};
//!
//! let scoring = ScoringRule::default();
//! let history = History::build(&scoring, &[], &[], 1);
//! let ranking = RankingEngine::default().rank(&history, &scoring, &[PlayerId(1)]);
//! assert_eq!(ranking[0].position, 1);
//! ```

pub mod engine;
pub mod history;
pub mod service;

pub use engine::{DEFAULT_DECIMAL_PLACES, DEFAULT_MATCH_WIN_FLOOR, RankingConfig, RankingEngine};
pub use history::{History, PlayerHistory, RoundRecord};
pub use service::{RankingAtRound, RankingSource};
