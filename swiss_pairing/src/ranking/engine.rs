//! Standings computation with cascading tie-breaks.
//!
//! Order is points, then balance (OMW% - PMW%), then OMW%, then MW%, all
//! descending. Players still tied after the four criteria keep the order they
//! were passed in.

use super::history::History;
use crate::tournament::models::{PlayerId, RankingRow, ScoringRule, TieBreakers};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Lowest match-win percentage ever reported (0.33)
pub const DEFAULT_MATCH_WIN_FLOOR: Decimal = Decimal::from_parts(33, 0, 0, false, 2);

/// Decimal places kept on every percentage
pub const DEFAULT_DECIMAL_PLACES: u32 = 4;

/// Tunables of the ranking computation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankingConfig {
    pub match_win_floor: Decimal,
    pub decimal_places: u32,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            match_win_floor: DEFAULT_MATCH_WIN_FLOOR,
            decimal_places: DEFAULT_DECIMAL_PLACES,
        }
    }
}

/// Computes ranking rows from a [`History`]
#[derive(Debug, Clone, Copy, Default)]
pub struct RankingEngine {
    config: RankingConfig,
}

impl RankingEngine {
    pub fn new(config: RankingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RankingConfig {
        &self.config
    }

    /// Round half away from zero to the configured places
    pub fn round(&self, value: Decimal) -> Decimal {
        value.round_dp_with_strategy(
            self.config.decimal_places,
            RoundingStrategy::MidpointAwayFromZero,
        )
    }

    /// Full ranking with tie-breakers
    ///
    /// # Arguments
    ///
    /// * `history` - Match history up to the ranked round
    /// * `scoring` - Points per outcome, the win value scales MW%
    /// * `players` - Players to rank, in the order residual ties keep
    ///
    /// # Returns
    ///
    /// * `Vec<RankingRow>` - Rows sorted by the cascade with 1-based positions
    pub fn rank(
        &self,
        history: &History,
        scoring: &ScoringRule,
        players: &[PlayerId],
    ) -> Vec<RankingRow> {
        let mut run = RankingRun {
            history,
            win_points: Decimal::from(scoring.win),
            floor: self.config.match_win_floor,
            memo: HashMap::new(),
        };

        let mut rows: Vec<(PlayerId, i64, TieBreakers)> = players
            .iter()
            .map(|&player| {
                let metrics = run.metrics(player);
                let tie_breakers = TieBreakers {
                    match_win: self.round(metrics.match_win),
                    opponent_match_win: self.round(metrics.opponent_match_win),
                    partner_match_win: self.round(metrics.partner_match_win),
                    balance: self.round(metrics.opponent_match_win - metrics.partner_match_win),
                };
                (player, history.total_points(player), tie_breakers)
            })
            .collect();

        rows.sort_by(|a, b| {
            b.1.cmp(&a.1)
                .then_with(|| b.2.balance.cmp(&a.2.balance))
                .then_with(|| b.2.opponent_match_win.cmp(&a.2.opponent_match_win))
                .then_with(|| b.2.match_win.cmp(&a.2.match_win))
        });

        rows.into_iter()
            .enumerate()
            .map(|(idx, (player_id, points, tie_breakers))| RankingRow {
                position: idx as u32 + 1,
                player_id,
                points,
                tie_breakers: Some(tie_breakers),
            })
            .collect()
    }

    /// Points-only standing for rounds whose results are not final yet
    pub fn rank_by_points(&self, history: &History, players: &[PlayerId]) -> Vec<RankingRow> {
        let mut rows: Vec<(PlayerId, i64)> = players
            .iter()
            .map(|&player| (player, history.total_points(player)))
            .collect();
        rows.sort_by(|a, b| b.1.cmp(&a.1));

        rows.into_iter()
            .enumerate()
            .map(|(idx, (player_id, points))| RankingRow {
                position: idx as u32 + 1,
                player_id,
                points,
                tie_breakers: None,
            })
            .collect()
    }
}

/// Unrounded metrics of one player
struct Metrics {
    match_win: Decimal,
    opponent_match_win: Decimal,
    partner_match_win: Decimal,
}

/// State of one ranking computation; the memo dies with it
struct RankingRun<'a> {
    history: &'a History,
    win_points: Decimal,
    floor: Decimal,
    /// Adjusted MW% keyed by (subject, excluded)
    memo: HashMap<(PlayerId, PlayerId), Option<Decimal>>,
}

impl RankingRun<'_> {
    fn metrics(&mut self, player: PlayerId) -> Metrics {
        let (opponents, partners) = match self.history.player(player) {
            Some(history) => (history.distinct_opponents(), history.distinct_partners()),
            None => (BTreeSet::new(), BTreeSet::new()),
        };

        Metrics {
            match_win: self.match_win(player),
            opponent_match_win: self.average_adjusted(&opponents, player),
            partner_match_win: self.average_adjusted(&partners, player),
        }
    }

    fn floored_ratio(&self, points: i64, rounds: usize) -> Decimal {
        let max = Decimal::from(rounds) * self.win_points;
        let ratio = if max > Decimal::ZERO {
            Decimal::from(points) / max
        } else {
            Decimal::ZERO
        };
        ratio.max(self.floor)
    }

    fn match_win(&self, player: PlayerId) -> Decimal {
        match self.history.player(player) {
            Some(history) => self.floored_ratio(history.total_points(), history.rounds_counted()),
            None => self.floored_ratio(0, 0),
        }
    }

    /// MW% of `subject` leaving out every round it shared with `excluded`.
    /// `None` when no round is left.
    fn adjusted_match_win(&mut self, subject: PlayerId, excluded: PlayerId) -> Option<Decimal> {
        if let Some(cached) = self.memo.get(&(subject, excluded)) {
            return *cached;
        }

        let value = self.history.player(subject).and_then(|history| {
            let reference = self.history.player(excluded);
            let (points, rounds) = history
                .points
                .iter()
                .filter(|&(&round, _)| {
                    !reference.is_some_and(|r| r.shared_round_with(round, subject))
                })
                .fold((0i64, 0usize), |(points, rounds), (_, &p)| {
                    (points + i64::from(p), rounds + 1)
                });

            (rounds > 0).then(|| self.floored_ratio(points, rounds))
        });

        self.memo.insert((subject, excluded), value);
        value
    }

    fn average_adjusted(&mut self, subjects: &BTreeSet<PlayerId>, excluded: PlayerId) -> Decimal {
        let values: Vec<Decimal> = subjects
            .iter()
            .filter_map(|&subject| self.adjusted_match_win(subject, excluded))
            .collect();

        if values.is_empty() {
            self.floor
        } else {
            values.iter().copied().sum::<Decimal>() / Decimal::from(values.len())
        }
    }
}
