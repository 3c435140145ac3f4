//! Per-player match history up to a target round.
//!
//! Built fresh for every ranking computation from the finished rounds and
//! thrown away afterwards.

use crate::tournament::models::{Entry, PlayerId, Round, RoundStatus, ScoringRule, Table, Team};
use log::warn;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// A finished round together with its tables
#[derive(Debug, Clone)]
pub struct RoundRecord {
    pub round: Round,
    pub tables: Vec<Table>,
}

/// Everything one player did, keyed by round number
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayerHistory {
    /// Points earned per round, byes included
    pub points: BTreeMap<i32, i32>,
    /// Teammate per round, `None` for a bye
    pub partners: BTreeMap<i32, Option<PlayerId>>,
    /// Opposing team per round, empty for a bye
    pub opponents: BTreeMap<i32, Vec<PlayerId>>,
}

impl PlayerHistory {
    pub fn total_points(&self) -> i64 {
        self.points.values().map(|&p| i64::from(p)).sum()
    }

    /// Rounds with a points record, played or bye
    pub fn rounds_counted(&self) -> usize {
        self.points.len()
    }

    /// Whether `other` was this player's partner or opponent in `round`
    pub fn shared_round_with(&self, round: i32, other: PlayerId) -> bool {
        let partnered = self
            .partners
            .get(&round)
            .is_some_and(|partner| *partner == Some(other));
        let opposed = self
            .opponents
            .get(&round)
            .is_some_and(|opponents| opponents.contains(&other));
        partnered || opposed
    }

    pub fn distinct_partners(&self) -> BTreeSet<PlayerId> {
        self.partners.values().flatten().copied().collect()
    }

    pub fn distinct_opponents(&self) -> BTreeSet<PlayerId> {
        self.opponents.values().flatten().copied().collect()
    }

    fn record(&mut self, round: i32, points: i32, partner: Option<PlayerId>, opponents: Vec<PlayerId>) {
        self.points.insert(round, points);
        self.partners.insert(round, partner);
        self.opponents.insert(round, opponents);
    }
}

/// Match history of a tournament up to a target round
#[derive(Debug, Clone, Default)]
pub struct History {
    target: i32,
    players: HashMap<PlayerId, PlayerHistory>,
}

impl History {
    /// Build the history from finished rounds numbered up to `target`
    ///
    /// # Arguments
    ///
    /// * `scoring` - Points per outcome
    /// * `rounds` - Rounds of the tournament with their tables
    /// * `entries` - All entries, active or not
    /// * `target` - Last round number to include
    ///
    /// # Returns
    ///
    /// * `History` - Per-player points, partners and opponents
    pub fn build(
        scoring: &ScoringRule,
        rounds: &[RoundRecord],
        entries: &[Entry],
        target: i32,
    ) -> Self {
        let mut players: HashMap<PlayerId, PlayerHistory> = HashMap::new();

        let counted = rounds
            .iter()
            .filter(|record| record.round.status == RoundStatus::Finished)
            .filter(|record| record.round.number <= target);

        for record in counted {
            let number = record.round.number;

            for table in &record.tables {
                let Some(winner) = table.winner else {
                    warn!(
                        "Table {} of round {} has no result, skipping",
                        table.number, number
                    );
                    continue;
                };

                let (points_one, points_two) = scoring.points_for(winner);
                let team_one = table.players_on(Team::One);
                let team_two = table.players_on(Team::Two);

                record_team(&mut players, number, table, &team_one, &team_two, points_one);
                record_team(&mut players, number, table, &team_two, &team_one, points_two);
            }

            // Anyone active when the round finished but not seated sat it out
            let roster_at = record.round.roster_at();
            for entry in entries {
                if !entry.is_active_at(roster_at) {
                    continue;
                }
                let history = players.entry(entry.player_id).or_default();
                if !history.points.contains_key(&number) {
                    history.record(number, scoring.bye, None, Vec::new());
                }
            }
        }

        Self { target, players }
    }

    pub fn target(&self) -> i32 {
        self.target
    }

    pub fn player(&self, player: PlayerId) -> Option<&PlayerHistory> {
        self.players.get(&player)
    }

    pub fn players(&self) -> impl Iterator<Item = (&PlayerId, &PlayerHistory)> {
        self.players.iter()
    }

    pub fn total_points(&self, player: PlayerId) -> i64 {
        self.player(player).map_or(0, PlayerHistory::total_points)
    }
}

fn record_team(
    players: &mut HashMap<PlayerId, PlayerHistory>,
    round: i32,
    table: &Table,
    team: &[PlayerId],
    opponents: &[PlayerId],
    points: i32,
) {
    let [first, second] = team else {
        if !team.is_empty() {
            warn!(
                "Table {} of round {} has a team of {}, not counted",
                table.number,
                round,
                team.len()
            );
        }
        return;
    };

    for (player, partner) in [(*first, *second), (*second, *first)] {
        players
            .entry(player)
            .or_default()
            .record(round, points, Some(partner), opponents.to_vec());
    }
}
