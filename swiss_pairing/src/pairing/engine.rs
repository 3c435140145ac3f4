//! Table assignment for a round.

use crate::tournament::models::PlayerId;
use log::debug;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Players per table
pub const TABLE_SIZE: usize = 4;

/// How a round gets paired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PairingMode {
    /// Uniform shuffle, used for round one
    Random,
    /// Seeded by current standings
    Swiss,
}

impl PairingMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Random => "random",
            Self::Swiss => "swiss",
        }
    }
}

impl fmt::Display for PairingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PairingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "random" => Ok(Self::Random),
            "swiss" => Ok(Self::Swiss),
            other => Err(format!("unknown pairing mode '{other}'")),
        }
    }
}

/// One planned 2v2 table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TablePlan {
    /// 1-based table number
    pub number: i32,
    pub team_one: [PlayerId; 2],
    pub team_two: [PlayerId; 2],
}

impl TablePlan {
    pub fn players(&self) -> impl Iterator<Item = PlayerId> + '_ {
        self.team_one.iter().chain(self.team_two.iter()).copied()
    }
}

/// Complete assignment of a round: full tables plus the leftover byes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairingPlan {
    pub tables: Vec<TablePlan>,
    pub byes: Vec<PlayerId>,
}

impl PairingPlan {
    /// Cut `order` into groups of four, seating each group with `seat`.
    /// The remainder becomes byes.
    fn from_order(order: &[PlayerId], seat: fn(&[PlayerId]) -> TablePlan) -> Self {
        let mut groups = order.chunks_exact(TABLE_SIZE);
        let mut tables = Vec::with_capacity(order.len() / TABLE_SIZE);

        for (idx, group) in groups.by_ref().enumerate() {
            let mut table = seat(group);
            table.number = idx as i32 + 1;
            tables.push(table);
        }

        Self {
            tables,
            byes: groups.remainder().to_vec(),
        }
    }

    pub fn total_players(&self) -> usize {
        self.tables.len() * TABLE_SIZE + self.byes.len()
    }
}

/// First two of the group against the last two
fn seat_in_order(group: &[PlayerId]) -> TablePlan {
    TablePlan {
        number: 0,
        team_one: [group[0], group[1]],
        team_two: [group[2], group[3]],
    }
}

/// Top and bottom of the group against the middle two
fn seat_top_with_bottom(group: &[PlayerId]) -> TablePlan {
    TablePlan {
        number: 0,
        team_one: [group[0], group[3]],
        team_two: [group[1], group[2]],
    }
}

/// Pairing engine with an injected random source
#[derive(Debug)]
pub struct Pairer<R: Rng = StdRng> {
    rng: R,
}

impl Pairer<StdRng> {
    /// Pairer seeded from the operating system
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    /// Deterministic pairer, same seed gives the same shuffles
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl<R: Rng> Pairer<R> {
    pub fn with_rng(rng: R) -> Self {
        Self { rng }
    }

    /// Shuffle players uniformly, then seat consecutive groups of four
    ///
    /// # Arguments
    ///
    /// * `players` - Active entrants to place
    ///
    /// # Returns
    ///
    /// * `PairingPlan` - Tables of 2v2 and the leftover byes
    pub fn random(&mut self, players: &[PlayerId]) -> PairingPlan {
        let mut order = players.to_vec();
        order.shuffle(&mut self.rng);

        let plan = PairingPlan::from_order(&order, seat_in_order);
        debug!(
            "Random pairing: {} tables, {} byes",
            plan.tables.len(),
            plan.byes.len()
        );
        plan
    }
}

/// Pair by standings
///
/// `standings` lists each active entrant with their total points, already in
/// the order ties should keep. Players are stable-sorted by descending points
/// and each group of four seats 1st and 4th against 2nd and 3rd.
pub fn swiss(standings: &[(PlayerId, i64)]) -> PairingPlan {
    let mut sorted = standings.to_vec();
    sorted.sort_by(|a, b| b.1.cmp(&a.1));

    let order: Vec<PlayerId> = sorted.into_iter().map(|(player, _)| player).collect();
    let plan = PairingPlan::from_order(&order, seat_top_with_bottom);
    debug!(
        "Swiss pairing: {} tables, {} byes",
        plan.tables.len(),
        plan.byes.len()
    );
    plan
}
