//! Ranking computation against stored rounds, with the snapshot cache.

use super::engine::RankingEngine;
use super::history::History;
use crate::db::repository;
use crate::tournament::errors::TournamentResult;
use crate::tournament::models::{
    Entry, PlayerId, RankingRow, Round, RoundStatus, StandingsSnapshot, Tournament, TournamentId,
};
use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;

/// Where a ranking came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RankingSource {
    /// Served from a stored snapshot
    Cached,
    /// Computed now and stored
    Computed,
    /// Points only, round not finished, nothing stored
    Provisional,
}

/// Standings of a tournament as of one round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankingAtRound {
    pub tournament_id: TournamentId,
    pub round_number: i32,
    pub source: RankingSource,
    /// Snapshot version, absent for provisional standings
    pub computed_at: Option<DateTime<Utc>>,
    pub ranking: Vec<RankingRow>,
}

impl RankingAtRound {
    fn from_snapshot(snapshot: StandingsSnapshot, source: RankingSource) -> Self {
        Self {
            tournament_id: snapshot.tournament_id,
            round_number: snapshot.round_number,
            source,
            computed_at: Some(snapshot.computed_at),
            ranking: snapshot.rows,
        }
    }
}

/// Players to rank: entries active at `instant`, in registration order
pub fn ranked_players(entries: &[Entry], instant: DateTime<Utc>) -> Vec<PlayerId> {
    entries
        .iter()
        .filter(|entry| entry.is_active_at(instant))
        .map(|entry| entry.player_id)
        .collect()
}

/// Rank every finished round up to `round` and replace its snapshot.
///
/// Runs on the caller's connection so the delete and insert land in the
/// caller's transaction.
pub async fn compute_snapshot(
    conn: &mut PgConnection,
    engine: &RankingEngine,
    tournament: &Tournament,
    round: &Round,
) -> TournamentResult<StandingsSnapshot> {
    let entries = repository::fetch_entries(conn, tournament.id).await?;
    let records = repository::fetch_round_records(conn, tournament.id, round.number).await?;

    let history = History::build(&tournament.scoring, &records, &entries, round.number);
    let players = ranked_players(&entries, round.roster_at());
    let rows = engine.rank(&history, &tournament.scoring, &players);

    debug!(
        "Ranked {} players over {} rounds for tournament {}",
        rows.len(),
        records.len(),
        tournament.id
    );

    let snapshot =
        repository::replace_snapshot(conn, tournament.id, round.number, &rows).await?;
    info!(
        "Stored standings of tournament {} after round {}",
        tournament.id, round.number
    );

    Ok(snapshot)
}

/// Points-only standings over the finished rounds up to `round`
pub async fn provisional_ranking(
    conn: &mut PgConnection,
    engine: &RankingEngine,
    tournament: &Tournament,
    round: &Round,
) -> TournamentResult<Vec<RankingRow>> {
    let entries = repository::fetch_entries(conn, tournament.id).await?;
    let records = repository::fetch_round_records(conn, tournament.id, round.number).await?;

    let history = History::build(&tournament.scoring, &records, &entries, round.number);
    let players = ranked_players(&entries, round.roster_at());

    Ok(engine.rank_by_points(&history, &players))
}

/// Cache-first ranking lookup
///
/// # Arguments
///
/// * `conn` - Connection, inside a transaction when the round may be cached
/// * `engine` - Ranking engine
/// * `tournament` - Owner of the round
/// * `round` - Round to rank up to
///
/// # Returns
///
/// * `TournamentResult<RankingAtRound>` - Stored snapshot, a freshly stored
///   one for a finished round, or provisional points otherwise
pub async fn ranking_at_round(
    conn: &mut PgConnection,
    engine: &RankingEngine,
    tournament: &Tournament,
    round: &Round,
) -> TournamentResult<RankingAtRound> {
    if let Some(snapshot) = repository::fetch_snapshot(conn, tournament.id, round.number).await? {
        return Ok(RankingAtRound::from_snapshot(snapshot, RankingSource::Cached));
    }

    if round.status != RoundStatus::Finished {
        let ranking = provisional_ranking(conn, engine, tournament, round).await?;
        return Ok(RankingAtRound {
            tournament_id: tournament.id,
            round_number: round.number,
            source: RankingSource::Provisional,
            computed_at: None,
            ranking,
        });
    }

    // Another reader may have stored it while we waited for the lock
    let round = repository::lock_round(conn, round.id).await?;
    if let Some(snapshot) = repository::fetch_snapshot(conn, tournament.id, round.number).await? {
        return Ok(RankingAtRound::from_snapshot(snapshot, RankingSource::Cached));
    }

    let snapshot = compute_snapshot(conn, engine, tournament, &round).await?;
    Ok(RankingAtRound::from_snapshot(snapshot, RankingSource::Computed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tournament::models::{Absence, EntryStatus};
    use chrono::Duration;

    #[test]
    fn test_ranked_players_follow_activity() {
        let start = Utc::now();
        let entry = |id: i64, absences: &[(i64, Option<i64>)]| Entry {
            id,
            tournament_id: 1,
            player_id: PlayerId(id),
            status: EntryStatus::Active,
            joined_at: start,
            absences: absences
                .iter()
                .map(|&(left, rejoined)| Absence {
                    left_at: start + Duration::hours(left),
                    rejoined_at: rejoined.map(|h| start + Duration::hours(h)),
                })
                .collect(),
        };
        let entries = vec![
            entry(1, &[]),
            entry(2, &[(1, None)]),
            entry(3, &[(1, Some(3))]),
            entry(4, &[(1, Some(3)), (5, None)]),
        ];

        assert_eq!(
            ranked_players(&entries, start + Duration::hours(2)),
            vec![PlayerId(1)]
        );
        assert_eq!(
            ranked_players(&entries, start + Duration::hours(4)),
            vec![PlayerId(1), PlayerId(3), PlayerId(4)]
        );
        assert_eq!(
            ranked_players(&entries, start + Duration::hours(6)),
            vec![PlayerId(1), PlayerId(3)]
        );
        assert_eq!(
            ranked_players(&entries, start + Duration::minutes(30)),
            vec![PlayerId(1), PlayerId(2), PlayerId(3), PlayerId(4)]
        );
    }
}
