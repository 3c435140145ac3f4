//! Tournament manager for running Swiss 2v2 tournaments.

use super::errors::{ComputationWarning, TournamentError, TournamentResult};
use super::models::{
    Entry, NewTournament, PlayerId, RankingRow, Round, RoundId, RoundStatus, StandingsSnapshot,
    Tournament, TournamentId, TournamentStatus,
};
use super::state_machine::{self, MIN_PLAYERS};
use crate::db::repository;
use crate::pairing::{self, Pairer, PairingPlan};
use crate::ranking::service::{self, RankingAtRound};
use crate::ranking::{RankingConfig, RankingEngine};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use sqlx::{Connection, PgConnection, PgPool};
use std::sync::{Arc, Mutex, PoisonError};

/// Result of starting a tournament
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartOutcome {
    pub round: Round,
    pub tables_created: usize,
    pub total_players: usize,
    pub byes: Vec<PlayerId>,
}

/// Result of closing one round and opening the next
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvanceOutcome {
    pub previous_round: Round,
    pub new_round: Round,
    pub tables_created: usize,
    pub byes: Vec<PlayerId>,
    /// Standings that could not be stored for the previous round
    pub warnings: Vec<ComputationWarning>,
}

/// Final standings of a finished tournament
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalizeOutcome {
    pub tournament_id: TournamentId,
    pub round_number: i32,
    pub ranking: Vec<RankingRow>,
    pub total_rounds: i64,
}

/// Tournament manager
///
/// Every mutating operation runs in one database transaction and either
/// commits as a whole or leaves nothing behind.
#[derive(Clone)]
pub struct TournamentManager {
    pub(super) pool: Arc<PgPool>,
    pub(super) ranking: RankingEngine,
    pub(super) pairer: Arc<Mutex<Pairer>>,
}

impl TournamentManager {
    /// Create a new tournament manager with an OS-seeded pairer
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self {
            pool,
            ranking: RankingEngine::default(),
            pairer: Arc::new(Mutex::new(Pairer::from_entropy())),
        }
    }

    /// Use a fixed seed for random pairing
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.pairer = Arc::new(Mutex::new(Pairer::seeded(seed)));
        self
    }

    pub fn with_ranking_config(mut self, config: RankingConfig) -> Self {
        self.ranking = RankingEngine::new(config);
        self
    }

    pub fn ranking_engine(&self) -> &RankingEngine {
        &self.ranking
    }

    pub(super) fn random_plan(&self, players: &[PlayerId]) -> PairingPlan {
        let mut pairer = self.pairer.lock().unwrap_or_else(PoisonError::into_inner);
        pairer.random(players)
    }

    /// Active players ordered for Swiss pairing, with their points.
    ///
    /// Uses the stored standings of the latest finished round when there are
    /// any, points over the finished rounds otherwise.
    pub(super) async fn swiss_standings(
        &self,
        conn: &mut PgConnection,
        tournament: &Tournament,
        players: &[PlayerId],
    ) -> TournamentResult<Vec<(PlayerId, i64)>> {
        let ranking = match repository::latest_finished_round(conn, tournament.id).await? {
            Some(round) => match repository::fetch_snapshot(conn, tournament.id, round.number).await? {
                Some(snapshot) => snapshot.rows,
                None => service::provisional_ranking(conn, &self.ranking, tournament, &round).await?,
            },
            None => Vec::new(),
        };

        let mut standings: Vec<(PlayerId, i64)> = ranking
            .iter()
            .filter(|row| players.contains(&row.player_id))
            .map(|row| (row.player_id, row.points))
            .collect();

        // Players not ranked yet (late entries) go in with no points
        for &player in players {
            if !standings.iter().any(|(ranked, _)| *ranked == player) {
                standings.push((player, 0));
            }
        }

        Ok(standings)
    }

    /// Create a new tournament, open for entries
    pub async fn create_tournament(&self, new: NewTournament) -> TournamentResult<Tournament> {
        if new.name.trim().is_empty() {
            return Err(TournamentError::InvalidSettings(
                "name must not be empty".to_string(),
            ));
        }
        if new.round_count == Some(0) {
            return Err(TournamentError::InvalidSettings(
                "round count must be positive".to_string(),
            ));
        }
        let scoring = &new.scoring;
        if [scoring.win, scoring.draw, scoring.loss, scoring.bye]
            .iter()
            .any(|&points| points < 0)
        {
            return Err(TournamentError::InvalidSettings(
                "points must not be negative".to_string(),
            ));
        }

        let mut conn = self.pool.acquire().await?;
        let tournament = repository::insert_tournament(&mut conn, &new).await?;

        info!("Created tournament {} '{}'", tournament.id, tournament.name);
        Ok(tournament)
    }

    /// Get tournament information
    pub async fn get_tournament(&self, tournament_id: TournamentId) -> TournamentResult<Tournament> {
        let mut conn = self.pool.acquire().await?;
        repository::fetch_tournament(&mut conn, tournament_id).await
    }

    /// All entries of a tournament, cancelled ones included
    pub async fn list_entries(&self, tournament_id: TournamentId) -> TournamentResult<Vec<Entry>> {
        let mut conn = self.pool.acquire().await?;
        repository::fetch_tournament(&mut conn, tournament_id).await?;
        repository::fetch_entries(&mut conn, tournament_id).await
    }

    /// Register a player while the tournament is open
    pub async fn register_entry(
        &self,
        tournament_id: TournamentId,
        player_id: PlayerId,
    ) -> TournamentResult<Entry> {
        let mut tx = self.pool.begin().await?;

        let tournament = repository::lock_tournament(&mut tx, tournament_id).await?;
        state_machine::ensure_tournament_status(tournament.status, TournamentStatus::Open)?;

        if repository::fetch_entry(&mut tx, tournament_id, player_id)
            .await?
            .is_some()
        {
            return Err(TournamentError::AlreadyRegistered);
        }

        let entry = repository::insert_entry(&mut tx, tournament_id, player_id).await?;
        tx.commit().await?;

        info!("Player {} entered tournament {}", player_id, tournament_id);
        Ok(entry)
    }

    /// Withdraw a player; the entry and its history stay
    pub async fn cancel_entry(
        &self,
        tournament_id: TournamentId,
        player_id: PlayerId,
    ) -> TournamentResult<Entry> {
        let mut tx = self.pool.begin().await?;

        let tournament = repository::lock_tournament(&mut tx, tournament_id).await?;
        state_machine::ensure_entries_editable(tournament.status)?;

        let entry = repository::fetch_entry(&mut tx, tournament_id, player_id)
            .await?
            .ok_or(TournamentError::EntryNotFound {
                tournament: tournament_id,
                player: player_id,
            })?;
        if !entry.is_active() {
            return Err(TournamentError::EntryAlreadyCancelled(player_id));
        }

        let entry = repository::cancel_entry(&mut tx, entry.id).await?;
        tx.commit().await?;

        info!("Player {} withdrew from tournament {}", player_id, tournament_id);
        Ok(entry)
    }

    /// Bring a withdrawn player back
    pub async fn reactivate_entry(
        &self,
        tournament_id: TournamentId,
        player_id: PlayerId,
    ) -> TournamentResult<Entry> {
        let mut tx = self.pool.begin().await?;

        let tournament = repository::lock_tournament(&mut tx, tournament_id).await?;
        state_machine::ensure_entries_editable(tournament.status)?;

        let entry = repository::fetch_entry(&mut tx, tournament_id, player_id)
            .await?
            .ok_or(TournamentError::EntryNotFound {
                tournament: tournament_id,
                player: player_id,
            })?;
        if entry.is_active() {
            return Err(TournamentError::EntryAlreadyActive(player_id));
        }

        let entry = repository::reactivate_entry(&mut tx, entry.id).await?;
        tx.commit().await?;

        info!("Player {} rejoined tournament {}", player_id, tournament_id);
        Ok(entry)
    }

    /// Start a tournament
    ///
    /// Creates round 1 already in progress, paired at random over the active
    /// entries. Players left over after the last full table get a bye.
    ///
    /// # Errors
    ///
    /// * `TournamentError::InvalidTournamentState` - Tournament is not open
    /// * `TournamentError::InsufficientPlayers` - Fewer than four active entries
    pub async fn start_tournament(&self, tournament_id: TournamentId) -> TournamentResult<StartOutcome> {
        let mut tx = self.pool.begin().await?;

        let tournament = repository::lock_tournament(&mut tx, tournament_id).await?;
        state_machine::ensure_transition(tournament.status, TournamentStatus::InProgress)?;

        let players = active_players(&repository::fetch_entries(&mut tx, tournament_id).await?);
        state_machine::ensure_min_players(players.len())?;

        repository::update_tournament_status(&mut tx, tournament_id, TournamentStatus::InProgress)
            .await?;
        let round = repository::insert_round(&mut tx, tournament_id, 1, RoundStatus::InProgress).await?;

        let plan = self.random_plan(&players);
        let tables_created = repository::insert_plan(&mut tx, round.id, &plan).await?;

        tx.commit().await?;

        info!(
            "Tournament {} started: {} players, {} tables, {} byes",
            tournament_id,
            players.len(),
            tables_created,
            plan.byes.len()
        );

        Ok(StartOutcome {
            round,
            tables_created,
            total_players: players.len(),
            byes: plan.byes,
        })
    }

    /// Rank a round inside a savepoint so a failure only loses the snapshot
    async fn store_standings(
        &self,
        conn: &mut PgConnection,
        tournament: &Tournament,
        round: &Round,
    ) -> TournamentResult<StandingsSnapshot> {
        let mut savepoint = conn.begin().await?;
        let snapshot =
            service::compute_snapshot(&mut savepoint, &self.ranking, tournament, round).await?;
        savepoint.commit().await?;
        Ok(snapshot)
    }

    /// Close the current round and open the next one
    ///
    /// The closed round is ranked and its standings stored; if that fails the
    /// round still advances and the failure comes back as a warning. The new
    /// round starts in pairing and is Swiss-paired right away when at least
    /// four players are active.
    ///
    /// # Errors
    ///
    /// * `TournamentError::InvalidTournamentState` - Tournament is not in progress
    /// * `TournamentError::InvalidRoundState` - Current round is not being played
    /// * `TournamentError::UnreportedTables` - Some table has no result yet
    pub async fn advance_round(&self, tournament_id: TournamentId) -> TournamentResult<AdvanceOutcome> {
        let mut tx = self.pool.begin().await?;

        let tournament = repository::lock_tournament(&mut tx, tournament_id).await?;
        state_machine::ensure_tournament_status(tournament.status, TournamentStatus::InProgress)?;

        let current = repository::latest_round(&mut tx, tournament_id)
            .await?
            .ok_or(TournamentError::NoRounds)?;
        state_machine::ensure_round_status(&current, RoundStatus::InProgress)?;

        let tables = repository::lock_tables(&mut tx, current.id).await?;
        state_machine::ensure_all_reported(&current, &tables)?;

        let previous_round =
            repository::update_round_status(&mut tx, current.id, RoundStatus::Finished).await?;

        let mut warnings = Vec::new();
        if let Err(err) = self.store_standings(&mut tx, &tournament, &previous_round).await {
            warn!(
                "Standings of tournament {} round {} not stored: {}",
                tournament_id, previous_round.number, err
            );
            warnings.push(ComputationWarning {
                round_number: previous_round.number,
                message: err.to_string(),
            });
        }

        let new_round = repository::insert_round(
            &mut tx,
            tournament_id,
            previous_round.number + 1,
            RoundStatus::Pairing,
        )
        .await?;

        let players = active_players(&repository::fetch_entries(&mut tx, tournament_id).await?);
        let (tables_created, byes) = if players.len() >= MIN_PLAYERS {
            let standings = self.swiss_standings(&mut tx, &tournament, &players).await?;
            let plan = pairing::swiss(&standings);
            let created = repository::insert_plan(&mut tx, new_round.id, &plan).await?;
            (created, plan.byes)
        } else {
            (0, players)
        };

        tx.commit().await?;

        info!(
            "Tournament {} advanced to round {}: {} tables",
            tournament_id, new_round.number, tables_created
        );

        Ok(AdvanceOutcome {
            previous_round,
            new_round,
            tables_created,
            byes,
            warnings,
        })
    }

    /// Close the last round, rank it and finish the tournament
    ///
    /// Unlike advancing, a ranking failure aborts the whole operation.
    pub async fn finalize_tournament(
        &self,
        tournament_id: TournamentId,
    ) -> TournamentResult<FinalizeOutcome> {
        let mut tx = self.pool.begin().await?;

        let tournament = repository::lock_tournament(&mut tx, tournament_id).await?;
        state_machine::ensure_transition(tournament.status, TournamentStatus::Finished)?;

        let current = repository::latest_round(&mut tx, tournament_id)
            .await?
            .ok_or(TournamentError::NoRounds)?;
        let tables = repository::lock_tables(&mut tx, current.id).await?;
        state_machine::ensure_all_reported(&current, &tables)?;

        let last_round = if current.status == RoundStatus::Finished {
            current
        } else {
            repository::update_round_status(&mut tx, current.id, RoundStatus::Finished).await?
        };

        let snapshot =
            service::compute_snapshot(&mut tx, &self.ranking, &tournament, &last_round).await?;
        repository::update_tournament_status(&mut tx, tournament_id, TournamentStatus::Finished)
            .await?;
        let total_rounds = repository::count_rounds(&mut tx, tournament_id).await?;

        tx.commit().await?;

        info!(
            "Tournament {} finished after {} rounds",
            tournament_id, total_rounds
        );

        Ok(FinalizeOutcome {
            tournament_id,
            round_number: last_round.number,
            ranking: snapshot.rows,
            total_rounds,
        })
    }

    /// Cancel tournament, allowed only before it starts
    pub async fn cancel_tournament(&self, tournament_id: TournamentId) -> TournamentResult<Tournament> {
        let mut tx = self.pool.begin().await?;

        let tournament = repository::lock_tournament(&mut tx, tournament_id).await?;
        state_machine::ensure_transition(tournament.status, TournamentStatus::Cancelled)?;

        repository::update_tournament_status(&mut tx, tournament_id, TournamentStatus::Cancelled)
            .await?;
        let tournament = repository::fetch_tournament(&mut tx, tournament_id).await?;

        tx.commit().await?;

        info!("Tournament {} cancelled", tournament_id);
        Ok(tournament)
    }

    /// Standings as of a round, served from the snapshot cache when present
    pub async fn get_ranking_at_round(
        &self,
        tournament_id: TournamentId,
        round_id: RoundId,
    ) -> TournamentResult<RankingAtRound> {
        let mut tx = self.pool.begin().await?;

        let tournament = repository::fetch_tournament(&mut tx, tournament_id).await?;
        let round = repository::fetch_round(&mut tx, round_id).await?;
        if round.tournament_id != tournament_id {
            return Err(TournamentError::RoundNotFound(round_id));
        }

        let ranking = service::ranking_at_round(&mut tx, &self.ranking, &tournament, &round).await?;
        tx.commit().await?;

        Ok(ranking)
    }

    /// Rebuild the stored standings of a finished round
    pub async fn recompute_ranking(
        &self,
        tournament_id: TournamentId,
        round_number: i32,
    ) -> TournamentResult<StandingsSnapshot> {
        let mut tx = self.pool.begin().await?;

        let tournament = repository::fetch_tournament(&mut tx, tournament_id).await?;
        let round = repository::fetch_round_by_number(&mut tx, tournament_id, round_number)
            .await?
            .ok_or(TournamentError::RoundNumberNotFound {
                tournament: tournament_id,
                number: round_number,
            })?;
        let round = repository::lock_round(&mut tx, round.id).await?;
        state_machine::ensure_round_status(&round, RoundStatus::Finished)?;

        let snapshot = service::compute_snapshot(&mut tx, &self.ranking, &tournament, &round).await?;
        tx.commit().await?;

        Ok(snapshot)
    }
}

/// Players of the currently active entries, in registration order
pub(super) fn active_players(entries: &[Entry]) -> Vec<PlayerId> {
    entries
        .iter()
        .filter(|entry| entry.is_active())
        .map(|entry| entry.player_id)
        .collect()
}
