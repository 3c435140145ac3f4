//! Round pairing operations: automatic pairing, manual edits, starting play.

use super::errors::{TournamentError, TournamentResult};
use super::manager::{TournamentManager, active_players};
use super::models::{
    PlayerId, Round, RoundId, RoundStatus, Table, TableId, Team, Tournament, TournamentStatus,
};
use super::state_machine;
use crate::db::repository;
use crate::pairing::{self, PairingEdit, PairingMode, edit};
use crate::ranking::service::ranked_players;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;

/// Result of pairing a round automatically
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoPairOutcome {
    pub round_id: RoundId,
    pub mode: PairingMode,
    pub tables_created: usize,
    pub total_players: usize,
    pub byes: Vec<PlayerId>,
}

/// Seating of a round with the active players left without a table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairingView {
    pub round: Round,
    pub tables: Vec<Table>,
    pub unseated: Vec<PlayerId>,
}

/// Where a player sits in a round
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerSeat {
    pub table: Table,
    pub team: Team,
}

/// Players holding no seat at any of `tables`
fn unseated(players: Vec<PlayerId>, tables: &[Table]) -> Vec<PlayerId> {
    players
        .into_iter()
        .filter(|&player| edit::seat_of(tables, player).is_none())
        .collect()
}

impl TournamentManager {
    /// Lock the tournament and the round, checking the round can be paired
    async fn lock_for_pairing(
        &self,
        conn: &mut PgConnection,
        round_id: RoundId,
    ) -> TournamentResult<(Tournament, Round)> {
        let round = repository::fetch_round(conn, round_id).await?;
        let tournament = repository::lock_tournament(conn, round.tournament_id).await?;
        state_machine::ensure_tournament_status(tournament.status, TournamentStatus::InProgress)?;

        let round = repository::lock_round(conn, round_id).await?;
        state_machine::ensure_round_status(&round, RoundStatus::Pairing)?;

        Ok((tournament, round))
    }

    /// Replace a round's tables with a fresh automatic pairing
    ///
    /// # Arguments
    ///
    /// * `round_id` - Round still in pairing
    /// * `mode` - Random shuffle or Swiss by standings
    ///
    /// # Returns
    ///
    /// * `TournamentResult<AutoPairOutcome>` - Tables created and byes
    pub async fn auto_pair(
        &self,
        round_id: RoundId,
        mode: PairingMode,
    ) -> TournamentResult<AutoPairOutcome> {
        let mut tx = self.pool.begin().await?;

        let (tournament, round) = self.lock_for_pairing(&mut tx, round_id).await?;

        let players = active_players(&repository::fetch_entries(&mut tx, tournament.id).await?);
        state_machine::ensure_min_players(players.len())?;

        let cleared = repository::clear_round_tables(&mut tx, round.id).await?;
        if cleared > 0 {
            debug!("Cleared {} tables of round {}", cleared, round.id);
        }

        let plan = match mode {
            PairingMode::Random => self.random_plan(&players),
            PairingMode::Swiss => {
                let standings = self.swiss_standings(&mut tx, &tournament, &players).await?;
                pairing::swiss(&standings)
            }
        };
        let tables_created = repository::insert_plan(&mut tx, round.id, &plan).await?;

        tx.commit().await?;

        info!(
            "Round {} of tournament {} paired ({}): {} tables",
            round.number, tournament.id, mode, tables_created
        );

        Ok(AutoPairOutcome {
            round_id,
            mode,
            tables_created,
            total_players: players.len(),
            byes: plan.byes,
        })
    }

    /// Throw away the round's seating and pair it again by standings
    pub async fn reset_pairing(&self, round_id: RoundId) -> TournamentResult<AutoPairOutcome> {
        self.auto_pair(round_id, PairingMode::Swiss).await
    }

    /// Apply a manual edit to a round still in pairing
    pub async fn edit_pairing(
        &self,
        round_id: RoundId,
        change: PairingEdit,
    ) -> TournamentResult<PairingView> {
        let mut tx = self.pool.begin().await?;

        let (tournament, round) = self.lock_for_pairing(&mut tx, round_id).await?;
        let tables = repository::lock_tables(&mut tx, round.id).await?;

        match &change {
            PairingEdit::Move {
                player,
                table,
                team,
            } => {
                let entry = repository::fetch_entry(&mut tx, tournament.id, *player).await?;
                if !entry.as_ref().is_some_and(|entry| entry.is_active()) {
                    return Err(TournamentError::EntryNotFound {
                        tournament: tournament.id,
                        player: *player,
                    });
                }

                match table {
                    Some(target) => {
                        ensure_table_in_round(&mut tx, &tables, *target).await?;
                        edit::check_move(&tables, *player, *target, *team)?;
                        repository::unseat_player(&mut tx, round.id, *player).await?;
                        repository::insert_seat(&mut tx, *target, *player, *team).await?;
                    }
                    None => {
                        let removed = repository::unseat_player(&mut tx, round.id, *player).await?;
                        if removed == 0 {
                            return Err(TournamentError::PlayerNotSeated(*player));
                        }
                    }
                }
            }
            PairingEdit::ChangeTeam { player, team } => {
                let table_id = edit::check_change_team(&tables, *player, *team)?;
                repository::update_seat_team(&mut tx, table_id, *player, *team).await?;
            }
            PairingEdit::AddTable => {
                repository::insert_table(&mut tx, round.id, edit::next_table_number(&tables))
                    .await?;
            }
            PairingEdit::RemoveTable { table } => {
                ensure_table_in_round(&mut tx, &tables, *table).await?;
                repository::delete_table(&mut tx, *table).await?;
            }
        }

        let view = self.load_view(&mut tx, round).await?;
        tx.commit().await?;

        debug!("Round {} edited: {:?}", round_id, change);
        Ok(view)
    }

    /// Move a paired round into play
    ///
    /// Every table must be a full 2v2 unless `force` is set.
    pub async fn start_round(&self, round_id: RoundId, force: bool) -> TournamentResult<Round> {
        let mut tx = self.pool.begin().await?;

        let (tournament, round) = self.lock_for_pairing(&mut tx, round_id).await?;
        let tables = repository::lock_tables(&mut tx, round.id).await?;
        if !force {
            state_machine::ensure_tables_complete(&tables)?;
        }

        let round = repository::update_round_status(&mut tx, round.id, RoundStatus::InProgress).await?;
        tx.commit().await?;

        info!(
            "Round {} of tournament {} started with {} tables",
            round.number,
            tournament.id,
            tables.len()
        );
        Ok(round)
    }

    /// Players on the round's roster without a seat in it
    ///
    /// For a finished round these are exactly the players scored a bye.
    pub async fn list_byes(&self, round_id: RoundId) -> TournamentResult<Vec<PlayerId>> {
        let mut conn = self.pool.acquire().await?;

        let round = repository::fetch_round(&mut conn, round_id).await?;
        let tables = repository::fetch_tables(&mut conn, round.id).await?;
        let entries = repository::fetch_entries(&mut conn, round.tournament_id).await?;

        Ok(unseated(ranked_players(&entries, round.roster_at()), &tables))
    }

    /// Tables of the round and who is left over
    pub async fn pairing_view(&self, round_id: RoundId) -> TournamentResult<PairingView> {
        let mut conn = self.pool.acquire().await?;
        let round = repository::fetch_round(&mut conn, round_id).await?;
        self.load_view(&mut conn, round).await
    }

    /// The table and team of a player in a round, if seated
    pub async fn player_table(
        &self,
        round_id: RoundId,
        player_id: PlayerId,
    ) -> TournamentResult<Option<PlayerSeat>> {
        let mut conn = self.pool.acquire().await?;
        let round = repository::fetch_round(&mut conn, round_id).await?;
        let tables = repository::fetch_tables(&mut conn, round.id).await?;

        Ok(tables.into_iter().find_map(|table| {
            let team = table.seat_of(player_id)?.team;
            Some(PlayerSeat { table, team })
        }))
    }

    async fn load_view(&self, conn: &mut PgConnection, round: Round) -> TournamentResult<PairingView> {
        let tables = repository::fetch_tables(conn, round.id).await?;
        let entries = repository::fetch_entries(conn, round.tournament_id).await?;
        let players = ranked_players(&entries, round.roster_at());

        Ok(PairingView {
            unseated: unseated(players, &tables),
            round,
            tables,
        })
    }
}

/// Tell a missing table apart from one that belongs to another round
async fn ensure_table_in_round(
    conn: &mut PgConnection,
    tables: &[Table],
    table_id: TableId,
) -> TournamentResult<()> {
    if tables.iter().any(|table| table.id == table_id) {
        return Ok(());
    }
    repository::fetch_table(conn, table_id).await?;
    Err(TournamentError::TableOutsideRound(table_id))
}
