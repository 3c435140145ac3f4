//! Match result reporting.

use super::errors::{TournamentError, TournamentResult};
use super::manager::TournamentManager;
use super::models::{RoundStatus, Table, TableId, TableWinner, Team};
use super::state_machine;
use crate::db::repository;
use log::info;

impl TournamentManager {
    /// Record the result of one table
    ///
    /// The table row stays locked from validation until commit, so concurrent
    /// reports of the same table run one after the other. Reporting again
    /// overwrites the earlier result.
    ///
    /// # Arguments
    ///
    /// * `table_id` - Table to report
    /// * `score_team1` - Score of team one
    /// * `score_team2` - Score of team two
    /// * `winner` - Draw, team one or team two
    ///
    /// # Returns
    ///
    /// * `TournamentResult<Table>` - The table with the recorded result
    ///
    /// # Errors
    ///
    /// * `TournamentError::InvalidRoundState` - Round is not being played
    /// * `TournamentError::IncompleteTable` - Table is not a full 2v2
    /// * `TournamentError::ScoreMismatch` - Scores disagree with the winner
    pub async fn report_result(
        &self,
        table_id: TableId,
        score_team1: i32,
        score_team2: i32,
        winner: TableWinner,
    ) -> TournamentResult<Table> {
        let mut tx = self.pool.begin().await?;

        let mut table = repository::lock_table(&mut tx, table_id).await?;
        let round = repository::fetch_round(&mut tx, table.round_id).await?;
        state_machine::ensure_round_status(&round, RoundStatus::InProgress)?;

        if !table.is_complete() {
            return Err(TournamentError::IncompleteTable {
                table: table.number,
                team_one: table.team_size(Team::One),
                team_two: table.team_size(Team::Two),
            });
        }
        state_machine::validate_result(score_team1, score_team2, winner)?;

        if let Some(previous) = table.winner {
            info!(
                "Table {} result changed from {} to {}",
                table_id, previous, winner
            );
        }

        repository::record_result(&mut tx, table_id, score_team1, score_team2, winner).await?;
        tx.commit().await?;

        table.winner = Some(winner);
        table.score_team1 = score_team1;
        table.score_team2 = score_team2;

        info!(
            "Table {} of round {} reported: {} ({}-{})",
            table.number, round.number, winner, score_team1, score_team2
        );
        Ok(table)
    }

    /// Like [`report_result`](Self::report_result) with the winner as its
    /// stored code: 0 draw, 1 team one, 2 team two
    pub async fn report_result_code(
        &self,
        table_id: TableId,
        score_team1: i32,
        score_team2: i32,
        winner: i16,
    ) -> TournamentResult<Table> {
        let winner = TableWinner::from_i16(winner).ok_or(TournamentError::InvalidWinner(winner))?;
        self.report_result(table_id, score_team1, score_team2, winner)
            .await
    }
}
