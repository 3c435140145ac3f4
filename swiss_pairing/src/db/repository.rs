//! Row-level data access for tournaments.
//!
//! Every function takes a plain `&mut PgConnection`, so callers decide the
//! transaction boundary: pass `&mut tx` from `pool.begin()` to group several
//! calls into one atomic operation. Functions named `lock_*` take row locks
//! (`FOR UPDATE`) that are held until that transaction ends.

use crate::pairing::PairingPlan;
use crate::ranking::history::RoundRecord;
use crate::tournament::errors::{TournamentError, TournamentResult};
use crate::tournament::models::{
    Absence, Entry, EntryId, EntryStatus, NewTournament, PlayerId, RankingRow, Round, RoundId,
    RoundStatus, ScoringRule, StandingsSnapshot, Table, TableId, TableSeat, TableWinner, Team,
    TieBreakers, Tournament, TournamentId, TournamentStatus,
};
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, Postgres, QueryBuilder, Row};
use std::collections::HashMap;

const TOURNAMENT_COLUMNS: &str = "id, name, win_points, draw_points, loss_points, bye_points, \
     round_count, status, created_at, finished_at";

const ENTRY_COLUMNS: &str = "id, tournament_id, player_id, status, joined_at";

const ROUND_COLUMNS: &str = "id, tournament_id, number, status, created_at, finished_at";

const TABLE_COLUMNS: &str = "id, round_id, number, winner, score_team1, score_team2";

fn decode_error(column: &str, value: impl std::fmt::Display) -> sqlx::Error {
    sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: format!("unexpected value '{value}'").into(),
    }
}

fn tournament_from_row(row: &PgRow) -> Result<Tournament, sqlx::Error> {
    let status: String = row.try_get("status")?;
    let round_count: Option<i32> = row.try_get("round_count")?;

    Ok(Tournament {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        scoring: ScoringRule {
            win: row.try_get("win_points")?,
            draw: row.try_get("draw_points")?,
            loss: row.try_get("loss_points")?,
            bye: row.try_get("bye_points")?,
        },
        round_count: round_count.map(|count| count.max(0) as u32),
        status: TournamentStatus::parse(&status).ok_or_else(|| decode_error("status", &status))?,
        created_at: row.try_get("created_at")?,
        finished_at: row.try_get("finished_at")?,
    })
}

fn entry_from_row(row: &PgRow) -> Result<Entry, sqlx::Error> {
    let status: String = row.try_get("status")?;

    Ok(Entry {
        id: row.try_get("id")?,
        tournament_id: row.try_get("tournament_id")?,
        player_id: row.try_get("player_id")?,
        status: EntryStatus::parse(&status).ok_or_else(|| decode_error("status", &status))?,
        joined_at: row.try_get("joined_at")?,
        absences: Vec::new(),
    })
}

fn round_from_row(row: &PgRow) -> Result<Round, sqlx::Error> {
    let status: String = row.try_get("status")?;

    Ok(Round {
        id: row.try_get("id")?,
        tournament_id: row.try_get("tournament_id")?,
        number: row.try_get("number")?,
        status: RoundStatus::parse(&status).ok_or_else(|| decode_error("status", &status))?,
        created_at: row.try_get("created_at")?,
        finished_at: row.try_get("finished_at")?,
    })
}

/// Table row without seats
fn table_from_row(row: &PgRow) -> Result<Table, sqlx::Error> {
    let winner: Option<i16> = row.try_get("winner")?;
    let winner = match winner {
        Some(code) => Some(TableWinner::from_i16(code).ok_or_else(|| decode_error("winner", code))?),
        None => None,
    };

    Ok(Table {
        id: row.try_get("id")?,
        round_id: row.try_get("round_id")?,
        number: row.try_get("number")?,
        winner,
        score_team1: row.try_get("score_team1")?,
        score_team2: row.try_get("score_team2")?,
        seats: Vec::new(),
    })
}

// ---------------------------------------------------------------------------
// Tournaments
// ---------------------------------------------------------------------------

pub async fn insert_tournament(
    conn: &mut PgConnection,
    new: &NewTournament,
) -> TournamentResult<Tournament> {
    let row = sqlx::query(&format!(
        r#"
        INSERT INTO tournaments (name, win_points, draw_points, loss_points, bye_points, round_count, status)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING {TOURNAMENT_COLUMNS}
        "#
    ))
    .bind(&new.name)
    .bind(new.scoring.win)
    .bind(new.scoring.draw)
    .bind(new.scoring.loss)
    .bind(new.scoring.bye)
    .bind(new.round_count.map(|count| count as i32))
    .bind(TournamentStatus::Open.as_str())
    .fetch_one(&mut *conn)
    .await?;

    Ok(tournament_from_row(&row)?)
}

pub async fn fetch_tournament(
    conn: &mut PgConnection,
    tournament_id: TournamentId,
) -> TournamentResult<Tournament> {
    let row = sqlx::query(&format!(
        "SELECT {TOURNAMENT_COLUMNS} FROM tournaments WHERE id = $1"
    ))
    .bind(tournament_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(TournamentError::TournamentNotFound(tournament_id))?;

    Ok(tournament_from_row(&row)?)
}

/// Fetch and lock the tournament row until the transaction ends
pub async fn lock_tournament(
    conn: &mut PgConnection,
    tournament_id: TournamentId,
) -> TournamentResult<Tournament> {
    let row = sqlx::query(&format!(
        "SELECT {TOURNAMENT_COLUMNS} FROM tournaments WHERE id = $1 FOR UPDATE"
    ))
    .bind(tournament_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(TournamentError::TournamentNotFound(tournament_id))?;

    Ok(tournament_from_row(&row)?)
}

pub async fn update_tournament_status(
    conn: &mut PgConnection,
    tournament_id: TournamentId,
    status: TournamentStatus,
) -> TournamentResult<()> {
    sqlx::query(
        r#"
        UPDATE tournaments
        SET status = $1,
            finished_at = CASE WHEN $1::text = 'finished' THEN NOW() ELSE finished_at END
        WHERE id = $2
        "#,
    )
    .bind(status.as_str())
    .bind(tournament_id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

// ---------------------------------------------------------------------------
// Entries
// ---------------------------------------------------------------------------

async fn attach_absences(conn: &mut PgConnection, entries: &mut [Entry]) -> TournamentResult<()> {
    if entries.is_empty() {
        return Ok(());
    }

    let entry_ids: Vec<EntryId> = entries.iter().map(|entry| entry.id).collect();
    let rows = sqlx::query(
        r#"
        SELECT entry_id, left_at, rejoined_at
        FROM entry_absences
        WHERE entry_id = ANY($1)
        ORDER BY left_at, id
        "#,
    )
    .bind(&entry_ids)
    .fetch_all(&mut *conn)
    .await?;

    let mut absences: HashMap<EntryId, Vec<Absence>> = HashMap::new();
    for row in &rows {
        absences
            .entry(row.try_get("entry_id")?)
            .or_default()
            .push(Absence {
                left_at: row.try_get("left_at")?,
                rejoined_at: row.try_get("rejoined_at")?,
            });
    }

    for entry in entries.iter_mut() {
        entry.absences = absences.remove(&entry.id).unwrap_or_default();
    }

    Ok(())
}

/// All entries of a tournament in registration order, with their absences
pub async fn fetch_entries(
    conn: &mut PgConnection,
    tournament_id: TournamentId,
) -> TournamentResult<Vec<Entry>> {
    let rows = sqlx::query(&format!(
        "SELECT {ENTRY_COLUMNS} FROM tournament_entries WHERE tournament_id = $1 ORDER BY joined_at, id"
    ))
    .bind(tournament_id)
    .fetch_all(&mut *conn)
    .await?;

    let mut entries = rows
        .iter()
        .map(entry_from_row)
        .collect::<Result<Vec<_>, _>>()?;
    attach_absences(conn, &mut entries).await?;

    Ok(entries)
}

pub async fn fetch_entry(
    conn: &mut PgConnection,
    tournament_id: TournamentId,
    player_id: PlayerId,
) -> TournamentResult<Option<Entry>> {
    let row = sqlx::query(&format!(
        "SELECT {ENTRY_COLUMNS} FROM tournament_entries WHERE tournament_id = $1 AND player_id = $2"
    ))
    .bind(tournament_id)
    .bind(player_id)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };
    let mut entry = entry_from_row(&row)?;
    attach_absences(conn, std::slice::from_mut(&mut entry)).await?;

    Ok(Some(entry))
}

pub async fn insert_entry(
    conn: &mut PgConnection,
    tournament_id: TournamentId,
    player_id: PlayerId,
) -> TournamentResult<Entry> {
    let row = sqlx::query(&format!(
        r#"
        INSERT INTO tournament_entries (tournament_id, player_id, status)
        VALUES ($1, $2, $3)
        RETURNING {ENTRY_COLUMNS}
        "#
    ))
    .bind(tournament_id)
    .bind(player_id)
    .bind(EntryStatus::Active.as_str())
    .fetch_one(&mut *conn)
    .await?;

    Ok(entry_from_row(&row)?)
}

async fn set_entry_status(
    conn: &mut PgConnection,
    entry_id: EntryId,
    status: EntryStatus,
) -> TournamentResult<Entry> {
    let row = sqlx::query(&format!(
        "UPDATE tournament_entries SET status = $1 WHERE id = $2 RETURNING {ENTRY_COLUMNS}"
    ))
    .bind(status.as_str())
    .bind(entry_id)
    .fetch_one(&mut *conn)
    .await?;

    let mut entry = entry_from_row(&row)?;
    attach_absences(conn, std::slice::from_mut(&mut entry)).await?;

    Ok(entry)
}

/// Soft-cancel an entry, opening a new absence
pub async fn cancel_entry(conn: &mut PgConnection, entry_id: EntryId) -> TournamentResult<Entry> {
    sqlx::query("INSERT INTO entry_absences (entry_id) VALUES ($1)")
        .bind(entry_id)
        .execute(&mut *conn)
        .await?;

    set_entry_status(conn, entry_id, EntryStatus::Cancelled).await
}

/// Reactivate an entry, closing its open absence
pub async fn reactivate_entry(
    conn: &mut PgConnection,
    entry_id: EntryId,
) -> TournamentResult<Entry> {
    sqlx::query(
        "UPDATE entry_absences SET rejoined_at = NOW() WHERE entry_id = $1 AND rejoined_at IS NULL",
    )
    .bind(entry_id)
    .execute(&mut *conn)
    .await?;

    set_entry_status(conn, entry_id, EntryStatus::Active).await
}

// ---------------------------------------------------------------------------
// Rounds
// ---------------------------------------------------------------------------

pub async fn fetch_round(conn: &mut PgConnection, round_id: RoundId) -> TournamentResult<Round> {
    let row = sqlx::query(&format!("SELECT {ROUND_COLUMNS} FROM rounds WHERE id = $1"))
        .bind(round_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(TournamentError::RoundNotFound(round_id))?;

    Ok(round_from_row(&row)?)
}

/// Fetch and lock a round row; serialises snapshot writes for the round
pub async fn lock_round(conn: &mut PgConnection, round_id: RoundId) -> TournamentResult<Round> {
    let row = sqlx::query(&format!(
        "SELECT {ROUND_COLUMNS} FROM rounds WHERE id = $1 FOR UPDATE"
    ))
    .bind(round_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(TournamentError::RoundNotFound(round_id))?;

    Ok(round_from_row(&row)?)
}

pub async fn fetch_round_by_number(
    conn: &mut PgConnection,
    tournament_id: TournamentId,
    number: i32,
) -> TournamentResult<Option<Round>> {
    let row = sqlx::query(&format!(
        "SELECT {ROUND_COLUMNS} FROM rounds WHERE tournament_id = $1 AND number = $2"
    ))
    .bind(tournament_id)
    .bind(number)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.as_ref().map(round_from_row).transpose()?)
}

/// Highest-numbered round of a tournament
pub async fn latest_round(
    conn: &mut PgConnection,
    tournament_id: TournamentId,
) -> TournamentResult<Option<Round>> {
    let row = sqlx::query(&format!(
        "SELECT {ROUND_COLUMNS} FROM rounds WHERE tournament_id = $1 ORDER BY number DESC LIMIT 1"
    ))
    .bind(tournament_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.as_ref().map(round_from_row).transpose()?)
}

/// Latest round whose results are final
pub async fn latest_finished_round(
    conn: &mut PgConnection,
    tournament_id: TournamentId,
) -> TournamentResult<Option<Round>> {
    let row = sqlx::query(&format!(
        r#"
        SELECT {ROUND_COLUMNS} FROM rounds
        WHERE tournament_id = $1 AND status = $2
        ORDER BY number DESC
        LIMIT 1
        "#
    ))
    .bind(tournament_id)
    .bind(RoundStatus::Finished.as_str())
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.as_ref().map(round_from_row).transpose()?)
}

pub async fn count_rounds(
    conn: &mut PgConnection,
    tournament_id: TournamentId,
) -> TournamentResult<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM rounds WHERE tournament_id = $1")
        .bind(tournament_id)
        .fetch_one(&mut *conn)
        .await?;

    Ok(count)
}

pub async fn insert_round(
    conn: &mut PgConnection,
    tournament_id: TournamentId,
    number: i32,
    status: RoundStatus,
) -> TournamentResult<Round> {
    let row = sqlx::query(&format!(
        r#"
        INSERT INTO rounds (tournament_id, number, status)
        VALUES ($1, $2, $3)
        RETURNING {ROUND_COLUMNS}
        "#
    ))
    .bind(tournament_id)
    .bind(number)
    .bind(status.as_str())
    .fetch_one(&mut *conn)
    .await?;

    Ok(round_from_row(&row)?)
}

pub async fn update_round_status(
    conn: &mut PgConnection,
    round_id: RoundId,
    status: RoundStatus,
) -> TournamentResult<Round> {
    let row = sqlx::query(&format!(
        r#"
        UPDATE rounds
        SET status = $1,
            finished_at = CASE WHEN $1::text = 'finished' THEN NOW() ELSE finished_at END
        WHERE id = $2
        RETURNING {ROUND_COLUMNS}
        "#
    ))
    .bind(status.as_str())
    .bind(round_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(round_from_row(&row)?)
}

/// Finished rounds up to `target` with their tables, for ranking
pub async fn fetch_round_records(
    conn: &mut PgConnection,
    tournament_id: TournamentId,
    target: i32,
) -> TournamentResult<Vec<RoundRecord>> {
    let rows = sqlx::query(&format!(
        r#"
        SELECT {ROUND_COLUMNS} FROM rounds
        WHERE tournament_id = $1 AND number <= $2 AND status = $3
        ORDER BY number
        "#
    ))
    .bind(tournament_id)
    .bind(target)
    .bind(RoundStatus::Finished.as_str())
    .fetch_all(&mut *conn)
    .await?;

    let rounds = rows
        .iter()
        .map(round_from_row)
        .collect::<Result<Vec<_>, _>>()?;
    let round_ids: Vec<RoundId> = rounds.iter().map(|round| round.id).collect();

    let table_rows = sqlx::query(&format!(
        "SELECT {TABLE_COLUMNS} FROM round_tables WHERE round_id = ANY($1) ORDER BY round_id, number"
    ))
    .bind(&round_ids)
    .fetch_all(&mut *conn)
    .await?;

    let mut tables = table_rows
        .iter()
        .map(table_from_row)
        .collect::<Result<Vec<_>, _>>()?;
    attach_seats(conn, &mut tables).await?;

    let mut by_round: HashMap<RoundId, Vec<Table>> = HashMap::new();
    for table in tables {
        by_round.entry(table.round_id).or_default().push(table);
    }

    Ok(rounds
        .into_iter()
        .map(|round| RoundRecord {
            tables: by_round.remove(&round.id).unwrap_or_default(),
            round,
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Tables and seats
// ---------------------------------------------------------------------------

async fn attach_seats(conn: &mut PgConnection, tables: &mut [Table]) -> TournamentResult<()> {
    if tables.is_empty() {
        return Ok(());
    }

    let table_ids: Vec<TableId> = tables.iter().map(|table| table.id).collect();
    let rows = sqlx::query(
        "SELECT table_id, player_id, team FROM table_seats WHERE table_id = ANY($1) ORDER BY id",
    )
    .bind(&table_ids)
    .fetch_all(&mut *conn)
    .await?;

    let mut seats: HashMap<TableId, Vec<TableSeat>> = HashMap::new();
    for row in &rows {
        let team: i16 = row.try_get("team")?;
        seats
            .entry(row.try_get("table_id")?)
            .or_default()
            .push(TableSeat {
                player_id: row.try_get("player_id")?,
                team: Team::from_i16(team).ok_or_else(|| decode_error("team", team))?,
            });
    }

    for table in tables.iter_mut() {
        table.seats = seats.remove(&table.id).unwrap_or_default();
    }

    Ok(())
}

/// Tables of a round with their seats, ordered by number
pub async fn fetch_tables(
    conn: &mut PgConnection,
    round_id: RoundId,
) -> TournamentResult<Vec<Table>> {
    let rows = sqlx::query(&format!(
        "SELECT {TABLE_COLUMNS} FROM round_tables WHERE round_id = $1 ORDER BY number"
    ))
    .bind(round_id)
    .fetch_all(&mut *conn)
    .await?;

    let mut tables = rows
        .iter()
        .map(table_from_row)
        .collect::<Result<Vec<_>, _>>()?;
    attach_seats(conn, &mut tables).await?;

    Ok(tables)
}

/// Like [`fetch_tables`], also locking every table row of the round
pub async fn lock_tables(
    conn: &mut PgConnection,
    round_id: RoundId,
) -> TournamentResult<Vec<Table>> {
    let rows = sqlx::query(&format!(
        "SELECT {TABLE_COLUMNS} FROM round_tables WHERE round_id = $1 ORDER BY number FOR UPDATE"
    ))
    .bind(round_id)
    .fetch_all(&mut *conn)
    .await?;

    let mut tables = rows
        .iter()
        .map(table_from_row)
        .collect::<Result<Vec<_>, _>>()?;
    attach_seats(conn, &mut tables).await?;

    Ok(tables)
}

pub async fn fetch_table(conn: &mut PgConnection, table_id: TableId) -> TournamentResult<Table> {
    let row = sqlx::query(&format!(
        "SELECT {TABLE_COLUMNS} FROM round_tables WHERE id = $1"
    ))
    .bind(table_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(TournamentError::TableNotFound(table_id))?;

    let mut tables = vec![table_from_row(&row)?];
    attach_seats(conn, &mut tables).await?;

    tables.pop().ok_or(TournamentError::TableNotFound(table_id))
}

/// Lock one table row; a second caller blocks here until the first commits
pub async fn lock_table(conn: &mut PgConnection, table_id: TableId) -> TournamentResult<Table> {
    let row = sqlx::query(&format!(
        "SELECT {TABLE_COLUMNS} FROM round_tables WHERE id = $1 FOR UPDATE"
    ))
    .bind(table_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(TournamentError::TableNotFound(table_id))?;

    let mut tables = vec![table_from_row(&row)?];
    attach_seats(conn, &mut tables).await?;

    tables.pop().ok_or(TournamentError::TableNotFound(table_id))
}

pub async fn record_result(
    conn: &mut PgConnection,
    table_id: TableId,
    score_team1: i32,
    score_team2: i32,
    winner: TableWinner,
) -> TournamentResult<()> {
    sqlx::query(
        "UPDATE round_tables SET score_team1 = $1, score_team2 = $2, winner = $3 WHERE id = $4",
    )
    .bind(score_team1)
    .bind(score_team2)
    .bind(winner.as_i16())
    .bind(table_id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn insert_table(
    conn: &mut PgConnection,
    round_id: RoundId,
    number: i32,
) -> TournamentResult<Table> {
    let row = sqlx::query(&format!(
        "INSERT INTO round_tables (round_id, number) VALUES ($1, $2) RETURNING {TABLE_COLUMNS}"
    ))
    .bind(round_id)
    .bind(number)
    .fetch_one(&mut *conn)
    .await?;

    Ok(table_from_row(&row)?)
}

pub async fn delete_table(conn: &mut PgConnection, table_id: TableId) -> TournamentResult<()> {
    let result = sqlx::query("DELETE FROM round_tables WHERE id = $1")
        .bind(table_id)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(TournamentError::TableNotFound(table_id));
    }

    Ok(())
}

/// Delete every table (and, by cascade, seat) of a round
pub async fn clear_round_tables(conn: &mut PgConnection, round_id: RoundId) -> TournamentResult<u64> {
    let result = sqlx::query("DELETE FROM round_tables WHERE round_id = $1")
        .bind(round_id)
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected())
}

pub async fn insert_seat(
    conn: &mut PgConnection,
    table_id: TableId,
    player_id: PlayerId,
    team: Team,
) -> TournamentResult<()> {
    sqlx::query("INSERT INTO table_seats (table_id, player_id, team) VALUES ($1, $2, $3)")
        .bind(table_id)
        .bind(player_id)
        .bind(team.as_i16())
        .execute(&mut *conn)
        .await?;

    Ok(())
}

pub async fn update_seat_team(
    conn: &mut PgConnection,
    table_id: TableId,
    player_id: PlayerId,
    team: Team,
) -> TournamentResult<()> {
    sqlx::query("UPDATE table_seats SET team = $1 WHERE table_id = $2 AND player_id = $3")
        .bind(team.as_i16())
        .bind(table_id)
        .bind(player_id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

/// Remove a player from every table of a round
pub async fn unseat_player(
    conn: &mut PgConnection,
    round_id: RoundId,
    player_id: PlayerId,
) -> TournamentResult<u64> {
    let result = sqlx::query(
        r#"
        DELETE FROM table_seats
        WHERE player_id = $1
          AND table_id IN (SELECT id FROM round_tables WHERE round_id = $2)
        "#,
    )
    .bind(player_id)
    .bind(round_id)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}

/// Write a pairing plan as tables and seats, returning the tables created
pub async fn insert_plan(
    conn: &mut PgConnection,
    round_id: RoundId,
    plan: &PairingPlan,
) -> TournamentResult<usize> {
    for planned in &plan.tables {
        let table = insert_table(conn, round_id, planned.number).await?;

        let mut seats: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO table_seats (table_id, player_id, team) ");
        let assignments = planned
            .team_one
            .iter()
            .map(|&player| (player, Team::One))
            .chain(planned.team_two.iter().map(|&player| (player, Team::Two)));
        seats.push_values(assignments, |mut b, (player, team)| {
            b.push_bind(table.id).push_bind(player).push_bind(team.as_i16());
        });
        seats.build().execute(&mut *conn).await?;
    }

    Ok(plan.tables.len())
}

// ---------------------------------------------------------------------------
// Standings snapshots
// ---------------------------------------------------------------------------

/// Stored standings of a round, `None` when the round was never ranked
pub async fn fetch_snapshot(
    conn: &mut PgConnection,
    tournament_id: TournamentId,
    round_number: i32,
) -> TournamentResult<Option<StandingsSnapshot>> {
    let computed_at: Option<DateTime<Utc>> = sqlx::query_scalar(
        "SELECT computed_at FROM snapshot_rounds WHERE tournament_id = $1 AND round_number = $2",
    )
    .bind(tournament_id)
    .bind(round_number)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(computed_at) = computed_at else {
        return Ok(None);
    };

    let rows = sqlx::query(
        r#"
        SELECT player_id, position, points, match_win, opponent_match_win,
               partner_match_win, balance
        FROM standings_snapshots
        WHERE tournament_id = $1 AND round_number = $2
        ORDER BY position
        "#,
    )
    .bind(tournament_id)
    .bind(round_number)
    .fetch_all(&mut *conn)
    .await?;

    let mut ranking = Vec::with_capacity(rows.len());
    for row in &rows {
        let position: i32 = row.try_get("position")?;
        ranking.push(RankingRow {
            position: position.max(0) as u32,
            player_id: row.try_get("player_id")?,
            points: row.try_get("points")?,
            tie_breakers: Some(TieBreakers {
                match_win: row.try_get("match_win")?,
                opponent_match_win: row.try_get("opponent_match_win")?,
                partner_match_win: row.try_get("partner_match_win")?,
                balance: row.try_get("balance")?,
            }),
        });
    }

    Ok(Some(StandingsSnapshot {
        tournament_id,
        round_number,
        computed_at,
        rows: ranking,
    }))
}

/// Replace the snapshot of a round: stamp the header, delete, then bulk insert
pub async fn replace_snapshot(
    conn: &mut PgConnection,
    tournament_id: TournamentId,
    round_number: i32,
    rows: &[RankingRow],
) -> TournamentResult<StandingsSnapshot> {
    let computed_at: DateTime<Utc> = sqlx::query_scalar(
        r#"
        INSERT INTO snapshot_rounds (tournament_id, round_number, computed_at)
        VALUES ($1, $2, NOW())
        ON CONFLICT (tournament_id, round_number) DO UPDATE SET computed_at = EXCLUDED.computed_at
        RETURNING computed_at
        "#,
    )
    .bind(tournament_id)
    .bind(round_number)
    .fetch_one(&mut *conn)
    .await?;

    sqlx::query("DELETE FROM standings_snapshots WHERE tournament_id = $1 AND round_number = $2")
        .bind(tournament_id)
        .bind(round_number)
        .execute(&mut *conn)
        .await?;

    let ranked: Vec<(&RankingRow, TieBreakers)> = rows
        .iter()
        .filter_map(|row| row.tie_breakers.map(|tie_breakers| (row, tie_breakers)))
        .collect();

    if !ranked.is_empty() {
        let mut insert: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO standings_snapshots (tournament_id, round_number, player_id, position, \
             points, match_win, opponent_match_win, partner_match_win, balance, computed_at) ",
        );
        insert.push_values(ranked, |mut b, (row, tie_breakers)| {
            b.push_bind(tournament_id)
                .push_bind(round_number)
                .push_bind(row.player_id)
                .push_bind(row.position as i32)
                .push_bind(row.points)
                .push_bind(tie_breakers.match_win)
                .push_bind(tie_breakers.opponent_match_win)
                .push_bind(tie_breakers.partner_match_win)
                .push_bind(tie_breakers.balance)
                .push_bind(computed_at);
        });
        insert.build().execute(&mut *conn).await?;
    }

    Ok(StandingsSnapshot {
        tournament_id,
        round_number,
        computed_at,
        rows: rows.to_vec(),
    })
}
