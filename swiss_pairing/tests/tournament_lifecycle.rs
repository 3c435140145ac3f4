//! Integration tests for the tournament lifecycle against PostgreSQL.
//!
//! Tests registration, starting, result reporting, advancing, manual pairing
//! edits and finalization. Every test skips when `DATABASE_URL` is not set.

use serial_test::serial;
use sqlx::PgPool;
use std::sync::Arc;
use swiss_pairing::db::{Database, DatabaseConfig};
use swiss_pairing::pairing::{PairingEdit, PairingMode};
use swiss_pairing::ranking::RankingSource;
use swiss_pairing::tournament::{
    NewTournament, PlayerId, RoundStatus, Table, TableWinner, Team, Tournament, TournamentError,
    TournamentManager, TournamentStatus,
};

/// Helper to connect to a migrated test database
async fn setup_test_db() -> Option<Arc<PgPool>> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping");
        return None;
    };

    let config = DatabaseConfig {
        database_url,
        max_connections: 5,
        min_connections: 1,
        connection_timeout_secs: 5,
        idle_timeout_secs: 300,
        max_lifetime_secs: 1800,
    };

    let db = Database::new(&config)
        .await
        .expect("Failed to create test database");
    db.migrate().await.expect("Failed to run migrations");

    Some(Arc::new(db.pool().clone()))
}

/// Helper to create a manager over a migrated test database
async fn setup_manager() -> Option<TournamentManager> {
    let pool = setup_test_db().await?;
    Some(TournamentManager::new(pool).with_seed(7))
}

/// Player ids unique to one test run
fn players(count: i64) -> Vec<PlayerId> {
    let base = chrono::Utc::now().timestamp_micros() * 100;
    (1..=count).map(|n| PlayerId(base + n)).collect()
}

/// Helper to create a tournament with registered entries
async fn open_tournament(manager: &TournamentManager, entrants: &[PlayerId]) -> Tournament {
    let tournament = manager
        .create_tournament(NewTournament::new("Lifecycle Test"))
        .await
        .expect("Failed to create tournament");

    for &player in entrants {
        manager
            .register_entry(tournament.id, player)
            .await
            .expect("Failed to register entry");
    }
    tournament
}

/// Report every table as a team one win
async fn report_all(manager: &TournamentManager, tables: &[Table]) {
    for table in tables {
        manager
            .report_result(table.id, 2, 1, TableWinner::Team1)
            .await
            .expect("Failed to report result");
    }
}

#[tokio::test]
#[serial]
async fn test_start_with_four_players() {
    let Some(manager) = setup_manager().await else {
        return;
    };
    let tournament = open_tournament(&manager, &players(4)).await;

    let started = manager.start_tournament(tournament.id).await.unwrap();
    assert_eq!(started.round.number, 1);
    assert_eq!(started.round.status, RoundStatus::InProgress);
    assert_eq!(started.tables_created, 1);
    assert!(started.byes.is_empty());

    let view = manager.pairing_view(started.round.id).await.unwrap();
    assert_eq!(view.tables.len(), 1);
    assert_eq!(view.tables[0].team_size(Team::One), 2);
    assert_eq!(view.tables[0].team_size(Team::Two), 2);
    assert!(view.unseated.is_empty());

    let tournament = manager.get_tournament(tournament.id).await.unwrap();
    assert_eq!(tournament.status, TournamentStatus::InProgress);
}

#[tokio::test]
#[serial]
async fn test_start_requires_four_players() {
    let Some(manager) = setup_manager().await else {
        return;
    };
    let tournament = open_tournament(&manager, &players(3)).await;

    let result = manager.start_tournament(tournament.id).await;
    assert!(matches!(
        result,
        Err(TournamentError::InsufficientPlayers { needed: 4, current: 3 })
    ));
}

#[tokio::test]
#[serial]
async fn test_six_players_get_two_byes() {
    let Some(manager) = setup_manager().await else {
        return;
    };
    let entrants = players(6);
    let tournament = open_tournament(&manager, &entrants).await;

    let started = manager.start_tournament(tournament.id).await.unwrap();
    assert_eq!(started.tables_created, 1);
    assert_eq!(started.byes.len(), 2);

    let byes = manager.list_byes(started.round.id).await.unwrap();
    assert_eq!(byes.len(), 2);

    let view = manager.pairing_view(started.round.id).await.unwrap();
    report_all(&manager, &view.tables).await;
    let advanced = manager.advance_round(tournament.id).await.unwrap();
    assert!(advanced.warnings.is_empty());

    let ranking = manager
        .get_ranking_at_round(tournament.id, advanced.previous_round.id)
        .await
        .unwrap();
    assert_eq!(ranking.source, RankingSource::Cached);
    for bye in &started.byes {
        let row = ranking
            .ranking
            .iter()
            .find(|row| row.player_id == *bye)
            .unwrap();
        assert_eq!(row.points, 3);
    }
}

#[tokio::test]
#[serial]
async fn test_report_overwrites_previous_result() {
    let Some(manager) = setup_manager().await else {
        return;
    };
    let tournament = open_tournament(&manager, &players(4)).await;
    let started = manager.start_tournament(tournament.id).await.unwrap();
    let view = manager.pairing_view(started.round.id).await.unwrap();
    let table_id = view.tables[0].id;

    let first = manager
        .report_result(table_id, 2, 1, TableWinner::Team1)
        .await
        .unwrap();
    assert_eq!(first.winner, Some(TableWinner::Team1));

    let second = manager.report_result_code(table_id, 1, 1, 0).await.unwrap();
    assert_eq!(second.winner, Some(TableWinner::Draw));

    let view = manager.pairing_view(started.round.id).await.unwrap();
    assert_eq!(view.tables[0].winner, Some(TableWinner::Draw));
    assert_eq!(view.tables[0].score_team1, 1);
}

#[tokio::test]
#[serial]
async fn test_report_rejects_inconsistent_scores() {
    let Some(manager) = setup_manager().await else {
        return;
    };
    let tournament = open_tournament(&manager, &players(4)).await;
    let started = manager.start_tournament(tournament.id).await.unwrap();
    let view = manager.pairing_view(started.round.id).await.unwrap();
    let table_id = view.tables[0].id;

    let result = manager.report_result(table_id, 1, 2, TableWinner::Team1).await;
    assert!(matches!(result, Err(TournamentError::ScoreMismatch { .. })));

    let result = manager.report_result_code(table_id, 1, 2, 5).await;
    assert!(matches!(result, Err(TournamentError::InvalidWinner(5))));
}

#[tokio::test]
#[serial]
async fn test_advance_blocked_by_unreported_tables() {
    let Some(manager) = setup_manager().await else {
        return;
    };
    let tournament = open_tournament(&manager, &players(8)).await;
    let started = manager.start_tournament(tournament.id).await.unwrap();
    let view = manager.pairing_view(started.round.id).await.unwrap();

    report_all(&manager, &view.tables[..1]).await;
    let result = manager.advance_round(tournament.id).await;
    assert!(matches!(
        result,
        Err(TournamentError::UnreportedTables { round: 1, count: 1 })
    ));

    report_all(&manager, &view.tables[1..]).await;
    let advanced = manager.advance_round(tournament.id).await.unwrap();
    assert_eq!(advanced.previous_round.status, RoundStatus::Finished);
    assert_eq!(advanced.new_round.number, 2);
    assert_eq!(advanced.new_round.status, RoundStatus::Pairing);
    assert_eq!(advanced.tables_created, 2);
}

#[tokio::test]
#[serial]
async fn test_full_tournament_flow() {
    let Some(manager) = setup_manager().await else {
        return;
    };
    let tournament = open_tournament(&manager, &players(8)).await;
    let started = manager.start_tournament(tournament.id).await.unwrap();

    let view = manager.pairing_view(started.round.id).await.unwrap();
    report_all(&manager, &view.tables).await;
    let advanced = manager.advance_round(tournament.id).await.unwrap();

    // Second round is Swiss-paired; reseat it and play
    let repaired = manager
        .auto_pair(advanced.new_round.id, PairingMode::Swiss)
        .await
        .unwrap();
    assert_eq!(repaired.tables_created, 2);

    // While pairing, the ranking of the finished round is served from cache
    let cached = manager
        .get_ranking_at_round(tournament.id, advanced.previous_round.id)
        .await
        .unwrap();
    assert_eq!(cached.source, RankingSource::Cached);
    assert_eq!(cached.ranking.len(), 8);

    manager.start_round(advanced.new_round.id, false).await.unwrap();
    let provisional = manager
        .get_ranking_at_round(tournament.id, advanced.new_round.id)
        .await
        .unwrap();
    assert_eq!(provisional.source, RankingSource::Provisional);
    assert!(provisional.ranking.iter().all(|row| row.tie_breakers.is_none()));

    let view = manager.pairing_view(advanced.new_round.id).await.unwrap();
    report_all(&manager, &view.tables).await;

    let finished = manager.finalize_tournament(tournament.id).await.unwrap();
    assert_eq!(finished.round_number, 2);
    assert_eq!(finished.total_rounds, 2);
    assert_eq!(finished.ranking.len(), 8);
    assert!(finished.ranking.windows(2).all(|w| w[0].points >= w[1].points));

    let tournament = manager.get_tournament(tournament.id).await.unwrap();
    assert_eq!(tournament.status, TournamentStatus::Finished);
    assert!(tournament.finished_at.is_some());

    // Recomputing a finished round yields the same standings
    let recomputed = manager.recompute_ranking(tournament.id, 2).await.unwrap();
    assert_eq!(recomputed.rows, finished.ranking);
}

#[tokio::test]
#[serial]
async fn test_manual_pairing_edits() {
    let Some(manager) = setup_manager().await else {
        return;
    };
    let entrants = players(8);
    let tournament = open_tournament(&manager, &entrants).await;
    let started = manager.start_tournament(tournament.id).await.unwrap();
    let view = manager.pairing_view(started.round.id).await.unwrap();
    report_all(&manager, &view.tables).await;
    let round_id = manager
        .advance_round(tournament.id)
        .await
        .unwrap()
        .new_round
        .id;

    let view = manager.pairing_view(round_id).await.unwrap();
    let first = view.tables[0].clone();
    let second = view.tables[1].clone();
    let mover = first.players_on(Team::One)[0];

    // Team two of another table is already full
    let result = manager
        .edit_pairing(
            round_id,
            PairingEdit::Move {
                player: mover,
                table: Some(second.id),
                team: Team::Two,
            },
        )
        .await;
    assert!(matches!(result, Err(TournamentError::TeamFull { .. })));

    // Unseat, then seat at a new table
    let view = manager
        .edit_pairing(
            round_id,
            PairingEdit::Move {
                player: mover,
                table: None,
                team: Team::One,
            },
        )
        .await
        .unwrap();
    assert_eq!(view.unseated, vec![mover]);

    let view = manager
        .edit_pairing(round_id, PairingEdit::AddTable)
        .await
        .unwrap();
    let added = view.tables.iter().find(|t| t.seats.is_empty()).unwrap().clone();
    assert_eq!(added.number, 3);

    let view = manager
        .edit_pairing(
            round_id,
            PairingEdit::Move {
                player: mover,
                table: Some(added.id),
                team: Team::Two,
            },
        )
        .await
        .unwrap();
    assert!(view.unseated.is_empty());

    let seat = manager.player_table(round_id, mover).await.unwrap().unwrap();
    assert_eq!(seat.table.id, added.id);
    assert_eq!(seat.team, Team::Two);

    let view = manager
        .edit_pairing(
            round_id,
            PairingEdit::ChangeTeam {
                player: mover,
                team: Team::One,
            },
        )
        .await
        .unwrap();
    let moved = view.tables.iter().find(|t| t.id == added.id).unwrap();
    assert_eq!(moved.players_on(Team::One), vec![mover]);

    // An incomplete table blocks the round unless forced
    let result = manager.start_round(round_id, false).await;
    assert!(matches!(result, Err(TournamentError::IncompleteTable { .. })));

    // Pairing again from scratch restores full tables
    let reset = manager.reset_pairing(round_id).await.unwrap();
    assert_eq!(reset.tables_created, 2);
    let round = manager.start_round(round_id, false).await.unwrap();
    assert_eq!(round.status, RoundStatus::InProgress);
}

#[tokio::test]
#[serial]
async fn test_entry_cancel_and_reactivate() {
    let Some(manager) = setup_manager().await else {
        return;
    };
    let entrants = players(5);
    let returner = entrants[4];
    let tournament = open_tournament(&manager, &entrants).await;

    let result = manager.register_entry(tournament.id, entrants[0]).await;
    assert!(matches!(result, Err(TournamentError::AlreadyRegistered)));

    let cancelled = manager.cancel_entry(tournament.id, returner).await.unwrap();
    assert!(!cancelled.is_active());
    let result = manager.cancel_entry(tournament.id, returner).await;
    assert!(matches!(result, Err(TournamentError::EntryAlreadyCancelled(_))));

    let started = manager.start_tournament(tournament.id).await.unwrap();
    assert_eq!(started.total_players, 4);
    assert!(started.byes.is_empty());

    let reactivated = manager.reactivate_entry(tournament.id, returner).await.unwrap();
    assert!(reactivated.is_active());
    assert_eq!(reactivated.absences.len(), 1);
    assert!(reactivated.absences[0].rejoined_at.is_some());

    // Late returner shows up as unseated in the running round
    let byes = manager.list_byes(started.round.id).await.unwrap();
    assert_eq!(byes, vec![returner]);

    // Back before the round ended, so the bye is scored and ranked
    let view = manager.pairing_view(started.round.id).await.unwrap();
    report_all(&manager, &view.tables).await;
    let advanced = manager.advance_round(tournament.id).await.unwrap();
    assert!(advanced.warnings.is_empty());

    let byes = manager.list_byes(advanced.previous_round.id).await.unwrap();
    assert_eq!(byes, vec![returner]);

    let cached = manager
        .get_ranking_at_round(tournament.id, advanced.previous_round.id)
        .await
        .unwrap();
    assert_eq!(cached.source, RankingSource::Cached);
    let row = cached.ranking.iter().find(|row| row.player_id == returner).unwrap();
    assert_eq!(row.points, 3);

    // Leaving again keeps the first absence as it was
    let cancelled = manager.cancel_entry(tournament.id, returner).await.unwrap();
    assert_eq!(cancelled.absences.len(), 2);
    assert_eq!(cancelled.absences[0], reactivated.absences[0]);
    assert!(cancelled.absences[1].rejoined_at.is_none());

    let recomputed = manager.recompute_ranking(tournament.id, 1).await.unwrap();
    assert_eq!(recomputed.rows, cached.ranking);
}

#[tokio::test]
#[serial]
async fn test_concurrent_reports_keep_one_whole_result() {
    let Some(manager) = setup_manager().await else {
        return;
    };
    let tournament = open_tournament(&manager, &players(4)).await;
    let started = manager.start_tournament(tournament.id).await.unwrap();
    let view = manager.pairing_view(started.round.id).await.unwrap();
    let table_id = view.tables[0].id;

    let (first, second) = tokio::join!(
        manager.report_result(table_id, 2, 1, TableWinner::Team1),
        manager.report_result(table_id, 0, 1, TableWinner::Team2),
    );
    let reported = [first.unwrap(), second.unwrap()]
        .map(|table| (table.winner, table.score_team1, table.score_team2));

    let view = manager.pairing_view(started.round.id).await.unwrap();
    let stored = &view.tables[0];
    assert!(reported.contains(&(stored.winner, stored.score_team1, stored.score_team2)));
}

#[tokio::test]
#[serial]
async fn test_advance_survives_failed_standings() {
    let Some(pool) = setup_test_db().await else {
        return;
    };
    let manager = TournamentManager::new(pool.clone()).with_seed(7);
    let tournament = open_tournament(&manager, &players(4)).await;
    let started = manager.start_tournament(tournament.id).await.unwrap();
    let view = manager.pairing_view(started.round.id).await.unwrap();
    report_all(&manager, &view.tables).await;

    // Refuse snapshot writes for this tournament only
    let trigger = format!("reject_standings_{}", tournament.id);
    sqlx::raw_sql(&format!(
        r#"
        CREATE OR REPLACE FUNCTION reject_standings() RETURNS trigger AS $$
        BEGIN
            RAISE EXCEPTION 'standings rejected';
        END;
        $$ LANGUAGE plpgsql;

        CREATE TRIGGER {trigger}
            BEFORE INSERT OR UPDATE ON snapshot_rounds
            FOR EACH ROW WHEN (NEW.tournament_id = {id})
            EXECUTE FUNCTION reject_standings();
        "#,
        id = tournament.id
    ))
    .execute(&*pool)
    .await
    .unwrap();

    let advanced = manager.advance_round(tournament.id).await;

    sqlx::raw_sql(&format!("DROP TRIGGER IF EXISTS {trigger} ON snapshot_rounds"))
        .execute(&*pool)
        .await
        .unwrap();

    let advanced = advanced.unwrap();
    assert_eq!(advanced.previous_round.status, RoundStatus::Finished);
    assert_eq!(advanced.new_round.number, 2);
    assert_eq!(advanced.tables_created, 1);
    assert_eq!(advanced.warnings.len(), 1);
    assert_eq!(advanced.warnings[0].round_number, 1);

    // Nothing was stored, so the first lookup computes the standings
    let ranking = manager
        .get_ranking_at_round(tournament.id, advanced.previous_round.id)
        .await
        .unwrap();
    assert_eq!(ranking.source, RankingSource::Computed);
    assert_eq!(ranking.ranking.len(), 4);
}

#[tokio::test]
#[serial]
async fn test_empty_standings_are_cached() {
    let Some(manager) = setup_manager().await else {
        return;
    };
    let entrants = players(4);
    let tournament = open_tournament(&manager, &entrants).await;
    let started = manager.start_tournament(tournament.id).await.unwrap();
    let view = manager.pairing_view(started.round.id).await.unwrap();
    report_all(&manager, &view.tables).await;

    for &player in &entrants {
        manager.cancel_entry(tournament.id, player).await.unwrap();
    }
    let advanced = manager.advance_round(tournament.id).await.unwrap();
    assert_eq!(advanced.tables_created, 0);

    let ranking = manager
        .get_ranking_at_round(tournament.id, advanced.previous_round.id)
        .await
        .unwrap();
    assert_eq!(ranking.source, RankingSource::Cached);
    assert!(ranking.ranking.is_empty());
}

#[tokio::test]
#[serial]
async fn test_cancel_only_before_start() {
    let Some(manager) = setup_manager().await else {
        return;
    };
    let tournament = open_tournament(&manager, &players(4)).await;
    let cancelled = manager.cancel_tournament(tournament.id).await.unwrap();
    assert_eq!(cancelled.status, TournamentStatus::Cancelled);

    let result = manager.start_tournament(tournament.id).await;
    assert!(matches!(
        result,
        Err(TournamentError::InvalidTournamentState { .. })
    ));

    let tournament = open_tournament(&manager, &players(4)).await;
    manager.start_tournament(tournament.id).await.unwrap();
    let result = manager.cancel_tournament(tournament.id).await;
    assert!(matches!(
        result,
        Err(TournamentError::InvalidTournamentState { .. })
    ));
}

#[tokio::test]
#[serial]
async fn test_create_rejects_bad_settings() {
    let Some(manager) = setup_manager().await else {
        return;
    };
    let result = manager.create_tournament(NewTournament::new("  ")).await;
    assert!(matches!(result, Err(TournamentError::InvalidSettings(_))));

    let result = manager
        .create_tournament(NewTournament::new("Zero rounds").with_round_count(0))
        .await;
    assert!(matches!(result, Err(TournamentError::InvalidSettings(_))));
}
