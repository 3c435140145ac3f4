//! Operator command line for Swiss 2v2 tournaments.
//!
//! Each invocation runs one tournament operation against the database and
//! prints the result as JSON on stdout.

mod commands;
mod config;
mod logging;

use std::sync::Arc;
use std::time::Instant;

use anyhow::Error;
use commands::Command;
use config::AdminConfig;
use log::{error, info};
use pico_args::Arguments;
use serde::Serialize;
use serde_json::Value;
use swiss_pairing::{
    TournamentError, TournamentManager,
    db::Database,
    tournament::{ErrorKind, NewTournament},
};

const HELP: &str = "\
Administer Swiss 2v2 tournaments

USAGE:
  sp_admin [OPTIONS] <COMMAND> [COMMAND OPTIONS]

OPTIONS:
  --db-url     URL         Database connection string  [default: env DATABASE_URL]
  --seed       N           Seed for random pairing     [default: env PAIRING_SEED or OS entropy]

FLAGS:
  -h, --help               Print help information

COMMANDS:
  migrate                                        Apply database migrations
  create [--rounds N] [--win P] [--draw P] [--loss P] [--bye P] NAME
  show --tournament ID
  entries --tournament ID
  enter|withdraw|reinstate --tournament ID --player ID
  start --tournament ID                          Open round 1 with a random pairing
  pair --round ID [--mode random|swiss]          Replace the round's pairing
  repair --round ID                              Pair the round again by standings
  move --round ID --player ID [--table ID] [--team 1|2]
  team --round ID --player ID --team 1|2
  add-table --round ID
  remove-table --round ID --table ID
  begin-round --round ID [--force]               Put a paired round into play
  report --table ID --score1 N --score2 N --winner 0|1|2
  advance --tournament ID                        Close the round and open the next
  finalize --tournament ID                       Close the last round and finish
  cancel --tournament ID
  ranking --tournament ID --round ID
  recompute --tournament ID --number N
  byes|view --round ID
  seat --round ID --player ID

ENVIRONMENT:
  DATABASE_URL             PostgreSQL connection string
  DB_MAX_CONNECTIONS       Pool size                   [default: 10]
  DB_CONNECTION_TIMEOUT    Connect timeout, seconds    [default: 10]
  RANKING_MATCH_WIN_FLOOR  Lowest reported win percentage [default: 0.33]
  RANKING_DECIMAL_PLACES   Places kept on percentages [default: 4]
  PAIRING_SEED             Fixed seed for random pairing
  RUST_LOG                 Log filter [default: info,sqlx=warn]
";

/// Error body printed on stderr when an operation is refused
#[derive(Serialize)]
struct Failure {
    kind: ErrorKind,
    message: String,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let database_url: Option<String> = pargs.opt_value_from_str("--db-url")?;
    let seed: Option<u64> = pargs.opt_value_from_str("--seed")?;
    let command = Command::parse(pargs)?;

    let config = AdminConfig::from_env(database_url, seed)?;
    config.validate()?;

    logging::init();

    let db = Database::new(&config.database)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to database: {}", e))?;

    let mut manager = TournamentManager::new(Arc::new(db.pool().clone()))
        .with_ranking_config(config.ranking);
    if let Some(seed) = config.pairing_seed {
        manager = manager.with_seed(seed);
    }

    let name = command.name();
    let started = Instant::now();
    let result = run(&db, &manager, command).await;
    logging::log_command(name, started.elapsed().as_millis() as u64, result.is_ok());

    db.close().await;

    match result {
        Ok(output) => {
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        Err(err) => match err.downcast::<TournamentError>() {
            Ok(refused) => {
                let failure = Failure {
                    kind: refused.kind(),
                    message: refused.client_message(),
                };
                if let TournamentError::Database(source) = &refused {
                    error!("{} failed: {}", name, source);
                }
                eprintln!("{}", serde_json::to_string_pretty(&failure)?);
                std::process::exit(1);
            }
            Err(other) => Err(other),
        },
    }
}

/// Run one command and turn its result into JSON
async fn run(db: &Database, manager: &TournamentManager, command: Command) -> Result<Value, Error> {
    let output = match command {
        Command::Migrate => {
            db.migrate().await?;
            info!("Migrations applied");
            serde_json::json!({ "migrated": true })
        }
        Command::Create {
            name,
            rounds,
            scoring,
        } => {
            let mut new = NewTournament::new(name).with_scoring(scoring);
            if let Some(rounds) = rounds {
                new = new.with_round_count(rounds);
            }
            serde_json::to_value(manager.create_tournament(new).await?)?
        }
        Command::Show { tournament } => {
            serde_json::to_value(manager.get_tournament(tournament).await?)?
        }
        Command::Entries { tournament } => {
            serde_json::to_value(manager.list_entries(tournament).await?)?
        }
        Command::Enter { tournament, player } => {
            serde_json::to_value(manager.register_entry(tournament, player).await?)?
        }
        Command::Withdraw { tournament, player } => {
            serde_json::to_value(manager.cancel_entry(tournament, player).await?)?
        }
        Command::Reinstate { tournament, player } => {
            serde_json::to_value(manager.reactivate_entry(tournament, player).await?)?
        }
        Command::Start { tournament } => {
            serde_json::to_value(manager.start_tournament(tournament).await?)?
        }
        Command::Pair { round, mode } => serde_json::to_value(manager.auto_pair(round, mode).await?)?,
        Command::Repair { round } => serde_json::to_value(manager.reset_pairing(round).await?)?,
        Command::Edit { round, edit } => {
            serde_json::to_value(manager.edit_pairing(round, edit).await?)?
        }
        Command::BeginRound { round, force } => {
            serde_json::to_value(manager.start_round(round, force).await?)?
        }
        Command::Report {
            table,
            score_team1,
            score_team2,
            winner,
        } => serde_json::to_value(
            manager
                .report_result_code(table, score_team1, score_team2, winner)
                .await?,
        )?,
        Command::Advance { tournament } => {
            let outcome = manager.advance_round(tournament).await?;
            for warning in &outcome.warnings {
                log::warn!(
                    "Standings of round {} not stored: {}",
                    warning.round_number,
                    warning.message
                );
            }
            serde_json::to_value(outcome)?
        }
        Command::Finalize { tournament } => {
            serde_json::to_value(manager.finalize_tournament(tournament).await?)?
        }
        Command::Cancel { tournament } => {
            serde_json::to_value(manager.cancel_tournament(tournament).await?)?
        }
        Command::Ranking { tournament, round } => {
            serde_json::to_value(manager.get_ranking_at_round(tournament, round).await?)?
        }
        Command::Recompute { tournament, number } => {
            serde_json::to_value(manager.recompute_ranking(tournament, number).await?)?
        }
        Command::Byes { round } => serde_json::to_value(manager.list_byes(round).await?)?,
        Command::View { round } => serde_json::to_value(manager.pairing_view(round).await?)?,
        Command::Seat { round, player } => {
            serde_json::to_value(manager.player_table(round, player).await?)?
        }
    };

    Ok(output)
}
