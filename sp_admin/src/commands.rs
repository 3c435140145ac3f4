//! Command line parsing for the admin tool.

use pico_args::Arguments;
use swiss_pairing::pairing::{PairingEdit, PairingMode};
use swiss_pairing::tournament::{PlayerId, RoundId, ScoringRule, TableId, Team, TournamentId};

/// Command line parsing errors
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("No command given, see --help")]
    MissingCommand,

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Unexpected arguments: {0}")]
    UnexpectedArguments(String),

    #[error(transparent)]
    Args(#[from] pico_args::Error),
}

/// One admin operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Migrate,
    Create {
        name: String,
        rounds: Option<u32>,
        scoring: ScoringRule,
    },
    Show {
        tournament: TournamentId,
    },
    Entries {
        tournament: TournamentId,
    },
    Enter {
        tournament: TournamentId,
        player: PlayerId,
    },
    Withdraw {
        tournament: TournamentId,
        player: PlayerId,
    },
    Reinstate {
        tournament: TournamentId,
        player: PlayerId,
    },
    Start {
        tournament: TournamentId,
    },
    Pair {
        round: RoundId,
        mode: PairingMode,
    },
    Repair {
        round: RoundId,
    },
    Edit {
        round: RoundId,
        edit: PairingEdit,
    },
    BeginRound {
        round: RoundId,
        force: bool,
    },
    Report {
        table: TableId,
        score_team1: i32,
        score_team2: i32,
        winner: i16,
    },
    Advance {
        tournament: TournamentId,
    },
    Finalize {
        tournament: TournamentId,
    },
    Cancel {
        tournament: TournamentId,
    },
    Ranking {
        tournament: TournamentId,
        round: RoundId,
    },
    Recompute {
        tournament: TournamentId,
        number: i32,
    },
    Byes {
        round: RoundId,
    },
    View {
        round: RoundId,
    },
    Seat {
        round: RoundId,
        player: PlayerId,
    },
}

fn parse_player(value: &str) -> Result<PlayerId, std::num::ParseIntError> {
    value.parse::<i64>().map(PlayerId)
}

fn parse_team(value: &str) -> Result<Team, String> {
    value
        .parse::<i16>()
        .ok()
        .and_then(Team::from_i16)
        .ok_or_else(|| format!("team must be 1 or 2, got '{value}'"))
}

fn tournament(pargs: &mut Arguments) -> Result<TournamentId, ParseError> {
    Ok(pargs.value_from_str("--tournament")?)
}

fn round(pargs: &mut Arguments) -> Result<RoundId, ParseError> {
    Ok(pargs.value_from_str("--round")?)
}

fn player(pargs: &mut Arguments) -> Result<PlayerId, ParseError> {
    Ok(pargs.value_from_fn("--player", parse_player)?)
}

fn team(pargs: &mut Arguments) -> Result<Team, ParseError> {
    Ok(pargs.value_from_fn("--team", parse_team)?)
}

impl Command {
    /// Name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            Command::Migrate => "migrate",
            Command::Create { .. } => "create",
            Command::Show { .. } => "show",
            Command::Entries { .. } => "entries",
            Command::Enter { .. } => "enter",
            Command::Withdraw { .. } => "withdraw",
            Command::Reinstate { .. } => "reinstate",
            Command::Start { .. } => "start",
            Command::Pair { .. } => "pair",
            Command::Repair { .. } => "repair",
            Command::Edit { edit, .. } => match edit {
                PairingEdit::Move { .. } => "move",
                PairingEdit::ChangeTeam { .. } => "team",
                PairingEdit::AddTable => "add-table",
                PairingEdit::RemoveTable { .. } => "remove-table",
            },
            Command::BeginRound { .. } => "begin-round",
            Command::Report { .. } => "report",
            Command::Advance { .. } => "advance",
            Command::Finalize { .. } => "finalize",
            Command::Cancel { .. } => "cancel",
            Command::Ranking { .. } => "ranking",
            Command::Recompute { .. } => "recompute",
            Command::Byes { .. } => "byes",
            Command::View { .. } => "view",
            Command::Seat { .. } => "seat",
        }
    }

    /// Parse the subcommand and its options
    ///
    /// Global options must already be consumed from `args`. Anything left
    /// over after the command's own options is an error.
    pub fn parse(mut args: Arguments) -> Result<Self, ParseError> {
        let pargs = &mut args;
        let name = pargs.subcommand()?.ok_or(ParseError::MissingCommand)?;

        let command = match name.as_str() {
            "migrate" => Command::Migrate,
            "create" => {
                let defaults = ScoringRule::default();
                let rounds = pargs.opt_value_from_str("--rounds")?;
                let scoring = ScoringRule {
                    win: pargs.opt_value_from_str("--win")?.unwrap_or(defaults.win),
                    draw: pargs.opt_value_from_str("--draw")?.unwrap_or(defaults.draw),
                    loss: pargs.opt_value_from_str("--loss")?.unwrap_or(defaults.loss),
                    bye: pargs.opt_value_from_str("--bye")?.unwrap_or(defaults.bye),
                };
                let name = pargs.free_from_str()?;
                Command::Create {
                    name,
                    rounds,
                    scoring,
                }
            }
            "show" => Command::Show {
                tournament: tournament(pargs)?,
            },
            "entries" => Command::Entries {
                tournament: tournament(pargs)?,
            },
            "enter" => Command::Enter {
                tournament: tournament(pargs)?,
                player: player(pargs)?,
            },
            "withdraw" => Command::Withdraw {
                tournament: tournament(pargs)?,
                player: player(pargs)?,
            },
            "reinstate" => Command::Reinstate {
                tournament: tournament(pargs)?,
                player: player(pargs)?,
            },
            "start" => Command::Start {
                tournament: tournament(pargs)?,
            },
            "pair" => Command::Pair {
                round: round(pargs)?,
                mode: pargs
                    .opt_value_from_str("--mode")?
                    .unwrap_or(PairingMode::Swiss),
            },
            "repair" => Command::Repair {
                round: round(pargs)?,
            },
            "move" => Command::Edit {
                round: round(pargs)?,
                edit: PairingEdit::Move {
                    player: player(pargs)?,
                    table: pargs.opt_value_from_str("--table")?,
                    team: pargs
                        .opt_value_from_fn("--team", parse_team)?
                        .unwrap_or(Team::One),
                },
            },
            "team" => Command::Edit {
                round: round(pargs)?,
                edit: PairingEdit::ChangeTeam {
                    player: player(pargs)?,
                    team: team(pargs)?,
                },
            },
            "add-table" => Command::Edit {
                round: round(pargs)?,
                edit: PairingEdit::AddTable,
            },
            "remove-table" => Command::Edit {
                round: round(pargs)?,
                edit: PairingEdit::RemoveTable {
                    table: pargs.value_from_str("--table")?,
                },
            },
            "begin-round" => Command::BeginRound {
                round: round(pargs)?,
                force: pargs.contains("--force"),
            },
            "report" => Command::Report {
                table: pargs.value_from_str("--table")?,
                score_team1: pargs.value_from_str("--score1")?,
                score_team2: pargs.value_from_str("--score2")?,
                winner: pargs.value_from_str("--winner")?,
            },
            "advance" => Command::Advance {
                tournament: tournament(pargs)?,
            },
            "finalize" => Command::Finalize {
                tournament: tournament(pargs)?,
            },
            "cancel" => Command::Cancel {
                tournament: tournament(pargs)?,
            },
            "ranking" => Command::Ranking {
                tournament: tournament(pargs)?,
                round: round(pargs)?,
            },
            "recompute" => Command::Recompute {
                tournament: tournament(pargs)?,
                number: pargs.value_from_str("--number")?,
            },
            "byes" => Command::Byes {
                round: round(pargs)?,
            },
            "view" => Command::View {
                round: round(pargs)?,
            },
            "seat" => Command::Seat {
                round: round(pargs)?,
                player: player(pargs)?,
            },
            other => return Err(ParseError::UnknownCommand(other.to_string())),
        };

        let remaining = args.finish();
        if !remaining.is_empty() {
            let rest: Vec<String> = remaining
                .iter()
                .map(|arg| arg.to_string_lossy().into_owned())
                .collect();
            return Err(ParseError::UnexpectedArguments(rest.join(" ")));
        }

        Ok(command)
    }
}
