//! ctx: remember what you were working on.
//!
//! Read-side reports over the session store, plus `new` to close the current
//! session. Reports that find nothing print a "no data" message and exit 1.

mod report;

use chrono::{Local, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use ctx_core::{CtxConfig, CtxError, Session, StorageConfig, Store, SystemClock};
use report::SessionReport;

const CURRENT_FILES: usize = 5;
const CURRENT_COMMANDS: usize = 5;
const DAY_SESSIONS: usize = 5;
const BRANCH_SESSIONS: usize = 10;
const SUMMARY_FILES: usize = 3;

#[derive(Parser)]
#[command(name = "ctx")]
#[command(about = "Working context tracker - remember what you were doing")]
#[command(version)]
struct Cli {
    /// Emit JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the current session (default)
    Current,

    /// Show yesterday's sessions
    Yesterday,

    /// List recent sessions
    List {
        /// Number of sessions to show
        #[arg(short = 'n', long = "limit", default_value_t = 10)]
        limit: usize,
    },

    /// Find sessions whose branch contains NAME
    Branch {
        #[arg(value_name = "NAME")]
        name: String,
    },

    /// End the current session; the tracker opens the next one
    New,
}

#[derive(Error, Debug)]
enum CliError {
    #[error(transparent)]
    Ctx(#[from] CtxError),

    #[error("Failed to encode JSON: {0}")]
    Json(#[from] serde_json::Error),
}

fn main() {
    init_logging();
    let cli = Cli::parse();

    let code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            tracing::error!(error = %err, "ctx failed");
            eprintln!("ctx: {}", err);
            1
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> Result<i32, CliError> {
    let storage = StorageConfig::resolve()?;
    let command = cli.command.unwrap_or(Commands::Current);

    // Never create a store just to report that it is empty.
    if !storage.db_file().exists() {
        return Ok(match command {
            Commands::New => new_session_message(false),
            _ => no_data(cli.json, &no_data_message(&command)),
        });
    }

    let config = CtxConfig::load(&storage.config_file()).unwrap_or_else(|err| {
        tracing::warn!(error = %err, "Failed to load config; using defaults");
        CtxConfig::default()
    });
    let store = Store::open_with(storage.db_file(), config.busy_timeout(), Arc::new(SystemClock))?;
    let now = Utc::now();

    match command {
        Commands::Current => {
            let Some(session) = store.current_session()? else {
                return Ok(no_data(cli.json, &no_data_message(&Commands::Current)));
            };
            let report = SessionReport {
                files: store.recent_file_changes(session.id, CURRENT_FILES)?,
                commands: store.recent_commands(session.id, CURRENT_COMMANDS)?,
                session,
            };
            emit(cli.json, &report, || report::render_current(&report, now))
        }
        Commands::Yesterday => {
            let today = Local::now().date_naive();
            let Some(yesterday) = today.pred_opt() else {
                return Ok(no_data(cli.json, &no_data_message(&Commands::Yesterday)));
            };
            let reports = summaries(&store, store.sessions_on(yesterday, DAY_SESSIONS)?)?;
            if reports.is_empty() {
                return Ok(no_data(
                    cli.json,
                    &format!("No sessions found for {}.", yesterday.format("%Y-%m-%d")),
                ));
            }
            emit(cli.json, &reports, || {
                report::render_day(yesterday, &reports, now)
            })
        }
        Commands::List { limit } => {
            let sessions = store.recent_sessions(limit)?;
            if sessions.is_empty() {
                return Ok(no_data(cli.json, &no_data_message(&Commands::List { limit })));
            }
            emit(cli.json, &sessions, || {
                report::render_list(&sessions, limit, now)
            })
        }
        Commands::Branch { name } => {
            let reports = summaries(&store, store.sessions_by_branch(&name, BRANCH_SESSIONS)?)?;
            if reports.is_empty() {
                return Ok(no_data(
                    cli.json,
                    &no_data_message(&Commands::Branch { name }),
                ));
            }
            emit(cli.json, &reports, || report::render_branch(&name, &reports, now))
        }
        Commands::New => Ok(new_session_message(store.end_current_session()?)),
    }
}

fn summaries(
    store: &Store,
    sessions: Vec<Session>,
) -> Result<Vec<SessionReport>, CliError> {
    sessions
        .into_iter()
        .map(|session| {
            Ok(SessionReport {
                files: store.recent_file_changes(session.id, SUMMARY_FILES)?,
                commands: Vec::new(),
                session,
            })
        })
        .collect()
}

fn emit<T: Serialize>(
    json: bool,
    value: &T,
    render: impl FnOnce() -> String,
) -> Result<i32, CliError> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        print!("{}", render());
    }
    Ok(0)
}

fn no_data(json: bool, message: &str) -> i32 {
    if json {
        println!("null");
    } else {
        println!("{}", message);
    }
    1
}

fn no_data_message(command: &Commands) -> String {
    match command {
        Commands::Current => {
            "No active session.\nStart the tracker with: ctx-daemon".to_string()
        }
        Commands::Yesterday => "No sessions found for yesterday.".to_string(),
        Commands::List { .. } => "No sessions found.".to_string(),
        Commands::Branch { name } => format!("No sessions found for branch matching '{}'.", name),
        Commands::New => String::new(),
    }
}

fn new_session_message(ended: bool) -> i32 {
    if ended {
        println!("Previous session ended.");
    }
    println!("New session will start when the tracker detects activity.");
    println!("Make sure the tracker is running: ctx-daemon");
    0
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_means_current() {
        let cli = Cli::try_parse_from(["ctx"]).expect("parse");
        assert!(cli.command.is_none());
        assert!(!cli.json);
    }

    #[test]
    fn list_limit_and_global_json() {
        let cli = Cli::try_parse_from(["ctx", "list", "-n", "3", "--json"]).expect("parse");
        assert!(cli.json);
        assert!(matches!(cli.command, Some(Commands::List { limit: 3 })));
    }

    #[test]
    fn branch_needs_a_name() {
        assert!(Cli::try_parse_from(["ctx", "branch"]).is_err());
    }
}
