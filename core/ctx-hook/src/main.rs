//! ctx-hook: shell integration for ctx.
//!
//! Called from the shell's prompt hook after every command. Failures are
//! logged and swallowed; the hook always exits 0 so the prompt is never
//! disrupted.
//!
//! ## Subcommands
//!
//! - `log-command`: record a completed command against the open session
//! - `cwd`: report the shell's working directory to the tracker

mod cwd;
mod error;
mod log_command;
mod logging;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "ctx-hook")]
#[command(about = "Shell hook handler for ctx")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log a completed shell command (called by shell precmd hooks)
    LogCommand {
        /// Command text exactly as typed
        #[arg(value_name = "COMMAND", allow_hyphen_values = true)]
        command: String,

        /// Exit status; anything unparsable counts as 1
        #[arg(value_name = "EXIT_CODE", allow_hyphen_values = true)]
        exit_code: String,

        /// Print whether the command was recorded
        #[arg(long)]
        verbose: bool,
    },

    /// Report shell current working directory (called by shell precmd hooks)
    Cwd {
        /// Absolute path to current working directory
        #[arg(value_name = "PATH")]
        path: String,
    },
}

fn main() {
    let _logging_guard = logging::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::LogCommand {
            command,
            exit_code,
            verbose,
        } => match log_command::run(&command, &exit_code) {
            Ok(outcome) => {
                if verbose {
                    println!("{}", outcome.describe());
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "ctx-hook log-command failed");
                if verbose {
                    println!("error: {}", e);
                }
            }
        },
        Commands::Cwd { path } => {
            if let Err(e) = cwd::run(&path) {
                tracing::warn!(error = %e, "ctx-hook cwd failed");
            }
        }
    }
}
