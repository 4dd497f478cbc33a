//! alignflow command-line interface
//!
//! Drives the OKR engine against a JSON-file store and an `org.toml`
//! organization file. Every command that changes a record needs an acting
//! user, given with `--as` or `ALIGNFLOW_USER`.

use alignflow_logging::{init_logging, LogConfig};
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

mod cli;

#[derive(Parser, Debug)]
#[command(name = "alignflow", about = "OKR approval routing and assessment lifecycle")]
struct Cli {
    /// Enable verbose logging (debug to stderr)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Only print errors
    #[arg(short = 'q', long, global = true)]
    quiet: bool,

    /// Engine config file (default: $ALIGNFLOW_HOME/config.toml)
    #[arg(long, global = true, env = "ALIGNFLOW_CONFIG")]
    config: Option<PathBuf>,

    /// Organization file (default: $ALIGNFLOW_HOME/org.toml)
    #[arg(long, global = true, env = "ALIGNFLOW_ORG")]
    org: Option<PathBuf>,

    /// Acting user id
    #[arg(long = "as", global = true, env = "ALIGNFLOW_USER")]
    as_user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show resolved settings
    Config {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the approval workflow registry
    Workflows {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Resolve the user holding a role for a department
    Resolve {
        /// Role key (e.g. TECH_HEAD)
        role: String,

        /// Department to resolve for
        #[arg(short, long)]
        department: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show who is responsible for a department
    Responsible {
        department: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Create, review and move OKRs
    Okr {
        #[command(subcommand)]
        action: cli::okr::OkrCommands,
    },

    /// Actionable items and badge counts for the acting user
    Queue {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Team board of the acting user
    Board {
        /// members, leaders or all
        #[arg(short, long, default_value = "all")]
        scope: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Operate on many records at once
    Batch {
        #[command(subcommand)]
        action: cli::batch::BatchCommands,
    },
}

impl Commands {
    fn wants_json(&self) -> bool {
        match self {
            Commands::Config { json }
            | Commands::Workflows { json }
            | Commands::Resolve { json, .. }
            | Commands::Responsible { json, .. }
            | Commands::Queue { json }
            | Commands::Board { json, .. } => *json,
            Commands::Okr { action } => action.wants_json(),
            Commands::Batch { action } => action.wants_json(),
        }
    }
}

fn run_command(cli: Cli) -> Result<()> {
    let paths = cli::context::Paths::resolve(cli.config, cli.org);

    match cli.command {
        Commands::Config { json } => cli::config::run(&paths, json),
        Commands::Workflows { json } => {
            let ctx = cli::context::AppContext::load(paths, cli.as_user)?;
            cli::org::run_workflows(&ctx, json)
        }
        Commands::Resolve {
            role,
            department,
            json,
        } => {
            let ctx = cli::context::AppContext::load(paths, cli.as_user)?;
            cli::org::run_resolve(&ctx, &role, &department, json)
        }
        Commands::Responsible { department, json } => {
            let ctx = cli::context::AppContext::load(paths, cli.as_user)?;
            cli::org::run_responsible(&ctx, &department, json)
        }
        Commands::Okr { action } => {
            let ctx = cli::context::AppContext::load(paths, cli.as_user)?;
            cli::okr::run(&ctx, action)
        }
        Commands::Queue { json } => {
            let ctx = cli::context::AppContext::load(paths, cli.as_user)?;
            cli::queue::run_queue(&ctx, json)
        }
        Commands::Board { scope, json } => {
            let ctx = cli::context::AppContext::load(paths, cli.as_user)?;
            cli::queue::run_board(&ctx, &scope, json)
        }
        Commands::Batch { action } => {
            let ctx = cli::context::AppContext::load(paths, cli.as_user)?;
            cli::batch::run(&ctx, action)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let json_mode = cli.command.wants_json();

    if let Err(err) = init_logging(LogConfig {
        app_name: "alignflow",
        verbose: cli.verbose,
        quiet: cli.quiet || json_mode,
    }) {
        eprintln!("Warning: failed to initialize logging: {:#}", err);
    }

    match run_command(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if json_mode {
                cli::error::print_json_error(&err);
            } else {
                eprintln!("{}", cli::error::render(&err));
            }
            ExitCode::from(1)
        }
    }
}
