//! Grassroots CLI: record match events offline and deliver them later.

mod cli;
mod clock_file;
mod commands;
mod error;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, ClockCommands, Commands};
use crate::commands::clock::{run_clock_pause, run_clock_reset, run_clock_show, run_clock_start};
use crate::commands::common::{load_config, resolve_config_path, resolve_db_path};
use crate::commands::completions::run_completions;
use crate::commands::fixture::run_fixture;
use crate::commands::goal::{run_goal, GoalArgs};
use crate::commands::list::run_list;
use crate::commands::prune::{resolve_policy, run_prune};
use crate::commands::record::{run_record, RecordArgs};
use crate::commands::status::run_status;
use crate::commands::sync::{run_sync, run_watch};
use crate::error::CliError;

const DEFAULT_LOG_FILTER: &str = "grassroots_core=info,grassroots=info";

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        if error.is_retryable() {
            eprintln!("Local storage was unavailable; nothing was saved. Run the command again.");
        }
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Commands::Completions { shell, output } = &cli.command {
        return run_completions(*shell, output.as_deref());
    }

    let db_path = resolve_db_path(cli.db_path)?;
    let config_path = resolve_config_path(cli.config)?;
    let config = load_config(&config_path)?;
    tracing::debug!(
        "Using outbox {} and config {}",
        db_path.display(),
        config_path.display()
    );

    match cli.command {
        Commands::Clock { command } => match command {
            ClockCommands::Start => run_clock_start(&db_path)?,
            ClockCommands::Pause => run_clock_pause(&db_path)?,
            ClockCommands::Reset => run_clock_reset(&db_path)?,
            ClockCommands::Show { follow } => run_clock_show(follow, &db_path).await?,
        },
        Commands::Record {
            kind,
            team,
            player,
            assist,
            sentiment,
            notes,
            dictate,
        } => {
            let args = RecordArgs {
                kind,
                team,
                player,
                assist,
                sentiment,
                notes,
                dictate,
            };
            run_record(args, &config.fixture, &db_path).await?;
        }
        Commands::Goal {
            team,
            scorer,
            assist,
            own_goal,
            notes,
            dictate,
        } => {
            let args = GoalArgs {
                team,
                scorer,
                assist,
                own_goal,
                notes,
                dictate,
            };
            run_goal(args, &config.fixture, &db_path).await?;
        }
        Commands::List {
            limit,
            pending,
            json,
        } => run_list(limit, pending, json, &config.fixture, &db_path).await?,
        Commands::Sync => run_sync(&config, &config_path, &db_path).await?,
        Commands::Watch { assume_online } => {
            run_watch(assume_online, &config, &config_path, &db_path).await?;
        }
        Commands::Status { json } => run_status(json, &config, &db_path).await?,
        Commands::Prune {
            keep,
            older_than_hours,
        } => {
            let policy = resolve_policy(keep, older_than_hours, config.retention);
            run_prune(policy, &db_path).await?;
        }
        Commands::Fixture => run_fixture(&config.fixture),
        Commands::Completions { .. } => {}
    }

    Ok(())
}
