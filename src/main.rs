use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use weathervane_core::{AppError, Config};
use weathervane_services::{ServiceContext, TaskStatus};

#[derive(Parser)]
#[command(name = "weathervane")]
#[command(version)]
#[command(about = "Resolve current weather for batches of cities and archive it by region")]
struct Args {
    /// Config file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Submit a batch of cities and print the task report when it finishes
    Fetch {
        #[arg(required = true)]
        cities: Vec<String>,

        /// Status poll interval in milliseconds
        #[arg(long, default_value_t = 500)]
        poll_ms: u64,
    },
    /// Print every archived report for a region
    Region { region: String },
    /// Print the report of a stored task
    Status { task_id: String },
}

/// Log the short operator message, keep the full error for the exit report
fn fail(err: impl Into<AppError>) -> anyhow::Error {
    let err = err.into();
    tracing::error!("{}", err.user_message());
    err.into()
}

#[tokio::main]
async fn main() -> Result<()> {
    weathervane_core::init()?;
    let args = Args::parse();

    let (config, _) = Config::load_validated(args.config.as_deref())?;
    let ctx = ServiceContext::from_config(config)?;

    tracing::info!("Weathervane started");

    match args.command {
        Command::Fetch { cities, poll_ms } => {
            let task_id = ctx.submit_cities(cities.as_slice()).map_err(fail)?;
            println!("Task {} submitted", task_id);

            let status = ctx
                .wait(&task_id, Duration::from_millis(poll_ms))
                .await
                .context("Task disappeared from the queue")?;
            if let TaskStatus::Failed { cause } = &status {
                tracing::error!("Task {} failed: {}", task_id, cause);
            }

            let report = ctx.task_report(task_id.as_str()).map_err(fail)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Region { region } => {
            let entries = ctx.region_report(&region).map_err(fail)?;
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        Command::Status { task_id } => {
            let report = ctx.task_report(&task_id).map_err(fail)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
