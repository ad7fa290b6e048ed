//! `bsr` - run very large SQL scripts in resumable batches

mod options;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use bsr_drivers::DriverRegistry;
use bsr_runner::{LogAggregator, RunConfig, RunEngine, RunState};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use options::RunOptions;

/// Exit status for a run stopped with Ctrl-C
const EXIT_CANCELED: u8 = 130;

#[derive(Parser, Debug)]
#[command(name = "bsr", version, about = "Resumable batch runner for very large SQL scripts")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Execute a script, resuming after the last checkpointed unit
    Run(RunOptions),
    /// Manage stored run configurations
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Inspect run log files
    Log {
        #[command(subcommand)]
        command: LogCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Write a configuration file from the given options
    Save {
        /// Destination (defaults to the user config directory)
        #[arg(long, short, value_name = "PATH")]
        output: Option<PathBuf>,
        #[command(flatten)]
        options: RunOptions,
    },
    /// Print a stored configuration
    Show {
        /// Config file (defaults to the user config directory)
        #[arg(value_name = "PATH")]
        path: Option<PathBuf>,
        /// Print the raw JSON document
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand, Debug)]
enum LogCommand {
    /// Parse a log file and print its entries, newest first
    Show {
        #[arg(value_name = "PATH")]
        path: PathBuf,
        /// Maximum number of entries to read
        #[arg(long, default_value_t = 10_000)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    match run().await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,bsr_driver_sqlite=warn"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

async fn run() -> Result<ExitCode> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run(options) => command_run(options).await,
        Commands::Config { command } => command_config(command),
        Commands::Log { command } => command_log(command),
    }
}

async fn command_run(options: RunOptions) -> Result<ExitCode> {
    let config = options.resolve()?;
    let registry = Arc::new(DriverRegistry::with_defaults());
    let engine = Arc::new(RunEngine::new(config, registry)?);

    let stopper = engine.clone();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Stop requested, finishing the current batch...");
            stopper.request_stop_with(|| eprintln!("Stopped."));
        }
    });

    let result = engine
        .run(
            |progress| {
                println!(
                    "{} units executed, {} rows affected.",
                    progress.executed_units, progress.affected_rows
                )
            },
            |message| eprintln!("{}", message),
        )
        .await;
    ctrl_c.abort();

    let summary = result.context("run failed")?;
    let checkpoints = match engine.checkpoint_summary() {
        Ok(checkpoints) => Some(checkpoints),
        Err(e) => {
            tracing::warn!(error = %e, "could not read checkpoint summary");
            None
        }
    };
    println!("{}", output::summary_table(&engine.config(), &summary, checkpoints.as_ref()));

    Ok(match summary.state {
        RunState::Completed => ExitCode::SUCCESS,
        RunState::Canceled => ExitCode::from(EXIT_CANCELED),
        _ => ExitCode::FAILURE,
    })
}

fn command_config(command: ConfigCommand) -> Result<ExitCode> {
    match command {
        ConfigCommand::Save { output, options } => {
            let config = options.resolve()?;
            let path = match output {
                Some(path) => path,
                None => RunConfig::default_path()?,
            };
            config
                .save_to_file(&path)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Saved configuration to {}", path.display());
        }
        ConfigCommand::Show { path, json } => {
            let path = match path {
                Some(path) => path,
                None => RunConfig::default_path()?,
            };
            let config = RunConfig::from_file(&path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            if json {
                println!("{}", config.to_json()?);
            } else {
                println!("{}", output::config_table(&config));
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn command_log(command: LogCommand) -> Result<ExitCode> {
    match command {
        LogCommand::Show { path, limit } => {
            let log = LogAggregator::new(limit, false);
            log.load_file(&path)
                .with_context(|| format!("failed to read log {}", path.display()))?;
            println!("{}", log.render());
        }
    }
    Ok(ExitCode::SUCCESS)
}
