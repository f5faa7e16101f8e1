mod artifacts;
mod config;
mod data;
mod errors;
mod evaluation;
mod generation;
mod guidelines;
mod llm_client;
mod models;
mod selection;
mod state;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::generation::run_longguide;
use crate::models::TaskType;
use crate::state::AppState;

#[derive(Parser)]
#[command(name = "longguide", version, about = "Guideline-augmented prompting for long-form generation")]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Generate guidelines, select the best set, and run the evaluation split
    Run {
        /// YAML config; the built-in default is used when omitted
        #[arg(short, long, env = "LONGGUIDE_CONFIG")]
        config: Option<PathBuf>,
        /// Answer every request locally instead of calling the model
        #[arg(long)]
        dry_run: bool,
    },
    /// Score a results file with ROUGE-L
    Evaluate {
        #[arg(long)]
        results: PathBuf,
        #[arg(long, default_value = "summarization")]
        task: String,
    },
    /// Standardize every known dataset under a directory and report counts
    Standardize {
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.cmd {
        Cmd::Run { config, dry_run } => {
            // Configuration errors end the process before any request is sent
            let config = Config::load(config.as_deref()).context("Failed to load configuration")?;
            init_tracing(&config.log_level);
            info!("Starting LongGuide v{}", env!("CARGO_PKG_VERSION"));

            let state = AppState::build(config, dry_run)?;
            let report = run_longguide(&state).await?;

            print!("{report}");
        }
        Cmd::Evaluate { results, task } => {
            init_tracing("info");
            let task: TaskType = task.parse()?;
            let report = evaluation::evaluate_results(&results, task)?;

            if report.aggregate.is_defined() {
                println!("ROUGE-L Score: {:.4}", report.aggregate.mean);
            } else {
                println!("ROUGE-L Score: undefined");
            }
            println!(
                "Evaluated {} of {} examples",
                report.aggregate.count,
                report.scores.len()
            );
            if report.aggregate.excluded > 0 {
                println!("Excluded {} unscorable examples", report.aggregate.excluded);
            }
        }
        Cmd::Standardize { data_dir } => {
            init_tracing("info");
            for (format, outcome) in data::standardize_all(&data_dir) {
                match outcome {
                    Ok(count) => println!("Standardized {count} examples for {format}"),
                    Err(e) => warn!("{format}: {e}"),
                }
            }
        }
    }

    Ok(())
}

/// `RUST_LOG` wins over the configured level.
fn init_tracing(level: &str) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), level))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();
}
