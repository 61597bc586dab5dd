//! # Orchestrator Configuration Validator
//!
//! Command-line tool for checking orchestrator configuration files and cron
//! expressions before deploying them.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use flow_orchestrator::config::{ConfigManager, OrchestratorConfig};
use flow_orchestrator::validation::validate_cron_expression;
use std::path::PathBuf;
use std::process;
use tracing::{error, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "config-validator")]
#[command(about = "Validate orchestrator configuration files")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Configuration file (TOML, YAML or JSON); defaults only when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose output level (use multiple times for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load and validate the configuration (default)
    Validate,

    /// Print the effective configuration as JSON
    Show,

    /// Print the built-in defaults as JSON
    Defaults,

    /// Validate a six-field cron expression and list its next ticks
    Cron {
        expression: String,

        /// Number of upcoming ticks to print
        #[arg(short, long, default_value_t = 5)]
        count: usize,
    },
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    if let Err(err) = run(cli) {
        error!("{err:#}");
        eprintln!("❌ {err:#}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command.unwrap_or(Commands::Validate) {
        Commands::Validate => {
            let manager = ConfigManager::load(cli.config.as_deref())
                .context("configuration failed validation")?;
            println!(
                "✅ Configuration valid (environment: {}, source: {})",
                manager.environment(),
                manager
                    .source_path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "defaults".to_string())
            );
        }
        Commands::Show => {
            let manager = ConfigManager::load(cli.config.as_deref())
                .context("configuration failed validation")?;
            println!("{}", serde_json::to_string_pretty(manager.config())?);
        }
        Commands::Defaults => {
            println!("{}", serde_json::to_string_pretty(&OrchestratorConfig::default())?);
        }
        Commands::Cron { expression, count } => {
            let schedule = validate_cron_expression(&expression)?;
            println!("✅ Cron expression valid: {expression}");
            for tick in schedule.after(&Utc::now()).take(count) {
                println!("  {}", tick.to_rfc3339());
            }
        }
    }
    Ok(())
}
