//! sji - security configuration import
//!
//! CLI entry point: loads configuration, checks the remote, builds the import
//! plan and runs the pipeline.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use chrono::Local;
use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result};
use tracing::{debug, info, warn};

use securityimport::cli::Cli;
use securityimport::config::Config;
use securityimport::pipeline::{FixedAnswer, Operator, Pipeline, RunOutcome, TerminalOperator};
use securityimport::remote::{Endpoints, ReqwestTransport, RequestExecutor, remote_version, verify_credentials};
use securityimport::source::ImportPlan;

fn parse_level(level_str: Option<&str>) -> tracing::Level {
    match level_str.map(|s| s.to_uppercase()) {
        None => tracing::Level::INFO,
        Some(s) => match s.as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
    }
}

fn setup_logging(level_str: Option<&str>, log_file: Option<&Path>) -> Result<()> {
    // Can't log here yet, the subscriber is not installed
    let level = parse_level(level_str);
    let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

    match log_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).context("Failed to create log directory")?;
            }
            let file = fs::File::create(path).context("Failed to create log file")?;
            tracing_subscriber::fmt()
                .with_writer(file)
                .with_ansi(false)
                .with_env_filter(filter)
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_writer(std::io::stderr)
                .with_env_filter(filter)
                .init();
        }
    }

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    cli.apply_overrides(&mut config);

    setup_logging(config.log_level.as_deref(), cli.log_file.as_deref()).context("Failed to setup logging")?;
    config.validate().context("Invalid configuration")?;

    let operator: Arc<dyn Operator> = match cli.assumed_answer() {
        Some(answer) => {
            debug!(answer, "main: prompts answered automatically");
            Arc::new(FixedAnswer(answer))
        }
        None => Arc::new(TerminalOperator),
    };

    let outcome = run_import(&config, operator).await?;
    print_summary(&outcome);
    Ok(())
}

async fn run_import(config: &Config, operator: Arc<dyn Operator>) -> Result<RunOutcome> {
    debug!("run_import: called");
    let credentials = config.credential_pool()?;
    let endpoints = Endpoints::new(&config.remote.url)?;
    let transport = ReqwestTransport::new(config.timeout()).context("Failed to build HTTP client")?;
    let executor = Arc::new(RequestExecutor::new(Arc::new(transport), config.retry_policy()));

    verify_credentials(&executor, &endpoints, credentials.first())
        .await
        .context("Credential check failed")?;
    if credentials.count() > 1 {
        info!(count = credentials.count(), "Spreading requests across credential pairs");
    }

    let version = remote_version(&executor, &endpoints, credentials.first())
        .await
        .context("Failed to read remote version")?;

    let options = config.source_options()?;
    let plan = ImportPlan::load(&options, version).context("Failed to load import input")?;
    if plan.task_count() == 0 {
        warn!("Nothing to import");
    }

    let started = Local::now();
    info!(started = %started.format("%Y-%m-%d %H:%M:%S"), "Import starting");
    let pipeline = Pipeline::new(config.pipeline_config(), executor, endpoints, credentials, operator);
    let outcome = pipeline.run(plan).await?;
    info!(finished = %Local::now().format("%Y-%m-%d %H:%M:%S"), "Import finished");
    Ok(outcome)
}

fn print_summary(outcome: &RunOutcome) {
    let stats = &outcome.stats;
    println!();
    println!("{}", "Import summary".bright_cyan().bold());
    println!("  Rounds:    {}", outcome.rounds);
    println!("  Applied:   {}", stats.applied.to_string().green());
    println!("  Skipped:   {}", stats.skipped);
    println!("  Dropped:   {}", stats.dropped.to_string().yellow());
    println!("  Repaired:  {}", stats.repaired);
    let residual = outcome.residual.len();
    let residual = if residual == 0 {
        residual.to_string().green()
    } else {
        residual.to_string().red()
    };
    println!("  Failed:    {}", residual);
    println!("  Elapsed:   {:.1?}", outcome.elapsed);
    if outcome.manual_break {
        println!(
            "  {}",
            format!("Manual break: {} in-flight tasks were not waited for", outcome.abandoned).yellow()
        );
    }
}
