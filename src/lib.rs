//! HAProxy configuration manager.
//!
//! Stores configuration sections, assembles the newest version of each into
//! one file, checks it with `haproxy -c` and deploys it with a backup and a
//! daemon reload.

pub mod api;
pub mod assemble;
pub mod cli;
pub mod config;
pub mod error;
pub mod haproxy;
pub mod metrics;
pub mod pipeline;
pub mod section;
pub mod store;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::cli::{Cli, Commands, ServeArgs};
use crate::config::model::StoreBackend;
use crate::config::AppConfig;
use crate::metrics::Metrics;
use crate::pipeline::Pipeline;

/// Runs the command selected on the command line.
pub async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();

    // Logging needs a level before the file is parsed; a bad file is reported
    // through the subscriber set up here.
    let level = match cli.log_level() {
        Some(level) => level.to_string(),
        None => peek_log_level(config_path),
    };
    setup_logging(&level)?;

    match cli.command {
        Commands::Serve(args) => serve(args, config_path).await,
        Commands::ConfigValidate => validate_config(config_path),
        Commands::ConfigShow => show_config(config_path),
        Commands::Preview => preview(config_path).await,
        Commands::Generate => generate(config_path).await,
        Commands::Check => check(config_path).await,
        Commands::Deploy => deploy(config_path).await,
    }
}

/// Initializes the tracing subscriber for structured logging.
fn setup_logging(level: &str) -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    fmt()
        .with_env_filter(filter)
        .json()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

fn peek_log_level(path: Option<&Path>) -> String {
    path.and_then(|p| config::loader::load_from_path(p).ok())
        .map(|c| c.log_level)
        .unwrap_or_else(|| AppConfig::default().log_level)
}

async fn build_pipeline(config: &AppConfig) -> Result<Arc<Pipeline>> {
    let metrics = Arc::new(Metrics::new()?);
    let pipeline = Pipeline::from_config(config, metrics).await?;
    Ok(Arc::new(pipeline))
}

/// Loads settings and serves the HTTP API.
async fn serve(args: ServeArgs, config_path: Option<&Path>) -> Result<()> {
    let config = config::loader::load_and_validate(config_path)?;
    let bind = args.bind.unwrap_or_else(|| config.server.bind_address.clone());

    info!(
        store = ?config.store.backend,
        dev = %config.haproxy.dev_config_path.display(),
        prod = %config.haproxy.prod_config_path.display(),
        "Starting HAProxy configuration manager"
    );

    let pipeline = build_pipeline(&config).await?;
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;

    api::serve(listener, pipeline).await?;
    Ok(())
}

/// Validates the configuration file and reports any issues.
fn validate_config(config_path: Option<&Path>) -> Result<()> {
    let config = match config_path {
        Some(path) => config::loader::load_from_path(path)?,
        None => AppConfig::default(),
    };
    let result = config::validate_config(&config);
    println!("{}", config::format_report(&result, config_path));

    if !result.is_valid() {
        anyhow::bail!(error::ConfigError::ValidationFailed {
            error_count: result.error_count()
        });
    }
    Ok(())
}

/// Displays the effective configuration.
fn show_config(config_path: Option<&Path>) -> Result<()> {
    let config = config::loader::load_and_validate(config_path)?;
    let yaml = serde_yaml::to_string(&config)?;
    println!("{}", yaml);
    Ok(())
}

/// Warns when a one-shot command would read sections from a store that only
/// lives as long as this process. Returns true when the warning was logged.
fn warn_if_store_is_ephemeral(config: &AppConfig, command: &str) -> bool {
    if config.store.backend != StoreBackend::Memory {
        return false;
    }
    tracing::warn!(
        command,
        "The memory store starts empty in every process; set store.backend: redis to assemble the sections the server holds"
    );
    true
}

async fn preview(config_path: Option<&Path>) -> Result<()> {
    let config = config::loader::load_and_validate(config_path)?;
    warn_if_store_is_ephemeral(&config, "preview");
    let pipeline = build_pipeline(&config).await?;
    print!("{}", pipeline.preview().await?);
    Ok(())
}

async fn generate(config_path: Option<&Path>) -> Result<()> {
    let config = config::loader::load_and_validate(config_path)?;
    warn_if_store_is_ephemeral(&config, "generate");
    let pipeline = build_pipeline(&config).await?;
    let report = pipeline.generate().await?;
    println!(
        "Wrote {} section(s) to {}",
        report.sections,
        report.path.display()
    );
    Ok(())
}

async fn check(config_path: Option<&Path>) -> Result<()> {
    let config = config::loader::load_and_validate(config_path)?;
    let pipeline = build_pipeline(&config).await?;
    let report = pipeline.validate().await?;
    println!("Configuration is valid (return code {}).", report.return_code);
    for line in &report.diagnostics {
        println!("  {}", line);
    }
    Ok(())
}

async fn deploy(config_path: Option<&Path>) -> Result<()> {
    let config = config::loader::load_and_validate(config_path)?;
    let pipeline = build_pipeline(&config).await?;
    let report = pipeline.deploy().await?;
    println!(
        "Deployed {} ({:?}); previous configuration saved to {}",
        config.haproxy.prod_config_path.display(),
        report.method,
        report.backup_path.display()
    );
    for line in &report.diagnostics {
        println!("  {}", line);
    }
    Ok(())
}
