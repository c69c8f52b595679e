mod config;

use crate::config::{CommonConfig, Config, ConfigError};
use clap::{Args, Parser, Subcommand};
use metrics_exporter_statsd::StatsdBuilder;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

const METRICS_PREFIX: &str = "fincloud.bff";

#[derive(Parser)]
#[command(name = "fincloud", about = "FinCloud backend-for-frontend")]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Run the aggregation BFF
    Bff(BffArgs),
}

#[derive(Args)]
struct BffArgs {
    #[arg(long)]
    config_file: PathBuf,
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("could not start runtime: {0}")]
    Runtime(#[from] std::io::Error),
    #[error("could not install metrics recorder: {0}")]
    Metrics(String),
    #[error(transparent)]
    Bff(#[from] bff::errors::BffError),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        CliCommand::Bff(args) => match run_bff(args) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                tracing::error!(error = %e, "BFF exited with error");
                eprintln!("fincloud: {e}");
                ExitCode::FAILURE
            }
        },
    }
}

fn run_bff(args: BffArgs) -> Result<(), CliError> {
    let config = Config::from_file(&args.config_file)?;

    // Dropping the guard flushes pending events
    let _sentry = init_logging(&config.common);
    init_metrics(&config.common)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    tracing::info!(config_file = %args.config_file.display(), "Starting BFF");
    runtime.block_on(bff::run(config.bff))?;

    Ok(())
}

fn init_logging(common: &CommonConfig) -> Option<sentry::ClientInitGuard> {
    let guard = common.logging.as_ref().map(|logging| {
        sentry::init((
            logging.sentry_dsn.as_str(),
            sentry::ClientOptions {
                environment: logging.environment.clone().map(Into::into),
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(sentry::integrations::tracing::layer())
        .init();

    guard
}

fn init_metrics(common: &CommonConfig) -> Result<(), CliError> {
    let Some(metrics_config) = &common.metrics else {
        return Ok(());
    };

    let recorder = StatsdBuilder::from(&metrics_config.statsd_host, metrics_config.statsd_port)
        .build(Some(METRICS_PREFIX))
        .map_err(|e| CliError::Metrics(e.to_string()))?;

    metrics::set_global_recorder(recorder).map_err(|e| CliError::Metrics(e.to_string()))?;

    tracing::info!(
        host = %metrics_config.statsd_host,
        port = metrics_config.statsd_port,
        "Metrics reporting to statsd"
    );
    Ok(())
}
