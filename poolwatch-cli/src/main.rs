use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use poolwatch_cli::cli::{Cli, Commands};
use poolwatch_cli::commands;
use poolwatch_cli::error::CliError;
use poolwatch_cli::output::OutputWriter;
use poolwatch_core::config::PoolwatchConfig;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // logs go to stderr so JSON output on stdout stays parseable
    let level = cli.log_level.as_deref().unwrap_or("warn");
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("poolwatch: {e}");
            ExitCode::from(u8::try_from(e.exit_code()).unwrap_or(1))
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let writer = OutputWriter::new(cli.output);
    match cli.command {
        Commands::Config(args) => commands::config::execute(args, &cli.config, &writer).await,
        Commands::Breaches(args) => {
            let config = load_viewer_config(&cli.config).await?;
            commands::breaches::execute(args, &config, &writer).await
        }
        Commands::Maintenance(args) => {
            let config = load_viewer_config(&cli.config).await?;
            commands::maintenance::execute(args, &config, &writer).await
        }
    }
}

/// Breach and maintenance commands only touch state files, so the webhook
/// URL is not required.
async fn load_viewer_config(path: &Path) -> Result<PoolwatchConfig, CliError> {
    let config = PoolwatchConfig::load_or_default(path).await?;
    config.validate_for_viewer()?;
    Ok(config)
}
