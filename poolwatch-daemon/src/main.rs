use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;

use poolwatch_core::config::PoolwatchConfig;
use poolwatch_daemon::cli::DaemonCli;
use poolwatch_daemon::logging;
use poolwatch_daemon::orchestrator::Orchestrator;

/// Exit code for an invalid configuration.
const EXIT_CONFIG: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = DaemonCli::parse();

    let config = match load_config(&cli).await {
        Ok(config) => config,
        Err(e) => {
            eprintln!("poolwatch-daemon: {e:#}");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    if cli.validate {
        println!("configuration OK: {}", cli.config.display());
        return ExitCode::SUCCESS;
    }

    if let Err(e) = logging::init_tracing(&config.general) {
        eprintln!("poolwatch-daemon: {e:#}");
        return ExitCode::FAILURE;
    }

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "poolwatch-daemon exited with error");
            ExitCode::FAILURE
        }
    }
}

/// Defaults, then the config file, then environment, then CLI flags.
async fn load_config(cli: &DaemonCli) -> Result<PoolwatchConfig> {
    let mut config = PoolwatchConfig::load_or_default(&cli.config)
        .await
        .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?;
    cli.apply_overrides(&mut config);
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {}", e))?;
    Ok(config)
}

async fn run(config: PoolwatchConfig) -> Result<()> {
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "poolwatch-daemon starting");
    let mut orchestrator = Orchestrator::build_from_config(config)?;
    orchestrator.run().await?;
    tracing::info!("poolwatch-daemon shut down");
    Ok(())
}
