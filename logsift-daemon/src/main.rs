use anyhow::Result;
use clap::Parser;

use logsift_core::config::LogsiftConfig;
use logsift_daemon::cli::DaemonCli;
use logsift_daemon::logging::init_tracing;
use logsift_daemon::runner::Runner;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();

    let config = load_config(&cli).await?;
    init_tracing(&config.general)?;
    // No-op until a metrics recorder is installed by the embedding process.
    logsift_core::metrics::describe_all();

    tracing::info!(config = %cli.config.display(), "logsift-daemon starting");
    let runner = Runner::build_from_config(config).await?;

    if cli.validate {
        let problems = runner.validate_patterns();
        if problems.is_empty() {
            println!("configuration OK");
            return Ok(());
        }
        for problem in &problems {
            eprintln!("{problem}");
        }
        anyhow::bail!("{} pattern problem(s) found", problems.len());
    }

    let report = runner.run(&cli.key).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    tracing::info!("logsift-daemon shut down");
    Ok(())
}

/// Load the configuration file and apply CLI overrides.
///
/// A missing file at the default location is not an error: built-in
/// defaults plus environment overrides are used instead.
async fn load_config(cli: &DaemonCli) -> Result<LogsiftConfig> {
    let mut config = if cli.uses_default_config() && !cli.config.exists() {
        let mut config = LogsiftConfig::default();
        config.apply_env_overrides();
        config
    } else {
        LogsiftConfig::load(&cli.config)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?
    };

    if let Some(level) = &cli.log_level {
        config.general.log_level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        config.general.log_format = format.clone();
    }
    if let Some(patterns) = &cli.patterns {
        config.pipeline.pattern_file = patterns.display().to_string();
    }

    config
        .validate()
        .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;
    Ok(config)
}
