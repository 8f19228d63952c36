//! Daemon runner -- pipeline assembly, input feeding, and shutdown.
//!
//! The [`Runner`] owns the loaded configuration and the ingestion
//! pipeline. It feeds lines from an async reader (stdin in production)
//! into the pipeline's background queue and stops on EOF or on a
//! shutdown signal.
//!
//! # Shutdown
//!
//! * EOF: waits (bounded) for the background queue to drain, then stops
//!   the worker.
//! * Signal: stops the worker immediately; lines still queued are discarded.

use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::Result;
use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_util::sync::CancellationToken;

use logsift_core::config::LogsiftConfig;
use logsift_core::types::RawLine;
use logsift_pipeline::{IngestionPipeline, PipelineConfig, PipelineStats};

/// Upper bound for waiting on the queue to drain after EOF.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Poll interval while waiting for the queue to drain.
const DRAIN_POLL: Duration = Duration::from_millis(10);

/// Why feeding stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The reader reached end of input.
    EndOfInput,
    /// A shutdown was requested.
    Shutdown,
}

/// Outcome of one feeding session.
#[derive(Debug, Clone, Serialize)]
pub struct FeedReport {
    /// Lines read from the input.
    pub lines_read: u64,
    /// Lines rejected because the queue was full.
    pub lines_rejected: u64,
    /// Why feeding stopped.
    pub stop_reason: StopReason,
    /// Pipeline statistics after the worker stopped.
    pub stats: PipelineStats,
}

/// The daemon runner.
pub struct Runner {
    /// Loaded and validated configuration.
    config: LogsiftConfig,
    /// The ingestion pipeline.
    pipeline: IngestionPipeline,
    /// Runner start time.
    start_time: Instant,
}

impl Runner {
    /// Load configuration from `config_path` and build the runner.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file cannot be read,
    /// parsed, or validated.
    pub async fn build(config_path: &Path) -> Result<Self> {
        let config = LogsiftConfig::load(config_path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?;
        Self::build_from_config(config).await
    }

    /// Build from an already-loaded configuration.
    ///
    /// Loads the pattern file named in `[pipeline]`; a missing or broken
    /// pattern file falls back to the built-in defaults.
    pub async fn build_from_config(config: LogsiftConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        let pipeline_config = PipelineConfig::from_core(&config);
        let pipeline = IngestionPipeline::from_config(pipeline_config)
            .await
            .map_err(|e| anyhow::anyhow!("failed to build ingestion pipeline: {}", e))?;

        let patterns = pipeline.registry().stats();
        tracing::info!(
            source = %pipeline.registry().source(),
            patterns = patterns.total_patterns,
            levels = patterns.total_levels,
            "log patterns loaded"
        );

        Ok(Self {
            config,
            pipeline,
            start_time: Instant::now(),
        })
    }

    /// The loaded configuration.
    pub fn config(&self) -> &LogsiftConfig {
        &self.config
    }

    /// The ingestion pipeline.
    pub fn pipeline(&self) -> &IngestionPipeline {
        &self.pipeline
    }

    /// Pattern problems found by the registry (empty when healthy).
    pub fn validate_patterns(&self) -> Vec<String> {
        self.pipeline.validate_configuration()
    }

    /// Feed lines from `reader` into the background queue under `key`.
    ///
    /// Starts the background worker, reads until EOF or until `shutdown`
    /// is cancelled, then stops the worker.
    ///
    /// # Errors
    ///
    /// Returns an error if reading from `reader` fails. The worker is
    /// stopped before the error is returned.
    pub async fn feed<R>(&self, mut reader: R, key: &str, shutdown: CancellationToken) -> Result<FeedReport>
    where
        R: AsyncBufRead + Unpin,
    {
        self.pipeline.start_background_processing().await;

        let mut buf = Vec::new();
        let mut lines_read = 0u64;
        let mut lines_rejected = 0u64;

        let outcome: Result<StopReason> = loop {
            buf.clear();
            let read = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break Ok(StopReason::Shutdown),
                read = reader.read_until(b'\n', &mut buf) => read,
            };

            match read {
                Ok(0) => break Ok(StopReason::EndOfInput),
                Ok(_) => {
                    lines_read += 1;
                    let line = String::from_utf8_lossy(&buf);
                    let raw = RawLine::new(line.trim_end_matches(['\r', '\n']), key);
                    if !self.pipeline.enqueue_raw(raw) {
                        lines_rejected += 1;
                    }
                }
                Err(e) => break Err(anyhow::anyhow!("failed to read input: {}", e)),
            }
        };

        if matches!(outcome, Ok(StopReason::EndOfInput)) {
            self.wait_for_drain(&shutdown).await;
        }
        self.pipeline.stop_background_processing().await;

        let stop_reason = outcome?;
        tracing::info!(
            lines_read,
            lines_rejected,
            reason = ?stop_reason,
            elapsed_ms = self.start_time.elapsed().as_millis() as u64,
            "input feeding finished"
        );

        Ok(FeedReport {
            lines_read,
            lines_rejected,
            stop_reason,
            stats: self.pipeline.get_stats(),
        })
    }

    async fn wait_for_drain(&self, shutdown: &CancellationToken) {
        let deadline = Instant::now() + DRAIN_TIMEOUT;
        while self.pipeline.queue_depth() > 0 {
            if Instant::now() >= deadline {
                tracing::warn!(
                    remaining = self.pipeline.queue_depth(),
                    "queue did not drain before timeout"
                );
                return;
            }
            tokio::select! {
                _ = shutdown.cancelled() => return,
                _ = tokio::time::sleep(DRAIN_POLL) => {}
            }
        }
    }

    /// Run the daemon: feed stdin under `key` until EOF or a shutdown signal.
    pub async fn run(self, key: &str) -> Result<FeedReport> {
        let shutdown = CancellationToken::new();

        let signal_token = shutdown.clone();
        let signal_task = tokio::spawn(async move {
            match wait_for_shutdown_signal().await {
                Ok(signal) => {
                    tracing::info!(signal = signal, "shutdown signal received");
                    signal_token.cancel();
                }
                Err(e) => tracing::error!(error = %e, "failed to wait for shutdown signal"),
            }
        });

        tracing::info!(key, "reading log lines from stdin");
        let stdin = tokio::io::BufReader::new(tokio::io::stdin());
        let report = self.feed(stdin, key, shutdown).await;

        signal_task.abort();
        report
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
///
/// Returns the name of the signal that triggered the shutdown.
///
/// # Errors
///
/// Returns an error if signal handlers cannot be installed.
#[cfg(unix)]
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("failed to install Ctrl-C handler: {}", e))?;
    Ok("CTRL_C")
}
