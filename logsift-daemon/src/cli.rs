//! CLI argument definitions for logsift-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/logsift/logsift.toml";

/// logsift log classification daemon.
///
/// Reads log lines from standard input, classifies them by severity
/// and keeps them in bounded in-memory buffers. Prints aggregated
/// statistics as JSON on shutdown.
#[derive(Parser, Debug)]
#[command(name = "logsift-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to logsift.toml configuration file.
    ///
    /// A missing file at the default location falls back to built-in defaults.
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Process key attached to every line read from stdin.
    #[arg(short, long, default_value = "stdin")]
    pub key: String,

    /// Override the pattern file (takes precedence over the config file).
    #[arg(long)]
    pub patterns: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration and patterns, then exit without reading input.
    #[arg(long)]
    pub validate: bool,
}

impl DaemonCli {
    /// Whether `--config` still points at the default location.
    pub fn uses_default_config(&self) -> bool {
        self.config.as_os_str() == DEFAULT_CONFIG_PATH
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_applied() {
        let cli = DaemonCli::parse_from(["logsift-daemon"]);
        assert!(cli.uses_default_config());
        assert_eq!(cli.key, "stdin");
        assert!(cli.patterns.is_none());
        assert!(!cli.validate);
    }

    #[test]
    fn overrides_are_parsed() {
        let cli = DaemonCli::parse_from([
            "logsift-daemon",
            "--config",
            "/tmp/logsift.toml",
            "--key",
            "web",
            "--patterns",
            "/tmp/patterns.yaml",
            "--log-level",
            "debug",
            "--log-format",
            "pretty",
            "--validate",
        ]);
        assert!(!cli.uses_default_config());
        assert_eq!(cli.key, "web");
        assert_eq!(cli.patterns, Some(PathBuf::from("/tmp/patterns.yaml")));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert_eq!(cli.log_format.as_deref(), Some("pretty"));
        assert!(cli.validate);
    }
}
