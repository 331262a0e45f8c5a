//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::admin::DEFAULT_TIMEOUT_SECS;
use crate::error::ConfigError;
use crate::sync::DEFAULT_CONCURRENCY;

/// gwpush - idempotent configuration pushes to API gateway proxies.
#[derive(Parser, Debug)]
#[command(name = "gwpush")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the desired configuration file.
    #[arg(short, long, global = true, env = "GWPUSH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Custom entities document merged into Direct-Apply pushes.
    #[arg(long, global = true, env = "GWPUSH_OVERLAY")]
    pub overlay: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines.
    #[arg(long, global = true, env = "GWPUSH_LOG_JSON")]
    pub log_json: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Push the desired configuration once.
    Push {
        /// Target selection.
        #[command(flatten)]
        target: TargetArgs,

        /// Push even if the configuration is unchanged.
        #[arg(short, long)]
        force: bool,

        /// Directory holding the last applied fingerprints.
        #[arg(long, env = "GWPUSH_STATE_DIR")]
        state_dir: Option<PathBuf>,

        /// Print push metrics after the run.
        #[arg(long)]
        print_metrics: bool,
    },

    /// Push periodically until interrupted.
    Sync {
        /// Target selection.
        #[command(flatten)]
        target: TargetArgs,

        /// Seconds between pushes.
        #[arg(long, default_value = "30")]
        interval_secs: u64,

        /// Directory holding the last applied fingerprints.
        #[arg(long, env = "GWPUSH_STATE_DIR")]
        state_dir: Option<PathBuf>,

        /// Print push metrics on exit.
        #[arg(long)]
        print_metrics: bool,
    },

    /// Print the content fingerprint of the desired configuration.
    Fingerprint,

    /// Show what each target reports.
    Status {
        /// Target selection.
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Validate the desired configuration.
    Validate {
        /// Show all warnings, not just errors.
        #[arg(short, long)]
        warnings: bool,
    },

    /// Show the entity changes a reconciled push would make.
    Plan {
        /// Target selection.
        #[command(flatten)]
        target: TargetArgs,
    },
}

/// Arguments selecting and describing runtime targets.
#[derive(Args, Debug, Clone)]
pub struct TargetArgs {
    /// Admin API base URL (repeat or comma-separate for several targets).
    #[arg(
        long = "admin-url",
        env = "GWPUSH_ADMIN_URL",
        value_delimiter = ',',
        required = true
    )]
    pub admin_urls: Vec<String>,

    /// Extra header sent to every admin call, as `name:value`.
    #[arg(long = "admin-header", value_name = "NAME:VALUE")]
    pub admin_headers: Vec<String>,

    /// Delivery mode; `auto` asks the target.
    #[arg(long, value_enum, default_value = "auto")]
    pub mode: ModeArg,

    /// Maximum in-flight operations for reconciled pushes.
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,

    /// Leave CA certificates unmanaged.
    #[arg(long)]
    pub skip_ca_certificates: bool,

    /// Per-request and per-push timeout, in seconds.
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout_secs: u64,
}

impl TargetArgs {
    /// Parses the `--admin-header` values.
    ///
    /// # Errors
    ///
    /// Returns an error for a value without a `:` or with an empty name.
    pub fn headers(&self) -> Result<Vec<(String, String)>, ConfigError> {
        self.admin_headers.iter().map(|h| parse_header(h)).collect()
    }
}

/// Parses a `name:value` header.
///
/// # Errors
///
/// Returns an error for a value without a `:` or with an empty name.
pub fn parse_header(raw: &str) -> Result<(String, String), ConfigError> {
    let (name, value) = raw.split_once(':').ok_or_else(|| {
        ConfigError::validation(
            format!("Header '{raw}' is not in name:value form"),
            "admin_header",
        )
    })?;
    let name = name.trim();
    if name.is_empty() {
        return Err(ConfigError::validation(
            format!("Header '{raw}' has an empty name"),
            "admin_header",
        ));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

/// Delivery mode selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ModeArg {
    /// Discover from the target's root endpoint.
    #[default]
    Auto,
    /// Force Direct-Apply.
    Direct,
    /// Force Reconciled-Apply.
    Reconciled,
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

impl Cli {
    /// Parses CLI arguments from the command line.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_push() {
        let cli = Cli::try_parse_from([
            "gwpush",
            "push",
            "--admin-url",
            "http://a:8001,http://b:8001",
            "--admin-header",
            "Kong-Admin-Token: secret",
            "--mode",
            "reconciled",
            "--force",
        ])
        .expect("parse");

        let Commands::Push { target, force, .. } = cli.command else {
            panic!("expected push");
        };
        assert!(force);
        assert_eq!(target.admin_urls, ["http://a:8001", "http://b:8001"]);
        assert_eq!(target.mode, ModeArg::Reconciled);
        assert_eq!(target.concurrency, DEFAULT_CONCURRENCY);
        assert_eq!(
            target.headers().expect("headers"),
            [("Kong-Admin-Token".to_string(), "secret".to_string())]
        );
    }

    #[test]
    fn test_parse_header_errors() {
        assert!(parse_header("no-colon").is_err());
        assert!(parse_header(" :value").is_err());
        assert_eq!(
            parse_header("X-A:b:c").expect("header"),
            ("X-A".to_string(), "b:c".to_string())
        );
    }
}
