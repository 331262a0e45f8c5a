//! CLI module for the `gwpush` binary.
//!
//! Argument definitions, target construction and output formatting. The
//! command handlers themselves live in the binary.

mod commands;
mod output;
mod target;

pub use commands::{Cli, Commands, ModeArg, OutputFormat, TargetArgs, parse_header};
pub use output::{OutputFormatter, TargetStatus};
pub use target::{admin_client, connect, connect_all, fingerprint_store};
