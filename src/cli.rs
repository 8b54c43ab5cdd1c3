//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `psh`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "psh",
    version,
    about = "A small pipeline shell.",
    long_about = None
)]
pub struct CliArgs {
    /// Evaluate a single command line and exit with its status.
    #[arg(short = 'c', value_name = "COMMAND")]
    pub command: Option<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `PSH_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

pub fn parse() -> CliArgs {
    CliArgs::parse()
}
