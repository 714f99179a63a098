//! Kaffine - a local package manager for KRM functions

use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use kaffine_core::KaffinePaths;

mod commands;

/// Log levels
#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_filter_directive(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

#[derive(Parser, Debug)]
#[clap(
    name = "kaffine",
    about = "Manage KRM function catalogs and installed functions",
    version
)]
struct Cli {
    #[clap(subcommand)]
    command: commands::Command,

    /// Set log level
    #[clap(long, default_value = "warn", global = true)]
    log_level: LogLevel,

    /// State directory (defaults to $KAFFINE_DIR, then the nearest .kaffine)
    #[clap(long, global = true)]
    dir: Option<PathBuf>,
}

/// Initialize tracing from the --log-level flag
///
/// `RUST_LOG` directives are added on top when set.
fn initialize_tracing(log_level: &LogLevel) {
    let mut filter = EnvFilter::new(log_level.to_filter_directive());

    if let Ok(extra) = std::env::var(EnvFilter::DEFAULT_ENV) {
        for directive in extra.split(',').filter(|d| !d.is_empty()) {
            if let Ok(parsed) = directive.parse() {
                filter = filter.add_directive(parsed);
            }
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr) // stdout carries command output
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    initialize_tracing(&cli.log_level);

    let paths = KaffinePaths::resolve(cli.dir)?;
    tracing::debug!("Using state directory {}", paths.root().display());

    cli.command.execute(paths)
}
