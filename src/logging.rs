//! Diagnostic logging to stderr.
//!
//! Verbosity comes from `--log-level` / `BOSUN_LOG_LEVEL`. `RUST_LOG`, when
//! set, takes over entirely.

use clap::ValueEnum;
use tracing_subscriber::EnvFilter;

/// Log verbosity accepted on the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Debug,
    Info,
    #[default]
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Filter directive for a level, scoped to this crate.
pub fn directive(level: LogLevel) -> String {
    format!("{}={}", env!("CARGO_CRATE_NAME"), level)
}

/// Install the global subscriber. Safe to call more than once.
pub fn init(level: LogLevel) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive(level)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
