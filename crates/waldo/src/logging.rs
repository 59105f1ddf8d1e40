//! Diagnostic logging for the CLI.
//!
//! Diagnostics go to stderr through `tracing`; the prose the user is meant to
//! read (prompts, summaries, progress) is written to stdout by the commands
//! themselves.
//!
//! Level resolution, first match wins:
//!
//! 1. `RUST_LOG`, as a full `EnvFilter` directive string
//! 2. `WALDO_LOG_LEVEL` (`trace`, `debug`, `info`, `warn`, `error`)
//! 3. `warn`, or `debug` under `--verbose`

use std::env;
use std::sync::Once;
use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

/// Environment variable naming the default log level.
pub const LOG_LEVEL_ENV: &str = "WALDO_LOG_LEVEL";

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: Level,
    /// Include the module target (e.g. `waldo_core::detect`) in each line.
    pub include_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::WARN,
            include_target: false,
        }
    }
}

impl LoggingConfig {
    /// Builds the configuration from `WALDO_LOG_LEVEL` and the verbose flag.
    pub fn from_env(verbose: bool) -> Self {
        Self::resolve(env::var(LOG_LEVEL_ENV).ok().as_deref(), verbose)
    }

    fn resolve(level: Option<&str>, verbose: bool) -> Self {
        let fallback = if verbose { Level::DEBUG } else { Level::WARN };
        let level = level.and_then(parse_level).unwrap_or(fallback);
        Self {
            level,
            include_target: level >= Level::DEBUG,
        }
    }
}

/// Parses a level name case-insensitively.
pub fn parse_level(value: &str) -> Option<Level> {
    match value.trim().to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" | "warning" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

/// Installs the stderr subscriber. Later calls are ignored.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.level.as_str().to_lowercase()));

        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(config.include_target)
                    .without_time(),
            )
            .try_init();
    });
}
