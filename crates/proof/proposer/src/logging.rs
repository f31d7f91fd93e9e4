//! Tracing subscriber setup.

use std::io;

use clap::ValueEnum;
use tracing::{Subscriber, level_filters::LevelFilter};
use tracing_subscriber::{
    EnvFilter, Layer, fmt::time::SystemTime, layer::SubscriberExt, registry::LookupSpan,
    util::SubscriberInitExt,
};

/// Stdout log format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Timestamp, level, target, spans and fields.
    #[default]
    Full,
    /// Level, target and message only.
    Compact,
    /// One JSON object per event.
    Json,
}

/// Stdout layer configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StdoutLogConfig {
    /// Output format.
    pub format: LogFormat,
}

/// Process-wide logging configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogConfig {
    /// Default level, overridable with `RUST_LOG`.
    pub global_level: LevelFilter,
    /// Stdout layer; `None` when quiet.
    pub stdout_logs: Option<StdoutLogConfig>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            global_level: LevelFilter::INFO,
            stdout_logs: Some(StdoutLogConfig { format: LogFormat::Full }),
        }
    }
}

/// Maps a `-v` count to a level filter: 1=ERROR, 2=WARN, 3=INFO, 4=DEBUG, 5+=TRACE.
/// Zero turns logging off.
pub const fn verbosity_to_level_filter(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::OFF,
        1 => LevelFilter::ERROR,
        2 => LevelFilter::WARN,
        3 => LevelFilter::INFO,
        4 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

impl LogConfig {
    /// Installs the global subscriber. Fails if one is already set.
    pub fn init_tracing_subscriber(&self) -> eyre::Result<()> {
        let filter =
            EnvFilter::builder().with_default_directive(self.global_level.into()).from_env_lossy();

        tracing_subscriber::registry()
            .with(filter)
            .with(self.stdout_logs.as_ref().map(build_stdout_layer))
            .try_init()
            .map_err(|e| eyre::eyre!("Failed to initialize tracing subscriber: {e}"))
    }
}

fn build_stdout_layer<S>(config: &StdoutLogConfig) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a> + Send + Sync,
{
    let base = tracing_subscriber::fmt::layer()
        .with_writer(io::stdout)
        .with_ansi(config.format != LogFormat::Json)
        .with_timer(SystemTime);

    match config.format {
        LogFormat::Full => Box::new(base),
        LogFormat::Compact => Box::new(base.compact()),
        LogFormat::Json => Box::new(base.json()),
    }
}
