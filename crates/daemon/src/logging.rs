//! Tracing subscriber setup for the pikaqfs binary

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::Config;

pub const LOG_FILE_PREFIX: &str = "pikaqfs.log";

/// Keeps the file writer flushing; hold it until exit
#[must_use]
pub struct LogGuard {
    _file: Option<WorkerGuard>,
}

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
pub fn init(config: &Config) -> LogGuard {
    let filter = env_filter(&config.log_level);
    let stderr_layer = fmt::layer().with_writer(std::io::stderr);

    let Some(log_dir) = &config.log_dir else {
        if let Err(e) = tracing_subscriber::registry()
            .with(filter)
            .with(stderr_layer)
            .try_init()
        {
            eprintln!("logging already initialized: {}", e);
        }
        return LogGuard { _file: None };
    };

    let appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let file_layer = fmt::layer().with_ansi(false).with_writer(writer);

    if let Err(e) = tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
    {
        eprintln!("logging already initialized: {}", e);
    }

    LogGuard { _file: Some(guard) }
}
