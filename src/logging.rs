use crate::config::LoggingConfig;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber: console output always, plus a rolling log
/// file when enabled in the config.
///
/// Returns the flush guard for the file writer. Buffered file output stops
/// the moment the guard drops, so the caller keeps it alive for the process
/// lifetime (this is a long-running server, main holds it until shutdown).
pub fn init(config: &LoggingConfig) -> Option<WorkerGuard> {
    // info unless RUST_LOG says otherwise
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_layer, guard) = match file_writer(config) {
        Some((writer, guard)) => (
            Some(fmt::layer().with_writer(writer).with_ansi(false)),
            Some(guard),
        ),
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();

    guard
}

/// Build the non-blocking writer for the configured log file, or `None` when
/// file logging is off or the directory cannot be created.
fn file_writer(config: &LoggingConfig) -> Option<(NonBlocking, WorkerGuard)> {
    if !config.enabled {
        return None;
    }

    if let Err(e) = std::fs::create_dir_all(&config.directory) {
        eprintln!(
            "cannot create log directory {}, file logging disabled: {}",
            config.directory, e
        );
        return None;
    }

    let appender = RollingFileAppender::new(
        rotation(&config.rotation),
        &config.directory,
        &config.file_prefix,
    );

    Some(tracing_appender::non_blocking(appender))
}

fn rotation(spec: &str) -> Rotation {
    match spec {
        "hourly" => Rotation::HOURLY,
        "never" => Rotation::NEVER,
        _ => Rotation::DAILY,
    }
}
