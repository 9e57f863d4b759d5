//! Logging setup.
//!
//! Installs a `tracing` subscriber that writes to stderr and, optionally, to a
//! log file. The filter comes from `RUST_LOG` when set, `repsense=info`
//! otherwise.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Default filter when `RUST_LOG` is not set.
pub const DEFAULT_LOG_FILTER: &str = "repsense=info";

/// Keeps the file writer alive. Dropping it flushes and closes the log file.
#[derive(Debug)]
pub struct LoggingGuard {
    _file: Option<WorkerGuard>,
}

/// Initializes global logging.
///
/// # Arguments
///
/// * `verbose` - Use `repsense=debug` when `RUST_LOG` is not set
/// * `log_file` - Also append plain-text logs to this file
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
pub fn init_logging(
    verbose: bool,
    log_file: Option<&Path>,
) -> Result<LoggingGuard, tracing_subscriber::util::TryInitError> {
    let default_filter = if verbose {
        "repsense=debug"
    } else {
        DEFAULT_LOG_FILTER
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let directory = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let file_name = path
                .file_name()
                .map(|n| n.to_os_string())
                .unwrap_or_else(|| "repsense.log".into());
            let appender = tracing_appender::rolling::never(directory, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()?;

    Ok(LoggingGuard { _file: guard })
}
