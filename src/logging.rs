use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, fmt::writer::BoxMakeWriter, prelude::*, EnvFilter, Layer, Registry};

use crate::config::{LogConfig, LogFormat, LogOutput};
use crate::error::AppError;

/// Initialize tracing from the `log` section of the config.
///
/// - Format: `json` (one object per line) or `text` (compact, human-readable)
/// - Output: stdout, or a daily-rotated file keeping `max_files` files
/// - Level: `log.level`, overridden by `RUST_LOG` when set
///
/// The returned guard flushes the file writer on drop; hold it for the life
/// of the process.
pub fn init(config: &LogConfig) -> Result<Option<WorkerGuard>, AppError> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| AppError::Config(format!("invalid log level '{}': {e}", config.level)))?;

    let (writer, guard) = match config.output {
        LogOutput::Stdout => (BoxMakeWriter::new(std::io::stdout), None),
        LogOutput::File => {
            let dir = config
                .file
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| std::path::Path::new("."));
            let prefix = config
                .file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "app.log".into());
            std::fs::create_dir_all(dir)?;

            let appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix(prefix)
                .max_log_files(config.max_files.max(1))
                .build(dir)
                .map_err(|e| AppError::Config(format!("failed to open log file: {e}")))?;
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            (BoxMakeWriter::new(non_blocking), Some(guard))
        }
    };

    let layer: Box<dyn Layer<Registry> + Send + Sync> = match config.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_current_span(true)
            .with_writer(writer)
            .with_filter(env_filter)
            .boxed(),
        LogFormat::Text => fmt::layer()
            .compact()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(config.output == LogOutput::Stdout)
            .with_writer(writer)
            .with_filter(env_filter)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(layer)
        .try_init()
        .map_err(|e| AppError::Internal(format!("failed to initialize logging: {e}")))?;

    tracing::debug!("Tracing initialized");
    Ok(guard)
}
