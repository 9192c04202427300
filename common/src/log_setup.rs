use std::sync::OnceLock;

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

fn env_filter(base_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(base_level))
        .unwrap_or_else(|e| panic!("Invalid log filter: {}", e))
}

/// Installs console and rolling-file logging for a binary.
///
/// `RUST_LOG` overrides `base_level`. Files land in `logs/<file_prefix>.<date>.log`,
/// rotated daily with the last five kept.
pub fn setup_logging(base_level: &str, file_prefix: &str) {
    std::fs::create_dir_all("logs")
        .unwrap_or_else(|e| panic!("Failed to create logs directory: {}", e));

    let file_appender = tracing_appender::rolling::Builder::new()
        .rotation(tracing_appender::rolling::Rotation::DAILY)
        .filename_prefix(file_prefix)
        .filename_suffix("log")
        .max_log_files(5)
        .build("logs")
        .unwrap_or_else(|e| panic!("Failed to create log file appender: {}", e));

    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
    LOG_GUARD.set(guard).expect("Logging already initialized");

    let console_writer = std::io::stdout.and(std::io::stderr.with_min_level(Level::WARN));

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(true)
        .with_writer(console_writer);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(false)
        .with_writer(file_writer);

    tracing_subscriber::registry()
        .with(env_filter(base_level))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .unwrap_or_else(|e| panic!("Logger initialization failed: {}", e));
}

/// Console-only logging for tests. Safe to call from every test.
pub fn setup_test_logging() {
    static INIT: OnceLock<()> = OnceLock::new();
    INIT.get_or_init(|| {
        // Another harness may have installed a subscriber already.
        let _ = tracing_subscriber::fmt()
            .with_env_filter(env_filter("warn"))
            .with_test_writer()
            .try_init();
    });
}
