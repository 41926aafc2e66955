//! Logging initialization
//!
//! Human-readable output on stderr plus a daily-rotated file under `LOG_DIR`
//! (default `logs/`). The filter comes from `RUST_LOG`, then `LOG_LEVEL`.

use std::fs;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "terminal=info,lib_swap=info,lib_solana=info,lib_core=info,warn";
const LOG_FILE_NAME: &str = "swap.log";

/// Logging configuration from environment variables
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub log_dir: PathBuf,
    pub log_level: String,
}

impl LogConfig {
    pub fn from_env() -> Self {
        Self {
            log_dir: std::env::var("LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("logs")),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| DEFAULT_FILTER.to_string()),
        }
    }
}

/// Initialize the logging system.
///
/// The returned guard flushes the file writer on drop; keep it alive for the
/// lifetime of the program.
pub fn init() -> Option<WorkerGuard> {
    let config = LogConfig::from_env();

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact();

    if let Err(e) = fs::create_dir_all(&config.log_dir) {
        eprintln!("Warning: Failed to create log directory: {}", e);
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
        return None;
    }

    let file_appender = tracing_appender::rolling::daily(&config.log_dir, LOG_FILE_NAME);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    tracing::debug!(
        log_dir = %config.log_dir.display(),
        log_level = %config.log_level,
        "Logging initialized"
    );

    setup_panic_hook();
    Some(guard)
}

/// Log panics before the default hook prints them.
fn setup_panic_hook() {
    let default_panic = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let location = panic_info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
            .unwrap_or_else(|| "unknown location".to_string());

        tracing::error!(location = %location, "Panic: {}", panic_info);
        default_panic(panic_info);
    }));
}
