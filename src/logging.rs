//! Tracing configuration and log routing.
//!
//! Two layers share one `EnvFilter`: a compact stdout layer for operators and a non-blocking
//! file layer for later inspection. Both emit an event when a `summarize` span closes, so every
//! request leaves one line carrying its `request_id`, object key and busy/idle time even when
//! `RUST_LOG` hides the per-stage debug events.
//!
//! `DOCSUM_LOG_FILE` appends to a fixed path; without it the file layer rotates daily under
//! `logs/docsum.log.<date>`.
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, fmt::format::FmtSpan, prelude::*};

/// Filter applied when `RUST_LOG` is unset: service events at `info`, chatty HTTP and AWS
/// client internals at `warn`.
const DEFAULT_DIRECTIVES: &str = "info,hyper=warn,hyper_util=warn,reqwest=warn,h2=warn,object_store=warn";
const LOG_FILE_ENV: &str = "DOCSUM_LOG_FILE";
const DEFAULT_LOG_DIR: &str = "logs";
const DEFAULT_LOG_PREFIX: &str = "docsum.log";

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Where the file layer writes.
#[derive(Debug, Clone, PartialEq, Eq)]
enum LogTarget {
    /// Append to one explicitly configured file.
    Fixed(PathBuf),
    /// Rotate daily inside `dir`, naming files `<prefix>.<date>`.
    Daily { dir: PathBuf, prefix: String },
}

impl LogTarget {
    fn resolve(configured: Option<String>) -> Self {
        match configured.filter(|path| !path.trim().is_empty()) {
            Some(path) => Self::Fixed(PathBuf::from(path)),
            None => Self::Daily {
                dir: PathBuf::from(DEFAULT_LOG_DIR),
                prefix: DEFAULT_LOG_PREFIX.to_string(),
            },
        }
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES))
}

/// Install the stdout and file layers.
///
/// Logging never blocks startup: if the file cannot be opened the service keeps running with
/// stdout only and reports the problem on stderr.
pub fn init_tracing() {
    let stdout_layer = fmt::layer()
        .with_target(false)
        .with_span_events(FmtSpan::CLOSE)
        .compact();

    let registry = tracing_subscriber::registry()
        .with(env_filter())
        .with(stdout_layer);

    match file_writer(LogTarget::resolve(std::env::var(LOG_FILE_ENV).ok())) {
        Some(writer) => {
            let file_layer = fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .with_ansi(false)
                .with_span_events(FmtSpan::CLOSE);
            registry.with(file_layer).init();
        }
        None => registry.init(),
    }
}

fn file_writer(target: LogTarget) -> Option<NonBlocking> {
    let (writer, guard) = match target {
        LogTarget::Fixed(path) => {
            ensure_parent(&path)?;
            match std::fs::OpenOptions::new().create(true).append(true).open(&path) {
                Ok(file) => tracing_appender::non_blocking(file),
                Err(err) => {
                    eprintln!("Failed to open log file {}: {err}", path.display());
                    return None;
                }
            }
        }
        LogTarget::Daily { dir, prefix } => {
            if let Err(err) = std::fs::create_dir_all(&dir) {
                eprintln!("Failed to create log directory {}: {err}", dir.display());
                return None;
            }
            tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, prefix))
        }
    };
    let _ = LOG_GUARD.set(guard);
    Some(writer)
}

fn ensure_parent(path: &Path) -> Option<()> {
    match path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        Some(parent) => std::fs::create_dir_all(parent)
            .map_err(|err| eprintln!("Failed to create log directory {}: {err}", parent.display()))
            .ok(),
        None => Some(()),
    }
}
