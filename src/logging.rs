//! Tracing initialization and per-run log files.
//!
//! The console subscriber is installed once by the binary. Each run (one
//! input file in the split pipeline, one dataset in the load pipeline) gets
//! its own [`RunLog`], a dispatcher that writes to a timestamped file in the
//! log directory and mirrors events to the console. Components run inside
//! the log's scope instead of reconfiguring a process-wide logger, which
//! keeps parallel workers from interleaving into each other's files.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use chrono::Local;
use snafu::prelude::*;
use tracing::Dispatch;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::error::{CreateLogFileSnafu, LogError};

/// Timestamp format used in log lines.
const LINE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Timestamp format used in log file names.
const FILE_TIME_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Level used when `RUST_LOG` is unset, shared with every [`RunLog`].
static DEFAULT_LEVEL: OnceLock<String> = OnceLock::new();

/// Set the fallback level for run logs. Only the first call takes effect.
pub fn set_default_level(level: &str) {
    let _ = DEFAULT_LEVEL.set(level.to_string());
}

fn env_filter() -> EnvFilter {
    let level = DEFAULT_LEVEL.get().map(String::as_str).unwrap_or("info");
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Initialize the global console subscriber.
///
/// Uses `RUST_LOG` for filtering, falling back to `default_level`. Run logs
/// created afterwards use the same filter.
pub fn init_tracing(default_level: &str) {
    set_default_level(default_level);
    let env_filter = env_filter();

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .init();
}

/// Logging context for one run, backed by its own log file.
#[derive(Clone)]
pub struct RunLog {
    path: PathBuf,
    dispatch: Dispatch,
}

impl RunLog {
    /// Create `{log_dir}/{prefix}_{YYYYMMDD_HHMMSS}.log` and a dispatcher for it.
    pub fn create(log_dir: &Path, prefix: &str) -> Result<Self, LogError> {
        let stamp = Local::now().format(FILE_TIME_FORMAT);
        let path = log_dir.join(format!("{prefix}_{stamp}.log"));
        Self::create_at(path)
    }

    /// Create a run log at an exact path.
    pub fn create_at(path: PathBuf) -> Result<Self, LogError> {
        let file = File::options()
            .create(true)
            .append(true)
            .open(&path)
            .context(CreateLogFileSnafu { path: &path })?;

        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_target(false)
            .with_level(true)
            .with_timer(ChronoLocal::new(LINE_TIME_FORMAT.to_string()))
            .with_writer(Arc::new(file));

        let console_layer = tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr);

        let subscriber = tracing_subscriber::registry()
            .with(file_layer)
            .with(console_layer)
            .with(env_filter());

        Ok(Self {
            path,
            dispatch: Dispatch::new(subscriber),
        })
    }

    /// Path of the backing log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The dispatcher, for attaching to futures with `WithSubscriber`.
    pub fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }

    /// Run `f` with this log as the current default subscriber.
    pub fn in_scope<T>(&self, f: impl FnOnce() -> T) -> T {
        tracing::dispatcher::with_default(&self.dispatch, f)
    }
}

impl std::fmt::Debug for RunLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunLog").field("path", &self.path).finish()
    }
}
