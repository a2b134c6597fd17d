/// The common module is our grab bag of small shared toys: order-preserving de-duplication, logging
/// setup and thread pool sizing. Nothing in here knows about matching.
use std::collections::HashSet;
use std::fs;
use std::hash::Hash;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

use directories::ProjectDirs;
use tracing::debug;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{Result, RoseError};

pub const APP_NAME: &str = "rose-match";

pub fn uniq<T: Clone + Eq + Hash>(xs: Vec<T>) -> Vec<T> {
    let mut rv = Vec::new();
    let mut seen = HashSet::new();
    for x in xs {
        if seen.insert(x.clone()) {
            rv.push(x);
        }
    }
    rv
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    Stderr,
    File,
}

static LOGGING_INITIALIZED: Mutex<bool> = Mutex::new(false);
// The non-blocking writer stops flushing once its guard drops, so the guard lives for the process.
static FILE_LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

pub fn default_log_dir() -> Option<PathBuf> {
    let dirs = ProjectDirs::from("", "", APP_NAME)?;
    let dir = if cfg!(target_os = "macos") {
        dirs.cache_dir()
    } else {
        dirs.state_dir().unwrap_or(dirs.cache_dir())
    };
    Some(dir.to_path_buf())
}

/// Installs the global tracing subscriber. Subsequent calls are no-ops. Under `cargo test` nothing
/// is installed unless `LOG_TEST` is set, so tests can install their own test writer.
pub fn initialize_logging(output: LogOutput, log_dir: Option<&Path>) -> Result<()> {
    let mut initialized = LOGGING_INITIALIZED
        .lock()
        .map_err(|_| RoseError::Generic("Logging initialization lock poisoned".to_string()))?;
    if *initialized {
        return Ok(());
    }
    *initialized = true;

    let log_despite_testing = std::env::var("LOG_TEST").is_ok();
    let is_testing = std::env::var("CARGO_TEST").is_ok();
    if is_testing && !log_despite_testing {
        return Ok(());
    }

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match output {
        LogOutput::Stderr => {
            let subscriber = fmt::Subscriber::builder()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(!log_despite_testing)
                .with_thread_ids(log_despite_testing)
                .with_line_number(log_despite_testing)
                .with_file(log_despite_testing)
                .finish();
            tracing::subscriber::set_global_default(subscriber)
                .map_err(|e| RoseError::Generic(format!("Failed to install log subscriber: {e}")))?;
        }
        LogOutput::File => {
            let log_dir = match log_dir {
                Some(dir) => dir.to_path_buf(),
                None => default_log_dir().ok_or_else(|| RoseError::Generic("Failed to determine log directory".to_string()))?,
            };
            fs::create_dir_all(&log_dir)?;
            let file_appender = RollingFileAppender::builder()
                .rotation(Rotation::NEVER)
                .max_log_files(10)
                .filename_prefix(APP_NAME)
                .filename_suffix("log")
                .build(&log_dir)
                .map_err(|e| RoseError::Generic(format!("Failed to open log file in {}: {e}", log_dir.display())))?;
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let _ = FILE_LOG_GUARD.set(guard);

            let subscriber = fmt::Subscriber::builder()
                .with_env_filter(env_filter)
                .with_writer(non_blocking)
                .with_target(true)
                .with_thread_ids(true)
                .with_line_number(true)
                .with_file(true)
                .finish();
            tracing::subscriber::set_global_default(subscriber)
                .map_err(|e| RoseError::Generic(format!("Failed to install log subscriber: {e}")))?;
        }
    }
    Ok(())
}

pub fn default_max_proc() -> usize {
    (num_cpus::get() / 2).max(1)
}

/// Sizes rayon's global pool, which the score matrix is computed on. Only the first call in a
/// process takes effect.
pub fn configure_thread_pool(max_proc: usize) {
    let threads = max_proc.max(1);
    match rayon::ThreadPoolBuilder::new().num_threads(threads).build_global() {
        Ok(()) => debug!("configured global thread pool with {} threads", threads),
        Err(e) => debug!("global thread pool already configured, keeping it: {}", e),
    }
}
