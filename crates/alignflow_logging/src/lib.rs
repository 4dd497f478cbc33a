//! Logging setup and home-directory paths for alignflow binaries.

use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub const DEFAULT_LOG_FILTER: &str = "alignflow=info,alignflow_engine=info";
const VERBOSE_LOG_FILTER: &str = "alignflow=debug,alignflow_engine=debug";
const MAX_LOG_FILES: usize = 5;
const MAX_LOG_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Logging configuration shared by alignflow binaries.
pub struct LogConfig<'a> {
    pub app_name: &'a str,
    /// Mirror the file filter (or debug) to stderr
    pub verbose: bool,
    /// Only errors on stderr
    pub quiet: bool,
}

/// Initialize tracing with a rolling file writer and stderr output.
///
/// The file layer honours `RUST_LOG`, falling back to [`DEFAULT_LOG_FILTER`].
pub fn init_logging(config: LogConfig<'_>) -> Result<()> {
    let log_dir = ensure_logs_dir().context("Failed to ensure log directory")?;
    let file_writer = SharedRollingWriter::new(&log_dir, config.app_name)
        .context("Failed to initialize rolling log writer")?;

    let file_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let console_filter = if config.quiet {
        EnvFilter::new("error")
    } else if config.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(VERBOSE_LOG_FILTER))
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_filter(file_filter),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_filter(console_filter),
        )
        .try_init()
        .context("A global tracing subscriber is already installed")?;

    Ok(())
}

/// Resolve the alignflow home directory.
///
/// Priority:
/// 1) ALIGNFLOW_HOME
/// 2) ~/.alignflow
/// 3) ./.alignflow
pub fn alignflow_home() -> PathBuf {
    if let Ok(override_path) = std::env::var("ALIGNFLOW_HOME") {
        return PathBuf::from(override_path);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".alignflow")
}

/// Get the logs directory: ~/.alignflow/logs
pub fn logs_dir() -> PathBuf {
    alignflow_home().join("logs")
}

/// Ensure the logs directory exists.
pub fn ensure_logs_dir() -> Result<PathBuf> {
    let logs = logs_dir();
    fs::create_dir_all(&logs)
        .with_context(|| format!("Failed to create logs directory: {}", logs.display()))?;
    Ok(logs)
}

// ============================================================================
// Size-rotated log file
// ============================================================================

/// `<name>.log` is live; `<name>.log.1` is the newest rotated file.
struct RotatingLog {
    dir: PathBuf,
    stem: String,
    keep: usize,
    limit: u64,
    file: Option<File>,
    written: u64,
}

impl RotatingLog {
    fn open(dir: &Path, name: &str, keep: usize, limit: u64) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        let mut log = Self {
            dir: dir.to_path_buf(),
            stem: sanitize_name(name),
            keep: keep.max(1),
            limit,
            file: None,
            written: 0,
        };
        log.reopen()?;
        if log.written > log.limit {
            log.rotate()?;
        }
        Ok(log)
    }

    fn live_path(&self) -> PathBuf {
        self.dir.join(format!("{}.log", self.stem))
    }

    fn numbered_path(&self, n: usize) -> PathBuf {
        self.dir.join(format!("{}.log.{}", self.stem, n))
    }

    fn reopen(&mut self) -> io::Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.live_path())?;
        self.written = file.metadata()?.len();
        self.file = Some(file);
        Ok(())
    }

    fn rotate(&mut self) -> io::Result<()> {
        if let Some(mut file) = self.file.take() {
            let _ = file.flush();
        }

        // keep == 1 means truncate in place
        if self.keep > 1 {
            let last = self.numbered_path(self.keep - 1);
            if last.exists() {
                fs::remove_file(&last)?;
            }
            for n in (1..self.keep - 1).rev() {
                let from = self.numbered_path(n);
                if from.exists() {
                    fs::rename(&from, self.numbered_path(n + 1))?;
                }
            }
            let live = self.live_path();
            if live.exists() {
                fs::rename(&live, self.numbered_path(1))?;
            }
        } else {
            File::create(self.live_path())?;
        }

        self.reopen()
    }
}

impl Write for RotatingLog {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.written > 0 && self.written + buf.len() as u64 > self.limit {
            self.rotate()?;
        }

        let file = self
            .file
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "log file unavailable"))?;
        let n = file.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

/// `MakeWriter` handing out guards onto one shared [`RotatingLog`].
#[derive(Clone)]
struct SharedRollingWriter {
    inner: Arc<Mutex<RotatingLog>>,
}

impl SharedRollingWriter {
    fn new(dir: &Path, name: &str) -> Result<Self> {
        let log = RotatingLog::open(dir, name, MAX_LOG_FILES, MAX_LOG_FILE_SIZE)
            .with_context(|| format!("Failed to open log file for {}", name))?;
        Ok(Self {
            inner: Arc::new(Mutex::new(log)),
        })
    }
}

struct SharedWriterGuard {
    inner: Arc<Mutex<RotatingLog>>,
}

impl SharedWriterGuard {
    fn with_log<T>(&self, f: impl FnOnce(&mut RotatingLog) -> io::Result<T>) -> io::Result<T> {
        let mut log = self
            .inner
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log writer lock poisoned"))?;
        f(&mut log)
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for SharedRollingWriter {
    type Writer = SharedWriterGuard;

    fn make_writer(&'a self) -> Self::Writer {
        SharedWriterGuard {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Write for SharedWriterGuard {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.with_log(|log| log.write(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.with_log(|log| log.flush())
    }
}

fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|ch| if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' { ch } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("alignflow cli/v1"), "alignflow_cli_v1");
    }

    #[test]
    fn test_rotation_keeps_bounded_files() {
        let temp = TempDir::new().unwrap();
        let mut log = RotatingLog::open(temp.path(), "engine", 3, 16).unwrap();

        for _ in 0..10 {
            log.write_all(b"0123456789\n").unwrap();
        }
        log.flush().unwrap();

        assert!(temp.path().join("engine.log").exists());
        assert!(temp.path().join("engine.log.1").exists());
        assert!(temp.path().join("engine.log.2").exists());
        assert!(!temp.path().join("engine.log.3").exists());
    }

    #[test]
    fn test_reopen_appends_to_existing_file() {
        let temp = TempDir::new().unwrap();
        {
            let mut log = RotatingLog::open(temp.path(), "cli", 2, 1024).unwrap();
            log.write_all(b"first\n").unwrap();
        }
        let log = RotatingLog::open(temp.path(), "cli", 2, 1024).unwrap();
        assert_eq!(log.written, 6);
    }
}
