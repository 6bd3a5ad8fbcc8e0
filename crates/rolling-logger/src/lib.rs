//! Rolling Logger
//!
//! File logging for the Tauri shell. Records from both `tracing` and the
//! `log` facade end up in `<dir>/<app>.log`. When the active file would
//! grow past its size limit it is shifted to `<app>.log.1`, the previous
//! `.1` to `.2` and so on; the oldest file falls off the end, so the set of
//! files behaves like a circular buffer.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;

/// Size at which the active log file is rotated
pub const DEFAULT_MAX_BYTES: u64 = 1024 * 1024;
/// Number of rotated files kept next to the active one
pub const DEFAULT_KEEP_FILES: usize = 3;

static INSTALLED: OnceLock<RollingWriter> = OnceLock::new();

// ========================
// Writer
// ========================

struct RollingFile {
    dir: PathBuf,
    app_name: String,
    file: File,
    written: u64,
    max_bytes: u64,
    keep: usize,
}

impl RollingFile {
    fn open(dir: &Path, app_name: &str, max_bytes: u64, keep: usize) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        let path = active_path(dir, app_name);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let written = file.metadata().map(|m| m.len()).unwrap_or(0);
        Ok(Self {
            dir: dir.to_path_buf(),
            app_name: app_name.to_string(),
            file,
            written,
            max_bytes,
            keep,
        })
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;

        if self.keep == 0 {
            // Nothing is kept, just start over
            self.file = File::create(active_path(&self.dir, &self.app_name))?;
            self.written = 0;
            return Ok(());
        }

        let oldest = rotated_path(&self.dir, &self.app_name, self.keep);
        if oldest.exists() {
            fs::remove_file(&oldest)?;
        }
        for index in (1..self.keep).rev() {
            let from = rotated_path(&self.dir, &self.app_name, index);
            if from.exists() {
                fs::rename(&from, rotated_path(&self.dir, &self.app_name, index + 1))?;
            }
        }

        let active = active_path(&self.dir, &self.app_name);
        fs::rename(&active, rotated_path(&self.dir, &self.app_name, 1))?;
        self.file = OpenOptions::new().create(true).append(true).open(&active)?;
        self.written = 0;
        Ok(())
    }
}

impl Write for RollingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.written > 0 && self.written + buf.len() as u64 > self.max_bytes {
            self.rotate()?;
        }
        let n = self.file.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// Cloneable handle to a size-rotated log file
#[derive(Clone)]
pub struct RollingWriter {
    inner: Arc<Mutex<RollingFile>>,
}

impl RollingWriter {
    pub fn new(dir: &Path, app_name: &str, max_bytes: u64, keep: usize) -> io::Result<Self> {
        let file = RollingFile::open(dir, app_name, max_bytes, keep)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(file)),
        })
    }

    /// Path of the file currently being written
    pub fn active_path(&self) -> io::Result<PathBuf> {
        let guard = self
            .inner
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log writer poisoned"))?;
        Ok(active_path(&guard.dir, &guard.app_name))
    }
}

impl Write for RollingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log writer poisoned"))?;
        guard.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log writer poisoned"))?;
        guard.flush()
    }
}

impl<'a> MakeWriter<'a> for RollingWriter {
    type Writer = RollingWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn active_path(dir: &Path, app_name: &str) -> PathBuf {
    dir.join(format!("{}.log", app_name))
}

fn rotated_path(dir: &Path, app_name: &str, index: usize) -> PathBuf {
    dir.join(format!("{}.log.{}", app_name, index))
}

/// All log files for `app_name` in `dir`, newest first
pub fn log_files(dir: &Path, app_name: &str) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let active = active_path(dir, app_name);
    if active.exists() {
        files.push(active);
    }
    let mut index = 1;
    loop {
        let rotated = rotated_path(dir, app_name, index);
        if !rotated.exists() {
            break;
        }
        files.push(rotated);
        index += 1;
    }
    files
}

// ========================
// Subscriber setup
// ========================

struct LocalTime;

impl FormatTime for LocalTime {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"))
    }
}

/// Install the global subscriber writing to `<log_dir>/<app_name>.log` and stderr.
///
/// Can only succeed once per process.
pub fn init_logger(log_dir: PathBuf, app_name: &str) -> Result<(), String> {
    let writer = RollingWriter::new(&log_dir, app_name, DEFAULT_MAX_BYTES, DEFAULT_KEEP_FILES)
        .map_err(|e| format!("Failed to open log file: {}", e))?;

    let subscriber = tracing_subscriber::registry()
        .with(LevelFilter::INFO)
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_timer(LocalTime)
                .with_writer(writer.clone()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_timer(LocalTime)
                .with_writer(io::stderr),
        );

    #[cfg(target_os = "android")]
    {
        // android_logger owns the `log` facade here, tracing only goes to the file
        android_logger::init_once(
            android_logger::Config::default()
                .with_max_level(log::LevelFilter::Info)
                .with_tag(app_name.to_string()),
        );
        tracing::subscriber::set_global_default(subscriber)
            .map_err(|e| format!("Failed to install subscriber: {}", e))?;
    }

    #[cfg(not(target_os = "android"))]
    {
        use tracing_subscriber::util::SubscriberInitExt;
        subscriber
            .try_init()
            .map_err(|e| format!("Failed to install subscriber: {}", e))?;
    }

    INSTALLED
        .set(writer)
        .map_err(|_| "Logger already initialized".to_string())?;
    tracing::info!("{} logging to {}", app_name, log_dir.display());
    Ok(())
}

fn ensure_installed() -> Result<(), String> {
    if INSTALLED.get().is_some() {
        Ok(())
    } else {
        Err("Logger not initialized".to_string())
    }
}

pub fn info(msg: &str) -> Result<(), String> {
    ensure_installed()?;
    tracing::info!("{}", msg);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_writes_to_active_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = RollingWriter::new(dir.path(), "App", 1024, 2).unwrap();

        writer.write_all(b"hello\n").unwrap();
        writer.flush().unwrap();

        let content = fs::read_to_string(dir.path().join("App.log")).unwrap();
        assert_eq!(content, "hello\n");
    }

    #[test]
    fn test_rotates_when_full() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = RollingWriter::new(dir.path(), "App", 10, 2).unwrap();

        writer.write_all(b"first-line\n").unwrap();
        writer.write_all(b"second\n").unwrap();
        writer.flush().unwrap();

        let active = fs::read_to_string(dir.path().join("App.log")).unwrap();
        let rotated = fs::read_to_string(dir.path().join("App.log.1")).unwrap();
        assert_eq!(active, "second\n");
        assert_eq!(rotated, "first-line\n");
    }

    #[test]
    fn test_oldest_file_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = RollingWriter::new(dir.path(), "App", 4, 2).unwrap();

        for line in ["aaaa", "bbbb", "cccc", "dddd"] {
            writer.write_all(line.as_bytes()).unwrap();
        }
        writer.flush().unwrap();

        let files = log_files(dir.path(), "App");
        assert_eq!(files.len(), 3);
        assert_eq!(fs::read_to_string(&files[0]).unwrap(), "dddd");
        assert_eq!(fs::read_to_string(&files[1]).unwrap(), "cccc");
        assert_eq!(fs::read_to_string(&files[2]).unwrap(), "bbbb");
        assert!(!dir.path().join("App.log.3").exists());
    }

    #[test]
    fn test_reopen_appends() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut writer = RollingWriter::new(dir.path(), "App", 1024, 1).unwrap();
            writer.write_all(b"one\n").unwrap();
        }
        let mut writer = RollingWriter::new(dir.path(), "App", 1024, 1).unwrap();
        writer.write_all(b"two\n").unwrap();
        writer.flush().unwrap();

        let content = fs::read_to_string(writer.active_path().unwrap()).unwrap();
        assert_eq!(content, "one\ntwo\n");
    }

    #[test]
    fn test_helpers_require_init() {
        // Nothing installs the global logger in unit tests
        if INSTALLED.get().is_none() {
            assert!(info("not yet").is_err());
        }
    }
}
