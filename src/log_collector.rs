//! Dual-sink run logger.
//!
//! Every record is written synchronously to two sinks:
//!
//! ```text
//!  log(level, message)
//!         |
//!   +-----+------+
//!   |            |
//!   v            v
//! terminal     logs/<run-id>_<ts>.log
//! (colored)    (plain, append-only)
//! ```
//!
//! The log file is opened once when the logger is created and held for the
//! lifetime of the process. Nothing is buffered across calls: a line is on
//! both sinks before `log` returns. The logger is also wired into the `log`
//! crate facade so handlers can use `log::info!` and friends.

use chrono::Local;
use log::{Level, Log, Metadata, Record};
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Log target that routes a facade `info!` record to [`LogLevel::Success`].
pub const SUCCESS_TARGET: &str = "success";

/// Environment variable overriding the log directory.
pub const LOG_DIR_ENV: &str = "WRTPREP_LOG_DIR";

const RESET: &str = "\x1b[0m";

/// Severity of a log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogLevel {
    Info,
    Warning,
    Error,
    Success,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
            LogLevel::Success => "SUCCESS",
        }
    }

    fn color(&self) -> &'static str {
        match self {
            LogLevel::Info => "\x1b[34m",
            LogLevel::Warning => "\x1b[33m",
            LogLevel::Error => "\x1b[31m",
            LogLevel::Success => "\x1b[32m",
        }
    }

    /// Map a `log` facade record onto our levels.
    fn from_record(record: &Record) -> Self {
        match record.level() {
            Level::Error => LogLevel::Error,
            Level::Warn => LogLevel::Warning,
            _ if record.target() == SUCCESS_TARGET => LogLevel::Success,
            _ => LogLevel::Info,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One timestamped message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub timestamp: String,
    pub level: LogLevel,
    pub message: String,
}

impl LogRecord {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        LogRecord {
            timestamp: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            level,
            message: message.into(),
        }
    }

    /// Uncolored line, as written to the log file.
    pub fn plain(&self) -> String {
        format!("[{}] [{}] {}", self.timestamp, self.level, self.message)
    }

    /// Level-colored line, as written to the terminal.
    pub fn colored(&self) -> String {
        format!(
            "[{}] {}[{}]{} {}",
            self.timestamp,
            self.level.color(),
            self.level,
            RESET,
            self.message
        )
    }
}

/// Resolve the log directory: explicit flag, else `WRTPREP_LOG_DIR`, else `./logs`.
pub fn get_global_logs_path(explicit: Option<&Path>) -> Result<PathBuf, String> {
    if let Some(dir) = explicit {
        return Ok(dir.to_path_buf());
    }
    if let Some(dir) = std::env::var_os(LOG_DIR_ENV).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    let cwd = std::env::current_dir()
        .map_err(|e| format!("Failed to get current working directory: {}", e))?;
    Ok(cwd.join("logs"))
}

/// Path of a run's log file: `<log_dir>/<run_id>_<YYYYmmdd_HHMMSS>.log`.
pub fn run_log_path(log_dir: &Path, run_id: &str) -> PathBuf {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    log_dir.join(format!("{}_{}.log", run_id, timestamp))
}

struct Sinks {
    terminal: Box<dyn Write + Send>,
    file: File,
}

/// Run-scoped logger writing to the terminal and a log file.
///
/// Cheap to clone; clones share the same sinks.
#[derive(Clone)]
pub struct Logger {
    sinks: Arc<Mutex<Sinks>>,
    path: PathBuf,
}

impl Logger {
    /// Open (create + append) the log file and log to stdout.
    pub fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        Self::with_terminal(path, Box::new(io::stdout()))
    }

    /// Open the log file with a caller-supplied terminal sink.
    pub fn with_terminal(
        path: impl Into<PathBuf>,
        terminal: Box<dyn Write + Send>,
    ) -> io::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Logger {
            sinks: Arc::new(Mutex::new(Sinks { terminal, file })),
            path,
        })
    }

    /// Path of the run's log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Emit one record to both sinks.
    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.emit(&LogRecord::new(level, message));
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message);
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.log(LogLevel::Warning, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, message);
    }

    pub fn success(&self, message: impl Into<String>) {
        self.log(LogLevel::Success, message);
    }

    fn emit(&self, record: &LogRecord) {
        // A poisoned lock only means another caller panicked mid-write.
        let mut sinks = match self.sinks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let _ = writeln!(sinks.terminal, "{}", record.colored());
        let _ = sinks.terminal.flush();

        let written = writeln!(sinks.file, "{}", record.plain()).and_then(|_| sinks.file.flush());
        if let Err(e) = written {
            let warning = LogRecord::new(
                LogLevel::Warning,
                format!("log file write failed: {} ({})", self.path.display(), e),
            );
            let _ = writeln!(sinks.terminal, "{}", warning.colored());
            let _ = sinks.terminal.flush();
        }
    }

    /// Route the `log` crate facade into this logger. Only the first call
    /// in a process takes effect.
    pub fn install_as_global(&self) -> bool {
        let installed = log::set_boxed_logger(Box::new(self.clone())).is_ok();
        if installed {
            log::set_max_level(log::LevelFilter::Info);
        }
        installed
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger").field("path", &self.path).finish()
    }
}

/// Implementation of the `log` crate's Log trait.
/// Wires all log::info!(), log::warn!(), log::error!() calls into the Logger.
impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= Level::Info
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let level = LogLevel::from_record(record);
            self.emit(&LogRecord::new(level, record.args().to_string()));
        }
    }

    fn flush(&self) {
        // Every record is flushed as it is written.
    }
}

/// Log a SUCCESS record through the `log` facade.
#[macro_export]
macro_rules! log_success {
    ($($arg:tt)*) => {{
        $crate::log::info!(target: $crate::log_collector::SUCCESS_TARGET, $($arg)*);
    }}
}


#[cfg(test)]
mod tests {
    use super::test_support::CapturedTerminal;
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_logger_writes_both_sinks() {
        let temp_dir = TempDir::new().unwrap();
        let terminal = CapturedTerminal::default();
        let log_path = temp_dir.path().join("run.log");
        let logger = Logger::with_terminal(&log_path, Box::new(terminal.clone())).unwrap();

        logger.info("executing clone_repo");
        logger.warning("no handler registered for 'x'");

        let file = fs::read_to_string(&log_path).unwrap();
        assert!(file.contains("[INFO] executing clone_repo"));
        assert!(file.contains("[WARNING] no handler registered for 'x'"));
        assert!(!file.contains('\x1b'), "file sink must stay uncolored");

        let term = terminal.contents();
        assert!(term.contains("executing clone_repo"));
        assert!(term.contains("\x1b[33m[WARNING]"));
    }

    #[test]
    fn test_logger_creates_parent_directories() {
        let temp_dir = TempDir::new().unwrap();
        let log_path = temp_dir.path().join("nested/logs/run.log");
        let logger =
            Logger::with_terminal(&log_path, Box::new(CapturedTerminal::default())).unwrap();
        logger.success("done");
        assert!(log_path.exists());
        assert_eq!(logger.path(), log_path.as_path());
    }

    #[test]
    fn test_logger_appends_to_existing_file() {
        let temp_dir = TempDir::new().unwrap();
        let log_path = temp_dir.path().join("run.log");
        fs::write(&log_path, "previous line\n").unwrap();

        let logger =
            Logger::with_terminal(&log_path, Box::new(CapturedTerminal::default())).unwrap();
        logger.error("boom");

        let file = fs::read_to_string(&log_path).unwrap();
        assert!(file.starts_with("previous line\n"));
        assert!(file.contains("[ERROR] boom"));
    }

    #[test]
    fn test_facade_record_mapping() {
        let temp_dir = TempDir::new().unwrap();
        let terminal = CapturedTerminal::default();
        let log_path = temp_dir.path().join("facade.log");
        let logger = Logger::with_terminal(&log_path, Box::new(terminal)).unwrap();

        Log::log(
            &logger,
            &Record::builder()
                .level(Level::Info)
                .target(SUCCESS_TARGET)
                .args(format_args!("all steps done"))
                .build(),
        );
        Log::log(
            &logger,
            &Record::builder()
                .level(Level::Warn)
                .target("wrtprep")
                .args(format_args!("careful"))
                .build(),
        );
        Log::log(
            &logger,
            &Record::builder()
                .level(Level::Debug)
                .args(format_args!("hidden"))
                .build(),
        );

        let file = fs::read_to_string(&log_path).unwrap();
        assert!(file.contains("[SUCCESS] all steps done"));
        assert!(file.contains("[WARNING] careful"));
        assert!(!file.contains("hidden"));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_file_sink_failure_surfaces_on_terminal() {
        let terminal = CapturedTerminal::default();
        let logger = Logger::with_terminal("/dev/full", Box::new(terminal.clone())).unwrap();

        logger.info("still visible");

        let term = terminal.contents();
        assert!(term.contains("still visible"));
        assert!(term.contains("log file write failed: /dev/full"));
    }

    #[test]
    fn test_run_log_path_shape() {
        let path = run_log_path(Path::new("/tmp/logs"), "immortalwrt-openwrt-24.10");
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("immortalwrt-openwrt-24.10_"));
        assert!(name.ends_with(".log"));
        assert_eq!(path.parent().unwrap(), Path::new("/tmp/logs"));
    }

    #[test]
    fn test_explicit_log_dir_wins() {
        let dir = get_global_logs_path(Some(Path::new("/var/log/wrtprep"))).unwrap();
        assert_eq!(dir, PathBuf::from("/var/log/wrtprep"));
    }
}
