/// Structured logging for runoff aggregation runs
///
/// Library code logs through the `log` facade. This module provides the
/// backend: timestamped console output plus an optional append-only log
/// file for long batch runs over many units and years.

use chrono::Utc;
use log::{Level, LevelFilter, Log, Metadata, Record};
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Mutex;

// ---------------------------------------------------------------------------
// Log Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warning => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

impl From<Level> for LogLevel {
    fn from(level: Level) -> Self {
        match level {
            Level::Error => LogLevel::Error,
            Level::Warn => LogLevel::Warning,
            Level::Info => LogLevel::Info,
            Level::Debug | Level::Trace => LogLevel::Debug,
        }
    }
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Warning => LevelFilter::Warn,
            LogLevel::Error => LevelFilter::Error,
        }
    }
}

// ---------------------------------------------------------------------------
// Logger
// ---------------------------------------------------------------------------

pub struct Logger {
    /// Minimum log level to display
    min_level: LogLevel,
    /// Optional file path for logging
    log_file: Option<String>,
    /// Whether to include timestamps in console output
    console_timestamps: bool,
    /// Serializes file appends across rayon workers
    file_lock: Mutex<()>,
}

impl Logger {
    pub fn new(min_level: LogLevel, log_file: Option<String>, console_timestamps: bool) -> Self {
        Logger {
            min_level,
            log_file,
            console_timestamps,
            file_lock: Mutex::new(()),
        }
    }

    /// Full log line as written to the log file.
    pub fn format_entry(level: LogLevel, target: &str, message: &str) -> String {
        let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
        format!("{} {} {}: {}", timestamp, level, target, message)
    }

    fn append_to_file(path: &str, entry: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", entry)?;
        Ok(())
    }
}

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        LogLevel::from(metadata.level()) >= self.min_level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let level = LogLevel::from(record.level());
        let message = record.args().to_string();
        let log_entry = Self::format_entry(level, record.target(), &message);

        // Console output
        if self.console_timestamps {
            match level {
                LogLevel::Error | LogLevel::Warning => eprintln!("{}", log_entry),
                LogLevel::Info | LogLevel::Debug => println!("{}", log_entry),
            }
        } else {
            match level {
                LogLevel::Error => eprintln!("   ✗ {}", message),
                LogLevel::Warning => eprintln!("   ⚠ {}", message),
                LogLevel::Info => println!("   {}", message),
                LogLevel::Debug => {} // Skip debug in non-timestamp mode
            }
        }

        // File output
        if let Some(ref path) = self.log_file {
            let _guard = self.file_lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            if let Err(e) = Self::append_to_file(path, &log_entry) {
                eprintln!("Failed to write to log file {}: {}", path, e);
            }
        }
    }

    fn flush(&self) {}
}

// ---------------------------------------------------------------------------
// Initialization
// ---------------------------------------------------------------------------

/// Install the global logger. Returns an error if a logger is already set.
pub fn init_logger(
    min_level: LogLevel,
    log_file: Option<&str>,
    console_timestamps: bool,
) -> Result<(), log::SetLoggerError> {
    let logger = Logger::new(min_level, log_file.map(String::from), console_timestamps);
    log::set_boxed_logger(Box::new(logger))?;
    log::set_max_level(min_level.into());
    Ok(())
}

// ---------------------------------------------------------------------------
// Run Summary Logging
// ---------------------------------------------------------------------------

/// Log a summary of an aggregation run.
pub fn log_run_summary(total_units: usize, units_with_rows: usize, rows: usize) {
    let message = format!(
        "Aggregation complete: {}/{} units produced data, {} rows",
        units_with_rows, total_units, rows
    );

    if total_units == 0 || units_with_rows == total_units {
        log::info!("{}", message);
    } else if units_with_rows == 0 {
        log::warn!("{} (no unit had contributing data)", message);
    } else {
        log::info!("{} ({} units without data)", message, total_units - units_with_rows);
    }
}
