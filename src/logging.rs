/// Structured logging for the tide table generator
///
/// Provides context-rich logging with port identifiers, timestamps and
/// severity levels. Supports console output and an optional log file so a
/// yearly run leaves a record next to the generated documents.

use chrono::Utc;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Mutex;

use crate::model::TideError;

// ---------------------------------------------------------------------------
// Log Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    #[serde(alias = "warn")]
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

// ---------------------------------------------------------------------------
// Pipeline stages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Ports,
    Coefficients,
    Tides,
    Output,
    System,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Ports => write!(f, "PORTS"),
            Source::Coefficients => write!(f, "COEF"),
            Source::Tides => write!(f, "TIDES"),
            Source::Output => write!(f, "OUT"),
            Source::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// Expected failure - the month is not published yet or the port has no data
    Expected,
    /// Unexpected failure - service degradation, feed change or corrupt data
    Unexpected,
    /// Unknown - cannot determine if this is expected or not
    Unknown,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Expected => write!(f, "EXPECTED"),
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
            FailureType::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

// ---------------------------------------------------------------------------
// Logger Configuration
// ---------------------------------------------------------------------------

/// Global logger instance
static LOGGER: Mutex<Option<Logger>> = Mutex::new(None);

pub struct Logger {
    /// Minimum log level to display
    min_level: LogLevel,
    /// Optional file path for logging
    log_file: Option<String>,
    /// Whether to include timestamps in console output
    console_timestamps: bool,
}

impl Logger {
    /// Initialize the global logger
    pub fn init(min_level: LogLevel, log_file: Option<String>, console_timestamps: bool) {
        let logger = Logger {
            min_level,
            log_file,
            console_timestamps,
        };

        if let Ok(mut slot) = LOGGER.lock() {
            *slot = Some(logger);
        }
    }

    fn log(&self, level: LogLevel, source: &Source, port: Option<&str>, message: &str) {
        if level < self.min_level {
            return;
        }

        let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
        let port_part = port.map(|p| format!(" [{}]", p)).unwrap_or_default();
        let log_entry = format!("{} {} {}{}: {}", timestamp, level, source, port_part, message);

        if self.console_timestamps {
            match level {
                LogLevel::Error | LogLevel::Warning => eprintln!("{}", log_entry),
                LogLevel::Info | LogLevel::Debug => println!("{}", log_entry),
            }
        } else {
            match level {
                LogLevel::Error => eprintln!("   ✗ {}{}: {}", source, port_part, message),
                LogLevel::Warning => eprintln!("   ⚠ {}{}: {}", source, port_part, message),
                LogLevel::Info => println!("   {}", message),
                LogLevel::Debug => println!("   [DEBUG] {}{}: {}", source, port_part, message),
            }
        }

        if let Some(ref path) = self.log_file {
            if let Err(e) = Self::append_to_file(path, &log_entry) {
                eprintln!("Failed to write to log file {}: {}", path, e);
            }
        }
    }

    fn append_to_file(path: &str, entry: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", entry)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Public Logging Functions
// ---------------------------------------------------------------------------

/// Initialize the global logger
pub fn init_logger(min_level: LogLevel, log_file: Option<&str>, console_timestamps: bool) {
    Logger::init(min_level, log_file.map(String::from), console_timestamps);
}

fn emit(level: LogLevel, source: Source, port: Option<&str>, message: &str) {
    if let Ok(guard) = LOGGER.lock() {
        if let Some(logger) = guard.as_ref() {
            logger.log(level, &source, port, message);
        }
    }
}

/// Log a general informational message
pub fn info(source: Source, port: Option<&str>, message: &str) {
    emit(LogLevel::Info, source, port, message);
}

/// Log a warning message
pub fn warn(source: Source, port: Option<&str>, message: &str) {
    emit(LogLevel::Warning, source, port, message);
}

/// Log an error message
pub fn error(source: Source, port: Option<&str>, message: &str) {
    emit(LogLevel::Error, source, port, message);
}

/// Log a debug message
pub fn debug(source: Source, port: Option<&str>, message: &str) {
    emit(LogLevel::Debug, source, port, message);
}

// ---------------------------------------------------------------------------
// Failure Classification Helpers
// ---------------------------------------------------------------------------

/// Classify a port-month failure by error kind
pub fn classify_failure(err: &TideError) -> FailureType {
    match err {
        // The IHM answers 404 for months that are not published yet.
        TideError::Http { status: 404, .. } => FailureType::Expected,
        TideError::Http { .. } | TideError::Transport(_) => FailureType::Unexpected,
        TideError::Parse(_) | TideError::MalformedFeed(_) => FailureType::Unexpected,
        TideError::MissingCoefficient { .. } => FailureType::Unexpected,
        TideError::Io(_) => FailureType::Unexpected,
        _ => FailureType::Unknown,
    }
}

/// Log a port-month failure with automatic classification
pub fn log_port_month_failure(port_code: &str, month: u32, err: &TideError) {
    let failure_type = classify_failure(err);
    let message = format!("month {:02} failed [{}]: {}", month, failure_type, err);

    match failure_type {
        FailureType::Expected => debug(Source::Tides, Some(port_code), &message),
        FailureType::Unexpected => error(Source::Tides, Some(port_code), &message),
        FailureType::Unknown => warn(Source::Tides, Some(port_code), &message),
    }
}

// ---------------------------------------------------------------------------
// Batch Summary Logging
// ---------------------------------------------------------------------------

/// Log a summary of a batch run
pub fn log_batch_summary(source: Source, total: usize, successful: usize, failed: usize) {
    let message = format!(
        "Batch complete: {}/{} successful, {} failed",
        successful, total, failed
    );

    if failed == 0 {
        info(source, None, &message);
    } else if successful == 0 {
        error(source, None, &message);
    } else {
        warn(source, None, &message);
    }
}
