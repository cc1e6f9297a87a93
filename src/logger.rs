//! Debug observability.
//!
//! The core state (`g_state`) pattern is replaced by injecting state by
//! reference into each component; the same replacement applies to ad-hoc
//! `eprintln!` calls scattered through the original — here observability
//! goes through a small trait object (`Logger`) that callers inject, with a
//! stdout/stderr default for standalone use.

use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Debug,
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
        };
        write!(f, "{s}")
    }
}

/// Injectable logging sink. Implementors must be safe to call from the
/// frame driver and worker threads.
pub trait Logger: Send + Sync {
    fn log(&self, level: Severity, msg: &str);
}

/// Default implementation: debug/info to stdout, warn/error to stderr,
/// mirroring the standalone mode of a channel-backed logger without the
/// channel (there is no downstream GUI to forward to here).
pub struct StdoutLogger;

impl Logger for StdoutLogger {
    fn log(&self, level: Severity, msg: &str) {
        match level {
            Severity::Warn | Severity::Error => eprintln!("[{level}] {msg}"),
            _ => println!("[{level}] {msg}"),
        }
    }
}

/// A logger that discards everything; used on the audio-critical path when
/// the `rt-safe` feature is enabled and no logging is wanted there at all.
pub struct NullLogger;

impl Logger for NullLogger {
    fn log(&self, _level: Severity, _msg: &str) {}
}

static GLOBAL_LOGGER: OnceLock<Box<dyn Logger>> = OnceLock::new();

pub fn init(logger: Box<dyn Logger>) {
    let _ = GLOBAL_LOGGER.set(logger);
}

pub fn global() -> &'static dyn Logger {
    GLOBAL_LOGGER
        .get_or_init(|| Box::new(StdoutLogger))
        .as_ref()
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        $crate::logger::global().log($crate::logger::Severity::Debug, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::logger::global().log($crate::logger::Severity::Info, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::logger::global().log($crate::logger::Severity::Warn, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::logger::global().log($crate::logger::Severity::Error, &format!($($arg)*))
    };
}
