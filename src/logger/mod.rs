//! Logger module
//!
//! Provides logging utilities for the HTTP server including:
//! - Server lifecycle logging
//! - Access logging with multiple formats
//! - Leveled error, warning and debug logging
//! - File-based logging support

mod format;
pub mod writer;

pub use format::AccessLogEntry;

use crate::config::{AppState, LoggingConfig};
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::OnceLock;

static LEVEL: OnceLock<LogLevel> = OnceLock::new();

/// Severity threshold for server messages; access logs are not affected
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" | "trace" => Ok(Self::Debug),
            other => Err(format!("unknown log level '{other}'")),
        }
    }
}

/// Initialize the logger with configuration
///
/// Should be called once at application startup. An unknown level falls
/// back to `info` with a warning.
pub fn init(config: &LoggingConfig) -> std::io::Result<()> {
    let level = config.level.parse().unwrap_or_else(|e| {
        eprintln!("[WARN] {e}, using 'info'");
        LogLevel::Info
    });
    let _ = LEVEL.set(level);
    writer::init(
        config.access_log_file.as_deref(),
        config.error_log_file.as_deref(),
    )
}

fn enabled(level: LogLevel) -> bool {
    level <= *LEVEL.get().unwrap_or(&LogLevel::Info)
}

/// Write to info log
fn write_info(message: &str) {
    match writer::get() {
        Some(w) => w.write_info(message),
        None => println!("{message}"),
    }
}

/// Write to error log
fn write_error(message: &str) {
    match writer::get() {
        Some(w) => w.write_error(message),
        None => eprintln!("{message}"),
    }
}

/// Write to access log specifically
fn write_access(message: &str) {
    match writer::get() {
        Some(w) => w.write_access(message),
        None => println!("{message}"),
    }
}

pub fn log_server_start(addr: &SocketAddr, state: &AppState) {
    let config = &state.config;
    write_info("======================================");
    write_info("Toolbox host started");
    write_info(&format!("Listening on: http://{addr}"));
    write_info(&format!("Static root: {}", state.root.display()));
    if config.scan.enabled {
        write_info(&format!(
            "Scan endpoint: http://{addr}{}?path=<dir> ({} extensions)",
            config.scan.path,
            state.image_filter.len()
        ));
    } else {
        write_info("Scan endpoint: disabled");
    }
    if config.http.no_cache {
        write_info("Caching: disabled (no-store on every response)");
    }
    if let Some(workers) = config.server.workers {
        write_info(&format!("Worker threads: {workers}"));
    }
    if let Some(ref path) = config.logging.access_log_file {
        write_info(&format!("Access log: {path}"));
    }
    if let Some(ref path) = config.logging.error_log_file {
        write_info(&format!("Error log: {path}"));
    }
    write_info("Press Ctrl+C to stop");
    write_info("======================================\n");
}

pub fn log_server_stopped() {
    write_info("Server stopped");
}

pub fn log_info(message: &str) {
    if enabled(LogLevel::Info) {
        write_info(message);
    }
}

pub fn log_debug(message: &str) {
    if enabled(LogLevel::Debug) {
        write_info(&format!("[DEBUG] {message}"));
    }
}

pub fn log_connection_error(err: &impl std::fmt::Display) {
    log_error(&format!("Failed to serve connection: {err}"));
}

pub fn log_error(message: &str) {
    write_error(&format!("[ERROR] {message}"));
}

pub fn log_warning(message: &str) {
    if enabled(LogLevel::Warn) {
        write_error(&format!("[WARN] {message}"));
    }
}

pub fn log_port_in_use(addr: &SocketAddr, next_port: u16) {
    log_warning(&format!(
        "Port {} already in use on {}, trying {next_port}",
        addr.port(),
        addr.ip()
    ));
}

/// Log formatted access log entry
pub fn log_access(entry: &AccessLogEntry, format: &str) {
    write_access(&entry.format(format));
}
