//! Startup error types
//!
//! Per-request failures never reach this type: they are mapped to HTTP
//! status codes inside the handlers. Everything here is fatal for the process.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to load configuration: {0}")]
    Config(#[from] config::ConfigError),

    #[error("invalid listen address '{0}'")]
    InvalidAddress(String),

    #[error("address {host}:{port} already in use (tried {attempts} port(s))")]
    AddressInUse {
        host: String,
        port: u16,
        attempts: u16,
    },

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("static root '{}' is not accessible: {source}", path.display())]
    InvalidRoot {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("static root '{}' is not a directory", .0.display())]
    RootNotADirectory(PathBuf),

    #[error("failed to open log file: {0}")]
    Logger(#[source] io::Error),

    #[error("failed to build runtime: {0}")]
    Runtime(#[source] io::Error),
}
