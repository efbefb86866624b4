// Configuration types module
// Defines all configuration-related data structures

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Main configuration structure
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub static_files: StaticFilesConfig,
    pub http: HttpConfig,
    pub scan: ScanConfig,
    pub logging: LoggingConfig,
    pub performance: PerformanceConfig,
}

/// Listener configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// How many following ports to try when `port` is already bound
    pub port_retries: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,
}

/// Static root configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StaticFilesConfig {
    pub root: String,
    #[serde(default = "default_index_files")]
    pub index_files: Vec<String>,
    pub directory_listing: bool,
}

fn default_index_files() -> Vec<String> {
    vec!["index.html".to_string(), "index.htm".to_string()]
}

/// HTTP response configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct HttpConfig {
    pub server_name: String,
    /// Send no-store headers on every response instead of validators
    pub no_cache: bool,
    /// `max-age` for static files when caching is allowed
    pub max_age: u32,
    /// Extra extension -> MIME entries, keys without the leading dot
    #[serde(default)]
    pub mime_types: BTreeMap<String, String>,
}

/// Image scan endpoint configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ScanConfig {
    pub enabled: bool,
    pub path: String,
    #[serde(default = "default_image_extensions")]
    pub extensions: Vec<String>,
}

pub fn default_image_extensions() -> Vec<String> {
    [".jpg", ".jpeg", ".png", ".gif", ".bmp", ".webp", ".svg"]
        .iter()
        .map(ToString::to_string)
        .collect()
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub access_log: bool,
    /// Access log format (common, combined or json)
    pub access_log_format: String,
    /// Access log file path (optional, stdout if not set)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_log_file: Option<String>,
    /// Error log file path (optional, stderr if not set)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_log_file: Option<String>,
}

/// Connection handling configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PerformanceConfig {
    pub keep_alive: bool,
    /// Seconds allowed for a client to send request headers
    pub header_read_timeout: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_connections: Option<u64>,
}
