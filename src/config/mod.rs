// Configuration module entry point
// Loads layered configuration and builds the immutable runtime state

mod state;
mod types;

use std::net::SocketAddr;

use crate::error::StartupError;

// Re-export public types
pub use state::AppState;
pub use types::{default_image_extensions, Config, LoggingConfig};

/// Values given on the command line; they win over file and environment
#[derive(Debug, Default, Clone)]
pub struct ConfigOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub port_retries: Option<u16>,
    pub root: Option<String>,
    pub scan_enabled: Option<bool>,
    pub no_cache: Option<bool>,
}

impl Config {
    /// Load configuration from the given file path (extension optional)
    ///
    /// Sources in increasing priority: built-in defaults, the config file
    /// (not required), `TOOLBOX_<SECTION>__<KEY>` environment variables,
    /// command-line overrides.
    pub fn load_from(
        config_path: &str,
        overrides: &ConfigOverrides,
    ) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix("TOOLBOX")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8000)?
            .set_default("server.port_retries", 0)?
            .set_default("static_files.root", "frontend")?
            .set_default("static_files.directory_listing", true)?
            .set_default("http.server_name", "toolbox_host")?
            .set_default("http.no_cache", false)?
            .set_default("http.max_age", 3600)?
            .set_default("scan.enabled", true)?
            .set_default("scan.path", "/api/scan-images")?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("logging.access_log_format", "common")?
            .set_default("performance.keep_alive", true)?
            .set_default("performance.header_read_timeout", 30)?
            .set_override_option("server.host", overrides.host.clone())?
            .set_override_option("server.port", overrides.port)?
            .set_override_option("server.port_retries", overrides.port_retries)?
            .set_override_option("static_files.root", overrides.root.clone())?
            .set_override_option("scan.enabled", overrides.scan_enabled)?
            .set_override_option("http.no_cache", overrides.no_cache)?
            .build()?;

        settings.try_deserialize()
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, StartupError> {
        socket_addr_for(&self.server.host, self.server.port)
    }
}

/// Parse `host:port`, accepting bare IPv6 hosts
pub fn socket_addr_for(host: &str, port: u16) -> Result<SocketAddr, StartupError> {
    let formatted = if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    };
    formatted
        .parse()
        .map_err(|_| StartupError::InvalidAddress(formatted))
}
