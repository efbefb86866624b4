use clap::Parser;
use std::process::ExitCode;

mod config;
mod error;
mod handler;
mod http;
mod logger;
mod scan;
mod server;

use crate::config::{Config, ConfigOverrides};
use crate::error::StartupError;

/// Local host for a static web-app bundle, with an optional image scan API
#[derive(Parser, Debug)]
#[command(name = "toolbox_host", version)]
struct Cli {
    /// Configuration file; the extension may be omitted
    #[arg(short, long, default_value = "config")]
    config: String,

    /// Address to listen on
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Following ports to try when the port is already in use
    #[arg(long)]
    port_retries: Option<u16>,

    /// Directory served as the static root
    #[arg(short, long)]
    root: Option<String>,

    /// Enable the image scan endpoint
    #[arg(long, conflicts_with = "no_scan")]
    scan: bool,

    /// Disable the image scan endpoint
    #[arg(long)]
    no_scan: bool,

    /// Send no-store cache headers on every response
    #[arg(long)]
    no_cache: bool,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    print_config: bool,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        let scan_enabled = match (self.scan, self.no_scan) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        };
        ConfigOverrides {
            host: self.host.clone(),
            port: self.port,
            port_retries: self.port_retries,
            root: self.root.clone(),
            scan_enabled,
            no_cache: self.no_cache.then_some(true),
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let cfg = match Config::load_from(&cli.config, &cli.overrides()) {
        Ok(cfg) => cfg,
        Err(e) => return fail(&StartupError::from(e)),
    };

    if cli.print_config {
        return match toml::to_string_pretty(&cfg) {
            Ok(text) => {
                print!("{text}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("[ERROR] Failed to render configuration: {e}");
                ExitCode::FAILURE
            }
        };
    }

    match run(cfg) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => fail(&e),
    }
}

fn run(cfg: Config) -> Result<(), StartupError> {
    logger::init(&cfg.logging).map_err(StartupError::Logger)?;

    // Worker threads default to the number of CPU cores
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(workers) = cfg.server.workers {
        runtime_builder.worker_threads(workers);
    }
    let runtime = runtime_builder.build().map_err(StartupError::Runtime)?;

    runtime.block_on(server::run(cfg))
}

fn fail(error: &StartupError) -> ExitCode {
    logger::log_error(&error.to_string());
    ExitCode::FAILURE
}
