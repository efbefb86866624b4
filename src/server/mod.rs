// Server module entry point
// Listener setup, connection handling and the accept loop

pub mod connection;
pub mod listener;
pub mod signal;

// `loop` is a keyword, so the module gets a different name
#[path = "loop.rs"]
pub mod server_loop;

use std::sync::Arc;

pub use listener::bind_with_retry;
pub use server_loop::start_server_loop;

use crate::config::{AppState, Config};
use crate::error::StartupError;
use crate::logger;

/// Resolve state, bind and serve until Ctrl+C / SIGTERM
pub async fn run(config: Config) -> Result<(), StartupError> {
    let state = Arc::new(AppState::new(&config)?);
    let addr = config.socket_addr()?;
    let (listener, bound) = bind_with_retry(addr, config.server.port_retries)?;

    logger::log_server_start(&bound, &state);
    start_server_loop(listener, state, signal::shutdown_signal()).await;
    Ok(())
}
