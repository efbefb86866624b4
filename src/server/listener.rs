// Listener module
// Binds the HTTP listener, walking forward through ports when one is taken

use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::SocketAddr;
use tokio::net::TcpListener;

use crate::error::StartupError;
use crate::logger;

/// Create a `TcpListener` with `SO_REUSEADDR` enabled.
///
/// `SO_REUSEADDR` only lets us rebind a port left in `TIME_WAIT`; a port held
/// by a live listener still fails with `AddrInUse`. Windows gives the option
/// port-stealing semantics, so it is left off there.
pub fn create_listener(addr: SocketAddr) -> io::Result<TcpListener> {
    let domain = if addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };

    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;
    #[cfg(not(windows))]
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(128)?;

    // socket2::Socket -> std::net::TcpListener -> tokio::net::TcpListener
    let std_listener: std::net::TcpListener = socket.into();
    TcpListener::from_std(std_listener)
}

/// Bind `addr`, trying up to `retries` following ports on `AddrInUse`
///
/// Any other bind error is returned immediately. Returns the listener with
/// the address it actually bound.
pub fn bind_with_retry(
    addr: SocketAddr,
    retries: u16,
) -> Result<(TcpListener, SocketAddr), StartupError> {
    let mut candidate = addr;
    let mut attempts: u16 = 0;
    loop {
        attempts += 1;
        match create_listener(candidate) {
            Ok(listener) => {
                let bound = listener.local_addr().unwrap_or(candidate);
                return Ok((listener, bound));
            }
            Err(e) if e.kind() == io::ErrorKind::AddrInUse => {
                let next = candidate.port().checked_add(1);
                match next {
                    Some(port) if attempts <= retries => {
                        logger::log_port_in_use(&candidate, port);
                        candidate.set_port(port);
                    }
                    _ => {
                        return Err(StartupError::AddressInUse {
                            host: addr.ip().to_string(),
                            port: addr.port(),
                            attempts,
                        })
                    }
                }
            }
            Err(source) => {
                return Err(StartupError::Bind {
                    addr: candidate,
                    source,
                })
            }
        }
    }
}
