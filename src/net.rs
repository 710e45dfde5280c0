//! Network helpers
//!
//! Host name resolution and TCP connection setup used by the default
//! connector. Sockets are created through `socket2` so that options can be
//! applied before the connection is established.

use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Result type for network operations
pub type Result<T> = std::result::Result<T, Error>;

/// Network setup errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Could not resolve hostname `{host}': {source}")]
    Resolve {
        host: String,
        #[source]
        source: io::Error,
    },

    #[error("Could not resolve hostname `{0}': no addresses returned")]
    NoAddresses(String),

    #[error("{context}: {source}")]
    Connect {
        context: &'static str,
        #[source]
        source: io::Error,
    },
}

/// Resolve `host` into the list of socket addresses to try, in order.
pub fn resolve(host: &str, port: u16) -> Result<Vec<SocketAddr>> {
    let addrs: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .map_err(|source| Error::Resolve {
            host: host.to_string(),
            source,
        })?
        .collect();

    if addrs.is_empty() {
        return Err(Error::NoAddresses(host.to_string()));
    }

    Ok(addrs)
}

/// Open a TCP connection to `addr`
///
/// Nagle's algorithm is disabled: requests are written as a header block
/// followed by body blocks and latency matters more than packet count.
pub fn connect(addr: &SocketAddr, timeout: Option<Duration>) -> io::Result<TcpStream> {
    let socket = Socket::new(Domain::for_address(*addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_nodelay(true)?;

    match timeout {
        Some(timeout) => socket.connect_timeout(&(*addr).into(), timeout)?,
        None => socket.connect(&(*addr).into())?,
    }

    Ok(socket.into())
}
