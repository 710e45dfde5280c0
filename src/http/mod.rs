//! HTTP/1.1 request engine
//!
//! This module drives one HTTP exchange at a time over a session's single
//! connection: it serialises the request, sends it (retrying once when a
//! reused connection turns out to have been closed by the server), consumes
//! interim 1xx responses, reads the response headers and then serves the
//! body according to its framing.
//!
//! # Architecture
//!
//! - `Transport` abstracts the raw connection (poll, read, write, close);
//!   `Socket` layers line reads, peeks and full reads/writes on top of it
//! - `Connector` resolves the server and opens transports
//! - `Session` owns the configuration, the connection and the session hooks
//! - `Request` describes one exchange and stores its response state
//! - the engine operations (`begin_request`, `read_response_block`,
//!   `end_request`, `dispatch`) are methods on `Session`
//!
//! # Examples
//!
//! ```no_run
//! use h1dispatch::http::{Session, SessionConfig};
//!
//! let mut session = Session::new(SessionConfig::new("localhost", 8080));
//! let mut request = session.create_request("GET", "/");
//! session.dispatch(&mut request).unwrap();
//! assert_eq!(request.status().code(), 200);
//! session.destroy_request(request);
//! ```

pub mod body;
pub mod chunked;
pub mod client;
pub mod config;
pub mod framing;
pub mod headers;
pub mod hooks;
pub mod message;
pub mod parser;
pub mod readers;
pub mod request;
pub mod session;
pub mod socket;

#[cfg(test)]
pub(crate) mod mock;

pub use body::{BodySource, BufferSource, CallbackSource, FileSource};
pub use config::{ProxyConfig, SessionConfig};
pub use framing::{BodyMode, ResponseBody};
pub use headers::Headers;
pub use hooks::{HookList, Outcome};
pub use message::Status;
pub use readers::{accept_2xx, accept_always};
pub use request::Request;
pub use session::{ConnStatus, Connector, Session, TcpConnector};
pub use socket::{PollEvents, Socket, TcpTransport, Transport};

/// Result type for HTTP operations
pub type Result<T> = std::result::Result<T, Error>;

/// HTTP operation errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] crate::net::Error),

    #[error("connection was closed")]
    ConnectionClosed,

    #[error("connection was reset: {0}")]
    ConnectionReset(String),

    #[error("connection was truncated")]
    Truncated,

    #[error("connection timed out")]
    Timeout,

    #[error("not connected")]
    NotConnected,

    #[error("Could not parse chunk size: {0}")]
    InvalidChunkSize(String),

    #[error("{0}")]
    Protocol(String),

    #[error("{0}")]
    BodySource(String),

    #[error("{0}")]
    Hook(String),
}

impl Error {
    /// True for the failures a server produces when it closes an idle
    /// persistent connection: closure, reset or truncation.
    pub fn is_closed_by_peer(&self) -> bool {
        matches!(
            self,
            Error::ConnectionClosed | Error::ConnectionReset(_) | Error::Truncated
        )
    }

    /// True if the operation hit the socket read timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout)
    }

    /// True for malformed or oversized responses
    pub fn is_protocol(&self) -> bool {
        matches!(self, Error::Protocol(_) | Error::InvalidChunkSize(_))
    }
}

/// Maximum number of header lines per response (including trailers)
pub const MAX_HEADER_FIELDS: usize = 100;

/// Maximum length of one unfolded header line, and of a merged value
pub const MAX_HEADER_LEN: usize = 8192;

/// Size of the line scratch buffer and of body blocks
pub const BUFSIZ: usize = 8192;

/// Default HTTP port
pub const DEFAULT_HTTP_PORT: u16 = 80;

/// CRLF line ending
pub const CRLF: &str = "\r\n";
