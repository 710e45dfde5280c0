//! Socket layer
//!
//! `Transport` is the raw connection: readiness polling plus unbuffered
//! read, write and close. `Socket` wraps a transport with a read buffer and
//! the primitives the engine needs: block reads, line reads, one-byte peeks
//! and full reads/writes, each honouring the configured read timeout.
//!
//! Every failure is classified into one of the error kinds the retry logic
//! depends on: closed by peer, reset, truncated, timeout or generic I/O.

use super::{Error, Result};
use bytes::{Buf, BytesMut};
use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::os::fd::AsRawFd;
use std::time::Duration;
use tracing::trace;

/// Amount requested from the transport on each buffer refill
const READ_CHUNK: usize = 4096;

/// Raw connection operations
///
/// `read` returning `Ok(0)` means the peer closed the connection.
pub trait Transport {
    /// Wait until the transport is ready for `events`
    ///
    /// Returns false if `timeout` elapsed first.
    fn poll(&self, events: PollEvents, timeout: Option<Duration>) -> Result<bool>;

    /// Read available data
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Write some of `buf`
    fn write(&mut self, buf: &[u8]) -> Result<usize>;

    /// Close the transport
    fn close(&mut self) -> Result<()>;
}

/// Poll events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollEvents {
    Read,
    Write,
    Both,
}

/// Map an I/O error onto the engine's error classes
pub fn classify(err: io::Error) -> Error {
    match err.kind() {
        io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::NotConnected => Error::ConnectionReset(err.to_string()),
        io::ErrorKind::BrokenPipe => Error::ConnectionClosed,
        io::ErrorKind::UnexpectedEof => Error::Truncated,
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => Error::Timeout,
        _ => Error::Io(err),
    }
}

/// Plain TCP transport
pub struct TcpTransport {
    stream: TcpStream,
}

impl TcpTransport {
    /// Create a new transport from a connected TCP stream
    pub fn new(stream: TcpStream) -> Self {
        TcpTransport { stream }
    }

    /// Get a reference to the underlying stream
    pub fn stream(&self) -> &TcpStream {
        &self.stream
    }
}

impl Transport for TcpTransport {
    fn poll(&self, events: PollEvents, timeout: Option<Duration>) -> Result<bool> {
        use libc::{poll, pollfd, POLLIN, POLLOUT};

        let mut pfd = pollfd {
            fd: self.stream.as_raw_fd(),
            events: match events {
                PollEvents::Read => POLLIN,
                PollEvents::Write => POLLOUT,
                PollEvents::Both => POLLIN | POLLOUT,
            },
            revents: 0,
        };

        let timeout_ms = timeout
            .map(|d| d.as_millis().min(i32::MAX as u128) as i32)
            .unwrap_or(-1);

        loop {
            let result = unsafe { poll(&mut pfd as *mut pollfd, 1, timeout_ms) };

            if result < 0 {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(Error::Io(err));
            }

            return Ok(result > 0);
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        loop {
            match self.stream.read(buf) {
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                other => return other.map_err(classify),
            }
        }
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        loop {
            match self.stream.write(buf) {
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                other => return other.map_err(classify),
            }
        }
    }

    fn close(&mut self) -> Result<()> {
        use std::net::Shutdown;
        match self.stream.shutdown(Shutdown::Both) {
            // The peer may already have torn the connection down.
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            other => other.map_err(Error::from),
        }
    }
}

/// Buffered socket over a transport
pub struct Socket<T: Transport> {
    transport: T,
    timeout: Option<Duration>,
    buffer: BytesMut,
    received: u64,
}

impl<T: Transport> Socket<T> {
    /// Create a new socket with no read timeout
    pub fn new(transport: T) -> Self {
        Socket {
            transport,
            timeout: None,
            buffer: BytesMut::with_capacity(READ_CHUNK),
            received: 0,
        }
    }

    /// Set the timeout for reads and writes
    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }

    /// Get the timeout
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Number of bytes read from the transport but not yet consumed
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Total number of bytes read from the transport
    pub fn received(&self) -> u64 {
        self.received
    }

    /// Pull more data from the transport into the buffer
    fn fill(&mut self) -> Result<()> {
        if !self.transport.poll(PollEvents::Read, self.timeout)? {
            return Err(Error::Timeout);
        }

        let mut chunk = [0u8; READ_CHUNK];
        let n = self.transport.read(&mut chunk)?;
        if n == 0 {
            return Err(Error::ConnectionClosed);
        }

        trace!(bytes = n, "socket read");
        self.buffer.extend_from_slice(&chunk[..n]);
        self.received += n as u64;
        Ok(())
    }

    /// Read up to `buf.len()` bytes
    ///
    /// Blocks until at least one byte is available. Closure of the
    /// connection is reported as `Error::ConnectionClosed`.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.buffer.is_empty() {
            self.fill()?;
        }

        let n = buf.len().min(self.buffer.len());
        buf[..n].copy_from_slice(&self.buffer[..n]);
        self.buffer.advance(n);
        Ok(n)
    }

    /// Read exactly `buf.len()` bytes
    pub fn full_read(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            filled += self.read(&mut buf[filled..])?;
        }
        Ok(())
    }

    /// Read one line, including its terminating newline
    ///
    /// Lines longer than `max` bytes are a protocol error.
    pub fn read_line(&mut self, max: usize) -> Result<String> {
        loop {
            if let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
                if pos + 1 > max {
                    return Err(Error::Protocol("Line too long".to_string()));
                }
                let line = self.buffer.split_to(pos + 1);
                return Ok(String::from_utf8_lossy(&line).into_owned());
            }

            if self.buffer.len() >= max {
                return Err(Error::Protocol("Line too long".to_string()));
            }

            self.fill()?;
        }
    }

    /// Return the next byte without consuming it
    pub fn peek(&mut self) -> Result<u8> {
        if self.buffer.is_empty() {
            self.fill()?;
        }
        Ok(self.buffer[0])
    }

    /// Write all of `data`
    pub fn full_write(&mut self, data: &[u8]) -> Result<()> {
        let mut written = 0;

        while written < data.len() {
            if !self.transport.poll(PollEvents::Write, self.timeout)? {
                return Err(Error::Timeout);
            }

            let n = self.transport.write(&data[written..])?;
            if n == 0 {
                return Err(Error::ConnectionClosed);
            }
            written += n;
        }

        Ok(())
    }

    /// Close the socket, discarding buffered input
    pub fn close(&mut self) -> Result<()> {
        self.buffer.clear();
        self.transport.close()
    }

    /// Get a reference to the underlying transport
    pub fn get_ref(&self) -> &T {
        &self.transport
    }

    /// Get a mutable reference to the underlying transport
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}
