//! Response body framing
//!
//! Once the final status and headers of a response are known, exactly one
//! of four framing modes decides where the body ends (RFC 2616 §4.4,
//! without multipart/byteranges). The mode never changes for the rest of
//! the response.

use super::chunked::parse_chunk_size;
use super::parser::parse_content_length;
use super::socket::{Socket, Transport};
use super::{Error, Headers, Result, Status, BUFSIZ};
use tracing::{debug, trace};

/// How the end of a response body is found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyMode {
    /// HEAD requests, 204 and 304 responses
    NoBody,
    /// Transfer-Encoding present
    Chunked,
    /// Content-Length present
    ContentLength,
    /// Body ends when the server closes the connection
    TillEof,
}

#[derive(Debug, Clone)]
enum Framing {
    NoBody,
    Chunked { remain: u64, finished: bool },
    ContentLength { total: u64, remain: u64 },
    TillEof,
}

/// Body reading state of one response
#[derive(Debug, Clone)]
pub struct ResponseBody {
    framing: Framing,
    progress: u64,
    closed_by_peer: bool,
}

impl Default for ResponseBody {
    fn default() -> Self {
        ResponseBody::new(BodyMode::NoBody, 0)
    }
}

impl ResponseBody {
    fn new(mode: BodyMode, length: u64) -> Self {
        let framing = match mode {
            BodyMode::NoBody => Framing::NoBody,
            BodyMode::Chunked => Framing::Chunked {
                remain: 0,
                finished: false,
            },
            BodyMode::ContentLength => Framing::ContentLength {
                total: length,
                remain: length,
            },
            BodyMode::TillEof => Framing::TillEof,
        };

        ResponseBody {
            framing,
            progress: 0,
            closed_by_peer: false,
        }
    }

    /// Pick the framing for a response
    ///
    /// HEAD requests and 204/304 responses never have a body. Otherwise any
    /// Transfer-Encoding header means chunked, whatever its value; then a
    /// valid Content-Length; then read-till-EOF. An invalid Content-Length
    /// is a protocol error.
    pub fn select(method_is_head: bool, status: &Status, headers: &Headers) -> Result<Self> {
        let body = if method_is_head || status.code() == 204 || status.code() == 304 {
            ResponseBody::new(BodyMode::NoBody, 0)
        } else if headers.contains("transfer-encoding") {
            ResponseBody::new(BodyMode::Chunked, 0)
        } else if let Some(value) = headers.get("content-length") {
            ResponseBody::new(BodyMode::ContentLength, parse_content_length(value)?)
        } else {
            ResponseBody::new(BodyMode::TillEof, 0)
        };

        debug!(mode = ?body.mode(), "response body framing");
        Ok(body)
    }

    /// Get the framing mode
    pub fn mode(&self) -> BodyMode {
        match self.framing {
            Framing::NoBody => BodyMode::NoBody,
            Framing::Chunked { .. } => BodyMode::Chunked,
            Framing::ContentLength { .. } => BodyMode::ContentLength,
            Framing::TillEof => BodyMode::TillEof,
        }
    }

    /// Declared body length, for Content-Length framing only
    pub fn total(&self) -> Option<u64> {
        match self.framing {
            Framing::ContentLength { total, .. } => Some(total),
            _ => None,
        }
    }

    /// Body bytes read so far
    pub fn progress(&self) -> u64 {
        self.progress
    }

    /// Whether a read-till-EOF body ended by connection closure
    ///
    /// Such a connection cannot be reused.
    pub fn closed_by_peer(&self) -> bool {
        self.closed_by_peer
    }

    /// Read the next block of the body into `buf`
    ///
    /// Returns the number of bytes stored; 0 means end of body.
    pub fn read_block<T: Transport>(&mut self, sock: &mut Socket<T>, buf: &mut [u8]) -> Result<usize> {
        let willread = match &mut self.framing {
            Framing::NoBody => 0,
            Framing::Chunked { finished: true, .. } => 0,
            Framing::Chunked { remain, finished } => {
                if *remain == 0 {
                    let line = sock.read_line(BUFSIZ)?;
                    let size = parse_chunk_size(&line)?;
                    debug!(size, "chunk");
                    if size == 0 {
                        *finished = true;
                    }
                    *remain = size;
                }
                (*remain).min(buf.len() as u64) as usize
            }
            Framing::ContentLength { remain, .. } => (*remain).min(buf.len() as u64) as usize,
            Framing::TillEof => buf.len(),
        };

        if willread == 0 {
            return Ok(0);
        }

        trace!(willread, "reading response body");
        let n = match sock.read(&mut buf[..willread]) {
            Ok(n) => n,
            Err(Error::ConnectionClosed | Error::Truncated)
                if matches!(self.framing, Framing::TillEof) =>
            {
                debug!("Got EOF");
                self.closed_by_peer = true;
                0
            }
            Err(e) => return Err(e),
        };

        match &mut self.framing {
            Framing::Chunked { remain, .. } => {
                *remain -= n as u64;
                if *remain == 0 {
                    let mut crlf = [0u8; 2];
                    sock.full_read(&mut crlf)?;
                    if &crlf != b"\r\n" {
                        return Err(Error::Protocol("Chunk delimiter was invalid".to_string()));
                    }
                }
            }
            Framing::ContentLength { remain, .. } => *remain -= n as u64,
            _ => {}
        }

        self.progress += n as u64;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::mock::{MockTransport, Step};

    fn socket(steps: Vec<Step>) -> Socket<MockTransport> {
        Socket::new(MockTransport::new(steps).0)
    }

    fn status(code: u16) -> Status {
        Status::new(1, 1, code, "")
    }

    fn headers(fields: &[(&str, &str)]) -> Headers {
        let mut headers = Headers::new();
        for (name, value) in fields {
            headers.insert(name, value);
        }
        headers
    }

    fn read_all(body: &mut ResponseBody, sock: &mut Socket<MockTransport>, block: usize) -> Vec<u8> {
        let mut out = Vec::new();
        let mut buf = vec![0u8; block];
        loop {
            let n = body.read_block(sock, &mut buf).unwrap();
            if n == 0 {
                return out;
            }
            out.extend_from_slice(&buf[..n]);
        }
    }

    #[test]
    fn test_select_no_body_overrides_headers() {
        let fields = headers(&[("Transfer-Encoding", "chunked"), ("Content-Length", "10")]);

        let body = ResponseBody::select(true, &status(200), &fields).unwrap();
        assert_eq!(body.mode(), BodyMode::NoBody);
        let body = ResponseBody::select(false, &status(204), &fields).unwrap();
        assert_eq!(body.mode(), BodyMode::NoBody);
        let body = ResponseBody::select(false, &status(304), &fields).unwrap();
        assert_eq!(body.mode(), BodyMode::NoBody);
    }

    #[test]
    fn test_select_transfer_encoding_any_value() {
        let fields = headers(&[("Transfer-Encoding", "gzip"), ("Content-Length", "10")]);
        let body = ResponseBody::select(false, &status(200), &fields).unwrap();
        assert_eq!(body.mode(), BodyMode::Chunked);
    }

    #[test]
    fn test_select_content_length() {
        let fields = headers(&[("Content-Length", "10")]);
        let body = ResponseBody::select(false, &status(200), &fields).unwrap();
        assert_eq!(body.mode(), BodyMode::ContentLength);
        assert_eq!(body.total(), Some(10));
    }

    #[test]
    fn test_select_invalid_content_length() {
        for value in ["-1", "abc"] {
            let fields = headers(&[("Content-Length", value)]);
            let err = ResponseBody::select(false, &status(200), &fields).unwrap_err();
            assert!(err.is_protocol());
        }
    }

    #[test]
    fn test_select_till_eof() {
        let body = ResponseBody::select(false, &status(200), &Headers::new()).unwrap();
        assert_eq!(body.mode(), BodyMode::TillEof);
        assert_eq!(body.total(), None);
    }

    #[test]
    fn test_no_body_reads_nothing() {
        let mut sock = socket(vec![Step::data("unrelated")]);
        let mut body = ResponseBody::default();
        let mut buf = [0u8; 16];
        assert_eq!(body.read_block(&mut sock, &mut buf).unwrap(), 0);
        assert_eq!(sock.buffered(), 0);
    }

    #[test]
    fn test_content_length_stops_at_length() {
        let mut sock = socket(vec![Step::data("hello worldNEXT")]);
        let mut body = ResponseBody::new(BodyMode::ContentLength, 11);

        assert_eq!(read_all(&mut body, &mut sock, 4), b"hello world");
        assert_eq!(body.progress(), 11);
        assert_eq!(sock.buffered(), 4);
    }

    #[test]
    fn test_content_length_early_close_is_error() {
        let mut sock = socket(vec![Step::data("short")]);
        let mut body = ResponseBody::new(BodyMode::ContentLength, 10);
        let mut buf = [0u8; 16];

        assert_eq!(body.read_block(&mut sock, &mut buf).unwrap(), 5);
        assert!(matches!(
            body.read_block(&mut sock, &mut buf),
            Err(Error::ConnectionClosed)
        ));
    }

    #[test]
    fn test_chunked_reassembly() {
        let mut sock = socket(vec![
            Step::data("4\r\nabcd\r\n"),
            Step::data("6;ext=1\r\nefghij\r\n0\r\n\r\n"),
        ]);
        let mut body = ResponseBody::new(BodyMode::Chunked, 0);

        assert_eq!(read_all(&mut body, &mut sock, 3), b"abcdefghij");
        // The blank line ending the trailers is left for the end step.
        assert_eq!(sock.buffered(), 2);

        let mut buf = [0u8; 4];
        assert_eq!(body.read_block(&mut sock, &mut buf).unwrap(), 0);
        assert_eq!(sock.buffered(), 2);
    }

    #[test]
    fn test_chunked_bad_delimiter() {
        let mut sock = socket(vec![Step::data("4\r\nabcdXX0\r\n\r\n")]);
        let mut body = ResponseBody::new(BodyMode::Chunked, 0);
        let mut buf = [0u8; 16];

        let err = body.read_block(&mut sock, &mut buf).unwrap_err();
        assert_eq!(err.to_string(), "Chunk delimiter was invalid");
    }

    #[test]
    fn test_chunked_bad_size() {
        let mut sock = socket(vec![Step::data("zz\r\n")]);
        let mut body = ResponseBody::new(BodyMode::Chunked, 0);
        let mut buf = [0u8; 16];

        let err = body.read_block(&mut sock, &mut buf).unwrap_err();
        assert!(matches!(err, Error::InvalidChunkSize(_)));
    }

    #[test]
    fn test_till_eof() {
        let mut sock = socket(vec![Step::data("abc"), Step::data("def")]);
        let mut body = ResponseBody::new(BodyMode::TillEof, 0);

        assert_eq!(read_all(&mut body, &mut sock, 16), b"abcdef");
        assert!(body.closed_by_peer());
    }

    #[test]
    fn test_till_eof_reset_is_error() {
        let mut sock = socket(vec![Step::data("abc"), Step::reset()]);
        let mut body = ResponseBody::new(BodyMode::TillEof, 0);
        let mut buf = [0u8; 16];

        assert_eq!(body.read_block(&mut sock, &mut buf).unwrap(), 3);
        assert!(body.read_block(&mut sock, &mut buf).is_err());
    }
}
