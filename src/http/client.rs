//! Request dispatch
//!
//! The exchange engine: sending a request (with the one-shot retry on a
//! stale persistent connection), consuming interim responses, reading the
//! response head, serving the body block by block and finishing the
//! exchange. Exchanges are driven through methods on `Session`, one
//! request at a time.
//!
//! A server may close an idle persistent connection at any moment. If the
//! connection was reused and nothing of the response has been read yet,
//! closure, reset or truncation of the connection means the request never
//! reached a live server, so it is sent once more on a fresh connection.
//! Once a read has succeeded every failure is final, and a timeout is
//! never retried.

use super::framing::BodyMode;
use super::hooks::Outcome;
use super::parser::{self, parse_status_line, strip_eol};
use super::request::redact_authorization;
use super::session::{describe, Connector};
use super::{Error, Request, ResponseBody, Result, Session, BUFSIZ, CRLF};
use std::io::{self, Write};
use tracing::{debug, trace};

/// Retry state of one send attempt
#[derive(Debug, Clone, Copy)]
struct Attempt {
    /// The connection was kept open after an earlier exchange
    reused: bool,
    /// A response read of this attempt has succeeded
    response_started: bool,
}

impl Attempt {
    fn may_retry(&self) -> bool {
        self.reused && !self.response_started
    }
}

enum SendOutcome {
    Sent,
    /// The reused connection turned out to be dead; the error is what was seen
    Retry(Error),
}

impl<C: Connector> Session<C> {
    /// Send the request and read the response head
    ///
    /// On success the status and headers of the final response are
    /// available from the request and the body can be read with
    /// `read_response_block`.
    pub fn begin_request(&mut self, req: &mut Request) -> Result<()> {
        req.response = ResponseBody::default();

        let data = self.build_request(req);
        debug!(request = %redact_authorization(&data), "Sending request headers");

        let mut outcome = self.send_request(req, data.as_bytes())?;
        if matches!(outcome, SendOutcome::Retry(_)) && self.config.persist {
            debug!("Persistent connection timed out, retrying");
            outcome = self.send_request(req, data.as_bytes())?;
        }
        if let SendOutcome::Retry(err) = outcome {
            return Err(err);
        }

        self.is_http11 = req.status.is_http11();
        req.can_persist = self.is_http11;
        self.error = req.status.to_string();

        req.response_headers.clear();
        if let Err(e) = self
            .socket_mut()
            .and_then(|sock| parser::read_header_block(sock, &mut req.response_headers))
        {
            return Err(self.abort("Error reading response headers", e));
        }

        if let Some(value) = req.response_headers.get("connection") {
            let value = value.to_ascii_lowercase();
            for token in value.split(',').map(|t| t.trim_matches([' ', '\t'])) {
                match token {
                    "close" => req.can_persist = false,
                    "keep-alive" => req.can_persist = true,
                    "connection" => {}
                    _ if !self.is_http11 => {
                        req.response_headers.remove(token);
                    }
                    _ => {}
                }
            }
        }

        req.response =
            match ResponseBody::select(req.method_is_head, &req.status, &req.response_headers) {
                Ok(body) => body,
                Err(e) => return Err(self.abandon(e)),
            };

        for reader in req.body_readers.iter_mut() {
            reader.enabled = (reader.accept)(&req.status);
        }

        Ok(())
    }

    /// Read the next block of the response body into `buf`
    ///
    /// Returns the number of bytes read; 0 means the body is complete.
    /// Each block, including the final empty one, is passed to the body
    /// readers that accepted the response. An empty `buf` is rejected
    /// without touching the connection.
    pub fn read_response_block(&mut self, req: &mut Request, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                "empty response body buffer",
            )));
        }

        let n = match self
            .socket_mut()
            .and_then(|sock| req.response.read_block(sock, buf))
        {
            Ok(n) => n,
            Err(e) => return Err(self.abort("Could not read response body", e)),
        };

        if req.response.closed_by_peer() {
            req.can_persist = false;
        }
        trace!(bytes = n, "Response body block");

        if let Some(progress) = self.progress.as_mut() {
            progress(req.response.progress(), req.response.total());
        }

        for reader in req.body_readers.iter_mut().filter(|r| r.enabled) {
            if let Err(e) = (reader.reader)(&buf[..n]) {
                return Err(self.abandon(e));
            }
        }

        Ok(n)
    }

    /// Read and drop the rest of the response body
    pub fn discard_response(&mut self, req: &mut Request) -> Result<()> {
        let mut buf = [0u8; BUFSIZ];
        while self.read_response_block(req, &mut buf)? > 0 {}
        Ok(())
    }

    /// Copy the rest of the response body into `writer`
    pub fn read_response_to_writer<W>(&mut self, req: &mut Request, writer: &mut W) -> Result<()>
    where
        W: Write + ?Sized,
    {
        let mut buf = [0u8; BUFSIZ];
        loop {
            let n = self.read_response_block(req, &mut buf)?;
            if n == 0 {
                return Ok(());
            }
            if let Err(e) = writer.write_all(&buf[..n]) {
                return Err(self.abort("Could not write response body", Error::Io(e)));
            }
        }
    }

    /// Finish the exchange
    ///
    /// Reads the trailers of a chunked body, runs the post-send hooks and
    /// then either keeps the connection for the next request or closes it.
    pub fn end_request(&mut self, req: &mut Request) -> Result<Outcome> {
        if req.response.mode() == BodyMode::Chunked {
            if let Err(e) = self
                .socket_mut()
                .and_then(|sock| parser::read_header_block(sock, &mut req.response_headers))
            {
                return Err(self.abort("Error reading response trailers", e));
            }
        }

        debug!("Running post-send hooks");
        let mut result = Ok(Outcome::Done);
        for hook in self.post_send_hooks.iter_mut() {
            result = hook(req, &req.status);
            if !matches!(result, Ok(Outcome::Done)) {
                break;
            }
        }

        if !self.config.persist || !req.can_persist {
            self.close_connection();
        } else {
            self.persisted = true;
        }

        if let Err(e) = &result {
            self.error = describe(e);
        }
        result
    }

    /// Run a complete exchange, discarding the response body
    ///
    /// The request is sent again for as long as a post-send hook asks for
    /// it.
    pub fn dispatch(&mut self, req: &mut Request) -> Result<()> {
        loop {
            self.begin_request(req)?;
            self.discard_response(req)?;
            match self.end_request(req)? {
                Outcome::Done => return Ok(()),
                Outcome::Retry => debug!("Post-send hook requested a retry"),
            }
        }
    }

    /// Serialise the request head, pre-send hook output included
    fn build_request(&mut self, req: &mut Request) -> String {
        let mut data = req.head(&self.config, self.is_http11);

        debug!("Running pre-send hooks");
        for hook in self.pre_send_hooks.iter_mut() {
            hook(req, &mut data);
        }
        let mut hooks = std::mem::take(&mut req.pre_send_hooks);
        for hook in hooks.iter_mut() {
            hook(req, &mut data);
        }
        req.pre_send_hooks = hooks;

        data.push_str(CRLF);
        data
    }

    /// One attempt at sending the request and reading the final status line
    fn send_request(&mut self, req: &mut Request, data: &[u8]) -> Result<SendOutcome> {
        self.open_connection()?;

        let mut attempt = Attempt {
            reused: self.persisted,
            response_started: false,
        };

        if let Err(e) = self.socket_mut().and_then(|sock| sock.full_write(data)) {
            return self.fail(&attempt, "Could not send request", e);
        }
        // Unconsumed input already counts as part of the response.
        let mark = self
            .socket
            .as_ref()
            .map_or(0, |sock| sock.received() - sock.buffered() as u64);

        if !req.expect100 && req.body_length > 0 {
            if let SendOutcome::Retry(e) = self.send_body(req, &attempt)? {
                return Ok(SendOutcome::Retry(e));
            }
        }

        debug!(retry = attempt.may_retry(), "Request sent");

        let mut body_sent = false;
        loop {
            let line = match self.socket_mut().and_then(|sock| sock.read_line(BUFSIZ)) {
                Ok(line) => line,
                Err(e) => {
                    if self.socket.as_ref().is_some_and(|sock| sock.received() > mark) {
                        attempt.response_started = true;
                    }
                    return self.fail(&attempt, "Could not read status line", e);
                }
            };
            debug!(line = strip_eol(&line), "Status line");

            req.status = match parse_status_line(&line) {
                Ok(status) => status,
                Err(e) => return Err(self.abandon(e)),
            };
            if !req.status.is_informational() {
                return Ok(SendOutcome::Sent);
            }

            debug!(code = req.status.code(), "Interim response");
            attempt.response_started = true;

            if let Err(e) = self.socket_mut().and_then(parser::discard_headers) {
                return Err(self.abort("Error reading response headers", e));
            }

            if req.expect100 && req.status.code() == 100 && req.body_length > 0 && !body_sent {
                if let SendOutcome::Retry(e) = self.send_body(req, &attempt)? {
                    return Ok(SendOutcome::Retry(e));
                }
                body_sent = true;
            }
        }
    }

    /// Stream the request body, from the start
    fn send_body(&mut self, req: &mut Request, attempt: &Attempt) -> Result<SendOutcome> {
        let Some(body) = req.body.as_mut() else {
            return Ok(SendOutcome::Sent);
        };
        debug!(length = req.body_length, "Sending request body");

        if let Err(e) = body.rewind() {
            return Err(self.abandon(e));
        }

        let mut buf = [0u8; BUFSIZ];
        let mut sent = 0u64;
        loop {
            let n = match body.read_block(&mut buf) {
                Ok(0) => return Ok(SendOutcome::Sent),
                Ok(n) => n,
                Err(e) => {
                    debug!(error = %e, "Request body source failed");
                    return Err(self.abandon(e));
                }
            };
            if n > buf.len() || sent + n as u64 > req.body_length {
                return Err(self.abandon(Error::BodySource(format!(
                    "Request body is longer than the declared {} bytes",
                    req.body_length
                ))));
            }

            if let Err(e) = self.socket_mut().and_then(|sock| sock.full_write(&buf[..n])) {
                return self.fail(attempt, "Could not send request body", e);
            }
            trace!(bytes = n, "Request body block");

            sent += n as u64;
            if let Some(progress) = self.progress.as_mut() {
                progress(sent, Some(req.body_length));
            }
        }
    }

    /// Turn a send failure into a retry when the attempt allows one
    fn fail(&mut self, attempt: &Attempt, doing: &str, err: Error) -> Result<SendOutcome> {
        let retry = attempt.may_retry() && err.is_closed_by_peer();
        let err = self.abort(doing, err);
        if retry {
            Ok(SendOutcome::Retry(err))
        } else {
            Err(err)
        }
    }

    /// Close the connection after a failure while `doing` something,
    /// recording the failure as the session error
    fn abort(&mut self, doing: &str, err: Error) -> Error {
        debug!(doing, error = %err, "Aborted request");
        let message = match &err {
            Error::ConnectionClosed if self.config.proxy.is_some() => {
                format!("{}: connection was closed by proxy server.", doing)
            }
            Error::ConnectionClosed => format!("{}: connection was closed by server.", doing),
            Error::Timeout => format!("{}: connection timed out.", doing),
            Error::ConnectionReset(_) | Error::Truncated | Error::Io(_) => {
                format!("{}: {}", doing, err)
            }
            other => describe(other),
        };
        self.error = message;
        self.close_connection();
        err
    }

    /// Close the connection after a failure that carries its own message
    fn abandon(&mut self, err: Error) -> Error {
        self.error = describe(&err);
        self.close_connection();
        err
    }
}
