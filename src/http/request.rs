//! HTTP requests
//!
//! A `Request` describes one exchange: method, target, caller headers and
//! body, plus the state of the response once it has been dispatched.
//! Requests are created and destroyed through their `Session`, which also
//! drives them.

use super::body::{BodySource, BufferSource, CallbackSource, FileSource};
use super::hooks::{HookList, PreSendHook, PrivateData};
use super::readers::BodyReader;
use super::{Headers, ResponseBody, Result, SessionConfig, Status, CRLF};
use bytes::Bytes;
use std::any::Any;
use std::fmt::{self, Display, Write as _};
use std::fs::File;
use std::io;

/// One HTTP exchange
pub struct Request {
    pub(crate) method: String,
    pub(crate) target: String,
    pub(crate) headers: String,
    pub(crate) body: Option<Box<dyn BodySource>>,
    pub(crate) body_length: u64,
    pub(crate) method_is_head: bool,
    pub(crate) expect100: bool,

    pub(crate) status: Status,
    pub(crate) response_headers: Headers,
    pub(crate) response: ResponseBody,
    pub(crate) can_persist: bool,

    pub(crate) pre_send_hooks: HookList<PreSendHook>,
    pub(crate) private: PrivateData,
    pub(crate) body_readers: Vec<BodyReader>,
}

impl Request {
    pub(crate) fn new(method: &str, target: String) -> Self {
        Request {
            method: method.to_string(),
            target,
            headers: String::new(),
            body: None,
            body_length: 0,
            method_is_head: method == "HEAD",
            expect100: false,
            status: Status::default(),
            response_headers: Headers::new(),
            response: ResponseBody::default(),
            can_persist: false,
            pre_send_hooks: HookList::new(),
            private: PrivateData::new(),
            body_readers: Vec::new(),
        }
    }

    /// Add a request header
    ///
    /// The value is sent as given; anything `Display` can be used, so
    /// formatted values need no intermediate string.
    pub fn add_header(&mut self, name: &str, value: impl Display) {
        // Writing to a String cannot fail.
        let _ = write!(self.headers, "{}: {}{}", name, value, CRLF);
    }

    /// Send `data` as the request body
    pub fn set_body_buffer(&mut self, data: impl Into<Bytes>) {
        let source = BufferSource::new(data);
        let length = source.len() as u64;
        self.set_body_source(length, Box::new(source));
    }

    /// Send `length` bytes of `file`, starting at `offset`, as the body
    pub fn set_body_file(&mut self, file: File, offset: u64, length: u64) {
        self.set_body_source(length, Box::new(FileSource::new(file, offset, length)));
    }

    /// Send a body of `length` bytes produced by `provider`
    ///
    /// See `CallbackSource` for the calling convention.
    pub fn set_body_provider<F>(&mut self, length: u64, provider: F)
    where
        F: FnMut(&mut [u8]) -> io::Result<usize> + 'static,
    {
        self.set_body_source(length, Box::new(CallbackSource::new(provider)));
    }

    /// Send a body of `length` bytes read from `source`
    pub fn set_body_source(&mut self, length: u64, source: Box<dyn BodySource>) {
        self.body = Some(source);
        self.body_length = length;
        self.add_header("Content-Length", length);
    }

    /// Ask the server to confirm with `100 Continue` before the body is sent
    pub fn set_expect100(&mut self, flag: bool) {
        self.expect100 = flag;
    }

    /// Register a response body reader
    ///
    /// `accept` is called with the final status of each response; when it
    /// returns true, `reader` receives every body block of that response,
    /// then an empty block at the end of the body. An error from `reader`
    /// aborts the exchange. Readers added later are called first.
    pub fn add_response_body_reader<A, R>(&mut self, accept: A, reader: R)
    where
        A: FnMut(&Status) -> bool + 'static,
        R: FnMut(&[u8]) -> Result<()> + 'static,
    {
        self.body_readers
            .insert(0, BodyReader::new(Box::new(accept), Box::new(reader)));
    }

    /// Register a pre-send hook for this request only
    ///
    /// It runs after the session's pre-send hooks.
    pub fn hook_pre_send<F>(&mut self, hook: F)
    where
        F: FnMut(&Request, &mut String) + 'static,
    {
        self.pre_send_hooks.add(Box::new(hook));
    }

    /// Attach private data to this request under `id`
    pub fn set_private<V: Any>(&mut self, id: &str, value: V) {
        self.private.set(id, value);
    }

    /// Get the private data stored under `id`
    pub fn private<V: Any>(&self, id: &str) -> Option<&V> {
        self.private.get(id)
    }

    pub fn private_mut<V: Any>(&mut self, id: &str) -> Option<&mut V> {
        self.private.get_mut(id)
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    /// The request target as sent on the request line
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn is_head(&self) -> bool {
        self.method_is_head
    }

    /// Declared length of the request body
    pub fn body_length(&self) -> u64 {
        self.body_length
    }

    /// Status of the last response
    pub fn status(&self) -> &Status {
        &self.status
    }

    /// Get a response header (case-insensitive)
    pub fn response_header(&self, name: &str) -> Option<&str> {
        self.response_headers.get(name)
    }

    pub fn response_headers(&self) -> &Headers {
        &self.response_headers
    }

    /// Framing state of the current response body
    pub fn response_body(&self) -> &ResponseBody {
        &self.response
    }

    /// Serialise the request line and every header the request itself
    /// contributes, without pre-send hook output or the final blank line
    pub(crate) fn head(&self, config: &SessionConfig, server_is_http11: bool) -> String {
        let mut out = String::with_capacity(128 + self.headers.len());

        out.push_str(&format!(
            "{} {} HTTP/1.1{}Host: {}{}",
            self.method,
            self.target,
            CRLF,
            config.host_port(),
            CRLF
        ));
        out.push_str(&self.headers);

        if let Some(agent) = &config.user_agent {
            out.push_str(&format!("User-Agent: {}{}", agent, CRLF));
        }

        if !config.persist {
            out.push_str("Connection: TE, close\r\nTE: trailers\r\n");
        } else if !server_is_http11 && config.proxy.is_none() {
            out.push_str("Keep-Alive: \r\nConnection: TE, Keep-Alive\r\nTE: trailers\r\n");
        } else {
            out.push_str("Connection: TE\r\nTE: trailers\r\n");
        }

        if self.expect100 {
            out.push_str("Expect: 100-continue\r\n");
        }

        out
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("target", &self.target)
            .field("body_length", &self.body_length)
            .field("expect100", &self.expect100)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// Mask the credentials of every `Authorization:` line in `request`
///
/// `Proxy-Authorization` lines are masked too.
pub fn redact_authorization(request: &str) -> String {
    const MARKER: &str = "authorization: ";

    request
        .split_inclusive('\n')
        .map(|line| {
            let Some(pos) = line.to_ascii_lowercase().find(MARKER) else {
                return line.to_string();
            };

            let start = pos + MARKER.len();
            let value = &line[start..];
            let end = value.find(['\r', '\n']).unwrap_or(value.len());
            format!(
                "{}{}{}",
                &line[..start],
                "x".repeat(value[..end].chars().count()),
                &value[end..]
            )
        })
        .collect()
}
