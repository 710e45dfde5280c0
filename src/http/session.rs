//! Sessions
//!
//! A session holds everything that outlives a single exchange with one
//! server: the configuration, the (possibly persistent) connection, the
//! resolved addresses of the server or proxy, session-wide hooks and
//! private data, notifiers, and the message of the last failure.
//!
//! Connections are opened through a `Connector`, which resolves names and
//! produces transports. `TcpConnector` is the default.

use super::hooks::{
    CreateRequestHook, DestroyRequestHook, DestroySessionHook, HookList, Outcome, PostSendHook,
    PreSendHook, PrivateData,
};
use super::socket::{Socket, TcpTransport, Transport};
use super::{Error, Request, Result, SessionConfig, Status};
use crate::net;
use std::any::Any;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::debug;

/// Name resolution and connection setup
pub trait Connector {
    type Transport: Transport;

    /// Resolve `host` into the addresses to try, in order
    fn resolve(&mut self, host: &str, port: u16) -> net::Result<Vec<SocketAddr>> {
        net::resolve(host, port)
    }

    /// Open a connection to `addr`
    fn connect(&mut self, addr: &SocketAddr) -> io::Result<Self::Transport>;
}

/// Plain TCP connector
#[derive(Debug, Clone, Default)]
pub struct TcpConnector {
    connect_timeout: Option<Duration>,
}

impl TcpConnector {
    pub fn new(connect_timeout: Option<Duration>) -> Self {
        TcpConnector { connect_timeout }
    }
}

impl Connector for TcpConnector {
    type Transport = TcpTransport;

    fn connect(&mut self, addr: &SocketAddr) -> io::Result<TcpTransport> {
        net::connect(addr, self.connect_timeout).map(TcpTransport::new)
    }
}

/// Connection progress reported to the status notifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnStatus {
    NameLookup,
    Connecting,
    Connected,
}

pub(crate) type ProgressFn = Box<dyn FnMut(u64, Option<u64>)>;
pub(crate) type NotifyFn = Box<dyn FnMut(ConnStatus, &str)>;

/// Text recorded as the session error for `err`
pub(crate) fn describe(err: &Error) -> String {
    match err {
        Error::Network(inner) => inner.to_string(),
        other => other.to_string(),
    }
}

/// A series of requests to one server
pub struct Session<C: Connector = TcpConnector> {
    pub(crate) config: SessionConfig,
    pub(crate) connector: C,
    pub(crate) socket: Option<Socket<C::Transport>>,

    /// The current connection was kept open after a completed exchange
    pub(crate) persisted: bool,
    pub(crate) is_http11: bool,

    addrs: Vec<SocketAddr>,
    current: usize,

    pub(crate) create_request_hooks: HookList<CreateRequestHook>,
    pub(crate) pre_send_hooks: HookList<PreSendHook>,
    pub(crate) post_send_hooks: HookList<PostSendHook>,
    pub(crate) destroy_request_hooks: HookList<DestroyRequestHook>,
    pub(crate) destroy_session_hooks: HookList<DestroySessionHook>,
    private: PrivateData,

    pub(crate) progress: Option<ProgressFn>,
    notify: Option<NotifyFn>,

    pub(crate) error: String,
}

impl Session<TcpConnector> {
    /// Create a session that connects over plain TCP
    pub fn new(config: SessionConfig) -> Self {
        let connector = TcpConnector::new(config.connect_timeout);
        Session::with_connector(config, connector)
    }
}

impl<C: Connector> Session<C> {
    /// Create a session that opens its connections through `connector`
    pub fn with_connector(config: SessionConfig, connector: C) -> Self {
        Session {
            config,
            connector,
            socket: None,
            persisted: false,
            is_http11: false,
            addrs: Vec::new(),
            current: 0,
            create_request_hooks: HookList::new(),
            pre_send_hooks: HookList::new(),
            post_send_hooks: HookList::new(),
            destroy_request_hooks: HookList::new(),
            destroy_session_hooks: HookList::new(),
            private: PrivateData::new(),
            progress: None,
            notify: None,
            error: String::from("Unknown error."),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Create a request for `method` on `target`
    ///
    /// When a proxy is configured, a target starting with `/` is rewritten
    /// to an absolute URI. The create-request hooks then run with the
    /// method and the final target.
    pub fn create_request(&mut self, method: &str, target: &str) -> Request {
        let target = if self.config.proxy.is_some() && target.starts_with('/') {
            format!(
                "{}://{}{}",
                self.config.scheme,
                self.config.host_port(),
                target
            )
        } else {
            target.to_string()
        };

        let mut req = Request::new(method, target.clone());
        for hook in self.create_request_hooks.iter_mut() {
            hook(&mut req, method, &target);
        }
        req
    }

    /// Destroy a request, running the destroy-request hooks first
    pub fn destroy_request(&mut self, req: Request) {
        debug!("Running destroy hooks");
        for hook in self.destroy_request_hooks.iter_mut() {
            hook(&req);
        }
    }

    /// Called with each new request, its method and target
    pub fn hook_create_request<F>(&mut self, hook: F)
    where
        F: FnMut(&mut Request, &str, &str) + 'static,
    {
        self.create_request_hooks.add(Box::new(hook));
    }

    /// Called with the request header text before the blank line is added
    ///
    /// Hooks may append header lines to the text.
    pub fn hook_pre_send<F>(&mut self, hook: F)
    where
        F: FnMut(&Request, &mut String) + 'static,
    {
        self.pre_send_hooks.add(Box::new(hook));
    }

    /// Called once the response has been read
    ///
    /// Returning `Outcome::Retry` makes `dispatch` send the request again;
    /// an error or a retry skips the remaining post-send hooks.
    pub fn hook_post_send<F>(&mut self, hook: F)
    where
        F: FnMut(&Request, &Status) -> Result<Outcome> + 'static,
    {
        self.post_send_hooks.add(Box::new(hook));
    }

    pub fn hook_destroy_request<F>(&mut self, hook: F)
    where
        F: FnMut(&Request) + 'static,
    {
        self.destroy_request_hooks.add(Box::new(hook));
    }

    /// Called once, when the session is dropped
    pub fn hook_destroy_session<F>(&mut self, hook: F)
    where
        F: FnMut() + 'static,
    {
        self.destroy_session_hooks.add(Box::new(hook));
    }

    /// Attach private data to the session under `id`
    pub fn set_private<V: Any>(&mut self, id: &str, value: V) {
        self.private.set(id, value);
    }

    pub fn private<V: Any>(&self, id: &str) -> Option<&V> {
        self.private.get(id)
    }

    pub fn private_mut<V: Any>(&mut self, id: &str) -> Option<&mut V> {
        self.private.get_mut(id)
    }

    /// Set the transfer progress notifier
    ///
    /// It receives the bytes transferred so far and, when known, the
    /// total, for request bodies as they are sent and for response bodies
    /// as they are read.
    pub fn set_progress<F>(&mut self, progress: F)
    where
        F: FnMut(u64, Option<u64>) + 'static,
    {
        self.progress = Some(Box::new(progress));
    }

    /// Set the connection status notifier
    pub fn set_notifier<F>(&mut self, notify: F)
    where
        F: FnMut(ConnStatus, &str) + 'static,
    {
        self.notify = Some(Box::new(notify));
    }

    /// Message describing the last failure, or the status of the last
    /// response
    pub fn error(&self) -> &str {
        &self.error
    }

    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error = message.into();
    }

    pub fn is_connected(&self) -> bool {
        self.socket.is_some()
    }

    /// Whether the current connection was kept open after an earlier exchange
    pub fn is_persisted(&self) -> bool {
        self.persisted
    }

    /// Whether the server has claimed HTTP/1.1 compliance
    pub fn server_is_http11(&self) -> bool {
        self.is_http11
    }

    /// Close the connection, if one is open
    pub fn close_connection(&mut self) {
        self.persisted = false;
        if let Some(mut socket) = self.socket.take() {
            debug!("Closing connection");
            if let Err(e) = socket.close() {
                debug!(error = %e, "Error closing connection");
            }
        }
    }

    pub(crate) fn socket_mut(&mut self) -> Result<&mut Socket<C::Transport>> {
        self.socket.as_mut().ok_or(Error::NotConnected)
    }

    fn notify_status(&mut self, status: ConnStatus, host: &str) {
        if let Some(notify) = self.notify.as_mut() {
            notify(status, host);
        }
    }

    /// Make sure a connection is open
    ///
    /// The server (or proxy) is resolved once per session. Addresses are
    /// tried in order, starting with the one that last accepted a
    /// connection.
    pub(crate) fn open_connection(&mut self) -> Result<()> {
        if self.socket.is_some() {
            return Ok(());
        }

        let (host, port) = self.config.connect_target();
        let host = host.to_string();
        let context = if self.config.proxy.is_some() {
            "Could not connect to proxy server"
        } else {
            "Could not connect to server"
        };

        if self.addrs.is_empty() {
            self.notify_status(ConnStatus::NameLookup, &host);
            let addrs = self
                .connector
                .resolve(&host, port)
                .and_then(|addrs| {
                    if addrs.is_empty() {
                        Err(net::Error::NoAddresses(host.clone()))
                    } else {
                        Ok(addrs)
                    }
                });
            match addrs {
                Ok(addrs) => {
                    debug!(host = %host, count = addrs.len(), "Resolved");
                    self.addrs = addrs;
                    self.current = 0;
                }
                Err(e) => return Err(self.fail_setup(e)),
            }
        }

        let mut last_err = None;
        for idx in self.current..self.addrs.len() {
            let addr = self.addrs[idx];
            self.notify_status(ConnStatus::Connecting, &host);
            debug!(%addr, "Connecting");

            match self.connector.connect(&addr) {
                Ok(transport) => {
                    let mut socket = Socket::new(transport);
                    socket.set_timeout(self.config.read_timeout);
                    self.socket = Some(socket);
                    self.current = idx;
                    self.persisted = false;
                    self.notify_status(ConnStatus::Connected, &host);
                    return Ok(());
                }
                Err(e) => {
                    debug!(%addr, error = %e, "Connect failed");
                    last_err = Some(e);
                }
            }
        }

        self.current = 0;
        let source = last_err.unwrap_or_else(|| io::Error::from(io::ErrorKind::AddrNotAvailable));
        Err(self.fail_setup(net::Error::Connect { context, source }))
    }

    fn fail_setup(&mut self, err: net::Error) -> Error {
        let err = Error::Network(err);
        self.error = describe(&err);
        err
    }
}

impl<C: Connector> Drop for Session<C> {
    fn drop(&mut self) {
        debug!("Destroying session");
        for hook in self.destroy_session_hooks.iter_mut() {
            hook();
        }
        self.close_connection();
    }
}
