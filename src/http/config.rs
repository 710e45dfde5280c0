//! Session configuration

use super::DEFAULT_HTTP_PORT;
use std::time::Duration;

/// A plain HTTP proxy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    pub host: String,
    pub port: u16,
}

impl ProxyConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        ProxyConfig {
            host: host.into(),
            port,
        }
    }
}

/// Configuration of a session
///
/// # Examples
///
/// ```
/// use h1dispatch::http::SessionConfig;
/// use std::time::Duration;
///
/// let config = SessionConfig::new("example.com", 8080)
///     .with_user_agent("fetcher/1.0")
///     .with_read_timeout(Duration::from_secs(30));
/// assert_eq!(config.host_port(), "example.com:8080");
/// ```
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub scheme: String,
    pub host: String,
    pub port: u16,
    pub proxy: Option<ProxyConfig>,
    pub user_agent: Option<String>,
    /// Keep connections open between requests
    pub persist: bool,
    pub read_timeout: Option<Duration>,
    pub connect_timeout: Option<Duration>,
}

impl SessionConfig {
    /// Create a configuration for `host:port` over plain HTTP
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        SessionConfig {
            scheme: "http".to_string(),
            host: host.into(),
            port,
            proxy: None,
            user_agent: None,
            persist: true,
            read_timeout: None,
            connect_timeout: None,
        }
    }

    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    /// Send requests through a plain HTTP proxy
    pub fn with_proxy(mut self, host: impl Into<String>, port: u16) -> Self {
        self.proxy = Some(ProxyConfig::new(host, port));
        self
    }

    /// Set the product token sent in the User-Agent header
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_persist(mut self, persist: bool) -> Self {
        self.persist = persist;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Value of the Host header: the host, plus the port unless it is the
    /// default port
    pub fn host_port(&self) -> String {
        if self.port == DEFAULT_HTTP_PORT {
            self.host.clone()
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// The host and port connections are made to
    pub(crate) fn connect_target(&self) -> (&str, u16) {
        match &self.proxy {
            Some(proxy) => (&proxy.host, proxy.port),
            None => (&self.host, self.port),
        }
    }
}
