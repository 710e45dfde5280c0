//! HTTP message types

use std::fmt;

/// Response status
///
/// Holds the parsed status line: protocol version, three-digit code, the
/// class (`code / 100`) and the reason phrase as sent by the server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Status {
    major: u32,
    minor: u32,
    code: u16,
    class: u16,
    reason: String,
}

impl Status {
    /// Create a status from its parts
    pub fn new(major: u32, minor: u32, code: u16, reason: impl Into<String>) -> Self {
        Status {
            major,
            minor,
            code,
            class: code / 100,
            reason: reason.into(),
        }
    }

    /// Get the status code
    pub fn code(&self) -> u16 {
        self.code
    }

    /// Get the status class, `code / 100`
    pub fn class(&self) -> u16 {
        self.class
    }

    /// Get the reason phrase
    pub fn reason_phrase(&self) -> &str {
        &self.reason
    }

    /// Get the major protocol version
    pub fn major_version(&self) -> u32 {
        self.major
    }

    /// Get the minor protocol version
    pub fn minor_version(&self) -> u32 {
        self.minor
    }

    /// Whether the server claims HTTP/1.1 (or later) compliance
    pub fn is_http11(&self) -> bool {
        (self.major == 1 && self.minor > 0) || self.major > 1
    }

    /// Check if this is an informational status (1xx)
    pub fn is_informational(&self) -> bool {
        self.class == 1
    }

    /// Check if this is a success status (2xx)
    pub fn is_success(&self) -> bool {
        self.class == 2
    }

    /// Check if this is a redirection status (3xx)
    pub fn is_redirection(&self) -> bool {
        self.class == 3
    }

    /// Check if this is a client error status (4xx)
    pub fn is_client_error(&self) -> bool {
        self.class == 4
    }

    /// Check if this is a server error status (5xx)
    pub fn is_server_error(&self) -> bool {
        self.class == 5
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_class() {
        let status = Status::new(1, 1, 404, "Not Found");
        assert_eq!(status.class(), 4);
        assert!(status.is_client_error());
        assert!(!status.is_success());
        assert_eq!(status.to_string(), "404 Not Found");
    }

    #[test]
    fn test_is_http11() {
        assert!(Status::new(1, 1, 200, "OK").is_http11());
        assert!(Status::new(2, 0, 200, "OK").is_http11());
        assert!(!Status::new(1, 0, 200, "OK").is_http11());
        assert!(!Status::new(0, 9, 200, "OK").is_http11());
    }
}
