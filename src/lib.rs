//! h1dispatch - HTTP/1.1 request/response engine
//!
//! This crate builds wire-format HTTP/1.1 requests, sends them over a
//! single (possibly persistent) connection and parses the response status
//! line, headers and body using RFC 2616 framing rules.

pub mod http;
pub mod net;
