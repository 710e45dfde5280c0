//! HTTP response parsing
//!
//! Status lines, header blocks (with continuation-line folding and the
//! per-response field caps) and Content-Length values.

use super::socket::{Socket, Transport};
use super::{Error, Headers, Result, Status, MAX_HEADER_FIELDS, MAX_HEADER_LEN};
use tracing::debug;

/// Remove the trailing line terminator(s) from `line`
pub fn strip_eol(line: &str) -> &str {
    line.trim_end_matches(['\r', '\n'])
}

/// Split a leading decimal number off `s`
fn take_number(s: &str) -> Option<(u32, &str)> {
    let end = s.bytes().position(|b| !b.is_ascii_digit()).unwrap_or(s.len());
    if end == 0 {
        return None;
    }
    let value = s[..end].parse().ok()?;
    Some((value, &s[end..]))
}

/// Parse HTTP response status line
///
/// Format: HTTP/major.minor SP code SP reason
/// Example: HTTP/1.1 200 OK
///
/// Anything before `HTTP/` is skipped. The Shoutcast form
/// `ICY 200 OK` is read as HTTP/1.0.
pub fn parse_status_line(line: &str) -> Result<Status> {
    let invalid = || Error::Protocol("Could not parse response status line.".to_string());
    let line = strip_eol(line);

    let (major, minor, rest) = if let Some(pos) = line.find("HTTP/") {
        let (major, rest) = take_number(&line[pos + 5..]).ok_or_else(invalid)?;
        let rest = rest.strip_prefix('.').ok_or_else(invalid)?;
        let (minor, rest) = take_number(rest).ok_or_else(invalid)?;
        if !rest.starts_with(' ') {
            return Err(invalid());
        }
        (major, minor, rest.trim_start_matches(' '))
    } else if let Some(rest) = line.strip_prefix("ICY ") {
        (1, 0, rest.trim_start_matches(' '))
    } else {
        return Err(invalid());
    };

    let bytes = rest.as_bytes();
    if bytes.len() < 3
        || !bytes[..3].iter().all(u8::is_ascii_digit)
        || (bytes.len() > 3 && bytes[3] != b' ')
    {
        return Err(invalid());
    }

    let code: u16 = rest[..3].parse().map_err(|_| invalid())?;
    let reason = rest[3..].trim_start_matches([' ', '\t']).trim_end();

    Ok(Status::new(major, minor, code, reason))
}

/// Validate a Content-Length value
///
/// The value must be a non-negative decimal integer below `i64::MAX`.
pub fn parse_content_length(value: &str) -> Result<u64> {
    let invalid = || Error::Protocol("Invalid Content-Length in response".to_string());
    let value = value.trim();

    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    match value.parse::<i64>() {
        Ok(len) if len != i64::MAX => Ok(len as u64),
        _ => Err(invalid()),
    }
}

fn header_too_long(err: Error) -> Error {
    if err.is_protocol() {
        Error::Protocol("Response header too long".to_string())
    } else {
        err
    }
}

/// Read one header field, folding continuation lines into it
///
/// Returns `None` at the blank line ending the header block. Each
/// continuation line is appended with its first whitespace character
/// replaced by a space.
pub fn read_message_header<T: Transport>(sock: &mut Socket<T>) -> Result<Option<String>> {
    let line = sock.read_line(MAX_HEADER_LEN).map_err(header_too_long)?;
    let mut field = strip_eol(&line).to_string();

    if field.is_empty() {
        debug!("End of headers");
        return Ok(None);
    }

    loop {
        if field.len() >= MAX_HEADER_LEN {
            return Err(Error::Protocol("Response header too long".to_string()));
        }

        let next = sock.peek()?;
        if next != b' ' && next != b'\t' {
            return Ok(Some(field));
        }

        let cont = sock
            .read_line(MAX_HEADER_LEN - field.len())
            .map_err(header_too_long)?;
        let cont = strip_eol(&cont);
        debug!(line = cont, "continuation");

        if !cont.is_empty() {
            field.push(' ');
            field.push_str(&cont[1..]);
        }
    }
}

/// Read a header block into `headers`
///
/// Lines without a colon are skipped. Reaching `MAX_HEADER_FIELDS` lines
/// is a protocol error.
pub fn read_header_block<T: Transport>(sock: &mut Socket<T>, headers: &mut Headers) -> Result<()> {
    let mut count = 0;

    while let Some(line) = read_message_header(sock)? {
        count += 1;
        if count >= MAX_HEADER_FIELDS {
            return Err(Error::Protocol(
                "Response exceeded maximum number of header fields.".to_string(),
            ));
        }

        if let Some((name, value)) = Headers::parse_header_line(&line) {
            debug!(name = %name, value = %value, "header");
            headers.insert(&name, &value);
        }
    }

    Ok(())
}

/// Read and drop the header block of an interim response
pub fn discard_headers<T: Transport>(sock: &mut Socket<T>) -> Result<()> {
    loop {
        let line = sock.read_line(MAX_HEADER_LEN).map_err(header_too_long)?;
        debug!(line = strip_eol(&line), "discard");
        if strip_eol(&line).is_empty() {
            return Ok(());
        }
    }
}
