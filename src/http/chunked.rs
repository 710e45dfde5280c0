//! Chunked transfer encoding support
//!
//! Chunk syntax is `SIZE [;ext] CRLF DATA CRLF ... 0 CRLF [trailers] CRLF`.
//! The framing state machine reads the data; this module parses the size
//! lines.

use super::{Error, Result};

/// Largest accepted chunk size
pub const MAX_CHUNK_SIZE: u64 = u32::MAX as u64;

/// Parse a chunk-size line
///
/// Leading whitespace is skipped and anything after the hexadecimal digits
/// (chunk extensions, the line terminator) is ignored. A line with no
/// digits, or a size above `MAX_CHUNK_SIZE`, is rejected.
pub fn parse_chunk_size(line: &str) -> Result<u64> {
    let trimmed = line.trim_start();
    let digits = trimmed
        .bytes()
        .take_while(u8::is_ascii_hexdigit)
        .count();

    let invalid = || Error::InvalidChunkSize(line.trim_end().to_string());

    if digits == 0 {
        return Err(invalid());
    }

    let size = u64::from_str_radix(&trimmed[..digits], 16).map_err(|_| invalid())?;
    if size > MAX_CHUNK_SIZE {
        return Err(invalid());
    }

    Ok(size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chunk_size() {
        assert_eq!(parse_chunk_size("4\r\n").unwrap(), 4);
        assert_eq!(parse_chunk_size("1aF\r\n").unwrap(), 0x1af);
        assert_eq!(parse_chunk_size("0\r\n").unwrap(), 0);
        assert_eq!(parse_chunk_size("  10\r\n").unwrap(), 16);
    }

    #[test]
    fn test_chunk_extensions_ignored() {
        assert_eq!(parse_chunk_size("5;name=value\r\n").unwrap(), 5);
        assert_eq!(parse_chunk_size("5 ; name\r\n").unwrap(), 5);
    }

    #[test]
    fn test_invalid_chunk_size() {
        assert!(matches!(
            parse_chunk_size("xyz\r\n"),
            Err(Error::InvalidChunkSize(_))
        ));
        assert!(parse_chunk_size("\r\n").is_err());
        assert!(parse_chunk_size("-5\r\n").is_err());
    }

    #[test]
    fn test_chunk_size_limit() {
        assert_eq!(parse_chunk_size("ffffffff\r\n").unwrap(), MAX_CHUNK_SIZE);
        assert!(parse_chunk_size("100000000\r\n").is_err());
        assert!(parse_chunk_size("ffffffffffffffff\r\n").is_err());
        assert!(parse_chunk_size("1ffffffffffffffff\r\n").is_err());
    }
}
