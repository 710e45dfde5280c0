//! Request body sources
//!
//! The engine pulls the request body block by block and rewinds the source
//! before every full transmission, so a body can be sent again when a
//! request is retried.

use super::{Error, Result};
use bytes::Bytes;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};

/// A rewindable, pull-based request body
pub trait BodySource {
    /// Go back to the start of the body
    fn rewind(&mut self) -> Result<()>;

    /// Fill `buf` with the next block; 0 means the body is complete
    fn read_block(&mut self, buf: &mut [u8]) -> Result<usize>;
}

/// In-memory body
#[derive(Debug, Clone)]
pub struct BufferSource {
    data: Bytes,
    pos: usize,
}

impl BufferSource {
    pub fn new(data: impl Into<Bytes>) -> Self {
        BufferSource {
            data: data.into(),
            pos: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl BodySource for BufferSource {
    fn rewind(&mut self) -> Result<()> {
        self.pos = 0;
        Ok(())
    }

    fn read_block(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = buf.len().min(self.data.len() - self.pos);
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

/// A byte range of an open file
///
/// Rewinding seeks back to `offset`; reads stop after `length` bytes or at
/// end of file, whichever comes first.
#[derive(Debug)]
pub struct FileSource {
    file: File,
    offset: u64,
    length: u64,
    remain: u64,
}

impl FileSource {
    pub fn new(file: File, offset: u64, length: u64) -> Self {
        FileSource {
            file,
            offset,
            length,
            remain: length,
        }
    }
}

impl BodySource for FileSource {
    fn rewind(&mut self) -> Result<()> {
        let offset = self.offset;
        let seek_error = |detail: String| {
            Error::BodySource(format!(
                "Could not seek to offset {} of request body file: {}",
                offset, detail
            ))
        };

        match self.file.seek(SeekFrom::Start(offset)) {
            Ok(pos) if pos == offset => {
                self.remain = self.length;
                Ok(())
            }
            Ok(_) => Err(seek_error("offset invalid".to_string())),
            Err(e) => Err(seek_error(e.to_string())),
        }
    }

    fn read_block(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.remain == 0 || buf.is_empty() {
            return Ok(0);
        }

        let count = (buf.len() as u64).min(self.remain) as usize;
        loop {
            match self.file.read(&mut buf[..count]) {
                Ok(n) => {
                    self.remain -= n as u64;
                    return Ok(n);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(Error::BodySource(format!(
                        "Could not read request body file: {}",
                        e
                    )))
                }
            }
        }
    }
}

/// Body produced by a callback
///
/// The callback fills the buffer it is given and returns the number of
/// bytes written, 0 at end of body. Called with an empty buffer, it must
/// restart the body from the beginning.
pub struct CallbackSource<F> {
    provider: F,
}

impl<F> CallbackSource<F>
where
    F: FnMut(&mut [u8]) -> io::Result<usize>,
{
    pub fn new(provider: F) -> Self {
        CallbackSource { provider }
    }
}

impl<F> BodySource for CallbackSource<F>
where
    F: FnMut(&mut [u8]) -> io::Result<usize>,
{
    fn rewind(&mut self) -> Result<()> {
        (self.provider)(&mut [])
            .map(|_| ())
            .map_err(|e| Error::BodySource(format!("Could not rewind request body: {}", e)))
    }

    fn read_block(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let n = (self.provider)(buf)
            .map_err(|e| Error::BodySource(format!("Request body provider failed: {}", e)))?;
        if n > buf.len() {
            return Err(Error::BodySource(format!(
                "Request body provider returned {} bytes for a {} byte buffer",
                n,
                buf.len()
            )));
        }
        Ok(n)
    }
}
