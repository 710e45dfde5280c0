//! Response body readers
//!
//! A body reader pairs an accept predicate, called once with the final
//! status of each response, with a consumer that receives every body block
//! of the responses it accepted. An empty block marks the end of the body.

use super::{Result, Status};

pub(crate) type AcceptFn = Box<dyn FnMut(&Status) -> bool>;
pub(crate) type ReaderFn = Box<dyn FnMut(&[u8]) -> Result<()>>;

pub(crate) struct BodyReader {
    pub(crate) accept: AcceptFn,
    pub(crate) reader: ReaderFn,
    pub(crate) enabled: bool,
}

impl BodyReader {
    pub(crate) fn new(accept: AcceptFn, reader: ReaderFn) -> Self {
        BodyReader {
            accept,
            reader,
            enabled: false,
        }
    }
}

/// Accept every response
pub fn accept_always(_status: &Status) -> bool {
    true
}

/// Accept successful (2xx) responses only
pub fn accept_2xx(status: &Status) -> bool {
    status.class() == 2
}
