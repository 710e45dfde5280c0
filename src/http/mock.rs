//! Scripted transport and connector for unit tests
//!
//! A `MockTransport` replays a fixed list of read steps and records every
//! read and write on a shared `Wire`, so tests can check both what was sent
//! and in which order relative to what was received.

use super::session::Connector;
use super::socket::{PollEvents, Transport};
use super::{Error, Result, Session, SessionConfig};
use crate::net;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::net::SocketAddr;
use std::rc::Rc;
use std::time::Duration;

/// Failure injected into a read or write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Fail {
    Closed,
    Reset,
    Timeout,
}

impl Fail {
    fn error(self) -> Error {
        match self {
            Fail::Closed => Error::ConnectionClosed,
            Fail::Reset => Error::ConnectionReset("connection reset by peer".to_string()),
            Fail::Timeout => Error::Timeout,
        }
    }
}

/// One scripted read
pub(crate) enum Step {
    Data(Vec<u8>),
    Fail(Fail),
}

impl Step {
    pub(crate) fn data(data: impl AsRef<[u8]>) -> Self {
        Step::Data(data.as_ref().to_vec())
    }

    pub(crate) fn reset() -> Self {
        Step::Fail(Fail::Reset)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Event {
    Read(Vec<u8>),
    Write(Vec<u8>),
}

/// Everything that crossed one mock connection
#[derive(Debug, Default)]
pub(crate) struct Wire {
    pub(crate) events: Vec<Event>,
    pub(crate) closed: bool,
}

impl Wire {
    pub(crate) fn written(&self) -> String {
        let mut out = Vec::new();
        for event in &self.events {
            if let Event::Write(data) = event {
                out.extend_from_slice(data);
            }
        }
        String::from_utf8_lossy(&out).into_owned()
    }
}

pub(crate) type WireHandle = Rc<RefCell<Wire>>;

pub(crate) struct MockTransport {
    steps: VecDeque<Step>,
    writes: usize,
    fail_write: Option<(usize, Fail)>,
    wire: WireHandle,
}

impl MockTransport {
    pub(crate) fn new(steps: Vec<Step>) -> (Self, WireHandle) {
        let wire = WireHandle::default();
        let transport = MockTransport {
            steps: steps.into(),
            writes: 0,
            fail_write: None,
            wire: wire.clone(),
        };
        (transport, wire)
    }

    /// Serve a single response, in one read
    pub(crate) fn serving(response: &str) -> (Self, WireHandle) {
        Self::new(vec![Step::data(response)])
    }

    /// Make the `index`th write call (counting from zero) fail
    pub(crate) fn fail_write(mut self, index: usize, fail: Fail) -> Self {
        self.fail_write = Some((index, fail));
        self
    }
}

impl Transport for MockTransport {
    fn poll(&self, _events: PollEvents, _timeout: Option<Duration>) -> Result<bool> {
        Ok(true)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        match self.steps.pop_front() {
            None => Ok(0),
            Some(Step::Fail(fail)) => Err(fail.error()),
            Some(Step::Data(mut data)) => {
                let n = buf.len().min(data.len());
                buf[..n].copy_from_slice(&data[..n]);
                if n < data.len() {
                    self.steps.push_front(Step::Data(data.split_off(n)));
                }
                self.wire.borrow_mut().events.push(Event::Read(buf[..n].to_vec()));
                Ok(n)
            }
        }
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let index = self.writes;
        self.writes += 1;
        if let Some((at, fail)) = self.fail_write {
            if at == index {
                return Err(fail.error());
            }
        }
        self.wire.borrow_mut().events.push(Event::Write(buf.to_vec()));
        Ok(buf.len())
    }

    fn close(&mut self) -> Result<()> {
        self.wire.borrow_mut().closed = true;
        Ok(())
    }
}

/// Hands out scripted transports in order
pub(crate) struct MockConnector {
    pub(crate) addrs: Vec<SocketAddr>,
    pub(crate) refused: Vec<SocketAddr>,
    transports: VecDeque<MockTransport>,
    pub(crate) attempts: Rc<RefCell<Vec<SocketAddr>>>,
    pub(crate) resolves: Rc<RefCell<usize>>,
}

impl MockConnector {
    pub(crate) fn new(transports: Vec<MockTransport>) -> Self {
        MockConnector {
            addrs: vec!["127.0.0.1:80".parse().unwrap()],
            refused: Vec::new(),
            transports: transports.into(),
            attempts: Rc::default(),
            resolves: Rc::default(),
        }
    }
}

impl Connector for MockConnector {
    type Transport = MockTransport;

    fn resolve(&mut self, _host: &str, _port: u16) -> net::Result<Vec<SocketAddr>> {
        *self.resolves.borrow_mut() += 1;
        Ok(self.addrs.clone())
    }

    fn connect(&mut self, addr: &SocketAddr) -> io::Result<MockTransport> {
        self.attempts.borrow_mut().push(*addr);
        if self.refused.contains(addr) {
            return Err(io::Error::from(io::ErrorKind::ConnectionRefused));
        }
        self.transports
            .pop_front()
            .ok_or_else(|| io::Error::from(io::ErrorKind::ConnectionRefused))
    }
}

/// A session on `example.com` whose connections are `transports`
pub(crate) fn session(transports: Vec<MockTransport>) -> Session<MockConnector> {
    session_with(SessionConfig::new("example.com", 80), transports)
}

pub(crate) fn session_with(
    config: SessionConfig,
    transports: Vec<MockTransport>,
) -> Session<MockConnector> {
    Session::with_connector(config, MockConnector::new(transports))
}
