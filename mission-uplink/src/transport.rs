//! Transport abstraction layer.
//!
//! The session never touches a socket directly: it asks a [`Connector`] for a
//! [`Transport`] on `connect` and drops it on `disconnect`. Unit and
//! integration tests substitute [`MockConnector`] to record frames and inject
//! failures without a network.

use std::fmt;
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;

/// Where frames are sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: &str, port: u16) -> Self {
        Endpoint { host: host.to_string(), port }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

// ── Traits ───────────────────────────────────────────────────────────────────

/// An open, exclusively owned outbound link.
pub trait Transport: Send {
    /// Send one complete frame. A short write is an error.
    fn send(&mut self, frame: &[u8]) -> io::Result<()>;

    /// Release the underlying handle. Called once, on disconnect.
    fn close(&mut self) {}
}

/// Opens transports. `Send + Sync` so the session can be shared across threads.
pub trait Connector: Send + Sync {
    fn open(&self, endpoint: &Endpoint) -> io::Result<Box<dyn Transport>>;
}

// ── UDP ──────────────────────────────────────────────────────────────────────

/// Opens a connected UDP socket on an ephemeral local port of the same
/// address family as the ground station.
#[derive(Debug, Clone, Copy, Default)]
pub struct UdpConnector;

impl Connector for UdpConnector {
    fn open(&self, endpoint: &Endpoint) -> io::Result<Box<dyn Transport>> {
        let peer = (endpoint.host.as_str(), endpoint.port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::AddrNotAvailable, format!("{endpoint} did not resolve"))
            })?;
        let socket = UdpSocket::bind(wildcard_for(&peer))?;
        socket.connect(peer)?;
        Ok(Box::new(UdpTransport { socket: Some(socket) }))
    }
}

/// Any-address, ephemeral-port bind address matching `peer`'s family.
fn wildcard_for(peer: &SocketAddr) -> SocketAddr {
    match peer {
        SocketAddr::V4(_) => SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)),
        SocketAddr::V6(_) => SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0)),
    }
}

pub struct UdpTransport {
    socket: Option<UdpSocket>,
}

impl Transport for UdpTransport {
    fn send(&mut self, frame: &[u8]) -> io::Result<()> {
        let socket = self
            .socket
            .as_ref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "socket closed"))?;
        let n = socket.send(frame)?;
        if n != frame.len() {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("partial frame: wrote {n} of {} bytes", frame.len()),
            ));
        }
        Ok(())
    }

    fn close(&mut self) {
        self.socket = None;
    }
}

// ── Mock ─────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct MockInner {
    frames: Vec<Vec<u8>>,
    opened: Vec<Endpoint>,
    closes: usize,
    send_attempts: usize,
    /// 0-based index of the send attempt that fails.
    fail_on_send: Option<usize>,
    refuse_open: bool,
}

/// Test connector. Records every frame and can fail on demand.
///
/// Clones share state, so a test keeps one handle and gives another to the
/// session.
#[derive(Clone, Default)]
pub struct MockConnector {
    inner: Arc<Mutex<MockInner>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make the `n`-th send attempt (0-based, counted across all transports) fail.
    pub fn fail_on_send(&self, n: usize) {
        self.lock().fail_on_send = Some(n);
    }

    /// Make every subsequent `open` fail.
    pub fn refuse_connections(&self) {
        self.lock().refuse_open = true;
    }

    /// Snapshot of every frame accepted so far.
    pub fn frames(&self) -> Vec<Vec<u8>> {
        self.lock().frames.clone()
    }

    pub fn send_attempts(&self) -> usize {
        self.lock().send_attempts
    }

    pub fn opened(&self) -> Vec<Endpoint> {
        self.lock().opened.clone()
    }

    pub fn close_count(&self) -> usize {
        self.lock().closes
    }
}

impl Connector for MockConnector {
    fn open(&self, endpoint: &Endpoint) -> io::Result<Box<dyn Transport>> {
        let mut g = self.lock();
        if g.refuse_open {
            return Err(io::Error::new(io::ErrorKind::ConnectionRefused, "mock refused"));
        }
        g.opened.push(endpoint.clone());
        Ok(Box::new(MockTransport { connector: self.clone() }))
    }
}

pub struct MockTransport {
    connector: MockConnector,
}

impl Transport for MockTransport {
    fn send(&mut self, frame: &[u8]) -> io::Result<()> {
        let mut g = self.connector.lock();
        let attempt = g.send_attempts;
        g.send_attempts += 1;
        if g.fail_on_send == Some(attempt) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "mock send failure"));
        }
        g.frames.push(frame.to_vec());
        Ok(())
    }

    fn close(&mut self) {
        self.connector.lock().closes += 1;
    }
}
