//! TLS connections.
//!
//! A [`Connection`] is a TLS-wrapped byte stream with a fixed [`Role`]. It
//! offers the primitive operations HTTP framing is built on: exact-size
//! reads, delimiter-terminated reads, pass-through `recv`/`send`, and an
//! idempotent `close`.
//!
//! Bytes pulled off the transport but not yet consumed stay in a
//! per-connection buffer, so a `read_until` never consumes past its
//! delimiter and a `read_sz` never consumes past its size. Whatever a peer
//! pipelines after one message is still there for the next read.
//!
//! ## Lifecycle
//!
//! `Disconnected → Handshaking → Connected → Closing → Closed`. A failed
//! handshake drops back to `Disconnected` and the caller gets a
//! [`ConnectError`] instead of a connection.

use std::future::{Future, poll_fn};
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_std::io::{Read, ReadExt, Write, WriteExt};
use async_std::net::TcpStream;
use futures_rustls::{TlsAcceptor, TlsConnector};
use rustls::pki_types::ServerName;

use crate::config::{Limits, NetConfig};
use crate::error::{ConnectError, ReadError};
use crate::http::locator::Locator;
use crate::net::tls;

/// Which end of the exchange a connection serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Server,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Handshaking,
    Connected,
    Closing,
    Closed,
}

/// Any full-duplex byte stream a connection can run over.
pub trait Transport: Read + Write + Unpin + Send {}

impl<T> Transport for T where T: Read + Write + Unpin + Send {}

pub struct Connection {
    role: Role,
    locator: Locator,
    stream: Option<Box<dyn Transport>>,
    state: ConnectionState,
    timeout: Option<Duration>,
    write_timeout: Option<Duration>,
    limits: Limits,
    peer: Option<SocketAddr>,
    buffer: Vec<u8>,
}

impl Connection {
    fn new(role: Role, locator: Locator, limits: Limits) -> Self {
        Self {
            role,
            locator,
            stream: None,
            state: ConnectionState::Disconnected,
            timeout: None,
            write_timeout: None,
            limits,
            peer: None,
            buffer: Vec::new(),
        }
    }

    /// Wraps a stream that is already secured (or needs no securing).
    pub fn from_stream<S>(role: Role, locator: Locator, stream: S, limits: Limits) -> Self
    where
        S: Transport + 'static,
    {
        let mut conn = Self::new(role, locator, limits);
        conn.stream = Some(Box::new(stream));
        conn.state = ConnectionState::Connected;
        conn
    }

    /// Opens a client connection to `locator`: TCP connect, trust chain for
    /// the host, SNI, handshake. Only `https` locators are accepted.
    pub async fn connect(locator: &Locator, config: &NetConfig) -> Result<Connection, ConnectError> {
        if !locator.is_secure() {
            return Err(ConnectError::UnsupportedScheme(locator.scheme.clone()));
        }

        let mut conn = Self::new(Role::Client, locator.clone(), config.limits());
        conn.state = ConnectionState::Handshaking;

        match conn.establish(config).await {
            Ok(stream) => {
                conn.stream = Some(stream);
                conn.state = ConnectionState::Connected;
                conn.set_timeout(Some(config.read_timeout));
                conn.set_write_timeout(Some(config.write_timeout));
                tracing::debug!(target = %locator, peer = ?conn.peer, "connected");
                Ok(conn)
            }
            Err(err) => {
                conn.state = ConnectionState::Disconnected;
                tracing::debug!(target = %locator, %err, "connect failed");
                Err(err)
            }
        }
    }

    async fn establish(&mut self, config: &NetConfig) -> Result<Box<dyn Transport>, ConnectError> {
        let host = self.locator.host.clone();
        let tcp = with_timeout(
            Some(config.connect_timeout),
            TcpStream::connect(self.locator.socket_addr()),
        )
        .await
        .map_err(ConnectError::Tcp)?;
        self.peer = tcp.peer_addr().ok();

        let client_config = tls::client_config(&config.trust_dir, &host)?;
        let name = ServerName::try_from(host.clone()).map_err(|_| ConnectError::InvalidServerName(host))?;

        let connector = TlsConnector::from(Arc::new(client_config));
        let stream = with_timeout(Some(config.connect_timeout), connector.connect(name, tcp))
            .await
            .map_err(ConnectError::Handshake)?;
        Ok(Box::new(stream))
    }

    /// Runs the server side of the handshake on an accepted peer.
    pub(crate) async fn accept(
        tcp: TcpStream,
        peer: SocketAddr,
        acceptor: TlsAcceptor,
        locator: Locator,
        config: &NetConfig,
    ) -> Result<Connection, ConnectError> {
        let mut conn = Self::new(Role::Server, locator, config.limits());
        conn.peer = Some(peer);
        conn.state = ConnectionState::Handshaking;

        match with_timeout(Some(config.connect_timeout), acceptor.accept(tcp)).await {
            Ok(stream) => {
                conn.stream = Some(Box::new(stream));
                conn.state = ConnectionState::Connected;
                Ok(conn)
            }
            Err(err) => {
                conn.state = ConnectionState::Disconnected;
                Err(ConnectError::Handshake(err))
            }
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn locator(&self) -> &Locator {
        &self.locator
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }

    /// Bounds every subsequent transport read and write. `None` waits forever.
    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
        self.write_timeout = timeout;
    }

    /// Overrides the write bound set by [`set_timeout`](Self::set_timeout).
    pub fn set_write_timeout(&mut self, timeout: Option<Duration>) {
        self.write_timeout = timeout;
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Bytes received but not consumed yet.
    pub fn buffered(&self) -> &[u8] {
        &self.buffer
    }

    /// Reads exactly `n` bytes.
    pub async fn read_sz(&mut self, n: usize) -> Result<Vec<u8>, ReadError> {
        while self.buffer.len() < n {
            self.fill().await?;
        }
        Ok(self.buffer.drain(..n).collect())
    }

    /// Reads up to and including the first occurrence of `delim`.
    ///
    /// `max_len` bounds the returned bytes with the delimiter counted: a
    /// line of exactly `max_len` bytes ending in `delim` is returned, while
    /// `max_len` bytes without a delimiter fail with [`ReadError::Overflow`].
    pub async fn read_until(&mut self, delim: &[u8], max_len: usize) -> Result<Vec<u8>, ReadError> {
        if delim.is_empty() {
            return Ok(Vec::new());
        }

        let mut scanned: usize = 0;
        loop {
            let limit = self.buffer.len().min(max_len);
            let start = scanned.saturating_sub(delim.len() - 1);

            if let Some(end) = find(&self.buffer[..limit], delim, start) {
                return Ok(self.buffer.drain(..end).collect());
            }
            if self.buffer.len() >= max_len {
                return Err(ReadError::Overflow { max_len });
            }

            scanned = limit;
            self.fill().await?;
        }
    }

    /// Pass-through read. Buffered bytes are returned first; `Ok(0)` means
    /// the peer closed.
    pub async fn recv(&mut self, buf: &mut [u8]) -> Result<usize, ReadError> {
        if !self.buffer.is_empty() {
            let n = buf.len().min(self.buffer.len());
            buf[..n].copy_from_slice(&self.buffer[..n]);
            self.buffer.drain(..n);
            return Ok(n);
        }
        self.recv_transport(buf).await
    }

    /// Pass-through write; returns how many bytes the transport took.
    pub async fn send(&mut self, buf: &[u8]) -> io::Result<usize> {
        let timeout = self.write_timeout;
        let stream = self.stream.as_mut().ok_or_else(not_connected)?;
        with_timeout(timeout, stream.write(buf)).await
    }

    /// Writes all of `buf` and flushes it through the TLS layer.
    pub async fn send_all(&mut self, buf: &[u8]) -> io::Result<()> {
        let timeout = self.write_timeout;
        let stream = self.stream.as_mut().ok_or_else(not_connected)?;
        with_timeout(timeout, async {
            stream.write_all(buf).await?;
            stream.flush().await
        })
        .await
    }

    /// Sends a single close-notify and releases the transport. Calling it
    /// again, or on a connection that never connected, does nothing.
    pub async fn close(&mut self) {
        if self.state != ConnectionState::Connected {
            return;
        }
        self.state = ConnectionState::Closing;

        if let Some(mut stream) = self.stream.take() {
            let closing = poll_fn(|cx| Pin::new(&mut stream).poll_close(cx));
            if let Err(err) = with_timeout(self.write_timeout, closing).await {
                tracing::debug!(peer = ?self.peer, %err, "close-notify failed");
            }
        }

        self.buffer.clear();
        self.state = ConnectionState::Closed;
        tracing::trace!(peer = ?self.peer, role = ?self.role, "connection closed");
    }

    async fn fill(&mut self) -> Result<usize, ReadError> {
        let mut chunk = vec![0u8; self.limits.buffer_size];
        let n = self.recv_transport(&mut chunk).await?;
        if n == 0 {
            return Err(ReadError::Closed);
        }
        self.buffer.extend_from_slice(&chunk[..n]);
        Ok(n)
    }

    /// A peer that drops TCP without a close-notify surfaces from rustls as
    /// `UnexpectedEof`; both count as the peer closing.
    async fn recv_transport(&mut self, buf: &mut [u8]) -> Result<usize, ReadError> {
        let timeout = self.timeout;
        let stream = self.stream.as_mut().ok_or(ReadError::NotConnected)?;
        match with_timeout(timeout, stream.read(buf)).await {
            Ok(n) => Ok(n),
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => Ok(0),
            Err(err) => Err(ReadError::Io(err)),
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("role", &self.role)
            .field("locator", &self.locator.to_string())
            .field("state", &self.state)
            .field("peer", &self.peer)
            .field("buffered", &self.buffer.len())
            .finish()
    }
}

async fn with_timeout<F, T>(limit: Option<Duration>, fut: F) -> io::Result<T>
where
    F: Future<Output = io::Result<T>>,
{
    match limit {
        Some(limit) => async_std::io::timeout(limit, fut).await,
        None => fut.await,
    }
}

fn not_connected() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "connection is not open")
}

/// End offset of the first `needle` in `haystack` at or after `start`.
fn find(haystack: &[u8], needle: &[u8], start: usize) -> Option<usize> {
    if haystack.len() < needle.len() || start > haystack.len() - needle.len() {
        return None;
    }
    haystack[start..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|i| start + i + needle.len())
}
