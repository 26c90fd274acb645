//! TLS listener.
//!
//! Binding loads the server identity for the locator's host and opens the
//! TCP socket. `accept` hands back raw peers; the TLS handshake is left to
//! [`Peer::handshake`] so it can run on the task dedicated to that peer and
//! a slow or hostile client never stalls the accept loop.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use async_std::net::{TcpListener, TcpStream};
use futures_rustls::TlsAcceptor;

use crate::config::NetConfig;
use crate::error::ConnectError;
use crate::http::locator::Locator;
use crate::net::connection::Connection;
use crate::net::tls;

pub struct Listener {
    inner: TcpListener,
    acceptor: TlsAcceptor,
    locator: Locator,
    config: Arc<NetConfig>,
}

/// An accepted TCP peer that has not completed its handshake yet.
pub struct Peer {
    stream: TcpStream,
    addr: SocketAddr,
    acceptor: TlsAcceptor,
    locator: Locator,
    config: Arc<NetConfig>,
}

impl Listener {
    pub async fn bind(locator: &Locator, config: Arc<NetConfig>) -> Result<Self, ConnectError> {
        if !locator.is_secure() {
            return Err(ConnectError::UnsupportedScheme(locator.scheme.clone()));
        }

        let server_config = tls::server_config(&config.ssl_dir, &locator.host)?;
        let inner = TcpListener::bind(locator.socket_addr())
            .await
            .map_err(ConnectError::Tcp)?;
        let local_addr = inner.local_addr().map_err(ConnectError::Tcp)?;

        // Port 0 asks the OS for a port; relative request lines must resolve
        // against the one actually bound.
        let mut locator = locator.clone();
        locator.port = local_addr.port();

        tracing::info!(address = %local_addr, locator = %locator, "listener bound");

        Ok(Self {
            inner,
            acceptor: TlsAcceptor::from(Arc::new(server_config)),
            locator,
            config,
        })
    }

    pub async fn accept(&self) -> io::Result<Peer> {
        let (stream, addr) = self.inner.accept().await?;
        tracing::debug!(peer = %addr, "peer accepted");

        Ok(Peer {
            stream,
            addr,
            acceptor: self.acceptor.clone(),
            locator: self.locator.clone(),
            config: self.config.clone(),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }

    /// The locator this listener serves, with the bound port filled in.
    pub fn locator(&self) -> &Locator {
        &self.locator
    }

    pub fn config(&self) -> &Arc<NetConfig> {
        &self.config
    }
}

impl Peer {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn config(&self) -> &Arc<NetConfig> {
        &self.config
    }

    pub async fn handshake(self) -> Result<Connection, ConnectError> {
        let mut conn =
            Connection::accept(self.stream, self.addr, self.acceptor, self.locator, &self.config).await?;
        conn.set_timeout(Some(self.config.read_timeout));
        conn.set_write_timeout(Some(self.config.write_timeout));
        Ok(conn)
    }
}
