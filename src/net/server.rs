//! HTTPS server.
//!
//! The server owns a [`Listener`] and a [`Handler`]. Its accept loop runs on
//! a task of its own and hands every accepted peer to a new task, which
//! performs the TLS handshake and then serves requests off that connection
//! until the peer closes, asks to close, or sends something unreadable.
//!
//! ## Connection flow
//!
//! 1. Read the request line and resolve it against the bound locator
//! 2. Read headers and body into an [`HttpMessage`]
//! 3. Hand the request to the handler
//! 4. Fill in `Date`, `Server` and `Connection`, then write the response
//! 5. Loop, unless the request carried `Connection: close`
//!
//! A failure at any step ends that connection only. The listener, and every
//! other connection, carry on.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::SystemTime;

use thiserror::Error;

use crate::config::NetConfig;
use crate::error::{ConnectError, LocatorError, ProtocolError, ReadError, WriteError};
use crate::handler::Handler;
use crate::http::CRLF;
use crate::http::headers::{CONNECTION, DATE, SERVER};
use crate::http::locator::Locator;
use crate::http::message::HttpMessage;
use crate::net::connection::Connection;
use crate::net::listener::{Listener, Peer};
use crate::net::runtime::Spawn;

pub struct Server {
    listener: Listener,
}

/// Reasons a served connection stops, used to pick how loudly to log.
#[derive(Debug, Error)]
enum ServeError {
    #[error("request line: {0}")]
    RequestLine(#[source] ReadError),

    #[error(transparent)]
    Locator(#[from] LocatorError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Write(#[from] WriteError),
}

/// Whether the connection stays open after an exchange.
#[derive(Debug, PartialEq, Eq)]
enum Persist {
    KeepAlive,
    Close,
}

impl Server {
    pub async fn bind(locator: &Locator, config: Arc<NetConfig>) -> Result<Self, ConnectError> {
        let listener = Listener::bind(locator, config).await?;
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn locator(&self) -> &Locator {
        self.listener.locator()
    }

    /// Starts accepting. The returned handle completes when the accept loop
    /// stops; dropping it leaves the server running.
    pub fn listen<H, R>(self, handler: H, runtime: R) -> R::Handle<()>
    where
        H: Handler,
        R: Spawn,
    {
        let handler = Arc::new(handler);
        let spawner = runtime.clone();
        runtime.spawn(self.accept_loop(handler, spawner))
    }

    async fn accept_loop<H, R>(self, handler: Arc<H>, runtime: R)
    where
        H: Handler,
        R: Spawn,
    {
        loop {
            match self.listener.accept().await {
                Ok(peer) => {
                    drop(runtime.spawn(serve_peer(peer, handler.clone())));
                }
                Err(err) => {
                    tracing::error!(locator = %self.listener.locator(), %err, "accept failed, listener stopped");
                    break;
                }
            }
        }
    }
}

async fn serve_peer<H: Handler>(peer: Peer, handler: Arc<H>) {
    let addr = peer.addr();
    let config = peer.config().clone();

    let mut conn = match peer.handshake().await {
        Ok(conn) => conn,
        Err(err) => {
            tracing::debug!(peer = %addr, %err, "handshake failed");
            return;
        }
    };

    loop {
        match exchange(&mut conn, handler.as_ref(), &config).await {
            Ok(Persist::KeepAlive) => continue,
            Ok(Persist::Close) => break,
            Err(ServeError::RequestLine(ReadError::Closed)) => {
                tracing::trace!(peer = %addr, "peer closed");
                break;
            }
            Err(err) => {
                tracing::warn!(peer = %addr, %err, "dropping connection");
                break;
            }
        }
    }

    conn.close().await;
}

async fn exchange<H: Handler>(
    conn: &mut Connection,
    handler: &H,
    config: &NetConfig,
) -> Result<Persist, ServeError> {
    let line = read_request_line(conn, config.max_request_line).await?;
    let locator = Locator::parse(&line, Some(conn.locator()))?;

    let request = HttpMessage::from_connection(conn, locator).await?;
    let persist = match request.header(CONNECTION) {
        Some(value) if value.eq_ignore_ascii_case("close") => Persist::Close,
        _ => Persist::KeepAlive,
    };

    tracing::debug!(
        peer = ?conn.peer_addr(),
        method = %request.method(),
        path = %request.locator.path,
        "request"
    );

    let mut response = handler.handle(request);
    response.headers.set_default(SERVER, config.server_name.as_str());
    response.headers.set_default(DATE, httpdate::fmt_http_date(SystemTime::now()));
    response.headers.set_default(
        CONNECTION,
        match persist {
            Persist::KeepAlive => "keep-alive",
            Persist::Close => "close",
        },
    );

    response.write(conn).await?;

    tracing::info!(peer = ?conn.peer_addr(), code = response.code, "response sent");

    match response.header(CONNECTION) {
        Some(value) if value.eq_ignore_ascii_case("close") => Ok(Persist::Close),
        _ => Ok(persist),
    }
}

/// Next request line without its CRLF. Empty lines between pipelined
/// requests are skipped.
async fn read_request_line(conn: &mut Connection, max_len: usize) -> Result<String, ServeError> {
    loop {
        let line = conn
            .read_until(CRLF, max_len)
            .await
            .map_err(ServeError::RequestLine)?;
        let line = &line[..line.len() - CRLF.len()];
        if !line.is_empty() {
            return Ok(String::from_utf8_lossy(line).into_owned());
        }
    }
}
