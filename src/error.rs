//! Error taxonomy for the engine.
//!
//! Every layer returns its own error type so that callers can tell a bad
//! address from a refused connection from a peer that speaks broken HTTP.
//! Nothing in the engine panics on remote input: framing faults that a
//! local programming error would also produce (both `Content-Length` and
//! chunked framing, for instance) are ordinary [`ProtocolError`] values.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// A raw address that could not be turned into a [`Locator`](crate::http::locator::Locator).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LocatorError {
    #[error("empty locator")]
    Empty,

    #[error("unknown method keyword: {0}")]
    UnknownMethod(String),

    #[error("relative locator {0:?} without a parent context")]
    Relative(String),

    #[error("invalid port in {0:?}")]
    InvalidPort(String),

    #[error("missing host in {0:?}")]
    MissingHost(String),
}

/// Problems with on-disk trust or identity material.
#[derive(Debug, Error)]
pub enum TlsError {
    #[error("trust root {path:?} not found")]
    MissingTrustRoot { path: PathBuf },

    #[error("failed to read {path:?}: {source}")]
    Pem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("no certificate in {0:?}")]
    NoCertificate(PathBuf),

    #[error("no private key in {0:?}")]
    NoPrivateKey(PathBuf),

    #[error("rustls: {0}")]
    Rustls(#[from] rustls::Error),
}

/// Failure to establish a [`Connection`](crate::net::connection::Connection).
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("unsupported scheme {0:?}, only https is accepted")]
    UnsupportedScheme(String),

    #[error("invalid server name {0:?}")]
    InvalidServerName(String),

    #[error("tcp: {0}")]
    Tcp(#[source] io::Error),

    #[error(transparent)]
    Tls(#[from] TlsError),

    #[error("handshake: {0}")]
    Handshake(#[source] io::Error),
}

/// Failure of a primitive read on a connection.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("connection closed by peer")]
    Closed,

    #[error("no delimiter within {max_len} bytes")]
    Overflow { max_len: usize },

    #[error("not connected")]
    NotConnected,

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// A peer sent bytes that do not form a valid HTTP message.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("header block never terminated: {0}")]
    UnterminatedHeaders(#[source] ReadError),

    #[error("header block exceeds {limit} bytes")]
    HeadersTooLarge { limit: usize },

    #[error("malformed header line {0:?}")]
    MalformedHeader(String),

    #[error("both Content-Length and chunked Transfer-Encoding present")]
    ConflictingFraming,

    #[error("invalid Content-Length {0:?}")]
    InvalidContentLength(String),

    #[error("invalid chunk size line {0:?}")]
    InvalidChunkSize(String),

    #[error("chunk data not followed by CRLF")]
    ChunkTerminator,

    #[error("body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },

    #[error("body truncated: {0}")]
    Truncated(#[source] ReadError),

    #[error("unsupported content encoding {0:?}")]
    UnsupportedEncoding(String),

    #[error("gzip: {0}")]
    Inflate(#[source] io::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("text body is not utf-8")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Failure to put a message on the wire.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("outgoing message declares Transfer-Encoding; only Content-Length framing is written")]
    ConflictingFraming,

    #[error("unsupported content encoding {0:?}")]
    UnsupportedEncoding(String),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Failure of a whole client exchange.
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("request method is undefined")]
    UndefinedMethod,

    #[error(transparent)]
    Locator(#[from] LocatorError),

    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error(transparent)]
    Write(#[from] WriteError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("response body is not json (status {0})")]
    NotJson(u16),
}
