//! HTTP/1.1 over TLS: one connection type for both ends, one message type
//! for both directions.
//!
//! - [`http::locator::Locator`] parses addresses and request lines.
//! - [`net::connection::Connection`] is the TLS byte stream with buffered
//!   line and size reads.
//! - [`http::message::HttpMessage`] reads and writes requests and responses.
//! - [`net::server::Server`] and [`net::client::Client`] run exchanges.

pub mod config;
pub mod error;
pub mod handler;
pub mod http;
pub mod net;

use std::sync::Arc;

pub use crate::config::{NetConfig, config, set_config};
pub use crate::error::{ConnectError, ExchangeError, ProtocolError};
pub use crate::handler::Handler;
pub use crate::http::Method;
pub use crate::http::content::Content;
pub use crate::http::locator::Locator;
pub use crate::http::message::HttpMessage;
pub use crate::net::client::{Client, RequestArgs};
pub use crate::net::runtime::{AsyncStd, Spawn};
pub use crate::net::server::Server;

/// Binds `locator` with the process-wide config and serves it with
/// `handler` on the async-std runtime.
pub async fn listen<H: Handler>(
    locator: &Locator,
    handler: H,
) -> Result<async_std::task::JoinHandle<()>, ConnectError> {
    let server = Server::bind(locator, Arc::new(config().clone())).await?;
    Ok(server.listen(handler, AsyncStd))
}

/// One client exchange using the process-wide config.
pub async fn request(locator: &Locator, args: RequestArgs) -> Result<HttpMessage, ExchangeError> {
    Client::new(Arc::new(config().clone())).request(locator, args).await
}
