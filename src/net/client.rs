//! HTTPS client.
//!
//! Each request opens its own connection, writes one request, reads one
//! response and closes. There is no pooling and no retry.

use std::sync::Arc;

use crate::config::NetConfig;
use crate::error::ExchangeError;
use crate::http::content::Content;
use crate::http::headers::{HOST, HttpHeaders};
use crate::http::locator::{Locator, default_port};
use crate::http::message::HttpMessage;
use crate::http::Method;
use crate::net::connection::Connection;

const ACCEPT: &str = "*/*";
const ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";
const ACCEPT_ENCODING: &str = "gzip";

/// Optional parts of a request. Anything left unset comes from the locator
/// or from the defaults filled in by [`Client::request`].
#[derive(Debug, Clone, Default)]
pub struct RequestArgs {
    pub method: Option<Method>,
    pub headers: HttpHeaders,
    pub content: Content,
}

impl RequestArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.set(name, value);
        self
    }

    pub fn content(mut self, content: impl Into<Content>) -> Self {
        self.content = content.into();
        self
    }
}

#[derive(Debug, Clone)]
pub struct Client {
    config: Arc<NetConfig>,
}

impl Client {
    pub fn new(config: Arc<NetConfig>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &NetConfig {
        &self.config
    }

    /// Performs one exchange with `locator`. The method in `args` wins over
    /// the locator's own.
    pub async fn request(&self, locator: &Locator, args: RequestArgs) -> Result<HttpMessage, ExchangeError> {
        let request = self.prepare(locator, args)?;

        let mut conn = Connection::connect(&request.locator, &self.config).await?;
        let result = exchange(&mut conn, &request).await;
        conn.close().await;

        let response = result?;
        tracing::debug!(
            target_locator = %request.locator,
            method = %request.method(),
            code = response.code,
            "exchange complete"
        );
        Ok(response)
    }

    /// Like [`request`](Self::request), but the response must carry a JSON
    /// body.
    pub async fn json(&self, locator: &Locator, args: RequestArgs) -> Result<serde_json::Value, ExchangeError> {
        let response = self.request(locator, args).await?;
        match response.content {
            Content::Structured(value) => Ok(value),
            _ => Err(ExchangeError::NotJson(response.code)),
        }
    }

    fn prepare(&self, locator: &Locator, args: RequestArgs) -> Result<HttpMessage, ExchangeError> {
        let method = args.method.unwrap_or(locator.method);
        if !method.is_request() {
            return Err(ExchangeError::UndefinedMethod);
        }

        let mut headers = args.headers;
        headers.set_default("User-Agent", self.config.user_agent.as_str());
        headers.set_default("Accept", ACCEPT);
        headers.set_default("Accept-Language", ACCEPT_LANGUAGE);
        headers.set_default("Accept-Encoding", ACCEPT_ENCODING);
        headers.set_default(HOST, host_header(locator));

        Ok(HttpMessage::request(locator.with_method(method), headers, args.content))
    }
}

async fn exchange(conn: &mut Connection, request: &HttpMessage) -> Result<HttpMessage, ExchangeError> {
    request.write(conn).await?;
    let response = HttpMessage::from_connection(conn, request.locator.with_method(Method::Response)).await?;
    Ok(response)
}

/// `host`, or `host:port` when the port is not the scheme's default.
fn host_header(locator: &Locator) -> String {
    if locator.port == default_port(&locator.scheme) {
        locator.host.clone()
    } else {
        format!("{}:{}", locator.host, locator.port)
    }
}
