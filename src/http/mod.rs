pub mod content;
pub mod encoding;
pub mod framing;
pub mod headers;
pub mod locator;
pub mod message;
pub mod parser;
pub mod status;

use std::fmt;

/// Line terminator for the request line, status line and header lines.
pub const CRLF: &[u8] = b"\r\n";

/// Version written on every outgoing request and status line.
pub const HTTP_VERSION: &str = "HTTP/1.1";

/// Request method carried by a [`Locator`](locator::Locator).
///
/// `Response` never appears on an incoming request line: it tags locators
/// that describe the answer to a request, and `Undefined` marks a locator
/// that could not be resolved.
#[derive(PartialEq, Eq, Debug, Clone, Copy, Default, Hash)]
pub enum Method {
    #[default]
    Undefined,
    Response,
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Undefined => "UNDEFINED",
            Method::Response => "RESPONSE",
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }

    pub fn is_defined(&self) -> bool {
        *self != Method::Undefined
    }

    /// A method that can appear on a request line.
    pub fn is_request(&self) -> bool {
        matches!(self, Method::Get | Method::Post | Method::Put | Method::Delete)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Case-insensitive method keyword lookup.
pub fn method_from_str(method: &str) -> Option<Method> {
    match method.to_ascii_lowercase().as_str() {
        "get" => Some(Method::Get),
        "post" => Some(Method::Post),
        "put" => Some(Method::Put),
        "delete" | "del" => Some(Method::Delete),
        "response" => Some(Method::Response),
        "undefined" => Some(Method::Undefined),
        _ => None,
    }
}
