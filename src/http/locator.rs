//! Resource locators.
//!
//! A [`Locator`] is a web address plus the method it is requested with and
//! the protocol version named on the request line. The same parser handles
//! a bare address (`https://host/path?x=1`), a request line
//! (`GET /path?x=1 HTTP/1.1`), and a method-prefixed address
//! (`POST https://host/path`). Relative addresses borrow scheme, host and
//! port from a parent locator, which is how the server resolves request
//! lines against the address it is bound to.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

use crate::error::LocatorError;
use crate::http::{Method, method_from_str};

/// Everything [`encode`] escapes: all but ASCII letters, digits and
/// `-._~:/@!$'()*,;`.
const ESCAPED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b':')
    .remove(b'/')
    .remove(b'@')
    .remove(b'!')
    .remove(b'$')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    .remove(b'*')
    .remove(b',')
    .remove(b';');

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Locator {
    pub method: Method,
    pub scheme: String,
    pub host: String,
    pub port: u16,
    /// Percent-decoded path, always starting with `/` for absolute locators.
    pub path: String,
    /// Percent-decoded query arguments.
    pub args: IndexMap<String, String>,
    pub version: String,
}

/// Well-known port of a scheme, 0 when the scheme has none.
pub fn default_port(scheme: &str) -> u16 {
    match scheme {
        "https" | "wss" => 443,
        "http" | "ws" => 80,
        _ => 0,
    }
}

impl Locator {
    /// Parses `raw`, inheriting scheme, host and port from `parent` when the
    /// address carries no scheme.
    pub fn parse(raw: &str, parent: Option<&Locator>) -> Result<Locator, LocatorError> {
        let parts: Vec<&str> = raw.split_whitespace().collect();
        if parts.is_empty() {
            return Err(LocatorError::Empty);
        }

        // METHOD ADDRESS [VERSION], or ADDRESS alone meaning GET
        let has_method = parts.len() > 1;
        let method = if has_method {
            method_from_str(parts[0]).ok_or_else(|| LocatorError::UnknownMethod(parts[0].to_string()))?
        } else {
            Method::Get
        };
        let address = parts[usize::from(has_method)];

        let mut locator = Locator {
            method,
            version: parts.get(2).map(|v| v.to_string()).unwrap_or_default(),
            ..Default::default()
        };

        let target = match address.find("://") {
            Some(i) => {
                locator.scheme = address[..i].to_ascii_lowercase();
                let rest = &address[i + 3..];
                let host_end = rest.find(&['/', '?'][..]).unwrap_or(rest.len());
                let authority = &rest[..host_end];

                match authority.find(':') {
                    Some(c) if c > 0 => {
                        locator.host = authority[..c].to_string();
                        locator.port = authority[c + 1..]
                            .parse::<u16>()
                            .map_err(|_| LocatorError::InvalidPort(address.to_string()))?;
                    }
                    _ => {
                        locator.host = authority.to_string();
                        locator.port = default_port(&locator.scheme);
                    }
                }

                if locator.host.is_empty() {
                    return Err(LocatorError::MissingHost(address.to_string()));
                }
                &rest[host_end..]
            }
            None => {
                let parent = parent.ok_or_else(|| LocatorError::Relative(address.to_string()))?;
                locator.scheme = parent.scheme.clone();
                locator.host = parent.host.clone();
                locator.port = parent.port;
                address
            }
        };

        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (target, None),
        };

        locator.path = if path.is_empty() { "/".to_string() } else { decode(path) };

        if let Some(query) = query {
            for field in query.split('&').filter(|f| !f.is_empty()) {
                let (key, value) = field.split_once('=').unwrap_or((field, field));
                locator.args.insert(decode(key), decode(value));
            }
        }

        Ok(locator)
    }

    /// Same locator tagged with another method.
    pub fn with_method(&self, method: Method) -> Locator {
        Locator {
            method,
            ..self.clone()
        }
    }

    pub fn is_secure(&self) -> bool {
        self.scheme == "https"
    }

    /// The request-target written on the request line: encoded path and query.
    pub fn target(&self) -> String {
        let mut target = encode(&self.path);
        if target.is_empty() {
            target.push('/');
        }
        if !self.args.is_empty() {
            target.push('?');
            target.push_str(&encode_fields(&self.args));
        }
        target
    }

    /// `host:port` pair used to open or bind a socket.
    pub fn socket_addr(&self) -> (&str, u16) {
        (self.host.as_str(), self.port)
    }
}

impl FromStr for Locator {
    type Err = LocatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Locator::parse(s, None)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.host)?;
        if self.port != default_port(&self.scheme) {
            write!(f, ":{}", self.port)?;
        }
        f.write_str(&self.target())
    }
}

/// Percent-encodes `s` byte by byte over its UTF-8 form, see [`ESCAPED`].
pub fn encode(s: &str) -> String {
    utf8_percent_encode(s, ESCAPED).to_string()
}

/// Reverses [`encode`]. Written by hand since `%%` and early stops have no
/// counterpart in `percent_encoding`. `%%` yields a literal `%` and `+` yields a space.
/// A `%` that is not followed by two hex digits ends decoding; whatever was
/// decoded so far is returned.
pub fn decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                if bytes.get(i + 1) == Some(&b'%') {
                    out.push(b'%');
                    i += 2;
                    continue;
                }
                let hi = bytes.get(i + 1).and_then(|&b| nibble(b));
                let lo = bytes.get(i + 2).and_then(|&b| nibble(b));
                match (hi, lo) {
                    (Some(hi), Some(lo)) => out.push(hi << 4 | lo),
                    _ => break,
                }
                i += 3;
            }
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }

    String::from_utf8_lossy(&out).into_owned()
}

/// `key=value` pairs joined with `&`, each side encoded. Used for query
/// strings and url-encoded form bodies.
pub fn encode_fields<'a, I>(fields: I) -> String
where
    I: IntoIterator<Item = (&'a String, &'a String)>,
{
    let mut out = String::new();
    for (key, value) in fields {
        if !out.is_empty() {
            out.push('&');
        }
        out.push_str(&encode(key));
        out.push('=');
        out.push_str(&encode(value));
    }
    out
}

/// Splits an url-encoded body or query string into decoded pairs.
pub fn decode_fields(s: &str) -> IndexMap<String, String> {
    s.split('&')
        .filter(|f| !f.is_empty())
        .map(|field| {
            let (key, value) = field.split_once('=').unwrap_or((field, field));
            (decode(key), decode(value))
        })
        .collect()
}

fn nibble(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}
