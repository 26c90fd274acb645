//! Header map shared by outgoing and incoming [`HttpMessage`](crate::http::message::HttpMessage)s.
//!
//! Keys are stored exactly as written on the wire and compared
//! case-sensitively; a key appears at most once. Insertion order is kept
//! only so that serialization is stable, and plays no part in equality.
//!
//! The map does not enforce HTTP semantics: framing rules live in
//! [`framing`](crate::http::framing).

use indexmap::IndexMap;

pub const CONTENT_LENGTH: &str = "Content-Length";
pub const CONTENT_TYPE: &str = "Content-Type";
pub const CONTENT_ENCODING: &str = "Content-Encoding";
pub const TRANSFER_ENCODING: &str = "Transfer-Encoding";
pub const CONNECTION: &str = "Connection";
pub const HOST: &str = "Host";
pub const SERVER: &str = "Server";
pub const DATE: &str = "Date";
pub const SET_COOKIE: &str = "Set-Cookie";

/// Synthetic header carrying the code read off a status line. Never written.
pub const STATUS: &str = "Status";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpHeaders {
    headers: IndexMap<String, String>,
}

impl HttpHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        self.headers.insert(name.to_string(), value.into());
    }

    /// Sets `name` only when it is not present yet.
    pub fn set_default(&mut self, name: &str, value: impl Into<String>) {
        self.headers
            .entry(name.to_string())
            .or_insert_with(|| value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.headers.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.headers.shift_remove(name)
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// `Name: value\r\n` lines for every header except [`STATUS`].
    pub fn stringify(&self) -> String {
        let mut result = String::new();
        for (name, value) in self.iter().filter(|(name, _)| *name != STATUS) {
            result.push_str(&format!("{}: {}\r\n", name, value));
        }
        result
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for HttpHeaders {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            headers: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}
