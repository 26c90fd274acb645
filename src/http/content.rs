//! Message content and the MIME dispatch shared by both directions.
//!
//! [`MimeClass`] is the single table that maps a `Content-Type` to a codec.
//! Reading a body ([`decode`]) and writing one ([`encode`]) both go through
//! it, so a message written by this engine reads back as the same
//! [`Content`] variant.

use serde_json::Value;

use crate::error::{ProtocolError, WriteError};
use crate::http::locator::{decode_fields, encode_fields};

pub const JSON: &str = "application/json";
pub const FORM: &str = "application/x-www-form-urlencoded";
pub const TEXT: &str = "text/plain; charset=utf-8";
pub const OCTET_STREAM: &str = "application/octet-stream";

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Content {
    #[default]
    Empty,
    Text(String),
    Structured(Value),
    Bytes(Vec<u8>),
}

impl Content {
    pub fn is_empty(&self) -> bool {
        match self {
            Content::Empty => true,
            Content::Text(s) => s.is_empty(),
            Content::Bytes(b) => b.is_empty(),
            Content::Structured(_) => false,
        }
    }

    /// `Content-Type` assumed when an outgoing message does not set one.
    pub fn default_type(&self) -> Option<&'static str> {
        match self {
            Content::Empty => None,
            Content::Text(_) => Some(TEXT),
            Content::Structured(_) => Some(JSON),
            Content::Bytes(_) => Some(OCTET_STREAM),
        }
    }
}

impl From<&str> for Content {
    fn from(text: &str) -> Self {
        Content::Text(text.to_string())
    }
}

impl From<String> for Content {
    fn from(text: String) -> Self {
        Content::Text(text)
    }
}

impl From<Value> for Content {
    fn from(value: Value) -> Self {
        Content::Structured(value)
    }
}

impl From<Vec<u8>> for Content {
    fn from(bytes: Vec<u8>) -> Self {
        Content::Bytes(bytes)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MimeClass {
    Json,
    Form,
    Text,
    Binary,
}

impl MimeClass {
    pub fn of(content_type: Option<&str>) -> MimeClass {
        let Some(content_type) = content_type else {
            return MimeClass::Binary;
        };
        let content_type = content_type.to_ascii_lowercase();
        let essence = content_type.split(';').next().unwrap_or("").trim();

        if content_type.contains(JSON) {
            MimeClass::Json
        } else if essence == FORM {
            MimeClass::Form
        } else if essence.starts_with("text/") {
            MimeClass::Text
        } else {
            MimeClass::Binary
        }
    }
}

/// Interprets a fully de-framed, de-compressed body.
pub fn decode(body: Vec<u8>, class: MimeClass) -> Result<Content, ProtocolError> {
    if body.is_empty() {
        return Ok(Content::Empty);
    }
    let content = match class {
        MimeClass::Json => Content::Structured(serde_json::from_slice(&body)?),
        MimeClass::Form => {
            let text = String::from_utf8(body)?;
            let fields = decode_fields(&text)
                .into_iter()
                .map(|(k, v)| (k, Value::String(v)))
                .collect();
            Content::Structured(Value::Object(fields))
        }
        MimeClass::Text => Content::Text(String::from_utf8(body)?),
        MimeClass::Binary => Content::Bytes(body),
    };
    Ok(content)
}

/// Produces the wire body for `content` under `class`.
pub fn encode(content: &Content, class: MimeClass) -> Result<Vec<u8>, WriteError> {
    let body = match (content, class) {
        (Content::Empty, _) => Vec::new(),
        (Content::Structured(Value::Object(map)), MimeClass::Form) => {
            let fields: Vec<(String, String)> = map
                .iter()
                .map(|(k, v)| {
                    let v = match v {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    (k.clone(), v)
                })
                .collect();
            encode_fields(fields.iter().map(|(k, v)| (k, v))).into_bytes()
        }
        (Content::Structured(value), _) => serde_json::to_vec(value)?,
        (Content::Text(text), _) => text.clone().into_bytes(),
        (Content::Bytes(bytes), _) => bytes.clone(),
    };
    Ok(body)
}

/// Content-Type guessed from a file extension.
pub fn guess_mime(path: &str) -> &'static str {
    match path.rsplit('.').next() {
        Some("htm") | Some("html") => "text/html",
        Some("css") => "text/css",
        Some("js") => "text/javascript",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("json") => JSON,
        Some("xml") => "application/xml",
        Some("txt") => "text/plain",
        Some("pdf") => "application/pdf",
        _ => OCTET_STREAM,
    }
}
