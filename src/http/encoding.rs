//! `Content-Encoding` codecs.
//!
//! gzip is the only compression the engine speaks. `identity` (or no header
//! at all) leaves the body untouched; anything else is refused when reading
//! and never produced when writing.

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::io::{self, Read, Write};

use crate::error::ProtocolError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentEncoding {
    Gzip,
    Identity,
}

impl ContentEncoding {
    /// Reads a `Content-Encoding` header value. `x-gzip` is accepted as an
    /// alias, as HTTP/1.1 requires.
    pub fn from_header(value: Option<&str>) -> Result<ContentEncoding, ProtocolError> {
        let Some(value) = value else {
            return Ok(ContentEncoding::Identity);
        };
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "identity" => Ok(ContentEncoding::Identity),
            "gzip" | "x-gzip" => Ok(ContentEncoding::Gzip),
            _ => Err(ProtocolError::UnsupportedEncoding(value.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentEncoding::Gzip => "gzip",
            ContentEncoding::Identity => "identity",
        }
    }

    pub fn encode(&self, body: Vec<u8>) -> io::Result<Vec<u8>> {
        match self {
            ContentEncoding::Gzip => {
                let mut e = GzEncoder::new(Vec::new(), Compression::default());
                e.write_all(&body)?;
                e.finish()
            }
            ContentEncoding::Identity => Ok(body),
        }
    }

    /// Undoes the encoding. Inflated output is held to `limit` bytes, the
    /// same bound the framed body was read under.
    pub fn decode(&self, body: Vec<u8>, limit: usize) -> Result<Vec<u8>, ProtocolError> {
        match self {
            ContentEncoding::Gzip => {
                let mut inflated = Vec::new();
                GzDecoder::new(body.as_slice())
                    .take((limit as u64).saturating_add(1))
                    .read_to_end(&mut inflated)
                    .map_err(ProtocolError::Inflate)?;
                if inflated.len() > limit {
                    return Err(ProtocolError::BodyTooLarge { limit });
                }
                Ok(inflated)
            }
            ContentEncoding::Identity => Ok(body),
        }
    }
}
