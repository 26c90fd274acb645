//! Body framing rules.
//!
//! Three rules compete for deciding where a body ends: chunked transfer
//! coding, an explicit `Content-Length`, and reading until the peer closes.
//! The first two must never be combined. When neither is declared, a
//! response runs until the connection closes while a request has no body.

use crate::error::{ProtocolError, WriteError};
use crate::http::headers::{CONTENT_LENGTH, HttpHeaders, TRANSFER_ENCODING};
use crate::net::connection::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyFraming {
    Chunked,
    Length(usize),
    UntilClose,
    Empty,
}

/// Decides how the body following `headers` is framed. `role` is the role of
/// the connection the message is read from: a client reads responses, a
/// server reads requests.
pub fn body_framing(headers: &HttpHeaders, role: Role) -> Result<BodyFraming, ProtocolError> {
    let chunked = headers.get(TRANSFER_ENCODING).is_some_and(is_chunked);
    let length = headers.get(CONTENT_LENGTH);

    match (chunked, length) {
        (true, Some(_)) => Err(ProtocolError::ConflictingFraming),
        (true, None) => Ok(BodyFraming::Chunked),
        (false, Some(value)) => value
            .trim()
            .parse::<usize>()
            .map(BodyFraming::Length)
            .map_err(|_| ProtocolError::InvalidContentLength(value.to_string())),
        (false, None) => match role {
            Role::Client => Ok(BodyFraming::UntilClose),
            Role::Server => Ok(BodyFraming::Empty),
        },
    }
}

/// Outgoing messages are always written with a computed `Content-Length`;
/// a caller-supplied `Transfer-Encoding` would contradict it.
pub fn check_outgoing(headers: &HttpHeaders) -> Result<(), WriteError> {
    if headers.contains(TRANSFER_ENCODING) {
        return Err(WriteError::ConflictingFraming);
    }
    Ok(())
}

/// `chunked` must be the final transfer coding when present.
fn is_chunked(value: &str) -> bool {
    value
        .rsplit(',')
        .next()
        .is_some_and(|last| last.trim().eq_ignore_ascii_case("chunked"))
}
