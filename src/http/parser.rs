//! Reading HTTP messages off a [`Connection`].
//!
//! A message is read in three steps:
//!
//! 1. the header block, line by line, up to the blank line,
//! 2. the body, framed as [`framing::body_framing`] decides,
//! 3. `Content-Encoding` then `Content-Type` decoding.
//!
//! On a client connection the header block starts with the status line. On
//! a server connection the request line has already been consumed by the
//! server loop, which needs it to build the request's locator first.

use crate::error::{ProtocolError, ReadError};
use crate::http::content::{self, MimeClass};
use crate::http::encoding::ContentEncoding;
use crate::http::framing::{self, BodyFraming};
use crate::http::headers::{CONTENT_ENCODING, CONTENT_TYPE, HttpHeaders, STATUS};
use crate::http::locator::Locator;
use crate::http::message::HttpMessage;
use crate::http::CRLF;
use crate::net::connection::{Connection, Role};

/// "HTTP/1.1 200" is the shortest status line worth looking at.
const MIN_STATUS_LINE: usize = 12;

#[derive(Debug, Default)]
pub struct Head {
    pub code: u16,
    pub headers: HttpHeaders,
}

pub async fn read_message(conn: &mut Connection, locator: Locator) -> Result<HttpMessage, ProtocolError> {
    let head = read_headers(conn).await?;
    let body = read_content(conn, &head.headers).await?;

    let encoding = ContentEncoding::from_header(head.headers.get(CONTENT_ENCODING))?;
    let body = if body.is_empty() { body } else { encoding.decode(body, conn.limits().max_body_size)? };
    let content = content::decode(body, MimeClass::of(head.headers.get(CONTENT_TYPE)))?;

    Ok(HttpMessage {
        locator,
        code: head.code,
        headers: head.headers,
        content,
    })
}

pub async fn read_headers(conn: &mut Connection) -> Result<Head, ProtocolError> {
    let limits = conn.limits();
    let mut head = Head::default();
    let mut status_line = conn.role() == Role::Client;
    let mut total = 0;

    loop {
        let line = conn
            .read_until(CRLF, limits.max_header_line)
            .await
            .map_err(ProtocolError::UnterminatedHeaders)?;
        total = count_header_bytes(total, line.len(), limits.max_header_size)?;
        let line = &line[..line.len() - CRLF.len()];

        if status_line {
            status_line = false;
            head.code = parse_status_line(line);
            head.headers.set(STATUS, head.code.to_string());
            continue;
        }

        if line.is_empty() {
            break;
        }

        let line = String::from_utf8_lossy(line);
        let (name, value) = line
            .split_once(':')
            .filter(|(name, _)| !name.trim().is_empty())
            .ok_or_else(|| ProtocolError::MalformedHeader(line.to_string()))?;
        head.headers.set(name.trim(), value.trim());
    }

    Ok(head)
}

/// De-framed body bytes, before any content decoding.
pub async fn read_content(conn: &mut Connection, headers: &HttpHeaders) -> Result<Vec<u8>, ProtocolError> {
    let limit = conn.limits().max_body_size;

    match framing::body_framing(headers, conn.role())? {
        BodyFraming::Empty => Ok(Vec::new()),
        BodyFraming::Length(n) if n > limit => Err(ProtocolError::BodyTooLarge { limit }),
        BodyFraming::Length(n) => conn.read_sz(n).await.map_err(ProtocolError::Truncated),
        BodyFraming::Chunked => read_chunked(conn, limit).await,
        BodyFraming::UntilClose => read_to_close(conn, limit).await,
    }
}

async fn read_chunked(conn: &mut Connection, limit: usize) -> Result<Vec<u8>, ProtocolError> {
    let limits = conn.limits();
    let mut body = Vec::new();

    loop {
        let line = conn
            .read_until(CRLF, limits.max_chunk_line)
            .await
            .map_err(ProtocolError::Truncated)?;
        let line = String::from_utf8_lossy(&line[..line.len() - CRLF.len()]).into_owned();

        // chunk extensions after ';' carry nothing we use
        let size_hex = line.split(';').next().unwrap_or("").trim();
        let size = usize::from_str_radix(size_hex, 16)
            .map_err(|_| ProtocolError::InvalidChunkSize(line.clone()))?;
        if size == 0 {
            break;
        }
        if size > limit.saturating_sub(body.len()) {
            return Err(ProtocolError::BodyTooLarge { limit });
        }

        let chunk = conn.read_sz(size).await.map_err(ProtocolError::Truncated)?;
        body.extend_from_slice(&chunk);

        let terminator = conn.read_sz(CRLF.len()).await.map_err(ProtocolError::Truncated)?;
        if terminator != CRLF {
            return Err(ProtocolError::ChunkTerminator);
        }
    }

    // Trailer section, ended by a blank line. A peer that closes right
    // after the last chunk has still delivered the whole body.
    let mut total = 0;
    loop {
        match conn.read_until(CRLF, limits.max_header_line).await {
            Ok(line) if line == CRLF => break,
            Ok(line) => total = count_header_bytes(total, line.len(), limits.max_header_size)?,
            Err(ReadError::Closed) => break,
            Err(err) => return Err(ProtocolError::Truncated(err)),
        }
    }

    Ok(body)
}

async fn read_to_close(conn: &mut Connection, limit: usize) -> Result<Vec<u8>, ProtocolError> {
    let mut body = Vec::new();
    let mut buf = vec![0u8; conn.limits().buffer_size];

    loop {
        match conn.recv(&mut buf).await {
            Ok(0) | Err(ReadError::Closed) => break,
            Ok(n) => {
                if body.len() + n > limit {
                    return Err(ProtocolError::BodyTooLarge { limit });
                }
                body.extend_from_slice(&buf[..n]);
            }
            Err(err) => return Err(ProtocolError::Truncated(err)),
        }
    }

    Ok(body)
}

fn count_header_bytes(total: usize, line: usize, limit: usize) -> Result<usize, ProtocolError> {
    let total = total.saturating_add(line);
    if total > limit {
        return Err(ProtocolError::HeadersTooLarge { limit });
    }
    Ok(total)
}

/// Status code of `HTTP/1.1 200 OK`, taken by position. Lines that are too
/// short or have fewer than two tokens yield 0.
fn parse_status_line(line: &[u8]) -> u16 {
    if line.len() < MIN_STATUS_LINE {
        return 0;
    }
    let line = String::from_utf8_lossy(line);
    let mut tokens = line.split_whitespace();
    match (tokens.next(), tokens.next()) {
        (Some(_), Some(code)) => code.parse().unwrap_or(0),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::content::Content;
    use crate::config::Limits;
    use crate::net::connection::mock::{connection, connection_with_limits};
    use serde_json::json;

    async fn response(wire: &[u8]) -> Result<HttpMessage, ProtocolError> {
        let (mut conn, _) = connection(Role::Client, wire, 7);
        let locator = conn.locator().clone();
        read_message(&mut conn, locator).await
    }

    #[async_std::test]
    async fn chunked_body_is_reassembled() {
        let wire = b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nTransfer-Encoding: chunked\r\n\r\n\
                     4\r\nWiki\r\n5\r\npedia\r\n0\r\n\r\n";
        let msg = response(wire).await.unwrap();
        assert_eq!(msg.code, 200);
        assert_eq!(msg.content, Content::Text("Wikipedia".into()));
    }

    #[async_std::test]
    async fn chunked_raw_bytes() {
        let (mut conn, _) = connection(Role::Client, b"4\r\nWiki\r\n5\r\npedia\r\n0\r\n\r\nNEXT", 2);
        let headers: HttpHeaders = [("Transfer-Encoding", "chunked")].into_iter().collect();
        assert_eq!(read_content(&mut conn, &headers).await.unwrap(), b"Wikipedia");
        assert_eq!(conn.read_sz(4).await.unwrap(), b"NEXT");
    }

    #[async_std::test]
    async fn chunk_extensions_and_trailers() {
        let (mut conn, _) = connection(
            Role::Client,
            b"3;name=x\r\nabc\r\n0\r\nExpires: never\r\n\r\n",
            5,
        );
        let headers: HttpHeaders = [("Transfer-Encoding", "chunked")].into_iter().collect();
        assert_eq!(read_content(&mut conn, &headers).await.unwrap(), b"abc");
        assert!(conn.buffered().is_empty());
    }

    #[async_std::test]
    async fn chunk_without_crlf_is_an_error() {
        let (mut conn, _) = connection(Role::Client, b"4\r\nWikiXX5\r\npedia\r\n0\r\n\r\n", 64);
        let headers: HttpHeaders = [("Transfer-Encoding", "chunked")].into_iter().collect();
        assert!(matches!(
            read_content(&mut conn, &headers).await,
            Err(ProtocolError::ChunkTerminator)
        ));
    }

    #[async_std::test]
    async fn chunk_cut_by_peer_is_truncated() {
        let (mut conn, _) = connection(Role::Client, b"a\r\nonly", 64);
        let headers: HttpHeaders = [("Transfer-Encoding", "chunked")].into_iter().collect();
        assert!(matches!(
            read_content(&mut conn, &headers).await,
            Err(ProtocolError::Truncated(ReadError::Closed))
        ));
    }

    #[async_std::test]
    async fn bad_chunk_size() {
        let (mut conn, _) = connection(Role::Client, b"zz\r\n", 64);
        let headers: HttpHeaders = [("Transfer-Encoding", "chunked")].into_iter().collect();
        assert!(matches!(
            read_content(&mut conn, &headers).await,
            Err(ProtocolError::InvalidChunkSize(line)) if line == "zz"
        ));
    }

    #[async_std::test]
    async fn content_length_leaves_the_rest() {
        let (mut conn, _) = connection(Role::Client, b"HelloXXXXX", 3);
        let headers: HttpHeaders = [("Content-Length", "5")].into_iter().collect();
        assert_eq!(read_content(&mut conn, &headers).await.unwrap(), b"Hello");
        assert_eq!(conn.read_sz(5).await.unwrap(), b"XXXXX");
    }

    #[async_std::test]
    async fn conflicting_framing_never_picks_one() {
        let wire = b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\nTransfer-Encoding: chunked\r\n\r\nHello";
        assert!(matches!(response(wire).await, Err(ProtocolError::ConflictingFraming)));
    }

    #[async_std::test]
    async fn response_without_framing_reads_to_close() {
        let wire = b"HTTP/1.1 200 OK\r\nContent-Type: text/html\r\n\r\n<p>streamed</p>";
        let msg = response(wire).await.unwrap();
        assert_eq!(msg.text(), "<p>streamed</p>");
    }

    #[async_std::test]
    async fn request_without_framing_is_empty() {
        let (mut conn, _) = connection(Role::Server, b"Host: localhost\r\n\r\nGET /next HTTP/1.1\r\n", 4);
        let locator = conn.locator().clone();
        let msg = read_message(&mut conn, locator).await.unwrap();
        assert_eq!(msg.content, Content::Empty);
        assert_eq!(msg.header("Host"), Some("localhost"));
        assert_eq!(conn.read_until(CRLF, 64).await.unwrap(), b"GET /next HTTP/1.1\r\n");
    }

    #[async_std::test]
    async fn gzip_json_body() {
        let body = crate::http::encoding::ContentEncoding::Gzip
            .encode(br#"{"ok":true}"#.to_vec())
            .unwrap();
        let mut wire = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json; charset=utf-8\r\n\
             Content-Encoding: gzip\r\nContent-Length: {}\r\n\r\n",
            body.len()
        )
        .into_bytes();
        wire.extend_from_slice(&body);

        let msg = response(&wire).await.unwrap();
        assert_eq!(msg.content, Content::Structured(json!({"ok": true})));
    }

    #[async_std::test]
    async fn status_line_edge_cases() {
        assert_eq!(parse_status_line(b"HTTP/1.1 404 Not Found"), 404);
        assert_eq!(parse_status_line(b"HTTP/1.1 204"), 204);
        assert_eq!(parse_status_line(b"HTTP/1.1"), 0);
        assert_eq!(parse_status_line(b"GARBAGELINE!"), 0);
        assert_eq!(parse_status_line(b"HTTP/1.1 abc OK"), 0);

        let msg = response(b"bogus\r\nContent-Length: 0\r\n\r\n").await.unwrap();
        assert_eq!(msg.code, 0);
        assert_eq!(msg.header("Status"), Some("0"));
    }

    #[async_std::test]
    async fn header_block_must_terminate() {
        assert!(matches!(
            response(b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n").await,
            Err(ProtocolError::UnterminatedHeaders(ReadError::Closed))
        ));
        assert!(matches!(
            response(b"HTTP/1.1 200 OK\r\nno colon here\r\n\r\n").await,
            Err(ProtocolError::MalformedHeader(_))
        ));
    }

    #[async_std::test]
    async fn oversized_body_is_refused() {
        let (mut conn, _) = connection(Role::Client, b"", 1);
        let too_big = (conn.limits().max_body_size + 1).to_string();
        let headers: HttpHeaders = [("Content-Length", too_big.as_str())].into_iter().collect();
        assert!(matches!(
            read_content(&mut conn, &headers).await,
            Err(ProtocolError::BodyTooLarge { .. })
        ));
    }

    #[async_std::test]
    async fn huge_chunk_size_is_refused() {
        let (mut conn, _) = connection(Role::Client, b"4\r\nWiki\r\nffffffffffffffff\r\nxx", 64);
        let headers: HttpHeaders = [("Transfer-Encoding", "chunked")].into_iter().collect();
        assert!(matches!(
            read_content(&mut conn, &headers).await,
            Err(ProtocolError::BodyTooLarge { .. })
        ));
    }

    #[async_std::test]
    async fn gzip_bomb_is_held_to_the_body_limit() {
        let body = crate::http::encoding::ContentEncoding::Gzip
            .encode(vec![b'0'; 256 * 1024])
            .unwrap();
        let mut wire = format!(
            "HTTP/1.1 200 OK\r\nContent-Encoding: gzip\r\nContent-Length: {}\r\n\r\n",
            body.len()
        )
        .into_bytes();
        wire.extend_from_slice(&body);

        let limits = Limits {
            max_body_size: 16 * 1024,
            ..Limits::default()
        };
        let (mut conn, _) = connection_with_limits(Role::Client, &wire, 64, limits);
        let locator = conn.locator().clone();
        assert!(matches!(
            read_message(&mut conn, locator).await,
            Err(ProtocolError::BodyTooLarge { limit }) if limit == 16 * 1024
        ));
    }

    #[async_std::test]
    async fn header_block_is_bounded_as_a_whole() {
        let mut wire = b"HTTP/1.1 200 OK\r\n".to_vec();
        for i in 0..100 {
            wire.extend_from_slice(format!("X-Filler-{i}: {}\r\n", "v".repeat(40)).as_bytes());
        }
        wire.extend_from_slice(b"Content-Length: 0\r\n\r\n");

        let limits = Limits {
            max_header_size: 1024,
            ..Limits::default()
        };
        let (mut conn, _) = connection_with_limits(Role::Client, &wire, 64, limits);
        let locator = conn.locator().clone();
        assert!(matches!(
            read_message(&mut conn, locator).await,
            Err(ProtocolError::HeadersTooLarge { limit: 1024 })
        ));

        // the same block fits under the default bound
        assert_eq!(response(&wire).await.unwrap().code, 200);
    }

    #[async_std::test]
    async fn endless_trailers_are_bounded() {
        let mut wire = b"3\r\nabc\r\n0\r\n".to_vec();
        for _ in 0..64 {
            wire.extend_from_slice(b"X-Trailer: some value here\r\n");
        }
        wire.extend_from_slice(b"\r\n");

        let limits = Limits {
            max_header_size: 512,
            ..Limits::default()
        };
        let (mut conn, _) = connection_with_limits(Role::Client, &wire, 64, limits);
        let headers: HttpHeaders = [("Transfer-Encoding", "chunked")].into_iter().collect();
        assert!(matches!(
            read_content(&mut conn, &headers).await,
            Err(ProtocolError::HeadersTooLarge { limit: 512 })
        ));
    }
}
