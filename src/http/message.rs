//! HTTP messages, in both directions.
//!
//! One [`HttpMessage`] type carries requests and responses. A request is
//! recognised by the method of its locator; a response by its status code.
//! Reading is implemented in [`parser`](crate::http::parser), writing here.

use std::borrow::Cow;
use std::io;
use std::path::Path;

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::{ProtocolError, WriteError};
use crate::http::content::{self, Content, MimeClass};
use crate::http::encoding::ContentEncoding;
use crate::http::headers::{CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE, HttpHeaders, SET_COOKIE, STATUS};
use crate::http::locator::{self, Locator};
use crate::http::{HTTP_VERSION, Method, framing, parser, status};
use crate::net::connection::{Connection, Role};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct HttpMessage {
    pub locator: Locator,
    /// Status code; 0 on requests and on responses whose status line could
    /// not be read.
    pub code: u16,
    pub headers: HttpHeaders,
    pub content: Content,
}

impl HttpMessage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty response with the given status.
    pub fn with_code(code: u16) -> Self {
        Self {
            code,
            ..Self::default()
        }
    }

    pub fn response(code: u16, content: impl Into<Content>) -> Self {
        Self {
            code,
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn request(locator: Locator, headers: HttpHeaders, content: impl Into<Content>) -> Self {
        Self {
            locator,
            code: 0,
            headers,
            content: content.into(),
        }
    }

    /// 200 response carrying the file at `path`, typed by its extension.
    pub fn from_path(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let body = std::fs::read(path)?;
        let mime = content::guess_mime(&path.to_string_lossy());

        let content = match MimeClass::of(Some(mime)) {
            MimeClass::Text => String::from_utf8(body)
                .map(Content::Text)
                .unwrap_or_else(|err| Content::Bytes(err.into_bytes())),
            _ => Content::Bytes(body),
        };

        Ok(Self::response(200, content).with_header(CONTENT_TYPE, mime))
    }

    /// Reads the next message off `conn`. For a server connection the
    /// request line must already have been consumed into `locator`.
    pub async fn from_connection(conn: &mut Connection, locator: Locator) -> Result<Self, ProtocolError> {
        parser::read_message(conn, locator).await
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.set(name, value);
        self
    }

    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.set(name, value);
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn method(&self) -> Method {
        self.locator.method
    }

    /// Requests are always truthy. A response is truthy on a 2xx code, or
    /// when it has no readable status but did carry headers or content.
    pub fn is_success(&self) -> bool {
        if self.method().is_request() || (200..300).contains(&self.code) {
            return true;
        }
        self.code == 0 && (!self.content.is_empty() || self.headers.iter().any(|(name, _)| name != STATUS))
    }

    /// Content rendered as text; JSON is serialized, bytes are read as
    /// lossy UTF-8.
    pub fn text(&self) -> Cow<'_, str> {
        match &self.content {
            Content::Empty => Cow::Borrowed(""),
            Content::Text(text) => Cow::Borrowed(text.as_str()),
            Content::Structured(value) => Cow::Owned(value.to_string()),
            Content::Bytes(bytes) => String::from_utf8_lossy(bytes),
        }
    }

    pub fn json(&self) -> Option<&Value> {
        match &self.content {
            Content::Structured(value) => Some(value),
            _ => None,
        }
    }

    /// `name=value` pairs of the first cookie in `Set-Cookie`. Attributes
    /// without a value (`HttpOnly`, `Secure`) are skipped.
    pub fn cookies(&self) -> IndexMap<String, String> {
        let Some(raw) = self.header(SET_COOKIE) else {
            return IndexMap::new();
        };
        let decoded = locator::decode(raw);
        let first = decoded.split(',').next().unwrap_or("");

        first
            .split(';')
            .filter_map(|pair| pair.split_once('='))
            .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
            .filter(|(key, _)| !key.is_empty())
            .collect()
    }

    /// Wire form of the message as written by a connection in `role`.
    pub fn to_bytes(&self, role: Role) -> Result<Vec<u8>, WriteError> {
        framing::check_outgoing(&self.headers)?;

        let mut headers = self.headers.clone();
        if let Some(content_type) = self.content.default_type() {
            headers.set_default(CONTENT_TYPE, content_type);
        }

        let body = content::encode(&self.content, MimeClass::of(headers.get(CONTENT_TYPE)))?;
        let encoding = ContentEncoding::from_header(headers.get(CONTENT_ENCODING))
            .map_err(|_| WriteError::UnsupportedEncoding(headers.get(CONTENT_ENCODING).unwrap_or("").to_string()))?;
        let body = if body.is_empty() { body } else { encoding.encode(body)? };
        headers.set(CONTENT_LENGTH, body.len().to_string());

        let start = match role {
            Role::Server => {
                let code = self.status_code();
                format!("{} {} {}\r\n", HTTP_VERSION, code, status::reason(code))
            }
            Role::Client => {
                let method = if self.method().is_request() { self.method() } else { Method::Get };
                format!("{} {} {}\r\n", method, self.locator.target(), HTTP_VERSION)
            }
        };

        let mut out = Vec::with_capacity(start.len() + body.len() + 128);
        out.extend_from_slice(start.as_bytes());
        out.extend_from_slice(headers.stringify().as_bytes());
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(&body);
        Ok(out)
    }

    pub async fn write(&self, conn: &mut Connection) -> Result<(), WriteError> {
        let bytes = self.to_bytes(conn.role())?;
        conn.send_all(&bytes).await?;
        Ok(())
    }

    /// Code written on a status line: the explicit code, else the one kept
    /// in the `Status` header, else 200.
    fn status_code(&self) -> u16 {
        if self.code != 0 {
            return self.code;
        }
        self.header(STATUS)
            .and_then(|code| code.trim().parse().ok())
            .filter(|code| *code != 0)
            .unwrap_or(200)
    }
}

impl From<&str> for HttpMessage {
    fn from(text: &str) -> Self {
        HttpMessage::response(200, text)
    }
}

impl From<String> for HttpMessage {
    fn from(text: String) -> Self {
        HttpMessage::response(200, text)
    }
}

impl From<Value> for HttpMessage {
    fn from(value: Value) -> Self {
        HttpMessage::response(200, value)
    }
}

impl From<Vec<u8>> for HttpMessage {
    fn from(bytes: Vec<u8>) -> Self {
        HttpMessage::response(200, bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::connection::mock::connection;
    use serde_json::json;

    #[test]
    fn server_writes_status_line_and_length() {
        let msg = HttpMessage::response(200, json!({"ok": true}));
        let wire = String::from_utf8(msg.to_bytes(Role::Server).unwrap()).unwrap();
        assert_eq!(
            wire,
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 11\r\n\r\n{\"ok\":true}"
        );
    }

    #[test]
    fn client_writes_request_line() {
        let locator: Locator = "https://localhost:10443/a%20b?x=1".parse().unwrap();
        let msg = HttpMessage::request(locator.with_method(Method::Delete), HttpHeaders::new(), Content::Empty);
        let wire = String::from_utf8(msg.to_bytes(Role::Client).unwrap()).unwrap();
        assert_eq!(wire, "DELETE /a%20b?x=1 HTTP/1.1\r\nContent-Length: 0\r\n\r\n");

        let undefined = HttpMessage::request(locator.with_method(Method::Undefined), HttpHeaders::new(), "");
        assert!(undefined.to_bytes(Role::Client).unwrap().starts_with(b"GET /a%20b?x=1 HTTP/1.1\r\n"));
    }

    #[test]
    fn status_header_backs_the_code() {
        let msg = HttpMessage::new().with_header(STATUS, "404");
        let wire = msg.to_bytes(Role::Server).unwrap();
        assert!(wire.starts_with(b"HTTP/1.1 404 Not Found\r\n"));
        assert!(!String::from_utf8_lossy(&wire).contains("Status:"));

        let wire = HttpMessage::new().to_bytes(Role::Server).unwrap();
        assert!(wire.starts_with(b"HTTP/1.1 200 OK\r\n"));
    }

    #[test]
    fn transfer_encoding_is_never_written() {
        let msg = HttpMessage::from("hi").with_header("Transfer-Encoding", "chunked");
        assert!(matches!(msg.to_bytes(Role::Server), Err(WriteError::ConflictingFraming)));

        let msg = HttpMessage::from("hi").with_header(CONTENT_ENCODING, "br");
        assert!(matches!(msg.to_bytes(Role::Server), Err(WriteError::UnsupportedEncoding(e)) if e == "br"));
    }

    #[test]
    fn form_content_type_selects_url_encoding() {
        let locator: Locator = "POST https://localhost/submit".parse().unwrap();
        let headers: HttpHeaders = [(CONTENT_TYPE, content::FORM)].into_iter().collect();
        let msg = HttpMessage::request(locator, headers, json!({"name": "Ada L"}));
        let wire = msg.to_bytes(Role::Client).unwrap();
        assert!(wire.ends_with(b"\r\n\r\nname=Ada%20L"));
    }

    #[async_std::test]
    async fn written_gzip_reads_back() {
        let msg = HttpMessage::response(201, "compressed text ".repeat(20)).with_header(CONTENT_ENCODING, "gzip");

        let (mut server, tap) = connection(Role::Server, b"", 1);
        msg.write(&mut server).await.unwrap();

        let (mut client, _) = connection(Role::Client, &tap.output(), 17);
        let locator = client.locator().with_method(Method::Response);
        let back = HttpMessage::from_connection(&mut client, locator).await.unwrap();

        assert_eq!(back.code, 201);
        assert_eq!(back.content, msg.content);
        assert_eq!(back.header(CONTENT_ENCODING), Some("gzip"));
    }

    #[test]
    fn truthiness() {
        let locator: Locator = "https://localhost/".parse().unwrap();
        assert!(HttpMessage::request(locator.clone(), HttpHeaders::new(), Content::Empty).is_success());

        let mut response = HttpMessage::with_code(204);
        response.locator = locator.with_method(Method::Response);
        assert!(response.is_success());
        response.code = 404;
        assert!(!response.is_success());

        let unreadable = HttpMessage::with_code(0).with_header(STATUS, "0");
        assert!(!unreadable.is_success());
        assert!(unreadable.with_header("Server", "x").is_success());
    }

    #[test]
    fn accessors() {
        let msg = HttpMessage::from(json!({"id": 7}));
        assert_eq!(msg.json(), Some(&json!({"id": 7})));
        assert_eq!(msg.text(), r#"{"id":7}"#);

        let msg = HttpMessage::from(vec![b'h', b'i']);
        assert_eq!(msg.json(), None);
        assert_eq!(msg.text(), "hi");
    }

    #[test]
    fn cookies_of_the_first_entry() {
        let msg = HttpMessage::new().with_header(
            SET_COOKIE,
            "sid=abc%20123; Path=/; HttpOnly, other=1; Path=/x",
        );
        let cookies = msg.cookies();
        assert_eq!(cookies.get("sid").map(String::as_str), Some("abc 123"));
        assert_eq!(cookies.get("Path").map(String::as_str), Some("/"));
        assert!(!cookies.contains_key("other"));
        assert!(!cookies.contains_key("HttpOnly"));

        assert!(HttpMessage::new().cookies().is_empty());
    }

    #[test]
    fn file_bodies() {
        let dir = std::env::temp_dir().join(format!("tlsnet-message-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("index.html"), "<h1>hi</h1>").unwrap();
        std::fs::write(dir.join("blob.bin"), [1u8, 2, 3]).unwrap();

        let page = HttpMessage::from_path(dir.join("index.html")).unwrap();
        assert_eq!(page.code, 200);
        assert_eq!(page.header(CONTENT_TYPE), Some("text/html"));
        assert_eq!(page.content, Content::Text("<h1>hi</h1>".into()));

        let blob = HttpMessage::from_path(dir.join("blob.bin")).unwrap();
        assert_eq!(blob.content, Content::Bytes(vec![1, 2, 3]));

        let missing = HttpMessage::from_path(dir.join("nope.txt")).unwrap_err();
        assert_eq!(missing.kind(), io::ErrorKind::NotFound);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
