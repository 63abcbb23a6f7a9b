//! The server-side RFC 6455 opening handshake: parse the HTTP upgrade request, validate
//! it, and compute the `Sec-WebSocket-Accept` response.
//!
//! Grounded on the teacher's `handshake::server` module (`httparse`-based request parsing,
//! the `Headers`/`find_first` lookup shape) and `handshake::mod::convert_key` (the
//! SHA-1 + base64 accept-token computation), restructured to be driven a chunk at a time
//! by [`crate::connection::Connection`] instead of owning its own blocking retry loop.

use data_encoding::BASE64;
use sha1::{Digest, Sha1};

use crate::error::{Error, HandshakeError, ProtocolError, Result};

const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";
const MAX_HEADERS: usize = 64;

/// The parts of the client's handshake request this crate actually needs.
pub struct Request {
    pub path: String,
}

/// Attempt to parse one HTTP request from the front of `buf`.
///
/// Returns `Ok(None)` if the request is not yet complete (no trailing CRLFCRLF seen).
pub fn try_parse(buf: &[u8]) -> Result<Option<(usize, Request)>> {
    let mut header_storage = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut req = httparse::Request::new(&mut header_storage);
    let status = req.parse(buf).map_err(|_| {
        Error::Protocol(ProtocolError::Handshake(HandshakeError::MalformedRequest))
    })?;

    let httparse::Status::Complete(size) = status else {
        return Ok(None);
    };

    if req.method != Some("GET") {
        return Err(Error::Protocol(ProtocolError::Handshake(HandshakeError::WrongHttpMethod)));
    }
    if req.version != Some(1) {
        return Err(Error::Protocol(ProtocolError::Handshake(HandshakeError::WrongHttpVersion)));
    }

    let find = |name: &str| -> Option<&str> {
        req.headers.iter().find(|h| h.name.eq_ignore_ascii_case(name)).and_then(|h| std::str::from_utf8(h.value).ok())
    };
    let has_token = |name: &str, token: &str| -> bool {
        find(name).is_some_and(|v| v.split(',').any(|part| part.trim().eq_ignore_ascii_case(token)))
    };

    if !has_token("Upgrade", "websocket") {
        return Err(Error::Protocol(ProtocolError::Handshake(HandshakeError::MissingUpgradeWebSocket)));
    }
    if !has_token("Connection", "Upgrade") {
        return Err(Error::Protocol(ProtocolError::Handshake(HandshakeError::MissingConnectionUpgrade)));
    }
    if find("Sec-WebSocket-Version") != Some("13") {
        return Err(Error::Protocol(ProtocolError::Handshake(HandshakeError::MissingOrBadVersion)));
    }
    let key = find("Sec-WebSocket-Key")
        .ok_or(Error::Protocol(ProtocolError::Handshake(HandshakeError::MissingOrBadKey)))?;
    let decoded = BASE64
        .decode(key.as_bytes())
        .map_err(|_| Error::Protocol(ProtocolError::Handshake(HandshakeError::MissingOrBadKey)))?;
    if decoded.len() != 16 {
        return Err(Error::Protocol(ProtocolError::Handshake(HandshakeError::MissingOrBadKey)));
    }

    let path = req.path.unwrap_or("/").to_string();
    Ok(Some((size, Request { path })))
}

/// Turn a `Sec-WebSocket-Key` value into the matching `Sec-WebSocket-Accept` token, per
/// RFC 6455 §1.3.
pub fn accept_key(client_key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(client_key.as_bytes());
    hasher.update(WS_GUID.as_bytes());
    BASE64.encode(&hasher.finalize())
}

/// Re-extract the `Sec-WebSocket-Key` header and compute the accept token, given a
/// request buffer already known to be a complete, valid handshake (i.e. `try_parse`
/// returned `Ok(Some(..))` for it).
pub fn accept_key_for_request(buf: &[u8]) -> Option<String> {
    let mut header_storage = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut req = httparse::Request::new(&mut header_storage);
    req.parse(buf).ok()?;
    let key = req
        .headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case("Sec-WebSocket-Key"))
        .and_then(|h| std::str::from_utf8(h.value).ok())?;
    Some(accept_key(key))
}

/// Render the `101 Switching Protocols` response.
pub fn build_response(accept_token: &str, server_identifier: &str) -> Vec<u8> {
    format!(
        "HTTP/1.1 101 Switching Protocols\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Accept: {accept_token}\r\n\
         Server: {server_identifier}\r\n\
         \r\n"
    )
    .into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_REQUEST: &[u8] = b"GET /chat HTTP/1.1\r\n\
        Host: example.com\r\n\
        Upgrade: websocket\r\n\
        Connection: Upgrade\r\n\
        Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
        Sec-WebSocket-Version: 13\r\n\
        \r\n";

    #[test]
    fn accept_key_matches_rfc6455_example() {
        assert_eq!(accept_key("dGhlIHNhbXBsZSBub25jZQ=="), "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
    }

    #[test]
    fn parses_a_valid_request() {
        let (size, req) = try_parse(VALID_REQUEST).unwrap().unwrap();
        assert_eq!(size, VALID_REQUEST.len());
        assert_eq!(req.path, "/chat");
    }

    #[test]
    fn incomplete_request_yields_none() {
        let partial = &VALID_REQUEST[..VALID_REQUEST.len() - 10];
        assert!(try_parse(partial).unwrap().is_none());
    }

    #[test]
    fn rejects_missing_upgrade_header() {
        let bad = b"GET / HTTP/1.1\r\nHost: x\r\nConnection: Upgrade\r\n\
            Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\nSec-WebSocket-Version: 13\r\n\r\n";
        assert!(matches!(
            try_parse(bad),
            Err(Error::Protocol(ProtocolError::Handshake(HandshakeError::MissingUpgradeWebSocket)))
        ));
    }

    #[test]
    fn rejects_wrong_version() {
        let bad = b"GET / HTTP/1.1\r\nUpgrade: websocket\r\nConnection: Upgrade\r\n\
            Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\nSec-WebSocket-Version: 8\r\n\r\n";
        assert!(matches!(
            try_parse(bad),
            Err(Error::Protocol(ProtocolError::Handshake(HandshakeError::MissingOrBadVersion)))
        ));
    }

    #[test]
    fn rejects_short_key() {
        let bad = b"GET / HTTP/1.1\r\nUpgrade: websocket\r\nConnection: Upgrade\r\n\
            Sec-WebSocket-Key: dG9vc2hvcnQ=\r\nSec-WebSocket-Version: 13\r\n\r\n";
        assert!(matches!(
            try_parse(bad),
            Err(Error::Protocol(ProtocolError::Handshake(HandshakeError::MissingOrBadKey)))
        ));
    }

    #[test]
    fn builds_expected_response() {
        let response = build_response("s3pPLMBiTxaQ9kYGzzhZRbK+xOo=", "wsreactor/0.1.0");
        let text = String::from_utf8(response).unwrap();
        assert!(text.starts_with("HTTP/1.1 101 Switching Protocols\r\n"));
        assert!(text.contains("Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=\r\n"));
        assert!(text.ends_with("\r\n\r\n"));
    }
}
