//! Support utilities (C8): the HTTP status-text table and the templated error page used
//! to reject malformed handshakes.

/// Reason phrase for the 4xx statuses this crate ever sends.
pub fn status_text(status: u16) -> &'static str {
    match status {
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        413 => "Payload Too Large",
        426 => "Upgrade Required",
        _ => "Error",
    }
}

/// Render a minimal HTTP/1.1 error response for a rejected handshake.
///
/// Grounded on the teacher's `handshake::server::Request::reply` header-formatting style:
/// a hand-built `String`, not a templating engine, since the handful of headers here never
/// vary in shape.
pub fn error_page(status: u16, detail: &str, server_identifier: &str) -> Vec<u8> {
    let reason = status_text(status);
    let body = format!(
        "<html><head><title>{status} {reason}</title></head>\
         <body><h1>{status} {reason}</h1><p>{detail}</p></body></html>"
    );
    let response = format!(
        "HTTP/1.1 {status} {reason}\r\n\
         Server: {server_identifier}\r\n\
         Connection: close\r\n\
         Content-Type: text/html\r\n\
         Content-Length: {len}\r\n\
         \r\n\
         {body}",
        len = body.len(),
    );
    response.into_bytes()
}
