//! A minimal, deliberately dumb blocking WebSocket client used only to drive the server
//! end-to-end in integration tests. It is not a general-purpose client: it assumes it is
//! talking to this crate's server and skips everything a real client would need
//! (subprotocols, extensions, redirect handling).

use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::{Duration, Instant};

use wsreactor::framer::coding::{Control, Data, OpCode};
use wsreactor::framer::{Frame, FrameHeader};
use wsreactor::{Multiplexer, Server, Update};

/// Tick `server` through `mux` until `predicate` is satisfied by the updates accumulated
/// so far, or 5 seconds pass. Panics on timeout so a stuck test fails fast instead of
/// hanging the suite.
pub fn drive_until(
    server: &mut Server,
    mux: &mut Multiplexer,
    mut predicate: impl FnMut(&[Update]) -> bool,
) -> Vec<Update> {
    let mut all = Vec::new();
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let updates = mux.tick(server).expect("multiplexer tick");
        all.extend(updates);
        if predicate(&all) {
            return all;
        }
        assert!(Instant::now() < deadline, "timed out waiting for expected updates; saw {all:?}");
    }
}

pub const TEST_KEY: &str = "dGhlIHNhbXBsZSBub25jZQ==";
pub const TEST_ACCEPT: &str = "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=";

pub fn connect(addr: std::net::SocketAddr) -> TcpStream {
    let stream = TcpStream::connect(addr).expect("connect to test server");
    stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    stream
}

pub fn send_handshake(stream: &mut TcpStream, path: &str, key: &str) {
    let request = format!(
        "GET {path} HTTP/1.1\r\n\
         Host: localhost\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Key: {key}\r\n\
         Sec-WebSocket-Version: 13\r\n\
         \r\n"
    );
    stream.write_all(request.as_bytes()).unwrap();
}

/// Read bytes until the response's trailing CRLFCRLF, returning the full response text.
pub fn read_handshake_response(stream: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        stream.read_exact(&mut byte).expect("read handshake response");
        buf.push(byte[0]);
        if buf.ends_with(b"\r\n\r\n") {
            break;
        }
    }
    String::from_utf8(buf).unwrap()
}

/// Mask and send one Text frame as a client would.
pub fn send_text(stream: &mut TcpStream, text: &str) {
    send_frame(stream, text.as_bytes().to_vec(), OpCode::Data(Data::Text));
}

pub fn send_frame(stream: &mut TcpStream, payload: Vec<u8>, opcode: OpCode) {
    let mut frame = Frame::message(payload, opcode, true);
    frame.mask();
    let mut bytes = Vec::new();
    frame.format(&mut bytes).unwrap();
    stream.write_all(&bytes).unwrap();
}

/// Read and parse exactly one (unmasked, server-originated) frame.
pub fn read_frame(stream: &mut TcpStream) -> (OpCode, Vec<u8>) {
    let mut buf = Vec::new();
    loop {
        if let Some((header, length, header_len)) = FrameHeader::parse(&buf).unwrap() {
            let total = header_len + length as usize;
            if buf.len() >= total {
                let payload = buf[header_len..total].to_vec();
                return (header.opcode, payload);
            }
        }
        let mut chunk = [0u8; 4096];
        let n = stream.read(&mut chunk).expect("read frame");
        assert!(n > 0, "server closed the connection while a frame was expected");
        buf.extend_from_slice(&chunk[..n]);
    }
}

pub fn expect_close(stream: &mut TcpStream) -> u16 {
    let (opcode, payload) = read_frame(stream);
    assert_eq!(opcode, OpCode::Control(Control::Close));
    assert!(payload.len() >= 2, "close frame should carry a code");
    u16::from_be_bytes([payload[0], payload[1]])
}
