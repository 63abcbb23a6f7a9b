//! Scenario 5 from the design notes: a handshake request that never completes its header
//! block within the configured byte cap is rejected with HTTP 413 and `HandshakeFailure`.

mod common;

use std::io::Write;
use std::thread;
use std::time::Duration;

use wsreactor::config::WebSocketConfig;
use wsreactor::server::Address;
use wsreactor::update::ReadKind;
use wsreactor::{Multiplexer, Server, Update};

#[test]
fn oversized_handshake_header_is_rejected_with_413() {
    let address: Address = "tcp://127.0.0.1:0".parse().unwrap();
    let server_config = WebSocketConfig { max_handshake_bytes: 8192, ..Default::default() };
    let mut server = Server::bind(&address, true, server_config).expect("bind");
    let mut mux = Multiplexer::new(Duration::from_millis(20)).expect("multiplexer");
    let addr = server.local_addr().unwrap();

    let client = thread::spawn(move || {
        let mut stream = common::connect(addr);
        // 9000 bytes of header-shaped junk, no trailing CRLFCRLF, so the handshake parser
        // never sees a complete request and the byte cap is what rejects it.
        let mut request = b"GET / HTTP/1.1\r\n".to_vec();
        while request.len() < 9000 {
            request.extend_from_slice(b"X-Padding: filler-header-line\r\n");
        }
        stream.write_all(&request).unwrap();
        common::read_handshake_response(&mut stream)
    });

    let updates = common::drive_until(&mut server, &mut mux, |updates| {
        updates.iter().any(|u| matches!(u, Update::Read { kind: ReadKind::HandshakeFailure, .. }))
    });

    assert!(updates.iter().any(|u| matches!(u, Update::Read { kind: ReadKind::HandshakeFailure, .. })));
    let response = client.join().expect("client thread");
    assert!(response.starts_with("HTTP/1.1 413"));
}
