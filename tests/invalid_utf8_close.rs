//! Scenario 4 from the design notes: a Text frame carrying invalid UTF-8 triggers a local
//! Close(1007); since this test client never echoes a Close back, the connection finishes
//! via the `ClosingLocal` close-timeout path rather than a peer-answered one.

mod common;

use std::thread;
use std::time::Duration;

use wsreactor::config::WebSocketConfig;
use wsreactor::framer::coding::{Data, OpCode};
use wsreactor::server::Address;
use wsreactor::update::ReadKind;
use wsreactor::{Multiplexer, Server, Update};

#[test]
fn invalid_utf8_in_text_frame_closes_with_1007() {
    let address: Address = "tcp://127.0.0.1:0".parse().unwrap();
    let config = WebSocketConfig { close_timeout: Duration::from_millis(200), ..Default::default() };
    let mut server = Server::bind(&address, true, config).expect("bind");
    let mut mux = Multiplexer::new(Duration::from_millis(20)).expect("multiplexer");
    let addr = server.local_addr().unwrap();

    thread::spawn(move || {
        let mut stream = common::connect(addr);
        common::send_handshake(&mut stream, "/", common::TEST_KEY);
        common::read_handshake_response(&mut stream);
        common::send_frame(&mut stream, vec![0xFF, 0xFE], OpCode::Data(Data::Text));
        let code = common::expect_close(&mut stream);
        assert_eq!(code, 1007);
        stream
    });

    let updates = common::drive_until(&mut server, &mut mux, |updates| {
        updates.iter().any(|u| matches!(u, Update::Read { kind: ReadKind::Disconnect, .. }))
    });

    assert!(updates.iter().any(|u| matches!(u, Update::Read { kind: ReadKind::Disconnect, .. })));
}
