//! Scenarios 2 and 3 from the design notes: a fragmented binary message assembled across
//! Continuation frames, and a Ping interleaved mid-fragment answered with a Pong before any
//! further data frame is observed.

mod common;

use std::thread;
use std::time::Duration;

use wsreactor::config::WebSocketConfig;
use wsreactor::framer::coding::{Control, Data, OpCode};
use wsreactor::message::Message;
use wsreactor::server::Address;
use wsreactor::update::ReadKind;
use wsreactor::{Multiplexer, Server, Update};

fn bind_loopback() -> (Server, Multiplexer) {
    let address: Address = "tcp://127.0.0.1:0".parse().unwrap();
    let server = Server::bind(&address, true, WebSocketConfig::default()).expect("bind");
    let mux = Multiplexer::new(Duration::from_millis(20)).expect("multiplexer");
    (server, mux)
}

#[test]
fn assembles_a_fragmented_binary_message() {
    let (mut server, mut mux) = bind_loopback();
    let addr = server.local_addr().unwrap();

    thread::spawn(move || {
        let mut stream = common::connect(addr);
        common::send_handshake(&mut stream, "/", common::TEST_KEY);
        common::read_handshake_response(&mut stream);
        common::send_frame(&mut stream, b"abc".to_vec(), OpCode::Data(Data::Binary));
        // fin=0 continuation frames need building by hand since `send_frame` always sets fin=1.
        let mut frame = wsreactor::framer::Frame::message(b"def".to_vec(), OpCode::Data(Data::Continue), false);
        frame.mask();
        let mut bytes = Vec::new();
        use std::io::Write;
        frame.format(&mut bytes).unwrap();
        stream.write_all(&bytes).unwrap();
        common::send_frame(&mut stream, b"ghi".to_vec(), OpCode::Data(Data::Continue));
        stream
    });

    let updates = common::drive_until(&mut server, &mut mux, |updates| {
        updates.iter().any(|u| matches!(u, Update::Read { kind: ReadKind::Message(Message::Binary(_)), .. }))
    });

    let payload = updates
        .iter()
        .find_map(|u| match u {
            Update::Read { kind: ReadKind::Message(Message::Binary(bytes)), .. } => Some(bytes.clone()),
            _ => None,
        })
        .expect("a Binary message update");
    assert_eq!(payload, b"abcdefghi");
}

#[test]
fn ping_mid_fragment_is_answered_without_disturbing_the_fragment() {
    let (mut server, mut mux) = bind_loopback();
    let addr = server.local_addr().unwrap();

    thread::spawn(move || {
        let mut stream = common::connect(addr);
        common::send_handshake(&mut stream, "/", common::TEST_KEY);
        common::read_handshake_response(&mut stream);
        let mut frame = wsreactor::framer::Frame::message(b"abc".to_vec(), OpCode::Data(Data::Binary), false);
        frame.mask();
        let mut bytes = Vec::new();
        use std::io::Write;
        frame.format(&mut bytes).unwrap();
        stream.write_all(&bytes).unwrap();

        common::send_frame(&mut stream, b"p".to_vec(), OpCode::Control(Control::Ping));

        let (opcode, payload) = common::read_frame(&mut stream);
        assert_eq!(opcode, OpCode::Control(Control::Pong));
        assert_eq!(payload, b"p");

        common::send_frame(&mut stream, b"ghi".to_vec(), OpCode::Data(Data::Continue));
        stream
    });

    let updates = common::drive_until(&mut server, &mut mux, |updates| {
        updates.iter().any(|u| matches!(u, Update::Read { kind: ReadKind::Message(Message::Binary(_)), .. }))
    });

    let payload = updates
        .iter()
        .find_map(|u| match u {
            Update::Read { kind: ReadKind::Message(Message::Binary(bytes)), .. } => Some(bytes.clone()),
            _ => None,
        })
        .expect("a Binary message update");
    assert_eq!(payload, b"abcghi");

    let saw_ping = updates.iter().any(|u| matches!(u, Update::Read { kind: ReadKind::Message(Message::Ping(_)), .. }));
    assert!(saw_ping, "the Ping should also be surfaced as its own update");
}
