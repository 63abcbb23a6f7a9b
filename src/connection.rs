//! The per-connection protocol state machine (C3): the opening handshake, the
//! fragmentation assembler, the close handshake, and the priority write queue.
//!
//! Grounded on the teacher's `protocol::WebSocketContext` for the state-machine shape
//! (`AwaitingHandshake -> Open -> Closing* -> Closed`, the `IncompleteMessage` assembler,
//! and the rule that control frames interrupt a fragmented message without aborting it),
//! reworked from "one big `read_message` call" into the incremental,
//! budget-respecting `handle_read`/`handle_write` pair the readiness loop in the design
//! notes requires.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::time::Instant;

use crate::config::WebSocketConfig;
use crate::error::{CapacityError, Error, ProtocolError, Result};
use crate::framer::coding::{CloseCode, Control, Data, OpCode};
use crate::framer::{CloseFrame, Decoded, Frame, Framer, Utf8Bytes};
use crate::handshake;
use crate::message::{FragmentKind, IncompleteMessage, Message};
use crate::stream_container::StreamContainer;
use crate::support;
use crate::update::{ConnId, ReadKind, Update, WriteKind};

/// Where a [`Connection`] sits in the RFC 6455 connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Waiting for a complete, valid HTTP Upgrade request.
    AwaitingHandshake,
    /// The handshake completed; messages flow in both directions.
    Open,
    /// This side sent a Close frame and is waiting for the peer's.
    ClosingLocal,
    /// The peer sent a Close frame and this side's echo is still queued or in flight.
    ClosingRemote,
    /// Both directions of the close handshake have completed; the stream should be
    /// dropped.
    Closed,
}

/// An open or opening WebSocket connection wrapping one stream.
pub struct Connection<S> {
    stream: S,
    state: State,
    peer_addr: Option<SocketAddr>,
    index: usize,
    created_at: Instant,
    handshake_deadline: Instant,
    close_deadline: Option<Instant>,
    config: WebSocketConfig,
    framer: Framer,

    read_buffer: Vec<u8>,
    write_queue: VecDeque<Vec<u8>>,
    current_write: Option<(Vec<u8>, usize)>,

    fragment: Option<(FragmentKind, IncompleteMessage)>,
    close_code_sent: Option<u16>,
    close_code_received: Option<u16>,
}

impl<S> Connection<S> {
    pub fn new(stream: S, peer_addr: Option<SocketAddr>, index: usize, config: WebSocketConfig) -> Self {
        let now = Instant::now();
        let handshake_deadline = now + config.handshake_timeout;
        let framer = Framer::new(config.max_message_size);
        Connection {
            stream,
            state: State::AwaitingHandshake,
            peer_addr,
            index,
            created_at: now,
            handshake_deadline,
            close_deadline: None,
            config,
            framer,
            read_buffer: Vec::new(),
            write_queue: VecDeque::new(),
            current_write: None,
            fragment: None,
            close_code_sent: None,
            close_code_received: None,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    fn id(&self) -> ConnId {
        ConnId::Connection(self.index)
    }

    /// Queue a data message for the peer. No-op once the close handshake has started in
    /// either direction.
    pub fn send(&mut self, message: Message) -> Result<()> {
        if !matches!(self.state, State::Open) {
            return Err(Error::AlreadyClosed);
        }
        let opcode = message.opcode();
        let payload = match message {
            Message::Text(text) => text.into_bytes(),
            Message::Binary(bytes) => bytes,
            Message::Ping(bytes) | Message::Pong(bytes) => bytes,
            Message::Close(close) => return self.begin_local_close(close),
        };
        self.queue_frame(Frame::message(payload, opcode, true), opcode.is_control());
        Ok(())
    }

    /// Begin a locally-initiated close handshake with an optional code and reason.
    ///
    /// No-op once the close handshake has started in either direction (by us or by the
    /// peer), per the data model's "never transitions backward" invariant.
    pub fn begin_local_close(&mut self, close: Option<CloseFrame>) -> Result<()> {
        if matches!(self.state, State::ClosingLocal | State::ClosingRemote | State::Closed) {
            return Ok(());
        }
        let code = close.as_ref().map(|c| u16::from(c.code)).unwrap_or(u16::from(CloseCode::NORMAL));
        self.close_code_sent = Some(code);
        self.queue_frame(Frame::close(close), true);
        self.state = State::ClosingLocal;
        self.close_deadline = Some(Instant::now() + self.config.close_timeout);
        Ok(())
    }

    /// Drop this connection immediately: no Close frame is sent and any queued writes are
    /// discarded. The peer observes an abrupt TCP close rather than a clean handshake.
    pub fn hard_close(&mut self) {
        self.write_queue.clear();
        self.current_write = None;
        self.state = State::Closed;
    }

    fn queue_frame(&mut self, frame: Frame, is_control: bool) {
        let mut bytes = Vec::new();
        self.framer.encode(&frame, &mut bytes);
        if is_control {
            self.write_queue.push_front(bytes);
        } else {
            self.write_queue.push_back(bytes);
        }
    }

    fn queue_handshake_bytes(&mut self, bytes: Vec<u8>) {
        // The handshake response is not framed, but it shares the same write queue and
        // priority rules: it must go out before any data queued behind it.
        self.write_queue.push_front(bytes);
    }

    /// Fail an open connection: queue a Close frame carrying `code` and begin the local
    /// close handshake, the same as an application-requested close (§4.2 "Close code
    /// semantics"). The final `Disconnect` update follows once the peer answers or the
    /// close timeout elapses, not immediately.
    fn fail(&mut self, code: CloseCode) {
        if matches!(self.state, State::Open) {
            let _ = self.begin_local_close(Some(CloseFrame { code, reason: Default::default() }));
        } else {
            self.state = State::Closed;
        }
    }

    fn handle_control_frame(&mut self, frame: Frame, updates: &mut Vec<Update>) -> Result<()> {
        match frame.opcode() {
            OpCode::Control(Control::Ping) => {
                self.queue_frame(Frame::pong(frame.payload().to_vec()), true);
                updates.push(Update::read(ReadKind::Message(Message::Ping(frame.into_payload())), self.id()));
            }
            OpCode::Control(Control::Pong) => {
                updates.push(Update::read(ReadKind::Message(Message::Pong(frame.into_payload())), self.id()));
            }
            OpCode::Control(Control::Close) => {
                let close = Frame::parse_close_payload(frame.payload())?;
                if let Some(CloseFrame { code, .. }) = &close {
                    if !code.is_allowed() {
                        return Err(Error::Protocol(ProtocolError::InvalidCloseCode(u16::from(*code))));
                    }
                }
                self.close_code_received = close.as_ref().map(|c| u16::from(c.code));
                let already_sent = self.close_code_sent.is_some();
                if !already_sent {
                    // Echo carries 1000 (not the peer's own code) unless the peer sent no
                    // payload at all, in which case the echo is likewise bodiless.
                    let echo = close
                        .as_ref()
                        .map(|_| CloseFrame { code: CloseCode::NORMAL, reason: Utf8Bytes::default() });
                    self.close_code_sent = echo.as_ref().map(|c| u16::from(c.code));
                    self.queue_frame(Frame::close(echo), true);
                    self.state = State::ClosingRemote;
                } else {
                    // We already sent our own Close; the peer's is the answer completing
                    // the handshake we started.
                    self.state = State::Closed;
                    updates.push(Update::read(ReadKind::Disconnect, self.id()));
                }
                updates.push(Update::read(ReadKind::Message(Message::Close(close)), self.id()));
            }
            _ => unreachable!("not a control opcode"),
        }
        Ok(())
    }

    fn handle_data_frame(&mut self, frame: Frame, updates: &mut Vec<Update>) -> Result<()> {
        let is_final = frame.is_final();
        match frame.opcode() {
            OpCode::Data(Data::Continue) => {
                let Some((_, incomplete)) = self.fragment.as_mut() else {
                    return Err(Error::Protocol(ProtocolError::UnexpectedContinuationFrame));
                };
                incomplete.extend(frame.payload())?;
                if is_final {
                    let (_, incomplete) = self.fragment.take().unwrap();
                    let message = incomplete.finish()?;
                    updates.push(Update::read(ReadKind::Message(message), self.id()));
                }
            }
            OpCode::Data(Data::Text) | OpCode::Data(Data::Binary) => {
                if self.fragment.is_some() {
                    return Err(Error::Protocol(ProtocolError::ExpectedContinuationFrame));
                }
                let kind = if frame.opcode() == OpCode::Data(Data::Text) {
                    FragmentKind::Text
                } else {
                    FragmentKind::Binary
                };
                if is_final {
                    if frame.payload().is_empty() {
                        updates.push(Update::read(ReadKind::ReadEmptyFrame, self.id()));
                        return Ok(());
                    }
                    let mut incomplete = IncompleteMessage::new(kind, self.config.max_message_size);
                    incomplete.extend(frame.payload())?;
                    let message = incomplete.finish()?;
                    updates.push(Update::read(ReadKind::Message(message), self.id()));
                } else {
                    let mut incomplete = IncompleteMessage::new(kind, self.config.max_message_size);
                    incomplete.extend(frame.payload())?;
                    self.fragment = Some((kind, incomplete));
                }
            }
            OpCode::Data(Data::Reserved(b)) => return Err(Error::Protocol(ProtocolError::InvalidOpcode(b))),
            OpCode::Control(_) => unreachable!("not a data opcode"),
        }
        Ok(())
    }

    fn process_handshake(&mut self, updates: &mut Vec<Update>) -> Result<()> {
        if self.read_buffer.len() > self.config.max_handshake_bytes {
            let page = support::error_page(413, "handshake header too large", &self.config.server_identifier);
            self.queue_handshake_bytes(page);
            self.state = State::Closed;
            updates.push(Update::read(ReadKind::HandshakeFailure, self.id()));
            return Ok(());
        }

        match handshake::try_parse(&self.read_buffer) {
            Ok(None) => Ok(()),
            Ok(Some((consumed, _request))) => {
                let accept = handshake::accept_key_for_request(&self.read_buffer[..consumed])
                    .expect("try_parse already validated Sec-WebSocket-Key");
                let response = handshake::build_response(&accept, &self.config.server_identifier);
                self.read_buffer.drain(..consumed);
                self.queue_handshake_bytes(response);
                self.state = State::Open;
                updates.push(Update::read(ReadKind::NewConnection, self.id()));
                Ok(())
            }
            Err(Error::Protocol(ProtocolError::Handshake(_))) => {
                let page = support::error_page(400, "malformed handshake request", &self.config.server_identifier);
                self.queue_handshake_bytes(page);
                self.state = State::Closed;
                updates.push(Update::read(ReadKind::HandshakeFailure, self.id()));
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Drive whatever is sitting in `read_buffer` as far as it will go: the handshake
    /// parser if one is still pending, then the frame decoder on whatever is left once it
    /// completes. A single `read()` can return the tail of the handshake and the start of
    /// the first frame in one chunk, so `process_handshake` completing mid-call must fall
    /// straight through into `process_frames` in the same call rather than waiting for a
    /// `read()` that, under edge-triggered readiness, may never come again on its own.
    fn process_buffered(&mut self, updates: &mut Vec<Update>) -> Result<()> {
        if self.state == State::AwaitingHandshake {
            self.process_handshake(updates)?;
        }
        if matches!(self.state, State::Open | State::ClosingLocal) {
            self.process_frames(updates)?;
        }
        Ok(())
    }

    fn process_frames(&mut self, updates: &mut Vec<Update>) -> Result<()> {
        loop {
            if !matches!(self.state, State::Open | State::ClosingLocal) {
                return Ok(());
            }
            match self.framer.decode(&self.read_buffer)? {
                Decoded::NeedMore => return Ok(()),
                Decoded::Frame { frame, consumed } => {
                    self.read_buffer.drain(..consumed);
                    if frame.opcode().is_control() {
                        self.handle_control_frame(frame, updates)?;
                    } else {
                        self.handle_data_frame(frame, updates)?;
                    }
                }
            }
        }
    }

    /// Timed out waiting for the handshake; called by `before_stream_select` once the
    /// deadline has passed.
    fn handshake_timed_out(&self) -> bool {
        self.state == State::AwaitingHandshake && Instant::now() >= self.handshake_deadline
    }

    /// Timed out waiting for the peer's answering Close while we're `ClosingLocal`.
    fn close_timed_out(&self) -> bool {
        self.state == State::ClosingLocal
            && self.close_deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }
}

impl<S: Read + Write + mio::event::Source> StreamContainer for Connection<S> {
    type Stream = S;

    fn get_stream(&mut self) -> &mut S {
        &mut self.stream
    }

    fn is_write_buffer_empty(&self) -> bool {
        self.current_write.is_none() && self.write_queue.is_empty()
    }

    fn before_stream_select(&mut self) -> Vec<Update> {
        if self.handshake_timed_out() {
            self.state = State::Closed;
            return vec![Update::read(ReadKind::HandshakeTimeout, self.id())];
        }
        if self.close_timed_out() {
            self.state = State::Closed;
            return vec![Update::read(ReadKind::Disconnect, self.id())];
        }
        Vec::new()
    }

    fn handle_read(&mut self) -> Vec<Update> {
        let mut updates = Vec::new();
        let mut budget = self.config.per_tick_byte_budget;
        let mut scratch = [0u8; 4096];

        while budget > 0 {
            let want = budget.min(scratch.len());
            match self.stream.read(&mut scratch[..want]) {
                Ok(0) => {
                    self.state = State::Closed;
                    updates.push(Update::read(ReadKind::SockDisconnect, self.id()));
                    return updates;
                }
                Ok(n) => {
                    self.read_buffer.extend_from_slice(&scratch[..n]);
                    budget = budget.saturating_sub(n);
                }
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => break,
                Err(err) => {
                    self.state = State::Closed;
                    updates.push(Update::read(ReadKind::SockDisconnect, self.id()));
                    let _ = err;
                    return updates;
                }
            }

            if let Err(err) = self.process_buffered(&mut updates) {
                let code = match &err {
                    Error::Protocol(ProtocolError::InvalidUtf8) => CloseCode::INVALID,
                    Error::Protocol(ProtocolError::InvalidCloseCode(_)) => CloseCode::PROTOCOL,
                    Error::Capacity(CapacityError::MessageTooLong { .. }) => CloseCode::SIZE,
                    _ => CloseCode::PROTOCOL,
                };
                self.fail(code);
                return updates;
            }
            if matches!(self.state, State::Closed) {
                break;
            }
        }
        updates
    }

    fn handle_write(&mut self) -> Vec<Update> {
        let mut updates = Vec::new();
        let mut budget = self.config.per_tick_byte_budget;

        loop {
            if self.current_write.is_none() {
                match self.write_queue.pop_front() {
                    Some(bytes) => self.current_write = Some((bytes, 0)),
                    None => break,
                }
            }
            let (bytes, offset) = self.current_write.as_mut().unwrap();
            if *offset >= bytes.len() {
                self.current_write = None;
                continue;
            }
            let remaining = &bytes[*offset..];
            let want = remaining.len().min(budget.max(1));
            match self.stream.write(&remaining[..want]) {
                Ok(0) => {
                    self.state = State::Closed;
                    updates.push(Update::write(WriteKind::WriteFailed, self.id()));
                    return updates;
                }
                Ok(n) => {
                    *offset += n;
                    budget = budget.saturating_sub(n);
                    if budget == 0 {
                        break;
                    }
                }
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => break,
                Err(_) => {
                    self.state = State::Closed;
                    updates.push(Update::write(WriteKind::WriteFailed, self.id()));
                    return updates;
                }
            }
        }

        if self.is_write_buffer_empty() {
            updates.push(Update::write(WriteKind::WriteCompleted, self.id()));
            // Our echoed Close just finished flushing; the close handshake this side
            // answered is now complete.
            if self.state == State::ClosingRemote {
                self.state = State::Closed;
                updates.push(Update::read(ReadKind::Disconnect, self.id()));
            }
        }
        updates
    }

    fn handle_exceptional(&mut self) -> Vec<Update> {
        self.state = State::Closed;
        vec![Update::read(ReadKind::SockDisconnect, self.id())]
    }

    fn is_finished(&self) -> bool {
        self.state == State::Closed && self.is_write_buffer_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framer::coding::{Data, OpCode};
    use std::io::Cursor;

    fn config() -> WebSocketConfig {
        WebSocketConfig { handshake_timeout: std::time::Duration::from_secs(5), ..Default::default() }
    }

    #[test]
    fn rejects_continuation_with_no_fragment_in_progress() {
        let mut conn = Connection::new(Cursor::new(Vec::<u8>::new()), None, 0, config());
        conn.state = State::Open;
        let frame = Frame::message(b"oops".to_vec(), OpCode::Data(Data::Continue), true);
        let mut updates = Vec::new();
        let err = conn.handle_data_frame(frame, &mut updates).unwrap_err();
        assert!(matches!(err, Error::Protocol(ProtocolError::UnexpectedContinuationFrame)));
    }

    #[test]
    fn rejects_new_message_mid_fragment() {
        let mut conn = Connection::new(Cursor::new(Vec::<u8>::new()), None, 0, config());
        conn.state = State::Open;
        let mut updates = Vec::new();
        let first = Frame::message(b"partial".to_vec(), OpCode::Data(Data::Text), false);
        conn.handle_data_frame(first, &mut updates).unwrap();
        let second = Frame::message(b"oops".to_vec(), OpCode::Data(Data::Binary), true);
        let err = conn.handle_data_frame(second, &mut updates).unwrap_err();
        assert!(matches!(err, Error::Protocol(ProtocolError::ExpectedContinuationFrame)));
    }

    #[test]
    fn fragment_assembles_across_continuations() {
        let mut conn = Connection::new(Cursor::new(Vec::<u8>::new()), None, 0, config());
        conn.state = State::Open;
        let mut updates = Vec::new();
        conn.handle_data_frame(Frame::message(b"Hello, ".to_vec(), OpCode::Data(Data::Text), false), &mut updates)
            .unwrap();
        conn.handle_data_frame(Frame::message(b"world!".to_vec(), OpCode::Data(Data::Continue), true), &mut updates)
            .unwrap();
        assert_eq!(updates.len(), 1);
        match &updates[0] {
            Update::Read { kind: ReadKind::Message(Message::Text(text)), .. } => {
                assert_eq!(text.as_str(), "Hello, world!");
            }
            other => panic!("unexpected update: {other:?}"),
        }
    }

    #[test]
    fn ping_is_answered_with_pong_and_surfaced() {
        let mut conn = Connection::new(Cursor::new(Vec::<u8>::new()), None, 0, config());
        conn.state = State::Open;
        let mut updates = Vec::new();
        conn.handle_control_frame(Frame::ping(b"hi".to_vec()), &mut updates).unwrap();
        assert_eq!(conn.write_queue.len(), 1);
        assert!(matches!(updates[0], Update::Read { kind: ReadKind::Message(Message::Ping(_)), .. }));
    }

    #[test]
    fn close_with_invalid_code_is_rejected() {
        let mut conn = Connection::new(Cursor::new(Vec::<u8>::new()), None, 0, config());
        conn.state = State::Open;
        let mut updates = Vec::new();
        let close = Frame::close(Some(CloseFrame { code: CloseCode(1005), reason: Default::default() }));
        let err = conn.handle_control_frame(close, &mut updates).unwrap_err();
        assert!(matches!(err, Error::Protocol(ProtocolError::InvalidCloseCode(1005))));
    }

    #[test]
    fn close_echoes_normal_code_and_transitions_to_closing_remote() {
        let mut conn = Connection::new(Cursor::new(Vec::<u8>::new()), None, 0, config());
        conn.state = State::Open;
        let mut updates = Vec::new();
        let close = Frame::close(Some(CloseFrame { code: CloseCode::NORMAL, reason: Default::default() }));
        conn.handle_control_frame(close, &mut updates).unwrap();
        assert_eq!(conn.state, State::ClosingRemote);
        assert_eq!(conn.close_code_sent, Some(1000));
    }
}
