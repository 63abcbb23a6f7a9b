//! The message a host sends or receives: one or more frames sharing an opcode, as defined
//! in the glossary. Fragmentation is invisible at this layer — see
//! [`crate::connection::Connection`] for the assembler.

use crate::error::{Error, ProtocolError, Result};
use crate::framer::{coding::OpCode, CloseFrame, StringCollector, Utf8Bytes};

/// A complete WebSocket message, as surfaced to or accepted from the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// A UTF-8 text message.
    Text(Utf8Bytes),
    /// An opaque binary message.
    Binary(Vec<u8>),
    /// A ping, surfaced to the host for visibility; the Connection has already queued the
    /// matching pong by the time this is observed.
    Ping(Vec<u8>),
    /// A pong, either unsolicited or in answer to a ping this side sent.
    Pong(Vec<u8>),
    /// The peer's close frame.
    Close(Option<CloseFrame>),
}

impl Message {
    pub fn opcode(&self) -> OpCode {
        use crate::framer::coding::{Control, Data};
        match self {
            Message::Text(_) => OpCode::Data(Data::Text),
            Message::Binary(_) => OpCode::Data(Data::Binary),
            Message::Ping(_) => OpCode::Control(Control::Ping),
            Message::Pong(_) => OpCode::Control(Control::Pong),
            Message::Close(_) => OpCode::Control(Control::Close),
        }
    }
}

/// The opcode of an in-progress fragmented message, carried across frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentKind {
    Text,
    Binary,
}

/// Accumulates the payload of a fragmented Text/Binary message across Continuation frames.
///
/// `fragment_opcode = None` iff no bytes have been accumulated yet — the invariant from the
/// data model is upheld by only ever constructing this once the first fragment arrives and
/// consuming it (`finish`) exactly when the final frame arrives. Tracks the running total
/// against `max_size` itself: the per-frame cap in [`crate::framer::Framer::decode`] only
/// catches one oversized frame, not many small frames adding up across continuations.
#[derive(Debug)]
pub struct IncompleteMessage {
    max_size: Option<usize>,
    len: usize,
    body: IncompleteBody,
}

#[derive(Debug)]
enum IncompleteBody {
    Text(StringCollector),
    Binary(Vec<u8>),
}

impl IncompleteMessage {
    pub fn new(kind: FragmentKind, max_size: Option<usize>) -> Self {
        let body = match kind {
            FragmentKind::Text => IncompleteBody::Text(StringCollector::new()),
            FragmentKind::Binary => IncompleteBody::Binary(Vec::new()),
        };
        IncompleteMessage { max_size, len: 0, body }
    }

    pub fn kind(&self) -> FragmentKind {
        match &self.body {
            IncompleteBody::Text(_) => FragmentKind::Text,
            IncompleteBody::Binary(_) => FragmentKind::Binary,
        }
    }

    pub fn extend(&mut self, data: &[u8]) -> Result<()> {
        self.len += data.len();
        if let Some(max_size) = self.max_size {
            if self.len > max_size {
                return Err(Error::Capacity(crate::error::CapacityError::MessageTooLong {
                    size: self.len,
                    max_size,
                }));
            }
        }
        match &mut self.body {
            IncompleteBody::Binary(buf) => {
                buf.extend_from_slice(data);
                Ok(())
            }
            IncompleteBody::Text(collector) => {
                collector.extend(data).map_err(|_| Error::Protocol(ProtocolError::InvalidUtf8))
            }
        }
    }

    pub fn finish(self) -> Result<Message> {
        match self.body {
            IncompleteBody::Binary(buf) => Ok(Message::Binary(buf)),
            IncompleteBody::Text(collector) => {
                let text = collector.finish().map_err(|_| Error::Protocol(ProtocolError::InvalidUtf8))?;
                Ok(Message::Text(Utf8Bytes::try_from(text.into_bytes()).expect("already validated")))
            }
        }
    }
}
