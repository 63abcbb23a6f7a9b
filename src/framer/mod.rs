//! The frame codec (C1): encode/decode RFC 6455 frames, masking, and validation.
//!
//! The [`Framer`] is deliberately stateless apart from the in-progress header it may be
//! parsing across ticks — the byte buffers themselves belong to
//! [`crate::connection::Connection`], per the data model in the design notes. This mirrors
//! how the teacher splits `FrameCodec` (buffering) from `FrameHeader`/`Frame` (pure codec),
//! except the buffer ownership is pushed up one level so the readiness loop never needs to
//! reach into a private codec to check how much is pending.

pub mod coding;
#[allow(clippy::module_inception)]
mod frame;
mod mask;
mod utf8;

pub use frame::{CloseFrame, Frame, FrameHeader, MAX_HEADER_SIZE};
pub use utf8::{StringCollector, Utf8Bytes};

use crate::error::{Error, ProtocolError, Result};

/// Outcome of attempting to decode one frame from a byte buffer.
#[derive(Debug)]
pub enum Decoded {
    /// Not enough bytes yet; the caller should read more from the stream.
    NeedMore,
    /// A complete frame was decoded, consuming `consumed` bytes from the front of the buffer.
    Frame { frame: Frame, consumed: usize },
}

/// Stateless decode/encode operations plus the validation RFC 6455 requires of a server.
#[derive(Debug, Default)]
pub struct Framer {
    max_message_size: Option<usize>,
}

impl Framer {
    pub fn new(max_message_size: Option<usize>) -> Self {
        Framer { max_message_size }
    }

    /// Attempt to decode a single frame from the front of `buf`.
    ///
    /// Performs the validation common to every server-received frame: reserved bits must
    /// be zero, the frame must be masked, control frames must be final and short. Does
    /// *not* perform fragmentation-sequence or UTF-8 validation — those require message
    /// level state the codec does not own (see [`crate::connection::Connection`]).
    pub fn decode(&self, buf: &[u8]) -> Result<Decoded> {
        let Some((header, length, header_len)) = FrameHeader::parse(buf)? else {
            return Ok(Decoded::NeedMore);
        };

        if header.rsv1 || header.rsv2 || header.rsv3 {
            return Err(Error::Protocol(ProtocolError::NonZeroReservedBits));
        }
        if header.mask.is_none() {
            return Err(Error::Protocol(ProtocolError::UnmaskedFrameFromClient));
        }
        if header.opcode.is_control() && length > 125 {
            return Err(Error::Protocol(ProtocolError::ControlFrameTooBig));
        }
        if let Some(max) = self.max_message_size {
            if length as usize > max {
                return Err(Error::Capacity(crate::error::CapacityError::MessageTooLong {
                    size: length as usize,
                    max_size: max,
                }));
            }
        }

        let total = header_len + length as usize;
        if buf.len() < total {
            return Ok(Decoded::NeedMore);
        }

        let mut payload = buf[header_len..total].to_vec();
        if let Some(mask) = header.mask {
            mask::apply_mask(&mut payload, mask);
        }
        let mut frame = Frame::from_header_and_payload(header, payload);
        frame.clear_mask_flag();

        Ok(Decoded::Frame { frame, consumed: total })
    }

    /// Encode a server-originated frame (never masked, per RFC 6455 §5.1) into `out`.
    pub fn encode(&self, frame: &Frame, out: &mut Vec<u8>) {
        frame.format(out).expect("writing to a Vec never fails");
    }
}
