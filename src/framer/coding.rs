//! Opcodes and close codes as defined by RFC 6455.

use std::fmt;

/// WebSocket message opcode as in RFC 6455.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum OpCode {
    /// Opcodes that carry message data.
    Data(Data),
    /// Opcodes that carry control signals.
    Control(Control),
}

/// Data opcodes as in RFC 6455.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Data {
    /// 0x0 denotes a continuation frame.
    Continue,
    /// 0x1 denotes a text data frame.
    Text,
    /// 0x2 denotes a binary data frame.
    Binary,
    /// 0x3-7 are reserved for further non-control frames.
    Reserved(u8),
}

/// Control opcodes as in RFC 6455.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Control {
    /// 0x8 denotes a connection close.
    Close,
    /// 0x9 denotes a ping.
    Ping,
    /// 0xa denotes a pong.
    Pong,
    /// 0xb-f are reserved for further control frames.
    Reserved(u8),
}

impl OpCode {
    /// Is this an opcode for a control frame?
    pub fn is_control(self) -> bool {
        matches!(self, OpCode::Control(_))
    }
}

impl From<u8> for OpCode {
    fn from(byte: u8) -> OpCode {
        use self::{Control::*, Data::*, OpCode::*};
        match byte {
            0 => Data(Continue),
            1 => Data(Text),
            2 => Data(Binary),
            3..=7 => Data(Reserved(byte)),
            8 => Control(Close),
            9 => Control(Ping),
            10 => Control(Pong),
            11..=15 => Control(Reserved(byte)),
            _ => unreachable!("Bug: opcode out of nibble range"),
        }
    }
}

impl From<OpCode> for u8 {
    fn from(opcode: OpCode) -> u8 {
        use self::{Control::*, Data::*, OpCode::*};
        match opcode {
            Data(Continue) => 0,
            Data(Text) => 1,
            Data(Binary) => 2,
            Data(Reserved(byte)) => byte,
            Control(Close) => 8,
            Control(Ping) => 9,
            Control(Pong) => 10,
            Control(Reserved(byte)) => byte,
        }
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use self::{Control::*, Data::*, OpCode::*};
        write!(
            f,
            "{}",
            match *self {
                Data(Continue) => "CONTINUE",
                Data(Text) => "TEXT",
                Data(Binary) => "BINARY",
                Data(Reserved(_)) => "RESERVED_DATA",
                Control(Close) => "CLOSE",
                Control(Ping) => "PING",
                Control(Pong) => "PONG",
                Control(Reserved(_)) => "RESERVED_CONTROL",
            }
        )
    }
}

/// Status code used to indicate why an endpoint is closing the WebSocket connection.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct CloseCode(pub u16);

impl CloseCode {
    /// Normal closure; the purpose for which the connection was established has been fulfilled.
    pub const NORMAL: CloseCode = CloseCode(1000);
    /// The endpoint is going away, e.g. server shutdown or browser navigation.
    pub const AWAY: CloseCode = CloseCode(1001);
    /// The endpoint is terminating the connection due to a protocol error.
    pub const PROTOCOL: CloseCode = CloseCode(1002);
    /// The connection is being terminated because the endpoint received data of a type it
    /// cannot accept.
    pub const UNSUPPORTED: CloseCode = CloseCode(1003);
    /// Reserved: a close frame must not actually carry this code (no status was received).
    pub const NO_STATUS_RECEIVED: CloseCode = CloseCode(1005);
    /// Reserved: a close frame must not actually carry this code (abnormal closure).
    pub const ABNORMAL: CloseCode = CloseCode(1006);
    /// Indicates that an endpoint received data within a message that was not consistent
    /// with the type of the message (e.g. non-UTF-8 data within a text message).
    pub const INVALID: CloseCode = CloseCode(1007);
    /// A generic code for when a message violates the receiver's policy.
    pub const POLICY: CloseCode = CloseCode(1008);
    /// A message was too big for the receiver to process.
    pub const SIZE: CloseCode = CloseCode(1009);
    /// The client is terminating because it expected the server to negotiate an extension.
    pub const EXTENSION: CloseCode = CloseCode(1010);
    /// The server encountered an unexpected condition that prevented it from fulfilling
    /// the request.
    pub const ERROR: CloseCode = CloseCode(1011);
    /// Reserved: a close frame must not actually carry this code (TLS handshake failure).
    pub const TLS: CloseCode = CloseCode(1015);

    /// Returns `true` for codes a peer is allowed to send on the wire (i.e. not one of the
    /// reserved "pseudo" codes that only ever appear in an API, never in a frame).
    pub fn is_allowed(self) -> bool {
        match self.0 {
            1000..=1003 | 1007..=1011 => true,
            3000..=4999 => true,
            _ => false,
        }
    }
}

impl From<u16> for CloseCode {
    fn from(code: u16) -> CloseCode {
        CloseCode(code)
    }
}

impl From<CloseCode> for u16 {
    fn from(code: CloseCode) -> u16 {
        code.0
    }
}

impl fmt::Display for CloseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allowed_codes() {
        assert!(CloseCode::NORMAL.is_allowed());
        assert!(CloseCode(3000).is_allowed());
        assert!(CloseCode(4999).is_allowed());
        assert!(!CloseCode::NO_STATUS_RECEIVED.is_allowed());
        assert!(!CloseCode::ABNORMAL.is_allowed());
        assert!(!CloseCode::TLS.is_allowed());
        assert!(!CloseCode(1004).is_allowed());
        assert!(!CloseCode(2999).is_allowed());
        assert!(!CloseCode(5000).is_allowed());
    }

    #[test]
    fn opcode_roundtrip() {
        for byte in 0u8..16 {
            let op = OpCode::from(byte);
            assert_eq!(u8::from(op), byte);
        }
    }
}
