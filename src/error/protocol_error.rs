use std::fmt;

/// The specific kind of RFC 6455 protocol violation detected.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ProtocolError {
    /// Reserved bits in the frame header are non-zero without a negotiated extension.
    NonZeroReservedBits,
    /// The server received an unmasked frame from a client.
    UnmaskedFrameFromClient,
    /// Control frames must not be fragmented.
    FragmentedControlFrame,
    /// Control frames must carry 125 bytes of payload or less.
    ControlFrameTooBig,
    /// Encountered an opcode outside the range defined by RFC 6455.
    InvalidOpcode(u8),
    /// Received a Continuation frame with no message in progress.
    UnexpectedContinuationFrame,
    /// Received a new Text/Binary frame while a fragmented message was in progress.
    ExpectedContinuationFrame,
    /// A frame's declared payload length does not fit a signed 64-bit integer.
    InvalidLength,
    /// The payload of a Close frame is 1 byte (a close code needs at least 2).
    InvalidCloseSequence,
    /// The close code carried by a Close frame is not one a peer may send.
    InvalidCloseCode(u16),
    /// A Text message payload, or a Close reason, was not valid UTF-8.
    InvalidUtf8,
    /// Something is wrong with the opening handshake.
    Handshake(HandshakeError),
}

/// The specific way an opening handshake failed to meet RFC 6455 §4.2.1.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum HandshakeError {
    /// The request line did not use the `GET` method.
    WrongHttpMethod,
    /// The request used HTTP/1.0 or older.
    WrongHttpVersion,
    /// `Connection` header missing or did not contain `Upgrade`.
    MissingConnectionUpgrade,
    /// `Upgrade` header missing or not `websocket`.
    MissingUpgradeWebSocket,
    /// `Sec-WebSocket-Version` header missing or not `13`.
    MissingOrBadVersion,
    /// `Sec-WebSocket-Key` header missing, or not 16 bytes once base64-decoded.
    MissingOrBadKey,
    /// The request's header block exceeded the configured byte cap.
    HeaderTooLarge,
    /// `httparse` could not parse the request at all.
    MalformedRequest,
    /// Bytes followed the request's trailing CRLFCRLF before the handshake was replied to.
    JunkAfterRequest,
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::NonZeroReservedBits => write!(f, "reserved bits are non-zero"),
            ProtocolError::UnmaskedFrameFromClient => write!(f, "received an unmasked frame from a client"),
            ProtocolError::FragmentedControlFrame => write!(f, "control frames must not be fragmented"),
            ProtocolError::ControlFrameTooBig => write!(f, "control frame payload exceeds 125 bytes"),
            ProtocolError::InvalidOpcode(op) => write!(f, "invalid opcode: {op}"),
            ProtocolError::UnexpectedContinuationFrame => {
                write!(f, "continuation frame received with no message in progress")
            }
            ProtocolError::ExpectedContinuationFrame => {
                write!(f, "new message received while a fragmented message was in progress")
            }
            ProtocolError::InvalidLength => write!(f, "payload length exceeds i64::MAX"),
            ProtocolError::InvalidCloseSequence => write!(f, "close frame payload is too short to carry a code"),
            ProtocolError::InvalidCloseCode(code) => write!(f, "invalid close code: {code}"),
            ProtocolError::InvalidUtf8 => write!(f, "payload is not valid UTF-8"),
            ProtocolError::Handshake(err) => write!(f, "handshake error: {err}"),
        }
    }
}

impl fmt::Display for HandshakeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            HandshakeError::WrongHttpMethod => "method is not GET",
            HandshakeError::WrongHttpVersion => "HTTP version must be 1.1 or higher",
            HandshakeError::MissingConnectionUpgrade => "missing `Connection: Upgrade` header",
            HandshakeError::MissingUpgradeWebSocket => "missing `Upgrade: websocket` header",
            HandshakeError::MissingOrBadVersion => "missing or unsupported Sec-WebSocket-Version",
            HandshakeError::MissingOrBadKey => "missing or malformed Sec-WebSocket-Key",
            HandshakeError::HeaderTooLarge => "request header exceeded the byte cap",
            HandshakeError::MalformedRequest => "malformed HTTP request",
            HandshakeError::JunkAfterRequest => "junk data after client request",
        };
        f.write_str(text)
    }
}

impl std::error::Error for ProtocolError {}
impl std::error::Error for HandshakeError {}
