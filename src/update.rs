//! The Update taxonomy (C7): events the [`crate::multiplexer::Multiplexer`] surfaces to
//! the host. See §3 of the design notes for the full variant list.

use crate::message::Message;

/// A handle identifying which connection (or the accepting endpoint) an [`Update`]
/// concerns. Modeled as a typed index rather than a trait-object downcast, per the design
/// notes' guidance on "dynamic typing in Update payloads".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnId {
    /// The listening endpoint itself.
    Accepting,
    /// A connection registered under this index in the owning [`crate::server::Server`].
    Connection(usize),
}

/// The kind of read-side event carried by [`Update::Read`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadKind {
    /// The accepting endpoint is readable but `auto_accept` is disabled; the host must
    /// call [`crate::server::Server::accept_new_connection`].
    NewTcpConnectionAvailable,
    /// A new TCP/UNIX connection was accepted automatically and now awaits its handshake.
    NewTcpConnection,
    /// The opening handshake completed; the connection is now `Open`.
    NewConnection,
    /// A complete message is available.
    Message(Message),
    /// The close handshake finished; the connection is `Closed`.
    Disconnect,
    /// A data frame with an empty payload was read (distinguished from `Disconnect`
    /// because it is not a peer hangup, merely a zero-length message).
    ReadEmptyFrame,
    /// The underlying socket was reset or hit EOF outside of a close handshake.
    SockDisconnect,
    /// The opening handshake was malformed; an HTTP error page has been queued.
    HandshakeFailure,
    /// The opening handshake did not complete within the deadline.
    HandshakeTimeout,
}

/// The kind of write-side event carried by [`Update::Write`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    /// The pending write queue was fully flushed.
    WriteCompleted,
    /// A write failed; the connection has been closed.
    WriteFailed,
}

/// The kind of loop-level error carried by [`Update::Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The readiness wait itself failed.
    SelectFailed,
    /// A read on some stream failed outside of the per-connection handlers.
    ReadFailed,
    /// A write on some stream failed outside of the per-connection handlers.
    WriteFailed,
}

/// An event surfaced by the [`crate::multiplexer::Multiplexer`] to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Update {
    /// A read-side event on a connection or the accepting endpoint.
    Read { kind: ReadKind, conn: ConnId },
    /// A write-side event on a connection.
    Write { kind: WriteKind, conn: ConnId },
    /// A loop-level error not attributable to one connection.
    Error { kind: ErrorKind },
}

impl Update {
    pub fn read(kind: ReadKind, conn: ConnId) -> Self {
        Update::Read { kind, conn }
    }

    pub fn write(kind: WriteKind, conn: ConnId) -> Self {
        Update::Write { kind, conn }
    }

    pub fn error(kind: ErrorKind) -> Self {
        Update::Error { kind }
    }

    /// The connection this update concerns, if any.
    pub fn conn(&self) -> Option<ConnId> {
        match self {
            Update::Read { conn, .. } | Update::Write { conn, .. } => Some(*conn),
            Update::Error { .. } => None,
        }
    }
}
