//! Error handling.
//!
//! See §7 of the design notes: protocol and capacity errors are per-connection and never
//! bring down the [`crate::server::Server`] or any other connection; initialization errors
//! are fatal to the server itself; usage errors indicate a programmer mistake.

mod capacity_error;
mod init_error;
mod protocol_error;

pub use capacity_error::CapacityError;
pub use init_error::InitError;
pub use protocol_error::{HandshakeError, ProtocolError};

use std::io;
use thiserror::Error;

/// Result type used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// All errors this crate can produce.
#[derive(Debug, Error)]
pub enum Error {
    /// An I/O error occurred on the underlying stream. Except for `WouldBlock`, these are
    /// generally fatal to the connection.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A frame or message violated RFC 6455.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// A buffer or message exceeded a configured limit.
    #[error("capacity error: {0}")]
    Capacity(#[from] CapacityError),

    /// The connection was already closed when an operation that requires it be open
    /// was attempted.
    #[error("connection already closed")]
    AlreadyClosed,

    /// Failed to bring up a [`crate::server::Server`].
    #[error("initialization error: {0}")]
    Init(#[from] InitError),

    /// A programmer error: calling an operation on a component that does not support it
    /// (e.g. writing to an [`crate::accepting::AcceptingConnection`], or removing a
    /// connection a [`crate::server::Server`] does not own).
    #[error("usage error: {0}")]
    Usage(&'static str),
}

impl Error {
    /// `true` if this is an `io::ErrorKind::WouldBlock` that callers should treat as
    /// "no progress this tick" rather than a failure.
    pub fn is_would_block(&self) -> bool {
        matches!(self, Error::Io(err) if err.kind() == io::ErrorKind::WouldBlock)
    }
}
