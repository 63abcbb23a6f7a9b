//! A single-threaded, readiness-driven RFC 6455 WebSocket server.
//!
//! A [`server::Server`] owns a listening socket and a table of
//! [`connection::Connection`]s; a [`multiplexer::Multiplexer`] drives both through one
//! `mio::Poll` wait per tick and reports what happened as a stream of
//! [`update::Update`]s. The wire codec (`framer`) and the opening handshake
//! (`handshake`) are deliberately free of any I/O or event-loop concerns, so they can be
//! exercised directly in tests without a socket.
//!
//! ```text
//! Multiplexer::tick
//!   -> AcceptingConnection::handle_read   (new sockets)
//!   -> Connection::handle_read            (bytes in, frames decoded, Updates produced)
//!   -> Connection::handle_write           (queued frames flushed)
//! ```

pub mod accepting;
pub mod config;
pub mod connection;
pub mod error;
pub mod framer;
pub mod handshake;
pub mod message;
pub mod multiplexer;
pub mod server;
pub mod stream_container;
pub mod support;
pub mod update;

pub use config::WebSocketConfig;
pub use error::{Error, Result};
pub use message::Message;
pub use multiplexer::Multiplexer;
pub use server::{Address, Server};
pub use update::Update;
