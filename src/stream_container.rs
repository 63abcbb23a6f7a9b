//! The `StreamContainer` contract (C2): the common shape the
//! [`crate::multiplexer::Multiplexer`] drives every registered stream through, whether it
//! is the listening endpoint or an open connection.
//!
//! Grounded on the teacher's `ManagedStream`/`NoiseStream` split, which separates "what
//! owns a socket" from "what the event loop does with one" — the same separation this
//! trait draws between [`crate::accepting::AcceptingConnection`] and
//! [`crate::connection::Connection`].

use std::io::{Read, Write};

use crate::update::Update;

/// Anything the multiplexer can register for readiness and drive for one tick.
///
/// Implementors are not required to be `Read + Write` themselves — `get_stream` exposes
/// the underlying I/O object the multiplexer registers with `mio` and waits on, while
/// `handle_read`/`handle_write` do the actual work once that object is ready.
pub trait StreamContainer {
    /// The concrete stream type registered with the multiplexer's `mio::Poll`.
    type Stream: Read + Write + mio::event::Source;

    /// Borrow the underlying stream for (re)registration with the multiplexer's poller.
    fn get_stream(&mut self) -> &mut Self::Stream;

    /// `true` once every queued outbound byte has actually been written to the stream.
    ///
    /// The multiplexer only asks for `WRITABLE` readiness while this returns `false`, so a
    /// quiet connection doesn't spin the event loop.
    fn is_write_buffer_empty(&self) -> bool;

    /// Called once per tick before the multiplexer recomputes this stream's registered
    /// interest, giving the implementor a chance to notice timeouts or other
    /// time-driven state changes that didn't arrive as I/O readiness.
    fn before_stream_select(&mut self) -> Vec<Update>;

    /// The stream became readable; read and process as much as the per-tick byte budget
    /// allows, returning the resulting updates.
    fn handle_read(&mut self) -> Vec<Update>;

    /// The stream became writable; flush as much of the pending write queue as the
    /// per-tick byte budget allows.
    fn handle_write(&mut self) -> Vec<Update>;

    /// The stream reported an exceptional readiness event (hangup, error).
    fn handle_exceptional(&mut self) -> Vec<Update>;

    /// `true` once this container should be dropped from the multiplexer's registry.
    fn is_finished(&self) -> bool;
}
