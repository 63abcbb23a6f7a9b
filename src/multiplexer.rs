//! The single-threaded readiness multiplexer (C6): one `mio::Poll`, one `mio::Events`
//! buffer, and the per-tick dispatch order (reads, then writes, then exceptional) the
//! design notes require.
//!
//! Grounded on `other_examples`' `mio`-based reactor sketches (`HaveFunTrading-boomnet`'s
//! `ws` module and `gattaca-com-flux`'s TCP stream wrapper) for the token-bookkeeping and
//! dynamic-interest pattern; the ordered-dispatch and per-connection timeout sweep is
//! this crate's own, since the sans-io teacher has no event loop of its own to borrow one
//! from.

use std::collections::HashSet;
use std::io;
use std::time::Duration;

use mio::{Events, Interest, Poll, Token};

use crate::error::{Error, Result};
use crate::server::Server;
use crate::stream_container::StreamContainer;
use crate::update::{ConnId, ErrorKind, ReadKind, Update};

const ACCEPTING_TOKEN: Token = Token(0);

/// Map a connection index to the `mio::Token` it registers under. Index 0 would collide
/// with [`ACCEPTING_TOKEN`], so every connection token is offset by one.
fn token_for(index: usize) -> Token {
    Token(index + 1)
}

fn index_for(token: Token) -> usize {
    token.0 - 1
}

/// Drives one `Server`'s accepting endpoint and connection table to completion of a
/// single readiness wait, dispatching reads, then writes, then exceptional conditions.
pub struct Multiplexer {
    poll: Poll,
    events: Events,
    poll_interval: Duration,
    accepting_registered: bool,
    registered: HashSet<usize>,
}

impl Multiplexer {
    pub fn new(poll_interval: Duration) -> io::Result<Self> {
        Ok(Multiplexer {
            poll: Poll::new()?,
            events: Events::with_capacity(1024),
            poll_interval,
            accepting_registered: false,
            registered: HashSet::new(),
        })
    }

    fn registry(&self) -> &mio::Registry {
        self.poll.registry()
    }

    fn interest_for<C: StreamContainer>(container: &C) -> Interest {
        if container.is_write_buffer_empty() {
            Interest::READABLE
        } else {
            Interest::READABLE | Interest::WRITABLE
        }
    }

    fn sync_registration<C: StreamContainer>(
        &self,
        container: &mut C,
        token: Token,
        known: bool,
    ) -> io::Result<()> {
        let interest = Self::interest_for(container);
        if known {
            container.get_stream().reregister(self.registry(), token, interest)
        } else {
            container.get_stream().register(self.registry(), token, interest)
        }
    }

    /// Run one iteration of the event loop: sync registrations, wait for readiness (or
    /// the poll interval, whichever comes first), and dispatch.
    pub fn tick(&mut self, server: &mut Server) -> Result<Vec<Update>> {
        let mut updates = Vec::new();

        if let Some(accepting) = server.accepting_mut() {
            updates.extend(accepting.before_stream_select());
            self.sync_registration(accepting, ACCEPTING_TOKEN, self.accepting_registered).map_err(Error::Io)?;
            self.accepting_registered = true;
        }

        let indices: Vec<usize> = server.connections().map(|(i, _)| *i).collect();
        for index in &indices {
            let conn = server.connection_mut(*index).expect("index came from connections()");
            updates.extend(conn.before_stream_select());
            let known = self.registered.contains(index);
            if let Err(err) = self.sync_registration(conn, token_for(*index), known) {
                // A registration failure on one connection's stream (e.g. the fd was
                // already torn down under us) must not abort the whole tick and strand
                // every other connection unregistered for this round — treat it the same
                // as the peer having hung up.
                log::warn!(target: "wsreactor::multiplexer", "registering connection {index} failed: {err}");
                updates.extend(conn.handle_exceptional());
                self.registered.remove(index);
                continue;
            }
            self.registered.insert(*index);
        }

        if let Err(err) = self.poll.poll(&mut self.events, Some(self.poll_interval)) {
            if err.kind() != io::ErrorKind::Interrupted {
                updates.push(Update::error(ErrorKind::SelectFailed));
                return Ok(updates);
            }
        }

        let mut readable: Vec<Token> = Vec::new();
        let mut writable: Vec<Token> = Vec::new();
        let mut exceptional: Vec<Token> = Vec::new();
        for event in self.events.iter() {
            if event.is_error() || (event.is_read_closed() && event.is_write_closed()) {
                exceptional.push(event.token());
                continue;
            }
            if event.is_readable() {
                readable.push(event.token());
            }
            if event.is_writable() {
                writable.push(event.token());
            }
        }

        for token in readable {
            updates.extend(self.dispatch_read(server, token));
        }
        for token in writable {
            updates.extend(self.dispatch_write(server, token));
        }
        for token in exceptional {
            updates.extend(self.dispatch_exceptional(server, token));
        }

        server.reap_finished();
        self.registered.retain(|index| server.connection_mut(*index).is_some());

        Ok(updates)
    }

    fn dispatch_read(&mut self, server: &mut Server, token: Token) -> Vec<Update> {
        if token == ACCEPTING_TOKEN {
            return self.dispatch_accepting_read(server);
        }
        let index = index_for(token);
        match server.connection_mut(index) {
            Some(conn) => conn.handle_read(),
            None => Vec::new(),
        }
    }

    /// The accepting endpoint reports a `NewTcpConnection` once per stream it has already
    /// pulled off the listener into its own pending queue (see
    /// [`crate::accepting::AcceptingConnection::handle_read`]); this is where those pending
    /// streams actually get registered as owned [`crate::connection::Connection`]s, so the
    /// update the host sees carries the real connection index rather than
    /// [`ConnId::Accepting`].
    fn dispatch_accepting_read(&mut self, server: &mut Server) -> Vec<Update> {
        let raw = match server.accepting_mut() {
            Some(accepting) => accepting.handle_read(),
            None => return Vec::new(),
        };
        let mut updates = Vec::with_capacity(raw.len());
        for update in raw {
            match update {
                Update::Read { kind: ReadKind::NewTcpConnection, .. } => {
                    let accepted = server.accepting_mut().and_then(|a| a.accept().ok().flatten());
                    if let Some(accepted) = accepted {
                        let index = server.insert_connection(accepted);
                        updates.push(Update::read(ReadKind::NewTcpConnection, ConnId::Connection(index)));
                    }
                }
                other => updates.push(other),
            }
        }
        updates
    }

    fn dispatch_write(&mut self, server: &mut Server, token: Token) -> Vec<Update> {
        if token == ACCEPTING_TOKEN {
            return Vec::new();
        }
        let index = index_for(token);
        match server.connection_mut(index) {
            Some(conn) => conn.handle_write(),
            None => Vec::new(),
        }
    }

    fn dispatch_exceptional(&mut self, server: &mut Server, token: Token) -> Vec<Update> {
        if token == ACCEPTING_TOKEN {
            return Vec::new();
        }
        let index = index_for(token);
        match server.connection_mut(index) {
            Some(conn) => conn.handle_exceptional(),
            None => vec![Update::read(crate::update::ReadKind::SockDisconnect, ConnId::Connection(index))],
        }
    }
}
