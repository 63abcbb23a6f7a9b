//! The listening endpoint (C4): wraps a `mio` TCP or UNIX listener and surfaces newly
//! accepted streams, either automatically or on explicit host request.
//!
//! Grounded on the teacher's `ListenerHandler`-style split between "the socket used to
//! register with the reactor" and "what happens when it becomes readable" — here folded
//! into [`crate::stream_container::StreamContainer`] so the multiplexer treats this the
//! same way it treats an open connection.

use std::collections::VecDeque;
use std::io;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use mio::net::{TcpListener, TcpStream, UnixListener, UnixStream};

use crate::stream_container::StreamContainer;
use crate::update::{ConnId, ErrorKind, ReadKind, Update};

/// A stream freshly returned by `accept()`, before a `Connection` has been built around it.
pub enum AcceptedStream {
    Tcp(TcpStream, Option<SocketAddr>),
    Unix(UnixStream),
}

enum Listener {
    Tcp(TcpListener),
    Unix(UnixListener),
}

impl Listener {
    fn local_addr(&self) -> io::Result<SocketAddr> {
        match self {
            Listener::Tcp(l) => l.local_addr(),
            Listener::Unix(_) => {
                Err(io::Error::new(io::ErrorKind::Unsupported, "a unix listener has no socket address"))
            }
        }
    }
}

impl mio::event::Source for Listener {
    fn register(&mut self, registry: &mio::Registry, token: mio::Token, interests: mio::Interest) -> io::Result<()> {
        match self {
            Listener::Tcp(l) => l.register(registry, token, interests),
            Listener::Unix(l) => l.register(registry, token, interests),
        }
    }

    fn reregister(&mut self, registry: &mio::Registry, token: mio::Token, interests: mio::Interest) -> io::Result<()> {
        match self {
            Listener::Tcp(l) => l.reregister(registry, token, interests),
            Listener::Unix(l) => l.reregister(registry, token, interests),
        }
    }

    fn deregister(&mut self, registry: &mio::Registry) -> io::Result<()> {
        match self {
            Listener::Tcp(l) => l.deregister(registry),
            Listener::Unix(l) => l.deregister(registry),
        }
    }
}

impl io::Read for Listener {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "the accepting endpoint is not a byte stream"))
    }
}

impl io::Write for Listener {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "the accepting endpoint is not a byte stream"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// The listening endpoint the multiplexer waits on for new connections.
pub struct AcceptingConnection {
    listener: Listener,
    /// When `true`, every readiness event eagerly calls `accept()` in a loop; when
    /// `false`, readiness surfaces only `NewTcpConnectionAvailable` and the host must call
    /// [`AcceptingConnection::accept`] itself.
    auto_accept: bool,
    accept_timeout: Duration,
    last_accept_attempt: Instant,
    pending: VecDeque<AcceptedStream>,
}

impl AcceptingConnection {
    pub fn tcp(listener: TcpListener, auto_accept: bool, accept_timeout: Duration) -> Self {
        AcceptingConnection {
            listener: Listener::Tcp(listener),
            auto_accept,
            accept_timeout,
            last_accept_attempt: Instant::now(),
            pending: VecDeque::new(),
        }
    }

    pub fn unix(listener: UnixListener, auto_accept: bool, accept_timeout: Duration) -> Self {
        AcceptingConnection {
            listener: Listener::Unix(listener),
            auto_accept,
            accept_timeout,
            last_accept_attempt: Instant::now(),
            pending: VecDeque::new(),
        }
    }

    /// The address this endpoint is bound to. `Err` for a UNIX-domain listener, which has
    /// no `SocketAddr`.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Explicitly accept one pending connection. Used by hosts that disabled
    /// `auto_accept` and are reacting to a `NewTcpConnectionAvailable` update.
    pub fn accept(&mut self) -> io::Result<Option<AcceptedStream>> {
        if let Some(stream) = self.pending.pop_front() {
            return Ok(Some(stream));
        }
        self.accept_one()
    }

    fn accept_one(&mut self) -> io::Result<Option<AcceptedStream>> {
        match &self.listener {
            Listener::Tcp(l) => match l.accept() {
                Ok((stream, addr)) => {
                    // WebSocket frames are typically small and latency-sensitive; Nagle's
                    // algorithm would needlessly delay them.
                    let _ = stream.set_nodelay(true);
                    Ok(Some(AcceptedStream::Tcp(stream, Some(addr))))
                }
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => Ok(None),
                Err(err) => Err(err),
            },
            Listener::Unix(l) => match l.accept() {
                Ok((stream, _addr)) => Ok(Some(AcceptedStream::Unix(stream))),
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => Ok(None),
                Err(err) => Err(err),
            },
        }
    }
}

impl StreamContainer for AcceptingConnection {
    type Stream = Listener;

    fn get_stream(&mut self) -> &mut Listener {
        &mut self.listener
    }

    fn is_write_buffer_empty(&self) -> bool {
        true
    }

    fn before_stream_select(&mut self) -> Vec<Update> {
        if self.last_accept_attempt.elapsed() >= self.accept_timeout {
            self.last_accept_attempt = Instant::now();
        }
        Vec::new()
    }

    fn handle_read(&mut self) -> Vec<Update> {
        let mut updates = Vec::new();
        if !self.auto_accept {
            updates.push(Update::read(ReadKind::NewTcpConnectionAvailable, ConnId::Accepting));
            return updates;
        }

        loop {
            match self.accept_one() {
                Ok(Some(stream)) => {
                    self.pending.push_back(stream);
                    updates.push(Update::read(ReadKind::NewTcpConnection, ConnId::Accepting));
                }
                Ok(None) => break,
                Err(err) => {
                    log::warn!(target: "wsreactor::accepting", "accept() failed: {err}");
                    updates.push(Update::error(ErrorKind::ReadFailed));
                    break;
                }
            }
        }
        updates
    }

    /// The accepting endpoint never reports write-readiness (`is_write_buffer_empty`
    /// always returns `true`), so the multiplexer never dispatches here.
    fn handle_write(&mut self) -> Vec<Update> {
        panic!("Bug: handle_write invoked on the accepting endpoint");
    }

    /// The multiplexer special-cases the accepting endpoint's token and never reaches
    /// this; it would indicate a bug in the dispatch loop, not a recoverable condition.
    fn handle_exceptional(&mut self) -> Vec<Update> {
        panic!("Bug: handle_exceptional invoked on the accepting endpoint");
    }

    fn is_finished(&self) -> bool {
        false
    }
}
