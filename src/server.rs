//! The server (C5): owns the accepting endpoint and the connection table, and knows how
//! to parse a listen address, accept new connections, and tear everything down.
//!
//! Grounded on the teacher's top-level `WebSocket`/`accept` helpers for the handshake
//! orchestration, generalized here to a long-lived registry of connections the way the
//! reactor in the design notes requires, plus the stale-socket-file and fork-safety
//! handling other_examples' UNIX-domain reactor examples show for long-running daemons.

use std::collections::HashMap;
use std::fs;
use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener as StdTcpListener};
use std::os::unix::net::{UnixListener as StdUnixListener, UnixStream as StdUnixStream};
use std::path::Path;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use mio::net::{TcpListener, TcpStream, UnixListener, UnixStream};

use crate::accepting::{AcceptedStream, AcceptingConnection};
use crate::config::WebSocketConfig;
use crate::connection::{Connection, State};
use crate::error::{Error, InitError, Result};

static NEXT_SERVER_ID: AtomicUsize = AtomicUsize::new(1);

/// A listen address, as accepted on the command line or in configuration.
///
/// Bare `host:port` (no scheme) is accepted as shorthand for `tcp://host:port`, matching
/// the source implementation's behavior.
#[derive(Debug, Clone)]
pub enum Address {
    Tcp(SocketAddr),
    /// Accepted at parse time; TLS termination itself is not implemented (see
    /// SPEC_FULL.md's Non-goals) so binding one fails with [`InitError::BadAddress`].
    Tls(SocketAddr),
    Unix(String),
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let bad = || Error::Init(InitError::BadAddress(s.to_string()));
        if let Some(rest) = s.strip_prefix("tcp://") {
            return rest.parse::<SocketAddr>().map(Address::Tcp).map_err(|_| bad());
        }
        if let Some(rest) = s.strip_prefix("tls://") {
            return rest.parse::<SocketAddr>().map(Address::Tls).map_err(|_| bad());
        }
        if let Some(rest) = s.strip_prefix("unix://") {
            return Ok(Address::Unix(rest.to_string()));
        }
        // "udg" (Unix Domain socket, Group-shared): an alias kept from the source
        // implementation's naming for a unix socket created with group-writable
        // permissions. Permission handling itself lives in `Server::bind_unix`.
        if let Some(rest) = s.strip_prefix("udg://") {
            return Ok(Address::Unix(rest.to_string()));
        }
        s.parse::<SocketAddr>().map(Address::Tcp).map_err(|_| bad())
    }
}

/// A stream accepted from either a TCP or UNIX listener, unified behind one type so
/// [`Connection`] doesn't need to be generic over the transport at the server level.
pub enum ConnStream {
    Tcp(TcpStream),
    Unix(UnixStream),
}

impl Read for ConnStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            ConnStream::Tcp(s) => s.read(buf),
            ConnStream::Unix(s) => s.read(buf),
        }
    }
}

impl Write for ConnStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            ConnStream::Tcp(s) => s.write(buf),
            ConnStream::Unix(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            ConnStream::Tcp(s) => s.flush(),
            ConnStream::Unix(s) => s.flush(),
        }
    }
}

impl mio::event::Source for ConnStream {
    fn register(&mut self, registry: &mio::Registry, token: mio::Token, interests: mio::Interest) -> io::Result<()> {
        match self {
            ConnStream::Tcp(s) => s.register(registry, token, interests),
            ConnStream::Unix(s) => s.register(registry, token, interests),
        }
    }

    fn reregister(&mut self, registry: &mio::Registry, token: mio::Token, interests: mio::Interest) -> io::Result<()> {
        match self {
            ConnStream::Tcp(s) => s.reregister(registry, token, interests),
            ConnStream::Unix(s) => s.reregister(registry, token, interests),
        }
    }

    fn deregister(&mut self, registry: &mio::Registry) -> io::Result<()> {
        match self {
            ConnStream::Tcp(s) => s.deregister(registry),
            ConnStream::Unix(s) => s.deregister(registry),
        }
    }
}

impl From<AcceptedStream> for (ConnStream, Option<SocketAddr>) {
    fn from(accepted: AcceptedStream) -> Self {
        match accepted {
            AcceptedStream::Tcp(stream, addr) => (ConnStream::Tcp(stream), addr),
            AcceptedStream::Unix(stream) => (ConnStream::Unix(stream), None),
        }
    }
}

/// Owns the accepting endpoint and every open connection.
pub struct Server {
    pub(crate) identifier: usize,
    accepting: Option<AcceptingConnection>,
    connections: HashMap<usize, Connection<ConnStream>>,
    next_index: usize,
    auto_accept: bool,
    use_crypto: bool,
    config: WebSocketConfig,
    /// Set for a UNIX-domain listener; `close()` unlinks this path unless
    /// `cleanup_socket_on_close` has been cleared (post-fork child).
    unix_path: Option<String>,
    /// `false` in a forked child (see [`Server::process_did_fork`]) so the shared socket
    /// file outlives the child's own `close()`.
    cleanup_socket_on_close: bool,
}

impl Server {
    /// Bind a listening socket at `address` and bring up an otherwise-empty server.
    pub fn bind(address: &Address, auto_accept: bool, config: WebSocketConfig) -> Result<Self> {
        let identifier = NEXT_SERVER_ID.fetch_add(1, Ordering::Relaxed);
        let accept_timeout = config.handshake_timeout;
        let mut unix_path = None;
        let (accepting, use_crypto) = match address {
            Address::Tcp(addr) => {
                let std_listener = StdTcpListener::bind(addr).map_err(|e| Error::Init(InitError::Bind(e)))?;
                std_listener.set_nonblocking(true).map_err(|e| Error::Init(InitError::Bind(e)))?;
                let listener = TcpListener::from_std(std_listener);
                (AcceptingConnection::tcp(listener, auto_accept, accept_timeout), false)
            }
            Address::Tls(_) => {
                return Err(Error::Init(InitError::BadAddress(
                    "TLS listen addresses are not supported by this build".to_string(),
                )));
            }
            Address::Unix(path) => {
                let listener = Self::bind_unix(path)?;
                unix_path = Some(path.clone());
                (AcceptingConnection::unix(listener, auto_accept, accept_timeout), false)
            }
        };

        log::info!(target: "wsreactor::server", "server {identifier} listening");

        Ok(Server {
            identifier,
            accepting: Some(accepting),
            connections: HashMap::new(),
            next_index: 0,
            auto_accept,
            use_crypto,
            config,
            unix_path,
            cleanup_socket_on_close: true,
        })
    }

    /// Bring up a server with no accepting endpoint at all, for in-process pair tests:
    /// the caller drives the protocol state machine over a directly-constructed stream
    /// (e.g. one half of `UnixStream::pair()`) via [`Server::insert_connection`] instead of
    /// accepting one from a real listener.
    pub fn standalone(config: WebSocketConfig) -> Self {
        let identifier = NEXT_SERVER_ID.fetch_add(1, Ordering::Relaxed);
        Server {
            identifier,
            accepting: None,
            connections: HashMap::new(),
            next_index: 0,
            auto_accept: false,
            use_crypto: false,
            config,
            unix_path: None,
            cleanup_socket_on_close: false,
        }
    }

    /// Bind a UNIX-domain listener at `path`, removing a stale socket file left behind by
    /// a prior process and creating the parent directory (mode 0770) if it doesn't exist.
    fn bind_unix(path: &str) -> Result<UnixListener> {
        let path_ref = Path::new(path);
        if let Some(parent) = path_ref.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| Error::Init(InitError::SocketDir(e)))?;
                #[cfg(unix)]
                {
                    use std::os::unix::fs::PermissionsExt;
                    let perms = fs::Permissions::from_mode(0o770);
                    let _ = fs::set_permissions(parent, perms);
                }
            }
        }
        if path_ref.exists() {
            if StdUnixStream::connect(path_ref).is_err() {
                // Nothing is listening on the existing socket file; it's a stale leftover
                // from a process that didn't clean up (e.g. killed -9).
                let _ = fs::remove_file(path_ref);
            }
        }
        let std_listener = StdUnixListener::bind(path_ref).map_err(|e| Error::Init(InitError::Bind(e)))?;
        std_listener.set_nonblocking(true).map_err(|e| Error::Init(InitError::Bind(e)))?;
        Ok(UnixListener::from_std(std_listener))
    }

    pub fn use_crypto(&self) -> bool {
        self.use_crypto
    }

    /// The address the accepting endpoint is bound to, if it is a TCP listener.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.accepting.as_ref()?.local_addr().ok()
    }

    pub fn auto_accept(&self) -> bool {
        self.auto_accept
    }

    pub fn accepting_mut(&mut self) -> Option<&mut AcceptingConnection> {
        self.accepting.as_mut()
    }

    pub fn connections(&self) -> impl Iterator<Item = (&usize, &Connection<ConnStream>)> {
        self.connections.iter()
    }

    pub fn connection_mut(&mut self, index: usize) -> Option<&mut Connection<ConnStream>> {
        self.connections.get_mut(&index)
    }

    /// Register an already-accepted stream as a new connection awaiting its handshake.
    pub fn insert_connection(&mut self, accepted: AcceptedStream) -> usize {
        let (stream, addr): (ConnStream, Option<SocketAddr>) = accepted.into();
        let index = self.next_index;
        self.next_index += 1;
        let conn = Connection::new(stream, addr, index, self.config.clone());
        self.connections.insert(index, conn);
        index
    }

    /// Drive an explicit accept when `auto_accept` is disabled.
    pub fn accept_new_connection(&mut self) -> Result<Option<usize>> {
        let accepting = self.accepting.as_mut().ok_or(Error::Usage("server has no accepting endpoint"))?;
        match accepting.accept().map_err(Error::Io)? {
            Some(stream) => Ok(Some(self.insert_connection(stream))),
            None => Ok(None),
        }
    }

    /// Drop a connection the server owns. If it hasn't already reached `Closed`, it is
    /// hard-closed first — a removed connection does not linger waiting for a close
    /// handshake the host is no longer driving.
    pub fn remove_connection(&mut self, index: usize) -> Result<()> {
        let conn = self.connections.get_mut(&index).ok_or(Error::Usage("no such connection index"))?;
        if conn.state() != State::Closed {
            conn.hard_close();
        }
        self.connections.remove(&index);
        Ok(())
    }

    /// Queue a close handshake on every open connection. Does not wait for it to finish;
    /// the host keeps driving the multiplexer until every connection reports `Closed`.
    pub fn disconnect_all(&mut self) {
        for conn in self.connections.values_mut() {
            let _ = conn.begin_local_close(None);
        }
    }

    /// Drop every connection whose state machine has reached `Closed` and fully flushed
    /// its write queue. Called once per tick by the multiplexer after dispatch.
    pub fn reap_finished(&mut self) {
        use crate::stream_container::StreamContainer;
        self.connections.retain(|_, conn| !conn.is_finished());
    }

    /// Notify the server that `fork()` just happened; `child_pid` is whatever `fork()`
    /// returned in the caller's process (0 in the child, the child's PID in the parent).
    ///
    /// In the child, every connection the parent had is hard-closed (the child holds a
    /// duplicate file descriptor, not a connection it is actually driving) and listener
    /// cleanup is disabled, so the child's own `close()`/drop never unlinks the UNIX
    /// socket file the parent is still serving on. In the parent this is a no-op — kept
    /// symmetric so callers can unconditionally call it on both sides of a `fork()`.
    pub fn process_did_fork(&mut self, child_pid: i32) {
        if child_pid != 0 {
            return;
        }
        self.cleanup_socket_on_close = false;
        for conn in self.connections.values_mut() {
            conn.hard_close();
        }
        self.connections.clear();
    }

    /// Close every connection, then the accepting endpoint, honoring the cleanup flag
    /// (cleared by [`Server::process_did_fork`] in a forked child) for a UNIX-domain
    /// listener's socket file.
    pub fn close(mut self) {
        for conn in self.connections.values_mut() {
            conn.hard_close();
        }
        self.connections.clear();
        self.accepting = None;
        if self.cleanup_socket_on_close {
            if let Some(path) = self.unix_path.take() {
                if let Err(err) = fs::remove_file(&path) {
                    if err.kind() != io::ErrorKind::NotFound {
                        log::warn!(target: "wsreactor::server", "failed to unlink {path}: {err}");
                    }
                }
            }
        }
    }
}

/// How long, by default, the accepting endpoint waits for a readiness event before the
/// multiplexer re-checks connection-level timeouts. Not an accept *deadline* per
/// connection (that is `WebSocketConfig::handshake_timeout`) but the reactor's own poll
/// interval when nothing else is pending.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);
