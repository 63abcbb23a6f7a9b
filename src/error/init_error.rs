use std::{fmt, io};

/// Errors fatal to bringing up a [`crate::server::Server`].
#[derive(Debug)]
pub enum InitError {
    /// Binding the listening socket failed.
    Bind(io::Error),
    /// The configured address could not be parsed.
    BadAddress(String),
    /// Creating the parent directory for a UNIX-domain socket path failed.
    SocketDir(io::Error),
}

impl fmt::Display for InitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitError::Bind(err) => write!(f, "failed to bind listening socket: {err}"),
            InitError::BadAddress(addr) => write!(f, "invalid listen address: {addr}"),
            InitError::SocketDir(err) => write!(f, "failed to create socket directory: {err}"),
        }
    }
}

impl std::error::Error for InitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            InitError::Bind(err) | InitError::SocketDir(err) => Some(err),
            InitError::BadAddress(_) => None,
        }
    }
}
