//! Error types for netbackup.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::driver::Phase;

/// Main error type for netbackup operations.
#[derive(Error, Debug)]
pub enum Error {
    /// A backup session failed in one of its phases.
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Device family or dialect lookup errors.
    #[error("Dialect error: {0}")]
    Dialect(#[from] DialectError),

    /// Errors persisting a capture.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Invalid configuration in the session builder.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

impl Error {
    /// The failure kind of this error, if it maps onto one.
    ///
    /// Storage and builder configuration errors happen outside a session
    /// and have no kind.
    pub fn kind(&self) -> Option<FailureKind> {
        match self {
            Error::Session(e) => Some(e.kind),
            Error::Dialect(DialectError::UnsupportedFamily { .. }) => {
                Some(FailureKind::UnsupportedDeviceFamily)
            }
            Error::Dialect(_) | Error::Storage(_) | Error::InvalidConfig { .. } => None,
        }
    }

    /// Bytes collected before the failure, if any.
    pub fn partial(&self) -> &[u8] {
        match self {
            Error::Session(e) => e.partial(),
            _ => &[],
        }
    }
}

/// Transport layer errors (TCP/SSH connection, authentication, I/O).
#[derive(Error, Debug)]
pub enum TransportError {
    /// The remote host actively refused the connection.
    #[error("Connection refused by {host}:{port}")]
    ConnectionRefused { host: String, port: u16 },

    /// Failed to connect to host for a reason other than refusal.
    #[error("Connection failed to {host}:{port}: {source}")]
    ConnectionFailed {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    /// SSH handshake or protocol error
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// Authentication failed
    #[error("Authentication failed for user '{user}'")]
    AuthenticationFailed { user: String },

    /// Host key not found in known_hosts (strict mode)
    #[error("Host key for {host}:{port} is not in known_hosts")]
    HostKeyUnknown { host: String, port: u16 },

    /// Host key differs from the one recorded in known_hosts
    #[error("Host key for {host}:{port} changed (known_hosts line {line})")]
    HostKeyChanged { host: String, port: u16, line: usize },

    /// known_hosts could not be read or written
    #[error("known_hosts error: {0}")]
    KnownHosts(String),

    /// Failed to open the PTY shell channel
    #[error("Failed to open shell channel: {0}")]
    ShellRequestFailed(String),

    /// Connection was closed by the peer (EOF or reset)
    #[error("Connection disconnected")]
    Disconnected,

    /// Operation timed out
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl TransportError {
    /// Classify an I/O error raised on an established stream.
    pub(crate) fn from_stream_io(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof => TransportError::Disconnected,
            _ => TransportError::Io(err),
        }
    }
}

/// The distinct ways a backup session can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The device could not be reached.
    ConnectionRefused,
    /// Login was rejected, or the login exchange never completed.
    AuthenticationFailed,
    /// A phase saw no data at all within its timeout.
    Timeout,
    /// The connection was closed or reset by the peer.
    PeerClosed,
    /// Output arrived but completion was never signalled.
    IncompleteCapture,
    /// The device family has no dialect.
    UnsupportedDeviceFamily,
    /// The session succeeded but produced no configuration text.
    EmptyCapture,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::ConnectionRefused => "connection refused",
            FailureKind::AuthenticationFailed => "authentication failed",
            FailureKind::Timeout => "timed out",
            FailureKind::PeerClosed => "peer closed the connection",
            FailureKind::IncompleteCapture => "incomplete capture",
            FailureKind::UnsupportedDeviceFamily => "unsupported device family",
            FailureKind::EmptyCapture => "empty capture",
        };
        f.write_str(s)
    }
}

/// A failure inside a running session.
///
/// Always carries the phase and device address so a failure can be
/// diagnosed from the message alone. Bytes collected before the failure
/// are kept for partial-capture handling.
#[derive(Error, Debug)]
#[error("{kind} while {phase} on {address}")]
pub struct SessionError {
    /// What went wrong.
    pub kind: FailureKind,

    /// The phase the session was in.
    pub phase: Phase,

    /// Device address.
    pub address: String,

    partial: Vec<u8>,

    #[source]
    source: Option<TransportError>,
}

impl SessionError {
    /// Create a session error with no underlying transport error.
    pub fn new(kind: FailureKind, phase: Phase, address: impl Into<String>) -> Self {
        Self {
            kind,
            phase,
            address: address.into(),
            partial: Vec::new(),
            source: None,
        }
    }

    /// Attach the transport error that caused this failure.
    pub fn with_source(mut self, source: TransportError) -> Self {
        self.source = Some(source);
        self
    }

    /// Attach bytes collected before the failure.
    pub fn with_partial(mut self, partial: Vec<u8>) -> Self {
        self.partial = partial;
        self
    }

    /// Bytes collected before the failure.
    pub fn partial(&self) -> &[u8] {
        &self.partial
    }

    /// Take the collected bytes out of the error.
    pub fn take_partial(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.partial)
    }

    /// The transport error behind this failure, if any.
    pub fn transport_error(&self) -> Option<&TransportError> {
        self.source.as_ref()
    }
}

/// Device family and dialect errors.
#[derive(Error, Debug)]
pub enum DialectError {
    /// No dialect exists for the requested device family.
    #[error("Unsupported device family '{name}'")]
    UnsupportedFamily { name: String },

    /// Unknown transport name.
    #[error("Unsupported transport '{name}' (expected 'ssh' or 'telnet')")]
    UnsupportedTransport { name: String },
}

/// Errors writing a capture to disk.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The output directory could not be created.
    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The backup file could not be written.
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Nothing to write.
    #[error("No configuration data to save")]
    Empty,
}

/// Result type alias using netbackup's Error.
pub type Result<T> = std::result::Result<T, Error>;
