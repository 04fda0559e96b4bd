//! Device descriptor and credentials.

use std::fmt;
use std::str::FromStr;

use secrecy::{ExposeSecret, SecretString};

use crate::dialect::DeviceFamily;
use crate::error::DialectError;

/// How to reach the device's command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransportKind {
    /// Plaintext line stream; login is an ordinary prompt exchange.
    Telnet,

    /// Encrypted interactive shell; authentication happens during connect.
    #[default]
    Ssh,
}

impl TransportKind {
    /// Well-known port for this transport.
    pub fn default_port(self) -> u16 {
        match self {
            TransportKind::Telnet => 23,
            TransportKind::Ssh => 22,
        }
    }

    /// Canonical name, as accepted by [`FromStr`].
    pub fn as_str(self) -> &'static str {
        match self {
            TransportKind::Telnet => "telnet",
            TransportKind::Ssh => "ssh",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportKind {
    type Err = DialectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "telnet" => Ok(TransportKind::Telnet),
            "ssh" => Ok(TransportKind::Ssh),
            _ => Err(DialectError::UnsupportedTransport {
                name: s.to_string(),
            }),
        }
    }
}

/// The device a session talks to. Fixed for the session's lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    /// Hostname or IP address.
    pub address: String,

    /// Port override; the transport's well-known port when `None`.
    pub port: Option<u16>,

    /// Command dialect family.
    pub family: DeviceFamily,

    /// Transport to use.
    pub transport: TransportKind,
}

impl DeviceDescriptor {
    /// Create a descriptor using the transport's default port.
    pub fn new(address: impl Into<String>, family: DeviceFamily, transport: TransportKind) -> Self {
        Self {
            address: address.into(),
            port: None,
            family,
            transport,
        }
    }

    /// The port to connect to.
    pub fn port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.transport.default_port())
    }
}

/// Login credentials. Held only in memory.
pub struct Credentials {
    username: String,
    password: SecretString,
    enable_secret: Option<SecretString>,
}

impl Credentials {
    /// Create credentials with no escalation secret.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
            enable_secret: None,
        }
    }

    /// Set the privilege escalation secret.
    pub fn with_enable_secret(mut self, secret: impl Into<String>) -> Self {
        self.enable_secret = Some(SecretString::from(secret.into()));
        self
    }

    /// Login username.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Login password.
    pub fn password(&self) -> &str {
        self.password.expose_secret()
    }

    /// Escalation secret, if one was configured.
    pub fn enable_secret(&self) -> Option<&str> {
        self.enable_secret.as_ref().map(|s| s.expose_secret())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field(
                "enable_secret",
                &self.enable_secret.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}
