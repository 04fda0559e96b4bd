//! Builder for backup sessions.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use super::completion::CompletionStrategy;
use super::config::SessionConfig;
use super::session::SessionDriver;
use crate::device::{Credentials, DeviceDescriptor, TransportKind};
use crate::dialect::{DeviceFamily, dialect_for};
use crate::error::{Error, Result};
use crate::event::{EventSink, LogSink};
use crate::transport::{HostKeyVerification, TransportConfig};

/// Builder for constructing a [`SessionDriver`].
///
/// The device family is resolved in [`build`](Self::build), so an unknown
/// family fails before any connection is attempted.
///
/// # Example
///
/// ```rust,no_run
/// use netbackup::{SessionBuilder, TransportKind};
///
/// # async fn example() -> Result<(), netbackup::Error> {
/// let driver = SessionBuilder::new("192.168.1.1")
///     .username("admin")
///     .password("secret")
///     .enable_secret("enable-secret")
///     .family("cisco_ios")
///     .transport(TransportKind::Ssh)
///     .build()?;
///
/// let artifact = driver.run().await?;
/// println!("{}", artifact.text());
/// # Ok(())
/// # }
/// ```
pub struct SessionBuilder {
    address: String,
    port: Option<u16>,
    username: Option<String>,
    password: Option<String>,
    enable_secret: Option<String>,
    family_name: Option<String>,
    family: Option<DeviceFamily>,
    transport: TransportKind,
    config: SessionConfig,
    transport_config: TransportConfig,
    sink: Option<Arc<dyn EventSink>>,
}

impl SessionBuilder {
    /// Create a new builder for the specified device address.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            port: None,
            username: None,
            password: None,
            enable_secret: None,
            family_name: None,
            family: None,
            transport: TransportKind::default(),
            config: SessionConfig::default(),
            transport_config: TransportConfig::default(),
            sink: None,
        }
    }

    /// Override the transport's default port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Set the login username.
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Set the login password.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Set the privilege escalation secret.
    pub fn enable_secret(mut self, secret: impl Into<String>) -> Self {
        self.enable_secret = Some(secret.into());
        self
    }

    /// Set the device family by name (e.g. "cisco_ios", "juniper").
    pub fn family(mut self, family: impl Into<String>) -> Self {
        self.family_name = Some(family.into());
        self.family = None;
        self
    }

    /// Set the device family directly.
    pub fn device_family(mut self, family: DeviceFamily) -> Self {
        self.family = Some(family);
        self.family_name = None;
        self
    }

    /// Set the transport (default: SSH).
    pub fn transport(mut self, transport: TransportKind) -> Self {
        self.transport = transport;
        self
    }

    /// Set the connection timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self.transport_config.timeout = timeout;
        self
    }

    /// Replace the session timing configuration.
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Override the family's completion strategy.
    pub fn completion(mut self, strategy: CompletionStrategy) -> Self {
        self.config.completion = Some(strategy);
        self
    }

    /// Set the quiescence idle window.
    pub fn idle_window(mut self, window: Duration) -> Self {
        self.config.idle_window = window;
        self
    }

    /// Set terminal dimensions.
    pub fn terminal_size(mut self, width: u32, height: u32) -> Self {
        self.transport_config.terminal_width = width;
        self.transport_config.terminal_height = height;
        self
    }

    /// Set the SSH host key verification mode.
    pub fn host_key_verification(mut self, mode: HostKeyVerification) -> Self {
        self.transport_config.host_key_verification = mode;
        self
    }

    /// Use a specific known_hosts file.
    pub fn known_hosts_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.transport_config.known_hosts_path = Some(path.into());
        self
    }

    /// Report session events to `sink` (default: the `log` facade).
    pub fn event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Build the driver.
    ///
    /// This resolves the dialect but does not connect. Call
    /// [`SessionDriver::run`] to perform the backup.
    pub fn build(self) -> Result<SessionDriver> {
        let family = match (self.family, self.family_name) {
            (Some(family), _) => family,
            (None, Some(name)) => name.parse::<DeviceFamily>()?,
            (None, None) => {
                return Err(Error::InvalidConfig {
                    message: "Device family must be specified".to_string(),
                });
            }
        };

        if self.address.trim().is_empty() {
            return Err(Error::InvalidConfig {
                message: "Device address is required".to_string(),
            });
        }

        let username = self
            .username
            .filter(|u| !u.is_empty())
            .ok_or_else(|| Error::InvalidConfig {
                message: "Username is required".to_string(),
            })?;

        let password = self.password.unwrap_or_default();
        let mut credentials = Credentials::new(username, password);
        if let Some(secret) = self.enable_secret {
            credentials = credentials.with_enable_secret(secret);
        }

        let mut device = DeviceDescriptor::new(self.address, family, self.transport);
        device.port = self.port;

        Ok(SessionDriver {
            device,
            credentials,
            dialect: dialect_for(family),
            config: self.config,
            transport_config: self.transport_config,
            sink: self.sink.unwrap_or_else(|| Arc::new(LogSink)),
        })
    }
}
