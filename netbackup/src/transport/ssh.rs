//! SSH transport implementation using russh.

use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, trace, warn};
use russh::client::{self, Handle, Msg};
use russh::keys::PublicKey;
use russh::{Channel, ChannelMsg};

use super::Transport;
use super::config::{HostKeyVerification, TransportConfig};
use crate::device::Credentials;
use crate::error::TransportError;

/// SSH transport: an authenticated session with one PTY shell channel.
pub struct SshTransport {
    /// The russh session handle.
    session: Handle<SshHandler>,

    /// The interactive shell channel (None once closed).
    channel: Option<Channel<Msg>>,

    /// Write timeout.
    timeout: Duration,

    /// The peer sent EOF or closed the channel.
    eof: bool,
}

impl SshTransport {
    /// Connect, authenticate with the password and open a PTY shell.
    pub async fn connect(
        host: &str,
        port: u16,
        credentials: &Credentials,
        config: &TransportConfig,
    ) -> Result<Self, TransportError> {
        let ssh_config = Arc::new(client::Config {
            inactivity_timeout: None,
            ..Default::default()
        });

        let host_key_error: Arc<Mutex<Option<TransportError>>> = Arc::new(Mutex::new(None));

        let handler = SshHandler {
            host: host.to_string(),
            port,
            host_key_verification: config.host_key_verification.clone(),
            known_hosts_path: config.known_hosts_path.clone(),
            host_key_error: host_key_error.clone(),
        };

        debug!("ssh: connecting to {}:{}", host, port);

        let mut session = tokio::time::timeout(
            config.timeout,
            client::connect(ssh_config, (host, port), handler),
        )
        .await
        .map_err(|_| TransportError::Timeout(config.timeout))?
        .map_err(|e| {
            // If check_server_key stored a detailed error, use that instead
            // of the generic russh::Error::UnknownKey
            if let Some(hk_err) = host_key_error.lock().ok().and_then(|mut slot| slot.take()) {
                return hk_err;
            }
            match e {
                russh::Error::IO(io_err) if io_err.kind() == io::ErrorKind::ConnectionRefused => {
                    TransportError::ConnectionRefused {
                        host: host.to_string(),
                        port,
                    }
                }
                russh::Error::IO(io_err) => TransportError::ConnectionFailed {
                    host: host.to_string(),
                    port,
                    source: io_err,
                },
                other => TransportError::Ssh(other),
            }
        })?;

        let authenticated = tokio::time::timeout(
            config.timeout,
            session.authenticate_password(credentials.username(), credentials.password()),
        )
        .await
        .map_err(|_| TransportError::Timeout(config.timeout))??
        .success();

        if !authenticated {
            return Err(TransportError::AuthenticationFailed {
                user: credentials.username().to_string(),
            });
        }

        let channel = Self::open_shell(&session, config).await?;
        debug!("ssh: shell open on {}:{}", host, port);

        Ok(Self {
            session,
            channel: Some(channel),
            timeout: config.timeout,
            eof: false,
        })
    }

    /// Open a PTY channel and request a shell on it.
    async fn open_shell(
        session: &Handle<SshHandler>,
        config: &TransportConfig,
    ) -> Result<Channel<Msg>, TransportError> {
        let channel = session.channel_open_session().await?;

        channel
            .request_pty(
                true,
                "xterm",
                config.terminal_width,
                config.terminal_height,
                0,
                0,
                &[],
            )
            .await
            .map_err(|e| TransportError::ShellRequestFailed(e.to_string()))?;

        channel
            .request_shell(true)
            .await
            .map_err(|e| TransportError::ShellRequestFailed(e.to_string()))?;

        Ok(channel)
    }
}

/// Extract payload bytes from a channel message.
///
/// Returns `None` for messages that end the stream.
fn payload(msg: Option<ChannelMsg>) -> Option<Vec<u8>> {
    match msg {
        Some(ChannelMsg::Data { data }) => Some(data.to_vec()),
        Some(ChannelMsg::ExtendedData { data, .. }) => Some(data.to_vec()),
        Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) | None => None,
        Some(_) => Some(Vec::new()),
    }
}

impl Transport for SshTransport {
    async fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let channel = self.channel.as_ref().ok_or(TransportError::Disconnected)?;
        tokio::time::timeout(self.timeout, channel.data(data))
            .await
            .map_err(|_| TransportError::Timeout(self.timeout))??;
        trace!("ssh: wrote {} bytes", data.len());
        Ok(())
    }

    async fn read_available(&mut self, max_wait: Duration) -> Result<Vec<u8>, TransportError> {
        if self.eof {
            return Err(TransportError::Disconnected);
        }
        let channel = self.channel.as_mut().ok_or(TransportError::Disconnected)?;
        let deadline = tokio::time::Instant::now() + max_wait;
        let mut out = Vec::new();

        // Wait for the first payload, skipping window adjusts and the like.
        while out.is_empty() {
            let msg = match tokio::time::timeout_at(deadline, channel.wait()).await {
                Ok(msg) => msg,
                Err(_) => return Ok(out),
            };
            match payload(msg) {
                Some(data) => out.extend_from_slice(&data),
                None => {
                    self.eof = true;
                    return Err(TransportError::Disconnected);
                }
            }
        }

        // Drain whatever else is already queued without waiting.
        while let Ok(msg) = tokio::time::timeout(Duration::ZERO, channel.wait()).await {
            match payload(msg) {
                Some(data) => out.extend_from_slice(&data),
                None => {
                    // Hand back what we have; the next read reports the close.
                    self.eof = true;
                    break;
                }
            }
        }

        trace!("ssh: read {} bytes", out.len());
        Ok(out)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        let Some(channel) = self.channel.take() else {
            return Ok(());
        };
        if !self.eof {
            if let Err(e) = channel.eof().await {
                debug!("ssh: failed to send EOF: {}", e);
            }
        }
        self.eof = true;
        self.session
            .disconnect(russh::Disconnect::ByApplication, "", "en")
            .await?;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.channel.is_none() || self.eof
    }
}

/// SSH client handler for russh.
struct SshHandler {
    host: String,
    port: u16,
    host_key_verification: HostKeyVerification,
    known_hosts_path: Option<PathBuf>,
    /// Stores a detailed host-key error so connect() can surface it
    /// instead of the generic russh::Error::UnknownKey.
    host_key_error: Arc<Mutex<Option<TransportError>>>,
}

impl SshHandler {
    /// Check the host key against known_hosts.
    ///
    /// Returns `Ok(true)` if matched, `Ok(false)` if host not found,
    /// `Err(TransportError::HostKeyChanged)` if key changed.
    fn check_known_hosts(&self, pubkey: &PublicKey) -> Result<bool, TransportError> {
        let result = if let Some(ref path) = self.known_hosts_path {
            russh::keys::check_known_hosts_path(&self.host, self.port, pubkey, path)
        } else {
            russh::keys::check_known_hosts(&self.host, self.port, pubkey)
        };

        match result {
            Ok(matched) => Ok(matched),
            Err(russh::keys::Error::KeyChanged { line }) => Err(TransportError::HostKeyChanged {
                host: self.host.clone(),
                port: self.port,
                line,
            }),
            Err(e) => Err(TransportError::KnownHosts(e.to_string())),
        }
    }

    /// Save a new host key to known_hosts.
    fn learn_host_key(&self, pubkey: &PublicKey) -> Result<(), TransportError> {
        let result = if let Some(ref path) = self.known_hosts_path {
            russh::keys::known_hosts::learn_known_hosts_path(&self.host, self.port, pubkey, path)
        } else {
            russh::keys::known_hosts::learn_known_hosts(&self.host, self.port, pubkey)
        };

        result.map_err(|e| TransportError::KnownHosts(e.to_string()))
    }

    fn reject(&self, err: TransportError) -> bool {
        if let Ok(mut slot) = self.host_key_error.lock() {
            *slot = Some(err);
        }
        false
    }
}

impl client::Handler for SshHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        match self.host_key_verification {
            HostKeyVerification::Disabled => Ok(true),

            HostKeyVerification::AcceptNew => match self.check_known_hosts(server_public_key) {
                Ok(true) => Ok(true),
                Ok(false) => {
                    if let Err(e) = self.learn_host_key(server_public_key) {
                        warn!("Failed to save host key: {}", e);
                    }
                    Ok(true)
                }
                Err(e) => Ok(self.reject(e)),
            },

            HostKeyVerification::Strict => match self.check_known_hosts(server_public_key) {
                Ok(true) => Ok(true),
                Ok(false) => Ok(self.reject(TransportError::HostKeyUnknown {
                    host: self.host.clone(),
                    port: self.port,
                })),
                Err(e) => Ok(self.reject(e)),
            },
        }
    }
}
