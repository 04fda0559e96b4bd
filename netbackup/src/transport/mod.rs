//! Transport layer: byte streams to a device's command line.
//!
//! Two transports are provided. [`TelnetTransport`] is a plaintext TCP
//! stream where login is an ordinary prompt exchange driven by the session.
//! [`SshTransport`] wraps a russh PTY shell channel; authentication happens
//! inside connect, before any application bytes flow.

pub mod config;
mod ssh;
mod telnet;

pub use config::{HostKeyVerification, TransportConfig};
pub use ssh::SshTransport;
pub use telnet::{TelnetCodec, TelnetTransport};

use std::future::Future;
use std::time::Duration;

use crate::device::{Credentials, DeviceDescriptor, TransportKind};
use crate::error::TransportError;

/// A full-duplex byte stream to a device.
///
/// `read_available` distinguishes "nothing yet" (an empty vector) from
/// "connection closed" (`Err(TransportError::Disconnected)`).
pub trait Transport: Send {
    /// Send bytes. Bounded by the transport's configured timeout.
    fn write(&mut self, data: &[u8]) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Return whatever arrives within `max_wait`, possibly nothing.
    fn read_available(
        &mut self,
        max_wait: Duration,
    ) -> impl Future<Output = Result<Vec<u8>, TransportError>> + Send;

    /// Release the connection. Calling it again is a no-op.
    fn close(&mut self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Whether the stream has been closed by either side.
    fn is_closed(&self) -> bool;
}

/// Opens transports for devices.
pub trait Connector: Send + Sync {
    /// The stream type produced.
    type Stream: Transport;

    /// Establish a stream to the device.
    fn open(
        &self,
        device: &DeviceDescriptor,
        credentials: &Credentials,
        config: &TransportConfig,
    ) -> impl Future<Output = Result<Self::Stream, TransportError>> + Send;
}

/// Connector for real devices over Telnet or SSH.
#[derive(Debug, Clone, Copy, Default)]
pub struct NetworkConnector;

impl Connector for NetworkConnector {
    type Stream = DeviceStream;

    async fn open(
        &self,
        device: &DeviceDescriptor,
        credentials: &Credentials,
        config: &TransportConfig,
    ) -> Result<DeviceStream, TransportError> {
        match device.transport {
            TransportKind::Telnet => {
                let stream = TelnetTransport::connect(&device.address, device.port(), config).await?;
                Ok(DeviceStream::Telnet(stream))
            }
            TransportKind::Ssh => {
                let stream =
                    SshTransport::connect(&device.address, device.port(), credentials, config)
                        .await?;
                Ok(DeviceStream::Ssh(Box::new(stream)))
            }
        }
    }
}

/// A stream opened by [`NetworkConnector`].
pub enum DeviceStream {
    Telnet(TelnetTransport),
    Ssh(Box<SshTransport>),
}

impl Transport for DeviceStream {
    async fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        match self {
            DeviceStream::Telnet(t) => t.write(data).await,
            DeviceStream::Ssh(t) => t.write(data).await,
        }
    }

    async fn read_available(&mut self, max_wait: Duration) -> Result<Vec<u8>, TransportError> {
        match self {
            DeviceStream::Telnet(t) => t.read_available(max_wait).await,
            DeviceStream::Ssh(t) => t.read_available(max_wait).await,
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        match self {
            DeviceStream::Telnet(t) => t.close().await,
            DeviceStream::Ssh(t) => t.close().await,
        }
    }

    fn is_closed(&self) -> bool {
        match self {
            DeviceStream::Telnet(t) => t.is_closed(),
            DeviceStream::Ssh(t) => t.is_closed(),
        }
    }
}
