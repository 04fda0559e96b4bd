//! # netbackup
//!
//! Async configuration backup for network devices over an interactive
//! command line.
//!
//! netbackup logs into a device over SSH or Telnet, escalates privilege
//! where the family has a privileged mode, disables paging, dumps the
//! running configuration and decides when the dump is finished, either by
//! spotting the device prompt or by waiting for the output to go quiet.
//!
//! ## Features
//!
//! - SSH via russh (PTY shell channel) and plaintext Telnet
//! - Cisco IOS, Cisco NX-OS and Juniper JUNOS dialects
//! - Efficient tail search for prompt detection
//! - Typed failures that name the phase and the device
//! - Injected event sink instead of global logging state
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use netbackup::{BackupWriter, SessionBuilder, TransportKind};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), netbackup::Error> {
//!     let driver = SessionBuilder::new("192.168.1.1")
//!         .username("admin")
//!         .password("secret")
//!         .family("cisco_ios")
//!         .transport(TransportKind::Telnet)
//!         .build()?;
//!
//!     let artifact = driver.run().await?;
//!
//!     let writer = BackupWriter::new("./backups");
//!     writer.ensure_dir()?;
//!     let path = writer.write(&artifact)?;
//!     println!("saved {}", path.display());
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod device;
pub mod dialect;
pub mod driver;
pub mod error;
pub mod event;
pub mod storage;
pub mod transport;

// Re-export main types for convenience
pub use device::{Credentials, DeviceDescriptor, TransportKind};
pub use dialect::{DeviceFamily, Dialect, dialect_for};
pub use driver::{
    BackupArtifact, CompletionReason, CompletionStrategy, Phase, SessionBuilder, SessionConfig,
    SessionDriver,
};
pub use error::{Error, FailureKind, SessionError, TransportError};
pub use event::{EventSink, LogSink, SessionEvent};
pub use storage::BackupWriter;
pub use transport::{Connector, NetworkConnector, Transport, TransportConfig};
