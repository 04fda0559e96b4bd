//! Session event reporting.
//!
//! The driver reports what happens to an injected [`EventSink`] instead of
//! a process-wide logger. The caller owns the sink's lifecycle.

use std::fmt;
use std::path::Path;

use log::Level;

use crate::device::TransportKind;
use crate::driver::Phase;
use crate::error::Error;

/// Something worth recording about a session.
#[derive(Debug)]
pub enum SessionEvent<'a> {
    /// A backup session is starting.
    Started {
        address: &'a str,
        transport: TransportKind,
    },

    /// The session entered a new phase.
    PhaseEntered { address: &'a str, phase: Phase },

    /// The device answered with `output`, ending at a prompt.
    Output {
        address: &'a str,
        phase: Phase,
        output: &'a [u8],
    },

    /// A configuration was captured.
    Captured { address: &'a str, bytes: usize },

    /// The session failed.
    Failed { address: &'a str, error: &'a Error },

    /// A capture was written to disk.
    Saved { address: &'a str, path: &'a Path },

    /// A directory was created for backups.
    DirectoryCreated { path: &'a Path },
}

impl SessionEvent<'_> {
    /// Severity of the event.
    pub fn level(&self) -> Level {
        match self {
            SessionEvent::Failed { .. } => Level::Error,
            SessionEvent::PhaseEntered { .. } | SessionEvent::Output { .. } => Level::Debug,
            _ => Level::Info,
        }
    }
}

impl fmt::Display for SessionEvent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionEvent::Started { address, transport } => {
                write!(f, "Starting backup of {} using {}", address, transport)
            }
            SessionEvent::PhaseEntered { address, phase } => write!(f, "{}: {}", address, phase),
            SessionEvent::Output {
                address,
                phase,
                output,
            } => write!(
                f,
                "{} [{}]: {}",
                address,
                phase,
                String::from_utf8_lossy(output).trim()
            ),
            SessionEvent::Captured { address, bytes } => {
                write!(f, "Captured {} bytes of configuration from {}", bytes, address)
            }
            SessionEvent::Failed { address, error } => {
                write!(f, "Backup of {} failed: {}", address, error)
            }
            SessionEvent::Saved { address, path } => {
                write!(f, "Configuration of {} saved to {}", address, path.display())
            }
            SessionEvent::DirectoryCreated { path } => {
                write!(f, "Created directory: {}", path.display())
            }
        }
    }
}

/// Receives session events.
pub trait EventSink: Send + Sync {
    /// Record one event.
    fn record(&self, event: &SessionEvent<'_>);

    /// Flush buffered events.
    fn flush(&self) {}
}

/// Forwards events to the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl EventSink for LogSink {
    fn record(&self, event: &SessionEvent<'_>) {
        log::log!(target: "netbackup::event", event.level(), "{}", event);
    }
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn record(&self, _event: &SessionEvent<'_>) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_output_is_debug_level() {
        let event = SessionEvent::Output {
            address: "r1",
            phase: Phase::SuppressingPaging,
            output: b"terminal length 0\r\nR1#",
        };
        assert_eq!(event.level(), Level::Debug);
        assert_eq!(
            event.to_string(),
            "r1 [disabling paging]: terminal length 0\r\nR1#"
        );
    }

    #[test]
    fn test_started_is_info_level() {
        let event = SessionEvent::Started {
            address: "10.0.0.1",
            transport: TransportKind::Ssh,
        };
        assert_eq!(event.level(), Level::Info);
        assert_eq!(event.to_string(), "Starting backup of 10.0.0.1 using ssh");
    }

    #[test]
    fn test_failure_is_error_level() {
        let err = Error::InvalidConfig {
            message: "x".into(),
        };
        let event = SessionEvent::Failed {
            address: "r1",
            error: &err,
        };
        assert_eq!(event.level(), Level::Error);
        assert!(event.to_string().starts_with("Backup of r1 failed"));
    }
}
