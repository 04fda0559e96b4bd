//! Session driver for configuration backups.
//!
//! The driver walks a device through login, optional privilege
//! escalation, paging suppression and the configuration dump, then hands
//! back the captured text as a [`BackupArtifact`].

mod artifact;
mod builder;
mod completion;
mod config;
mod phase;
mod session;

pub use artifact::{BackupArtifact, CompletionReason};
pub use builder::SessionBuilder;
pub use completion::{CompletionDetector, CompletionStrategy, Observation, Verdict};
pub use config::SessionConfig;
pub use phase::Phase;
pub use session::SessionDriver;
