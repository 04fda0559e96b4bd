//! The result of a successful backup session.

use std::borrow::Cow;
use std::time::Duration;

use chrono::{DateTime, Local};

/// How a capture was determined to be complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionReason {
    /// The terminal prompt was seen and stripped from the capture.
    Prompt,

    /// The device went quiet for the idle window.
    Quiescence,
}

/// A captured configuration, ready to be persisted.
///
/// The capture is kept as the exact bytes the device sent. Configurations
/// may carry Latin-1 banners or other non-UTF-8 data, so [`text`](Self::text)
/// is only a display view.
#[derive(Debug, Clone)]
pub struct BackupArtifact {
    /// Device address the configuration came from.
    pub address: String,

    /// The configuration, as sent by the device.
    pub data: Vec<u8>,

    /// When the capture finished.
    pub captured_at: DateTime<Local>,

    /// How the end of output was detected.
    pub completion: CompletionReason,

    /// Time from connect to end of capture.
    pub elapsed: Duration,
}

impl BackupArtifact {
    /// Create an artifact stamped with the current time.
    pub fn new(
        address: impl Into<String>,
        data: impl Into<Vec<u8>>,
        completion: CompletionReason,
        elapsed: Duration,
    ) -> Self {
        Self {
            address: address.into(),
            data: data.into(),
            captured_at: Local::now(),
            completion,
            elapsed,
        }
    }

    /// The raw capture.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// The capture as text, with invalid UTF-8 replaced.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.data)
    }

    /// Number of lines in the capture.
    pub fn line_count(&self) -> usize {
        let newlines = memchr::memchr_iter(b'\n', &self.data).count();
        match self.data.last() {
            Some(b'\n') | None => newlines,
            Some(_) => newlines + 1,
        }
    }

    /// Size of the capture in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the capture holds no data.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl std::fmt::Display for BackupArtifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_utf8_bytes_kept() {
        let artifact = BackupArtifact::new(
            "r1",
            &b"banner motd ^C Caf\xe9 ^C\r\nend\r\n"[..],
            CompletionReason::Prompt,
            Duration::ZERO,
        );
        assert_eq!(artifact.as_bytes()[18], 0xe9);
        assert_eq!(artifact.len(), 29);
        assert!(artifact.text().contains('\u{fffd}'));
    }

    #[test]
    fn test_line_count() {
        let artifact = |data: &str| {
            BackupArtifact::new("r1", data, CompletionReason::Quiescence, Duration::ZERO)
        };
        assert_eq!(artifact("").line_count(), 0);
        assert_eq!(artifact("hostname r1\r\n!\r\nend\r\n").line_count(), 3);
        assert_eq!(artifact("hostname r1\nend").line_count(), 2);
    }
}
