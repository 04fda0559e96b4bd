//! Writing captures to disk.
//!
//! Files are named `<address>_<YYYYmmdd_HHMMSS>.txt`, with every character
//! of the address outside `[A-Za-z0-9_.-]` replaced by `_`.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::driver::BackupArtifact;
use crate::error::StorageError;

/// Marker line written at the top of partial captures.
pub const PARTIAL_MARKER: &str = "! PARTIAL CAPTURE - completion was not detected";

/// Make a device address safe for use in a file name.
pub fn sanitize_address(address: &str) -> String {
    address
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Sortable timestamp for file names.
pub fn file_timestamp(at: &DateTime<Local>) -> String {
    at.format("%Y%m%d_%H%M%S").to_string()
}

/// Writes backup files into an output directory.
#[derive(Debug, Clone)]
pub struct BackupWriter {
    output_dir: PathBuf,
}

impl BackupWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// The output directory.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Create the output directory if it does not exist.
    ///
    /// Returns `true` if the directory was created.
    pub fn ensure_dir(&self) -> Result<bool, StorageError> {
        if self.output_dir.is_dir() {
            return Ok(false);
        }
        fs::create_dir_all(&self.output_dir).map_err(|source| StorageError::CreateDir {
            path: self.output_dir.clone(),
            source,
        })?;
        Ok(true)
    }

    /// Path a capture of `address` taken at `at` is written to.
    pub fn path_for(&self, address: &str, at: &DateTime<Local>, partial: bool) -> PathBuf {
        let suffix = if partial { ".partial.txt" } else { ".txt" };
        self.output_dir.join(format!(
            "{}_{}{}",
            sanitize_address(address),
            file_timestamp(at),
            suffix
        ))
    }

    /// Write a complete capture.
    pub fn write(&self, artifact: &BackupArtifact) -> Result<PathBuf, StorageError> {
        if artifact.is_empty() {
            return Err(StorageError::Empty);
        }
        let path = self.path_for(&artifact.address, &artifact.captured_at, false);
        self.write_file(&path, artifact.as_bytes())?;
        Ok(path)
    }

    /// Write a partial capture, prefixed with [`PARTIAL_MARKER`].
    pub fn write_partial(&self, address: &str, data: &[u8]) -> Result<PathBuf, StorageError> {
        if data.is_empty() {
            return Err(StorageError::Empty);
        }
        let path = self.path_for(address, &Local::now(), true);
        let mut contents = Vec::with_capacity(PARTIAL_MARKER.len() + 1 + data.len());
        contents.extend_from_slice(PARTIAL_MARKER.as_bytes());
        contents.push(b'\n');
        contents.extend_from_slice(data);
        self.write_file(&path, &contents)?;
        Ok(path)
    }

    fn write_file(&self, path: &Path, contents: &[u8]) -> Result<(), StorageError> {
        fs::write(path, contents).map_err(|source| StorageError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::TimeZone;

    use super::*;
    use crate::driver::CompletionReason;

    #[test]
    fn test_sanitize_address() {
        assert_eq!(sanitize_address("192.168.1.1"), "192.168.1.1");
        assert_eq!(sanitize_address("core-sw_01.lab"), "core-sw_01.lab");
        assert_eq!(sanitize_address("fe80::1%eth0"), "fe80__1_eth0");
        assert_eq!(sanitize_address("a b/c"), "a_b_c");
    }

    #[test]
    fn test_path_for() {
        let writer = BackupWriter::new("/backups");
        let at = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(
            writer.path_for("10.0.0.1", &at, false),
            PathBuf::from("/backups/10.0.0.1_20240309_070501.txt")
        );
        assert_eq!(
            writer.path_for("r1", &at, true),
            PathBuf::from("/backups/r1_20240309_070501.partial.txt")
        );
    }

    #[test]
    fn test_write_creates_directory_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let writer = BackupWriter::new(dir.path().join("nested/backups"));
        assert!(writer.ensure_dir().unwrap());
        assert!(!writer.ensure_dir().unwrap());

        let artifact = BackupArtifact::new(
            "r1",
            "hostname r1\n!\nend\n",
            CompletionReason::Prompt,
            Duration::from_secs(1),
        );
        let path = writer.write(&artifact).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hostname r1\n!\nend\n");
        assert!(path.file_name().unwrap().to_string_lossy().starts_with("r1_"));
    }

    #[test]
    fn test_write_keeps_non_utf8_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let writer = BackupWriter::new(dir.path());
        let data = b"banner motd ^C Caf\xe9 ^C\r\nend\r\n";

        let artifact =
            BackupArtifact::new("r1", &data[..], CompletionReason::Prompt, Duration::ZERO);
        let path = writer.write(&artifact).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), data);
    }

    #[test]
    fn test_write_partial_has_marker() {
        let dir = tempfile::tempdir().unwrap();
        let writer = BackupWriter::new(dir.path());
        let path = writer.write_partial("r1", b"hostname r1\n").unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with(PARTIAL_MARKER));
        assert!(contents.ends_with("hostname r1\n"));
        assert!(path.to_string_lossy().ends_with(".partial.txt"));
    }

    #[test]
    fn test_empty_capture_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let writer = BackupWriter::new(dir.path());
        assert!(matches!(
            writer.write_partial("r1", b""),
            Err(StorageError::Empty)
        ));
    }
}
