use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::size::human_readable_size;

/// One package file held by the store.
///
/// A projection over the filesystem: values are produced by a listing and go
/// stale once the underlying file is renamed or deleted. Two values are equal
/// when their names are equal, regardless of the size string.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedFile {
    /// File name, unique within the store.
    pub name: String,
    /// Human-readable size at listing time (empty when unknown).
    #[serde(default)]
    pub size: String,
}

impl ManagedFile {
    pub fn new(name: impl Into<String>, size: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size: size.into(),
        }
    }
}

impl PartialEq for ManagedFile {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for ManagedFile {}

impl Hash for ManagedFile {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

/// Latest progress of an upload. Only the most recent value is kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferProgress {
    /// Completed fraction in `0.0..=1.0`.
    pub fraction_complete: f64,
    pub bytes_sent: u64,
    pub bytes_total: u64,
}

impl TransferProgress {
    /// Builds a progress value; the fraction is clamped to `0.0..=1.0` and
    /// is `0.0` when the total is unknown (zero).
    pub fn new(bytes_sent: u64, bytes_total: u64) -> Self {
        let fraction_complete = if bytes_total == 0 {
            0.0
        } else {
            (bytes_sent as f64 / bytes_total as f64).clamp(0.0, 1.0)
        };
        Self {
            fraction_complete,
            bytes_sent,
            bytes_total,
        }
    }

    /// Whole percent complete, truncated.
    pub fn percent(&self) -> u32 {
        (self.fraction_complete * 100.0) as u32
    }

    /// Display line, e.g. `"Uploading 1.0 MB of 4.0 MB (25%)"`.
    pub fn describe(&self) -> String {
        format!(
            "Uploading {} of {} ({}%)",
            human_readable_size(self.bytes_sent),
            human_readable_size(self.bytes_total),
            self.percent()
        )
    }
}

/// Lifecycle of an upload session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadState {
    /// Placeholder session holding no transfer handle.
    #[default]
    Idle,
    Uploading,
    Paused,
    Completed,
    Cancelled,
}

impl UploadState {
    /// Returns `true` for states no operation can leave.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn managed_file_equality_is_by_name() {
        let a = ManagedFile::new("a.ipa", "1.0 MB");
        let b = ManagedFile::new("a.ipa", "");
        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(!set.insert(b));
    }

    #[test]
    fn managed_file_field_names() {
        let json = serde_json::to_string(&ManagedFile::new("a.ipa", "2.0 KB")).unwrap();
        assert_eq!(json, r#"{"name":"a.ipa","size":"2.0 KB"}"#);
    }

    #[test]
    fn progress_fraction_and_text() {
        let p = TransferProgress::new(50, 100);
        assert!((p.fraction_complete - 0.5).abs() < f64::EPSILON);
        assert_eq!(p.percent(), 50);
        assert_eq!(p.describe(), "Uploading 50 B of 100 B (50%)");
    }

    #[test]
    fn progress_zero_total_and_overshoot() {
        assert_eq!(TransferProgress::new(10, 0).fraction_complete, 0.0);
        assert_eq!(TransferProgress::new(200, 100).fraction_complete, 1.0);
    }

    #[test]
    fn progress_serializes_camel_case() {
        let json = serde_json::to_string(&TransferProgress::new(1, 4)).unwrap();
        assert!(json.contains("\"fractionComplete\":0.25"));
        assert!(json.contains("\"bytesSent\":1"));
        assert!(json.contains("\"bytesTotal\":4"));
    }

    #[test]
    fn upload_state_terminal() {
        assert!(UploadState::Completed.is_terminal());
        assert!(UploadState::Cancelled.is_terminal());
        assert!(!UploadState::Paused.is_terminal());
        assert_eq!(UploadState::default(), UploadState::Idle);
        assert_eq!(
            serde_json::to_string(&UploadState::Uploading).unwrap(),
            "\"uploading\""
        );
    }
}
