//! Progress and status reports flowing out of the engine

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// A moment of transfer progress for one file on one provider.
///
/// `percent` is monotonically non-decreasing per transfer and ends at 100.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Progress {
    #[serde(rename = "storage")]
    pub storage_name: String,
    #[serde(rename = "file")]
    pub file_name: String,
    #[serde(rename = "path")]
    pub absolute_path: PathBuf,
    pub id: Uuid,
    pub percent: f64,
}

/// Coarse engine state as seen by subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Waiting,
    Uploading,
}

/// Summary emitted by the scheduler during and after each dispatch cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupStatus {
    pub total_files: usize,
    pub files_in_progress: usize,
    pub files_done: usize,
    pub status: Status,
}

impl BackupStatus {
    /// The terminal report after a dispatch pass: everything quiet.
    pub fn waiting() -> Self {
        Self {
            total_files: 0,
            files_in_progress: 0,
            files_done: 0,
            status: Status::Waiting,
        }
    }
}

/// Completion signal for one dispatched file.
///
/// Exactly one outcome is produced per dispatched file, success or failure;
/// anything else leaks a concurrency slot in the scheduler.
#[derive(Debug, Clone)]
pub struct TransferOutcome {
    pub absolute_path: PathBuf,
    pub success: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageLevel {
    Info,
    Error,
}

/// Error/message notification forwarded to subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub level: MessageLevel,
    pub text: String,
    /// Component that produced the message (watch name or provider name)
    pub source: String,
}

impl Message {
    pub fn error(text: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Error,
            text: text.into(),
            source: source.into(),
        }
    }

    pub fn info(text: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Info,
            text: text.into(),
            source: source.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_serializes_with_contract_keys() {
        let p = Progress {
            storage_name: "local".into(),
            file_name: "a.txt".into(),
            absolute_path: PathBuf::from("/data/a.txt"),
            id: Uuid::nil(),
            percent: 42.0,
        };
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["storage"], "local");
        assert_eq!(json["file"], "a.txt");
        assert_eq!(json["path"], "/data/a.txt");
        assert_eq!(json["percent"], 42.0);
    }

    #[test]
    fn waiting_status_is_all_zero() {
        let s = BackupStatus::waiting();
        assert_eq!(s.total_files, 0);
        assert_eq!(s.files_in_progress, 0);
        assert_eq!(s.files_done, 0);
        assert_eq!(s.status, Status::Waiting);
    }
}
