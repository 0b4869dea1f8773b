//! Change signatures
//!
//! A signature is a `(modification time, size)` pair. Equality is the sole
//! change-detection rule: content edits that preserve both go unnoticed by
//! design. The string encoding `"<timestamp>:<size>"` is a persistence
//! contract other tooling may rely on.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::UNIX_EPOCH;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("malformed signature [{0}]: expected <timestamp>:<size>")]
    Malformed(String),
}

/// Cheap change indicator for one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Signature {
    /// Modification time, seconds since the unix epoch
    pub mtime: i64,
    pub size: u64,
}

impl Signature {
    pub fn new(mtime: i64, size: u64) -> Self {
        Self { mtime, size }
    }

    /// Signature from stat metadata. Files with a modification time the
    /// platform cannot report get an mtime of 0 rather than an error.
    pub fn from_metadata(meta: &std::fs::Metadata) -> Self {
        let mtime = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        Self {
            mtime,
            size: meta.len(),
        }
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.mtime, self.size)
    }
}

impl FromStr for Signature {
    type Err = SignatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (mtime, size) = s
            .split_once(':')
            .ok_or_else(|| SignatureError::Malformed(s.to_string()))?;
        let mtime = mtime
            .parse()
            .map_err(|_| SignatureError::Malformed(s.to_string()))?;
        let size = size
            .parse()
            .map_err(|_| SignatureError::Malformed(s.to_string()))?;
        Ok(Self { mtime, size })
    }
}
