//! Shared chunked-read / progress-report helper for streaming providers

use crate::provider::StorageError;
use std::path::Path;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Fixed transfer chunk size: 1 MiB.
pub const CHUNK_SIZE: usize = 1024 * 1024;

/// Transfer percentage for `written` of `total` bytes, clamped to 100.
/// An empty file is complete the moment it exists.
pub fn percent(written: u64, total: u64) -> f64 {
    if total == 0 {
        return 100.0;
    }
    (100.0 * written as f64 / total as f64).min(100.0)
}

/// Stream `from` into `to` in fixed-size chunks, invoking `report` with
/// `(bytes_written, total_size)` after every chunk. Missing destination
/// directories are created; the destination is truncated and flushed on
/// completion. Returns the number of bytes written.
pub async fn copy_chunked<F>(from: &Path, to: &Path, mut report: F) -> Result<u64, StorageError>
where
    F: FnMut(u64, u64),
{
    let mut src = File::open(from).await.map_err(|source| StorageError::Source {
        path: from.to_path_buf(),
        source,
    })?;
    let total = src
        .metadata()
        .await
        .map_err(|source| StorageError::Source {
            path: from.to_path_buf(),
            source,
        })?
        .len();

    if let Some(parent) = to.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| StorageError::Destination {
                path: parent.to_path_buf(),
                source,
            })?;
    }

    let dest_err = |source| StorageError::Destination {
        path: to.to_path_buf(),
        source,
    };
    let mut dst = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(to)
        .await
        .map_err(dest_err)?;

    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut written: u64 = 0;
    loop {
        let n = src.read(&mut buf).await.map_err(|source| StorageError::Source {
            path: from.to_path_buf(),
            source,
        })?;
        if n == 0 {
            break;
        }
        dst.write_all(&buf[..n]).await.map_err(dest_err)?;
        written += n as u64;
        report(written, total);
    }

    dst.flush().await.map_err(dest_err)?;
    if total == 0 {
        // No chunks were read; still report the terminal state.
        report(0, 0);
    }
    Ok(written)
}
