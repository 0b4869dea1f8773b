//! Durable per-watch-root snapshot state
//!
//! Each watched root owns one embedded key-value database mapping absolute
//! file paths to change signatures. The database seeds the startup backlog
//! after a restart and records last-known state as transfers complete.

pub mod seed;
pub mod store;

pub use store::{SnapshotError, SnapshotStore, DEFAULT_SNAPSHOT_DIR};
