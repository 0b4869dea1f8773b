//! Pluggable backup destinations
//!
//! A [`StorageProvider`] durably stores a copy of one file per dispatched
//! event. The [`StorageRegistry`] holds the active set of named providers
//! and the in-flight duplication guard. Two reference providers ship here:
//! a chunk-streaming local copy and a folder-mirroring remote upload
//! behind the [`remote::RemoteClient`] seam.

mod chunked;
mod guard;
pub mod local;
pub mod memory;
pub mod provider;
pub mod registry;
pub mod remote;

pub use chunked::{copy_chunked, percent, CHUNK_SIZE};
pub use guard::InProgressGuard;
pub use local::LocalProvider;
pub use memory::MemoryClient;
pub use provider::{ProgressSink, StorageError, StorageProvider};
pub use registry::StorageRegistry;
pub use remote::{RemoteClient, RemoteProvider};
