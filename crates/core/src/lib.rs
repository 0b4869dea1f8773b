//! Shared data model for the Arca backup engine
//!
//! Everything that crosses a component boundary lives here: file change
//! events, change signatures, transfer progress and status reports, and
//! the message type used for error notifications.

pub mod event;
pub mod signature;
pub mod status;

pub use event::{Action, FileEvent};
pub use signature::{Signature, SignatureError};
pub use status::{BackupStatus, Message, MessageLevel, Progress, Status, TransferOutcome};
