//! The Arca backup engine
//!
//! Continuously mirrors watched directory trees onto configured storage
//! backends. Watchers push normalized file events into a coalescing
//! scheduler; the scheduler flushes on a timer under a concurrency
//! ceiling; the router fans each dispatched file out to every provider
//! and records durable snapshot state on success. Progress, status, and
//! error streams are broadcast to any number of subscribers.

pub mod config;
pub mod engine;
pub mod router;
pub mod scheduler;

pub use config::{Config, ConfigError};
pub use engine::{Engine, EngineError, RunningEngine};
pub use router::TransferRouter;
pub use scheduler::EventScheduler;
