//! Application Layer - async orchestration of the core
//!
//! - `engine`: per-token sharded event processing, revalidation, and
//!   alert emission
//! - `scheduler`: cancellable deferred outcome checks feeding the
//!   wallet scorer

pub mod engine;
pub mod scheduler;

pub use engine::{CorrelationEngine, EngineConfig, EngineError, IngestResult};
pub use scheduler::OutcomeScheduler;

/// Current unix time in seconds
pub(crate) fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
