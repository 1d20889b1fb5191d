//! Execution queues for exported method invocations.
//!
//! # Responsibility
//! - Provide the main, default and named executors a module can bind to.
//! - Build the tokio runtime that backs serial and concurrent queues.
//!
//! # Invariants
//! - `submit` never runs a job on the caller's thread.
//! - A closed queue hands the job back instead of dropping it silently.

pub mod concurrent;
pub mod executor;
pub mod main_queue;
pub mod runtime;
pub mod serial;
pub mod set;

use thiserror::Error;

pub use concurrent::ConcurrentQueue;
pub use executor::{Executor, Job, QueueClosed};
pub use main_queue::MainQueue;
pub use runtime::{build_runtime, RuntimeConfig};
pub use serial::SerialQueue;
pub use set::{QueueKind, QueueSet, QueueSpec};

/// Queue construction errors.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue label is invalid: `{0}`")]
    InvalidLabel(String),
    #[error("queue label `{0}` is reserved")]
    ReservedLabel(String),
    #[error("queue already registered: {0}")]
    DuplicateQueue(String),
    #[error("failed to build queue runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

impl PartialEq for QueueError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::InvalidLabel(a), Self::InvalidLabel(b))
            | (Self::ReservedLabel(a), Self::ReservedLabel(b))
            | (Self::DuplicateQueue(a), Self::DuplicateQueue(b)) => a == b,
            (Self::Runtime(a), Self::Runtime(b)) => a.kind() == b.kind(),
            _ => false,
        }
    }
}
