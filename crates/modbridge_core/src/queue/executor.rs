//! Executor seam shared by every queue kind.

use std::fmt::{Debug, Formatter};
use thiserror::Error;

/// Unit of work submitted to a queue.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Submission refused because the queue no longer accepts work.
///
/// Carries the rejected job back so the caller decides when it is dropped.
#[derive(Error)]
#[error("queue `{queue}` is closed")]
pub struct QueueClosed {
    pub queue: String,
    pub job: Job,
}

impl QueueClosed {
    pub fn new(queue: impl Into<String>, job: Job) -> Self {
        Self {
            queue: queue.into(),
            job,
        }
    }

    pub fn into_job(self) -> Job {
        self.job
    }
}

impl Debug for QueueClosed {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueClosed")
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}

/// Execution context for invocation jobs.
pub trait Executor: Send + Sync {
    fn label(&self) -> &str;

    /// Enqueues `job`; never runs it on the calling thread.
    fn submit(&self, job: Job) -> Result<(), QueueClosed>;

    /// Stops accepting new jobs.
    fn close(&self);

    fn is_closed(&self) -> bool;
}
