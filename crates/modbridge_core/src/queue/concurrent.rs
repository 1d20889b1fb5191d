//! Concurrent queue backed by the runtime's blocking pool.

use crate::queue::executor::{Executor, Job, QueueClosed};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::runtime::Handle;

/// Runs every job independently; no ordering between jobs.
pub struct ConcurrentQueue {
    label: String,
    handle: Handle,
    closed: AtomicBool,
}

impl ConcurrentQueue {
    pub fn new(label: impl Into<String>, handle: &Handle) -> Self {
        Self {
            label: label.into(),
            handle: handle.clone(),
            closed: AtomicBool::new(false),
        }
    }
}

impl Executor for ConcurrentQueue {
    fn label(&self) -> &str {
        &self.label
    }

    fn submit(&self, job: Job) -> Result<(), QueueClosed> {
        if self.is_closed() {
            return Err(QueueClosed::new(self.label.as_str(), job));
        }
        drop(self.handle.spawn_blocking(job));
        Ok(())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
