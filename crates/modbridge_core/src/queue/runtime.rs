//! Tokio runtime profile for bridge queues.
//!
//! # Invariants
//! - Worker threads are clamped to `1..=1024`.
//! - Stack size is clamped to `1 MiB..=16 MiB`.
//! - Thread name is never blank.

use crate::queue::QueueError;
use log::debug;
use std::thread::available_parallelism;
use std::time::Duration;
use tokio::runtime::{Builder, Runtime};

const DEFAULT_WORKER_THREADS: usize = 4;
const DEFAULT_STACK_SIZE: usize = 3 * 1024 * 1024;
const MIN_STACK_SIZE: usize = 1024 * 1024;
const MAX_STACK_SIZE: usize = 16 * 1024 * 1024;
const MAX_WORKER_THREADS: usize = 1024;
const THREAD_KEEP_ALIVE: Duration = Duration::from_secs(60);
pub const DEFAULT_THREAD_NAME: &str = "modbridge-worker";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub worker_threads: usize,
    pub stack_size: usize,
    pub thread_name: String,
    pub thread_keep_alive: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            worker_threads: detected_worker_threads(),
            stack_size: DEFAULT_STACK_SIZE,
            thread_name: DEFAULT_THREAD_NAME.to_string(),
            thread_keep_alive: THREAD_KEEP_ALIVE,
        }
    }
}

impl RuntimeConfig {
    #[must_use]
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads.clamp(1, MAX_WORKER_THREADS);
        self
    }

    #[must_use]
    pub fn with_stack_size(mut self, size: usize) -> Self {
        self.stack_size = size.clamp(MIN_STACK_SIZE, MAX_STACK_SIZE);
        self
    }

    #[must_use]
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.thread_name = if name.trim().is_empty() {
            DEFAULT_THREAD_NAME.to_string()
        } else {
            name
        };
        self
    }

    fn normalized(&self) -> Self {
        self.clone()
            .with_worker_threads(self.worker_threads)
            .with_stack_size(self.stack_size)
            .with_thread_name(self.thread_name.clone())
    }
}

fn detected_worker_threads() -> usize {
    available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(DEFAULT_WORKER_THREADS)
}

/// Builds the multi-thread runtime that hosts serial and concurrent queues.
pub fn build_runtime(config: &RuntimeConfig) -> Result<Runtime, QueueError> {
    let config = config.normalized();
    debug!(
        "event=runtime_build module=queue status=start worker_threads={} stack_size={} thread_name={}",
        config.worker_threads, config.stack_size, config.thread_name
    );

    Builder::new_multi_thread()
        .worker_threads(config.worker_threads)
        .thread_name(config.thread_name.as_str())
        .thread_stack_size(config.stack_size)
        .thread_keep_alive(config.thread_keep_alive)
        .enable_all()
        .build()
        .map_err(QueueError::Runtime)
}
