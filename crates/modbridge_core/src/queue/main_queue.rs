//! Main queue: jobs wait until the host's main loop pumps them.
//!
//! # Invariants
//! - Nothing runs until `run_pending`/`run_until_idle` is called.
//! - Jobs run on the pumping thread, in submission order.
//! - A panicking job does not stop the pump.

use crate::logging::describe_panic;
use crate::module::MAIN_QUEUE_LABEL;
use crate::queue::executor::{Executor, Job, QueueClosed};
use log::error;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Default)]
pub struct MainQueue {
    jobs: Mutex<VecDeque<Job>>,
    closed: AtomicBool,
}

impl MainQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending_len(&self) -> usize {
        self.jobs.lock().len()
    }

    /// Runs jobs queued before this call; returns how many ran.
    pub fn run_pending(&self) -> usize {
        let batch = std::mem::take(&mut *self.jobs.lock());
        let count = batch.len();
        for job in batch {
            run_job(job);
        }
        count
    }

    /// Runs jobs until the queue is empty, including jobs queued meanwhile.
    pub fn run_until_idle(&self) -> usize {
        let mut total = 0;
        loop {
            let ran = self.run_pending();
            if ran == 0 {
                return total;
            }
            total += ran;
        }
    }
}

fn run_job(job: Job) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
        error!(
            "event=queue_job module=queue status=error queue={} error={}",
            MAIN_QUEUE_LABEL,
            describe_panic(&*payload)
        );
    }
}

impl Executor for MainQueue {
    fn label(&self) -> &str {
        MAIN_QUEUE_LABEL
    }

    fn submit(&self, job: Job) -> Result<(), QueueClosed> {
        if self.is_closed() {
            return Err(QueueClosed::new(MAIN_QUEUE_LABEL, job));
        }
        self.jobs.lock().push_back(job);
        Ok(())
    }

    /// Stops accepting jobs and drops the ones still waiting.
    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let dropped = std::mem::take(&mut *self.jobs.lock());
        drop(dropped);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
