//! Serial queue: one job at a time, in submission order.
//!
//! # Invariants
//! - Jobs run strictly FIFO and never overlap.
//! - Job bodies run on the blocking pool so they may block freely.

use crate::queue::executor::{Executor, Job, QueueClosed};
use log::{debug, error};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::mpsc;

pub struct SerialQueue {
    label: String,
    sender: Mutex<Option<mpsc::UnboundedSender<Job>>>,
}

impl SerialQueue {
    /// Spawns the drain task for `label` on `handle`.
    pub fn new(label: impl Into<String>, handle: &Handle) -> Self {
        let label = label.into();
        let (sender, mut receiver) = mpsc::unbounded_channel::<Job>();
        let task_label = label.clone();
        handle.spawn(async move {
            while let Some(job) = receiver.recv().await {
                if let Err(err) = tokio::task::spawn_blocking(job).await {
                    error!(
                        "event=queue_job module=queue status=error queue={} error={}",
                        task_label, err
                    );
                }
            }
            debug!("event=queue_drain module=queue status=ok queue={task_label}");
        });

        Self {
            label,
            sender: Mutex::new(Some(sender)),
        }
    }
}

impl Executor for SerialQueue {
    fn label(&self) -> &str {
        &self.label
    }

    fn submit(&self, job: Job) -> Result<(), QueueClosed> {
        let sender = self.sender.lock();
        let Some(sender) = sender.as_ref() else {
            return Err(QueueClosed::new(self.label.as_str(), job));
        };
        sender
            .send(job)
            .map_err(|rejected| QueueClosed::new(self.label.as_str(), rejected.0))
    }

    fn close(&self) {
        self.sender.lock().take();
    }

    fn is_closed(&self) -> bool {
        self.sender
            .lock()
            .as_ref()
            .map_or(true, mpsc::UnboundedSender::is_closed)
    }
}

#[cfg(test)]
mod tests {
    use super::SerialQueue;
    use crate::queue::executor::Executor;
    use parking_lot::Mutex;
    use std::sync::mpsc;
    use std::sync::Arc;
    use std::time::Duration;

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .build()
            .expect("build runtime")
    }

    #[test]
    fn runs_jobs_in_submission_order() {
        let runtime = runtime();
        let queue = SerialQueue::new("io", runtime.handle());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (done_tx, done_rx) = mpsc::channel();

        for index in 0..32 {
            let seen = Arc::clone(&seen);
            queue
                .submit(Box::new(move || {
                    if index % 3 == 0 {
                        std::thread::sleep(Duration::from_millis(1));
                    }
                    seen.lock().push(index);
                }))
                .expect("submit");
        }
        queue
            .submit(Box::new(move || {
                let _ = done_tx.send(());
            }))
            .expect("submit marker");

        done_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("queue drained");
        assert_eq!(*seen.lock(), (0..32).collect::<Vec<_>>());
    }

    #[test]
    fn closed_queue_returns_job() {
        let runtime = runtime();
        let queue = SerialQueue::new("io", runtime.handle());
        queue.close();
        assert!(queue.is_closed());

        let err = queue.submit(Box::new(|| {})).expect_err("closed queue");
        assert_eq!(err.queue, "io");
    }
}
