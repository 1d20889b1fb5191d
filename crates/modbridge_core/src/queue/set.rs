//! Queue set: the executors a dispatcher may target.

use crate::module::{MethodQueue, DEFAULT_QUEUE_LABEL, MAIN_QUEUE_LABEL};
use crate::queue::concurrent::ConcurrentQueue;
use crate::queue::executor::Executor;
use crate::queue::main_queue::MainQueue;
use crate::queue::serial::SerialQueue;
use crate::queue::QueueError;
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::runtime::Handle;

/// Scheduling behavior of a named queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueKind {
    #[default]
    Serial,
    Concurrent,
}

/// Declaration of one named queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSpec {
    pub name: String,
    #[serde(default)]
    pub kind: QueueKind,
}

impl QueueSpec {
    pub fn serial(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: QueueKind::Serial,
        }
    }

    pub fn concurrent(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: QueueKind::Concurrent,
        }
    }
}

/// Main queue, shared default queue, and named queues.
pub struct QueueSet {
    main: Arc<MainQueue>,
    default: Arc<dyn Executor>,
    named: BTreeMap<String, Arc<dyn Executor>>,
}

impl QueueSet {
    pub fn new(main: Arc<MainQueue>, default: Arc<dyn Executor>) -> Self {
        Self {
            main,
            default,
            named: BTreeMap::new(),
        }
    }

    /// Fresh main queue plus a concurrent default queue on `handle`.
    pub fn with_runtime(handle: &Handle) -> Self {
        Self::new(
            Arc::new(MainQueue::new()),
            Arc::new(ConcurrentQueue::new(DEFAULT_QUEUE_LABEL, handle)),
        )
    }

    /// Builds the set and every declared queue on `handle`.
    pub fn from_specs(specs: &[QueueSpec], handle: &Handle) -> Result<Self, QueueError> {
        let mut queues = Self::with_runtime(handle);
        for spec in specs {
            queues.add(spec, handle)?;
        }
        Ok(queues)
    }

    pub fn add(&mut self, spec: &QueueSpec, handle: &Handle) -> Result<(), QueueError> {
        let label = validate_label(&spec.name)?;
        if self.named.contains_key(label.as_str()) {
            return Err(QueueError::DuplicateQueue(label));
        }
        let executor: Arc<dyn Executor> = match spec.kind {
            QueueKind::Serial => Arc::new(SerialQueue::new(label.clone(), handle)),
            QueueKind::Concurrent => Arc::new(ConcurrentQueue::new(label.clone(), handle)),
        };
        self.named.insert(label.clone(), executor);
        info!(
            "event=queue_add module=queue status=ok queue={} kind={:?}",
            label, spec.kind
        );
        Ok(())
    }

    /// Adds an externally built executor under its own label.
    pub fn insert(&mut self, executor: Arc<dyn Executor>) -> Result<(), QueueError> {
        let label = validate_label(executor.label())?;
        if self.named.contains_key(label.as_str()) {
            return Err(QueueError::DuplicateQueue(label));
        }
        self.named.insert(label, executor);
        Ok(())
    }

    pub fn contains(&self, label: &str) -> bool {
        matches!(label, MAIN_QUEUE_LABEL | DEFAULT_QUEUE_LABEL) || self.named.contains_key(label)
    }

    pub fn main(&self) -> &Arc<MainQueue> {
        &self.main
    }

    /// Sorted labels of every queue, reserved ones included.
    pub fn labels(&self) -> Vec<String> {
        let mut labels = vec![DEFAULT_QUEUE_LABEL.to_string(), MAIN_QUEUE_LABEL.to_string()];
        labels.extend(self.named.keys().cloned());
        labels.sort();
        labels
    }

    pub fn resolve(&self, queue: &MethodQueue) -> Option<Arc<dyn Executor>> {
        match queue {
            MethodQueue::Main => Some(Arc::clone(&self.main) as Arc<dyn Executor>),
            MethodQueue::Default => Some(Arc::clone(&self.default)),
            MethodQueue::Named(label) => self.named.get(label.as_str()).cloned(),
        }
    }

    /// Closes every queue; later submissions fail.
    pub fn close_all(&self) {
        for executor in self.named.values() {
            executor.close();
        }
        self.default.close();
        self.main.close();
    }
}

fn validate_label(raw: &str) -> Result<String, QueueError> {
    let label = raw.trim();
    if label.is_empty() {
        return Err(QueueError::InvalidLabel(raw.to_string()));
    }
    if label == MAIN_QUEUE_LABEL || label == DEFAULT_QUEUE_LABEL {
        return Err(QueueError::ReservedLabel(label.to_string()));
    }
    Ok(label.to_string())
}

#[cfg(test)]
mod tests {
    use super::{QueueKind, QueueSet, QueueSpec};
    use crate::module::MethodQueue;
    use crate::queue::QueueError;

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .build()
            .expect("build runtime")
    }

    #[test]
    fn resolves_reserved_and_named_queues() {
        let runtime = runtime();
        let queues = QueueSet::from_specs(
            &[QueueSpec::serial("storage"), QueueSpec::concurrent("net")],
            runtime.handle(),
        )
        .expect("queue set");

        assert_eq!(
            queues.resolve(&MethodQueue::Main).expect("main").label(),
            "main"
        );
        assert_eq!(
            queues
                .resolve(&MethodQueue::Default)
                .expect("default")
                .label(),
            "default"
        );
        assert_eq!(
            queues
                .resolve(&MethodQueue::named("storage"))
                .expect("storage")
                .label(),
            "storage"
        );
        assert!(queues.resolve(&MethodQueue::named("missing")).is_none());
        assert_eq!(queues.labels(), vec!["default", "main", "net", "storage"]);
    }

    #[test]
    fn rejects_reserved_duplicate_and_blank_labels() {
        let runtime = runtime();
        let mut queues = QueueSet::with_runtime(runtime.handle());

        let err = queues
            .add(&QueueSpec::serial("main"), runtime.handle())
            .expect_err("reserved");
        assert_eq!(err, QueueError::ReservedLabel("main".to_string()));

        queues
            .add(&QueueSpec::serial("io"), runtime.handle())
            .expect("first io");
        let err = queues
            .add(&QueueSpec::concurrent(" io "), runtime.handle())
            .expect_err("duplicate");
        assert_eq!(err, QueueError::DuplicateQueue("io".to_string()));

        let err = queues
            .add(&QueueSpec::serial(" "), runtime.handle())
            .expect_err("blank");
        assert!(matches!(err, QueueError::InvalidLabel(_)));
    }

    #[test]
    fn close_all_closes_every_queue() {
        let runtime = runtime();
        let queues =
            QueueSet::from_specs(&[QueueSpec::serial("io")], runtime.handle()).expect("queue set");
        queues.close_all();

        for queue in [
            MethodQueue::Main,
            MethodQueue::Default,
            MethodQueue::named("io"),
        ] {
            let executor = queues.resolve(&queue).expect("resolved");
            assert!(executor.submit(Box::new(|| {})).is_err());
        }
    }

    #[test]
    fn queue_kind_parses_lowercase() {
        let spec: QueueSpec =
            serde_json::from_str(r#"{"name":"io","kind":"concurrent"}"#).expect("parse");
        assert_eq!(spec.kind, QueueKind::Concurrent);
        let spec: QueueSpec = serde_json::from_str(r#"{"name":"io"}"#).expect("parse");
        assert_eq!(spec.kind, QueueKind::Serial);
    }
}
