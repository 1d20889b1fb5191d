//! Routes invocation requests to modules on their declared queues.
//!
//! # Responsibility
//! - Resolve module, method and queue for each request.
//! - Hand the invocation to the queue without blocking the caller.
//!
//! # Invariants
//! - Unknown modules and methods are rejected before any queue hop.
//! - Every request settles exactly once, including when its queue is closed.

use crate::bridge::message::{BridgeCall, BridgeReply};
use crate::error::InvocationError;
use crate::promise::{Outcome, Promise, PromiseHandle};
use crate::queue::{Job, QueueSet};
use crate::registry::ModuleRegistry;
use crate::value::BridgeValue;
use log::{info, warn};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// One request addressed to `module.method`.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub id: Uuid,
    pub module: String,
    pub method: String,
    pub arguments: Vec<BridgeValue>,
}

impl Invocation {
    pub fn new(
        module: impl Into<String>,
        method: impl Into<String>,
        arguments: Vec<BridgeValue>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            module: module.into(),
            method: method.into(),
            arguments,
        }
    }
}

pub struct Dispatcher {
    registry: Arc<ModuleRegistry>,
    queues: QueueSet,
}

impl Dispatcher {
    pub fn new(registry: Arc<ModuleRegistry>, queues: QueueSet) -> Self {
        Self { registry, queues }
    }

    pub fn registry(&self) -> &Arc<ModuleRegistry> {
        &self.registry
    }

    pub fn queues(&self) -> &QueueSet {
        &self.queues
    }

    /// Dispatches `module.method(arguments)`; returns the generated call id.
    pub fn call(
        &self,
        module: &str,
        method: &str,
        arguments: Vec<BridgeValue>,
        promise: Promise,
    ) -> Uuid {
        let invocation = Invocation::new(module, method, arguments);
        let id = invocation.id;
        self.dispatch(invocation, promise);
        id
    }

    /// Dispatches and returns a handle for the outcome.
    pub fn call_pending(
        &self,
        module: &str,
        method: &str,
        arguments: Vec<BridgeValue>,
    ) -> PromiseHandle {
        let (promise, handle) = Promise::pending();
        self.call(module, method, arguments, promise);
        handle
    }

    /// Dispatches a decoded boundary call; `on_reply` receives the reply
    /// envelope once the request settles.
    pub fn handle_call(
        &self,
        call: BridgeCall,
        on_reply: impl FnOnce(BridgeReply) + Send + 'static,
    ) {
        let BridgeCall {
            call_id,
            module,
            method,
            arguments,
        } = call;
        let promise =
            Promise::from_callback(move |outcome| on_reply(BridgeReply::new(call_id, outcome)));
        self.dispatch(Invocation::new(module, method, arguments), promise);
    }

    /// Dispatches a decoded boundary call and returns a handle for the reply.
    pub fn handle_message(&self, call: BridgeCall) -> PromiseHandle {
        let (promise, handle) = Promise::pending();
        let BridgeCall {
            module,
            method,
            arguments,
            ..
        } = call;
        self.dispatch(Invocation::new(module, method, arguments), promise);
        handle
    }

    /// Routes one invocation; settlement always goes through `promise`.
    pub fn dispatch(&self, invocation: Invocation, promise: Promise) {
        let Invocation {
            id,
            module,
            method,
            arguments,
        } = invocation;

        let Some(target) = self.registry.get(&module) else {
            reject_early(id, &module, &method, promise, InvocationError::UnknownModule {
                module: module.clone(),
            });
            return;
        };
        if !target.has_method(&method) {
            reject_early(id, &module, &method, promise, InvocationError::UnknownMethod {
                module: module.clone(),
                method: method.clone(),
            });
            return;
        }

        let queue = target.method_queue();
        let Some(executor) = self.queues.resolve(&queue) else {
            reject_early(id, &module, &method, promise, InvocationError::QueueUnavailable {
                queue: queue.label().to_string(),
            });
            return;
        };

        let started_at = Instant::now();
        let queue_label = queue.label().to_string();
        let log_module = module.clone();
        let log_method = method.clone();
        let promise = promise.inspect(move |outcome| {
            log_completion(
                id,
                &log_module,
                &log_method,
                &queue_label,
                started_at,
                outcome,
            );
        });
        let settler = promise.settler();
        let job: Job = Box::new(move || target.call_exported_method(&method, arguments, promise));

        if let Err(closed) = executor.submit(job) {
            settler.reject(InvocationError::QueueUnavailable {
                queue: closed.queue.clone(),
            });
        }
    }
}

fn reject_early(id: Uuid, module: &str, method: &str, promise: Promise, error: InvocationError) {
    warn!(
        "event=bridge_call module=dispatcher status=error call_id={} target={} method={} error_code={}",
        id,
        module,
        method,
        error.code()
    );
    promise.reject(error);
}

fn log_completion(
    id: Uuid,
    module: &str,
    method: &str,
    queue: &str,
    started_at: Instant,
    outcome: &Outcome,
) {
    let duration_ms = started_at.elapsed().as_millis();
    match outcome {
        Ok(_) => info!(
            "event=bridge_call module=dispatcher status=ok call_id={} target={} method={} queue={} duration_ms={}",
            id, module, method, queue, duration_ms
        ),
        Err(error) => warn!(
            "event=bridge_call module=dispatcher status=error call_id={} target={} method={} queue={} duration_ms={} error_code={}",
            id, module, method, queue, duration_ms, error.code
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::Dispatcher;
    use crate::error::{E_QUEUE_UNAVAILABLE, E_UNKNOWN_METHOD, E_UNKNOWN_MODULE};
    use crate::module::{Arity, ExportedModule, MethodQueue, MethodTable};
    use crate::queue::QueueSet;
    use crate::registry::{ModuleRegistry, RegistryError};
    use crate::value::BridgeValue;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Echo {
        queue: MethodQueue,
        calls: Arc<AtomicUsize>,
    }

    impl ExportedModule for Echo {
        const NAME: &'static str = "Echo";
        type Config = (MethodQueue, Arc<AtomicUsize>);

        fn methods() -> MethodTable<Self> {
            MethodTable::<Self>::new().sync("echo", "echoImpl", Arity::exactly(1), |module, args| {
                module.calls.fetch_add(1, Ordering::SeqCst);
                Ok(args.values()[0].clone())
            })
        }

        fn snapshot(&self) -> Self::Config {
            (self.queue.clone(), Arc::clone(&self.calls))
        }

        fn from_snapshot((queue, calls): Self::Config) -> Result<Self, RegistryError> {
            Ok(Self { queue, calls })
        }

        fn method_queue(&self) -> MethodQueue {
            self.queue.clone()
        }
    }

    fn dispatcher(
        queue: MethodQueue,
        runtime: &tokio::runtime::Runtime,
    ) -> (Dispatcher, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = ModuleRegistry::new();
        registry
            .register(Echo {
                queue,
                calls: Arc::clone(&calls),
            })
            .expect("register echo");
        registry.initialize();
        (
            Dispatcher::new(Arc::new(registry), QueueSet::with_runtime(runtime.handle())),
            calls,
        )
    }

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .build()
            .expect("build runtime")
    }

    #[test]
    fn default_queue_resolves_off_caller_thread() {
        let runtime = runtime();
        let (dispatcher, calls) = dispatcher(MethodQueue::Default, &runtime);

        let handle = dispatcher.call_pending("Echo", "echo", vec![BridgeValue::from("hi")]);
        assert_eq!(handle.wait(), Ok(BridgeValue::from("hi")));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unknown_module_and_method_reject_without_running() {
        let runtime = runtime();
        let (dispatcher, calls) = dispatcher(MethodQueue::Default, &runtime);

        let err = dispatcher
            .call_pending("Missing", "echo", vec![])
            .wait()
            .expect_err("unknown module");
        assert_eq!(err.code, E_UNKNOWN_MODULE);

        let err = dispatcher
            .call_pending("Echo", "shout", vec![])
            .wait()
            .expect_err("unknown method");
        assert_eq!(err.code, E_UNKNOWN_METHOD);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn missing_named_queue_rejects() {
        let runtime = runtime();
        let (dispatcher, calls) = dispatcher(MethodQueue::named("camera"), &runtime);

        let err = dispatcher
            .call_pending("Echo", "echo", vec![BridgeValue::Null])
            .wait()
            .expect_err("queue missing");
        assert_eq!(err.code, E_QUEUE_UNAVAILABLE);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn main_queue_waits_for_pump() {
        let runtime = runtime();
        let (dispatcher, calls) = dispatcher(MethodQueue::Main, &runtime);

        let mut handle = dispatcher.call_pending("Echo", "echo", vec![BridgeValue::Int(3)]);
        assert!(handle.try_take().is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        assert_eq!(dispatcher.queues().main().run_pending(), 1);
        assert_eq!(handle.try_take(), Some(Ok(BridgeValue::Int(3))));
    }

    #[test]
    fn closed_queue_rejects_with_queue_unavailable() {
        let runtime = runtime();
        let (dispatcher, calls) = dispatcher(MethodQueue::Main, &runtime);
        dispatcher.queues().close_all();

        let err = dispatcher
            .call_pending("Echo", "echo", vec![BridgeValue::Null])
            .wait()
            .expect_err("closed queue");
        assert_eq!(err.code, E_QUEUE_UNAVAILABLE);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
