//! Success/failure continuation pair for one invocation request.
//!
//! # Responsibility
//! - Deliver the outcome of one request to exactly one continuation.
//! - Turn "nobody settled this request" into a rejection instead of a hang.
//!
//! # Invariants
//! - The continuation runs at most once; later settle attempts are no-ops.
//! - A promise dropped while pending rejects with `E_PROMISE_DROPPED`, or with
//!   `E_EXECUTION_FAULT` when the drop happens during a panic unwind.
//! - The continuation never runs while the internal lock is held.

use crate::error::{ErrorDescriptor, InvocationError};
use crate::value::BridgeValue;
use log::warn;
use parking_lot::Mutex;
use std::fmt::{Debug, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// Outcome delivered to the continuation pair.
pub type Outcome = Result<BridgeValue, ErrorDescriptor>;

type Continuation = Box<dyn FnOnce(Outcome) + Send + 'static>;

struct PromiseState {
    continuation: Mutex<Option<Continuation>>,
}

impl PromiseState {
    fn settle(&self, outcome: Outcome) -> bool {
        let continuation = self.continuation.lock().take();
        match continuation {
            Some(continuation) => {
                continuation(outcome);
                true
            }
            None => false,
        }
    }

    fn is_settled(&self) -> bool {
        self.continuation.lock().is_none()
    }
}

/// Continuation pair handed to an exported method.
pub struct Promise {
    state: Arc<PromiseState>,
}

impl Promise {
    /// Creates a promise from separate success and failure continuations.
    pub fn new<R, J>(on_resolve: R, on_reject: J) -> Self
    where
        R: FnOnce(BridgeValue) + Send + 'static,
        J: FnOnce(ErrorDescriptor) + Send + 'static,
    {
        Self::from_callback(move |outcome| match outcome {
            Ok(value) => on_resolve(value),
            Err(error) => on_reject(error),
        })
    }

    /// Creates a promise from a single outcome callback.
    pub fn from_callback(callback: impl FnOnce(Outcome) + Send + 'static) -> Self {
        Self {
            state: Arc::new(PromiseState {
                continuation: Mutex::new(Some(Box::new(callback))),
            }),
        }
    }

    /// Creates a promise whose outcome is observed through the returned handle.
    pub fn pending() -> (Self, PromiseHandle) {
        let (sender, receiver) = oneshot::channel();
        let promise = Self::from_callback(move |outcome| {
            // Receiver may already be gone; the outcome is then discarded.
            let _ = sender.send(outcome);
        });
        (promise, PromiseHandle { receiver })
    }

    pub fn resolve(self, value: impl Into<BridgeValue>) {
        self.state.settle(Ok(value.into()));
    }

    pub fn reject(self, error: impl Into<ErrorDescriptor>) {
        self.state.settle(Err(error.into()));
    }

    /// Settles from a handler result.
    pub fn settle(self, result: Result<BridgeValue, InvocationError>) {
        self.complete(result.map_err(ErrorDescriptor::from));
    }

    /// Settles with an already-converted outcome.
    pub fn complete(self, outcome: Outcome) {
        self.state.settle(outcome);
    }

    /// Wraps this promise so `observer` sees the outcome before it is forwarded.
    pub fn inspect(self, observer: impl FnOnce(&Outcome) + Send + 'static) -> Promise {
        Promise::from_callback(move |outcome| {
            observer(&outcome);
            self.complete(outcome);
        })
    }

    /// Detached handle that can reject this request while it is still pending.
    pub fn settler(&self) -> PromiseSettler {
        PromiseSettler {
            state: Arc::clone(&self.state),
        }
    }

    pub fn is_settled(&self) -> bool {
        self.state.is_settled()
    }
}

impl Drop for Promise {
    fn drop(&mut self) {
        let error = if std::thread::panicking() {
            InvocationError::ExecutionFault {
                message: "method panicked before settling its promise".to_string(),
            }
        } else {
            InvocationError::PromiseDropped
        };
        if self.state.settle(Err(error.to_descriptor())) {
            warn!(
                "event=promise_dropped module=promise status=error error_code={}",
                error.code()
            );
        }
    }
}

impl Debug for Promise {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Promise")
            .field("settled", &self.is_settled())
            .finish()
    }
}

/// Rejection-only view of a promise, used by code that hands the promise
/// itself to someone else but must still report its own failures.
#[derive(Clone)]
pub struct PromiseSettler {
    state: Arc<PromiseState>,
}

impl PromiseSettler {
    /// Returns `true` when this call settled the request.
    pub fn reject(&self, error: impl Into<ErrorDescriptor>) -> bool {
        self.state.settle(Err(error.into()))
    }

    pub fn is_settled(&self) -> bool {
        self.state.is_settled()
    }
}

impl Debug for PromiseSettler {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromiseSettler")
            .field("settled", &self.is_settled())
            .finish()
    }
}

/// Receiving side of [`Promise::pending`].
///
/// Await it from async code, or call [`PromiseHandle::wait`] from a plain
/// thread.
#[derive(Debug)]
pub struct PromiseHandle {
    receiver: oneshot::Receiver<Outcome>,
}

impl PromiseHandle {
    /// Blocks the current thread until the request settles.
    ///
    /// Must not be called from inside an async runtime worker.
    pub fn wait(self) -> Outcome {
        self.receiver
            .blocking_recv()
            .unwrap_or_else(|_| Err(InvocationError::PromiseDropped.to_descriptor()))
    }

    /// Returns the outcome if the request has already settled.
    pub fn try_take(&mut self) -> Option<Outcome> {
        match self.receiver.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => {
                Some(Err(InvocationError::PromiseDropped.to_descriptor()))
            }
        }
    }
}

impl Future for PromiseHandle {
    type Output = Outcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver).poll(cx).map(|received| {
            received.unwrap_or_else(|_| Err(InvocationError::PromiseDropped.to_descriptor()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::Promise;
    use crate::error::{ErrorDescriptor, InvocationError, E_EXECUTION_FAULT, E_PROMISE_DROPPED};
    use crate::value::BridgeValue;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn resolve_fires_success_continuation_once() {
        let resolved = Arc::new(AtomicUsize::new(0));
        let rejected = Arc::new(AtomicUsize::new(0));
        let resolved_count = Arc::clone(&resolved);
        let rejected_count = Arc::clone(&rejected);

        let promise = Promise::new(
            move |_| {
                resolved_count.fetch_add(1, Ordering::SeqCst);
            },
            move |_| {
                rejected_count.fetch_add(1, Ordering::SeqCst);
            },
        );
        promise.resolve(BridgeValue::Null);

        assert_eq!(resolved.load(Ordering::SeqCst), 1);
        assert_eq!(rejected.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn settler_cannot_reject_after_resolve() {
        let (promise, handle) = Promise::pending();
        let settler = promise.settler();
        promise.resolve(1);

        assert!(settler.is_settled());
        assert!(!settler.reject(ErrorDescriptor::new("late", "too late")));
        assert_eq!(handle.wait(), Ok(BridgeValue::Int(1)));
    }

    #[test]
    fn settler_rejection_wins_over_later_resolve() {
        let (promise, handle) = Promise::pending();
        let settler = promise.settler();
        assert!(settler.reject(InvocationError::PromiseDropped));
        promise.resolve("ignored");

        let err = handle.wait().expect_err("settler rejected first");
        assert_eq!(err.code, E_PROMISE_DROPPED);
    }

    #[test]
    fn dropping_pending_promise_rejects() {
        let (promise, handle) = Promise::pending();
        drop(promise);

        let err = handle.wait().expect_err("dropped promise must reject");
        assert_eq!(err.code, E_PROMISE_DROPPED);
    }

    #[test]
    fn drop_during_unwind_reports_execution_fault() {
        let (promise, handle) = Promise::pending();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _owned = promise;
            panic!("boom");
        }));
        assert!(result.is_err());

        let err = handle.wait().expect_err("unwound promise must reject");
        assert_eq!(err.code, E_EXECUTION_FAULT);
    }

    #[test]
    fn inspect_observes_outcome_before_forwarding() {
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_by_observer = Arc::clone(&seen);
        let (promise, handle) = Promise::pending();
        let promise = promise.inspect(move |outcome| {
            assert!(outcome.is_ok());
            seen_by_observer.fetch_add(1, Ordering::SeqCst);
        });
        promise.resolve(true);

        assert_eq!(handle.wait(), Ok(BridgeValue::Bool(true)));
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn try_take_is_empty_until_settled() {
        let (promise, mut handle) = Promise::pending();
        assert!(handle.try_take().is_none());
        promise.resolve("done");
        assert_eq!(handle.try_take(), Some(Ok(BridgeValue::from("done"))));
    }
}
