//! # Response Correlation
//!
//! An actor that sends a request registers a [`Callback`] under the request's
//! rpc id. When the matching response arrives the transport calls
//! [`ResponseCorrelator::dispatch`], which removes the callback and completes
//! it exactly once.

use crate::error::FrameworkError;
use crate::response::Response;
use crate::scheduler::panic_message;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::any::type_name;
use std::marker::PhantomData;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::debug;

/// Receives the outcome of a request.
///
/// Returning an error from [`complete`](CompletionSink::complete) makes the
/// correlator retry once with a failure response carrying that error.
pub trait CompletionSink: Send {
    fn complete(&mut self, response: Response) -> Result<(), FrameworkError>;

    fn complete_default(&mut self) -> Result<(), FrameworkError> {
        self.complete(Response::completed())
    }

    /// Result type this sink expects, for diagnostics.
    fn result_type(&self) -> Option<&'static str> {
        None
    }
}

/// Forwards the raw [`Response`] over a oneshot channel.
pub struct ResponseSender {
    tx: Option<oneshot::Sender<Response>>,
}

impl ResponseSender {
    pub fn new(tx: oneshot::Sender<Response>) -> Self {
        Self { tx: Some(tx) }
    }

    pub fn channel() -> (Self, oneshot::Receiver<Response>) {
        let (tx, rx) = oneshot::channel();
        (Self::new(tx), rx)
    }
}

impl CompletionSink for ResponseSender {
    fn complete(&mut self, response: Response) -> Result<(), FrameworkError> {
        let tx = self.tx.take().ok_or(FrameworkError::ActorDropped)?;
        tx.send(response).map_err(|_| FrameworkError::ActorDropped)
    }
}

/// Converts the response to `T` and forwards the result.
///
/// A conversion error is handed back to the correlator, which completes the
/// sink again with that error as a failure.
pub struct TypedSender<T> {
    tx: Option<oneshot::Sender<Result<T, FrameworkError>>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> TypedSender<T>
where
    T: Default + Send + 'static,
{
    pub fn new(tx: oneshot::Sender<Result<T, FrameworkError>>) -> Self {
        Self {
            tx: Some(tx),
            _marker: PhantomData,
        }
    }

    pub fn channel() -> (Self, oneshot::Receiver<Result<T, FrameworkError>>) {
        let (tx, rx) = oneshot::channel();
        (Self::new(tx), rx)
    }
}

impl<T> CompletionSink for TypedSender<T>
where
    T: Default + Send + 'static,
{
    fn complete(&mut self, response: Response) -> Result<(), FrameworkError> {
        let failed = response.is_failure();
        let result = response.into_result::<T>();
        if let (Err(e), false) = (&result, failed) {
            return Err(e.clone());
        }
        let tx = self.tx.take().ok_or(FrameworkError::ActorDropped)?;
        tx.send(result).map_err(|_| FrameworkError::ActorDropped)
    }

    fn result_type(&self) -> Option<&'static str> {
        Some(type_name::<T>())
    }
}

/// A registered request awaiting its response.
pub struct Callback {
    rpc_id: u64,
    sink: Mutex<Box<dyn CompletionSink>>,
    completed: AtomicBool,
    registered_at: Instant,
}

impl Callback {
    pub fn new(rpc_id: u64, sink: Box<dyn CompletionSink>) -> Self {
        Self {
            rpc_id,
            sink: Mutex::new(sink),
            completed: AtomicBool::new(false),
            registered_at: Instant::now(),
        }
    }

    pub fn rpc_id(&self) -> u64 {
        self.rpc_id
    }

    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }

    pub fn elapsed(&self) -> Duration {
        self.registered_at.elapsed()
    }

    pub fn result_type(&self) -> Option<&'static str> {
        self.sink.lock().result_type()
    }

    /// Completes the sink with `response`.
    ///
    /// Only the first call has any effect; later calls drop their response
    /// and return `false`.
    pub fn complete(&self, response: Response) -> bool {
        if self
            .completed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        debug!(
            rpc_id = self.rpc_id,
            elapsed_ms = self.elapsed().as_millis() as u64,
            "Completing callback"
        );

        let mut sink = self.sink.lock();
        let error = match catch_unwind(AssertUnwindSafe(|| sink.complete(response))) {
            Ok(Ok(())) => return true,
            Ok(Err(e)) => e,
            Err(payload) => FrameworkError::Panicked(panic_message(payload.as_ref())),
        };
        debug!(rpc_id = self.rpc_id, error = %error, "Completion sink failed, completing with failure");
        match catch_unwind(AssertUnwindSafe(|| sink.complete(Response::failure(error)))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                debug!(rpc_id = self.rpc_id, error = %e, "Completion sink rejected the failure")
            }
            Err(_) => debug!(rpc_id = self.rpc_id, "Completion sink panicked on the failure"),
        }
        true
    }
}

impl std::fmt::Debug for Callback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callback")
            .field("rpc_id", &self.rpc_id)
            .field("completed", &self.is_completed())
            .finish()
    }
}

/// Result of [`ResponseCorrelator::dispatch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Completed,
    Unmatched,
}

/// The outstanding requests of one actor, keyed by rpc id.
pub struct ResponseCorrelator {
    label: String,
    callbacks: DashMap<u64, Callback>,
}

impl ResponseCorrelator {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            callbacks: DashMap::new(),
        }
    }

    /// Registers `sink` to receive the response for `rpc_id`.
    pub fn register(&self, rpc_id: u64, sink: Box<dyn CompletionSink>) -> Result<(), FrameworkError> {
        if rpc_id == 0 {
            return Err(FrameworkError::InvalidRequestId);
        }
        match self.callbacks.entry(rpc_id) {
            Entry::Occupied(_) => Err(FrameworkError::DuplicateRequestId(rpc_id)),
            Entry::Vacant(slot) => {
                slot.insert(Callback::new(rpc_id, sink));
                Ok(())
            }
        }
    }

    /// Completes the callback registered for `rpc_id`.
    ///
    /// The callback is removed before it is completed, so of two concurrent
    /// dispatches for the same id only one finds it.
    pub fn dispatch(&self, rpc_id: u64, response: Response) -> DispatchOutcome {
        if rpc_id == 0 {
            debug!(actor = %self.label, "Dropping response without an rpc id");
            return DispatchOutcome::Unmatched;
        }
        match self.callbacks.remove(&rpc_id) {
            Some((_, callback)) => {
                callback.complete(response);
                DispatchOutcome::Completed
            }
            None => {
                debug!(
                    actor = %self.label,
                    rpc_id,
                    response = %response,
                    "No callback registered for response"
                );
                DispatchOutcome::Unmatched
            }
        }
    }

    /// Removes a registration without completing it.
    pub fn unregister(&self, rpc_id: u64) -> bool {
        self.callbacks.remove(&rpc_id).is_some()
    }

    /// Drops every registration. Waiting callers see a closed channel.
    pub fn clear(&self) -> usize {
        let dropped = self.callbacks.len();
        self.callbacks.clear();
        dropped
    }

    pub fn contains(&self, rpc_id: u64) -> bool {
        self.callbacks.contains_key(&rpc_id)
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }
}

impl std::fmt::Debug for ResponseCorrelator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCorrelator")
            .field("label", &self.label)
            .field("outstanding", &self.callbacks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[derive(Debug, thiserror::Error)]
    #[error("lookup failed with code {0}")]
    struct LookupFailed(i32);

    struct CountingSink {
        calls: Arc<AtomicUsize>,
        last: Arc<Mutex<Option<Response>>>,
    }

    impl CompletionSink for CountingSink {
        fn complete(&mut self, response: Response) -> Result<(), FrameworkError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last.lock() = Some(response);
            Ok(())
        }
    }

    #[test]
    fn rejects_reserved_and_duplicate_ids() {
        let correlator = ResponseCorrelator::new("test");
        let (sink, _rx) = ResponseSender::channel();
        assert!(matches!(
            correlator.register(0, Box::new(sink)),
            Err(FrameworkError::InvalidRequestId)
        ));

        let (first, _rx1) = ResponseSender::channel();
        let (second, _rx2) = ResponseSender::channel();
        correlator.register(5, Box::new(first)).unwrap();
        assert!(matches!(
            correlator.register(5, Box::new(second)),
            Err(FrameworkError::DuplicateRequestId(5))
        ));
        assert_eq!(correlator.len(), 1);
    }

    #[tokio::test]
    async fn failure_reaches_the_caller() {
        let correlator = ResponseCorrelator::new("test");
        let (sink, rx) = TypedSender::<i32>::channel();
        correlator.register(42, Box::new(sink)).unwrap();

        let outcome = correlator.dispatch(42, Response::from_error(LookupFailed(-1)));
        assert_eq!(outcome, DispatchOutcome::Completed);
        assert!(!correlator.contains(42));

        let err = rx.await.unwrap().unwrap_err();
        let inner = err.captured_error().unwrap();
        assert_eq!(inner.downcast_ref::<LookupFailed>().unwrap().0, -1);
    }

    #[test]
    fn unmatched_response_is_dropped() {
        let correlator = ResponseCorrelator::new("test");
        assert_eq!(
            correlator.dispatch(99, Response::from_result(1_u8)),
            DispatchOutcome::Unmatched
        );
        assert_eq!(
            correlator.dispatch(0, Response::completed()),
            DispatchOutcome::Unmatched
        );
        assert!(correlator.is_empty());
    }

    #[test]
    fn second_dispatch_finds_nothing() {
        let correlator = ResponseCorrelator::new("test");
        let calls = Arc::new(AtomicUsize::new(0));
        let last = Arc::new(Mutex::new(None));
        let sink = CountingSink {
            calls: calls.clone(),
            last: last.clone(),
        };
        correlator.register(7, Box::new(sink)).unwrap();

        assert_eq!(
            correlator.dispatch(7, Response::from_result(String::from("first"))),
            DispatchOutcome::Completed
        );
        assert_eq!(
            correlator.dispatch(7, Response::from_result(String::from("second"))),
            DispatchOutcome::Unmatched
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let response = last.lock().take().unwrap();
        assert_eq!(response.into_result::<String>().unwrap(), "first");
    }

    #[test]
    fn concurrent_dispatch_completes_once() {
        let correlator = Arc::new(ResponseCorrelator::new("test"));
        let calls = Arc::new(AtomicUsize::new(0));
        for rpc_id in 1..=200_u64 {
            let sink = CountingSink {
                calls: calls.clone(),
                last: Arc::new(Mutex::new(None)),
            };
            correlator.register(rpc_id, Box::new(sink)).unwrap();
        }

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let correlator = correlator.clone();
                std::thread::spawn(move || {
                    (1..=200_u64)
                        .filter(|id| {
                            correlator.dispatch(*id, Response::completed())
                                == DispatchOutcome::Completed
                        })
                        .count()
                })
            })
            .collect();
        let completed: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

        assert_eq!(completed, 200);
        assert_eq!(calls.load(Ordering::SeqCst), 200);
    }

    #[test]
    fn callback_completes_at_most_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let callback = Callback::new(
            3,
            Box::new(CountingSink {
                calls: calls.clone(),
                last: Arc::new(Mutex::new(None)),
            }),
        );
        assert!(callback.complete(Response::completed()));
        assert!(!callback.complete(Response::completed()));
        assert!(callback.is_completed());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn type_mismatch_becomes_failure() {
        let correlator = ResponseCorrelator::new("test");
        let (sink, rx) = TypedSender::<u64>::channel();
        correlator.register(1, Box::new(sink)).unwrap();
        correlator.dispatch(1, Response::from_result(String::from("not a number")));
        assert!(matches!(
            rx.await.unwrap(),
            Err(FrameworkError::ResultTypeMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn completed_reads_as_default() {
        let correlator = ResponseCorrelator::new("test");
        let (sink, rx) = TypedSender::<u32>::channel();
        correlator.register(1, Box::new(sink)).unwrap();
        correlator.dispatch(1, Response::completed());
        assert_eq!(rx.await.unwrap().unwrap(), 0);
    }

    #[tokio::test]
    async fn clear_drops_waiting_callers() {
        let correlator = ResponseCorrelator::new("test");
        let (sink, rx) = ResponseSender::channel();
        correlator.register(11, Box::new(sink)).unwrap();
        assert_eq!(correlator.clear(), 1);
        assert!(rx.await.is_err());
    }

    #[test]
    fn unregister_removes_without_completing() {
        let correlator = ResponseCorrelator::new("test");
        let calls = Arc::new(AtomicUsize::new(0));
        let sink = CountingSink {
            calls: calls.clone(),
            last: Arc::new(Mutex::new(None)),
        };
        correlator.register(8, Box::new(sink)).unwrap();
        assert!(correlator.unregister(8));
        assert!(!correlator.unregister(8));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
