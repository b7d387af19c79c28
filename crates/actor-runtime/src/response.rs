//! # Result Containers
//!
//! A [`Response`] carries the outcome of a call across an asynchronous
//! boundary without the carrier knowing the concrete result type:
//!
//! - [`Response::Completed`]: the call finished and produced no value.
//! - [`Response::Value`]: the call produced a value, stored in a slot that was
//!   acquired from a [`ResponsePool`] free list keyed by the value type.
//! - [`Response::Failure`]: the call failed; reading the result yields the
//!   captured error.
//!
//! ## Ownership
//!
//! The consumer owns the container. Dropping it (or calling
//! [`Response::dispose`]) clears the slot and returns it to its pool, so a
//! disposed container can never be read again and a freshly acquired one never
//! exposes a previous value.

use crate::error::FrameworkError;
use parking_lot::Mutex;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Type-erased storage for one pooled value.
trait ValueSlot: Send {
    fn type_name(&self) -> &'static str;
    fn value_type(&self) -> TypeId;
    fn is_empty(&self) -> bool;
    fn clear(&mut self);
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

struct Slot<T> {
    value: Option<T>,
}

impl<T: Send + 'static> ValueSlot for Slot<T> {
    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn value_type(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn is_empty(&self) -> bool {
        self.value.is_none()
    }

    fn clear(&mut self) {
        self.value = None;
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Counters describing pool reuse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Slots allocated because the free list was empty.
    pub created: u64,
    /// Slots handed out again from a free list.
    pub reused: u64,
    /// Slots put back on a free list.
    pub returned: u64,
    /// Slots dropped because their free list was full.
    pub discarded: u64,
}

#[derive(Default)]
struct PoolCounters {
    created: AtomicU64,
    reused: AtomicU64,
    returned: AtomicU64,
    discarded: AtomicU64,
}

struct PoolInner {
    free: Mutex<HashMap<TypeId, Vec<Box<dyn ValueSlot>>>>,
    max_retained: usize,
    counters: PoolCounters,
}

/// Free lists of value slots, one list per result type.
///
/// Cheap to clone; clones share the same free lists.
#[derive(Clone)]
pub struct ResponsePool {
    inner: Arc<PoolInner>,
}

impl ResponsePool {
    /// Creates a pool keeping at most `max_retained` free slots per type.
    pub fn new(max_retained: usize) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                free: Mutex::new(HashMap::new()),
                max_retained,
                counters: PoolCounters::default(),
            }),
        }
    }

    /// Acquires an empty slot for values of type `T`.
    pub fn acquire<T: Send + 'static>(&self) -> PooledValue {
        let reused = self
            .inner
            .free
            .lock()
            .get_mut(&TypeId::of::<T>())
            .and_then(Vec::pop);

        let slot = match reused {
            Some(slot) => {
                self.inner.counters.reused.fetch_add(1, Ordering::Relaxed);
                slot
            }
            None => {
                self.inner.counters.created.fetch_add(1, Ordering::Relaxed);
                Box::new(Slot::<T> { value: None }) as Box<dyn ValueSlot>
            }
        };
        debug_assert!(slot.is_empty(), "pooled slot must be cleared before reuse");

        PooledValue {
            slot: Some(slot),
            pool: Some(self.clone()),
        }
    }

    /// Number of free slots currently retained for `T`.
    pub fn free_slots<T: 'static>(&self) -> usize {
        self.inner
            .free
            .lock()
            .get(&TypeId::of::<T>())
            .map_or(0, Vec::len)
    }

    pub fn stats(&self) -> PoolStats {
        let c = &self.inner.counters;
        PoolStats {
            created: c.created.load(Ordering::Relaxed),
            reused: c.reused.load(Ordering::Relaxed),
            returned: c.returned.load(Ordering::Relaxed),
            discarded: c.discarded.load(Ordering::Relaxed),
        }
    }

    fn release(&self, mut slot: Box<dyn ValueSlot>) {
        slot.clear();
        let mut free = self.inner.free.lock();
        let list = free.entry(slot.value_type()).or_default();
        if list.len() < self.inner.max_retained {
            list.push(slot);
            self.inner.counters.returned.fetch_add(1, Ordering::Relaxed);
        } else {
            self.inner.counters.discarded.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl fmt::Debug for ResponsePool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponsePool")
            .field("max_retained", &self.inner.max_retained)
            .field("stats", &self.stats())
            .finish()
    }
}

/// A value slot, usually borrowed from a [`ResponsePool`].
///
/// A pooled slot goes back to its pool when this handle is dropped; an
/// unpooled one is simply freed.
pub struct PooledValue {
    slot: Option<Box<dyn ValueSlot>>,
    pool: Option<ResponsePool>,
}

impl PooledValue {
    /// A slot holding `value` that belongs to no pool.
    pub fn unpooled<T: Send + 'static>(value: T) -> Self {
        Self {
            slot: Some(Box::new(Slot { value: Some(value) })),
            pool: None,
        }
    }

    pub fn is_pooled(&self) -> bool {
        self.pool.is_some()
    }

    /// Stores `value`, replacing whatever the slot held.
    pub fn put<T: Send + 'static>(&mut self, value: T) -> Result<(), FrameworkError> {
        let requested = std::any::type_name::<T>();
        let slot = self.slot_mut()?;
        let stored = slot.type_name();
        match slot.as_any_mut().downcast_mut::<Slot<T>>() {
            Some(typed) => {
                typed.value = Some(value);
                Ok(())
            }
            None => Err(FrameworkError::ResultTypeMismatch { requested, stored }),
        }
    }

    /// Moves the stored value out. Only an exact type match succeeds.
    pub fn take<T: 'static>(&mut self) -> Result<T, FrameworkError> {
        let requested = std::any::type_name::<T>();
        let slot = self.slot_mut()?;
        let stored = slot.type_name();
        match slot.as_any_mut().downcast_mut::<Slot<T>>() {
            Some(typed) => typed.value.take().ok_or(FrameworkError::ResultTaken),
            None => Err(FrameworkError::ResultTypeMismatch { requested, stored }),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.slot.as_ref().map_or(true, |slot| slot.is_empty())
    }

    /// Name of the type this slot stores.
    pub fn type_name(&self) -> &'static str {
        self.slot.as_ref().map_or("<released>", |slot| slot.type_name())
    }

    fn slot_mut(&mut self) -> Result<&mut Box<dyn ValueSlot>, FrameworkError> {
        self.slot.as_mut().ok_or(FrameworkError::ResultTaken)
    }
}

impl Drop for PooledValue {
    fn drop(&mut self) {
        if let (Some(slot), Some(pool)) = (self.slot.take(), self.pool.as_ref()) {
            pool.release(slot);
        }
    }
}

impl fmt::Debug for PooledValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledValue")
            .field("type", &self.type_name())
            .field("empty", &self.is_empty())
            .finish()
    }
}

/// The outcome of a call.
#[derive(Debug)]
pub enum Response {
    Completed,
    Value(PooledValue),
    Failure(FrameworkError),
}

impl Response {
    /// The empty completion marker.
    pub const fn completed() -> Self {
        Response::Completed
    }

    /// Wraps `value` in a slot that belongs to no pool.
    ///
    /// Hot paths should use [`Response::from_result_in`] with the pool of
    /// their [`ActorSystem`](crate::ActorSystem).
    pub fn from_result<T: Send + 'static>(value: T) -> Self {
        Response::Value(PooledValue::unpooled(value))
    }

    /// Wraps `value` in a slot from `pool`.
    pub fn from_result_in<T: Send + 'static>(pool: &ResponsePool, value: T) -> Self {
        let mut pooled = pool.acquire::<T>();
        // A slot acquired for `T` always accepts a `T`.
        match pooled.put(value) {
            Ok(()) => Response::Value(pooled),
            Err(e) => Response::Failure(e),
        }
    }

    pub fn failure(error: FrameworkError) -> Self {
        Response::Failure(error)
    }

    /// Captures an arbitrary error as a failure.
    pub fn from_error<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Response::Failure(FrameworkError::captured(error))
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Response::Completed)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Response::Failure(_))
    }

    pub fn error(&self) -> Option<&FrameworkError> {
        match self {
            Response::Failure(e) => Some(e),
            _ => None,
        }
    }

    /// Name of the stored value type, if this container holds a value.
    pub fn result_type_name(&self) -> Option<&'static str> {
        match self {
            Response::Value(pooled) => Some(pooled.type_name()),
            _ => None,
        }
    }

    /// Reads the result.
    ///
    /// - `Completed` yields `T::default()`.
    /// - `Failure` yields the captured error.
    /// - `Value` moves the stored value out; `T` must be the stored type.
    ///
    /// The `Default` bound only serves `Completed`. Result types without a
    /// default are read with [`Response::get_value`].
    pub fn get_result<T: Default + 'static>(&mut self) -> Result<T, FrameworkError> {
        match self {
            Response::Completed => Ok(T::default()),
            _ => self.get_value(),
        }
    }

    /// Reads a stored value. `Completed` has none and reports a type
    /// mismatch.
    pub fn get_value<T: 'static>(&mut self) -> Result<T, FrameworkError> {
        match self {
            Response::Completed => Err(FrameworkError::ResultTypeMismatch {
                requested: std::any::type_name::<T>(),
                stored: "()",
            }),
            Response::Failure(e) => Err(e.clone()),
            Response::Value(pooled) => pooled.take::<T>(),
        }
    }

    /// Reads the result and disposes the container.
    pub fn into_result<T: Default + 'static>(mut self) -> Result<T, FrameworkError> {
        self.get_result()
    }

    /// Reads a stored value and disposes the container.
    pub fn into_value<T: 'static>(mut self) -> Result<T, FrameworkError> {
        self.get_value()
    }

    /// Returns a value slot to its pool. A no-op for the other variants.
    pub fn dispose(self) {
        drop(self);
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::Completed => write!(f, "[Completed]"),
            Response::Value(pooled) if pooled.is_empty() => write!(f, "[null]"),
            Response::Value(pooled) => write!(f, "[{}]", pooled.type_name()),
            Response::Failure(e) => write!(f, "{e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("boom")]
    struct Boom;

    #[test]
    fn completed_reads_default() {
        let mut response = Response::completed();
        assert_eq!(response.get_result::<u32>().unwrap(), 0);
        assert_eq!(response.get_result::<String>().unwrap(), "");
        assert_eq!(response.to_string(), "[Completed]");
    }

    #[test]
    fn value_round_trips_through_pool_without_stale_data() {
        let pool = ResponsePool::new(4);

        let mut response = Response::from_result_in(&pool, String::from("hello"));
        assert!(response.result_type_name().unwrap().ends_with("String"));
        assert_eq!(response.get_result::<String>().unwrap(), "hello");
        response.dispose();
        assert_eq!(pool.free_slots::<String>(), 1);

        let fresh = pool.acquire::<String>();
        assert!(fresh.is_empty());
        assert_eq!(
            pool.stats(),
            PoolStats {
                created: 1,
                reused: 1,
                returned: 1,
                discarded: 0
            }
        );
    }

    #[test]
    fn second_read_reports_taken() {
        let pool = ResponsePool::new(4);
        let mut response = Response::from_result_in(&pool, 5_i64);
        assert_eq!(response.get_result::<i64>().unwrap(), 5);
        assert!(matches!(
            response.get_result::<i64>(),
            Err(FrameworkError::ResultTaken)
        ));
    }

    #[test]
    fn mismatched_type_is_an_error_and_keeps_value() {
        let pool = ResponsePool::new(4);
        let mut response = Response::from_result_in(&pool, 5_i64);
        assert!(matches!(
            response.get_result::<i32>(),
            Err(FrameworkError::ResultTypeMismatch { .. })
        ));
        assert_eq!(response.get_result::<i64>().unwrap(), 5);
    }

    #[test]
    fn failure_yields_the_captured_error_every_read() {
        let mut response = Response::from_error(Boom);
        for _ in 0..2 {
            let err = response.get_result::<String>().unwrap_err();
            let captured = err.captured_error().expect("captured error");
            assert!(captured.downcast_ref::<Boom>().is_some());
        }
    }

    #[test]
    fn unpooled_values_need_no_pool() {
        let mut response = Response::from_result(String::from("loose"));
        match &response {
            Response::Value(pooled) => assert!(!pooled.is_pooled()),
            other => panic!("expected a value, got {other}"),
        }
        assert_eq!(response.get_result::<String>().unwrap(), "loose");
        response.dispose();

        let pool = ResponsePool::new(4);
        match Response::from_result_in(&pool, 1_u8) {
            Response::Value(pooled) => assert!(pooled.is_pooled()),
            other => panic!("expected a value, got {other}"),
        }
        assert_eq!(pool.free_slots::<u8>(), 1);
    }

    #[test]
    fn values_without_default_are_readable() {
        #[derive(Debug, PartialEq)]
        struct Ticket(u32);

        let pool = ResponsePool::new(4);
        let response = Response::from_result_in(&pool, Ticket(3));
        assert_eq!(response.into_value::<Ticket>().unwrap(), Ticket(3));

        assert!(matches!(
            Response::completed().into_value::<Ticket>(),
            Err(FrameworkError::ResultTypeMismatch { stored: "()", .. })
        ));
        let err = Response::from_error(Boom).into_value::<Ticket>().unwrap_err();
        assert!(err.captured_error().is_some());
    }

    #[test]
    fn full_free_list_discards_slots() {
        let pool = ResponsePool::new(1);
        let a = Response::from_result_in(&pool, 1_u8);
        let b = Response::from_result_in(&pool, 2_u8);
        drop(a);
        drop(b);
        assert_eq!(pool.free_slots::<u8>(), 1);
        assert_eq!(pool.stats().discarded, 1);
    }

    #[test]
    fn free_lists_are_keyed_by_type() {
        let pool = ResponsePool::new(4);
        drop(Response::from_result_in(&pool, 1_u8));
        assert_eq!(pool.free_slots::<u8>(), 1);
        assert_eq!(pool.free_slots::<u16>(), 0);
        let other = pool.acquire::<u16>();
        assert!(other.is_empty());
        assert_eq!(pool.stats().created, 2);
    }
}
