//! # Actor Runtime
//!
//! This crate runs many actors on one shared pool of threads. Each actor
//! processes its work in strict serial order without owning a thread, and
//! actors talk to each other through asynchronous request/response calls
//! matched up by an rpc id.
//!
//! ## Architecture Overview
//!
//! The runtime is layered bottom-up:
//!
//! 1. **Scheduling** ([`WorkItemGroup`], [`ActorScheduler`]) - a per-actor
//!    FIFO of continuations that submits itself to the [`WorkerPool`] only
//!    when it becomes runnable, drains under a throughput quota and yields.
//! 2. **Calls** ([`Invokable`], [`HandlerCatalog`], [`Response`]) - a method
//!    invocation bound to an actor, its decoded arguments, and the pooled
//!    container carrying its outcome.
//! 3. **Correlation** ([`ResponseCorrelator`]) - outstanding requests keyed
//!    by rpc id, each completed at most once.
//! 4. **Actors** ([`Actor`], [`ActorSystem`], [`ActorRef`]) - identity,
//!    lifecycle and message routing on top of the layers above.
//!
//! ## Example
//!
//! ```rust
//! use actor_runtime::{
//!     call_args, ActorId, ActorSystem, HandlerCatalog, HandlerError, ScheduleOptions, TokioPool,
//! };
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicU32, Ordering};
//!
//! #[derive(Default)]
//! struct Counter {
//!     hits: AtomicU32,
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let system =
//!         ActorSystem::new(Arc::new(TokioPool::current()), ScheduleOptions::default()).unwrap();
//!
//!     let catalog = HandlerCatalog::<Counter>::builder("Counter")
//!         .value("hit", |counter: Arc<Counter>, (by,): (u32,)| async move {
//!             Ok::<_, HandlerError>(counter.hits.fetch_add(by, Ordering::SeqCst) + by)
//!         })
//!         .build();
//!
//!     let counter = system
//!         .spawn(ActorId::new("Counter", 1_i64, 1), catalog, |_| Counter::default())
//!         .unwrap();
//!
//!     let total: u32 = counter.ask("hit", call_args![2_u32]).await.unwrap();
//!     assert_eq!(total, 2);
//!     system.shutdown();
//! }
//! ```
//!
//! ## Concurrency Model
//!
//! - Continuations of one actor never overlap, and run in submission order
//! - Different actors run in parallel on the shared pool
//! - A continuation that awaits is re-queued on its own actor when woken,
//!   never polled inline by the waker
//! - A panicking handler becomes a failure [`Response`]; pool threads and
//!   other actors are unaffected
//!
//! ## Testing
//!
//! [`ManualPool`] and [`ManualClock`] make scheduling deterministic, and
//! [`mock::MockPeer`] scripts the far side of outgoing requests. See the
//! [`mock`] module for the testing patterns.

pub mod actor;
pub mod catalog;
pub mod client;
pub mod client_trait;
pub mod clock;
pub mod config;
pub mod correlator;
pub mod error;
pub mod invokable;
pub mod message;
pub mod mock;
pub mod pool;
pub mod response;
pub mod scheduler;
pub mod system;
pub mod tracing;
pub mod work_group;

// Re-export core types for convenience
pub use actor::{Actor, ActorContext, ActorState};
pub use catalog::{CatalogBuilder, HandlerCatalog};
pub use client::ActorRef;
pub use client_trait::ActorClient;
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::ScheduleOptions;
pub use correlator::{
    Callback, CompletionSink, DispatchOutcome, ResponseCorrelator, ResponseSender, TypedSender,
};
pub use error::{CapturedError, FrameworkError};
pub use invokable::{
    decode_arg, encode_arg, invoke_guarded, ArgValue, Arguments, HandlerError, Invokable,
    UnitCall, ValueCall,
};
pub use message::{ActorId, ActorKey, MessageBody, MessageSink, ServerMessage};
pub use pool::{ManualPool, TokioPool, WorkerPool};
pub use response::{PoolStats, PooledValue, Response, ResponsePool};
pub use scheduler::{ActorScheduler, ActorTask, RunOutcome, TaskSnapshot};
pub use system::{ActorSystem, MessageTarget};
pub use work_group::{WorkGroupState, WorkGroupStats, WorkItemGroup};
