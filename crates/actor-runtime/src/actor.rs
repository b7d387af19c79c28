//! # Actors
//!
//! An [`Actor`] binds a model value of type `A` to everything needed to run
//! calls against it one at a time: an identity, a lifecycle, its own
//! [`ActorScheduler`], a [`ResponseCorrelator`] for the requests it sends, and
//! the [`HandlerCatalog`] of methods it answers.
//!
//! ## Concurrency Model
//!
//! Every call, every incoming request and every continuation after an
//! `.await` in a handler runs as a continuation on the actor's scheduler.
//! Continuations of one actor never run concurrently, so the model only
//! needs interior mutability for `Sync`, not for correctness. Different
//! actors run in parallel on the shared pool.
//!
//! ## Talking to Other Actors
//!
//! Handlers only see `Arc<A>`. A model that calls other actors keeps the
//! [`ActorContext`] it was built with (see [`Actor::new`]) and uses
//! [`ActorContext::request_typed`] or [`ActorContext::notify`]. Responses are
//! routed back into the same actor's correlator, and the awaiting handler
//! resumes on the actor's queue.
//!
//! ```ignore
//! let actor = Actor::new(id, catalog, scheduler, outbound, |ctx| Greeter::new(ctx));
//! actor.start();
//! let reply: String = actor.ask("greet", call_args![player_id]).await?;
//! ```

use crate::catalog::HandlerCatalog;
use crate::correlator::{CompletionSink, ResponseCorrelator, TypedSender};
use crate::error::FrameworkError;
use crate::invokable::{invoke_guarded, ArgValue, Invokable};
use crate::message::{ActorId, MessageBody, MessageSink, ServerMessage};
use crate::response::Response;
use crate::scheduler::ActorScheduler;
use futures::future::{self, BoxFuture};
use futures::FutureExt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Lifecycle of an actor. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum ActorState {
    Init = 0,
    Running = 1,
    Exiting = 2,
    Exited = 3,
}

impl ActorState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => ActorState::Init,
            1 => ActorState::Running,
            2 => ActorState::Exiting,
            _ => ActorState::Exited,
        }
    }
}

struct ContextInner {
    id: ActorId,
    state: AtomicU8,
    next_rpc_id: AtomicU64,
    scheduler: ActorScheduler,
    responses: ResponseCorrelator,
    outbound: Arc<dyn MessageSink>,
}

/// The sending half of an actor, shared with its model.
///
/// Cheap to clone.
#[derive(Clone)]
pub struct ActorContext {
    inner: Arc<ContextInner>,
}

impl ActorContext {
    fn new(id: ActorId, scheduler: ActorScheduler, outbound: Arc<dyn MessageSink>) -> Self {
        let responses = ResponseCorrelator::new(id.to_string());
        Self {
            inner: Arc::new(ContextInner {
                id,
                state: AtomicU8::new(ActorState::Init as u8),
                next_rpc_id: AtomicU64::new(1),
                scheduler,
                responses,
                outbound,
            }),
        }
    }

    pub fn id(&self) -> &ActorId {
        &self.inner.id
    }

    pub fn state(&self) -> ActorState {
        ActorState::from_u8(self.inner.state.load(Ordering::Acquire))
    }

    pub fn is_running(&self) -> bool {
        self.state() == ActorState::Running
    }

    pub fn scheduler(&self) -> &ActorScheduler {
        &self.inner.scheduler
    }

    pub fn responses(&self) -> &ResponseCorrelator {
        &self.inner.responses
    }

    /// Moves the lifecycle forward to `to`. Returns `false` if the actor is
    /// already at or past `to`.
    fn advance(&self, to: ActorState) -> bool {
        self.inner
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current < to as u8).then_some(to as u8)
            })
            .is_ok()
    }

    fn ensure_running(&self) -> Result<(), FrameworkError> {
        if self.is_running() {
            Ok(())
        } else {
            Err(FrameworkError::ActorNotRunning(self.inner.id.to_string()))
        }
    }

    /// Allocates the next request id. The first id is 1; 0 is never returned.
    pub fn next_rpc_id(&self) -> u64 {
        loop {
            let id = self.inner.next_rpc_id.fetch_add(1, Ordering::Relaxed);
            if id != 0 {
                return id;
            }
        }
    }

    /// Queues `future` on this actor.
    pub fn spawn<F>(&self, future: F) -> u64
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.inner.scheduler.spawn(future)
    }

    /// Sends a request to `target`; `sink` receives the response.
    ///
    /// Returns the rpc id the request was sent with. If the outbound sink
    /// refuses the message the registration is removed again.
    pub fn request(
        &self,
        target: ActorId,
        method: &str,
        args: Vec<Vec<u8>>,
        sink: Box<dyn CompletionSink>,
    ) -> Result<u64, FrameworkError> {
        self.ensure_running()?;
        let rpc_id = self.next_rpc_id();
        self.inner.responses.register(rpc_id, sink)?;
        debug!(actor = %self.inner.id, %target, method, rpc_id, "Sending request");
        let message = ServerMessage::request(rpc_id, self.inner.id.clone(), target, method, args);
        if let Err(e) = self.inner.outbound.deliver(message) {
            self.inner.responses.unregister(rpc_id);
            return Err(e);
        }
        Ok(rpc_id)
    }

    /// Sends a request and resolves to the response converted to `R`.
    ///
    /// The request goes out immediately; the returned future only waits.
    /// `R: Default` lets a `Completed` reply read as `R::default()`; for
    /// result types without a default, use [`ActorContext::request`] with a
    /// [`ResponseSender`](crate::ResponseSender) and [`Response::into_value`].
    pub fn request_typed<R>(
        &self,
        target: ActorId,
        method: &str,
        args: Vec<Vec<u8>>,
    ) -> impl Future<Output = Result<R, FrameworkError>> + Send + 'static
    where
        R: Default + Send + 'static,
    {
        let (sink, rx) = TypedSender::<R>::channel();
        let sent = self.request(target, method, args, Box::new(sink));
        async move {
            sent?;
            rx.await.map_err(|_| FrameworkError::ActorDropped)?
        }
    }

    /// Sends a one-way request. No response is expected or registered.
    pub fn notify(
        &self,
        target: ActorId,
        method: &str,
        args: Vec<Vec<u8>>,
    ) -> Result<(), FrameworkError> {
        self.ensure_running()?;
        debug!(actor = %self.inner.id, %target, method, "Sending notification");
        self.inner
            .outbound
            .deliver(ServerMessage::notification(self.inner.id.clone(), target, method, args))
    }

    fn reply(&self, rpc_id: u64, to: ActorId, response: Response, reply_to: &dyn MessageSink) {
        let message = ServerMessage::response(rpc_id, self.inner.id.clone(), to, response);
        if let Err(e) = reply_to.deliver(message) {
            warn!(actor = %self.inner.id, rpc_id, error = %e, "Failed to deliver response");
        }
    }
}

impl std::fmt::Debug for ActorContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActorContext")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .finish()
    }
}

/// An actor hosting a model of type `A`.
pub struct Actor<A> {
    ctx: ActorContext,
    model: Arc<A>,
    catalog: Arc<HandlerCatalog<A>>,
}

impl<A: Send + Sync + 'static> Actor<A> {
    /// Creates an actor in [`ActorState::Init`].
    ///
    /// `init` receives the actor's context so the model can send requests of
    /// its own.
    pub fn new<F>(
        id: ActorId,
        catalog: Arc<HandlerCatalog<A>>,
        scheduler: ActorScheduler,
        outbound: Arc<dyn MessageSink>,
        init: F,
    ) -> Self
    where
        F: FnOnce(ActorContext) -> A,
    {
        let ctx = ActorContext::new(id, scheduler, outbound);
        let model = Arc::new(init(ctx.clone()));
        Self {
            ctx,
            model,
            catalog,
        }
    }

    pub fn id(&self) -> &ActorId {
        self.ctx.id()
    }

    pub fn state(&self) -> ActorState {
        self.ctx.state()
    }

    pub fn is_running(&self) -> bool {
        self.ctx.is_running()
    }

    pub fn context(&self) -> &ActorContext {
        &self.ctx
    }

    pub fn model(&self) -> &Arc<A> {
        &self.model
    }

    pub fn catalog(&self) -> &Arc<HandlerCatalog<A>> {
        &self.catalog
    }

    pub fn scheduler(&self) -> &ActorScheduler {
        self.ctx.scheduler()
    }

    pub fn responses(&self) -> &ResponseCorrelator {
        self.ctx.responses()
    }

    /// Init → Running.
    pub fn start(&self) -> bool {
        let started = self.ctx.advance(ActorState::Running);
        if started {
            info!(actor = %self.id(), interface = self.catalog.interface(), "Actor started");
        }
        started
    }

    /// Stops the actor: queued continuations are dropped and waiting
    /// requesters see their channel close. Idempotent.
    pub fn exit(&self) {
        if !self.ctx.advance(ActorState::Exiting) {
            return;
        }
        self.ctx.scheduler().shutdown();
        let dropped = self.ctx.responses().clear();
        self.ctx.advance(ActorState::Exited);
        info!(actor = %self.id(), dropped_callbacks = dropped, "Actor exited");
    }

    /// Queues `future` on this actor.
    pub fn spawn<F>(&self, future: F) -> u64
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.ctx.spawn(future)
    }

    /// Runs a prepared call on this actor's queue.
    pub fn call(&self, call: Box<dyn Invokable<A>>) -> BoxFuture<'static, Response> {
        if let Err(e) = self.ctx.ensure_running() {
            return future::ready(Response::failure(e)).boxed();
        }
        let method = call.method();
        let target = self.model.clone();
        let (tx, rx) = oneshot::channel();
        self.ctx.scheduler().spawn_named(method, async move {
            let _ = tx.send(invoke_guarded(call, target).await);
        });
        async move {
            rx.await
                .unwrap_or_else(|_| Response::failure(FrameworkError::ActorDropped))
        }
        .boxed()
    }

    /// Calls `method` with typed arguments and converts the result to `R`.
    ///
    /// Result types without a `Default` go through [`Actor::call`] and
    /// [`Response::into_value`].
    pub fn ask<R>(
        &self,
        method: &str,
        args: Vec<ArgValue>,
    ) -> impl Future<Output = Result<R, FrameworkError>> + Send + 'static
    where
        R: Default + Send + 'static,
    {
        let prepared = self.catalog.create(method).and_then(|mut call| {
            call.update(args)?;
            Ok(call)
        });
        let pending = prepared.map(|call| self.call(call));
        async move { pending?.await.into_result::<R>() }
    }

    /// Calls `method` without waiting for its result.
    pub fn tell(&self, method: &str, args: Vec<ArgValue>) -> Result<(), FrameworkError> {
        self.ctx.ensure_running()?;
        let mut call = self.catalog.create(method)?;
        call.update(args)?;
        let target = self.model.clone();
        self.ctx.scheduler().spawn_named(method.to_string(), async move {
            invoke_guarded(call, target).await.dispose();
        });
        Ok(())
    }

    /// Handles a message delivered by the transport.
    ///
    /// Requests run on this actor's queue and are answered through
    /// `reply_to` unless their rpc id is 0. Responses complete the matching
    /// outstanding request.
    pub fn receive(&self, message: ServerMessage, reply_to: Arc<dyn MessageSink>) {
        let ServerMessage {
            rpc_id,
            source,
            target: _,
            body,
        } = message;
        match body {
            MessageBody::Response(response) => {
                self.ctx.responses().dispatch(rpc_id, response);
            }
            MessageBody::Request { method, args } => {
                self.handle_request(rpc_id, source, method, args, reply_to)
            }
        }
    }

    fn handle_request(
        &self,
        rpc_id: u64,
        source: ActorId,
        method: String,
        args: Vec<Vec<u8>>,
        reply_to: Arc<dyn MessageSink>,
    ) {
        let prepared = self.ctx.ensure_running().and_then(|()| {
            let mut call = self.catalog.create(&method)?;
            call.deserialize(&args)?;
            Ok(call)
        });
        let call = match prepared {
            Ok(call) => call,
            Err(e) => {
                warn!(actor = %self.id(), %source, method = %method, rpc_id, error = %e, "Rejected request");
                if rpc_id != 0 {
                    self.ctx
                        .reply(rpc_id, source, Response::failure(e), reply_to.as_ref());
                }
                return;
            }
        };

        let ctx = self.ctx.clone();
        let target = self.model.clone();
        self.ctx.scheduler().spawn_named(method, async move {
            let response = invoke_guarded(call, target).await;
            if rpc_id != 0 {
                ctx.reply(rpc_id, source, response, reply_to.as_ref());
            }
        });
    }
}

impl<A> std::fmt::Debug for Actor<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Actor")
            .field("id", self.ctx.id())
            .field("state", &self.ctx.state())
            .field("catalog", &self.catalog)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScheduleOptions;
    use crate::invokable::{encode_arg, HandlerError};
    use crate::pool::ManualPool;
    use crate::call_args;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        messages: Mutex<Vec<ServerMessage>>,
    }

    impl MessageSink for Recorder {
        fn deliver(&self, message: ServerMessage) -> Result<(), FrameworkError> {
            self.messages.lock().push(message);
            Ok(())
        }
    }

    struct Closed;

    impl MessageSink for Closed {
        fn deliver(&self, _: ServerMessage) -> Result<(), FrameworkError> {
            Err(FrameworkError::ActorClosed)
        }
    }

    #[derive(Default)]
    struct Echo {
        heard: Mutex<Vec<String>>,
    }

    fn echo_actor(pool: &ManualPool, outbound: Arc<dyn MessageSink>) -> Actor<Echo> {
        let catalog = HandlerCatalog::builder("Echo")
            .value("echo", |echo: Arc<Echo>, (text,): (String,)| async move {
                echo.heard.lock().push(text.clone());
                Ok::<_, HandlerError>(text)
            })
            .unit("hear", |echo: Arc<Echo>, (text,): (String,)| async move {
                echo.heard.lock().push(text);
                Ok::<_, HandlerError>(())
            })
            .build();
        let scheduler =
            ActorScheduler::new("echo", ScheduleOptions::default(), Arc::new(pool.clone()));
        Actor::new(
            ActorId::new("Echo", 1_i64, 1),
            catalog,
            scheduler,
            outbound,
            |_| Echo::default(),
        )
    }

    fn caller() -> ActorId {
        ActorId::new("Caller", 2_i64, 1)
    }

    #[test]
    fn lifecycle_only_moves_forward() {
        let pool = ManualPool::new();
        let actor = echo_actor(&pool, Arc::new(Recorder::default()));
        assert_eq!(actor.state(), ActorState::Init);
        assert!(actor.start());
        assert!(!actor.start());
        assert_eq!(actor.state(), ActorState::Running);
        actor.exit();
        actor.exit();
        assert_eq!(actor.state(), ActorState::Exited);
        assert!(!actor.start());
    }

    #[test]
    fn rpc_ids_start_at_one() {
        let pool = ManualPool::new();
        let actor = echo_actor(&pool, Arc::new(Recorder::default()));
        assert_eq!(actor.context().next_rpc_id(), 1);
        assert_eq!(actor.context().next_rpc_id(), 2);
    }

    #[test]
    fn request_is_answered_with_the_same_rpc_id() {
        let pool = ManualPool::new();
        let replies = Arc::new(Recorder::default());
        let actor = echo_actor(&pool, Arc::new(Recorder::default()));
        actor.start();

        let args = vec![encode_arg(&"ping".to_string()).unwrap()];
        actor.receive(
            ServerMessage::request(17, caller(), actor.id().clone(), "echo", args),
            replies.clone(),
        );
        pool.run_until_idle();

        let mut sent = replies.messages.lock();
        assert_eq!(sent.len(), 1);
        let reply = sent.pop().unwrap();
        assert_eq!(reply.rpc_id, 17);
        assert_eq!(reply.target, caller());
        match reply.body {
            MessageBody::Response(response) => {
                assert_eq!(response.into_result::<String>().unwrap(), "ping")
            }
            MessageBody::Request { .. } => panic!("expected a response"),
        }
    }

    #[test]
    fn one_way_requests_are_not_answered() {
        let pool = ManualPool::new();
        let replies = Arc::new(Recorder::default());
        let actor = echo_actor(&pool, Arc::new(Recorder::default()));
        actor.start();

        let args = vec![encode_arg(&"quiet".to_string()).unwrap()];
        actor.receive(
            ServerMessage::notification(caller(), actor.id().clone(), "hear", args),
            replies.clone(),
        );
        pool.run_until_idle();

        assert!(replies.messages.lock().is_empty());
        assert_eq!(*actor.model().heard.lock(), vec!["quiet".to_string()]);
    }

    #[test]
    fn unknown_method_replies_with_failure() {
        let pool = ManualPool::new();
        let replies = Arc::new(Recorder::default());
        let actor = echo_actor(&pool, Arc::new(Recorder::default()));
        actor.start();

        actor.receive(
            ServerMessage::request(4, caller(), actor.id().clone(), "shout", vec![]),
            replies.clone(),
        );

        let sent = replies.messages.lock();
        assert_eq!(sent.len(), 1);
        match &sent[0].body {
            MessageBody::Response(response) => assert!(matches!(
                response.error(),
                Some(FrameworkError::UnknownMethod(_))
            )),
            MessageBody::Request { .. } => panic!("expected a response"),
        }
    }

    #[test]
    fn requests_to_a_stopped_actor_fail() {
        let pool = ManualPool::new();
        let replies = Arc::new(Recorder::default());
        let actor = echo_actor(&pool, Arc::new(Recorder::default()));

        let args = vec![encode_arg(&"late".to_string()).unwrap()];
        actor.receive(
            ServerMessage::request(5, caller(), actor.id().clone(), "echo", args),
            replies.clone(),
        );
        assert_eq!(pool.pending(), 0);
        match &replies.messages.lock()[0].body {
            MessageBody::Response(response) => assert!(matches!(
                response.error(),
                Some(FrameworkError::ActorNotRunning(_))
            )),
            MessageBody::Request { .. } => panic!("expected a response"),
        };
    }

    #[test]
    fn outbound_requests_register_callbacks() {
        let pool = ManualPool::new();
        let outbound = Arc::new(Recorder::default());
        let actor = echo_actor(&pool, outbound.clone());
        actor.start();

        let (sink, _rx) = TypedSender::<String>::channel();
        let rpc_id = actor
            .context()
            .request(caller(), "whoami", vec![], Box::new(sink))
            .unwrap();
        assert_eq!(rpc_id, 1);
        assert!(actor.responses().contains(1));
        assert_eq!(outbound.messages.lock()[0].method(), Some("whoami"));

        actor.context().notify(caller(), "ping", vec![]).unwrap();
        assert_eq!(outbound.messages.lock()[1].rpc_id, 0);
        assert_eq!(actor.responses().len(), 1);
    }

    #[test]
    fn failed_send_removes_the_registration() {
        let pool = ManualPool::new();
        let actor = echo_actor(&pool, Arc::new(Closed));
        actor.start();
        let (sink, _rx) = TypedSender::<String>::channel();
        let result = actor
            .context()
            .request(caller(), "whoami", vec![], Box::new(sink));
        assert!(matches!(result, Err(FrameworkError::ActorClosed)));
        assert!(actor.responses().is_empty());
    }

    #[tokio::test]
    async fn exit_drops_outstanding_requests() {
        let pool = ManualPool::new();
        let actor = echo_actor(&pool, Arc::new(Recorder::default()));
        actor.start();
        let pending = actor
            .context()
            .request_typed::<String>(caller(), "whoami", vec![]);
        actor.exit();
        assert!(matches!(pending.await, Err(FrameworkError::ActorDropped)));
    }

    #[tokio::test]
    async fn ask_runs_on_the_queue() {
        let pool = ManualPool::new();
        let actor = echo_actor(&pool, Arc::new(Recorder::default()));
        actor.start();
        let reply = actor.ask::<String>("echo", call_args!["local".to_string()]);
        assert_eq!(pool.pending(), 1);
        pool.run_until_idle();
        assert_eq!(reply.await.unwrap(), "local");

        actor.tell("hear", call_args!["told".to_string()]).unwrap();
        pool.run_until_idle();
        assert_eq!(actor.model().heard.lock().len(), 2);
    }

    #[tokio::test]
    async fn calls_on_a_stopped_actor_fail() {
        let pool = ManualPool::new();
        let actor = echo_actor(&pool, Arc::new(Recorder::default()));
        actor.start();
        actor.exit();
        let result = actor
            .ask::<String>("echo", call_args!["gone".to_string()])
            .await;
        assert!(matches!(result, Err(FrameworkError::ActorNotRunning(_))));
    }
}
