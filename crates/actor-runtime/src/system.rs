//! # Actor System
//!
//! A directory of the actors living in one process. The system builds each
//! actor with its own scheduler on the shared pool, routes [`ServerMessage`]s
//! between them, and stops them all on [`ActorSystem::shutdown`].
//!
//! There is no global instance: construct one and pass it to whatever needs
//! to reach the actors.

use crate::actor::{Actor, ActorContext, ActorState};
use crate::catalog::HandlerCatalog;
use crate::clock::{Clock, MonotonicClock};
use crate::config::ScheduleOptions;
use crate::error::FrameworkError;
use crate::message::{ActorId, MessageSink, ServerMessage};
use crate::pool::WorkerPool;
use crate::response::ResponsePool;
use crate::scheduler::ActorScheduler;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::{Arc, Weak};
use tracing::{debug, info};

/// What the directory needs from an actor, independent of its model type.
pub trait MessageTarget: Send + Sync {
    fn actor_id(&self) -> &ActorId;

    fn state(&self) -> ActorState;

    fn receive(&self, message: ServerMessage, reply_to: Arc<dyn MessageSink>);

    fn exit(&self);
}

impl<A: Send + Sync + 'static> MessageTarget for Actor<A> {
    fn actor_id(&self) -> &ActorId {
        self.id()
    }

    fn state(&self) -> ActorState {
        Actor::state(self)
    }

    fn receive(&self, message: ServerMessage, reply_to: Arc<dyn MessageSink>) {
        Actor::receive(self, message, reply_to)
    }

    fn exit(&self) {
        Actor::exit(self)
    }
}

struct SystemInner {
    actors: DashMap<ActorId, Arc<dyn MessageTarget>>,
    pool: Arc<dyn WorkerPool>,
    clock: Arc<dyn Clock>,
    options: ScheduleOptions,
    results: ResponsePool,
}

/// The in-process actor directory. Cheap to clone.
#[derive(Clone)]
pub struct ActorSystem {
    inner: Arc<SystemInner>,
}

impl ActorSystem {
    pub fn new(pool: Arc<dyn WorkerPool>, options: ScheduleOptions) -> Result<Self, FrameworkError> {
        Self::with_clock(pool, options, Arc::new(MonotonicClock::new()))
    }

    pub fn with_clock(
        pool: Arc<dyn WorkerPool>,
        options: ScheduleOptions,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, FrameworkError> {
        options.validate()?;
        let results = ResponsePool::new(options.result_pool_max_retained);
        Ok(Self {
            inner: Arc::new(SystemInner {
                actors: DashMap::new(),
                pool,
                clock,
                options,
                results,
            }),
        })
    }

    pub fn options(&self) -> &ScheduleOptions {
        &self.inner.options
    }

    /// Result pool sized from the options, for catalogs of this system.
    pub fn result_pool(&self) -> &ResponsePool {
        &self.inner.results
    }

    /// A sink routing through this system without keeping it alive.
    pub fn sink(&self) -> Arc<dyn MessageSink> {
        Arc::new(SystemLink {
            system: Arc::downgrade(&self.inner),
        })
    }

    /// Builds, starts and registers an actor.
    pub fn spawn<A, F>(
        &self,
        id: ActorId,
        catalog: Arc<HandlerCatalog<A>>,
        init: F,
    ) -> Result<Arc<Actor<A>>, FrameworkError>
    where
        A: Send + Sync + 'static,
        F: FnOnce(ActorContext) -> A,
    {
        if self.inner.actors.contains_key(&id) {
            return Err(FrameworkError::ActorExists(id.to_string()));
        }
        let scheduler = ActorScheduler::with_clock(
            id.to_string(),
            self.inner.options.clone(),
            self.inner.pool.clone(),
            self.inner.clock.clone(),
        );
        let actor = Arc::new(Actor::new(id, catalog, scheduler, self.sink(), init));
        self.register(actor.clone())?;
        actor.start();
        Ok(actor)
    }

    /// Adds an already built actor to the directory.
    pub fn register(&self, actor: Arc<dyn MessageTarget>) -> Result<(), FrameworkError> {
        match self.inner.actors.entry(actor.actor_id().clone()) {
            Entry::Occupied(entry) => Err(FrameworkError::ActorExists(entry.key().to_string())),
            Entry::Vacant(entry) => {
                debug!(actor = %entry.key(), "Registered actor");
                entry.insert(actor);
                Ok(())
            }
        }
    }

    pub fn get(&self, id: &ActorId) -> Option<Arc<dyn MessageTarget>> {
        self.inner.actors.get(id).map(|entry| entry.value().clone())
    }

    /// Removes an actor from the directory and stops it.
    pub fn remove(&self, id: &ActorId) -> Option<Arc<dyn MessageTarget>> {
        let (_, actor) = self.inner.actors.remove(id)?;
        actor.exit();
        Some(actor)
    }

    pub fn contains(&self, id: &ActorId) -> bool {
        self.inner.actors.contains_key(id)
    }

    pub fn ids(&self) -> Vec<ActorId> {
        self.inner.actors.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.actors.is_empty()
    }

    /// Stops and removes every actor.
    pub fn shutdown(&self) {
        let actors: Vec<_> = self
            .inner
            .actors
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        self.inner.actors.clear();
        for actor in &actors {
            actor.exit();
        }
        info!(actors = actors.len(), "Actor system shut down");
    }
}

impl MessageSink for ActorSystem {
    fn deliver(&self, message: ServerMessage) -> Result<(), FrameworkError> {
        route(&self.inner, message)
    }
}

impl std::fmt::Debug for ActorSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActorSystem")
            .field("actors", &self.inner.actors.len())
            .field("options", &self.inner.options)
            .finish()
    }
}

struct SystemLink {
    system: Weak<SystemInner>,
}

impl MessageSink for SystemLink {
    fn deliver(&self, message: ServerMessage) -> Result<(), FrameworkError> {
        let system = self.system.upgrade().ok_or(FrameworkError::ActorClosed)?;
        route(&system, message)
    }
}

fn route(system: &Arc<SystemInner>, message: ServerMessage) -> Result<(), FrameworkError> {
    // Clone the target out so the map shard is not locked while it runs.
    let target = system
        .actors
        .get(&message.target)
        .map(|entry| entry.value().clone())
        .ok_or_else(|| FrameworkError::ActorNotFound(message.target.to_string()))?;
    let reply_to: Arc<dyn MessageSink> = Arc::new(SystemLink {
        system: Arc::downgrade(system),
    });
    target.receive(message, reply_to);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invokable::HandlerError;
    use crate::pool::ManualPool;
    use crate::call_args;

    struct Counter {
        hits: parking_lot::Mutex<u32>,
    }

    fn counter_catalog() -> Arc<HandlerCatalog<Counter>> {
        HandlerCatalog::builder("Counter")
            .value("hit", |counter: Arc<Counter>, (): ()| async move {
                let mut hits = counter.hits.lock();
                *hits += 1;
                Ok::<_, HandlerError>(*hits)
            })
            .build()
    }

    fn system(pool: &ManualPool) -> ActorSystem {
        ActorSystem::new(Arc::new(pool.clone()), ScheduleOptions::default()).unwrap()
    }

    fn spawn_counter(system: &ActorSystem, key: i64) -> Arc<Actor<Counter>> {
        system
            .spawn(ActorId::new("Counter", key, 1), counter_catalog(), |_| Counter {
                hits: parking_lot::Mutex::new(0),
            })
            .unwrap()
    }

    #[test]
    fn spawn_registers_and_starts() {
        let pool = ManualPool::new();
        let system = system(&pool);
        let actor = spawn_counter(&system, 1);
        assert_eq!(actor.state(), ActorState::Running);
        assert_eq!(system.len(), 1);
        assert!(system.get(actor.id()).is_some());
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let pool = ManualPool::new();
        let system = system(&pool);
        spawn_counter(&system, 1);
        let again = system.spawn(ActorId::new("Counter", 1_i64, 1), counter_catalog(), |_| {
            Counter {
                hits: parking_lot::Mutex::new(0),
            }
        });
        assert!(matches!(again, Err(FrameworkError::ActorExists(_))));
    }

    #[test]
    fn remove_stops_the_actor() {
        let pool = ManualPool::new();
        let system = system(&pool);
        let actor = spawn_counter(&system, 1);
        let removed = system.remove(actor.id()).unwrap();
        assert_eq!(removed.state(), ActorState::Exited);
        assert!(system.is_empty());
        assert!(system.remove(actor.id()).is_none());
    }

    #[test]
    fn delivering_to_an_unknown_actor_fails() {
        let pool = ManualPool::new();
        let system = system(&pool);
        let message = ServerMessage::notification(
            ActorId::new("Counter", 1_i64, 1),
            ActorId::new("Counter", 9_i64, 1),
            "hit",
            vec![],
        );
        assert!(matches!(
            system.deliver(message),
            Err(FrameworkError::ActorNotFound(_))
        ));
    }

    #[tokio::test]
    async fn shutdown_exits_every_actor() {
        let pool = ManualPool::new();
        let system = system(&pool);
        let first = spawn_counter(&system, 1);
        let second = spawn_counter(&system, 2);

        let hit = first.ask::<u32>("hit", call_args![]);
        pool.run_until_idle();
        assert_eq!(hit.await.unwrap(), 1);

        system.shutdown();
        assert!(system.is_empty());
        assert_eq!(first.state(), ActorState::Exited);
        assert_eq!(second.state(), ActorState::Exited);
    }

    #[test]
    fn invalid_options_are_rejected() {
        let options = ScheduleOptions {
            backlog_warning_interval_ms: 0,
            ..ScheduleOptions::default()
        };
        assert!(matches!(
            ActorSystem::new(Arc::new(ManualPool::new()), options),
            Err(FrameworkError::InvalidConfig(_))
        ));
    }
}
