//! # Handler Catalog
//!
//! Maps the method names an actor type answers to factories producing fresh
//! [`Invokable`] calls. A catalog is assembled once with a [`CatalogBuilder`]
//! when the actor type is wired up, and is read-only afterwards.
//!
//! ```ignore
//! let catalog = HandlerCatalog::<Player>::builder("Player")
//!     .unit("say", |player: Arc<Player>, (text,): (String,)| async move {
//!         player.say(&text);
//!         Ok::<_, HandlerError>(())
//!     })
//!     .value("say_hello", |player: Arc<Player>, (greeting,): (String,)| async move {
//!         Ok::<_, HandlerError>(player.reply_to(&greeting))
//!     })
//!     .build();
//! ```

use crate::error::FrameworkError;
use crate::invokable::{wrap_handler, Arguments, HandlerError, Invokable, UnitCall, ValueCall};
use crate::response::ResponsePool;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::warn;

type Factory<A> = Arc<dyn Fn() -> Box<dyn Invokable<A>> + Send + Sync>;

/// The methods one actor type can be called with.
pub struct HandlerCatalog<A> {
    interface: &'static str,
    handlers: HashMap<&'static str, Factory<A>>,
}

impl<A: Send + Sync + 'static> HandlerCatalog<A> {
    pub fn builder(interface: &'static str) -> CatalogBuilder<A> {
        CatalogBuilder {
            interface,
            handlers: HashMap::new(),
            pool: None,
        }
    }

    /// Creates a fresh call for `method` with no arguments set.
    pub fn create(&self, method: &str) -> Result<Box<dyn Invokable<A>>, FrameworkError> {
        self.handlers
            .get(method)
            .map(|factory| factory())
            .ok_or_else(|| FrameworkError::UnknownMethod(format!("{}.{}", self.interface, method)))
    }

    pub fn contains(&self, method: &str) -> bool {
        self.handlers.contains_key(method)
    }

    pub fn interface(&self) -> &'static str {
        self.interface
    }

    /// Registered method names, sorted.
    pub fn methods(&self) -> Vec<&'static str> {
        let mut methods: Vec<_> = self.handlers.keys().copied().collect();
        methods.sort_unstable();
        methods
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl<A> std::fmt::Debug for HandlerCatalog<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut methods: Vec<_> = self.handlers.keys().collect();
        methods.sort_unstable();
        f.debug_struct("HandlerCatalog")
            .field("interface", &self.interface)
            .field("methods", &methods)
            .finish()
    }
}

/// Assembles a [`HandlerCatalog`].
pub struct CatalogBuilder<A> {
    interface: &'static str,
    handlers: HashMap<&'static str, Factory<A>>,
    pool: Option<ResponsePool>,
}

impl<A: Send + Sync + 'static> CatalogBuilder<A> {
    /// Boxes value results of the handlers registered after this call in
    /// `pool` rather than in unpooled slots.
    pub fn with_result_pool(mut self, pool: ResponsePool) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Registers a handler that produces no value.
    pub fn unit<P, F, Fut, E>(self, method: &'static str, handler: F) -> Self
    where
        P: Arguments,
        F: Fn(Arc<A>, P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<HandlerError>,
    {
        let handler = wrap_handler(handler);
        self.insert(
            method,
            Arc::new(move || {
                Box::new(UnitCall::from_handler(method, handler.clone())) as Box<dyn Invokable<A>>
            }),
        )
    }

    /// Registers a handler that produces a value of type `R`.
    pub fn value<P, R, F, Fut, E>(self, method: &'static str, handler: F) -> Self
    where
        P: Arguments,
        R: Send + 'static,
        F: Fn(Arc<A>, P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
        E: Into<HandlerError>,
    {
        let handler = wrap_handler(handler);
        let pool = self.pool.clone();
        self.insert(
            method,
            Arc::new(move || {
                Box::new(ValueCall::from_handler(method, handler.clone(), pool.clone()))
                    as Box<dyn Invokable<A>>
            }),
        )
    }

    fn insert(mut self, method: &'static str, factory: Factory<A>) -> Self {
        if self.handlers.insert(method, factory).is_some() {
            warn!(
                interface = self.interface,
                method, "Handler registered twice, keeping the last one"
            );
        }
        self
    }

    pub fn build(self) -> Arc<HandlerCatalog<A>> {
        Arc::new(HandlerCatalog {
            interface: self.interface,
            handlers: self.handlers,
        })
    }
}
