//! # Invocable Calls
//!
//! An [`Invokable`] is one method invocation bound to an actor: a method
//! name, its decoded arguments, and the handler to run. The transport fills
//! the arguments either from serialized buffers ([`Invokable::deserialize`])
//! or, for calls within the process, from already-typed values
//! ([`Invokable::update`]).
//!
//! Two shapes cover every handler:
//! - [`UnitCall`] for handlers with no result; it completes with
//!   [`Response::Completed`].
//! - [`ValueCall`] for handlers returning a value; the value is boxed in a
//!   pooled [`Response::Value`].
//!
//! Handler errors become [`Response::Failure`]. Panics are caught by
//! [`invoke_guarded`], which is how the actor runs every call.

use crate::error::FrameworkError;
use crate::response::{Response, ResponsePool};
use crate::scheduler::panic_message;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::{type_name, Any};
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::warn;

/// Error type accepted from handlers.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A typed value passed to [`Invokable::update`].
pub type ArgValue = Box<dyn Any + Send>;

pub(crate) type Handler<A, P, R> =
    Arc<dyn Fn(Arc<A>, P) -> BoxFuture<'static, Result<R, HandlerError>> + Send + Sync>;

/// A single method invocation targeting an actor of type `A`.
pub trait Invokable<A>: Send {
    /// Method selector this call was created for.
    fn method(&self) -> &'static str;

    /// Number of parameters the handler takes.
    fn arity(&self) -> usize;

    /// Decodes the parameter set from one buffer per argument.
    fn deserialize(&mut self, raw: &[Vec<u8>]) -> Result<(), FrameworkError>;

    /// Sets the parameter set from typed values, skipping the codec.
    fn update(&mut self, values: Vec<ArgValue>) -> Result<(), FrameworkError>;

    /// Runs the handler against `target`.
    fn invoke(self: Box<Self>, target: Arc<A>) -> BoxFuture<'static, Response>;
}

/// Encodes one argument with the wire codec.
pub fn encode_arg<T: Serialize>(value: &T) -> Result<Vec<u8>, FrameworkError> {
    bincode::serialize(value).map_err(|e| FrameworkError::ArgumentEncode(e.to_string()))
}

/// Decodes the argument at `index` with the wire codec.
pub fn decode_arg<T: DeserializeOwned>(index: usize, raw: &[u8]) -> Result<T, FrameworkError> {
    bincode::deserialize(raw).map_err(|e| FrameworkError::ArgumentDecode {
        index,
        reason: e.to_string(),
    })
}

fn check_arity(expected: usize, actual: usize) -> Result<(), FrameworkError> {
    if expected == actual {
        Ok(())
    } else {
        Err(FrameworkError::ArgumentCount { expected, actual })
    }
}

fn downcast_arg<T: 'static>(index: usize, value: Option<ArgValue>) -> Result<T, FrameworkError> {
    let value = value.ok_or(FrameworkError::ArgumentCount {
        expected: index + 1,
        actual: index,
    })?;
    value
        .downcast::<T>()
        .map(|boxed| *boxed)
        .map_err(|_| FrameworkError::ArgumentType {
            index,
            expected: type_name::<T>(),
        })
}

/// A parameter set: a tuple of up to four arguments.
pub trait Arguments: Sized + Send + 'static {
    const ARITY: usize;

    fn decode(raw: &[Vec<u8>]) -> Result<Self, FrameworkError>;

    fn from_values(values: Vec<ArgValue>) -> Result<Self, FrameworkError>;
}

impl Arguments for () {
    const ARITY: usize = 0;

    fn decode(raw: &[Vec<u8>]) -> Result<Self, FrameworkError> {
        check_arity(0, raw.len())
    }

    fn from_values(values: Vec<ArgValue>) -> Result<Self, FrameworkError> {
        check_arity(0, values.len())
    }
}

macro_rules! impl_arguments {
    ($arity:expr; $($idx:tt => $name:ident),+) => {
        impl<$($name),+> Arguments for ($($name,)+)
        where
            $($name: DeserializeOwned + Send + 'static),+
        {
            const ARITY: usize = $arity;

            fn decode(raw: &[Vec<u8>]) -> Result<Self, FrameworkError> {
                check_arity(Self::ARITY, raw.len())?;
                Ok(($(decode_arg::<$name>($idx, &raw[$idx])?,)+))
            }

            fn from_values(values: Vec<ArgValue>) -> Result<Self, FrameworkError> {
                check_arity(Self::ARITY, values.len())?;
                let mut values = values.into_iter();
                Ok(($(downcast_arg::<$name>($idx, values.next())?,)+))
            }
        }
    };
}

impl_arguments!(1; 0 => T0);
impl_arguments!(2; 0 => T0, 1 => T1);
impl_arguments!(3; 0 => T0, 1 => T1, 2 => T2);
impl_arguments!(4; 0 => T0, 1 => T1, 2 => T2, 3 => T3);

/// Builds an argument list for [`Invokable::update`].
///
/// ```ignore
/// let args = call_args![String::from("hello"), 3_u32];
/// ```
#[macro_export]
macro_rules! call_args {
    () => {
        ::std::vec::Vec::<$crate::ArgValue>::new()
    };
    ($($value:expr),+ $(,)?) => {
        vec![$(::std::boxed::Box::new($value) as $crate::ArgValue),+]
    };
}

pub(crate) fn wrap_handler<A, P, R, F, Fut, E>(handler: F) -> Handler<A, P, R>
where
    F: Fn(Arc<A>, P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
    E: Into<HandlerError>,
    R: 'static,
{
    Arc::new(move |target, args| {
        let fut = handler(target, args);
        async move { fut.await.map_err(Into::into) }.boxed()
    })
}

fn resolve_args<P: Arguments>(method: &'static str, args: Option<P>) -> Result<P, FrameworkError> {
    match args {
        Some(args) => Ok(args),
        None if P::ARITY == 0 => P::from_values(Vec::new()),
        None => Err(FrameworkError::MissingArguments(method)),
    }
}

/// A call whose handler produces no value.
pub struct UnitCall<A, P> {
    method: &'static str,
    handler: Handler<A, P, ()>,
    args: Option<P>,
}

impl<A, P> UnitCall<A, P>
where
    A: Send + Sync + 'static,
    P: Arguments,
{
    pub fn new<F, Fut, E>(method: &'static str, handler: F) -> Self
    where
        F: Fn(Arc<A>, P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<HandlerError>,
    {
        Self::from_handler(method, wrap_handler(handler))
    }

    pub(crate) fn from_handler(method: &'static str, handler: Handler<A, P, ()>) -> Self {
        Self {
            method,
            handler,
            args: None,
        }
    }

    /// Sets the parameter set directly.
    pub fn with_args(mut self, args: P) -> Self {
        self.args = Some(args);
        self
    }
}

impl<A, P> Invokable<A> for UnitCall<A, P>
where
    A: Send + Sync + 'static,
    P: Arguments,
{
    fn method(&self) -> &'static str {
        self.method
    }

    fn arity(&self) -> usize {
        P::ARITY
    }

    fn deserialize(&mut self, raw: &[Vec<u8>]) -> Result<(), FrameworkError> {
        self.args = Some(P::decode(raw)?);
        Ok(())
    }

    fn update(&mut self, values: Vec<ArgValue>) -> Result<(), FrameworkError> {
        self.args = Some(P::from_values(values)?);
        Ok(())
    }

    fn invoke(self: Box<Self>, target: Arc<A>) -> BoxFuture<'static, Response> {
        let UnitCall {
            method,
            handler,
            args,
        } = *self;
        async move {
            let args = match resolve_args(method, args) {
                Ok(args) => args,
                Err(e) => return Response::failure(e),
            };
            match handler(target, args).await {
                Ok(()) => Response::completed(),
                Err(e) => Response::failure(FrameworkError::from_boxed(e)),
            }
        }
        .boxed()
    }
}

/// A call whose handler produces a value of type `R`.
pub struct ValueCall<A, P, R> {
    method: &'static str,
    handler: Handler<A, P, R>,
    args: Option<P>,
    pool: Option<ResponsePool>,
}

impl<A, P, R> ValueCall<A, P, R>
where
    A: Send + Sync + 'static,
    P: Arguments,
    R: Send + 'static,
{
    pub fn new<F, Fut, E>(method: &'static str, handler: F) -> Self
    where
        F: Fn(Arc<A>, P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
        E: Into<HandlerError>,
    {
        Self::from_handler(method, wrap_handler(handler), None)
    }

    pub(crate) fn from_handler(
        method: &'static str,
        handler: Handler<A, P, R>,
        pool: Option<ResponsePool>,
    ) -> Self {
        Self {
            method,
            handler,
            args: None,
            pool,
        }
    }

    pub fn with_args(mut self, args: P) -> Self {
        self.args = Some(args);
        self
    }

    /// Boxes results in `pool` instead of unpooled slots.
    pub fn with_pool(mut self, pool: ResponsePool) -> Self {
        self.pool = Some(pool);
        self
    }
}

impl<A, P, R> Invokable<A> for ValueCall<A, P, R>
where
    A: Send + Sync + 'static,
    P: Arguments,
    R: Send + 'static,
{
    fn method(&self) -> &'static str {
        self.method
    }

    fn arity(&self) -> usize {
        P::ARITY
    }

    fn deserialize(&mut self, raw: &[Vec<u8>]) -> Result<(), FrameworkError> {
        self.args = Some(P::decode(raw)?);
        Ok(())
    }

    fn update(&mut self, values: Vec<ArgValue>) -> Result<(), FrameworkError> {
        self.args = Some(P::from_values(values)?);
        Ok(())
    }

    fn invoke(self: Box<Self>, target: Arc<A>) -> BoxFuture<'static, Response> {
        let ValueCall {
            method,
            handler,
            args,
            pool,
        } = *self;
        async move {
            let args = match resolve_args(method, args) {
                Ok(args) => args,
                Err(e) => return Response::failure(e),
            };
            match handler(target, args).await {
                Ok(value) => match &pool {
                    Some(pool) => Response::from_result_in(pool, value),
                    None => Response::from_result(value),
                },
                Err(e) => Response::failure(FrameworkError::from_boxed(e)),
            }
        }
        .boxed()
    }
}

/// Runs `call` and turns a panic anywhere in the handler into
/// [`FrameworkError::Panicked`].
pub async fn invoke_guarded<A>(call: Box<dyn Invokable<A>>, target: Arc<A>) -> Response
where
    A: Send + Sync + 'static,
{
    let method = call.method();
    let future = match catch_unwind(AssertUnwindSafe(|| call.invoke(target))) {
        Ok(future) => future,
        Err(payload) => return panicked(method, payload),
    };
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(response) => response,
        Err(payload) => panicked(method, payload),
    }
}

fn panicked(method: &'static str, payload: Box<dyn Any + Send>) -> Response {
    let message = panic_message(payload.as_ref());
    warn!(method, panic = %message, "Call panicked");
    Response::failure(FrameworkError::Panicked(message))
}
