//! # Mock Peer & Testing Guide
//!
//! [`MockPeer`] stands in for the remote side of an actor's outgoing
//! requests. Install it as the actor's outbound [`MessageSink`], script the
//! answers it should give, and the actor under test sees ordinary responses
//! arriving through its correlator.
//!
//! ## When to use a Mock Peer vs Real Actors
//!
//! | Feature | MockPeer | ActorSystem |
//! |---------|----------|-------------|
//! | **Speed** | Instant (replies inline) | Fast (pool scheduling) |
//! | **Determinism** | Fully scripted | Subject to the pool |
//! | **Peers** | Expectations only | Real actors with real state |
//! | **Error Injection** | Easy (`return_error`) | Requires a failing handler |
//! | **Lost replies** | Easy (`no_reply`) | Hard |
//!
//! ## Testing Strategies
//!
//! 1. **Single actor, no peers**: build the actor on a
//!    [`ManualPool`](crate::ManualPool) and drive the pool by hand.
//! 2. **Actor with mocked peers**: this module.
//! 3. **Full system**: spawn every actor in an
//!    [`ActorSystem`](crate::ActorSystem) on a
//!    [`TokioPool`](crate::TokioPool).
//!
//! ## Example
//!
//! ```rust
//! use actor_runtime::mock::MockPeer;
//! use actor_runtime::{Actor, ActorId, ActorScheduler, HandlerCatalog, ScheduleOptions, TokioPool};
//! use std::sync::Arc;
//!
//! struct Lobby;
//!
//! #[tokio::main]
//! async fn main() {
//!     let peer = MockPeer::new();
//!     peer.expect_request("say_hello").return_value(String::from("hi there"));
//!
//!     let scheduler = ActorScheduler::new(
//!         "lobby",
//!         ScheduleOptions::default(),
//!         Arc::new(TokioPool::current()),
//!     );
//!     let catalog = HandlerCatalog::<Lobby>::builder("Lobby").build();
//!     let lobby = Arc::new(Actor::new(
//!         ActorId::new("Lobby", 1_i64, 1),
//!         catalog,
//!         scheduler,
//!         peer.sink(),
//!         |_| Lobby,
//!     ));
//!     peer.attach(lobby.clone());
//!     lobby.start();
//!
//!     let reply = lobby
//!         .context()
//!         .request_typed::<String>(ActorId::new("Player", "alice", 1), "say_hello", vec![])
//!         .await
//!         .unwrap();
//!     assert_eq!(reply, "hi there");
//!     peer.verify();
//! }
//! ```

use crate::error::FrameworkError;
use crate::message::{ActorId, MessageBody, MessageSink, ServerMessage};
use crate::response::Response;
use crate::system::MessageTarget;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::{Arc, Weak};

type Reply = Box<dyn FnOnce() -> Response + Send>;

struct Expectation {
    method: String,
    reply: Option<Reply>,
}

/// A request the peer received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub rpc_id: u64,
    pub source: ActorId,
    pub target: ActorId,
    pub method: String,
    pub args: Vec<Vec<u8>>,
}

#[derive(Default)]
struct PeerState {
    expectations: VecDeque<Expectation>,
    received: Vec<RecordedRequest>,
    mismatches: Vec<String>,
    caller: Option<Weak<dyn MessageTarget>>,
}

/// A scripted remote peer. Cheap to clone; clones share the script.
#[derive(Clone, Default)]
pub struct MockPeer {
    state: Arc<Mutex<PeerState>>,
}

impl MockPeer {
    pub fn new() -> Self {
        Self::default()
    }

    /// The sink to install as the actor's outbound channel.
    pub fn sink(&self) -> Arc<dyn MessageSink> {
        Arc::new(self.clone())
    }

    /// Sets the actor that receives the scripted responses.
    pub fn attach(&self, caller: Arc<dyn MessageTarget>) {
        self.state.lock().caller = Some(Arc::downgrade(&caller));
    }

    /// Expects the next request to call `method`.
    pub fn expect_request(&self, method: impl Into<String>) -> ExpectationBuilder {
        ExpectationBuilder {
            method: method.into(),
            state: self.state.clone(),
        }
    }

    /// Requests received so far, in arrival order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().received.clone()
    }

    /// Panics if an expectation is unmet or a request did not match.
    pub fn verify(&self) {
        let state = self.state.lock();
        if !state.mismatches.is_empty() {
            panic!("Unexpected requests: {:?}", state.mismatches);
        }
        if !state.expectations.is_empty() {
            panic!(
                "Not all expectations were met. {} remaining",
                state.expectations.len()
            );
        }
    }
}

impl MessageSink for MockPeer {
    fn deliver(&self, message: ServerMessage) -> Result<(), FrameworkError> {
        let ServerMessage {
            rpc_id,
            source,
            target,
            body,
        } = message;
        let (method, args) = match body {
            MessageBody::Request { method, args } => (method, args),
            // Responses sent to the peer are not scripted.
            MessageBody::Response(_) => return Ok(()),
        };

        let (reply, caller) = {
            let mut state = self.state.lock();
            state.received.push(RecordedRequest {
                rpc_id,
                source: source.clone(),
                target: target.clone(),
                method: method.clone(),
                args,
            });
            let reply = match state.expectations.pop_front() {
                Some(expectation) if expectation.method == method => expectation.reply,
                Some(expectation) => {
                    state.mismatches.push(format!(
                        "expected {}, got {}",
                        expectation.method, method
                    ));
                    Some(unknown_method(&method))
                }
                None => {
                    state.mismatches.push(format!("unexpected {method}"));
                    Some(unknown_method(&method))
                }
            };
            (reply, state.caller.as_ref().and_then(Weak::upgrade))
        };

        // Deliver outside the lock: the caller may send again while handling.
        if let (Some(reply), Some(caller), true) = (reply, caller, rpc_id != 0) {
            caller.receive(
                ServerMessage::response(rpc_id, target, source, reply()),
                self.sink(),
            );
        }
        Ok(())
    }
}

fn unknown_method(method: &str) -> Reply {
    let error = FrameworkError::UnknownMethod(method.to_string());
    Box::new(move || Response::failure(error))
}

/// Scripts the answer to one expected request.
pub struct ExpectationBuilder {
    method: String,
    state: Arc<Mutex<PeerState>>,
}

impl ExpectationBuilder {
    fn push(self, reply: Option<Reply>) {
        self.state.lock().expectations.push_back(Expectation {
            method: self.method,
            reply,
        });
    }

    /// Answers with a value.
    pub fn return_value<T: Send + 'static>(self, value: T) {
        self.push(Some(Box::new(move || Response::from_result(value))));
    }

    /// Answers with [`Response::Completed`].
    pub fn return_completed(self) {
        self.push(Some(Box::new(Response::completed)));
    }

    /// Answers with a failure.
    pub fn return_error(self, error: FrameworkError) {
        self.push(Some(Box::new(move || Response::failure(error))));
    }

    /// Accepts the request but never answers it.
    pub fn no_reply(self) {
        self.push(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::Actor;
    use crate::catalog::HandlerCatalog;
    use crate::config::ScheduleOptions;
    use crate::pool::ManualPool;
    use crate::scheduler::ActorScheduler;
    use std::time::Duration;

    struct Lobby;

    fn lobby(peer: &MockPeer) -> Arc<Actor<Lobby>> {
        let scheduler = ActorScheduler::new(
            "lobby",
            ScheduleOptions::default(),
            Arc::new(ManualPool::new()),
        );
        let catalog = HandlerCatalog::<Lobby>::builder("Lobby").build();
        let actor = Arc::new(Actor::new(
            ActorId::new("Lobby", 1_i64, 1),
            catalog,
            scheduler,
            peer.sink(),
            |_| Lobby,
        ));
        peer.attach(actor.clone());
        actor.start();
        actor
    }

    fn player() -> ActorId {
        ActorId::new("Player", "alice", 1)
    }

    #[tokio::test]
    async fn scripted_error_reaches_the_caller() {
        let peer = MockPeer::new();
        peer.expect_request("kick")
            .return_error(FrameworkError::ActorNotFound("alice".into()));
        let lobby = lobby(&peer);

        let result = lobby
            .context()
            .request_typed::<()>(player(), "kick", vec![])
            .await;
        assert!(matches!(result, Err(FrameworkError::ActorNotFound(_))));
        peer.verify();
    }

    #[tokio::test]
    async fn no_reply_leaves_the_request_outstanding() {
        let peer = MockPeer::new();
        peer.expect_request("ping").no_reply();
        let lobby = lobby(&peer);

        let pending = lobby
            .context()
            .request_typed::<()>(player(), "ping", vec![]);
        let timed_out = tokio::time::timeout(Duration::from_millis(20), pending).await;
        assert!(timed_out.is_err());
        assert_eq!(lobby.responses().len(), 1);
        assert!(lobby.responses().unregister(1));
        peer.verify();
    }

    #[tokio::test]
    async fn unexpected_requests_are_answered_with_failure() {
        let peer = MockPeer::new();
        let lobby = lobby(&peer);
        let result = lobby
            .context()
            .request_typed::<u32>(player(), "score", vec![])
            .await;
        assert!(matches!(result, Err(FrameworkError::UnknownMethod(_))));
        assert_eq!(peer.requests()[0].method, "score");
    }

    #[test]
    #[should_panic(expected = "Not all expectations were met")]
    fn verify_reports_unmet_expectations() {
        let peer = MockPeer::new();
        peer.expect_request("kick").return_completed();
        peer.verify();
    }
}
