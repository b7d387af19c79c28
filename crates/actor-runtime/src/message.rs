//! # Server Messages
//!
//! The envelope exchanged between actors. A request carries the method name
//! and one encoded buffer per argument; a response carries the [`Response`]
//! produced by the callee under the same rpc id.
//!
//! An rpc id of 0 marks a one-way message: it is never registered with a
//! correlator and never answered.

use crate::error::FrameworkError;
use crate::response::Response;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The key part of an actor identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActorKey {
    Long(i64),
    Str(String),
}

impl fmt::Display for ActorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActorKey::Long(key) => write!(f, "{key}"),
            ActorKey::Str(key) => f.write_str(key),
        }
    }
}

impl From<i64> for ActorKey {
    fn from(key: i64) -> Self {
        ActorKey::Long(key)
    }
}

impl From<&str> for ActorKey {
    fn from(key: &str) -> Self {
        ActorKey::Str(key.to_string())
    }
}

impl From<String> for ActorKey {
    fn from(key: String) -> Self {
        ActorKey::Str(key)
    }
}

/// Identity of an actor: its key, the service hosting it, and its type name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorId {
    pub key: ActorKey,
    pub service_id: u32,
    pub type_name: String,
}

impl ActorId {
    pub fn new(type_name: impl Into<String>, key: impl Into<ActorKey>, service_id: u32) -> Self {
        Self {
            key: key.into(),
            service_id,
            type_name: type_name.into(),
        }
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.type_name, self.key, self.service_id)
    }
}

#[derive(Debug)]
pub enum MessageBody {
    Request { method: String, args: Vec<Vec<u8>> },
    Response(Response),
}

#[derive(Debug)]
pub struct ServerMessage {
    pub rpc_id: u64,
    pub source: ActorId,
    pub target: ActorId,
    pub body: MessageBody,
}

impl ServerMessage {
    pub fn request(
        rpc_id: u64,
        source: ActorId,
        target: ActorId,
        method: impl Into<String>,
        args: Vec<Vec<u8>>,
    ) -> Self {
        Self {
            rpc_id,
            source,
            target,
            body: MessageBody::Request {
                method: method.into(),
                args,
            },
        }
    }

    /// A one-way request.
    pub fn notification(
        source: ActorId,
        target: ActorId,
        method: impl Into<String>,
        args: Vec<Vec<u8>>,
    ) -> Self {
        Self::request(0, source, target, method, args)
    }

    pub fn response(rpc_id: u64, source: ActorId, target: ActorId, response: Response) -> Self {
        Self {
            rpc_id,
            source,
            target,
            body: MessageBody::Response(response),
        }
    }

    /// Whether the sender expects an answer.
    pub fn is_request(&self) -> bool {
        self.rpc_id > 0
    }

    pub fn is_response(&self) -> bool {
        matches!(self.body, MessageBody::Response(_))
    }

    pub fn method(&self) -> Option<&str> {
        match &self.body {
            MessageBody::Request { method, .. } => Some(method),
            MessageBody::Response(_) => None,
        }
    }
}

/// Where an actor sends outgoing messages.
pub trait MessageSink: Send + Sync {
    fn deliver(&self, message: ServerMessage) -> Result<(), FrameworkError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rpc_id_zero_is_one_way() {
        let from = ActorId::new("Greeter", 1_i64, 1);
        let to = ActorId::new("Player", "alice", 1);
        let one_way = ServerMessage::notification(from.clone(), to.clone(), "say", vec![]);
        assert!(!one_way.is_request());
        assert_eq!(one_way.method(), Some("say"));

        let call = ServerMessage::request(3, from.clone(), to.clone(), "say_hello", vec![]);
        assert!(call.is_request());

        let reply = ServerMessage::response(3, to, from, Response::completed());
        assert!(reply.is_response());
        assert_eq!(reply.method(), None);
    }

    #[test]
    fn actor_id_display() {
        assert_eq!(ActorId::new("Player", 7_i64, 2).to_string(), "Player/7@2");
        assert_eq!(ActorId::new("Player", "bob", 1).to_string(), "Player/bob@1");
    }
}
