use actor_runtime::{ActorContext, ActorId};
use parking_lot::Mutex;

/// The state behind the `Greeter` actor.
///
/// The greeter owns no game data; it calls players over RPC through its
/// [`ActorContext`] and keeps a log of the replies it got.
#[derive(Debug)]
pub struct GreeterModel {
    ctx: ActorContext,
    service_id: u32,
    replies: Mutex<Vec<String>>,
}

impl GreeterModel {
    pub fn new(ctx: ActorContext, service_id: u32) -> Self {
        Self {
            ctx,
            service_id,
            replies: Mutex::new(Vec::new()),
        }
    }

    pub fn ctx(&self) -> &ActorContext {
        &self.ctx
    }

    /// Identity of the player with `key` on this greeter's service.
    pub fn player(&self, key: i64) -> ActorId {
        crate::player_actor::player_id(key, self.service_id)
    }

    pub fn record_reply(&self, reply: impl Into<String>) {
        self.replies.lock().push(reply.into());
    }

    pub fn replies(&self) -> Vec<String> {
        self.replies.lock().clone()
    }
}
