use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// The state behind one `Player` actor.
///
/// # Actor Runtime
/// A `PlayerModel` is only ever touched by handlers running on its own
/// actor's queue, one at a time. The locks and atomics are there to make the
/// model `Sync`; they are never contended.
#[derive(Debug)]
pub struct PlayerModel {
    name: String,
    said: Mutex<Vec<String>>,
    greetings: AtomicU64,
    muted: AtomicBool,
}

/// A snapshot of a player, returned by the `profile` method.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerProfile {
    pub name: String,
    pub lines_said: usize,
    pub greetings: u64,
    pub muted: bool,
}

impl PlayerModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            said: Mutex::new(Vec::new()),
            greetings: AtomicU64::new(0),
            muted: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::Relaxed)
    }

    pub fn set_muted(&self, muted: bool) {
        self.muted.store(muted, Ordering::Relaxed);
    }

    /// Records a line the player said.
    pub fn say(&self, line: impl Into<String>) {
        self.said.lock().push(line.into());
    }

    /// Counts a greeting and builds the reply.
    pub fn greet(&self, greeting: &str) -> String {
        self.greetings.fetch_add(1, Ordering::Relaxed);
        self.say(greeting);
        format!("{} answers: hello!", self.name)
    }

    pub fn history(&self) -> Vec<String> {
        self.said.lock().clone()
    }

    pub fn greeting_count(&self) -> u64 {
        self.greetings.load(Ordering::Relaxed)
    }

    pub fn profile(&self) -> PlayerProfile {
        PlayerProfile {
            name: self.name.clone(),
            lines_said: self.said.lock().len(),
            greetings: self.greeting_count(),
            muted: self.is_muted(),
        }
    }
}
