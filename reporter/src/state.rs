use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::engine::Engine;

/// One lock per conversation so answers for the same session are applied
/// strictly one after another, while different conversations run in parallel.
///
/// Entries live only while someone holds or waits for them.
#[derive(Default)]
pub struct ConversationLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl ConversationLocks {
    pub async fn acquire(&self, conversation_id: &str) -> ConversationGuard<'_> {
        let lock = self
            .locks
            .entry(conversation_id.to_string())
            .or_default()
            .clone();
        ConversationGuard {
            locks: &self.locks,
            conversation_id: conversation_id.to_string(),
            guard: Some(lock.lock_owned().await),
        }
    }
}

/// Held for the duration of one request on a conversation.
pub struct ConversationGuard<'a> {
    locks: &'a DashMap<String, Arc<Mutex<()>>>,
    conversation_id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for ConversationGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Waiters hold their own clone, so a count of one means only the map
        // still references the lock. The shard lock makes this atomic with
        // `acquire`.
        self.locks
            .remove_if(&self.conversation_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

pub struct AppState {
    pub engine: Engine,
    pub conversations: ConversationLocks,
}

impl AppState {
    pub fn new(engine: Engine) -> Self {
        Self {
            engine,
            conversations: ConversationLocks::default(),
        }
    }
}
