use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

struct Conversation {
    messages: VecDeque<ChatMessage>,
    last_used: u64,
}

/// Per-session conversation logs. Display only: the pipeline never reads them,
/// so every question is answered on its own.
///
/// Bounded on both axes. Each log keeps its newest `max_messages`; once
/// `max_sessions` logs exist, the least recently used quarter is dropped
/// before a new one is started.
pub struct SessionStore {
    sessions: DashMap<Uuid, Conversation>,
    clock: AtomicU64,
    max_sessions: usize,
    max_messages: usize,
}

impl SessionStore {
    pub fn new(max_sessions: usize, max_messages: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            clock: AtomicU64::new(0),
            max_sessions: max_sessions.max(1),
            max_messages: max_messages.max(1),
        }
    }

    /// Reuses the given session (creating it if unseen) or starts a fresh one.
    pub fn open(&self, id: Option<Uuid>) -> Uuid {
        let id = id.unwrap_or_else(Uuid::new_v4);
        let tick = self.tick();

        if let Some(mut log) = self.sessions.get_mut(&id) {
            log.last_used = tick;
            return id;
        }

        self.make_room();
        self.sessions
            .entry(id)
            .or_insert_with(|| Conversation { messages: VecDeque::new(), last_used: tick })
            .last_used = tick;
        id
    }

    pub fn append(&self, id: Uuid, message: ChatMessage) {
        self.open(Some(id));
        if let Some(mut log) = self.sessions.get_mut(&id) {
            log.messages.push_back(message);
            while log.messages.len() > self.max_messages {
                log.messages.pop_front();
            }
        }
    }

    pub fn messages(&self, id: &Uuid) -> Option<Vec<ChatMessage>> {
        self.sessions.get(id).map(|log| log.messages.iter().cloned().collect())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    fn make_room(&self) {
        if self.sessions.len() < self.max_sessions {
            return;
        }

        let mut by_age: Vec<(u64, Uuid)> = self
            .sessions
            .iter()
            .map(|entry| (entry.value().last_used, *entry.key()))
            .collect();
        by_age.sort_unstable();

        let evict = (self.max_sessions / 4).max(1).max(by_age.len() + 1 - self.max_sessions);
        for (_, id) in by_age.into_iter().take(evict) {
            self.sessions.remove(&id);
        }
        debug!(evicted = evict, remaining = self.sessions.len(), "session store full, dropped idle sessions");
    }
}
