//! In-memory conversation sessions.
use std::collections::HashMap;
use std::sync::Mutex;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub role: Speaker,
    pub content: String,
}

#[derive(Default)]
struct Sessions {
    next_id: u64,
    history: HashMap<String, Vec<Message>>,
}

/// Thread-safe store of per-session message history.
///
/// Each session keeps only its most recent `max_history` exchanges
/// (`2 * max_history` messages).
pub struct SessionManager {
    max_history: usize,
    inner: Mutex<Sessions>,
}

impl SessionManager {
    pub fn new(max_history: usize) -> Self {
        Self {
            max_history,
            inner: Mutex::new(Sessions::default()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Sessions> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Start a new empty session and return its id (`session_1`, `session_2`, ...).
    pub fn create_session(&self) -> String {
        let mut sessions = self.lock();
        sessions.next_id += 1;
        let id = format!("session_{}", sessions.next_id);
        sessions.history.insert(id.clone(), Vec::new());
        id
    }

    /// Append a message; an unknown `session_id` starts a new session.
    pub fn add_message(&self, session_id: &str, role: Speaker, content: &str) {
        let keep = self.max_history * 2;
        let mut sessions = self.lock();
        let messages = sessions.history.entry(session_id.to_string()).or_default();
        messages.push(Message {
            role,
            content: content.to_string(),
        });
        if messages.len() > keep {
            let excess = messages.len() - keep;
            messages.drain(..excess);
        }
    }

    pub fn add_exchange(&self, session_id: &str, user_message: &str, assistant_message: &str) {
        self.add_message(session_id, Speaker::User, user_message);
        self.add_message(session_id, Speaker::Assistant, assistant_message);
    }

    /// History formatted for the system prompt, or `None` when empty.
    #[must_use]
    pub fn get_conversation_history(&self, session_id: &str) -> Option<String> {
        let sessions = self.lock();
        let messages = sessions.history.get(session_id)?;
        if messages.is_empty() {
            return None;
        }
        Some(
            messages
                .iter()
                .map(|m| match m.role {
                    Speaker::User => format!("User: {}", m.content),
                    Speaker::Assistant => format!("Assistant: {}", m.content),
                })
                .collect::<Vec<_>>()
                .join("\n"),
        )
    }

    /// Forget a session's history. Returns whether it existed.
    pub fn clear_session(&self, session_id: &str) -> bool {
        self.lock().history.remove(session_id).is_some()
    }

    #[must_use]
    pub fn session_count(&self) -> usize {
        self.lock().history.len()
    }
}
