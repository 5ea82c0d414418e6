//! Persistence boundaries: the to-do item store and the chat session store.
//!
//! Implementations: SQLite and in-memory item stores, a file-per-session
//! JSON session store (see `snello-store`).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use crate::error::{ProviderError, StoreError};
use crate::message::Message;

/// Title used when a session has no human message to summarize.
pub const DEFAULT_SESSION_TITLE: &str = "New Chat";

/// Maximum characters kept when a title falls back to the raw first message.
const FALLBACK_TITLE_CHARS: usize = 40;

/// A single to-do list entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToDoItem {
    /// Store-assigned, monotonic, never reused
    pub id: i64,

    /// What needs doing
    pub text: String,
}

/// The to-do item store consumed by the tool set.
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// The backend name (e.g., "sqlite", "in_memory").
    fn name(&self) -> &str;

    /// Insert a new item and return it with its assigned ID.
    async fn add_item(&self, text: &str) -> Result<ToDoItem, StoreError>;

    /// Delete an item by ID. Returns whether a row was actually removed.
    async fn remove_item(&self, id: i64) -> Result<bool, StoreError>;

    /// All items in insertion order.
    async fn list_items(&self) -> Result<Vec<ToDoItem>, StoreError>;

    /// Delete every item. IDs handed out before are still never reused.
    async fn clear_all(&self) -> Result<(), StoreError>;
}

/// Listing metadata for a persisted chat session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: String,
    pub title: String,
    pub creation_time: DateTime<Utc>,
}

/// A persisted, independently addressable transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    /// Timestamp-derived identifier, immutable after creation
    pub id: String,

    /// Derived once from the first human message, then frozen
    pub title: String,

    /// Immutable after creation
    pub creation_time: DateTime<Utc>,

    /// The ordered transcript
    pub messages: Vec<Message>,
}

impl ChatSession {
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            creation_time: self.creation_time,
        }
    }
}

/// Produces a short session title from the first human message.
#[async_trait]
pub trait TitleGenerator: Send + Sync {
    async fn generate_title(&self, first_message: &str) -> Result<String, ProviderError>;
}

/// The session store consumed by the front ends.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// All sessions, newest first. Unreadable sessions are skipped.
    async fn list_sessions(&self) -> Result<Vec<SessionSummary>, StoreError>;

    /// The transcript of one session.
    async fn load_session(&self, id: &str) -> Result<Vec<Message>, StoreError>;

    /// Persist a transcript. `None` creates a new session; returns the session ID.
    async fn save_session(
        &self,
        id: Option<&str>,
        messages: &[Message],
        titles: &dyn TitleGenerator,
    ) -> Result<String, StoreError>;

    /// Remove a session. Removing an unknown ID is not an error.
    async fn delete_session(&self, id: &str) -> Result<(), StoreError>;

    /// Import a flat JSON transcript file as a new session.
    async fn import_transcript(
        &self,
        path: &Path,
        titles: &dyn TitleGenerator,
    ) -> Result<String, StoreError>;
}

/// Title derived without the model: the first message, shortened.
pub fn fallback_title(first_message: Option<&str>) -> String {
    let Some(text) = first_message.map(str::trim).filter(|t| !t.is_empty()) else {
        return DEFAULT_SESSION_TITLE.to_string();
    };
    let mut title: String = text.chars().take(FALLBACK_TITLE_CHARS).collect();
    if text.chars().count() > FALLBACK_TITLE_CHARS {
        title.push('…');
    }
    title
}
