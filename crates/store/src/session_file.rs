//! File-per-session chat history.
//!
//! Each session lives in `<dir>/<id>.json` as a pretty-printed
//! `ChatSession`. Writes go through a temp file and an atomic rename, so a
//! crash mid-write never leaves a half-written session behind.
//!
//! Storage location: `~/.snello/chat_sessions/` by default.

use async_trait::async_trait;
use chrono::Utc;
use snello_core::error::StoreError;
use snello_core::message::{Message, first_human};
use snello_core::store::{
    ChatSession, SessionStore, SessionSummary, TitleGenerator, fallback_title,
};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const SESSION_EXT: &str = "json";

/// Session store backed by a directory of JSON files.
pub struct FileSessionStore {
    dir: PathBuf,
    keep_tool_results: bool,
}

impl FileSessionStore {
    /// Create a store rooted at `dir`. The directory is created on first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            keep_tool_results: false,
        }
    }

    /// Keep tool-result records in saved transcripts instead of dropping them.
    pub fn with_tool_results(mut self, keep: bool) -> Self {
        self.keep_tool_results = keep;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Resolve a session id to its file, rejecting anything that could
    /// escape the sessions directory.
    fn session_path(&self, id: &str) -> Result<PathBuf, StoreError> {
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(StoreError::SessionNotFound(id.to_string()));
        }
        Ok(self.dir.join(format!("{id}.{SESSION_EXT}")))
    }

    /// A fresh timestamp id, suffixed if another session already claimed it.
    fn new_session_id(&self) -> String {
        let base = Utc::now().format("%Y%m%d_%H%M%S_%6f").to_string();
        let mut id = base.clone();
        let mut suffix = 1;
        while self.dir.join(format!("{id}.{SESSION_EXT}")).exists() {
            id = format!("{base}_{suffix}");
            suffix += 1;
        }
        id
    }

    async fn read_session(path: &Path) -> Result<ChatSession, StoreError> {
        let content = tokio::fs::read_to_string(path).await?;
        serde_json::from_str(&content).map_err(|e| StoreError::Corrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    async fn write_session(&self, session: &ChatSession) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            StoreError::Unavailable(format!(
                "Failed to create sessions directory {}: {e}",
                self.dir.display()
            ))
        })?;

        let path = self.session_path(&session.id)?;
        let tmp = self.dir.join(format!(".{}.{SESSION_EXT}.tmp", session.id));
        let content = serde_json::to_string_pretty(session)
            .map_err(|e| StoreError::QueryFailed(format!("Failed to serialize session: {e}")))?;

        tokio::fs::write(&tmp, content).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            if let Err(cleanup) = tokio::fs::remove_file(&tmp).await {
                warn!(path = %tmp.display(), error = %cleanup, "Failed to remove temp session file");
            }
            return Err(e.into());
        }
        Ok(())
    }

    /// Messages as they should be persisted.
    fn persisted(&self, messages: &[Message]) -> Vec<Message> {
        messages
            .iter()
            .filter(|m| self.keep_tool_results || !m.is_tool_result())
            .cloned()
            .collect()
    }

    async fn make_title(messages: &[Message], titles: &dyn TitleGenerator) -> String {
        let Some(first) = first_human(messages) else {
            return fallback_title(None);
        };
        match titles.generate_title(first).await {
            Ok(title) => title,
            Err(e) => {
                warn!(error = %e, "Title generation failed, using first message");
                fallback_title(Some(first))
            }
        }
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn list_sessions(&self) -> Result<Vec<SessionSummary>, StoreError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut sessions = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(SESSION_EXT) {
                continue;
            }
            match Self::read_session(&path).await {
                Ok(session) => sessions.push(session.summary()),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable session"),
            }
        }

        sessions.sort_by(|a, b| {
            b.creation_time
                .cmp(&a.creation_time)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(sessions)
    }

    async fn load_session(&self, id: &str) -> Result<Vec<Message>, StoreError> {
        let path = self.session_path(id)?;
        if !path.exists() {
            return Err(StoreError::SessionNotFound(id.to_string()));
        }
        let session = Self::read_session(&path).await?;
        debug!(id, messages = session.messages.len(), "Loaded session");
        Ok(session.messages)
    }

    async fn save_session(
        &self,
        id: Option<&str>,
        messages: &[Message],
        titles: &dyn TitleGenerator,
    ) -> Result<String, StoreError> {
        // An unreadable existing file is an error rather than a fresh session,
        // so its id, title and creation time are never silently replaced.
        let existing = match id {
            Some(id) => {
                let path = self.session_path(id)?;
                if path.exists() {
                    Some(Self::read_session(&path).await?)
                } else {
                    None
                }
            }
            None => None,
        };

        let session = match existing {
            Some(prev) => ChatSession {
                messages: self.persisted(messages),
                ..prev
            },
            None => ChatSession {
                id: id.map(String::from).unwrap_or_else(|| self.new_session_id()),
                title: Self::make_title(messages, titles).await,
                creation_time: Utc::now(),
                messages: self.persisted(messages),
            },
        };

        self.write_session(&session).await?;
        debug!(id = %session.id, title = %session.title, "Saved session");
        Ok(session.id)
    }

    async fn delete_session(&self, id: &str) -> Result<(), StoreError> {
        let path = self.session_path(id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                info!(id, "Deleted session");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn import_transcript(
        &self,
        path: &Path,
        titles: &dyn TitleGenerator,
    ) -> Result<String, StoreError> {
        let content = tokio::fs::read_to_string(path).await?;
        let messages: Vec<Message> =
            serde_json::from_str(&content).map_err(|e| StoreError::Corrupt {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        let id = self.save_session(None, &messages, titles).await?;
        info!(id = %id, from = %path.display(), messages = messages.len(), "Imported transcript");
        Ok(id)
    }
}
