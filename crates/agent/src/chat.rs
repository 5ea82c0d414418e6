//! The chat service shared by the CLI and the web gateway.
//!
//! Holds everything one conversation turn needs (agent loop, item store,
//! session store, title generator) and serializes turns so only one runs at
//! a time.

use std::sync::Arc;

use snello_config::AppConfig;
use snello_core::error::{Error, ProviderError};
use snello_core::message::{Message, Transcript};
use snello_core::store::{ItemStore, SessionStore, SessionSummary, TitleGenerator, ToDoItem};
use snello_providers::{ProviderTitleGenerator, build_from_config};
use snello_store::{FileSessionStore, SqliteItemStore};
use snello_tools::todo_registry;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::loop_runner::AgentLoop;

/// Shown when the provider reports an exhausted quota or rate limit.
pub const QUOTA_REPLY: &str =
    "I've been working hard and have hit my daily usage limit! Please try again tomorrow. 🙏";

/// Shown for any other provider failure.
pub const UNEXPECTED_REPLY: &str = "An unexpected error occurred. Please try again.";

/// The conversation a front end is currently showing.
#[derive(Debug, Clone)]
pub struct ActiveChat {
    /// `None` until the first successful save
    pub session_id: Option<String>,
    pub messages: Transcript,
}

/// What a front end gets back from one turn.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnReply {
    pub reply: String,
    pub session_id: String,

    /// The reply is a fixed apology rather than a model answer
    pub degraded: bool,
}

pub struct ChatService {
    agent: Arc<AgentLoop>,
    sessions: Arc<dyn SessionStore>,
    items: Arc<dyn ItemStore>,
    titles: Arc<dyn TitleGenerator>,
    system_prompt: String,
    new_chat_prompt: String,
    turn_lock: Mutex<()>,
}

impl ChatService {
    pub fn new(
        agent: Arc<AgentLoop>,
        sessions: Arc<dyn SessionStore>,
        items: Arc<dyn ItemStore>,
        titles: Arc<dyn TitleGenerator>,
    ) -> Self {
        let prompts = snello_config::AgentConfig::default();
        Self {
            agent,
            sessions,
            items,
            titles,
            system_prompt: prompts.system_prompt,
            new_chat_prompt: prompts.new_chat_prompt,
            turn_lock: Mutex::new(()),
        }
    }

    /// Override the persona prompts.
    pub fn with_prompts(
        mut self,
        system_prompt: impl Into<String>,
        new_chat_prompt: impl Into<String>,
    ) -> Self {
        self.system_prompt = system_prompt.into();
        self.new_chat_prompt = new_chat_prompt.into();
        self
    }

    /// Wire up the production stack: configured provider, SQLite items,
    /// file sessions, and the to-do tool set.
    pub async fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let router = build_from_config(config);
        let provider = router.default().ok_or_else(|| Error::Config {
            message: format!("provider '{}' is not available", config.default_provider),
        })?;

        let items: Arc<dyn ItemStore> = Arc::new(SqliteItemStore::new(config.database_path()).await?);
        let sessions: Arc<dyn SessionStore> = Arc::new(
            FileSessionStore::new(config.sessions_dir())
                .with_tool_results(config.storage.keep_tool_results),
        );
        let titles: Arc<dyn TitleGenerator> = Arc::new(ProviderTitleGenerator::new(
            provider.clone(),
            &config.default_model,
        ));

        let tools = Arc::new(todo_registry(items.clone()));
        let agent = Arc::new(AgentLoop::from_config(provider, tools, config));

        info!(
            provider = %config.default_provider,
            model = %config.default_model,
            "Chat service ready"
        );

        Ok(Self::new(agent, sessions, items, titles)
            .with_prompts(&config.agent.system_prompt, &config.agent.new_chat_prompt))
    }

    pub fn agent(&self) -> &AgentLoop {
        &self.agent
    }

    /// The chat shown when the application starts.
    pub fn start(&self) -> ActiveChat {
        ActiveChat {
            session_id: None,
            messages: vec![Message::system(&self.system_prompt)],
        }
    }

    /// A fresh chat after the user asks for a new one.
    pub fn new_chat(&self) -> ActiveChat {
        ActiveChat {
            session_id: None,
            messages: vec![Message::system(&self.new_chat_prompt)],
        }
    }

    /// Reopen a saved session.
    pub async fn resume(&self, id: &str) -> Result<ActiveChat, Error> {
        let mut messages = self.sessions.load_session(id).await?;
        if !messages.first().is_some_and(Message::is_system) {
            messages.insert(0, Message::system(&self.system_prompt));
        }
        Ok(ActiveChat {
            session_id: Some(id.to_string()),
            messages,
        })
    }

    /// Run one user turn and persist the result.
    ///
    /// A chat that already has a session is reloaded from the store once the
    /// turn lock is held, so a stale copy never overwrites a newer turn.
    ///
    /// Provider failures still produce a saved reply (a fixed apology,
    /// `degraded = true`). Infrastructure failures restore the chat to its
    /// pre-turn state and return the error.
    pub async fn send(&self, chat: &mut ActiveChat, text: &str) -> Result<TurnReply, Error> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::Internal("message is empty".into()));
        }

        let _turn = self.turn_lock.lock().await;
        if let Some(id) = chat.session_id.clone() {
            *chat = self.resume(&id).await?;
        }
        let checkpoint = chat.messages.len();
        chat.messages.push(Message::human(text));

        let (reply, degraded) = match self.agent.process(&mut chat.messages).await {
            Ok(turn) => (turn.reply, false),
            Err(Error::Provider(e)) => {
                let reply = Self::apology(&e);
                error!(error = %e, "Model call failed");
                chat.messages.push(Message::ai(reply));
                (reply.to_string(), true)
            }
            Err(e) => {
                error!(error = %e, "Turn aborted");
                chat.messages.truncate(checkpoint);
                return Err(e);
            }
        };

        let saved = self
            .sessions
            .save_session(chat.session_id.as_deref(), &chat.messages, self.titles.as_ref())
            .await;
        let session_id = match saved {
            Ok(id) => id,
            Err(e) => {
                error!(error = %e, "Failed to save session");
                chat.messages.truncate(checkpoint);
                return Err(e.into());
            }
        };
        chat.session_id = Some(session_id.clone());

        Ok(TurnReply {
            reply,
            session_id,
            degraded,
        })
    }

    /// One turn addressed by session id, for front ends that keep no
    /// transcript between requests. `None` starts a chat, using the
    /// new-chat greeting when `new_chat` is set.
    pub async fn send_to(
        &self,
        session_id: Option<&str>,
        new_chat: bool,
        text: &str,
    ) -> Result<TurnReply, Error> {
        let mut chat = match session_id {
            Some(id) => ActiveChat {
                session_id: Some(id.to_string()),
                messages: Vec::new(),
            },
            None if new_chat => self.new_chat(),
            None => self.start(),
        };
        self.send(&mut chat, text).await
    }

    fn apology(e: &ProviderError) -> &'static str {
        if e.is_quota_exhausted() {
            QUOTA_REPLY
        } else {
            UNEXPECTED_REPLY
        }
    }

    pub async fn list_sessions(&self) -> Result<Vec<SessionSummary>, Error> {
        Ok(self.sessions.list_sessions().await?)
    }

    pub async fn delete_session(&self, id: &str) -> Result<(), Error> {
        self.sessions.delete_session(id).await?;
        Ok(())
    }

    /// Import a flat JSON transcript as a new session.
    pub async fn import_transcript(&self, path: &std::path::Path) -> Result<String, Error> {
        Ok(self
            .sessions
            .import_transcript(path, self.titles.as_ref())
            .await?)
    }

    pub async fn list_items(&self) -> Result<Vec<ToDoItem>, Error> {
        Ok(self.items.list_items().await?)
    }

    pub async fn clear_items(&self) -> Result<(), Error> {
        let _turn = self.turn_lock.lock().await;
        self.items.clear_all().await?;
        warn!("To-do list cleared");
        Ok(())
    }
}

/// Messages worth showing to a person: human and AI text, no system prompt,
/// no tool plumbing.
pub fn display_messages(messages: &[Message]) -> impl Iterator<Item = &Message> {
    messages.iter().filter(|m| match m {
        Message::Human { .. } => true,
        Message::Ai { content, .. } => !content.trim().is_empty(),
        _ => false,
    })
}
