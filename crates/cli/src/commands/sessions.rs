//! `snello sessions` — Saved chat management.

use snello_agent::{ChatService, display_messages};
use snello_core::{Message, SessionStore};
use snello_store::FileSessionStore;
use std::path::Path;

use super::load_config;

fn open_store() -> Result<FileSessionStore, Box<dyn std::error::Error>> {
    let config = load_config()?;
    Ok(FileSessionStore::new(config.sessions_dir()).with_tool_results(config.storage.keep_tool_results))
}

pub async fn list() -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store()?;
    let sessions = store.list_sessions().await?;

    if sessions.is_empty() {
        println!("No saved chats yet. Start one with `snello chat`.");
        return Ok(());
    }

    println!("Saved chats ({}):", sessions.len());
    for s in sessions {
        println!(
            "  {}  {}  {}",
            s.id,
            s.creation_time.format("%Y-%m-%d %H:%M"),
            s.title
        );
    }
    Ok(())
}

pub async fn show(id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store()?;
    let messages = store.load_session(id).await?;

    for message in display_messages(&messages) {
        let who = match message {
            Message::Human { .. } => "You",
            _ => "Snello",
        };
        println!("{who}: {}", message.content());
        println!();
    }
    Ok(())
}

pub async fn delete(id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store()?;
    store.delete_session(id).await?;
    println!("Deleted chat {id}");
    Ok(())
}

/// Importing asks the model for a title, so this builds the full service.
pub async fn import(file: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let service = ChatService::from_config(&config).await?;
    let id = service.import_transcript(file).await?;
    println!("Imported {} as chat {id}", file.display());
    Ok(())
}
