//! In-memory item store for tests and throwaway sessions.

use async_trait::async_trait;
use snello_core::error::StoreError;
use snello_core::store::{ItemStore, ToDoItem};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct Inner {
    items: Vec<ToDoItem>,
    last_id: i64,
}

/// An item store that keeps the list in a Vec.
/// Ids keep counting up after removals and clears, like the SQLite store.
pub struct InMemoryItemStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryItemStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner::default())),
        }
    }
}

impl Default for InMemoryItemStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ItemStore for InMemoryItemStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn add_item(&self, text: &str) -> Result<ToDoItem, StoreError> {
        let mut inner = self.inner.write().await;
        inner.last_id += 1;
        let item = ToDoItem {
            id: inner.last_id,
            text: text.to_string(),
        };
        inner.items.push(item.clone());
        Ok(item)
    }

    async fn remove_item(&self, id: i64) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        let before = inner.items.len();
        inner.items.retain(|item| item.id != id);
        Ok(inner.items.len() < before)
    }

    async fn list_items(&self) -> Result<Vec<ToDoItem>, StoreError> {
        Ok(self.inner.read().await.items.clone())
    }

    async fn clear_all(&self) -> Result<(), StoreError> {
        self.inner.write().await.items.clear();
        Ok(())
    }
}
