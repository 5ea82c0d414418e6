//! Add a to-do item.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use snello_core::error::ToolError;
use snello_core::message::ToolResult;
use snello_core::store::ItemStore;
use snello_core::tool::Tool;
use tracing::debug;

use crate::parse_args;

#[derive(Debug, Deserialize)]
struct AddItemArgs {
    #[serde(alias = "item")]
    text: String,
}

pub struct AddItemTool {
    store: Arc<dyn ItemStore>,
}

impl AddItemTool {
    pub fn new(store: Arc<dyn ItemStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for AddItemTool {
    fn name(&self) -> &str {
        "add_item"
    }

    fn description(&self) -> &str {
        "Use this tool to add a new item to the user's to-do list."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "text": {
                    "type": "string",
                    "description": "The content of the to-do item to add."
                }
            },
            "required": ["text"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let args: AddItemArgs = parse_args(arguments)?;
        let text = args.text.trim();
        if text.is_empty() {
            return Err(ToolError::InvalidArguments("'text' must not be empty".into()));
        }

        let item = self
            .store
            .add_item(text)
            .await
            .map_err(|e| ToolError::from_store(self.name(), e))?;
        debug!(id = item.id, "add_item");

        Ok(ToolResult::success(
            String::new(),
            self.name(),
            format!("Successfully added '{}' to the to-do list.", item.text),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use snello_store::InMemoryItemStore;

    #[tokio::test]
    async fn adds_trimmed_text() {
        let store = Arc::new(InMemoryItemStore::new());
        let tool = AddItemTool::new(store.clone());

        let result = tool
            .execute(serde_json::json!({"text": "  buy milk "}))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.content, "Successfully added 'buy milk' to the to-do list.");

        let items = store.list_items().await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].text, "buy milk");
    }

    #[tokio::test]
    async fn accepts_legacy_item_field() {
        let store = Arc::new(InMemoryItemStore::new());
        let tool = AddItemTool::new(store.clone());
        tool.execute(serde_json::json!({"item": "call dentist"}))
            .await
            .unwrap();
        assert_eq!(store.list_items().await.unwrap()[0].text, "call dentist");
    }

    #[tokio::test]
    async fn rejects_missing_or_blank_text() {
        let tool = AddItemTool::new(Arc::new(InMemoryItemStore::new()));
        assert!(matches!(
            tool.execute(serde_json::json!({})).await,
            Err(ToolError::InvalidArguments(_))
        ));
        assert!(matches!(
            tool.execute(serde_json::json!({"text": "   "})).await,
            Err(ToolError::InvalidArguments(_))
        ));
    }
}
