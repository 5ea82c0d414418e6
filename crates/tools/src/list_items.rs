//! Show the to-do list.

use std::sync::Arc;

use async_trait::async_trait;
use snello_core::error::ToolError;
use snello_core::message::ToolResult;
use snello_core::store::{ItemStore, ToDoItem};
use snello_core::tool::Tool;

pub const EMPTY_LIST: &str = "The user's to-do list is currently empty.";
pub const LIST_HEADER: &str = "Here is your current to-do list:";

pub struct ListItemsTool {
    store: Arc<dyn ItemStore>,
}

impl ListItemsTool {
    pub fn new(store: Arc<dyn ItemStore>) -> Self {
        Self { store }
    }
}

/// Render items as `<id>. <text>` lines under the fixed header.
pub fn render_list(items: &[ToDoItem]) -> String {
    if items.is_empty() {
        return EMPTY_LIST.to_string();
    }
    let lines: Vec<String> = items
        .iter()
        .map(|item| format!("{}. {}", item.id, item.text))
        .collect();
    format!("{LIST_HEADER}\n{}", lines.join("\n"))
}

#[async_trait]
impl Tool for ListItemsTool {
    fn name(&self) -> &str {
        "list_items"
    }

    fn description(&self) -> &str {
        "Use this tool to list all the items in the user's to-do list."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn execute(&self, _arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let items = self
            .store
            .list_items()
            .await
            .map_err(|e| ToolError::from_store(self.name(), e))?;

        Ok(ToolResult::success(String::new(), self.name(), render_list(&items)))
    }
}
