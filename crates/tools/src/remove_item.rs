//! Remove a to-do item by id.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use snello_core::error::ToolError;
use snello_core::message::ToolResult;
use snello_core::store::ItemStore;
use snello_core::tool::Tool;
use tracing::debug;

use crate::parse_args;

#[derive(Debug, Deserialize)]
struct RemoveItemArgs {
    #[serde(alias = "id", deserialize_with = "lenient_id")]
    item_id: i64,
}

/// Models send ids as integers, whole floats (`3.0`), or numeric strings.
fn lenient_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Int(i64),
        Float(f64),
        Text(String),
    }

    match RawId::deserialize(deserializer)? {
        RawId::Int(id) => Ok(id),
        RawId::Float(f) if f.fract() == 0.0 => Ok(f as i64),
        RawId::Float(f) => Err(serde::de::Error::custom(format!("'{f}' is not a whole number"))),
        RawId::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("'{s}' is not a numeric id"))),
    }
}

pub struct RemoveItemTool {
    store: Arc<dyn ItemStore>,
}

impl RemoveItemTool {
    pub fn new(store: Arc<dyn ItemStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for RemoveItemTool {
    fn name(&self) -> &str {
        "remove_item"
    }

    fn description(&self) -> &str {
        "Use this tool to remove a specific item from the to-do list using its ID."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "item_id": {
                    "type": "integer",
                    "description": "The numerical ID of the to-do item that should be removed."
                }
            },
            "required": ["item_id"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let args: RemoveItemArgs = parse_args(arguments)?;
        let id = args.item_id;
        if id <= 0 {
            return Err(ToolError::InvalidArguments(format!(
                "'item_id' must be a positive integer, got {id}"
            )));
        }

        let removed = self
            .store
            .remove_item(id)
            .await
            .map_err(|e| ToolError::from_store(self.name(), e))?;
        debug!(id, removed, "remove_item");

        if removed {
            Ok(ToolResult::success(
                String::new(),
                self.name(),
                format!("Successfully removed to-do item with ID {id}."),
            ))
        } else {
            Ok(ToolResult::failure(
                String::new(),
                self.name(),
                format!(
                    "Error: No to-do item found with ID {id}. Please check the ID and try again."
                ),
            ))
        }
    }
}
