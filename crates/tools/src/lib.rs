//! To-do list tools for Snello.
//!
//! Three tools give the agent its only way to touch the user's list:
//! add an item, show the list, and remove an item by id. Each tool holds
//! the shared `ItemStore` and turns store outcomes into the fixed strings
//! the model reads back.

pub mod add_item;
pub mod list_items;
pub mod remove_item;

use std::sync::Arc;

use snello_core::error::ToolError;
use snello_core::store::ItemStore;
use snello_core::tool::ToolRegistry;

pub use add_item::AddItemTool;
pub use list_items::ListItemsTool;
pub use remove_item::RemoveItemTool;

/// Create the tool registry the agent runs with.
///
/// Registration order (add, list, remove) is the order the model sees.
pub fn todo_registry(store: Arc<dyn ItemStore>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(AddItemTool::new(store.clone())));
    registry.register(Box::new(ListItemsTool::new(store.clone())));
    registry.register(Box::new(RemoveItemTool::new(store)));
    registry
}

/// Decode tool arguments into their typed form.
pub(crate) fn parse_args<T: serde::de::DeserializeOwned>(
    arguments: serde_json::Value,
) -> Result<T, ToolError> {
    // Models sometimes send `null` for argument-less calls.
    let arguments = if arguments.is_null() {
        serde_json::json!({})
    } else {
        arguments
    };
    serde_json::from_value(arguments).map_err(|e| ToolError::InvalidArguments(e.to_string()))
}
