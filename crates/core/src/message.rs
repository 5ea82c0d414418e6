//! Message and transcript domain types.
//!
//! These are the value objects that flow through the entire system:
//! the user types a message → the chat service appends it → the agent loop
//! exchanges it with the model → the session store persists the transcript.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An ordered, append-only conversation.
pub type Transcript = Vec<Message>;

/// A single transcript entry.
///
/// Serialized with a `type` tag (`system`, `human`, `ai`, `tool`) so the
/// on-disk session format stays readable and matches the legacy flat history
/// files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Message {
    /// System instructions (persona, rules)
    System { content: String },

    /// The end user
    Human { content: String },

    /// The model, optionally requesting tool invocations
    Ai {
        content: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolInvocationRequest>,
    },

    /// Outcome of one tool invocation, consumed by the next model call
    Tool(ToolResult),
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self::System {
            content: content.into(),
        }
    }

    pub fn human(content: impl Into<String>) -> Self {
        Self::Human {
            content: content.into(),
        }
    }

    /// A plain AI reply with no tool requests.
    pub fn ai(content: impl Into<String>) -> Self {
        Self::Ai {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    /// An AI message carrying tool invocation requests.
    pub fn ai_with_tool_calls(
        content: impl Into<String>,
        tool_calls: Vec<ToolInvocationRequest>,
    ) -> Self {
        Self::Ai {
            content: content.into(),
            tool_calls,
        }
    }

    pub fn tool_result(result: ToolResult) -> Self {
        Self::Tool(result)
    }

    /// The text body of this message.
    pub fn content(&self) -> &str {
        match self {
            Self::System { content } | Self::Human { content } | Self::Ai { content, .. } => {
                content
            }
            Self::Tool(result) => &result.content,
        }
    }

    /// Tool invocation requests carried by an AI message (empty otherwise).
    pub fn tool_calls(&self) -> &[ToolInvocationRequest] {
        match self {
            Self::Ai { tool_calls, .. } => tool_calls,
            _ => &[],
        }
    }

    /// Short role label used for logging and display.
    pub fn role(&self) -> &'static str {
        match self {
            Self::System { .. } => "system",
            Self::Human { .. } => "human",
            Self::Ai { .. } => "ai",
            Self::Tool(_) => "tool",
        }
    }

    pub fn is_system(&self) -> bool {
        matches!(self, Self::System { .. })
    }

    pub fn is_tool_result(&self) -> bool {
        matches!(self, Self::Tool(_))
    }
}

/// The content of the first human message in a transcript, if any.
pub fn first_human(messages: &[Message]) -> Option<&str> {
    messages.iter().find_map(|m| match m {
        Message::Human { content } => Some(content.as_str()),
        _ => None,
    })
}

/// A structured request from the model to run one tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocationRequest {
    /// Call ID pairing this request with its result
    #[serde(default = "generate_call_id")]
    pub id: String,

    /// Name of the tool to invoke
    #[serde(alias = "name")]
    pub tool_name: String,

    /// Arguments as a JSON object
    #[serde(default = "empty_arguments", alias = "args")]
    pub arguments: serde_json::Value,
}

impl ToolInvocationRequest {
    pub fn new(tool_name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            id: generate_call_id(),
            tool_name: tool_name.into(),
            arguments,
        }
    }
}

/// Generate a call ID for providers that do not issue their own.
pub fn generate_call_id() -> String {
    format!("call_{}", Uuid::new_v4().simple())
}

fn empty_arguments() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

/// The textual outcome of executing one tool invocation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// The request this result answers
    pub call_id: String,

    /// Name of the tool that produced it
    pub tool_name: String,

    /// Human-readable outcome shown to the model
    pub content: String,

    /// Whether the tool did what was asked
    #[serde(default = "default_success")]
    pub success: bool,
}

fn default_success() -> bool {
    true
}

impl ToolResult {
    pub fn success(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            content: content.into(),
            success: true,
        }
    }

    pub fn failure(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            content: content.into(),
            success: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_human_message() {
        let msg = Message::human("Add buy milk");
        assert_eq!(msg.role(), "human");
        assert_eq!(msg.content(), "Add buy milk");
        assert!(msg.tool_calls().is_empty());
    }

    #[test]
    fn serialized_with_type_tag() {
        let json = serde_json::to_value(Message::system("You are Snello")).unwrap();
        assert_eq!(json["type"], "system");
        assert_eq!(json["content"], "You are Snello");

        let plain_ai = serde_json::to_value(Message::ai("Done!")).unwrap();
        assert_eq!(plain_ai["type"], "ai");
        assert!(plain_ai.get("tool_calls").is_none());
    }

    #[test]
    fn ai_tool_calls_survive_serialization() {
        let msg = Message::ai_with_tool_calls(
            "",
            vec![ToolInvocationRequest::new(
                "remove_item",
                serde_json::json!({"item_id": 2}),
            )],
        );
        let json = serde_json::to_string(&msg).unwrap();
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
        assert_eq!(back.tool_calls()[0].tool_name, "remove_item");
    }

    #[test]
    fn legacy_tool_call_shape_is_accepted() {
        // Flat history files store tool calls as {name, args, id}
        let json = r#"{"type":"ai","content":"","tool_calls":[{"name":"list_items","args":{},"id":"abc"}]}"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert_eq!(msg.tool_calls()[0].tool_name, "list_items");
        assert_eq!(msg.tool_calls()[0].id, "abc");
    }

    #[test]
    fn tool_record_roundtrip() {
        let msg = Message::tool_result(ToolResult::failure("call_1", "remove_item", "Error: nope"));
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "tool");
        assert_eq!(json["call_id"], "call_1");
        let back: Message = serde_json::from_value(json).unwrap();
        assert!(back.is_tool_result());
    }

    #[test]
    fn first_human_skips_system() {
        let transcript = vec![
            Message::system("persona"),
            Message::human("first"),
            Message::human("second"),
        ];
        assert_eq!(first_human(&transcript), Some("first"));
        assert_eq!(first_human(&transcript[..1]), None);
    }

    #[test]
    fn generated_call_ids_are_unique() {
        assert_ne!(generate_call_id(), generate_call_id());
    }
}
