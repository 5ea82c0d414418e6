//! OpenAI-compatible provider implementation.
//!
//! Works with: OpenAI, OpenRouter, Ollama, Groq, vLLM, and any endpoint that
//! exposes `/v1/chat/completions` with function calling.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use snello_core::error::ProviderError;
use snello_core::message::{Message, ToolInvocationRequest, generate_call_id};
use snello_core::provider::*;
use tracing::{debug, warn};

use crate::history::replayable_call_ids;

/// An OpenAI-compatible chat completions provider.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a new OpenAI-compatible provider.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .unwrap_or_default();

        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        }
    }

    /// Create an OpenAI provider (convenience constructor).
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self::new("openai", "https://api.openai.com/v1", api_key)
    }

    /// Create an Ollama provider (convenience constructor).
    pub fn ollama(base_url: Option<&str>) -> Self {
        Self::new(
            "ollama",
            base_url.unwrap_or("http://localhost:11434/v1"),
            "ollama", // Ollama doesn't need a real key
        )
    }

    /// Convert our Message types to OpenAI API format.
    fn to_api_messages(messages: &[Message]) -> Vec<ApiMessage> {
        let replayable = replayable_call_ids(messages);
        let mut out = Vec::with_capacity(messages.len());

        for message in messages {
            match message {
                Message::System { content } => out.push(ApiMessage::text("system", content)),
                Message::Human { content } => out.push(ApiMessage::text("user", content)),
                Message::Ai { content, tool_calls } => {
                    let structured = !tool_calls.is_empty()
                        && tool_calls.iter().all(|c| replayable.contains(c.id.as_str()));
                    if structured {
                        out.push(ApiMessage {
                            role: "assistant".into(),
                            content: (!content.is_empty()).then(|| content.clone()),
                            tool_calls: Some(tool_calls.iter().map(ApiToolCall::from).collect()),
                            tool_call_id: None,
                        });
                    } else if !content.is_empty() {
                        out.push(ApiMessage::text("assistant", content));
                    }
                }
                Message::Tool(result) => {
                    if replayable.contains(result.call_id.as_str()) {
                        out.push(ApiMessage {
                            role: "tool".into(),
                            content: Some(result.content.clone()),
                            tool_calls: None,
                            tool_call_id: Some(result.call_id.clone()),
                        });
                    }
                }
            }
        }

        out
    }

    /// Convert tool definitions to OpenAI API format.
    fn to_api_tools(tools: &[ToolDefinition]) -> Vec<ApiToolDefinition> {
        tools
            .iter()
            .map(|t| ApiToolDefinition {
                r#type: "function".into(),
                function: ApiToolFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                },
            })
            .collect()
    }

    /// Turn a parsed response into our AI message.
    fn to_message(choice: ApiChoice) -> Message {
        let tool_calls: Vec<ToolInvocationRequest> = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| ToolInvocationRequest {
                id: if tc.id.is_empty() { generate_call_id() } else { tc.id },
                tool_name: tc.function.name,
                // Unparseable arguments are passed through as a string and
                // rejected by the tool's own validation.
                arguments: serde_json::from_str(&tc.function.arguments)
                    .unwrap_or(serde_json::Value::String(tc.function.arguments)),
            })
            .collect();

        Message::ai_with_tool_calls(choice.message.content.unwrap_or_default(), tool_calls)
    }
}

#[async_trait]
impl snello_core::Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);

        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(&request.messages),
            "temperature": request.temperature,
            "stream": false,
        });

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!(Self::to_api_tools(&request.tools));
        }

        debug!(provider = %self.name, model = %request.model, "Sending completion request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status().as_u16();

        if status == 429 {
            return Err(ProviderError::RateLimited {
                retry_after_secs: 5,
            });
        }

        if status == 401 || status == 403 {
            return Err(ProviderError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Provider returned error");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("Failed to parse response: {e}")))?;

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse("No choices in response".into()))?;

        let usage = api_response.usage.map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(ProviderResponse {
            message: Self::to_message(choice),
            usage,
            model: api_response.model,
        })
    }

    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        Ok(response.status().is_success())
    }
}

// --- OpenAI API types ---

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl ApiMessage {
    fn text(role: &str, content: &str) -> Self {
        Self {
            role: role.into(),
            content: Some(content.to_string()),
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    #[serde(default)]
    id: String,
    #[serde(default = "function_type")]
    r#type: String,
    function: ApiFunction,
}

fn function_type() -> String {
    "function".into()
}

impl From<&ToolInvocationRequest> for ApiToolCall {
    fn from(call: &ToolInvocationRequest) -> Self {
        Self {
            id: call.id.clone(),
            r#type: function_type(),
            function: ApiFunction {
                name: call.tool_name.clone(),
                arguments: call.arguments.to_string(),
            },
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Serialize)]
struct ApiToolDefinition {
    r#type: String,
    function: ApiToolFunction,
}

#[derive(Debug, Serialize)]
struct ApiToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
    #[serde(default)]
    model: String,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ApiResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ApiToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use snello_core::{Provider, ToolResult};

    #[test]
    fn openai_constructor() {
        let provider = OpenAiCompatProvider::openai("sk-test");
        assert_eq!(provider.name(), "openai");
        assert!(provider.base_url.contains("api.openai.com"));
    }

    #[test]
    fn ollama_constructor() {
        let provider = OpenAiCompatProvider::ollama(None);
        assert_eq!(provider.name(), "ollama");
        assert!(provider.base_url.contains("localhost:11434"));
    }

    #[test]
    fn message_conversion() {
        let messages = vec![Message::system("You are Snello"), Message::human("Hello")];
        let api_messages = OpenAiCompatProvider::to_api_messages(&messages);
        assert_eq!(api_messages.len(), 2);
        assert_eq!(api_messages[0].role, "system");
        assert_eq!(api_messages[1].role, "user");
    }

    #[test]
    fn tool_definition_conversion() {
        let tools = vec![ToolDefinition {
            name: "list_items".into(),
            description: "Show the to-do list".into(),
            parameters: serde_json::json!({"type": "object", "properties": {}}),
        }];
        let api_tools = OpenAiCompatProvider::to_api_tools(&tools);
        assert_eq!(api_tools.len(), 1);
        assert_eq!(api_tools[0].function.name, "list_items");
        assert_eq!(api_tools[0].r#type, "function");
    }

    #[test]
    fn answered_tool_calls_are_structured() {
        let call = ToolInvocationRequest {
            id: "call_1".into(),
            tool_name: "add_item".into(),
            arguments: serde_json::json!({"text": "buy milk"}),
        };
        let messages = vec![
            Message::human("add buy milk"),
            Message::ai_with_tool_calls("", vec![call]),
            Message::tool_result(ToolResult::success(
                "call_1",
                "add_item",
                "Successfully added 'buy milk' to the to-do list.",
            )),
        ];
        let api_messages = OpenAiCompatProvider::to_api_messages(&messages);
        assert_eq!(api_messages.len(), 3);
        let calls = api_messages[1].tool_calls.as_ref().unwrap();
        assert_eq!(calls[0].function.name, "add_item");
        assert_eq!(calls[0].function.arguments, r#"{"text":"buy milk"}"#);
        assert_eq!(api_messages[2].role, "tool");
        assert_eq!(api_messages[2].tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn orphaned_tool_calls_become_plain_text() {
        let call = ToolInvocationRequest::new("list_items", serde_json::json!({}));
        let messages = vec![
            Message::human("show my list"),
            Message::ai_with_tool_calls("Let me check.", vec![call]),
            Message::ai("Your list is empty."),
        ];
        let api_messages = OpenAiCompatProvider::to_api_messages(&messages);
        assert_eq!(api_messages.len(), 3);
        assert!(api_messages[1].tool_calls.is_none());
        assert_eq!(api_messages[1].content.as_deref(), Some("Let me check."));
    }

    #[test]
    fn response_tool_calls_parsed() {
        let data = r#"{
            "model": "gpt-4o-mini",
            "choices": [{"message": {"content": null, "tool_calls": [
                {"id": "call_9", "type": "function",
                 "function": {"name": "remove_item", "arguments": "{\"item_id\": 3}"}}
            ]}}]
        }"#;
        let parsed: ApiResponse = serde_json::from_str(data).unwrap();
        let choice = parsed.choices.into_iter().next().unwrap();
        let message = OpenAiCompatProvider::to_message(choice);
        let calls = message.tool_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "call_9");
        assert_eq!(calls[0].arguments["item_id"], 3);
        assert_eq!(message.content(), "");
    }
}
