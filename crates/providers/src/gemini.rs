//! Google Gemini provider (`generateContent` REST API).
//!
//! System messages become the `systemInstruction`, tools are declared as
//! `functionDeclarations`, and tool traffic travels as `functionCall` /
//! `functionResponse` parts.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use snello_core::error::ProviderError;
use snello_core::message::{Message, ToolInvocationRequest, generate_call_id};
use snello_core::provider::*;
use tracing::{debug, warn};

use crate::history::replayable_call_ids;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini model provider.
pub struct GeminiProvider {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl GeminiProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .unwrap_or_default();

        Self {
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            client,
        }
    }

    /// Point the provider at a different endpoint (proxies, tests).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Build the `generateContent` request body.
    fn build_body(request: &ProviderRequest) -> serde_json::Value {
        let replayable = replayable_call_ids(&request.messages);
        let mut system_parts: Vec<Part> = Vec::new();
        let mut contents: Vec<Content> = Vec::new();

        for message in &request.messages {
            let (role, parts) = match message {
                Message::System { content } => {
                    system_parts.push(Part::text(content));
                    continue;
                }
                Message::Human { content } => ("user", vec![Part::text(content)]),
                Message::Ai { content, tool_calls } => {
                    let structured = !tool_calls.is_empty()
                        && tool_calls.iter().all(|c| replayable.contains(c.id.as_str()));
                    let mut parts = Vec::new();
                    if !content.is_empty() {
                        parts.push(Part::text(content));
                    }
                    if structured {
                        parts.extend(tool_calls.iter().map(|c| Part {
                            function_call: Some(FunctionCall {
                                name: c.tool_name.clone(),
                                args: c.arguments.clone(),
                            }),
                            ..Part::default()
                        }));
                    }
                    ("model", parts)
                }
                Message::Tool(result) => {
                    if !replayable.contains(result.call_id.as_str()) {
                        continue;
                    }
                    let part = Part {
                        function_response: Some(FunctionResponse {
                            name: result.tool_name.clone(),
                            response: json!({ "content": result.content }),
                        }),
                        ..Part::default()
                    };
                    ("user", vec![part])
                }
            };

            if parts.is_empty() {
                continue;
            }

            // Gemini wants alternating turns; merge consecutive same-role content.
            match contents.last_mut() {
                Some(last) if last.role == role => last.parts.extend(parts),
                _ => contents.push(Content {
                    role: role.into(),
                    parts,
                }),
            }
        }

        let mut body = json!({
            "contents": contents,
            "generationConfig": { "temperature": request.temperature },
        });

        if let Some(max_tokens) = request.max_tokens {
            body["generationConfig"]["maxOutputTokens"] = json!(max_tokens);
        }

        if !system_parts.is_empty() {
            body["systemInstruction"] = json!({ "parts": system_parts });
        }

        if !request.tools.is_empty() {
            let declarations: Vec<serde_json::Value> = request
                .tools
                .iter()
                .map(|t| {
                    let mut decl = json!({ "name": t.name, "description": t.description });
                    if t.has_parameters() {
                        decl["parameters"] = t.parameters.clone();
                    }
                    decl
                })
                .collect();
            body["tools"] = json!([{ "functionDeclarations": declarations }]);
        }

        body
    }

    /// Map a non-success HTTP status and body to a provider error.
    fn classify_error(status: u16, body: String) -> ProviderError {
        if status == 429 || body.contains("RESOURCE_EXHAUSTED") {
            return ProviderError::RateLimited {
                retry_after_secs: 60,
            };
        }
        if status == 401 || status == 403 {
            return ProviderError::AuthenticationFailed(body);
        }
        ProviderError::ApiError {
            status_code: status,
            message: body,
        }
    }

    /// Turn the first candidate into an AI message.
    fn parse_response(response: GenerateResponse) -> Result<Message, ProviderError> {
        let candidate = response
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse("No candidates in response".into()))?;

        let mut text = String::new();
        let mut tool_calls = Vec::new();

        for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
            if let Some(t) = part.text {
                text.push_str(&t);
            }
            if let Some(call) = part.function_call {
                tool_calls.push(ToolInvocationRequest {
                    id: generate_call_id(),
                    tool_name: call.name,
                    arguments: call.args,
                });
            }
        }

        Ok(Message::ai_with_tool_calls(text, tool_calls))
    }
}

#[async_trait]
impl snello_core::Provider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        if self.api_key.is_empty() {
            return Err(ProviderError::NotConfigured(
                "no Gemini API key (set GOOGLE_API_KEY or SNELLO_API_KEY)".into(),
            ));
        }

        let url = format!("{}/models/{}:generateContent", self.base_url, request.model);
        let body = Self::build_body(&request);

        debug!(model = %request.model, messages = request.messages.len(), "Sending Gemini request");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Gemini returned error");
            return Err(Self::classify_error(status, error_body));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("Failed to parse response: {e}")))?;

        let usage = parsed.usage_metadata.as_ref().map(|u| Usage {
            prompt_tokens: u.prompt_token_count,
            completion_tokens: u.candidates_token_count,
            total_tokens: u.total_token_count,
        });
        let model = parsed
            .model_version
            .clone()
            .unwrap_or_else(|| request.model.clone());

        Ok(ProviderResponse {
            message: Self::parse_response(parsed)?,
            usage,
            model,
        })
    }
}

// --- Gemini API types ---

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    role: String,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_response: Option<FunctionResponse>,
}

impl Part {
    fn text(content: &str) -> Self {
        Self {
            text: Some(content.to_string()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    args: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionResponse {
    name: String,
    response: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use snello_core::{Provider, ToolResult};

    fn tools() -> Vec<ToolDefinition> {
        vec![
            ToolDefinition {
                name: "add_item".into(),
                description: "Add an item".into(),
                parameters: json!({
                    "type": "object",
                    "properties": { "text": { "type": "string" } },
                    "required": ["text"]
                }),
            },
            ToolDefinition {
                name: "list_items".into(),
                description: "List items".into(),
                parameters: json!({ "type": "object", "properties": {} }),
            },
        ]
    }

    #[test]
    fn system_prompt_becomes_instruction() {
        let request = ProviderRequest::plain(
            "gemini-1.5-flash-latest",
            vec![Message::system("You are Snello"), Message::human("hi")],
        );
        let body = GeminiProvider::build_body(&request);
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "You are Snello");
        assert_eq!(body["contents"].as_array().unwrap().len(), 1);
        assert_eq!(body["contents"][0]["role"], "user");
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn parameterless_tools_omit_schema() {
        let mut request = ProviderRequest::plain("m", vec![Message::human("hi")]);
        request.tools = tools();
        let body = GeminiProvider::build_body(&request);
        let decls = &body["tools"][0]["functionDeclarations"];
        assert!(decls[0].get("parameters").is_some());
        assert!(decls[1].get("parameters").is_none());
    }

    #[test]
    fn tool_round_trip_uses_function_parts() {
        let call = ToolInvocationRequest {
            id: "call_1".into(),
            tool_name: "list_items".into(),
            arguments: json!({}),
        };
        let request = ProviderRequest::plain(
            "m",
            vec![
                Message::human("what's on my list?"),
                Message::ai_with_tool_calls("", vec![call]),
                Message::tool_result(ToolResult::success(
                    "call_1",
                    "list_items",
                    "The user's to-do list is currently empty.",
                )),
            ],
        );
        let body = GeminiProvider::build_body(&request);
        let contents = body["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(contents[1]["parts"][0]["functionCall"]["name"], "list_items");
        assert_eq!(
            contents[2]["parts"][0]["functionResponse"]["response"]["content"],
            "The user's to-do list is currently empty."
        );
    }

    #[test]
    fn orphaned_calls_are_sent_as_text() {
        let call = ToolInvocationRequest::new("list_items", json!({}));
        let request = ProviderRequest::plain(
            "m",
            vec![
                Message::human("show it"),
                Message::ai_with_tool_calls("", vec![call]),
                Message::ai("Your list is empty."),
                Message::human("thanks"),
            ],
        );
        let body = GeminiProvider::build_body(&request);
        let contents = body["contents"].as_array().unwrap();
        // The empty call-only message disappears, leaving alternating turns.
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[1]["parts"][0]["text"], "Your list is empty.");
        assert!(contents[1]["parts"][0].get("functionCall").is_none());
    }

    #[test]
    fn response_with_function_call_parsed() {
        let data = r#"{
            "candidates": [{"content": {"role": "model", "parts": [
                {"functionCall": {"name": "add_item", "args": {"text": "buy milk"}}}
            ]}}],
            "usageMetadata": {"promptTokenCount": 12, "candidatesTokenCount": 4, "totalTokenCount": 16}
        }"#;
        let parsed: GenerateResponse = serde_json::from_str(data).unwrap();
        let message = GeminiProvider::parse_response(parsed).unwrap();
        let calls = message.tool_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].tool_name, "add_item");
        assert_eq!(calls[0].arguments["text"], "buy milk");
        assert!(calls[0].id.starts_with("call_"));
    }

    #[test]
    fn empty_candidates_is_invalid() {
        let parsed: GenerateResponse = serde_json::from_str(r#"{"candidates": []}"#).unwrap();
        assert!(matches!(
            GeminiProvider::parse_response(parsed),
            Err(ProviderError::InvalidResponse(_))
        ));
    }

    #[test]
    fn quota_errors_classified() {
        let err = GeminiProvider::classify_error(
            400,
            r#"{"error": {"status": "RESOURCE_EXHAUSTED"}}"#.into(),
        );
        assert!(err.is_quota_exhausted());
        assert!(matches!(
            GeminiProvider::classify_error(403, "denied".into()),
            ProviderError::AuthenticationFailed(_)
        ));
        assert!(!GeminiProvider::classify_error(500, "boom".into()).is_quota_exhausted());
    }

    #[tokio::test]
    async fn missing_key_is_not_configured() {
        let provider = GeminiProvider::new("");
        let request = ProviderRequest::plain("m", vec![Message::human("hi")]);
        let err = provider.complete(request).await.unwrap_err();
        assert!(matches!(err, ProviderError::NotConfigured(_)));
    }
}
