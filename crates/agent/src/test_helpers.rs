//! Shared test helpers for agent tests.

use snello_core::error::ProviderError;
use snello_core::message::{Message, ToolInvocationRequest};
use snello_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use std::sync::Mutex;

/// A mock provider that returns a sequence of scripted outcomes.
///
/// Each call to `complete` returns the next outcome in the queue and records
/// the request it was given. Panics if more calls are made than scripted.
pub struct SequentialMockProvider {
    outcomes: Mutex<Vec<Result<ProviderResponse, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl SequentialMockProvider {
    pub fn new(outcomes: Vec<Result<ProviderResponse, ProviderError>>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Create a provider that returns a single text response (no tool calls).
    pub fn single_text(text: &str) -> Self {
        Self::new(vec![Ok(make_text_response(text))])
    }

    /// Create a provider that first returns tool calls, then a final answer.
    pub fn tool_then_answer(tool_calls: Vec<ToolInvocationRequest>, answer: &str) -> Self {
        Self::new(vec![
            Ok(make_tool_call_response(tool_calls)),
            Ok(make_text_response(answer)),
        ])
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// The transcript sent with the `n`th call.
    pub fn transcript_at(&self, n: usize) -> Vec<Message> {
        self.requests.lock().unwrap()[n].messages.clone()
    }

    pub fn last_request(&self) -> ProviderRequest {
        self.requests.lock().unwrap().last().cloned().unwrap()
    }
}

#[async_trait::async_trait]
impl Provider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut requests = self.requests.lock().unwrap();
        let outcomes = self.outcomes.lock().unwrap();
        let count = requests.len();

        if count >= outcomes.len() {
            panic!(
                "SequentialMockProvider: no more responses (call #{count}, have {})",
                outcomes.len()
            );
        }

        requests.push(request);
        outcomes[count].clone()
    }
}

/// Create a simple text response (no tool calls).
pub fn make_text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::ai(text),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}

/// Create a response carrying tool calls.
pub fn make_tool_call_response(tool_calls: Vec<ToolInvocationRequest>) -> ProviderResponse {
    ProviderResponse {
        message: Message::ai_with_tool_calls("", tool_calls),
        usage: None,
        model: "mock-model".into(),
    }
}

/// A tool invocation request with a fixed id.
pub fn call(id: &str, tool: &str, arguments: serde_json::Value) -> ToolInvocationRequest {
    ToolInvocationRequest {
        id: id.into(),
        tool_name: tool.into(),
        arguments,
    }
}
