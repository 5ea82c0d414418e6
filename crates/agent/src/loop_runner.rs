//! The agent reasoning loop implementation.

use std::sync::Arc;

use snello_config::AppConfig;
use snello_core::error::Error;
use snello_core::message::{Message, ToolInvocationRequest, ToolResult, Transcript};
use snello_core::provider::{Provider, ProviderRequest};
use snello_core::tool::ToolRegistry;
use tracing::{debug, info, warn};

/// Reply used when the model keeps asking for tools past the round cap.
pub const MAX_ROUNDS_REPLY: &str =
    "I've reached the maximum number of tool call iterations. Please provide further guidance.";

/// Where one turn currently is.
#[derive(Debug)]
enum LoopState {
    AwaitingModel,
    ExecutingTools(Vec<ToolInvocationRequest>),
    Done(String),
}

/// The outcome of one user turn.
#[derive(Debug, Clone)]
pub struct AgentTurn {
    /// Final AI text shown to the user
    pub reply: String,

    /// How many times the model was called
    pub model_calls: u32,

    /// Every tool result produced during the turn, in execution order
    pub tool_results: Vec<ToolResult>,
}

/// The core agent loop that orchestrates model calls and tool execution.
pub struct AgentLoop {
    /// The model provider to use
    provider: Arc<dyn Provider>,

    /// The model to use
    model: String,

    /// Temperature setting
    temperature: f32,

    /// Max tokens per response
    max_tokens: Option<u32>,

    /// Tool registry
    tools: Arc<ToolRegistry>,

    /// Maximum tool rounds per turn
    max_tool_rounds: u32,
}

impl AgentLoop {
    /// Create a new agent loop.
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        temperature: f32,
        tools: Arc<ToolRegistry>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature,
            max_tokens: None,
            tools,
            max_tool_rounds: 25,
        }
    }

    /// Create an agent loop with the model settings from config.
    pub fn from_config(
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        config: &AppConfig,
    ) -> Self {
        Self::new(provider, &config.default_model, config.default_temperature, tools)
            .with_max_tokens(config.default_max_tokens)
            .with_max_tool_rounds(config.agent.max_tool_rounds)
    }

    /// Set the maximum number of tool rounds per turn.
    pub fn with_max_tool_rounds(mut self, max: u32) -> Self {
        self.max_tool_rounds = max;
        self
    }

    /// Set the max tokens per model response.
    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Run one turn over `transcript`, which must already end with the
    /// user's message.
    ///
    /// Every AI message and tool record produced along the way is appended
    /// in place. Model failures propagate as `Error::Provider`; a tool
    /// failure that leaves the item store unreachable aborts with
    /// `Error::Tool`. All other tool problems are reported back to the model.
    pub async fn process(&self, transcript: &mut Transcript) -> Result<AgentTurn, Error> {
        info!(messages = transcript.len(), "Processing turn");

        let tool_definitions = self.tools.definitions();
        let mut state = LoopState::AwaitingModel;
        let mut model_calls = 0;
        let mut rounds = 0;
        let mut tool_results = Vec::new();

        let reply = loop {
            state = match state {
                LoopState::AwaitingModel => {
                    let request = ProviderRequest {
                        model: self.model.clone(),
                        messages: transcript.clone(),
                        temperature: self.temperature,
                        max_tokens: self.max_tokens,
                        tools: tool_definitions.clone(),
                    };

                    model_calls += 1;
                    debug!(call = model_calls, "Calling model");
                    let response = self.provider.complete(request).await?;

                    if let Some(usage) = &response.usage {
                        debug!(model = %response.model, tokens = usage.total_tokens, "Model responded");
                    }

                    let message = response.message;
                    let calls = message.tool_calls().to_vec();
                    let content = message.content().to_string();
                    transcript.push(message);

                    if calls.is_empty() {
                        LoopState::Done(content)
                    } else if rounds >= self.max_tool_rounds {
                        warn!(rounds, "Max tool rounds reached, stopping turn");
                        transcript.push(Message::ai(MAX_ROUNDS_REPLY));
                        LoopState::Done(MAX_ROUNDS_REPLY.to_string())
                    } else {
                        LoopState::ExecutingTools(calls)
                    }
                }
                LoopState::ExecutingTools(calls) => {
                    rounds += 1;
                    debug!(round = rounds, tool_count = calls.len(), "Executing tool calls");

                    for call in &calls {
                        let result = self.execute_tool(call).await?;
                        transcript.push(Message::tool_result(result.clone()));
                        tool_results.push(result);
                    }

                    LoopState::AwaitingModel
                }
                LoopState::Done(reply) => break reply,
            };
        };

        info!(model_calls, tool_calls = tool_results.len(), "Turn complete");
        Ok(AgentTurn {
            reply,
            model_calls,
            tool_results,
        })
    }

    /// Execute one request, turning recoverable failures into a failed result.
    async fn execute_tool(&self, call: &ToolInvocationRequest) -> Result<ToolResult, Error> {
        match self.tools.execute(call).await {
            Ok(result) => {
                debug!(tool = %call.tool_name, success = result.success, "Tool executed");
                Ok(result)
            }
            Err(e) if e.is_fatal() => {
                warn!(tool = %call.tool_name, error = %e, "Tool hit an unavailable store");
                Err(Error::Tool(e))
            }
            Err(e) => {
                warn!(tool = %call.tool_name, error = %e, "Tool execution failed");
                Ok(ToolResult::failure(
                    call.id.clone(),
                    call.tool_name.clone(),
                    format!(
                        "Error: the '{}' call could not be completed. {e}",
                        call.tool_name
                    ),
                ))
            }
        }
    }
}
