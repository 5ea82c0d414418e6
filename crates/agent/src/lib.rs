//! The Snello agent: the tool-calling loop and the chat service around it.
//!
//! One user turn runs as a small state machine:
//!
//! 1. **Ask the model** with the full transcript and the tool definitions
//! 2. **If tool calls**: execute them in order, append their results, ask again
//! 3. **If text**: that text is the reply
//!
//! The loop stops at the first text-only reply or when the tool-round cap is hit.
//! `ChatService` wraps the loop with session persistence and the user-facing
//! fallbacks for provider outages.

pub mod chat;
pub mod loop_runner;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use chat::{ActiveChat, ChatService, QUOTA_REPLY, TurnReply, UNEXPECTED_REPLY, display_messages};
pub use loop_runner::{AgentLoop, AgentTurn, MAX_ROUNDS_REPLY};
