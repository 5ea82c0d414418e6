//! # Snello Core
//!
//! Domain types, traits, and error definitions for the Snello to-do assistant.
//! This crate has **zero framework dependencies**: it defines the domain model
//! that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every boundary is defined as a trait here (model provider, tools, item store,
//! session store, title generation). Implementations live in their respective
//! crates, so tests can swap in scripted providers and in-memory stores.

pub mod error;
pub mod message;
pub mod provider;
pub mod store;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{Error, ProviderError, Result, StoreError, ToolError};
pub use message::{Message, ToolInvocationRequest, ToolResult, Transcript};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition};
pub use store::{ChatSession, ItemStore, SessionStore, SessionSummary, TitleGenerator, ToDoItem};
pub use tool::{Tool, ToolRegistry};
