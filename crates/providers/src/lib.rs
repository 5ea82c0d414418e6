//! Model provider implementations for Snello.
//!
//! All providers implement the `snello_core::Provider` trait.
//! The router selects the correct provider based on configuration.

mod history;

pub mod gemini;
pub mod openai_compat;
pub mod router;
pub mod title;

pub use gemini::GeminiProvider;
pub use openai_compat::OpenAiCompatProvider;
pub use router::{ProviderRouter, build_from_config};
pub use title::ProviderTitleGenerator;
