//! Session titles generated by the configured model.

use std::sync::Arc;

use async_trait::async_trait;
use snello_core::error::ProviderError;
use snello_core::message::Message;
use snello_core::provider::{Provider, ProviderRequest};
use snello_core::store::TitleGenerator;

const TITLE_INSTRUCTION: &str = "Create a very short, concise title (5 words max) for a \
conversation that starts with the following message. Reply with the title only.";

/// Asks a provider for a short title with no tools attached.
pub struct ProviderTitleGenerator {
    provider: Arc<dyn Provider>,
    model: String,
}

impl ProviderTitleGenerator {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }
}

#[async_trait]
impl TitleGenerator for ProviderTitleGenerator {
    async fn generate_title(&self, first_message: &str) -> Result<String, ProviderError> {
        let prompt = format!("{TITLE_INSTRUCTION}\n\nMessage: \"{first_message}\"");
        let request = ProviderRequest::plain(&self.model, vec![Message::human(prompt)]);
        let response = self.provider.complete(request).await?;

        let title = clean_title(response.message.content());
        if title.is_empty() {
            return Err(ProviderError::InvalidResponse("model returned an empty title".into()));
        }
        Ok(title)
    }
}

/// First line of the reply, without surrounding quotes or markdown emphasis.
fn clean_title(raw: &str) -> String {
    raw.lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or_default()
        .trim_matches(|c| matches!(c, '"' | '\'' | '*' | '`'))
        .trim()
        .to_string()
}
