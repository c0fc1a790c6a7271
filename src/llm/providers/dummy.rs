//! Dummy LLM provider — hands the user content back unchanged.
//!
//! Lets the whole voicing path run offline: every agent reply comes back
//! exactly as drafted, with no API key and no network.

use crate::llm::{LlmResponse, ProviderError};

#[derive(Debug, Clone)]
pub struct DummyProvider;

impl DummyProvider {
    pub async fn complete(&self, content: &str) -> Result<LlmResponse, ProviderError> {
        Ok(LlmResponse { text: content.to_string(), usage: None })
    }
}
