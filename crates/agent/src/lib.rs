//! LLM integration for supplier matching
//!
//! - `llm` - `LlmClient` port and an OpenAI-compatible chat-completions client
//! - `semantic` - the semantic matching strategy built on top of it
//!
//! The LLM only judges fit. Supplier identity, score bounds and the recommended
//! threshold are enforced locally, and any LLM failure degrades to an empty result.

pub mod llm;
pub mod semantic;

use std::sync::Arc;

use anyhow::Result;
use procura_core::config::LlmConfig;

pub use llm::{ChatCompletionClient, LlmClient};
pub use semantic::{parse_response, PromptRenderer, SemanticMatcher};

/// Builds the semantic strategy when a credential is configured.
pub fn semantic_matcher_from_config(config: &LlmConfig) -> Result<Option<SemanticMatcher>> {
    if !config.is_configured() {
        return Ok(None);
    }
    let client = ChatCompletionClient::from_config(config)?;
    Ok(Some(SemanticMatcher::new(Arc::new(client))?))
}
