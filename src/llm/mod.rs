//! LLM integration: provider trait, OpenAI-compatible client, summarizer.

pub mod openai;
pub mod provider;
pub mod summarizer;

pub use openai::OpenAiCompatProvider;
pub use provider::{ChatMessage, CompletionRequest, CompletionResponse, LlmProvider, Role};
pub use summarizer::{FALLBACK_SUMMARY, Summarizer, SummaryResult, SummarySource};

use std::sync::Arc;

use crate::config::SummarizerConfig;

/// Create the chat completion provider described by `config`.
pub fn create_provider(config: &SummarizerConfig) -> Arc<dyn LlmProvider> {
    tracing::info!(endpoint = %config.endpoint, model = %config.model, "Using chat completion provider");
    Arc::new(OpenAiCompatProvider::new(
        config.endpoint.clone(),
        config.model.clone(),
        config.timeout,
    ))
}
