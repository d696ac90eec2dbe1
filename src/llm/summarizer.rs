//! Email summarization with a degrade-not-fail contract.

use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::provider::{ChatMessage, CompletionRequest, LlmProvider};
use crate::config::{CredentialRef, SummarizerConfig};
use crate::error::LlmError;
use crate::secrets::CredentialProvider;

/// Sent in place of a summary whenever summarization fails.
pub const FALLBACK_SUMMARY: &str = "Failed generating summary.";

const SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// Where a summary's text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummarySource {
    Generated,
    Fallback,
}

/// Summary text plus its provenance. A fallback is never an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryResult {
    pub text: String,
    pub source: SummarySource,
}

impl SummaryResult {
    pub fn generated(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: SummarySource::Generated,
        }
    }

    pub fn fallback() -> Self {
        Self {
            text: FALLBACK_SUMMARY.to_string(),
            source: SummarySource::Fallback,
        }
    }
}

/// Summarizes an email through an [`LlmProvider`].
pub struct Summarizer {
    llm: Arc<dyn LlmProvider>,
    credential: CredentialRef,
    timeout: Duration,
    max_body_chars: usize,
}

impl Summarizer {
    pub fn new(llm: Arc<dyn LlmProvider>, config: &SummarizerConfig) -> Self {
        Self {
            llm,
            credential: config.credential.clone(),
            timeout: config.timeout,
            max_body_chars: config.max_body_chars,
        }
    }

    /// Summarize `subject` and `body`. Never fails: any error yields
    /// [`SummaryResult::fallback`].
    pub async fn summarize(
        &self,
        credentials: &CredentialProvider,
        subject: &str,
        body: &str,
    ) -> SummaryResult {
        info!(model = self.llm.model_name(), "Requesting summary");
        match self.try_summarize(credentials, subject, body).await {
            Ok(text) => {
                info!("Summary generated");
                SummaryResult::generated(text)
            }
            Err(e) => {
                warn!(error = %e, "Summarization failed, using fallback text");
                SummaryResult::fallback()
            }
        }
    }

    async fn try_summarize(
        &self,
        credentials: &CredentialProvider,
        subject: &str,
        body: &str,
    ) -> Result<String, LlmError> {
        let api_key: SecretString = credentials.get_credential(&self.credential).await?;

        let request = CompletionRequest::new(vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(build_prompt(subject, body, self.max_body_chars)),
        ]);

        let response = tokio::time::timeout(self.timeout, self.llm.complete(&api_key, request))
            .await
            .map_err(|_| LlmError::Timeout {
                provider: self.llm.model_name().to_string(),
                timeout: self.timeout,
            })??;

        Ok(response.content)
    }
}

/// The user prompt: fixed instruction, then subject and (possibly cut) body.
pub fn build_prompt(subject: &str, body: &str, max_body_chars: usize) -> String {
    let body: String = match body.char_indices().nth(max_body_chars) {
        Some((cut, _)) => body[..cut].to_string(),
        None => body.to_string(),
    };
    format!("Summarize this email briefly:\n\nSubject: {subject}\n\nBody:\n{body}")
}
