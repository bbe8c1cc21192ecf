//! LLM interaction: build the analysis request and call the provider.
//!
//! This module is intentionally thin. Prompt wording lives in
//! [`crate::prompts`]; this file only turns a prompt into messages, forwards
//! the configured sampling parameters and maps failures to
//! [`PaperError::Api`].
//!
//! ## No retries
//!
//! A failed call is reported once and the paper is skipped. The batch pauses
//! `rate_limit_delay` after every call instead, which is the only pacing the
//! tool applies.

use crate::config::LlmSettings;
use crate::error::PaperError;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// A single analysis request: one system turn, one user turn.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRequest {
    pub system: String,
    pub user: String,
}

/// The model's reply plus token accounting.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AnalysisResponse {
    pub content: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
}

/// Anything that can answer an [`AnalysisRequest`].
///
/// Production code wraps an `edgequake_llm` provider in [`ProviderClient`];
/// tests script replies without a network.
pub trait CompletionClient: Send + Sync {
    fn complete<'a>(
        &'a self,
        request: &'a AnalysisRequest,
        settings: &'a LlmSettings,
    ) -> BoxFuture<'a, Result<AnalysisResponse, PaperError>>;

    /// Model name recorded in output metadata.
    fn model_name(&self) -> String;
}

/// [`CompletionClient`] over any `edgequake_llm` provider.
#[derive(Clone)]
pub struct ProviderClient {
    provider: Arc<dyn LLMProvider>,
    model: String,
}

impl ProviderClient {
    /// `model` is the identifier the provider was created with; it is only
    /// used for reporting.
    pub fn new(provider: Arc<dyn LLMProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }
}

impl std::fmt::Debug for ProviderClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderClient")
            .field("provider", &"<dyn LLMProvider>")
            .field("model", &self.model)
            .finish()
    }
}

impl CompletionClient for ProviderClient {
    fn complete<'a>(
        &'a self,
        request: &'a AnalysisRequest,
        settings: &'a LlmSettings,
    ) -> BoxFuture<'a, Result<AnalysisResponse, PaperError>> {
        Box::pin(async move {
            let start = Instant::now();
            let messages = vec![
                ChatMessage::system(&request.system),
                ChatMessage::user(&request.user),
            ];
            let options = build_options(settings);

            match self.provider.chat(&messages, Some(&options)).await {
                Ok(response) => {
                    debug!(
                        "{} input tokens, {} output tokens, {:?}",
                        response.prompt_tokens,
                        response.completion_tokens,
                        start.elapsed()
                    );
                    Ok(AnalysisResponse {
                        content: response.content,
                        input_tokens: response.prompt_tokens,
                        output_tokens: response.completion_tokens,
                    })
                }
                Err(e) => {
                    warn!("LLM call failed after {:?}: {}", start.elapsed(), e);
                    Err(PaperError::Api {
                        detail: e.to_string(),
                    })
                }
            }
        })
    }

    fn model_name(&self) -> String {
        self.model.clone()
    }
}

/// Build `CompletionOptions` from the `llm_settings` group.
pub(crate) fn build_options(settings: &LlmSettings) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(settings.temperature),
        max_tokens: Some(settings.max_tokens),
        top_p: Some(settings.top_p),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_options_forwards_sampling_settings() {
        let opts = build_options(&LlmSettings::default());
        assert_eq!(opts.temperature, Some(0.0));
        assert_eq!(opts.max_tokens, Some(16000));
        assert_eq!(opts.top_p, Some(0.8));
    }
}
