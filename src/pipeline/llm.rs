//! Classification through the edgequake-llm provider abstraction.
//!
//! Used for every provider other than `openai` (anthropic, gemini, ollama,
//! azure, ...). These APIs do not share OpenAI's structured-output switch,
//! so the JSON shape is enforced by the prompt alone and checked by
//! [`parse_classification`] on the way back.

use crate::config::RenamerConfig;
use crate::error::{ClassifyError, RenamerError};
use crate::pipeline::classify::{parse_classification, ClassificationResult, Classifier};
use crate::pipeline::encode::{PageImage, PNG_MIME};
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use futures::future::BoxFuture;
use std::sync::Arc;
use tracing::debug;

/// [`Classifier`] that delegates to any `edgequake_llm` provider.
pub struct ProviderClassifier {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
}

impl ProviderClassifier {
    /// Wrap a pre-built provider.
    pub fn new(provider: Arc<dyn LLMProvider>, temperature: f32, max_tokens: usize) -> Self {
        Self {
            provider,
            options: build_options(temperature, max_tokens),
        }
    }

    /// Create the named provider from the config. API keys are read from the
    /// provider's usual environment variables (`ANTHROPIC_API_KEY`, ...).
    pub fn from_config(config: &RenamerConfig) -> Result<Self, RenamerError> {
        let provider = ProviderFactory::create_llm_provider(&config.provider, &config.model)
            .map_err(|e| RenamerError::ProviderNotConfigured {
                provider: config.provider.clone(),
                hint: format!("{e}"),
            })?;
        Ok(Self::new(provider, config.temperature, config.max_tokens))
    }

    async fn send(
        &self,
        image: &PageImage,
        prompt: &str,
    ) -> Result<ClassificationResult, ClassifyError> {
        let image_data = ImageData::new(image.to_base64(), PNG_MIME).with_detail("high");
        let messages = vec![ChatMessage::user_with_images(prompt, vec![image_data])];

        let response = self
            .provider
            .chat(&messages, Some(&self.options))
            .await
            .map_err(|e| ClassifyError::RequestFailed {
                detail: format!("{e}"),
            })?;

        debug!(
            "Classification: {} input tokens, {} output tokens",
            response.prompt_tokens, response.completion_tokens
        );
        parse_classification(&response.content)
    }
}

/// Build `CompletionOptions` for a classification call.
fn build_options(temperature: f32, max_tokens: usize) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(temperature),
        max_tokens: Some(max_tokens),
        ..Default::default()
    }
}

impl Classifier for ProviderClassifier {
    fn classify<'a>(
        &'a self,
        image: &'a PageImage,
        prompt: &'a str,
    ) -> BoxFuture<'a, Result<ClassificationResult, ClassifyError>> {
        Box::pin(self.send(image, prompt))
    }
}
