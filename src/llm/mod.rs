//! LLM — multi-provider adapter used by app generation.
//!
//! DESIGN
//! ======
//! Environment variables pick the provider and model. The `LlmClient`
//! dispatches to OpenAI chat completions or Anthropic messages based on
//! `LLM_PROVIDER`. The credential is not part of the client: each call
//! carries the caller's key.

pub mod anthropic;
pub mod config;
pub mod openai;
pub mod types;

use config::{LlmConfig, LlmProviderKind};
pub use types::LlmChat;
use types::{ChatResponse, Credential, LlmError, Message};

// =============================================================================
// CLIENT DISPATCH
// =============================================================================

/// Concrete LLM client that dispatches to either OpenAI or Anthropic.
pub struct LlmClient {
    inner: LlmProvider,
    model: String,
}

enum LlmProvider {
    Anthropic(anthropic::AnthropicClient),
    OpenAi(openai::OpenAiClient),
}

impl LlmClient {
    /// Build an LLM client from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the config is invalid or the HTTP client fails.
    pub fn from_env() -> Result<Self, LlmError> {
        let config = LlmConfig::from_env()?;
        Self::from_config(config)
    }

    /// Build an LLM client from a parsed typed config.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider HTTP client fails to build.
    pub fn from_config(config: LlmConfig) -> Result<Self, LlmError> {
        let inner = match config.provider {
            LlmProviderKind::Anthropic => LlmProvider::Anthropic(anthropic::AnthropicClient::new(config.timeouts)?),
            LlmProviderKind::OpenAi => {
                LlmProvider::OpenAi(openai::OpenAiClient::new(config.openai_base_url, config.timeouts)?)
            }
        };
        Ok(Self { inner, model: config.model })
    }

    /// Return the configured model name.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait::async_trait]
impl LlmChat for LlmClient {
    async fn chat(
        &self,
        credential: &Credential,
        max_tokens: u32,
        system: &str,
        messages: &[Message],
    ) -> Result<ChatResponse, LlmError> {
        if credential.is_blank() {
            return Err(LlmError::MissingCredential);
        }
        match &self.inner {
            LlmProvider::Anthropic(c) => {
                c.chat(credential, &self.model, max_tokens, system, messages)
                    .await
            }
            LlmProvider::OpenAi(c) => {
                c.chat(credential, &self.model, max_tokens, system, messages)
                    .await
            }
        }
    }
}
