//! LLM provider trait for planning and answer generation

use async_trait::async_trait;
use crate::error::Result;

/// A single generation call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    /// Instructions for the model
    pub system_prompt: String,
    /// The user turn
    pub user_prompt: String,
    /// Ask the service for a JSON object instead of free text
    pub json_output: bool,
}

impl GenerationRequest {
    /// Free-text request
    pub fn text(system_prompt: impl Into<String>, user_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            user_prompt: user_prompt.into(),
            json_output: false,
        }
    }

    /// Structured-output request
    pub fn json(system_prompt: impl Into<String>, user_prompt: impl Into<String>) -> Self {
        Self {
            json_output: true,
            ..Self::text(system_prompt, user_prompt)
        }
    }
}

/// Trait for LLM-based generation
///
/// Implementations:
/// - `OllamaLlm`: Local Ollama server (llama3.2, phi3, etc.)
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate a completion for the request
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;

    /// Check if the provider is healthy and available
    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    /// Get provider name for logging
    fn name(&self) -> &str;

    /// Get the model being used
    fn model(&self) -> &str;
}
