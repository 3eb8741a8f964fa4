//! Grounded answer synthesis

use std::sync::Arc;

use crate::error::Result;
use crate::providers::{GenerationRequest, LlmProvider};
use crate::types::SearchResult;

use super::prompt::PromptBuilder;

/// Answer returned when retrieval finds nothing
pub const NO_INFORMATION_ANSWER: &str =
    "I could not find any relevant information in the knowledge base to answer this question.";

pub struct AnswerSynthesizer {
    llm: Arc<dyn LlmProvider>,
}

impl AnswerSynthesizer {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    /// Generate an answer grounded in `results`. With no results the fixed
    /// no-information answer is returned and the model is not called.
    pub async fn synthesize(&self, question: &str, results: &[SearchResult]) -> Result<String> {
        if results.is_empty() {
            return Ok(NO_INFORMATION_ANSWER.to_string());
        }

        let context = PromptBuilder::build_context(results);
        let request = GenerationRequest::text(
            PromptBuilder::synthesis_system_prompt(),
            PromptBuilder::synthesis_user_prompt(question, &context),
        );

        tracing::debug!(
            "Synthesizing answer from {} passages with {}",
            results.len(),
            self.llm.model()
        );

        let answer = self.llm.generate(&request).await?;
        Ok(answer.trim().to_string())
    }
}
