//! Prompt templates for planning and grounded synthesis

use crate::types::SearchResult;

/// Prompt builder for the research pipeline
pub struct PromptBuilder;

impl PromptBuilder {
    /// System instruction for the planning call
    pub fn planner_system_prompt(max_sub_queries: usize) -> String {
        format!(
            r#"You are a research planner for a document search engine.

Break the user's question into between 1 and {max} focused search queries that together cover everything needed to answer it. Prefer fewer queries when the question is simple.

Respond with a JSON object and nothing else, in exactly this shape:
{{"subQueries": ["first search query", "second search query"], "thoughtProcess": "one or two sentences explaining the plan"}}"#,
            max = max_sub_queries
        )
    }

    /// User turn for the planning call
    pub fn planner_user_prompt(query: &str) -> String {
        format!("Question: {}", query)
    }

    /// Context block with each passage labelled by its chunk id
    pub fn build_context(results: &[SearchResult]) -> String {
        let mut context = String::new();

        for result in results {
            context.push_str(&format!(
                "[{}] (Source: {})\n{}\n\n---\n\n",
                result.id,
                result.source_url.as_deref().unwrap_or("unknown"),
                result.content
            ));
        }

        context
    }

    /// System instruction for the synthesis call
    pub fn synthesis_system_prompt() -> &'static str {
        r#"You are a document-grounded research assistant that ONLY uses information from the supplied context.

GROUNDING RULES:
1. ONLY use information that is explicitly stated in the CONTEXT
2. Every claim MUST cite the identifier of the passage it comes from, in square brackets exactly as given, e.g. [abc123_0]
3. If several passages support a claim, cite each of them
4. If the context does not answer the question, say so plainly instead of guessing
5. NEVER use outside knowledge"#
    }

    /// User turn for the synthesis call
    pub fn synthesis_user_prompt(question: &str, context: &str) -> String {
        format!(
            r#"CONTEXT:
{context}
QUESTION: {question}

Answer using ONLY the context above, citing passage identifiers:"#,
            context = context,
            question = question
        )
    }
}
