//! Research planning with structured model output

use serde::Deserialize;
use std::sync::Arc;

use crate::error::Result;
use crate::providers::{GenerationRequest, LlmProvider};
use crate::types::AgentPlan;

use super::prompt::PromptBuilder;

/// Shape the planner is asked to return
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlanResponse {
    #[serde(alias = "sub_queries", alias = "queries")]
    sub_queries: Vec<String>,
    #[serde(default, alias = "thought_process")]
    thought_process: String,
}

/// Turns a question into 1..=`max_sub_queries` search queries
pub struct Planner {
    llm: Arc<dyn LlmProvider>,
    max_sub_queries: usize,
}

impl Planner {
    pub fn new(llm: Arc<dyn LlmProvider>, max_sub_queries: usize) -> Self {
        Self {
            llm,
            max_sub_queries: max_sub_queries.max(1),
        }
    }

    /// Ask the model for a plan. A service error fails the call; an
    /// unparseable response yields [`AgentPlan::fallback`].
    pub async fn plan(&self, query: &str) -> Result<AgentPlan> {
        let request = GenerationRequest::json(
            PromptBuilder::planner_system_prompt(self.max_sub_queries),
            PromptBuilder::planner_user_prompt(query),
        );

        let raw = self.llm.generate(&request).await?;
        Ok(parse_plan(&raw, query, self.max_sub_queries))
    }
}

/// Parse planner output, falling back to the original query
pub fn parse_plan(raw: &str, query: &str, max_sub_queries: usize) -> AgentPlan {
    let parsed = extract_object(raw)
        .and_then(|json| serde_json::from_str::<PlanResponse>(json).ok());

    let Some(response) = parsed else {
        tracing::warn!("Planner returned unparseable output; using fallback plan");
        return AgentPlan::fallback(query);
    };

    let mut sub_queries: Vec<String> = Vec::new();
    for q in response.sub_queries {
        let q = q.trim();
        if !q.is_empty() && !sub_queries.iter().any(|existing| existing == q) {
            sub_queries.push(q.to_string());
        }
    }
    sub_queries.truncate(max_sub_queries);

    if sub_queries.is_empty() {
        tracing::warn!("Planner returned no sub-queries; using fallback plan");
        return AgentPlan::fallback(query);
    }

    AgentPlan {
        sub_queries,
        thought_process: response.thought_process,
    }
}

/// Outermost `{...}` span, tolerating code fences or chatter around it
fn extract_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (start < end).then(|| &raw[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedLlm;

    #[test]
    fn test_parses_structured_plan() {
        let plan = parse_plan(
            r#"{"subQueries": ["rust async", "tokio runtime"], "thoughtProcess": "two angles"}"#,
            "how does async rust work?",
            3,
        );
        assert_eq!(plan.sub_queries, vec!["rust async", "tokio runtime"]);
        assert_eq!(plan.thought_process, "two angles");
    }

    #[test]
    fn test_tolerates_fences_and_snake_case() {
        let raw = "```json\n{\"sub_queries\": [\" a \", \"a\", \"b\", \"c\", \"d\"]}\n```";
        let plan = parse_plan(raw, "q", 3);
        assert_eq!(plan.sub_queries, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_malformed_output_falls_back_to_query() {
        for raw in ["not json at all", "{\"subQueries\": \"oops\"}", "{\"subQueries\": []}", "}{"] {
            let plan = parse_plan(raw, "original question", 3);
            assert_eq!(plan.sub_queries, vec!["original question".to_string()]);
            assert!(!plan.thought_process.is_empty());
        }
    }

    #[tokio::test]
    async fn test_plan_requests_json_output() {
        let llm = Arc::new(ScriptedLlm::new(
            r#"{"subQueries": ["x"], "thoughtProcess": "t"}"#,
            "unused",
        ));
        let planner = Planner::new(llm.clone(), 3);

        let plan = planner.plan("question").await.unwrap();

        assert_eq!(plan.sub_queries, vec!["x"]);
        let requests = llm.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].json_output);
        assert!(requests[0].user_prompt.contains("question"));
    }
}
