//! Research plan produced by the reasoning model

use serde::{Deserialize, Serialize};

/// Sub-queries to run for one research request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AgentPlan {
    /// 1 to 3 search queries, in the order the planner produced them
    pub sub_queries: Vec<String>,
    /// Planner rationale
    pub thought_process: String,
}

impl AgentPlan {
    /// Single-query plan used when the planner output cannot be parsed
    pub fn fallback(query: &str) -> Self {
        Self {
            sub_queries: vec![query.to_string()],
            thought_process: "Planner output could not be parsed; searching with the original query."
                .to_string(),
        }
    }
}
