//! Research pipeline: plan, gather, rank, synthesize
//!
//! Each stage is one memoized step, so a failure in a later stage never
//! re-plans or re-searches on retry.

use crate::error::Result;
use crate::generation::{distinct_sources, extract_citations, AnswerSynthesizer, Planner};
use crate::retrieval::{dedupe_and_rank, Retriever};
use crate::types::{AgentPlan, ResearchParams, ResearchReport, SearchResult, VectorMatch};
use crate::workflow::StepContext;

pub struct ResearchPipeline {
    planner: Planner,
    retriever: Retriever,
    synthesizer: AnswerSynthesizer,
}

impl ResearchPipeline {
    pub fn new(planner: Planner, retriever: Retriever, synthesizer: AnswerSynthesizer) -> Self {
        Self {
            planner,
            retriever,
            synthesizer,
        }
    }

    pub async fn run(&self, ctx: &StepContext, params: &ResearchParams) -> Result<ResearchReport> {
        let query = params.query.as_str();
        let planner = &self.planner;
        let retriever = &self.retriever;
        let synthesizer = &self.synthesizer;

        let plan: AgentPlan = ctx
            .run("plan", move || async move { planner.plan(query).await })
            .await?;

        tracing::info!(
            instance = %ctx.instance_id(),
            "Planned {} sub-queries: {:?}",
            plan.sub_queries.len(),
            plan.sub_queries
        );

        let sub_queries = &plan.sub_queries;
        let matches: Vec<VectorMatch> = ctx
            .run("gather", move || async move { retriever.gather(sub_queries).await })
            .await?;

        let matches = &matches;
        let results: Vec<SearchResult> = ctx
            .run("rank", move || async move {
                let ranked = dedupe_and_rank(matches);
                retriever.hydrate(&ranked).await
            })
            .await?;

        tracing::info!(
            instance = %ctx.instance_id(),
            "Ranked {} unique passages from {} matches",
            results.len(),
            matches.len()
        );

        let context = &results;
        let answer: String = ctx
            .run("synthesize", move || async move {
                synthesizer.synthesize(query, context).await
            })
            .await?;

        let citations = extract_citations(&answer, &results);
        let sources = distinct_sources(&results);

        Ok(ResearchReport {
            plan,
            answer,
            sources,
            citations,
            results,
        })
    }
}
