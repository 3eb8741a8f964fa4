//! Planning, grounded answer generation and citation handling

pub mod citation;
mod planner;
pub mod prompt;
mod synthesizer;

pub use citation::{distinct_sources, extract_citations};
pub use planner::{parse_plan, Planner};
pub use prompt::PromptBuilder;
pub use synthesizer::{AnswerSynthesizer, NO_INFORMATION_ANSWER};
