//! Citation extraction and source listing

use regex::Regex;
use std::sync::OnceLock;

use crate::types::SearchResult;

fn citation_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\[([^\[\]\n]+)\]").expect("Invalid regex"))
}

/// Chunk ids cited in `answer` as `[id]` markers, in first-appearance order.
///
/// Only ids present in `results` count; a marker may list several ids
/// separated by commas or semicolons.
pub fn extract_citations(answer: &str, results: &[SearchResult]) -> Vec<String> {
    let mut cited: Vec<String> = Vec::new();

    for cap in citation_pattern().captures_iter(answer) {
        let Some(inner) = cap.get(1) else { continue };

        for candidate in inner.as_str().split([',', ';']) {
            let candidate = candidate.trim();
            let known = results.iter().any(|r| r.id == candidate);
            if known && !cited.iter().any(|c| c == candidate) {
                cited.push(candidate.to_string());
            }
        }
    }

    cited
}

/// Distinct non-null source URLs in ranked order
pub fn distinct_sources(results: &[SearchResult]) -> Vec<String> {
    let mut sources: Vec<String> = Vec::new();

    for url in results.iter().filter_map(|r| r.source_url.as_deref()) {
        if !sources.iter().any(|s| s == url) {
            sources.push(url.to_string());
        }
    }

    sources
}
