//! Deduplication and ranking of vector matches

use std::collections::HashMap;

use crate::types::VectorMatch;

/// Collapse repeated chunk ids and order by descending score.
///
/// When a chunk appears more than once its highest score is kept. Equal
/// scores are ordered by ascending chunk id, so the output does not depend
/// on the order matches arrived in.
pub fn dedupe_and_rank(matches: &[VectorMatch]) -> Vec<VectorMatch> {
    let mut best: HashMap<&str, f32> = HashMap::with_capacity(matches.len());

    for m in matches {
        best.entry(m.id.as_str())
            .and_modify(|score| {
                if m.score.total_cmp(score).is_gt() {
                    *score = m.score;
                }
            })
            .or_insert(m.score);
    }

    let mut ranked: Vec<VectorMatch> = best
        .into_iter()
        .map(|(id, score)| VectorMatch::new(id, score))
        .collect();

    ranked.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(id: &str, score: f32) -> VectorMatch {
        VectorMatch::new(id, score)
    }

    fn ids(ranked: &[VectorMatch]) -> Vec<&str> {
        ranked.iter().map(|m| m.id.as_str()).collect()
    }

    #[test]
    fn test_duplicates_keep_highest_score() {
        let ranked = dedupe_and_rank(&[m("a", 0.2), m("b", 0.5), m("a", 0.9), m("a", 0.4)]);
        assert_eq!(ids(&ranked), vec!["a", "b"]);
        assert_eq!(ranked[0].score, 0.9);
    }

    #[test]
    fn test_ties_break_on_id() {
        let ranked = dedupe_and_rank(&[m("doc_2", 0.5), m("doc_10", 0.5), m("doc_1", 0.7)]);
        assert_eq!(ids(&ranked), vec!["doc_1", "doc_10", "doc_2"]);
    }

    #[test]
    fn test_arrival_order_does_not_matter() {
        let input = vec![
            m("x", 0.3),
            m("y", 0.8),
            m("z", 0.3),
            m("x", 0.6),
            m("w", 0.8),
            m("y", 0.1),
        ];
        let expected = dedupe_and_rank(&input);

        let mut reversed = input.clone();
        reversed.reverse();
        assert_eq!(dedupe_and_rank(&reversed), expected);

        let mut rotated = input;
        rotated.rotate_left(2);
        assert_eq!(dedupe_and_rank(&rotated), expected);

        assert_eq!(ids(&expected), vec!["w", "y", "x", "z"]);
    }

    #[test]
    fn test_empty_input() {
        assert!(dedupe_and_rank(&[]).is_empty());
    }
}
