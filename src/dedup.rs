//! Clause deduplication: LLM-as-oracle pairwise comparison over
//! near-neighborhood groups, with a strict textual fallback when the LLM
//! call errors.
//!
//! Grounded on
//! `original_source/backend/src/services/clause_deduplicator.py` —
//! including the exact control flow (dict-keyed grouping, a
//! `keep_indices` set pruned in place as comparisons happen, not a
//! union-find), which determines which comparisons are skipped after an
//! early removal.

use std::collections::{HashMap, HashSet};

use serde::Deserialize;

use crate::llm::LlmClient;
use crate::models::Clause;

/// Confidence the LLM must clear for its `is_duplicate` verdict to be
/// trusted (`clause_deduplicator.py`'s `CONFIDENCE_THRESHOLD`).
const CONFIDENCE_THRESHOLD: f64 = 0.8;

#[derive(Debug, Deserialize)]
struct DuplicateVerdict {
    is_duplicate: bool,
    #[serde(default)]
    #[allow(dead_code)]
    reasoning: String,
    confidence: f64,
}

/// Build the comparison groups: each clause's index is inserted under
/// `(type, page)`, `(type, page-1)`, `(type, page+1)`; the resulting
/// groups are the map's values. A clause can land in more than one group.
fn build_groups(clauses: &[Clause]) -> Vec<Vec<usize>> {
    let mut map: HashMap<(String, i64), Vec<usize>> = HashMap::new();
    for (i, clause) in clauses.iter().enumerate() {
        let type_key = clause.clause_type.as_str().to_string();
        for page in [clause.page_number - 1, clause.page_number, clause.page_number + 1] {
            map.entry((type_key.clone(), page)).or_default().push(i);
        }
    }
    map.into_values().collect()
}

fn strict_textual_duplicate(a: &str, b: &str) -> bool {
    let (shorter, longer) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    if longer.is_empty() {
        return shorter.is_empty();
    }
    let ratio = shorter.len() as f64 / longer.len() as f64;
    if ratio <= 0.9 {
        return false;
    }
    let a_prefix: String = a.chars().take(100).collect();
    let b_prefix: String = b.chars().take(100).collect();
    a_prefix == b_prefix
}

async fn is_duplicate_pair(llm: &LlmClient, a: &Clause, b: &Clause) -> bool {
    let system = "You judge whether two contract clause extractions describe the same \
        underlying provision (possibly paraphrased or re-ordered), not merely similar topics. \
        Respond with JSON: {\"is_duplicate\":bool, \"reasoning\":str, \"confidence\":float in \
        [0,1]}.";
    let user = format!(
        "Clause A (page {}, type {}): {}\n\nClause B (page {}, type {}): {}",
        a.page_number,
        a.clause_type.as_str(),
        a.extracted_text,
        b.page_number,
        b.clause_type.as_str(),
        b.extracted_text
    );

    match llm.complete_json::<DuplicateVerdict>(system, &user).await {
        Ok(verdict) => verdict.is_duplicate && verdict.confidence >= CONFIDENCE_THRESHOLD,
        Err(_) => strict_textual_duplicate(&a.extracted_text, &b.extracted_text),
    }
}

/// Pick which of a duplicate pair to keep via the four-level tie-break
/// cascade: confidence gap, then length gap, then non-empty reasoning,
/// then the earlier (lower) index wins.
fn choose_keeper(clauses: &[Clause], i: usize, j: usize) -> usize {
    let (a, b) = (&clauses[i], &clauses[j]);

    if (a.confidence_score - b.confidence_score).abs() > 0.05 {
        return if a.confidence_score > b.confidence_score { i } else { j };
    }

    let len_a = a.extracted_text.len() as i64;
    let len_b = b.extracted_text.len() as i64;
    if (len_a - len_b).abs() > 20 {
        return if len_a > len_b { i } else { j };
    }

    let a_has_reasoning = !a.risk_reasoning.trim().is_empty();
    let b_has_reasoning = !b.risk_reasoning.trim().is_empty();
    if a_has_reasoning != b_has_reasoning {
        return if a_has_reasoning { i } else { j };
    }

    i.min(j)
}

pub async fn deduplicate(clauses: Vec<Clause>, llm: Option<&LlmClient>) -> Vec<Clause> {
    if clauses.len() < 2 {
        return clauses;
    }

    let groups = build_groups(&clauses);
    let mut keep_indices: HashSet<usize> = (0..clauses.len()).collect();

    for group in groups {
        for a in 0..group.len() {
            for b in (a + 1)..group.len() {
                let i = group[a];
                let j = group[b];
                if i == j || !keep_indices.contains(&i) || !keep_indices.contains(&j) {
                    continue;
                }

                let same_type = clauses[i].clause_type == clauses[j].clause_type;
                let page_diff = (clauses[i].page_number - clauses[j].page_number).abs();
                if !same_type || page_diff > 2 {
                    continue;
                }

                let duplicate = match llm {
                    Some(client) => is_duplicate_pair(client, &clauses[i], &clauses[j]).await,
                    None => strict_textual_duplicate(
                        &clauses[i].extracted_text,
                        &clauses[j].extracted_text,
                    ),
                };

                if duplicate {
                    let keeper = choose_keeper(&clauses, i, j);
                    let dropped = if keeper == i { j } else { i };
                    keep_indices.remove(&dropped);
                }
            }
        }
    }

    clauses
        .into_iter()
        .enumerate()
        .filter(|(i, _)| keep_indices.contains(i))
        .map(|(_, c)| c)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ClauseType;

    fn clause(page: i64, text: &str, confidence: f64) -> Clause {
        Clause {
            id: uuid::Uuid::new_v4().to_string(),
            document_id: "doc1".to_string(),
            clause_type: ClauseType::Termination,
            clause_subtype: None,
            extracted_text: text.to_string(),
            page_number: page,
            section_name: "Section A".to_string(),
            confidence_score: confidence,
            risk_score: 10.0,
            risk_flags: vec![],
            risk_reasoning: "reasoning".to_string(),
        }
    }

    #[test]
    fn strict_textual_duplicate_requires_length_ratio_and_prefix() {
        let a = "Either party may terminate this agreement with thirty days written notice.";
        let b = "Either party may terminate this agreement with thirty days written notice.";
        assert!(strict_textual_duplicate(a, b));

        let c = "A completely different clause about indemnification obligations entirely.";
        assert!(!strict_textual_duplicate(a, c));
    }

    #[test]
    fn choose_keeper_prefers_higher_confidence() {
        let clauses = vec![clause(1, "short", 0.5), clause(1, "short", 0.9)];
        assert_eq!(choose_keeper(&clauses, 0, 1), 1);
    }

    #[test]
    fn choose_keeper_prefers_longer_text_when_confidence_close() {
        let clauses = vec![
            clause(1, "short text", 0.8),
            clause(1, "a much longer text that exceeds the twenty character gap threshold", 0.81),
        ];
        assert_eq!(choose_keeper(&clauses, 0, 1), 1);
    }

    #[test]
    fn choose_keeper_falls_back_to_earlier_index() {
        let clauses = vec![clause(1, "identical length a", 0.8), clause(1, "identical length b", 0.8)];
        assert_eq!(choose_keeper(&clauses, 0, 1), 0);
    }

    #[tokio::test]
    async fn deduplicate_merges_near_duplicates_without_llm() {
        let text = "Either party may terminate this agreement with thirty days written notice to the other party hereto.";
        let clauses = vec![clause(1, text, 0.8), clause(1, text, 0.8)];
        let result = deduplicate(clauses, None).await;
        assert_eq!(result.len(), 1);
    }

    #[tokio::test]
    async fn deduplicate_keeps_distinct_clauses() {
        let clauses = vec![
            clause(1, "Termination requires thirty days notice in writing.", 0.8),
            clause(5, "A completely unrelated clause about a different topic here.", 0.8),
        ];
        let result = deduplicate(clauses, None).await;
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn build_groups_links_adjacent_pages() {
        let clauses = vec![clause(1, "a", 0.5), clause(2, "b", 0.5), clause(10, "c", 0.5)];
        let groups = build_groups(&clauses);
        let linked = groups.iter().any(|g| g.contains(&0) && g.contains(&1));
        assert!(linked);
        let far_linked = groups.iter().any(|g| g.contains(&0) && g.contains(&2));
        assert!(!far_linked);
    }
}
