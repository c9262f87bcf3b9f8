//! Clause extraction: turn a processed document's chunks into typed,
//! risk-scored clauses via a batched structured-output LLM pass.
//!
//! Grounded on
//! `original_source/backend/src/services/clause_extractor.py` for every
//! numeric constant and the prompt's enumerations; structured-call
//! mechanics come from `src/llm.rs`.

use serde::Deserialize;
use uuid::Uuid;

use crate::llm::LlmClient;
use crate::models::{Clause, ClauseType, RiskBand, RiskFlag};
use crate::structure::ExtractedChunk;

/// Chunks per LLM call (`clause_extractor.py`'s `BATCH_SIZE`).
const BATCH_SIZE: usize = 5;
/// Combined batch text is truncated to the *last* this-many characters
/// (`combined_text[-150000:]`), preserving recency over leading boilerplate.
const MAX_BATCH_CHARS: usize = 150_000;
/// Clauses shorter than this after trimming are dropped as noise.
const MIN_CLAUSE_TEXT_LEN: usize = 10;

#[derive(Debug, Deserialize)]
struct LlmClauseOut {
    clause_type: String,
    #[serde(default)]
    clause_subtype: Option<String>,
    extracted_text: String,
    page_number: i64,
    #[serde(default)]
    section_name: Option<String>,
    #[serde(default = "default_confidence")]
    confidence_score: f64,
    #[serde(default)]
    risk_score: f64,
    #[serde(default)]
    risk_flags: Vec<String>,
    #[serde(default)]
    risk_reasoning: String,
}

fn default_confidence() -> f64 {
    0.5
}

#[derive(Debug, Deserialize)]
struct LlmClauseBatchResponse {
    #[serde(default)]
    clauses: Vec<LlmClauseOut>,
}

fn system_prompt() -> String {
    let types = ClauseType::ALL
        .iter()
        .map(|t| t.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "You extract contract clauses from labeled text chunks. Each clause must be one of: \
        {types}. Score risk 0-100: 0-24 low, 25-49 medium, 50-74 high, 75-100 critical. Flag \
        applicable risks using only these strings: unfavorable_termination, high_liability, \
        unfair_payment_terms, weak_indemnification, ip_risk, compliance_risk, \
        data_privacy_risk, excessive_penalties, one_sided_terms, unclear_language, \
        missing_protections. Always provide a non-empty risk_reasoning, regardless of score. \
        Extract complete provisions, never truncate mid-sentence; one clause per provision. \
        confidence_score is in [0,1]. Respond with JSON: {{\"clauses\": [{{\"clause_type\":str, \
        \"clause_subtype\":str|null, \"extracted_text\":str, \"page_number\":int, \
        \"section_name\":str, \"confidence_score\":float, \"risk_score\":float, \
        \"risk_flags\":[str], \"risk_reasoning\":str}}]}}"
    )
}

fn truncate_tail(text: &str, max_chars: usize) -> String {
    let total = text.chars().count();
    if total <= max_chars {
        text.to_string()
    } else {
        text.chars().skip(total - max_chars).collect()
    }
}

fn build_batch_prompt(batch: &[&ExtractedChunk]) -> String {
    let mut combined = String::new();
    for chunk in batch {
        combined.push_str(&format!(
            "[Page {}, Section: {}]\n{}\n\n",
            chunk.page_number, chunk.section_name, chunk.text
        ));
    }
    truncate_tail(&combined, MAX_BATCH_CHARS)
}

pub async fn extract_clauses(
    document_id: &str,
    chunks: &[ExtractedChunk],
    llm: &LlmClient,
) -> Vec<Clause> {
    let mut clauses = Vec::new();
    let system = system_prompt();

    for batch in chunks.chunks(BATCH_SIZE) {
        let batch_refs: Vec<&ExtractedChunk> = batch.iter().collect();
        let user_prompt = build_batch_prompt(&batch_refs);

        let response: Option<LlmClauseBatchResponse> =
            llm.complete_json(&system, &user_prompt).await.ok();

        let Some(response) = response else {
            continue;
        };

        for raw in response.clauses {
            if let Some(clause) = post_validate(document_id, raw) {
                clauses.push(clause);
            }
        }
    }

    clauses
}

fn post_validate(document_id: &str, raw: LlmClauseOut) -> Option<Clause> {
    let text = raw.extracted_text.trim().to_string();
    if text.chars().count() < MIN_CLAUSE_TEXT_LEN {
        return None;
    }

    let risk_score = raw.risk_score.clamp(0.0, 100.0);
    let confidence_score = raw.confidence_score.clamp(0.0, 1.0);

    let risk_reasoning = if raw.risk_reasoning.trim().is_empty() {
        RiskBand::for_score(risk_score).default_reasoning().to_string()
    } else {
        raw.risk_reasoning.trim().to_string()
    };

    let risk_flags: Vec<RiskFlag> = raw
        .risk_flags
        .iter()
        .filter_map(|f| RiskFlag::from_str_loose(f))
        .collect();

    Some(Clause {
        id: Uuid::new_v4().to_string(),
        document_id: document_id.to_string(),
        clause_type: ClauseType::from_str_loose(&raw.clause_type),
        clause_subtype: raw.clause_subtype,
        extracted_text: text,
        page_number: raw.page_number,
        section_name: raw.section_name.unwrap_or_else(|| "Unknown".to_string()),
        confidence_score,
        risk_score,
        risk_flags,
        risk_reasoning,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(page: i64, text: &str) -> ExtractedChunk {
        ExtractedChunk {
            id: format!("c-{page}"),
            page_number: page,
            section_name: "Section A".to_string(),
            chunk_type: crate::models::ChunkType::Clause,
            text: text.to_string(),
            bbox: None,
        }
    }

    #[test]
    fn truncate_tail_keeps_last_chars() {
        let text = "0123456789";
        assert_eq!(truncate_tail(text, 4), "6789");
        assert_eq!(truncate_tail(text, 100), text);
    }

    #[test]
    fn build_batch_prompt_labels_each_chunk() {
        let chunks = vec![chunk(1, "alpha"), chunk(2, "beta")];
        let refs: Vec<&ExtractedChunk> = chunks.iter().collect();
        let prompt = build_batch_prompt(&refs);
        assert!(prompt.contains("[Page 1, Section: Section A]"));
        assert!(prompt.contains("alpha"));
        assert!(prompt.contains("[Page 2, Section: Section A]"));
    }

    #[test]
    fn post_validate_drops_short_text() {
        let raw = LlmClauseOut {
            clause_type: "Termination".to_string(),
            clause_subtype: None,
            extracted_text: "tiny".to_string(),
            page_number: 1,
            section_name: None,
            confidence_score: 0.9,
            risk_score: 10.0,
            risk_flags: vec![],
            risk_reasoning: String::new(),
        };
        assert!(post_validate("doc1", raw).is_none());
    }

    #[test]
    fn post_validate_synthesizes_reasoning_when_blank() {
        let raw = LlmClauseOut {
            clause_type: "Payment".to_string(),
            clause_subtype: None,
            extracted_text: "Payment shall be due within thirty days of invoice.".to_string(),
            page_number: 2,
            section_name: Some("Payment Terms".to_string()),
            confidence_score: 0.8,
            risk_score: 80.0,
            risk_flags: vec!["unfair_payment_terms".to_string()],
            risk_reasoning: "   ".to_string(),
        };
        let clause = post_validate("doc1", raw).unwrap();
        assert_eq!(clause.clause_type, ClauseType::Payment);
        assert!(!clause.risk_reasoning.is_empty());
        assert_eq!(clause.risk_flags, vec![RiskFlag::UnfairPaymentTerms]);
    }

    #[test]
    fn post_validate_clamps_risk_and_confidence() {
        let raw = LlmClauseOut {
            clause_type: "Liability".to_string(),
            clause_subtype: None,
            extracted_text: "Liability is capped at total fees paid in prior twelve months."
                .to_string(),
            page_number: 3,
            section_name: None,
            confidence_score: 1.5,
            risk_score: 150.0,
            risk_flags: vec![],
            risk_reasoning: "Explicit cap on liability.".to_string(),
        };
        let clause = post_validate("doc1", raw).unwrap();
        assert_eq!(clause.risk_score, 100.0);
        assert_eq!(clause.confidence_score, 1.0);
    }
}
