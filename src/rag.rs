//! RAG question-answering over a workspace's indexed documents.
//!
//! Two-node graph (retrieve -> generate -> done), re-expressed as enum
//! dispatch rather than a graph-library dependency, per the teacher's
//! general preference for small hand-rolled state machines over pulling in
//! a workflow crate. Grounded on
//! `original_source/backend/src/services/rag_pipeline.py` for every
//! numeric constant, prompt shape, and the citation-validation algorithm.

use serde::Deserialize;
use sqlx::SqlitePool;

use crate::cache::Cache;
use crate::config::EmbeddingConfig;
use crate::embedding;
use crate::llm::LlmClient;
use crate::models::{truncate_excerpt, Citation, MessageRole};
use crate::vector_store::{self, ScoredEntry};

/// Similarity floor applied both at retrieval and at citation-candidate
/// filtering (`rag_pipeline.py`'s `MIN_SIMILARITY_THRESHOLD`).
const MIN_SIMILARITY_THRESHOLD: f32 = -0.3;
/// Candidate pool fetched from the vector store before truncation.
const RETRIEVE_N_RESULTS: usize = 10;
/// Hits actually passed to the generation prompt.
const RETRIEVE_TOP_K: usize = 5;
/// Citation-candidate fallback size when the LLM cites nothing valid.
const CITATION_FALLBACK_TOP_K: usize = 3;
/// Turns of conversation history rendered into the generation prompt.
const HISTORY_TURNS: usize = 4;

pub struct HistoryTurn {
    pub role: MessageRole,
    pub content: String,
}

#[derive(Debug, Deserialize)]
enum Classification {
    #[serde(rename = "greeting")]
    Greeting,
    #[serde(rename = "needs_context")]
    NeedsContext,
    #[serde(rename = "off_topic")]
    OffTopic,
}

#[derive(Debug, Deserialize)]
struct ClassificationResponse {
    classification: Classification,
}

#[derive(Debug, Deserialize)]
struct GenerationResponse {
    answer: String,
    #[serde(default)]
    cited_sources: Vec<i64>,
    #[serde(default = "default_confidence")]
    #[allow(dead_code)]
    confidence: f64,
    #[serde(default)]
    #[allow(dead_code)]
    answer_notes: String,
}

fn default_confidence() -> f64 {
    0.5
}

pub struct AnswerResult {
    pub answer: String,
    pub citations: Vec<Citation>,
}

fn is_bare_greeting(question: &str) -> bool {
    let normalized = question.trim().to_ascii_lowercase();
    matches!(
        normalized.as_str(),
        "hi" | "hey" | "hello" | "yo" | "sup" | "hiya"
    ) || (normalized.len() <= 3 && matches!(normalized.as_str(), "hi" | "hey"))
}

pub async fn answer(
    pool: &SqlitePool,
    cache: &Cache,
    embedding_config: &EmbeddingConfig,
    llm: &LlmClient,
    workspace_id: &str,
    question: &str,
    document_id_filter: Option<&str>,
    history: &[HistoryTurn],
) -> anyhow::Result<AnswerResult> {
    let hits = retrieve(pool, cache, embedding_config, workspace_id, question, document_id_filter).await?;
    generate(llm, question, &hits, history).await
}

async fn retrieve(
    pool: &SqlitePool,
    cache: &Cache,
    embedding_config: &EmbeddingConfig,
    workspace_id: &str,
    question: &str,
    document_id_filter: Option<&str>,
) -> anyhow::Result<Vec<ScoredEntry>> {
    if is_bare_greeting(question) {
        return Ok(Vec::new());
    }

    let query_embedding = embedding::embed_one(cache, embedding_config, question).await?;
    let Some(query_embedding) = query_embedding else {
        return Ok(Vec::new());
    };

    let mut hits = vector_store::search(
        pool,
        cache,
        workspace_id,
        &query_embedding,
        RETRIEVE_N_RESULTS,
        true,
        false,
    )
    .await?;

    if let Some(doc_id) = document_id_filter {
        hits.retain(|h| h.document_id == doc_id);
    }

    let above_floor: Vec<ScoredEntry> = hits
        .iter()
        .filter(|h| h.similarity > MIN_SIMILARITY_THRESHOLD)
        .cloned()
        .collect();

    let mut final_hits = if above_floor.is_empty() {
        hits
    } else {
        above_floor
    };
    final_hits.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap());
    final_hits.truncate(RETRIEVE_TOP_K);
    Ok(final_hits)
}

async fn generate(
    llm: &LlmClient,
    question: &str,
    hits: &[ScoredEntry],
    history: &[HistoryTurn],
) -> anyhow::Result<AnswerResult> {
    if hits.is_empty() {
        return Ok(canned_reply(classify(llm, question).await));
    }

    let sources_block = hits
        .iter()
        .enumerate()
        .map(|(i, h)| {
            format!(
                "[{}] {} (page {}, {}): {}",
                i + 1,
                h.document_name,
                h.page_number,
                h.section_name,
                h.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    let history_block = history
        .iter()
        .rev()
        .take(HISTORY_TURNS)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .map(|t| {
            let role = match t.role {
                MessageRole::User => "User",
                MessageRole::Assistant => "Assistant",
            };
            format!("{}: {}", role, t.content)
        })
        .collect::<Vec<_>>()
        .join("\n");

    let system = format!(
        "You answer questions about contract and procurement documents using only the \
        numbered sources below. Cite sources inline as [Source k] where k is the source \
        number. cited_sources may only contain integers in [1, {}]. Respond with JSON: \
        {{\"answer\":str, \"cited_sources\":[int], \"confidence\":float, \"answer_notes\":str}}.",
        hits.len()
    );
    let user = format!(
        "Conversation so far:\n{}\n\nSources:\n{}\n\nQuestion: {}",
        history_block, sources_block, question
    );

    let response: GenerationResponse = llm.complete_json(&system, &user).await?;

    let (answer, citations) = validate_citations(&response.answer, &response.cited_sources, hits);
    Ok(AnswerResult { answer, citations })
}

async fn classify(llm: &LlmClient, question: &str) -> Classification {
    let system = "Classify the user's message as exactly one of: greeting, needs_context, \
        off_topic. Respond with JSON: {\"classification\":str}.";
    match llm
        .complete_json::<ClassificationResponse>(system, question)
        .await
    {
        Ok(resp) => resp.classification,
        Err(_) => Classification::NeedsContext,
    }
}

/// Degraded answer path used when no LLM is configured: a greeting still
/// gets the greeting reply, everything else falls back to the
/// needs-context canned reply, since classification itself requires the LLM.
pub fn answer_without_llm(question: &str) -> AnswerResult {
    let classification = if is_bare_greeting(question) {
        Classification::Greeting
    } else {
        Classification::NeedsContext
    };
    canned_reply(classification)
}

fn canned_reply(classification: Classification) -> AnswerResult {
    let answer = match classification {
        Classification::Greeting => {
            "Hello! I can help you understand your contracts. Try asking things like \
            \"What are the termination terms?\" or \"Is there a liability cap?\""
                .to_string()
        }
        Classification::OffTopic => {
            "I'm focused on contract and procurement document analysis. Ask me about clauses, \
            obligations, risks, or terms in your uploaded documents."
                .to_string()
        }
        Classification::NeedsContext => {
            "I couldn't find relevant information in the uploaded documents to answer that. \
            Try rephrasing, or upload the document that covers this topic."
                .to_string()
        }
    };
    AnswerResult { answer, citations: Vec::new() }
}

/// The citation safety net: filter `cited_sources` to `[1, N]`, fall back
/// to the top-3 hits when nothing survives, strip out-of-range inline
/// references from the answer text, and normalize remaining references to
/// the bracketed `[Source k]` form.
fn validate_citations(
    raw_answer: &str,
    cited_sources: &[i64],
    hits: &[ScoredEntry],
) -> (String, Vec<Citation>) {
    let n = hits.len() as i64;
    let mut valid: std::collections::BTreeSet<i64> = cited_sources
        .iter()
        .filter(|&&k| k >= 1 && k <= n)
        .copied()
        .collect();

    let discarded: Vec<i64> = cited_sources.iter().filter(|&&k| k < 1 || k > n).copied().collect();
    if !discarded.is_empty() {
        crate::logging::warn(
            "citation_discarded",
            &format!("out-of-range source indices: {:?}", discarded),
        );
    }

    if valid.is_empty() {
        let mut ranked: Vec<(usize, &ScoredEntry)> = hits.iter().enumerate().collect();
        ranked.sort_by(|a, b| b.1.similarity.partial_cmp(&a.1.similarity).unwrap());
        for (i, _) in ranked.into_iter().take(CITATION_FALLBACK_TOP_K) {
            valid.insert((i + 1) as i64);
        }
    }

    let cleaned = strip_invalid_references(raw_answer, &valid, n);

    let citations = valid
        .iter()
        .filter_map(|&k| hits.get((k - 1) as usize))
        .map(|h| Citation {
            document_id: h.document_id.clone(),
            document_name: h.document_name.clone(),
            page_number: h.page_number,
            section_name: h.section_name.clone(),
            text_excerpt: truncate_excerpt(&h.text),
            similarity_score: h.similarity as f64,
            chunk_id: Some(h.chunk_id.clone()),
            bbox: h.bbox,
        })
        .collect();

    (cleaned, citations)
}

/// Scan for `[Source k]` and bare `Source k` references; strip any whose
/// `k` is out of range or not in `valid`, normalize survivors to the
/// bracketed form, then collapse horizontal whitespace runs while
/// preserving paragraph breaks.
fn strip_invalid_references(text: &str, valid: &std::collections::BTreeSet<i64>, n: i64) -> String {
    let mut out = String::with_capacity(text.len());
    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        if let Some((number, consumed, bracketed)) = match_source_reference(&chars[i..]) {
            let in_range = number >= 1 && number <= n;
            if in_range && valid.contains(&number) {
                out.push_str(&format!("[Source {}]", number));
            }
            let _ = bracketed;
            i += consumed;
        } else {
            out.push(chars[i]);
            i += 1;
        }
    }

    collapse_whitespace(&out)
}

/// Matches `[Source k]` or `Source k` starting at the slice head. Returns
/// `(k, chars consumed, was_bracketed)`.
fn match_source_reference(chars: &[char]) -> Option<(i64, usize, bool)> {
    let (bracketed, start) = if chars.first() == Some(&'[') {
        (true, 1)
    } else {
        (false, 0)
    };

    let word: String = "Source".chars().collect();
    let slice_str: String = chars[start..].iter().take(word.len()).collect();
    if slice_str != word {
        return None;
    }

    let mut pos = start + word.len();
    if chars.get(pos) != Some(&' ') {
        return None;
    }
    pos += 1;

    let digits_start = pos;
    while chars.get(pos).map(|c| c.is_ascii_digit()).unwrap_or(false) {
        pos += 1;
    }
    if pos == digits_start {
        return None;
    }
    let number: i64 = chars[digits_start..pos].iter().collect::<String>().parse().ok()?;

    if bracketed {
        if chars.get(pos) != Some(&']') {
            return None;
        }
        pos += 1;
    }

    Some((number, pos, bracketed))
}

fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == ' ' || c == '\t' {
            while matches!(chars.peek(), Some(' ') | Some('\t')) {
                chars.next();
            }
            out.push(' ');
        } else {
            out.push(c);
        }
    }
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(idx: i64, similarity: f32) -> ScoredEntry {
        ScoredEntry {
            chunk_id: format!("c{idx}"),
            document_id: format!("d{idx}"),
            document_name: format!("Doc {idx}"),
            page_number: idx,
            section_name: "Section".to_string(),
            text: "some clause text".to_string(),
            similarity,
            bbox: None,
        }
    }

    #[test]
    fn bare_greeting_detected() {
        assert!(is_bare_greeting("hi"));
        assert!(is_bare_greeting("Hello"));
        assert!(!is_bare_greeting("what are the termination terms?"));
    }

    #[test]
    fn validate_citations_filters_out_of_range() {
        let hits = vec![hit(1, 0.9), hit(2, 0.8)];
        let (_, citations) = validate_citations("See [Source 1] and [Source 9].", &[1, 9], &hits);
        assert_eq!(citations.len(), 1);
        assert_eq!(citations[0].document_id, "d1");
    }

    #[test]
    fn validate_citations_falls_back_to_top3_when_empty() {
        let hits = vec![hit(1, 0.9), hit(2, 0.8), hit(3, 0.7), hit(4, 0.6)];
        let (_, citations) = validate_citations("No valid citations here.", &[], &hits);
        assert_eq!(citations.len(), 3);
    }

    #[test]
    fn strip_invalid_references_removes_out_of_range_and_normalizes() {
        let valid: std::collections::BTreeSet<i64> = [1].into_iter().collect();
        let text = strip_invalid_references("Per [Source 1] and Source 2, terms apply.", &valid, 2);
        assert!(text.contains("[Source 1]"));
        assert!(!text.contains("Source 2"));
    }

    #[test]
    fn collapse_whitespace_preserves_paragraph_breaks() {
        let text = "line one    with   spaces\n\nparagraph two";
        let collapsed = collapse_whitespace(text);
        assert_eq!(collapsed, "line one with spaces\n\nparagraph two");
    }
}
