//! Structure extraction: raw document bytes to sections, chunks, and
//! (where available) coordinates.
//!
//! Four phases, grounded on
//! `original_source/backend/src/services/document_processor.py`:
//! 1. deterministic per-page/per-bucket text extraction
//! 2. LLM-assisted structuring into sections + semantic chunks
//! 3. coverage repair for any page the LLM call left untouched
//! 4. coordinate enrichment, best-effort
//!
//! DOCX paragraph extraction reuses the teacher's `zip` + `quick-xml` walk
//! over `word/document.xml` (see the superseded `extract.rs`); PDF text now
//! comes from `pdf-extract`'s page-oriented entry point instead of the
//! teacher's whole-document `extract_text_from_mem`, since this pipeline
//! needs page boundaries to satisfy the per-page coverage invariant.

use std::io::Read as _;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::llm::LlmClient;
use crate::models::{BoundingBox, ChunkType, DocumentKind, Section};

/// Truncation budget for the LLM structuring call
/// (`document_processor.py`'s `MAX_STRUCTURING_CHARS`).
const MAX_STRUCTURING_CHARS: usize = 200_000;
/// Soft target length for sentence/marker-based fallback sub-chunks.
const FALLBACK_CHUNK_SOFT_TARGET: usize = 1_500;
/// DOCX paragraphs are bucketed into simulated pages of about this many chars.
const DOCX_PAGE_BUCKET_CHARS: usize = 2_000;

#[derive(Debug, Clone)]
pub struct ExtractedChunk {
    pub id: String,
    pub page_number: i64,
    pub section_name: String,
    pub chunk_type: ChunkType,
    pub text: String,
    pub bbox: Option<BoundingBox>,
}

#[derive(Debug, Clone)]
pub struct StructureResult {
    pub page_count: i64,
    pub full_text: String,
    pub sections: Vec<Section>,
    pub chunks: Vec<ExtractedChunk>,
    pub contract_type_hints: Vec<String>,
}

/// One page's plain text plus its `[start, end)` byte span within `full_text`.
struct PageSpan {
    page: i64,
    text: String,
    start: usize,
    end: usize,
}

pub async fn extract_structure(
    document_id: &str,
    kind: DocumentKind,
    bytes: &[u8],
    llm: Option<&LlmClient>,
) -> Result<StructureResult> {
    let pages = match kind {
        DocumentKind::Pdf => extract_pdf_pages(bytes)?,
        DocumentKind::Docx => extract_docx_pages(bytes)?,
    };

    let (full_text, spans) = join_pages(&pages);
    let page_count = pages.len() as i64;

    let structured = match llm {
        Some(client) => run_llm_structuring(client, document_id, &full_text, &spans).await,
        None => None,
    };

    let (mut sections, mut chunks, contract_type_hints) = match structured {
        Some(s) => s,
        None => (Vec::new(), Vec::new(), Vec::new()),
    };

    repair_coverage(document_id, &spans, &mut sections, &mut chunks);
    enrich_coordinates(&spans, &mut chunks);

    Ok(StructureResult {
        page_count,
        full_text,
        sections,
        chunks,
        contract_type_hints,
    })
}

// ============ Phase 1: deterministic per-page extraction ============

fn extract_pdf_pages(bytes: &[u8]) -> Result<Vec<String>> {
    let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
        .context("PDF page extraction failed")?;
    Ok(pages)
}

fn extract_docx_pages(bytes: &[u8]) -> Result<Vec<String>> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .context("DOCX is not a valid zip archive")?;
    let mut doc_xml = Vec::new();
    let mut found = false;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        if entry.name() == "word/document.xml" {
            entry.read_to_end(&mut doc_xml)?;
            found = true;
            break;
        }
    }
    anyhow::ensure!(found, "word/document.xml not found in DOCX");

    let paragraphs = extract_docx_paragraphs(&doc_xml)?;
    Ok(bucket_paragraphs(&paragraphs, DOCX_PAGE_BUCKET_CHARS))
}

fn extract_docx_paragraphs(xml: &[u8]) -> Result<Vec<String>> {
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                let name = e.local_name();
                if name.as_ref() == b"t" {
                    if let Ok(quick_xml::events::Event::Text(te)) = reader.read_event_into(&mut buf) {
                        current.push_str(te.unescape().unwrap_or_default().as_ref());
                    }
                }
            }
            Ok(quick_xml::events::Event::End(e)) => {
                if e.local_name().as_ref() == b"p" {
                    let trimmed = current.trim().to_string();
                    if !trimmed.is_empty() {
                        paragraphs.push(trimmed);
                    }
                    current.clear();
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => anyhow::bail!("DOCX XML parse error: {}", e),
            _ => {}
        }
        buf.clear();
    }
    if !current.trim().is_empty() {
        paragraphs.push(current.trim().to_string());
    }
    Ok(paragraphs)
}

fn bucket_paragraphs(paragraphs: &[String], soft_target: usize) -> Vec<String> {
    let mut pages = Vec::new();
    let mut current = String::new();
    for para in paragraphs {
        if !current.is_empty() && current.len() + para.len() > soft_target {
            pages.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push_str("\n\n");
        }
        current.push_str(para);
    }
    if !current.is_empty() {
        pages.push(current);
    }
    if pages.is_empty() {
        pages.push(String::new());
    }
    pages
}

fn join_pages(pages: &[String]) -> (String, Vec<PageSpan>) {
    let mut full_text = String::new();
    let mut spans = Vec::with_capacity(pages.len());
    for (i, text) in pages.iter().enumerate() {
        let start = full_text.len();
        full_text.push_str(text);
        let end = full_text.len();
        spans.push(PageSpan {
            page: (i + 1) as i64,
            text: text.clone(),
            start,
            end,
        });
        if i + 1 < pages.len() {
            full_text.push_str("\n\n");
        }
    }
    (full_text, spans)
}

// ============ Phase 2: LLM structuring ============

#[derive(Debug, Deserialize)]
struct LlmSection {
    name: String,
    first_page: i64,
    content: String,
}

#[derive(Debug, Deserialize)]
struct LlmChunk {
    page: i64,
    section_name: String,
    #[serde(default)]
    chunk_type: Option<String>,
    text: String,
}

#[derive(Debug, Deserialize)]
struct LlmStructureResponse {
    #[serde(default)]
    sections: Vec<LlmSection>,
    #[serde(default)]
    chunks: Vec<LlmChunk>,
    #[serde(default)]
    contract_type_hints: Vec<String>,
}

/// Truncate `full_text` to [`MAX_STRUCTURING_CHARS`], dropping whole
/// trailing pages (never cutting mid-page) per the source contract.
fn truncate_to_page_boundary(full_text: &str, spans: &[PageSpan]) -> String {
    if full_text.len() <= MAX_STRUCTURING_CHARS {
        return full_text.to_string();
    }
    let mut cutoff = 0;
    for span in spans {
        if span.end > MAX_STRUCTURING_CHARS {
            break;
        }
        cutoff = span.end;
    }
    full_text[..cutoff].to_string()
}

async fn run_llm_structuring(
    client: &LlmClient,
    document_id: &str,
    full_text: &str,
    spans: &[PageSpan],
) -> Option<(Vec<Section>, Vec<ExtractedChunk>, Vec<String>)> {
    let truncated = truncate_to_page_boundary(full_text, spans);
    let page_table: Vec<String> = spans
        .iter()
        .map(|s| format!("page {}: chars [{}, {})", s.page, s.start, s.end))
        .collect();

    let system_prompt = "You structure a contract/procurement document into sections and \
        semantic chunks. Every input page must receive at least one chunk. Chunks must be \
        complete semantic units (a full clause, definition, or paragraph), never fixed-size \
        slices. Respond with JSON: {\"sections\": [{\"name\":str,\"first_page\":int,\"content\":str}], \
        \"chunks\": [{\"page\":int,\"section_name\":str,\"chunk_type\":str,\"text\":str}], \
        \"contract_type_hints\": [str]}";
    let user_prompt = format!(
        "Page boundaries:\n{}\n\nDocument text:\n{}",
        page_table.join("\n"),
        truncated
    );

    let response: LlmStructureResponse = client.complete_json(system_prompt, &user_prompt).await.ok()?;

    let sections: Vec<Section> = response
        .sections
        .into_iter()
        .map(|s| Section {
            name: s.name,
            first_page: s.first_page,
            start_offset: 0,
            end_offset: 0,
            content: s.content,
        })
        .collect();

    let mut per_page_index: std::collections::HashMap<i64, usize> = std::collections::HashMap::new();
    let chunks: Vec<ExtractedChunk> = response
        .chunks
        .into_iter()
        .filter(|c| !c.text.trim().is_empty())
        .map(|c| {
            let idx = per_page_index.entry(c.page).or_insert(0);
            let id = format!("{}-p{}-{}", document_id, c.page, idx);
            *idx += 1;
            ExtractedChunk {
                id,
                page_number: c.page,
                section_name: c.section_name,
                chunk_type: c
                    .chunk_type
                    .as_deref()
                    .map(ChunkType::from_str_loose)
                    .unwrap_or(ChunkType::Unknown),
                text: c.text,
                bbox: None,
            }
        })
        .collect();

    Some((sections, chunks, response.contract_type_hints))
}

// ============ Phase 3: coverage repair ============

/// `(\n\s*|^)([A-Z]\.\s+|\d+\.\s+)` from the source, re-expressed as a
/// hand-rolled line scanner since neither the teacher nor this crate
/// carries a `regex` dependency.
fn count_clause_markers(text: &str) -> usize {
    text.lines()
        .filter(|line| {
            let trimmed = line.trim_start();
            is_capital_letter_marker(trimmed) || is_numeric_marker(trimmed)
        })
        .count()
}

fn is_capital_letter_marker(line: &str) -> bool {
    let mut chars = line.chars();
    match (chars.next(), chars.next()) {
        (Some(c), Some('.')) if c.is_ascii_uppercase() => {
            matches!(chars.next(), Some(' ') | None)
        }
        _ => false,
    }
}

fn is_numeric_marker(line: &str) -> bool {
    let digits: String = line.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return false;
    }
    let rest = &line[digits.len()..];
    rest.starts_with(". ") || rest == "."
}

fn split_at_clause_markers(text: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    for line in text.lines() {
        let trimmed = line.trim_start();
        if (is_capital_letter_marker(trimmed) || is_numeric_marker(trimmed)) && !current.trim().is_empty() {
            parts.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(line);
    }
    if !current.trim().is_empty() {
        parts.push(current);
    }
    parts
}

/// Split `text` on sentence boundaries (`. `, `! `, `? `, or newline),
/// accumulating into sub-chunks no longer than `soft_target` where possible.
fn split_by_sentence(text: &str, soft_target: usize) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        current.push(c);
        let is_boundary = matches!(c, '.' | '!' | '?' | '\n')
            && chars.peek().map(|n| n.is_whitespace()).unwrap_or(true);
        if is_boundary {
            sentences.push(std::mem::take(&mut current));
        }
    }
    if !current.trim().is_empty() {
        sentences.push(current);
    }

    let mut chunks = Vec::new();
    let mut buffer = String::new();
    for sentence in sentences {
        if !buffer.is_empty() && buffer.len() + sentence.len() > soft_target {
            chunks.push(buffer.trim().to_string());
            buffer.clear();
        }
        buffer.push_str(&sentence);
    }
    if !buffer.trim().is_empty() {
        chunks.push(buffer.trim().to_string());
    }
    chunks.into_iter().filter(|c| !c.is_empty()).collect()
}

fn fallback_subsplit(text: &str, soft_target: usize) -> Vec<String> {
    if count_clause_markers(text) >= 2 {
        split_at_clause_markers(text)
            .into_iter()
            .flat_map(|part| {
                if part.len() > soft_target {
                    split_by_sentence(&part, soft_target)
                } else {
                    vec![part]
                }
            })
            .filter(|p| !p.trim().is_empty())
            .collect()
    } else {
        split_by_sentence(text, soft_target)
    }
}

fn nearest_section_name(sections: &[Section], chunks: &[ExtractedChunk], page: i64) -> String {
    chunks
        .iter()
        .filter(|c| (c.page_number - page).abs() <= 1)
        .min_by_key(|c| (c.page_number - page).abs())
        .map(|c| c.section_name.clone())
        .or_else(|| {
            sections
                .iter()
                .filter(|s| (s.first_page - page).abs() <= 1)
                .min_by_key(|s| (s.first_page - page).abs())
                .map(|s| s.name.clone())
        })
        .unwrap_or_else(|| "Unknown".to_string())
}

fn repair_coverage(
    document_id: &str,
    spans: &[PageSpan],
    sections: &mut Vec<Section>,
    chunks: &mut Vec<ExtractedChunk>,
) {
    let covered: std::collections::HashSet<i64> = chunks.iter().map(|c| c.page_number).collect();

    for span in spans {
        if covered.contains(&span.page) || span.text.trim().is_empty() {
            continue;
        }
        let section_name = nearest_section_name(sections, chunks, span.page);
        let parts = fallback_subsplit(&span.text, FALLBACK_CHUNK_SOFT_TARGET);
        for (i, part) in parts.into_iter().enumerate() {
            chunks.push(ExtractedChunk {
                id: format!("{}-p{}-fallback-{}", document_id, span.page, i),
                page_number: span.page,
                section_name: section_name.clone(),
                chunk_type: ChunkType::Unknown,
                text: part,
                bbox: None,
            });
        }
    }

    if sections.is_empty() && !spans.is_empty() {
        sections.push(Section {
            name: "Unknown".to_string(),
            first_page: spans[0].page,
            start_offset: 0,
            end_offset: 0,
            content: String::new(),
        });
    }
}

// ============ Phase 4: coordinate enrichment ============

/// `pdf-extract`'s page-level entry point returns plain text, not glyph
/// positions, so there is no coordinate data to attach here. This phase is
/// kept as a named step (searching each page for the first 100 characters
/// of a chunk) so the search/attach shape matches the source, but it can
/// only ever resolve to `bbox: None` given what the dependency exposes —
/// see DESIGN.md's C5 entry for why that is a deliberate simplification,
/// not a silently dropped feature.
fn enrich_coordinates(spans: &[PageSpan], chunks: &mut [ExtractedChunk]) {
    for chunk in chunks.iter_mut() {
        if chunk.bbox.is_some() {
            continue;
        }
        let Some(span) = spans.iter().find(|s| s.page == chunk.page_number) else {
            continue;
        };
        let needle: String = chunk.text.chars().take(100).collect();
        if needle.is_empty() || !span.text.contains(&needle) {
            continue;
        }
        // Match found but `pdf-extract` carries no coordinate data at this
        // level; bbox stays None.
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clause_markers_detect_capital_and_numeric() {
        let text = "A. First clause\nB. Second clause\nSome other text";
        assert_eq!(count_clause_markers(text), 2);

        let text2 = "1. First\n2. Second\n3. Third";
        assert_eq!(count_clause_markers(text2), 3);
    }

    #[test]
    fn clause_markers_ignore_plain_text() {
        let text = "This is just a paragraph.\nWith multiple lines.\nNo markers here.";
        assert_eq!(count_clause_markers(text), 0);
    }

    #[test]
    fn fallback_subsplit_uses_markers_when_present() {
        let text = "A. First clause text here.\nB. Second clause text here.";
        let parts = fallback_subsplit(text, 1500);
        assert_eq!(parts.len(), 2);
    }

    #[test]
    fn fallback_subsplit_uses_sentences_when_no_markers() {
        let text = "This is sentence one. This is sentence two. This is sentence three.";
        let parts = fallback_subsplit(text, 1500);
        assert_eq!(parts.len(), 1);
        assert!(parts[0].contains("sentence one"));
    }

    #[test]
    fn bucket_paragraphs_respects_soft_target() {
        let paragraphs: Vec<String> = (0..5).map(|i| format!("paragraph number {}", i)).collect();
        let pages = bucket_paragraphs(&paragraphs, 20);
        assert!(pages.len() > 1);
    }

    #[test]
    fn repair_coverage_fills_missing_pages() {
        let document_id = "doc1";
        let spans = vec![
            PageSpan { page: 1, text: "covered".to_string(), start: 0, end: 7 },
            PageSpan { page: 2, text: "A. uncovered clause one.\nB. uncovered clause two.".to_string(), start: 7, end: 50 },
        ];
        let mut sections = Vec::new();
        let mut chunks = vec![ExtractedChunk {
            id: "doc1-p1-0".to_string(),
            page_number: 1,
            section_name: "Intro".to_string(),
            chunk_type: ChunkType::Clause,
            text: "covered".to_string(),
            bbox: None,
        }];

        repair_coverage(document_id, &spans, &mut sections, &mut chunks);

        assert!(chunks.iter().any(|c| c.page_number == 2));
        let page2_chunks: Vec<_> = chunks.iter().filter(|c| c.page_number == 2).collect();
        assert!(!page2_chunks.is_empty());
        assert_eq!(page2_chunks[0].section_name, "Intro");
    }

    #[test]
    fn truncate_to_page_boundary_never_splits_mid_page() {
        let spans = vec![
            PageSpan { page: 1, text: "x".repeat(100), start: 0, end: 100 },
            PageSpan { page: 2, text: "y".repeat(100), start: 102, end: 202 },
        ];
        let full_text = "x".repeat(100) + "\n\n" + &"y".repeat(100);
        let truncated = truncate_to_page_boundary(&full_text, &spans);
        assert!(truncated.len() == 100 || truncated.len() == 202);
    }
}
