//! Core data types shared across the pipeline and the HTTP surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Pdf,
    Docx,
}

impl DocumentKind {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(DocumentKind::Pdf),
            "docx" => Some(DocumentKind::Docx),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            DocumentKind::Pdf => "pdf",
            DocumentKind::Docx => "docx",
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Uploaded,
    Processing,
    Processed,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct Workspace {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub id: String,
    pub workspace_id: String,
    pub display_name: String,
    pub original_filename: String,
    pub storage_path: String,
    pub kind: DocumentKind,
    pub size_bytes: i64,
    pub page_count: Option<i64>,
    pub status: DocumentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Bounding box on one page, in PDF user-space coordinates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BoundingBox {
    pub page: i64,
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkType {
    Clause,
    Definition,
    Header,
    Table,
    Unknown,
}

impl ChunkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkType::Clause => "clause",
            ChunkType::Definition => "definition",
            ChunkType::Header => "header",
            ChunkType::Table => "table",
            ChunkType::Unknown => "unknown",
        }
    }

    pub fn from_str_loose(s: &str) -> ChunkType {
        match s.trim().to_ascii_lowercase().as_str() {
            "clause" => ChunkType::Clause,
            "definition" => ChunkType::Definition,
            "header" => ChunkType::Header,
            "table" => ChunkType::Table,
            _ => ChunkType::Unknown,
        }
    }
}

/// The "type" discriminator required alongside chunk type on every vector
/// entry: whether the embedded text is a structural chunk or an extracted
/// clause. Distinct from [`ChunkType`], which only classifies chunks.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Chunk,
    Clause,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Chunk => "chunk",
            EntryKind::Clause => "clause",
        }
    }

    pub fn from_str_loose(s: &str) -> EntryKind {
        match s.trim().to_ascii_lowercase().as_str() {
            "clause" => EntryKind::Clause,
            _ => EntryKind::Chunk,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub page_number: i64,
    pub section_name: String,
    pub chunk_type: ChunkType,
    pub text: String,
    pub bbox: Option<BoundingBox>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Section {
    pub name: String,
    pub first_page: i64,
    pub start_offset: usize,
    pub end_offset: usize,
    pub content: String,
}

/// Closed clause-type enumeration (21 named values + `Other`).
/// Grounded verbatim on `original_source/backend/src/services/clause_extractor.py`.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum ClauseType {
    Termination,
    Payment,
    Liability,
    Indemnification,
    IntellectualProperty,
    Confidentiality,
    DisputeResolution,
    ForceMajeure,
    Compliance,
    Insurance,
    Warranties,
    LimitationOfDamages,
    DataPrivacy,
    NonCompete,
    Assignment,
    GoverningLaw,
    Notices,
    Amendment,
    Severability,
    EntireAgreement,
    Definitions,
    Other,
}

impl ClauseType {
    pub const ALL: &'static [ClauseType] = &[
        ClauseType::Termination,
        ClauseType::Payment,
        ClauseType::Liability,
        ClauseType::Indemnification,
        ClauseType::IntellectualProperty,
        ClauseType::Confidentiality,
        ClauseType::DisputeResolution,
        ClauseType::ForceMajeure,
        ClauseType::Compliance,
        ClauseType::Insurance,
        ClauseType::Warranties,
        ClauseType::LimitationOfDamages,
        ClauseType::DataPrivacy,
        ClauseType::NonCompete,
        ClauseType::Assignment,
        ClauseType::GoverningLaw,
        ClauseType::Notices,
        ClauseType::Amendment,
        ClauseType::Severability,
        ClauseType::EntireAgreement,
        ClauseType::Definitions,
        ClauseType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ClauseType::Termination => "Termination",
            ClauseType::Payment => "Payment",
            ClauseType::Liability => "Liability",
            ClauseType::Indemnification => "Indemnification",
            ClauseType::IntellectualProperty => "Intellectual Property",
            ClauseType::Confidentiality => "Confidentiality",
            ClauseType::DisputeResolution => "Dispute Resolution",
            ClauseType::ForceMajeure => "Force Majeure",
            ClauseType::Compliance => "Compliance",
            ClauseType::Insurance => "Insurance",
            ClauseType::Warranties => "Warranties",
            ClauseType::LimitationOfDamages => "Limitation of Damages",
            ClauseType::DataPrivacy => "Data Privacy",
            ClauseType::NonCompete => "Non-Compete",
            ClauseType::Assignment => "Assignment",
            ClauseType::GoverningLaw => "Governing Law",
            ClauseType::Notices => "Notices",
            ClauseType::Amendment => "Amendment",
            ClauseType::Severability => "Severability",
            ClauseType::EntireAgreement => "Entire Agreement",
            ClauseType::Definitions => "Definitions",
            ClauseType::Other => "Other",
        }
    }

    pub fn from_str_loose(s: &str) -> ClauseType {
        Self::ALL
            .iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .copied()
            .unwrap_or(ClauseType::Other)
    }
}

/// Exact flag strings (`original_source/backend/src/services/clause_extractor.py`).
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskFlag {
    UnfavorableTermination,
    HighLiability,
    UnfairPaymentTerms,
    WeakIndemnification,
    IpRisk,
    ComplianceRisk,
    DataPrivacyRisk,
    ExcessivePenalties,
    OneSidedTerms,
    UnclearLanguage,
    MissingProtections,
}

impl RiskFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskFlag::UnfavorableTermination => "unfavorable_termination",
            RiskFlag::HighLiability => "high_liability",
            RiskFlag::UnfairPaymentTerms => "unfair_payment_terms",
            RiskFlag::WeakIndemnification => "weak_indemnification",
            RiskFlag::IpRisk => "ip_risk",
            RiskFlag::ComplianceRisk => "compliance_risk",
            RiskFlag::DataPrivacyRisk => "data_privacy_risk",
            RiskFlag::ExcessivePenalties => "excessive_penalties",
            RiskFlag::OneSidedTerms => "one_sided_terms",
            RiskFlag::UnclearLanguage => "unclear_language",
            RiskFlag::MissingProtections => "missing_protections",
        }
    }

    pub fn from_str_loose(s: &str) -> Option<RiskFlag> {
        let norm = s.trim().to_ascii_lowercase();
        [
            RiskFlag::UnfavorableTermination,
            RiskFlag::HighLiability,
            RiskFlag::UnfairPaymentTerms,
            RiskFlag::WeakIndemnification,
            RiskFlag::IpRisk,
            RiskFlag::ComplianceRisk,
            RiskFlag::DataPrivacyRisk,
            RiskFlag::ExcessivePenalties,
            RiskFlag::OneSidedTerms,
            RiskFlag::UnclearLanguage,
            RiskFlag::MissingProtections,
        ]
        .into_iter()
        .find(|f| f.as_str() == norm)
    }
}

/// Risk band for a `risk_score` in `[0,100]`.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum RiskBand {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskBand {
    pub fn for_score(score: f64) -> RiskBand {
        match score as i64 {
            0..=24 => RiskBand::Low,
            25..=49 => RiskBand::Medium,
            50..=74 => RiskBand::High,
            _ => RiskBand::Critical,
        }
    }

    /// Canned sentence used when the LLM returns a blank `risk_reasoning`.
    pub fn default_reasoning(&self) -> &'static str {
        match self {
            RiskBand::Low => "Standard, low-risk provision; no significant concerns identified.",
            RiskBand::Medium => "Moderate risk provision; review recommended but not unusual for this contract type.",
            RiskBand::High => "Elevated risk provision with terms that may disadvantage one party; legal review advised.",
            RiskBand::Critical => "Critical risk provision; terms are significantly unfavorable or ambiguous and warrant immediate attention.",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Clause {
    pub id: String,
    pub document_id: String,
    pub clause_type: ClauseType,
    pub clause_subtype: Option<String>,
    pub extracted_text: String,
    pub page_number: i64,
    pub section_name: String,
    pub confidence_score: f64,
    pub risk_score: f64,
    pub risk_flags: Vec<RiskFlag>,
    pub risk_reasoning: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Conversation {
    pub id: String,
    pub workspace_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize)]
pub struct Citation {
    pub document_id: String,
    pub document_name: String,
    pub page_number: i64,
    pub section_name: String,
    pub text_excerpt: String,
    pub similarity_score: f64,
    pub chunk_id: Option<String>,
    pub bbox: Option<BoundingBox>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub index: i64,
    pub role: MessageRole,
    pub content: String,
    pub citations: Vec<Citation>,
    pub created_at: DateTime<Utc>,
}

/// Maximum length of a citation's stored text excerpt.
pub const CITATION_EXCERPT_MAX: usize = 500;

pub fn truncate_excerpt(text: &str) -> String {
    if text.chars().count() <= CITATION_EXCERPT_MAX {
        text.to_string()
    } else {
        text.chars().take(CITATION_EXCERPT_MAX).collect()
    }
}
