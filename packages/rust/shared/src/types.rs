//! Core domain types for LexRisk analyses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Opaque key naming a calling user. Only ever used for partitioning.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identity {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Identity {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// ---------------------------------------------------------------------------
// Document / Chunk
// ---------------------------------------------------------------------------

/// An uploaded document, already decoded to plain text.
#[derive(Debug, Clone)]
pub struct Document {
    /// Original file name, echoed in the report.
    pub filename: String,
    /// Extracted text.
    pub text: String,
}

impl Document {
    pub fn new(filename: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            text: text.into(),
        }
    }

    /// Length in Unicode scalar values.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// An ordered fragment of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// 1-based position within the document.
    pub index: usize,
    pub text: String,
}

impl Chunk {
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

// ---------------------------------------------------------------------------
// DocumentType
// ---------------------------------------------------------------------------

/// Closed set of document categories produced by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentType {
    #[serde(rename = "Договор")]
    Contract,
    #[serde(rename = "Приказ")]
    Order,
    #[serde(rename = "Постановление")]
    Resolution,
    #[serde(rename = "Закон")]
    Law,
    #[serde(rename = "Решение")]
    Decision,
    #[serde(rename = "Неизвестно")]
    Unknown,
}

impl DocumentType {
    /// Human-facing label, also used as the stored value.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Contract => "Договор",
            Self::Order => "Приказ",
            Self::Resolution => "Постановление",
            Self::Law => "Закон",
            Self::Decision => "Решение",
            Self::Unknown => "Неизвестно",
        }
    }

    /// Inverse of [`DocumentType::label`]. Unrecognized labels map to `Unknown`.
    pub fn from_label(label: &str) -> Self {
        match label {
            "Договор" => Self::Contract,
            "Приказ" => Self::Order,
            "Постановление" => Self::Resolution,
            "Закон" => Self::Law,
            "Решение" => Self::Decision,
            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// AnalysisReport
// ---------------------------------------------------------------------------

/// Result of a successful analysis job. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    /// Per-chunk analyses joined in order.
    pub analysis: String,
    pub document_type: DocumentType,
    pub filename: String,
    /// Completion time.
    pub timestamp: DateTime<Utc>,
    /// Number of chunks the document was split into.
    pub chunk_count: usize,
}

// ---------------------------------------------------------------------------
// AnalysisRecord
// ---------------------------------------------------------------------------

/// A persisted history entry for one completed analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRecord {
    /// Unique record identifier (UUID v7).
    pub id: String,
    /// Owner of the analysis.
    pub identity: Identity,
    pub filename: String,
    pub document_type: DocumentType,
    pub analysis: String,
    /// SHA-256 of the raw document text.
    pub content_hash: String,
    /// Raw document length in characters.
    pub content_len: usize,
    pub created_at: DateTime<Utc>,
}

impl AnalysisRecord {
    /// Build a history record from a finished report and the text it analyzed.
    pub fn from_report(identity: &Identity, report: &AnalysisReport, raw_text: &str) -> Self {
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            identity: identity.clone(),
            filename: report.filename.clone(),
            document_type: report.document_type,
            analysis: report.analysis.clone(),
            content_hash: content_hash(raw_text),
            content_len: raw_text.chars().count(),
            created_at: report.timestamp,
        }
    }
}

/// Hex-encoded SHA-256 of `text`.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
