//! Shared domain types for the disclosure registry

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// External disclosure source a document was fetched from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Source {
    /// EDINET filing registry (ZIP/XBRL and PDF documents)
    Edinet,
    /// TDnet disclosure feed (PDF documents)
    Tdnet,
}

impl Source {
    /// Stable tag stored in the `documents.source` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Edinet => "EDINET",
            Source::Tdnet => "TDnet",
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What kind of extractable payload a document artifact carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocKind {
    /// Structured instance document (XBRL inside a ZIP archive)
    Structured,
    /// Free-text document (PDF), extracted page by page
    Text,
}

/// One registered disclosure document. Append-only: rows are written once on
/// first successful fetch and never updated by the ingestion core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Source-assigned identifier, unique across the registry
    pub doc_id: String,
    pub source: Source,
    pub doc_type: String,
    /// Publication date; monthly partition key
    pub pub_date: NaiveDate,
    /// Content-addressed location under the raw storage root
    pub file_path: String,
    /// SHA-256 fingerprint, lowercase hex
    pub content_hash: String,
    pub size_bytes: i64,
    pub has_structured: bool,
    pub has_text: bool,
}

/// One normalized data point extracted from a structured artifact.
/// Keyed by `(doc_id, item, context, unit)`; re-ingestion overwrites
/// `value` and `decimals`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredFact {
    pub doc_id: String,
    pub item: String,
    pub context: String,
    pub unit: String,
    pub decimals: Option<i32>,
    pub value: f64,
}

/// One page of free text extracted from an unstructured artifact.
/// Keyed by `(doc_id, page_no)`; re-extraction overwrites.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextPage {
    pub doc_id: String,
    /// 1-based page number
    pub page_no: i32,
    pub text: String,
    pub avg_confidence: f64,
    pub error_flag: bool,
    pub error_type: Option<String>,
}

/// One time-series observation from an external statistics provider.
/// Keyed by `(series_id, ts_date)`; provider corrections overwrite `value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacroPoint {
    pub series_id: String,
    pub ts_date: NaiveDate,
    pub value: f64,
    /// Provider tag, e.g. "FRED", "eStat", "BOJ-STAT"
    pub src: String,
}
