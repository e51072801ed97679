//! Extraction collaborator contract
//!
//! Structured archives and text documents are turned into rows by an
//! external extraction engine reached through the [`Extractor`] trait. The
//! engine is an optional collaborator: when it is not installed the
//! orchestrator skips extraction for the affected documents and keeps the
//! run alive.

use async_trait::async_trait;
use irdp_common::types::StructuredFact;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::warn;

#[derive(Debug, Error)]
pub enum ExtractError {
    /// The extraction engine is not installed or not reachable. Documents
    /// hit by this are skipped without being marked failed.
    #[error("extraction engine unavailable: {0}")]
    EngineUnavailable(String),

    /// The input artifact itself is broken. Only the affected document is
    /// dropped.
    #[error("malformed artifact {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// One raw fact as the engine reports it, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFact {
    pub name: String,
    pub context: String,
    pub unit: Option<String>,
    pub decimals: Option<String>,
    pub value: Option<String>,
}

/// Extraction engine seam. Implementations run whatever tooling turns an
/// archive into facts or a document into page texts.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Pull raw facts out of a structured archive.
    async fn extract_structured(&self, path: &Path) -> Result<Vec<RawFact>, ExtractError>;

    /// Pull per-page text out of a text document, in page order.
    async fn extract_text(&self, path: &Path) -> Result<Vec<String>, ExtractError>;
}

/// Placeholder engine for deployments without extraction tooling installed.
/// Every call reports the engine unavailable, which the processor maps to a
/// neutral skip.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineEngine;

#[async_trait]
impl Extractor for OfflineEngine {
    async fn extract_structured(&self, _path: &Path) -> Result<Vec<RawFact>, ExtractError> {
        Err(ExtractError::EngineUnavailable(
            "no structured extraction engine configured".to_string(),
        ))
    }

    async fn extract_text(&self, _path: &Path) -> Result<Vec<String>, ExtractError> {
        Err(ExtractError::EngineUnavailable(
            "no text extraction engine configured".to_string(),
        ))
    }
}

/// Normalize raw engine output into storable facts. Non-numeric values are
/// dropped (narrative members, nil facts), a missing unit becomes "N/A",
/// and decimals that do not parse as an integer are treated as unspecified.
pub fn normalize_facts(doc_id: &str, raw: &[RawFact]) -> Vec<StructuredFact> {
    let mut facts = Vec::new();
    for fact in raw {
        let Some(value) = fact.value.as_ref().and_then(|v| v.trim().parse::<f64>().ok()) else {
            continue;
        };
        facts.push(StructuredFact {
            doc_id: doc_id.to_string(),
            item: fact.name.clone(),
            context: fact.context.clone(),
            unit: fact.unit.clone().unwrap_or_else(|| "N/A".to_string()),
            decimals: fact.decimals.as_ref().and_then(|d| d.trim().parse::<i32>().ok()),
            value,
        });
    }
    facts
}

/// Apply a blocking per-page function to every page concurrently, bounded
/// by the host's available parallelism, preserving page order in the output.
pub async fn map_pages_ordered<T, F>(pages: Vec<String>, f: F) -> Vec<T>
where
    T: Send + 'static,
    F: Fn(usize, String) -> T + Send + Sync + 'static,
{
    let permits = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4);
    let semaphore = Arc::new(Semaphore::new(permits));
    let f = Arc::new(f);

    let mut set = JoinSet::new();
    for (index, page) in pages.into_iter().enumerate() {
        let semaphore = semaphore.clone();
        let f = f.clone();
        set.spawn(async move {
            // closed only on shutdown, never mid-run
            let _permit = semaphore.acquire_owned().await;
            let result = tokio::task::spawn_blocking(move || f(index, page)).await;
            (index, result)
        });
    }

    let mut slots: Vec<Option<T>> = Vec::new();
    while let Some(joined) = set.join_next().await {
        let Ok((index, result)) = joined else {
            continue;
        };
        match result {
            Ok(value) => {
                if slots.len() <= index {
                    slots.resize_with(index + 1, || None);
                }
                slots[index] = Some(value);
            },
            Err(e) => {
                warn!(page = index, error = %e, "Page task panicked; dropping page");
            },
        }
    }
    slots.into_iter().flatten().collect()
}
