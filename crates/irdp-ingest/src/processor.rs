//! Per-artifact processing
//!
//! Routes one downloaded artifact through extraction and into the store,
//! mapping extraction failures to a per-document outcome so one broken
//! artifact never takes down the day.

use crate::adapter::ArtifactHandle;
use crate::extract::{map_pages_ordered, normalize_facts, ExtractError, Extractor};
use crate::store::FactSink;
use irdp_common::types::{DocKind, TextPage};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessStatus {
    Processed,
    /// Extraction engine not installed; the document stays registered and
    /// unprocessed.
    SkippedEngineUnavailable,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessOutcome {
    pub doc_id: String,
    pub status: ProcessStatus,
    pub fact_count: usize,
    pub page_count: usize,
}

impl ProcessOutcome {
    fn new(doc_id: &str, status: ProcessStatus) -> Self {
        Self {
            doc_id: doc_id.to_string(),
            status,
            fact_count: 0,
            page_count: 0,
        }
    }
}

pub struct FileProcessor {
    extractor: Arc<dyn Extractor>,
    sink: Arc<dyn FactSink>,
}

impl FileProcessor {
    pub fn new(extractor: Arc<dyn Extractor>, sink: Arc<dyn FactSink>) -> Self {
        Self { extractor, sink }
    }

    /// Extract and store the content of one artifact.
    pub async fn process(&self, handle: &ArtifactHandle) -> ProcessOutcome {
        let result = match handle.kind {
            DocKind::Structured => self.process_structured(handle).await,
            DocKind::Text => self.process_text(handle).await,
        };

        match result {
            Ok(outcome) => outcome,
            Err(ExtractError::EngineUnavailable(reason)) => {
                debug!(doc_id = handle.doc_id, reason, "Extraction engine unavailable; skipping");
                ProcessOutcome::new(&handle.doc_id, ProcessStatus::SkippedEngineUnavailable)
            },
            Err(e) => {
                warn!(doc_id = handle.doc_id, error = %e, "Document processing failed");
                ProcessOutcome::new(&handle.doc_id, ProcessStatus::Failed(e.to_string()))
            },
        }
    }

    async fn process_structured(
        &self,
        handle: &ArtifactHandle,
    ) -> Result<ProcessOutcome, ExtractError> {
        let raw = self.extractor.extract_structured(&handle.path).await?;
        let facts = normalize_facts(&handle.doc_id, &raw);

        let report = match self.sink.upsert_facts(&facts).await {
            Ok(report) => report,
            Err(e) => {
                return Ok(ProcessOutcome::new(
                    &handle.doc_id,
                    ProcessStatus::Failed(e.to_string()),
                ))
            },
        };

        Ok(ProcessOutcome {
            doc_id: handle.doc_id.clone(),
            status: ProcessStatus::Processed,
            fact_count: report.stored,
            page_count: 0,
        })
    }

    async fn process_text(&self, handle: &ArtifactHandle) -> Result<ProcessOutcome, ExtractError> {
        let texts = self.extractor.extract_text(&handle.path).await?;

        let doc_id = handle.doc_id.clone();
        let pages: Vec<TextPage> = map_pages_ordered(texts, move |index, text| TextPage {
            doc_id: doc_id.clone(),
            page_no: index as i32 + 1,
            text,
            avg_confidence: 0.0,
            error_flag: false,
            error_type: None,
        })
        .await;

        let report = match self.sink.upsert_pages(&pages).await {
            Ok(report) => report,
            Err(e) => {
                return Ok(ProcessOutcome::new(
                    &handle.doc_id,
                    ProcessStatus::Failed(e.to_string()),
                ))
            },
        };

        Ok(ProcessOutcome {
            doc_id: handle.doc_id.clone(),
            status: ProcessStatus::Processed,
            fact_count: 0,
            page_count: report.stored,
        })
    }
}
