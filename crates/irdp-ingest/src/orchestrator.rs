//! Ingestion orchestrator
//!
//! Drives one run over a date range: for each day, fetch artifacts from
//! every file source, register them, extract and store their content, then
//! upsert the day's macro rows. Phases only ever move forward; a failed
//! item is counted and skipped, never retried within the run.

use crate::adapter::{ArtifactHandle, FileSource, RowSourceSet};
use crate::audit::{AuditEvent, AuditSink};
use crate::processor::{FileProcessor, ProcessStatus};
use crate::registry::Registrar;
use crate::store::FactSink;
use chrono::{Days, NaiveDate};
use irdp_common::types::Source;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Phases of one ingestion day, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RunPhase {
    Started,
    Fetching,
    Registering,
    Extracting,
    Storing,
    MacroUpsert,
    Completed,
}

impl RunPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunPhase::Started => "started",
            RunPhase::Fetching => "fetching",
            RunPhase::Registering => "registering",
            RunPhase::Extracting => "extracting",
            RunPhase::Storing => "storing",
            RunPhase::MacroUpsert => "macro_upsert",
            RunPhase::Completed => "completed",
        }
    }
}

/// Forward-only phase tracker. Advancing backwards (or standing still) is a
/// programming error and aborts the run.
struct PhaseTracker {
    current: RunPhase,
}

impl PhaseTracker {
    fn new() -> Self {
        Self {
            current: RunPhase::Started,
        }
    }

    fn advance(&mut self, next: RunPhase) -> anyhow::Result<RunPhase> {
        if next <= self.current {
            anyhow::bail!(
                "Illegal phase transition {} -> {}",
                self.current.as_str(),
                next.as_str()
            );
        }
        self.current = next;
        Ok(next)
    }
}

/// Aggregate counters for one run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub days_processed: u32,
    pub documents_registered: usize,
    pub documents_processed: usize,
    pub documents_skipped: usize,
    pub documents_failed: usize,
    pub registration_failures: usize,
    pub facts_stored: usize,
    pub pages_stored: usize,
    pub macro_rows_stored: usize,
}

pub struct Orchestrator {
    file_sources: Vec<Box<dyn FileSource>>,
    row_sources: RowSourceSet,
    registrar: Arc<dyn Registrar>,
    sink: Arc<dyn FactSink>,
    processor: FileProcessor,
    audit: Arc<dyn AuditSink>,
}

impl Orchestrator {
    pub fn new(
        file_sources: Vec<Box<dyn FileSource>>,
        row_sources: RowSourceSet,
        registrar: Arc<dyn Registrar>,
        sink: Arc<dyn FactSink>,
        processor: FileProcessor,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            file_sources,
            row_sources,
            registrar,
            sink,
            processor,
            audit,
        }
    }

    /// Run ingestion for `days` consecutive days starting at `since`.
    /// Re-running any range is safe: registration and all upserts are
    /// idempotent.
    pub async fn run_since(&self, since: NaiveDate, days: u32) -> anyhow::Result<RunSummary> {
        let run_id = Uuid::new_v4();
        info!(%run_id, %since, days, "Starting ingestion run");
        self.audit.record(AuditEvent::info(
            "orchestrator",
            "run_started",
            json!({ "run_id": run_id, "since": since, "days": days }),
        ));

        let mut summary = RunSummary::default();
        for offset in 0..days {
            let Some(day) = since.checked_add_days(Days::new(offset as u64)) else {
                anyhow::bail!("Date overflow computing day {} after {}", offset, since);
            };
            self.run_day(run_id, day, &mut summary).await?;
            summary.days_processed += 1;
        }

        self.audit.record(AuditEvent::info(
            "orchestrator",
            "run_completed",
            json!({
                "run_id": run_id,
                "days_processed": summary.days_processed,
                "documents_registered": summary.documents_registered,
                "documents_processed": summary.documents_processed,
            }),
        ));
        info!(%run_id, ?summary, "Ingestion run finished");
        Ok(summary)
    }

    async fn run_day(
        &self,
        run_id: Uuid,
        day: NaiveDate,
        summary: &mut RunSummary,
    ) -> anyhow::Result<()> {
        let mut tracker = PhaseTracker::new();

        // Fetch from every file source. A source-level failure contributes
        // zero items for the day; the run keeps going.
        self.enter_phase(run_id, day, &mut tracker, RunPhase::Fetching)?;
        let mut handles: Vec<ArtifactHandle> = Vec::new();
        for source in &self.file_sources {
            match source.fetch(day).await {
                Ok(mut fetched) => {
                    info!(source = source.name(), date = %day, count = fetched.len(), "Source fetch complete");
                    self.audit.record(AuditEvent::info(
                        source.name(),
                        "source_fetched",
                        json!({ "run_id": run_id, "date": day, "items": fetched.len() }),
                    ));
                    handles.append(&mut fetched);
                },
                Err(e) => {
                    warn!(source = source.name(), date = %day, error = %e, "Source unavailable; contributing zero items");
                    self.audit.record(AuditEvent::warn(
                        source.name(),
                        "source_unavailable",
                        json!({ "run_id": run_id, "date": day, "error": e.to_string() }),
                    ));
                },
            }
        }

        self.enter_phase(run_id, day, &mut tracker, RunPhase::Registering)?;
        let mut registered: Vec<ArtifactHandle> = Vec::new();
        for handle in handles {
            match self.registrar.register(&handle, day).await {
                Ok(_) => {
                    summary.documents_registered += 1;
                    registered.push(handle);
                },
                Err(e) => {
                    warn!(doc_id = handle.doc_id, error = %e, "Registration failed; skipping document");
                    summary.registration_failures += 1;
                },
            }
        }

        self.enter_phase(run_id, day, &mut tracker, RunPhase::Extracting)?;
        self.enter_phase(run_id, day, &mut tracker, RunPhase::Storing)?;
        let mut edinet_processed = 0usize;
        let mut tdnet_processed = 0usize;
        let mut day_facts = 0usize;
        let mut day_pages = 0usize;
        for handle in &registered {
            let outcome = self.processor.process(handle).await;
            match outcome.status {
                ProcessStatus::Processed => {
                    summary.documents_processed += 1;
                    match handle.source {
                        Source::Edinet => edinet_processed += 1,
                        Source::Tdnet => tdnet_processed += 1,
                    }
                },
                ProcessStatus::SkippedEngineUnavailable => summary.documents_skipped += 1,
                ProcessStatus::Failed(_) => summary.documents_failed += 1,
            }
            day_facts += outcome.fact_count;
            day_pages += outcome.page_count;
        }
        summary.facts_stored += day_facts;
        summary.pages_stored += day_pages;

        self.enter_phase(run_id, day, &mut tracker, RunPhase::MacroUpsert)?;
        let points = self.row_sources.fetch_all(day).await;
        let macro_report = self.sink.upsert_macro(&points).await?;
        summary.macro_rows_stored += macro_report.stored;

        self.enter_phase(run_id, day, &mut tracker, RunPhase::Completed)?;
        self.audit.record(AuditEvent::info(
            "orchestrator",
            "day_summary",
            json!({
                "run_id": run_id,
                "date": day,
                "edinet_processed": edinet_processed,
                "tdnet_processed": tdnet_processed,
                "total_xbrl_facts": day_facts,
                "total_pdf_pages": day_pages,
                "macro_rows": macro_report.stored,
            }),
        ));
        Ok(())
    }

    fn enter_phase(
        &self,
        run_id: Uuid,
        day: NaiveDate,
        tracker: &mut PhaseTracker,
        next: RunPhase,
    ) -> anyhow::Result<()> {
        let phase = tracker.advance(next)?;
        self.audit.record(AuditEvent::info(
            "orchestrator",
            "phase_change",
            json!({ "run_id": run_id, "date": day, "phase": phase.as_str() }),
        ));
        Ok(())
    }
}
