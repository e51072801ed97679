//! End-to-end orchestrator run over in-memory collaborators.

use async_trait::async_trait;
use chrono::NaiveDate;
use irdp_ingest::adapter::{ArtifactHandle, FileSource, RowSource, RowSourceSet};
use irdp_ingest::extract::{ExtractError, Extractor, RawFact};
use irdp_ingest::processor::FileProcessor;
use irdp_ingest::registry::Registrar;
use irdp_ingest::store::{BatchReport, FactSink};
use irdp_ingest::{MemoryAudit, Orchestrator};
use irdp_common::types::{
    DocKind, Document, MacroPoint, Source, StructuredFact, TextPage,
};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

struct FixedSource {
    source: Source,
    handles: Vec<ArtifactHandle>,
}

#[async_trait]
impl FileSource for FixedSource {
    fn name(&self) -> &str {
        match self.source {
            Source::Edinet => "edinet",
            Source::Tdnet => "tdnet",
        }
    }

    fn source(&self) -> Source {
        self.source
    }

    async fn fetch(&self, _target_date: NaiveDate) -> anyhow::Result<Vec<ArtifactHandle>> {
        Ok(self.handles.clone())
    }
}

struct FailingSource;

#[async_trait]
impl FileSource for FailingSource {
    fn name(&self) -> &str {
        "tdnet"
    }

    fn source(&self) -> Source {
        Source::Tdnet
    }

    async fn fetch(&self, _target_date: NaiveDate) -> anyhow::Result<Vec<ArtifactHandle>> {
        anyhow::bail!("listing endpoint unreachable")
    }
}

#[derive(Default)]
struct FakeRegistry {
    registered: Mutex<Vec<String>>,
}

#[async_trait]
impl Registrar for FakeRegistry {
    async fn register(
        &self,
        handle: &ArtifactHandle,
        pub_date: NaiveDate,
    ) -> anyhow::Result<Document> {
        self.registered.lock().unwrap().push(handle.doc_id.clone());
        Ok(Document {
            doc_id: handle.doc_id.clone(),
            source: handle.source,
            doc_type: handle.doc_type.clone(),
            pub_date,
            file_path: handle.path.to_string_lossy().into_owned(),
            content_hash: "0".repeat(64),
            size_bytes: 1,
            has_structured: handle.kind == DocKind::Structured,
            has_text: handle.kind == DocKind::Text,
        })
    }
}

#[derive(Default)]
struct MemorySink {
    facts: Mutex<Vec<StructuredFact>>,
    pages: Mutex<Vec<TextPage>>,
    macros: Mutex<Vec<MacroPoint>>,
}

#[async_trait]
impl FactSink for MemorySink {
    async fn upsert_facts(&self, facts: &[StructuredFact]) -> anyhow::Result<BatchReport> {
        self.facts.lock().unwrap().extend_from_slice(facts);
        Ok(BatchReport {
            stored: facts.len(),
            rejected: Vec::new(),
        })
    }

    async fn upsert_pages(&self, pages: &[TextPage]) -> anyhow::Result<BatchReport> {
        self.pages.lock().unwrap().extend_from_slice(pages);
        Ok(BatchReport {
            stored: pages.len(),
            rejected: Vec::new(),
        })
    }

    async fn upsert_macro(&self, points: &[MacroPoint]) -> anyhow::Result<BatchReport> {
        self.macros.lock().unwrap().extend_from_slice(points);
        Ok(BatchReport {
            stored: points.len(),
            rejected: Vec::new(),
        })
    }
}

/// Two facts per structured archive, three pages per text document.
struct CannedExtractor;

#[async_trait]
impl Extractor for CannedExtractor {
    async fn extract_structured(&self, _path: &Path) -> Result<Vec<RawFact>, ExtractError> {
        Ok(vec![
            RawFact {
                name: "NetSales".to_string(),
                context: "CurrentYearDuration".to_string(),
                unit: Some("JPY".to_string()),
                decimals: Some("-3".to_string()),
                value: Some("1000".to_string()),
            },
            RawFact {
                name: "OperatingIncome".to_string(),
                context: "CurrentYearDuration".to_string(),
                unit: Some("JPY".to_string()),
                decimals: None,
                value: Some("200".to_string()),
            },
        ])
    }

    async fn extract_text(&self, _path: &Path) -> Result<Vec<String>, ExtractError> {
        Ok(vec![
            "page one".to_string(),
            "page two".to_string(),
            "page three".to_string(),
        ])
    }
}

struct FixedMacro;

#[async_trait]
impl RowSource for FixedMacro {
    fn name(&self) -> &str {
        "fred:T10Y2Y"
    }

    async fn fetch(&self, target_date: NaiveDate) -> anyhow::Result<Vec<MacroPoint>> {
        Ok(vec![MacroPoint {
            series_id: "T10Y2Y".to_string(),
            ts_date: target_date,
            value: 0.42,
            src: "FRED".to_string(),
        }])
    }
}

fn handle(doc_id: &str, kind: DocKind) -> ArtifactHandle {
    ArtifactHandle {
        doc_id: doc_id.to_string(),
        source: Source::Edinet,
        kind,
        doc_type: "120".to_string(),
        path: PathBuf::from(format!("/tmp/{}", doc_id)),
    }
}

#[tokio::test]
async fn test_full_day_run_with_source_failure_isolated() {
    let day = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();

    let edinet = FixedSource {
        source: Source::Edinet,
        handles: vec![
            handle("S100AAAA", DocKind::Structured),
            handle("S100BBBB", DocKind::Text),
        ],
    };

    let mut rows = RowSourceSet::new();
    rows.push(Box::new(FixedMacro));

    let registry = Arc::new(FakeRegistry::default());
    let sink = Arc::new(MemorySink::default());
    let audit = Arc::new(MemoryAudit::new());
    let processor = FileProcessor::new(Arc::new(CannedExtractor), sink.clone());

    let orchestrator = Orchestrator::new(
        vec![Box::new(edinet), Box::new(FailingSource)],
        rows,
        registry.clone(),
        sink.clone(),
        processor,
        audit.clone(),
    );

    let summary = orchestrator.run_since(day, 1).await.unwrap();

    assert_eq!(summary.days_processed, 1);
    assert_eq!(summary.documents_registered, 2);
    assert_eq!(summary.documents_processed, 2);
    assert_eq!(summary.documents_failed, 0);
    assert_eq!(summary.facts_stored, 2);
    assert_eq!(summary.pages_stored, 3);
    assert_eq!(summary.macro_rows_stored, 1);

    assert_eq!(
        registry.registered.lock().unwrap().as_slice(),
        ["S100AAAA", "S100BBBB"]
    );
    assert_eq!(sink.facts.lock().unwrap().len(), 2);
    assert_eq!(sink.pages.lock().unwrap().len(), 3);
    assert_eq!(sink.macros.lock().unwrap().len(), 1);

    let events = audit.events();

    // the broken source surfaced as an audit warning, not a run failure
    assert!(events
        .iter()
        .any(|e| e.component == "tdnet" && e.action == "source_unavailable"));

    let day_summary = events
        .iter()
        .find(|e| e.action == "day_summary")
        .expect("day summary event");
    assert_eq!(day_summary.detail["edinet_processed"], 2);
    assert_eq!(day_summary.detail["tdnet_processed"], 0);
    assert_eq!(day_summary.detail["total_xbrl_facts"], 2);
    assert_eq!(day_summary.detail["total_pdf_pages"], 3);

    // phase events arrive strictly in pipeline order
    let phases: Vec<&str> = events
        .iter()
        .filter(|e| e.action == "phase_change")
        .map(|e| e.detail["phase"].as_str().unwrap())
        .collect();
    assert_eq!(
        phases,
        [
            "fetching",
            "registering",
            "extracting",
            "storing",
            "macro_upsert",
            "completed"
        ]
    );
}

#[tokio::test]
async fn test_multi_day_run_counts_each_day() {
    let day = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();

    let edinet = FixedSource {
        source: Source::Edinet,
        handles: vec![handle("S100AAAA", DocKind::Structured)],
    };

    let registry = Arc::new(FakeRegistry::default());
    let sink = Arc::new(MemorySink::default());
    let audit = Arc::new(MemoryAudit::new());
    let processor = FileProcessor::new(Arc::new(CannedExtractor), sink.clone());

    let orchestrator = Orchestrator::new(
        vec![Box::new(edinet)],
        RowSourceSet::new(),
        registry,
        sink,
        processor,
        audit.clone(),
    );

    let summary = orchestrator.run_since(day, 3).await.unwrap();
    assert_eq!(summary.days_processed, 3);
    assert_eq!(summary.documents_registered, 3);
    assert_eq!(summary.facts_stored, 6);

    let day_summaries = audit
        .events()
        .iter()
        .filter(|e| e.action == "day_summary")
        .count();
    assert_eq!(day_summaries, 3);
}
