//! IRDP ingestion core
//!
//! Pulls disclosure documents and macro statistics from external sources,
//! registers them in the canonical document registry, and upserts extracted
//! content into the partitioned Postgres store with idempotent, re-runnable
//! semantics.
//!
//! # Architecture
//!
//! - **config**: environment-driven ingestion configuration (RAW_DIR, API
//!   keys, retry policy)
//! - **adapter**: the source-adapter contract (`FileSource` / `RowSource`)
//!   and the failure-isolating `RowSourceSet` aggregator
//! - **fetcher**: artifact retrieval with readiness polling (temp file,
//!   archive validation, bounded retry, atomic rename)
//! - **edinet** / **tdnet**: concrete file-producing adapters
//! - **providers**: macro statistics row sources (FRED, e-Stat, BOJ) behind
//!   an explicit provider registry
//! - **registry**: content fingerprinting + insert-if-absent document rows
//! - **store**: partitioned fact store (monthly + prefix-bucket partitions,
//!   per-record failure isolation)
//! - **extract**: extraction collaborator contract and fact normalization
//! - **processor**: per-artifact extract-and-store routing
//! - **audit**: structured audit events emitted at phase boundaries
//! - **orchestrator**: the daily run state machine

pub mod adapter;
pub mod audit;
pub mod config;
pub mod edinet;
pub mod extract;
pub mod fetcher;
pub mod orchestrator;
pub mod processor;
pub mod providers;
pub mod registry;
pub mod store;
pub mod tdnet;

pub use adapter::{ArtifactHandle, FileSource, RowSource, RowSourceSet};
pub use audit::{AuditEvent, AuditSink, MemoryAudit, TracingAudit};
pub use config::IngestConfig;
pub use extract::{ExtractError, Extractor, OfflineEngine, RawFact};
pub use fetcher::{ArtifactFetcher, FetchError, HttpTransport, Transport};
pub use orchestrator::{Orchestrator, RunPhase, RunSummary};
pub use processor::{FileProcessor, ProcessOutcome, ProcessStatus};
pub use registry::{ContentRegistry, Registrar};
pub use store::{BatchReport, FactSink, FactStore};
