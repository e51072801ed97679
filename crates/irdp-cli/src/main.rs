//! IRDP CLI - Main entry point

use anyhow::Context;
use chrono::NaiveDate;
use clap::Parser;
use irdp_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use irdp_ingest::providers::ProviderRegistry;
use irdp_ingest::registry::ContentRegistry;
use irdp_ingest::store::FactStore;
use irdp_ingest::{
    FileProcessor, FileSource, HttpTransport, IngestConfig, OfflineEngine, Orchestrator,
    TracingAudit, Transport,
};
use sqlx::postgres::PgPoolOptions;
use std::process;
use std::sync::Arc;
use tracing::{error, info};

const DEFAULT_DATABASE_URL: &str = "postgresql://localhost/irdp";

/// Disclosure and macro-statistics ingestion runner.
#[derive(Debug, Parser)]
#[command(name = "irdp", version, about)]
struct Cli {
    /// First publication date to ingest (YYYY-MM-DD)
    #[arg(long)]
    since: NaiveDate,

    /// Number of consecutive days to ingest
    #[arg(long, default_value_t = 1)]
    days: u32,

    /// Log at debug level to the console
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    // .env is optional; missing file is not an error
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let log_config = if cli.verbose {
        LogConfig::builder()
            .level(LogLevel::Debug)
            .output(LogOutput::Console)
            .log_file_prefix("irdp".to_string())
            .build()
    } else {
        LogConfig::from_env().unwrap_or_default()
    };
    let _ = init_logging(&log_config);

    if let Err(e) = run(&cli).await {
        error!(error = %e, "Ingestion run failed");
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

async fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = IngestConfig::from_env().context("Invalid ingestion configuration")?;

    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await
        .context("Failed to connect to Postgres")?;

    let store = FactStore::new(pool.clone());
    store.ensure_base_tables().await?;

    let transport: Arc<dyn Transport> =
        Arc::new(HttpTransport::new().context("Failed to build HTTP client")?);

    let file_sources: Vec<Box<dyn FileSource>> = vec![
        Box::new(irdp_ingest::edinet::EdinetSource::new(
            config.edinet.clone(),
            config.fetch.clone(),
            config.raw_dir.clone(),
            transport.clone(),
        )),
        Box::new(irdp_ingest::tdnet::TdnetSource::new(
            config.tdnet.clone(),
            config.fetch.clone(),
            config.raw_dir.clone(),
            transport.clone(),
        )),
    ];

    let row_sources =
        ProviderRegistry::with_defaults().build(&config.macros, transport.clone());

    let sink = Arc::new(store);
    let processor = FileProcessor::new(Arc::new(OfflineEngine), sink.clone());
    let orchestrator = Orchestrator::new(
        file_sources,
        row_sources,
        Arc::new(ContentRegistry::new(pool)),
        sink,
        processor,
        Arc::new(TracingAudit),
    );

    let summary = orchestrator.run_since(cli.since, cli.days).await?;
    info!(
        days = summary.days_processed,
        registered = summary.documents_registered,
        processed = summary.documents_processed,
        skipped = summary.documents_skipped,
        failed = summary.documents_failed,
        facts = summary.facts_stored,
        pages = summary.pages_stored,
        macro_rows = summary.macro_rows_stored,
        "Run complete"
    );
    Ok(())
}
