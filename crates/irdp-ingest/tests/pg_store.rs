//! Postgres integration tests for the partitioned store and registry.
//!
//! These need a live database; run them explicitly with
//! `DATABASE_URL=postgresql://localhost/irdp_test cargo test -- --ignored`.

use chrono::NaiveDate;
use irdp_ingest::adapter::ArtifactHandle;
use irdp_ingest::registry::{ContentRegistry, Registrar};
use irdp_ingest::store::{self, FactSink, FactStore};
use irdp_common::types::{DocKind, MacroPoint, Source, StructuredFact, TextPage};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};

async fn test_pool() -> PgPool {
    let url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "postgresql://localhost/irdp_test".to_string());
    PgPoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await
        .expect("test database reachable")
}

fn fact(doc_id: &str, item: &str, value: f64) -> StructuredFact {
    StructuredFact {
        doc_id: doc_id.to_string(),
        item: item.to_string(),
        context: "CurrentYearDuration".to_string(),
        unit: "JPY".to_string(),
        decimals: Some(-3),
        value,
    }
}

#[tokio::test]
#[ignore]
async fn test_registration_is_idempotent() {
    let pool = test_pool().await;
    let store = FactStore::new(pool.clone());
    store.ensure_base_tables().await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("S100REG1.zip");
    std::fs::write(&path, b"artifact bytes").unwrap();

    let handle = ArtifactHandle {
        doc_id: "S100REG1".to_string(),
        source: Source::Edinet,
        kind: DocKind::Structured,
        doc_type: "120".to_string(),
        path,
    };
    let day = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();

    let registry = ContentRegistry::new(pool.clone());
    let first = registry.register(&handle, day).await.unwrap();
    let second = registry.register(&handle, day).await.unwrap();
    assert_eq!(first.content_hash, second.content_hash);

    let count: i64 =
        sqlx::query_scalar("SELECT count(*) FROM documents WHERE doc_id = 'S100REG1'")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
#[ignore]
async fn test_fact_upsert_overwrites_on_conflict() {
    let pool = test_pool().await;
    let store = FactStore::new(pool.clone());
    store.ensure_base_tables().await.unwrap();

    let report = store
        .upsert_facts(&[fact("S100UPS1", "NetSales", 100.0)])
        .await
        .unwrap();
    assert_eq!(report.stored, 1);

    let report = store
        .upsert_facts(&[fact("S100UPS1", "NetSales", 250.0)])
        .await
        .unwrap();
    assert_eq!(report.stored, 1);

    let row = sqlx::query(
        "SELECT value FROM xbrl_facts WHERE doc_id = 'S100UPS1' AND item = 'NetSales'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    let value: f64 = row.get("value");
    assert_eq!(value, 250.0);
}

#[tokio::test]
#[ignore]
async fn test_bucket_partitions_created_per_prefix() {
    let pool = test_pool().await;
    let store = FactStore::new(pool.clone());
    store.ensure_base_tables().await.unwrap();

    store
        .upsert_facts(&[
            fact("A100PART", "NetSales", 1.0),
            fact("M100PART", "NetSales", 2.0),
            fact("Z100PART", "NetSales", 3.0),
        ])
        .await
        .unwrap();

    for partition in ["xbrl_facts_a", "xbrl_facts_m", "xbrl_facts_z"] {
        let exists: bool =
            sqlx::query_scalar("SELECT to_regclass($1) IS NOT NULL")
                .bind(partition)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert!(exists, "expected partition {}", partition);
    }
}

#[tokio::test]
#[ignore]
async fn test_concurrent_same_prefix_partition_creation() {
    let pool = test_pool().await;
    let store = FactStore::new(pool.clone());
    store.ensure_base_tables().await.unwrap();

    // both tasks race to create xbrl_facts_q; the loser hits 42P07 and
    // must treat it as success
    let a = store::ensure_bucket_partition(&pool, "xbrl_facts", 'Q');
    let b = store::ensure_bucket_partition(&pool, "xbrl_facts", 'Q');
    let (ra, rb) = tokio::join!(a, b);
    ra.unwrap();
    rb.unwrap();
}

#[tokio::test]
#[ignore]
async fn test_batch_isolates_malformed_records() {
    let pool = test_pool().await;
    let store = FactStore::new(pool.clone());
    store.ensure_base_tables().await.unwrap();

    let mut batch: Vec<StructuredFact> = (0..4)
        .map(|i| fact("S100ISO1", &format!("Item{}", i), i as f64))
        .collect();
    batch.push(fact("_badid", "NetSales", 9.0)); // no bucket for '_'

    let report = store.upsert_facts(&batch).await.unwrap();
    assert_eq!(report.stored, 4);
    assert_eq!(report.rejected.len(), 1);
    assert_eq!(report.rejected[0].key, "_badid");
}

#[tokio::test]
#[ignore]
async fn test_page_and_macro_upserts() {
    let pool = test_pool().await;
    let store = FactStore::new(pool.clone());
    store.ensure_base_tables().await.unwrap();

    let pages = vec![TextPage {
        doc_id: "081220240701501".to_string(),
        page_no: 1,
        text: "page text".to_string(),
        avg_confidence: 0.0,
        error_flag: false,
        error_type: None,
    }];
    let report = store.upsert_pages(&pages).await.unwrap();
    assert_eq!(report.stored, 1);

    let points = vec![MacroPoint {
        series_id: "T10Y2Y".to_string(),
        ts_date: NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(),
        value: 0.42,
        src: "FRED".to_string(),
    }];
    let report = store.upsert_macro(&points).await.unwrap();
    assert_eq!(report.stored, 1);
    // corrections overwrite
    let report = store
        .upsert_macro(&[MacroPoint {
            value: 0.43,
            ..points[0].clone()
        }])
        .await
        .unwrap();
    assert_eq!(report.stored, 1);
}
