//! Partitioned fact store
//!
//! All content tables live in Postgres under declarative partitioning:
//! `documents` is range-partitioned by publication month, `xbrl_facts` and
//! `pdf_texts` by the first character of `doc_id`. Partitions are created
//! on demand right before the rows that need them, so a fresh database
//! needs no migration step beyond [`FactStore::ensure_base_tables`].
//!
//! Upserts are idempotent (`ON CONFLICT .. DO UPDATE`) and isolated per
//! record: one bad row is reported in the batch outcome, the rest land.

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use irdp_common::types::{MacroPoint, StructuredFact, TextPage};
use sqlx::PgPool;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// SQLSTATE for "relation already exists". Concurrent partition creation
/// races resolve here.
const DUPLICATE_TABLE: &str = "42P07";

/// Outcome of one upsert batch.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct BatchReport {
    pub stored: usize,
    pub rejected: Vec<RejectedRecord>,
}

/// One record that did not make it, with enough context to find it again.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedRecord {
    pub key: String,
    pub reason: String,
}

impl BatchReport {
    fn accept(&mut self) {
        self.stored += 1;
    }

    fn reject(&mut self, key: String, reason: String) {
        warn!(key, reason, "Record rejected during upsert");
        self.rejected.push(RejectedRecord { key, reason });
    }
}

/// Storage seam for extracted content and macro rows.
#[async_trait]
pub trait FactSink: Send + Sync {
    async fn upsert_facts(&self, facts: &[StructuredFact]) -> anyhow::Result<BatchReport>;
    async fn upsert_pages(&self, pages: &[TextPage]) -> anyhow::Result<BatchReport>;
    async fn upsert_macro(&self, points: &[MacroPoint]) -> anyhow::Result<BatchReport>;
}

// ============================================================================
// Partition arithmetic
// ============================================================================

/// `documents_y2024m07` for July 2024.
pub fn month_partition_name(month: NaiveDate) -> String {
    format!("documents_y{}m{:02}", month.year(), month.month())
}

/// Half-open `[first of month, first of next month)` bounds.
pub fn month_bounds(month: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
    let lower = NaiveDate::from_ymd_opt(month.year(), month.month(), 1)?;
    let upper = if month.month() == 12 {
        NaiveDate::from_ymd_opt(month.year() + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(month.year(), month.month() + 1, 1)?
    };
    Some((lower, upper))
}

/// Bucket key for a `doc_id`: the upper-cased first character. Identifiers
/// not starting with an ASCII letter or digit have no bucket and are
/// rejected as malformed upstream.
pub fn prefix_bucket(doc_id: &str) -> Option<char> {
    let first = doc_id.chars().next()?;
    if first.is_ascii_alphanumeric() {
        Some(first.to_ascii_uppercase())
    } else {
        None
    }
}

/// `xbrl_facts_s` for bucket 'S'.
pub fn bucket_partition_name(table: &str, bucket: char) -> String {
    format!("{}_{}", table, bucket.to_ascii_lowercase())
}

/// Half-open text-range bounds for a bucket. The upper bound is the next
/// ASCII code point, so 'Z' maps to '[' and '9' to ':'.
pub fn bucket_bounds(bucket: char) -> (char, char) {
    (bucket, ((bucket as u8) + 1) as char)
}

fn is_duplicate_table(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| code == DUPLICATE_TABLE)
}

async fn create_partition(pool: &PgPool, ddl: &str, name: &str) -> anyhow::Result<()> {
    match sqlx::query(ddl).execute(pool).await {
        Ok(_) => {
            debug!(partition = name, "Partition ready");
            Ok(())
        },
        Err(e) if is_duplicate_table(&e) => {
            // lost a creation race, the partition exists
            Ok(())
        },
        Err(e) => Err(e.into()),
    }
}

/// Create the monthly `documents` partition covering `month` if missing.
pub async fn ensure_month_partition(pool: &PgPool, month: NaiveDate) -> anyhow::Result<()> {
    let Some((lower, upper)) = month_bounds(month) else {
        anyhow::bail!("Cannot compute month bounds for {}", month);
    };
    let name = month_partition_name(month);
    let ddl = format!(
        "CREATE TABLE IF NOT EXISTS {name} PARTITION OF documents \
         FOR VALUES FROM ('{lower}') TO ('{upper}')"
    );
    create_partition(pool, &ddl, &name).await
}

/// Create the prefix-bucket partition of `table` for `bucket` if missing.
pub async fn ensure_bucket_partition(
    pool: &PgPool,
    table: &str,
    bucket: char,
) -> anyhow::Result<()> {
    let name = bucket_partition_name(table, bucket);
    let (lower, upper) = bucket_bounds(bucket);
    let ddl = format!(
        "CREATE TABLE IF NOT EXISTS {name} PARTITION OF {table} \
         FOR VALUES FROM ('{lower}') TO ('{upper}')"
    );
    create_partition(pool, &ddl, &name).await
}

// ============================================================================
// FactStore
// ============================================================================

pub struct FactStore {
    pool: PgPool,
}

impl FactStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the partitioned parent tables. Partitions themselves are
    /// created lazily when data arrives.
    pub async fn ensure_base_tables(&self) -> anyhow::Result<()> {
        // doc_id alone identifies a document; pub_date rides in the key
        // because the partition column must be part of it
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                doc_id          TEXT NOT NULL,
                source          TEXT NOT NULL,
                doc_type        TEXT NOT NULL,
                pub_date        DATE NOT NULL,
                file_path       TEXT NOT NULL,
                content_hash    TEXT NOT NULL,
                size_bytes      BIGINT NOT NULL,
                has_structured  BOOLEAN NOT NULL DEFAULT FALSE,
                has_text        BOOLEAN NOT NULL DEFAULT FALSE,
                registered_at   TIMESTAMPTZ NOT NULL DEFAULT now(),
                PRIMARY KEY (doc_id, pub_date)
            ) PARTITION BY RANGE (pub_date)
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS xbrl_facts (
                doc_id      TEXT NOT NULL,
                item        TEXT NOT NULL,
                context     TEXT NOT NULL,
                unit        TEXT NOT NULL,
                decimals    INTEGER,
                value       DOUBLE PRECISION NOT NULL,
                PRIMARY KEY (doc_id, item, context, unit)
            ) PARTITION BY RANGE (doc_id)
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS pdf_texts (
                doc_id          TEXT NOT NULL,
                page_no         INTEGER NOT NULL,
                text            TEXT NOT NULL,
                avg_confidence  DOUBLE PRECISION NOT NULL DEFAULT 0,
                error_flag      BOOLEAN NOT NULL DEFAULT FALSE,
                error_type      TEXT,
                PRIMARY KEY (doc_id, page_no)
            ) PARTITION BY RANGE (doc_id)
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS macro_series (
                series_id   TEXT NOT NULL,
                ts_date     DATE NOT NULL,
                value       DOUBLE PRECISION NOT NULL,
                src         TEXT NOT NULL,
                PRIMARY KEY (series_id, ts_date)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        info!("Base tables ready");
        Ok(())
    }

    /// Create bucket partitions for every distinct `doc_id` prefix in the
    /// batch, rejecting records whose prefix has no bucket.
    async fn ensure_buckets_for<'a, I>(
        &self,
        table: &str,
        doc_ids: I,
        report: &mut BatchReport,
    ) -> anyhow::Result<BTreeSet<char>>
    where
        I: Iterator<Item = &'a str>,
    {
        let mut buckets = BTreeSet::new();
        for doc_id in doc_ids {
            match prefix_bucket(doc_id) {
                Some(bucket) => {
                    buckets.insert(bucket);
                },
                None => {
                    report.reject(
                        doc_id.to_string(),
                        "doc_id does not start with an ASCII letter or digit".to_string(),
                    );
                },
            }
        }
        for bucket in &buckets {
            ensure_bucket_partition(&self.pool, table, *bucket).await?;
        }
        Ok(buckets)
    }
}

#[async_trait]
impl FactSink for FactStore {
    async fn upsert_facts(&self, facts: &[StructuredFact]) -> anyhow::Result<BatchReport> {
        let mut report = BatchReport::default();
        self.ensure_buckets_for("xbrl_facts", facts.iter().map(|f| f.doc_id.as_str()), &mut report)
            .await?;

        for fact in facts {
            if prefix_bucket(&fact.doc_id).is_none() {
                continue; // already rejected above
            }
            let result = sqlx::query(
                r#"
                INSERT INTO xbrl_facts (doc_id, item, context, unit, decimals, value)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (doc_id, item, context, unit)
                DO UPDATE SET decimals = EXCLUDED.decimals, value = EXCLUDED.value
                "#,
            )
            .bind(&fact.doc_id)
            .bind(&fact.item)
            .bind(&fact.context)
            .bind(&fact.unit)
            .bind(fact.decimals)
            .bind(fact.value)
            .execute(&self.pool)
            .await;

            match result {
                Ok(_) => report.accept(),
                Err(e) => report.reject(
                    format!("{}/{}/{}", fact.doc_id, fact.item, fact.context),
                    e.to_string(),
                ),
            }
        }
        Ok(report)
    }

    async fn upsert_pages(&self, pages: &[TextPage]) -> anyhow::Result<BatchReport> {
        let mut report = BatchReport::default();
        self.ensure_buckets_for("pdf_texts", pages.iter().map(|p| p.doc_id.as_str()), &mut report)
            .await?;

        for page in pages {
            if prefix_bucket(&page.doc_id).is_none() {
                continue;
            }
            let result = sqlx::query(
                r#"
                INSERT INTO pdf_texts (doc_id, page_no, text, avg_confidence, error_flag, error_type)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (doc_id, page_no)
                DO UPDATE SET
                    text = EXCLUDED.text,
                    avg_confidence = EXCLUDED.avg_confidence,
                    error_flag = EXCLUDED.error_flag,
                    error_type = EXCLUDED.error_type
                "#,
            )
            .bind(&page.doc_id)
            .bind(page.page_no)
            .bind(&page.text)
            .bind(page.avg_confidence)
            .bind(page.error_flag)
            .bind(&page.error_type)
            .execute(&self.pool)
            .await;

            match result {
                Ok(_) => report.accept(),
                Err(e) => {
                    report.reject(format!("{}#{}", page.doc_id, page.page_no), e.to_string())
                },
            }
        }
        Ok(report)
    }

    async fn upsert_macro(&self, points: &[MacroPoint]) -> anyhow::Result<BatchReport> {
        let mut report = BatchReport::default();
        for point in points {
            let result = sqlx::query(
                r#"
                INSERT INTO macro_series (series_id, ts_date, value, src)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (series_id, ts_date)
                DO UPDATE SET value = EXCLUDED.value, src = EXCLUDED.src
                "#,
            )
            .bind(&point.series_id)
            .bind(point.ts_date)
            .bind(point.value)
            .bind(&point.src)
            .execute(&self.pool)
            .await;

            match result {
                Ok(_) => report.accept(),
                Err(e) => report.reject(
                    format!("{}@{}", point.series_id, point.ts_date),
                    e.to_string(),
                ),
            }
        }
        Ok(report)
    }
}
