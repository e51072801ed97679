//! Content registry
//!
//! One row per registered document. Registration is insert-if-absent on the
//! logical key `doc_id`: re-running a day never duplicates rows or mutates
//! what an earlier run recorded. The content fingerprint and size are
//! computed from the artifact on disk at registration time.

use crate::adapter::ArtifactHandle;
use crate::store;
use async_trait::async_trait;
use chrono::NaiveDate;
use irdp_common::fingerprint::fingerprint_file;
use irdp_common::types::{DocKind, Document};
use sqlx::PgPool;
use tracing::debug;

/// Registration seam, stubbed in orchestrator tests.
#[async_trait]
pub trait Registrar: Send + Sync {
    /// Record `handle` as a document published on `pub_date`. Idempotent:
    /// registering the same `doc_id` again is a no-op that still returns
    /// the document row that was (or already had been) written.
    async fn register(
        &self,
        handle: &ArtifactHandle,
        pub_date: NaiveDate,
    ) -> anyhow::Result<Document>;
}

pub struct ContentRegistry {
    pool: PgPool,
}

impl ContentRegistry {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Registrar for ContentRegistry {
    async fn register(
        &self,
        handle: &ArtifactHandle,
        pub_date: NaiveDate,
    ) -> anyhow::Result<Document> {
        let path = handle.path.clone();
        let content_hash = tokio::task::spawn_blocking(move || fingerprint_file(&path)).await??;
        let size_bytes = tokio::fs::metadata(&handle.path).await?.len() as i64;

        let document = Document {
            doc_id: handle.doc_id.clone(),
            source: handle.source,
            doc_type: handle.doc_type.clone(),
            pub_date,
            file_path: handle.path.to_string_lossy().into_owned(),
            content_hash,
            size_bytes,
            has_structured: handle.kind == DocKind::Structured,
            has_text: handle.kind == DocKind::Text,
        };

        store::ensure_month_partition(&self.pool, pub_date).await?;

        let result = sqlx::query(
            r#"
            INSERT INTO documents (
                doc_id, source, doc_type, pub_date, file_path,
                content_hash, size_bytes, has_structured, has_text
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (doc_id, pub_date) DO NOTHING
            "#,
        )
        .bind(&document.doc_id)
        .bind(document.source.as_str())
        .bind(&document.doc_type)
        .bind(document.pub_date)
        .bind(&document.file_path)
        .bind(&document.content_hash)
        .bind(document.size_bytes)
        .bind(document.has_structured)
        .bind(document.has_text)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            debug!(doc_id = document.doc_id, "Document already registered; skipping insert");
        } else {
            debug!(doc_id = document.doc_id, hash = document.content_hash, "Document registered");
        }

        Ok(document)
    }
}
