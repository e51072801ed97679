//! EDINET filing registry adapter
//!
//! Lists the day's filings via `documents.json`, filters to in-scope issuer
//! filings before any artifact download, and routes each item: filings with
//! an XBRL instance go to the retrying structured path (the registry
//! announces documents before their ZIP is generated), everything else to
//! the single-attempt PDF path.

use crate::adapter::{ArtifactHandle, FileSource};
use crate::config::{EdinetConfig, FetchConfig};
use crate::fetcher::{ArtifactFetcher, Transport};
use async_trait::async_trait;
use chrono::NaiveDate;
use irdp_common::types::{DocKind, Source};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Listing response for one day.
#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    results: Vec<ListedDoc>,
}

/// One document's listing metadata. Flag fields are the registry's
/// string-encoded booleans ("1"/"0").
#[derive(Debug, Clone, Deserialize)]
pub struct ListedDoc {
    #[serde(rename = "docID")]
    pub doc_id: Option<String>,
    #[serde(rename = "docTypeCode")]
    pub doc_type_code: Option<String>,
    #[serde(rename = "xbrlFlag")]
    pub xbrl_flag: Option<String>,
    #[serde(rename = "fundCode")]
    pub fund_code: Option<String>,
}

impl ListedDoc {
    /// In-scope issuer predicate, evaluated against listing metadata before
    /// any artifact fetch: fund/trust filings carry a fund code and are
    /// excluded from the operating-company pipeline.
    pub fn is_in_scope(&self) -> bool {
        match &self.fund_code {
            Some(code) => code.trim().is_empty(),
            None => true,
        }
    }

    pub fn has_structured_artifact(&self) -> bool {
        self.xbrl_flag.as_deref() == Some("1")
    }
}

pub struct EdinetSource {
    config: EdinetConfig,
    fetch_config: FetchConfig,
    raw_dir: PathBuf,
    transport: Arc<dyn Transport>,
    fetcher: ArtifactFetcher,
}

impl EdinetSource {
    pub fn new(
        config: EdinetConfig,
        fetch_config: FetchConfig,
        raw_dir: PathBuf,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let fetcher = ArtifactFetcher::new(transport.clone(), fetch_config.clone());
        Self {
            config,
            fetch_config,
            raw_dir,
            transport,
            fetcher,
        }
    }

    fn list_url(&self, day: NaiveDate) -> String {
        let mut url = format!(
            "{}/documents.json?date={}&type=2",
            self.config.base_url,
            day.format("%Y-%m-%d")
        );
        if let Some(key) = &self.config.api_key {
            url.push_str("&Subscription-Key=");
            url.push_str(key);
        }
        url
    }

    fn artifact_url(&self, doc_id: &str, kind: DocKind) -> String {
        // type=1 is the ZIP (XBRL instance), type=2 the rendered PDF
        let type_code = match kind {
            DocKind::Structured => 1,
            DocKind::Text => 2,
        };
        format!("{}/documents/{}?type={}", self.config.base_url, doc_id, type_code)
    }

    fn dest_path(&self, day: NaiveDate, doc_id: &str, kind: DocKind) -> PathBuf {
        let ext = match kind {
            DocKind::Structured => "zip",
            DocKind::Text => "pdf",
        };
        self.raw_dir
            .join(day.format("%Y/%m/%d").to_string())
            .join(doc_id)
            .join(format!("{}.{}", doc_id, ext))
    }

    async fn list(&self, day: NaiveDate) -> anyhow::Result<Vec<ListedDoc>> {
        let url = self.list_url(day);
        let response = self
            .transport
            .get(&url, self.fetch_config.list_timeout())
            .await?;
        if !response.is_success() {
            anyhow::bail!("EDINET listing returned HTTP {}", response.status);
        }
        let parsed: ListResponse = serde_json::from_slice(&response.body)?;
        Ok(parsed.results)
    }
}

#[async_trait]
impl FileSource for EdinetSource {
    fn name(&self) -> &str {
        "edinet"
    }

    fn source(&self) -> Source {
        Source::Edinet
    }

    async fn fetch(&self, target_date: NaiveDate) -> anyhow::Result<Vec<ArtifactHandle>> {
        let listed = self.list(target_date).await?;
        info!(date = %target_date, listed = listed.len(), "Fetched EDINET listing");

        let mut handles = Vec::new();
        for item in listed {
            let Some(doc_id) = item.doc_id.clone().filter(|id| !id.is_empty()) else {
                continue;
            };
            if !item.is_in_scope() {
                debug!(doc_id, "Skipping out-of-scope filing");
                continue;
            }

            let kind = if item.has_structured_artifact() {
                DocKind::Structured
            } else {
                DocKind::Text
            };
            let url = self.artifact_url(&doc_id, kind);
            let dest = self.dest_path(target_date, &doc_id, kind);

            let result = match kind {
                DocKind::Structured => self.fetcher.fetch_structured(&url, &dest).await,
                DocKind::Text => self.fetcher.fetch_text(&url, &dest).await,
            };

            match result {
                Ok(path) => handles.push(ArtifactHandle {
                    doc_id,
                    source: Source::Edinet,
                    kind,
                    doc_type: item
                        .doc_type_code
                        .clone()
                        .unwrap_or_else(|| "unknown".to_string()),
                    path,
                }),
                Err(e) => {
                    warn!(doc_id, error = %e, "Failed to fetch EDINET artifact; continuing");
                },
            }
        }

        Ok(handles)
    }
}
