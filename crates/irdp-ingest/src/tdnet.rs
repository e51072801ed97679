//! TDnet disclosure feed adapter
//!
//! TDnet publishes PDF-only disclosures. The day's listing comes from the
//! JSON list API when it answers, falling back to the official per-part CSV
//! listing (`I_list_001_YYYYMMDD.csv` ..) otherwise. PDFs are assumed
//! immediately available, so downloads take the single-attempt text path.

use crate::adapter::{ArtifactHandle, FileSource};
use crate::config::{FetchConfig, TdnetConfig};
use crate::fetcher::{ArtifactFetcher, Transport};
use async_trait::async_trait;
use chrono::NaiveDate;
use irdp_common::types::{DocKind, Source};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One listing entry: company code plus the PDF file name on the file server.
#[derive(Debug, Clone, PartialEq)]
pub struct TdnetItem {
    pub code: Option<String>,
    pub filename: String,
}

pub struct TdnetSource {
    config: TdnetConfig,
    fetch_config: FetchConfig,
    raw_dir: PathBuf,
    transport: Arc<dyn Transport>,
    fetcher: ArtifactFetcher,
}

impl TdnetSource {
    pub fn new(
        config: TdnetConfig,
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

    /// Primary listing: JSON list API. Any failure yields an empty list so
    /// the CSV fallback can take over.
    async fn list_api(&self, day: NaiveDate) -> Vec<TdnetItem> {
        let url = format!(
            "{}/{}.json",
            self.config.api_base_url,
            day.format("%Y%m%d")
        );
        let response = match self
            .transport
            .get(&url, self.fetch_config.list_timeout())
            .await
        {
            Ok(r) if r.is_success() => r,
            Ok(r) => {
                warn!(status = r.status, "TDnet list API returned non-success status");
                return Vec::new();
            },
            Err(e) => {
                warn!(error = %e, "TDnet list API unreachable");
                return Vec::new();
            },
        };

        match serde_json::from_slice::<Value>(&response.body) {
            Ok(json) => parse_api_items(&json),
            Err(e) => {
                warn!(error = %e, "TDnet list API returned unparseable JSON");
                Vec::new()
            },
        }
    }

    /// Fallback listing: official CSV parts 1..9, stopping at the first 404.
    async fn list_csv(&self, day: NaiveDate) -> anyhow::Result<Vec<TdnetItem>> {
        let ymd = day.format("%Y%m%d").to_string();
        let mut items = Vec::new();

        for idx in 1..10u32 {
            let url = format!("{}/I_list_{:03}_{}.csv", self.config.list_base_url, idx, ymd);
            let response = self
                .transport
                .get(&url, self.fetch_config.list_timeout())
                .await?;

            if response.status == 404 {
                if idx == 1 {
                    warn!(date = %day, "No TDnet CSV listing found");
                }
                break;
            }
            if !response.is_success() {
                anyhow::bail!("TDnet CSV part {} returned HTTP {}", idx, response.status);
            }

            items.extend(parse_csv_part(&response.body));
        }

        Ok(items)
    }

    async fn list(&self, day: NaiveDate) -> anyhow::Result<Vec<TdnetItem>> {
        let items = self.list_api(day).await;
        if !items.is_empty() {
            return Ok(items);
        }
        debug!(date = %day, "Falling back to TDnet CSV listing");
        self.list_csv(day).await
    }
}

/// Extract PDF entries from the list API JSON. The v2 API wraps each record
/// under a "Tdnet" key; older payloads are flat.
fn parse_api_items(json: &Value) -> Vec<TdnetItem> {
    let items = match json {
        Value::Object(map) => match map.get("items") {
            Some(Value::Array(arr)) => arr.as_slice(),
            _ => return Vec::new(),
        },
        Value::Array(arr) => arr.as_slice(),
        _ => return Vec::new(),
    };

    let mut results = Vec::new();
    for obj in items {
        let record = obj.get("Tdnet").unwrap_or(obj);
        let filename = record
            .get("filename")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| {
                record
                    .get("document_url")
                    .and_then(Value::as_str)
                    .and_then(|u| u.rsplit('/').next())
                    .map(str::to_string)
            });
        let code = record
            .get("company_code")
            .or_else(|| record.get("code"))
            .or_else(|| record.get("security_code"))
            .and_then(Value::as_str)
            .map(str::to_string);

        if let Some(filename) = filename {
            if filename.to_lowercase().ends_with(".pdf") {
                results.push(TdnetItem { code, filename });
            }
        }
    }
    results
}

/// Parse one CSV listing part: column 0 is the company code, column 3 the
/// file name. Comment rows start with '#'.
fn parse_csv_part(body: &[u8]) -> Vec<TdnetItem> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(body);

    let mut items = Vec::new();
    for record in reader.records().flatten() {
        let code = match record.get(0) {
            Some(c) if !c.starts_with('#') => c.trim().to_string(),
            _ => continue,
        };
        let Some(filename) = record.get(3).map(|f| f.trim().to_string()) else {
            continue;
        };
        if filename.to_lowercase().ends_with(".pdf") {
            items.push(TdnetItem {
                code: Some(code),
                filename,
            });
        }
    }
    items
}

#[async_trait]
impl FileSource for TdnetSource {
    fn name(&self) -> &str {
        "tdnet"
    }

    fn source(&self) -> Source {
        Source::Tdnet
    }

    async fn fetch(&self, target_date: NaiveDate) -> anyhow::Result<Vec<ArtifactHandle>> {
        let items = self.list(target_date).await?;
        info!(date = %target_date, listed = items.len(), "Fetched TDnet listing");

        let mut handles = Vec::new();
        for item in items {
            let Some(doc_id) = item
                .filename
                .split('.')
                .next()
                .filter(|s| !s.is_empty())
                .map(str::to_string)
            else {
                continue;
            };

            let url = format!("{}/{}", self.config.list_base_url, item.filename);
            let dest = self
                .raw_dir
                .join(target_date.format("%Y/%m/%d").to_string())
                .join(&doc_id)
                .join(&item.filename);

            match self.fetcher.fetch_text(&url, &dest).await {
                Ok(path) => handles.push(ArtifactHandle {
                    doc_id,
                    source: Source::Tdnet,
                    kind: DocKind::Text,
                    doc_type: "unknown".to_string(),
                    path,
                }),
                Err(e) => {
                    warn!(filename = item.filename, error = %e, "Failed to fetch TDnet PDF; continuing");
                },
            }
        }

        Ok(handles)
    }
}
