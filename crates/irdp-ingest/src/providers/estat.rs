//! e-Stat (government statistics) series provider
//!
//! Fetches one series identified by `statsDataId` via the `getStatsData`
//! JSON endpoint. Extra filter parameters can ride along after semicolons,
//! e.g. `0003412316;cdCat01=0001`. Daily granularity: monthly series are
//! matched by passing the first day of the period.

use crate::adapter::RowSource;
use crate::config::MacroConfig;
use crate::fetcher::Transport;
use async_trait::async_trait;
use chrono::NaiveDate;
use irdp_common::types::MacroPoint;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

const ESTAT_TIMEOUT: Duration = Duration::from_secs(60);

pub struct EStatSeries {
    /// Full identifier as configured, including any filter parameters;
    /// stored rows carry this so distinct filters stay distinct series.
    raw_series_id: String,
    stats_data_id: String,
    extra_params: Vec<(String, String)>,
    name: String,
    base_url: String,
    app_id: Option<String>,
    transport: Arc<dyn Transport>,
}

impl EStatSeries {
    pub fn new(series_id: &str, config: &MacroConfig, transport: Arc<dyn Transport>) -> Self {
        let mut parts = series_id.split(';');
        let stats_data_id = parts.next().unwrap_or(series_id).to_string();
        let extra_params = parts
            .filter_map(|p| p.split_once('='))
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        if config.estat_app_id.is_none() {
            warn!(series_id, "ESTAT_APP_ID not set; series will be skipped");
        }

        Self {
            raw_series_id: series_id.to_string(),
            name: format!("estat:{}", stats_data_id),
            stats_data_id,
            extra_params,
            base_url: config.estat_base_url.clone(),
            app_id: config.estat_app_id.clone(),
            transport,
        }
    }
}

/// Normalize the `time` field: 6-digit `YYYYMM` maps to the first of the
/// month, anything else must be ISO.
fn parse_time(raw: &str) -> Option<NaiveDate> {
    if raw.len() == 6 && raw.chars().all(|c| c.is_ascii_digit()) {
        let year: i32 = raw[..4].parse().ok()?;
        let month: u32 = raw[4..6].parse().ok()?;
        NaiveDate::from_ymd_opt(year, month, 1)
    } else {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
    }
}

#[async_trait]
impl RowSource for EStatSeries {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, target_date: NaiveDate) -> anyhow::Result<Vec<MacroPoint>> {
        let Some(app_id) = &self.app_id else {
            return Ok(Vec::new());
        };

        let mut url = format!(
            "{}?appId={}&statsDataId={}&metaGetFlg=N&cntGetFlg=N&sectionHeaderFlg=2&annotationGetFlg=N",
            self.base_url, app_id, self.stats_data_id
        );
        for (key, value) in &self.extra_params {
            url.push('&');
            url.push_str(key);
            url.push('=');
            url.push_str(value);
        }

        let response = self.transport.get(&url, ESTAT_TIMEOUT).await?;
        if !response.is_success() {
            anyhow::bail!("e-Stat returned HTTP {} for {}", response.status, self.name);
        }
        let json: Value = serde_json::from_slice(&response.body)?;

        let Some(values) = json
            .get("GET_STATS_DATA")
            .and_then(|d| d.get("STAT_DATA"))
            .and_then(|d| d.get("VALUE"))
            .and_then(Value::as_array)
        else {
            warn!(series = self.name, "Unexpected e-Stat response format");
            return Ok(Vec::new());
        };

        let mut points = Vec::new();
        for row in values {
            let Some(ts_date) = row
                .get("time")
                .map(|t| match t {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .as_deref()
                .and_then(parse_time)
            else {
                continue;
            };
            if ts_date != target_date {
                continue;
            }
            let Some(value) = row
                .get("value")
                .and_then(|v| match v {
                    Value::String(s) => s.parse::<f64>().ok(),
                    Value::Number(n) => n.as_f64(),
                    _ => None,
                })
            else {
                continue;
            };
            points.push(MacroPoint {
                series_id: self.raw_series_id.clone(),
                ts_date,
                value,
                src: "eStat".to_string(),
            });
        }
        Ok(points)
    }
}
