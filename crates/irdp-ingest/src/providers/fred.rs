//! FRED series provider
//!
//! One instance covers one FRED series. Requires `FRED_API_KEY`; without it
//! the provider reports itself unavailable and contributes zero rows.

use crate::adapter::RowSource;
use crate::config::MacroConfig;
use crate::fetcher::Transport;
use async_trait::async_trait;
use chrono::NaiveDate;
use irdp_common::types::MacroPoint;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

const FRED_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct ObservationsResponse {
    #[serde(default)]
    observations: Vec<Observation>,
}

#[derive(Debug, Deserialize)]
struct Observation {
    date: String,
    value: String,
}

pub struct FredSeries {
    series_id: String,
    name: String,
    base_url: String,
    api_key: Option<String>,
    transport: Arc<dyn Transport>,
}

impl FredSeries {
    pub fn new(series_id: &str, config: &MacroConfig, transport: Arc<dyn Transport>) -> Self {
        if config.fred_api_key.is_none() {
            warn!(series_id, "FRED_API_KEY not set; series will be skipped");
        }
        Self {
            series_id: series_id.to_string(),
            name: format!("fred:{}", series_id),
            base_url: config.fred_base_url.clone(),
            api_key: config.fred_api_key.clone(),
            transport,
        }
    }
}

#[async_trait]
impl RowSource for FredSeries {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, target_date: NaiveDate) -> anyhow::Result<Vec<MacroPoint>> {
        let Some(api_key) = &self.api_key else {
            return Ok(Vec::new());
        };

        let day = target_date.format("%Y-%m-%d");
        let url = format!(
            "{}/series/observations?series_id={}&api_key={}&file_type=json&observation_start={}&observation_end={}",
            self.base_url, self.series_id, api_key, day, day
        );

        let response = self.transport.get(&url, FRED_TIMEOUT).await?;
        if !response.is_success() {
            anyhow::bail!("FRED returned HTTP {} for {}", response.status, self.name);
        }
        let parsed: ObservationsResponse = serde_json::from_slice(&response.body)?;

        let mut points = Vec::new();
        for obs in parsed.observations {
            // FRED encodes missing observations as "."
            let Ok(value) = obs.value.parse::<f64>() else {
                continue;
            };
            let Ok(ts_date) = NaiveDate::parse_from_str(&obs.date, "%Y-%m-%d") else {
                continue;
            };
            points.push(MacroPoint {
                series_id: self.series_id.clone(),
                ts_date,
                value,
                src: "FRED".to_string(),
            });
        }
        Ok(points)
    }
}
