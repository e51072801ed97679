//! BOJ time-series provider
//!
//! The BOJ Time-Series Data Search exposes CSV download endpoints keyed by a
//! `key_series` parameter. One instance fetches one series; the response has
//! a header row, then `date,value` rows.

use crate::adapter::RowSource;
use crate::config::MacroConfig;
use crate::fetcher::Transport;
use async_trait::async_trait;
use chrono::NaiveDate;
use irdp_common::types::MacroPoint;
use std::sync::Arc;
use std::time::Duration;

const BOJ_TIMEOUT: Duration = Duration::from_secs(60);

pub struct BojSeries {
    series_id: String,
    name: String,
    base_url: String,
    transport: Arc<dyn Transport>,
}

impl BojSeries {
    pub fn new(series_id: &str, config: &MacroConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            series_id: series_id.to_string(),
            name: format!("boj:{}", series_id),
            base_url: config.boj_base_url.clone(),
            transport,
        }
    }
}

#[async_trait]
impl RowSource for BojSeries {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, target_date: NaiveDate) -> anyhow::Result<Vec<MacroPoint>> {
        let day = target_date.format("%Y-%m-%d");
        let url = format!(
            "{}?key_series={}&from={}&to={}&csvfmt=csv",
            self.base_url, self.series_id, day, day
        );

        let response = self.transport.get(&url, BOJ_TIMEOUT).await?;
        if !response.is_success() {
            anyhow::bail!("BOJ returned HTTP {} for {}", response.status, self.name);
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(response.body.as_slice());

        let mut points = Vec::new();
        for record in reader.records().flatten() {
            let Some(ts_str) = record.get(0) else {
                continue;
            };
            let Ok(ts_date) = NaiveDate::parse_from_str(ts_str, "%Y-%m-%d") else {
                continue;
            };
            if ts_date != target_date {
                continue;
            }
            let Some(value) = record.get(1).and_then(|v| v.parse::<f64>().ok()) else {
                continue;
            };
            points.push(MacroPoint {
                series_id: self.series_id.clone(),
                ts_date,
                value,
                src: "BOJ-STAT".to_string(),
            });
        }
        Ok(points)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::fetcher::HttpTransport;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_fetch_parses_csv_row() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("key_series", "FM01"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(
                b"date,value\n2024-06-30,0.10\n2024-07-01,0.25\nnot-a-date,1.0\n".to_vec(),
            ))
            .mount(&server)
            .await;

        let config = MacroConfig {
            boj_base_url: server.uri(),
            ..MacroConfig::default()
        };
        let provider = BojSeries::new("FM01", &config, Arc::new(HttpTransport::new().unwrap()));
        let day = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();

        let points = provider.fetch(day).await.unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].value, 0.25);
        assert_eq!(points[0].src, "BOJ-STAT");
    }
}
