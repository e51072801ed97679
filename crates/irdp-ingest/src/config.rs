//! Ingestion configuration
//!
//! All configuration is environment-driven (INGEST_* plus the per-source
//! variables the original deployment used). Loading happens once, explicitly,
//! at startup; nothing here touches the environment at module load time.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

// ============================================================================
// Defaults
// ============================================================================

/// Default root for raw downloaded artifacts.
pub const DEFAULT_RAW_DIR: &str = "data/raw";

/// Default attempt count for structured-artifact readiness polling.
pub const DEFAULT_FETCH_ATTEMPTS: u32 = 3;

/// Default fixed backoff between readiness-polling attempts, in seconds.
pub const DEFAULT_FETCH_BACKOFF_SECS: u64 = 20;

/// Default timeout for listing requests, in seconds.
pub const DEFAULT_LIST_TIMEOUT_SECS: u64 = 60;

/// Default timeout for artifact downloads, in seconds.
pub const DEFAULT_ARTIFACT_TIMEOUT_SECS: u64 = 300;

/// Default EDINET API base URL.
pub const DEFAULT_EDINET_BASE_URL: &str = "https://disclosure.edinet-fsa.go.jp/api/v1";

/// Default TDnet file server base URL (listing CSV parts and PDFs).
pub const DEFAULT_TDNET_LIST_BASE_URL: &str = "https://www.release.tdnet.info/inbs";

/// Default TDnet JSON list API base URL.
pub const DEFAULT_TDNET_API_BASE_URL: &str = "https://webapi.yanoshin.jp/webapi/tdnet/list";

/// Default FRED API base URL.
pub const DEFAULT_FRED_BASE_URL: &str = "https://api.stlouisfed.org/fred";

/// Default e-Stat getStatsData endpoint.
pub const DEFAULT_ESTAT_BASE_URL: &str = "https://api.e-stat.go.jp/rest/3.0/app/json/getStatsData";

/// Default BOJ time-series CSV endpoint.
pub const DEFAULT_BOJ_BASE_URL: &str = "https://www.stat-search.boj.or.jp/ssi/cgi-bin/famecgi2csv";

/// Default macro series allow-list.
pub const DEFAULT_MACRO_SERIES: &str = "T10Y2Y,PMI_US";

// ============================================================================
// Config structs
// ============================================================================

/// Retry/timeout policy for artifact fetching.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Bounded attempt count for the retrying structured-artifact path.
    pub max_attempts: u32,
    /// Fixed sleep between attempts.
    pub backoff_secs: u64,
    pub list_timeout_secs: u64,
    pub artifact_timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_FETCH_ATTEMPTS,
            backoff_secs: DEFAULT_FETCH_BACKOFF_SECS,
            list_timeout_secs: DEFAULT_LIST_TIMEOUT_SECS,
            artifact_timeout_secs: DEFAULT_ARTIFACT_TIMEOUT_SECS,
        }
    }
}

impl FetchConfig {
    pub fn backoff(&self) -> Duration {
        Duration::from_secs(self.backoff_secs)
    }

    pub fn list_timeout(&self) -> Duration {
        Duration::from_secs(self.list_timeout_secs)
    }

    pub fn artifact_timeout(&self) -> Duration {
        Duration::from_secs(self.artifact_timeout_secs)
    }
}

/// EDINET filing registry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdinetConfig {
    pub base_url: String,
    /// Optional subscription key; the public listing works without one.
    pub api_key: Option<String>,
}

impl Default for EdinetConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_EDINET_BASE_URL.to_string(),
            api_key: None,
        }
    }
}

/// TDnet disclosure feed configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TdnetConfig {
    /// File server base (CSV list parts and PDF payloads).
    pub list_base_url: String,
    /// JSON list API base; preferred over CSV scraping when it answers.
    pub api_base_url: String,
}

impl Default for TdnetConfig {
    fn default() -> Self {
        Self {
            list_base_url: DEFAULT_TDNET_LIST_BASE_URL.to_string(),
            api_base_url: DEFAULT_TDNET_API_BASE_URL.to_string(),
        }
    }
}

/// Macro statistics provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MacroConfig {
    /// Series allow-list. Each entry is `id` or `prefix:id`
    /// (e.g. `fred:T10Y2Y`, `estat:0003412316;cdCat01=0001`, `boj:FM01`).
    pub series: Vec<String>,
    pub fred_base_url: String,
    pub estat_base_url: String,
    pub boj_base_url: String,
    pub fred_api_key: Option<String>,
    pub estat_app_id: Option<String>,
}

impl Default for MacroConfig {
    fn default() -> Self {
        Self {
            series: parse_series_list(DEFAULT_MACRO_SERIES),
            fred_base_url: DEFAULT_FRED_BASE_URL.to_string(),
            estat_base_url: DEFAULT_ESTAT_BASE_URL.to_string(),
            boj_base_url: DEFAULT_BOJ_BASE_URL.to_string(),
            fred_api_key: None,
            estat_app_id: None,
        }
    }
}

/// Top-level ingestion configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct IngestConfig {
    pub raw_dir: PathBuf,
    pub fetch: FetchConfig,
    pub edinet: EdinetConfig,
    pub tdnet: TdnetConfig,
    pub macros: MacroConfig,
}

impl IngestConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        let mut config = Self {
            raw_dir: PathBuf::from(DEFAULT_RAW_DIR),
            ..Self::default()
        };

        if let Ok(dir) = std::env::var("RAW_DIR") {
            config.raw_dir = PathBuf::from(dir);
        }
        if let Ok(val) = std::env::var("INGEST_FETCH_ATTEMPTS") {
            config.fetch.max_attempts = val
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid INGEST_FETCH_ATTEMPTS: {}", val))?;
        }
        if let Ok(val) = std::env::var("INGEST_FETCH_BACKOFF_SECS") {
            config.fetch.backoff_secs = val
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid INGEST_FETCH_BACKOFF_SECS: {}", val))?;
        }
        if let Ok(url) = std::env::var("EDINET_BASE_URL") {
            config.edinet.base_url = url;
        }
        if let Ok(key) = std::env::var("EDINET_API_KEY") {
            config.edinet.api_key = Some(key);
        }
        if let Ok(url) = std::env::var("TDNET_LIST_BASE_URL") {
            config.tdnet.list_base_url = url;
        }
        if let Ok(url) = std::env::var("TDNET_API_BASE_URL") {
            config.tdnet.api_base_url = url;
        }
        if let Ok(series) = std::env::var("MACRO_SERIES") {
            config.macros.series = parse_series_list(&series);
        }
        if let Ok(key) = std::env::var("FRED_API_KEY") {
            config.macros.fred_api_key = Some(key);
        }
        if let Ok(id) = std::env::var("ESTAT_APP_ID") {
            config.macros.estat_app_id = Some(id);
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that can never produce a useful run.
    pub fn validate(&self) -> Result<()> {
        if self.fetch.max_attempts == 0 {
            anyhow::bail!("fetch.max_attempts must be at least 1");
        }
        if self.edinet.base_url.is_empty() {
            anyhow::bail!("edinet.base_url must not be empty");
        }
        if self.tdnet.list_base_url.is_empty() {
            anyhow::bail!("tdnet.list_base_url must not be empty");
        }
        Ok(())
    }
}

/// Split a comma-separated series allow-list, dropping empty entries.
pub fn parse_series_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
