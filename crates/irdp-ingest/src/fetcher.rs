//! Artifact retrieval with readiness polling
//!
//! A listing API may announce a document before its binary artifact is
//! actually servable: the download then returns HTTP 200 with an error
//! payload or a truncated archive. The fetcher therefore validates artifacts
//! structurally, retries with a fixed backoff for the bounded attempt count,
//! and only ever exposes complete files at the destination path (temp file +
//! atomic rename).

use crate::config::FetchConfig;
use async_trait::async_trait;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Fetch errors. `Exhausted` is the terminal item-level failure surfaced
/// after readiness polling gives up.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("artifact not ready after {attempts} attempts: {url}")]
    Exhausted { url: String, attempts: u32 },

    #[error("network error fetching {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("empty payload from {url}")]
    EmptyPayload { url: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// An HTTP response reduced to what the ingestion layer needs. Transport
/// errors (DNS, timeout, connection reset) are `Err`; any HTTP status is
/// `Ok` so callers can route on it.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Blocking-with-timeout GET abstraction; stubbed in tests.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str, timeout: Duration) -> anyhow::Result<TransportResponse>;
}

/// reqwest-backed transport used in production.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("irdp-ingest/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str, timeout: Duration) -> anyhow::Result<TransportResponse> {
        let response = self.client.get(url).timeout(timeout).send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?.to_vec();
        Ok(TransportResponse { status, body })
    }
}

/// Returns true when `bytes` open as a readable ZIP archive. A 200 response
/// carrying an error page or a truncated archive fails this check.
pub fn is_valid_zip(bytes: &[u8]) -> bool {
    zip::ZipArchive::new(Cursor::new(bytes)).is_ok()
}

fn is_valid_zip_file(path: &Path) -> bool {
    match std::fs::File::open(path) {
        Ok(file) => zip::ZipArchive::new(file).is_ok(),
        Err(_) => false,
    }
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

/// Per-source artifact fetcher.
pub struct ArtifactFetcher {
    transport: std::sync::Arc<dyn Transport>,
    config: FetchConfig,
}

impl ArtifactFetcher {
    pub fn new(transport: std::sync::Arc<dyn Transport>, config: FetchConfig) -> Self {
        Self { transport, config }
    }

    /// Fetch a structured artifact (ZIP) with readiness polling.
    ///
    /// If `dest` already exists the fetch is skipped entirely and the
    /// existing path returned; re-running a day never re-downloads.
    pub async fn fetch_structured(&self, url: &str, dest: &Path) -> Result<PathBuf, FetchError> {
        if dest.exists() {
            debug!(dest = %dest.display(), "Skip existing artifact");
            return Ok(dest.to_path_buf());
        }
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let tmp = part_path(dest);
        for attempt in 1..=self.config.max_attempts {
            match self.attempt_structured(url, dest, &tmp).await {
                Ok(path) => return Ok(path),
                Err(e) => {
                    warn!(
                        url,
                        attempt,
                        max_attempts = self.config.max_attempts,
                        error = %e,
                        "Structured artifact attempt failed"
                    );
                    if attempt < self.config.max_attempts {
                        tokio::time::sleep(self.config.backoff()).await;
                    }
                },
            }
        }

        Err(FetchError::Exhausted {
            url: url.to_string(),
            attempts: self.config.max_attempts,
        })
    }

    async fn attempt_structured(
        &self,
        url: &str,
        dest: &Path,
        tmp: &Path,
    ) -> Result<PathBuf, FetchError> {
        let response = self
            .transport
            .get(url, self.config.artifact_timeout())
            .await
            .map_err(|source| FetchError::Network {
                url: url.to_string(),
                source,
            })?;

        if !response.is_success() {
            return Err(FetchError::Network {
                url: url.to_string(),
                source: anyhow::anyhow!("HTTP status {}", response.status),
            });
        }

        std::fs::write(tmp, &response.body)?;

        // Status alone is not trustworthy; the archive must actually open.
        if !is_valid_zip_file(tmp) {
            let _ = std::fs::remove_file(tmp);
            return Err(FetchError::Network {
                url: url.to_string(),
                source: anyhow::anyhow!("payload is not a readable ZIP archive"),
            });
        }

        tokio::fs::rename(tmp, dest).await?;
        debug!(dest = %dest.display(), "Saved structured artifact");
        Ok(dest.to_path_buf())
    }

    /// Fetch an unstructured (text/PDF) artifact. These are assumed
    /// immediately available: one attempt, no readiness polling.
    pub async fn fetch_text(&self, url: &str, dest: &Path) -> Result<PathBuf, FetchError> {
        if dest.exists() {
            debug!(dest = %dest.display(), "Skip existing artifact");
            return Ok(dest.to_path_buf());
        }
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let response = self
            .transport
            .get(url, self.config.artifact_timeout())
            .await
            .map_err(|source| FetchError::Network {
                url: url.to_string(),
                source,
            })?;

        if !response.is_success() {
            return Err(FetchError::Network {
                url: url.to_string(),
                source: anyhow::anyhow!("HTTP status {}", response.status),
            });
        }
        if response.body.is_empty() {
            return Err(FetchError::EmptyPayload {
                url: url.to_string(),
            });
        }

        let tmp = part_path(dest);
        std::fs::write(&tmp, &response.body)?;
        tokio::fs::rename(&tmp, dest).await?;
        debug!(dest = %dest.display(), "Saved text artifact");
        Ok(dest.to_path_buf())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    /// Smallest valid ZIP: a bare end-of-central-directory record.
    pub(crate) const EMPTY_ZIP: [u8; 22] = [
        0x50, 0x4b, 0x05, 0x06, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    ];

    struct ScriptedTransport {
        responses: Mutex<Vec<TransportResponse>>,
        calls: AtomicU32,
    }

    impl ScriptedTransport {
        fn new(responses: Vec<TransportResponse>) -> Self {
            Self {
                responses: Mutex::new(responses),
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn get(&self, _url: &str, _timeout: Duration) -> anyhow::Result<TransportResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                anyhow::bail!("no scripted response left");
            }
            Ok(responses.remove(0))
        }
    }

    fn ok(body: &[u8]) -> TransportResponse {
        TransportResponse {
            status: 200,
            body: body.to_vec(),
        }
    }

    fn fast_config() -> FetchConfig {
        FetchConfig {
            max_attempts: 3,
            backoff_secs: 0,
            ..FetchConfig::default()
        }
    }

    #[test]
    fn test_is_valid_zip() {
        assert!(is_valid_zip(&EMPTY_ZIP));
        assert!(!is_valid_zip(b"<html>document is being generated</html>"));
        assert!(!is_valid_zip(&[]));
    }

    #[tokio::test]
    async fn test_retry_then_succeed() {
        // invalid payload on attempts 1-2, valid archive on attempt 3
        let transport = Arc::new(ScriptedTransport::new(vec![
            ok(b"not yet ready"),
            ok(b"still not ready"),
            ok(&EMPTY_ZIP),
        ]));
        let fetcher = ArtifactFetcher::new(transport.clone(), fast_config());

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("DOC1").join("DOC1.zip");

        let saved = fetcher
            .fetch_structured("http://example/doc/DOC1", &dest)
            .await
            .unwrap();

        assert_eq!(saved, dest);
        assert_eq!(transport.calls(), 3);
        assert_eq!(std::fs::read(&dest).unwrap(), EMPTY_ZIP);
    }

    #[tokio::test]
    async fn test_retry_exhaustion_leaves_no_file() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            ok(b"garbage"),
            ok(b"garbage"),
            ok(b"garbage"),
        ]));
        let fetcher = ArtifactFetcher::new(transport.clone(), fast_config());

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("DOC2.zip");

        let err = fetcher
            .fetch_structured("http://example/doc/DOC2", &dest)
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Exhausted { attempts: 3, .. }));
        assert_eq!(transport.calls(), 3);
        assert!(!dest.exists());
        assert!(!part_path(&dest).exists());
    }

    #[tokio::test]
    async fn test_http_error_counts_as_attempt() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            TransportResponse {
                status: 503,
                body: Vec::new(),
            },
            ok(&EMPTY_ZIP),
        ]));
        let fetcher = ArtifactFetcher::new(transport.clone(), fast_config());

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("DOC3.zip");

        fetcher
            .fetch_structured("http://example/doc/DOC3", &dest)
            .await
            .unwrap();
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test]
    async fn test_existing_destination_skips_network() {
        let transport = Arc::new(ScriptedTransport::new(vec![]));
        let fetcher = ArtifactFetcher::new(transport.clone(), fast_config());

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("DOC4.zip");
        std::fs::write(&dest, EMPTY_ZIP).unwrap();

        let saved = fetcher
            .fetch_structured("http://example/doc/DOC4", &dest)
            .await
            .unwrap();
        assert_eq!(saved, dest);
        assert_eq!(transport.calls(), 0);

        let saved = fetcher
            .fetch_text("http://example/doc/DOC4", &dest)
            .await
            .unwrap();
        assert_eq!(saved, dest);
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_text_single_attempt() {
        let transport = Arc::new(ScriptedTransport::new(vec![TransportResponse {
            status: 404,
            body: Vec::new(),
        }]));
        let fetcher = ArtifactFetcher::new(transport.clone(), fast_config());

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("DOC5.pdf");

        let err = fetcher
            .fetch_text("http://example/doc/DOC5", &dest)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Network { .. }));
        // no retry on the text path
        assert_eq!(transport.calls(), 1);
        assert!(!dest.exists());
    }
}
