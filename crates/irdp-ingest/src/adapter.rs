//! Source adapter contract
//!
//! Two capability shapes cover every external source: file-producing adapters
//! return locally stored artifact handles for a date, row-producing adapters
//! return rows ready for direct upsert. Adapters are side-effect-free on
//! construction except for reading configuration; `fetch` is the only
//! operation with network effects.

use async_trait::async_trait;
use chrono::NaiveDate;
use irdp_common::types::{DocKind, MacroPoint, Source};
use std::path::{Path, PathBuf};
use tracing::warn;

/// One locally stored artifact returned by a file-producing adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactHandle {
    /// Source-assigned document identifier
    pub doc_id: String,
    pub source: Source,
    pub kind: DocKind,
    /// Type code from the source's listing metadata ("unknown" if absent)
    pub doc_type: String,
    /// Local path of the downloaded artifact
    pub path: PathBuf,
}

/// Derive a `doc_id` from an artifact file name: the stem up to the first dot
/// (`S100ABCD.zip` -> `S100ABCD`, `081220240701501.pdf` -> `081220240701501`).
pub fn doc_id_from_path(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    let stem = name.split('.').next()?;
    if stem.is_empty() {
        None
    } else {
        Some(stem.to_string())
    }
}

/// A file-producing disclosure source.
#[async_trait]
pub trait FileSource: Send + Sync {
    /// Stable adapter name used for audit correlation.
    fn name(&self) -> &str;

    /// The registry source tag documents from this adapter carry.
    fn source(&self) -> Source;

    /// Fetch all in-scope artifacts published on `target_date`.
    ///
    /// Per-item download failures are isolated inside the adapter (logged,
    /// item dropped); an `Err` here means the source as a whole could not be
    /// consulted (listing unreachable, bad credentials).
    async fn fetch(&self, target_date: NaiveDate) -> anyhow::Result<Vec<ArtifactHandle>>;
}

/// A row-producing source (macro/market-style numeric series with no
/// document concept).
#[async_trait]
pub trait RowSource: Send + Sync {
    /// Stable adapter name used for audit correlation.
    fn name(&self) -> &str;

    /// Fetch observations for `target_date`. Sources with missing
    /// configuration return an empty vector rather than failing.
    async fn fetch(&self, target_date: NaiveDate) -> anyhow::Result<Vec<MacroPoint>>;
}

/// Composes N row-producing adapters and concatenates their output.
/// One constituent's failure never prevents the others from contributing.
#[derive(Default)]
pub struct RowSourceSet {
    sources: Vec<Box<dyn RowSource>>,
}

impl RowSourceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, source: Box<dyn RowSource>) {
        self.sources.push(source);
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Fetch from every constituent source, isolating failures.
    pub async fn fetch_all(&self, target_date: NaiveDate) -> Vec<MacroPoint> {
        let mut rows = Vec::new();
        for source in &self.sources {
            match source.fetch(target_date).await {
                Ok(mut points) => rows.append(&mut points),
                Err(e) => {
                    warn!(source = source.name(), error = %e, "Row source fetch failed; continuing");
                },
            }
        }
        rows
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_doc_id_from_path() {
        assert_eq!(
            doc_id_from_path(Path::new("/raw/2024/07/01/S100ABCD/S100ABCD.zip")).unwrap(),
            "S100ABCD"
        );
        // only the part before the first dot counts
        assert_eq!(
            doc_id_from_path(Path::new("S100ABCD.audit.zip")).unwrap(),
            "S100ABCD"
        );
        assert_eq!(doc_id_from_path(Path::new("")), None);
    }

    struct FixedRows(Vec<MacroPoint>);

    #[async_trait]
    impl RowSource for FixedRows {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn fetch(&self, _target_date: NaiveDate) -> anyhow::Result<Vec<MacroPoint>> {
            Ok(self.0.clone())
        }
    }

    struct FailingRows;

    #[async_trait]
    impl RowSource for FailingRows {
        fn name(&self) -> &str {
            "failing"
        }

        async fn fetch(&self, _target_date: NaiveDate) -> anyhow::Result<Vec<MacroPoint>> {
            anyhow::bail!("provider exploded")
        }
    }

    fn point(series_id: &str) -> MacroPoint {
        MacroPoint {
            series_id: series_id.to_string(),
            ts_date: NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(),
            value: 1.0,
            src: "TEST".to_string(),
        }
    }

    #[tokio::test]
    async fn test_row_source_set_isolates_failures() {
        let mut set = RowSourceSet::new();
        set.push(Box::new(FixedRows(vec![point("A")])));
        set.push(Box::new(FailingRows));
        set.push(Box::new(FixedRows(vec![point("B"), point("C")])));

        let rows = set
            .fetch_all(NaiveDate::from_ymd_opt(2024, 7, 1).unwrap())
            .await;

        let ids: Vec<_> = rows.iter().map(|r| r.series_id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B", "C"]);
    }
}
