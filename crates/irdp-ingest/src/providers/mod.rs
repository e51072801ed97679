//! Macro statistics providers
//!
//! Each provider is a row-producing adapter for one external series. The
//! series allow-list routes entries to providers through an explicit
//! registry built at startup (`prefix:id`, default prefix `fred`); there is
//! no ambient global factory table.

pub mod boj;
pub mod estat;
pub mod fred;

use crate::adapter::{RowSource, RowSourceSet};
use crate::config::MacroConfig;
use crate::fetcher::Transport;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

pub use boj::BojSeries;
pub use estat::EStatSeries;
pub use fred::FredSeries;

/// Factory producing one provider instance for a series identifier.
pub type ProviderFactory =
    Box<dyn Fn(&str, &MacroConfig, Arc<dyn Transport>) -> Box<dyn RowSource> + Send + Sync>;

/// Prefix-to-factory table, constructed once at orchestrator startup and
/// passed where needed.
pub struct ProviderRegistry {
    factories: HashMap<String, ProviderFactory>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry pre-populated with the built-in providers.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("fred", |id, cfg, transport| {
            Box::new(FredSeries::new(id, cfg, transport))
        });
        registry.register("estat", |id, cfg, transport| {
            Box::new(EStatSeries::new(id, cfg, transport))
        });
        registry.register("boj", |id, cfg, transport| {
            Box::new(BojSeries::new(id, cfg, transport))
        });
        registry
    }

    pub fn register<F>(&mut self, prefix: &str, factory: F)
    where
        F: Fn(&str, &MacroConfig, Arc<dyn Transport>) -> Box<dyn RowSource>
            + Send
            + Sync
            + 'static,
    {
        self.factories.insert(prefix.to_string(), Box::new(factory));
    }

    /// Build the aggregated row-source set for a series allow-list.
    /// Unknown prefixes are logged and skipped; they never abort startup.
    pub fn build(&self, config: &MacroConfig, transport: Arc<dyn Transport>) -> RowSourceSet {
        let mut set = RowSourceSet::new();
        for entry in &config.series {
            let (prefix, series_id) = match entry.split_once(':') {
                Some((p, id)) => (p, id),
                None => ("fred", entry.as_str()),
            };
            match self.factories.get(prefix) {
                Some(factory) => set.push(factory(series_id, config, transport.clone())),
                None => {
                    warn!(prefix, series = entry.as_str(), "Unknown provider prefix; skipping series");
                },
            }
        }
        set
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::fetcher::HttpTransport;

    #[test]
    fn test_build_routes_prefixes_and_skips_unknown() {
        let registry = ProviderRegistry::with_defaults();
        let config = MacroConfig {
            series: vec![
                "T10Y2Y".to_string(),                // default prefix -> fred
                "estat:0003412316".to_string(),
                "boj:FM01".to_string(),
                "bloomberg:XYZ".to_string(),         // unknown -> skipped
            ],
            ..MacroConfig::default()
        };
        let transport: Arc<dyn crate::fetcher::Transport> =
            Arc::new(HttpTransport::new().unwrap());

        let set = registry.build(&config, transport);
        assert_eq!(set.len(), 3);
    }
}
