//! Build/query-time configuration, persisted alongside the backing store so
//! a query run can detect a filter-chain mismatch before it runs a single
//! query.

use crate::error::{EsaError, EsaResult};
use crate::stopwords;
use crate::token::{FilterChain, TokenTransformer};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn default_window_size() -> usize {
    100
}

fn default_window_thresh() -> f32 {
    0.05
}

fn default_checkpoint_every() -> usize {
    50
}

fn default_n_labels() -> usize {
    5
}

/// Describes the filter chain so build and query can be checked for
/// agreement without re-reading a stop-word file bit-for-bit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterChainConfig {
    pub lowercase: bool,
    pub stem: bool,
    pub remove_stopwords: bool,
    /// `None` means the built-in English list; `Some(path)` means a custom
    /// stop-word file (one word per line).
    pub stopwords_path: Option<PathBuf>,
}

impl Default for FilterChainConfig {
    /// The canonical chain: lowercase, Porter stem, stop-word removal,
    /// identity.
    fn default() -> Self {
        Self {
            lowercase: true,
            stem: true,
            remove_stopwords: true,
            stopwords_path: None,
        }
    }
}

impl FilterChainConfig {
    pub fn build(&self) -> EsaResult<FilterChain> {
        let mut stages = Vec::new();
        if self.lowercase {
            stages.push(TokenTransformer::Lowercase);
        }
        if self.stem {
            stages.push(TokenTransformer::Stem);
        }
        if self.remove_stopwords {
            let set = match &self.stopwords_path {
                None => stopwords::english(),
                Some(path) => {
                    let text = fs::read_to_string(path).map_err(|e| {
                        EsaError::Config(format!("reading stopwords {path:?}: {e}"))
                    })?;
                    Arc::new(stopwords::from_lines(&text))
                }
            };
            stages.push(TokenTransformer::RemoveStopwords(set));
        }
        stages.push(TokenTransformer::Identity);
        Ok(FilterChain::new(stages))
    }
}

/// Every build/query-time parameter that is not purely a one-shot CLI flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Minimum stored TF weight a `doc_term_freq` row must exceed to survive
    /// into concept-vector emission. Required, with no built-in default,
    /// since the right cutoff depends on corpus size and term density.
    pub min_freq: f32,
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    #[serde(default = "default_window_thresh")]
    pub window_thresh: f32,
    #[serde(default = "default_checkpoint_every")]
    pub checkpoint_every: usize,
    #[serde(default = "default_n_labels")]
    pub n_labels: usize,
    #[serde(default)]
    pub filter_chain: FilterChainConfig,
    /// Run per-term concept-vector emission across a `rayon` pool instead
    /// of sequentially — terms are independent of each other once IDF is
    /// computed, so this is safe to parallelise. Off by default.
    #[serde(default)]
    pub parallel_emission: bool,
}

impl Config {
    pub fn new(min_freq: f32) -> Self {
        Self {
            min_freq,
            window_size: default_window_size(),
            window_thresh: default_window_thresh(),
            checkpoint_every: default_checkpoint_every(),
            n_labels: default_n_labels(),
            parallel_emission: false,
            filter_chain: FilterChainConfig::default(),
        }
    }

    pub fn save(&self, path: &Path) -> EsaResult<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| EsaError::Config(format!("serializing config: {e}")))?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn load(path: &Path) -> EsaResult<Self> {
        let text = fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|e| EsaError::Config(format!("parsing config: {e}")))
    }

    /// Fails with a `ConfigError` if `other`'s filter chain differs from
    /// this one — a mismatch here is fatal at startup.
    pub fn require_same_filter_chain(&self, other: &Config) -> EsaResult<()> {
        if self.filter_chain != other.filter_chain {
            return Err(EsaError::Config(format!(
                "filter chain mismatch: index was built with {:?}, query is running with {:?}",
                self.filter_chain, other.filter_chain
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn round_trips_through_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let cfg = Config::new(5.0);
        cfg.save(&path).unwrap();
        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.min_freq, 5.0);
        assert_eq!(loaded.window_size, 100);
    }

    #[test]
    fn detects_filter_chain_mismatch() {
        let mut build_cfg = Config::new(0.0);
        let mut query_cfg = Config::new(0.0);
        assert!(build_cfg.require_same_filter_chain(&query_cfg).is_ok());

        query_cfg.filter_chain.stem = false;
        assert!(build_cfg.require_same_filter_chain(&query_cfg).is_err());

        build_cfg.filter_chain.stem = false;
        assert!(build_cfg.require_same_filter_chain(&query_cfg).is_ok());
    }
}
