//! Configuration for the facet engine.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{FacetryError, Result};
use crate::facet::executor::ExecutionMode;

/// Tunables of a [`FacetEngine`](crate::facet::engine::FacetEngine).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FacetEngineConfig {
    /// Dictionaries with fewer than this many values are counted by
    /// ordinal; dictionaries of this size or larger are enumerated. The same
    /// rule applies to the whole index and to each segment.
    pub ordinal_max_terms: u64,

    /// Terms with at least this many documents are intersected through the
    /// filter cache rather than by walking their postings.
    pub enum_cache_min_df: u64,

    /// Upper bound on the number of buckets of one range facet.
    pub max_range_buckets: usize,

    /// How long an idle pool worker waits for work before exiting.
    #[serde(with = "duration_secs")]
    pub pool_idle_timeout: Duration,

    /// Where per-segment counting runs.
    pub execution: ExecutionMode,
}

impl Default for FacetEngineConfig {
    fn default() -> Self {
        Self {
            ordinal_max_terms: 1 << 20,
            enum_cache_min_df: 16,
            max_range_buckets: 10_000,
            pool_idle_timeout: Duration::from_secs(60),
            execution: ExecutionMode::default(),
        }
    }
}

impl FacetEngineConfig {
    /// Parse a configuration from JSON; absent keys keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| FacetryError::invalid_config(format!("facet engine config: {e}")))
    }

    /// Whether a dictionary of `terms` values is counted by ordinal.
    pub fn counts_by_ordinal(&self, terms: u64) -> bool {
        below_ordinal_threshold(terms, self.ordinal_max_terms)
    }

    /// Set the ordinal strategy threshold.
    pub fn with_ordinal_max_terms(mut self, terms: u64) -> Self {
        self.ordinal_max_terms = terms;
        self
    }

    /// Set the filter cache document frequency threshold.
    pub fn with_enum_cache_min_df(mut self, df: u64) -> Self {
        self.enum_cache_min_df = df;
        self
    }

    /// Set the range bucket cap.
    pub fn with_max_range_buckets(mut self, buckets: usize) -> Self {
        self.max_range_buckets = buckets;
        self
    }

    /// Set the idle timeout of pool workers.
    pub fn with_pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.pool_idle_timeout = timeout;
        self
    }

    /// Set the execution mode.
    pub fn with_execution(mut self, execution: ExecutionMode) -> Self {
        self.execution = execution;
        self
    }
}

pub(crate) fn below_ordinal_threshold(terms: u64, max_terms: u64) -> bool {
    terms < max_terms
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = FacetEngineConfig::default();
        assert_eq!(config.ordinal_max_terms, 1 << 20);
        assert_eq!(config.enum_cache_min_df, 16);
        assert_eq!(config.pool_idle_timeout, Duration::from_secs(60));
        assert_eq!(config.execution, ExecutionMode::Pooled { max_threads: None });
    }

    #[test]
    fn test_config_from_json() {
        let config = FacetEngineConfig::from_json(
            r#"{"enum_cache_min_df": 4, "pool_idle_timeout": 0.5,
                "execution": {"pooled": {"max_threads": 3}}}"#,
        )
        .unwrap();

        assert_eq!(config.enum_cache_min_df, 4);
        assert_eq!(config.pool_idle_timeout, Duration::from_millis(500));
        assert_eq!(
            config.execution,
            ExecutionMode::Pooled {
                max_threads: Some(3)
            }
        );
        assert_eq!(config.max_range_buckets, 10_000);

        let inline = FacetEngineConfig::from_json(r#"{"execution": "inline"}"#).unwrap();
        assert_eq!(inline.execution, ExecutionMode::Inline);
    }

    #[test]
    fn test_config_rejects_bad_json() {
        let err = FacetEngineConfig::from_json(r#"{"pool_idle_timeout": -1}"#).unwrap_err();
        assert!(matches!(err, FacetryError::Config(_)));
    }

    #[test]
    fn test_config_builder() {
        let config = FacetEngineConfig::default()
            .with_ordinal_max_terms(10)
            .with_enum_cache_min_df(2)
            .with_max_range_buckets(50)
            .with_pool_idle_timeout(Duration::from_secs(1))
            .with_execution(ExecutionMode::Inline);

        assert_eq!(config.ordinal_max_terms, 10);
        assert_eq!(config.max_range_buckets, 50);
        assert_eq!(config.execution, ExecutionMode::Inline);
    }
}
