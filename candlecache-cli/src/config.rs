//! Replay scenario configuration.
//!
//! A scenario is a TOML file naming a CSV dataset, the axis kinds it is
//! measured in, how slow the simulated upstream is, and the queries to run:
//!
//! ```toml
//! dataset = "bars.csv"
//! x_axis = "timestamp"
//! y_axis = "money"
//! concurrent = true
//!
//! [upstream]
//! latency_ms = 40
//! jitter_ms = 10
//! seed = 7
//!
//! [[queries]]
//! first = "2024-01-02T14:30:00Z"
//! last = "2024-01-02T15:30:00Z"
//! limit = { type = "from_tail", size = 25 }
//! ```

use anyhow::{bail, Context, Result};
use candlecache_core::{Scalar, ScalarKind, SnapshotLimit};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A full replay scenario.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReplayConfig {
    /// CSV dataset, relative to the scenario file.
    pub dataset: PathBuf,
    pub x_axis: ScalarKind,
    pub y_axis: ScalarKind,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    /// Issue all queries at once instead of one after another.
    #[serde(default)]
    pub concurrent: bool,
    pub queries: Vec<QueryConfig>,
}

/// Simulated upstream latency.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct UpstreamConfig {
    pub latency_ms: u64,
    pub jitter_ms: u64,
    /// Fixed seed for the jitter; random when absent.
    pub seed: Option<u64>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            latency_ms: 50,
            jitter_ms: 0,
            seed: None,
        }
    }
}

/// One query as written in the scenario, bounds still in text form.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryConfig {
    pub first: String,
    pub last: String,
    #[serde(default)]
    pub limit: SnapshotLimit,
    /// Shown in the report instead of the bounds.
    #[serde(default)]
    pub label: Option<String>,
}

/// A query with bounds parsed on the x-axis.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedQuery {
    pub label: String,
    pub first: Scalar,
    pub last: Scalar,
    pub limit: SnapshotLimit,
}

impl ReplayConfig {
    /// Load a scenario from a TOML file. A relative dataset path is resolved
    /// against the scenario's directory.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("read scenario file {}", path.display()))?;
        let mut config = Self::from_toml(&content)
            .with_context(|| format!("parse scenario file {}", path.display()))?;
        if config.dataset.is_relative() {
            if let Some(dir) = path.parent() {
                config.dataset = dir.join(&config.dataset);
            }
        }
        Ok(config)
    }

    /// Parse and validate a scenario from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.queries.is_empty() {
            bail!("scenario has no [[queries]]");
        }
        self.resolve_queries().map(|_| ())
    }

    /// Parse every query's bounds on the x-axis.
    pub fn resolve_queries(&self) -> Result<Vec<ResolvedQuery>> {
        self.queries
            .iter()
            .enumerate()
            .map(|(i, q)| {
                let first = self
                    .x_axis
                    .parse(&q.first)
                    .with_context(|| format!("query {}: first", i + 1))?;
                let last = self
                    .x_axis
                    .parse(&q.last)
                    .with_context(|| format!("query {}: last", i + 1))?;
                if first > last {
                    bail!("query {}: first '{}' is after last '{}'", i + 1, q.first, q.last);
                }
                let label = q
                    .label
                    .clone()
                    .unwrap_or_else(|| format!("[{}, {}]", q.first.trim(), q.last.trim()));
                Ok(ResolvedQuery {
                    label,
                    first,
                    last,
                    limit: q.limit,
                })
            })
            .collect()
    }
}
