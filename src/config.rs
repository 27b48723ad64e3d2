use std::env;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::binning::BinningConfig;
use crate::elo::EloConfig;
use crate::errors::ConfigError;
use crate::forest::ForestConfig;
use crate::kmeans::ClusterConfig;
use crate::parallel;

/// Every tunable of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub elo: EloConfig,
    pub binning: BinningConfig,
    pub cluster: ClusterConfig,
    pub forest: ForestConfig,
    /// Worker threads for per-axis and per-tree fits.
    pub parallelism: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            elo: EloConfig::default(),
            binning: BinningConfig::default(),
            cluster: ClusterConfig::default(),
            forest: ForestConfig::default(),
            parallelism: parallel::default_threads(),
        }
    }
}

impl PipelineConfig {
    /// Read a JSON config. Missing fields keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        cfg.apply_env();
        cfg
    }

    pub fn apply_env(&mut self) {
        if let Some(threads) = env_parse::<usize>("SCOUT_PARALLELISM") {
            self.parallelism = threads.clamp(1, parallel::MAX_THREADS);
        }
        if let Some(k) = env_parse::<usize>("SCOUT_CLUSTER_K") {
            self.cluster.k = k.clamp(1, 32);
        }
        if let Some(seed) = env_parse::<u64>("SCOUT_SEED") {
            self.cluster.seed = seed;
            self.forest.seed = seed;
        }
        if let Some(iterations) = env_parse::<usize>("SCOUT_ELO_ITERATIONS") {
            self.elo.iterations = iterations.clamp(1, 50);
        }
        if let Some(trees) = env_parse::<usize>("SCOUT_FOREST_TREES") {
            self.forest.n_trees = trees.clamp(1, 1024);
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|val| val.trim().parse::<T>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let cfg: PipelineConfig =
            serde_json::from_str(r#"{"cluster": {"k": 3, "seed": 7, "n_init": 2, "max_iter": 50, "tolerance": 0.001}}"#)
                .unwrap();
        assert_eq!(cfg.cluster.k, 3);
        assert_eq!(cfg.elo, EloConfig::default());
        assert_eq!(cfg.forest.n_trees, 64);
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = PipelineConfig::load("/nonexistent/scout.json").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
