//! Configuration schema for mnemon.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root config for a mnemon store and its maintenance runtime.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct MnemonConfig {
    #[serde(default, rename = "$schema")]
    pub schema: Option<String>,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub consolidation: ConsolidationConfig,
    #[serde(default)]
    pub snapshot: SnapshotConfig,
}

impl MnemonConfig {
    /// Start building a config programmatically with defaults applied.
    pub fn builder() -> MnemonConfigBuilder {
        MnemonConfigBuilder::new()
    }
}

/// Builder for assembling a `MnemonConfig` in code.
#[derive(Debug, Default, Clone)]
pub struct MnemonConfigBuilder {
    config: MnemonConfig,
}

impl MnemonConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: MnemonConfig::default(),
        }
    }

    /// Replace the store configuration.
    pub fn store(mut self, store: StoreConfig) -> Self {
        self.config.store = store;
        self
    }

    /// Replace the consolidation configuration.
    pub fn consolidation(mut self, consolidation: ConsolidationConfig) -> Self {
        self.config.consolidation = consolidation;
        self
    }

    /// Replace the snapshot configuration.
    pub fn snapshot(mut self, snapshot: SnapshotConfig) -> Self {
        self.config.snapshot = snapshot;
        self
    }

    pub fn build(self) -> MnemonConfig {
        self.config
    }
}

/// Vector index backend selection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Exact,
    Fallback,
    /// Exact when it starts, fallback otherwise.
    #[default]
    Auto,
}

/// Store shape and search defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoreConfig {
    #[serde(default = "default_dimension")]
    pub dimension: usize,
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    #[serde(default)]
    pub backend: BackendKind,
    #[serde(default)]
    pub similarity_threshold: Option<f32>,
    #[serde(default = "default_compaction_threshold")]
    pub compaction_threshold: f32,
    #[serde(default)]
    pub exact_threads: Option<usize>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dimension: default_dimension(),
            capacity: default_capacity(),
            backend: BackendKind::default(),
            similarity_threshold: None,
            compaction_threshold: default_compaction_threshold(),
            exact_threads: None,
        }
    }
}

fn default_dimension() -> usize {
    384
}

fn default_capacity() -> usize {
    10_000
}

fn default_compaction_threshold() -> f32 {
    0.3
}

/// Importance weights (w1..w4).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WeightsConfig {
    pub recency: f32,
    pub frequency: f32,
    pub outcome: f32,
    pub redundancy: f32,
}

impl Default for WeightsConfig {
    fn default() -> Self {
        Self {
            recency: 0.4,
            frequency: 0.3,
            outcome: 0.2,
            redundancy: 0.1,
        }
    }
}

/// Periodic consolidation trigger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScheduleConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_interval_secs(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_interval_secs() -> u64 {
    300
}

/// Importance scoring and scheduling.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConsolidationConfig {
    pub weights: WeightsConfig,
    pub recency_half_life_secs: u64,
    pub frequency_saturation: f32,
    pub outcome_key: String,
    pub redundancy_threshold: f32,
    /// Neighbours checked per record; 0 disables the redundancy term.
    pub redundancy_probe: usize,
    pub schedule: ScheduleConfig,
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        Self {
            weights: WeightsConfig::default(),
            recency_half_life_secs: 7 * 24 * 60 * 60,
            frequency_saturation: 10.0,
            outcome_key: "success".to_string(),
            redundancy_threshold: 0.95,
            redundancy_probe: 8,
            schedule: ScheduleConfig::default(),
        }
    }
}

/// Snapshot persistence. Disabled when `path` is unset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SnapshotConfig {
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub interval_secs: Option<u64>,
    #[serde(default = "default_true")]
    pub load_on_start: bool,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            path: None,
            interval_secs: None,
            load_on_start: true,
        }
    }
}
