//! Layered `mnemon.json5` loading.
//!
//! Layers are discovered in merge order (system, user, project, cwd, repo,
//! runtime), each schema-checked on its own, then folded into one JSON value.
//! A requirements file seeds the fold and pins every leaf it sets.

mod discovery;
mod merge;
mod schema;
mod stack;

#[cfg(test)]
mod tests;

use crate::{ConfigError, MnemonConfig};
use log::{debug, info};
use serde_json::Value;
use stack::LayerStack;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// File name looked up in every local layer.
const DEFAULT_CONFIG_FILE: &str = "mnemon.json5";
/// Directory holding the user and repo layers.
const DEFAULT_CONFIG_DIR: &str = ".mnemon";
const DEFAULT_PROJECT_ROOT_MARKERS: &[&str] = &[".git"];
/// Upper bound on neighbours probed per record during consolidation.
const MAX_REDUNDANCY_PROBE: usize = 64;

#[cfg(not(windows))]
const SYSTEM_CONFIG_PATH: &str = "/etc/mnemon/mnemon.json5";
#[cfg(not(windows))]
const SYSTEM_REQUIREMENTS_PATH: &str = "/etc/mnemon/requirements.json5";
#[cfg(windows)]
const SYSTEM_CONFIG_PATH: &str = "C:\\ProgramData\\mnemon\\mnemon.json5";
#[cfg(windows)]
const SYSTEM_REQUIREMENTS_PATH: &str = "C:\\ProgramData\\mnemon\\requirements.json5";

/// Effective config plus what each considered layer contributed.
#[derive(Debug, Clone)]
pub struct LayeredConfig {
    pub config: MnemonConfig,
    pub layers: Vec<ConfigLayer>,
}

/// Where a layer came from. Variants are listed from lowest to highest precedence,
/// except `Requirements`, which pins values instead of overriding them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigLayerSource {
    Requirements,
    System,
    User,
    /// `mnemon.json5` at the detected project root.
    Project,
    /// `mnemon.json5` in the working directory.
    Cwd,
    /// `.mnemon/mnemon.json5` under the project root.
    Repo,
    /// Files passed explicitly by the caller.
    Runtime,
}

impl ConfigLayerSource {
    /// Short lowercase name used in logs and field errors.
    pub fn name(self) -> &'static str {
        match self {
            Self::Requirements => "requirements",
            Self::System => "system",
            Self::User => "user",
            Self::Project => "project",
            Self::Cwd => "cwd",
            Self::Repo => "repo",
            Self::Runtime => "runtime",
        }
    }

    /// Project, cwd and repo layers live inside the checkout and need trust.
    pub fn is_local(self) -> bool {
        matches!(self, Self::Project | Self::Cwd | Self::Repo)
    }
}

impl fmt::Display for ConfigLayerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One entry of the layer report.
#[derive(Debug, Clone)]
pub struct ConfigLayer {
    pub source: ConfigLayerSource,
    pub path: Option<PathBuf>,
    /// Set when the file exists but was not read.
    pub disabled_reason: Option<String>,
}

/// Where to look for layers.
#[derive(Debug, Clone)]
pub struct LayeredConfigOptions {
    /// Working directory; anchors local layers and relative snapshot paths.
    pub cwd: PathBuf,
    pub system_config_path: Option<PathBuf>,
    /// Defaults to `~/.mnemon/mnemon.json5`.
    pub user_config_path: Option<PathBuf>,
    pub requirements_path: Option<PathBuf>,
    /// Applied last, in order. Each must exist.
    pub runtime_paths: Vec<PathBuf>,
    /// Files or directories whose presence marks the project root.
    pub project_root_markers: Vec<String>,
    /// Read project, cwd and repo layers. When false they are listed as disabled.
    pub trust_local_layers: bool,
}

impl LayeredConfigOptions {
    /// Default system, user and requirements locations for `cwd`.
    pub fn new(cwd: impl AsRef<Path>) -> Self {
        Self {
            cwd: cwd.as_ref().to_path_buf(),
            system_config_path: Some(PathBuf::from(SYSTEM_CONFIG_PATH)),
            user_config_path: discovery::user_config_path(),
            requirements_path: Some(PathBuf::from(SYSTEM_REQUIREMENTS_PATH)),
            runtime_paths: Vec::new(),
            project_root_markers: DEFAULT_PROJECT_ROOT_MARKERS
                .iter()
                .map(|marker| marker.to_string())
                .collect(),
            trust_local_layers: true,
        }
    }

    pub fn with_runtime_path(mut self, path: impl AsRef<Path>) -> Self {
        self.runtime_paths.push(path.as_ref().to_path_buf());
        self
    }
}

impl MnemonConfig {
    /// Load one file with no layering.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!("loading config file (path={})", path.display());
        let value: Value = json5::from_str(&fs::read_to_string(path)?)?;
        decode(value, &path.display().to_string())
    }

    /// Parse JSON5 text with no layering.
    pub fn load_from_str(contents: &str) -> Result<Self, ConfigError> {
        debug!("loading config text (len={})", contents.len());
        decode(json5::from_str(contents)?, "config")
    }

    /// Load the layer stack from the default locations around `cwd`.
    pub fn load_layered(cwd: impl AsRef<Path>) -> Result<LayeredConfig, ConfigError> {
        Self::load_layered_with_options(LayeredConfigOptions::new(cwd))
    }

    /// Load the layer stack described by `options`.
    ///
    /// A relative `snapshot.path` in the result is resolved against the cwd.
    pub fn load_layered_with_options(
        options: LayeredConfigOptions,
    ) -> Result<LayeredConfig, ConfigError> {
        let cwd = discovery::normalize_path(&options.cwd)?;
        let mut stack = LayerStack::constrained_by(options.requirements_path.as_deref())?;
        for candidate in discovery::candidates(&options, &cwd) {
            stack.push(candidate)?;
        }
        let (merged, layers) = stack.finish();

        let mut config = decode(merged, "effective")?;
        if let Some(path) = config.snapshot.path.as_mut().filter(|path| path.is_relative()) {
            *path = cwd.join(&*path);
        }
        info!(
            "layered config loaded (layers={}, dimension={}, capacity={}, cwd={})",
            layers.len(),
            config.store.dimension,
            config.store.capacity,
            cwd.display()
        );
        Ok(LayeredConfig { config, layers })
    }

    /// Validate configuration invariants that cannot be expressed in serde.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let store = &self.store;
        if store.dimension == 0 {
            return Err(ConfigError::field("store.dimension", "must be positive"));
        }
        if store.capacity == 0 {
            return Err(ConfigError::field("store.capacity", "must be positive"));
        }
        if let Some(threshold) = store.similarity_threshold {
            ensure_unit_range(threshold, "store.similarity_threshold")?;
        }
        if !(store.compaction_threshold > 0.0 && store.compaction_threshold <= 1.0) {
            return Err(ConfigError::field(
                "store.compaction_threshold",
                "must be in (0, 1]",
            ));
        }
        if store.exact_threads == Some(0) {
            return Err(ConfigError::field("store.exact_threads", "must be positive"));
        }

        let consolidation = &self.consolidation;
        let weights = &consolidation.weights;
        for (name, value) in [
            ("recency", weights.recency),
            ("frequency", weights.frequency),
            ("outcome", weights.outcome),
            ("redundancy", weights.redundancy),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::field(
                    format!("consolidation.weights.{name}"),
                    "must be a non-negative number",
                ));
            }
        }
        if consolidation.recency_half_life_secs == 0 {
            return Err(ConfigError::field(
                "consolidation.recency_half_life_secs",
                "must be positive",
            ));
        }
        if !(consolidation.frequency_saturation.is_finite()
            && consolidation.frequency_saturation > 0.0)
        {
            return Err(ConfigError::field(
                "consolidation.frequency_saturation",
                "must be positive",
            ));
        }
        if consolidation.outcome_key.trim().is_empty() {
            return Err(ConfigError::field(
                "consolidation.outcome_key",
                "must not be empty",
            ));
        }
        ensure_unit_range(
            consolidation.redundancy_threshold,
            "consolidation.redundancy_threshold",
        )?;
        if consolidation.redundancy_probe > MAX_REDUNDANCY_PROBE {
            return Err(ConfigError::field(
                "consolidation.redundancy_probe",
                format!("must be at most {MAX_REDUNDANCY_PROBE}"),
            ));
        }
        if consolidation.schedule.enabled && consolidation.schedule.interval_secs == 0 {
            return Err(ConfigError::field(
                "consolidation.schedule.interval_secs",
                "must be positive when the schedule is enabled",
            ));
        }

        if self.snapshot.interval_secs == Some(0) {
            return Err(ConfigError::field("snapshot.interval_secs", "must be positive"));
        }
        if self.snapshot.interval_secs.is_some() && self.snapshot.path.is_none() {
            return Err(ConfigError::field(
                "snapshot.interval_secs",
                "requires snapshot.path",
            ));
        }

        Ok(())
    }
}

fn ensure_unit_range(value: f32, path: &str) -> Result<(), ConfigError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::field(path, "must be in [0, 1]"))
    }
}

/// Schema-check, deserialize and validate one complete document.
fn decode(value: Value, label: &str) -> Result<MnemonConfig, ConfigError> {
    schema::validate_layer_schema(&value, label)?;
    let config: MnemonConfig = serde_json::from_value(value)?;
    config.validate()?;
    Ok(config)
}
