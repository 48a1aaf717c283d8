//! Folds candidate layers into one JSON value under requirement pins.

use super::discovery::{Admission, Candidate};
use super::{ConfigLayer, ConfigLayerSource, merge, schema};
use crate::ConfigError;
use log::{debug, warn};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

pub(super) struct LayerStack {
    merged: Value,
    pins: Option<Value>,
    report: Vec<ConfigLayer>,
    /// Canonical paths already folded, so a file reached twice applies once.
    folded: HashSet<PathBuf>,
}

impl LayerStack {
    /// Start an empty stack, seeded and pinned by the requirements file if it exists.
    pub fn constrained_by(requirements: Option<&Path>) -> Result<Self, ConfigError> {
        let mut stack = Self {
            merged: Value::Object(Map::new()),
            pins: None,
            report: Vec::new(),
            folded: HashSet::new(),
        };
        let Some(path) = requirements.filter(|path| path.exists()) else {
            return Ok(stack);
        };
        let pins = read_layer(ConfigLayerSource::Requirements, path)?;
        debug!("requirements pinned (path={})", path.display());
        merge::merge_values(&mut stack.merged, &pins);
        stack.pins = Some(pins);
        stack.report.push(ConfigLayer {
            source: ConfigLayerSource::Requirements,
            path: Some(path.to_path_buf()),
            disabled_reason: None,
        });
        Ok(stack)
    }

    pub fn push(&mut self, candidate: Candidate) -> Result<(), ConfigError> {
        let Candidate {
            source,
            path,
            admission,
        } = candidate;
        if admission != Admission::Required && !path.exists() {
            debug!("layer absent (source={source}, path={})", path.display());
            return Ok(());
        }
        // Runtime files always apply, even when a lower layer named the same file.
        if source != ConfigLayerSource::Runtime && !self.folded.insert(canonical(&path)) {
            debug!("layer already applied (source={source}, path={})", path.display());
            return Ok(());
        }
        if let Admission::Refused(reason) = admission {
            warn!(
                "layer disabled (source={source}, path={}, reason={reason})",
                path.display()
            );
            self.report.push(ConfigLayer {
                source,
                path: Some(path),
                disabled_reason: Some(reason),
            });
            return Ok(());
        }

        let value = read_layer(source, &path)?;
        merge::merge_locked(&mut self.merged, &value, self.pins.as_ref());
        debug!("layer applied (source={source}, path={})", path.display());
        self.report.push(ConfigLayer {
            source,
            path: Some(path),
            disabled_reason: None,
        });
        Ok(())
    }

    /// Merged document and the report of every listed layer.
    pub fn finish(self) -> (Value, Vec<ConfigLayer>) {
        (self.merged, self.report)
    }
}

/// Parse one file and check it against the schema, naming it in errors.
fn read_layer(source: ConfigLayerSource, path: &Path) -> Result<Value, ConfigError> {
    let value: Value = json5::from_str(&fs::read_to_string(path)?)?;
    schema::validate_layer_schema(&value, &format!("{source}({})", path.display()))?;
    Ok(value)
}

fn canonical(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}
