//! Turns `LayeredConfigOptions` into the ordered list of files to consider.

use super::{ConfigLayerSource, DEFAULT_CONFIG_DIR, DEFAULT_CONFIG_FILE, LayeredConfigOptions};
use crate::ConfigError;
use directories::UserDirs;
use log::debug;
use std::path::{Path, PathBuf};

/// How a candidate file is treated when the stack reaches it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum Admission {
    /// Read when present, skipped when missing.
    IfPresent,
    /// Must exist.
    Required,
    /// Listed with this reason when present, never read.
    Refused(String),
}

#[derive(Debug, Clone)]
pub(super) struct Candidate {
    pub source: ConfigLayerSource,
    pub path: PathBuf,
    pub admission: Admission,
}

impl Candidate {
    fn new(source: ConfigLayerSource, path: PathBuf, admission: Admission) -> Self {
        Self {
            source,
            path,
            admission,
        }
    }
}

/// Every layer below requirements, lowest precedence first.
pub(super) fn candidates(options: &LayeredConfigOptions, cwd: &Path) -> Vec<Candidate> {
    let mut out = Vec::new();
    let global = [
        (ConfigLayerSource::System, &options.system_config_path),
        (ConfigLayerSource::User, &options.user_config_path),
    ];
    for (source, path) in global {
        if let Some(path) = path {
            out.push(Candidate::new(source, path.clone(), Admission::IfPresent));
        }
    }

    let local = if options.trust_local_layers {
        Admission::IfPresent
    } else {
        Admission::Refused("local layers are not trusted".to_string())
    };
    let root = project_root(cwd, &options.project_root_markers);
    match root.as_deref() {
        Some(root) => debug!("project root detected (path={})", root.display()),
        None => debug!("no project root above {}", cwd.display()),
    }
    if let Some(root) = root.as_deref() {
        out.push(Candidate::new(
            ConfigLayerSource::Project,
            root.join(DEFAULT_CONFIG_FILE),
            local.clone(),
        ));
    }
    out.push(Candidate::new(
        ConfigLayerSource::Cwd,
        cwd.join(DEFAULT_CONFIG_FILE),
        local.clone(),
    ));
    if let Some(root) = root.as_deref() {
        out.push(Candidate::new(
            ConfigLayerSource::Repo,
            root.join(DEFAULT_CONFIG_DIR).join(DEFAULT_CONFIG_FILE),
            local,
        ));
    }

    for path in &options.runtime_paths {
        out.push(Candidate::new(
            ConfigLayerSource::Runtime,
            path.clone(),
            Admission::Required,
        ));
    }
    out
}

pub(super) fn user_config_path() -> Option<PathBuf> {
    let dirs = UserDirs::new()?;
    Some(dirs.home_dir().join(DEFAULT_CONFIG_DIR).join(DEFAULT_CONFIG_FILE))
}

/// Canonical form of `path`, or `path` itself when it does not exist yet.
pub(super) fn normalize_path(path: &Path) -> Result<PathBuf, ConfigError> {
    match path.canonicalize() {
        Ok(path) => Ok(path),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(path.to_path_buf()),
        Err(err) => Err(ConfigError::ReadFailed(err)),
    }
}

fn project_root(cwd: &Path, markers: &[String]) -> Option<PathBuf> {
    cwd.ancestors()
        .find(|dir| markers.iter().any(|marker| dir.join(marker).exists()))
        .map(Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn sources(candidates: &[Candidate]) -> Vec<ConfigLayerSource> {
        candidates.iter().map(|candidate| candidate.source).collect()
    }

    #[test]
    fn without_project_root_only_cwd_is_local() {
        let temp = TempDir::new().expect("tmp");
        let mut options = LayeredConfigOptions::new(temp.path());
        options.system_config_path = None;
        options.user_config_path = None;
        options.project_root_markers = vec!["no-such-marker".to_string()];
        let found = candidates(&options, temp.path());
        assert_eq!(sources(&found), vec![ConfigLayerSource::Cwd]);
    }

    #[test]
    fn runtime_paths_come_last_and_are_required() {
        let temp = TempDir::new().expect("tmp");
        std::fs::create_dir(temp.path().join(".git")).expect("git");
        let options = LayeredConfigOptions::new(temp.path())
            .with_runtime_path(temp.path().join("a.json5"))
            .with_runtime_path(temp.path().join("b.json5"));
        let found = candidates(&options, temp.path());
        let tail: Vec<_> = found.iter().rev().take(2).collect();
        assert!(tail.iter().all(|c| c.source == ConfigLayerSource::Runtime));
        assert!(tail.iter().all(|c| c.admission == Admission::Required));
        assert!(tail[0].path.ends_with("b.json5"));
        assert_eq!(
            sources(&found[found.len() - 5..found.len() - 2]),
            vec![
                ConfigLayerSource::Project,
                ConfigLayerSource::Cwd,
                ConfigLayerSource::Repo,
            ]
        );
    }

    #[test]
    fn untrusted_local_candidates_are_refused() {
        let temp = TempDir::new().expect("tmp");
        let mut options = LayeredConfigOptions::new(temp.path());
        options.trust_local_layers = false;
        let found = candidates(&options, temp.path());
        for candidate in found.iter().filter(|c| c.source.is_local()) {
            assert!(matches!(candidate.admission, Admission::Refused(_)));
        }
        assert!(
            found
                .iter()
                .filter(|c| !c.source.is_local())
                .all(|c| c.admission == Admission::IfPresent)
        );
    }
}
