//! Tests for layered configuration loading.

use super::*;
use crate::BackendKind;
use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Write JSON5 contents to a path, creating parent directories if needed.
fn write_json5(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("dir");
    }
    fs::write(path, contents).expect("write");
}

/// Project with a `.git` marker and a nested cwd.
fn project(temp: &TempDir) -> (PathBuf, PathBuf) {
    let project_root = temp.path().join("project");
    fs::create_dir_all(project_root.join(".git")).expect("git");
    let cwd = project_root.join("subdir");
    fs::create_dir_all(&cwd).expect("cwd");
    (project_root, cwd)
}

fn isolated_options(cwd: &Path) -> LayeredConfigOptions {
    let mut options = LayeredConfigOptions::new(cwd);
    options.system_config_path = None;
    options.user_config_path = None;
    options.requirements_path = None;
    options
}

#[test]
fn parse_minimal_config() {
    let config = MnemonConfig::load_from_str("{}").expect("config");
    assert_eq!(config, MnemonConfig::default());
    assert_eq!(config.store.dimension, 384);
    assert_eq!(config.store.capacity, 10_000);
    assert_eq!(config.store.backend, BackendKind::Auto);
    assert_eq!(config.consolidation.weights.recency, 0.4);
    assert_eq!(config.consolidation.schedule.interval_secs, 300);
    assert!(config.snapshot.load_on_start);
}

#[test]
fn parses_full_document() {
    let json5 = r#"{
        store: {
            dimension: 4,
            capacity: 2,
            backend: "fallback",
            similarity_threshold: 0.25,
            exact_threads: null,
        },
        consolidation: {
            weights: { redundancy: 0.0 },
            redundancy_probe: 0,
            schedule: { enabled: false },
        },
        snapshot: { path: "/var/lib/mnemon/store.jsonl", interval_secs: 60 },
    }"#;
    let config = MnemonConfig::load_from_str(json5).expect("config");
    assert_eq!(config.store.dimension, 4);
    assert_eq!(config.store.backend, BackendKind::Fallback);
    assert_eq!(config.store.similarity_threshold, Some(0.25));
    assert_eq!(config.consolidation.weights.redundancy, 0.0);
    assert_eq!(config.consolidation.weights.frequency, 0.3);
    assert!(!config.consolidation.schedule.enabled);
    assert_eq!(config.snapshot.interval_secs, Some(60));
}

#[test]
fn rejects_unknown_top_level_key() {
    let err = MnemonConfig::load_from_str("{ unexpected: true }").unwrap_err();
    assert!(format!("{err}").contains("unknown key"));
}

#[test]
fn rejects_invalid_backend() {
    let err = MnemonConfig::load_from_str(r#"{ store: { backend: "gpu" } }"#).unwrap_err();
    let msg = format!("{err}");
    assert!(msg.contains("store.backend"), "{msg}");
}

#[test]
fn rejects_zero_dimension() {
    let err = MnemonConfig::load_from_str("{ store: { dimension: 0 } }").unwrap_err();
    assert!(format!("{err}").contains("store.dimension"));
}

#[test]
fn rejects_out_of_range_threshold() {
    let err =
        MnemonConfig::load_from_str("{ store: { similarity_threshold: 1.5 } }").unwrap_err();
    assert!(format!("{err}").contains("store.similarity_threshold"));
}

#[test]
fn rejects_negative_weight() {
    let err = MnemonConfig::load_from_str("{ consolidation: { weights: { outcome: -0.2 } } }")
        .unwrap_err();
    assert!(format!("{err}").contains("consolidation.weights.outcome"));
}

#[test]
fn rejects_zero_interval_when_schedule_enabled() {
    let err = MnemonConfig::load_from_str(
        "{ consolidation: { schedule: { enabled: true, interval_secs: 0 } } }",
    )
    .unwrap_err();
    assert!(format!("{err}").contains("consolidation.schedule.interval_secs"));
}

#[test]
fn snapshot_interval_requires_path() {
    let err = MnemonConfig::load_from_str("{ snapshot: { interval_secs: 30 } }").unwrap_err();
    assert!(format!("{err}").contains("requires snapshot.path"));
}

/// Ensure repo config takes precedence over cwd, project, user and system.
#[test]
fn layered_config_prefers_repo_over_cwd() {
    let temp = TempDir::new().expect("tmp");
    let (project_root, cwd) = project(&temp);

    let system_config = temp.path().join("system.json5");
    write_json5(&system_config, "{ store: { capacity: 1 } }");
    let user_config = temp.path().join("user.json5");
    write_json5(&user_config, "{ store: { capacity: 2 } }");
    write_json5(
        &project_root.join(DEFAULT_CONFIG_FILE),
        "{ store: { capacity: 3 } }",
    );
    write_json5(&cwd.join(DEFAULT_CONFIG_FILE), "{ store: { capacity: 4 } }");
    write_json5(
        &project_root
            .join(DEFAULT_CONFIG_DIR)
            .join(DEFAULT_CONFIG_FILE),
        "{ store: { capacity: 5, dimension: 8 } }",
    );

    let mut options = isolated_options(&cwd);
    options.system_config_path = Some(system_config);
    options.user_config_path = Some(user_config);

    let layered = MnemonConfig::load_layered_with_options(options).expect("layered");
    assert_eq!(layered.config.store.capacity, 5);
    assert_eq!(layered.config.store.dimension, 8);
    assert_eq!(layered.layers.len(), 5);
}

#[test]
fn requirements_lock_overrides() {
    let temp = TempDir::new().expect("tmp");
    let (_, cwd) = project(&temp);

    let system_config = temp.path().join("system.json5");
    write_json5(&system_config, "{ store: { capacity: 100 } }");
    let requirements = temp.path().join("requirements.json5");
    write_json5(&requirements, "{ store: { capacity: 50 } }");
    let runtime_config = temp.path().join("runtime.json5");
    write_json5(
        &runtime_config,
        "{ store: { capacity: 500, dimension: 16 } }",
    );

    let mut options = isolated_options(&cwd);
    options.system_config_path = Some(system_config);
    options.requirements_path = Some(requirements);
    options.runtime_paths = vec![runtime_config];

    let layered = MnemonConfig::load_layered_with_options(options).expect("layered");
    assert_eq!(layered.config.store.capacity, 50);
    assert_eq!(layered.config.store.dimension, 16);
}

#[test]
fn runtime_override_wins_without_constraints() {
    let temp = TempDir::new().expect("tmp");
    let (_, cwd) = project(&temp);

    let system_config = temp.path().join("system.json5");
    write_json5(&system_config, r#"{ store: { backend: "exact" } }"#);
    let runtime_config = temp.path().join("runtime.json5");
    write_json5(&runtime_config, r#"{ store: { backend: "fallback" } }"#);

    let mut options = isolated_options(&cwd).with_runtime_path(&runtime_config);
    options.system_config_path = Some(system_config);

    let layered = MnemonConfig::load_layered_with_options(options).expect("layered");
    assert_eq!(layered.config.store.backend, BackendKind::Fallback);
}

#[test]
fn untrusted_local_layers_are_disabled() {
    let temp = TempDir::new().expect("tmp");
    let (_, cwd) = project(&temp);
    write_json5(&cwd.join(DEFAULT_CONFIG_FILE), "{ store: { capacity: 4 } }");

    let mut options = isolated_options(&cwd);
    options.trust_local_layers = false;

    let layered = MnemonConfig::load_layered_with_options(options).expect("layered");
    assert_eq!(layered.config.store.capacity, 10_000);
    let cwd_layer = layered
        .layers
        .iter()
        .find(|layer| layer.source == ConfigLayerSource::Cwd)
        .expect("cwd layer listed");
    assert!(cwd_layer.disabled_reason.is_some());
}

#[test]
fn relative_snapshot_path_resolves_against_cwd() {
    let temp = TempDir::new().expect("tmp");
    let (_, cwd) = project(&temp);
    write_json5(
        &cwd.join(DEFAULT_CONFIG_FILE),
        r#"{ snapshot: { path: "data/store.jsonl" } }"#,
    );

    let layered = MnemonConfig::load_layered_with_options(isolated_options(&cwd)).expect("layered");
    let path = layered.config.snapshot.path.expect("snapshot path");
    assert!(path.is_absolute());
    assert!(path.ends_with("subdir/data/store.jsonl"));
}

#[test]
fn layer_schema_errors_name_the_layer() {
    let temp = TempDir::new().expect("tmp");
    let (_, cwd) = project(&temp);
    write_json5(&cwd.join(DEFAULT_CONFIG_FILE), "{ store: { capacity: \"many\" } }");

    let err = MnemonConfig::load_layered_with_options(isolated_options(&cwd)).unwrap_err();
    let msg = format!("{err}");
    assert!(msg.contains("cwd("), "{msg}");
    assert!(msg.contains("store.capacity"), "{msg}");
}

#[test]
fn runtime_file_reapplies_over_repo_even_when_also_local() {
    let temp = TempDir::new().expect("tmp");
    let (project_root, cwd) = project(&temp);
    let cwd_config = cwd.join(DEFAULT_CONFIG_FILE);
    write_json5(&cwd_config, "{ store: { capacity: 4 } }");
    write_json5(
        &project_root
            .join(DEFAULT_CONFIG_DIR)
            .join(DEFAULT_CONFIG_FILE),
        "{ store: { capacity: 5 } }",
    );
    let requirements = temp.path().join("requirements.json5");
    write_json5(&requirements, "{ store: { dimension: 12 } }");

    let mut options = isolated_options(&cwd).with_runtime_path(&cwd_config);
    options.requirements_path = Some(requirements);

    let layered = MnemonConfig::load_layered_with_options(options).expect("layered");
    assert_eq!(layered.config.store.capacity, 4);
    assert_eq!(layered.config.store.dimension, 12);
    let sources: Vec<_> = layered.layers.iter().map(|layer| layer.source).collect();
    assert_eq!(
        sources,
        vec![
            ConfigLayerSource::Requirements,
            ConfigLayerSource::Cwd,
            ConfigLayerSource::Repo,
            ConfigLayerSource::Runtime,
        ]
    );
}
