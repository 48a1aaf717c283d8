use chrono::{Duration, Utc};
use clap::Parser;
use mnemon::cli::{Cli, run};
use mnemon::memory::{FileSnapshotStore, Snapshot, SnapshotStore};
use mnemon_test_utils::{EntryBuilder, unit};
use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write_config(dir: &Path, capacity: usize) -> String {
    let path = dir.join("runtime.json5");
    fs::write(
        &path,
        format!(
            r#"{{ store: {{ dimension: 4, capacity: {capacity}, backend: "fallback" }},
                consolidation: {{ redundancy_probe: 0 }} }}"#
        ),
    )
    .expect("write config");
    path.display().to_string()
}

fn seed_snapshot(path: &Path) -> Vec<String> {
    let now = Utc::now();
    let entries = vec![
        EntryBuilder::new(unit(4, 0))
            .text("stale")
            .accessed_at(now - Duration::days(30))
            .build(),
        EntryBuilder::new(unit(4, 1))
            .text("busy")
            .access_count(20)
            .build(),
        EntryBuilder::new(unit(4, 2)).text("fresh").build(),
    ];
    let ids = entries.iter().map(|entry| entry.id.to_string()).collect();
    FileSnapshotStore::new(path)
        .expect("snapshot store")
        .save(&Snapshot::new(4, entries))
        .expect("save");
    ids
}

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(args).expect("parse")
}

#[test]
fn config_command_reports_runtime_layer() {
    let temp = TempDir::new().expect("tmp");
    let config = write_config(temp.path(), 7);
    let cwd = temp.path().display().to_string();
    let output = run(parse(&[
        "mnemon", "--isolated", "--cwd", &cwd, "--config", &config, "config",
    ]))
    .expect("run");
    assert_eq!(output["config"]["store"]["capacity"], 7);
    assert_eq!(output["config"]["store"]["backend"], "fallback");
    let layers = output["layers"].as_array().expect("layers");
    assert!(layers.iter().any(|layer| layer["source"] == "runtime"));
}

#[test]
fn inspect_reports_health() {
    let temp = TempDir::new().expect("tmp");
    let config = write_config(temp.path(), 10);
    let snapshot = temp.path().join("store.jsonl");
    seed_snapshot(&snapshot);
    let cwd = temp.path().display().to_string();
    let snapshot_arg = snapshot.display().to_string();
    let output = run(parse(&[
        "mnemon", "--isolated", "--cwd", &cwd, "--config", &config, "inspect", "--snapshot",
        &snapshot_arg,
    ]))
    .expect("run");
    assert_eq!(output["health"]["records"], 3);
    assert_eq!(output["health"]["over_capacity"], false);
    assert_eq!(output["health"]["read_only"], serde_json::Value::Null);
}

#[test]
fn verify_accepts_consistent_snapshot() {
    let temp = TempDir::new().expect("tmp");
    let config = write_config(temp.path(), 10);
    let snapshot = temp.path().join("store.jsonl");
    seed_snapshot(&snapshot);
    let cwd = temp.path().display().to_string();
    let snapshot_arg = snapshot.display().to_string();
    let output = run(parse(&[
        "mnemon", "--isolated", "--cwd", &cwd, "--config", &config, "verify", "--snapshot",
        &snapshot_arg,
    ]))
    .expect("run");
    assert_eq!(output["consistent"], true);
    assert_eq!(output["records"], 3);
}

#[test]
fn consolidate_evicts_and_saves() {
    let temp = TempDir::new().expect("tmp");
    let config = write_config(temp.path(), 2);
    let snapshot = temp.path().join("store.jsonl");
    let ids = seed_snapshot(&snapshot);
    let cwd = temp.path().display().to_string();
    let snapshot_arg = snapshot.display().to_string();
    let output = run(parse(&[
        "mnemon", "--isolated", "--cwd", &cwd, "--config", &config, "consolidate",
        "--snapshot", &snapshot_arg,
    ]))
    .expect("run");
    assert_eq!(output["report"]["outcome"], "completed");
    assert_eq!(output["report"]["evicted"][0], ids[0].as_str());

    let saved = FileSnapshotStore::new(&snapshot)
        .expect("snapshot store")
        .load()
        .expect("load")
        .expect("snapshot");
    assert_eq!(saved.len(), 2);
}

#[test]
fn dry_run_leaves_snapshot_untouched() {
    let temp = TempDir::new().expect("tmp");
    let config = write_config(temp.path(), 1);
    let snapshot = temp.path().join("store.jsonl");
    seed_snapshot(&snapshot);
    let before = fs::read_to_string(&snapshot).expect("read");
    let cwd = temp.path().display().to_string();
    let snapshot_arg = snapshot.display().to_string();
    let output = run(parse(&[
        "mnemon", "--isolated", "--cwd", &cwd, "--config", &config, "consolidate",
        "--snapshot", &snapshot_arg, "--dry-run",
    ]))
    .expect("run");
    assert_eq!(output["report"]["evicted"].as_array().map(Vec::len), Some(2));
    assert_eq!(fs::read_to_string(&snapshot).expect("read"), before);
}

#[test]
fn missing_snapshot_path_is_an_error() {
    let temp = TempDir::new().expect("tmp");
    let config = write_config(temp.path(), 2);
    let cwd = temp.path().display().to_string();
    let err = run(parse(&[
        "mnemon", "--isolated", "--cwd", &cwd, "--config", &config, "inspect",
    ]))
    .unwrap_err();
    assert!(err.to_string().contains("snapshot.path"), "{err}");
}
