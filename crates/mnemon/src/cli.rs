//! Offline maintenance commands over snapshot files.

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use log::info;
use mnemon_config::{LayeredConfigOptions, MnemonConfig};
use mnemon_memory::{
    ConsolidationEngine, FileSnapshotStore, MemoryStore, PassControl, SnapshotStore,
};
use mnemon_runtime::options::{consolidation_policy_from_config, store_options_from_config};
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Command-line options for the mnemon maintenance tool.
#[derive(Debug, Parser)]
#[command(name = "mnemon", version, about = "Inspect and maintain mnemon snapshots")]
pub struct Cli {
    /// Directory used for project and cwd config discovery
    #[arg(long, global = true)]
    pub cwd: Option<PathBuf>,
    /// Extra config file applied as a runtime layer (repeatable)
    #[arg(long = "config", global = true)]
    pub config: Vec<PathBuf>,
    /// Skip system, user and requirements config layers
    #[arg(long, global = true)]
    pub isolated: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the effective configuration and its layers
    Config,
    /// Load a snapshot and report store health
    Inspect {
        #[arg(long)]
        snapshot: Option<PathBuf>,
    },
    /// Load a snapshot and check index/record consistency
    Verify {
        #[arg(long)]
        snapshot: Option<PathBuf>,
    },
    /// Run one consolidation pass over a snapshot and write it back
    Consolidate {
        #[arg(long)]
        snapshot: Option<PathBuf>,
        /// Pass deadline in seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
        /// Report what would be evicted without saving
        #[arg(long)]
        dry_run: bool,
    },
}

/// Execute a command and return its JSON report.
pub fn run(cli: Cli) -> anyhow::Result<Value> {
    let cwd = match cli.cwd.clone() {
        Some(cwd) => cwd,
        None => std::env::current_dir().context("resolve current directory")?,
    };
    let mut options = LayeredConfigOptions::new(&cwd);
    if cli.isolated {
        options.system_config_path = None;
        options.user_config_path = None;
        options.requirements_path = None;
    }
    options.runtime_paths = cli.config.clone();
    let layered = MnemonConfig::load_layered_with_options(options)?;
    let config = layered.config;

    match cli.command {
        Command::Config => {
            let layers: Vec<Value> = layered
                .layers
                .iter()
                .map(|layer| {
                    json!({
                        "source": layer.source.to_string(),
                        "path": layer.path,
                        "disabled_reason": layer.disabled_reason,
                    })
                })
                .collect();
            Ok(json!({ "config": config, "layers": layers }))
        }
        Command::Inspect { snapshot } => {
            let path = snapshot_path(snapshot.as_deref(), &config)?;
            let (store, _) = open_store(&config, &path)?;
            Ok(json!({
                "snapshot": path,
                "health": store.health(),
            }))
        }
        Command::Verify { snapshot } => {
            let path = snapshot_path(snapshot.as_deref(), &config)?;
            let (store, _) = open_store(&config, &path)?;
            store
                .verify()
                .with_context(|| format!("snapshot {} failed verification", path.display()))?;
            Ok(json!({ "snapshot": path, "records": store.count(), "consistent": true }))
        }
        Command::Consolidate {
            snapshot,
            timeout_secs,
            dry_run,
        } => {
            let path = snapshot_path(snapshot.as_deref(), &config)?;
            let (store, snapshots) = open_store(&config, &path)?;
            let engine =
                ConsolidationEngine::new(consolidation_policy_from_config(&config.consolidation));
            let mut control = PassControl::unbounded();
            if let Some(secs) = timeout_secs {
                control = control.with_timeout(Duration::from_secs(secs));
            }
            let report = engine.run(&store, &control)?;
            if !dry_run {
                snapshots.save(&store.export()?)?;
                info!(
                    "consolidated snapshot written (path={}, evicted={})",
                    path.display(),
                    report.evicted.len()
                );
            }
            Ok(json!({
                "snapshot": path,
                "dry_run": dry_run,
                "report": report,
            }))
        }
    }
}

fn snapshot_path(arg: Option<&Path>, config: &MnemonConfig) -> anyhow::Result<PathBuf> {
    match arg.map(Path::to_path_buf).or_else(|| config.snapshot.path.clone()) {
        Some(path) => Ok(path),
        None => bail!("no snapshot path given and snapshot.path is not configured"),
    }
}

/// Build a store from config and fill it from the snapshot at `path`.
fn open_store(
    config: &MnemonConfig,
    path: &Path,
) -> anyhow::Result<(MemoryStore, FileSnapshotStore)> {
    let snapshots = FileSnapshotStore::new(path)?;
    let Some(snapshot) = snapshots.load()? else {
        bail!("snapshot {} does not exist", path.display());
    };
    let store = MemoryStore::new(store_options_from_config(&config.store))?;
    store
        .import(snapshot)
        .with_context(|| format!("import snapshot {}", path.display()))?;
    Ok((store, snapshots))
}
