//! Config mapping into store, policy and scheduler settings.

use crate::scheduler::SchedulerSettings;
use mnemon_config::{BackendKind, ConsolidationConfig, MnemonConfig, StoreConfig};
use mnemon_memory::{
    BackendPreference, ConsolidationPolicy, ConsolidationWeights, IndexOptions, StoreOptions,
};
use std::time::Duration;

/// Translate store config into store construction options.
pub fn store_options_from_config(config: &StoreConfig) -> StoreOptions {
    StoreOptions {
        dimension: config.dimension,
        capacity: config.capacity,
        backend: backend_from_config(config.backend),
        similarity_threshold: config.similarity_threshold,
        compaction_threshold: config.compaction_threshold,
        index: IndexOptions {
            exact_threads: config.exact_threads,
        },
    }
}

/// Translate consolidation config into a scoring policy.
pub fn consolidation_policy_from_config(config: &ConsolidationConfig) -> ConsolidationPolicy {
    ConsolidationPolicy {
        weights: ConsolidationWeights {
            recency: config.weights.recency,
            frequency: config.weights.frequency,
            outcome: config.weights.outcome,
            redundancy: config.weights.redundancy,
        },
        recency_half_life: Duration::from_secs(config.recency_half_life_secs),
        frequency_saturation: config.frequency_saturation,
        outcome_key: config.outcome_key.clone(),
        redundancy_threshold: config.redundancy_threshold,
        redundancy_probe: config.redundancy_probe,
    }
}

/// Scheduler intervals; a disabled schedule still reacts to capacity triggers.
pub fn scheduler_settings_from_config(config: &MnemonConfig) -> SchedulerSettings {
    let schedule = &config.consolidation.schedule;
    SchedulerSettings {
        consolidation_interval: schedule
            .enabled
            .then(|| Duration::from_secs(schedule.interval_secs)),
        snapshot_interval: config
            .snapshot
            .path
            .as_ref()
            .and(config.snapshot.interval_secs)
            .map(Duration::from_secs),
        pass_timeout: None,
    }
}

fn backend_from_config(kind: BackendKind) -> BackendPreference {
    match kind {
        BackendKind::Exact => BackendPreference::Exact,
        BackendKind::Fallback => BackendPreference::Fallback,
        BackendKind::Auto => BackendPreference::Auto,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mnemon_config::{ScheduleConfig, SnapshotConfig};
    use pretty_assertions::assert_eq;

    #[test]
    fn store_options_carry_every_field() {
        let config = StoreConfig {
            dimension: 8,
            capacity: 3,
            backend: BackendKind::Fallback,
            similarity_threshold: Some(0.4),
            compaction_threshold: 0.5,
            exact_threads: Some(2),
        };
        let options = store_options_from_config(&config);
        assert_eq!(options.dimension, 8);
        assert_eq!(options.capacity, 3);
        assert_eq!(options.backend, BackendPreference::Fallback);
        assert_eq!(options.similarity_threshold, Some(0.4));
        assert_eq!(options.compaction_threshold, 0.5);
        assert_eq!(options.index.exact_threads, Some(2));
    }

    #[test]
    fn default_policy_matches_library_default() {
        let policy = consolidation_policy_from_config(&ConsolidationConfig::default());
        let expected = ConsolidationPolicy::default();
        assert_eq!(policy.weights, expected.weights);
        assert_eq!(policy.recency_half_life, expected.recency_half_life);
        assert_eq!(policy.outcome_key, expected.outcome_key);
        assert_eq!(policy.redundancy_probe, expected.redundancy_probe);
    }

    #[test]
    fn disabled_schedule_has_no_interval() {
        let mut config = MnemonConfig::default();
        config.consolidation.schedule = ScheduleConfig {
            enabled: false,
            interval_secs: 10,
        };
        let settings = scheduler_settings_from_config(&config);
        assert_eq!(settings.consolidation_interval, None);
        assert_eq!(settings.snapshot_interval, None);
    }

    #[test]
    fn snapshot_interval_needs_a_path() {
        let mut config = MnemonConfig::default();
        config.snapshot = SnapshotConfig {
            path: Some("store.jsonl".into()),
            interval_secs: Some(30),
            load_on_start: false,
        };
        let settings = scheduler_settings_from_config(&config);
        assert_eq!(settings.snapshot_interval, Some(Duration::from_secs(30)));
        assert_eq!(
            settings.consolidation_interval,
            Some(Duration::from_secs(300))
        );
    }
}
