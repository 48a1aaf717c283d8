//! Importance terms used by consolidation passes.

use crate::model::{MAX_IMPORTANCE, MIN_IMPORTANCE, Metadata, MetadataValue, Record};
use crate::policy::{ConsolidationPolicy, ConsolidationWeights};
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Outcome term used when a record carries no signal.
pub const NEUTRAL_OUTCOME: f32 = 0.5;

/// Per-record scoring failure. The record is ranked for eviction first.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScoringError {
    /// Outcome metadata could not be read as a signal.
    #[error("malformed outcome signal `{key}`: {value}")]
    MalformedOutcome { key: String, value: String },
    /// A term evaluated to NaN or infinity.
    #[error("non-finite {0} term")]
    NonFinite(&'static str),
}

/// Exponential decay on time since last access. Future timestamps score 1.
pub fn recency_score(
    last_accessed_at: DateTime<Utc>,
    now: DateTime<Utc>,
    half_life: Duration,
) -> f32 {
    let elapsed = now.signed_duration_since(last_accessed_at);
    let Ok(elapsed) = elapsed.to_std() else {
        return 1.0;
    };
    let half_life = half_life.as_secs_f64();
    if half_life <= 0.0 {
        return if elapsed.is_zero() { 1.0 } else { 0.0 };
    }
    0.5_f64.powf(elapsed.as_secs_f64() / half_life) as f32
}

/// Saturating access-count term, `1 - e^(-n / saturation)`.
pub fn frequency_score(access_count: u64, saturation: f32) -> f32 {
    if saturation <= 0.0 {
        return if access_count > 0 { 1.0 } else { 0.0 };
    }
    let ratio = access_count as f64 / f64::from(saturation);
    (1.0 - (-ratio).exp()) as f32
}

/// Read the success/failure signal at `key`.
///
/// Booleans map to 1/0, numbers in `[0, 1]` are used as-is, and a few
/// conventional words are recognised. A missing key is neutral.
pub fn outcome_signal(metadata: &Metadata, key: &str) -> Result<f32, ScoringError> {
    let Some(value) = metadata.get(key) else {
        return Ok(NEUTRAL_OUTCOME);
    };
    let malformed = || ScoringError::MalformedOutcome {
        key: key.to_string(),
        value: value.to_string(),
    };
    match value {
        MetadataValue::Bool(flag) => Ok(if *flag { 1.0 } else { 0.0 }),
        MetadataValue::Integer(_) | MetadataValue::Float(_) => {
            let number = value.as_f64().ok_or_else(malformed)?;
            if number.is_finite() && (0.0..=1.0).contains(&number) {
                Ok(number as f32)
            } else {
                Err(malformed())
            }
        }
        MetadataValue::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
            "success" | "succeeded" | "ok" | "true" | "pass" | "passed" => Ok(1.0),
            "failure" | "failed" | "fail" | "error" | "false" => Ok(0.0),
            "" | "neutral" | "unknown" => Ok(NEUTRAL_OUTCOME),
            _ => Err(malformed()),
        },
    }
}

/// Weighted sum of the positive terms for one record.
pub fn base_score(
    record: &Record,
    policy: &ConsolidationPolicy,
    now: DateTime<Utc>,
) -> Result<f32, ScoringError> {
    let recency = recency_score(record.last_accessed_at, now, policy.recency_half_life);
    let frequency = frequency_score(record.access_count, policy.frequency_saturation);
    let outcome = outcome_signal(&record.metadata, &policy.outcome_key)?;
    let weights = &policy.weights;
    let base =
        weights.recency * recency + weights.frequency * frequency + weights.outcome * outcome;
    if !base.is_finite() {
        return Err(ScoringError::NonFinite("base"));
    }
    Ok(base)
}

/// Strongest near-duplicate, weighted by that neighbour's own base score.
///
/// `neighbors` holds `(normalized similarity, neighbour base score)` pairs.
pub fn redundancy_penalty(
    neighbors: &[(f32, f32)],
    threshold: f32,
    weights: &ConsolidationWeights,
) -> f32 {
    let scale = weights.positive_total();
    let scale = if scale > 0.0 { scale } else { 1.0 };
    neighbors
        .iter()
        .filter(|(similarity, _)| *similarity >= threshold)
        .map(|(similarity, base)| similarity * (base / scale).clamp(0.0, 1.0))
        .fold(0.0, f32::max)
}

/// Final importance, clamped into `[0, 1]`.
pub fn combine(
    base: f32,
    redundancy: f32,
    weights: &ConsolidationWeights,
) -> Result<f32, ScoringError> {
    let importance = base - weights.redundancy * redundancy;
    if !importance.is_finite() {
        return Err(ScoringError::NonFinite("importance"));
    }
    Ok(importance.clamp(MIN_IMPORTANCE, MAX_IMPORTANCE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use pretty_assertions::assert_eq;

    const WEEK: Duration = Duration::from_secs(7 * 24 * 60 * 60);

    #[test]
    fn recency_halves_per_half_life() {
        let now = Utc::now();
        assert_eq!(recency_score(now, now, WEEK), 1.0);
        let week_ago = now - ChronoDuration::days(7);
        assert!((recency_score(week_ago, now, WEEK) - 0.5).abs() < 1e-6);
        let two_weeks_ago = now - ChronoDuration::days(14);
        assert!((recency_score(two_weeks_ago, now, WEEK) - 0.25).abs() < 1e-6);
    }

    #[test]
    fn future_access_counts_as_fresh() {
        let now = Utc::now();
        assert_eq!(recency_score(now + ChronoDuration::hours(1), now, WEEK), 1.0);
    }

    #[test]
    fn frequency_has_diminishing_returns() {
        let first = frequency_score(1, 10.0);
        let tenth = frequency_score(10, 10.0);
        let hundredth = frequency_score(100, 10.0);
        assert_eq!(frequency_score(0, 10.0), 0.0);
        assert!(first < tenth && tenth < hundredth);
        assert!(hundredth < 1.0 + f32::EPSILON);
        assert!(hundredth < 100.0 * first);
    }

    #[test]
    fn outcome_signal_reads_common_shapes() {
        let mut metadata = Metadata::new();
        assert_eq!(outcome_signal(&metadata, "success"), Ok(NEUTRAL_OUTCOME));

        metadata.insert("success".to_string(), MetadataValue::Bool(false));
        assert_eq!(outcome_signal(&metadata, "success"), Ok(0.0));

        metadata.insert("success".to_string(), MetadataValue::Float(0.75));
        assert_eq!(outcome_signal(&metadata, "success"), Ok(0.75));

        metadata.insert("success".to_string(), MetadataValue::from("OK"));
        assert_eq!(outcome_signal(&metadata, "success"), Ok(1.0));
    }

    #[test]
    fn malformed_outcome_is_an_error() {
        let mut metadata = Metadata::new();
        metadata.insert("success".to_string(), MetadataValue::from("sometimes"));
        assert!(matches!(
            outcome_signal(&metadata, "success"),
            Err(ScoringError::MalformedOutcome { .. })
        ));

        metadata.insert("success".to_string(), MetadataValue::Integer(7));
        assert!(outcome_signal(&metadata, "success").is_err());
    }

    #[test]
    fn redundancy_ignores_neighbours_below_threshold() {
        let weights = ConsolidationWeights::default();
        assert_eq!(redundancy_penalty(&[(0.9, 0.9)], 0.95, &weights), 0.0);
        let penalty = redundancy_penalty(&[(0.9, 0.9), (0.99, 0.45)], 0.95, &weights);
        assert!((penalty - 0.99 * 0.5).abs() < 1e-6);
    }

    #[test]
    fn combine_clamps_into_unit_range() {
        let weights = ConsolidationWeights {
            redundancy: 5.0,
            ..ConsolidationWeights::default()
        };
        assert_eq!(combine(0.1, 1.0, &weights), Ok(0.0));
        assert_eq!(combine(f32::NAN, 0.0, &weights), Err(ScoringError::NonFinite("importance")));
    }
}
