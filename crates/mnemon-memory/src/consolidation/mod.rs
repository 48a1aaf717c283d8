//! Capacity enforcement by importance scoring and eviction.
//!
//! A pass walks `Idle → Scoring → Sorting → Evicting → Idle`. Passes never
//! overlap: a trigger that arrives while one is running is reported as
//! [`PassOutcome::Skipped`]. The engine only talks to the store through its
//! public operations, so every eviction goes through [`MemoryStore::remove`].

pub mod scoring;

use crate::error::MemoryError;
use crate::model::{MIN_IMPORTANCE, RecordId};
use crate::policy::ConsolidationPolicy;
use crate::store::MemoryStore;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use scoring::{ScoringError, base_score, combine, redundancy_penalty};
use serde::Serialize;
use std::cmp::Ordering as CmpOrdering;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Scoring rounds per pass when concurrent adds keep the store over capacity.
const MAX_ROUNDS: usize = 4;

/// Phase of the running pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum PassState {
    Idle = 0,
    Scoring = 1,
    Sorting = 2,
    Evicting = 3,
}

impl PassState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Scoring,
            2 => Self::Sorting,
            3 => Self::Evicting,
            _ => Self::Idle,
        }
    }
}

/// How a pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PassOutcome {
    Completed,
    /// Another pass was already running.
    Skipped,
    /// Deadline reached or cancelled between records.
    Interrupted,
    /// Every round ran but concurrent adds kept the store over capacity.
    OverCapacity,
}

/// A record whose importance could not be computed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoringFailure {
    pub id: RecordId,
    pub reason: String,
}

/// Summary of one pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsolidationReport {
    pub outcome: PassOutcome,
    /// Records scored in the last round.
    pub scored: usize,
    /// Evicted ids in eviction order.
    pub evicted: Vec<RecordId>,
    pub failures: Vec<ScoringFailure>,
    /// Record count when the pass ended.
    pub remaining: usize,
    pub capacity: usize,
}

impl ConsolidationReport {
    fn skipped(store: &MemoryStore) -> Self {
        Self {
            outcome: PassOutcome::Skipped,
            scored: 0,
            evicted: Vec::new(),
            failures: Vec::new(),
            remaining: store.count(),
            capacity: store.capacity(),
        }
    }
}

/// Deadline and cancellation checked between records.
#[derive(Debug, Clone, Default)]
pub struct PassControl {
    deadline: Option<Instant>,
    cancel: Option<Arc<AtomicBool>>,
}

impl PassControl {
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self,
        }
    }

    /// Stop once the flag is set.
    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn should_stop(&self) -> bool {
        if self
            .cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Acquire))
        {
            return true;
        }
        self.deadline
            .is_some_and(|deadline| Instant::now() >= deadline)
    }
}

#[derive(Debug, Clone)]
struct Candidate {
    id: RecordId,
    importance: f32,
    failed: bool,
    last_accessed_at: DateTime<Utc>,
}

/// Eviction order: failures first, then lowest importance, oldest access, id.
fn eviction_order(a: &Candidate, b: &Candidate) -> CmpOrdering {
    b.failed
        .cmp(&a.failed)
        .then(a.importance.total_cmp(&b.importance))
        .then(a.last_accessed_at.cmp(&b.last_accessed_at))
        .then(a.id.cmp(&b.id))
}

/// A pass only counts as completed if it left the store within capacity.
fn closing_outcome(outcome: PassOutcome, remaining: usize, capacity: usize) -> PassOutcome {
    match outcome {
        PassOutcome::Completed if remaining > capacity => PassOutcome::OverCapacity,
        outcome => outcome,
    }
}

enum Round {
    Scored(Vec<Candidate>),
    Interrupted,
}

/// Resets the engine to `Idle` when a pass ends, even on early return.
struct PassGuard<'a> {
    state: &'a AtomicU8,
}

impl<'a> PassGuard<'a> {
    fn enter(state: &'a AtomicU8) -> Option<Self> {
        state
            .compare_exchange(
                PassState::Idle as u8,
                PassState::Scoring as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .ok()
            .map(|_| Self { state })
    }

    fn advance(&self, phase: PassState) {
        self.state.store(phase as u8, Ordering::Release);
    }
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.state.store(PassState::Idle as u8, Ordering::Release);
    }
}

/// Scores records and evicts the least important until the store fits.
#[derive(Debug)]
pub struct ConsolidationEngine {
    policy: ConsolidationPolicy,
    state: AtomicU8,
    passes: AtomicU64,
}

impl ConsolidationEngine {
    pub fn new(policy: ConsolidationPolicy) -> Self {
        Self {
            policy,
            state: AtomicU8::new(PassState::Idle as u8),
            passes: AtomicU64::new(0),
        }
    }

    pub fn policy(&self) -> &ConsolidationPolicy {
        &self.policy
    }

    pub fn state(&self) -> PassState {
        PassState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Passes that ran to completion or interruption.
    pub fn passes(&self) -> u64 {
        self.passes.load(Ordering::Relaxed)
    }

    pub fn run(
        &self,
        store: &MemoryStore,
        control: &PassControl,
    ) -> Result<ConsolidationReport, MemoryError> {
        self.run_at(store, Utc::now(), control)
    }

    /// Run a pass scoring recency against `now`.
    pub fn run_at(
        &self,
        store: &MemoryStore,
        now: DateTime<Utc>,
        control: &PassControl,
    ) -> Result<ConsolidationReport, MemoryError> {
        let Some(guard) = PassGuard::enter(&self.state) else {
            debug!("consolidation trigger ignored; pass already running");
            return Ok(ConsolidationReport::skipped(store));
        };
        let started = Instant::now();
        let mut report = ConsolidationReport {
            outcome: PassOutcome::Completed,
            scored: 0,
            evicted: Vec::new(),
            failures: Vec::new(),
            remaining: store.count(),
            capacity: store.capacity(),
        };

        for _ in 0..MAX_ROUNDS {
            guard.advance(PassState::Scoring);
            report.failures.clear();
            let mut candidates = match self.score(store, now, control, &mut report.failures)? {
                Round::Scored(candidates) => candidates,
                Round::Interrupted => {
                    report.outcome = PassOutcome::Interrupted;
                    break;
                }
            };
            report.scored = candidates.len();

            guard.advance(PassState::Sorting);
            candidates.sort_by(eviction_order);

            guard.advance(PassState::Evicting);
            let mut queue = candidates.iter();
            while store.count() > store.capacity() {
                if control.should_stop() {
                    report.outcome = PassOutcome::Interrupted;
                    break;
                }
                let Some(candidate) = queue.next() else {
                    break;
                };
                if store.remove(&[candidate.id])? == 1 {
                    debug!(
                        "record evicted (id={}, importance={:.4}, failed={})",
                        candidate.id, candidate.importance, candidate.failed
                    );
                    report.evicted.push(candidate.id);
                }
            }

            if report.outcome == PassOutcome::Interrupted || !store.over_capacity() {
                break;
            }
        }

        self.passes.fetch_add(1, Ordering::Relaxed);
        report.remaining = store.count();
        report.outcome = closing_outcome(report.outcome, report.remaining, report.capacity);
        if report.outcome == PassOutcome::OverCapacity {
            warn!(
                "store still over capacity after consolidation (count={}, capacity={})",
                report.remaining, report.capacity
            );
        }
        info!(
            "consolidation pass finished (outcome={:?}, scored={}, evicted={}, failures={}, \
             remaining={}, capacity={}, elapsed_ms={})",
            report.outcome,
            report.scored,
            report.evicted.len(),
            report.failures.len(),
            report.remaining,
            report.capacity,
            started.elapsed().as_millis()
        );
        Ok(report)
    }

    /// Score every record and store the results on the records.
    fn score(
        &self,
        store: &MemoryStore,
        now: DateTime<Utc>,
        control: &PassControl,
        failures: &mut Vec<ScoringFailure>,
    ) -> Result<Round, MemoryError> {
        let snapshot = store.iterate();
        let mut bases: HashMap<RecordId, Result<f32, ScoringError>> =
            HashMap::with_capacity(snapshot.len());
        for record in &snapshot {
            if control.should_stop() {
                return Ok(Round::Interrupted);
            }
            bases.insert(record.id, base_score(record, &self.policy, now));
        }

        let probe_redundancy =
            self.policy.redundancy_probe > 0 && self.policy.weights.redundancy > 0.0;
        let mut candidates = Vec::with_capacity(snapshot.len());
        for record in &snapshot {
            if control.should_stop() {
                return Ok(Round::Interrupted);
            }
            let base = match bases.get(&record.id) {
                Some(Ok(base)) => *base,
                Some(Err(err)) => {
                    candidates.push(self.failed(
                        record.id,
                        record.last_accessed_at,
                        err.to_string(),
                        failures,
                    ));
                    continue;
                }
                None => continue,
            };
            let redundancy = if probe_redundancy {
                match store.similar_to(&record.id, self.policy.redundancy_probe) {
                    Ok(neighbors) => {
                        let weighted: Vec<(f32, f32)> = neighbors
                            .iter()
                            .filter_map(|(id, similarity)| match bases.get(id) {
                                Some(Ok(base)) => Some((*similarity, *base)),
                                _ => None,
                            })
                            .collect();
                        redundancy_penalty(
                            &weighted,
                            self.policy.redundancy_threshold,
                            &self.policy.weights,
                        )
                    }
                    // Removed since the snapshot was taken.
                    Err(MemoryError::NotFound(_)) => continue,
                    Err(err) => {
                        candidates.push(self.failed(
                            record.id,
                            record.last_accessed_at,
                            err.to_string(),
                            failures,
                        ));
                        continue;
                    }
                }
            } else {
                0.0
            };
            match combine(base, redundancy, &self.policy.weights) {
                Ok(importance) => candidates.push(Candidate {
                    id: record.id,
                    importance,
                    failed: false,
                    last_accessed_at: record.last_accessed_at,
                }),
                Err(err) => candidates.push(self.failed(
                    record.id,
                    record.last_accessed_at,
                    err.to_string(),
                    failures,
                )),
            }
        }

        let scores: Vec<(RecordId, f32)> = candidates
            .iter()
            .map(|candidate| (candidate.id, candidate.importance))
            .collect();
        store.apply_importance(&scores)?;
        Ok(Round::Scored(candidates))
    }

    fn failed(
        &self,
        id: RecordId,
        last_accessed_at: DateTime<Utc>,
        reason: String,
        failures: &mut Vec<ScoringFailure>,
    ) -> Candidate {
        warn!("record scoring failed (id={}, reason={})", id, reason);
        failures.push(ScoringFailure { id, reason });
        Candidate {
            id,
            importance: MIN_IMPORTANCE,
            failed: true,
            last_accessed_at,
        }
    }
}

impl Default for ConsolidationEngine {
    fn default() -> Self {
        Self::new(ConsolidationPolicy::default())
    }
}
