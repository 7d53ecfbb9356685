//! Matching pipeline orchestration.
//!
//! BUILD_INDEX → PROCESS_RECORDS → AGGREGATE → DONE
//!
//! The index and classifier run on the calling thread. Only scorer calls for
//! mismatched triples go to the worker pool, which is created once per run
//! and owned here. Output order always matches input order.

use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::Serialize;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use crate::classify::{classify, Classification};
use crate::error::PipelineError;
use crate::index::build_index;
use crate::models::{
    CandidateRef, ExactMatch, IdentityRecord, MatchResult, MatchingStats, MismatchRecord,
    Observation, RecordFailure, ReferenceEntry, ScoredCandidate,
};
use crate::scoring::{NameScorer, Scorer};
use crate::select::select_candidate;

// ============================================================================
// Configuration
// ============================================================================

/// Memo cache size (distinct (query, letter) pairs).
pub const DEFAULT_CACHE_CAPACITY: usize = 100_000;

/// Emit a progress report every this many records.
pub const DEFAULT_PROGRESS_INTERVAL: usize = 100;

pub const MIN_WORKERS: usize = 4;
pub const MAX_WORKERS: usize = 16;

/// Assumed CPU count when available parallelism is unknown.
const FALLBACK_CPUS: usize = 4;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Explicit worker count (>= 1); `None` picks one from the CPU count.
    pub workers: Option<usize>,
    /// 0 disables the memo cache.
    pub cache_capacity: usize,
    pub progress_interval: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: None,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }
}

impl PipelineConfig {
    pub fn worker_count(&self) -> Result<usize, PipelineError> {
        match self.workers {
            Some(0) => Err(PipelineError::InvalidConfig(
                "worker count must be at least 1".to_string(),
            )),
            Some(n) => Ok(n),
            None => Ok(default_workers(
                std::thread::available_parallelism()
                    .ok()
                    .map(NonZeroUsize::get),
            )),
        }
    }
}

/// Twice the CPU count, clamped to [MIN_WORKERS, MAX_WORKERS].
pub fn default_workers(cpus: Option<usize>) -> usize {
    (cpus.unwrap_or(FALLBACK_CPUS) * 2).clamp(MIN_WORKERS, MAX_WORKERS)
}

// ============================================================================
// Progress
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    BuildIndex,
    ProcessRecords,
    Aggregate,
    Done,
}

impl Phase {
    pub fn label(self) -> &'static str {
        match self {
            Phase::BuildIndex => "BUILD_INDEX",
            Phase::ProcessRecords => "PROCESS_RECORDS",
            Phase::Aggregate => "AGGREGATE",
            Phase::Done => "DONE",
        }
    }
}

/// Advisory progress report; has no effect on results.
#[derive(Clone, Debug, PartialEq)]
pub struct Progress {
    pub phase: Phase,
    pub processed: usize,
    pub total: usize,
    pub elapsed: Duration,
    pub exact: usize,
    pub identity: usize,
    pub mismatches: usize,
}

impl Progress {
    /// Records per second.
    pub fn rate(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.processed as f64 / secs
        } else {
            0.0
        }
    }

    /// Estimated time remaining at the current rate.
    pub fn eta(&self) -> Duration {
        let rate = self.rate();
        if rate > 0.0 {
            let remaining = self.total.saturating_sub(self.processed) as f64;
            Duration::from_secs_f64(remaining / rate)
        } else {
            Duration::ZERO
        }
    }
}

// ============================================================================
// Output
// ============================================================================

/// The four categorized collections, in input order, plus diagnostics.
#[derive(Clone, Debug, Default, Serialize)]
pub struct PipelineOutput {
    pub exact_matches: Vec<ExactMatch>,
    pub identity_only: Vec<IdentityRecord>,
    pub mismatch_categories: Vec<MismatchRecord>,
    pub scored_candidates: Vec<ScoredCandidate>,
    pub failures: Vec<RecordFailure>,
    pub stats: MatchingStats,
}

impl PipelineOutput {
    fn push(&mut self, result: MatchResult) {
        match result {
            MatchResult::Exact(exact) => self.exact_matches.push(exact),
            MatchResult::Identity(identity) => self.identity_only.push(identity),
            MatchResult::Mismatch { record, scored } => {
                self.mismatch_categories.push(record);
                match scored {
                    Ok(scored) => self.scored_candidates.push(scored),
                    Err(failure) => self.failures.push(failure),
                }
            }
        }
    }

    fn progress(&self, phase: Phase, processed: usize, total: usize, elapsed: Duration) -> Progress {
        Progress {
            phase,
            processed,
            total,
            elapsed,
            exact: self.exact_matches.len(),
            identity: self.identity_only.len(),
            mismatches: self.mismatch_categories.len(),
        }
    }

    /// Fill classification counters from the collected records.
    fn aggregate(&mut self) {
        let stats = &mut self.stats;
        stats.exact_matches = self.exact_matches.len();
        stats.identity_only = self.identity_only.len();
        stats.mismatches = self.mismatch_categories.len();
        stats.total_observations = stats.exact_matches + stats.identity_only + stats.mismatches;
        for record in &self.mismatch_categories {
            stats.record_agreement(record.agreement);
        }
        stats.scored_with_candidate = self
            .scored_candidates
            .iter()
            .filter(|s| s.candidate.is_some())
            .count();
        stats.no_candidate = self.scored_candidates.len() - stats.scored_with_candidate;
        stats.failures = self.failures.len();
    }
}

// ============================================================================
// Processing
// ============================================================================

/// Classify one observation and, for mismatches, select a candidate.
/// A failed scoring task becomes a `RecordFailure` for this record only.
pub fn match_observation<S>(pool: &ThreadPool, scorer: &S, obs: &Observation) -> MatchResult
where
    S: NameScorer + ?Sized,
{
    let [a, b, c] = obs.variants();

    match classify(scorer, a, b, c) {
        Classification::Exact(best) => MatchResult::Exact(ExactMatch {
            observation_id: obs.id.clone(),
            matched_name: a.to_string(),
            field: best.field,
            score: best.score,
            candidate: CandidateRef::from(best.entry.as_ref()),
        }),
        Classification::Identity => MatchResult::Identity(IdentityRecord {
            observation_id: obs.id.clone(),
            name: a.to_string(),
        }),
        Classification::Mismatch(agreement) => {
            let record = MismatchRecord {
                observation_id: obs.id.clone(),
                org: a.to_string(),
                conf: b.to_string(),
                foray: c.to_string(),
                agreement,
            };
            let scored = select_candidate(pool, scorer, a, b, c)
                .map(|selection| selection.into_scored(&obs.id))
                .map_err(|err| RecordFailure {
                    observation_id: obs.id.clone(),
                    message: err.to_string(),
                });
            MatchResult::Mismatch { record, scored }
        }
    }
}

/// PROCESS_RECORDS: walk observations in order, reporting every
/// `progress_interval` records and after the last one.
pub fn process_observations<S>(
    pool: &ThreadPool,
    scorer: &S,
    observations: &[Observation],
    progress_interval: usize,
    on_progress: &mut dyn FnMut(&Progress),
) -> PipelineOutput
where
    S: NameScorer + ?Sized,
{
    let interval = progress_interval.max(1);
    let total = observations.len();
    let start = Instant::now();
    let mut output = PipelineOutput::default();

    on_progress(&output.progress(Phase::ProcessRecords, 0, total, start.elapsed()));

    for (i, obs) in observations.iter().enumerate() {
        let result = match_observation(pool, scorer, obs);
        if let MatchResult::Mismatch {
            scored: Err(failure),
            ..
        } = &result
        {
            eprintln!(
                "[WARN] record {}: scoring failed: {}",
                failure.observation_id, failure.message
            );
        }
        output.push(result);

        let processed = i + 1;
        if processed % interval == 0 || processed == total {
            on_progress(&output.progress(Phase::ProcessRecords, processed, total, start.elapsed()));
        }
    }

    output
}

/// Run the full pipeline without progress reporting.
pub fn run_pipeline(
    observations: &[Observation],
    references: &[ReferenceEntry],
    config: &PipelineConfig,
) -> Result<PipelineOutput, PipelineError> {
    run_pipeline_with_progress(observations, references, config, |_| {})
}

/// Run the full pipeline, calling `on_progress` on each phase transition
/// and at the configured record cadence.
pub fn run_pipeline_with_progress<F>(
    observations: &[Observation],
    references: &[ReferenceEntry],
    config: &PipelineConfig,
    mut on_progress: F,
) -> Result<PipelineOutput, PipelineError>
where
    F: FnMut(&Progress),
{
    let workers = config.worker_count()?;
    let total = observations.len();
    let start = Instant::now();
    let phase = |phase: Phase, processed: usize, output: &PipelineOutput| {
        output.progress(phase, processed, total, start.elapsed())
    };

    // BUILD_INDEX
    on_progress(&phase(Phase::BuildIndex, 0, &PipelineOutput::default()));
    let index = build_index(references.iter().cloned());
    let (indexed, skipped, buckets) = (index.len(), index.skipped(), index.bucket_count());
    let scorer = Scorer::new(index, config.cache_capacity);
    let pool = ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("foray-score-{}", i))
        .build()?;

    // PROCESS_RECORDS
    let mut output = process_observations(
        &pool,
        &scorer,
        observations,
        config.progress_interval,
        &mut on_progress,
    );

    // AGGREGATE
    on_progress(&phase(Phase::Aggregate, total, &output));
    output.aggregate();
    let cache = scorer.cache_stats();
    output.stats.reference_entries = references.len();
    output.stats.indexed_references = indexed;
    output.stats.unindexed_references = skipped;
    output.stats.buckets = buckets;
    output.stats.workers = workers;
    output.stats.cache_hits = cache.hits;
    output.stats.cache_misses = cache.misses;
    output.stats.elapsed_seconds = start.elapsed().as_secs_f64();

    on_progress(&phase(Phase::Done, total, &output));
    Ok(output)
}
