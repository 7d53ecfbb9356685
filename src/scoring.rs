//! Similarity scoring against the reference index.
//!
//! - Similarity primitive (Indel ratio, 0-100)
//! - Per-entry field choice (historical vs current name)
//! - Best match within one letter bucket, optionally memoized

use std::num::NonZeroUsize;
use std::sync::Arc;

use crate::cache::{CacheStats, ScoreCache};
use crate::index::ReferenceIndex;
use crate::models::{BestMatch, NameField, ReferenceEntry};
use crate::normalize::bucket_key;

// ============================================================================
// Similarity
// ============================================================================

/// Longest common subsequence length over chars (two-row DP)
fn lcs_length(a: &[char], b: &[char]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }

    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];

    for &ca in a {
        for (j, &cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Indel similarity ratio in 0.0..=100.0, unrounded:
/// `100 * (1 - indel / (len_a + len_b))`, where the Indel distance counts
/// insertions and deletions only, so `indel = len_a + len_b - 2 * lcs`.
///
/// Case-sensitive and symmetric; only identical strings reach 100.
/// An empty side scores 0 so blank fields never match.
pub fn ratio(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    200.0 * lcs_length(&a, &b) as f64 / total as f64
}

/// `ratio` truncated to an integer score.
pub fn similarity(a: &str, b: &str) -> u8 {
    truncate(ratio(a, b))
}

fn truncate(ratio: f64) -> u8 {
    ratio.clamp(0.0, 100.0) as u8
}

/// Score a query against both names of an entry, unrounded.
/// The higher ratio wins; an equal ratio is reported as CURRENT.
pub fn score_entry(query: &str, entry: &ReferenceEntry) -> (f64, NameField) {
    let historical = ratio(query, &entry.historical_name);
    let current = ratio(query, &entry.current_name);
    if current >= historical {
        (current, NameField::Current)
    } else {
        (historical, NameField::Historical)
    }
}

/// Best entry in a bucket. Entries are compared on unrounded ratios and
/// only a strictly higher ratio replaces the current leader, so the first
/// entry wins ties. The score is truncated only in the result. A ratio of
/// 0 never matches.
pub fn best_in_bucket(query: &str, bucket: &[Arc<ReferenceEntry>]) -> Option<BestMatch> {
    let mut best: Option<(&Arc<ReferenceEntry>, f64, NameField)> = None;
    let mut best_ratio = 0.0f64;

    for entry in bucket {
        let (ratio, field) = score_entry(query, entry);
        if ratio > best_ratio {
            best_ratio = ratio;
            best = Some((entry, ratio, field));
            if ratio >= 100.0 {
                break; // nothing later can beat it
            }
        }
    }

    best.map(|(entry, ratio, field)| BestMatch {
        entry: Arc::clone(entry),
        score: truncate(ratio),
        field,
    })
}

// ============================================================================
// Scorer
// ============================================================================

/// Anything that can find the best reference match for a name.
/// Implementations must be pure so they can run on any worker.
pub trait NameScorer: Sync {
    fn best_match(&self, query: &str) -> Option<BestMatch>;

    /// A reference entry whose historical or current name equals `name`.
    fn exact_match(&self, name: &str) -> Option<BestMatch> {
        self.best_match(name).filter(|best| best.score == 100)
    }
}

/// Index-backed scorer with an optional bounded memo cache.
pub struct Scorer {
    index: ReferenceIndex,
    cache: Option<ScoreCache>,
}

impl Scorer {
    /// `cache_capacity == 0` disables memoization.
    pub fn new(index: ReferenceIndex, cache_capacity: usize) -> Self {
        Self {
            index,
            cache: NonZeroUsize::new(cache_capacity).map(ScoreCache::new),
        }
    }

    pub fn index(&self) -> &ReferenceIndex {
        &self.index
    }

    /// Best match for `query` within the bucket for `letter`.
    pub fn best_match_in(&self, query: &str, letter: char) -> Option<BestMatch> {
        if query.is_empty() {
            return None;
        }

        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.get(query, letter) {
                return hit;
            }
        }

        let result = best_in_bucket(query, self.index.bucket(letter));

        if let Some(cache) = &self.cache {
            cache.insert(query, letter, result.clone());
        }
        result
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.as_ref().map(ScoreCache::stats).unwrap_or_default()
    }
}

impl NameScorer for Scorer {
    fn best_match(&self, query: &str) -> Option<BestMatch> {
        let query = query.trim();
        let letter = bucket_key(query)?;
        self.best_match_in(query, letter)
    }

    /// The query's own bucket first, then the exact-name table, which also
    /// finds entries bucketed under a different preferred name.
    fn exact_match(&self, name: &str) -> Option<BestMatch> {
        let name = name.trim();
        if let Some(best) = self.best_match(name).filter(|best| best.score == 100) {
            return Some(best);
        }
        self.index.exact(name).map(|(entry, field)| BestMatch {
            entry: Arc::clone(entry),
            score: 100,
            field,
        })
    }
}
