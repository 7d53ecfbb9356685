//! Core data models for Foray ↔ reference matching.
//!
//! This module contains the input records, the per-record match results
//! handed to the output collector, and the run statistics.

use serde::Serialize;
use std::sync::Arc;

use crate::normalize::{is_placeholder, norm, preferred_name};

// ============================================================================
// Input Models
// ============================================================================

/// One field specimen record with three independently entered names.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Observation {
    pub id: String,
    pub org: String,   // organizer's entry
    pub conf: String,  // confirmed name
    pub foray: String, // foray-assigned name
}

impl Observation {
    /// Build an observation, trimming every field.
    pub fn new(id: &str, org: &str, conf: &str, foray: &str) -> Self {
        Self {
            id: norm(Some(id)),
            org: norm(Some(org)),
            conf: norm(Some(conf)),
            foray: norm(Some(foray)),
        }
    }

    /// The three variants in priority order (ORG, CONF, FORAY).
    pub fn variants(&self) -> [&str; 3] {
        [&self.org, &self.conf, &self.foray]
    }
}

/// Canonical taxonomic record (one MycoBank row).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ReferenceEntry {
    pub id: String,
    pub historical_name: String,
    pub current_name: String,
    pub authors: String,
    pub year: String,
    pub hyperlink: String,
}

impl ReferenceEntry {
    pub fn new(id: &str, historical_name: &str, current_name: &str) -> Self {
        Self {
            id: norm(Some(id)),
            historical_name: norm(Some(historical_name)),
            current_name: norm(Some(current_name)),
            ..Default::default()
        }
    }

    pub fn with_metadata(mut self, authors: &str, year: &str, hyperlink: &str) -> Self {
        self.authors = norm(Some(authors));
        self.year = norm(Some(year));
        self.hyperlink = norm(Some(hyperlink));
        self
    }

    /// Current name if present, else historical name. Used for bucketing.
    pub fn preferred_name(&self) -> &str {
        preferred_name(&self.historical_name, &self.current_name)
    }

    pub fn name(&self, field: NameField) -> &str {
        match field {
            NameField::Historical => &self.historical_name,
            NameField::Current => &self.current_name,
        }
    }

    /// Whether the current name is a genuine update of the historical one.
    /// Metadata only: never consulted by scoring or bucketing.
    pub fn status(&self) -> NameStatus {
        let current = self.current_name.trim();
        if current.is_empty() || is_placeholder(current) {
            return NameStatus::Same;
        }
        if current.to_lowercase() == self.historical_name.trim().to_lowercase() {
            NameStatus::Same
        } else {
            NameStatus::Updated
        }
    }
}

// ============================================================================
// Tags
// ============================================================================

/// Which reference name field produced a score.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NameField {
    Historical,
    Current,
}

impl NameField {
    pub fn label(self) -> &'static str {
        match self {
            NameField::Historical => "HISTORICAL",
            NameField::Current => "CURRENT",
        }
    }
}

/// Observation name variant. Declaration order is the tie-break priority.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Variant {
    Org,
    Conf,
    Foray,
}

impl Variant {
    /// All variants, highest tie-break priority first.
    pub const ALL: [Variant; 3] = [Variant::Org, Variant::Conf, Variant::Foray];

    pub fn label(self) -> &'static str {
        match self {
            Variant::Org => "ORG",
            Variant::Conf => "CONF",
            Variant::Foray => "FORAY",
        }
    }
}

/// Which pair of variants agrees in a non-identical triple.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Agreement {
    OrgConf,
    OrgForay,
    ConfForay,
    AllDifferent,
}

impl Agreement {
    pub fn code(self) -> &'static str {
        match self {
            Agreement::OrgConf => "ORG_CONF_MATCH",
            Agreement::OrgForay => "ORG_FORAY_MATCH",
            Agreement::ConfForay => "CONF_FORAY_MATCH",
            Agreement::AllDifferent => "ALL_DIFFERENT",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NameStatus {
    Updated,
    Same,
}

// ============================================================================
// Scoring Models
// ============================================================================

/// Best-scoring reference entry for one query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BestMatch {
    pub entry: Arc<ReferenceEntry>,
    pub score: u8, // 0-100
    pub field: NameField,
}

/// Winning variant of a three-way selection and the field it matched.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Winner {
    pub variant: Variant,
    pub field: NameField,
}

impl Winner {
    /// Human-readable label, e.g. "ORG → CURRENT".
    pub fn explanation(self) -> String {
        format!("{} → {}", self.variant.label(), self.field.label())
    }
}

/// Explanation used when no variant found any candidate.
pub const NO_MATCH_EXPLANATION: &str = "NO_MATCH";

// ============================================================================
// Output Models
// ============================================================================

/// Reference entry chosen for an output record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CandidateRef {
    pub reference_id: String,
    pub reference_name: String, // preferred name
    pub status: NameStatus,
    pub entry: ReferenceEntry,
}

impl From<&ReferenceEntry> for CandidateRef {
    fn from(entry: &ReferenceEntry) -> Self {
        Self {
            reference_id: entry.id.clone(),
            reference_name: entry.preferred_name().to_string(),
            status: entry.status(),
            entry: entry.clone(),
        }
    }
}

/// Identical triple with an exact (score 100) reference hit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ExactMatch {
    pub observation_id: String,
    pub matched_name: String,
    pub field: NameField,
    pub score: u8,
    pub candidate: CandidateRef,
}

/// Identical triple without an exact reference hit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct IdentityRecord {
    pub observation_id: String,
    pub name: String,
}

/// Non-identical triple tagged with the pair that agrees.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MismatchRecord {
    pub observation_id: String,
    pub org: String,
    pub conf: String,
    pub foray: String,
    pub agreement: Agreement,
}

/// Mismatch augmented with per-variant scores and the overall best candidate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ScoredCandidate {
    pub observation_id: String,
    pub org_score: u8,
    pub conf_score: u8,
    pub foray_score: u8,
    pub winner: Option<Winner>,
    pub candidate: Option<CandidateRef>,
    pub explanation: String,
}

impl ScoredCandidate {
    pub fn score(&self, variant: Variant) -> u8 {
        match variant {
            Variant::Org => self.org_score,
            Variant::Conf => self.conf_score,
            Variant::Foray => self.foray_score,
        }
    }
}

/// A record whose scoring task failed; it still appears in the mismatch list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RecordFailure {
    pub observation_id: String,
    pub message: String,
}

/// Result for one observation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MatchResult {
    Exact(ExactMatch),
    Identity(IdentityRecord),
    Mismatch {
        record: MismatchRecord,
        scored: Result<ScoredCandidate, RecordFailure>,
    },
}

// ============================================================================
// Statistics (Instrumentation)
// ============================================================================

/// Per-run counters, logged and optionally written as JSON.
#[derive(Default, Debug, Clone, PartialEq, Serialize)]
pub struct MatchingStats {
    // Inputs
    pub total_observations: usize,
    pub reference_entries: usize,
    pub indexed_references: usize,
    pub unindexed_references: usize,
    pub buckets: usize,
    pub workers: usize,

    // Classification
    pub exact_matches: usize,
    pub identity_only: usize,
    pub mismatches: usize,
    pub org_conf_agree: usize,
    pub org_foray_agree: usize,
    pub conf_foray_agree: usize,
    pub all_different: usize,

    // Candidate selection
    pub scored_with_candidate: usize,
    pub no_candidate: usize,
    pub failures: usize,

    // Memo cache
    pub cache_hits: u64,
    pub cache_misses: u64,

    // Timing
    pub elapsed_seconds: f64,
}

impl MatchingStats {
    /// Share of mismatches for which some candidate was found, as a percentage.
    pub fn candidate_rate(&self) -> f64 {
        if self.mismatches == 0 {
            0.0
        } else {
            100.0 * self.scored_with_candidate as f64 / self.mismatches as f64
        }
    }

    pub fn record_agreement(&mut self, agreement: Agreement) {
        match agreement {
            Agreement::OrgConf => self.org_conf_agree += 1,
            Agreement::OrgForay => self.org_foray_agree += 1,
            Agreement::ConfForay => self.conf_foray_agree += 1,
            Agreement::AllDifferent => self.all_different += 1,
        }
    }

    /// Log stats to stderr in JSON format
    pub fn log_phase(&self, phase: &str) {
        if let Ok(json) = serde_json::to_string_pretty(self) {
            eprintln!("[STATS:{}]\n{}", phase, json);
        }
    }

    /// Write stats to a JSON file
    pub fn write_to_file(&self, path: &std::path::Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
