//! First-letter reference index.
//!
//! Partitions reference entries by the uppercased first character of their
//! preferred name. Built once per run, read-only afterwards and shared by
//! every scoring worker without locking.
//!
//! A side table maps every non-empty historical and current name to the
//! first entry carrying it, so exact lookups are not limited to one bucket.

use rustc_hash::FxHashMap;
use std::sync::Arc;

use crate::models::{NameField, ReferenceEntry};
use crate::normalize::bucket_key;

/// Letter -> entries whose preferred name starts with that letter,
/// in input order.
#[derive(Debug, Default)]
pub struct ReferenceIndex {
    buckets: FxHashMap<char, Vec<Arc<ReferenceEntry>>>,
    exact: FxHashMap<String, (Arc<ReferenceEntry>, NameField)>,
    indexed: usize,
    skipped: usize,
}

/// Build the index in a single pass.
/// Entries with an empty preferred name cannot be located and are dropped.
pub fn build_index<I>(entries: I) -> ReferenceIndex
where
    I: IntoIterator<Item = ReferenceEntry>,
{
    let mut index = ReferenceIndex::default();

    for entry in entries {
        match bucket_key(entry.preferred_name()) {
            Some(key) => {
                let entry = Arc::new(entry);
                // CURRENT first so an entry whose names are equal reports CURRENT
                for field in [NameField::Current, NameField::Historical] {
                    let name = entry.name(field);
                    if !name.is_empty() && !index.exact.contains_key(name) {
                        index.exact.insert(name.to_string(), (Arc::clone(&entry), field));
                    }
                }
                index.buckets.entry(key).or_default().push(entry);
                index.indexed += 1;
            }
            None => index.skipped += 1,
        }
    }

    index
}

impl ReferenceIndex {
    /// Entries for a bucket letter; empty when the letter has no bucket.
    pub fn bucket(&self, letter: char) -> &[Arc<ReferenceEntry>] {
        self.buckets.get(&letter).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// First entry (input order) whose historical or current name equals
    /// `name` byte-for-byte, with the field that matched.
    pub fn exact(&self, name: &str) -> Option<(&Arc<ReferenceEntry>, NameField)> {
        self.exact.get(name).map(|(entry, field)| (entry, *field))
    }

    /// Number of indexed entries.
    pub fn len(&self) -> usize {
        self.indexed
    }

    pub fn is_empty(&self) -> bool {
        self.indexed == 0
    }

    /// Entries dropped for having no preferred name.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Bucket letters in sorted order.
    pub fn letters(&self) -> Vec<char> {
        let mut letters: Vec<char> = self.buckets.keys().copied().collect();
        letters.sort_unstable();
        letters
    }

    pub fn average_bucket_size(&self) -> f64 {
        if self.buckets.is_empty() {
            0.0
        } else {
            self.indexed as f64 / self.buckets.len() as f64
        }
    }
}
