//! # Index Module
//!
//! The in-memory name index searched by the matching engine.
//!
//! ## Key Components
//!
//! - [`dataset`] - Parser for the semicolon-delimited UnicodeData.txt format
//! - [`builder`] - Turns dataset records into a [`NameIndex`]
//! - [`IndexHandle`] - Shared, hot-swappable reference to the current index
//!
//! A [`NameIndex`] is immutable once constructed. Searches hold an
//! `Arc<NameIndex>`, so replacing the index through an [`IndexHandle`] never
//! disturbs a search that is already running.

pub mod builder;
pub mod dataset;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::fingerprint::Fingerprint;
use crate::normalize::{normalize, tokens};

pub use builder::{BuildOutcome, NameIndexBuilder};
pub use dataset::DatasetRecord;

/// One named code point as read from the dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodePointEntry {
    pub code_point: u32,
    pub canonical_name: String,
    #[serde(default)]
    pub alternate_names: Vec<String>,
}

impl CodePointEntry {
    pub fn new(code_point: u32, canonical_name: impl Into<String>) -> Self {
        Self {
            code_point,
            canonical_name: canonical_name.into(),
            alternate_names: Vec::new(),
        }
    }

    pub fn with_alternate(mut self, name: impl Into<String>) -> Self {
        self.alternate_names.push(name.into());
        self
    }

    /// The character itself, if the code point is a Unicode scalar value
    pub fn character(&self) -> Option<char> {
        char::from_u32(self.code_point)
    }

    /// Canonical name first, then alternates in dataset order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.canonical_name.as_str())
            .chain(self.alternate_names.iter().map(String::as_str))
    }
}

/// An entry together with the normalized form of each of its names
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct IndexedEntry {
    pub(crate) entry: CodePointEntry,
    pub(crate) normalized_names: Vec<String>,
}

impl IndexedEntry {
    fn new(entry: CodePointEntry) -> Self {
        let normalized_names = entry.names().map(normalize).collect();
        Self {
            entry,
            normalized_names,
        }
    }
}

/// Immutable searchable index over every named code point of one dataset
#[derive(Debug, Clone, PartialEq)]
pub struct NameIndex {
    fingerprint: Fingerprint,
    built_at: DateTime<Utc>,
    /// Sorted by code point, one entry per code point
    entries: Vec<IndexedEntry>,
    /// Normalized name token to ascending code points
    tokens: BTreeMap<String, Vec<u32>>,
}

impl NameIndex {
    /// Build the index structures from raw entries.
    ///
    /// Entries are ordered by code point; if a code point occurs more than
    /// once only its first entry is kept.
    pub fn from_entries(
        entries: impl IntoIterator<Item = CodePointEntry>,
        fingerprint: Fingerprint,
        built_at: DateTime<Utc>,
    ) -> Self {
        let mut by_code_point: BTreeMap<u32, CodePointEntry> = BTreeMap::new();
        for entry in entries {
            by_code_point.entry(entry.code_point).or_insert(entry);
        }

        let entries: Vec<IndexedEntry> = by_code_point.into_values().map(IndexedEntry::new).collect();

        let mut token_sets: BTreeMap<String, BTreeSet<u32>> = BTreeMap::new();
        for indexed in &entries {
            for name in &indexed.normalized_names {
                for token in tokens(name) {
                    token_sets
                        .entry(token.to_string())
                        .or_default()
                        .insert(indexed.entry.code_point);
                }
            }
        }
        let tokens = token_sets
            .into_iter()
            .map(|(token, set)| (token, set.into_iter().collect()))
            .collect();

        Self {
            fingerprint,
            built_at,
            entries,
            tokens,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    pub fn get(&self, code_point: u32) -> Option<&CodePointEntry> {
        self.position(code_point).map(|pos| &self.entries[pos].entry)
    }

    /// All entries in ascending code point order
    pub fn entries(&self) -> impl ExactSizeIterator<Item = &CodePointEntry> {
        self.entries.iter().map(|indexed| &indexed.entry)
    }

    /// Code points whose canonical or alternate name contains `token`
    /// (already normalized) as a whole word
    pub fn code_points_for_token(&self, token: &str) -> &[u32] {
        self.tokens.get(token).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    pub(crate) fn indexed(&self) -> &[IndexedEntry] {
        &self.entries
    }

    pub(crate) fn position(&self, code_point: u32) -> Option<usize> {
        self.entries
            .binary_search_by_key(&code_point, |indexed| indexed.entry.code_point)
            .ok()
    }

    /// Code points whose combined name tokens include every token in `query_tokens`.
    /// An empty token list matches nothing.
    pub(crate) fn word_subset_candidates(&self, query_tokens: &BTreeSet<&str>) -> Vec<u32> {
        let mut postings: Vec<&[u32]> = Vec::with_capacity(query_tokens.len());
        for token in query_tokens {
            let list = self.code_points_for_token(token);
            if list.is_empty() {
                return Vec::new();
            }
            postings.push(list);
        }
        postings.sort_by_key(|list| list.len());

        let Some((shortest, rest)) = postings.split_first() else {
            return Vec::new();
        };
        shortest
            .iter()
            .copied()
            .filter(|cp| rest.iter().all(|list| list.binary_search(cp).is_ok()))
            .collect()
    }
}

/// Shared handle to the current index.
///
/// Cloning the handle shares the slot. [`IndexHandle::swap`] publishes a new
/// index atomically; readers that already called [`IndexHandle::current`]
/// keep using the index they loaded until they drop it.
#[derive(Debug, Clone)]
pub struct IndexHandle {
    slot: Arc<ArcSwap<NameIndex>>,
}

impl IndexHandle {
    pub fn new(index: NameIndex) -> Self {
        Self::from_arc(Arc::new(index))
    }

    pub fn from_arc(index: Arc<NameIndex>) -> Self {
        Self {
            slot: Arc::new(ArcSwap::new(index)),
        }
    }

    pub fn current(&self) -> Arc<NameIndex> {
        self.slot.load_full()
    }

    /// Publish `index` and return the one it replaced
    pub fn swap(&self, index: NameIndex) -> Arc<NameIndex> {
        self.slot.swap(Arc::new(index))
    }
}
