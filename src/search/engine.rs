//! The matching engine
//!
//! [`search`] returns a [`Matches`] iterator. Exact matches are produced
//! lazily in code point order while the index is scanned; the fuzzy phase has
//! to rank every candidate before its first result, so it scores the whole
//! index once and then drains the ranked list. Stopping early (for example
//! with `take(n)`) skips any remaining work.

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::index::NameIndex;
use crate::normalize::{NormalizationCache, tokens};

use super::outputs::{MatchKind, MatchResult};
use super::query::{Aggregation, ExactMatchMode, FuzzyAlgorithm, FuzzyMode, MatchQuery};

/// Run `query` against `index`, normalizing the query through `cache`.
pub fn search(index: Arc<NameIndex>, query: &MatchQuery, cache: &NormalizationCache) -> Matches {
    let normalized = cache.cached_normalize(query.raw_query());
    tracing::debug!(
        "Searching {} entries for {:?} (normalized {:?})",
        index.len(),
        query.raw_query(),
        normalized
    );

    let exact = if normalized.is_empty() {
        ExactScan::Done
    } else {
        match query.exact_mode() {
            ExactMatchMode::Substring => ExactScan::Substring { position: 0 },
            ExactMatchMode::WordSubset => {
                let query_tokens: BTreeSet<&str> = tokens(&normalized).collect();
                let candidates = index.word_subset_candidates(&query_tokens);
                ExactScan::WordSubset {
                    candidates: candidates.into_iter(),
                }
            }
        }
    };

    let fuzzy = query.fuzzy_enabled().then(|| FuzzyPlan {
        mode: query.fuzzy_mode(),
        algorithms: query.algorithms().to_vec(),
        threshold: query.threshold(),
        aggregation: query.aggregation(),
    });

    Matches {
        index,
        normalized,
        phase: Phase::Exact(exact),
        fuzzy_requested: fuzzy.is_some(),
        fuzzy,
        fuzzy_ran: false,
        prefer_fuzzy: query.prefer_fuzzy(),
        exact_seen: HashSet::new(),
    }
}

/// Whether fuzzy matching took part in a search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FuzzyUsage {
    /// The query did not enable fuzzy matching
    NotRequested,
    /// The exact phase has not finished yet
    Pending,
    /// Exact matches were found and fuzzy matching was not preferred
    Skipped,
    /// The fuzzy phase ran
    Used,
}

impl fmt::Display for FuzzyUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NotRequested => "not requested",
            Self::Pending => "not reached",
            Self::Skipped => "skipped, exact matches found",
            Self::Used => "used",
        })
    }
}

#[derive(Debug, Clone)]
struct FuzzyPlan {
    mode: FuzzyMode,
    algorithms: Vec<FuzzyAlgorithm>,
    threshold: f64,
    aggregation: Aggregation,
}

impl FuzzyPlan {
    /// Score of one normalized name, `None` when no algorithm applies
    fn score_name(&self, query: &str, name: &str) -> Option<f64> {
        match self.mode {
            FuzzyMode::Single => self.algorithms.first().map(|a| a.score(query, name)),
            FuzzyMode::Hybrid => {
                let scores: Vec<f64> = self
                    .algorithms
                    .iter()
                    .map(|a| a.score(query, name))
                    .collect();
                self.aggregation.aggregate(&scores)
            }
        }
    }
}

#[derive(Debug)]
enum ExactScan {
    Substring { position: usize },
    WordSubset { candidates: std::vec::IntoIter<u32> },
    Done,
}

#[derive(Debug)]
enum Phase {
    Exact(ExactScan),
    Fuzzy(std::vec::IntoIter<MatchResult>),
    Done,
}

/// Lazy sequence of results for one query, ordered by descending score then
/// ascending code point.
#[derive(Debug)]
pub struct Matches {
    index: Arc<NameIndex>,
    normalized: String,
    phase: Phase,
    fuzzy: Option<FuzzyPlan>,
    fuzzy_requested: bool,
    fuzzy_ran: bool,
    prefer_fuzzy: bool,
    exact_seen: HashSet<u32>,
}

impl Matches {
    /// The normalized form of the query being matched
    pub fn normalized_query(&self) -> &str {
        &self.normalized
    }

    /// Whether the fuzzy phase has run so far
    pub fn fuzzy_ran(&self) -> bool {
        self.fuzzy_ran
    }

    /// The fuzzy matching decision as of the results consumed so far
    pub fn fuzzy_usage(&self) -> FuzzyUsage {
        if !self.fuzzy_requested {
            FuzzyUsage::NotRequested
        } else if self.fuzzy_ran {
            FuzzyUsage::Used
        } else if matches!(self.phase, Phase::Exact(_)) {
            FuzzyUsage::Pending
        } else {
            FuzzyUsage::Skipped
        }
    }

    fn next_exact(&mut self) -> Option<MatchResult> {
        let Phase::Exact(scan) = &mut self.phase else {
            return None;
        };
        let entries = self.index.indexed();

        let position = match scan {
            ExactScan::Substring { position } => {
                let start = *position;
                let found = entries[start.min(entries.len())..]
                    .iter()
                    .position(|indexed| {
                        indexed
                            .normalized_names
                            .iter()
                            .any(|name| name.contains(self.normalized.as_str()))
                    })
                    .map(|offset| start + offset);
                *position = found.map_or(entries.len(), |p| p + 1);
                found
            }
            ExactScan::WordSubset { candidates } => candidates
                .next()
                .and_then(|code_point| self.index.position(code_point)),
            ExactScan::Done => None,
        }?;

        let entry = &entries[position].entry;
        self.exact_seen.insert(entry.code_point);
        Some(MatchResult::new(entry, 1.0, MatchKind::Exact))
    }

    /// Score every candidate not already returned as an exact match
    fn rank_fuzzy(&self, plan: &FuzzyPlan) -> Vec<MatchResult> {
        let mut ranked: Vec<MatchResult> = self
            .index
            .indexed()
            .iter()
            .filter(|indexed| !self.exact_seen.contains(&indexed.entry.code_point))
            .filter_map(|indexed| {
                let best = indexed
                    .normalized_names
                    .iter()
                    .filter_map(|name| plan.score_name(&self.normalized, name))
                    .max_by(f64::total_cmp)?;
                (best >= plan.threshold)
                    .then(|| MatchResult::new(&indexed.entry, best, MatchKind::Fuzzy))
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then(a.code_point.cmp(&b.code_point))
        });
        tracing::debug!(
            "Fuzzy phase kept {} candidates at threshold {}",
            ranked.len(),
            plan.threshold
        );
        ranked
    }

    fn enter_fuzzy_phase(&mut self) {
        let run_fuzzy = self.exact_seen.is_empty() || self.prefer_fuzzy;
        self.phase = match self.fuzzy.take() {
            Some(plan) if run_fuzzy => {
                self.fuzzy_ran = true;
                Phase::Fuzzy(self.rank_fuzzy(&plan).into_iter())
            }
            Some(_) => {
                tracing::info!(
                    "Exact matches found, skipping fuzzy matching for {:?}",
                    self.normalized
                );
                Phase::Done
            }
            None => Phase::Done,
        };
    }
}

impl Iterator for Matches {
    type Item = MatchResult;

    fn next(&mut self) -> Option<MatchResult> {
        loop {
            match self.phase {
                Phase::Exact(_) => {}
                Phase::Fuzzy(ref mut ranked) => return ranked.next(),
                Phase::Done => return None,
            }
            match self.next_exact() {
                Some(result) => return Some(result),
                None => self.enter_fuzzy_phase(),
            }
        }
    }
}

impl std::iter::FusedIterator for Matches {}
