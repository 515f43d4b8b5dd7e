//! Query options and the validated [`MatchQuery`]

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_THRESHOLD;
use crate::error::{CharFinderError, Result};

/// How the exact phase compares a query with a name
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum ExactMatchMode {
    /// The query is a contiguous substring of the name
    Substring,
    /// Every query word is a word of the name, in any order
    #[default]
    #[value(alias = "words")]
    WordSubset,
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum FuzzyMode {
    /// Score with exactly one algorithm
    #[default]
    Single,
    /// Score with several algorithms and aggregate
    Hybrid,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    ValueEnum,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum FuzzyAlgorithm {
    /// Longest matching blocks ratio
    #[value(alias = "sequencematcher", alias = "sequence-matcher")]
    SequenceRatio,
    /// One minus normalized Levenshtein distance
    #[value(alias = "levenshtein")]
    EditDistanceRatio,
    /// Insertion/deletion similarity ratio
    #[value(alias = "rapidfuzz", alias = "simple-ratio")]
    RapidFuzzRatio,
}

/// Statistic combining per-algorithm scores in hybrid mode
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum Aggregation {
    #[default]
    Mean,
    Median,
    Max,
    Min,
}

macro_rules! value_enum_str {
    ($($ty:ty => $what:literal),* $(,)?) => {$(
        impl FromStr for $ty {
            type Err = CharFinderError;

            fn from_str(s: &str) -> Result<Self> {
                <$ty as ValueEnum>::from_str(s.trim(), true).map_err(|_| {
                    CharFinderError::InvalidQuery(format!("unknown {} {:?}", $what, s))
                })
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self.to_possible_value() {
                    Some(value) => f.write_str(value.get_name()),
                    None => write!(f, "{self:?}"),
                }
            }
        }
    )*};
}

value_enum_str!(
    ExactMatchMode => "exact match mode",
    FuzzyMode => "fuzzy match mode",
    FuzzyAlgorithm => "fuzzy algorithm",
    Aggregation => "aggregation function",
);

/// Named search parameters with their defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    pub exact_mode: ExactMatchMode,
    pub fuzzy_enabled: bool,
    pub fuzzy_mode: FuzzyMode,
    pub algorithms: BTreeSet<FuzzyAlgorithm>,
    pub threshold: f64,
    pub aggregation: Aggregation,
    /// Run the fuzzy phase even when exact matches were found
    pub prefer_fuzzy: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            exact_mode: ExactMatchMode::WordSubset,
            fuzzy_enabled: false,
            fuzzy_mode: FuzzyMode::Single,
            algorithms: BTreeSet::from([FuzzyAlgorithm::RapidFuzzRatio]),
            threshold: DEFAULT_THRESHOLD,
            aggregation: Aggregation::Mean,
            prefer_fuzzy: false,
        }
    }
}

impl SearchOptions {
    pub fn fuzzy(mut self) -> Self {
        self.fuzzy_enabled = true;
        self
    }

    pub fn with_exact_mode(mut self, mode: ExactMatchMode) -> Self {
        self.exact_mode = mode;
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Replace the algorithm set
    pub fn with_algorithms(mut self, algorithms: impl IntoIterator<Item = FuzzyAlgorithm>) -> Self {
        self.algorithms = algorithms.into_iter().collect();
        self
    }

    pub fn hybrid(mut self, aggregation: Aggregation) -> Self {
        self.fuzzy_mode = FuzzyMode::Hybrid;
        self.aggregation = aggregation;
        self
    }
}

/// A validated, immutable search request
#[derive(Debug, Clone, PartialEq)]
pub struct MatchQuery {
    raw_query: String,
    exact_mode: ExactMatchMode,
    fuzzy_enabled: bool,
    fuzzy_mode: FuzzyMode,
    algorithms: Vec<FuzzyAlgorithm>,
    threshold: f64,
    aggregation: Aggregation,
    prefer_fuzzy: bool,
}

impl MatchQuery {
    /// Validate `options` for `raw_query`.
    ///
    /// Fails with [`CharFinderError::InvalidQuery`] when the threshold is
    /// outside `[0, 1]`, or when fuzzy matching is enabled with no algorithm
    /// or with several algorithms in single mode.
    pub fn new(raw_query: impl Into<String>, options: &SearchOptions) -> Result<Self> {
        let threshold = options.threshold;
        if !threshold.is_finite() || !(0.0..=1.0).contains(&threshold) {
            return Err(CharFinderError::InvalidQuery(format!(
                "threshold must be between 0.0 and 1.0, got {threshold}"
            )));
        }

        if options.fuzzy_enabled {
            match (options.fuzzy_mode, options.algorithms.len()) {
                (_, 0) => {
                    return Err(CharFinderError::InvalidQuery(
                        "fuzzy matching requires at least one algorithm".to_string(),
                    ));
                }
                (FuzzyMode::Single, n) if n > 1 => {
                    return Err(CharFinderError::InvalidQuery(format!(
                        "single fuzzy mode takes exactly one algorithm, got {n}"
                    )));
                }
                _ => {}
            }
        }

        Ok(Self {
            raw_query: raw_query.into(),
            exact_mode: options.exact_mode,
            fuzzy_enabled: options.fuzzy_enabled,
            fuzzy_mode: options.fuzzy_mode,
            algorithms: options.algorithms.iter().copied().collect(),
            threshold,
            aggregation: options.aggregation,
            prefer_fuzzy: options.prefer_fuzzy,
        })
    }

    pub fn raw_query(&self) -> &str {
        &self.raw_query
    }

    pub fn exact_mode(&self) -> ExactMatchMode {
        self.exact_mode
    }

    pub fn fuzzy_enabled(&self) -> bool {
        self.fuzzy_enabled
    }

    pub fn fuzzy_mode(&self) -> FuzzyMode {
        self.fuzzy_mode
    }

    /// Requested algorithms in a fixed order
    pub fn algorithms(&self) -> &[FuzzyAlgorithm] {
        &self.algorithms
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn aggregation(&self) -> Aggregation {
        self.aggregation
    }

    pub fn prefer_fuzzy(&self) -> bool {
        self.prefer_fuzzy
    }
}
