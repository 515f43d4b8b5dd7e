//! # Search Module
//!
//! Exact and fuzzy matching of queries against the name index.
//!
//! ## Key Components
//!
//! - [`query`] - Search options and the validated [`MatchQuery`]
//! - [`engine`] - The lazy matching engine behind [`search`]
//! - [`fuzzy`] - Similarity scorers and hybrid aggregation
//! - [`outputs`] - Result values, text table lines and JSON records

pub mod engine;
pub mod fuzzy;
pub mod outputs;
pub mod query;

pub use engine::{FuzzyUsage, Matches, search};
pub use outputs::{CharMatch, DisplayLines, MatchKind, MatchResult, match_strategy_lines};
pub use query::{
    Aggregation, ExactMatchMode, FuzzyAlgorithm, FuzzyMode, MatchQuery, SearchOptions,
};
