//! Find Unicode characters by name.
//!
//! A [`NameIndex`] is built once from `UnicodeData.txt`, persisted next to the
//! dataset, and searched with exact (substring or word subset) and fuzzy
//! (sequence, edit distance and indel ratios, alone or aggregated) matching.
//!
//! ```no_run
//! # async fn demo() -> charfinder::Result<()> {
//! use charfinder::{CharFinder, SearchOptions, Settings};
//!
//! let finder = CharFinder::open(Settings::load(None)?).await?;
//! for line in finder.find_chars("snowman", &SearchOptions::default())? {
//!     println!("{line}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod doctor;
pub mod error;
pub mod index;
pub mod normalize;
pub mod search;
pub mod service;

use std::sync::Arc;

pub use config::Settings;
pub use error::{CharFinderError, Result};
pub use index::{CodePointEntry, IndexHandle, NameIndex, NameIndexBuilder};
pub use normalize::{NormalizationCache, normalize};
pub use search::{
    Aggregation, CharMatch, DisplayLines, ExactMatchMode, FuzzyAlgorithm, FuzzyMode, FuzzyUsage,
    MatchKind, MatchQuery, MatchResult, Matches, SearchOptions,
};
pub use service::{BuildReport, CacheInfo, CharFinder, IndexSource};

/// Formatted result lines for `query`.
///
/// With `index` the search runs on that index and no file is read;
/// otherwise the index is loaded (or built) from the default settings.
pub async fn find_chars(
    query: &str,
    options: &SearchOptions,
    index: Option<Arc<NameIndex>>,
) -> Result<DisplayLines<Matches>> {
    finder_for(index).await?.find_chars(query, options)
}

/// Structured results for `query`; see [`find_chars`] for `index`
pub async fn find_chars_raw(
    query: &str,
    options: &SearchOptions,
    index: Option<Arc<NameIndex>>,
) -> Result<Vec<MatchResult>> {
    finder_for(index).await?.find_chars_raw(query, options)
}

/// Structured results plus whether fuzzy matching ran; see [`find_chars`]
pub async fn find_chars_with_info(
    query: &str,
    options: &SearchOptions,
    index: Option<Arc<NameIndex>>,
) -> Result<(Vec<MatchResult>, bool)> {
    finder_for(index).await?.find_chars_with_info(query, options)
}

async fn finder_for(index: Option<Arc<NameIndex>>) -> Result<CharFinder> {
    finder_from(index, || Settings::load(None)).await
}

/// A provided index needs no settings file, dataset or cache, so
/// `load_settings` only runs without one
async fn finder_from(
    index: Option<Arc<NameIndex>>,
    load_settings: impl FnOnce() -> Result<Settings>,
) -> Result<CharFinder> {
    match index {
        Some(index) => Ok(CharFinder::with_index(Settings::default(), index)),
        None => CharFinder::open(load_settings()?).await,
    }
}
