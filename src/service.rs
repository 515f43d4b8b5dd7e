//! The character finder service
//!
//! [`CharFinder`] owns the lifecycle of one name index: it makes sure the
//! dataset is present, loads the persisted index or rebuilds it, and answers
//! queries against whatever index is current. Rebuilds construct a new index
//! and swap it in, so searches already running keep their snapshot.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cache::fingerprint::Fingerprint;
use crate::cache::lock::BuildLock;
use crate::cache::storage::{CacheLookup, IndexCache, StoredIndexInfo};
use crate::cache::DatasetDownloader;
use crate::config::Settings;
use crate::error::{CharFinderError, Result};
use crate::index::{IndexHandle, NameIndex, NameIndexBuilder};
use crate::normalize::{CacheStats, NormalizationCache};
use crate::search::{self, DisplayLines, MatchQuery, MatchResult, Matches, SearchOptions};

/// Where the current index came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexSource {
    /// Loaded from the persisted index file
    Cache,
    /// Built from the dataset during this run
    Built,
}

/// Summary of a load or build
#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub source: IndexSource,
    pub entries: usize,
    /// Malformed dataset records skipped while building
    pub skipped: usize,
    pub fingerprint: Fingerprint,
    pub built_at: DateTime<Utc>,
    /// Whether the index is persisted; `false` means in-memory only
    pub persisted: bool,
    pub elapsed_ms: u128,
}

/// State of the caches, for `cache-info`
#[derive(Debug, Clone, Serialize)]
pub struct CacheInfo {
    pub cache_dir: PathBuf,
    pub dataset_path: PathBuf,
    pub dataset_present: bool,
    pub index_path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stored_index: Option<StoredIndexInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stored_index_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loaded_index: Option<LoadedIndexInfo>,
    pub normalization: CacheStats,
}

/// The index currently held in memory
#[derive(Debug, Clone, Serialize)]
pub struct LoadedIndexInfo {
    pub entries: usize,
    pub tokens: usize,
    pub fingerprint: Fingerprint,
    pub built_at: DateTime<Utc>,
}

/// A ready-to-query character finder
#[derive(Debug, Clone)]
pub struct CharFinder {
    settings: Settings,
    index: IndexHandle,
    normalization: Arc<NormalizationCache>,
    index_cache: IndexCache,
}

impl CharFinder {
    /// Prepare the dataset and index described by `settings`.
    ///
    /// Downloads the dataset unless it exists or `settings.offline` is set,
    /// then loads the persisted index, rebuilding it when it is missing,
    /// stale or corrupt.
    pub async fn open(settings: Settings) -> Result<Self> {
        let (finder, report) = Self::open_with_report(settings).await?;
        tracing::info!(
            "Name index ready: {} entries from {:?} in {} ms",
            report.entries,
            report.source,
            report.elapsed_ms
        );
        Ok(finder)
    }

    /// Like [`CharFinder::open`], also returning how the index was obtained
    pub async fn open_with_report(settings: Settings) -> Result<(Self, BuildReport)> {
        ensure_dataset(&settings).await?;
        let index_cache = IndexCache::new(settings.index_path());
        let (index, report) = load_or_build_blocking(&settings, &index_cache, false).await?;

        let finder = Self {
            normalization: Arc::new(NormalizationCache::new(
                settings.normalization_cache_capacity,
            )),
            index: IndexHandle::new(index),
            index_cache,
            settings,
        };
        Ok((finder, report))
    }

    /// Use a pre-built index; no dataset or cache file is touched
    pub fn with_index(settings: Settings, index: Arc<NameIndex>) -> Self {
        Self {
            normalization: Arc::new(NormalizationCache::new(
                settings.normalization_cache_capacity,
            )),
            index: IndexHandle::from_arc(index),
            index_cache: IndexCache::new(settings.index_path()),
            settings,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Snapshot of the current index
    pub fn index(&self) -> Arc<NameIndex> {
        self.index.current()
    }

    pub fn normalization_stats(&self) -> CacheStats {
        self.normalization.stats()
    }

    /// Lazily evaluated results for a validated query
    pub fn search(&self, query: &MatchQuery) -> Matches {
        search::search(self.index.current(), query, &self.normalization)
    }

    /// Formatted table lines for `query`
    pub fn find_chars(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<DisplayLines<Matches>> {
        let query = MatchQuery::new(query, options)?;
        let mixed_kinds = query.fuzzy_enabled() && query.prefer_fuzzy();
        Ok(DisplayLines::new(self.search(&query), mixed_kinds))
    }

    /// Structured results for `query`
    pub fn find_chars_raw(&self, query: &str, options: &SearchOptions) -> Result<Vec<MatchResult>> {
        let query = MatchQuery::new(query, options)?;
        Ok(self.search(&query).collect())
    }

    /// Structured results for `query`, plus whether fuzzy matching ran
    pub fn find_chars_with_info(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<(Vec<MatchResult>, bool)> {
        let query = MatchQuery::new(query, options)?;
        let mut matches = self.search(&query);
        let results: Vec<MatchResult> = matches.by_ref().collect();
        Ok((results, matches.fuzzy_ran()))
    }

    /// Load or rebuild the index and publish it.
    ///
    /// With `force_rebuild` the persisted index is ignored and rebuilt from
    /// the dataset.
    pub async fn build_index(&self, force_rebuild: bool) -> Result<BuildReport> {
        ensure_dataset(&self.settings).await?;
        let (index, report) =
            load_or_build_blocking(&self.settings, &self.index_cache, force_rebuild).await?;
        let previous = self.index.swap(index);
        tracing::info!(
            "Swapped name index ({} -> {} entries)",
            previous.len(),
            report.entries
        );
        Ok(report)
    }

    /// Remove the persisted index and reset the normalization memo. The
    /// in-memory index stays usable. Returns whether a file was removed.
    pub fn clear_cache(&self) -> Result<bool> {
        self.normalization.clear();
        self.index_cache.clear()
    }

    pub fn cache_info(&self) -> CacheInfo {
        cache_info(&self.settings, Some(self))
    }
}

/// Describe the caches under `settings` without building anything
pub fn cache_info(settings: &Settings, finder: Option<&CharFinder>) -> CacheInfo {
    let index_cache = IndexCache::new(settings.index_path());
    let (stored_index, stored_index_error) = match index_cache.inspect() {
        Ok(info) => (info, None),
        Err(e) => (None, Some(e.to_string())),
    };
    let loaded_index = finder.map(|finder| {
        let index = finder.index();
        LoadedIndexInfo {
            entries: index.len(),
            tokens: index.token_count(),
            fingerprint: index.fingerprint().clone(),
            built_at: index.built_at(),
        }
    });
    let normalization = match finder {
        Some(finder) => finder.normalization_stats(),
        None => NormalizationCache::new(settings.normalization_cache_capacity).stats(),
    };

    CacheInfo {
        cache_dir: settings.cache_dir.clone(),
        dataset_path: settings.dataset_path(),
        dataset_present: settings.dataset_path().is_file(),
        index_path: index_cache.path().to_path_buf(),
        stored_index,
        stored_index_error,
        loaded_index,
        normalization,
    }
}

/// Make sure the dataset file exists, downloading it when allowed
pub async fn ensure_dataset(settings: &Settings) -> Result<PathBuf> {
    let path = settings.dataset_path();
    if path.is_file() {
        return Ok(path);
    }
    if settings.offline {
        return Err(CharFinderError::io(
            &path,
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "dataset is missing and downloads are disabled (offline)",
            ),
        ));
    }

    let downloader = DatasetDownloader::new(
        settings.dataset_url.clone(),
        Duration::from_secs(settings.download_timeout_secs),
    )?;
    downloader.ensure_dataset(&path).await?;
    Ok(path)
}

async fn load_or_build_blocking(
    settings: &Settings,
    index_cache: &IndexCache,
    force_rebuild: bool,
) -> Result<(NameIndex, BuildReport)> {
    let dataset_path = settings.dataset_path();
    let lock_path = settings.lock_path();
    let index_cache = index_cache.clone();

    tokio::task::spawn_blocking(move || {
        load_or_build(&dataset_path, &index_cache, &lock_path, force_rebuild)
    })
    .await
    .map_err(|e| CharFinderError::Task(e.to_string()))?
}

/// Load the persisted index for the dataset at `dataset_path`, or build and
/// store a new one.
///
/// Cache problems never fail the call: a corrupt or stale file is rebuilt,
/// and a failed store leaves the index in memory only.
pub fn load_or_build(
    dataset_path: &Path,
    index_cache: &IndexCache,
    lock_path: &Path,
    force_rebuild: bool,
) -> Result<(NameIndex, BuildReport)> {
    let started = Instant::now();
    let bytes = fs::read(dataset_path).map_err(|e| CharFinderError::io(dataset_path, e))?;
    let fingerprint = Fingerprint::of_bytes(&bytes);
    tracing::debug!(
        "Dataset {} has fingerprint {}",
        dataset_path.display(),
        fingerprint.short()
    );

    if !force_rebuild && let Some(index) = try_load(index_cache, &fingerprint) {
        let report = report_for(&index, IndexSource::Cache, 0, true, started);
        return Ok((index, report));
    }

    let _lock = match BuildLock::acquire(lock_path) {
        Ok(lock) => Some(lock),
        Err(e) => {
            tracing::warn!("Building without the build lock: {}", e);
            None
        }
    };

    // another process may have stored the index while we waited
    if !force_rebuild && let Some(index) = try_load(index_cache, &fingerprint) {
        let report = report_for(&index, IndexSource::Cache, 0, true, started);
        return Ok((index, report));
    }

    let outcome = NameIndexBuilder::new(fingerprint).build_from_bytes(&bytes)?;
    if outcome.skipped > 0 {
        tracing::warn!(
            "Skipped {} malformed records in {}",
            outcome.skipped,
            dataset_path.display()
        );
    }

    let persisted = match index_cache.store(&outcome.index) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("Could not persist the name index, continuing in memory: {}", e);
            false
        }
    };

    let report = report_for(
        &outcome.index,
        IndexSource::Built,
        outcome.skipped,
        persisted,
        started,
    );
    Ok((outcome.index, report))
}

fn try_load(index_cache: &IndexCache, fingerprint: &Fingerprint) -> Option<NameIndex> {
    match index_cache.load(fingerprint) {
        Ok(CacheLookup::Hit(index)) => Some(index),
        Ok(CacheLookup::Miss) => None,
        Ok(CacheLookup::Stale { cached }) => {
            tracing::info!(
                "Index cache is stale (built from {}), rebuilding",
                cached.short()
            );
            None
        }
        Err(e) if e.is_cache_miss() => {
            tracing::warn!("{}; rebuilding", e);
            None
        }
        Err(e) => {
            tracing::warn!("Could not read the index cache, rebuilding: {}", e);
            None
        }
    }
}

fn report_for(
    index: &NameIndex,
    source: IndexSource,
    skipped: usize,
    persisted: bool,
    started: Instant,
) -> BuildReport {
    BuildReport {
        source,
        entries: index.len(),
        skipped,
        fingerprint: index.fingerprint().clone(),
        built_at: index.built_at(),
        persisted,
        elapsed_ms: started.elapsed().as_millis(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::MatchKind;
    use tempfile::TempDir;

    const DATASET: &str = "\
0041;LATIN CAPITAL LETTER A;Lu;0;L;;;;;N;;;;0061;
2603;SNOWMAN;So;0;ON;;;;;N;;;;;
2665;BLACK HEART SUIT;So;0;ON;;;;;N;;;;;
2764;HEAVY BLACK HEART;So;0;ON;;;;;N;;;;;
";

    fn offline_settings(temp_dir: &TempDir) -> Settings {
        let mut settings = Settings::with_cache_dir(temp_dir.path());
        settings.offline = true;
        settings
    }

    #[test]
    fn test_load_or_build_then_load_from_cache() {
        let temp_dir = TempDir::new().unwrap();
        let settings = offline_settings(&temp_dir);
        fs::write(settings.dataset_path(), DATASET).unwrap();
        let index_cache = IndexCache::new(settings.index_path());

        let (built, report) =
            load_or_build(&settings.dataset_path(), &index_cache, &settings.lock_path(), false)
                .unwrap();
        assert_eq!(report.source, IndexSource::Built);
        assert!(report.persisted);
        assert_eq!(report.entries, 4);

        let (loaded, report) =
            load_or_build(&settings.dataset_path(), &index_cache, &settings.lock_path(), false)
                .unwrap();
        assert_eq!(report.source, IndexSource::Cache);
        assert_eq!(loaded, built);
    }

    #[test]
    fn test_corrupt_cache_is_rebuilt() {
        let temp_dir = TempDir::new().unwrap();
        let settings = offline_settings(&temp_dir);
        fs::write(settings.dataset_path(), DATASET).unwrap();
        fs::write(settings.index_path(), "{ truncated").unwrap();
        let index_cache = IndexCache::new(settings.index_path());

        let (_, report) =
            load_or_build(&settings.dataset_path(), &index_cache, &settings.lock_path(), false)
                .unwrap();
        assert_eq!(report.source, IndexSource::Built);
        assert!(matches!(
            index_cache.load(&report.fingerprint).unwrap(),
            CacheLookup::Hit(_)
        ));
    }

    #[tokio::test]
    async fn test_offline_without_dataset_is_an_io_error() {
        let temp_dir = TempDir::new().unwrap();
        let err = CharFinder::open(offline_settings(&temp_dir)).await.unwrap_err();
        assert!(matches!(err, CharFinderError::Io { .. }));
    }

    #[tokio::test]
    async fn test_find_chars_with_provided_index() {
        let outcome = NameIndexBuilder::new(Fingerprint::of_bytes(DATASET))
            .build_from_text(DATASET)
            .unwrap();
        let temp_dir = TempDir::new().unwrap();
        let finder = CharFinder::with_index(offline_settings(&temp_dir), Arc::new(outcome.index));

        let lines: Vec<String> = finder
            .find_chars("black heart", &SearchOptions::default())
            .unwrap()
            .collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[2].starts_with("U+2665"));
        assert!(lines[3].starts_with("U+2764"));

        let raw = finder.find_chars_raw("snowman", &SearchOptions::default()).unwrap();
        assert_eq!(raw.len(), 1);
        assert_eq!(raw[0].match_kind, MatchKind::Exact);

        let invalid = SearchOptions::default().with_threshold(2.0);
        assert!(matches!(
            finder.find_chars_raw("snowman", &invalid),
            Err(CharFinderError::InvalidQuery(_))
        ));
        // no dataset or index file was created
        assert!(!finder.settings().index_path().exists());
    }

    #[test]
    fn test_find_chars_with_info_reports_fuzzy_use() {
        let outcome = NameIndexBuilder::new(Fingerprint::of_bytes(DATASET))
            .build_from_text(DATASET)
            .unwrap();
        let temp_dir = TempDir::new().unwrap();
        let finder = CharFinder::with_index(offline_settings(&temp_dir), Arc::new(outcome.index));
        let fuzzy = SearchOptions::default().fuzzy().with_threshold(0.6);

        let (results, fuzzy_used) = finder
            .find_chars_with_info("snowman", &SearchOptions::default())
            .unwrap();
        assert_eq!(results.len(), 1);
        assert!(!fuzzy_used);

        let (results, fuzzy_used) = finder.find_chars_with_info("snowman", &fuzzy).unwrap();
        assert_eq!(results[0].match_kind, MatchKind::Exact);
        assert!(!fuzzy_used);

        let (results, fuzzy_used) = finder.find_chars_with_info("snowmen", &fuzzy).unwrap();
        assert_eq!(results[0].code_point, 0x2603);
        assert_eq!(results[0].match_kind, MatchKind::Fuzzy);
        assert!(fuzzy_used);
    }
}
