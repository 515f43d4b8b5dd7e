use std::fs;
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::fingerprint::Fingerprint;
use crate::error::{CharFinderError, Result};
use crate::index::{CodePointEntry, NameIndex};

/// Bumped whenever the on-disk layout changes; older files are rebuilt.
pub const INDEX_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Deserialize)]
struct StoredIndex {
    format_version: u32,
    fingerprint: Fingerprint,
    built_at: DateTime<Utc>,
    entries: Vec<CodePointEntry>,
}

#[derive(Serialize)]
struct StoredIndexRef<'a> {
    format_version: u32,
    fingerprint: &'a Fingerprint,
    built_at: DateTime<Utc>,
    entries: Vec<&'a CodePointEntry>,
}

/// Outcome of looking up the persisted index
#[derive(Debug)]
pub enum CacheLookup {
    /// A valid index built from the expected dataset
    Hit(NameIndex),
    /// No index has been stored
    Miss,
    /// A valid index built from a different dataset
    Stale { cached: Fingerprint },
}

/// Summary of the persisted index file
#[derive(Debug, Clone, Serialize)]
pub struct StoredIndexInfo {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub format_version: u32,
    pub fingerprint: Fingerprint,
    pub built_at: DateTime<Utc>,
    pub entries: usize,
}

/// Manages the serialized name index on disk
#[derive(Debug, Clone)]
pub struct IndexCache {
    path: PathBuf,
}

impl IndexCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Load the stored index if it was built from the dataset identified by
    /// `expected`.
    ///
    /// Unparseable files, unknown format versions and inconsistent contents
    /// are reported as [`CharFinderError::CacheCorrupt`].
    pub fn load(&self, expected: &Fingerprint) -> Result<CacheLookup> {
        let Some(stored) = self.read()? else {
            tracing::debug!("No index cache at {}", self.path.display());
            return Ok(CacheLookup::Miss);
        };

        if stored.fingerprint != *expected {
            tracing::info!(
                "Index cache {} was built from dataset {}, expected {}",
                self.path.display(),
                stored.fingerprint.short(),
                expected.short()
            );
            return Ok(CacheLookup::Stale {
                cached: stored.fingerprint,
            });
        }

        let stored_len = stored.entries.len();
        let index = NameIndex::from_entries(stored.entries, stored.fingerprint, stored.built_at);
        if index.len() != stored_len {
            return Err(CharFinderError::corrupt(
                &self.path,
                "duplicate code points in stored entries",
            ));
        }

        tracing::info!(
            "Loaded {} entries from index cache {}",
            index.len(),
            self.path.display()
        );
        Ok(CacheLookup::Hit(index))
    }

    /// Describe the stored index without checking it against a dataset
    pub fn inspect(&self) -> Result<Option<StoredIndexInfo>> {
        let Some(stored) = self.read()? else {
            return Ok(None);
        };
        let size_bytes = fs::metadata(&self.path)
            .map_err(|e| CharFinderError::io(&self.path, e))?
            .len();
        Ok(Some(StoredIndexInfo {
            path: self.path.clone(),
            size_bytes,
            format_version: stored.format_version,
            fingerprint: stored.fingerprint,
            built_at: stored.built_at,
            entries: stored.entries.len(),
        }))
    }

    /// Persist `index`, replacing any previous file atomically
    pub fn store(&self, index: &NameIndex) -> Result<()> {
        let parent = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        fs::create_dir_all(parent).map_err(|e| CharFinderError::io(parent, e))?;

        let temp = tempfile::NamedTempFile::new_in(parent)
            .map_err(|e| CharFinderError::io(parent, e))?;
        {
            let mut writer = BufWriter::new(temp.as_file());
            serde_json::to_writer(
                &mut writer,
                &StoredIndexRef {
                    format_version: INDEX_FORMAT_VERSION,
                    fingerprint: index.fingerprint(),
                    built_at: index.built_at(),
                    entries: index.entries().collect(),
                },
            )?;
            writer
                .flush()
                .map_err(|e| CharFinderError::io(temp.path(), e))?;
        }
        temp.as_file()
            .sync_all()
            .map_err(|e| CharFinderError::io(temp.path(), e))?;
        temp.persist(&self.path)
            .map_err(|e| CharFinderError::io(&self.path, e.error))?;

        tracing::info!(
            "Stored {} entries in index cache {}",
            index.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Remove the stored index. Returns whether a file was removed.
    pub fn clear(&self) -> Result<bool> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::info!("Removed index cache {}", self.path.display());
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CharFinderError::io(&self.path, e)),
        }
    }

    fn read(&self) -> Result<Option<StoredIndex>> {
        let file = match fs::File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CharFinderError::io(&self.path, e)),
        };

        let stored: StoredIndex = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| CharFinderError::corrupt(&self.path, e.to_string()))?;

        if stored.format_version != INDEX_FORMAT_VERSION {
            return Err(CharFinderError::corrupt(
                &self.path,
                format!(
                    "format version {} is not supported (expected {})",
                    stored.format_version, INDEX_FORMAT_VERSION
                ),
            ));
        }
        if stored.entries.is_empty() {
            return Err(CharFinderError::corrupt(&self.path, "no entries"));
        }
        Ok(Some(stored))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_index(data: &[u8]) -> NameIndex {
        NameIndex::from_entries(
            vec![
                CodePointEntry::new(0x2603, "SNOWMAN"),
                CodePointEntry::new(0x00A6, "BROKEN BAR").with_alternate("BROKEN VERTICAL BAR"),
            ],
            Fingerprint::of_bytes(data),
            Utc::now(),
        )
    }

    #[test]
    fn test_store_then_load_returns_equal_index() {
        let temp_dir = TempDir::new().unwrap();
        let cache = IndexCache::new(temp_dir.path().join("nested").join("index.json"));
        let index = sample_index(b"v1");

        cache.store(&index).unwrap();
        assert!(cache.exists());

        match cache.load(index.fingerprint()).unwrap() {
            CacheLookup::Hit(loaded) => assert_eq!(loaded, index),
            other => panic!("expected a hit, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_file_is_a_miss() {
        let temp_dir = TempDir::new().unwrap();
        let cache = IndexCache::new(temp_dir.path().join("index.json"));
        assert!(matches!(
            cache.load(&Fingerprint::of_bytes(b"v1")).unwrap(),
            CacheLookup::Miss
        ));
        assert!(cache.inspect().unwrap().is_none());
    }

    #[test]
    fn test_fingerprint_mismatch_is_stale() {
        let temp_dir = TempDir::new().unwrap();
        let cache = IndexCache::new(temp_dir.path().join("index.json"));
        let index = sample_index(b"v1");
        cache.store(&index).unwrap();

        match cache.load(&Fingerprint::of_bytes(b"v2")).unwrap() {
            CacheLookup::Stale { cached } => assert_eq!(&cached, index.fingerprint()),
            other => panic!("expected stale, got {other:?}"),
        }
    }

    #[test]
    fn test_garbage_and_wrong_version_are_corrupt() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("index.json");
        let cache = IndexCache::new(&path);
        let expected = Fingerprint::of_bytes(b"v1");

        fs::write(&path, "{ not json").unwrap();
        let err = cache.load(&expected).unwrap_err();
        assert!(err.is_cache_miss());

        let future = serde_json::json!({
            "format_version": INDEX_FORMAT_VERSION + 1,
            "fingerprint": expected,
            "built_at": Utc::now(),
            "entries": [{"code_point": 9731, "canonical_name": "SNOWMAN"}],
        });
        fs::write(&path, future.to_string()).unwrap();
        let err = cache.load(&expected).unwrap_err();
        assert!(err.is_cache_miss());
        assert!(err.to_string().contains("format version"));
    }

    #[test]
    fn test_duplicate_entries_are_corrupt() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("index.json");
        let expected = Fingerprint::of_bytes(b"v1");
        let doc = serde_json::json!({
            "format_version": INDEX_FORMAT_VERSION,
            "fingerprint": expected,
            "built_at": Utc::now(),
            "entries": [
                {"code_point": 9731, "canonical_name": "SNOWMAN"},
                {"code_point": 9731, "canonical_name": "SNOWMAN"},
            ],
        });
        fs::write(&path, doc.to_string()).unwrap();

        let err = IndexCache::new(&path).load(&expected).unwrap_err();
        assert!(matches!(err, CharFinderError::CacheCorrupt { .. }));
    }

    #[test]
    fn test_inspect_and_clear() {
        let temp_dir = TempDir::new().unwrap();
        let cache = IndexCache::new(temp_dir.path().join("index.json"));
        let index = sample_index(b"v1");
        cache.store(&index).unwrap();

        let info = cache.inspect().unwrap().unwrap();
        assert_eq!(info.entries, 2);
        assert_eq!(&info.fingerprint, index.fingerprint());
        assert_eq!(info.format_version, INDEX_FORMAT_VERSION);
        assert!(info.size_bytes > 0);

        assert!(cache.clear().unwrap());
        assert!(!cache.clear().unwrap());
        assert!(!cache.exists());
    }
}
