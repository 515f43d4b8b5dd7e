//! Dataset download
//!
//! Fetches UnicodeData.txt over HTTP when no local copy exists. The body is
//! streamed into a uniquely named partial file next to the destination and
//! renamed into place once complete, so readers never observe a truncated
//! dataset. A lock file keeps concurrent processes from downloading twice.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use futures::StreamExt;

use crate::error::{CharFinderError, Result};

const LOCK_TIMEOUT_SECS: u64 = 60;
const LOCK_POLL_INTERVAL_MS: u64 = 100;

/// Removes the lock file when dropped
struct LockGuard {
    path: PathBuf,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

/// Removes a partial download unless it was renamed into place
struct PartialFile {
    path: PathBuf,
    keep: bool,
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if !self.keep {
            let _ = fs::remove_file(&self.path);
        }
    }
}

#[derive(Debug, Clone)]
pub struct DatasetDownloader {
    client: reqwest::Client,
    url: String,
}

impl DatasetDownloader {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let url = url.into();
        let user_agent = Self::format_user_agent();
        tracing::debug!("Creating HTTP client with User-Agent: {}", user_agent);

        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| CharFinderError::Download {
                url: url.clone(),
                reason: format!("failed to create HTTP client: {e}"),
            })?;
        Ok(Self { client, url })
    }

    fn format_user_agent() -> String {
        format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Make sure a dataset exists at `dest`, downloading it if necessary.
    pub async fn ensure_dataset(&self, dest: &Path) -> Result<()> {
        if dest.is_file() {
            tracing::debug!("Dataset already present at {}", dest.display());
            return Ok(());
        }

        let lock_path = dest.with_extension("download.lock");
        if lock_path.exists() {
            tracing::info!("Another process is downloading the dataset, waiting...");
            let start = Instant::now();
            while lock_path.exists() && start.elapsed() < Duration::from_secs(LOCK_TIMEOUT_SECS) {
                tokio::time::sleep(Duration::from_millis(LOCK_POLL_INTERVAL_MS)).await;
            }
            if dest.is_file() {
                tracing::info!("Dataset was downloaded by another process");
                return Ok(());
            }
        }

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| CharFinderError::io(parent, e))?;
        }
        fs::write(&lock_path, "downloading").map_err(|e| CharFinderError::io(&lock_path, e))?;
        let _lock_guard = LockGuard {
            path: lock_path.clone(),
        };

        self.download_to(dest).await
    }

    /// Download the dataset to `dest`, replacing any existing file
    pub async fn download_to(&self, dest: &Path) -> Result<()> {
        tracing::info!("Downloading Unicode dataset from {}", self.url);
        let download_error = |reason: String| CharFinderError::Download {
            url: self.url.clone(),
            reason,
        };

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| download_error(e.to_string()))?;
        if !response.status().is_success() {
            return Err(download_error(format!("HTTP {}", response.status())));
        }

        let file_name = dest
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "UnicodeData.txt".to_string());
        let mut partial = PartialFile {
            path: dest.with_file_name(format!(
                "{file_name}.{}.part",
                uuid::Uuid::new_v4().simple()
            )),
            keep: false,
        };
        let mut file =
            File::create(&partial.path).map_err(|e| CharFinderError::io(&partial.path, e))?;

        let mut written: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| download_error(format!("stream interrupted: {e}")))?;
            file.write_all(&chunk)
                .map_err(|e| CharFinderError::io(&partial.path, e))?;
            written += chunk.len() as u64;
        }
        file.sync_all()
            .map_err(|e| CharFinderError::io(&partial.path, e))?;
        drop(file);

        if written == 0 {
            return Err(download_error("empty response body".to_string()));
        }

        fs::rename(&partial.path, dest).map_err(|e| CharFinderError::io(dest, e))?;
        partial.keep = true;
        tracing::info!("Saved {} bytes to {}", written, dest.display());
        Ok(())
    }

    /// Send a HEAD request to check that the dataset URL is reachable
    pub async fn check_reachable(&self) -> Result<()> {
        let response = self
            .client
            .head(&self.url)
            .send()
            .await
            .map_err(|e| CharFinderError::Download {
                url: self.url.clone(),
                reason: e.to_string(),
            })?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(CharFinderError::Download {
                url: self.url.clone(),
                reason: format!("HTTP {}", response.status()),
            })
        }
    }
}
