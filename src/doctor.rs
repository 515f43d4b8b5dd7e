//! Environment diagnostics for the `doctor` command

use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::cache::storage::IndexCache;
use crate::cache::{CacheLookup, DatasetDownloader, Fingerprint};
use crate::config::Settings;
use crate::index::NameIndexBuilder;
use crate::normalize::normalize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticResult {
    pub name: String,
    pub success: bool,
    pub message: String,
    pub critical: bool,
}

impl DiagnosticResult {
    pub fn new(name: &str, success: bool, message: impl Into<String>, critical: bool) -> Self {
        Self {
            name: name.to_string(),
            success,
            message: message.into(),
            critical,
        }
    }
}

pub async fn run_diagnostics(settings: &Settings) -> Vec<DiagnosticResult> {
    let mut results = Vec::new();

    results.push(check_normalization());
    results.push(check_cache_directory(&settings.cache_dir));

    let dataset = check_dataset(settings);
    let dataset_ok = dataset.success;
    results.push(dataset);

    if dataset_ok {
        results.push(check_index_cache(settings));
    }

    results.push(check_network_connectivity(settings).await);

    results
}

fn check_normalization() -> DiagnosticResult {
    if normalize("Cafe\u{301}") == normalize("CAF\u{c9}") {
        DiagnosticResult::new("Unicode normalization", true, "NFC and case folding available", true)
    } else {
        DiagnosticResult::new(
            "Unicode normalization",
            false,
            "canonically equivalent names normalize differently",
            true,
        )
    }
}

fn check_cache_directory(cache_dir: &Path) -> DiagnosticResult {
    if let Err(e) = fs::create_dir_all(cache_dir) {
        return DiagnosticResult::new(
            "Cache directory",
            false,
            format!("Cannot create cache directory: {e}"),
            false,
        );
    }

    let test_file = cache_dir.join(format!(".test_write_{}", uuid::Uuid::new_v4().simple()));
    match fs::write(&test_file, "test") {
        Ok(()) => {
            let _ = fs::remove_file(&test_file);
            DiagnosticResult::new(
                "Cache directory",
                true,
                format!("{} (writable)", cache_dir.display()),
                false,
            )
        }
        Err(e) => DiagnosticResult::new(
            "Cache directory",
            false,
            format!("Directory not writable: {e}"),
            false,
        ),
    }
}

fn check_dataset(settings: &Settings) -> DiagnosticResult {
    let path = settings.dataset_path();
    if !path.is_file() {
        return if settings.offline {
            DiagnosticResult::new(
                "Dataset",
                false,
                format!("{} is missing and downloads are disabled", path.display()),
                true,
            )
        } else {
            DiagnosticResult::new(
                "Dataset",
                true,
                format!(
                    "{} not present yet, will be downloaded from {}",
                    path.display(),
                    settings.dataset_url
                ),
                true,
            )
        };
    }

    match NameIndexBuilder::build_from_file(&path) {
        Ok(outcome) if outcome.skipped == 0 => DiagnosticResult::new(
            "Dataset",
            true,
            format!("{} ({} named code points)", path.display(), outcome.index.len()),
            true,
        ),
        Ok(outcome) => DiagnosticResult::new(
            "Dataset",
            true,
            format!(
                "{} ({} named code points, {} malformed records skipped)",
                path.display(),
                outcome.index.len(),
                outcome.skipped
            ),
            true,
        ),
        Err(e) => DiagnosticResult::new("Dataset", false, e.to_string(), true),
    }
}

fn check_index_cache(settings: &Settings) -> DiagnosticResult {
    let fingerprint = match Fingerprint::of_file(&settings.dataset_path()) {
        Ok(fingerprint) => fingerprint,
        Err(e) => return DiagnosticResult::new("Index cache", false, e.to_string(), false),
    };

    let cache = IndexCache::new(settings.index_path());
    match cache.load(&fingerprint) {
        Ok(CacheLookup::Hit(index)) => DiagnosticResult::new(
            "Index cache",
            true,
            format!(
                "{} entries, built {}",
                index.len(),
                index.built_at().format("%Y-%m-%d %H:%M:%S UTC")
            ),
            false,
        ),
        Ok(CacheLookup::Miss) => DiagnosticResult::new(
            "Index cache",
            true,
            "not built yet, will be built on first search",
            false,
        ),
        Ok(CacheLookup::Stale { .. }) => DiagnosticResult::new(
            "Index cache",
            true,
            "built from a different dataset, will be rebuilt",
            false,
        ),
        Err(e) => DiagnosticResult::new("Index cache", false, e.to_string(), false),
    }
}

async fn check_network_connectivity(settings: &Settings) -> DiagnosticResult {
    if settings.offline {
        return DiagnosticResult::new("Network", true, "skipped (offline)", false);
    }

    let downloader = match DatasetDownloader::new(
        settings.dataset_url.clone(),
        Duration::from_secs(settings.download_timeout_secs.min(10)),
    ) {
        Ok(downloader) => downloader,
        Err(e) => return DiagnosticResult::new("Network", false, e.to_string(), false),
    };

    match downloader.check_reachable().await {
        Ok(()) => DiagnosticResult::new(
            "Network",
            true,
            format!("{} reachable", downloader.url()),
            false,
        ),
        Err(e) => DiagnosticResult::new("Network", false, e.to_string(), false),
    }
}

pub fn print_results(results: &[DiagnosticResult]) {
    println!("charfinder doctor\n");

    let mut failed_count = 0;
    for result in results {
        let icon = if result.success { "[ok]" } else { "[!!]" };
        println!("{} {}: {}", icon, result.name, result.message);
        if !result.success {
            failed_count += 1;
        }
    }

    if failed_count == 0 {
        println!("\nAll checks passed.");
        return;
    }

    println!(
        "\n[ERROR] Doctor found {} issue{}.",
        failed_count,
        if failed_count == 1 { "" } else { "s" }
    );
    for result in results.iter().filter(|r| !r.success) {
        match result.name.as_str() {
            "Dataset" => {
                println!("\nThe Unicode dataset is required. Run without --offline to download it,");
                println!("or point --dataset at a local UnicodeData.txt.");
            }
            "Index cache" => {
                println!("\nThe stored index is unusable. Rebuild it with:");
                println!("  charfinder build-index --force");
            }
            "Cache directory" => {
                println!("\nCache directory issues detected. Check file permissions and disk space.");
            }
            "Network" => {
                println!("\nNetwork connectivity issues detected. Check your internet connection.");
            }
            _ => {}
        }
    }
}

/// 0 when everything passed, 1 for non-critical failures, 2 when a critical
/// check failed
pub fn exit_code(results: &[DiagnosticResult]) -> i32 {
    if results.iter().any(|r| !r.success && r.critical) {
        2
    } else if results.iter().any(|r| !r.success) {
        1
    } else {
        0
    }
}
