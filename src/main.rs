use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use charfinder::doctor;
use charfinder::search;
use charfinder::service::{self, CacheInfo};
use charfinder::{
    Aggregation, CharFinder, CharFinderError, CharMatch, DisplayLines, ExactMatchMode,
    FuzzyAlgorithm, FuzzyMode, MatchQuery, MatchResult, SearchOptions, Settings,
};

const EXIT_OK: i32 = 0;
const EXIT_INVALID_USAGE: i32 = 1;
const EXIT_NO_RESULTS: i32 = 2;
const EXIT_ERROR: i32 = 3;

/// Find Unicode characters by name, with exact and fuzzy matching
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, args_conflicts_with_subcommands = true)]
struct Args {
    /// Words to search for in character names
    query: Vec<String>,

    /// Fall back to fuzzy matching when nothing matches exactly
    #[arg(short, long)]
    fuzzy: bool,

    /// Minimum fuzzy score, between 0.0 and 1.0
    #[arg(short, long, default_value_t = charfinder::config::DEFAULT_THRESHOLD)]
    threshold: f64,

    /// How exact matching compares the query with names
    #[arg(long, value_enum, default_value_t = ExactMatchMode::WordSubset)]
    exact_match_mode: ExactMatchMode,

    /// Fuzzy algorithm; repeat in hybrid mode (default: rapid-fuzz-ratio,
    /// or all algorithms in hybrid mode)
    #[arg(long = "fuzzy-algo", value_enum)]
    fuzzy_algo: Vec<FuzzyAlgorithm>,

    #[arg(long, value_enum, default_value_t = FuzzyMode::Single)]
    fuzzy_match_mode: FuzzyMode,

    /// How hybrid mode combines algorithm scores
    #[arg(long, value_enum, default_value_t = Aggregation::Mean)]
    hybrid_agg_fn: Aggregation,

    /// Run fuzzy matching even when exact matches exist
    #[arg(long)]
    prefer_fuzzy: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Print at most this many results
    #[arg(short = 'n', long)]
    limit: Option<usize>,

    #[command(flatten)]
    common: CommonArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Args, Debug, Clone)]
struct CommonArgs {
    /// Settings file (defaults to ~/.charfinder/config.toml)
    #[arg(long, env = "CHARFINDER_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Custom cache directory path (defaults to ~/.charfinder/cache)
    #[arg(long, env = "CHARFINDER_CACHE_DIR", global = true)]
    cache_dir: Option<PathBuf>,

    /// UnicodeData.txt to index (defaults to <cache-dir>/UnicodeData.txt)
    #[arg(long, env = "CHARFINDER_DATASET", global = true)]
    dataset: Option<PathBuf>,

    /// Never download the dataset
    #[arg(long, env = "CHARFINDER_OFFLINE", global = true)]
    offline: bool,

    /// Log progress to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log debugging detail to stderr
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load the name index, building and storing it if needed
    BuildIndex {
        /// Rebuild even if a valid index is stored
        #[arg(long)]
        force: bool,
    },
    /// Remove the stored name index
    ClearCache,
    /// Show dataset and index cache status
    CacheInfo {
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Check the environment for common problems
    Doctor,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let code = if e.use_stderr() {
                EXIT_INVALID_USAGE
            } else {
                EXIT_OK
            };
            let _ = e.print();
            process::exit(code);
        }
    };

    init_tracing(&args.common);

    let code = match run(args).await {
        Ok(code) => code,
        Err(e) => {
            let invalid_query = matches!(
                e.downcast_ref::<CharFinderError>(),
                Some(CharFinderError::InvalidQuery(_))
            );
            eprintln!("Error: {e:#}");
            if invalid_query {
                EXIT_INVALID_USAGE
            } else {
                EXIT_ERROR
            }
        }
    };
    process::exit(code);
}

fn init_tracing(common: &CommonArgs) {
    let level = if common.debug {
        tracing::Level::DEBUG
    } else if common.verbose {
        tracing::Level::INFO
    } else {
        tracing::Level::WARN
    };

    // stderr keeps stdout clean for results
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

fn resolve_settings(common: &CommonArgs) -> Result<Settings> {
    let mut settings = Settings::load(common.config.as_deref())?;
    if let Some(cache_dir) = &common.cache_dir {
        tracing::info!("Using custom cache directory: {}", cache_dir.display());
        settings.cache_dir = cache_dir.clone();
    }
    if let Some(dataset) = &common.dataset {
        settings.dataset_path = Some(dataset.clone());
    }
    settings.offline |= common.offline;
    Ok(settings)
}

async fn run(args: Args) -> Result<i32> {
    let settings = resolve_settings(&args.common)?;

    if let Some(command) = args.command {
        return handle_command(command, settings).await;
    }

    if args.query.is_empty() {
        eprintln!("Error: a query is required (see --help)");
        return Ok(EXIT_INVALID_USAGE);
    }
    let raw_query = args.query.join(" ");

    let algorithms = match (args.fuzzy_algo.is_empty(), args.fuzzy_match_mode) {
        (false, _) => args.fuzzy_algo.clone(),
        (true, FuzzyMode::Single) => vec![FuzzyAlgorithm::RapidFuzzRatio],
        (true, FuzzyMode::Hybrid) => FuzzyAlgorithm::value_variants().to_vec(),
    };
    let options = SearchOptions {
        exact_mode: args.exact_match_mode,
        fuzzy_enabled: args.fuzzy,
        fuzzy_mode: args.fuzzy_match_mode,
        algorithms: algorithms.into_iter().collect(),
        threshold: args.threshold,
        aggregation: args.hybrid_agg_fn,
        prefer_fuzzy: args.prefer_fuzzy,
    };
    // validate before any download or index build
    let query = MatchQuery::new(raw_query, &options)?;

    let finder = CharFinder::open(settings)
        .await
        .context("Failed to load the Unicode name index")?;
    let limit = args.limit.unwrap_or(usize::MAX);
    let mut matches = finder.search(&query);
    let results: Vec<MatchResult> = matches.by_ref().take(limit).collect();

    if args.common.debug {
        for line in search::match_strategy_lines(&query, matches.fuzzy_usage()) {
            eprintln!("{line}");
        }
    }

    let found = match args.format {
        OutputFormat::Text => {
            let mixed_kinds = query.fuzzy_enabled() && query.prefer_fuzzy();
            let found = !results.is_empty();
            for line in DisplayLines::new(results.into_iter(), mixed_kinds) {
                println!("{line}");
            }
            found
        }
        OutputFormat::Json => {
            let records: Vec<CharMatch> = results.iter().map(MatchResult::to_char_match).collect();
            // an empty array is a complete answer
            println!("{}", serde_json::to_string_pretty(&records)?);
            true
        }
    };

    if found {
        Ok(EXIT_OK)
    } else {
        eprintln!("No matches found for {:?}", query.raw_query());
        Ok(EXIT_NO_RESULTS)
    }
}

async fn handle_command(command: Commands, settings: Settings) -> Result<i32> {
    match command {
        Commands::BuildIndex { force } => {
            let (finder, report) = CharFinder::open_with_report(settings).await?;
            let report = if force {
                finder.build_index(true).await?
            } else {
                report
            };
            println!(
                "Name index: {} entries ({:?}, {} malformed records skipped) in {} ms",
                report.entries, report.source, report.skipped, report.elapsed_ms
            );
            println!("Dataset fingerprint: {}", report.fingerprint);
            if !report.persisted {
                println!("Warning: the index could not be stored and is not cached");
            }
            Ok(EXIT_OK)
        }
        Commands::ClearCache => {
            let index_cache = charfinder::cache::IndexCache::new(settings.index_path());
            if index_cache.clear()? {
                println!("Removed {}", index_cache.path().display());
            } else {
                println!("No stored index at {}", index_cache.path().display());
            }
            Ok(EXIT_OK)
        }
        Commands::CacheInfo { format } => {
            let info = service::cache_info(&settings, None);
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&info)?),
                OutputFormat::Text => print_cache_info(&info),
            }
            Ok(EXIT_OK)
        }
        Commands::Doctor => {
            let results = doctor::run_diagnostics(&settings).await;
            doctor::print_results(&results);
            Ok(doctor::exit_code(&results))
        }
    }
}

fn print_cache_info(info: &CacheInfo) {
    println!("Cache directory: {}", info.cache_dir.display());
    println!(
        "Dataset:         {} ({})",
        info.dataset_path.display(),
        if info.dataset_present { "present" } else { "missing" }
    );
    println!("Index file:      {}", info.index_path.display());
    match (&info.stored_index, &info.stored_index_error) {
        (Some(stored), _) => {
            println!("  entries:       {}", stored.entries);
            println!("  size:          {} bytes", stored.size_bytes);
            println!("  built at:      {}", stored.built_at);
            println!("  fingerprint:   {}", stored.fingerprint);
        }
        (None, Some(error)) => println!("  unusable:      {error}"),
        (None, None) => println!("  not built"),
    }
}
