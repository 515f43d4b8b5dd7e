//! # Cache Module
//!
//! Everything the finder persists between runs.
//!
//! ## Key Components
//!
//! - [`fingerprint`] - Content hash identifying one version of the dataset
//! - [`storage`] - Loads and atomically stores the serialized name index
//! - [`lock`] - File lock serializing index rebuilds across processes
//! - [`downloader`] - Fetches UnicodeData.txt when it is not present locally

pub mod downloader;
pub mod fingerprint;
pub mod lock;
pub mod storage;

pub use downloader::DatasetDownloader;
pub use fingerprint::Fingerprint;
pub use lock::BuildLock;
pub use storage::{CacheLookup, IndexCache};
