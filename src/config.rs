use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use crate::{
    Result, DATA_DIR, DOWNLOAD_LINKS, DOWNLOAD_REFERER, LOGS_DIR, MAX_QUERY_DELAY_SECS,
    MIN_QUERY_DELAY_SECS, NEXT_RESULTS_URL, POSTCODES_FILE, PROCESSED_DATA_DIR, RESULTS_DIR,
    SEARCH_INIT_URL,
};

/// Where everything lives and which remote endpoints are used.
///
/// `Config::with_root` fills in the production values; every field is public so a caller
/// can point a stage at other directories or hosts.
#[derive(Debug, Clone)]
pub struct Config {
    pub logs_dir: PathBuf,
    /// Raw downloaded datasets.
    pub data_dir: PathBuf,
    /// Scratch directory holding the deduplicated postcode file.
    pub processed_dir: PathBuf,
    /// One CSV per queried postcode.
    pub results_dir: PathBuf,

    pub download_urls: Vec<String>,
    pub download_referer: String,
    pub search_init_url: String,
    pub next_results_url: String,

    /// Seconds to sleep after each queried postcode, drawn uniformly from this range.
    pub query_delay_secs: RangeInclusive<u64>,
}

impl Config {
    pub fn with_root(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            logs_dir: root.join(LOGS_DIR),
            data_dir: root.join(DATA_DIR),
            processed_dir: root.join(PROCESSED_DATA_DIR),
            results_dir: root.join(RESULTS_DIR),
            download_urls: DOWNLOAD_LINKS.iter().map(|s| s.to_string()).collect(),
            download_referer: DOWNLOAD_REFERER.into(),
            search_init_url: SEARCH_INIT_URL.into(),
            next_results_url: NEXT_RESULTS_URL.into(),
            query_delay_secs: MIN_QUERY_DELAY_SECS..=MAX_QUERY_DELAY_SECS,
        }
    }

    pub async fn ensure_dirs(&self) -> Result<()> {
        for dir in [
            &self.logs_dir,
            &self.data_dir,
            &self.processed_dir,
            &self.results_dir,
        ] {
            tokio::fs::create_dir_all(dir).await?;
        }
        Ok(())
    }

    /// The deduplicated postcode list produced by `init` and consumed by `query`.
    pub fn postcodes_file(&self) -> PathBuf {
        self.processed_dir.join(POSTCODES_FILE)
    }

    pub fn result_file(&self, postcode: &str) -> PathBuf {
        self.results_dir.join(result_file_name(postcode))
    }
}

/// `"AB1 2CD"` -> `"AB1_2CD.csv"`
pub fn result_file_name(postcode: &str) -> String {
    format!("{}.csv", postcode.replace(' ', "_"))
}
