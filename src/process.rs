use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use csv_async::{AsyncReaderBuilder, AsyncWriterBuilder};
use futures::StreamExt;
use rand::Rng;
use tokio::fs::{self, File};

use crate::dedupe::ColumnDeduplicator;
use crate::fetch::DatasetFetcher;
use crate::headers::{HeaderProvider, RandomHeaders};
use crate::log::Logger;
use crate::parse::ResultItem;
use crate::search::SearchClient;
use crate::{
    log_error, log_info, log_warn, Config, Error, Result, POSTCODE_CHUNK_SIZE,
    POSTCODE_COLUMN_INDEX, REQUIRED_COLUMN_COUNT,
};

/// Column order of every result file.
pub const RESULT_COLUMNS: [&str; 4] = [
    "Address",
    "Postcode",
    "Council Tax band",
    "Local authority reference number",
];

/// `init`: download the datasets, then dedupe their postcodes into one file.
/// Returns whether the postcode file was produced.
pub async fn initialize(config: &Config, log: Arc<dyn Logger>) -> bool {
    let headers: Arc<dyn HeaderProvider> = Arc::new(RandomHeaders);

    let mut fetcher = DatasetFetcher::new(config, headers, log.clone());
    let report = fetcher.fetch_all(&config.download_urls).await;
    if !report.success {
        log_error!(log, "All downloads failed");
        return false;
    }
    if !report.problem_urls.is_empty() {
        log_warn!(
            log,
            "The following urls were not downloaded: {}",
            report.problem_urls.join(", ")
        );
    }

    ColumnDeduplicator::new(config, log)
        .dedupe(POSTCODE_COLUMN_INDEX, REQUIRED_COLUMN_COUNT)
        .await
}

/// `query`: scrape every postcode that has no result file yet.
pub async fn query_postcodes(config: &Config, log: Arc<dyn Logger>) -> RunSummary {
    let search = SearchClient::new(config, Arc::new(RandomHeaders), log.clone());
    ScrapeOrchestrator::new(config.clone(), search, log)
        .run()
        .await
}

/// Counters for one orchestrator run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Postcodes looked up and written this run.
    pub queried: usize,
    /// Postcodes that already had a result file.
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Queried,
    Skipped,
}

/// Walks the deduplicated postcode file and stores the search results of each postcode.
///
/// A postcode's result file is its "done" marker, so a run can be interrupted and started
/// again without repeating work.
pub struct ScrapeOrchestrator {
    config: Config,
    search: SearchClient,
    log: Arc<dyn Logger>,
}

impl ScrapeOrchestrator {
    pub fn new(config: Config, search: SearchClient, log: Arc<dyn Logger>) -> Self {
        Self {
            config,
            search,
            log,
        }
    }

    pub async fn run(&mut self) -> RunSummary {
        let mut summary = RunSummary::default();
        let postcodes_file = self.config.postcodes_file();

        if let Err(e) = self.run_file(&postcodes_file, &mut summary).await {
            log_error!(self.log, "{e}. Exiting...");
        }
        log_info!(
            self.log,
            "Queried {} postcodes, skipped {}",
            summary.queried,
            summary.skipped
        );
        summary
    }

    async fn run_file(&mut self, postcodes_file: &Path, summary: &mut RunSummary) -> Result<()> {
        if !fs::try_exists(postcodes_file).await.unwrap_or(false) {
            return Err(Error::MissingPostcodes(postcodes_file.to_path_buf()));
        }
        fs::create_dir_all(&self.config.results_dir).await?;

        let file = File::open(postcodes_file).await?;
        let rdr = AsyncReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .create_reader(file);
        let chunks = rdr.into_records().chunks(POSTCODE_CHUNK_SIZE);
        futures::pin_mut!(chunks);

        while let Some(chunk) = chunks.next().await {
            for record in chunk {
                let postcode = match record {
                    Ok(record) => record.get(0).unwrap_or_default().trim().to_string(),
                    Err(e) => {
                        log_error!(self.log, "Unreadable postcode record: {e}");
                        continue;
                    }
                };
                if postcode.is_empty() {
                    log_warn!(self.log, "Empty postcode skipped");
                    continue;
                }

                match self.process_postcode(&postcode).await {
                    Outcome::Queried => {
                        summary.queried += 1;
                        self.pause().await;
                    }
                    Outcome::Skipped => summary.skipped += 1,
                }
            }
        }
        Ok(())
    }

    async fn process_postcode(&mut self, postcode: &str) -> Outcome {
        let result_file = self.config.result_file(postcode);
        if fs::try_exists(&result_file).await.unwrap_or(false) {
            log_warn!(
                self.log,
                "Skipping result file {}, already exists",
                result_file.display()
            );
            return Outcome::Skipped;
        }

        log_info!(self.log, "Scraping {postcode} postcode started");
        let items = self.search.query(postcode).await;

        if let Err(e) = write_results(&result_file, postcode, &items).await {
            log_error!(
                self.log,
                "Unable to write result file {}: {e}",
                result_file.display()
            );
            // A half written file would mark the postcode as done.
            if let Err(rm_err) = fs::remove_file(&result_file).await {
                log_warn!(
                    self.log,
                    "Unable to remove file {}, exception occurred: {rm_err}",
                    result_file.display()
                );
            }
        } else if items.is_empty() {
            log_info!(
                self.log,
                "Scraping {postcode} postcode completed, but it discovered no entries"
            );
        } else {
            log_info!(
                self.log,
                "Scraping {postcode} postcode completed, {} entries",
                items.len()
            );
        }
        Outcome::Queried
    }

    /// Random pause between postcodes so the search service isn't hammered.
    async fn pause(&self) {
        let secs = rand::thread_rng().gen_range(self.config.query_delay_secs.clone());
        if secs == 0 {
            return;
        }
        log_info!(self.log, "Sleeping {secs} seconds");
        tokio::time::sleep(Duration::from_secs(secs)).await;
    }
}

/// Writes the result file for `postcode`. The header is always written, so a postcode
/// without matches still gets its marker file.
pub async fn write_results(path: &Path, postcode: &str, items: &[ResultItem]) -> Result<()> {
    let file = File::create(path).await?;
    let mut wtr = AsyncWriterBuilder::new().create_writer(file);

    wtr.write_record(&RESULT_COLUMNS).await?;
    for item in items {
        wtr.write_record(&[
            item.address.as_str(),
            postcode,
            item.council_tax_band.as_str(),
            item.local_authority_reference_number.as_str(),
        ])
        .await?;
    }
    wtr.flush().await?;
    Ok(())
}
