use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use futures::StreamExt;
use reqwest::{Client, Response};
use tokio::fs::{self, File};
use tokio::io::{AsyncWriteExt, BufWriter};

use crate::headers::HeaderProvider;
use crate::log::Logger;
use crate::request::get_ok;
use crate::{
    info_time, log_error, log_info, log_warn, Config, Error, Result, DOWNLOAD_CHUNK_SIZE,
};

/// What a `fetch_all` run ended with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchReport {
    /// At least one URL was downloaded.
    pub success: bool,
    pub problem_urls: Vec<String>,
}

/// Downloads the source datasets into the data directory.
pub struct DatasetFetcher {
    client: Client,
    headers: Arc<dyn HeaderProvider>,
    log: Arc<dyn Logger>,
    data_dir: PathBuf,
    processed_dir: PathBuf,
    referer: String,
    had_errors: bool,
    problem_urls: Vec<String>,
}

impl DatasetFetcher {
    pub fn new(config: &Config, headers: Arc<dyn HeaderProvider>, log: Arc<dyn Logger>) -> Self {
        Self {
            client: Client::new(),
            headers,
            log,
            data_dir: config.data_dir.clone(),
            processed_dir: config.processed_dir.clone(),
            referer: config.download_referer.clone(),
            had_errors: false,
            problem_urls: Vec::new(),
        }
    }

    pub fn had_errors(&self) -> bool {
        self.had_errors
    }

    pub fn problem_urls(&self) -> &[String] {
        &self.problem_urls
    }

    /// Starts from empty data and scratch directories and downloads every URL once.
    /// A failed URL is recorded and skipped, the run only fails when nothing could be
    /// downloaded or there was nothing to download.
    pub async fn fetch_all(&mut self, urls: &[String]) -> FetchReport {
        self.had_errors = false;
        self.problem_urls.clear();

        clear_dir(&self.data_dir, &*self.log).await;
        clear_dir(&self.processed_dir, &*self.log).await;

        log_info!(self.log, "Fetching started");

        if urls.is_empty() {
            log_warn!(self.log, "no links to download");
            self.had_errors = true;
            return self.report(false);
        }

        let start_time = Local::now();
        for url in urls {
            log_info!(self.log, "downloading {url}...");
            if let Err(e) = self.fetch_one(url).await {
                log_error!(self.log, "Download of {url} failed: {e}");
                self.problem_urls.push(url.clone());
                self.had_errors = true;
            }
        }
        info_time!(self.log, start_time, "Fetching data completed.");

        let success = !self.had_errors || self.problem_urls.len() < urls.len();
        self.report(success)
    }

    async fn fetch_one(&self, url: &str) -> Result<()> {
        let name = file_name(url).ok_or_else(|| Error::NoFileName(url.into()))?;
        let target = self.data_dir.join(name);

        let res = get_ok(&self.client, url, self.headers.headers(), &self.referer).await?;

        log_info!(self.log, "saving {url}...");
        if let Err(e) = save_body(res, &target).await {
            // Whatever made it to disk is incomplete.
            if let Err(rm_err) = fs::remove_file(&target).await {
                log_warn!(
                    self.log,
                    "Unable to remove file {}, exception occurred: {rm_err}",
                    target.display()
                );
            }
            return Err(e);
        }
        log_info!(self.log, "saved {}", target.display());
        Ok(())
    }

    fn report(&self, success: bool) -> FetchReport {
        FetchReport {
            success,
            problem_urls: self.problem_urls.clone(),
        }
    }
}

/// Streams the response body to `target`, `DOWNLOAD_CHUNK_SIZE` bytes per disk write.
async fn save_body(res: Response, target: &Path) -> Result<()> {
    let file = File::create(target).await?;
    let mut writer = BufWriter::with_capacity(DOWNLOAD_CHUNK_SIZE, file);

    let body = res.bytes_stream();
    futures::pin_mut!(body);
    while let Some(chunk) = body.next().await {
        writer.write_all(&chunk?).await?;
    }
    writer.flush().await?;
    Ok(())
}

/// Last path segment of `url`, `None` when there isn't one.
pub fn file_name(url: &str) -> Option<&str> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/').next().filter(|name| !name.is_empty())
}

/// Removes every file in `dir`, creating `dir` if needed. Failures are only logged.
async fn clear_dir(dir: &Path, log: &dyn Logger) {
    if let Err(e) = fs::create_dir_all(dir).await {
        log_warn!(log, "Unable to create directory {}: {e}", dir.display());
        return;
    }
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            log_warn!(log, "Unable to list directory {}: {e}", dir.display());
            return;
        }
    };
    loop {
        match entries.next_entry().await {
            Ok(Some(entry)) => {
                let path = entry.path();
                if let Err(e) = fs::remove_file(&path).await {
                    log_warn!(
                        log,
                        "Unable to remove file {}, exception occurred: {e}",
                        path.display()
                    );
                }
            }
            Ok(None) => break,
            Err(e) => {
                log_warn!(log, "Unable to list directory {}: {e}", dir.display());
                break;
            }
        }
    }
}
