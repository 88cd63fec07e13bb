use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use csv_async::{AsyncReaderBuilder, AsyncWriterBuilder, ByteRecord};
use futures::stream::{self, StreamExt};
use tokio::fs::{self, File};

use crate::log::Logger;
use crate::{info_time, log_error, log_info, log_warn, Config, Error, Result};

/// Distinct values of one column.
pub type UniqueSeries = BTreeSet<String>;

/// At most two pending series. Pushing the second one collapses both into their union, so
/// memory stays bounded by two files' worth of distinct values plus the running total.
#[derive(Debug, Default)]
pub struct PendingSeries {
    slots: Vec<UniqueSeries>,
}

impl PendingSeries {
    pub fn push(&mut self, series: UniqueSeries) {
        self.slots.push(series);
        if self.slots.len() == 2 {
            let merged = self
                .slots
                .drain(..)
                .reduce(merge_unique)
                .unwrap_or_default();
            self.slots.push(merged);
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// The merged result, `None` if nothing was ever pushed.
    pub fn finish(mut self) -> Option<UniqueSeries> {
        self.slots.pop()
    }
}

/// Union of two series, extending the bigger one with the smaller.
pub fn merge_unique(a: UniqueSeries, b: UniqueSeries) -> UniqueSeries {
    let (mut big, small) = if a.len() >= b.len() { (a, b) } else { (b, a) };
    big.extend(small);
    big
}

/// Folds any number of per-file series into one, two at a time.
pub fn fold_unique<I>(series: I) -> Option<UniqueSeries>
where
    I: IntoIterator<Item = UniqueSeries>,
{
    series
        .into_iter()
        .fold(PendingSeries::default(), |mut pending, s| {
            pending.push(s);
            pending
        })
        .finish()
}

/// Reduces one column of every downloaded CSV to a single duplicate-free file.
pub struct ColumnDeduplicator {
    data_dir: PathBuf,
    output_file: PathBuf,
    log: Arc<dyn Logger>,
}

impl ColumnDeduplicator {
    pub fn new(config: &Config, log: Arc<dyn Logger>) -> Self {
        Self {
            data_dir: config.data_dir.clone(),
            output_file: config.postcodes_file(),
            log,
        }
    }

    /// Returns whether an output file was written.
    pub async fn dedupe(&self, column_index: usize, required_column_count: usize) -> bool {
        log_info!(self.log, "Preparing data started...");
        let start_time = Local::now();

        let files = match self.list_data_files().await {
            Ok(files) => files,
            Err(e) => {
                log_error!(
                    self.log,
                    "Unable to list {}: {e}",
                    self.data_dir.display()
                );
                Vec::new()
            }
        };

        let pending = stream::iter(files)
            .filter_map(|path| self.load_series(path, column_index, required_column_count))
            .fold(PendingSeries::default(), |mut pending, series| async move {
                pending.push(series);
                pending
            })
            .await;

        let written = match pending.finish() {
            Some(series) => match write_series(&self.output_file, &series).await {
                Ok(()) => {
                    log_info!(
                        self.log,
                        "Wrote {} unique values to {}",
                        series.len(),
                        self.output_file.display()
                    );
                    true
                }
                Err(e) => {
                    log_error!(
                        self.log,
                        "Prepare data: could not write {}: {e}",
                        self.output_file.display()
                    );
                    false
                }
            },
            None => {
                log_error!(self.log, "Prepare data: could not generate the result CSV file");
                false
            }
        };

        info_time!(self.log, start_time, "Preparing data completed.");
        written
    }

    /// CSV files in the data directory, by name. Anything else is reported and left out.
    async fn list_data_files(&self) -> std::io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let mut entries = fs::read_dir(&self.data_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "csv") {
                files.push(path);
            } else {
                log_warn!(
                    self.log,
                    "non-CSV file found in data dir: {}",
                    path.display()
                );
            }
        }
        files.sort();
        Ok(files)
    }

    async fn load_series(
        &self,
        path: PathBuf,
        column_index: usize,
        required_column_count: usize,
    ) -> Option<UniqueSeries> {
        log_info!(self.log, "Processing {}", path.display());
        match unique_column(&path, column_index, required_column_count).await {
            Ok(series) => {
                log_info!(
                    self.log,
                    "Processing {} done, {} unique values",
                    path.display(),
                    series.len()
                );
                Some(series)
            }
            Err(e) => {
                log_error!(self.log, "File {} skipped: {e}", path.display());
                None
            }
        }
    }
}

/// Distinct, non-empty values of `column_index` in a headerless CSV.
///
/// Values are trimmed of surrounding whitespace before they are compared and stored, so
/// `" AB1 2CD"` and `"AB1 2CD"` count as one postcode and come out as `"AB1 2CD"`.
///
/// The first record decides the column count; a file that doesn't have exactly
/// `required_column_count` columns, or changes width later on, is rejected as a whole.
pub async fn unique_column(
    path: &Path,
    column_index: usize,
    required_column_count: usize,
) -> Result<UniqueSeries> {
    let file = File::open(path).await?;
    let mut rdr = AsyncReaderBuilder::new()
        .has_headers(false)
        .flexible(false)
        .buffer_capacity(1 << 20)
        .create_reader(file);

    let mut series = UniqueSeries::new();
    let mut record = ByteRecord::new();
    let mut checked = false;
    while rdr.read_byte_record(&mut record).await? {
        if !checked {
            if record.len() != required_column_count {
                return Err(Error::ColumnCount {
                    required: required_column_count,
                    found: record.len(),
                });
            }
            checked = true;
        }
        if let Some(value) = record.get(column_index) {
            let value = String::from_utf8_lossy(value);
            let value = value.trim();
            if !value.is_empty() && !series.contains(value) {
                series.insert(value.to_string());
            }
        }
    }

    if !checked {
        return Err(Error::ColumnCount {
            required: required_column_count,
            found: 0,
        });
    }
    Ok(series)
}

/// Writes one value per line, no header.
async fn write_series(path: &Path, series: &UniqueSeries) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let file = File::create(path).await?;
    let mut wtr = AsyncWriterBuilder::new()
        .has_headers(false)
        .create_writer(file);
    for value in series {
        wtr.write_record(&[value.as_str()]).await?;
    }
    wtr.flush().await?;
    Ok(())
}
