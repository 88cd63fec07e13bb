use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("The selector you are trying to scrape for is invalid. Selector: {0}")]
    ParseMissingSelector(String),
    #[error("Invalid response HTML format, '{0}' element not found")]
    ParseMissingElement(&'static str),

    #[error("Bad response code {status} from {url}")]
    BadStatus {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("Can't derive a file name from url: {0}")]
    NoFileName(String),
    #[error("insufficient amount of columns: required {required}, found {found}")]
    ColumnCount { required: usize, found: usize },
    #[error("Postcodes file {0} not found")]
    MissingPostcodes(PathBuf),

    #[error("Io Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Csv Error: {0}")]
    Csv(#[from] csv_async::Error),

    #[error("Tokio Join Error, couldn't await a task! {0}")]
    RuntimeJoin(#[from] tokio::task::JoinError),

    #[error("Reqwest Error: {0}")]
    Reqwest(#[from] reqwest::Error),
}
