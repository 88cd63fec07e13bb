//! POSTCODE SCRAPER
//! Two stages, run separately from the CLI:
//!  -  `init`: download the price-paid datasets and reduce their postcode column to one
//!     duplicate-free file.
//!  -  `query`: look every postcode up on the council tax search and store one CSV per postcode.

mod macros;
mod request;

pub mod config;
pub mod dedupe;
mod error;
pub mod fetch;
pub mod headers;
pub mod log;
pub mod parse;
pub mod process;
pub mod search;

pub use config::Config;
pub use error::{Error, Result};

const LOGS_DIR: &str = "logs";
const DATA_DIR: &str = "data";
const PROCESSED_DATA_DIR: &str = "processed_data";
const RESULTS_DIR: &str = "results";
const LOG_FILE: &str = "app.log";
const POSTCODES_FILE: &str = "single.csv";

const DOWNLOAD_LINKS: [&str; 9] = [
    "http://prod.publicdata.landregistry.gov.uk.s3-website-eu-west-1.amazonaws.com/pp-2020.csv",
    "http://prod.publicdata.landregistry.gov.uk.s3-website-eu-west-1.amazonaws.com/pp-2019.csv",
    "http://prod.publicdata.landregistry.gov.uk.s3-website-eu-west-1.amazonaws.com/pp-2018.csv",
    "http://prod.publicdata.landregistry.gov.uk.s3-website-eu-west-1.amazonaws.com/pp-2017-part2.csv",
    "http://prod.publicdata.landregistry.gov.uk.s3-website-eu-west-1.amazonaws.com/pp-2017-part1.csv",
    "http://prod.publicdata.landregistry.gov.uk.s3-website-eu-west-1.amazonaws.com/pp-2016-part2.csv",
    "http://prod.publicdata.landregistry.gov.uk.s3-website-eu-west-1.amazonaws.com/pp-2016-part1.csv",
    "http://prod.publicdata.landregistry.gov.uk.s3-website-eu-west-1.amazonaws.com/pp-2015-part2.csv",
    "http://prod.publicdata.landregistry.gov.uk.s3-website-eu-west-1.amazonaws.com/pp-2015-part1.csv",
];
const DOWNLOAD_REFERER: &str =
    "https://www.gov.uk/government/statistical-data-sets/price-paid-data-downloads";
/// Size of a single write while streaming a dataset to disk.
const DOWNLOAD_CHUNK_SIZE: usize = 1024 * 16;

const SEARCH_INIT_URL: &str = "http://cti.voa.gov.uk/cti/InitS.asp?lcn=0";
const NEXT_RESULTS_URL: &str = "http://cti.voa.gov.uk/cti/RefSResp.asp?lcn=0";
/// Digits in the `refresh` token appended to the initial search URL.
const CACHE_BUSTER_DIGITS: usize = 12;
const RESULTS_PAGE_SIZE: usize = 20;

/// How many postcodes are read from `single.csv` at a time.
const POSTCODE_CHUNK_SIZE: usize = 100;
const MIN_QUERY_DELAY_SECS: u64 = 5;
const MAX_QUERY_DELAY_SECS: u64 = 60;

/// 0-based index of the postcode column in the price-paid files.
pub const POSTCODE_COLUMN_INDEX: usize = 3;
pub const REQUIRED_COLUMN_COUNT: usize = 16;
