use std::sync::Arc;

use rand::Rng;
use reqwest::Client;
use tokio::task::spawn_blocking;

use crate::headers::HeaderProvider;
use crate::log::Logger;
use crate::parse::{parse_summary, ResultItem, ResultSummary};
use crate::request::post_form_html;
use crate::{log_error, log_info, log_warn, Config, Result, CACHE_BUSTER_DIGITS, RESULTS_PAGE_SIZE};

/// Which of the two search endpoints a page is requested from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// First page, starts a new search.
    InitSearch,
    /// Every following page.
    NextResults,
}

/// Looks postcodes up on the council tax search, following its pagination.
pub struct SearchClient {
    client: Client,
    headers: Arc<dyn HeaderProvider>,
    log: Arc<dyn Logger>,
    init_url: String,
    next_url: String,
    had_errors: bool,
}

impl SearchClient {
    pub fn new(config: &Config, headers: Arc<dyn HeaderProvider>, log: Arc<dyn Logger>) -> Self {
        Self {
            client: Client::new(),
            headers,
            log,
            init_url: config.search_init_url.clone(),
            next_url: config.next_results_url.clone(),
            had_errors: false,
        }
    }

    /// Set once any page request failed at the HTTP level.
    pub fn had_errors(&self) -> bool {
        self.had_errors
    }

    /// All results for `postcode`, in page order. Pages that fail to load or parse
    /// simply contribute nothing.
    pub async fn query(&mut self, postcode: &str) -> Vec<ResultItem> {
        let Some(first) = self.query_page(postcode, 1).await else {
            return Vec::new();
        };

        let mut items = first.items;
        let pages_count = first.pages_count.unwrap_or(1);
        // Scrape additional pages if there's more than 1 page in results.
        for page in 2..=pages_count {
            if let Some(summary) = self.query_page(postcode, page).await {
                items.extend(summary.items);
            }
        }
        items
    }

    async fn query_page(&mut self, postcode: &str, page: usize) -> Option<ResultSummary> {
        let (endpoint, form) = page_request(postcode, page);
        let url = match endpoint {
            Endpoint::InitSearch => {
                format!("{}&refresh={}", self.init_url, cache_buster(CACHE_BUSTER_DIGITS))
            }
            Endpoint::NextResults => self.next_url.clone(),
        };

        let html = match post_form_html(
            &self.client,
            &url,
            self.headers.headers(),
            &self.init_url,
            &form,
        )
        .await
        {
            Ok(html) => html,
            Err(e) => {
                log_error!(self.log, "Request error: {e}");
                self.had_errors = true;
                return None;
            }
        };

        match parse_page(html, page == 1).await {
            Ok(summary) => {
                for note in &summary.notes {
                    log_warn!(self.log, "{postcode} page {page}: {note}");
                }
                log_info!(
                    self.log,
                    "{postcode} page {page}: {} entries",
                    summary.items.len()
                );
                Some(summary)
            }
            Err(e) => {
                log_error!(self.log, "{postcode} page {page}: {e}");
                None
            }
        }
    }
}

/// Parsing is CPU bound, so it runs on the blocking pool.
async fn parse_page(html: String, scrape_pages_count: bool) -> Result<ResultSummary> {
    spawn_blocking(move || parse_summary(&html, scrape_pages_count)).await?
}

/// Endpoint and form fields for one page of results (pages are 1-based).
pub fn page_request(postcode: &str, page: usize) -> (Endpoint, Vec<(&'static str, String)>) {
    if page <= 1 {
        let form = vec![
            ("btnPush", "1".to_string()),
            ("txtRedirectTo", "InitS.asp".to_string()),
            ("txtStartKey", "0".to_string()),
            ("txtPageNum", "0".to_string()),
            ("txtPageSize", String::new()),
            ("intNumFound", String::new()),
            ("txtPostCode", postcode.to_string()),
        ];
        return (Endpoint::InitSearch, form);
    }

    let form = vec![
        ("lstPageSize", RESULTS_PAGE_SIZE.to_string()),
        ("txtRefSPostCode", postcode.to_string()),
        ("txtStartKey", ((page - 1) * RESULTS_PAGE_SIZE).to_string()),
        ("txtPageNum", page.to_string()),
        ("txtPageSize", RESULTS_PAGE_SIZE.to_string()),
        ("txtPostCode", postcode.to_string()),
    ];
    (Endpoint::NextResults, form)
}

/// Random digits that keep the first search request from being served out of a cache.
pub fn cache_buster(ndigits: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..ndigits)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field<'a>(form: &'a [(&'static str, String)], name: &str) -> Option<&'a str> {
        form.iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn first_page_starts_a_search() {
        let (endpoint, form) = page_request("AB1 2CD", 1);
        assert_eq!(endpoint, Endpoint::InitSearch);
        assert_eq!(field(&form, "txtPostCode"), Some("AB1 2CD"));
        assert_eq!(field(&form, "txtStartKey"), Some("0"));
        assert_eq!(field(&form, "txtPageNum"), Some("0"));
        assert_eq!(field(&form, "txtPageSize"), Some(""));
        assert_eq!(field(&form, "btnPush"), Some("1"));
    }

    #[test]
    fn later_pages_use_offsets_of_twenty() {
        let (endpoint, form) = page_request("AB1 2CD", 3);
        assert_eq!(endpoint, Endpoint::NextResults);
        assert_eq!(field(&form, "txtStartKey"), Some("40"));
        assert_eq!(field(&form, "txtPageNum"), Some("3"));
        assert_eq!(field(&form, "lstPageSize"), Some("20"));
        assert_eq!(field(&form, "txtRefSPostCode"), Some("AB1 2CD"));
    }

    #[test]
    fn cache_buster_is_all_digits() {
        let token = cache_buster(12);
        assert_eq!(token.len(), 12);
        assert!(token.chars().all(|c| c.is_ascii_digit()));
    }
}
