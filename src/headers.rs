use rand::seq::SliceRandom;
use rand::Rng;
use reqwest::header::{
    HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONNECTION, DNT, UPGRADE_INSECURE_REQUESTS,
    USER_AGENT,
};

/// Supplies the headers for one outgoing request. Callers set `Referer` themselves.
pub trait HeaderProvider: Send + Sync {
    fn headers(&self) -> HeaderMap;
}

const USER_AGENTS: [&str; 6] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15",
];

const ACCEPT_LANGUAGES: [&str; 4] = [
    "en-GB,en;q=0.9",
    "en-GB,en-US;q=0.9,en;q=0.8",
    "en-US,en;q=0.9",
    "en-GB;q=0.8,en;q=0.7",
];

const ACCEPT_HTML: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";

/// A plausible desktop browser, picked at random on every call.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomHeaders;

impl HeaderProvider for RandomHeaders {
    fn headers(&self) -> HeaderMap {
        let mut rng = rand::thread_rng();
        let mut headers = HeaderMap::new();

        if let Some(ua) = USER_AGENTS.choose(&mut rng) {
            headers.insert(USER_AGENT, HeaderValue::from_static(*ua));
        }
        if let Some(lang) = ACCEPT_LANGUAGES.choose(&mut rng) {
            headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(*lang));
        }
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));
        headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
        headers.insert(UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));
        if rng.gen_bool(0.5) {
            headers.insert(DNT, HeaderValue::from_static("1"));
        }
        headers
    }
}
