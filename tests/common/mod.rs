#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Path as UrlPath, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use postcode_scrap::Config;

/// Requests seen by the stand-in server.
#[derive(Debug, Default)]
pub struct Hits {
    pub downloads: AtomicUsize,
    pub init_search: AtomicUsize,
    pub next_results: AtomicUsize,
    /// `(postcode, page)` of every search request, in order.
    pub searches: Mutex<Vec<(String, usize)>>,
}

impl Hits {
    pub fn searches(&self) -> Vec<(String, usize)> {
        self.searches.lock().unwrap().clone()
    }

    pub fn total_searches(&self) -> usize {
        self.init_search.load(Ordering::SeqCst) + self.next_results.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Default)]
struct AppState {
    datasets: Arc<HashMap<String, String>>,
    pages: Arc<HashMap<(String, usize), String>>,
    hits: Arc<Hits>,
}

/// Local stand-in for the dataset host and the council tax search.
pub struct TestServer {
    pub base: String,
    pub hits: Arc<Hits>,
}

impl TestServer {
    /// `datasets` maps file names to CSV bodies (anything else is a 404),
    /// `pages` maps `(postcode, page)` to result HTML (anything else is a 500).
    pub async fn spawn(
        datasets: HashMap<String, String>,
        pages: HashMap<(String, usize), String>,
    ) -> anyhow::Result<Self> {
        let state = AppState {
            datasets: Arc::new(datasets),
            pages: Arc::new(pages),
            hits: Arc::new(Hits::default()),
        };
        let hits = state.hits.clone();

        let app = Router::new()
            .route("/data/:name", get(dataset))
            .route("/cti/InitS.asp", post(init_search))
            .route("/cti/RefSResp.asp", post(next_results))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self {
            base: format!("http://{addr}"),
            hits,
        })
    }

    pub fn dataset_url(&self, name: &str) -> String {
        format!("{}/data/{name}", self.base)
    }

    /// Production config rooted at `root`, talking to this server and never sleeping.
    pub fn config(&self, root: &Path) -> Config {
        let mut config = Config::with_root(root);
        config.download_urls = Vec::new();
        config.search_init_url = format!("{}/cti/InitS.asp?lcn=0", self.base);
        config.next_results_url = format!("{}/cti/RefSResp.asp?lcn=0", self.base);
        config.query_delay_secs = 0..=0;
        config
    }
}

async fn dataset(State(state): State<AppState>, UrlPath(name): UrlPath<String>) -> Response {
    state.hits.downloads.fetch_add(1, Ordering::SeqCst);
    match state.datasets.get(&name) {
        Some(body) => (StatusCode::OK, body.clone()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn init_search(
    State(state): State<AppState>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    state.hits.init_search.fetch_add(1, Ordering::SeqCst);
    search_page(&state, &form, 1)
}

async fn next_results(
    State(state): State<AppState>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    state.hits.next_results.fetch_add(1, Ordering::SeqCst);
    let page = form
        .get("txtPageNum")
        .and_then(|p| p.parse().ok())
        .unwrap_or(0);
    search_page(&state, &form, page)
}

fn search_page(state: &AppState, form: &HashMap<String, String>, page: usize) -> Response {
    let postcode = form.get("txtPostCode").cloned().unwrap_or_default();
    state
        .hits
        .searches
        .lock()
        .unwrap()
        .push((postcode.clone(), page));

    match state.pages.get(&(postcode, page)) {
        Some(html) => (StatusCode::OK, html.clone()).into_response(),
        None => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

/// A results page in the shape the council tax search returns. `pages` adds the page list.
pub fn results_page(rows: &[(&str, &str, &str)], pages: Option<(usize, usize)>) -> String {
    let pagelist = pages
        .map(|(n, m)| {
            format!(
                "<div class=\"pagelist\"><p class=\"links\"><a href=\"#\">Next</a></p>\
                 <p>\r\n        Page {n} \r\n        of \r\n        {m}\r\n</p></div>"
            )
        })
        .unwrap_or_default();
    let rows = rows
        .iter()
        .map(|(address, band, reference)| {
            format!(
                "<tr><td><a href=\"/cti/Details.asp\">{address}</a></td><td>{band}</td>\
                 <td>No</td><td>{reference}</td></tr>"
            )
        })
        .collect::<String>();

    format!(
        "<html><body><div id=\"Content\"><h1>Search results</h1>{pagelist}\
         <table title=\"Search results\"><thead><tr><th>Address</th><th>Band</th>\
         <th>Improvement indicator</th><th>Local authority reference number</th></tr></thead>\
         <tbody>{rows}</tbody></table></div></body></html>"
    )
}

/// A headerless 16-column price-paid style CSV with the given postcodes in column 3.
pub fn price_paid_csv(postcodes: &[&str]) -> String {
    price_paid_csv_with_width(postcodes, 16)
}

pub fn price_paid_csv_with_width(postcodes: &[&str], width: usize) -> String {
    postcodes
        .iter()
        .enumerate()
        .map(|(i, postcode)| {
            let mut fields = (0..width)
                .map(|col| format!("\"f{i}-{col}\""))
                .collect::<Vec<_>>();
            fields[3] = format!("\"{postcode}\"");
            fields.join(",") + "\n"
        })
        .collect()
}
