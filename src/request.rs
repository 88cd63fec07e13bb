use reqwest::header::{HeaderMap, HeaderValue, REFERER};
use reqwest::{Client, Response, StatusCode};

use crate::{Error, Result};

/// Sends a GET and hands back the response for streaming, as long as the status is 200.
pub(crate) async fn get_ok(
    client: &Client,
    url: &str,
    headers: HeaderMap,
    referer: &str,
) -> Result<Response> {
    let res = client
        .get(url)
        .headers(with_referer(headers, referer))
        .send()
        .await?;
    ensure_ok(url, res)
}

/// POSTs a form-encoded body and returns the HTML of a 200 response.
pub(crate) async fn post_form_html(
    client: &Client,
    url: &str,
    headers: HeaderMap,
    referer: &str,
    form: &[(&str, String)],
) -> Result<String> {
    let res = client
        .post(url)
        .headers(with_referer(headers, referer))
        .form(form)
        .send()
        .await?;
    let html = ensure_ok(url, res)?.text().await?;
    Ok(html)
}

fn ensure_ok(url: &str, res: Response) -> Result<Response> {
    if res.status() != StatusCode::OK {
        return Err(Error::BadStatus {
            url: url.into(),
            status: res.status(),
        });
    }
    Ok(res)
}

fn with_referer(mut headers: HeaderMap, referer: &str) -> HeaderMap {
    if let Ok(value) = HeaderValue::from_str(referer) {
        headers.insert(REFERER, value);
    }
    headers
}
