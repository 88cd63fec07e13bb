use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::{Error, Result};

/// One property returned by the council tax search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultItem {
    pub address: String,
    pub council_tax_band: String,
    pub local_authority_reference_number: String,
}

/// A single parsed results page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultSummary {
    pub items: Vec<ResultItem>,
    /// Only filled in when the page count was asked for (first page).
    pub pages_count: Option<usize>,
    /// Things that were skipped or guessed while parsing.
    pub notes: Vec<ParseNote>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseNote {
    /// Row `row` (0-based) had `found` cells instead of 4.
    MalformedRow { row: usize, found: usize },
    /// The first cell of row `row` had no address link.
    MissingAddress { row: usize },
    /// There was a page list but its text didn't look like "Page n of m", one page assumed.
    UnrecognisedPageList(String),
}

impl fmt::Display for ParseNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseNote::MalformedRow { row, found } => write!(
                f,
                "Incorrect result table structure in row {row}, should contain {RESULT_CELLS} columns, but {found} found"
            ),
            ParseNote::MissingAddress { row } => write!(
                f,
                "Incorrect result table structure in row {row}, no 'address' element found"
            ),
            ParseNote::UnrecognisedPageList(text) => write!(
                f,
                "Unrecognised page list text {text:?}, assuming a single page of results"
            ),
        }
    }
}

const RESULT_CELLS: usize = 4;

fn pages_info_rx() -> &'static Regex {
    static RX: OnceLock<Regex> = OnceLock::new();
    // The HTML parser turns the site's CRLF runs into plain whitespace, so only the words are fixed.
    RX.get_or_init(|| Regex::new(r"^\s*Page\s+(\d+)\s+of\s+(\d+)").expect("valid pages regex"))
}

/// Parses a search response page.
///
/// Fails only when the page isn't a results page at all (no `Content` container or no
/// "Search results" table). Broken rows are skipped and reported in `notes`.
/// With `scrape_pages_count` the total number of pages is read from the page list,
/// defaulting to 1 when there is none.
pub fn parse_summary(html: &str, scrape_pages_count: bool) -> Result<ResultSummary> {
    let doc = Html::parse_document(html);

    let content_selector = create_selector(r#"div[id="Content"]"#)?;
    let table_selector = create_selector(r#"table[title="Search results"]"#)?;
    let row_selector = create_selector("tbody > tr")?;
    let cell_selector = create_selector("td")?;
    let link_selector = create_selector("a")?;

    let content = doc
        .select(&content_selector)
        .next()
        .ok_or(Error::ParseMissingElement("Content"))?;

    let mut notes = Vec::new();
    let pages_count = if scrape_pages_count {
        Some(pages_count(content, &mut notes)?)
    } else {
        None
    };

    let table = content
        .select(&table_selector)
        .next()
        .ok_or(Error::ParseMissingElement("Search results"))?;

    let mut items = Vec::new();
    for (row, tr) in table.select(&row_selector).enumerate() {
        let cells = tr.select(&cell_selector).collect::<Vec<_>>();
        // Header rows are all <th>.
        if cells.is_empty() {
            continue;
        }
        if cells.len() != RESULT_CELLS {
            notes.push(ParseNote::MalformedRow {
                row,
                found: cells.len(),
            });
            continue;
        }

        let Some(address) = cells[0].select(&link_selector).next() else {
            notes.push(ParseNote::MissingAddress { row });
            continue;
        };

        items.push(ResultItem {
            address: element_text(address),
            council_tax_band: element_text(cells[1]),
            local_authority_reference_number: element_text(cells[3]),
        });
    }

    Ok(ResultSummary {
        items,
        pages_count,
        notes,
    })
}

fn pages_count(content: ElementRef, notes: &mut Vec<ParseNote>) -> Result<usize> {
    let pagelist_selector = create_selector("div.pagelist")?;
    let info_selector = create_selector("p:not([class])")?;

    let Some(info) = content
        .select(&pagelist_selector)
        .next()
        .and_then(|pagelist| pagelist.select(&info_selector).next())
    else {
        return Ok(1);
    };

    let text = info.text().collect::<String>();
    let count = pages_info_rx()
        .captures(&text)
        .and_then(|caps| caps.get(2))
        .and_then(|m| m.as_str().parse::<usize>().ok());

    match count {
        Some(n) => Ok(n.max(1)),
        None => {
            notes.push(ParseNote::UnrecognisedPageList(text.trim().to_string()));
            Ok(1)
        }
    }
}

#[inline]
fn create_selector(sel_str: &str) -> Result<Selector> {
    Selector::parse(sel_str).map_err(|_| Error::ParseMissingSelector(sel_str.into()))
}

#[inline]
fn element_text(el: ElementRef) -> String {
    el.text().collect::<String>().trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROW_A: &str = r#"<tr><td><a href="/a">1, HIGH STREET, TOWN</a></td><td>C</td><td>Yes</td><td>0001</td></tr>"#;
    const ROW_B: &str = r#"<tr><td><a href="/b">2, HIGH STREET, TOWN</a></td><td>D</td><td>No</td><td>0002</td></tr>"#;

    fn page(pagelist: &str, rows: &str) -> String {
        format!(
            r#"<html><body><div id="Content">{pagelist}
            <table title="Search results">
              <thead><tr><th>Address</th><th>Band</th><th>Improvement</th><th>Ref</th></tr></thead>
              <tbody>{rows}</tbody>
            </table></div></body></html>"#
        )
    }

    #[test]
    fn parses_rows_and_page_count() {
        let pagelist = "<div class=\"pagelist\"><p class=\"nav\">Next</p><p>\r\n        Page 1 \r\n        of \r\n        3\r\n</p></div>";
        let summary = parse_summary(&page(pagelist, &format!("{ROW_A}{ROW_B}")), true).unwrap();

        assert_eq!(summary.pages_count, Some(3));
        assert!(summary.notes.is_empty());
        assert_eq!(
            summary.items,
            vec![
                ResultItem {
                    address: "1, HIGH STREET, TOWN".into(),
                    council_tax_band: "C".into(),
                    local_authority_reference_number: "0001".into(),
                },
                ResultItem {
                    address: "2, HIGH STREET, TOWN".into(),
                    council_tax_band: "D".into(),
                    local_authority_reference_number: "0002".into(),
                },
            ]
        );
    }

    #[test]
    fn skips_rows_with_wrong_cell_count() {
        let short = "<tr><td><a>3, HIGH STREET</a></td><td>E</td><td>0003</td></tr>";
        let summary = parse_summary(&page("", &format!("{ROW_A}{short}{ROW_B}")), false).unwrap();

        assert_eq!(summary.items.len(), 2);
        assert_eq!(summary.items[1].local_authority_reference_number, "0002");
        assert_eq!(
            summary.notes,
            vec![ParseNote::MalformedRow { row: 1, found: 3 }]
        );
    }

    #[test]
    fn skips_rows_without_address_link() {
        let no_link = "<tr><td>3, HIGH STREET</td><td>E</td><td>No</td><td>0003</td></tr>";
        let summary = parse_summary(&page("", &format!("{no_link}{ROW_B}")), false).unwrap();

        assert_eq!(summary.items.len(), 1);
        assert_eq!(summary.notes, vec![ParseNote::MissingAddress { row: 0 }]);
    }

    #[test]
    fn page_count_only_on_request() {
        let summary = parse_summary(&page("", ROW_A), false).unwrap();
        assert_eq!(summary.pages_count, None);
    }

    #[test]
    fn missing_pagelist_means_single_page() {
        let summary = parse_summary(&page("", ROW_A), true).unwrap();
        assert_eq!(summary.pages_count, Some(1));
        assert!(summary.notes.is_empty());
    }

    #[test]
    fn unrecognised_pagelist_is_reported() {
        let pagelist = r#"<div class="pagelist"><p>Seite 1 von 4</p></div>"#;
        let summary = parse_summary(&page(pagelist, ROW_A), true).unwrap();

        assert_eq!(summary.pages_count, Some(1));
        assert_eq!(
            summary.notes,
            vec![ParseNote::UnrecognisedPageList("Seite 1 von 4".into())]
        );
    }

    #[test]
    fn missing_content_is_an_error() {
        let html = r#"<html><body><div id="Other"><table title="Search results"></table></div></body></html>"#;
        let err = parse_summary(html, true).unwrap_err();
        assert!(matches!(err, Error::ParseMissingElement("Content")));
    }

    #[test]
    fn missing_results_table_is_an_error() {
        let html = r#"<html><body><div id="Content"><p>No properties found</p></div></body></html>"#;
        let err = parse_summary(html, false).unwrap_err();
        assert!(matches!(err, Error::ParseMissingElement("Search results")));
    }

    #[test]
    fn empty_results_table_yields_no_items() {
        let summary = parse_summary(&page("", ""), true).unwrap();
        assert!(summary.items.is_empty());
        assert_eq!(summary.pages_count, Some(1));
    }
}
