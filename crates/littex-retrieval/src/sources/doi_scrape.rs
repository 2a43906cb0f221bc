//! Generic DOI resolution and landing-page scraping.
//!
//! Resolves https://doi.org/{doi} through its redirect chain and mines the
//! resulting publisher page for a PDF link, in a fixed order:
//! 1. the resolved URL itself, when it already ends in `.pdf`
//! 2. the `citation_pdf_url` meta tag (Highwire citation metadata)
//! 3. anchors whose href ends in `.pdf`
//! 4. publisher-specific href patterns ("article-pdf", a `/pdf/` path
//!    segment)
//!
//! Relative and protocol-relative hrefs resolve against the landing page.

use lazy_static::lazy_static;
use littex_common::PoliteClient;
use regex::Regex;
use scraper::{Html, Selector};
use tracing::{debug, instrument};
use url::Url;

use super::{Candidate, Discovery, SourceError, SourceResult};
use crate::models::FailureReason;

pub const DEFAULT_DOI_BASE: &str = "https://doi.org";

lazy_static! {
    // hrefs with a /pdf/ path segment, e.g. /doi/pdf/10.1000/x or
    // /content/pdf/paper.pdf
    static ref PDF_SEGMENT_RE: Regex = Regex::new(r"(?i)/pdf(/|$)").expect("pdf segment regex");
}

pub struct DoiScrapeClient {
    client: PoliteClient,
    doi_base: String,
}

impl DoiScrapeClient {
    pub fn new(client: PoliteClient) -> Self {
        Self { client, doi_base: DEFAULT_DOI_BASE.to_string() }
    }

    pub fn with_base_url(mut self, base: &str) -> Self {
        self.doi_base = base.trim_end_matches('/').to_string();
        self
    }

    #[instrument(skip(self))]
    pub async fn discover(&self, doi: &str) -> SourceResult {
        let resolve_url = format!("{}/{}", self.doi_base, doi);
        let resp = self
            .client
            .get(&resolve_url)
            .send()
            .await
            .map_err(|e| SourceError::transport(&e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SourceError::status(status));
        }

        let landing_url = resp.url().clone();

        // The resolver sometimes lands straight on the file.
        if landing_url.path().to_ascii_lowercase().ends_with(".pdf") {
            debug!(url = %landing_url, "DOI resolved directly to a PDF");
            return Ok(Discovery::Found(Candidate::new(landing_url.as_str())));
        }

        let html = resp
            .text()
            .await
            .map_err(|e| SourceError::new(FailureReason::NetworkError, e.to_string()))?;

        match scrape_pdf_link(&html, &landing_url) {
            Some(pdf_url) => Ok(Discovery::Found(Candidate::with_landing(
                pdf_url,
                landing_url.to_string(),
            ))),
            None => Ok(Discovery::NotFound),
        }
    }
}

/// Mine a landing page for a PDF link. Also used for PubMed record pages
/// in the PMID flow.
pub fn scrape_pdf_link(html: &str, base_url: &Url) -> Option<String> {
    let document = Html::parse_document(html);
    let meta_selector =
        Selector::parse(r#"meta[name="citation_pdf_url"]"#).expect("meta selector");
    let anchor_selector = Selector::parse("a[href]").expect("anchor selector");

    // 1. citation_pdf_url meta tag
    if let Some(content) = document
        .select(&meta_selector)
        .filter_map(|el| el.value().attr("content"))
        .map(str::trim)
        .find(|c| !c.is_empty())
    {
        return absolutize(content, base_url);
    }

    let hrefs: Vec<&str> = document
        .select(&anchor_selector)
        .filter_map(|el| el.value().attr("href"))
        .collect();

    // 2. anchors ending in .pdf (ignoring any query string)
    for href in &hrefs {
        if href_path(href).to_ascii_lowercase().ends_with(".pdf") {
            return absolutize(href, base_url);
        }
    }

    // 3. publisher-specific patterns
    for href in &hrefs {
        let path = href_path(href);
        if path.to_ascii_lowercase().contains("article-pdf") || PDF_SEGMENT_RE.is_match(path) {
            return absolutize(href, base_url);
        }
    }

    None
}

/// href without its query string or fragment.
fn href_path(href: &str) -> &str {
    let end = href.find(['?', '#']).unwrap_or(href.len());
    &href[..end]
}

/// Resolve a possibly relative or protocol-relative href against the page
/// it appeared on.
fn absolutize(href: &str, base_url: &Url) -> Option<String> {
    base_url.join(href.trim()).ok().map(|u| u.to_string())
}
