//! Unpaywall open-access lookup.
//!
//! Endpoint: https://api.unpaywall.org/v2/{doi}?email={email}
//! The email parameter is required by the API's terms of use.
//!
//! This is the highest-priority strategy and the only one that retries:
//! Unpaywall is a lookup index, so a transient failure here would otherwise
//! silently push an open-access record down into the scraping strategies.

use littex_common::PoliteClient;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use super::{Candidate, Discovery, SourceError, SourceResult};
use crate::models::FailureReason;

pub const DEFAULT_UNPAYWALL_BASE: &str = "https://api.unpaywall.org/v2";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnpaywallResponse {
    pub doi: Option<String>,
    #[serde(default)]
    pub is_oa: bool,
    pub best_oa_location: Option<OaLocation>,
    pub oa_locations: Option<Vec<OaLocation>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OaLocation {
    pub url: Option<String>,
    pub url_for_pdf: Option<String>,
    pub url_for_landing_page: Option<String>,
    pub host_type: Option<String>,
}

impl OaLocation {
    /// Direct PDF URL when the index knows one, otherwise the generic URL.
    fn pdf_url(&self) -> Option<String> {
        self.url_for_pdf.clone().or_else(|| self.url.clone())
    }
}

pub struct UnpaywallClient {
    client: PoliteClient,
    base_url: String,
    email: String,
    max_attempts: u32,
}

impl UnpaywallClient {
    pub fn new(client: PoliteClient, email: &str, max_attempts: u32) -> Self {
        Self {
            client,
            base_url: DEFAULT_UNPAYWALL_BASE.to_string(),
            email: email.to_string(),
            max_attempts: max_attempts.max(1),
        }
    }

    /// Override the API host, used by tests against a local server.
    pub fn with_base_url(mut self, base: &str) -> Self {
        self.base_url = base.trim_end_matches('/').to_string();
        self
    }

    /// Look up the best open-access location for a DOI.
    #[instrument(skip(self))]
    pub async fn discover(&self, doi: &str) -> SourceResult {
        let url = format!("{}/{}?email={}", self.base_url, doi, self.email);

        let mut last_err: Option<SourceError> = None;
        for attempt in 1..=self.max_attempts {
            match self.lookup_once(&url).await {
                Ok(discovery) => return Ok(discovery),
                Err(e) if retryable(&e) && attempt < self.max_attempts => {
                    warn!(doi, attempt, error = %e, "Unpaywall lookup failed, retrying");
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_err
            .unwrap_or_else(|| SourceError::new(FailureReason::NetworkError, "retries exhausted")))
    }

    async fn lookup_once(&self, url: &str) -> SourceResult {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SourceError::transport(&e))?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            // DOI unknown to the index; nothing to find, not a fault.
            return Ok(Discovery::NotFound);
        }
        if !status.is_success() {
            return Err(SourceError::status(status));
        }

        let body: UnpaywallResponse = resp
            .json()
            .await
            .map_err(|e| SourceError::new(FailureReason::NetworkError, e.to_string()))?;

        Ok(select_location(&body))
    }
}

/// Pick the best OA location: the index's own "best" first, then any
/// repository-hosted copy, then publisher copies.
fn select_location(body: &UnpaywallResponse) -> Discovery {
    if !body.is_oa {
        return Discovery::NotFound;
    }

    if let Some(best) = &body.best_oa_location {
        if let Some(url) = best.pdf_url() {
            debug!(url = %url, "Unpaywall best OA location");
            return found(url, best);
        }
    }

    let locations = body.oa_locations.as_deref().unwrap_or(&[]);
    for host_type in ["repository", "publisher"] {
        for loc in locations {
            if loc.host_type.as_deref() == Some(host_type) {
                if let Some(url) = loc.pdf_url() {
                    return found(url, loc);
                }
            }
        }
    }

    Discovery::NotFound
}

fn found(url: String, loc: &OaLocation) -> Discovery {
    let candidate = match &loc.url_for_landing_page {
        Some(landing) => Candidate::with_landing(url, landing.clone()),
        None => Candidate::new(url),
    };
    Discovery::Found(candidate)
}

fn retryable(err: &SourceError) -> bool {
    matches!(
        err.reason,
        FailureReason::Timeout | FailureReason::ServerError | FailureReason::NetworkError
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location(pdf: Option<&str>, url: Option<&str>, host: &str) -> OaLocation {
        OaLocation {
            url: url.map(String::from),
            url_for_pdf: pdf.map(String::from),
            url_for_landing_page: Some("https://example.org/landing".to_string()),
            host_type: Some(host.to_string()),
        }
    }

    #[test]
    fn test_select_prefers_best_location_pdf_url() {
        let body = UnpaywallResponse {
            doi: Some("10.1000/x".to_string()),
            is_oa: true,
            best_oa_location: Some(location(Some("https://a/f.pdf"), None, "publisher")),
            oa_locations: Some(vec![location(Some("https://b/f.pdf"), None, "repository")]),
        };
        match select_location(&body) {
            Discovery::Found(c) => {
                assert_eq!(c.url, "https://a/f.pdf");
                assert_eq!(c.landing_url.as_deref(), Some("https://example.org/landing"));
            }
            other => panic!("expected Found, got {other:?}"),
        }
    }

    #[test]
    fn test_select_prefers_repository_over_publisher() {
        let body = UnpaywallResponse {
            doi: None,
            is_oa: true,
            best_oa_location: None,
            oa_locations: Some(vec![
                location(Some("https://pub/f.pdf"), None, "publisher"),
                location(Some("https://repo/f.pdf"), None, "repository"),
            ]),
        };
        match select_location(&body) {
            Discovery::Found(c) => assert_eq!(c.url, "https://repo/f.pdf"),
            other => panic!("expected Found, got {other:?}"),
        }
    }

    #[test]
    fn test_closed_access_is_not_found() {
        let body = UnpaywallResponse {
            doi: None,
            is_oa: false,
            best_oa_location: Some(location(Some("https://a/f.pdf"), None, "publisher")),
            oa_locations: None,
        };
        assert_eq!(select_location(&body), Discovery::NotFound);
    }

    #[test]
    fn test_location_without_urls_is_skipped() {
        let body = UnpaywallResponse {
            doi: None,
            is_oa: true,
            best_oa_location: Some(OaLocation {
                url: None,
                url_for_pdf: None,
                url_for_landing_page: None,
                host_type: Some("publisher".to_string()),
            }),
            oa_locations: None,
        };
        assert_eq!(select_location(&body), Discovery::NotFound);
    }

    #[test]
    fn test_retryable_classification() {
        assert!(retryable(&SourceError::new(FailureReason::Timeout, "t")));
        assert!(retryable(&SourceError::new(FailureReason::ServerError, "s")));
        assert!(!retryable(&SourceError::new(FailureReason::Paywalled, "p")));
        assert!(!retryable(&SourceError::new(FailureReason::NotFound, "n")));
    }
}
