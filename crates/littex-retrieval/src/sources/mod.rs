//! Retrieval source strategies.
//!
//! Each strategy inspects one identifier and either proposes a candidate
//! PDF URL or reports why it could not. Failures never cross the strategy
//! boundary as errors-in-flight: every external fault is converted into a
//! tagged [`SourceError`] here and the pipeline decides what it means.

pub mod doi_scrape;
pub mod elsevier;
pub mod journal_patterns;
pub mod pmc;
pub mod unpaywall;

use crate::models::FailureReason;

/// A candidate PDF URL proposed by a discovery strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub url: String,
    /// Landing page the candidate was discovered on, sent as the Referer
    /// on the download request when present.
    pub landing_url: Option<String>,
}

impl Candidate {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into(), landing_url: None }
    }

    pub fn with_landing(url: impl Into<String>, landing: impl Into<String>) -> Self {
        Self { url: url.into(), landing_url: Some(landing.into()) }
    }
}

/// Discovery result of one strategy attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discovery {
    Found(Candidate),
    /// The strategy ran and found nothing; not an error.
    NotFound,
}

/// A classified failure at the strategy boundary.
#[derive(Debug, Clone)]
pub struct SourceError {
    pub reason: FailureReason,
    pub detail: String,
}

impl SourceError {
    pub fn new(reason: FailureReason, detail: impl Into<String>) -> Self {
        Self { reason, detail: detail.into() }
    }

    /// Classify a transport-level error from the HTTP client.
    pub fn transport(err: &reqwest::Error) -> Self {
        let reason = if err.is_timeout() {
            FailureReason::Timeout
        } else {
            FailureReason::NetworkError
        };
        Self { reason, detail: err.to_string() }
    }

    /// Classify a non-success HTTP status.
    pub fn status(status: reqwest::StatusCode) -> Self {
        Self {
            reason: FailureReason::from_status(status.as_u16()),
            detail: format!("HTTP {status}"),
        }
    }
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.reason.as_str(), self.detail)
    }
}

pub type SourceResult = std::result::Result<Discovery, SourceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        let e = SourceError::status(reqwest::StatusCode::FORBIDDEN);
        assert_eq!(e.reason, FailureReason::Paywalled);
        let e = SourceError::status(reqwest::StatusCode::NOT_FOUND);
        assert_eq!(e.reason, FailureReason::NotFound);
        let e = SourceError::status(reqwest::StatusCode::BAD_GATEWAY);
        assert_eq!(e.reason, FailureReason::ServerError);
    }
}
