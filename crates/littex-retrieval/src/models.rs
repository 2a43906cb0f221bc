//! Data models for the acquisition pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identify::Identifier;

/// The strategy that produced (or failed to produce) an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalMethod {
    Unpaywall,
    PmcFallback,
    ElsevierApi,
    DoiScrape,
    JournalUrlPattern,
    /// Target file already existed; no strategy ran.
    Skipped,
    /// No strategy produced a candidate URL.
    None,
}

impl RetrievalMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetrievalMethod::Unpaywall => "unpaywall",
            RetrievalMethod::PmcFallback => "pmc_fallback",
            RetrievalMethod::ElsevierApi => "elsevier_api",
            RetrievalMethod::DoiScrape => "doi_scrape",
            RetrievalMethod::JournalUrlPattern => "journal_url_pattern",
            RetrievalMethod::Skipped => "skipped",
            RetrievalMethod::None => "none",
        }
    }

    /// Trusted sources are accepted on HTTP 200 alone and revalidated later
    /// with the lenient size threshold: both legitimately serve small but
    /// valid files that the strict threshold rejects.
    pub fn is_trusted(&self) -> bool {
        matches!(self, RetrievalMethod::PmcFallback | RetrievalMethod::ElsevierApi)
    }
}

/// Why an acquisition failed. Mirrors the strategy/download/validation
/// failure taxonomy; exactly one reason per failed outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    // transport
    Timeout,
    ServerError,
    NetworkError,
    // access
    Paywalled,
    Unauthorized,
    NoEntitlement,
    // absence
    NotFound,
    NoPdfFound,
    // content (from validation)
    HtmlErrorPage,
    FileTooSmall,
    InvalidPdfFormat,
    CorruptedPdf,
    PasswordProtected,
    UnreadablePdf,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::Timeout => "timeout",
            FailureReason::ServerError => "server_error",
            FailureReason::NetworkError => "network_error",
            FailureReason::Paywalled => "paywalled",
            FailureReason::Unauthorized => "unauthorized",
            FailureReason::NoEntitlement => "no_entitlement",
            FailureReason::NotFound => "not_found",
            FailureReason::NoPdfFound => "no_pdf_found",
            FailureReason::HtmlErrorPage => "html_error_page",
            FailureReason::FileTooSmall => "file_too_small",
            FailureReason::InvalidPdfFormat => "invalid_pdf_format",
            FailureReason::CorruptedPdf => "corrupted_pdf",
            FailureReason::PasswordProtected => "password_protected",
            FailureReason::UnreadablePdf => "unreadable_pdf",
        }
    }

    /// Map an HTTP status from the download phase to a failure reason.
    pub fn from_status(status: u16) -> Self {
        match status {
            401 => FailureReason::Unauthorized,
            403 => FailureReason::Paywalled,
            404 => FailureReason::NotFound,
            s if s >= 500 => FailureReason::ServerError,
            _ => FailureReason::NetworkError,
        }
    }
}

/// Ephemeral record of a single strategy attempt. Not persisted; the
/// pipeline keeps the first hard failure for the terminal outcome.
#[derive(Debug, Clone)]
pub struct RetrievalAttempt {
    pub method: RetrievalMethod,
    pub candidate_url: Option<String>,
    pub landing_url: Option<String>,
    pub http_status: Option<u16>,
    pub failure_reason: Option<FailureReason>,
    pub error_detail: Option<String>,
}

impl RetrievalAttempt {
    /// Attempt that failed before producing a candidate.
    pub fn failed(method: RetrievalMethod, reason: FailureReason, detail: impl Into<String>) -> Self {
        Self {
            method,
            candidate_url: None,
            landing_url: None,
            http_status: None,
            failure_reason: Some(reason),
            error_detail: Some(detail.into()),
        }
    }
}

/// Terminal, immutable record for one identifier in one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PdfAcquisitionOutcome {
    pub identifier: Identifier,
    pub method: RetrievalMethod,
    /// HTTP status of the download as a string, or "exists" for cache
    /// skips, or "" when no request was made.
    pub status: String,
    pub success: bool,
    pub failure_reason: Option<FailureReason>,
    pub pdf_url: Option<String>,
    pub file_path: Option<String>,
    pub file_size_kb: Option<u64>,
    /// None = not yet validated (trusted source window, or skip).
    pub pdf_valid: Option<bool>,
    pub pdf_invalid_reason: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl PdfAcquisitionOutcome {
    /// Failed outcome with no file on disk.
    pub fn failure(identifier: Identifier, method: RetrievalMethod, reason: FailureReason) -> Self {
        Self {
            identifier,
            method,
            status: String::new(),
            success: false,
            failure_reason: Some(reason),
            pdf_url: None,
            file_path: None,
            file_size_kb: None,
            pdf_valid: None,
            pdf_invalid_reason: None,
            timestamp: Utc::now(),
        }
    }

    /// Skip outcome for an identifier whose target file already exists.
    pub fn skipped(identifier: Identifier, file_path: String, file_size_kb: u64) -> Self {
        Self {
            identifier,
            method: RetrievalMethod::Skipped,
            status: "exists".to_string(),
            success: true,
            failure_reason: None,
            pdf_url: None,
            file_path: Some(file_path),
            file_size_kb: Some(file_size_kb),
            pdf_valid: None,
            pdf_invalid_reason: None,
            timestamp: Utc::now(),
        }
    }

    /// One-line human-readable status for console output.
    pub fn summary_line(&self) -> String {
        if self.method == RetrievalMethod::Skipped {
            format!("{}: skipped (already downloaded)", self.identifier.raw)
        } else if self.success {
            format!(
                "{}: acquired via {} ({} KB)",
                self.identifier.raw,
                self.method.as_str(),
                self.file_size_kb.unwrap_or(0)
            )
        } else {
            format!(
                "{}: failed ({})",
                self.identifier.raw,
                self.failure_reason.map(|r| r.as_str()).unwrap_or("unknown")
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identify::Identifier;

    #[test]
    fn test_trusted_methods() {
        assert!(RetrievalMethod::PmcFallback.is_trusted());
        assert!(RetrievalMethod::ElsevierApi.is_trusted());
        assert!(!RetrievalMethod::Unpaywall.is_trusted());
        assert!(!RetrievalMethod::DoiScrape.is_trusted());
        assert!(!RetrievalMethod::JournalUrlPattern.is_trusted());
    }

    #[test]
    fn test_failure_reason_from_status() {
        assert_eq!(FailureReason::from_status(401), FailureReason::Unauthorized);
        assert_eq!(FailureReason::from_status(403), FailureReason::Paywalled);
        assert_eq!(FailureReason::from_status(404), FailureReason::NotFound);
        assert_eq!(FailureReason::from_status(500), FailureReason::ServerError);
        assert_eq!(FailureReason::from_status(503), FailureReason::ServerError);
        assert_eq!(FailureReason::from_status(429), FailureReason::NetworkError);
    }

    #[test]
    fn test_failure_outcome_invariants() {
        let o = PdfAcquisitionOutcome::failure(
            Identifier::new("10.1038/nature12373"),
            RetrievalMethod::None,
            FailureReason::NoPdfFound,
        );
        assert!(!o.success);
        assert!(o.failure_reason.is_some());
        assert!(o.file_path.is_none());
    }

    #[test]
    fn test_skip_outcome_shape() {
        let o = PdfAcquisitionOutcome::skipped(
            Identifier::new("30670877"),
            "out/30670877.pdf".to_string(),
            120,
        );
        assert_eq!(o.method, RetrievalMethod::Skipped);
        assert_eq!(o.status, "exists");
        assert!(o.failure_reason.is_none());
    }
}
