//! End-to-end acquisition pipeline.
//!
//! Orchestrates the full flow for one batch of identifiers:
//!   1. Skip identifiers whose target file already exists (the only cache)
//!   2. Run the discovery strategies in fixed priority order per identifier
//!   3. Download the first candidate URL once, with Referer discipline
//!   4. Validate the bytes on disk (strict gate, unless the source is
//!      trusted)
//!   5. Append exactly one outcome to the acquisition log
//!   6. Sleep the politeness delay before the next identifier
//!
//! The chain is deliberately short-circuiting: the first strategy to yield
//! a candidate URL wins, and a download-phase failure never falls back to
//! the next discovery strategy. One identifier's failure never aborts the
//! batch.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use littex_common::PoliteClient;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::identify::{IdKind, Identifier};
use crate::log::AcquisitionLog;
use crate::models::{FailureReason, PdfAcquisitionOutcome, RetrievalAttempt, RetrievalMethod};
use crate::sources::doi_scrape::{self, DoiScrapeClient};
use crate::sources::elsevier::ElsevierClient;
use crate::sources::journal_patterns;
use crate::sources::pmc::{self, PmcClient};
use crate::sources::unpaywall::UnpaywallClient;
use crate::sources::{Candidate, Discovery, SourceError};
use crate::validate::{
    validate_pdf_with_min_size, PdfCheck, StructuralProbe, ValidityIssue, MIN_PDF_BYTES_LENIENT,
    MIN_PDF_BYTES_STRICT,
};

// ── Configuration ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Directory the PDFs land in; also the skip cache.
    pub output_dir: PathBuf,
    /// Politeness delay after every identifier, success or not.
    pub delay: Duration,
    /// Strict size gate applied right after an untrusted download.
    pub strict_min_bytes: u64,
    /// Lenient size gate used by the batch revalidation pass.
    pub lenient_min_bytes: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("pdfs"),
            delay: Duration::from_secs(1),
            strict_min_bytes: MIN_PDF_BYTES_STRICT,
            lenient_min_bytes: MIN_PDF_BYTES_LENIENT,
        }
    }
}

// ── Batch summary ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub acquired: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// A candidate found by discovery, tagged with the strategy that won.
#[derive(Debug, Clone)]
struct WinningCandidate {
    candidate: Candidate,
    method: RetrievalMethod,
}

/// What the discovery phase produced for one identifier.
struct DiscoveryOutcome {
    winner: Option<WinningCandidate>,
    /// First hard failure seen while discovering, kept for the terminal
    /// outcome when no strategy yields a URL.
    first_failure: Option<RetrievalAttempt>,
}

impl DiscoveryOutcome {
    fn empty() -> Self {
        Self { winner: None, first_failure: None }
    }

    fn note_failure(&mut self, method: RetrievalMethod, err: SourceError) {
        warn!(method = method.as_str(), error = %err, "discovery strategy failed");
        if self.first_failure.is_none() {
            self.first_failure = Some(RetrievalAttempt::failed(method, err.reason, err.detail));
        }
    }
}

// ── Pipeline ──────────────────────────────────────────────────────────────

pub struct RetrievalPipeline {
    client: PoliteClient,
    unpaywall: UnpaywallClient,
    pmc: PmcClient,
    elsevier: ElsevierClient,
    scrape: DoiScrapeClient,
    config: PipelineConfig,
}

impl RetrievalPipeline {
    pub fn new(
        client: PoliteClient,
        unpaywall: UnpaywallClient,
        pmc: PmcClient,
        elsevier: ElsevierClient,
        scrape: DoiScrapeClient,
        config: PipelineConfig,
    ) -> Self {
        Self { client, unpaywall, pmc, elsevier, scrape, config }
    }

    /// Process a whole batch sequentially. Every identifier produces
    /// exactly one appended outcome; the batch always completes.
    pub async fn run(&self, identifiers: &[Identifier], log: &mut AcquisitionLog) -> BatchSummary {
        let mut summary = BatchSummary { total: identifiers.len(), ..Default::default() };

        for (i, id) in identifiers.iter().enumerate() {
            let outcome = self.process_identifier(id).await;
            info!("{}", outcome.summary_line());

            match outcome.method {
                RetrievalMethod::Skipped => summary.skipped += 1,
                _ if outcome.success => summary.acquired += 1,
                _ => summary.failed += 1,
            }
            log.append(&outcome);

            // Politeness throttle, not retry backoff. Nothing to wait for
            // after the final identifier.
            if i + 1 < identifiers.len() && !self.config.delay.is_zero() {
                tokio::time::sleep(self.config.delay).await;
            }
        }

        info!(
            total = summary.total,
            acquired = summary.acquired,
            skipped = summary.skipped,
            failed = summary.failed,
            "batch complete"
        );
        summary
    }

    /// Resolve and download one identifier, producing its terminal outcome.
    #[instrument(skip(self), fields(id = %id.raw))]
    pub async fn process_identifier(&self, id: &Identifier) -> PdfAcquisitionOutcome {
        let target = self.target_path(id);

        // The only cache: a deterministic filename that already exists
        // means a previous run got here. No strategy runs, no request
        // leaves the machine.
        if target.exists() {
            debug!(path = %target.display(), "target file exists, skipping");
            let size_kb = std::fs::metadata(&target).map(|m| m.len() / 1024).unwrap_or(0);
            return PdfAcquisitionOutcome::skipped(
                id.clone(),
                target.to_string_lossy().into_owned(),
                size_kb,
            );
        }

        let discovery = match id.kind {
            IdKind::Doi => self.discover_for_doi(&id.raw, true).await,
            IdKind::Pmid => self.discover_for_pmid(&id.raw).await,
            IdKind::Pmc => DiscoveryOutcome {
                winner: Some(WinningCandidate {
                    candidate: self.pmc.discover_by_pmcid(&id.raw),
                    method: RetrievalMethod::PmcFallback,
                }),
                first_failure: None,
            },
            IdKind::Unknown => DiscoveryOutcome::empty(),
        };

        match discovery.winner {
            Some(winner) => self.download_once(id, winner, &target).await,
            None => {
                let (method, reason) = match discovery.first_failure {
                    Some(attempt) => (
                        attempt.method,
                        attempt.failure_reason.unwrap_or(FailureReason::NoPdfFound),
                    ),
                    None => (RetrievalMethod::None, FailureReason::NoPdfFound),
                };
                PdfAcquisitionOutcome::failure(id.clone(), method, reason)
            }
        }
    }

    fn target_path(&self, id: &Identifier) -> PathBuf {
        self.config.output_dir.join(id.filename())
    }

    // ── Discovery chains ──────────────────────────────────────────────────

    /// DOI priority chain. `with_unpaywall` is false when the chain runs as
    /// the tail of the PMID flow, where the OA lookup already happened.
    async fn discover_for_doi(&self, doi: &str, with_unpaywall: bool) -> DiscoveryOutcome {
        let mut out = DiscoveryOutcome::empty();

        // 1. Open-access metadata lookup (only retrying strategy).
        if with_unpaywall {
            match self.unpaywall.discover(doi).await {
                Ok(Discovery::Found(c)) => {
                    out.winner = Some(WinningCandidate { candidate: c, method: RetrievalMethod::Unpaywall });
                    return out;
                }
                Ok(Discovery::NotFound) => {}
                Err(e) => out.note_failure(RetrievalMethod::Unpaywall, e),
            }
        }

        // 2. DOI → PMID → PMCID linking fallback.
        match self.pmc.discover_by_doi(doi).await {
            Ok(Discovery::Found(c)) => {
                out.winner = Some(WinningCandidate { candidate: c, method: RetrievalMethod::PmcFallback });
                return out;
            }
            Ok(Discovery::NotFound) => {}
            Err(e) => out.note_failure(RetrievalMethod::PmcFallback, e),
        }

        // 3. Publisher TDM API; silent no-op unless keyed and applicable.
        if let Discovery::Found(c) = self.elsevier.discover(doi) {
            out.winner = Some(WinningCandidate { candidate: c, method: RetrievalMethod::ElsevierApi });
            return out;
        }

        // 4. Generic DOI resolution + landing-page scraping.
        match self.scrape.discover(doi).await {
            Ok(Discovery::Found(c)) => {
                out.winner = Some(WinningCandidate { candidate: c, method: RetrievalMethod::DoiScrape });
                return out;
            }
            Ok(Discovery::NotFound) => {}
            Err(e) => out.note_failure(RetrievalMethod::DoiScrape, e),
        }

        // 5. Rule-based journal URL construction, last because it is a
        // guess the download phase has to verify.
        if let Discovery::Found(c) = journal_patterns::discover(doi) {
            out.winner = Some(WinningCandidate { candidate: c, method: RetrievalMethod::JournalUrlPattern });
        }

        out
    }

    /// PMID chain: one landing-page fetch feeds DOI recovery, repository
    /// link discovery and citation scraping; a recovered DOI then runs the
    /// remaining DOI chain.
    async fn discover_for_pmid(&self, pmid: &str) -> DiscoveryOutcome {
        let mut out = DiscoveryOutcome::empty();

        let landing = match self.pmc.fetch_pubmed_landing(pmid).await {
            Ok(landing) => Some(landing),
            Err(e) => {
                out.note_failure(RetrievalMethod::DoiScrape, e);
                None
            }
        };

        // Recover a DOI: citation_doi meta tag first, efetch XML second.
        let mut doi = landing
            .as_ref()
            .and_then(|l| pmc::extract_doi_from_landing(&l.html));
        if doi.is_none() {
            match self.pmc.doi_via_efetch(pmid).await {
                Ok(d) => doi = d,
                Err(e) => out.note_failure(RetrievalMethod::PmcFallback, e),
            }
        }

        // 1. OA lookup on the recovered DOI.
        if let Some(ref doi) = doi {
            match self.unpaywall.discover(doi).await {
                Ok(Discovery::Found(c)) => {
                    out.winner = Some(WinningCandidate { candidate: c, method: RetrievalMethod::Unpaywall });
                    return out;
                }
                Ok(Discovery::NotFound) => {}
                Err(e) => out.note_failure(RetrievalMethod::Unpaywall, e),
            }
        }

        if let Some(ref landing) = landing {
            // 2. Repository link on the record page.
            if let Some(pmcid) = pmc::extract_pmcid(&landing.html) {
                out.winner = Some(WinningCandidate {
                    candidate: Candidate::with_landing(
                        self.pmc.pdf_url_for_pmcid(&pmcid),
                        landing.url.clone(),
                    ),
                    method: RetrievalMethod::PmcFallback,
                });
                return out;
            }

            // 3. Citation metadata / anchor scrape on the same page.
            if let Ok(base) = url::Url::parse(&landing.url) {
                if let Some(pdf_url) = doi_scrape::scrape_pdf_link(&landing.html, &base) {
                    out.winner = Some(WinningCandidate {
                        candidate: Candidate::with_landing(pdf_url, landing.url.clone()),
                        method: RetrievalMethod::DoiScrape,
                    });
                    return out;
                }
            }
        }

        // 4. Full DOI sub-chain on the recovered DOI (the OA lookup above
        // already covered its first step).
        if let Some(ref doi) = doi {
            let tail = self.discover_for_doi(doi, false).await;
            if tail.winner.is_some() {
                return tail;
            }
            if let Some(failure) = tail.first_failure {
                if out.first_failure.is_none() {
                    out.first_failure = Some(failure);
                }
            }
        }

        out
    }

    // ── Download phase ────────────────────────────────────────────────────

    /// One download attempt per identifier per run; no fallback to further
    /// discovery on failure.
    async fn download_once(
        &self,
        id: &Identifier,
        winner: WinningCandidate,
        target: &Path,
    ) -> PdfAcquisitionOutcome {
        let WinningCandidate { candidate, method } = winner;
        debug!(url = %candidate.url, method = method.as_str(), "downloading candidate");

        let request = self
            .client
            .get_with_referer(&candidate.url, candidate.landing_url.as_deref());

        let resp = match request.send().await {
            Ok(resp) => resp,
            Err(e) => {
                let reason = if e.is_timeout() {
                    FailureReason::Timeout
                } else {
                    FailureReason::NetworkError
                };
                let mut outcome = PdfAcquisitionOutcome::failure(id.clone(), method, reason);
                outcome.pdf_url = Some(candidate.url);
                return outcome;
            }
        };

        let status = resp.status();
        if !status.is_success() {
            let mut outcome = PdfAcquisitionOutcome::failure(
                id.clone(),
                method,
                FailureReason::from_status(status.as_u16()),
            );
            outcome.status = status.as_u16().to_string();
            outcome.pdf_url = Some(candidate.url);
            return outcome;
        }

        let bytes = match resp.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => {
                let reason = if e.is_timeout() {
                    FailureReason::Timeout
                } else {
                    FailureReason::NetworkError
                };
                let mut outcome = PdfAcquisitionOutcome::failure(id.clone(), method, reason);
                outcome.status = status.as_u16().to_string();
                outcome.pdf_url = Some(candidate.url);
                return outcome;
            }
        };

        if let Err(e) = self.write_target(target, &bytes) {
            warn!(path = %target.display(), error = %e, "could not write download");
            let mut outcome =
                PdfAcquisitionOutcome::failure(id.clone(), method, FailureReason::NetworkError);
            outcome.status = status.as_u16().to_string();
            outcome.pdf_url = Some(candidate.url);
            return outcome;
        }

        let file_size_kb = bytes.len() as u64 / 1024;
        let mut outcome = PdfAcquisitionOutcome {
            identifier: id.clone(),
            method,
            status: status.as_u16().to_string(),
            success: true,
            failure_reason: None,
            pdf_url: Some(candidate.url),
            file_path: Some(target.to_string_lossy().into_owned()),
            file_size_kb: Some(file_size_kb),
            pdf_valid: None,
            pdf_invalid_reason: None,
            timestamp: Utc::now(),
        };

        // Trusted sources skip the strict gate and keep validity unknown
        // until the batch revalidation pass.
        if method.is_trusted() {
            return outcome;
        }

        let check = validate_pdf_with_min_size(target, self.config.strict_min_bytes);
        if check.valid {
            if let Some(warning) = check.reason {
                debug!(path = %target.display(), warning = warning.as_str(), "soft validation warning");
            }
            outcome.pdf_valid = Some(true);
            return outcome;
        }

        // Invalid: the partial/disguised file must not survive, or a rerun
        // would "skip" a failure.
        if let Err(e) = std::fs::remove_file(target) {
            warn!(path = %target.display(), error = %e, "could not remove invalid download");
        }

        let issue = check.reason.unwrap_or(ValidityIssue::InvalidPdfFormat);
        PdfAcquisitionOutcome {
            success: false,
            failure_reason: Some(failure_from_issue(issue)),
            file_path: None,
            file_size_kb: Some(check.file_size / 1024),
            pdf_valid: Some(false),
            pdf_invalid_reason: Some(issue.as_str().to_string()),
            ..outcome
        }
    }

    fn write_target(&self, target: &Path, bytes: &[u8]) -> std::io::Result<()> {
        if let Some(dir) = target.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(target, bytes)
    }
}

/// Map a validation issue onto the outcome failure taxonomy.
fn failure_from_issue(issue: ValidityIssue) -> FailureReason {
    match issue {
        ValidityIssue::HtmlErrorPage => FailureReason::HtmlErrorPage,
        ValidityIssue::FileTooSmall => FailureReason::FileTooSmall,
        ValidityIssue::CorruptedPdf => FailureReason::CorruptedPdf,
        ValidityIssue::PasswordProtected => FailureReason::PasswordProtected,
        ValidityIssue::UnreadablePdf => FailureReason::UnreadablePdf,
        ValidityIssue::FileNotFound
        | ValidityIssue::InvalidPdfFormat
        | ValidityIssue::MissingEofMarkerWarned => FailureReason::InvalidPdfFormat,
    }
}

// ── Batch revalidation ────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize)]
pub struct RevalidationSummary {
    pub checked: usize,
    pub invalidated: usize,
}

/// Re-inspect every logged file with the lenient size threshold and merge
/// the verdicts back into the log, keyed by file path. This closes the
/// trusted-source window: rows accepted on HTTP 200 alone get a real
/// validity verdict here.
pub fn revalidate_log(
    log: &mut AcquisitionLog,
    lenient_min_bytes: u64,
    probe: Option<&dyn StructuralProbe>,
) -> RevalidationSummary {
    let mut summary = RevalidationSummary::default();

    let paths: Vec<String> = log
        .rows()
        .iter()
        .filter(|row| row.success)
        .filter_map(|row| row.file_path.clone())
        .collect();

    for path in paths {
        let mut check = validate_pdf_with_min_size(Path::new(&path), lenient_min_bytes);

        // Layer the structural probe on top of a passing byte-level check.
        if check.valid {
            if let Some(probe) = probe {
                if let Some(issue) = probe.probe(Path::new(&path)) {
                    check = PdfCheck {
                        valid: false,
                        reason: Some(issue),
                        ..check
                    };
                }
            }
        }

        summary.checked += 1;
        if !check.valid {
            summary.invalidated += 1;
            info!(path = %path, reason = ?check.reason, "revalidation invalidated a download");
        }
        log.merge_validation(&path, &check);
    }

    info!(
        checked = summary.checked,
        invalidated = summary.invalidated,
        "batch revalidation complete"
    );
    summary
}
