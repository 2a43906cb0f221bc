//! PDF integrity validation.
//!
//! An HTTP 200 does not mean a PDF arrived: publishers serve HTML error
//! pages, truncated bodies and stub files with a success status. The
//! validator classifies a downloaded file from its bytes alone, cheapest
//! check first, so a run over thousands of files stays I/O-bound on the
//! first kilobyte.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Strict minimum size for untrusted sources.
pub const MIN_PDF_BYTES_STRICT: u64 = 10 * 1024;
/// Lenient minimum for trusted sources, which legitimately serve small
/// files (short letters, errata) that the strict threshold would reject.
pub const MIN_PDF_BYTES_LENIENT: u64 = 1024;

/// Why a file failed (or soft-warned) validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidityIssue {
    FileNotFound,
    FileTooSmall,
    HtmlErrorPage,
    InvalidPdfFormat,
    /// Non-fatal: the file is accepted as valid.
    MissingEofMarkerWarned,
    // surfaced only by the structural probe
    CorruptedPdf,
    PasswordProtected,
    UnreadablePdf,
}

impl ValidityIssue {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidityIssue::FileNotFound => "file_not_found",
            ValidityIssue::FileTooSmall => "file_too_small",
            ValidityIssue::HtmlErrorPage => "html_error_page",
            ValidityIssue::InvalidPdfFormat => "invalid_pdf_format",
            ValidityIssue::MissingEofMarkerWarned => "missing_eof_marker_warned",
            ValidityIssue::CorruptedPdf => "corrupted_pdf",
            ValidityIssue::PasswordProtected => "password_protected",
            ValidityIssue::UnreadablePdf => "unreadable_pdf",
        }
    }
}

/// Result of validating one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfCheck {
    pub valid: bool,
    pub reason: Option<ValidityIssue>,
    pub is_pdf: bool,
    pub is_html: bool,
    pub file_size: u64,
}

impl PdfCheck {
    fn invalid(reason: ValidityIssue, is_pdf: bool, is_html: bool, file_size: u64) -> Self {
        Self { valid: false, reason: Some(reason), is_pdf, is_html, file_size }
    }
}

// Unambiguous markers only. Generic words like "Error" occur legitimately
// inside PDF metadata and object streams and must never be markers.
const HTML_MARKERS: &[&str] = &[
    "<!doctype html",
    "<html",
    "<head",
    "<body",
    "access denied",
    "403 forbidden",
    "404 not found",
    "401 unauthorized",
    "http/1.0 ",
    "http/1.1 ",
    "http/2 ",
];

/// Validate a downloaded file with the strict size threshold.
pub fn validate_pdf(path: &Path) -> PdfCheck {
    validate_pdf_with_min_size(path, MIN_PDF_BYTES_STRICT)
}

/// Validate a downloaded file against a caller-chosen minimum size.
pub fn validate_pdf_with_min_size(path: &Path, min_bytes: u64) -> PdfCheck {
    let Ok(mut file) = File::open(path) else {
        return PdfCheck::invalid(ValidityIssue::FileNotFound, false, false, 0);
    };
    let file_size = file.metadata().map(|m| m.len()).unwrap_or(0);

    if file_size < min_bytes {
        debug!(path = %path.display(), file_size, min_bytes, "file below size threshold");
        return PdfCheck::invalid(ValidityIssue::FileTooSmall, false, false, file_size);
    }

    let mut head = [0u8; 1024];
    let n = match file.read(&mut head) {
        Ok(n) => n,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "could not read file head");
            return PdfCheck::invalid(ValidityIssue::InvalidPdfFormat, false, false, file_size);
        }
    };
    let head = &head[..n];

    let is_pdf = head.starts_with(b"%PDF-");

    // Lossy decode tolerates embedded NULs in binary junk around the markers.
    let scan_len = head.len().min(500);
    let head_text = String::from_utf8_lossy(&head[..scan_len]).to_lowercase();
    let is_html = HTML_MARKERS.iter().any(|m| head_text.contains(m));

    if is_html {
        return PdfCheck::invalid(ValidityIssue::HtmlErrorPage, is_pdf, true, file_size);
    }
    if !is_pdf {
        return PdfCheck::invalid(ValidityIssue::InvalidPdfFormat, false, false, file_size);
    }

    // Tail check for %%EOF. Many legitimate PDFs omit or relocate the
    // marker (linearised files, appended incremental updates), so its
    // absence is a soft warning, never an invalidation.
    let tail_len = file_size.min(2048);
    let mut tail = vec![0u8; tail_len as usize];
    let eof_found = file
        .seek(SeekFrom::End(-(tail_len as i64)))
        .and_then(|_| file.read_exact(&mut tail))
        .map(|()| contains_subslice(&tail, b"%%EOF"))
        .unwrap_or(false);

    PdfCheck {
        valid: true,
        reason: if eof_found { None } else { Some(ValidityIssue::MissingEofMarkerWarned) },
        is_pdf: true,
        is_html: false,
        file_size,
    }
}

fn contains_subslice(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

// ── Structural probe ───────────────────────────────────────────────────────

/// Optional deeper check layered on top of the byte-level validation.
/// Swappable capability; core correctness never depends on it.
pub trait StructuralProbe {
    /// Returns an issue if the document fails structural inspection, or
    /// None if it looks sound.
    fn probe(&self, path: &Path) -> Option<ValidityIssue>;
}

/// lopdf-backed structural probe: parses the cross-reference table and
/// object graph, detects encryption, and requires at least one page.
#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfProbe;

impl StructuralProbe for LopdfProbe {
    fn probe(&self, path: &Path) -> Option<ValidityIssue> {
        let doc = match lopdf::Document::load(path) {
            Ok(doc) => doc,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "structural parse failed");
                return Some(ValidityIssue::CorruptedPdf);
            }
        };
        if doc.is_encrypted() {
            return Some(ValidityIssue::PasswordProtected);
        }
        if doc.get_pages().is_empty() {
            return Some(ValidityIssue::UnreadablePdf);
        }
        None
    }
}
