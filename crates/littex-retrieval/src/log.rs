//! Append-only acquisition log.
//!
//! One row per identifier per run, persisted as a CSV table whose columns
//! are the downstream reporting contract. The log writer owns persistence;
//! nothing else in the pipeline touches the file.

use std::path::{Path, PathBuf};

use littex_common::{LittexError, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::models::PdfAcquisitionOutcome;
use crate::validate::PdfCheck;

/// One persisted row. Field order is the column order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRow {
    pub id: String,
    pub id_type: String,
    pub timestamp: String,
    pub method: String,
    pub status: String,
    pub success: bool,
    pub failure_reason: Option<String>,
    pub pdf_url: Option<String>,
    pub file_path: Option<String>,
    pub file_size_kb: Option<u64>,
    pub pdf_valid: Option<bool>,
    pub pdf_invalid_reason: Option<String>,
}

impl From<&PdfAcquisitionOutcome> for LogRow {
    fn from(o: &PdfAcquisitionOutcome) -> Self {
        Self {
            id: o.identifier.raw.clone(),
            id_type: o.identifier.kind.as_str().to_string(),
            timestamp: o.timestamp.to_rfc3339(),
            method: o.method.as_str().to_string(),
            status: o.status.clone(),
            success: o.success,
            failure_reason: o.failure_reason.map(|r| r.as_str().to_string()),
            pdf_url: o.pdf_url.clone(),
            file_path: o.file_path.clone(),
            file_size_kb: o.file_size_kb,
            pdf_valid: o.pdf_valid,
            pdf_invalid_reason: o.pdf_invalid_reason.clone(),
        }
    }
}

/// The log writer for one run. Rows accumulate in memory in submission
/// order and are flushed to disk at run end (and after the revalidation
/// merge). Persistence is atomic so a crash mid-write never leaves a
/// half-written table behind.
#[derive(Debug)]
pub struct AcquisitionLog {
    path: PathBuf,
    rows: Vec<LogRow>,
}

impl AcquisitionLog {
    /// Open a log at `path`, loading any rows from a previous run so the
    /// revalidation pass can merge into them.
    pub fn open(path: &Path) -> Result<Self> {
        let rows = if path.exists() {
            let mut reader = csv::Reader::from_path(path)
                .map_err(|e| LittexError::Log(format!("cannot read {}: {e}", path.display())))?;
            let rows: Vec<LogRow> = reader
                .deserialize()
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| LittexError::Log(format!("malformed log row: {e}")))?;
            debug!(path = %path.display(), n = rows.len(), "loaded existing log");
            rows
        } else {
            Vec::new()
        };
        Ok(Self { path: path.to_path_buf(), rows })
    }

    /// Start a fresh log at `path`, ignoring any existing file.
    pub fn create(path: &Path) -> Self {
        Self { path: path.to_path_buf(), rows: Vec::new() }
    }

    pub fn append(&mut self, outcome: &PdfAcquisitionOutcome) {
        self.rows.push(LogRow::from(outcome));
    }

    pub fn rows(&self) -> &[LogRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Merge a batch-revalidation result into the row with the matching
    /// file path, updating validity and, when invalid, downgrading the
    /// row's success. Rows are updated in place; nothing is appended.
    pub fn merge_validation(&mut self, file_path: &str, check: &PdfCheck) {
        for row in self.rows.iter_mut() {
            if row.file_path.as_deref() != Some(file_path) {
                continue;
            }
            row.pdf_valid = Some(check.valid);
            if check.valid {
                // Soft warnings stay out of the row: the invalidity column
                // is populated only for files that actually failed.
                row.pdf_invalid_reason = None;
            } else {
                let reason = check.reason.map(|r| r.as_str().to_string());
                row.success = false;
                row.failure_reason.clone_from(&reason);
                row.pdf_invalid_reason = reason;
            }
        }
    }

    /// Write the table to disk: tempfile in the target directory, then an
    /// atomic rename over the destination.
    pub fn persist(&self) -> Result<()> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)?;

        let tmp = tempfile::NamedTempFile::new_in(dir)?;
        {
            let mut writer = csv::Writer::from_writer(&tmp);
            for row in &self.rows {
                writer
                    .serialize(row)
                    .map_err(|e| LittexError::Log(format!("row serialise failed: {e}")))?;
            }
            writer
                .flush()
                .map_err(|e| LittexError::Log(format!("log flush failed: {e}")))?;
        }
        tmp.persist(&self.path)
            .map_err(|e| LittexError::Log(format!("log rename failed: {e}")))?;

        info!(path = %self.path.display(), rows = self.rows.len(), "acquisition log persisted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identify::Identifier;
    use crate::models::{FailureReason, RetrievalMethod};
    use crate::validate::ValidityIssue;
    use tempfile::TempDir;

    fn sample_outcome(raw: &str, path: Option<&str>) -> PdfAcquisitionOutcome {
        let mut o = PdfAcquisitionOutcome::failure(
            Identifier::new(raw),
            RetrievalMethod::Unpaywall,
            FailureReason::NoPdfFound,
        );
        if let Some(p) = path {
            o.success = true;
            o.failure_reason = None;
            o.status = "200".to_string();
            o.file_path = Some(p.to_string());
            o.file_size_kb = Some(42);
        }
        o
    }

    #[test]
    fn test_append_and_persist_roundtrip() {
        let dir = TempDir::new().unwrap();
        let log_path = dir.path().join("log.csv");

        let mut log = AcquisitionLog::create(&log_path);
        log.append(&sample_outcome("10.1038/nature12373", Some("out/a.pdf")));
        log.append(&sample_outcome("30670877", None));
        log.persist().unwrap();

        let reloaded = AcquisitionLog::open(&log_path).unwrap();
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.rows()[0].id, "10.1038/nature12373");
        assert_eq!(reloaded.rows()[0].id_type, "doi");
        assert!(reloaded.rows()[0].success);
        assert_eq!(reloaded.rows()[1].failure_reason.as_deref(), Some("no_pdf_found"));
    }

    #[test]
    fn test_merge_validation_updates_in_place() {
        let dir = TempDir::new().unwrap();
        let mut log = AcquisitionLog::create(&dir.path().join("log.csv"));
        log.append(&sample_outcome("10.1038/nature12373", Some("out/a.pdf")));
        log.append(&sample_outcome("10.1016/j.cell.2020.01.001", Some("out/b.pdf")));

        let bad = PdfCheck {
            valid: false,
            reason: Some(ValidityIssue::HtmlErrorPage),
            is_pdf: false,
            is_html: true,
            file_size: 12_000,
        };
        log.merge_validation("out/b.pdf", &bad);

        assert_eq!(log.len(), 2, "merge must never add rows");
        let row = &log.rows()[1];
        assert!(!row.success);
        assert_eq!(row.pdf_valid, Some(false));
        assert_eq!(row.pdf_invalid_reason.as_deref(), Some("html_error_page"));
        assert_eq!(row.failure_reason.as_deref(), Some("html_error_page"));
        // untouched row keeps its state
        assert!(log.rows()[0].success);
        assert_eq!(log.rows()[0].pdf_valid, None);
    }

    #[test]
    fn test_merge_validation_valid_with_soft_warning() {
        let dir = TempDir::new().unwrap();
        let mut log = AcquisitionLog::create(&dir.path().join("log.csv"));
        log.append(&sample_outcome("10.1038/nature12373", Some("out/a.pdf")));

        let ok = PdfCheck {
            valid: true,
            reason: Some(ValidityIssue::MissingEofMarkerWarned),
            is_pdf: true,
            is_html: false,
            file_size: 50_000,
        };
        log.merge_validation("out/a.pdf", &ok);

        let row = &log.rows()[0];
        assert!(row.success, "soft warning never downgrades success");
        assert_eq!(row.pdf_valid, Some(true));
        assert_eq!(row.pdf_invalid_reason, None, "warnings never populate the invalidity column");
    }

    #[test]
    fn test_open_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let log = AcquisitionLog::open(&dir.path().join("absent.csv")).unwrap();
        assert!(log.is_empty());
    }
}
