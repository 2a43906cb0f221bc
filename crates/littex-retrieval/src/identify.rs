//! Identifier classification.
//!
//! Classifies a raw record identifier as DOI, PMID or PMC ID from its shape
//! alone. Total and deterministic: every string maps to exactly one kind.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

lazy_static! {
    // Registrant prefix "10." plus 4-9 digits, then a suffix of the
    // characters DOIs actually use. Case-insensitive.
    static ref DOI_RE: Regex =
        Regex::new(r"(?i)^10\.\d{4,9}/[-._;()/:a-z0-9]+$").expect("DOI regex");
    // Literal "PMC" prefix is required; digits alone are a PMID.
    static ref PMC_RE: Regex = Regex::new(r"(?i)^PMC\d+$").expect("PMC regex");
    static ref PMID_RE: Regex = Regex::new(r"^\d+$").expect("PMID regex");
}

/// The kind of an identifier, as inferred from its shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdKind {
    Doi,
    Pmid,
    Pmc,
    Unknown,
}

impl IdKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdKind::Doi => "doi",
            IdKind::Pmid => "pmid",
            IdKind::Pmc => "pmc",
            IdKind::Unknown => "unknown",
        }
    }
}

/// A record identifier with its classified kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identifier {
    pub raw: String,
    pub kind: IdKind,
}

impl Identifier {
    pub fn new(raw: &str) -> Self {
        let raw = raw.trim().to_string();
        let kind = classify(&raw);
        Self { raw, kind }
    }

    /// Deterministic local filename for this identifier's PDF.
    /// Derived from the raw string, not the file content, so a rerun finds
    /// the same name without any network call.
    pub fn filename(&self) -> String {
        let sanitised: String = self
            .raw
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
            .collect();
        format!("{sanitised}.pdf")
    }
}

/// Classify a raw string. First match wins: DOI, then PMC, then PMID.
pub fn classify(raw: &str) -> IdKind {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return IdKind::Unknown;
    }
    if DOI_RE.is_match(trimmed) {
        IdKind::Doi
    } else if PMC_RE.is_match(trimmed) {
        IdKind::Pmc
    } else if PMID_RE.is_match(trimmed) {
        IdKind::Pmid
    } else {
        IdKind::Unknown
    }
}
