//! Rule-based journal PDF URL construction.
//!
//! Last-resort strategy: some publishers expose predictable PDF paths that
//! can be constructed from the DOI alone. The table is a static ordered
//! list of (prefix, constructor) entries so adding a publisher is a data
//! change; first matching entry wins.

use super::{Candidate, Discovery};

/// One publisher rule: DOI prefix predicate plus a URL constructor.
pub struct JournalPattern {
    pub name: &'static str,
    pub prefix: &'static str,
    pub build: fn(&str) -> String,
}

/// Ordered publisher table. More specific prefixes must come before more
/// general ones sharing a registrant.
pub static JOURNAL_PATTERNS: &[JournalPattern] = &[
    JournalPattern {
        name: "NEJM",
        prefix: "10.1056/",
        build: |doi| format!("https://www.nejm.org/doi/pdf/{doi}"),
    },
    JournalPattern {
        name: "Wiley",
        prefix: "10.1111/",
        build: |doi| format!("https://onlinelibrary.wiley.com/doi/pdf/{doi}"),
    },
    JournalPattern {
        name: "Wiley",
        prefix: "10.1002/",
        build: |doi| format!("https://onlinelibrary.wiley.com/doi/pdf/{doi}"),
    },
    JournalPattern {
        name: "Springer",
        prefix: "10.1007/",
        build: |doi| format!("https://link.springer.com/content/pdf/{doi}.pdf"),
    },
    JournalPattern {
        name: "SAGE",
        prefix: "10.1177/",
        build: |doi| format!("https://journals.sagepub.com/doi/pdf/{doi}"),
    },
    JournalPattern {
        name: "Taylor & Francis",
        prefix: "10.1080/",
        build: |doi| format!("https://www.tandfonline.com/doi/pdf/{doi}"),
    },
    JournalPattern {
        name: "PLOS",
        prefix: "10.1371/",
        build: |doi| {
            format!("https://journals.plos.org/plosone/article/file?id={doi}&type=printable")
        },
    },
    JournalPattern {
        name: "Frontiers",
        prefix: "10.3389/",
        build: |doi| format!("https://www.frontiersin.org/articles/{doi}/pdf"),
    },
];

/// Look the DOI up in the pattern table. Purely local; never fails.
pub fn discover(doi: &str) -> Discovery {
    for pattern in JOURNAL_PATTERNS {
        if doi.starts_with(pattern.prefix) {
            return Discovery::Found(Candidate::new((pattern.build)(doi)));
        }
    }
    Discovery::NotFound
}
