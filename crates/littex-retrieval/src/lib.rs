//! littex-retrieval — Full-text PDF acquisition pipeline.
//!
//! Given an academic identifier (DOI, PMID or PMC ID), the pipeline tries an
//! ordered set of retrieval strategies until one yields a candidate PDF URL,
//! downloads it once, validates the bytes on disk, and records exactly one
//! auditable outcome per identifier in the acquisition log:
//! - Identifier classification from raw shape
//! - Source strategies (Unpaywall, PMC fallback, Elsevier TDM, DOI
//!   resolution + scraping, journal URL patterns)
//! - PDF integrity validation (byte-level + optional structural probe)
//! - Append-only acquisition log with batch revalidation merge

pub mod identify;
pub mod log;
pub mod models;
pub mod pipeline;
pub mod sources;
pub mod validate;
