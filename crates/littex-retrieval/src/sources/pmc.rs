//! PubMed / PMC fallback lookup.
//!
//! Two jobs live here:
//! 1. The DOI-chain fallback: resolve DOI → PMID → PMCID through the NCBI
//!    ID-converter, then construct the Europe PMC render endpoint, which
//!    serves the article PDF directly for any open-access PMCID.
//! 2. PMID support: fetch the PubMed record page once and recover the DOI
//!    and any PMC accession from it, with an E-utilities efetch XML parse
//!    as fallback when the page exposes no DOI meta tag.
//!
//! Endpoints:
//!   idconv: https://www.ncbi.nlm.nih.gov/pmc/utils/idconv/v1.0/
//!   efetch: https://eutils.ncbi.nlm.nih.gov/entrez/eutils/efetch.fcgi

use lazy_static::lazy_static;
use littex_common::PoliteClient;
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use scraper::{Html, Selector};
use tracing::{debug, instrument, warn};

use super::{Candidate, Discovery, SourceError, SourceResult};
use crate::models::FailureReason;

pub const DEFAULT_IDCONV_BASE: &str = "https://www.ncbi.nlm.nih.gov/pmc/utils/idconv/v1.0/";
pub const DEFAULT_EUTILS_BASE: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";
pub const DEFAULT_PUBMED_BASE: &str = "https://pubmed.ncbi.nlm.nih.gov";
pub const DEFAULT_EUROPEPMC_BASE: &str = "https://europepmc.org";

lazy_static! {
    static ref PMCID_RE: Regex = Regex::new(r"(?i)\b(PMC\d{4,})\b").expect("PMCID regex");
}

pub struct PmcClient {
    client: PoliteClient,
    idconv_base: String,
    eutils_base: String,
    pubmed_base: String,
    europepmc_base: String,
}

/// A PubMed record page, fetched once and mined for several things.
#[derive(Debug, Clone)]
pub struct PubmedLanding {
    pub html: String,
    pub url: String,
}

impl PmcClient {
    pub fn new(client: PoliteClient) -> Self {
        Self {
            client,
            idconv_base: DEFAULT_IDCONV_BASE.to_string(),
            eutils_base: DEFAULT_EUTILS_BASE.to_string(),
            pubmed_base: DEFAULT_PUBMED_BASE.to_string(),
            europepmc_base: DEFAULT_EUROPEPMC_BASE.to_string(),
        }
    }

    /// Override every base URL at once, used by tests against a local server.
    pub fn with_base_urls(mut self, base: &str) -> Self {
        let base = base.trim_end_matches('/');
        self.idconv_base = format!("{base}/idconv/");
        self.eutils_base = format!("{base}/eutils");
        self.pubmed_base = base.to_string();
        self.europepmc_base = base.to_string();
        self
    }

    /// Direct PDF endpoint for a PMC accession.
    pub fn pdf_url_for_pmcid(&self, pmcid: &str) -> String {
        format!("{}/articles/{}?pdf=render", self.europepmc_base, pmcid.to_uppercase())
    }

    /// Landing page for a PMC accession, used as the download Referer.
    pub fn landing_url_for_pmcid(&self, pmcid: &str) -> String {
        format!("{}/articles/{}", self.europepmc_base, pmcid.to_uppercase())
    }

    /// DOI-chain fallback: DOI → PMCID via the ID-converter, then the
    /// direct render endpoint.
    #[instrument(skip(self))]
    pub async fn discover_by_doi(&self, doi: &str) -> SourceResult {
        let url = format!("{}?ids={}&format=json", self.idconv_base, doi);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SourceError::transport(&e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SourceError::status(status));
        }

        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| SourceError::new(FailureReason::NetworkError, e.to_string()))?;

        let pmcid = body["records"]
            .as_array()
            .and_then(|records| records.first())
            .and_then(|r| r["pmcid"].as_str())
            .map(str::to_string);

        match pmcid {
            Some(pmcid) => {
                debug!(doi, pmcid = %pmcid, "ID-converter resolved a PMC accession");
                Ok(Discovery::Found(self.discover_by_pmcid(&pmcid)))
            }
            None => Ok(Discovery::NotFound),
        }
    }

    /// PMC-identifier entry point: no discovery needed, the endpoint is
    /// constructable from the accession alone.
    pub fn discover_by_pmcid(&self, pmcid: &str) -> Candidate {
        Candidate::with_landing(
            self.pdf_url_for_pmcid(pmcid),
            self.landing_url_for_pmcid(pmcid),
        )
    }

    /// Fetch the PubMed record page for a PMID. The page is mined for the
    /// DOI, a PMC link and citation metadata by the pipeline; one fetch
    /// serves all three.
    #[instrument(skip(self))]
    pub async fn fetch_pubmed_landing(&self, pmid: &str) -> Result<PubmedLanding, SourceError> {
        let url = format!("{}/{}/", self.pubmed_base, pmid);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SourceError::transport(&e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SourceError::status(status));
        }

        let final_url = resp.url().to_string();
        let html = resp
            .text()
            .await
            .map_err(|e| SourceError::new(FailureReason::NetworkError, e.to_string()))?;

        Ok(PubmedLanding { html, url: final_url })
    }

    /// Recover a DOI for a PMID via the E-utilities efetch XML record,
    /// used when the landing page exposes no citation_doi meta tag.
    #[instrument(skip(self))]
    pub async fn doi_via_efetch(&self, pmid: &str) -> Result<Option<String>, SourceError> {
        let url = format!(
            "{}/efetch.fcgi?db=pubmed&id={}&rettype=abstract&retmode=xml",
            self.eutils_base, pmid
        );
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SourceError::transport(&e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SourceError::status(status));
        }

        let xml = resp
            .text()
            .await
            .map_err(|e| SourceError::new(FailureReason::NetworkError, e.to_string()))?;

        Ok(parse_doi_from_pubmed_xml(&xml))
    }
}

/// Extract the DOI from a PubMed efetch record.
/// Looks at <ArticleId IdType="doi"> and <ELocationID EIdType="doi">.
pub fn parse_doi_from_pubmed_xml(xml: &str) -> Option<String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut in_doi_element = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let is_doi = match e.name().as_ref() {
                    b"ArticleId" => attr_equals(e, b"IdType", "doi"),
                    b"ELocationID" => attr_equals(e, b"EIdType", "doi"),
                    _ => false,
                };
                in_doi_element = is_doi;
            }
            Ok(Event::Text(ref e)) if in_doi_element => {
                let text = e.unescape().unwrap_or_default().trim().to_string();
                if !text.is_empty() {
                    return Some(text);
                }
            }
            Ok(Event::End(_)) => in_doi_element = false,
            Ok(Event::Eof) => break,
            Err(e) => {
                warn!("PubMed XML parse error: {}", e);
                break;
            }
            _ => {}
        }
        buf.clear();
    }
    None
}

fn attr_equals(e: &quick_xml::events::BytesStart<'_>, name: &[u8], value: &str) -> bool {
    e.attributes()
        .flatten()
        .any(|a| a.key.as_ref() == name && a.unescape_value().is_ok_and(|v| v == value))
}

/// DOI from a PubMed landing page's citation_doi meta tag.
pub fn extract_doi_from_landing(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(r#"meta[name="citation_doi"]"#).expect("meta selector");
    document
        .select(&selector)
        .filter_map(|el| el.value().attr("content"))
        .map(|s| s.trim().trim_start_matches("doi:").trim().to_string())
        .find(|s| !s.is_empty())
}

/// First PMC accession mentioned anywhere in a page.
pub fn extract_pmcid(text: &str) -> Option<String> {
    PMCID_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_ascii_uppercase())
}
