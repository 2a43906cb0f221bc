//! Elsevier text-and-data-mining API.
//!
//! Key-gated article endpoint:
//!   https://api.elsevier.com/content/article/doi/{doi}?httpAccept=application/pdf
//!
//! Only consulted when an API key is configured AND the DOI prefix belongs
//! to Elsevier; for any other DOI the strategy is a silent no-op rather
//! than a failed attempt, so non-Elsevier records never pay for it.

use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use super::{Candidate, Discovery};

pub const DEFAULT_ELSEVIER_BASE: &str = "https://api.elsevier.com/content/article/doi";

/// DOI prefixes registered to Elsevier imprints.
const ELSEVIER_PREFIXES: &[&str] = &[
    "10.1016/", "10.1006/", "10.1053/", "10.1067/", "10.1078/", "10.3182/",
];

pub struct ElsevierClient {
    base_url: String,
    api_key: Option<SecretString>,
    inst_token: Option<SecretString>,
}

impl ElsevierClient {
    pub fn new(api_key: Option<SecretString>, inst_token: Option<SecretString>) -> Self {
        Self {
            base_url: DEFAULT_ELSEVIER_BASE.to_string(),
            api_key,
            inst_token,
        }
    }

    pub fn with_base_url(mut self, base: &str) -> Self {
        self.base_url = base.trim_end_matches('/').to_string();
        self
    }

    /// Whether the strategy applies at all to this DOI.
    pub fn applies_to(&self, doi: &str) -> bool {
        self.api_key.is_some() && is_elsevier_doi(doi)
    }

    /// Construct the TDM download URL. Purely local: the one network
    /// request this strategy costs is the download itself.
    pub fn discover(&self, doi: &str) -> Discovery {
        let Some(ref key) = self.api_key else {
            return Discovery::NotFound;
        };
        if !is_elsevier_doi(doi) {
            return Discovery::NotFound;
        }

        let mut url = format!(
            "{}/{}?apiKey={}&httpAccept=application%2Fpdf",
            self.base_url,
            doi,
            key.expose_secret()
        );
        if let Some(ref token) = self.inst_token {
            url.push_str("&insttoken=");
            url.push_str(token.expose_secret());
        }

        debug!(doi, "Elsevier TDM endpoint constructed");
        Discovery::Found(Candidate::new(url))
    }
}

pub fn is_elsevier_doi(doi: &str) -> bool {
    ELSEVIER_PREFIXES.iter().any(|p| doi.starts_with(p))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keyed() -> ElsevierClient {
        ElsevierClient::new(Some(SecretString::from("test-key")), None)
    }

    #[test]
    fn test_prefix_membership() {
        assert!(is_elsevier_doi("10.1016/j.cell.2020.01.001"));
        assert!(is_elsevier_doi("10.1053/j.gastro.2019.08.001"));
        assert!(!is_elsevier_doi("10.1038/nature12373"));
        assert!(!is_elsevier_doi("10.10160/spoofed"));
    }

    #[test]
    fn test_no_key_is_silent_noop() {
        let client = ElsevierClient::new(None, None);
        assert!(!client.applies_to("10.1016/j.cell.2020.01.001"));
        assert_eq!(client.discover("10.1016/j.cell.2020.01.001"), Discovery::NotFound);
    }

    #[test]
    fn test_non_elsevier_doi_is_silent_noop() {
        let client = keyed();
        assert!(!client.applies_to("10.1038/nature12373"));
        assert_eq!(client.discover("10.1038/nature12373"), Discovery::NotFound);
    }

    #[test]
    fn test_keyed_elsevier_doi_yields_tdm_url() {
        let client = keyed();
        match client.discover("10.1016/j.cell.2020.01.001") {
            Discovery::Found(c) => {
                assert!(c.url.starts_with(
                    "https://api.elsevier.com/content/article/doi/10.1016/j.cell.2020.01.001"
                ));
                assert!(c.url.contains("apiKey=test-key"));
                assert!(c.url.contains("httpAccept=application%2Fpdf"));
                assert!(c.landing_url.is_none());
            }
            other => panic!("expected Found, got {other:?}"),
        }
    }

    #[test]
    fn test_inst_token_appended() {
        let client =
            ElsevierClient::new(Some(SecretString::from("k")), Some(SecretString::from("tok")));
        match client.discover("10.1016/j.cell.2020.01.001") {
            Discovery::Found(c) => assert!(c.url.contains("insttoken=tok")),
            other => panic!("expected Found, got {other:?}"),
        }
    }
}
