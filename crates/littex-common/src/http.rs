//! Shared HTTP client for all retrieval strategies.
//!
//! One client is built per run and handed to every strategy. It owns the
//! per-request timeout, the contact-email User-Agent required by the
//! bibliographic APIs' terms of use, and the optional institutional proxy.

use std::time::Duration;

use reqwest::header::REFERER;
use reqwest::{Client, ClientBuilder};

use crate::error::{LittexError, Result};

/// Network settings consumed from configuration.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    /// Contact email, embedded in the User-Agent (API etiquette).
    pub contact_email: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Optional HTTP(S) proxy URL.
    pub proxy: Option<String>,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            contact_email: "anonymous@example.org".to_string(),
            timeout: Duration::from_secs(30),
            proxy: None,
        }
    }
}

/// HTTP client wrapper shared by every strategy in a run.
#[derive(Debug, Clone)]
pub struct PoliteClient {
    client: Client,
}

impl PoliteClient {
    pub fn new(settings: &HttpSettings) -> Result<Self> {
        let user_agent = format!(
            "littex/{} (mailto:{})",
            env!("CARGO_PKG_VERSION"),
            settings.contact_email
        );

        let mut builder = ClientBuilder::new()
            .timeout(settings.timeout)
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::limited(10));

        if let Some(ref proxy) = settings.proxy {
            builder = builder.proxy(
                reqwest::Proxy::all(proxy)
                    .map_err(|e| LittexError::Config(format!("invalid proxy URL: {e}")))?,
            );
        }

        Ok(Self {
            client: builder.build()?,
        })
    }

    /// GET request builder.
    pub fn get(&self, url: &str) -> reqwest::RequestBuilder {
        self.client.get(url)
    }

    /// GET with a Referer header. Several publishers reject PDF requests
    /// that do not arrive "from" their own landing page.
    pub fn get_with_referer(&self, url: &str, referer: Option<&str>) -> reqwest::RequestBuilder {
        let mut req = self.client.get(url);
        if let Some(referer) = referer {
            req = req.header(REFERER, referer);
        }
        req
    }
}
