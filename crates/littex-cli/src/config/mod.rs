//! Configuration loading for littex.
//! Reads littex.toml from the current directory or path in LITTEX_CONFIG env var.

use std::path::Path;
use std::time::Duration;

use secrecy::SecretString;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    pub contact: ContactConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub validation: ValidationConfig,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ContactConfig {
    /// Required by the Unpaywall API terms and used in the User-Agent.
    pub email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    pub proxy: Option<String>,
}

fn default_timeout_secs() -> u64 { 30 }
fn default_delay_ms()     -> u64 { 1000 }

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            delay_ms: default_delay_ms(),
            proxy: None,
        }
    }
}

impl NetworkConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourcesConfig {
    #[serde(default = "default_unpaywall_attempts")]
    pub unpaywall_max_attempts: u32,
    pub elsevier_api_key: Option<SecretString>,
    pub elsevier_inst_token: Option<SecretString>,
}

fn default_unpaywall_attempts() -> u32 { 3 }

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            unpaywall_max_attempts: default_unpaywall_attempts(),
            elsevier_api_key: None,
            elsevier_inst_token: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: String,
    #[serde(default = "default_log_path")]
    pub log: String,
}

fn default_output_dir() -> String { "pdfs".to_string() }
fn default_log_path()   -> String { "acquisition_log.csv".to_string() }

impl Default for OutputConfig {
    fn default() -> Self {
        Self { dir: default_output_dir(), log: default_log_path() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ValidationConfig {
    #[serde(default = "default_strict_min_kb")]
    pub strict_min_kb: u64,
    #[serde(default = "default_lenient_min_kb")]
    pub lenient_min_kb: u64,
    /// Run the lopdf structural probe during revalidation.
    #[serde(default)]
    pub structural_probe: bool,
}

fn default_strict_min_kb()  -> u64 { 10 }
fn default_lenient_min_kb() -> u64 { 1 }

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            strict_min_kb: default_strict_min_kb(),
            lenient_min_kb: default_lenient_min_kb(),
            structural_probe: false,
        }
    }
}

mod tests;

impl Config {
    /// Load configuration from littex.toml.
    /// Checks LITTEX_CONFIG env var first, then current directory.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("LITTEX_CONFIG").unwrap_or_else(|_| "littex.toml".to_string());

        if !Path::new(&path).exists() {
            anyhow::bail!(
                "Config file not found: {}\n\
                 Copy littex.example.toml to littex.toml and edit it.",
                path
            );
        }

        let content = std::fs::read_to_string(&path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        if config.contact.email.trim().is_empty() {
            anyhow::bail!("contact.email must be set; the lookup APIs require it");
        }
        Ok(config)
    }
}
