//! littex — Full-text PDF acquisition for systematic review corpora.
//! Entry point for the CLI binary.

mod config;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use littex_common::{HttpSettings, PoliteClient};
use littex_retrieval::identify::{IdKind, Identifier};
use littex_retrieval::log::AcquisitionLog;
use littex_retrieval::pipeline::{revalidate_log, PipelineConfig, RetrievalPipeline};
use littex_retrieval::sources::doi_scrape::DoiScrapeClient;
use littex_retrieval::sources::elsevier::ElsevierClient;
use littex_retrieval::sources::pmc::PmcClient;
use littex_retrieval::sources::unpaywall::UnpaywallClient;
use littex_retrieval::validate::{LopdfProbe, StructuralProbe};

#[derive(Parser)]
#[command(name = "littex", version, about = "Retrieve full-text PDFs for DOI/PMID/PMC records")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch PDFs for an identifier list (text file or CSV, one record per line)
    Fetch {
        /// Identifier list; for CSV the first column is used
        input: PathBuf,
    },
    /// Re-inspect downloaded files with the lenient threshold and correct
    /// the log in place
    Revalidate,
    /// Render the Markdown acquisition report from the log
    Report {
        /// Write to this file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("littex=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = match config::Config::load() {
        Ok(c) => c,
        Err(e) => {
            warn!("Could not load littex.toml: {e}");
            return Err(e);
        }
    };

    match cli.command {
        Commands::Fetch { input } => fetch(&config, &input).await,
        Commands::Revalidate => revalidate(&config),
        Commands::Report { out } => report(&config, out.as_deref()),
    }
}

async fn fetch(config: &config::Config, input: &Path) -> anyhow::Result<()> {
    let identifiers = read_identifiers(input)
        .with_context(|| format!("reading identifier list {}", input.display()))?;
    info!(n = identifiers.len(), "identifier list loaded");

    let unknown = identifiers.iter().filter(|i| i.kind == IdKind::Unknown).count();
    if unknown > 0 {
        warn!(unknown, "some identifiers could not be classified and will not be retrieved");
    }

    let pipeline = build_pipeline(config)?;
    let mut log = AcquisitionLog::create(Path::new(&config.output.log));

    let summary = pipeline.run(&identifiers, &mut log).await;
    log.persist()?;

    info!(
        "done: {} acquired, {} skipped, {} failed of {}",
        summary.acquired, summary.skipped, summary.failed, summary.total
    );
    Ok(())
}

fn revalidate(config: &config::Config) -> anyhow::Result<()> {
    let mut log = AcquisitionLog::open(Path::new(&config.output.log))?;
    if log.is_empty() {
        warn!("log {} has no rows to revalidate", config.output.log);
        return Ok(());
    }

    let probe = LopdfProbe;
    let summary = revalidate_log(
        &mut log,
        config.validation.lenient_min_kb * 1024,
        config
            .validation
            .structural_probe
            .then_some(&probe as &dyn StructuralProbe),
    );
    log.persist()?;

    info!("revalidated {} files, {} invalidated", summary.checked, summary.invalidated);
    Ok(())
}

fn report(config: &config::Config, out: Option<&Path>) -> anyhow::Result<()> {
    let rows = littex_report::load_rows(Path::new(&config.output.log))?;
    let markdown = littex_report::render_markdown(&rows)?;

    match out {
        Some(path) => {
            std::fs::write(path, markdown)?;
            info!(path = %path.display(), "report written");
        }
        None => print!("{markdown}"),
    }
    Ok(())
}

fn build_pipeline(config: &config::Config) -> anyhow::Result<RetrievalPipeline> {
    let client = PoliteClient::new(&HttpSettings {
        contact_email: config.contact.email.clone(),
        timeout: config.network.timeout(),
        proxy: config.network.proxy.clone(),
    })?;

    Ok(RetrievalPipeline::new(
        client.clone(),
        UnpaywallClient::new(
            client.clone(),
            &config.contact.email,
            config.sources.unpaywall_max_attempts,
        ),
        PmcClient::new(client.clone()),
        ElsevierClient::new(
            config.sources.elsevier_api_key.clone(),
            config.sources.elsevier_inst_token.clone(),
        ),
        DoiScrapeClient::new(client),
        PipelineConfig {
            output_dir: PathBuf::from(&config.output.dir),
            delay: config.network.delay(),
            strict_min_bytes: config.validation.strict_min_kb * 1024,
            lenient_min_bytes: config.validation.lenient_min_kb * 1024,
        },
    ))
}

/// Read the upstream identifier list: one record per line, first CSV
/// column when commas are present, '#' lines ignored. A header row named
/// "id"/"identifier"/"doi" is skipped.
fn read_identifiers(path: &Path) -> anyhow::Result<Vec<Identifier>> {
    let content = std::fs::read_to_string(path)?;

    let mut identifiers = Vec::new();
    for (i, line) in content.lines().enumerate() {
        let field = line.split(',').next().unwrap_or("").trim().trim_matches('"');
        if field.is_empty() || field.starts_with('#') {
            continue;
        }
        if i == 0 && matches!(field.to_ascii_lowercase().as_str(), "id" | "identifier" | "doi") {
            continue;
        }
        identifiers.push(Identifier::new(field));
    }
    Ok(identifiers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_read_identifiers_plain_list() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ids.txt");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "10.1038/nature12373").unwrap();
        writeln!(f, "").unwrap();
        writeln!(f, "# a comment").unwrap();
        writeln!(f, "PMC5176308").unwrap();
        writeln!(f, "30670877").unwrap();

        let ids = read_identifiers(&path).unwrap();
        assert_eq!(ids.len(), 3);
        assert_eq!(ids[0].kind, IdKind::Doi);
        assert_eq!(ids[1].kind, IdKind::Pmc);
        assert_eq!(ids[2].kind, IdKind::Pmid);
    }

    #[test]
    fn test_read_identifiers_csv_with_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ids.csv");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "id,title").unwrap();
        writeln!(f, "10.1038/nature12373,Some paper").unwrap();
        writeln!(f, "\"30670877\",Another paper").unwrap();

        let ids = read_identifiers(&path).unwrap();
        assert_eq!(ids.len(), 2);
        assert_eq!(ids[0].raw, "10.1038/nature12373");
        assert_eq!(ids[1].raw, "30670877");
    }
}
