//! Live retrieval tests against the real services.
//!
//! Run with: cargo test --package littex-retrieval --test test_live_retrieval -- --ignored --nocapture

use std::time::Duration;

use littex_common::{HttpSettings, PoliteClient};
use littex_retrieval::identify::Identifier;
use littex_retrieval::log::AcquisitionLog;
use littex_retrieval::pipeline::{PipelineConfig, RetrievalPipeline};
use littex_retrieval::sources::doi_scrape::DoiScrapeClient;
use littex_retrieval::sources::elsevier::ElsevierClient;
use littex_retrieval::sources::pmc::PmcClient;
use littex_retrieval::sources::unpaywall::UnpaywallClient;
use littex_retrieval::sources::Discovery;

fn live_client() -> PoliteClient {
    PoliteClient::new(&HttpSettings {
        contact_email: "littex-tests@example.org".to_string(),
        timeout: Duration::from_secs(30),
        proxy: None,
    })
    .expect("client build failed")
}

#[tokio::test]
#[ignore] // Requires network access
async fn test_unpaywall_finds_open_access_pdf() {
    let client = UnpaywallClient::new(live_client(), "littex-tests@example.org", 3);

    // A well-known open-access paper.
    let discovery = client
        .discover("10.1371/journal.pone.0266781")
        .await
        .expect("Unpaywall lookup failed");

    match discovery {
        Discovery::Found(candidate) => {
            println!("PDF URL: {}", candidate.url);
            assert!(candidate.url.starts_with("http"));
        }
        Discovery::NotFound => panic!("expected an OA location"),
    }
}

#[tokio::test]
#[ignore] // Requires network access
async fn test_full_pipeline_acquires_open_access_doi() {
    let dir = tempfile::TempDir::new().unwrap();
    let client = live_client();

    let pipeline = RetrievalPipeline::new(
        client.clone(),
        UnpaywallClient::new(client.clone(), "littex-tests@example.org", 3),
        PmcClient::new(client.clone()),
        ElsevierClient::new(None, None),
        DoiScrapeClient::new(client),
        PipelineConfig {
            output_dir: dir.path().to_path_buf(),
            delay: Duration::from_secs(1),
            ..Default::default()
        },
    );

    let ids = vec![Identifier::new("10.1371/journal.pone.0266781")];
    let mut log = AcquisitionLog::create(&dir.path().join("log.csv"));
    let summary = pipeline.run(&ids, &mut log).await;

    println!("summary: {summary:?}");
    for row in log.rows() {
        println!("{} -> {} ({})", row.id, row.method, row.status);
    }
    assert_eq!(log.len(), 1);
    assert_eq!(summary.acquired, 1, "open-access paper should be retrievable");
}
