//! littex-report — Acquisition report generation.
//!
//! Downstream consumer of the acquisition log: derives the PRISMA-style
//! full-text counts a systematic review has to report (records sought,
//! not retrieved, excluded as invalid, acquired) plus a per-method
//! breakdown, and renders them as Markdown.

use chrono::Utc;
use littex_retrieval::log::LogRow;
use minijinja::{context, Environment};
use serde::Serialize;
use tracing::debug;

/// PRISMA-style full-text acquisition counts.
///
/// `sought` excludes cache skips: a skipped identifier was acquired by an
/// earlier run and must not inflate this run's numbers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PrismaCounts {
    pub total_rows: usize,
    pub skipped: usize,
    pub sought: usize,
    pub not_retrieved: usize,
    pub excluded_invalid: usize,
    pub acquired: usize,
}

/// Attempt/success tally for one retrieval method.
#[derive(Debug, Clone, Serialize)]
pub struct MethodStat {
    pub method: String,
    pub attempts: usize,
    pub successes: usize,
}

/// Load log rows from a persisted acquisition log CSV.
pub fn load_rows(path: &std::path::Path) -> anyhow::Result<Vec<LogRow>> {
    let mut reader = csv::Reader::from_path(path)?;
    let rows: Vec<LogRow> = reader.deserialize().collect::<Result<_, _>>()?;
    debug!(path = %path.display(), n = rows.len(), "log rows loaded");
    Ok(rows)
}

/// Derive the headline counts from a row set.
pub fn derive_counts(rows: &[LogRow]) -> PrismaCounts {
    let mut counts = PrismaCounts { total_rows: rows.len(), ..Default::default() };

    for row in rows {
        if row.method == "skipped" {
            counts.skipped += 1;
            continue;
        }
        counts.sought += 1;
        if !row.success {
            counts.not_retrieved += 1;
        }
        if row.pdf_valid == Some(false) {
            counts.excluded_invalid += 1;
        }
        if row.success && row.pdf_valid != Some(false) {
            counts.acquired += 1;
        }
    }
    counts
}

/// Per-method breakdown over the non-skipped rows, in first-seen order.
pub fn method_breakdown(rows: &[LogRow]) -> Vec<MethodStat> {
    let mut stats: Vec<MethodStat> = Vec::new();

    for row in rows {
        if row.method == "skipped" || row.method == "none" {
            continue;
        }
        let stat = match stats.iter_mut().find(|s| s.method == row.method) {
            Some(stat) => stat,
            None => {
                stats.push(MethodStat {
                    method: row.method.clone(),
                    attempts: 0,
                    successes: 0,
                });
                stats.last_mut().expect("just pushed")
            }
        };
        stat.attempts += 1;
        if row.success {
            stat.successes += 1;
        }
    }
    stats
}

const REPORT_TEMPLATE: &str = r#"# Full-text acquisition report

Generated: {{ generated_at }}

## Record flow

| Stage | Count |
|---|---|
| Log rows | {{ counts.total_rows }} |
| Already downloaded (skipped) | {{ counts.skipped }} |
| Reports sought | {{ counts.sought }} |
| Reports not retrieved | {{ counts.not_retrieved }} |
| Excluded: invalid file | {{ counts.excluded_invalid }} |
| Reports acquired | {{ counts.acquired }} |

## Retrieval methods

| Method | Attempts won | Downloads succeeded |
|---|---|---|
{%- for stat in methods %}
| {{ stat.method }} | {{ stat.attempts }} | {{ stat.successes }} |
{%- endfor %}

## Failures

| Identifier | Reason |
|---|---|
{%- for row in failures %}
| {{ row.id }} | {{ row.failure_reason }} |
{%- endfor %}
"#;

/// Render the Markdown report for a row set.
pub fn render_markdown(rows: &[LogRow]) -> anyhow::Result<String> {
    let counts = derive_counts(rows);
    let methods = method_breakdown(rows);

    #[derive(Serialize)]
    struct FailureRow<'a> {
        id: &'a str,
        failure_reason: &'a str,
    }
    let failures: Vec<FailureRow<'_>> = rows
        .iter()
        .filter(|r| !r.success)
        .map(|r| FailureRow {
            id: &r.id,
            failure_reason: r.failure_reason.as_deref().unwrap_or("unknown"),
        })
        .collect();

    let mut env = Environment::new();
    env.add_template("report", REPORT_TEMPLATE)?;
    let rendered = env.get_template("report")?.render(context! {
        generated_at => Utc::now().to_rfc3339(),
        counts => counts,
        methods => methods,
        failures => failures,
    })?;
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str, method: &str, success: bool, pdf_valid: Option<bool>) -> LogRow {
        LogRow {
            id: id.to_string(),
            id_type: "doi".to_string(),
            timestamp: "2026-01-01T00:00:00Z".to_string(),
            method: method.to_string(),
            status: if method == "skipped" { "exists".into() } else { "200".into() },
            success,
            failure_reason: if success { None } else { Some("no_pdf_found".to_string()) },
            pdf_url: None,
            file_path: None,
            file_size_kb: None,
            pdf_valid,
            pdf_invalid_reason: None,
        }
    }

    #[test]
    fn test_derive_counts() {
        let rows = vec![
            row("10.1/a", "unpaywall", true, Some(true)),
            row("10.1/b", "skipped", true, None),
            row("10.1/c", "none", false, None),
            row("10.1/d", "pmc_fallback", true, Some(false)),
            row("10.1/e", "pmc_fallback", true, None),
        ];
        let counts = derive_counts(&rows);
        assert_eq!(counts.total_rows, 5);
        assert_eq!(counts.skipped, 1);
        assert_eq!(counts.sought, 4);
        assert_eq!(counts.not_retrieved, 1);
        assert_eq!(counts.excluded_invalid, 1);
        // d is excluded (invalid), e counts: validity unknown is still
        // acquired until revalidation says otherwise
        assert_eq!(counts.acquired, 2);
    }

    #[test]
    fn test_method_breakdown_ignores_skips() {
        let rows = vec![
            row("10.1/a", "unpaywall", true, Some(true)),
            row("10.1/b", "unpaywall", false, None),
            row("10.1/c", "skipped", true, None),
            row("10.1/d", "journal_url_pattern", true, Some(true)),
        ];
        let stats = method_breakdown(&rows);
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].method, "unpaywall");
        assert_eq!(stats[0].attempts, 2);
        assert_eq!(stats[0].successes, 1);
        assert_eq!(stats[1].method, "journal_url_pattern");
    }

    #[test]
    fn test_render_markdown_contains_counts_and_failures() {
        let rows = vec![
            row("10.1/a", "unpaywall", true, Some(true)),
            row("10.1/b", "none", false, None),
        ];
        let md = render_markdown(&rows).unwrap();
        assert!(md.contains("# Full-text acquisition report"));
        assert!(md.contains("| Reports acquired | 1 |"));
        assert!(md.contains("| 10.1/b | no_pdf_found |"));
    }

    #[test]
    fn test_load_rows_roundtrip() {
        use std::io::Write;
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("log.csv");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(
            f,
            "id,id_type,timestamp,method,status,success,failure_reason,pdf_url,file_path,file_size_kb,pdf_valid,pdf_invalid_reason"
        )
        .unwrap();
        writeln!(
            f,
            "10.1038/nature12373,doi,2026-01-01T00:00:00Z,unpaywall,200,true,,https://x/y.pdf,out/a.pdf,120,true,"
        )
        .unwrap();

        let rows = load_rows(&path).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].method, "unpaywall");
        assert_eq!(rows[0].pdf_valid, Some(true));
    }
}
