// ===============================
// src/pipeline.rs
// ===============================
//
// request -> fetch -> classify -> aggregate -> render
// Sequential, one request owns its entries and rollup. Any error aborts the
// whole run: there is no partial artifact.
//
use tracing::info;

use crate::aggregator::aggregate;
use crate::classifier::classify_all;
use crate::domain::{ReportJob, ReportRequest, StatementRollup};
use crate::error::Result;
use crate::ledger_client::{Cooldown, LedgerClient, Transport};
use crate::workbook::{render, REPORT_FILENAME};

#[derive(Debug, Clone)]
pub struct ReportArtifact {
    pub filename: &'static str,
    pub bytes: Vec<u8>,
    pub rollup: StatementRollup,
    pub entries: usize,
}

pub async fn generate_report<T: Transport, C: Cooldown>(
    client: &LedgerClient<T, C>,
    request: &ReportRequest,
) -> Result<ReportArtifact> {
    let job = request.validate()?;
    run_job(client, &job).await
}

pub async fn run_job<T: Transport, C: Cooldown>(
    client: &LedgerClient<T, C>,
    job: &ReportJob,
) -> Result<ReportArtifact> {
    job.params.validate()?;

    let entries = client.fetch(&job.api_key, job.date_from, job.date_to).await?;
    let classified = classify_all(entries);
    let rollup = aggregate(&classified, &job.params)?;
    let bytes = render(&classified, &rollup)?;

    info!(
        entries = classified.len(),
        net_profit = rollup.net_profit,
        tax_rate = job.params.tax_rate,
        discount_rate = job.params.discount_rate,
        bytes = bytes.len(),
        "report generated"
    );

    Ok(ReportArtifact { filename: REPORT_FILENAME, bytes, rollup, entries: classified.len() })
}
