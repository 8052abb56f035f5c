// ===============================
// src/main.rs
// ===============================
/*
 cd /home/kukuhtw/rust/ledger_report

 # statement untuk Januari (cursor pagination, default)
 LEDGER_API_KEY=... cargo run --release -- report --date-from 2024-01-01 --date-to 2024-01-31

 # date-window pagination + pacing 25s antar window + dump metrics
 cargo run --release -- report --date-from 2024-01-01 --date-to 2024-03-31 \
     --fetch-policy date-window --window-pacing-secs 25 --metrics-file metrics.prom
*/
/*
=============================================================================
Project : ledger_report — seller ledger ingestion & P&L workbook in Rust
Module  : main.rs
Version : 0.1.0
Author  : Kukuh Tripamungkas Wicaksono (Kukuh TW)
Email   : kukuhtw@gmail.com
WhatsApp: https://wa.me/628129893706
LinkedIn: https://id.linkedin.com/in/kukuhtw
License : MIT (see LICENSE)

Summary : Fetches the seller realization ledger (cursor or date-window
          pagination, 429 cooldown), classifies every line, folds a P&L
          rollup and writes a two-sheet xlsx statement.

(c) 2025 Kukuh TW. All rights reserved where applicable.
=============================================================================
*/
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use ledger_report::analytics::OrdersAnalytics;
use ledger_report::config::{self, Command, OrdersArgs, ReportArgs};
use ledger_report::error::{ReportError, Result};
use ledger_report::ledger_client::{LedgerClient, ReqwestTransport, TokioCooldown};
use ledger_report::{generate_report, metrics};

#[tokio::main]
async fn main() {
    // ---- Logging ----
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // ---- Load config ----
    let cli = config::load();

    // ---- Metrics ----
    metrics::init();

    let (res, metrics_file) = match cli.command {
        Command::Report(args) => (run_report(&args).await, args.http.metrics_file.clone()),
        Command::Orders(args) => (run_orders(&args).await, args.http.metrics_file.clone()),
    };

    if let Some(path) = metrics_file {
        if let Err(e) = tokio::fs::write(&path, metrics::encode_text()).await {
            warn!(?e, path = %path.display(), "metrics dump failed");
        }
    }

    if let Err(e) = res {
        error!(kind = e.kind().as_str(), error = %e, "run failed");
        std::process::exit(e.kind().exit_code());
    }
}

async fn run_report(args: &ReportArgs) -> Result<()> {
    let cfg = args.client_config()?;
    info!(
        policy = cfg.policy.name(),
        endpoint = %cfg.endpoint,
        date_from = %args.date_from,
        date_to = %args.date_to,
        "startup config"
    );

    // Ctrl-C -> fetch loop unwinds as Timeout, no artifact written
    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling fetch");
            let _ = cancel_tx.send(true);
        }
    });

    let transport = ReqwestTransport::new(args.http.request_timeout())?;
    let client = LedgerClient::new(transport, cfg).with_cancel(cancel_rx);

    let artifact = generate_report(&client, &args.request()).await?;
    tokio::fs::write(&args.output, &artifact.bytes)
        .await
        .map_err(|e| ReportError::Render(format!("write {}: {e}", args.output.display())))?;

    info!(
        file = %args.output.display(),
        entries = artifact.entries,
        net_profit = artifact.rollup.net_profit,
        "statement written"
    );
    Ok(())
}

async fn run_orders(args: &OrdersArgs) -> Result<()> {
    let transport = ReqwestTransport::new(args.http.request_timeout())?;
    let analytics =
        OrdersAnalytics::new(transport, TokioCooldown, args.endpoint()?, args.http.retry())
            .with_deadline(args.http.deadline());

    let summary = analytics.fetch(&args.api_key, &args.begin, &args.end).await?;
    let json = serde_json::to_vec_pretty(&summary)
        .map_err(|e| ReportError::Render(format!("encode orders summary: {e}")))?;

    match &args.output {
        Some(path) => {
            tokio::fs::write(path, &json)
                .await
                .map_err(|e| ReportError::Render(format!("write {}: {e}", path.display())))?;
            info!(
                file = %path.display(),
                products = summary.chart_data.len(),
                "orders summary written"
            );
        }
        None => println!("{}", String::from_utf8_lossy(&json)),
    }
    Ok(())
}
