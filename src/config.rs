// ===============================
// src/config.rs
// ===============================
/*
=============================================================================
Project : ledger_report — seller ledger ingestion & P&L workbook in Rust
Module  : config.rs
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
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use dotenvy::dotenv;
use url::Url;

use crate::analytics::DEFAULT_ANALYTICS_ENDPOINT;
use crate::domain::ReportRequest;
use crate::error::ReportError;
use crate::ledger_client::{
    ClientConfig, FetchPolicy, RetryPolicy, DEFAULT_ENDPOINT, DEFAULT_PAGE_SIZE, MAX_WINDOW_DAYS,
};
use crate::workbook::REPORT_FILENAME;

/// Pagination policy for the ledger fetch
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum PolicyMode {
    Cursor,
    #[value(alias = "date_window")]
    DateWindow,
}

#[derive(Debug, Parser)]
#[command(name = "ledger_report", version, about = "Seller ledger -> P&L workbook")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch the ledger for a date range and write the xlsx statement
    Report(ReportArgs),
    /// Fetch order analytics (current vs previous period) as JSON
    Orders(OrdersArgs),
}

/// Shared HTTP / retry settings
#[derive(Debug, Clone, Args)]
pub struct HttpArgs {
    /// Wait after an HTTP 429 before retrying the same request
    #[arg(long, env = "RATE_LIMIT_COOLDOWN_SECS", default_value_t = 60)]
    pub rate_limit_cooldown_secs: u64,

    #[arg(long, env = "MAX_RATE_LIMIT_RETRIES", default_value_t = 10)]
    pub max_rate_limit_retries: u32,

    /// Per-request network timeout
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = 120)]
    pub request_timeout_secs: u64,

    /// Overall deadline for the whole fetch loop (unset = none)
    #[arg(long, env = "FETCH_DEADLINE_SECS")]
    pub fetch_deadline_secs: Option<u64>,

    /// Write prometheus text metrics here when the run ends
    #[arg(long, env = "METRICS_FILE")]
    pub metrics_file: Option<PathBuf>,
}

impl HttpArgs {
    pub fn retry(&self) -> RetryPolicy {
        RetryPolicy {
            cooldown: Duration::from_secs(self.rate_limit_cooldown_secs),
            max_rate_limit_retries: self.max_rate_limit_retries,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.fetch_deadline_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Args)]
pub struct ReportArgs {
    #[arg(long, env = "LEDGER_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// YYYY-MM-DD
    #[arg(long, env = "DATE_FROM")]
    pub date_from: String,

    /// YYYY-MM-DD (inclusive)
    #[arg(long, env = "DATE_TO")]
    pub date_to: String,

    /// 0 = default (0.06)
    #[arg(long, env = "TAX_RATE", default_value_t = 0.0)]
    pub tax_rate: f64,

    /// 0 = default (3.5)
    #[arg(long, env = "DISCOUNT_RATE", default_value_t = 0.0)]
    pub discount_rate: f64,

    #[arg(long, env = "FETCH_POLICY", value_enum, default_value_t = PolicyMode::Cursor)]
    pub fetch_policy: PolicyMode,

    #[arg(long, env = "PAGE_SIZE", default_value_t = DEFAULT_PAGE_SIZE)]
    pub page_size: u32,

    #[arg(long, env = "WINDOW_DAYS", default_value_t = MAX_WINDOW_DAYS)]
    pub window_days: u32,

    /// Pause between date windows (upstream allows ~1 request/min)
    #[arg(long, env = "WINDOW_PACING_SECS", default_value_t = 0)]
    pub window_pacing_secs: u64,

    #[arg(long, env = "STATISTICS_API_URL", default_value = DEFAULT_ENDPOINT)]
    pub statistics_api_url: String,

    #[arg(long, short, env = "OUTPUT", default_value = REPORT_FILENAME)]
    pub output: PathBuf,

    #[command(flatten)]
    pub http: HttpArgs,
}

impl ReportArgs {
    pub fn request(&self) -> ReportRequest {
        ReportRequest {
            api_key: self.api_key.clone(),
            date_from: self.date_from.clone(),
            date_to: self.date_to.clone(),
            tax_rate: Some(self.tax_rate),
            discount_rate: Some(self.discount_rate),
        }
    }

    pub fn policy(&self) -> FetchPolicy {
        match self.fetch_policy {
            PolicyMode::Cursor => FetchPolicy::Cursor { page_size: self.page_size.max(1) },
            PolicyMode::DateWindow => FetchPolicy::DateWindow {
                window_days: self.window_days.clamp(1, MAX_WINDOW_DAYS),
                pacing: Duration::from_secs(self.window_pacing_secs),
            },
        }
    }

    pub fn client_config(&self) -> Result<ClientConfig, ReportError> {
        Ok(ClientConfig {
            endpoint: parse_url("STATISTICS_API_URL", &self.statistics_api_url)?,
            policy: self.policy(),
            retry: self.http.retry(),
            deadline: self.http.deadline(),
        })
    }
}

#[derive(Debug, Clone, Args)]
pub struct OrdersArgs {
    #[arg(long, env = "LEDGER_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Period start, e.g. "2024-01-01 00:00:00"
    #[arg(long, env = "DATE_FROM")]
    pub begin: String,

    #[arg(long, env = "DATE_TO")]
    pub end: String,

    #[arg(long, env = "ANALYTICS_API_URL", default_value = DEFAULT_ANALYTICS_ENDPOINT)]
    pub analytics_api_url: String,

    /// JSON output file (stdout if unset)
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub http: HttpArgs,
}

impl OrdersArgs {
    pub fn endpoint(&self) -> Result<Url, ReportError> {
        parse_url("ANALYTICS_API_URL", &self.analytics_api_url)
    }
}

fn parse_url(key: &str, raw: &str) -> Result<Url, ReportError> {
    Url::parse(raw).map_err(|e| ReportError::InvalidParameter(format!("{key} {raw:?}: {e}")))
}

pub fn load() -> Cli {
    // Pastikan .env dibaca (agar LEDGER_API_KEY, DATE_FROM, dll ter-load)
    let _ = dotenv();
    Cli::parse()
}
