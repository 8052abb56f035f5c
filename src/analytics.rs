// ===============================
// src/analytics.rs
// ===============================
//
// Orders analytics (nm-report detail): order counts per product for a period
// and the period before it. POST, paginated with `isNextPage`.
//
use std::time::Duration;

use ahash::AHashMap as HashMap;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use url::Url;

use crate::error::{snippet, ReportError, Result};
use crate::ledger_client::{
    send_with_cooldown, Cooldown, FetchGuard, Request, RetryPolicy, Transport,
};

pub const DEFAULT_ANALYTICS_ENDPOINT: &str =
    "https://seller-analytics-api.wildberries.ru/api/v2/nm-report/detail";
pub const DEFAULT_MAX_PAGES: u32 = 50;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NmReportQuery<'a> {
    timezone: &'a str,
    period: Period<'a>,
    order_by: OrderBy<'a>,
    page: u32,
}

#[derive(Debug, Serialize)]
struct Period<'a> {
    begin: &'a str,
    end: &'a str,
}

#[derive(Debug, Serialize)]
struct OrderBy<'a> {
    field: &'a str,
    mode: &'a str,
}

#[derive(Debug, Deserialize)]
struct NmReportResponse {
    data: NmReportData,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct NmReportData {
    is_next_page: bool,
    cards: Vec<Card>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Card {
    #[serde(rename = "nmID")]
    pub nm_id: i64,
    #[serde(rename = "vendorCode")]
    pub vendor_code: String,
    pub statistics: Statistics,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Statistics {
    pub selected_period: PeriodStats,
    pub previous_period: PeriodStats,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PeriodStats {
    pub orders_count: i64,
    pub orders_sum_rub: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartData {
    #[serde(rename = "nmID")]
    pub nm_id: i64,
    pub vendor_code: String,
    pub orders_count: i64,
    pub orders_sum_rub: i64,
    pub prev_orders_count: i64,
    pub prev_orders_sum_rub: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrdersSummary {
    pub chart_data: Vec<ChartData>,
    pub total_orders: i64,
    pub total_prev_orders: i64,
}

/// Merge cards by product id (first-seen order) and drop products without orders in either period.
pub fn summarize(cards: Vec<Card>) -> OrdersSummary {
    let mut index: HashMap<i64, usize> = HashMap::new();
    let mut merged: Vec<ChartData> = Vec::new();
    let mut summary = OrdersSummary::default();

    for card in cards {
        let cur = card.statistics.selected_period;
        let prev = card.statistics.previous_period;
        summary.total_orders += cur.orders_count;
        summary.total_prev_orders += prev.orders_count;

        match index.get(&card.nm_id) {
            Some(&i) => {
                let row = &mut merged[i];
                row.orders_count += cur.orders_count;
                row.orders_sum_rub += cur.orders_sum_rub;
                row.prev_orders_count += prev.orders_count;
                row.prev_orders_sum_rub += prev.orders_sum_rub;
            }
            None => {
                index.insert(card.nm_id, merged.len());
                merged.push(ChartData {
                    nm_id: card.nm_id,
                    vendor_code: card.vendor_code,
                    orders_count: cur.orders_count,
                    orders_sum_rub: cur.orders_sum_rub,
                    prev_orders_count: prev.orders_count,
                    prev_orders_sum_rub: prev.orders_sum_rub,
                });
            }
        }
    }

    summary.chart_data = merged
        .into_iter()
        .filter(|c| c.orders_count > 0 || c.prev_orders_count > 0)
        .collect();
    summary
}

pub struct OrdersAnalytics<T, C> {
    transport: T,
    cooldown: C,
    endpoint: Url,
    retry: RetryPolicy,
    deadline: Option<Duration>,
    max_pages: u32,
}

impl<T: Transport, C: Cooldown> OrdersAnalytics<T, C> {
    pub fn new(transport: T, cooldown: C, endpoint: Url, retry: RetryPolicy) -> Self {
        Self {
            transport,
            cooldown,
            endpoint,
            retry,
            deadline: None,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// `begin` / `end` are passed through as-is (e.g. `2024-01-01 00:00:00`).
    pub async fn fetch(&self, credential: &str, begin: &str, end: &str) -> Result<OrdersSummary> {
        if begin.trim().is_empty() || end.trim().is_empty() {
            return Err(ReportError::InvalidParameter("begin/end must be set".into()));
        }
        let guard = FetchGuard::new(self.deadline, None);
        let mut cards = Vec::new();
        let mut page = 1u32;

        loop {
            let query = NmReportQuery {
                timezone: "Europe/Moscow",
                period: Period { begin, end },
                order_by: OrderBy { field: "orders", mode: "desc" },
                page,
            };
            let body = serde_json::to_value(&query)
                .map_err(|e| ReportError::InvalidParameter(format!("encode query: {e}")))?;
            let req = Request::PostJson(self.endpoint.clone(), body);
            let reply = send_with_cooldown(
                &self.transport,
                &self.cooldown,
                &guard,
                &self.retry,
                &req,
                credential,
            )
            .await?;

            let parsed: NmReportResponse = serde_json::from_str(&reply.body).map_err(|e| {
                ReportError::MalformedResponse(format!("{e}; body: {}", snippet(&reply.body)))
            })?;
            info!(page, cards = parsed.data.cards.len(), "nm-report page received");
            cards.extend(parsed.data.cards);

            if !parsed.data.is_next_page {
                break;
            }
            if page >= self.max_pages {
                warn!(page, "nm-report page cap reached, stopping");
                break;
            }
            page += 1;
        }

        Ok(summarize(cards))
    }
}
