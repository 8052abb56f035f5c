// ===============================
// src/ledger_client.rs
// ===============================
//
// Paginated fetch of the realization report (statistics API v5).
//
// - Two pagination policies behind one fetch loop (FetchPolicy):
//     * Cursor     : fixed page size, next page starts after last rrd_id,
//                    stops on a short/empty page (or HTTP 204).
//     * DateWindow : split [from, to] into <=7 day windows, one request each.
// - HTTP 429 -> wait the cooldown and retry the same request (bounded).
//   Everything else non-2xx is terminal. No partial result ever leaves fetch().
// - Optional overall deadline + cancel signal (watch<bool>) -> Timeout.
//
use std::future::Future;
use std::time::Duration;

use chrono::{Days, NaiveDate};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

use crate::domain::LedgerEntry;
use crate::error::{snippet, ReportError, Result};
use crate::metrics::{ENTRIES_FETCHED, FETCH_ERRORS, PAGES_FETCHED, RATE_LIMITED};

pub const DEFAULT_ENDPOINT: &str =
    "https://statistics-api.wildberries.ru/api/v5/supplier/reportDetailByPeriod";
pub const DEFAULT_PAGE_SIZE: u32 = 100_000;
pub const MAX_WINDOW_DAYS: u32 = 7;
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(60);
pub const DEFAULT_MAX_RATE_LIMIT_RETRIES: u32 = 10;

// ---------------------------------------------------------------------------
// Transport seam
// ---------------------------------------------------------------------------

/// Raw upstream reply; status handling lives in the client, not the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self { status, body: body.into() }
    }
}

#[derive(Debug, Clone)]
pub enum Request {
    Get(Url),
    PostJson(Url, serde_json::Value),
}

impl Request {
    pub fn url(&self) -> &Url {
        match self {
            Request::Get(u) | Request::PostJson(u, _) => u,
        }
    }
}

/// Sends one request with a bearer credential. Only network-level failures are errors.
pub trait Transport {
    fn send(
        &self,
        req: &Request,
        credential: &str,
    ) -> impl Future<Output = Result<HttpReply>> + Send;
}

/// Pooled reqwest client; cheap to clone and safe to share between requests.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(request_timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| ReportError::upstream(0, &format!("http client init: {e}")))?;
        Ok(Self { http })
    }

    pub fn from_client(http: reqwest::Client) -> Self {
        Self { http }
    }
}

impl Transport for ReqwestTransport {
    async fn send(&self, req: &Request, credential: &str) -> Result<HttpReply> {
        let builder = match req {
            Request::Get(url) => self
                .http
                .get(url.clone())
                .header("Content-Type", "application/json"),
            Request::PostJson(url, body) => self.http.post(url.clone()).json(body),
        };
        let rsp = builder
            .bearer_auth(credential)
            .send()
            .await
            .map_err(map_reqwest_err)?;
        let status = rsp.status().as_u16();
        let body = rsp.text().await.map_err(map_reqwest_err)?;
        Ok(HttpReply { status, body })
    }
}

fn map_reqwest_err(e: reqwest::Error) -> ReportError {
    if e.is_timeout() {
        ReportError::Timeout(format!("upstream request: {e}"))
    } else {
        ReportError::upstream(e.status().map(|s| s.as_u16()).unwrap_or(0), &e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Cooldown seam (rate-limit wait)
// ---------------------------------------------------------------------------

pub trait Cooldown {
    fn wait(&self, d: Duration) -> impl Future<Output = ()> + Send;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioCooldown;

impl Cooldown for TokioCooldown {
    async fn wait(&self, d: Duration) {
        tokio::time::sleep(d).await
    }
}

// ---------------------------------------------------------------------------
// Deadline / cancellation
// ---------------------------------------------------------------------------

/// Deadline plus optional cancel flag; every await in the fetch loop goes through it.
#[derive(Debug, Clone, Default)]
pub struct FetchGuard {
    deadline: Option<Instant>,
    cancel: Option<watch::Receiver<bool>>,
}

impl FetchGuard {
    pub fn new(deadline: Option<Duration>, cancel: Option<watch::Receiver<bool>>) -> Self {
        Self { deadline: deadline.map(|d| Instant::now() + d), cancel }
    }

    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output> {
        let mut cancel = self.cancel.clone();
        tokio::select! {
            out = fut => Ok(out),
            _ = sleep_until_opt(self.deadline) => {
                Err(ReportError::Timeout("fetch deadline exceeded".into()))
            }
            _ = cancelled(&mut cancel) => Err(ReportError::Timeout("fetch cancelled".into())),
        }
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

async fn cancelled(rx: &mut Option<watch::Receiver<bool>>) {
    if let Some(rx) = rx {
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                // sender gone without cancelling
                break;
            }
        }
    }
    std::future::pending::<()>().await
}

// ---------------------------------------------------------------------------
// Rate-limit aware send (shared with analytics)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub cooldown: Duration,
    pub max_rate_limit_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { cooldown: DEFAULT_COOLDOWN, max_rate_limit_retries: DEFAULT_MAX_RATE_LIMIT_RETRIES }
    }
}

/// Send until a non-429 reply; 2xx replies are returned, everything else is an error.
pub async fn send_with_cooldown<T: Transport, C: Cooldown>(
    transport: &T,
    cooldown: &C,
    guard: &FetchGuard,
    retry: &RetryPolicy,
    req: &Request,
    credential: &str,
) -> Result<HttpReply> {
    let mut rate_limited = 0u32;
    loop {
        let reply = guard.run(transport.send(req, credential)).await??;
        match reply.status {
            200..=299 => return Ok(reply),
            429 => {
                RATE_LIMITED.inc();
                rate_limited += 1;
                if rate_limited > retry.max_rate_limit_retries {
                    warn!(retries = rate_limited - 1, "rate limit retries exhausted");
                    return Err(ReportError::upstream(429, &reply.body));
                }
                warn!(
                    attempt = rate_limited,
                    cooldown_secs = retry.cooldown.as_secs(),
                    "rate limited (429), cooling down"
                );
                guard.run(cooldown.wait(retry.cooldown)).await?;
            }
            401 | 403 => {
                debug!(body = %snippet(&reply.body), "credential rejected");
                return Err(ReportError::Unauthorized { status: reply.status });
            }
            status => return Err(ReportError::upstream(status, &reply.body)),
        }
    }
}

// ---------------------------------------------------------------------------
// Pagination policies
// ---------------------------------------------------------------------------

/// Position of the fetch loop; only lives for one fetch().
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchCursor {
    Page { rrd_id: u64, limit: u32 },
    Window { from: NaiveDate, to: NaiveDate },
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchPolicy {
    Cursor { page_size: u32 },
    DateWindow { window_days: u32, pacing: Duration },
}

impl Default for FetchPolicy {
    fn default() -> Self {
        FetchPolicy::Cursor { page_size: DEFAULT_PAGE_SIZE }
    }
}

impl FetchPolicy {
    pub fn name(&self) -> &'static str {
        match self {
            FetchPolicy::Cursor { .. } => "cursor",
            FetchPolicy::DateWindow { .. } => "date_window",
        }
    }

    pub fn start(&self, from: NaiveDate, to: NaiveDate) -> Option<FetchCursor> {
        if from > to {
            return None;
        }
        match self {
            FetchPolicy::Cursor { page_size } => Some(FetchCursor::Page {
                rrd_id: 0,
                limit: (*page_size).max(1),
            }),
            FetchPolicy::DateWindow { window_days, .. } => Some(window_at(from, to, *window_days)),
        }
    }

    /// Next cursor after `page` was received for `cur`; `None` ends the loop.
    pub fn advance(
        &self,
        cur: &FetchCursor,
        page: &[LedgerEntry],
        to: NaiveDate,
    ) -> Result<Option<FetchCursor>> {
        match cur {
            FetchCursor::Page { rrd_id, limit } => {
                if page.len() < *limit as usize {
                    return Ok(None);
                }
                let last = page.last().map(|e| e.rrd_id).unwrap_or(0);
                if last <= *rrd_id {
                    return Err(ReportError::MalformedResponse(format!(
                        "cursor did not advance (rrd_id {rrd_id} -> {last})"
                    )));
                }
                Ok(Some(FetchCursor::Page { rrd_id: last, limit: *limit }))
            }
            FetchCursor::Window { to: window_to, .. } => {
                let window_days = match self {
                    FetchPolicy::DateWindow { window_days, .. } => *window_days,
                    FetchPolicy::Cursor { .. } => MAX_WINDOW_DAYS,
                };
                // no day after the last representable date
                match window_to.succ_opt() {
                    Some(next_from) if next_from <= to => {
                        Ok(Some(window_at(next_from, to, window_days)))
                    }
                    _ => Ok(None),
                }
            }
        }
    }

    fn pacing(&self) -> Duration {
        match self {
            FetchPolicy::DateWindow { pacing, .. } => *pacing,
            FetchPolicy::Cursor { .. } => Duration::ZERO,
        }
    }
}

fn window_at(from: NaiveDate, to: NaiveDate, window_days: u32) -> FetchCursor {
    let days = window_days.clamp(1, MAX_WINDOW_DAYS) as u64;
    let end = from.checked_add_days(Days::new(days - 1)).map_or(to, |end| end.min(to));
    FetchCursor::Window { from, to: end }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub endpoint: Url,
    pub policy: FetchPolicy,
    pub retry: RetryPolicy,
    pub deadline: Option<Duration>,
}

impl ClientConfig {
    pub fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            policy: FetchPolicy::default(),
            retry: RetryPolicy::default(),
            deadline: None,
        }
    }
}

pub struct LedgerClient<T, C = TokioCooldown> {
    transport: T,
    cooldown: C,
    cfg: ClientConfig,
    cancel: Option<watch::Receiver<bool>>,
}

impl<T: Transport> LedgerClient<T, TokioCooldown> {
    pub fn new(transport: T, cfg: ClientConfig) -> Self {
        Self::with_cooldown(transport, TokioCooldown, cfg)
    }
}

impl<T: Transport, C: Cooldown> LedgerClient<T, C> {
    pub fn with_cooldown(transport: T, cooldown: C, cfg: ClientConfig) -> Self {
        Self { transport, cooldown, cfg, cancel: None }
    }

    /// Fetch is abandoned (as Timeout) once the flag flips to `true`.
    pub fn with_cancel(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn cooldown(&self) -> &C {
        &self.cooldown
    }

    pub fn config(&self) -> &ClientConfig {
        &self.cfg
    }

    /// All ledger entries for `[from, to]`, in upstream order.
    pub async fn fetch(
        &self,
        credential: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<LedgerEntry>> {
        let res = self.fetch_inner(credential, from, to).await;
        if let Err(e) = &res {
            FETCH_ERRORS.with_label_values(&[e.kind().as_str()]).inc();
            warn!(error = %e, "ledger fetch failed");
        }
        res
    }

    async fn fetch_inner(
        &self,
        credential: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<LedgerEntry>> {
        if from > to {
            return Err(ReportError::InvalidParameter(format!(
                "dateFrom {from} is after dateTo {to}"
            )));
        }
        let guard = FetchGuard::new(self.cfg.deadline, self.cancel.clone());
        let policy = &self.cfg.policy;
        info!(
            policy = policy.name(),
            %from,
            %to,
            credential_fp = %fingerprint(credential),
            "ledger fetch started"
        );

        let mut out: Vec<LedgerEntry> = Vec::new();
        let mut cursor = policy.start(from, to);
        let mut page_no: u32 = 0;

        while let Some(cur) = cursor {
            if page_no > 0 && !policy.pacing().is_zero() {
                guard.run(tokio::time::sleep(policy.pacing())).await?;
            }
            page_no += 1;

            let req = Request::Get(self.url_for(&cur, from, to));
            let reply = send_with_cooldown(
                &self.transport,
                &self.cooldown,
                &guard,
                &self.cfg.retry,
                &req,
                credential,
            )
            .await?;
            let page = parse_page(&reply)?;

            PAGES_FETCHED.inc();
            ENTRIES_FETCHED.inc_by(page.len() as u64);
            debug!(page = page_no, cursor = ?cur, entries = page.len(), "ledger page received");

            cursor = policy.advance(&cur, &page, to)?;
            out.extend(page);
        }

        info!(pages = page_no, entries = out.len(), "ledger fetch done");
        Ok(out)
    }

    fn url_for(&self, cur: &FetchCursor, from: NaiveDate, to: NaiveDate) -> Url {
        let mut url = self.cfg.endpoint.clone();
        {
            let mut q = url.query_pairs_mut();
            match cur {
                FetchCursor::Page { rrd_id, limit } => {
                    q.append_pair("dateFrom", &from.format("%Y-%m-%d").to_string());
                    q.append_pair("dateTo", &to.format("%Y-%m-%d").to_string());
                    q.append_pair("limit", &limit.to_string());
                    q.append_pair("rrdid", &rrd_id.to_string());
                }
                FetchCursor::Window { from, to } => {
                    q.append_pair("dateFrom", &from.format("%Y-%m-%d").to_string());
                    q.append_pair("dateTo", &to.format("%Y-%m-%d").to_string());
                }
            }
        }
        url
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PageBody {
    Bare(Vec<LedgerEntry>),
    Envelope { data: Vec<LedgerEntry> },
}

/// 204 / empty body = empty page. Accepts a bare array or `{"data": [...]}`.
pub fn parse_page(reply: &HttpReply) -> Result<Vec<LedgerEntry>> {
    if reply.status == 204 || reply.body.trim().is_empty() {
        return Ok(Vec::new());
    }
    match serde_json::from_str::<PageBody>(&reply.body) {
        Ok(PageBody::Bare(v)) | Ok(PageBody::Envelope { data: v }) => Ok(v),
        Err(e) => Err(ReportError::MalformedResponse(format!(
            "{e}; body: {}",
            snippet(&reply.body)
        ))),
    }
}

/// Short, non-reversible tag for a credential so logs never carry the secret.
pub fn fingerprint(credential: &str) -> String {
    let digest = Sha256::digest(credential.as_bytes());
    hex::encode(&digest[..6])
}
