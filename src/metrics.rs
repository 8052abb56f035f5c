// ===============================
// src/metrics.rs
// ===============================
use once_cell::sync::Lazy;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

// Single custom registry (we register everything here)
pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

// -------- Fetch --------
pub static PAGES_FETCHED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("ledger_pages_fetched_total", "ledger pages/windows fetched").unwrap()
});

pub static ENTRIES_FETCHED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("ledger_entries_fetched_total", "ledger entries received").unwrap()
});

pub static RATE_LIMITED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("ledger_rate_limited_total", "HTTP 429 responses (each one = one cooldown)")
        .unwrap()
});

pub static FETCH_ERRORS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("ledger_fetch_errors_total", "terminal fetch errors (label: kind)"),
        &["kind"],
    )
    .unwrap()
});

// -------- Classify / render --------
pub static ENTRIES_CLASSIFIED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("ledger_entries_classified_total", "classified entries (label: category)"),
        &["category"],
    )
    .unwrap()
});

pub static RENDER_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(HistogramOpts::new(
        "report_render_seconds",
        "Workbook render time (seconds)",
    ))
    .unwrap()
});

pub fn init() {
    // Register all metrics to the custom registry; a second init() is a no-op
    for m in [
        REGISTRY.register(Box::new(PAGES_FETCHED.clone())),
        REGISTRY.register(Box::new(ENTRIES_FETCHED.clone())),
        REGISTRY.register(Box::new(RATE_LIMITED.clone())),
        REGISTRY.register(Box::new(FETCH_ERRORS.clone())),
        REGISTRY.register(Box::new(ENTRIES_CLASSIFIED.clone())),
        REGISTRY.register(Box::new(RENDER_SECONDS.clone())),
    ] {
        let _ = m;
    }
}

// Encode all metrics in Prometheus text format
pub fn encode_text() -> Vec<u8> {
    let encoder = TextEncoder::new();
    let families = REGISTRY.gather();
    let mut buf = Vec::new();
    if encoder.encode(&families, &mut buf).is_err() || buf.is_empty() {
        buf.extend_from_slice(b"# no metrics\n");
    }
    buf
}
