// Shared stubs for integration tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use ledger_report::error::Result;
use ledger_report::ledger_client::{Cooldown, HttpReply, Request, Transport};
use serde_json::json;

/// Replays scripted replies in order and records every request it sees.
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<Result<HttpReply>>>,
    seen: Mutex<Vec<Request>>,
    credentials: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new(replies: Vec<Result<HttpReply>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            seen: Mutex::new(Vec::new()),
            credentials: Mutex::new(Vec::new()),
        }
    }

    pub fn ok(bodies: Vec<String>) -> Self {
        Self::new(bodies.into_iter().map(|b| Ok(HttpReply::new(200, b))).collect())
    }

    pub fn requests(&self) -> Vec<Request> {
        self.seen.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn remaining(&self) -> usize {
        self.replies.lock().unwrap().len()
    }

    pub fn credentials(&self) -> Vec<String> {
        self.credentials.lock().unwrap().clone()
    }
}

impl Transport for ScriptedTransport {
    async fn send(&self, req: &Request, credential: &str) -> Result<HttpReply> {
        self.seen.lock().unwrap().push(req.clone());
        self.credentials.lock().unwrap().push(credential.to_string());
        let next = self.replies.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(HttpReply::new(204, "")))
    }
}

/// Never answers; used for deadline / cancel tests.
pub struct HangingTransport;

impl Transport for HangingTransport {
    async fn send(&self, _req: &Request, _credential: &str) -> Result<HttpReply> {
        std::future::pending().await
    }
}

/// Counts cooldown waits instead of sleeping.
#[derive(Default)]
pub struct CountingCooldown {
    calls: AtomicUsize,
    waited: Mutex<Vec<Duration>>,
}

impl CountingCooldown {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn waited(&self) -> Vec<Duration> {
        self.waited.lock().unwrap().clone()
    }
}

impl Cooldown for CountingCooldown {
    async fn wait(&self, d: Duration) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.waited.lock().unwrap().push(d);
    }
}

pub fn row(rrd_id: u64) -> serde_json::Value {
    json!({ "rrd_id": rrd_id, "sa_name": format!("SKU-{rrd_id}") })
}

/// JSON array body with rows for the given ids.
pub fn page(ids: impl IntoIterator<Item = u64>) -> String {
    serde_json::Value::Array(ids.into_iter().map(row).collect()).to_string()
}

pub fn query_value(req: &Request, key: &str) -> Option<String> {
    req.url()
        .query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}
