mod common;

use std::time::Duration;

use ledger_report::analytics::{OrdersAnalytics, DEFAULT_ANALYTICS_ENDPOINT};
use ledger_report::error::ErrorKind;
use ledger_report::ledger_client::{HttpReply, Request, RetryPolicy};
use serde_json::json;
use url::Url;

use common::{CountingCooldown, ScriptedTransport};

fn body(page: u32, next: bool, cards: serde_json::Value) -> String {
    json!({"data": {"page": page, "isNextPage": next, "cards": cards}}).to_string()
}

fn card(nm: i64, cur: i64, prev: i64) -> serde_json::Value {
    json!({"nmID": nm, "vendorCode": format!("V{nm}"), "statistics": {
        "selectedPeriod": {"ordersCount": cur, "ordersSumRub": cur * 10},
        "previousPeriod": {"ordersCount": prev, "ordersSumRub": prev * 10}}})
}

fn analytics(t: ScriptedTransport) -> OrdersAnalytics<ScriptedTransport, CountingCooldown> {
    OrdersAnalytics::new(
        t,
        CountingCooldown::default(),
        Url::parse(DEFAULT_ANALYTICS_ENDPOINT).unwrap(),
        RetryPolicy { cooldown: Duration::from_secs(1), max_rate_limit_retries: 2 },
    )
}

#[tokio::test]
async fn follows_next_page_and_posts_query() {
    let t = ScriptedTransport::new(vec![
        Ok(HttpReply::new(429, "")),
        Ok(HttpReply::new(200, body(1, true, json!([card(1, 3, 1), card(2, 0, 0)])))),
        Ok(HttpReply::new(200, body(2, false, json!([card(3, 0, 2)])))),
    ]);
    let a = analytics(t);
    let s = a.fetch("key", "2024-01-01 00:00:00", "2024-01-31 23:59:59").await.unwrap();

    assert_eq!(s.total_orders, 3);
    assert_eq!(s.total_prev_orders, 3);
    assert_eq!(s.chart_data.iter().map(|c| c.nm_id).collect::<Vec<_>>(), vec![1, 3]);

    let reqs = a.transport().requests();
    assert_eq!(reqs.len(), 3);
    match &reqs[2] {
        Request::PostJson(_, q) => {
            assert_eq!(q["page"], 2);
            assert_eq!(q["orderBy"]["field"], "orders");
            assert_eq!(q["period"]["begin"], "2024-01-01 00:00:00");
            assert_eq!(q["timezone"], "Europe/Moscow");
        }
        other => panic!("expected POST, got {other:?}"),
    }
}

#[tokio::test]
async fn page_cap_stops_loop() {
    let replies = (1..=5)
        .map(|p| Ok(HttpReply::new(200, body(p, true, json!([card(p as i64, 1, 0)])))))
        .collect();
    let a = analytics(ScriptedTransport::new(replies)).with_max_pages(2);
    let s = a.fetch("key", "a", "b").await.unwrap();
    assert_eq!(s.chart_data.len(), 2);
    assert_eq!(a.transport().calls(), 2);
}

#[tokio::test]
async fn forbidden_is_unauthorized() {
    let a = analytics(ScriptedTransport::new(vec![Ok(HttpReply::new(403, "forbidden"))]));
    let err = a.fetch("key", "a", "b").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
}
