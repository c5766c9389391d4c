// tests/api_http.rs
//
// HTTP-level tests for the public Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot; only the
// command follow-ups go to a local listener standing in for Discord.
//
// Covered:
// - GET /health
// - GET /run (poll, forced, summary, missing config)
// - POST /interactions (signature checks, ping, commands, follow-up delivery)

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use axum::{
    body::{self, Body},
    Router,
};
use ed25519_dalek::{Signer, SigningKey};
use http::{Request, StatusCode};
use parking_lot::Mutex;
use serde_json::{json, Value as Json};
use tower::ServiceExt as _; // for `oneshot`

use deal_feed_notifier::api::{create_router, verify_signature, AppState};
use deal_feed_notifier::config::AppConfig;
use deal_feed_notifier::filter::FilterCriteria;
use deal_feed_notifier::ingest::providers::FixtureFeed;
use deal_feed_notifier::ingest::{DealRecord, FeedFetcher};
use deal_feed_notifier::notify::{Notifier, SummaryLabel};
use deal_feed_notifier::runner::Pipeline;
use deal_feed_notifier::store::MemoryStore;

const BODY_LIMIT: usize = 1024 * 1024;
const FIXTURE: &str = include_str!("fixtures/deals_rss.xml");
const SECRET: [u8; 32] = [7u8; 32];

#[derive(Default)]
struct RecordingNotifier {
    deals: Mutex<Vec<String>>,
    summaries: Mutex<Vec<usize>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_deal(&self, deal: &DealRecord) -> Result<()> {
        self.deals.lock().push(deal.guid.clone());
        Ok(())
    }

    async fn send_summary(&self, deals: &[DealRecord], _label: SummaryLabel) -> Result<()> {
        self.summaries.lock().push(deals.len());
        Ok(())
    }
}

fn public_key_hex() -> String {
    hex::encode(SigningKey::from_bytes(&SECRET).verifying_key().to_bytes())
}

fn config() -> AppConfig {
    AppConfig {
        discord_webhook_url: Some("https://hook.test/1".into()),
        discord_public_key: Some(public_key_hex()),
        // Nothing listens here; follow-ups fail fast and are only logged.
        discord_api_base: "http://127.0.0.1:9/api".into(),
        ..AppConfig::default()
    }
}

/// Build the same Router the binary uses, over a fixture feed.
fn test_router(config: AppConfig) -> (Router, Arc<RecordingNotifier>) {
    test_router_with(config, Arc::new(FixtureFeed::from_fixture(FIXTURE)))
}

fn test_router_with(
    config: AppConfig,
    fetcher: Arc<dyn FeedFetcher>,
) -> (Router, Arc<RecordingNotifier>) {
    let notifier = Arc::new(RecordingNotifier::default());
    let pipeline = Pipeline::new(
        Arc::new(config),
        fetcher,
        Arc::new(MemoryStore::new()),
        notifier.clone(),
    );
    let router = create_router(AppState {
        pipeline: Arc::new(pipeline),
    });
    (router, notifier)
}

async fn get_json(app: &Router, uri: &str) -> Json {
    let req = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("build GET");
    let resp = app.clone().oneshot(req).await.expect("oneshot");
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}

fn signed_interaction(body: &str, tamper: bool) -> Request<Body> {
    let timestamp = "1760900000";
    let key = SigningKey::from_bytes(&SECRET);
    let signature = key.sign(format!("{timestamp}{body}").as_bytes());
    let sent_body = if tamper {
        body.replace('1', "2")
    } else {
        body.to_string()
    };
    Request::builder()
        .method("POST")
        .uri("/interactions")
        .header("content-type", "application/json")
        .header("x-signature-ed25519", hex::encode(signature.to_bytes()))
        .header("x-signature-timestamp", timestamp)
        .body(Body::from(sent_body))
        .expect("build POST /interactions")
}

async fn response_json(app: &Router, req: Request<Body>) -> (StatusCode, Option<Json>) {
    let resp = app.clone().oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    (status, serde_json::from_slice(&bytes).ok())
}

#[tokio::test]
async fn health_returns_ok() {
    let (app, _) = test_router(config());
    let req = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .expect("build GET /health");
    let resp = app.oneshot(req).await.expect("oneshot /health");
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT).await.unwrap();
    assert_eq!(&bytes[..], b"ok");
}

#[tokio::test]
async fn run_bootstraps_then_forced_run_sends_with_limit() {
    let (app, notifier) = test_router(config());

    let v = get_json(&app, "/run").await;
    assert_eq!(v, json!({"ok": true, "message": "First run: stored latest guid, no send"}));

    let v = get_json(&app, "/run").await;
    assert_eq!(v, json!({"ok": true, "message": "No new items"}));

    let v = get_json(&app, "/run?force=1&limit=2").await;
    assert_eq!(v, json!({"ok": true, "message": "Sent 2 new items"}));
    assert_eq!(
        notifier.deals.lock().clone(),
        vec!["1004 at https://deals.test", "1005 at https://deals.test"]
    );
}

#[tokio::test]
async fn run_summary_uses_requested_limit() {
    let (app, notifier) = test_router(config());
    let v = get_json(&app, "/run?summary=1&limit=3").await;
    assert_eq!(v, json!({"ok": true, "message": "Summary sent (3 items)"}));
    assert_eq!(notifier.summaries.lock().clone(), vec![3]);
}

#[tokio::test]
async fn run_without_webhook_reports_error() {
    let mut cfg = config();
    cfg.discord_webhook_url = None;
    let (app, _) = test_router(cfg);
    let v = get_json(&app, "/run").await;
    assert_eq!(v, json!({"ok": false, "error": "Missing DISCORD_WEBHOOK_URL"}));
}

#[tokio::test]
async fn interactions_require_a_valid_signature() {
    let (app, _) = test_router(config());
    let body = r#"{"type":1}"#;

    let (status, _) = response_json(&app, signed_interaction(body, true)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let req = Request::builder()
        .method("POST")
        .uri("/interactions")
        .body(Body::from(body))
        .unwrap();
    let (status, _) = response_json(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn interactions_without_public_key_are_a_server_error() {
    let mut cfg = config();
    cfg.discord_public_key = None;
    let (app, _) = test_router(cfg);
    let (status, _) = response_json(&app, signed_interaction(r#"{"type":1}"#, false)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn ping_is_answered_with_pong() {
    let (app, _) = test_router(config());
    let (status, v) = response_json(&app, signed_interaction(r#"{"type":1}"#, false)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v, Some(json!({"type": 1})));
}

#[tokio::test]
async fn known_command_is_deferred_and_unknown_is_rejected() {
    let (app, _) = test_router(config());

    let body = json!({
        "type": 2,
        "application_id": "123",
        "token": "tok",
        "data": {"name": "ozb"}
    })
    .to_string();
    let (status, v) = response_json(&app, signed_interaction(&body, false)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v, Some(json!({"type": 5})));

    let body = json!({
        "type": 2,
        "application_id": "123",
        "token": "tok",
        "data": {"name": "weather"}
    })
    .to_string();
    let (_, v) = response_json(&app, signed_interaction(&body, false)).await;
    assert_eq!(
        v,
        Some(json!({
            "type": 4,
            "data": {"content": "Unknown command.", "allowed_mentions": {"parse": []}}
        }))
    );
}

#[test]
fn signature_check_matches_dalek_signer() {
    let key = SigningKey::from_bytes(&SECRET);
    let sig = hex::encode(key.sign(b"123hello").to_bytes());
    assert!(verify_signature(&public_key_hex(), &sig, b"123hello"));
    assert!(!verify_signature(&public_key_hex(), &sig, b"123hellO"));
}

/// Feed that is always down.
struct DownFeed;

#[async_trait]
impl FeedFetcher for DownFeed {
    async fn fetch(&self) -> Result<String> {
        Err(anyhow!("RSS fetch failed: 503"))
    }

    fn name(&self) -> &'static str {
        "down"
    }
}

type FollowUps = Arc<Mutex<Vec<(String, Json)>>>;

/// Local stand-in for the follow-up webhook; records `(token, body)`.
async fn spawn_follow_up_server() -> (SocketAddr, FollowUps) {
    let received: FollowUps = Arc::default();
    let app = Router::new()
        .route(
            "/api/webhooks/{app}/{token}",
            axum::routing::post(
                |axum::extract::State(rx): axum::extract::State<FollowUps>,
                 axum::extract::Path((_app, token)): axum::extract::Path<(String, String)>,
                 axum::Json(body): axum::Json<Json>| async move {
                    rx.lock().push((token, body));
                    StatusCode::NO_CONTENT
                },
            ),
        )
        .with_state(received.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, received)
}

/// Wait for the deferred task to post `n` follow-ups.
async fn wait_for(received: &FollowUps, n: usize) -> Vec<(String, Json)> {
    for _ in 0..100 {
        if received.lock().len() >= n {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    received.lock().clone()
}

fn command_body() -> String {
    json!({
        "type": 2,
        "application_id": "123",
        "token": "tok",
        "data": {"name": "ozb"}
    })
    .to_string()
}

async fn run_command(config: AppConfig, fetcher: Arc<dyn FeedFetcher>) -> Vec<(String, Json)> {
    let (addr, received) = spawn_follow_up_server().await;
    let config = AppConfig {
        discord_api_base: format!("http://{addr}/api"),
        ..config
    };
    let (app, _) = test_router_with(config, fetcher);
    let (status, v) = response_json(&app, signed_interaction(&command_body(), false)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v, Some(json!({"type": 5})));
    wait_for(&received, 1).await
}

#[tokio::test]
async fn command_follow_up_lists_deals_oldest_first() {
    let posts = run_command(config(), Arc::new(FixtureFeed::from_fixture(FIXTURE))).await;
    assert_eq!(posts.len(), 1);

    let (token, body) = &posts[0];
    assert_eq!(token, "tok");
    assert_eq!(body["content"], "🔥 **Latest Deals**");
    assert_eq!(body["allowed_mentions"], json!({"parse": []}));
    let embeds = body["embeds"].as_array().expect("embeds");
    assert_eq!(embeds.len(), 5);
    assert_eq!(embeds[0]["title"], "1. Kogan Bluetooth Speaker $29.95");
    assert_eq!(embeds[4]["url"], "https://deals.test/node/1005");
}

#[tokio::test]
async fn command_follow_up_with_everything_filtered_out() {
    let mut cfg = config();
    cfg.filters = FilterCriteria::new(vec!["nothing matches this".into()], vec![]);
    let posts = run_command(cfg, Arc::new(FixtureFeed::from_fixture(FIXTURE))).await;

    assert_eq!(posts.len(), 1);
    assert_eq!(
        posts[0].1,
        json!({"content": "No items found.", "allowed_mentions": {"parse": []}})
    );
}

#[tokio::test]
async fn command_follow_up_reports_fetch_error() {
    let posts = run_command(config(), Arc::new(DownFeed)).await;

    assert_eq!(posts.len(), 1);
    assert_eq!(
        posts[0].1,
        json!({"content": "Error: RSS fetch failed: 503", "allowed_mentions": {"parse": []}})
    );
}
