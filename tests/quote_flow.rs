//! End-to-end tests for `GET /quote`
//!
//! Each test starts a local upstream stand-in with a call counter, a SQLite
//! store in a temp directory, and the real router on an ephemeral port.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::Router;
use chrono::Utc;
use tempfile::TempDir;
use tokio::net::TcpListener;

use fxquote::cache::{QuoteCache, SqliteQuoteStore};
use fxquote::config::{ClientConfig, MockConfig};
use fxquote::deadline::Deadline;
use fxquote::error::Error;
use fxquote::quote::BucketGranularity;
use fxquote::server::{router, AppState};
use fxquote::service::{QuoteService, ServiceSettings};
use fxquote::upstream::UpstreamClient;

/// Canned behaviour for the upstream stand-in
#[derive(Clone)]
struct UpstreamSpec {
    delay: Duration,
    status: StatusCode,
    body: String,
}

impl UpstreamSpec {
    fn ok(body: &str, delay_ms: u64) -> Self {
        Self {
            delay: Duration::from_millis(delay_ms),
            status: StatusCode::OK,
            body: body.to_string(),
        }
    }
}

struct UpstreamState {
    spec: UpstreamSpec,
    calls: AtomicUsize,
    cancelled: AtomicUsize,
    auth: Mutex<Option<String>>,
}

/// Counts upstream handlers dropped before they replied
struct CancelCounter {
    state: Arc<UpstreamState>,
    replied: bool,
}

impl Drop for CancelCounter {
    fn drop(&mut self) {
        if !self.replied {
            self.state.cancelled.fetch_add(1, Ordering::SeqCst);
        }
    }
}

async fn upstream_handler(
    State(state): State<Arc<UpstreamState>>,
    headers: HeaderMap,
) -> (StatusCode, String) {
    state.calls.fetch_add(1, Ordering::SeqCst);
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    *state.auth.lock().unwrap() = auth;

    let mut counter = CancelCounter {
        state: state.clone(),
        replied: false,
    };
    tokio::time::sleep(state.spec.delay).await;
    counter.replied = true;
    (state.spec.status, state.spec.body.clone())
}

async fn spawn(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

async fn spawn_upstream(spec: UpstreamSpec) -> (String, Arc<UpstreamState>) {
    let state = Arc::new(UpstreamState {
        spec,
        calls: AtomicUsize::new(0),
        cancelled: AtomicUsize::new(0),
        auth: Mutex::new(None),
    });
    let app = Router::new()
        .route("/mock", get(upstream_handler))
        .with_state(state.clone());
    let addr = spawn(app).await;
    (format!("http://{}/mock", addr), state)
}

struct Harness {
    quote_url: String,
    store: SqliteQuoteStore,
    upstream: Arc<UpstreamState>,
    _temp_dir: TempDir,
}

impl Harness {
    fn upstream_calls(&self) -> usize {
        self.upstream.calls.load(Ordering::SeqCst)
    }

    async fn today_records(&self) -> usize {
        let key = BucketGranularity::Day.bucket_key(Utc::now());
        self.store.records(&key).await.unwrap().len()
    }

    async fn get(&self) -> (StatusCode, String, Option<String>) {
        let response = reqwest::get(&self.quote_url).await.unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        (status, response.text().await.unwrap(), content_type)
    }
}

fn settings(request_timeout_ms: u64) -> ServiceSettings {
    ServiceSettings {
        granularity: BucketGranularity::Day,
        request_timeout: Duration::from_millis(request_timeout_ms),
        lookup_timeout: Duration::from_secs(2),
        persist_timeout: Duration::from_secs(2),
    }
}

async fn harness_with(spec: UpstreamSpec, token: &str, settings: ServiceSettings, request_deadline: Duration) -> Harness {
    let (upstream_url, upstream) = spawn_upstream(spec).await;
    let temp_dir = TempDir::new().unwrap();
    let store = SqliteQuoteStore::open(&temp_dir.path().join("quotes.db")).unwrap();

    let client = UpstreamClient::new(upstream_url, token).unwrap();
    let service = QuoteService::new(Arc::new(client), Arc::new(store.clone()), settings);
    let addr = spawn(router(AppState {
        service,
        request_deadline,
    }))
    .await;

    Harness {
        quote_url: format!("http://{}/quote", addr),
        store,
        upstream,
        _temp_dir: temp_dir,
    }
}

async fn harness(spec: UpstreamSpec) -> Harness {
    harness_with(spec, "", settings(200), Duration::from_secs(5)).await
}

#[tokio::test]
async fn test_fresh_fetch_within_budget() {
    let h = harness(UpstreamSpec::ok(r#"{"bidPrice":"5.21"}"#, 50)).await;

    let (status, body, content_type) = h.get().await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"bidPrice": "5.21"}"#);
    assert_eq!(content_type.as_deref(), Some("application/json"));
    assert_eq!(h.upstream_calls(), 1);
    assert_eq!(h.today_records().await, 1);
}

#[tokio::test]
async fn test_slow_upstream_times_out_without_write() {
    let h = harness(UpstreamSpec::ok(r#"{"bidPrice":"5.21"}"#, 500)).await;

    let started = Instant::now();
    let (status, body, _) = h.get().await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.contains("timed out"), "body was: {}", body);
    assert!(started.elapsed() < Duration::from_millis(450));
    assert_eq!(h.today_records().await, 0);
}

#[tokio::test]
async fn test_cached_bucket_skips_upstream() {
    let h = harness(UpstreamSpec::ok(r#"{"bidPrice":"9.99"}"#, 0)).await;
    let key = BucketGranularity::Day.bucket_key(Utc::now());
    h.store
        .put(&key, 5.1, Deadline::after(Duration::from_secs(2)))
        .await
        .unwrap();

    let (status, body, _) = h.get().await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"bidPrice": "5.1000"}"#);
    assert_eq!(h.upstream_calls(), 0);
}

#[tokio::test]
async fn test_second_request_in_bucket_is_served_from_cache() {
    let h = harness(UpstreamSpec::ok(r#"{"bidPrice":"5.2097"}"#, 0)).await;

    let (_, first, _) = h.get().await;
    let (_, second, _) = h.get().await;
    let (_, third, _) = h.get().await;

    assert_eq!(first, r#"{"bidPrice": "5.2097"}"#);
    assert_eq!(second, r#"{"bidPrice": "5.2097"}"#);
    assert_eq!(third, r#"{"bidPrice": "5.2097"}"#);
    assert_eq!(h.upstream_calls(), 1);
    assert_eq!(h.today_records().await, 1);
}

#[tokio::test]
async fn test_nested_upstream_body_round_trips() {
    let body = r#"{"currency":[{"fromCurrency":"USD","toCurrency":"BRL","bidPrice":"5.2097","askPrice":"5.2127"}]}"#;
    let h = harness(UpstreamSpec::ok(body, 0)).await;

    let (status, reply, _) = h.get().await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply, r#"{"bidPrice": "5.2097"}"#);

    let key = BucketGranularity::Day.bucket_key(Utc::now());
    let records = h.store.records(&key).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].value, 5.2097);
}

#[tokio::test]
async fn test_missing_field_is_malformed_without_write() {
    let h = harness(UpstreamSpec::ok(r#"{"currency":[{"askPrice":"5.2127"}]}"#, 0)).await;

    let (status, body, _) = h.get().await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.contains("malformed"), "body was: {}", body);
    assert_eq!(h.today_records().await, 0);
}

#[tokio::test]
async fn test_upstream_error_status_is_surfaced() {
    let spec = UpstreamSpec {
        delay: Duration::ZERO,
        status: StatusCode::SERVICE_UNAVAILABLE,
        body: "rate limited".to_string(),
    };
    let h = harness(spec).await;

    let (status, body, _) = h.get().await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.contains("503"), "body was: {}", body);
    assert_eq!(h.today_records().await, 0);
}

#[tokio::test]
async fn test_failed_fetch_is_not_retried() {
    let h = harness(UpstreamSpec::ok("{}", 0)).await;

    h.get().await;

    assert_eq!(h.upstream_calls(), 1);
}

#[tokio::test]
async fn test_bearer_token_is_forwarded() {
    let h = harness_with(
        UpstreamSpec::ok(r#"{"bidPrice":"5.21"}"#, 0),
        "s3cret",
        settings(200),
        Duration::from_secs(5),
    )
    .await;

    h.get().await;

    let auth = h.upstream.auth.lock().unwrap().clone();
    assert_eq!(auth.as_deref(), Some("Bearer s3cret"));
}

#[tokio::test]
async fn test_empty_token_still_sends_header() {
    let h = harness(UpstreamSpec::ok(r#"{"bidPrice":"5.21"}"#, 0)).await;

    h.get().await;

    let auth = h.upstream.auth.lock().unwrap().clone();
    assert!(auth.unwrap_or_default().starts_with("Bearer"));
}

#[tokio::test]
async fn test_request_deadline_clamps_fetch_budget() {
    // The fetch budget alone would allow the slow upstream; the request bound does not
    let h = harness_with(
        UpstreamSpec::ok(r#"{"bidPrice":"5.21"}"#, 400),
        "",
        settings(2_000),
        Duration::from_millis(100),
    )
    .await;

    let started = Instant::now();
    let (status, body, _) = h.get().await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.contains("timed out"), "body was: {}", body);
    assert!(started.elapsed() < Duration::from_millis(350));
}

#[tokio::test]
async fn test_caller_hangup_cancels_upstream_fetch() {
    let h = harness_with(
        UpstreamSpec::ok(r#"{"bidPrice":"5.21"}"#, 2_000),
        "",
        settings(5_000),
        Duration::from_secs(5),
    )
    .await;

    let impatient = reqwest::Client::builder()
        .timeout(Duration::from_millis(100))
        .build()
        .unwrap();
    let result = impatient.get(&h.quote_url).send().await;
    assert!(result.is_err(), "caller should give up first");
    let hung_up = Instant::now();

    while h.upstream.cancelled.load(Ordering::SeqCst) == 0
        && hung_up.elapsed() < Duration::from_millis(500)
    {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert_eq!(h.upstream.cancelled.load(Ordering::SeqCst), 1);
    assert_eq!(h.upstream_calls(), 1);
    assert_eq!(h.today_records().await, 0);
}

#[tokio::test]
async fn test_concurrent_misses_all_succeed() {
    let h = harness(UpstreamSpec::ok(r#"{"bidPrice":"5.21"}"#, 20)).await;

    let replies = futures::future::join_all((0..8).map(|_| h.get())).await;

    for (status, body, _) in replies {
        assert_eq!(status, StatusCode::OK);
        assert!(body == r#"{"bidPrice": "5.21"}"# || body == r#"{"bidPrice": "5.2100"}"#);
    }
    // Racing misses may each write; the bucket still reads back one value
    let records = h.today_records().await;
    assert!((1..=8).contains(&records));
    let record = h
        .store
        .get(&BucketGranularity::Day.bucket_key(Utc::now()), Deadline::after(Duration::from_secs(2)))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.value, 5.21);
}

#[tokio::test]
async fn test_mock_upstream_feeds_server() {
    let mock = MockConfig {
        delay_ms: 0,
        ..MockConfig::default()
    };
    let mock_addr = spawn(fxquote::mock::router(&mock)).await;
    let temp_dir = TempDir::new().unwrap();
    let store = SqliteQuoteStore::open(&temp_dir.path().join("quotes.db")).unwrap();
    let client = UpstreamClient::new(format!("http://{}/mock", mock_addr), "").unwrap();
    let service = QuoteService::new(Arc::new(client), Arc::new(store), settings(200));
    let addr = spawn(router(AppState {
        service,
        request_deadline: Duration::from_secs(5),
    }))
    .await;

    let body = reqwest::get(format!("http://{}/quote", addr))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    assert_eq!(body, r#"{"bidPrice": "5.2097"}"#);
}

#[tokio::test]
async fn test_client_appends_quote_line() {
    let h = harness(UpstreamSpec::ok(r#"{"bidPrice":"5.21"}"#, 0)).await;
    let out_dir = TempDir::new().unwrap();
    let output = out_dir.path().join("quotes.txt");
    let config = ClientConfig {
        url: h.quote_url.clone(),
        timeout_ms: 2_000,
        output: output.clone(),
    };

    let first = fxquote::client::fetch_and_record(&config).await.unwrap();
    let second = fxquote::client::fetch_and_record(&config).await.unwrap();

    assert_eq!(first, "5.21");
    assert_eq!(second, "5.2100");
    let content = std::fs::read_to_string(&output).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].ends_with("\t5.21"));
    assert!(lines[1].ends_with("\t5.2100"));
}

#[tokio::test]
async fn test_client_timeout_writes_nothing() {
    let h = harness_with(
        UpstreamSpec::ok(r#"{"bidPrice":"5.21"}"#, 500),
        "",
        settings(2_000),
        Duration::from_secs(5),
    )
    .await;
    let out_dir = TempDir::new().unwrap();
    let output = out_dir.path().join("quotes.txt");
    let config = ClientConfig {
        url: h.quote_url.clone(),
        timeout_ms: 100,
        output: output.clone(),
    };

    let result = fxquote::client::fetch_and_record(&config).await;

    assert!(matches!(result, Err(Error::Timeout)), "got {:?}", result.err());
    assert!(!output.exists());
}

#[tokio::test]
async fn test_client_reports_server_error() {
    let h = harness(UpstreamSpec::ok("{}", 0)).await;
    let out_dir = TempDir::new().unwrap();
    let output = out_dir.path().join("quotes.txt");
    let config = ClientConfig {
        url: h.quote_url.clone(),
        timeout_ms: 2_000,
        output: output.clone(),
    };

    let result = fxquote::client::fetch_and_record(&config).await;

    assert!(matches!(result, Err(Error::Rejected { status: 500, .. })));
    assert!(!output.exists());
}
