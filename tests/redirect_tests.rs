//! `/out` endpoint tests
//!
//! 覆盖参数校验、联盟标签、点击记录、Location 规范化和方法处理；
//! 降级顺序在 `api::services::redirect` 的单元测试里。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use actix_web::http::header::{self, HeaderMap};
use actix_web::http::{Method, StatusCode};
use actix_web::test::{self, TestRequest};
use actix_web::{App, web};
use async_trait::async_trait;
use tokio::sync::mpsc;

use outlinker::affiliate::AffiliateSource;
use outlinker::analytics::{ClickLogger, ClickRecord, ClickSink, NoopSink};
use outlinker::api::services::{OutContext, out_routes};
use outlinker::config::StaticConfig;

// =============================================================================
// Test Setup
// =============================================================================

/// 把收到的记录转发到 channel
struct RecordingSink {
    tx: mpsc::UnboundedSender<ClickRecord>,
}

#[async_trait]
impl ClickSink for RecordingSink {
    async fn record(&self, record: ClickRecord) -> anyhow::Result<()> {
        self.tx.send(record)?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

struct FailingSink;

#[async_trait]
impl ClickSink for FailingSink {
    async fn record(&self, _record: ClickRecord) -> anyhow::Result<()> {
        anyhow::bail!("database unavailable")
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

struct PanickingSink;

#[async_trait]
impl ClickSink for PanickingSink {
    async fn record(&self, _record: ClickRecord) -> anyhow::Result<()> {
        panic!("sink exploded")
    }

    fn name(&self) -> &'static str {
        "panicking"
    }
}

/// 第一次写入时 panic，之后正常转发
struct PanicOnceSink {
    panicked: AtomicBool,
    tx: mpsc::UnboundedSender<ClickRecord>,
}

#[async_trait]
impl ClickSink for PanicOnceSink {
    async fn record(&self, record: ClickRecord) -> anyhow::Result<()> {
        if !self.panicked.swap(true, Ordering::SeqCst) {
            panic!("sink exploded on first write");
        }
        self.tx.send(record)?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "panic-once"
    }
}

/// 写入前先等待，模拟慢速存储
struct SlowSink {
    delay: Duration,
}

#[async_trait]
impl ClickSink for SlowSink {
    async fn record(&self, _record: ClickRecord) -> anyhow::Result<()> {
        tokio::time::sleep(self.delay).await;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "slow"
    }
}

fn test_config() -> StaticConfig {
    let mut config = StaticConfig::default();
    config.affiliate.amazon_tag = Some("mytag".to_string());
    config.affiliate.cabelas_tag = Some("tt-01".to_string());
    config
}

fn context_with(config: &StaticConfig, sink: Arc<dyn ClickSink>) -> web::Data<OutContext> {
    let logger = Arc::new(ClickLogger::new(sink));
    web::Data::new(OutContext::new(config, logger).expect("valid test config"))
}

macro_rules! create_app {
    ($ctx:expr) => {{
        test::init_service(App::new().app_data($ctx).service(out_routes())).await
    }};
}

fn out_uri(target: &str) -> String {
    let query: String = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("url", target)
        .finish();
    format!("/out?{}", query)
}

fn location(headers: &HeaderMap) -> &str {
    headers
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .expect("Location header")
}

fn assert_no_cache(headers: &HeaderMap) {
    assert_eq!(
        headers.get(header::CACHE_CONTROL).unwrap(),
        "no-cache, no-store, must-revalidate"
    );
    assert_eq!(headers.get(header::PRAGMA).unwrap(), "no-cache");
    assert_eq!(headers.get(header::EXPIRES).unwrap(), "0");
}

// =============================================================================
// Parameter validation
// =============================================================================

#[actix_web::test]
async fn test_missing_url_param() {
    let app = create_app!(context_with(&test_config(), Arc::new(NoopSink)));

    for uri in ["/out", "/out?url=", "/out?other=1"] {
        let req = TestRequest::get().uri(uri).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "uri: {}", uri);
        let body = test::read_body(resp).await;
        assert_eq!(body, "Missing URL parameter");
    }
}

#[actix_web::test]
async fn test_invalid_url_rejected() {
    let app = create_app!(context_with(&test_config(), Arc::new(NoopSink)));

    for target in [
        "http://amazon.com/dp/B000123",
        "http://internal.example.com",
        "https://localhost/admin",
        "https://127.0.0.1/",
        "https://192.168.1.1/router",
        "https://10.0.0.5/",
        "https://0.0.0.0/",
        "https://metadata.internal/",
        "javascript:alert(1)",
        "not a url",
    ] {
        let req = TestRequest::get().uri(&out_uri(target)).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "target: {}", target);
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/plain"
        );
        let body = test::read_body(resp).await;
        assert_eq!(body, "Invalid URL provided");
    }
}

// =============================================================================
// Tagged redirects
// =============================================================================

#[actix_web::test]
async fn test_amazon_redirect_is_tagged() {
    let app = create_app!(context_with(&test_config(), Arc::new(NoopSink)));

    let req = TestRequest::get()
        .uri(&out_uri("https://amazon.com/dp/B000123"))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(
        location(resp.headers()),
        "https://amazon.com/dp/B000123?tag=mytag&linkCode=as2&camp=1789&creative=9325"
    );
    assert_eq!(resp.headers().get(header::REFERRER_POLICY).unwrap(), "origin");
    assert_no_cache(resp.headers());
}

#[actix_web::test]
async fn test_existing_tag_replaced() {
    let app = create_app!(context_with(&test_config(), Arc::new(NoopSink)));

    let req = TestRequest::get()
        .uri(&out_uri(
            "https://www.amazon.com/dp/B000123?tag=someoneelse-20&th=1",
        ))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::FOUND);
    let target = url::Url::parse(location(resp.headers())).unwrap();
    let tags: Vec<String> = target
        .query_pairs()
        .filter(|(k, _)| k == "tag")
        .map(|(_, v)| v.into_owned())
        .collect();
    assert_eq!(tags, vec!["mytag".to_string()]);
    assert!(target.query_pairs().any(|(k, v)| k == "th" && v == "1"));
}

#[actix_web::test]
async fn test_cabelas_redirect_is_tagged() {
    let app = create_app!(context_with(&test_config(), Arc::new(NoopSink)));

    let req = TestRequest::get()
        .uri(&out_uri("https://www.cabelas.com/product/camping/tent-123"))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(
        location(resp.headers()),
        "https://www.cabelas.com/product/camping/tent-123?affiliate=tt-01"
    );
    assert_eq!(resp.headers().get(header::REFERRER_POLICY).unwrap(), "origin");
}

#[actix_web::test]
async fn test_unknown_retailer_passes_through() {
    let app = create_app!(context_with(&test_config(), Arc::new(NoopSink)));

    let target = "https://www.rei.com/product/12345?color=green";
    let req = TestRequest::get().uri(&out_uri(target)).to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(resp.headers()), target);
    assert!(resp.headers().get(header::REFERRER_POLICY).is_none());
    assert_no_cache(resp.headers());
}

#[actix_web::test]
async fn test_missing_tag_passes_through() {
    let ctx = context_with(&StaticConfig::default(), Arc::new(NoopSink));
    let app = create_app!(ctx);

    let target = "https://amazon.com/dp/B000123";
    let req = TestRequest::get().uri(&out_uri(target)).to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(resp.headers()), target);
}

// =============================================================================
// Click logging
// =============================================================================

#[actix_web::test]
async fn test_click_recorded() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let app = create_app!(context_with(&test_config(), Arc::new(RecordingSink { tx })));

    let req = TestRequest::get()
        .uri(&out_uri("https://www.amazon.com/Some-Tent/dp/B000123456"))
        .insert_header((header::USER_AGENT, "Mozilla/5.0 (test)"))
        .insert_header((header::REFERER, "https://tenttracks.com/reviews/tents"))
        .insert_header(("cf-ipcountry", "CA"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    let final_url = location(resp.headers()).to_string();

    let record = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("click should be recorded")
        .expect("channel open");

    assert_eq!(record.source, AffiliateSource::Amazon);
    assert_eq!(
        record.original_url,
        "https://www.amazon.com/Some-Tent/dp/B000123456"
    );
    assert_eq!(record.final_url, final_url);
    assert_eq!(record.user_agent, "Mozilla/5.0 (test)");
    assert_eq!(record.referrer, "https://tenttracks.com/reviews/tents");
    assert_eq!(record.geo_location.as_deref(), Some("CA"));
    assert_eq!(record.product_info.asin.as_deref(), Some("B000123456"));
    assert_eq!(record.product_info.title.as_deref(), Some("Some Tent"));
}

#[actix_web::test]
async fn test_click_without_optional_headers() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let app = create_app!(context_with(&test_config(), Arc::new(RecordingSink { tx })));

    let req = TestRequest::get()
        .uri(&out_uri("https://example.com/gear"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);

    let record = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("click should be recorded")
        .expect("channel open");

    assert_eq!(record.source, AffiliateSource::Unknown);
    assert_eq!(record.user_agent, "");
    assert_eq!(record.referrer, "");
    assert!(record.geo_location.is_none());
    assert!(record.product_info.is_empty());
}

#[actix_web::test]
async fn test_failing_sink_does_not_affect_redirect() {
    let app = create_app!(context_with(&test_config(), Arc::new(FailingSink)));

    let req = TestRequest::get()
        .uri(&out_uri("https://amazon.com/dp/B000123"))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::FOUND);
    assert!(location(resp.headers()).contains("tag=mytag"));
}

#[actix_web::test]
async fn test_panicking_sink_does_not_affect_redirect() {
    let app = create_app!(context_with(&test_config(), Arc::new(PanickingSink)));

    for _ in 0..2 {
        let req = TestRequest::get()
            .uri(&out_uri("https://amazon.com/dp/B000123"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FOUND);
        // 让后台任务有机会运行
        tokio::task::yield_now().await;
    }
}

#[actix_web::test]
async fn test_logging_recovers_after_sink_panic() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let sink = PanicOnceSink {
        panicked: AtomicBool::new(false),
        tx,
    };
    let app = create_app!(context_with(&test_config(), Arc::new(sink)));

    let first = TestRequest::get()
        .uri(&out_uri("https://amazon.com/dp/B000111"))
        .to_request();
    assert_eq!(test::call_service(&app, first).await.status(), StatusCode::FOUND);
    // 先让第一条记录的任务跑完（并 panic）
    tokio::time::sleep(Duration::from_millis(50)).await;

    let second = TestRequest::get()
        .uri(&out_uri("https://amazon.com/dp/B000222"))
        .to_request();
    assert_eq!(test::call_service(&app, second).await.status(), StatusCode::FOUND);

    let record = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("later click should still be recorded")
        .expect("channel open");
    assert_eq!(record.original_url, "https://amazon.com/dp/B000222");
}

#[actix_web::test]
async fn test_slow_sink_does_not_delay_redirect() {
    let sink = SlowSink {
        delay: Duration::from_secs(3),
    };
    let app = create_app!(context_with(&test_config(), Arc::new(sink)));

    let started = Instant::now();
    let req = TestRequest::get()
        .uri(&out_uri("https://amazon.com/dp/B000123"))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::FOUND);
    assert!(
        started.elapsed() < Duration::from_secs(1),
        "redirect waited on the sink: {:?}",
        started.elapsed()
    );
}

// =============================================================================
// Location normalisation
// =============================================================================

#[actix_web::test]
async fn test_location_percent_encodes_non_ascii() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let app = create_app!(context_with(&test_config(), Arc::new(RecordingSink { tx })));

    let req = TestRequest::get()
        .uri(&out_uri("https://example.com/café"))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(resp.headers()), "https://example.com/caf%C3%A9");
    assert!(resp.headers().get(header::REFERRER_POLICY).is_none());
    assert_no_cache(resp.headers());

    let record = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("click should be recorded")
        .expect("channel open");
    assert_eq!(record.original_url, "https://example.com/café");
    assert_eq!(record.final_url, "https://example.com/caf%C3%A9");
}

#[actix_web::test]
async fn test_location_percent_encodes_spaces() {
    let app = create_app!(context_with(&test_config(), Arc::new(NoopSink)));

    let req = TestRequest::get()
        .uri(&out_uri("https://example.com/a b?q=two words"))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(
        location(resp.headers()),
        "https://example.com/a%20b?q=two%20words"
    );
}

#[actix_web::test]
async fn test_location_drops_control_characters() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let app = create_app!(context_with(&test_config(), Arc::new(RecordingSink { tx })));

    let req = TestRequest::get()
        .uri("/out?url=https%3A%2F%2Fexample.com%2Fa%0Ab")
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(resp.headers()), "https://example.com/ab");

    // 正常打标层处理，点击照常记录
    let record = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("click should be recorded")
        .expect("channel open");
    assert_eq!(record.original_url, "https://example.com/a\nb");
    assert_eq!(record.final_url, "https://example.com/ab");
}

// =============================================================================
// Methods
// =============================================================================

#[actix_web::test]
async fn test_options_preflight() {
    let app = create_app!(context_with(&test_config(), Arc::new(NoopSink)));

    let req = TestRequest::default()
        .method(Method::OPTIONS)
        .uri("/out")
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let headers = resp.headers();
    assert_eq!(
        headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "*"
    );
    assert_eq!(
        headers.get(header::ACCESS_CONTROL_ALLOW_METHODS).unwrap(),
        "GET, OPTIONS"
    );
    assert_eq!(
        headers.get(header::ACCESS_CONTROL_ALLOW_HEADERS).unwrap(),
        "Content-Type"
    );
    let body = test::read_body(resp).await;
    assert!(body.is_empty());
}

#[actix_web::test]
async fn test_other_methods_not_allowed() {
    let app = create_app!(context_with(&test_config(), Arc::new(NoopSink)));

    for method in [Method::POST, Method::PUT, Method::DELETE, Method::PATCH] {
        let req = TestRequest::default()
            .method(method.clone())
            .uri(&out_uri("https://amazon.com/dp/B000123"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED, "{}", method);
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/plain"
        );
        let body = test::read_body(resp).await;
        assert_eq!(body, "Method not allowed");
    }
}
