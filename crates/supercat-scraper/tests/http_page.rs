//! `HttpPage` against a local `wiremock` server: status handling, bot walls,
//! retry and extraction. No real network traffic.

use std::time::Duration;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use supercat_core::{fields, FieldSelector, RecordSelectors};
use supercat_scraper::{HttpPage, HttpPageProvider, HttpPageSettings, Page, ScraperError};

fn page(max_retries: u32) -> HttpPage {
    let provider = HttpPageProvider::new(HttpPageSettings {
        timeout_secs: 5,
        user_agent: "supercat-test/0.1".to_string(),
        max_retries,
        backoff_base_ms: 0,
    })
    .expect("failed to build test provider");
    provider.page_with_markers(vec!["captcha".to_string(), "access denied".to_string()])
}

const CATEGORY_HTML: &str = r#"
<html><body><main>
  <a class="vtex-menu-2-x-styledLink--menu-item-level-1" href="/lacteos">Lácteos</a>
  <a class="vtex-menu-2-x-styledLink--menu-item-level-1" href="/bebidas">Bebidas</a>
</main></body></html>"#;

#[tokio::test]
async fn loads_document_and_extracts_records() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(CATEGORY_HTML))
        .mount(&server)
        .await;

    let mut page = page(0);
    let status = page.goto(&format!("{}/", server.uri())).await.unwrap();
    assert_eq!(status, 200);
    assert!(page
        .wait_for_selector("main", Duration::from_secs(1))
        .await
        .unwrap());

    let spec = RecordSelectors::new("a[class*=\"menu-item-level-1\"]")
        .field(fields::NAME, FieldSelector::text(""))
        .field(fields::URL, FieldSelector::attr("", "href"));
    let records = page.extract(&spec).await.unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].get(fields::NAME), Some("Lácteos"));
    assert_eq!(records[1].get(fields::URL), Some("/bebidas"));
    assert!(page.current_url().is_some());
}

#[tokio::test]
async fn forbidden_is_bot_detection_and_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;

    let err = page(3).goto(&server.uri()).await.unwrap_err();
    assert!(
        matches!(err, ScraperError::BotDetected { status: 403, .. }),
        "got {err:?}"
    );
}

#[tokio::test]
async fn challenge_page_is_bot_detection() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("<html><h1>Please solve the CAPTCHA</h1></html>"),
        )
        .mount(&server)
        .await;

    let err = page(0).goto(&server.uri()).await.unwrap_err();
    assert!(matches!(err, ScraperError::BotDetected { status: 200, .. }));
}

#[tokio::test]
async fn rate_limit_is_retried_then_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "1"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(CATEGORY_HTML))
        .mount(&server)
        .await;

    let status = page(2).goto(&server.uri()).await.unwrap();
    assert_eq!(status, 200);
}

#[tokio::test]
async fn rate_limit_surfaces_after_retries_exhausted() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "7"))
        .mount(&server)
        .await;

    let err = page(0).goto(&server.uri()).await.unwrap_err();
    assert!(matches!(
        err,
        ScraperError::RateLimited {
            retry_after_secs: 7,
            ..
        }
    ));
}

#[tokio::test]
async fn server_error_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(CATEGORY_HTML))
        .mount(&server)
        .await;

    assert_eq!(page(3).goto(&server.uri()).await.unwrap(), 200);
}

#[tokio::test]
async fn not_found_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let err = page(3).goto(&server.uri()).await.unwrap_err();
    assert!(matches!(
        err,
        ScraperError::UnexpectedStatus { status: 404, .. }
    ));
}

#[tokio::test]
async fn connection_failure_is_navigation_error() {
    let err = page(0).goto("http://127.0.0.1:1/").await.unwrap_err();
    assert!(matches!(err, ScraperError::Navigation { .. }), "got {err:?}");
}

#[tokio::test]
async fn screenshot_is_unsupported_and_empty_page_extracts_nothing() {
    let mut page = page(0);
    let spec = RecordSelectors::new("a");
    assert!(page.extract(&spec).await.unwrap().is_empty());
    assert!(!page
        .wait_for_selector("a", Duration::from_millis(10))
        .await
        .unwrap());
    let err = page
        .screenshot(std::path::Path::new("/tmp/x.png"))
        .await
        .unwrap_err();
    assert!(matches!(err, ScraperError::Unsupported(_)));
}
