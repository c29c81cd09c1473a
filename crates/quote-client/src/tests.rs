use super::*;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_client(server: &MockServer) -> QuoteClient {
    QuoteClient::new("test-key".to_string())
        .with_base_url(server.uri())
        .with_rate_limit(100)
        .with_retry_wait(Duration::from_millis(10))
        .with_timeout(Duration::from_secs(5))
}

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn close_body(close: f64) -> serde_json::Value {
    json!({
        "status": "OK",
        "from": "2025-11-28",
        "symbol": "005930",
        "open": 59_800.0,
        "high": 60_500.0,
        "low": 59_500.0,
        "close": close,
        "volume": 12_345_678.0
    })
}

#[tokio::test]
async fn test_daily_close_sends_key_and_parses_close() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/open-close/005930/2025-11-28"))
        .and(query_param("apiKey", "test-key"))
        .and(query_param("adjusted", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(close_body(60_000.0)))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let close = client.daily_close("005930", day(2025, 11, 28)).await.unwrap();
    assert_eq!(close, Some(60_000));
}

#[tokio::test]
async fn test_daily_close_missing_day_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/open-close/005930/2025-11-29"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "NOT_FOUND"})))
        .mount(&server)
        .await;

    let client = test_client(&server);
    assert_eq!(client.daily_close("005930", day(2025, 11, 29)).await.unwrap(), None);
    // unmatched paths answer 404
    assert_eq!(client.daily_close("005930", day(2025, 11, 30)).await.unwrap(), None);
}

#[tokio::test]
async fn test_latest_quote_walks_back_over_weekend() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/open-close/005930/2025-11-28"))
        .respond_with(ResponseTemplate::new(200).set_body_json(close_body(60_000.0)))
        .expect(1)
        .mount(&server)
        .await;

    // Monday before the close is published: Mon, Sun and Sat miss, Friday hits
    let client = test_client(&server);
    let quote = client.latest_quote_as_of("005930", day(2025, 12, 1)).await.unwrap();
    assert_eq!(quote.price, 60_000);
    assert_eq!(quote.as_of_date, day(2025, 11, 28));
}

#[tokio::test]
async fn test_latest_quote_gives_up_after_a_week() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .expect(7)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let err = client.latest_quote_as_of("005930", day(2025, 12, 1)).await.unwrap_err();
    assert!(matches!(err, ValuationError::NoQuote(_)));
}

#[tokio::test]
async fn test_zero_close_is_skipped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/open-close/000660/2025-12-02"))
        .respond_with(ResponseTemplate::new(200).set_body_json(close_body(0.0)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/open-close/000660/2025-12-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(close_body(545_000.0)))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let quote = client.latest_quote_as_of("000660", day(2025, 12, 2)).await.unwrap();
    assert_eq!(quote.price, 545_000);
    assert_eq!(quote.as_of_date, day(2025, 12, 1));
}

#[tokio::test]
async fn test_retries_after_429() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/open-close/005930/2025-12-02"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/open-close/005930/2025-12-02"))
        .respond_with(ResponseTemplate::new(200).set_body_json(close_body(61_200.0)))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let close = client.daily_close("005930", day(2025, 12, 2)).await.unwrap();
    assert_eq!(close, Some(61_200));
}

#[tokio::test]
async fn test_persistent_429_is_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429))
        .expect(3)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let err = client.daily_close("005930", day(2025, 12, 2)).await.unwrap_err();
    assert!(matches!(err, ValuationError::Api(msg) if msg.contains("3 retries")));
}

#[tokio::test]
async fn test_server_error_is_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let err = client.latest_quote_as_of("005930", day(2025, 12, 2)).await.unwrap_err();
    assert_eq!(
        err,
        ValuationError::Api("HTTP 500 Internal Server Error: upstream down".to_string())
    );
}

#[tokio::test]
async fn test_rate_limiter_admits_up_to_limit_without_waiting() {
    let limiter = RateLimiter::new(3, Duration::from_secs(60));
    let started = Instant::now();
    for _ in 0..3 {
        limiter.acquire().await;
    }
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(limiter.timestamps.lock().await.len(), 3);
}

#[tokio::test]
async fn test_fixed_quotes() {
    let quotes = FixedQuotes::new(HashMap::from([("005930".to_string(), 60_000)]));
    assert_eq!(quotes.latest_quote("005930").await.unwrap().price, 60_000);
    assert!(matches!(
        quotes.latest_quote("000660").await.unwrap_err(),
        ValuationError::NoQuote(_)
    ));

    let manual = FixedQuotes::single(55_500);
    assert_eq!(manual.latest_quote("anything").await.unwrap().price, 55_500);
}

#[test]
fn test_worst_case_latency_covers_retries_and_rate_window() {
    let client = QuoteClient::new("k".to_string())
        .with_timeout(Duration::from_secs(10))
        .with_retry_wait(Duration::from_secs(15));
    // 7 days x 3 attempts x (10 s request + 15 s pause) + 60 s window
    assert_eq!(client.worst_case_latency(), Duration::from_secs(7 * 3 * 25 + 60));
    assert!(client.worst_case_latency() > Duration::from_secs(15));
}
