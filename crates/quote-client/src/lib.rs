use async_trait::async_trait;
use chrono::{Days, FixedOffset, NaiveDate, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use valuation_core::{MarketQuote, PriceSource, ValuationError};

const DEFAULT_BASE_URL: &str = "https://api.polygon.io";
/// Calendar days searched backwards for a close (covers long holiday weekends)
const LOOKBACK_DAYS: u64 = 7;
const MAX_ATTEMPTS: u32 = 3;
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const RATE_WINDOW: Duration = Duration::from_secs(60);
const KST_OFFSET_SECS: i32 = 9 * 3600;

/// Today's date on the Korea Exchange calendar
pub fn kst_today() -> NaiveDate {
    match FixedOffset::east_opt(KST_OFFSET_SECS) {
        Some(kst) => Utc::now().with_timezone(&kst).date_naive(),
        None => Utc::now().date_naive(),
    }
}

/// Sliding-window rate limiter: at most `max_requests` per `window` duration.
#[derive(Clone)]
struct RateLimiter {
    timestamps: Arc<Mutex<VecDeque<Instant>>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            timestamps: Arc::new(Mutex::new(VecDeque::new())),
            max_requests: max_requests.max(1),
            window,
        }
    }

    async fn acquire(&self) {
        loop {
            let mut ts = self.timestamps.lock().await;
            let now = Instant::now();

            while let Some(&front) = ts.front() {
                if now.duration_since(front) >= self.window {
                    ts.pop_front();
                } else {
                    break;
                }
            }

            if ts.len() < self.max_requests {
                ts.push_back(now);
                return;
            }

            // wait until the oldest request falls out of the window
            let Some(&oldest) = ts.front() else { continue };
            let sleep_dur = (oldest + self.window).duration_since(now) + Duration::from_millis(50);
            drop(ts);
            tracing::debug!("Rate limiter: waiting {:.1}s for quote API slot", sleep_dur.as_secs_f64());
            tokio::time::sleep(sleep_dur).await;
        }
    }
}

/// Daily close lookups against a Polygon-compatible open/close endpoint.
///
/// Tickers are six-digit KRX codes, which api.polygon.io itself does not list:
/// point `with_base_url` at a gateway that serves KRX closes in the same
/// `/v1/open-close/{ticker}/{date}` shape.
#[derive(Clone)]
pub struct QuoteClient {
    api_key: String,
    base_url: String,
    client: Client,
    request_timeout: Duration,
    rate_limiter: RateLimiter,
    retry_wait: Duration,
}

impl QuoteClient {
    pub fn new(api_key: String) -> Self {
        // Free tier allows 5 req/min; paid plans should raise QUOTE_RATE_LIMIT.
        let rate_limit: usize = std::env::var("QUOTE_RATE_LIMIT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(5);

        Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            client: build_client(DEFAULT_REQUEST_TIMEOUT),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            rate_limiter: RateLimiter::new(rate_limit, RATE_WINDOW),
            retry_wait: Duration::from_secs(15),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Per-request HTTP timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = build_client(timeout);
        self.request_timeout = timeout;
        self
    }

    pub fn with_rate_limit(mut self, max_requests_per_minute: usize) -> Self {
        self.rate_limiter = RateLimiter::new(max_requests_per_minute, RATE_WINDOW);
        self
    }

    /// Pause before retrying a 429 response
    pub fn with_retry_wait(mut self, wait: Duration) -> Self {
        self.retry_wait = wait;
        self
    }

    /// Longest a `latest_quote` walk-back can take: every day retried to the
    /// limit plus one full rate-limit window. Callers bounding the lookup
    /// with their own timeout need at least this much.
    pub fn worst_case_latency(&self) -> Duration {
        let per_day = (self.request_timeout + self.retry_wait) * MAX_ATTEMPTS;
        per_day * LOOKBACK_DAYS as u32 + self.rate_limiter.window
    }

    /// Send a request with rate limiting and automatic 429 retry.
    async fn send_request(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response, ValuationError> {
        let request = builder.build().map_err(|e| ValuationError::Api(e.to_string()))?;

        for attempt in 0..MAX_ATTEMPTS {
            self.rate_limiter.acquire().await;
            let req_clone = request
                .try_clone()
                .ok_or_else(|| ValuationError::Api("Cannot clone request".to_string()))?;
            let response = self
                .client
                .execute(req_clone)
                .await
                .map_err(|e| ValuationError::Api(e.to_string()))?;

            if response.status() != StatusCode::TOO_MANY_REQUESTS {
                return Ok(response);
            }

            tracing::warn!(
                "Quote API 429 rate limited, waiting {:?} before retry {}/{}",
                self.retry_wait,
                attempt + 1,
                MAX_ATTEMPTS
            );
            tokio::time::sleep(self.retry_wait).await;
        }

        Err(ValuationError::Api(format!(
            "Rate limited by quote API after {} retries",
            MAX_ATTEMPTS
        )))
    }

    /// Closing price for one trading day; `None` for holidays and days without a close.
    pub async fn daily_close(&self, ticker: &str, date: NaiveDate) -> Result<Option<i64>, ValuationError> {
        let url = format!(
            "{}/v1/open-close/{}/{}",
            self.base_url,
            ticker,
            date.format("%Y-%m-%d")
        );

        let response = self
            .send_request(
                self.client
                    .get(&url)
                    .query(&[("adjusted", "true"), ("apiKey", self.api_key.as_str())]),
            )
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(ValuationError::Api(format!(
                "HTTP {}: {}",
                response.status(),
                response.text().await.unwrap_or_default()
            )));
        }

        let body: OpenCloseResponse = response
            .json()
            .await
            .map_err(|e| ValuationError::Api(e.to_string()))?;

        if body.status.as_deref().is_some_and(|s| s != "OK") {
            return Ok(None);
        }
        Ok(body.close.filter(|c| *c > 0.0).map(|c| c as i64))
    }

    /// Most recent positive close on or before `today`, looking back a week.
    pub async fn latest_quote_as_of(&self, ticker: &str, today: NaiveDate) -> Result<MarketQuote, ValuationError> {
        for offset in 0..LOOKBACK_DAYS {
            let Some(date) = today.checked_sub_days(Days::new(offset)) else {
                break;
            };
            if let Some(price) = self.daily_close(ticker, date).await? {
                tracing::debug!("{}: close {} on {}", ticker, price, date);
                return Ok(MarketQuote { price, as_of_date: date });
            }
        }

        Err(ValuationError::NoQuote(format!(
            "no close for {} in the {} days up to {}",
            ticker, LOOKBACK_DAYS, today
        )))
    }
}

#[async_trait]
impl PriceSource for QuoteClient {
    async fn latest_quote(&self, ticker: &str) -> Result<MarketQuote, ValuationError> {
        self.latest_quote_as_of(ticker, kst_today()).await
    }

    fn source_name(&self) -> &str {
        "quote-api"
    }
}

/// Prices supplied up front, e.g. a manual `--price` override.
#[derive(Debug, Clone, Default)]
pub struct FixedQuotes {
    prices: HashMap<String, i64>,
    fallback: Option<i64>,
}

impl FixedQuotes {
    pub fn new(prices: HashMap<String, i64>) -> Self {
        Self { prices, fallback: None }
    }

    /// Quote the same price for every ticker
    pub fn single(price: i64) -> Self {
        Self {
            prices: HashMap::new(),
            fallback: Some(price),
        }
    }
}

#[async_trait]
impl PriceSource for FixedQuotes {
    async fn latest_quote(&self, ticker: &str) -> Result<MarketQuote, ValuationError> {
        self.prices
            .get(ticker)
            .copied()
            .or(self.fallback)
            .map(|price| MarketQuote {
                price,
                as_of_date: kst_today(),
            })
            .ok_or_else(|| ValuationError::NoQuote(format!("no fixed price for {}", ticker)))
    }

    fn source_name(&self) -> &str {
        "fixed"
    }
}

fn build_client(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| Client::new())
}

#[derive(Debug, Deserialize)]
struct OpenCloseResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    close: Option<f64>,
}

#[cfg(test)]
mod tests;
