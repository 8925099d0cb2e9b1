//! HTTP transport and retry loop for the vendor cost API.
//!
//! One logical request is two layers:
//! - the transport issues exactly one HTTP call and classifies the outcome
//!   into a typed error (rate limited, transient, permanent, network)
//! - the retry loop wraps the transport in a bounded budget with
//!   exponential backoff, jitter, and rate-limit-header-aware waits
//!
//! Everything that reaches a log line goes through [`redact_url`]; the
//! bearer token itself is only ever written into the Authorization header.

use std::sync::OnceLock;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use regex::Regex;

use crate::client::models::{ForecastPage, Page, Query};
use crate::config::Granularity;
use crate::error::{Result, SyncError};
use crate::util::time::rfc3339;

/// Default vendor API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.vantage.sh";

/// Base delay for exponential backoff.
const BASE_BACKOFF: Duration = Duration::from_secs(1);

/// Upper bound on a single backoff wait, before jitter.
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Jitter applied to each backoff wait, as a fraction of the delay.
const JITTER_FRACTION: f64 = 0.25;

// =============================================================================
// Client Configuration
// =============================================================================

/// Connection settings for [`HttpClient`].
#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: String,
    /// Bearer token. Never logged.
    pub token: String,
    /// Per-request deadline.
    pub timeout: Duration,
    /// Retry budget on top of the initial attempt.
    pub max_retries: u32,
}

impl Config {
    /// Default configuration for the given token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token: token.into(),
            timeout: crate::config::DEFAULT_TIMEOUT,
            max_retries: crate::config::DEFAULT_MAX_RETRIES,
        }
    }
}

// =============================================================================
// HTTP Client
// =============================================================================

/// HTTP client for the cost and forecast endpoints.
#[derive(Debug, Clone)]
pub struct HttpClient {
    base_url: String,
    token: String,
    timeout: Duration,
    max_retries: u32,
    http: reqwest::Client,
}

impl HttpClient {
    /// Build a client from connection settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is empty or the underlying client
    /// cannot be constructed.
    pub fn new(config: Config) -> Result<Self> {
        if config.token.is_empty() {
            return Err(SyncError::ConfigInvalid {
                key: "token".to_string(),
                message: "is required".to_string(),
            });
        }

        let http = reqwest::ClientBuilder::new()
            .timeout(config.timeout)
            .user_agent(format!("costsync/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SyncError::Network(e.to_string()))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token,
            timeout: config.timeout,
            max_retries: config.max_retries,
            http,
        })
    }

    /// Fetch one page of cost data, retrying retryable failures up to the
    /// configured budget.
    ///
    /// # Errors
    ///
    /// Returns the first permanent error, or [`SyncError::RetriesExhausted`]
    /// once the budget is spent.
    pub async fn costs(&self, query: &Query) -> Result<Page> {
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                tracing::info!(
                    operation = "costs_request",
                    attempt,
                    max_retries = self.max_retries,
                    "retrying costs request"
                );
            }

            match self.costs_once(query).await {
                Ok(page) => {
                    if attempt > 0 {
                        tracing::info!(
                            operation = "costs_request",
                            attempt,
                            "costs request succeeded after retry"
                        );
                    }
                    return Ok(page);
                }
                Err(err) => self.handle_attempt_error(err, attempt).await?,
            }
        }

        unreachable!("retry loop always returns within the attempt budget")
    }

    /// Fetch forecast data for a cost report, with the same retry behavior
    /// as [`HttpClient::costs`].
    ///
    /// # Errors
    ///
    /// Returns the first permanent error, or [`SyncError::RetriesExhausted`]
    /// once the budget is spent.
    pub async fn forecast(
        &self,
        report_token: &str,
        start_at: DateTime<Utc>,
        end_at: DateTime<Utc>,
        granularity: Granularity,
    ) -> Result<ForecastPage> {
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                tracing::info!(
                    operation = "forecast_request",
                    attempt,
                    max_retries = self.max_retries,
                    "retrying forecast request"
                );
            }

            match self
                .forecast_once(report_token, start_at, end_at, granularity)
                .await
            {
                Ok(page) => return Ok(page),
                Err(err) => self.handle_attempt_error(err, attempt).await?,
            }
        }

        unreachable!("retry loop always returns within the attempt budget")
    }

    /// Decide what to do with a failed attempt: propagate permanent errors
    /// immediately, wrap the final retryable error once the budget is spent,
    /// or wait and signal the caller to try again.
    async fn handle_attempt_error(&self, err: SyncError, attempt: u32) -> Result<()> {
        if !err.is_retryable() {
            return Err(err);
        }
        if attempt >= self.max_retries {
            return Err(SyncError::RetriesExhausted {
                attempts: attempt + 1,
                source: Box::new(err),
            });
        }
        self.wait_before_retry(&err, attempt).await;
        Ok(())
    }

    /// Sleep before the next attempt. Rate-limit waits honor the vendor's
    /// reset hint when it is longer than the computed backoff.
    async fn wait_before_retry(&self, err: &SyncError, attempt: u32) {
        let backoff = backoff_delay(attempt);
        let delay = match err.retry_after() {
            Some(reset) => reset.max(backoff),
            None => backoff,
        };

        tracing::debug!(
            operation = "retry_backoff",
            attempt,
            delay_ms = delay.as_millis() as u64,
            "waiting before retry"
        );

        tokio::time::sleep(delay).await;
    }

    /// Issue exactly one `/costs` request.
    async fn costs_once(&self, query: &Query) -> Result<Page> {
        let mut params: Vec<(&str, String)> = Vec::new();
        if !query.workspace_token.is_empty() {
            params.push(("workspace_token", query.workspace_token.clone()));
        }
        if !query.cost_report_token.is_empty() {
            params.push(("cost_report_token", query.cost_report_token.clone()));
        }
        params.push(("start_at", rfc3339(query.start_at)));
        params.push(("end_at", rfc3339(query.end_at)));
        params.push(("granularity", query.granularity.as_str().to_string()));
        for gb in &query.group_bys {
            params.push(("group_bys[]", gb.as_str().to_string()));
        }
        for metric in &query.metrics {
            params.push(("metrics[]", metric.as_str().to_string()));
        }
        if query.page_size > 0 {
            params.push(("page_size", query.page_size.to_string()));
        }
        if !query.cursor.is_empty() {
            params.push(("cursor", query.cursor.clone()));
        }

        let url = format!("{}/costs", self.base_url);
        let page: Page = self.get_json("costs_request", &url, &params).await?;

        tracing::debug!(
            operation = "costs_request",
            rows = page.data.len(),
            has_more = page.has_more,
            terminal = page.next_cursor.is_empty(),
            "costs response received"
        );

        Ok(page)
    }

    /// Issue exactly one forecast request.
    async fn forecast_once(
        &self,
        report_token: &str,
        start_at: DateTime<Utc>,
        end_at: DateTime<Utc>,
        granularity: Granularity,
    ) -> Result<ForecastPage> {
        let params: Vec<(&str, String)> = vec![
            ("start_at", rfc3339(start_at)),
            ("end_at", rfc3339(end_at)),
            ("granularity", granularity.as_str().to_string()),
        ];

        let url = format!("{}/cost_reports/{report_token}/forecast", self.base_url);
        let page: ForecastPage = self.get_json("forecast_request", &url, &params).await?;

        tracing::debug!(
            operation = "forecast_request",
            rows = page.data.len(),
            "forecast response received"
        );

        Ok(page)
    }

    /// Send one GET request and decode the JSON body, classifying every
    /// failure into the error taxonomy.
    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        operation: &'static str,
        url: &str,
        params: &[(&str, String)],
    ) -> Result<T> {
        let request = self
            .http
            .get(url)
            .query(params)
            .bearer_auth(&self.token)
            .header("Accept", "application/json")
            .build()
            .map_err(|e| SyncError::Network(redact_url(&e.to_string())))?;

        tracing::debug!(
            operation,
            method = "GET",
            url = %redact_url(request.url().as_str()),
            "sending request"
        );

        let response = self.http.execute(request).await.map_err(|e| {
            if e.is_timeout() {
                SyncError::Timeout(self.timeout.as_secs())
            } else {
                SyncError::Network(redact_url(&e.to_string()))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_failure(operation, response).await);
        }

        response
            .json()
            .await
            .map_err(|e| SyncError::Decode(e.to_string()))
    }
}

/// Classify a non-2xx response into the error taxonomy.
async fn classify_failure(operation: &'static str, response: reqwest::Response) -> SyncError {
    let status = response.status().as_u16();

    match status {
        429 => {
            let retry_after = parse_rate_limit_reset(response.headers());
            tracing::warn!(
                operation,
                reset_secs = retry_after.map(|d| d.as_secs()),
                "rate limited by cost API"
            );
            SyncError::RateLimited { retry_after }
        }
        500 | 502 | 503 | 504 => {
            tracing::warn!(operation, status, "transient cost API failure");
            SyncError::Transient { status }
        }
        401 | 403 => SyncError::AuthRejected { status },
        404 => SyncError::NotFound,
        _ => {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(operation, status, "cost API request failed");
            SyncError::Api { status, body }
        }
    }
}

/// Extract the vendor's reset hint from `X-RateLimit-Reset`, falling back
/// to `Retry-After`. Both carry integer seconds.
fn parse_rate_limit_reset(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    let value = headers
        .get("x-ratelimit-reset")
        .or_else(|| headers.get("retry-after"))?;
    let secs: u64 = value.to_str().ok()?.trim().parse().ok()?;
    Some(Duration::from_secs(secs))
}

/// Exponential backoff with jitter: `min(cap, base * 2^attempt)` scaled by
/// a uniform factor in `[1 - JITTER_FRACTION, 1 + JITTER_FRACTION]`.
///
/// The jitter source is non-cryptographic; its only job is to keep
/// concurrent clients from retrying in lockstep.
fn backoff_delay(attempt: u32) -> Duration {
    let exponential = BASE_BACKOFF.as_secs_f64() * 2f64.powi(attempt.min(16) as i32);
    let capped = exponential.min(MAX_BACKOFF.as_secs_f64());
    let jitter = rand::thread_rng().gen_range(-JITTER_FRACTION..=JITTER_FRACTION);
    Duration::from_secs_f64(capped * (1.0 + jitter))
}

// =============================================================================
// URL Redaction
// =============================================================================

/// Remove scope tokens from a URL (or any URL-bearing string) before it
/// reaches a log line or error message.
#[must_use]
pub fn redact_url(raw: &str) -> String {
    static QUERY_TOKEN_RE: OnceLock<Regex> = OnceLock::new();
    static REPORT_PATH_RE: OnceLock<Regex> = OnceLock::new();

    let query_re = QUERY_TOKEN_RE.get_or_init(|| {
        Regex::new(r"([?&](?:workspace_token|cost_report_token)=)[^&\s]*")
            .expect("valid token query regex")
    });
    let path_re = REPORT_PATH_RE.get_or_init(|| {
        Regex::new(r"/cost_reports/[^/?#\s]+").expect("valid report path regex")
    });

    let redacted = query_re.replace_all(raw, "$1****");
    path_re
        .replace_all(&redacted, "/cost_reports/****")
        .into_owned()
}
