//! OpenAI-compatible chat-completions client.

use parley_types::{ApiError, CompletionRequest, CompletionResponse};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use std::time::Duration;

use crate::retry::{RetryConfig, is_retryable};

/// Default per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Client for a `/chat/completions` endpoint (Groq, OpenAI, or compatible).
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    retry_config: RetryConfig,
}

impl ApiClient {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        Ok(Self {
            http,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            retry_config: RetryConfig::default(),
        })
    }

    /// Retry policy for transient errors (429, 503, 5xx, network).
    pub fn with_retry_config(mut self, config: RetryConfig) -> Self {
        self.retry_config = config;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send a non-streaming completion request, retrying transient failures.
    pub async fn create_completion(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, ApiError> {
        let url = format!("{}/chat/completions", self.base_url);
        let headers = self.headers()?;
        let body = serde_json::to_string(request).map_err(|e| ApiError::BadRequest {
            message: format!("Failed to serialize request: {e}"),
        })?;

        let attempts = self.retry_config.attempts();
        let mut attempt = 0;
        loop {
            tracing::debug!("POST {url} (attempt {}/{attempts})", attempt + 1);

            let (err, retry_after) = match self
                .http
                .post(&url)
                .headers(headers.clone())
                .body(body.clone())
                .send()
                .await
            {
                Ok(response) if response.status().is_success() => {
                    let text = response
                        .text()
                        .await
                        .map_err(|e| ApiError::Network(e.to_string()))?;
                    return serde_json::from_str(&text)
                        .map_err(|e| ApiError::InvalidResponse(e.to_string()));
                }
                Ok(response) => {
                    let status = response.status().as_u16();
                    let retry_after = parse_retry_after(response.headers());
                    let body_text = response.text().await.unwrap_or_default();
                    (classify_error(status, &body_text, retry_after), retry_after)
                }
                Err(e) if e.is_timeout() => (ApiError::Timeout, None),
                Err(e) => (ApiError::Network(e.to_string()), None),
            };

            if !is_retryable(&err) || attempt + 1 >= attempts {
                return Err(err);
            }

            let delay = self.retry_config.delay_for(attempt, retry_after);
            tracing::warn!(
                "Retryable completion error (attempt {}/{attempts}): {err}. Retrying in {}ms",
                attempt + 1,
                delay.as_millis(),
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    fn headers(&self) -> Result<HeaderMap, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.api_key)).map_err(|_| {
            ApiError::Auth {
                message: "Invalid API key format".into(),
            }
        })?;
        headers.insert(AUTHORIZATION, bearer);
        Ok(headers)
    }
}

/// `retry-after` header in seconds, converted to milliseconds.
fn parse_retry_after(headers: &HeaderMap) -> Option<u64> {
    headers
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(|secs| (secs * 1000.0) as u64)
}

/// Map an HTTP error status and body to an [`ApiError`].
fn classify_error(status: u16, body: &str, retry_after: Option<u64>) -> ApiError {
    #[derive(serde::Deserialize)]
    struct ErrorBody {
        error: Option<ErrorDetail>,
    }
    #[derive(serde::Deserialize)]
    struct ErrorDetail {
        message: Option<String>,
    }

    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error)
        .and_then(|e| e.message)
        .unwrap_or_else(|| body.to_string());

    match status {
        400 | 404 | 422 => ApiError::BadRequest { message },
        401 | 403 => ApiError::Auth { message },
        429 => ApiError::RateLimited {
            retry_after_ms: retry_after,
        },
        503 => ApiError::Overloaded,
        _ => ApiError::Server { status, message },
    }
}
