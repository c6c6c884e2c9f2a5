//! HTTP plumbing shared by the vendor clients.

use board_common::config::HttpConfig;
use reqwest::{RequestBuilder, Response, StatusCode};
use std::time::Duration;

use super::source::SourceError;

/// Build a client with the configured timeout and user agent.
pub(crate) fn build_client(http: &HttpConfig) -> Result<reqwest::Client, SourceError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(http.timeout_secs))
        .user_agent(http.user_agent.as_str())
        .build()
        .map_err(|e| SourceError::InvalidRequest(format!("Failed to build HTTP client: {e}")))
}

/// Send a request and turn non-success statuses into [`SourceError`]s.
pub(crate) async fn send(request: RequestBuilder) -> Result<Response, SourceError> {
    let response = request.send().await?;
    let status = response.status();

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after_secs = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());
        return Err(SourceError::RateLimited { retry_after_secs });
    }
    if !status.is_success() {
        return Err(SourceError::Network(format!("HTTP {}", status)));
    }
    Ok(response)
}

/// Send and read the body as text.
pub(crate) async fn get_text(request: RequestBuilder) -> Result<String, SourceError> {
    let response = send(request).await?;
    response
        .text()
        .await
        .map_err(|e| SourceError::Parse(format!("Failed to read body: {e}")))
}

/// Send and decode a JSON body.
pub(crate) async fn get_json<T: serde::de::DeserializeOwned>(
    request: RequestBuilder,
) -> Result<T, SourceError> {
    let body = get_text(request).await?;
    serde_json::from_str(&body)
        .map_err(|e| SourceError::Parse(format!("Failed to parse response: {e}")))
}

/// Parse a numeric field, naming it in the error.
pub(crate) fn parse_f64(raw: &str, field: &str) -> Result<f64, SourceError> {
    raw.trim()
        .parse::<f64>()
        .map_err(|e| SourceError::Parse(format!("Failed to parse {field} '{raw}': {e}")))
}
