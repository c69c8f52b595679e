use crate::sources::{SourceRequest, SourceResult};
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::time::Duration;
use thiserror::Error;

/// Header carrying the Azure Functions access key
pub const FUNCTION_KEY_HEADER: &str = "x-functions-key";

/// Why a source call produced no data
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("request timed out after {0}ms")]
    Timeout(u128),

    #[error("request failed with status code {0}")]
    Status(u16),

    #[error("{0}")]
    Transport(String),

    #[error("invalid response body: {0}")]
    InvalidBody(String),
}

/// Performs one outbound call and normalizes its outcome.
///
/// Implementations never fail: every error is reported as
/// `SourceResult::Failure` so that one source cannot abort an aggregation.
#[async_trait]
pub trait SourceClient: Send + Sync {
    async fn fetch(&self, request: &SourceRequest) -> SourceResult;
}

/// `SourceClient` backed by a pooled reqwest client. No retries.
#[derive(Clone)]
pub struct HttpSourceClient {
    client: reqwest::Client,
}

impl HttpSourceClient {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn get_json(&self, request: &SourceRequest) -> Result<JsonValue, SourceError> {
        let mut builder = self
            .client
            .get(request.url.clone())
            .timeout(request.timeout);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(key) = &request.function_key {
            builder = builder.header(FUNCTION_KEY_HEADER, key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| classify_error(e, request.timeout))?;

        read_json(response, request.timeout).await
    }
}

/// Maps a reqwest failure onto the message reported for the source.
pub(crate) fn classify_error(e: reqwest::Error, timeout: Duration) -> SourceError {
    if e.is_timeout() {
        SourceError::Timeout(timeout.as_millis())
    } else {
        SourceError::Transport(e.to_string())
    }
}

/// Reads a 2xx JSON body. An empty body is `null`.
pub(crate) async fn read_json(
    response: reqwest::Response,
    timeout: Duration,
) -> Result<JsonValue, SourceError> {
    let status = response.status();
    if !status.is_success() {
        return Err(SourceError::Status(status.as_u16()));
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| classify_error(e, timeout))?;
    if body.is_empty() {
        return Ok(JsonValue::Null);
    }

    serde_json::from_slice(&body).map_err(|e| SourceError::InvalidBody(e.to_string()))
}

#[async_trait]
impl SourceClient for HttpSourceClient {
    async fn fetch(&self, request: &SourceRequest) -> SourceResult {
        match self.get_json(request).await {
            Ok(payload) => SourceResult::Success(payload),
            Err(e) => {
                tracing::warn!(
                    source = %request.name,
                    url = %request.url,
                    error = %e,
                    "Source request failed"
                );
                SourceResult::Failure(e.to_string())
            }
        }
    }
}
