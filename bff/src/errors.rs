use crate::config::ValidationError;
use thiserror::Error;

/// Errors raised while serving a BFF request.
///
/// Individual source failures never surface here; they are folded into the
/// aggregation envelope as data. What remains are malformed requests and
/// faults in the service itself.
#[derive(Error, Debug)]
pub enum BffError {
    #[error("{0} is required")]
    MissingParameter(&'static str),

    #[error("{0} is invalid")]
    InvalidParameter(&'static str),

    #[error("Failed to read request body: {0}")]
    RequestBodyError(String),

    #[error("Request body exceeds {0} bytes")]
    PayloadTooLarge(usize),

    #[error("Failed to read response body: {0}")]
    ResponseBodyError(String),

    #[error("Upstream request failed for {0}: {1}")]
    UpstreamRequestFailed(String, String),

    #[error("Upstream timeout for {0}")]
    UpstreamTimeout(String),

    #[error("Upstream URL for {0} cannot be used as a base")]
    InvalidUpstreamUrl(String),

    #[error("Response serialization error: {0}")]
    ResponseSerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpClientError(#[from] reqwest::Error),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ValidationError),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BffError {
    /// True for errors caused by the caller rather than by the service.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            BffError::MissingParameter(_)
                | BffError::InvalidParameter(_)
                | BffError::RequestBodyError(_)
                | BffError::PayloadTooLarge(_)
        )
    }
}
