use crate::errors::BffError;
use chrono::{SecondsFormat, Utc};
use http::header::CONTENT_TYPE;
use http::{StatusCode, Uri};
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};
use hyper::Response;
use hyper::body::Bytes;
use serde::Serialize;
use shared::http::make_boxed_error_response;

pub type HandlerBody = BoxBody<Bytes, BffError>;

/// Current UTC time as ISO-8601 with millisecond precision, e.g. `2025-01-01T00:00:00.000Z`.
pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// First non-empty value of `key` in the query string.
pub fn query_param(uri: &Uri, key: &str) -> Option<String> {
    let query = uri.query()?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
        .filter(|v| !v.is_empty())
}

pub fn full_body(bytes: Bytes) -> HandlerBody {
    Full::new(bytes).map_err(|e| match e {}).boxed()
}

/// Serializes a value to a JSON body.
pub fn serialize_to_body<T: Serialize>(value: &T) -> Result<HandlerBody, BffError> {
    let bytes = serde_json::to_vec(value).map(Bytes::from)?;
    Ok(full_body(bytes))
}

pub fn json_response<T: Serialize>(
    status: StatusCode,
    value: &T,
) -> Result<Response<HandlerBody>, BffError> {
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "application/json")
        .body(serialize_to_body(value)?)
        .map_err(|e| BffError::InternalError(format!("Failed to build response: {e}")))
}

/// Like `json_response`, falling back to a plain-text error if the body cannot be built.
pub fn json_or_plain<T: Serialize>(status: StatusCode, value: &T) -> Response<HandlerBody> {
    json_response(status, value).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to build JSON response");
        make_boxed_error_response(StatusCode::INTERNAL_SERVER_ERROR)
    })
}

/// Body of every error response produced by the BFF itself
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub timestamp: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: None,
            timestamp: timestamp_now(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Maps a handler error onto its response.
///
/// Caller mistakes keep their own message. Anything else is an internal
/// fault: it is logged and reported under `failure_label`.
pub fn error_response(failure_label: &str, error: BffError) -> Response<HandlerBody> {
    match error {
        BffError::PayloadTooLarge(_) => {
            json_or_plain(StatusCode::PAYLOAD_TOO_LARGE, &ErrorBody::new(error.to_string()))
        }
        error if error.is_client_error() => {
            json_or_plain(StatusCode::BAD_REQUEST, &ErrorBody::new(error.to_string()))
        }
        error => {
            tracing::error!(error = %error, "{failure_label}");
            json_or_plain(
                StatusCode::INTERNAL_SERVER_ERROR,
                &ErrorBody::new(failure_label).with_message(error.to_string()),
            )
        }
    }
}
