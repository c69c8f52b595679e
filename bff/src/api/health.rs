use crate::api::utils::{HandlerBody, json_or_plain, timestamp_now};
use http::StatusCode;
use hyper::Response;
use serde::Serialize;

#[derive(Serialize)]
struct HealthStatus {
    status: &'static str,
    service: &'static str,
    timestamp: String,
}

/// `GET /api/health`. Reports the BFF itself; sources are not contacted.
pub fn health_response() -> Response<HandlerBody> {
    json_or_plain(
        StatusCode::OK,
        &HealthStatus {
            status: "healthy",
            service: "bff",
            timestamp: timestamp_now(),
        },
    )
}
