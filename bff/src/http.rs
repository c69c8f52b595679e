use crate::client::FUNCTION_KEY_HEADER;
use crate::errors::BffError;
use crate::sources::{SourceEndpoint, SourceName};
use http::HeaderValue;
use hyper::body::Bytes;
use hyper::{Request, Response};
use shared::headers::{add_via_header, normalize_relayed_headers};
use url::Url;

pub const VIA_PSEUDONYM: &str = "fincloud-bff";

/// Relay a buffered request to `url` on a source endpoint and buffer its
/// response.
///
/// `url` replaces the request path; the incoming query string is kept as is. Hop-by-hop headers are dropped in both directions, a Via entry
/// is added and the endpoint's function key is attached.
///
/// The endpoint timeout covers the whole exchange, including reading the
/// response body.
pub async fn send_to_upstream(
    client: &reqwest::Client,
    endpoint: &SourceEndpoint,
    source: SourceName,
    mut url: Url,
    request: Request<Bytes>,
) -> Result<Response<Bytes>, BffError> {
    let (mut parts, body) = request.into_parts();

    url.set_query(parts.uri.query());

    let request_version = parts.version;
    normalize_relayed_headers(&mut parts.headers, request_version);
    add_via_header(&mut parts.headers, request_version, VIA_PSEUDONYM);

    if let Some(key) = &endpoint.function_key {
        let value = HeaderValue::from_str(key).map_err(|e| {
            BffError::InternalError(format!("Invalid function key for {source}: {e}"))
        })?;
        parts.headers.insert(FUNCTION_KEY_HEADER, value);
    }

    let classify = |e: reqwest::Error| {
        if e.is_timeout() {
            BffError::UpstreamTimeout(source.to_string())
        } else {
            BffError::UpstreamRequestFailed(source.to_string(), e.to_string())
        }
    };

    let response = client
        .request(parts.method, url)
        .headers(parts.headers)
        .body(body)
        .timeout(endpoint.timeout)
        .send()
        .await
        .map_err(classify)?;

    let status = response.status();
    let response_version = response.version();
    let mut headers = response.headers().clone();
    let body = response.bytes().await.map_err(|e| {
        if e.is_timeout() {
            BffError::UpstreamTimeout(source.to_string())
        } else {
            BffError::ResponseBodyError(e.to_string())
        }
    })?;

    normalize_relayed_headers(&mut headers, response_version);
    add_via_header(&mut headers, response_version, VIA_PSEUDONYM);

    let mut relayed = Response::new(body);
    *relayed.status_mut() = status;
    *relayed.headers_mut() = headers;
    Ok(relayed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutils::{MockResponse, UNREACHABLE_PORT, endpoint, start_mock_server};
    use http::header::{CONNECTION, VIA};
    use http::{Method, StatusCode};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[tokio::test]
    async fn test_send_to_upstream() {
        let received = Arc::new(Mutex::new(None));
        let received_clone = received.clone();

        let port = start_mock_server(move |req| {
            *received_clone.lock().unwrap() = Some(req);
            MockResponse::status(StatusCode::CREATED, r#"{"inserted":1}"#)
        })
        .await;

        let mut target = endpoint(
            &format!("http://127.0.0.1:{port}/api/mongodb-function"),
            Duration::from_secs(5),
        );
        target.function_key = Some("secret".to_string());

        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/mongodb?collection=accounts")
            .header(CONNECTION, "close")
            .header("x-request-id", "abc")
            .body(Bytes::from_static(br#"{"balance":10}"#))
            .unwrap();

        let response = send_to_upstream(
            &reqwest::Client::new(),
            &target,
            SourceName::Mongodb,
            target.url.clone(),
            request,
        )
        .await
        .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.body().as_ref(), br#"{"inserted":1}"#);
        assert!(
            response
                .headers()
                .get(VIA)
                .unwrap()
                .to_str()
                .unwrap()
                .ends_with(VIA_PSEUDONYM)
        );

        let upstream = received.lock().unwrap().take().unwrap();
        assert_eq!(upstream.method, Method::POST);
        assert_eq!(upstream.uri.path(), "/api/mongodb-function");
        assert_eq!(upstream.uri.query(), Some("collection=accounts"));
        assert_eq!(upstream.headers.get(FUNCTION_KEY_HEADER).unwrap(), "secret");
        assert_eq!(upstream.headers.get("x-request-id").unwrap(), "abc");
        assert_eq!(upstream.headers.get(VIA).unwrap(), "1.1 fincloud-bff");
        assert_eq!(upstream.body.as_ref(), br#"{"balance":10}"#);
    }

    #[tokio::test]
    async fn test_send_to_upstream_timeout() {
        let port = start_mock_server(|_| {
            MockResponse::json(serde_json::json!({})).delayed(Duration::from_secs(2))
        })
        .await;

        let target = endpoint(
            &format!("http://127.0.0.1:{port}/api"),
            Duration::from_millis(200),
        );
        let request = Request::builder()
            .uri("/api/azuresql")
            .body(Bytes::new())
            .unwrap();

        let result = send_to_upstream(
            &reqwest::Client::new(),
            &target,
            SourceName::Azuresql,
            target.url.clone(),
            request,
        )
        .await;

        assert!(matches!(result, Err(BffError::UpstreamTimeout(_))));
    }

    #[tokio::test]
    async fn test_send_to_upstream_unreachable() {
        let target = endpoint(
            &format!("http://127.0.0.1:{UNREACHABLE_PORT}/api"),
            Duration::from_secs(5),
        );
        let request = Request::builder()
            .uri("/api/azuresql")
            .body(Bytes::new())
            .unwrap();

        let result = send_to_upstream(
            &reqwest::Client::new(),
            &target,
            SourceName::Azuresql,
            target.url.clone(),
            request,
        )
        .await;

        assert!(matches!(
            result,
            Err(BffError::UpstreamRequestFailed(_, _))
        ));
    }
}
