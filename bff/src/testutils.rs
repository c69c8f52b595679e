use crate::client::SourceClient;
use crate::sources::{SourceEndpoint, SourceName, SourceRequest, SourceResult, Sources};
use async_trait::async_trait;
use http::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use http::{Method, StatusCode, Uri};
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::{TokioExecutor, TokioIo};
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use url::Url;

/// Nothing listens here; connections are refused immediately.
pub const UNREACHABLE_PORT: u16 = 1;

/// What a mock upstream received
#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
}

pub struct MockResponse {
    pub status: StatusCode,
    pub body: Bytes,
    pub delay: Duration,
}

impl MockResponse {
    pub fn json(value: serde_json::Value) -> Self {
        Self {
            status: StatusCode::OK,
            body: Bytes::from(value.to_string()),
            delay: Duration::ZERO,
        }
    }

    pub fn status(status: StatusCode, body: &str) -> Self {
        Self {
            status,
            body: Bytes::from(body.to_string()),
            delay: Duration::ZERO,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Start a mock HTTP upstream on a random loopback port.
///
/// The listener is bound before this returns, so the port is immediately usable.
pub async fn start_mock_server<F>(respond: F) -> u16
where
    F: Fn(RecordedRequest) -> MockResponse + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let respond = Arc::new(respond);

    tokio::spawn(async move {
        loop {
            let (stream, _) = listener.accept().await.unwrap();
            let io = TokioIo::new(stream);
            let respond = respond.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req: Request<Incoming>| {
                    let respond = respond.clone();
                    async move {
                        let (parts, body) = req.into_parts();
                        let body = body
                            .collect()
                            .await
                            .map(|collected| collected.to_bytes())
                            .unwrap_or_default();

                        let mock = respond(RecordedRequest {
                            method: parts.method,
                            uri: parts.uri,
                            headers: parts.headers,
                            body,
                        });
                        tokio::time::sleep(mock.delay).await;

                        let mut response = Response::new(Full::new(mock.body));
                        *response.status_mut() = mock.status;
                        response
                            .headers_mut()
                            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                        Ok::<_, Infallible>(response)
                    }
                });

                let _ = hyper_util::server::conn::auto::Builder::new(TokioExecutor::new())
                    .serve_connection(io, service)
                    .await;
            });
        }
    });

    port
}

pub fn endpoint(url: &str, timeout: Duration) -> SourceEndpoint {
    SourceEndpoint {
        url: Url::parse(url).unwrap(),
        function_key: None,
        timeout,
    }
}

/// Sources pointing at loopback ports, in attempt order.
pub fn local_sources(ports: [u16; 4], timeout: Duration) -> Sources {
    let [mongo, sql, users, transactions] = ports;
    Sources::new(
        endpoint(
            &format!("http://127.0.0.1:{mongo}/api/mongodb-function"),
            timeout,
        ),
        endpoint(
            &format!("http://127.0.0.1:{sql}/api/azuresql-function"),
            timeout,
        ),
        endpoint(&format!("http://127.0.0.1:{users}/api"), timeout),
        endpoint(&format!("http://127.0.0.1:{transactions}/api"), timeout),
    )
}

/// In-process `SourceClient` with a scripted reply and delay per source.
///
/// Unscripted sources fail. Every request is recorded in call order.
#[derive(Default)]
pub struct ScriptedClient {
    replies: HashMap<SourceName, (Duration, SourceResult)>,
    pub calls: Mutex<Vec<SourceRequest>>,
}

impl ScriptedClient {
    pub fn reply(mut self, name: SourceName, result: SourceResult) -> Self {
        self.replies.insert(name, (Duration::ZERO, result));
        self
    }

    pub fn reply_after(mut self, name: SourceName, delay: Duration, result: SourceResult) -> Self {
        self.replies.insert(name, (delay, result));
        self
    }

    pub fn called(&self) -> Vec<SourceName> {
        let mut names: Vec<_> = self.calls.lock().unwrap().iter().map(|r| r.name).collect();
        names.sort_by_key(|name| SourceName::ALL.iter().position(|n| n == name));
        names
    }
}

#[async_trait]
impl SourceClient for ScriptedClient {
    async fn fetch(&self, request: &SourceRequest) -> SourceResult {
        self.calls.lock().unwrap().push(request.clone());

        match self.replies.get(&request.name) {
            Some((delay, result)) => {
                tokio::time::sleep(*delay).await;
                result.clone()
            }
            None => SourceResult::Failure(format!("{} is not scripted", request.name)),
        }
    }
}
