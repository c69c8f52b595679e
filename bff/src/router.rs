use crate::api::data::DataAggregationHandler;
use crate::api::event::{EventHandler, EventTarget};
use crate::api::health::health_response;
use crate::api::passthrough::PassthroughHandler;
use crate::api::user::{self, UserAggregationHandler};
use crate::api::utils::{HandlerBody, error_response, json_or_plain};
use crate::client::SourceClient;
use crate::errors::BffError;
use crate::executor::Executor;
use crate::handler::Handler;
use crate::metrics_defs::{REQUEST_DURATION, REQUESTS_INFLIGHT};
use crate::sources::{SourceName, Sources};
use http::{Method, StatusCode};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::Bytes;
use hyper::{Request, Response};
use serde::Serialize;
use std::sync::Arc;
use tokio::time::Instant;

/// Largest request body accepted for relaying to a source function
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

enum PathMatch {
    Exact(&'static str),
    /// The path itself or anything below it, on segment boundaries
    Prefix(&'static str),
    /// The path itself or the path followed by exactly one segment
    Param(&'static str),
}

impl PathMatch {
    fn matches(&self, path: &str) -> bool {
        match self {
            PathMatch::Exact(expected) => path == *expected,
            PathMatch::Prefix(prefix) => path
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('/')),
            PathMatch::Param(prefix) => path.strip_prefix(prefix).is_some_and(|rest| {
                match rest.strip_prefix('/') {
                    Some(segment) => !segment.contains('/'),
                    None => rest.is_empty(),
                }
            }),
        }
    }
}

enum RouteAction {
    Aggregate(Box<dyn Handler>),
    Passthrough(PassthroughHandler),
    Event(EventHandler),
    Health,
}

struct Route {
    path: PathMatch,
    /// `None` accepts any method
    method: Option<Method>,
    action: RouteAction,
}

#[derive(Serialize)]
struct NotFound<'a> {
    error: &'static str,
    path: &'a str,
}

/// Dispatches incoming requests to the BFF endpoints.
#[derive(Clone)]
pub struct Router {
    routes: Arc<Vec<Route>>,
    executor: Executor,
}

impl Router {
    pub fn new(
        sources: Arc<Sources>,
        source_client: Arc<dyn SourceClient>,
        http_client: reqwest::Client,
    ) -> Self {
        let routes = vec![
            Route {
                path: PathMatch::Exact("/api/aggregation/data"),
                method: Some(Method::GET),
                action: RouteAction::Aggregate(Box::new(DataAggregationHandler)),
            },
            Route {
                path: PathMatch::Param(user::ROUTE_PREFIX),
                method: Some(Method::GET),
                action: RouteAction::Aggregate(Box::new(UserAggregationHandler)),
            },
            Route {
                path: PathMatch::Exact("/api/mongodb"),
                method: None,
                action: RouteAction::Passthrough(PassthroughHandler::new(
                    SourceName::Mongodb,
                    sources.get(SourceName::Mongodb).clone(),
                    http_client.clone(),
                )),
            },
            Route {
                path: PathMatch::Exact("/api/azuresql"),
                method: None,
                action: RouteAction::Passthrough(PassthroughHandler::new(
                    SourceName::Azuresql,
                    sources.get(SourceName::Azuresql).clone(),
                    http_client.clone(),
                )),
            },
            Route {
                path: PathMatch::Exact("/api/mongodb/event"),
                method: Some(Method::POST),
                action: RouteAction::Event(EventHandler::new(
                    EventTarget::Mongodb,
                    sources.get(SourceName::Mongodb).clone(),
                    http_client.clone(),
                )),
            },
            Route {
                path: PathMatch::Exact("/api/azuresql/event"),
                method: Some(Method::POST),
                action: RouteAction::Event(EventHandler::new(
                    EventTarget::Azuresql,
                    sources.get(SourceName::Azuresql).clone(),
                    http_client.clone(),
                )),
            },
            Route {
                path: PathMatch::Prefix("/api/users"),
                method: None,
                action: RouteAction::Passthrough(
                    PassthroughHandler::new(
                        SourceName::UserService,
                        sources.get(SourceName::UserService).clone(),
                        http_client,
                    )
                    .mounted("/api/users", "users"),
                ),
            },
            Route {
                path: PathMatch::Exact("/api/health"),
                method: Some(Method::GET),
                action: RouteAction::Health,
            },
        ];

        Self {
            routes: Arc::new(routes),
            executor: Executor::new(source_client, sources),
        }
    }

    /// Routes an incoming request and always produces a response.
    pub async fn route<B>(&self, req: Request<B>) -> Response<HandlerBody>
    where
        B: hyper::body::Body<Data = Bytes> + Send + 'static,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let started = Instant::now();
        shared::gauge!(REQUESTS_INFLIGHT).increment(1.0);

        let (handler_name, response) = match self.find_matching_route(&req) {
            Some(route) => {
                tracing::debug!(path = %req.uri().path(), "Matched route");
                self.handle_action(req, &route.action).await
            }
            None => {
                tracing::debug!(
                    method = %req.method(),
                    path = %req.uri().path(),
                    "No route matched"
                );
                ("not_found", handle_no_route(req.uri().path()))
            }
        };

        shared::gauge!(REQUESTS_INFLIGHT).decrement(1.0);
        shared::histogram!(
            REQUEST_DURATION,
            "handler" => handler_name,
            "status" => response.status().as_u16().to_string()
        )
        .record(started.elapsed().as_secs_f64());

        response
    }

    fn find_matching_route<B>(&self, req: &Request<B>) -> Option<&Route> {
        let path = normalize_path(req.uri().path());

        self.routes.iter().find(|route| {
            route.path.matches(path)
                && route
                    .method
                    .as_ref()
                    .is_none_or(|method| method == req.method())
        })
    }

    async fn handle_action<B>(
        &self,
        req: Request<B>,
        action: &RouteAction,
    ) -> (&'static str, Response<HandlerBody>)
    where
        B: hyper::body::Body<Data = Bytes> + Send + 'static,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        match action {
            RouteAction::Aggregate(handler) => (
                handler.name(),
                self.executor.execute(handler.as_ref(), req.uri()).await,
            ),
            RouteAction::Passthrough(handler) => {
                let response = match collect_body(req).await {
                    Ok(req) => handler.forward(req).await,
                    Err(e) => error_response("Request failed", e),
                };
                (handler.name(), response)
            }
            RouteAction::Event(handler) => {
                let response = match collect_body(req).await {
                    Ok(req) => handler.accept(req).await,
                    Err(e) => error_response("Request failed", e),
                };
                (handler.name(), response)
            }
            RouteAction::Health => ("health", health_response()),
        }
    }
}

/// Drops a single trailing slash so `/api/health/` matches `/api/health`.
fn normalize_path(path: &str) -> &str {
    match path.strip_suffix('/') {
        Some(stripped) if !stripped.is_empty() => stripped,
        _ => path,
    }
}

/// Buffers the request body, rejecting bodies over `MAX_BODY_BYTES`.
async fn collect_body<B>(req: Request<B>) -> Result<Request<Bytes>, BffError>
where
    B: hyper::body::Body<Data = Bytes> + Send + 'static,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let (parts, body) = req.into_parts();
    let bytes = Limited::new(body, MAX_BODY_BYTES)
        .collect()
        .await
        .map_err(|e| {
            if e.downcast_ref::<LengthLimitError>().is_some() {
                BffError::PayloadTooLarge(MAX_BODY_BYTES)
            } else {
                BffError::RequestBodyError(e.to_string())
            }
        })?
        .to_bytes();

    Ok(Request::from_parts(parts, bytes))
}

fn handle_no_route(path: &str) -> Response<HandlerBody> {
    json_or_plain(
        StatusCode::NOT_FOUND,
        &NotFound {
            error: "Endpoint not found",
            path,
        },
    )
}
