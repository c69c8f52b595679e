use crate::api::utils::{ErrorBody, HandlerBody, full_body, json_or_plain};
use crate::http::send_to_upstream;
use crate::sources::{SourceEndpoint, SourceName};
use http::StatusCode;
use hyper::body::Bytes;
use hyper::{Request, Response};
use url::Url;

/// Relays any request under its route to one source unchanged.
///
/// Upstream responses, errors included, are passed back as received. Only
/// when the source cannot be reached is a 503 produced.
pub struct PassthroughHandler {
    source: SourceName,
    endpoint: SourceEndpoint,
    client: reqwest::Client,
    mount: Option<Mount>,
}

/// Maps the request path below `route_prefix` onto `upstream_prefix` under
/// the endpoint URL, e.g. `/api/users/profile/42` to `{url}/users/profile/42`.
struct Mount {
    route_prefix: &'static str,
    upstream_prefix: &'static str,
}

impl PassthroughHandler {
    pub fn new(source: SourceName, endpoint: SourceEndpoint, client: reqwest::Client) -> Self {
        Self {
            source,
            endpoint,
            client,
            mount: None,
        }
    }

    /// Forward to a sub-path of the endpoint instead of the endpoint URL itself.
    pub fn mounted(mut self, route_prefix: &'static str, upstream_prefix: &'static str) -> Self {
        self.mount = Some(Mount {
            route_prefix,
            upstream_prefix,
        });
        self
    }

    pub fn name(&self) -> &'static str {
        match self.source {
            SourceName::Mongodb => "passthrough_mongodb",
            SourceName::Azuresql => "passthrough_azuresql",
            SourceName::UserService => "passthrough_user_service",
            SourceName::TransactionService => "passthrough_transaction_service",
        }
    }

    fn upstream_url(&self, path: &str) -> Url {
        let mut url = self.endpoint.url.clone();
        if let Some(mount) = &self.mount {
            let rest = path.strip_prefix(mount.route_prefix).unwrap_or_default();
            let mounted = format!(
                "{}/{}{}",
                url.path().trim_end_matches('/'),
                mount.upstream_prefix,
                rest
            );
            url.set_path(&mounted);
        }
        url
    }

    pub async fn forward(&self, request: Request<Bytes>) -> Response<HandlerBody> {
        let url = self.upstream_url(request.uri().path());
        match send_to_upstream(&self.client, &self.endpoint, self.source, url, request).await {
            Ok(response) => response.map(full_body),
            Err(e) => {
                tracing::warn!(source = %self.source, error = %e, "Passthrough request failed");
                json_or_plain(
                    StatusCode::SERVICE_UNAVAILABLE,
                    &ErrorBody::new(format!("{} unavailable", self.source.display_name()))
                        .with_message(e.to_string()),
                )
            }
        }
    }
}
