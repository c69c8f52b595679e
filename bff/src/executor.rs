use crate::api::utils::{HandlerBody, error_response, timestamp_now};
use crate::client::SourceClient;
use crate::handler::Handler;
use crate::metrics_defs::{SOURCE_FAILURES, SOURCE_REQUEST_DURATION};
use crate::sources::{SourceName, SourceOutcome, SourceRequest, SourceResult, Sources};
use http::Uri;
use hyper::Response;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Runs a handler's plan against the sources and merges the outcomes.
#[derive(Clone)]
pub struct Executor {
    client: Arc<dyn SourceClient>,
    sources: Arc<Sources>,
}

impl Executor {
    pub fn new(client: Arc<dyn SourceClient>, sources: Arc<Sources>) -> Self {
        Self { client, sources }
    }

    // Plans, settles, and merges using the provided handler.
    pub async fn execute(&self, handler: &dyn Handler, uri: &Uri) -> Response<HandlerBody> {
        let (requests, metadata) = match handler.plan(uri, &self.sources) {
            Ok(plan) => plan,
            Err(e) => return error_response(handler.failure_label(), e),
        };

        tracing::debug!(
            handler = handler.name(),
            sources = requests.len(),
            "Fanning out source requests"
        );

        let outcomes = self.settle_all(requests).await;

        handler
            .merge(outcomes, metadata, timestamp_now())
            .unwrap_or_else(|e| error_response(handler.failure_label(), e))
    }

    /// Issue every request concurrently and wait until all of them have settled.
    ///
    /// No request is cancelled because another one failed, and there is no
    /// deadline beyond each request's own timeout. Outcomes are returned in
    /// the order of `requests`, whatever order they completed in. A task
    /// that panics settles as a failure of its source.
    ///
    /// Calls run as detached tasks: if the caller is dropped mid-flight they
    /// still run to completion or their own timeout.
    pub async fn settle_all(&self, requests: Vec<SourceRequest>) -> Vec<SourceOutcome> {
        let handles: Vec<(SourceName, JoinHandle<SourceResult>)> = requests
            .into_iter()
            .map(|request| {
                let client = self.client.clone();
                let name = request.name;

                let handle = tokio::spawn(async move {
                    let started = Instant::now();
                    let result = client.fetch(&request).await;
                    record_source_metrics(request.name, &result, started);
                    result
                });

                (name, handle)
            })
            .collect();

        let mut outcomes = Vec::with_capacity(handles.len());
        for (name, handle) in handles {
            let result = handle.await.unwrap_or_else(|e| {
                tracing::error!(source = %name, error = %e, "Source task failed");
                SourceResult::Failure("source task did not complete".to_string())
            });
            outcomes.push(SourceOutcome { name, result });
        }

        outcomes
    }
}

fn record_source_metrics(name: SourceName, result: &SourceResult, started: Instant) {
    let outcome = if result.is_success() {
        "success"
    } else {
        shared::counter!(SOURCE_FAILURES, "source" => name.as_str()).increment(1);
        "failure"
    };

    shared::histogram!(
        SOURCE_REQUEST_DURATION,
        "source" => name.as_str(),
        "outcome" => outcome
    )
    .record(started.elapsed().as_secs_f64());
}
