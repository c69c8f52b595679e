pub mod api;
pub mod client;
pub mod config;
pub mod errors;
pub mod executor;
pub mod handler;
pub mod http;
pub mod merger;
pub mod metrics_defs;
pub mod router;
pub mod sources;

#[cfg(test)]
mod testutils;

use crate::client::HttpSourceClient;
use crate::errors::BffError;
use crate::router::Router;
use crate::sources::Sources;
use http_body_util::combinators::BoxBody;
use hyper::body::{Bytes, Incoming};
use hyper::service::Service;
use hyper::{Request, Response};
use shared::admin_service::AdminService;
use shared::http::{bind, serve};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

pub async fn run(config: config::Config) -> Result<(), BffError> {
    config.validate()?;

    let http_client = reqwest::Client::builder().build()?;
    let sources = Arc::new(Sources::from_config(&config.sources));
    let source_client = Arc::new(HttpSourceClient::new(http_client.clone()));
    let router = Router::new(sources, source_client, http_client);

    let ready = Arc::new(AtomicBool::new(false));
    let ready_flag = ready.clone();
    let admin_service =
        AdminService::<_, BffError>::new(move || ready_flag.load(Ordering::Relaxed));
    let admin_listener = bind(&config.admin_listener.host, config.admin_listener.port).await?;
    let admin_task = tokio::spawn(serve(admin_listener, admin_service));

    let listener = bind(&config.listener.host, config.listener.port).await?;
    let bff_task = tokio::spawn(serve(listener, BffService { router }));
    ready.store(true, Ordering::Relaxed);

    tracing::info!(
        host = %config.listener.host,
        port = config.listener.port,
        admin_port = config.admin_listener.port,
        "BFF listening"
    );

    match tokio::try_join!(bff_task, admin_task) {
        Ok((bff_result, admin_result)) => {
            bff_result?;
            admin_result?;
            Ok(())
        }
        Err(e) => Err(BffError::InternalError(format!("Server task failed: {e}"))),
    }
}

struct BffService {
    router: Router,
}

impl Service<Request<Incoming>> for BffService {
    type Response = Response<BoxBody<Bytes, Self::Error>>;
    type Error = BffError;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let router = self.router.clone();
        Box::pin(async move { Ok(router.route(req).await) })
    }
}
