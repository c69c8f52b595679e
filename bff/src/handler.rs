use crate::api::utils::HandlerBody;
use crate::errors::BffError;
use crate::sources::{SourceOutcome, SourceRequest, Sources};
use http::Uri;
use hyper::Response;
use std::any::Any;

/// Per-request state carried from `plan` to `merge`
pub type PlanMetadata = Box<dyn Any + Send>;

/// An aggregation endpoint.
///
/// The handler implements endpoint-specific logic:
/// - Which sources to call for an incoming request, and with what parameters
/// - How to merge the settled outcomes into a response
///
/// The executor owns everything in between: issuing the calls concurrently
/// and waiting for all of them to settle.
pub trait Handler: Send + Sync {
    fn name(&self) -> &'static str;

    /// Value of the `error` field when the handler faults
    fn failure_label(&self) -> &'static str;

    /// Derive the source requests for one incoming request.
    ///
    /// Requests must be returned in attempt order.
    fn plan(
        &self,
        uri: &Uri,
        sources: &Sources,
    ) -> Result<(Vec<SourceRequest>, PlanMetadata), BffError>;

    /// Build the response from outcomes listed in the same order as the plan.
    fn merge(
        &self,
        outcomes: Vec<SourceOutcome>,
        metadata: PlanMetadata,
        timestamp: String,
    ) -> Result<Response<HandlerBody>, BffError>;
}
