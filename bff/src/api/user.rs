use crate::api::utils::{HandlerBody, json_response};
use crate::errors::BffError;
use crate::handler::{Handler, PlanMetadata};
use crate::merger::UserEnvelope;
use crate::sources::{
    SourceName, SourceOutcome, SourceRequest, Sources, mongo_user_filter, sql_user_clause,
};
use http::{StatusCode, Uri};
use hyper::Response;
use percent_encoding::percent_decode_str;

pub const ROUTE_PREFIX: &str = "/api/aggregation/user";

const PREFERENCES_COLLECTION: &str = "user_preferences";
const AUDIT_LOG_TABLE: &str = "user_audit_logs";

/// `GET /api/aggregation/user/{userId}`
///
/// Always attempts all four sources for the user.
pub struct UserAggregationHandler;

/// Extracts the decoded user id following the route prefix.
fn user_id_from_path(path: &str) -> Result<String, BffError> {
    let raw = path
        .strip_prefix(ROUTE_PREFIX)
        .unwrap_or_default()
        .trim_matches('/');

    if raw.is_empty() {
        return Err(BffError::MissingParameter("userId"));
    }
    if raw.contains('/') {
        return Err(BffError::InvalidParameter("userId"));
    }

    let decoded = percent_decode_str(raw)
        .decode_utf8()
        .map_err(|_| BffError::InvalidParameter("userId"))?;

    if decoded.is_empty() {
        return Err(BffError::MissingParameter("userId"));
    }

    Ok(decoded.into_owned())
}

impl Handler for UserAggregationHandler {
    fn name(&self) -> &'static str {
        "aggregation_user"
    }

    fn failure_label(&self) -> &'static str {
        "User aggregation failed"
    }

    fn plan(
        &self,
        uri: &Uri,
        sources: &Sources,
    ) -> Result<(Vec<SourceRequest>, PlanMetadata), BffError> {
        let user_id = user_id_from_path(uri.path())?;

        let requests = vec![
            sources.get(SourceName::Mongodb).query(
                SourceName::Mongodb,
                vec![
                    ("collection", PREFERENCES_COLLECTION.to_string()),
                    ("filter", mongo_user_filter(&user_id)),
                ],
            ),
            sources.get(SourceName::Azuresql).query(
                SourceName::Azuresql,
                vec![
                    ("table", AUDIT_LOG_TABLE.to_string()),
                    ("where", sql_user_clause(&user_id)),
                ],
            ),
            sources
                .get(SourceName::UserService)
                .path(SourceName::UserService, &["users", "profile", user_id.as_str()])?,
            sources.get(SourceName::TransactionService).path(
                SourceName::TransactionService,
                &["transactions", "user", user_id.as_str(), "summary"],
            )?,
        ];

        let metadata: PlanMetadata = Box::new(user_id);
        Ok((requests, metadata))
    }

    fn merge(
        &self,
        outcomes: Vec<SourceOutcome>,
        metadata: PlanMetadata,
        timestamp: String,
    ) -> Result<Response<HandlerBody>, BffError> {
        let user_id = metadata
            .downcast::<String>()
            .map_err(|_| BffError::InternalError("user id missing from plan".to_string()))?;

        let envelope = UserEnvelope::merge(*user_id, outcomes, timestamp);
        json_response(StatusCode::OK, &envelope)
    }
}
