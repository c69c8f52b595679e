use crate::api::utils::{HandlerBody, json_response, query_param};
use crate::errors::BffError;
use crate::handler::{Handler, PlanMetadata};
use crate::merger::AggregationEnvelope;
use crate::sources::{
    SourceName, SourceOutcome, SourceRequest, Sources, mongo_user_filter, sql_user_clause,
};
use http::{StatusCode, Uri};
use hyper::Response;

/// `GET /api/aggregation/data?mongoCollection=&sqlTable=&userId=`
///
/// Each source is attempted only when its parameters are present:
/// - `mongoCollection`: MongoDB function, filtered by user when `userId` is set
/// - `sqlTable`: Azure SQL function, restricted to the user when `userId` is set
/// - `userId`: User Service profile and Transaction Service summary
///
/// With no parameters nothing is attempted and an empty envelope is returned.
pub struct DataAggregationHandler;

impl Handler for DataAggregationHandler {
    fn name(&self) -> &'static str {
        "aggregation_data"
    }

    fn failure_label(&self) -> &'static str {
        "Aggregation failed"
    }

    fn plan(
        &self,
        uri: &Uri,
        sources: &Sources,
    ) -> Result<(Vec<SourceRequest>, PlanMetadata), BffError> {
        let mongo_collection = query_param(uri, "mongoCollection");
        let sql_table = query_param(uri, "sqlTable");
        let user_id = query_param(uri, "userId");

        let mut requests = Vec::new();

        if let Some(collection) = mongo_collection {
            let mut query = vec![("collection", collection)];
            if let Some(user_id) = &user_id {
                query.push(("filter", mongo_user_filter(user_id)));
            }
            requests.push(
                sources
                    .get(SourceName::Mongodb)
                    .query(SourceName::Mongodb, query),
            );
        }

        if let Some(table) = sql_table {
            let mut query = vec![("table", table)];
            if let Some(user_id) = &user_id {
                query.push(("where", sql_user_clause(user_id)));
            }
            requests.push(
                sources
                    .get(SourceName::Azuresql)
                    .query(SourceName::Azuresql, query),
            );
        }

        if let Some(user_id) = &user_id {
            requests.push(
                sources
                    .get(SourceName::UserService)
                    .path(SourceName::UserService, &["users", "profile", user_id.as_str()])?,
            );
            requests.push(sources.get(SourceName::TransactionService).path(
                SourceName::TransactionService,
                &["transactions", "user", user_id.as_str(), "summary"],
            )?);
        }

        let metadata: PlanMetadata = Box::new(());
        Ok((requests, metadata))
    }

    fn merge(
        &self,
        outcomes: Vec<SourceOutcome>,
        _metadata: PlanMetadata,
        timestamp: String,
    ) -> Result<Response<HandlerBody>, BffError> {
        let envelope = AggregationEnvelope::merge(outcomes, timestamp);
        json_response(StatusCode::OK, &envelope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutils::local_sources;
    use std::collections::HashSet;
    use std::time::Duration;

    fn plan(query: &str) -> Vec<SourceRequest> {
        let sources = local_sources([7071, 7072, 3001, 3002], Duration::from_secs(5));
        let uri: Uri = format!("/api/aggregation/data{query}").parse().unwrap();
        let (requests, _) = DataAggregationHandler.plan(&uri, &sources).unwrap();
        requests
    }

    fn names(requests: &[SourceRequest]) -> Vec<SourceName> {
        requests.iter().map(|r| r.name).collect()
    }

    #[test]
    fn test_source_selection_for_every_parameter_subset() {
        let params = [
            ("mongoCollection=accounts", vec![SourceName::Mongodb]),
            ("sqlTable=transactions", vec![SourceName::Azuresql]),
            (
                "userId=42",
                vec![SourceName::UserService, SourceName::TransactionService],
            ),
        ];

        for mask in 0..8u8 {
            let mut query = Vec::new();
            let mut expected = HashSet::new();
            for (bit, (param, implied)) in params.iter().enumerate() {
                if mask & (1 << bit) != 0 {
                    query.push(*param);
                    expected.extend(implied.iter().copied());
                }
            }

            let query = if query.is_empty() {
                String::new()
            } else {
                format!("?{}", query.join("&"))
            };
            let selected: HashSet<_> = names(&plan(&query)).into_iter().collect();
            assert_eq!(selected, expected, "query {query:?}");
        }
    }

    #[test]
    fn test_attempt_order() {
        let requests = plan("?userId=42&sqlTable=t&mongoCollection=c");
        assert_eq!(names(&requests), SourceName::ALL.to_vec());
    }

    #[test]
    fn test_empty_parameters_are_skipped() {
        assert!(plan("?mongoCollection=&sqlTable=&userId=").is_empty());
        assert!(plan("").is_empty());
    }

    #[test]
    fn test_function_queries_without_user() {
        let requests = plan("?mongoCollection=accounts&sqlTable=transactions");

        assert_eq!(
            requests[0].query,
            vec![("collection", "accounts".to_string())]
        );
        assert_eq!(
            requests[1].query,
            vec![("table", "transactions".to_string())]
        );
    }

    #[test]
    fn test_function_queries_with_user() {
        let requests = plan("?mongoCollection=accounts&sqlTable=transactions&userId=42");

        assert_eq!(
            requests[0].query,
            vec![
                ("collection", "accounts".to_string()),
                ("filter", r#"{"userId":"42"}"#.to_string()),
            ]
        );
        assert_eq!(
            requests[1].query,
            vec![
                ("table", "transactions".to_string()),
                ("where", "userId = '42'".to_string()),
            ]
        );
        assert_eq!(
            requests[2].url.as_str(),
            "http://127.0.0.1:3001/api/users/profile/42"
        );
        assert_eq!(
            requests[3].url.as_str(),
            "http://127.0.0.1:3002/api/transactions/user/42/summary"
        );
    }
}
