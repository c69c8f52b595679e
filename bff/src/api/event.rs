use crate::api::utils::{ErrorBody, HandlerBody, json_or_plain, timestamp_now};
use crate::client::{FUNCTION_KEY_HEADER, SourceError, classify_error, read_json};
use crate::merger::is_truthy;
use crate::sources::{SourceEndpoint, SourceName};
use http::StatusCode;
use hyper::body::Bytes;
use hyper::{Request, Response};
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

/// Which function an event is written to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventTarget {
    Mongodb,
    Azuresql,
}

impl EventTarget {
    pub fn source(&self) -> SourceName {
        match self {
            EventTarget::Mongodb => SourceName::Mongodb,
            EventTarget::Azuresql => SourceName::Azuresql,
        }
    }

    /// Body field naming the collection or table; also sent as a query parameter.
    fn field(&self) -> &'static str {
        match self {
            EventTarget::Mongodb => "collection",
            EventTarget::Azuresql => "table",
        }
    }

    fn missing_fields_message(&self) -> &'static str {
        match self {
            EventTarget::Mongodb => "Collection and data are required",
            EventTarget::Azuresql => "Table and data are required",
        }
    }

    fn accepted_message(&self) -> &'static str {
        match self {
            EventTarget::Mongodb => "Event sent to MongoDB Function",
            EventTarget::Azuresql => "Event sent to Azure SQL Function",
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EventAccepted {
    success: bool,
    message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    event_id: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    record_id: Option<JsonValue>,
    timestamp: String,
}

/// `POST /api/mongodb/event` and `POST /api/azuresql/event`
///
/// Body is `{collection|table, data}`. Both fields must be truthy. The pair is
/// posted to the function with the target repeated in the query string. A 2xx
/// reply gives 202 with the id the function assigned:
/// - MongoDB: `eventId` from `insertedId`
/// - Azure SQL: `recordId` from `data.id`
///
/// Any upstream failure, non-2xx included, gives 500.
pub struct EventHandler {
    target: EventTarget,
    endpoint: SourceEndpoint,
    client: reqwest::Client,
}

impl EventHandler {
    pub fn new(target: EventTarget, endpoint: SourceEndpoint, client: reqwest::Client) -> Self {
        Self {
            target,
            endpoint,
            client,
        }
    }

    pub fn name(&self) -> &'static str {
        match self.target {
            EventTarget::Mongodb => "event_mongodb",
            EventTarget::Azuresql => "event_azuresql",
        }
    }

    pub async fn accept(&self, request: Request<Bytes>) -> Response<HandlerBody> {
        let body = request.into_body();
        let event: JsonValue = if body.is_empty() {
            JsonValue::Object(Map::new())
        } else {
            match serde_json::from_slice(&body) {
                Ok(event) => event,
                Err(_) => {
                    return json_or_plain(
                        StatusCode::BAD_REQUEST,
                        &ErrorBody::new("Invalid JSON payload"),
                    );
                }
            }
        };

        let field = self.target.field();
        let (Some(target), Some(data)) = (
            event.get(field).filter(|v| is_truthy(v)),
            event.get("data").filter(|v| is_truthy(v)),
        ) else {
            return json_or_plain(
                StatusCode::BAD_REQUEST,
                &ErrorBody::new(self.target.missing_fields_message()),
            );
        };

        match self.send(target, data).await {
            Ok(reply) => {
                let (event_id, record_id) = match self.target {
                    EventTarget::Mongodb => (reply.pointer("/insertedId").cloned(), None),
                    EventTarget::Azuresql => (None, reply.pointer("/data/id").cloned()),
                };
                json_or_plain(
                    StatusCode::ACCEPTED,
                    &EventAccepted {
                        success: true,
                        message: self.target.accepted_message(),
                        event_id,
                        record_id,
                        timestamp: timestamp_now(),
                    },
                )
            }
            Err(e) => {
                tracing::error!(source = %self.target.source(), error = %e, "Failed to send event");
                json_or_plain(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    &ErrorBody::new("Failed to send event").with_message(e.to_string()),
                )
            }
        }
    }

    async fn send(&self, target: &JsonValue, data: &JsonValue) -> Result<JsonValue, SourceError> {
        let field = self.target.field();
        let target_param = match target {
            JsonValue::String(s) => s.clone(),
            other => other.to_string(),
        };

        let mut payload = Map::new();
        payload.insert(field.to_string(), target.clone());
        payload.insert("data".to_string(), data.clone());

        let mut builder = self
            .client
            .post(self.endpoint.url.clone())
            .query(&[(field, target_param)])
            .json(&payload)
            .timeout(self.endpoint.timeout);
        if let Some(key) = &self.endpoint.function_key {
            builder = builder.header(FUNCTION_KEY_HEADER, key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| classify_error(e, self.endpoint.timeout))?;

        read_json(response, self.endpoint.timeout).await
    }
}
