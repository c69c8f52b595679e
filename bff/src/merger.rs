//! Merging of settled source outcomes into response envelopes.
//!
//! Outcomes arrive in attempt order. Successful payloads are kept verbatim;
//! failures are recorded both as an `{error, available: false}` marker (for
//! the `/data` envelope) and as an entry in the ordered error list.
//!
//! In the `/data` envelope a source is unavailable whenever its entry carries
//! a truthy `error` key, including a 2xx payload that reports its own error.

use crate::sources::{SourceName, SourceOutcome, SourceResult};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Value as JsonValue, json};

/// One failed source
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SourceFailure {
    pub source: SourceName,
    pub error: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_sources: usize,
    pub available_sources: usize,
    pub errors: Vec<SourceFailure>,
}

/// Response of `GET /api/aggregation/data`.
///
/// Every attempted source appears in `sources` exactly once.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AggregationEnvelope {
    pub success: bool,
    pub timestamp: String,
    pub sources: IndexMap<&'static str, JsonValue>,
    pub summary: Summary,
}

impl AggregationEnvelope {
    pub fn merge(outcomes: Vec<SourceOutcome>, timestamp: String) -> Self {
        let total_sources = outcomes.len();
        let mut sources = IndexMap::with_capacity(total_sources);
        let mut errors = Vec::new();

        for SourceOutcome { name, result } in outcomes {
            let entry = match result {
                SourceResult::Success(payload) => {
                    if let Some(error) = reported_error(&payload) {
                        errors.push(SourceFailure {
                            source: name,
                            error,
                        });
                    }
                    payload
                }
                SourceResult::Failure(error) => {
                    let marker = json!({ "error": error, "available": false });
                    errors.push(SourceFailure {
                        source: name,
                        error,
                    });
                    marker
                }
            };
            sources.insert(name.as_str(), entry);
        }

        Self {
            success: true,
            timestamp,
            sources,
            summary: Summary {
                total_sources,
                available_sources: total_sources - errors.len(),
                errors,
            },
        }
    }
}

/// JavaScript-style truthiness of a JSON value.
pub fn is_truthy(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => false,
        JsonValue::Bool(b) => *b,
        JsonValue::Number(n) => n.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
        JsonValue::String(s) => !s.is_empty(),
        JsonValue::Array(_) | JsonValue::Object(_) => true,
    }
}

/// Error reported inside a successful payload, if any.
fn reported_error(payload: &JsonValue) -> Option<String> {
    let error = payload.get("error").filter(|error| is_truthy(error))?;
    Some(match error {
        JsonValue::String(message) => message.clone(),
        other => other.to_string(),
    })
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserData {
    pub preferences: Option<JsonValue>,
    pub audit_logs: Option<JsonValue>,
    pub profile: Option<JsonValue>,
    pub transactions: Option<JsonValue>,
}

impl UserData {
    fn slot(&mut self, name: SourceName) -> &mut Option<JsonValue> {
        match name {
            SourceName::Mongodb => &mut self.preferences,
            SourceName::Azuresql => &mut self.audit_logs,
            SourceName::UserService => &mut self.profile,
            SourceName::TransactionService => &mut self.transactions,
        }
    }
}

/// Response of `GET /api/aggregation/user/{userId}`. Failed sources are `null`.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserEnvelope {
    pub success: bool,
    pub user_id: String,
    pub data: UserData,
    pub errors: Vec<SourceFailure>,
    pub timestamp: String,
}

impl UserEnvelope {
    pub fn merge(user_id: String, outcomes: Vec<SourceOutcome>, timestamp: String) -> Self {
        let mut data = UserData::default();
        let mut errors = Vec::new();

        for SourceOutcome { name, result } in outcomes {
            match result {
                SourceResult::Success(payload) => *data.slot(name) = Some(payload),
                SourceResult::Failure(error) => errors.push(SourceFailure {
                    source: name,
                    error,
                }),
            }
        }

        Self {
            success: true,
            user_id,
            data,
            errors,
            timestamp,
        }
    }
}
