//! Downstream data sources and the requests issued against them.
//!
//! A [`SourceRequest`] is built per incoming request from the immutable
//! [`Sources`] table and settles into a [`SourceResult`], which the merger
//! converts into wire JSON.

use crate::config::{SourceConfig, SourcesConfig};
use crate::errors::BffError;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::fmt;
use std::time::Duration;
use url::Url;

/// Identifies one of the downstream sources.
///
/// The declaration order is the attempt order used by every aggregation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SourceName {
    Mongodb,
    Azuresql,
    UserService,
    TransactionService,
}

impl SourceName {
    pub const ALL: [SourceName; 4] = [
        SourceName::Mongodb,
        SourceName::Azuresql,
        SourceName::UserService,
        SourceName::TransactionService,
    ];

    /// Key used in envelopes and error entries
    pub const fn as_str(&self) -> &'static str {
        match self {
            SourceName::Mongodb => "mongodb",
            SourceName::Azuresql => "azuresql",
            SourceName::UserService => "userService",
            SourceName::TransactionService => "transactionService",
        }
    }

    pub const fn display_name(&self) -> &'static str {
        match self {
            SourceName::Mongodb => "MongoDB Function",
            SourceName::Azuresql => "Azure SQL Function",
            SourceName::UserService => "User Service",
            SourceName::TransactionService => "Transaction Service",
        }
    }
}

impl fmt::Display for SourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single outbound call, ready to be handed to a `SourceClient`.
#[derive(Clone, Debug, PartialEq)]
pub struct SourceRequest {
    pub name: SourceName,
    pub url: Url,
    pub query: Vec<(&'static str, String)>,
    pub function_key: Option<String>,
    pub timeout: Duration,
}

/// How a source call settled.
#[derive(Clone, Debug, PartialEq)]
pub enum SourceResult {
    Success(JsonValue),
    Failure(String),
}

impl SourceResult {
    pub fn is_success(&self) -> bool {
        matches!(self, SourceResult::Success(_))
    }
}

/// A settled call, tagged with the source it was issued against.
#[derive(Clone, Debug, PartialEq)]
pub struct SourceOutcome {
    pub name: SourceName,
    pub result: SourceResult,
}

/// Resolved connection settings for one source
#[derive(Clone, Debug, PartialEq)]
pub struct SourceEndpoint {
    pub url: Url,
    pub function_key: Option<String>,
    pub timeout: Duration,
}

impl From<&SourceConfig> for SourceEndpoint {
    fn from(config: &SourceConfig) -> Self {
        Self {
            url: config.url.clone(),
            function_key: config.function_key.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

impl SourceEndpoint {
    /// Request against the endpoint URL itself with the given query pairs.
    pub fn query(&self, name: SourceName, query: Vec<(&'static str, String)>) -> SourceRequest {
        SourceRequest {
            name,
            url: self.url.clone(),
            query,
            function_key: self.function_key.clone(),
            timeout: self.timeout,
        }
    }

    /// Request against the endpoint URL extended by `segments`.
    ///
    /// Each segment is percent-encoded, so identifiers containing `/` or `?`
    /// cannot escape their position in the path.
    pub fn path(&self, name: SourceName, segments: &[&str]) -> Result<SourceRequest, BffError> {
        let mut url = self.url.clone();
        url.path_segments_mut()
            .map_err(|_| BffError::InvalidUpstreamUrl(name.to_string()))?
            .pop_if_empty()
            .extend(segments);

        Ok(SourceRequest {
            name,
            url,
            query: Vec::new(),
            function_key: self.function_key.clone(),
            timeout: self.timeout,
        })
    }
}

/// Endpoint table for all sources, built once at startup.
#[derive(Clone, Debug)]
pub struct Sources {
    mongodb: SourceEndpoint,
    azuresql: SourceEndpoint,
    user_service: SourceEndpoint,
    transaction_service: SourceEndpoint,
}

impl Sources {
    pub fn new(
        mongodb: SourceEndpoint,
        azuresql: SourceEndpoint,
        user_service: SourceEndpoint,
        transaction_service: SourceEndpoint,
    ) -> Self {
        Self {
            mongodb,
            azuresql,
            user_service,
            transaction_service,
        }
    }

    pub fn from_config(config: &SourcesConfig) -> Self {
        Self::new(
            (&config.mongodb).into(),
            (&config.azuresql).into(),
            (&config.user_service).into(),
            (&config.transaction_service).into(),
        )
    }

    pub fn get(&self, name: SourceName) -> &SourceEndpoint {
        match name {
            SourceName::Mongodb => &self.mongodb,
            SourceName::Azuresql => &self.azuresql,
            SourceName::UserService => &self.user_service,
            SourceName::TransactionService => &self.transaction_service,
        }
    }
}

/// Mongo filter document selecting a user's records.
pub fn mongo_user_filter(user_id: &str) -> String {
    serde_json::json!({ "userId": user_id }).to_string()
}

/// SQL where clause selecting a user's rows, with the id quoted as a literal.
pub fn sql_user_clause(user_id: &str) -> String {
    format!("userId = '{}'", user_id.replace('\'', "''"))
}
