use crate::sources::SourceName;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("Listener and admin listener both bind {0}:{1}")]
    ListenerConflict(String, u16),

    #[error("Timeout for source {0} cannot be 0")]
    ZeroTimeout(SourceName),

    #[error("URL for source {0} cannot be used as a base: {1}")]
    InvalidBaseUrl(SourceName, Url),
}

/// BFF configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    /// Main listener serving the `/api` routes
    #[serde(default)]
    pub listener: Listener,
    /// Admin listener for liveness and readiness checks
    #[serde(default = "Listener::admin_default")]
    pub admin_listener: Listener,
    /// Downstream data sources queried by the aggregation endpoints
    pub sources: SourcesConfig,
}

impl Config {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;
        self.admin_listener.validate()?;

        if self.listener.overlaps(&self.admin_listener) {
            return Err(ValidationError::ListenerConflict(
                self.listener.host.clone(),
                self.listener.port,
            ));
        }

        for (name, source) in self.sources.iter() {
            source.validate(name)?;
        }

        Ok(())
    }
}

/// Network listener configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    /// Host address to bind to (e.g., "0.0.0.0" or "127.0.0.1")
    pub host: String,
    /// Port number to listen on
    pub port: u16,
}

impl Listener {
    fn admin_default() -> Self {
        Listener {
            host: "127.0.0.1".into(),
            port: 3001,
        }
    }

    /// True when both listeners would claim the same socket. A wildcard
    /// host covers every interface, so it overlaps any host on its port.
    pub fn overlaps(&self, other: &Listener) -> bool {
        self.port == other.port
            && (self.host == other.host || self.is_wildcard() || other.is_wildcard())
    }

    fn is_wildcard(&self) -> bool {
        matches!(self.host.as_str(), "0.0.0.0" | "::" | "[::]")
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}

impl Default for Listener {
    fn default() -> Self {
        Listener {
            host: "0.0.0.0".into(),
            port: 3000,
        }
    }
}

/// The four downstream sources, one entry each.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct SourcesConfig {
    pub mongodb: SourceConfig,
    pub azuresql: SourceConfig,
    pub user_service: SourceConfig,
    pub transaction_service: SourceConfig,
}

impl SourcesConfig {
    /// Entries in fixed attempt order.
    pub fn iter(&self) -> impl Iterator<Item = (SourceName, &SourceConfig)> {
        [
            (SourceName::Mongodb, &self.mongodb),
            (SourceName::Azuresql, &self.azuresql),
            (SourceName::UserService, &self.user_service),
            (SourceName::TransactionService, &self.transaction_service),
        ]
        .into_iter()
    }
}

/// Connection settings for a single source
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct SourceConfig {
    /// For the functions, the full function URL. For the services, the base
    /// URL that resource paths are appended to (e.g. `http://users:3001/api`).
    pub url: Url,
    /// Sent as `x-functions-key` when present
    #[serde(default)]
    pub function_key: Option<String>,
    /// Per-call timeout covering connect, headers and body
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    10
}

impl SourceConfig {
    fn validate(&self, name: SourceName) -> Result<(), ValidationError> {
        if self.timeout_secs == 0 {
            return Err(ValidationError::ZeroTimeout(name));
        }
        if self.url.cannot_be_a_base() {
            return Err(ValidationError::InvalidBaseUrl(name, self.url.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_YAML: &str = r#"
listener:
    host: "0.0.0.0"
    port: 3000
admin_listener:
    host: "127.0.0.1"
    port: 3001
sources:
    mongodb:
        url: "http://localhost:7071/api/mongodb-function"
        function_key: "mongo-key"
    azuresql:
        url: "http://localhost:7072/api/azuresql-function"
        function_key: "sql-key"
        timeout_secs: 5
    user_service:
        url: "http://localhost:3001/api"
    transaction_service:
        url: "http://localhost:3002/api"
"#;

    fn base_config() -> Config {
        serde_yaml::from_str(VALID_YAML).unwrap()
    }

    #[test]
    fn test_parse_valid_config() {
        let config = base_config();
        assert!(config.validate().is_ok());

        assert_eq!(config.listener.port, 3000);
        assert_eq!(
            config.sources.mongodb.function_key.as_deref(),
            Some("mongo-key")
        );
        assert_eq!(config.sources.mongodb.timeout_secs, 10);
        assert_eq!(config.sources.azuresql.timeout_secs, 5);
        assert_eq!(config.sources.user_service.function_key, None);
        assert_eq!(
            config.sources.transaction_service.url.as_str(),
            "http://localhost:3002/api"
        );
    }

    #[test]
    fn test_listener_defaults() {
        let yaml = r#"
sources:
    mongodb: {url: "http://m"}
    azuresql: {url: "http://s"}
    user_service: {url: "http://u"}
    transaction_service: {url: "http://t"}
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.listener, Listener::default());
        assert_eq!(config.admin_listener.port, 3001);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_sources_iter_order() {
        let config = base_config();
        let names: Vec<_> = config.sources.iter().map(|(name, _)| name).collect();
        assert_eq!(names, SourceName::ALL.to_vec());
    }

    #[test]
    fn test_validation_errors() {
        let mut config = base_config();
        config.listener.port = 0;
        assert!(matches!(
            config.validate().unwrap_err(),
            ValidationError::InvalidPort
        ));

        let mut config = base_config();
        config.admin_listener = config.listener.clone();
        assert!(matches!(
            config.validate().unwrap_err(),
            ValidationError::ListenerConflict(_, 3000)
        ));

        // The wildcard main listener already covers the loopback admin port
        let mut config = base_config();
        config.admin_listener.port = config.listener.port;
        assert_eq!(config.admin_listener.host, "127.0.0.1");
        assert!(matches!(
            config.validate().unwrap_err(),
            ValidationError::ListenerConflict(_, 3000)
        ));

        let mut config = base_config();
        config.sources.user_service.timeout_secs = 0;
        assert!(matches!(
            config.validate().unwrap_err(),
            ValidationError::ZeroTimeout(SourceName::UserService)
        ));

        let mut config = base_config();
        config.sources.mongodb.url = Url::parse("mailto:ops@example.com").unwrap();
        assert!(matches!(
            config.validate().unwrap_err(),
            ValidationError::InvalidBaseUrl(SourceName::Mongodb, _)
        ));
    }

    #[test]
    fn test_listener_overlap() {
        let listener = |host: &str, port| Listener {
            host: host.to_string(),
            port,
        };

        assert!(listener("0.0.0.0", 3000).overlaps(&listener("127.0.0.1", 3000)));
        assert!(listener("10.0.0.5", 3000).overlaps(&listener("::", 3000)));
        assert!(listener("127.0.0.1", 3000).overlaps(&listener("127.0.0.1", 3000)));
        assert!(!listener("127.0.0.1", 3000).overlaps(&listener("10.0.0.5", 3000)));
        assert!(!listener("0.0.0.0", 3000).overlaps(&listener("127.0.0.1", 3001)));
    }

    #[test]
    fn test_deserialization_errors() {
        // Invalid URL
        assert!(
            serde_yaml::from_str::<SourceConfig>(r#"{url: "not-a-url"}"#).is_err()
        );

        // Missing source
        assert!(
            serde_yaml::from_str::<SourcesConfig>(
                r#"
mongodb: {url: "http://m"}
azuresql: {url: "http://s"}
user_service: {url: "http://u"}
"#
            )
            .is_err()
        );

        // Invalid port type
        assert!(
            serde_yaml::from_str::<Listener>(r#"{host: "0.0.0.0", port: "not_a_number"}"#)
                .is_err()
        );
    }
}
