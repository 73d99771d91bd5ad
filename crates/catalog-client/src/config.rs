//! Client configuration, builder pattern, and JSON config file loading.

use crate::error::{ClientError, Result};
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Keys that must be present in a configuration file.
pub const REQUIRED_KEYS: &[&str] = &["base_url", "jwt_token"];

/// Keys never echoed to the log when a configuration file is loaded.
const SECRET_KEYS: &[&str] = &["jwt_token", "password"];

/// Configuration for the catalog client.
///
/// # Security
///
/// The `Debug` implementation masks the bearer token to prevent accidental
/// exposure in logs. The token is shown as `"***REDACTED***"` in debug output.
#[derive(Clone)]
pub struct ClientConfig {
    /// Base URL of the catalog API (e.g., "https://catalog.example.com/api")
    pub base_url: String,
    /// JWT bearer token sent on every request
    pub jwt_token: Option<String>,
    /// Request timeout (default: 30 seconds)
    pub timeout: Duration,
    /// Maximum number of retries for transient failures (default: 4)
    pub max_retries: u32,
    /// Initial retry delay for exponential backoff (default: 1 second)
    pub retry_initial_delay: Duration,
    /// Maximum retry delay (default: 30 seconds)
    pub retry_max_delay: Duration,
    /// Exponential backoff multiplier (default: 2)
    pub backoff_base: u32,
    /// User-Agent header value
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8585/api".to_string(),
            jwt_token: None,
            timeout: Duration::from_secs(30),
            max_retries: 4,
            retry_initial_delay: Duration::from_secs(1),
            retry_max_delay: Duration::from_secs(30),
            backoff_base: 2,
            user_agent: format!("tagsync/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("jwt_token", &self.jwt_token.as_ref().map(|_| "***REDACTED***"))
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .field("retry_initial_delay", &self.retry_initial_delay)
            .field("retry_max_delay", &self.retry_max_delay)
            .field("backoff_base", &self.backoff_base)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

/// On-disk shape of the JSON configuration file.
#[derive(Deserialize)]
struct ConfigFile {
    base_url: String,
    jwt_token: String,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
    retry_initial_delay_ms: Option<u64>,
    retry_max_delay_ms: Option<u64>,
    backoff_base: Option<u32>,
}

impl ClientConfig {
    /// Create a new configuration builder.
    pub fn builder(base_url: impl Into<String>) -> ClientConfigBuilder {
        ClientConfigBuilder::new(base_url)
    }

    /// Minimum allowed timeout value.
    pub const MIN_TIMEOUT: Duration = Duration::from_millis(100);

    /// Load configuration from a JSON file.
    ///
    /// `base_url` and `jwt_token` are required; every missing key is reported
    /// in a single error. Optional tuning keys fall back to the defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ClientError::Config(format!(
                "cannot read configuration file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json_str(&raw)
    }

    /// Parse configuration from JSON text. See [`ClientConfig::from_json_file`].
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(raw)
            .map_err(|e| ClientError::Config(format!("invalid JSON in configuration: {}", e)))?;

        let object = value
            .as_object()
            .ok_or_else(|| ClientError::Config("configuration must be a JSON object".into()))?;

        let missing: Vec<&str> = REQUIRED_KEYS
            .iter()
            .copied()
            .filter(|key| !object.contains_key(*key))
            .collect();
        if !missing.is_empty() {
            return Err(ClientError::Config(format!(
                "missing required configuration keys: {}",
                missing.join(", ")
            )));
        }

        let safe_keys: Vec<&str> = object
            .keys()
            .map(String::as_str)
            .filter(|k| !SECRET_KEYS.contains(k))
            .collect();
        tracing::info!(keys = ?safe_keys, "Loaded configuration");

        let file: ConfigFile = serde_json::from_value(value)
            .map_err(|e| ClientError::Config(format!("invalid configuration: {}", e)))?;

        let mut builder = ClientConfigBuilder::new(file.base_url).jwt_token(file.jwt_token);
        if let Some(secs) = file.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        if let Some(retries) = file.max_retries {
            builder = builder.max_retries(retries);
        }
        if let Some(ms) = file.retry_initial_delay_ms {
            builder = builder.retry_initial_delay(Duration::from_millis(ms));
        }
        if let Some(ms) = file.retry_max_delay_ms {
            builder = builder.retry_max_delay(Duration::from_millis(ms));
        }
        if let Some(base) = file.backoff_base {
            builder = builder.backoff_base(base);
        }
        builder.build()
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.base_url.is_empty() {
            return Err(ClientError::Config("base_url cannot be empty".to_string()));
        }

        url::Url::parse(&self.base_url)
            .map_err(|e| ClientError::Config(format!("Invalid base_url: {}", e)))?;

        if let Some(token) = &self.jwt_token {
            if token.trim().is_empty() {
                return Err(ClientError::Config("jwt_token cannot be empty".to_string()));
            }
        }

        if self.retry_initial_delay > self.retry_max_delay {
            return Err(ClientError::Config(format!(
                "retry_initial_delay ({:?}) must be <= retry_max_delay ({:?})",
                self.retry_initial_delay, self.retry_max_delay
            )));
        }

        if self.backoff_base < 1 {
            return Err(ClientError::Config(
                "backoff_base must be at least 1".to_string(),
            ));
        }

        if self.timeout < Self::MIN_TIMEOUT {
            return Err(ClientError::Config(format!(
                "timeout ({:?}) must be >= {:?}",
                self.timeout,
                Self::MIN_TIMEOUT
            )));
        }

        Ok(())
    }

    /// Base URL without a trailing slash.
    pub fn api_root(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

/// Builder for client configuration.
#[derive(Debug)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Create a new builder with the given base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            config: ClientConfig {
                base_url: base_url.into(),
                ..Default::default()
            },
        }
    }

    /// Set the bearer token for authentication.
    pub fn jwt_token(mut self, token: impl Into<String>) -> Self {
        self.config.jwt_token = Some(token.into());
        self
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the maximum number of retries.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.config.max_retries = max_retries;
        self
    }

    /// Set the initial retry delay for exponential backoff.
    pub fn retry_initial_delay(mut self, delay: Duration) -> Self {
        self.config.retry_initial_delay = delay;
        self
    }

    /// Set the maximum retry delay.
    pub fn retry_max_delay(mut self, delay: Duration) -> Self {
        self.config.retry_max_delay = delay;
        self
    }

    /// Set the exponential backoff multiplier.
    pub fn backoff_base(mut self, base: u32) -> Self {
        self.config.backoff_base = base;
        self
    }

    /// Set a custom User-Agent header.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Build the configuration, validating all settings.
    pub fn build(self) -> Result<ClientConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert!(config.jwt_token.is_none());
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.max_retries, 4);
        assert_eq!(config.retry_initial_delay, Duration::from_secs(1));
        assert_eq!(config.backoff_base, 2);
    }

    #[test]
    fn test_builder() {
        let config = ClientConfig::builder("https://catalog.example.com/api")
            .jwt_token("jwt_test")
            .timeout(Duration::from_secs(60))
            .max_retries(5)
            .backoff_base(3)
            .build()
            .unwrap();

        assert_eq!(config.base_url, "https://catalog.example.com/api");
        assert_eq!(config.jwt_token, Some("jwt_test".to_string()));
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.backoff_base, 3);
    }

    #[test]
    fn test_invalid_url() {
        assert!(ClientConfig::builder("not a valid url").build().is_err());
        assert!(ClientConfig::builder("").build().is_err());
    }

    #[test]
    fn test_api_root_strips_trailing_slash() {
        let config = ClientConfig::builder("http://localhost:8585/api/")
            .build()
            .unwrap();
        assert_eq!(config.api_root(), "http://localhost:8585/api");
    }

    #[test]
    fn test_token_masked_in_debug() {
        let config = ClientConfig::builder("http://localhost:8585/api")
            .jwt_token("eyJsuper_secret_token")
            .build()
            .unwrap();

        let debug_output = format!("{:?}", config);
        assert!(!debug_output.contains("super_secret"));
        assert!(debug_output.contains("REDACTED"));
    }

    #[test]
    fn test_retry_delay_validation() {
        let err = ClientConfig::builder("http://localhost:8585")
            .retry_initial_delay(Duration::from_secs(10))
            .retry_max_delay(Duration::from_secs(1))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("retry_initial_delay"));
    }

    #[test]
    fn test_timeout_too_small() {
        let err = ClientConfig::builder("http://localhost:8585")
            .timeout(Duration::from_millis(50))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("timeout"));
    }

    #[test]
    fn test_from_json_str_reports_all_missing_keys() {
        let err = ClientConfig::from_json_str(r#"{"verify_ssl": true}"#).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("base_url"));
        assert!(message.contains("jwt_token"));
    }

    #[test]
    fn test_from_json_str_rejects_malformed_json() {
        let err = ClientConfig::from_json_str("{ base_url: ").unwrap_err();
        assert!(matches!(err, ClientError::Config(_)));
    }

    #[test]
    fn test_from_json_str_optional_keys() {
        let config = ClientConfig::from_json_str(
            r#"{
                "base_url": "https://catalog.example.com/api",
                "jwt_token": "abc",
                "max_retries": 2,
                "retry_initial_delay_ms": 250,
                "timeout_secs": 10
            }"#,
        )
        .unwrap();

        assert_eq!(config.jwt_token.as_deref(), Some("abc"));
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.retry_initial_delay, Duration::from_millis(250));
        assert_eq!(config.timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_from_json_file_missing_file() {
        let err = ClientConfig::from_json_file("/nonexistent/openmetadata_config.json").unwrap_err();
        assert!(err.to_string().contains("cannot read configuration file"));
    }

    #[test]
    fn test_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"base_url": "http://localhost:8585/api", "jwt_token": "tok"}}"#
        )
        .unwrap();

        let config = ClientConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.base_url, "http://localhost:8585/api");
    }
}
