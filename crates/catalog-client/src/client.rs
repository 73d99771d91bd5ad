//! HTTP client with retry logic.

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::types::{ApiError, CatalogEntity, EntityList, EntityType, PatchOperation, TagFqn};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use reqwest::{Method, StatusCode};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{
    policies::ExponentialBackoff, RetryTransientMiddleware, Retryable, RetryableStrategy,
};

/// Content type used for plain reads.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Content type required by the catalog for PATCH bodies.
pub const JSON_PATCH_CONTENT_TYPE: &str = "application/json-patch+json";

/// Fields requested whenever a snapshot is fetched for tagging decisions.
const TAGGING_FIELDS: &str = "tags,owners";

/// Catalog HTTP client with automatic retries.
///
/// Every call is authenticated with the configured bearer token and retried
/// with exponential backoff on transient failures (connect errors, timeouts,
/// 5xx, 429). Nothing is cached: each call observes the catalog as it is now.
pub struct CatalogClient {
    http: ClientWithMiddleware,
    config: ClientConfig,
}

impl CatalogClient {
    /// Create a new client builder with the given base URL.
    pub fn builder(base_url: impl Into<String>) -> crate::config::ClientConfigBuilder {
        crate::config::ClientConfigBuilder::new(base_url)
    }

    /// Create a new client with the given configuration.
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .unwrap_or_else(|_| HeaderValue::from_static("tagsync")),
        );

        if let Some(ref token) = config.jwt_token {
            let auth_value = format!("Bearer {}", token);
            let mut value = HeaderValue::from_str(&auth_value)
                .map_err(|_| ClientError::Config("Invalid jwt_token format".to_string()))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let reqwest_client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;

        let retry_policy = ExponentialBackoff::builder()
            .retry_bounds(config.retry_initial_delay, config.retry_max_delay)
            .base(config.backoff_base)
            .build_with_max_retries(config.max_retries);

        let client = ClientBuilder::new(reqwest_client)
            .with(RetryTransientMiddleware::new_with_policy_and_strategy(
                retry_policy,
                TransientRetryStrategy,
            ))
            .build();

        Ok(Self {
            http: client,
            config,
        })
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Resolve the catalog host before doing any work.
    pub async fn check_dns(&self) -> Result<()> {
        let url = url::Url::parse(&self.config.base_url)
            .map_err(|e| ClientError::InvalidUrl(e.to_string()))?;
        let host = url
            .host_str()
            .ok_or_else(|| ClientError::InvalidUrl(format!("no host in {}", url)))?;
        let port = url.port_or_known_default().unwrap_or(443);

        let mut addrs = tokio::net::lookup_host((host, port)).await.map_err(|e| {
            ClientError::InvalidUrl(format!("unable to resolve host {}: {}", host, e))
        })?;
        if addrs.next().is_none() {
            return Err(ClientError::InvalidUrl(format!(
                "host {} resolved to no addresses",
                host
            )));
        }
        Ok(())
    }

    // =========================================================================
    // Entity Operations
    // =========================================================================

    /// Whether an entity exists. 404 maps to `false`; any other failure is
    /// returned as an error.
    pub async fn exists(&self, entity_type: EntityType, fqn: &str) -> Result<bool> {
        let path = entity_path(entity_type, fqn);
        match self.get::<serde_json::Value>(&path).await {
            Ok(_) => Ok(true),
            Err(ClientError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Fetch a fresh snapshot of an entity.
    ///
    /// With `with_tags`, the snapshot includes tags and owners and deleted
    /// entities are included as well (`include=all`).
    pub async fn get_entity(
        &self,
        entity_type: EntityType,
        fqn: &str,
        with_tags: bool,
    ) -> Result<CatalogEntity> {
        let mut path = entity_path(entity_type, fqn);
        if with_tags {
            path.push_str(&format!("?fields={}&include=all", TAGGING_FIELDS));
        }
        let mut entity: CatalogEntity = self.get(&path).await?;
        entity.entity_type = entity_type;
        Ok(entity)
    }

    /// Whether a tag (and therefore its classification) exists.
    pub async fn tag_exists(&self, tag: &TagFqn) -> Result<bool> {
        let path = format!("/v1/tags/name/{}", urlencoding::encode(tag.as_str()));
        match self.get::<serde_json::Value>(&path).await {
            Ok(_) => Ok(true),
            Err(ClientError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// List every table in a schema, following the paging cursor.
    pub async fn list_tables(
        &self,
        schema_fqn: &str,
        page_size: usize,
    ) -> Result<Vec<CatalogEntity>> {
        let base = format!(
            "/v1/tables?databaseSchema={}&fields={}&include=all&limit={}",
            urlencoding::encode(schema_fqn),
            TAGGING_FIELDS,
            page_size
        );
        let tables = self.collect_pages(&base).await?;
        tracing::info!(schema = %schema_fqn, count = tables.len(), "Listed tables in schema");
        Ok(tables)
    }

    /// Export the FQN of every table in the catalog.
    pub async fn list_table_fqns(&self, page_size: usize) -> Result<Vec<String>> {
        let base = format!("/v1/tables?fields=fullyQualifiedName&limit={}", page_size);
        let tables = self.collect_pages(&base).await?;
        Ok(tables
            .into_iter()
            .map(|t| t.fully_qualified_name)
            .filter(|fqn| !fqn.is_empty())
            .collect())
    }

    /// Apply JSON-patch operations to an entity.
    pub async fn patch(
        &self,
        entity_type: EntityType,
        fqn: &str,
        operations: &[PatchOperation],
    ) -> Result<()> {
        let path = entity_path(entity_type, fqn);
        let body = serde_json::to_vec(operations)?;

        tracing::debug!(
            entity = %fqn,
            payload = %String::from_utf8_lossy(&body),
            "Sending patch"
        );

        self.send(Method::PATCH, &path, Some(body), JSON_PATCH_CONTENT_TYPE)
            .await?;
        Ok(())
    }

    // =========================================================================
    // Internal HTTP Methods
    // =========================================================================

    async fn collect_pages(&self, base: &str) -> Result<Vec<CatalogEntity>> {
        let mut entities = Vec::new();
        let mut after: Option<String> = None;

        loop {
            let path = match &after {
                Some(cursor) => format!("{}&after={}", base, urlencoding::encode(cursor)),
                None => base.to_string(),
            };
            let page: EntityList = self.get(&path).await?;
            let next = page.next_cursor().map(String::from);
            entities.extend(page.data);

            match next {
                Some(cursor) if after.as_deref() == Some(cursor.as_str()) => {
                    return Err(ClientError::InvalidResponse(format!(
                        "Paging cursor '{}' repeated after {} entities",
                        cursor,
                        entities.len()
                    )));
                }
                Some(cursor) => {
                    tracing::debug!(fetched = entities.len(), "Fetching next page");
                    after = Some(cursor);
                }
                None => break,
            }
        }

        Ok(entities)
    }

    /// Perform a GET request and deserialize the response.
    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let body = self.send(Method::GET, path, None, JSON_CONTENT_TYPE).await?;
        serde_json::from_slice(&body).map_err(|e| {
            ClientError::InvalidResponse(format!(
                "Failed to parse response: {} (body: {})",
                e,
                String::from_utf8_lossy(&body)
            ))
        })
    }

    /// Perform an HTTP request and return the raw success body.
    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
        content_type: &'static str,
    ) -> Result<Vec<u8>> {
        let url = format!("{}{}", self.config.api_root(), path);
        let start = std::time::Instant::now();

        tracing::debug!(method = %method, path = %path, "Sending request");

        let mut request = self
            .http
            .request(method.clone(), &url)
            .header(CONTENT_TYPE, content_type);
        if let Some(b) = body {
            request = request.body(b);
        }

        let response = request.send().await?;
        let status = response.status();
        let duration = start.elapsed();

        tracing::debug!(
            method = %method,
            path = %path,
            status = %status.as_u16(),
            duration_ms = %duration.as_millis(),
            "Received response"
        );

        if status.is_success() {
            return Ok(response.bytes().await?.to_vec());
        }

        let retry_after = Self::parse_retry_after(response.headers());
        let error_body = response.bytes().await.ok();
        let api_error: Option<ApiError> = error_body
            .as_ref()
            .and_then(|b| serde_json::from_slice(b).ok());

        let message = api_error
            .and_then(|e| e.message)
            .unwrap_or_else(|| {
                error_body
                    .map(|b| String::from_utf8_lossy(&b).to_string())
                    .filter(|s| !s.is_empty())
                    .unwrap_or_else(|| status.to_string())
            });

        // 404 is an expected answer for existence checks
        if status == StatusCode::NOT_FOUND {
            tracing::debug!(method = %method, path = %path, "Not found");
        } else {
            tracing::warn!(
                method = %method,
                path = %path,
                status = %status.as_u16(),
                duration_ms = %duration.as_millis(),
                error = %message,
                "Request failed"
            );
        }

        Err(Self::status_to_error(status, message, retry_after))
    }

    /// Convert HTTP status to appropriate error type.
    fn status_to_error(
        status: StatusCode,
        message: String,
        retry_after: Option<std::time::Duration>,
    ) -> ClientError {
        match status {
            StatusCode::NOT_FOUND => ClientError::NotFound(message),
            StatusCode::UNAUTHORIZED => ClientError::Unauthorized(message),
            StatusCode::FORBIDDEN => ClientError::Forbidden(message),
            StatusCode::CONFLICT => ClientError::Conflict(message),
            StatusCode::TOO_MANY_REQUESTS => ClientError::RateLimited { retry_after },
            s if s.is_server_error() => ClientError::ServerError {
                status: s.as_u16(),
                message,
            },
            s => ClientError::Rejected {
                status: s.as_u16(),
                message,
            },
        }
    }

    /// Parse the Retry-After header value into a Duration.
    ///
    /// Supports both formats per RFC 7231: delay seconds and HTTP-date.
    fn parse_retry_after(headers: &HeaderMap) -> Option<std::time::Duration> {
        let header_value = headers.get("retry-after")?.to_str().ok()?;

        if let Ok(seconds) = header_value.parse::<u64>() {
            return Some(std::time::Duration::from_secs(seconds));
        }

        if let Ok(date) = httpdate::parse_http_date(header_value) {
            let now = std::time::SystemTime::now();
            return Some(date.duration_since(now).unwrap_or(std::time::Duration::ZERO));
        }

        None
    }
}

/// Path of a named entity: `/v1/{collection}/name/{encoded fqn}`.
fn entity_path(entity_type: EntityType, fqn: &str) -> String {
    format!(
        "/v1/{}/name/{}",
        entity_type.collection(),
        urlencoding::encode(fqn)
    )
}

/// Retry strategy for catalog calls.
///
/// Retries transient network errors, 5xx and 429. Other 4xx are fatal.
///
/// PATCH requests are retried as well. Adding a tag that is already present
/// is rejected or ignored by the catalog, and the reconciler re-reads the
/// entity before every patch, so a duplicated add cannot double-apply.
struct TransientRetryStrategy;

impl RetryableStrategy for TransientRetryStrategy {
    fn handle(&self, res: &reqwest_middleware::Result<reqwest::Response>) -> Option<Retryable> {
        match res {
            Ok(response) => {
                let status = response.status();
                if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
                    Some(Retryable::Transient)
                } else if status.is_success() {
                    None
                } else {
                    Some(Retryable::Fatal)
                }
            }
            Err(error) => {
                if error.is_timeout() || error.is_connect() {
                    Some(Retryable::Transient)
                } else {
                    Some(Retryable::Fatal)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_entity_path_is_percent_encoded() {
        assert_eq!(
            entity_path(EntityType::Table, "SVC.DB.SCHEMA.MY TABLE"),
            "/v1/tables/name/SVC.DB.SCHEMA.MY%20TABLE"
        );
        assert_eq!(
            entity_path(EntityType::Schema, "SVC.DB.SCHEMA"),
            "/v1/databaseSchemas/name/SVC.DB.SCHEMA"
        );
    }

    #[test]
    fn test_client_rejects_invalid_config() {
        let config = ClientConfig {
            base_url: String::new(),
            ..Default::default()
        };
        assert!(CatalogClient::new(config).is_err());
    }

    #[test]
    fn test_status_to_error_mapping() {
        let err = CatalogClient::status_to_error(StatusCode::BAD_REQUEST, "bad".into(), None);
        assert!(matches!(err, ClientError::Rejected { status: 400, .. }));

        let err =
            CatalogClient::status_to_error(StatusCode::BAD_GATEWAY, "upstream".into(), None);
        assert!(err.is_retryable());

        let err = CatalogClient::status_to_error(StatusCode::NOT_FOUND, "gone".into(), None);
        assert!(err.is_not_found());
    }

    #[test]
    fn test_parse_retry_after_seconds() {
        let mut headers = HeaderMap::new();
        headers.insert("retry-after", HeaderValue::from_static("120"));

        let result = CatalogClient::parse_retry_after(&headers);
        assert_eq!(result, Some(Duration::from_secs(120)));
    }

    #[test]
    fn test_parse_retry_after_missing() {
        let headers = HeaderMap::new();
        assert_eq!(CatalogClient::parse_retry_after(&headers), None);
    }

    #[test]
    fn test_parse_retry_after_invalid() {
        let mut headers = HeaderMap::new();
        headers.insert("retry-after", HeaderValue::from_static("not-a-number"));
        assert_eq!(CatalogClient::parse_retry_after(&headers), None);
    }

    #[test]
    fn test_parse_retry_after_past_date() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "retry-after",
            HeaderValue::from_static("Fri, 31 Dec 1999 23:59:59 GMT"),
        );
        assert_eq!(
            CatalogClient::parse_retry_after(&headers),
            Some(Duration::ZERO)
        );
    }
}
