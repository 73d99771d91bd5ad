//! Catalog Client SDK
//!
//! A Rust HTTP client for the tagging-related endpoints of an OpenMetadata
//! catalog: entity lookups, tag lookups, schema listings, and JSON-patch
//! mutations.
//!
//! # Features
//!
//! - **Bearer authentication** on every request
//! - **Automatic Retries**: Exponential backoff with jitter for transient failures
//! - **Typed patches**: `add` / `remove` / `replace` as a closed enum
//! - **No caching**: every read observes current catalog state
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use tagsync_catalog_client::{CatalogClient, ClientConfig, EntityType, TagFqn};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::from_json_file("config/openmetadata_config.json")?;
//!     let client = CatalogClient::new(config)?;
//!
//!     let tag = TagFqn::new("Application System", "ATS");
//!     if client.tag_exists(&tag).await? {
//!         let table = client
//!             .get_entity(EntityType::Table, "SVC.DB.SCHEMA.FOO", true)
//!             .await?;
//!         println!("{} tags: {:?}", table.fully_qualified_name, table.tag_fqns());
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Error Handling
//!
//! All operations return `Result<T, ClientError>`. Errors include:
//!
//! - `NotFound`: Entity or tag doesn't exist (404)
//! - `Unauthorized`: Invalid or missing token (401)
//! - `RateLimited`: Too many requests (429)
//! - `Rejected`: Other client errors, e.g. an invalid patch (400)
//! - `ServerError`: Server-side failures (5xx)
//!
//! Retryable errors are automatically retried with exponential backoff.

pub mod client;
pub mod config;
pub mod error;
pub mod types;

// Re-exports for convenience
pub use client::{CatalogClient, JSON_CONTENT_TYPE, JSON_PATCH_CONTENT_TYPE};
pub use config::{ClientConfig, ClientConfigBuilder};
pub use error::{ClientError, Result};
pub use types::{
    CatalogEntity, EntityList, EntityReference, EntityType, Paging, PatchOperation, PatchValue,
    TagFqn, TagLabel,
};
