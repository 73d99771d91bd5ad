//! Batch tag reconciliation for OpenMetadata catalogs.
//!
//! Resolves external table identities to catalog FQNs, decides per entity
//! whether a tag (or owner) still needs to be applied, and applies it in
//! paced batches, aggregating the results into a run summary.
//!
//! # Overview
//!
//! - [`normalize`]: application name cleaning and mapping keys
//! - [`resolve`]: bare table names and exported FQNs → catalog FQNs
//! - [`catalog`]: the catalog operations the engine needs
//! - [`reconcile`]: per-entity add / remove / owner decisions
//! - [`batch`]: chunked, paced execution and statistics
//! - [`summary`]: run totals and the final report
//! - [`run`]: schema-driven, CSV-driven, removal and owner flows
//! - [`mapping`], [`sources`]: JSON mapping and CSV inputs / exports
//!
//! # Example
//!
//! ```rust,ignore
//! use tagsync_catalog_client::{CatalogClient, ClientConfig};
//! use tagsync_catalog_tagger::{load_mappings, RunOptions, TaggingRun};
//!
//! let client = CatalogClient::new(ClientConfig::from_json_file("config/openmetadata_config.json")?)?;
//! let mappings = load_mappings("data/application_mapping.json")?;
//! let options = RunOptions { dry_run: true, ..Default::default() };
//!
//! let summary = TaggingRun::new(&client, &options).tag_schemas(&mappings, None).await;
//! println!("{}", summary);
//! ```

pub mod batch;
pub mod catalog;
pub mod error;
pub mod mapping;
pub mod normalize;
pub mod reconcile;
pub mod resolve;
pub mod run;
pub mod sources;
pub mod summary;

pub use batch::{BatchReport, BatchRunner, BatchStats};
pub use catalog::Catalog;
pub use error::{Result, TaggerError};
pub use mapping::{
    clean_mappings, generate_from_fqns, load_mappings, save_mappings, ApplicationMapping,
    CleanedMappings, Mappings,
};
pub use normalize::NameNormalizer;
pub use reconcile::{EntityOutcome, FailureReason, Reconciler, TagOutcome};
pub use resolve::{IdentityResolver, Resolution, Scope};
pub use run::{RunOptions, TaggingRun, DEFAULT_CLASSIFICATION, DEFAULT_PAGE_SIZE};
pub use sources::{
    export_table_fqns, group_by_application, load_fqn_list, load_table_assignments,
    write_fqn_csv, TableAssignment,
};
pub use summary::{RunSummary, SkipReason};
