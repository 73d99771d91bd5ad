//! Per-application run orchestration.
//!
//! Each flow walks its applications in order, checks the application's tag
//! once, resolves the entities to work on, and hands them to the
//! [`BatchRunner`]. Per-entity failures are counted, never propagated; only
//! load-time problems abort a run.

use crate::batch::{BatchReport, BatchRunner, DEFAULT_BATCH_DELAY, DEFAULT_BATCH_SIZE};
use crate::catalog::Catalog;
use crate::mapping::Mappings;
use crate::reconcile::{EntityOutcome, Reconciler, TagOutcome};
use crate::resolve::{IdentityResolver, Resolution, Scope};
use crate::sources::{group_by_application, TableAssignment};
use crate::summary::{RunSummary, SkipReason};
use std::time::Duration;
use tagsync_catalog_client::{CatalogEntity, EntityReference, EntityType, TagFqn};

/// Classification that application tags live under.
pub const DEFAULT_CLASSIFICATION: &str = "Application System";

/// Page size for table listings.
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// Settings shared by every flow of one run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub dry_run: bool,
    pub batch_size: usize,
    pub batch_delay: Duration,
    pub classification: String,
    pub page_size: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            batch_size: DEFAULT_BATCH_SIZE,
            batch_delay: DEFAULT_BATCH_DELAY,
            classification: DEFAULT_CLASSIFICATION.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl RunOptions {
    pub fn runner(&self) -> BatchRunner {
        BatchRunner::new(self.batch_size, self.batch_delay)
    }

    /// Tag for an application tag name under the configured classification.
    pub fn tag_for(&self, tag_name: &str) -> TagFqn {
        TagFqn::new(&self.classification, tag_name)
    }
}

/// Drives reconciliation flows against one catalog.
pub struct TaggingRun<'a, C: Catalog + ?Sized> {
    catalog: &'a C,
    options: &'a RunOptions,
    reconciler: Reconciler<'a, C>,
    runner: BatchRunner,
}

impl<'a, C: Catalog + ?Sized> TaggingRun<'a, C> {
    pub fn new(catalog: &'a C, options: &'a RunOptions) -> Self {
        Self {
            catalog,
            options,
            reconciler: Reconciler::new(catalog, options.dry_run),
            runner: options.runner(),
        }
    }

    /// Tag every table of every mapped schema with its application's tag.
    ///
    /// With `only`, processes just that application key.
    pub async fn tag_schemas(&self, mappings: &Mappings, only: Option<&str>) -> RunSummary {
        let mut summary = RunSummary::new("Schema tagging", self.options.dry_run);

        if let Some(key) = only {
            if !mappings.contains_key(key) {
                summary.record_skipped(key, SkipReason::NoMapping);
            }
        }

        for (key, mapping) in mappings {
            if only.is_some_and(|wanted| wanted != key.as_str()) {
                continue;
            }
            let tag = self.options.tag_for(&mapping.tag_name);
            let scope = mapping.scope();
            tracing::info!(application = %key, tag = %tag, schema = %scope, "Processing application");

            if let Err(reason) = self.check_tag(&tag).await {
                summary.record_skipped(key, reason);
                continue;
            }

            let tables = match self
                .catalog
                .list_tables(&scope.fqn(), self.options.page_size)
                .await
            {
                Ok(tables) => tables,
                Err(e) => {
                    summary.record_skipped(key, SkipReason::ListingFailed(e.to_string()));
                    continue;
                }
            };
            if tables.is_empty() {
                summary.record_skipped(key, SkipReason::NoTables(scope.fqn()));
                continue;
            }

            let report = self.tag_listed(&tables, &tag).await;
            summary.record_processed(key, &tag, report);
        }

        summary.finish();
        summary
    }

    /// Tag listed tables, skipping those whose listing already shows the tag.
    async fn tag_listed(&self, tables: &[CatalogEntity], tag: &TagFqn) -> BatchReport {
        let (tagged, pending): (Vec<&CatalogEntity>, Vec<&CatalogEntity>) =
            tables.iter().partition(|t| t.has_tag(tag));

        let mut prefiltered = BatchReport::default();
        for table in &tagged {
            tracing::debug!(entity = %table.fully_qualified_name, tag = %tag, "Already tagged, skipping");
            prefiltered
                .stats
                .record(&EntityOutcome::Reconciled(TagOutcome::AlreadyTagged));
        }
        tracing::info!(
            listed = tables.len(),
            already_tagged = tagged.len(),
            pending = pending.len(),
            "Prefiltered schema tables"
        );

        let pending: Vec<String> = pending
            .into_iter()
            .map(|t| t.fully_qualified_name.clone())
            .collect();
        let reconciler = &self.reconciler;
        let mut report = self
            .runner
            .run(&pending, move |fqn| {
                reconciler.apply_tag(EntityType::Table, fqn, tag)
            })
            .await;
        report.stats += &prefiltered.stats;
        report
    }

    /// Tag tables listed in a CSV, grouped per application.
    ///
    /// The tag comes from the application's mapping entry, else it is
    /// `<classification>.<application>`. Bare table names resolve against the
    /// mapping scope, else `fallback_scope`.
    pub async fn tag_assignments(
        &self,
        rows: &[TableAssignment],
        resolver: &IdentityResolver,
        mappings: &Mappings,
        fallback_scope: Option<&Scope>,
        only: Option<&str>,
    ) -> RunSummary {
        let mut summary = RunSummary::new("CSV tagging", self.options.dry_run);

        let groups = group_by_application(rows);
        if let Some(key) = only {
            if !groups.iter().any(|(app, _)| app == key) {
                tracing::warn!(application = %key, "Application not present in CSV");
                summary.record_skipped(key, SkipReason::NoTables("input CSV".into()));
            }
        }

        for (application, tables) in groups {
            if only.is_some_and(|wanted| wanted != application) {
                continue;
            }
            let mapping = mappings.get(&application);
            let tag = match mapping {
                Some(m) => m.tag(&self.options.classification),
                None => self.options.tag_for(&application),
            };
            let scope = mapping
                .map(|m| m.scope())
                .or_else(|| fallback_scope.cloned());
            tracing::info!(
                application = %application,
                tag = %tag,
                tables = tables.len(),
                scope = ?scope.as_ref().map(Scope::fqn),
                "Processing application"
            );

            let targets: Vec<(String, Resolution)> = tables
                .into_iter()
                .map(|table| {
                    let resolution = resolver.resolve(&table, scope.as_ref());
                    (table, resolution)
                })
                .collect();

            let unscoped = scope.is_none() && !resolver.has_lookup();
            if unscoped && targets.iter().all(|(_, r)| *r == Resolution::Unresolved) {
                summary.record_skipped(&application, SkipReason::NoMapping);
                continue;
            }

            if let Err(reason) = self.check_tag(&tag).await {
                summary.record_skipped(&application, reason);
                continue;
            }

            let report = self.tag_resolved(&targets, &tag).await;
            summary.record_processed(&application, &tag, report);
        }

        summary.finish();
        summary
    }

    async fn tag_resolved(&self, targets: &[(String, Resolution)], tag: &TagFqn) -> BatchReport {
        let reconciler = &self.reconciler;
        self.runner
            .run(targets, move |(raw, resolution)| async move {
                match resolution {
                    Resolution::Resolved(fqn) => {
                        reconciler.apply_tag(EntityType::Table, fqn, tag).await
                    }
                    Resolution::Unresolved => {
                        tracing::warn!(table = %raw, tag = %tag, "Could not resolve table to an FQN");
                        EntityOutcome::Missing
                    }
                }
            })
            .await
    }

    /// Remove a tag from every table of a schema, optionally from the schema too.
    pub async fn untag_schema(
        &self,
        scope: &Scope,
        tag: &TagFqn,
        include_schema: bool,
    ) -> RunSummary {
        let mut summary = RunSummary::new("Tag removal", self.options.dry_run);
        let key = scope.fqn();

        match self.catalog.list_tables(&key, self.options.page_size).await {
            Ok(tables) if tables.is_empty() && !include_schema => {
                summary.record_skipped(&key, SkipReason::NoTables(key.clone()));
            }
            Ok(tables) => {
                let fqns: Vec<String> = tables
                    .into_iter()
                    .map(|t| t.fully_qualified_name)
                    .collect();
                let reconciler = &self.reconciler;
                let mut report = self
                    .runner
                    .run(&fqns, move |fqn| {
                        reconciler.remove_tag(EntityType::Table, fqn, tag)
                    })
                    .await;

                if include_schema {
                    let outcome = self
                        .reconciler
                        .remove_tag(EntityType::Schema, &key, tag)
                        .await;
                    report.stats.record(&outcome);
                }
                summary.record_processed(&key, tag, report);
            }
            Err(e) => summary.record_skipped(&key, SkipReason::ListingFailed(e.to_string())),
        }

        summary.finish();
        summary
    }

    /// Make `owner` the sole owner of every table in a schema.
    pub async fn assign_owner(&self, scope: &Scope, owner: &EntityReference) -> RunSummary {
        let mut summary = RunSummary::new("Owner assignment", self.options.dry_run);
        let key = scope.fqn();
        let target = format!("owner {}:{}", owner.kind, owner.id);

        match self.catalog.list_tables(&key, self.options.page_size).await {
            Ok(tables) if tables.is_empty() => {
                summary.record_skipped(&key, SkipReason::NoTables(key.clone()));
            }
            Ok(tables) => {
                let fqns: Vec<String> = tables
                    .into_iter()
                    .map(|t| t.fully_qualified_name)
                    .collect();
                let reconciler = &self.reconciler;
                let report = self
                    .runner
                    .run(&fqns, move |fqn| {
                        reconciler.assign_owner(EntityType::Table, fqn, owner)
                    })
                    .await;
                summary.record_processed(&key, target, report);
            }
            Err(e) => summary.record_skipped(&key, SkipReason::ListingFailed(e.to_string())),
        }

        summary.finish();
        summary
    }

    async fn check_tag(&self, tag: &TagFqn) -> Result<(), SkipReason> {
        match self.reconciler.tag_exists(tag).await {
            Ok(true) => {
                tracing::info!(tag = %tag, "Tag exists in catalog");
                Ok(())
            }
            Ok(false) => Err(SkipReason::MissingTag(tag.clone())),
            Err(e) => Err(SkipReason::TagLookupFailed(e.to_string())),
        }
    }
}
