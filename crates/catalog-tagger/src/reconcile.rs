//! Per-entity tag and owner reconciliation.
//!
//! Every decision is taken against a snapshot fetched immediately before the
//! mutation, so rerunning over the same catalog issues no patches.

use crate::catalog::Catalog;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use tagsync_catalog_client::{
    CatalogEntity, ClientError, EntityReference, EntityType, PatchOperation, TagFqn,
};

/// Why a single operation failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The tag (or its classification) does not exist in the catalog
    TagNotFound,
    /// A read needed for the decision failed
    LookupError(String),
    /// The catalog rejected the patch or it failed after retries
    PatchError(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::TagNotFound => f.write_str("tag not found"),
            FailureReason::LookupError(e) => write!(f, "lookup failed: {}", e),
            FailureReason::PatchError(e) => write!(f, "patch failed: {}", e),
        }
    }
}

/// Result of reconciling one tag (or owner) on one existing entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagOutcome {
    /// Desired state already holds; nothing sent
    AlreadyTagged,
    Applied,
    /// Dry run: the patch would have been sent
    Simulated,
    Failed(FailureReason),
}

/// Result for one entity, including the case where it does not exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityOutcome {
    Missing,
    Reconciled(TagOutcome),
}

impl EntityOutcome {
    fn failed(reason: FailureReason) -> Self {
        EntityOutcome::Reconciled(TagOutcome::Failed(reason))
    }
}

/// Applies and removes tags and owners on single entities.
pub struct Reconciler<'a, C: Catalog + ?Sized> {
    catalog: &'a C,
    dry_run: bool,
    // Tag existence per run. Snapshots are never cached.
    known_tags: Mutex<HashMap<TagFqn, bool>>,
}

impl<'a, C: Catalog + ?Sized> Reconciler<'a, C> {
    pub fn new(catalog: &'a C, dry_run: bool) -> Self {
        Self {
            catalog,
            dry_run,
            known_tags: Mutex::new(HashMap::new()),
        }
    }

    /// Whether a tag exists, asking the catalog at most once per tag.
    pub async fn tag_exists(&self, tag: &TagFqn) -> Result<bool, ClientError> {
        if let Some(known) = self.cached_tag(tag) {
            return Ok(known);
        }
        let exists = self.catalog.tag_exists(tag).await?;
        self.known_tags.lock().insert(tag.clone(), exists);
        Ok(exists)
    }

    fn cached_tag(&self, tag: &TagFqn) -> Option<bool> {
        self.known_tags.lock().get(tag).copied()
    }

    /// Make sure `tag` is applied to the entity.
    pub async fn apply_tag(
        &self,
        entity_type: EntityType,
        fqn: &str,
        tag: &TagFqn,
    ) -> EntityOutcome {
        let snapshot = match self.catalog.get_entity(entity_type, fqn).await {
            Ok(snapshot) => snapshot,
            Err(ClientError::NotFound(_)) => {
                tracing::warn!(entity = %fqn, kind = %entity_type, "Entity not found in catalog");
                return EntityOutcome::Missing;
            }
            Err(e) => {
                tracing::warn!(entity = %fqn, tag = %tag, error = %e, "Failed to fetch entity");
                return EntityOutcome::failed(FailureReason::LookupError(e.to_string()));
            }
        };

        EntityOutcome::Reconciled(self.apply_to_snapshot(&snapshot, tag).await)
    }

    /// Decide and act on an already-fetched snapshot.
    pub async fn apply_to_snapshot(&self, snapshot: &CatalogEntity, tag: &TagFqn) -> TagOutcome {
        let fqn = snapshot.fully_qualified_name.as_str();

        if snapshot.has_tag(tag) {
            tracing::debug!(entity = %fqn, tag = %tag, "Tag already applied");
            return TagOutcome::AlreadyTagged;
        }

        match self.tag_exists(tag).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(entity = %fqn, tag = %tag, "Tag does not exist in catalog");
                return TagOutcome::Failed(FailureReason::TagNotFound);
            }
            Err(e) => {
                tracing::warn!(entity = %fqn, tag = %tag, error = %e, "Failed to look up tag");
                return TagOutcome::Failed(FailureReason::LookupError(e.to_string()));
            }
        }

        if self.dry_run {
            tracing::info!(entity = %fqn, tag = %tag, "Would apply tag");
            return TagOutcome::Simulated;
        }

        let ops = [PatchOperation::add_tag(tag)];
        match self.catalog.patch(snapshot.entity_type, fqn, &ops).await {
            Ok(()) => {
                tracing::info!(entity = %fqn, tag = %tag, "Applied tag");
                TagOutcome::Applied
            }
            Err(e) => {
                tracing::warn!(
                    entity = %fqn,
                    tag = %tag,
                    status = ?e.status(),
                    error = %e,
                    "Failed to apply tag"
                );
                TagOutcome::Failed(FailureReason::PatchError(e.to_string()))
            }
        }
    }

    /// Remove `tag` from the entity, whether or not it is currently applied.
    pub async fn remove_tag(
        &self,
        entity_type: EntityType,
        fqn: &str,
        tag: &TagFqn,
    ) -> EntityOutcome {
        match self.catalog.exists(entity_type, fqn).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(entity = %fqn, kind = %entity_type, "Entity not found in catalog");
                return EntityOutcome::Missing;
            }
            Err(e) => {
                tracing::warn!(entity = %fqn, tag = %tag, error = %e, "Failed to check entity");
                return EntityOutcome::failed(FailureReason::LookupError(e.to_string()));
            }
        }

        if self.dry_run {
            tracing::info!(entity = %fqn, tag = %tag, "Would remove tag");
            return EntityOutcome::Reconciled(TagOutcome::Simulated);
        }

        let ops = [PatchOperation::remove_tag(tag)];
        match self.catalog.patch(entity_type, fqn, &ops).await {
            Ok(()) => {
                tracing::info!(entity = %fqn, tag = %tag, "Removed tag");
                EntityOutcome::Reconciled(TagOutcome::Applied)
            }
            Err(e) => {
                tracing::warn!(
                    entity = %fqn,
                    tag = %tag,
                    status = ?e.status(),
                    error = %e,
                    "Failed to remove tag"
                );
                EntityOutcome::failed(FailureReason::PatchError(e.to_string()))
            }
        }
    }

    /// Make `owner` the sole owner of the entity.
    pub async fn assign_owner(
        &self,
        entity_type: EntityType,
        fqn: &str,
        owner: &EntityReference,
    ) -> EntityOutcome {
        let snapshot = match self.catalog.get_entity(entity_type, fqn).await {
            Ok(snapshot) => snapshot,
            Err(ClientError::NotFound(_)) => {
                tracing::warn!(entity = %fqn, kind = %entity_type, "Entity not found in catalog");
                return EntityOutcome::Missing;
            }
            Err(e) => {
                tracing::warn!(entity = %fqn, owner = %owner.id, error = %e, "Failed to fetch entity");
                return EntityOutcome::failed(FailureReason::LookupError(e.to_string()));
            }
        };

        if snapshot.owned_solely_by(owner) {
            tracing::debug!(entity = %fqn, owner = %owner.id, "Owner already assigned");
            return EntityOutcome::Reconciled(TagOutcome::AlreadyTagged);
        }

        let discarded: Vec<&str> = snapshot
            .owners
            .iter()
            .filter(|existing| !existing.same_as(owner))
            .map(|existing| existing.id.as_str())
            .collect();
        if !discarded.is_empty() {
            tracing::warn!(
                entity = %fqn,
                owner = %owner.id,
                discarded = ?discarded,
                "Replacing existing owners"
            );
        }

        if self.dry_run {
            tracing::info!(entity = %fqn, owner = %owner.id, "Would assign owner");
            return EntityOutcome::Reconciled(TagOutcome::Simulated);
        }

        let ops = [PatchOperation::replace_owners(owner)];
        match self.catalog.patch(entity_type, fqn, &ops).await {
            Ok(()) => {
                tracing::info!(entity = %fqn, owner = %owner.id, "Assigned owner");
                EntityOutcome::Reconciled(TagOutcome::Applied)
            }
            Err(e) => {
                tracing::warn!(
                    entity = %fqn,
                    owner = %owner.id,
                    status = ?e.status(),
                    error = %e,
                    "Failed to assign owner"
                );
                EntityOutcome::failed(FailureReason::PatchError(e.to_string()))
            }
        }
    }
}
