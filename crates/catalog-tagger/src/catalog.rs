//! The catalog operations the engine depends on.
//!
//! The reconciler and the run orchestration talk to the catalog only through
//! [`Catalog`], so they can be driven by [`CatalogClient`] in production and
//! by an in-memory catalog in tests.

use async_trait::async_trait;
use tagsync_catalog_client::{
    CatalogClient, CatalogEntity, EntityType, PatchOperation, Result, TagFqn,
};

#[async_trait]
pub trait Catalog: Send + Sync {
    /// 2xx → true, 404 → false, anything else is an error.
    async fn exists(&self, entity_type: EntityType, fqn: &str) -> Result<bool>;

    /// Fresh snapshot including tags and owners.
    async fn get_entity(&self, entity_type: EntityType, fqn: &str) -> Result<CatalogEntity>;

    async fn tag_exists(&self, tag: &TagFqn) -> Result<bool>;

    /// Every table in a schema, with tags.
    async fn list_tables(&self, schema_fqn: &str, page_size: usize) -> Result<Vec<CatalogEntity>>;

    async fn patch(
        &self,
        entity_type: EntityType,
        fqn: &str,
        operations: &[PatchOperation],
    ) -> Result<()>;
}

#[async_trait]
impl Catalog for CatalogClient {
    async fn exists(&self, entity_type: EntityType, fqn: &str) -> Result<bool> {
        CatalogClient::exists(self, entity_type, fqn).await
    }

    async fn get_entity(&self, entity_type: EntityType, fqn: &str) -> Result<CatalogEntity> {
        CatalogClient::get_entity(self, entity_type, fqn, true).await
    }

    async fn tag_exists(&self, tag: &TagFqn) -> Result<bool> {
        CatalogClient::tag_exists(self, tag).await
    }

    async fn list_tables(&self, schema_fqn: &str, page_size: usize) -> Result<Vec<CatalogEntity>> {
        CatalogClient::list_tables(self, schema_fqn, page_size).await
    }

    async fn patch(
        &self,
        entity_type: EntityType,
        fqn: &str,
        operations: &[PatchOperation],
    ) -> Result<()> {
        CatalogClient::patch(self, entity_type, fqn, operations).await
    }
}
