//! Collaborator traits: where entities come from and where index mutations go.

use anyhow::Result;
use sync_core::{EntityRecord, EntityType, IdValue};

/// Read access to the primary data store.
///
/// Implementations load entity graphs by id, typically through the
/// application's persistence layer. Nothing is cached on this side.
#[async_trait::async_trait]
pub trait EntityProvider: Send + Sync {
    /// Load one entity; `None` when it no longer exists.
    async fn get(&self, entity_type: &EntityType, id: &IdValue) -> Result<Option<EntityRecord>>;

    /// Load several entities of one type.
    ///
    /// The result follows the order of `ids`; entities that no longer exist
    /// are omitted.
    async fn get_batch(&self, entity_type: &EntityType, ids: &[IdValue]) -> Result<Vec<EntityRecord>>;
}

/// Mutations against the full-text index.
///
/// All calls made while applying one batch receive the same transaction
/// context.
#[async_trait::async_trait]
pub trait IndexWrapper: Send + Sync {
    type Transaction: Send + Sync;

    /// Add the document of a new root entity.
    async fn index(&self, record: &EntityRecord, tx: &Self::Transaction) -> Result<()>;

    /// Replace the document of an existing root entity.
    async fn update(&self, record: &EntityRecord, tx: &Self::Transaction) -> Result<()>;

    /// Remove the document of `entity_type` with `id`. `root_types` are all
    /// the root types whose documents may embed the entity.
    async fn delete(
        &self,
        entity_type: &EntityType,
        root_types: &[EntityType],
        id: &IdValue,
        tx: &Self::Transaction,
    ) -> Result<()>;

    /// Ids of `root_type` documents currently holding `contained_id` in any
    /// of `id_fields`.
    async fn find_root_ids(
        &self,
        root_type: &EntityType,
        id_fields: &[String],
        contained_id: &IdValue,
    ) -> Result<Vec<IdValue>>;
}
