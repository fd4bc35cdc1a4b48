//! Turning ordered change events into index mutations.

use crate::traits::{EntityProvider, IndexWrapper};
use crate::UpdateError;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use sync_core::{
    ContainmentMap, EntityRecord, EntityType, EventType, IdValue, IndexSchema,
    RehashedTypeMetadata, UpdateInfo,
};
use tracing::{debug, info, warn};

/// Counts of the index mutations emitted for one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateStats {
    pub indexed: usize,
    pub updated: usize,
    pub deleted: usize,
}

/// Per-batch bookkeeping.
#[derive(Default)]
struct BatchState {
    // (root type, root id) already indexed or updated in this batch
    emitted: HashSet<(EntityType, IdValue)>,
    stats: UpdateStats,
}

/// Applies change events to an index of root documents.
///
/// Holds no state between calls; each [`update_event`](Self::update_event)
/// starts with a fresh dedup set.
pub struct IndexUpdater<P, W> {
    containment: Arc<ContainmentMap>,
    metadata: Arc<HashMap<EntityType, RehashedTypeMetadata>>,
    provider: P,
    wrapper: W,
}

impl<P, W> IndexUpdater<P, W>
where
    P: EntityProvider,
    W: IndexWrapper,
{
    pub fn new(schema: &IndexSchema, provider: P, wrapper: W) -> Self {
        Self {
            containment: Arc::new(schema.contained_in_index_of()),
            metadata: Arc::new(schema.rehashed_metadata()),
            provider,
            wrapper,
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn wrapper(&self) -> &W {
        &self.wrapper
    }

    /// Apply `events` in order.
    ///
    /// Stops at the first provider or sink failure; mutations emitted before
    /// it stay applied.
    pub async fn update_event(
        &self,
        events: &[UpdateInfo],
        tx: &W::Transaction,
    ) -> Result<UpdateStats, UpdateError> {
        let mut state = BatchState::default();

        for event in events {
            let entity_type = event.entity_type();
            let roots = self
                .containment
                .roots_for(entity_type)
                .ok_or_else(|| UpdateError::Resolution {
                    entity_type: entity_type.clone(),
                    reason: "not contained in any index root",
                })?;
            debug!(
                "Applying {} of {} {} to roots {:?}",
                event.event_type(),
                entity_type,
                event.id(),
                roots
            );

            // looked up at most once per event
            let mut fetched: Option<Option<EntityRecord>> = None;

            for root_type in roots {
                let metadata = self.metadata.get(root_type).ok_or_else(|| UpdateError::Resolution {
                    entity_type: root_type.clone(),
                    reason: "no metadata for root type",
                })?;

                if root_type == entity_type {
                    self.apply_to_root(event, roots, &mut fetched, &mut state, tx)
                        .await?;
                    if !metadata.embeds(entity_type) {
                        continue;
                    }
                }
                self.propagate_to_root(event, metadata, &mut fetched, &mut state, tx)
                    .await?;
            }
        }

        info!(
            "Applied {} change events: {} indexed, {} updated, {} deleted",
            events.len(),
            state.stats.indexed,
            state.stats.updated,
            state.stats.deleted
        );
        Ok(state.stats)
    }

    async fn fetch_once<'a>(
        &self,
        event: &UpdateInfo,
        fetched: &'a mut Option<Option<EntityRecord>>,
    ) -> Result<Option<&'a EntityRecord>, UpdateError> {
        if fetched.is_none() {
            let record = self
                .provider
                .get(event.entity_type(), event.id())
                .await
                .map_err(|source| UpdateError::Provider {
                    entity_type: event.entity_type().clone(),
                    ids: event.id().to_string(),
                    source: source.into(),
                })?;
            *fetched = Some(record);
        }
        Ok(fetched.as_ref().and_then(Option::as_ref))
    }

    async fn apply_to_root(
        &self,
        event: &UpdateInfo,
        roots: &[EntityType],
        fetched: &mut Option<Option<EntityRecord>>,
        state: &mut BatchState,
        tx: &W::Transaction,
    ) -> Result<(), UpdateError> {
        let key = (event.entity_type().clone(), event.id().clone());

        if event.event_type() == EventType::Delete {
            return self.delete_root(event, roots, key, state, tx).await;
        }
        if state.emitted.contains(&key) {
            debug!("{} {} already written in this batch", key.0, key.1);
            return Ok(());
        }

        let Some(record) = self.fetch_once(event, fetched).await? else {
            // vanished since the event was logged
            return self.delete_root(event, roots, key, state, tx).await;
        };

        if event.event_type() == EventType::Insert {
            self.wrapper
                .index(record, tx)
                .await
                .map_err(|source| UpdateError::sink("index", &key.0, &key.1, source))?;
            state.stats.indexed += 1;
        } else {
            self.wrapper
                .update(record, tx)
                .await
                .map_err(|source| UpdateError::sink("update", &key.0, &key.1, source))?;
            state.stats.updated += 1;
        }
        state.emitted.insert(key);
        Ok(())
    }

    async fn delete_root(
        &self,
        event: &UpdateInfo,
        roots: &[EntityType],
        key: (EntityType, IdValue),
        state: &mut BatchState,
        tx: &W::Transaction,
    ) -> Result<(), UpdateError> {
        self.wrapper
            .delete(event.entity_type(), roots, event.id(), tx)
            .await
            .map_err(|source| UpdateError::sink("delete", &key.0, &key.1, source))?;
        state.stats.deleted += 1;
        // a later insert of the same id in this batch must be indexed again
        state.emitted.remove(&key);
        Ok(())
    }

    async fn propagate_to_root(
        &self,
        event: &UpdateInfo,
        metadata: &RehashedTypeMetadata,
        fetched: &mut Option<Option<EntityRecord>>,
        state: &mut BatchState,
        tx: &W::Transaction,
    ) -> Result<(), UpdateError> {
        let root_type = metadata.root_type();
        let root_ids = self.resolve_root_ids(event, metadata, fetched).await?;

        let mut pending: Vec<IdValue> = Vec::with_capacity(root_ids.len());
        for id in root_ids {
            if !pending.contains(&id) && !state.emitted.contains(&(root_type.clone(), id.clone())) {
                pending.push(id);
            }
        }
        if pending.is_empty() {
            return Ok(());
        }

        let records = self
            .provider
            .get_batch(root_type, &pending)
            .await
            .map_err(|source| UpdateError::Provider {
                entity_type: root_type.clone(),
                ids: format!("{pending:?}"),
                source: source.into(),
            })?;

        for record in records {
            let key = (root_type.clone(), record.id.clone());
            if state.emitted.contains(&key) {
                continue;
            }
            self.wrapper
                .update(&record, tx)
                .await
                .map_err(|source| UpdateError::sink("update", &key.0, &key.1, source))?;
            state.stats.updated += 1;
            state.emitted.insert(key);
        }
        Ok(())
    }

    /// Ids of the `metadata` root's documents embedding the event's entity.
    async fn resolve_root_ids(
        &self,
        event: &UpdateInfo,
        metadata: &RehashedTypeMetadata,
        fetched: &mut Option<Option<EntityRecord>>,
    ) -> Result<Vec<IdValue>, UpdateError> {
        let entity_type = event.entity_type();
        let contained = if event.event_type() == EventType::Delete {
            None
        } else {
            self.fetch_once(event, fetched).await?
        };

        if let (Some(record), Some(property)) = (contained, metadata.back_reference(entity_type)) {
            // a cleared reference detaches the child from its former root
            return record
                .reference_ids(property, metadata.root_id_property(), metadata.root_id_type())
                .ok_or_else(|| UpdateError::Resolution {
                    entity_type: entity_type.clone(),
                    reason: "back-reference does not hold ids of the root's id type",
                });
        }

        let id_fields = metadata.id_fields(entity_type);
        if id_fields.is_empty() {
            // back-reference only and the row is gone
            warn!(
                "Cannot locate {} documents embedding {} {}: no id fields configured",
                metadata.root_type(),
                entity_type,
                event.id()
            );
            return Ok(Vec::new());
        }

        self.wrapper
            .find_root_ids(metadata.root_type(), id_fields, event.id())
            .await
            .map_err(|source| UpdateError::Lookup {
                root_type: metadata.root_type().clone(),
                entity_type: entity_type.clone(),
                id: event.id().to_string(),
                source: source.into(),
            })
    }
}
