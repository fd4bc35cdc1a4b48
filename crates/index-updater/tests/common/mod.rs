//! In-memory entity store and recording index for synchronizer tests.

#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use index_updater::{EntityProvider, IndexWrapper};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use sync_core::{EntityRecord, EntityType, IdValue};

#[derive(Default)]
pub struct MemoryProvider {
    pub records: Mutex<HashMap<(EntityType, IdValue), EntityRecord>>,
    pub fail_on: Option<EntityType>,
}

impl MemoryProvider {
    pub fn put(&self, record: EntityRecord) {
        self.records
            .lock()
            .unwrap()
            .insert((record.entity_type.clone(), record.id.clone()), record);
    }

    pub fn remove(&self, entity_type: &str, id: impl Into<IdValue>) {
        self.records
            .lock()
            .unwrap()
            .remove(&(EntityType::new(entity_type), id.into()));
    }
}

#[async_trait]
impl EntityProvider for MemoryProvider {
    async fn get(&self, entity_type: &EntityType, id: &IdValue) -> Result<Option<EntityRecord>> {
        if self.fail_on.as_ref() == Some(entity_type) {
            anyhow::bail!("database unavailable");
        }
        Ok(self
            .records
            .lock()
            .unwrap()
            .get(&(entity_type.clone(), id.clone()))
            .cloned())
    }

    async fn get_batch(&self, entity_type: &EntityType, ids: &[IdValue]) -> Result<Vec<EntityRecord>> {
        if self.fail_on.as_ref() == Some(entity_type) {
            anyhow::bail!("database unavailable");
        }
        let records = self.records.lock().unwrap();
        Ok(ids
            .iter()
            .filter_map(|id| records.get(&(entity_type.clone(), id.clone())).cloned())
            .collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Index(String, IdValue, u32),
    Update(String, IdValue, u32),
    Delete(String, Vec<String>, IdValue, u32),
    FindRoots(String, Vec<String>, IdValue),
}

/// Keeps the documents it is given and every call made to it.
#[derive(Default)]
pub struct RecordingIndex {
    pub calls: Mutex<Vec<Call>>,
    pub documents: Mutex<BTreeMap<(String, IdValue), EntityRecord>>,
    /// (root type, contained id) → root ids answered by `find_root_ids`
    pub embedded_in: HashMap<(String, IdValue), Vec<IdValue>>,
    pub fail_updates: bool,
    pub fail_lookups: bool,
}

impl RecordingIndex {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn embed(mut self, root_type: &str, contained_id: impl Into<IdValue>, root_ids: Vec<IdValue>) -> Self {
        self.embedded_in
            .insert((root_type.to_string(), contained_id.into()), root_ids);
        self
    }

    fn store(&self, record: &EntityRecord) {
        self.documents.lock().unwrap().insert(
            (record.entity_type.to_string(), record.id.clone()),
            record.clone(),
        );
    }
}

#[async_trait]
impl IndexWrapper for RecordingIndex {
    type Transaction = u32;

    async fn index(&self, record: &EntityRecord, tx: &u32) -> Result<()> {
        self.calls.lock().unwrap().push(Call::Index(
            record.entity_type.to_string(),
            record.id.clone(),
            *tx,
        ));
        self.store(record);
        Ok(())
    }

    async fn update(&self, record: &EntityRecord, tx: &u32) -> Result<()> {
        if self.fail_updates {
            anyhow::bail!("index is read-only");
        }
        self.calls.lock().unwrap().push(Call::Update(
            record.entity_type.to_string(),
            record.id.clone(),
            *tx,
        ));
        self.store(record);
        Ok(())
    }

    async fn delete(
        &self,
        entity_type: &EntityType,
        root_types: &[EntityType],
        id: &IdValue,
        tx: &u32,
    ) -> Result<()> {
        self.calls.lock().unwrap().push(Call::Delete(
            entity_type.to_string(),
            root_types.iter().map(ToString::to_string).collect(),
            id.clone(),
            *tx,
        ));
        self.documents
            .lock()
            .unwrap()
            .remove(&(entity_type.to_string(), id.clone()));
        Ok(())
    }

    async fn find_root_ids(
        &self,
        root_type: &EntityType,
        id_fields: &[String],
        contained_id: &IdValue,
    ) -> Result<Vec<IdValue>> {
        if self.fail_lookups {
            anyhow::bail!("search cluster unreachable");
        }
        self.calls.lock().unwrap().push(Call::FindRoots(
            root_type.to_string(),
            id_fields.to_vec(),
            contained_id.clone(),
        ));
        Ok(self
            .embedded_in
            .get(&(root_type.to_string(), contained_id.clone()))
            .cloned()
            .unwrap_or_default())
    }
}
