//! Event models: the shape of one monitored table's event log.
//!
//! An event model names the original table, the event-log table the triggers
//! write into and the column holding the event type. Its `IdInfo`s describe
//! how the id columns copied into the event log map back to entity ids. A
//! table backing an entity has one `IdInfo`; a join table has two, one per
//! side of the relationship, so that a single row change yields a change
//! event for both ends.

use crate::types::{EntityType, EventType, EventTypeError, IdColumnType};
use crate::values::{IdValue, UpdateInfo};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Errors raised while building an event model or reading an event-log row
/// through it.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Event model for table '{table}' has no id mappings")]
    NoIdInfos { table: String },

    #[error(
        "Id mapping for '{entity_type}' has {id_columns} event-log columns but {original_columns} original columns"
    )]
    ColumnCountMismatch {
        entity_type: EntityType,
        id_columns: usize,
        original_columns: usize,
    },

    #[error("Id mapping for '{entity_type}' has no columns")]
    EmptyIdInfo { entity_type: EntityType },

    #[error("Duplicate id column '{column}' in event model for table '{table}'")]
    DuplicateIdColumn { table: String, column: String },

    #[error("No column type declared for id column '{column}' of '{entity_type}'")]
    MissingColumnType {
        entity_type: EntityType,
        column: String,
    },

    #[error("Event-log row of '{table}' is missing column '{column}'")]
    MissingColumn { table: String, column: String },

    #[error("Column '{column}' of '{table}' holds {value}, expected a {expected} id")]
    InvalidIdValue {
        table: String,
        column: String,
        value: serde_json::Value,
        expected: IdColumnType,
    },

    #[error(transparent)]
    EventType(#[from] EventTypeError),
}

/// Mapping from event-log id columns back to one entity's id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdInfo {
    /// Entity type the id belongs to
    pub entity_type: EntityType,

    /// Id columns in the event-log table
    pub id_columns: Vec<String>,

    /// Matching columns in the original table, same order as `id_columns`
    pub columns_in_original: Vec<String>,

    /// Value type of every event-log id column
    pub column_types: HashMap<String, IdColumnType>,
}

impl IdInfo {
    pub fn new(
        entity_type: impl Into<EntityType>,
        id_columns: Vec<String>,
        columns_in_original: Vec<String>,
        column_types: HashMap<String, IdColumnType>,
    ) -> Result<Self, ModelError> {
        let info = Self {
            entity_type: entity_type.into(),
            id_columns,
            columns_in_original,
            column_types,
        };
        info.validate()?;
        Ok(info)
    }

    /// Shorthand for the common single-column case.
    pub fn single(
        entity_type: impl Into<EntityType>,
        id_column: impl Into<String>,
        column_in_original: impl Into<String>,
        column_type: IdColumnType,
    ) -> Self {
        let id_column = id_column.into();
        Self {
            entity_type: entity_type.into(),
            column_types: HashMap::from([(id_column.clone(), column_type)]),
            id_columns: vec![id_column],
            columns_in_original: vec![column_in_original.into()],
        }
    }

    /// Pairs of (event-log column, original column).
    pub fn column_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.id_columns
            .iter()
            .zip(self.columns_in_original.iter())
            .map(|(id, original)| (id.as_str(), original.as_str()))
    }

    fn validate(&self) -> Result<(), ModelError> {
        if self.id_columns.len() != self.columns_in_original.len() {
            return Err(ModelError::ColumnCountMismatch {
                entity_type: self.entity_type.clone(),
                id_columns: self.id_columns.len(),
                original_columns: self.columns_in_original.len(),
            });
        }
        if self.id_columns.is_empty() {
            return Err(ModelError::EmptyIdInfo {
                entity_type: self.entity_type.clone(),
            });
        }
        for column in &self.id_columns {
            if !self.column_types.contains_key(column) {
                return Err(ModelError::MissingColumnType {
                    entity_type: self.entity_type.clone(),
                    column: column.clone(),
                });
            }
        }
        Ok(())
    }

    fn read_id(
        &self,
        table: &str,
        row: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<IdValue, ModelError> {
        let mut parts = Vec::with_capacity(self.id_columns.len());
        for column in &self.id_columns {
            let raw = row.get(column).ok_or_else(|| ModelError::MissingColumn {
                table: table.to_string(),
                column: column.clone(),
            })?;
            let column_type = *self.column_types.get(column).ok_or_else(|| {
                ModelError::MissingColumnType {
                    entity_type: self.entity_type.clone(),
                    column: column.clone(),
                }
            })?;
            let value =
                IdValue::from_column(raw, column_type).ok_or_else(|| ModelError::InvalidIdValue {
                    table: table.to_string(),
                    column: column.clone(),
                    value: raw.clone(),
                    expected: column_type,
                })?;
            parts.push(value);
        }
        if parts.len() == 1 {
            Ok(parts.remove(0))
        } else {
            Ok(IdValue::Composite(parts))
        }
    }
}

/// Event-log description of one monitored table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawEventModel")]
pub struct EventModel {
    #[serde(rename = "original_table")]
    original_table_name: String,
    #[serde(rename = "event_log_table")]
    event_log_table_name: String,
    #[serde(rename = "event_type_column")]
    event_type_column_name: String,
    id_infos: Vec<IdInfo>,
}

#[derive(Deserialize)]
struct RawEventModel {
    original_table: String,
    event_log_table: String,
    #[serde(default = "default_event_type_column")]
    event_type_column: String,
    id_infos: Vec<IdInfo>,
}

fn default_event_type_column() -> String {
    "eventType".to_string()
}

impl TryFrom<RawEventModel> for EventModel {
    type Error = ModelError;

    fn try_from(raw: RawEventModel) -> Result<Self, Self::Error> {
        EventModel::new(
            raw.original_table,
            raw.event_log_table,
            raw.event_type_column,
            raw.id_infos,
        )
    }
}

impl EventModel {
    /// Build a validated event model.
    ///
    /// Fails when there are no id mappings, when an id mapping's column lists
    /// differ in length or lack a type, or when two mappings share an
    /// event-log column.
    pub fn new(
        original_table_name: impl Into<String>,
        event_log_table_name: impl Into<String>,
        event_type_column_name: impl Into<String>,
        id_infos: Vec<IdInfo>,
    ) -> Result<Self, ModelError> {
        let model = Self::new_unchecked(
            original_table_name,
            event_log_table_name,
            event_type_column_name,
            id_infos,
        );
        if model.id_infos.is_empty() {
            return Err(ModelError::NoIdInfos {
                table: model.original_table_name,
            });
        }
        let mut seen = HashSet::new();
        for info in &model.id_infos {
            info.validate()?;
            for column in &info.id_columns {
                if !seen.insert(column.as_str()) {
                    return Err(ModelError::DuplicateIdColumn {
                        table: model.original_table_name.clone(),
                        column: column.clone(),
                    });
                }
            }
        }
        Ok(model)
    }

    /// Build an event model without validation.
    ///
    /// Code generators still refuse models without id columns; this exists
    /// for metadata layers that validate on their own.
    pub fn new_unchecked(
        original_table_name: impl Into<String>,
        event_log_table_name: impl Into<String>,
        event_type_column_name: impl Into<String>,
        id_infos: Vec<IdInfo>,
    ) -> Self {
        Self {
            original_table_name: original_table_name.into(),
            event_log_table_name: event_log_table_name.into(),
            event_type_column_name: event_type_column_name.into(),
            id_infos,
        }
    }

    pub fn original_table_name(&self) -> &str {
        &self.original_table_name
    }

    pub fn event_log_table_name(&self) -> &str {
        &self.event_log_table_name
    }

    pub fn event_type_column_name(&self) -> &str {
        &self.event_type_column_name
    }

    pub fn id_infos(&self) -> &[IdInfo] {
        &self.id_infos
    }

    /// Convert one event-log row into change events, one per id mapping.
    ///
    /// `row` maps event-log column names to the values a poller read.
    pub fn to_update_infos(
        &self,
        event_type_value: i32,
        row: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<Vec<UpdateInfo>, ModelError> {
        let event_type = EventType::from_value(event_type_value)?;
        self.id_infos
            .iter()
            .map(|info| {
                let id = info.read_id(&self.event_log_table_name, row)?;
                Ok(UpdateInfo::new(info.entity_type.clone(), id, event_type))
            })
            .collect()
    }
}
